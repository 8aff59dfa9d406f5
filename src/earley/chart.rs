//! Earley recognizer (spec §4.6 C7): predict/scan/complete over a chart
//! indexed by byte position rather than token count, so that terminals of
//! different lengths matching at the same position (the case a
//! contextual lexer cannot resolve) simply advance to different future
//! columns instead of requiring one committed tokenization up front.
//!
//! Grounded on `other_examples/.../mdubinko-earleybird__src-ixml_grammar.rs.rs`
//! for the general chart-parser shape (item sets keyed by position,
//! predict/scan/complete as the three productions of the algorithm),
//! adapted here to this crate's lowered `Grammar` and to scannerless
//! byte-position columns so the dynamic lexer's multi-length matches are
//! representable at all.
use crate::grammar::model::{Grammar, Symbol};
use crate::tree::Token;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;

pub type RuleIdx = usize;

/// `(rule, dot, origin)`: the dot has advanced past `dot` symbols of
/// `grammar.rules[rule]`, and the whole match started at byte `origin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EItem {
    pub rule: RuleIdx,
    pub dot: usize,
    pub origin: usize,
}

/// Why a given item exists at a given column: either a scanned token, or
/// a completed sub-derivation of a nonterminal spanning `start..column`.
#[derive(Debug, Clone)]
pub enum Cause {
    Token(Token),
    Sub { start: usize, item: EItem },
}

/// One way of reaching `(column, item)`: advance `pred` (living in
/// `pred_column`) over `cause`. Multiple edges for the same `(column,
/// item)` key is exactly what ambiguity looks like in this chart.
#[derive(Debug, Clone)]
pub struct Edge {
    pub pred_column: usize,
    pub pred: EItem,
    pub cause: Cause,
}

pub struct Chart {
    pub columns: BTreeMap<usize, BTreeSet<EItem>>,
    pub edges: HashMap<(usize, EItem), Vec<Edge>>,
    /// Furthest byte position at which the chart held any item, for
    /// locating a failed parse (spec §4.6 "earliest position where the
    /// chart became empty").
    pub furthest_position: usize,
}

impl Chart {
    /// Items in `columns[column]` that are complete (`dot == len`) for a
    /// production of `name` with the given `origin`.
    pub fn completed(&self, grammar: &Grammar, column: usize, name: &str, origin: usize) -> Vec<EItem> {
        self.columns
            .get(&column)
            .into_iter()
            .flat_map(|set| set.iter())
            .filter(|it| {
                it.origin == origin
                    && grammar.rules[it.rule].symbols.len() == it.dot
                    && grammar.rules[it.rule].name.as_ref() == name
            })
            .cloned()
            .collect()
    }
}

/// Supplies candidate scans at a byte position, abstracting over
/// "basic" (pre-tokenized, at most one candidate) and "dynamic"/
/// "dynamic_complete" (every terminal viable there) lexing.
pub trait ScanSource {
    /// Every `(end_position, token)` reachable by scanning a terminal in
    /// `legal` starting at `pos` (after skipping any ignored run).
    fn candidates(&mut self, pos: usize, legal: &BTreeSet<Rc<str>>) -> Vec<(usize, Token)>;
}

fn next_symbol(grammar: &Grammar, item: EItem) -> Option<Symbol> {
    grammar.rules[item.rule].symbols.get(item.dot).cloned()
}

fn advance(item: EItem) -> EItem {
    EItem { rule: item.rule, dot: item.dot + 1, origin: item.origin }
}

/// Runs predict/complete to a fixed point at `column`, then returns the
/// set of terminal names some item there is waiting on.
fn close_column(grammar: &Grammar, chart: &mut Chart, column: usize) -> BTreeSet<Rc<str>> {
    let mut worklist: VecDeque<EItem> = chart.columns.entry(column).or_default().iter().cloned().collect();
    let mut seen: HashSet<EItem> = worklist.iter().cloned().collect();

    while let Some(item) = worklist.pop_front() {
        match next_symbol(grammar, item) {
            None => {
                // Complete: advance every item in S[item.origin] waiting on this rule's name.
                let name = grammar.rules[item.rule].name.clone();
                let waiting: Vec<EItem> = chart
                    .columns
                    .get(&item.origin)
                    .into_iter()
                    .flat_map(|s| s.iter())
                    .filter(|w| matches!(next_symbol(grammar, **w), Some(Symbol::Rule(n)) if n == name))
                    .cloned()
                    .collect();
                for w in waiting {
                    let new_item = advance(w);
                    let set = chart.columns.entry(column).or_default();
                    if set.insert(new_item) {
                        seen.insert(new_item);
                        worklist.push_back(new_item);
                    }
                    chart.edges.entry((column, new_item)).or_default().push(Edge {
                        pred_column: item.origin,
                        pred: w,
                        cause: Cause::Sub { start: item.origin, item },
                    });
                }
            }
            Some(Symbol::Rule(name)) => {
                for (rule_idx, _) in grammar.rules.iter().enumerate().filter(|(_, r)| r.name.as_ref() == name.as_ref()) {
                    let predicted = EItem { rule: rule_idx, dot: 0, origin: column };
                    let set = chart.columns.entry(column).or_default();
                    if set.insert(predicted) && seen.insert(predicted) {
                        worklist.push_back(predicted);
                    }
                }
            }
            Some(Symbol::Terminal(_)) => {}
        }
    }

    chart
        .columns
        .get(&column)
        .into_iter()
        .flat_map(|s| s.iter())
        .filter_map(|it| match next_symbol(grammar, *it) {
            Some(Symbol::Terminal(name)) => Some(name),
            _ => None,
        })
        .collect()
}

/// Runs the recognizer to completion, returning the chart whether or not
/// the input was fully recognized; callers check `completed` at the
/// input's full length to decide success.
pub fn recognize(grammar: &Grammar, start_symbol: &str, input_len: usize, source: &mut dyn ScanSource) -> Chart {
    let mut chart = Chart { columns: BTreeMap::new(), edges: HashMap::new(), furthest_position: 0 };
    for (rule_idx, _) in grammar.rules.iter().enumerate().filter(|(_, r)| r.name.as_ref() == start_symbol) {
        chart.columns.entry(0).or_default().insert(EItem { rule: rule_idx, dot: 0, origin: 0 });
    }

    let mut frontier: BTreeSet<usize> = [0].into_iter().collect();
    let mut closed: HashSet<usize> = HashSet::new();

    while let Some(&pos) = frontier.iter().next() {
        frontier.remove(&pos);
        if closed.contains(&pos) {
            continue;
        }
        closed.insert(pos);

        let legal = close_column(grammar, &mut chart, pos);
        if !chart.columns.get(&pos).map(|s| !s.is_empty()).unwrap_or(false) {
            continue;
        }
        chart.furthest_position = chart.furthest_position.max(pos);

        if pos >= input_len || legal.is_empty() {
            continue;
        }

        for (end, token) in source.candidates(pos, &legal) {
            let waiting: Vec<EItem> = chart
                .columns
                .get(&pos)
                .into_iter()
                .flat_map(|s| s.iter())
                .filter(|w| matches!(next_symbol(grammar, **w), Some(Symbol::Terminal(n)) if n == token.ttype))
                .cloned()
                .collect();
            for w in waiting {
                let new_item = advance(w);
                chart.columns.entry(end).or_default().insert(new_item);
                chart.edges.entry((end, new_item)).or_default().push(Edge {
                    pred_column: pos,
                    pred: w,
                    cause: Cause::Token(token.clone()),
                });
                // `end` is always strictly greater than every position
                // closed so far (scans only advance forward), so this is
                // always a genuinely new frontier entry, never a reopen.
                frontier.insert(end);
            }
        }
    }

    chart
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::model::{Rule, Symbol, Terminal, TerminalPattern};
    use crate::position::Span;

    fn terminal(name: &str) -> Terminal {
        Terminal { name: Rc::from(name), pattern: TerminalPattern::Literal { text: name.to_lowercase(), case_insensitive: false }, priority: 0, ignored: false, keep: true, order: 0 }
    }

    fn rule(name: &str, symbols: Vec<Symbol>, order: usize) -> Rule {
        Rule { name: Rc::from(name), symbols, alias: None, keep_all_tokens: false, filter_out: false, inline_if_single: false, optional_epsilon: false, priority: 0, order }
    }

    struct FixedSource {
        // position -> (end, token)
        script: HashMap<usize, Vec<(usize, Token)>>,
    }
    impl ScanSource for FixedSource {
        fn candidates(&mut self, pos: usize, _legal: &BTreeSet<Rc<str>>) -> Vec<(usize, Token)> {
            self.script.get(&pos).cloned().unwrap_or_default()
        }
    }

    fn tok(name: &str, value: &str, start: usize, end: usize) -> Token {
        Token::new(Rc::from(name), value.to_string(), Span { start_pos: start, end_pos: end, ..Default::default() }, true)
    }

    #[test]
    fn recognizes_simple_concatenation() {
        // start: A B
        let g = Grammar::build(
            vec![terminal("A"), terminal("B")],
            vec![rule("start", vec![Symbol::Terminal(Rc::from("A")), Symbol::Terminal(Rc::from("B"))], 0)],
            vec![Rc::from("start")],
        );
        let mut source = FixedSource {
            script: HashMap::from([(0, vec![(1, tok("A", "a", 0, 1))]), (1, vec![(2, tok("B", "b", 1, 2))])]),
        };
        let chart = recognize(&g, "start", 2, &mut source);
        assert!(!chart.completed(&g, 2, "start", 0).is_empty());
    }

    #[test]
    fn ambiguous_lexing_produces_two_completions() {
        // start: a a | b ; a matches "x", b matches "xx"
        let g = Grammar::build(
            vec![terminal("X"), terminal("XX")],
            vec![
                rule("start", vec![Symbol::Rule(Rc::from("a")), Symbol::Rule(Rc::from("a"))], 0),
                rule("start", vec![Symbol::Rule(Rc::from("b"))], 1),
                rule("a", vec![Symbol::Terminal(Rc::from("X"))], 2),
                rule("b", vec![Symbol::Terminal(Rc::from("XX"))], 3),
            ],
            vec![Rc::from("start")],
        );
        let mut source = FixedSource {
            script: HashMap::from([
                (0, vec![(1, tok("X", "x", 0, 1)), (2, tok("XX", "xx", 0, 2))]),
                (1, vec![(2, tok("X", "x", 1, 2))]),
            ]),
        };
        let chart = recognize(&g, "start", 2, &mut source);
        assert!(!chart.completed(&g, 2, "start", 0).is_empty());
    }
}
