//! SPPF materialisation and ambiguity resolution (spec §4.6 C11).
//!
//! The chart's edge lists already are the SPPF: an `(column, item)` key
//! with more than one [`super::chart::Edge`] is an OR-node, shared by
//! construction since every reference to the same `(symbol, start, end)`
//! completion reuses the same chart entry (spec §9 "Shared
//! sub-derivations"). This module just walks that structure two ways:
//! `resolve` picks the single highest-priority derivation at each OR-node
//! greedily (bottom-up, the same order the spec's "pick the alternative
//! with highest rule priority" description reads), `explicit` enumerates
//! every full derivation and wraps genuine multiplicity in an `_ambig`
//! node.
use super::chart::{Cause, Chart, EItem};
use crate::error::{Error, UnexpectedEOF};
use crate::grammar::model::Grammar;
use crate::tree::{maybe_placeholder, reduce_children, BuildRule, Child, Tree};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbiguityMode {
    Resolve,
    Explicit,
}

const AMBIG_NODE_NAME: &str = "_ambig";

fn build_rule_of<'a>(grammar: &'a Grammar, item: EItem, keep_all_tokens: bool) -> BuildRule<'a> {
    let rule = &grammar.rules[item.rule];
    BuildRule {
        lhs: &rule.name,
        alias: rule.alias.as_deref(),
        filter_out: rule.filter_out,
        inline_if_single: rule.inline_if_single,
        keep_all_tokens: keep_all_tokens || rule.keep_all_tokens,
    }
}

fn root_items(chart: &Chart, grammar: &Grammar, start_symbol: &str, input_len: usize) -> Vec<EItem> {
    chart.completed(grammar, input_len, start_symbol, 0)
}

/// No completed derivation of `start_symbol` spans the whole input; the
/// chart's own `furthest_position` (spec §4.6 "earliest position where
/// the chart became empty") is left for the caller to report via a
/// dedicated diagnostic if it wants one more precise than this.
fn parse_failure(_chart: &Chart) -> Error {
    Error::UnexpectedEOF(UnexpectedEOF { expected: Default::default() })
}

/// Picks exactly one tree, resolving every OR-node greedily by the
/// reducing rule's priority (ties broken by declaration order, the same
/// convention the terminal compiler and LALR tables use).
pub fn resolve(
    chart: &Chart,
    grammar: &Grammar,
    start_symbol: &str,
    input_len: usize,
    keep_all_tokens: bool,
    maybe_placeholders: bool,
) -> Result<Tree, Error> {
    let roots = root_items(chart, grammar, start_symbol, input_len);
    if roots.is_empty() {
        return Err(parse_failure(chart));
    }
    let mut child_memo: HashMap<(usize, EItem), Vec<Child>> = HashMap::new();
    let mut reduced_memo: HashMap<(usize, EItem), Vec<Child>> = HashMap::new();

    let best_root = roots
        .into_iter()
        .max_by_key(|r| (grammar.rules[r.rule].priority, std::cmp::Reverse(grammar.rules[r.rule].order)))
        .unwrap();
    let reduced = best_reduced(chart, grammar, input_len, best_root, keep_all_tokens, maybe_placeholders, &mut child_memo, &mut reduced_memo);
    Ok(children_to_root(start_symbol, reduced))
}

fn best_item_children(
    chart: &Chart,
    grammar: &Grammar,
    column: usize,
    item: EItem,
    keep_all_tokens: bool,
    maybe_placeholders: bool,
    child_memo: &mut HashMap<(usize, EItem), Vec<Child>>,
    reduced_memo: &mut HashMap<(usize, EItem), Vec<Child>>,
) -> Vec<Child> {
    if item.dot == 0 {
        return Vec::new();
    }
    if let Some(v) = child_memo.get(&(column, item)) {
        return v.clone();
    }
    let edges = chart.edges.get(&(column, item)).cloned().unwrap_or_default();
    // Each edge carries its own pred_column (split point): different edges
    // for the same (column, item) key can disagree on where the
    // predecessor ends, so the prefix must be recomputed per edge and kept
    // paired with that edge's own cause, never spliced across edges.
    let mut best: Option<(i32, usize, Vec<Child>)> = None;
    for edge in &edges {
        let prefix = best_item_children(chart, grammar, edge.pred_column, edge.pred, keep_all_tokens, maybe_placeholders, child_memo, reduced_memo);
        let (priority, order, contrib) = match &edge.cause {
            Cause::Token(tok) => (0, 0, vec![Child::Token(tok.clone())]),
            Cause::Sub { item: sub, .. } => {
                let rule = &grammar.rules[sub.rule];
                let reduced = best_reduced(chart, grammar, column, *sub, keep_all_tokens, maybe_placeholders, child_memo, reduced_memo);
                (rule.priority, rule.order, reduced)
            }
        };
        let better = match &best {
            None => true,
            Some((bp, bo, _)) => priority > *bp || (priority == *bp && order < *bo),
        };
        if better {
            let mut combined = prefix;
            combined.extend(contrib);
            best = Some((priority, order, combined));
        }
    }
    let result = best.map(|(_, _, c)| c).unwrap_or_default();
    child_memo.insert((column, item), result.clone());
    result
}

fn best_reduced(
    chart: &Chart,
    grammar: &Grammar,
    column: usize,
    item: EItem,
    keep_all_tokens: bool,
    maybe_placeholders: bool,
    child_memo: &mut HashMap<(usize, EItem), Vec<Child>>,
    reduced_memo: &mut HashMap<(usize, EItem), Vec<Child>>,
) -> Vec<Child> {
    if let Some(v) = reduced_memo.get(&(column, item)) {
        return v.clone();
    }
    let mut raw = best_item_children(chart, grammar, column, item, keep_all_tokens, maybe_placeholders, child_memo, reduced_memo);
    if maybe_placeholders && grammar.rules[item.rule].optional_epsilon {
        raw.push(maybe_placeholder());
    }
    let reduced = reduce_children(build_rule_of(grammar, item, keep_all_tokens), raw);
    reduced_memo.insert((column, item), reduced.clone());
    reduced
}

/// Enumerates every distinct derivation, wrapping genuine multiplicity
/// (more than one surviving, de-duplicated alternative) in an `_ambig`
/// node. Nested ambiguity is flattened into the set of full top-level
/// derivations rather than wrapped independently at each inner OR-node;
/// see DESIGN.md.
pub fn explicit(
    chart: &Chart,
    grammar: &Grammar,
    start_symbol: &str,
    input_len: usize,
    keep_all_tokens: bool,
    maybe_placeholders: bool,
) -> Result<Tree, Error> {
    let roots = root_items(chart, grammar, start_symbol, input_len);
    if roots.is_empty() {
        return Err(parse_failure(chart));
    }
    let mut child_memo: HashMap<(usize, EItem), Rc<Vec<Vec<Child>>>> = HashMap::new();
    let mut reduced_memo: HashMap<(usize, EItem), Rc<Vec<Vec<Child>>>> = HashMap::new();

    let mut candidates: Vec<Vec<Child>> = Vec::new();
    for root in roots {
        let alts = all_reduced(chart, grammar, input_len, root, keep_all_tokens, maybe_placeholders, &mut child_memo, &mut reduced_memo);
        candidates.extend(alts.iter().cloned());
    }

    let mut distinct: Vec<Vec<Child>> = Vec::new();
    for c in candidates {
        if !distinct.contains(&c) {
            distinct.push(c);
        }
    }

    if distinct.len() == 1 {
        return Ok(children_to_root(start_symbol, distinct.into_iter().next().unwrap()));
    }

    let alt_trees: Vec<Child> = distinct.into_iter().map(|children| Child::Tree(children_to_root(start_symbol, children))).collect();
    let meta = Tree::span_from_children(&alt_trees);
    Ok(Tree::new(Rc::from(AMBIG_NODE_NAME), alt_trees, meta))
}

fn all_item_children(
    chart: &Chart,
    grammar: &Grammar,
    column: usize,
    item: EItem,
    keep_all_tokens: bool,
    maybe_placeholders: bool,
    child_memo: &mut HashMap<(usize, EItem), Rc<Vec<Vec<Child>>>>,
    reduced_memo: &mut HashMap<(usize, EItem), Rc<Vec<Vec<Child>>>>,
) -> Rc<Vec<Vec<Child>>> {
    if item.dot == 0 {
        return Rc::new(vec![Vec::new()]);
    }
    if let Some(v) = child_memo.get(&(column, item)) {
        return v.clone();
    }
    let edges = chart.edges.get(&(column, item)).cloned().unwrap_or_default();
    let mut results = Vec::new();
    for edge in &edges {
        let prefixes = all_item_children(chart, grammar, edge.pred_column, edge.pred, keep_all_tokens, maybe_placeholders, child_memo, reduced_memo);
        match &edge.cause {
            Cause::Token(tok) => {
                for prefix in prefixes.iter() {
                    let mut p = prefix.clone();
                    p.push(Child::Token(tok.clone()));
                    results.push(p);
                }
            }
            Cause::Sub { item: sub, .. } => {
                let sub_alts = all_reduced(chart, grammar, column, *sub, keep_all_tokens, maybe_placeholders, child_memo, reduced_memo);
                for prefix in prefixes.iter() {
                    for sub_children in sub_alts.iter() {
                        let mut p = prefix.clone();
                        p.extend(sub_children.iter().cloned());
                        results.push(p);
                    }
                }
            }
        }
    }
    let rc = Rc::new(results);
    child_memo.insert((column, item), rc.clone());
    rc
}

fn all_reduced(
    chart: &Chart,
    grammar: &Grammar,
    column: usize,
    item: EItem,
    keep_all_tokens: bool,
    maybe_placeholders: bool,
    child_memo: &mut HashMap<(usize, EItem), Rc<Vec<Vec<Child>>>>,
    reduced_memo: &mut HashMap<(usize, EItem), Rc<Vec<Vec<Child>>>>,
) -> Rc<Vec<Vec<Child>>> {
    if let Some(v) = reduced_memo.get(&(column, item)) {
        return v.clone();
    }
    let raw = all_item_children(chart, grammar, column, item, keep_all_tokens, maybe_placeholders, child_memo, reduced_memo);
    let build_rule = build_rule_of(grammar, item, keep_all_tokens);
    let placeholder = maybe_placeholders && grammar.rules[item.rule].optional_epsilon;
    let reduced: Vec<Vec<Child>> = raw
        .iter()
        .map(|children| {
            let mut children = children.clone();
            if placeholder {
                children.push(maybe_placeholder());
            }
            reduce_children(build_rule, children)
        })
        .collect();
    let rc = Rc::new(reduced);
    reduced_memo.insert((column, item), rc.clone());
    rc
}

fn children_to_root(start_symbol: &str, mut children: Vec<Child>) -> Tree {
    if children.len() == 1 {
        match children.pop().unwrap() {
            Child::Tree(t) => return t,
            Child::Token(t) => {
                let meta = t.span;
                return Tree::new(Rc::from(start_symbol), vec![Child::Token(t)], meta);
            }
        }
    }
    let meta = Tree::span_from_children(&children);
    Tree::new(Rc::from(start_symbol), children, meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::earley::chart::{recognize, ScanSource};
    use crate::grammar::model::{Rule, Symbol, Terminal, TerminalPattern};
    use crate::position::Span;
    use crate::tree::Token;
    use std::collections::BTreeSet;

    fn terminal(name: &str, text: &str) -> Terminal {
        Terminal { name: Rc::from(name), pattern: TerminalPattern::Literal { text: text.into(), case_insensitive: false }, priority: 0, ignored: false, keep: true, order: 0 }
    }
    fn rule(name: &str, symbols: Vec<Symbol>, priority: i32, order: usize) -> Rule {
        Rule { name: Rc::from(name), symbols, alias: None, keep_all_tokens: false, filter_out: false, inline_if_single: false, optional_epsilon: false, priority, order }
    }
    fn tok(name: &str, value: &str, start: usize, end: usize) -> Token {
        Token::new(Rc::from(name), value.to_string(), Span { start_pos: start, end_pos: end, ..Default::default() }, true)
    }

    struct FixedSource {
        script: HashMap<usize, Vec<(usize, Token)>>,
    }
    impl ScanSource for FixedSource {
        fn candidates(&mut self, pos: usize, _legal: &BTreeSet<Rc<str>>) -> Vec<(usize, Token)> {
            self.script.get(&pos).cloned().unwrap_or_default()
        }
    }

    #[test]
    fn explicit_mode_wraps_genuine_ambiguity() {
        // start: a a | b ; a: "x" ; b: "xx"  over input "xx"
        let g = Grammar::build(
            vec![terminal("X", "x"), terminal("XX", "xx")],
            vec![
                rule("start", vec![Symbol::Rule(Rc::from("a")), Symbol::Rule(Rc::from("a"))], 0, 0),
                rule("start", vec![Symbol::Rule(Rc::from("b"))], 0, 1),
                rule("a", vec![Symbol::Terminal(Rc::from("X"))], 0, 2),
                rule("b", vec![Symbol::Terminal(Rc::from("XX"))], 0, 3),
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
        let tree = explicit(&chart, &g, "start", 2, false, false).unwrap();
        assert_eq!(&*tree.data, AMBIG_NODE_NAME);
        assert_eq!(tree.children.len(), 2);
    }

    #[test]
    fn resolve_mode_picks_higher_priority_alternative() {
        let g = Grammar::build(
            vec![terminal("X", "x"), terminal("XX", "xx")],
            vec![
                rule("start", vec![Symbol::Rule(Rc::from("a")), Symbol::Rule(Rc::from("a"))], 0, 0),
                rule("start", vec![Symbol::Rule(Rc::from("b"))], 5, 1),
                rule("a", vec![Symbol::Terminal(Rc::from("X"))], 0, 2),
                rule("b", vec![Symbol::Terminal(Rc::from("XX"))], 0, 3),
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
        let tree = resolve(&chart, &g, "start", 2, false, false).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert_eq!(&*tree.children[0].as_tree().unwrap().data, "b");
    }
}
