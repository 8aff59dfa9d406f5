//! FIRST-set and nullability computation over the lowered grammar (spec
//! §4.5 C6), the fixed-point machinery the canonical item-set builder in
//! [`super::tables`] leans on for every closure step.
//!
//! Grounded on `other_examples/.../pwil3058-rs_lalr1_parsers` grammar
//! analyzer's `firsts_data`/closure terminology, adapted from that
//! generator's own bootstrapped grammar representation to this crate's
//! `Symbol`/`Grammar` model.
use crate::grammar::model::{Grammar, Symbol};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Pseudo-terminal standing for end-of-input in lookahead computations.
/// Starts with `$`, which the grammar lexer never produces for a real
/// terminal name, so it can never collide.
pub const END: &str = "$END";

pub struct SymbolSets {
    pub nullable: HashSet<Rc<str>>,
    pub first: HashMap<Rc<str>, HashSet<Rc<str>>>,
}

pub fn compute(grammar: &Grammar) -> SymbolSets {
    let nullable = compute_nullable(grammar);
    let first = compute_first(grammar, &nullable);
    SymbolSets { nullable, first }
}

fn compute_nullable(grammar: &Grammar) -> HashSet<Rc<str>> {
    let mut nullable = HashSet::new();
    let mut changed = true;
    while changed {
        changed = false;
        for name in grammar.non_terminals() {
            if nullable.contains(name) {
                continue;
            }
            let is_nullable = grammar
                .productions(name)
                .any(|r| r.symbols.iter().all(|s| matches!(s, Symbol::Rule(n) if nullable.contains(n))));
            if is_nullable {
                nullable.insert(Rc::from(name));
                changed = true;
            }
        }
    }
    nullable
}

fn compute_first(grammar: &Grammar, nullable: &HashSet<Rc<str>>) -> HashMap<Rc<str>, HashSet<Rc<str>>> {
    let mut first: HashMap<Rc<str>, HashSet<Rc<str>>> = HashMap::new();
    for t in &grammar.terminals {
        let mut s = HashSet::new();
        s.insert(t.name.clone());
        first.insert(t.name.clone(), s);
    }
    for name in grammar.non_terminals() {
        first.entry(Rc::from(name)).or_default();
    }
    let mut changed = true;
    while changed {
        changed = false;
        for name in grammar.non_terminals() {
            for rule in grammar.productions(name) {
                let mut all_nullable_so_far = true;
                for sym in &rule.symbols {
                    if !all_nullable_so_far {
                        break;
                    }
                    let sym_first: Vec<Rc<str>> = first.get(sym.name()).map(|s| s.iter().cloned().collect()).unwrap_or_default();
                    let target = first.get_mut(name).unwrap();
                    for f in sym_first {
                        if target.insert(f) {
                            changed = true;
                        }
                    }
                    all_nullable_so_far = match sym {
                        Symbol::Rule(n) => nullable.contains(n),
                        Symbol::Terminal(_) => false,
                    };
                }
            }
        }
    }
    first
}

/// FIRST of a symbol sequence followed by a known lookahead terminal
/// (the `FIRST(βa)` computation LR(1)/LALR(1) closure needs).
pub fn first_of_sequence(symbols: &[Symbol], lookahead: &Rc<str>, sets: &SymbolSets) -> HashSet<Rc<str>> {
    let mut out = HashSet::new();
    let mut all_nullable = true;
    for sym in symbols {
        if let Some(f) = sets.first.get(sym.name()) {
            out.extend(f.iter().cloned());
        }
        let sym_nullable = match sym {
            Symbol::Rule(n) => sets.nullable.contains(n),
            Symbol::Terminal(_) => false,
        };
        if !sym_nullable {
            all_nullable = false;
            break;
        }
    }
    if all_nullable {
        out.insert(lookahead.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::model::{Rule, Terminal, TerminalPattern};

    fn small_grammar() -> Grammar {
        // expr: term | expr "+" term
        // term: "x"
        let terminals = vec![
            Terminal { name: Rc::from("PLUS"), pattern: TerminalPattern::Literal { text: "+".into(), case_insensitive: false }, priority: 0, ignored: false, keep: false, order: 0 },
            Terminal { name: Rc::from("X"), pattern: TerminalPattern::Literal { text: "x".into(), case_insensitive: false }, priority: 0, ignored: false, keep: true, order: 1 },
        ];
        let rules = vec![
            Rule { name: Rc::from("expr"), symbols: vec![Symbol::Rule(Rc::from("term"))], alias: None, keep_all_tokens: false, filter_out: false, inline_if_single: false, optional_epsilon: false, priority: 0, order: 0 },
            Rule { name: Rc::from("expr"), symbols: vec![Symbol::Rule(Rc::from("expr")), Symbol::Terminal(Rc::from("PLUS")), Symbol::Rule(Rc::from("term"))], alias: None, keep_all_tokens: false, filter_out: false, inline_if_single: false, optional_epsilon: false, priority: 0, order: 1 },
            Rule { name: Rc::from("term"), symbols: vec![Symbol::Terminal(Rc::from("X"))], alias: None, keep_all_tokens: false, filter_out: false, inline_if_single: false, optional_epsilon: false, priority: 0, order: 2 },
        ];
        Grammar::build(terminals, rules, vec![Rc::from("expr")])
    }

    #[test]
    fn first_of_left_recursive_rule_is_its_base_case() {
        let g = small_grammar();
        let sets = compute(&g);
        let expr_first = sets.first.get("expr").unwrap();
        assert_eq!(expr_first.len(), 1);
        assert!(expr_first.contains("X"));
    }

    #[test]
    fn nothing_is_nullable_here() {
        let g = small_grammar();
        let sets = compute(&g);
        assert!(sets.nullable.is_empty());
    }
}
