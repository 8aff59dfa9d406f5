//! Canonical item sets and LALR(1) action/goto tables (spec §4.5 C6).
//!
//! Builds the canonical collection of LR(1) item sets (closure + goto),
//! then merges states sharing an LR(0) core into single LALR(1) states by
//! unioning their lookaheads -- the textbook "canonical-LR(1)-then-merge"
//! construction, chosen over DeRemer-Pennello's incremental
//! lookahead-propagation graph because it is far simpler to get right by
//! hand; both produce identical LALR(1) tables, see DESIGN.md.
use super::sets::{compute, first_of_sequence, SymbolSets, END};
use crate::error::GrammarError;
use crate::grammar::model::{Grammar, Symbol};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemRule {
    /// The synthetic `__start -> <start symbol>` production.
    Start,
    Rule(usize),
}

type Lr1Item = (ItemRule, usize, Rc<str>);
type Lr1State = BTreeSet<Lr1Item>;
type Core = Vec<(ItemRule, usize)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shift(usize),
    Reduce(usize),
    Accept,
}

#[derive(Debug, Default)]
pub struct LalrState {
    pub actions: HashMap<Rc<str>, Action>,
    pub gotos: HashMap<Rc<str>, usize>,
}

pub struct LalrTables {
    pub states: Vec<LalrState>,
    pub start_state: usize,
    pub start_symbol: Rc<str>,
}

impl LalrTables {
    /// Terminal names with an action in `state`, for the contextual
    /// lexer (spec §4.4 "Contextual lexer").
    pub fn legal_terminals(&self, state: usize) -> BTreeSet<Rc<str>> {
        self.states[state].actions.keys().cloned().collect()
    }
}

pub fn build(grammar: &Grammar, start_symbol: &str) -> Result<LalrTables, GrammarError> {
    if !grammar.is_rule(start_symbol) {
        return Err(GrammarError::new(format!("start symbol {:?} is not a defined rule", start_symbol)));
    }
    let sets = compute(grammar);
    let end: Rc<str> = Rc::from(END);
    let start_item: Lr1Item = (ItemRule::Start, 0, end.clone());
    let initial = closure(std::iter::once(start_item).collect(), grammar, &sets, start_symbol);

    let mut states: Vec<Lr1State> = vec![initial.clone()];
    let mut index_of: HashMap<Lr1State, usize> = HashMap::new();
    index_of.insert(initial, 0);
    let mut transitions: Vec<HashMap<Symbol, usize>> = vec![HashMap::new()];

    let mut worklist = vec![0usize];
    while let Some(state_idx) = worklist.pop() {
        let symbols = outgoing_symbols(&states[state_idx], grammar, start_symbol);
        for sym in symbols {
            let target = goto(&states[state_idx], &sym, grammar, &sets, start_symbol);
            if target.is_empty() {
                continue;
            }
            let target_idx = match index_of.get(&target) {
                Some(&i) => i,
                None => {
                    let i = states.len();
                    index_of.insert(target.clone(), i);
                    states.push(target);
                    transitions.push(HashMap::new());
                    worklist.push(i);
                    i
                }
            };
            transitions[state_idx].insert(sym, target_idx);
        }
    }

    merge_by_core(grammar, start_symbol, states, transitions, end)
}

fn item_symbol(item: &(ItemRule, usize), grammar: &Grammar, start_symbol: &str) -> Option<Symbol> {
    let (rule, dot) = *item;
    match rule {
        ItemRule::Start => {
            if dot == 0 {
                Some(Symbol::Rule(Rc::from(start_symbol)))
            } else {
                None
            }
        }
        ItemRule::Rule(r) => grammar.rules[r].symbols.get(dot).cloned(),
    }
}

fn outgoing_symbols(state: &Lr1State, grammar: &Grammar, start_symbol: &str) -> HashSet<Symbol> {
    state.iter().filter_map(|(r, d, _)| item_symbol(&(*r, *d), grammar, start_symbol)).collect()
}

fn closure(mut items: Lr1State, grammar: &Grammar, sets: &SymbolSets, start_symbol: &str) -> Lr1State {
    let mut changed = true;
    while changed {
        changed = false;
        let snapshot: Vec<Lr1Item> = items.iter().cloned().collect();
        for (rule, dot, lookahead) in snapshot {
            let sym = item_symbol(&(rule, dot), grammar, start_symbol);
            let nt = match &sym {
                Some(Symbol::Rule(n)) => n.clone(),
                _ => continue,
            };
            let rest: Vec<Symbol> = match rule {
                ItemRule::Start => Vec::new(),
                ItemRule::Rule(r) => grammar.rules[r].symbols[dot + 1..].to_vec(),
            };
            let lookaheads = first_of_sequence(&rest, &lookahead, sets);
            for rule_idx in rule_indices_for(grammar, &nt) {
                for la in &lookaheads {
                    if items.insert((ItemRule::Rule(rule_idx), 0, la.clone())) {
                        changed = true;
                    }
                }
            }
        }
    }
    items
}

fn rule_indices_for<'a>(grammar: &'a Grammar, name: &'a str) -> impl Iterator<Item = usize> + 'a {
    grammar.rules.iter().enumerate().filter(move |(_, r)| r.name.as_ref() == name).map(|(i, _)| i)
}

fn goto(state: &Lr1State, sym: &Symbol, grammar: &Grammar, sets: &SymbolSets, start_symbol: &str) -> Lr1State {
    let mut moved = BTreeSet::new();
    for (rule, dot, lookahead) in state {
        if item_symbol(&(*rule, *dot), grammar, start_symbol).as_ref() == Some(sym) {
            moved.insert((*rule, dot + 1, lookahead.clone()));
        }
    }
    if moved.is_empty() {
        moved
    } else {
        closure(moved, grammar, sets, start_symbol)
    }
}

fn core_of(state: &Lr1State) -> Core {
    let mut core: Vec<(ItemRule, usize)> = state.iter().map(|(r, d, _)| (*r, *d)).collect();
    core.sort();
    core.dedup();
    core
}

fn merge_by_core(
    grammar: &Grammar,
    start_symbol: &str,
    states: Vec<Lr1State>,
    transitions: Vec<HashMap<Symbol, usize>>,
    end: Rc<str>,
) -> Result<LalrTables, GrammarError> {
    let cores: Vec<Core> = states.iter().map(core_of).collect();
    let mut rep_of_core: HashMap<Core, usize> = HashMap::new();
    let mut rep: Vec<usize> = Vec::with_capacity(states.len());
    for (i, core) in cores.iter().enumerate() {
        let r = *rep_of_core.entry(core.clone()).or_insert(i);
        rep.push(r);
    }

    // lookaheads merged per representative state, keyed by (rule, dot)
    let mut merged: HashMap<usize, HashMap<(ItemRule, usize), HashSet<Rc<str>>>> = HashMap::new();
    for (i, state) in states.iter().enumerate() {
        let r = rep[i];
        let entry = merged.entry(r).or_default();
        for (rule, dot, la) in state {
            entry.entry((*rule, *dot)).or_default().insert(la.clone());
        }
    }

    let mut merged_transitions: HashMap<usize, HashMap<Symbol, usize>> = HashMap::new();
    for (i, trans) in transitions.iter().enumerate() {
        let r = rep[i];
        let entry = merged_transitions.entry(r).or_default();
        for (sym, target) in trans {
            entry.insert(sym.clone(), rep[*target]);
        }
    }

    // renumber representatives into a dense 0..k state space
    let mut reps: Vec<usize> = rep_of_core.values().cloned().collect();
    reps.sort();
    let dense: HashMap<usize, usize> = reps.iter().enumerate().map(|(d, &r)| (r, d)).collect();

    let mut lalr_states: Vec<LalrState> = (0..reps.len()).map(|_| LalrState::default()).collect();
    for &r in &reps {
        let d = dense[&r];
        if let Some(trans) = merged_transitions.get(&r) {
            for (sym, target) in trans {
                let target_d = dense[target];
                match sym {
                    Symbol::Terminal(name) => {
                        set_action(&mut lalr_states[d], name.clone(), Action::Shift(target_d), grammar)?;
                    }
                    Symbol::Rule(name) => {
                        lalr_states[d].gotos.insert(name.clone(), target_d);
                    }
                }
            }
        }
        if let Some(items) = merged.get(&r) {
            for (&(rule, dot), lookaheads) in items {
                let is_complete = match rule {
                    ItemRule::Start => dot == 1,
                    ItemRule::Rule(ri) => dot == grammar.rules[ri].symbols.len(),
                };
                if !is_complete {
                    continue;
                }
                for la in lookaheads {
                    let action = match rule {
                        ItemRule::Start => Action::Accept,
                        ItemRule::Rule(ri) => Action::Reduce(ri),
                    };
                    set_action(&mut lalr_states[d], la.clone(), action, grammar)?;
                }
            }
        }
    }

    let start_rep = rep[0];
    let start_state = dense[&start_rep];
    Ok(LalrTables { states: lalr_states, start_state, start_symbol: Rc::from(start_symbol) })
}

fn set_action(state: &mut LalrState, terminal: Rc<str>, action: Action, grammar: &Grammar) -> Result<(), GrammarError> {
    match state.actions.get(&terminal).copied() {
        None => {
            state.actions.insert(terminal, action);
            Ok(())
        }
        Some(existing) => {
            let resolved = resolve_conflict(existing, action, grammar, &terminal)?;
            state.actions.insert(terminal, resolved);
            Ok(())
        }
    }
}

fn rule_priority(rule: usize, grammar: &Grammar) -> i32 {
    grammar.rules[rule].priority
}

fn resolve_conflict(a: Action, b: Action, grammar: &Grammar, terminal: &str) -> Result<Action, GrammarError> {
    match (a, b) {
        (Action::Reduce(r1), Action::Reduce(r2)) if r1 != r2 => Err(GrammarError::new(format!(
            "reduce/reduce conflict on terminal {:?} between rules {:?} and {:?}",
            terminal, grammar.rules[r1].name, grammar.rules[r2].name
        ))),
        (Action::Reduce(_), Action::Reduce(_)) => Ok(a),
        (Action::Shift(_), Action::Reduce(r)) | (Action::Reduce(r), Action::Shift(_)) => {
            let shift = if matches!(a, Action::Shift(_)) { a } else { b };
            let reduce_priority = rule_priority(r, grammar);
            let shift_priority = 0; // shifting a terminal carries no rule priority of its own
            if reduce_priority > shift_priority {
                Ok(Action::Reduce(r))
            } else if shift_priority > reduce_priority {
                Ok(shift)
            } else {
                Err(GrammarError::new(format!(
                    "shift/reduce conflict on terminal {:?} involving rule {:?}; annotate one side with an explicit priority to resolve it",
                    terminal, grammar.rules[r].name
                )))
            }
        }
        (Action::Accept, other) | (other, Action::Accept) => Ok(other),
        _ => Ok(a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::model::{Rule, Terminal, TerminalPattern};

    fn terminal(name: &str, text: &str) -> Terminal {
        Terminal { name: Rc::from(name), pattern: TerminalPattern::Literal { text: text.into(), case_insensitive: false }, priority: 0, ignored: false, keep: true, order: 0 }
    }

    #[test]
    fn builds_tables_for_simple_concatenation() {
        let g = Grammar::build(
            vec![terminal("A", "a"), terminal("B", "b")],
            vec![Rule { name: Rc::from("start"), symbols: vec![Symbol::Terminal(Rc::from("A")), Symbol::Terminal(Rc::from("B"))], alias: None, keep_all_tokens: false, filter_out: false, inline_if_single: false, optional_epsilon: false, priority: 0, order: 0 }],
            vec![Rc::from("start")],
        );
        let tables = build(&g, "start").unwrap();
        assert!(tables.states.len() >= 3);
    }

    #[test]
    fn reduce_reduce_conflict_is_a_build_error() {
        let g = Grammar::build(
            vec![terminal("X", "x")],
            vec![
                Rule { name: Rc::from("a"), symbols: vec![Symbol::Terminal(Rc::from("X"))], alias: None, keep_all_tokens: false, filter_out: false, inline_if_single: false, optional_epsilon: false, priority: 0, order: 0 },
                Rule { name: Rc::from("a"), symbols: vec![Symbol::Terminal(Rc::from("X"))], alias: None, keep_all_tokens: false, filter_out: false, inline_if_single: false, optional_epsilon: false, priority: 0, order: 1 },
            ],
            vec![Rc::from("a")],
        );
        assert!(build(&g, "a").is_err());
    }
}
