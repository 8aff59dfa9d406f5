//! LALR(1) shift/reduce driver (spec §4.5 C6, runtime half).
//!
//! Grounded on the teacher's `IProduction::advance_token_ptr` stack-based
//! token consumption (`production/mod.rs`), adapted from the teacher's
//! recursive-descent-over-a-token-pointer style to an explicit
//! state/child stack, since table-driven shift/reduce has no call stack
//! of its own to recurse through.
use super::sets::END;
use super::tables::{Action, LalrTables};
use crate::error::{Error, GrammarError, UnexpectedEOF, UnexpectedToken};
use crate::grammar::model::{Grammar, Terminal};
use crate::lex::{ContextualLexer, TerminalCompiler};
use crate::position::Code;
use crate::tree::{reduce_children, BuildRule, Child, Tree};
use std::collections::BTreeSet;
use std::rc::Rc;

/// Supplies the driver with tokens one at a time, optionally restricted
/// to a legal set (only meaningful for the contextual source; a source
/// over an already-lexed stream ignores it).
pub trait TokenSource {
    fn next(&mut self, legal: &BTreeSet<Rc<str>>) -> Result<Option<crate::tree::Token>, Error>;
}

pub struct VecTokenSource {
    tokens: Vec<crate::tree::Token>,
    pos: usize,
}

impl VecTokenSource {
    pub fn new(tokens: Vec<crate::tree::Token>) -> Self {
        Self { tokens, pos: 0 }
    }
}

impl TokenSource for VecTokenSource {
    fn next(&mut self, _legal: &BTreeSet<Rc<str>>) -> Result<Option<crate::tree::Token>, Error> {
        if self.pos < self.tokens.len() {
            let t = self.tokens[self.pos].clone();
            self.pos += 1;
            Ok(Some(t))
        } else {
            Ok(None)
        }
    }
}

pub struct ContextualTokenSource<'g, 'c> {
    lexer: ContextualLexer<'g>,
    code: Code<'c>,
    pointer: usize,
}

impl<'g, 'c> ContextualTokenSource<'g, 'c> {
    pub fn new(compiler: &'g TerminalCompiler, code: Code<'c>) -> Self {
        Self { lexer: ContextualLexer::new(compiler), code, pointer: 0 }
    }
}

impl<'g, 'c> TokenSource for ContextualTokenSource<'g, 'c> {
    fn next(&mut self, legal: &BTreeSet<Rc<str>>) -> Result<Option<crate::tree::Token>, Error> {
        self.lexer.next_token(&self.code, &mut self.pointer, legal)
    }
}

pub struct LalrDriver<'g> {
    grammar: &'g Grammar,
    tables: &'g LalrTables,
}

impl<'g> LalrDriver<'g> {
    pub fn new(grammar: &'g Grammar, tables: &'g LalrTables) -> Self {
        Self { grammar, tables }
    }

    fn describe_legal(&self, legal: &BTreeSet<Rc<str>>) -> BTreeSet<String> {
        legal.iter().map(|n| self.grammar.terminal(n).map(Terminal::display_name).unwrap_or_else(|| n.to_string())).collect()
    }

    pub fn parse(&self, source: &mut dyn TokenSource, keep_all_tokens: bool, maybe_placeholders: bool) -> Result<Tree, Error> {
        self.parse_with_recovery(source, keep_all_tokens, maybe_placeholders, None)
    }

    /// Like [`parse`](Self::parse), but on an `UnexpectedToken` consults
    /// `on_error` once; if it returns `true`, parsing resynchronizes by
    /// discarding tokens until one is legal in the current state (or the
    /// source is exhausted) and resumes from there (spec §6 `on_error`).
    /// `UnexpectedEOF` is never recoverable: there is nothing left to
    /// skip past.
    pub fn parse_with_recovery(
        &self,
        source: &mut dyn TokenSource,
        keep_all_tokens: bool,
        maybe_placeholders: bool,
        on_error: Option<&dyn Fn() -> bool>,
    ) -> Result<Tree, Error> {
        let mut state_stack: Vec<usize> = vec![self.tables.start_state];
        let mut child_stack: Vec<Vec<Child>> = Vec::new();
        let mut pending: Option<crate::tree::Token> = None;
        let end: Rc<str> = Rc::from(END);

        loop {
            let current_state = *state_stack.last().expect("state stack never empties before accept");
            let legal = self.tables.legal_terminals(current_state);
            if pending.is_none() {
                pending = source.next(&legal)?;
            }
            let lookahead: Rc<str> = pending.as_ref().map(|t| t.ttype.clone()).unwrap_or_else(|| end.clone());
            let action = self.tables.states[current_state].actions.get(&lookahead).copied();

            match action {
                Some(Action::Shift(next)) => {
                    let tok = pending.take().expect("shift requires a real token");
                    child_stack.push(vec![Child::Token(tok)]);
                    state_stack.push(next);
                }
                Some(Action::Reduce(rule_idx)) => {
                    let rule = &self.grammar.rules[rule_idx];
                    let arity = rule.symbols.len();
                    let mut popped: Vec<Vec<Child>> = Vec::with_capacity(arity);
                    for _ in 0..arity {
                        state_stack.pop();
                        popped.push(child_stack.pop().expect("stack underflow during reduce"));
                    }
                    popped.reverse();
                    let mut children: Vec<Child> = popped.into_iter().flatten().collect();
                    if maybe_placeholders && rule.optional_epsilon {
                        children.push(crate::tree::maybe_placeholder());
                    }
                    let build_rule = BuildRule {
                        lhs: &rule.name,
                        alias: rule.alias.as_deref(),
                        filter_out: rule.filter_out,
                        inline_if_single: rule.inline_if_single,
                        keep_all_tokens: keep_all_tokens || rule.keep_all_tokens,
                    };
                    let reduced = reduce_children(build_rule, children);
                    child_stack.push(reduced);

                    let goto_state = *state_stack.last().expect("state stack never empties mid-reduce");
                    let next = self.tables.states[goto_state].gotos.get(&rule.name).copied().ok_or_else(|| {
                        Error::Grammar(GrammarError::new(format!(
                            "no goto entry for {:?} from state {}",
                            rule.name, goto_state
                        )))
                    })?;
                    state_stack.push(next);
                }
                Some(Action::Accept) => {
                    let top = child_stack.pop().unwrap_or_default();
                    return Ok(children_to_root(&self.tables.start_symbol, top));
                }
                None => {
                    let bad_token = match pending.take() {
                        Some(tok) => tok,
                        None => {
                            return Err(Error::UnexpectedEOF(UnexpectedEOF { expected: self.describe_legal(&legal) }));
                        }
                    };
                    if let Some(cb) = on_error {
                        if cb() {
                            loop {
                                pending = source.next(&legal)?;
                                match &pending {
                                    Some(tok) if legal.contains(&tok.ttype) => break,
                                    Some(_) => continue,
                                    None => break,
                                }
                            }
                            continue;
                        }
                    }
                    return Err(Error::UnexpectedToken(UnexpectedToken {
                        token_type: bad_token.ttype.to_string(),
                        value: bad_token.value,
                        pointer: bad_token.span.start_pos,
                        position: bad_token.span.start,
                        expected: self.describe_legal(&legal),
                    }));
                }
            }
        }
    }
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
