//! Contextual lexer (spec §4.4, §8 property 3): for the LALR engine
//! only, narrows the candidate terminal set to those legal in the
//! driver's current state, resolving lexical ambiguity that depends on
//! syntactic context (e.g. a keyword that is also a valid identifier).
//!
//! Grounded on `creative-forest-lang-pt/src/tokenization.rs`
//! `CombinedTokenizer`'s state-indexed analyzer selection
//! (`add_state`/`analyzers` binary search): there, the *next lexeme set*
//! is chosen by an explicit tokenizer state pushed by a preceding match;
//! here the LALR driver plays that role, supplying the legal set itself
//! each time it asks for a token instead of it being self-reported by the
//! previous lexeme.
use super::basic::{snippet, span_of};
use super::regexc::TerminalCompiler;
use crate::error::{Error, UnexpectedCharacters, UnexpectedToken};
use crate::position::Code;
use crate::tree::Token;
use std::collections::BTreeSet;
use std::rc::Rc;

pub struct ContextualLexer<'g> {
    compiler: &'g TerminalCompiler,
}

impl<'g> ContextualLexer<'g> {
    pub fn new(compiler: &'g TerminalCompiler) -> Self {
        Self { compiler }
    }

    /// Advances `pointer` past any `%ignore`d run, then returns the next
    /// token whose type is in `legal`. `Ok(None)` means input is
    /// exhausted. A match outside `legal` is reported as `UnexpectedToken`
    /// (the lexer found something, just not something this state
    /// accepts); no match at all is `UnexpectedCharacters`.
    pub fn next_token(&self, code: &Code, pointer: &mut usize, legal: &BTreeSet<Rc<str>>) -> Result<Option<Token>, Error> {
        loop {
            let len = code.len();
            if *pointer >= len {
                return Ok(None);
            }
            let text = code.as_str(*pointer, len);
            let ignored = self.compiler.terminals.iter().filter(|t| t.ignored && !t.is_external());
            if let Some((_, ignored_len)) = self.compiler.longest_match(ignored, text) {
                *pointer += ignored_len;
                continue;
            }

            let legal_candidates = self.compiler.terminals.iter().filter(|t| !t.ignored && !t.is_external() && legal.contains(&t.name));
            if let Some((term, matched_len)) = self.compiler.longest_match(legal_candidates, text) {
                let start = *pointer;
                let end = start + matched_len;
                *pointer = end;
                return Ok(Some(Token {
                    ttype: term.name.clone(),
                    value: code.as_str(start, end).to_string(),
                    span: span_of(code, start, end),
                    keep: term.keep,
                }));
            }

            let any_candidates = self.compiler.terminals.iter().filter(|t| !t.ignored && !t.is_external());
            return match self.compiler.longest_match(any_candidates, text) {
                Some((term, matched_len)) => {
                    let start = *pointer;
                    let end = start + matched_len;
                    Err(Error::UnexpectedToken(UnexpectedToken {
                        token_type: term.name.to_string(),
                        value: code.as_str(start, end).to_string(),
                        pointer: start,
                        position: code.obtain_position(start),
                        expected: legal.iter().map(|n| self.compiler.display_name(n)).collect(),
                    }))
                }
                None => Err(Error::UnexpectedCharacters(UnexpectedCharacters {
                    pointer: *pointer,
                    position: code.obtain_position(*pointer),
                    context: snippet(text),
                })),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::model::{Grammar, Rule, Symbol, Terminal, TerminalPattern};
    use std::collections::BTreeSet;

    fn grammar() -> Grammar {
        Grammar::build(
            vec![
                Terminal { name: Rc::from("IF"), pattern: TerminalPattern::Literal { text: "if".into(), case_insensitive: false }, priority: 0, ignored: false, keep: true, order: 0 },
                Terminal { name: Rc::from("NAME"), pattern: TerminalPattern::Regex("[a-z]+".into()), priority: 0, ignored: false, keep: true, order: 1 },
            ],
            vec![Rule { name: Rc::from("start"), symbols: vec![Symbol::Terminal(Rc::from("NAME"))], alias: None, keep_all_tokens: false, filter_out: false, inline_if_single: false, optional_epsilon: false, priority: 0, order: 0 }],
            vec![Rc::from("start")],
        )
    }

    #[test]
    fn restricts_to_legal_terminals() {
        let g = grammar();
        let tc = TerminalCompiler::compile(&g).unwrap();
        let lexer = ContextualLexer::new(&tc);
        let mut legal = BTreeSet::new();
        legal.insert(Rc::from("NAME"));
        let mut ptr = 0;
        let code = Code::new(b"if");
        let tok = lexer.next_token(&code, &mut ptr, &legal).unwrap().unwrap();
        assert_eq!(tok.ttype.as_ref(), "NAME");
    }

    #[test]
    fn match_outside_legal_set_is_unexpected_token() {
        let g = grammar();
        let tc = TerminalCompiler::compile(&g).unwrap();
        let lexer = ContextualLexer::new(&tc);
        let legal: BTreeSet<Rc<str>> = BTreeSet::new();
        let mut ptr = 0;
        let code = Code::new(b"if");
        let err = lexer.next_token(&code, &mut ptr, &legal).unwrap_err();
        assert!(matches!(err, Error::UnexpectedToken(_)));
    }
}
