//! Basic lexer (spec §4.4, §8 property 2): tokenizes the whole input
//! ahead of parsing, selecting the longest match at each position with no
//! knowledge of parser state.
//!
//! Grounded on `creative-forest-lang-pt/src/tokenization.rs`
//! (`CombinedTokenizer::tokenize`'s position-advancing loop, EOF
//! handling, and `UnexpectedCharacters`-equivalent failure path).
use super::regexc::TerminalCompiler;
use crate::error::{Error, UnexpectedCharacters};
use crate::position::{Code, Span};
use crate::tree::Token;

pub struct BasicLexer<'g> {
    compiler: &'g TerminalCompiler,
}

impl<'g> BasicLexer<'g> {
    pub fn new(compiler: &'g TerminalCompiler) -> Self {
        Self { compiler }
    }

    pub fn tokenize(&self, code: &Code) -> Result<Vec<Token>, Error> {
        let mut tokens = Vec::new();
        let mut pointer = 0usize;
        let len = code.len();
        while pointer < len {
            let text = code.as_str(pointer, len);
            let candidates = self.compiler.terminals.iter().filter(|t| !t.is_external());
            match self.compiler.longest_match(candidates, text) {
                Some((term, matched_len)) => {
                    let end = pointer + matched_len;
                    if !term.ignored {
                        tokens.push(Token {
                            ttype: term.name.clone(),
                            value: code.as_str(pointer, end).to_string(),
                            span: span_of(code, pointer, end),
                            keep: term.keep,
                        });
                    }
                    pointer = end;
                }
                None => {
                    return Err(Error::UnexpectedCharacters(UnexpectedCharacters {
                        pointer,
                        position: code.obtain_position(pointer),
                        context: snippet(text),
                    }));
                }
            }
        }
        Ok(tokens)
    }
}

pub(super) fn span_of(code: &Code, start: usize, end: usize) -> Span {
    Span { start_pos: start, end_pos: end, start: code.obtain_position(start), end: code.obtain_position(end) }
}

pub(super) fn snippet(text: &str) -> String {
    text.chars().take(20).collect()
}
