//! LALR(1) parsing engine (spec §4.5 C6): table construction plus the
//! runtime shift/reduce driver, mirroring how [`crate::grammar`] is the
//! single front door over its own internal pipeline stages.
pub mod driver;
pub mod sets;
pub mod tables;

pub use driver::{ContextualTokenSource, LalrDriver, TokenSource, VecTokenSource};
pub use tables::{Action, LalrState, LalrTables};

use crate::error::Error;
use crate::grammar::model::Grammar;
use crate::lex::{BasicLexer, TerminalCompiler};
use crate::position::Code;
use crate::tree::Tree;

/// A compiled grammar plus its LALR(1) tables for one start symbol,
/// ready to drive either a pre-tokenized ("basic") or incremental
/// ("contextual") lex source. The single front door [`Parser`](crate::Parser)
/// goes through for `parser = "lalr"`, exactly as [`crate::earley::EarleyEngine`]
/// is for `parser = "earley"`.
pub struct LalrEngine<'g> {
    grammar: &'g Grammar,
    tables: &'g LalrTables,
}

impl<'g> LalrEngine<'g> {
    /// Wraps grammar and tables already built elsewhere (e.g. cached by
    /// `Parser::build` across repeated parses of the same start symbol).
    pub fn new(grammar: &'g Grammar, tables: &'g LalrTables) -> Self {
        Self { grammar, tables }
    }

    pub fn tables(&self) -> &LalrTables {
        self.tables
    }

    /// Tokenizes the whole input up front with `compiler`, then drives it
    /// through the shift/reduce tables (`lexer = "basic"`, spec §4.4).
    pub fn parse_basic(
        &self,
        code: &Code,
        compiler: &TerminalCompiler,
        keep_all_tokens: bool,
        maybe_placeholders: bool,
        on_error: Option<&dyn Fn() -> bool>,
    ) -> Result<Tree, Error> {
        let tokens = BasicLexer::new(compiler).tokenize(code)?;
        let driver = LalrDriver::new(self.grammar, self.tables);
        let mut source = VecTokenSource::new(tokens);
        driver.parse_with_recovery(&mut source, keep_all_tokens, maybe_placeholders, on_error)
    }

    /// Drives tokenization incrementally, asking the contextual lexer for
    /// the next token restricted to whatever is legal in the driver's
    /// current state (`lexer = "contextual"`, spec §4.4).
    pub fn parse_contextual<'c>(
        &self,
        code: Code<'c>,
        compiler: &TerminalCompiler,
        keep_all_tokens: bool,
        maybe_placeholders: bool,
        on_error: Option<&dyn Fn() -> bool>,
    ) -> Result<Tree, Error> {
        let driver = LalrDriver::new(self.grammar, self.tables);
        let mut source = ContextualTokenSource::new(compiler, code);
        driver.parse_with_recovery(&mut source, keep_all_tokens, maybe_placeholders, on_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{self, NoImports, PriorityMode};

    fn build_engine(src: &str, start: &str) -> (Grammar, TerminalCompiler, LalrTables) {
        let grammar = grammar::compile(src, &NoImports, vec![start.to_string()], PriorityMode::Normal).unwrap();
        let compiler = TerminalCompiler::compile(&grammar).unwrap();
        let tables = self::tables::build(&grammar, start).unwrap();
        (grammar, compiler, tables)
    }

    #[test]
    fn parses_a_small_expression_grammar_with_basic_lexer() {
        let src = "start: NUMBER (\"+\" NUMBER)*\nNUMBER: /[0-9]+/\n%ignore \" \"\n";
        let (grammar, compiler, tables) = build_engine(src, "start");
        let engine = LalrEngine::new(&grammar, &tables);
        let code = Code::new(b"1 + 2 + 3");
        let tree = engine.parse_basic(&code, &compiler, false, false, None).unwrap();
        assert_eq!(&*tree.data, "start");
        assert_eq!(tree.children.iter().filter(|c| c.as_token().map(|t| &*t.ttype == "NUMBER").unwrap_or(false)).count(), 3);
    }

    #[test]
    fn parses_with_contextual_lexer() {
        let src = "start: NUMBER (\"+\" NUMBER)*\nNUMBER: /[0-9]+/\n%ignore \" \"\n";
        let (grammar, compiler, tables) = build_engine(src, "start");
        let engine = LalrEngine::new(&grammar, &tables);
        let code = Code::new(b"4 + 5");
        let tree = engine.parse_contextual(code, &compiler, false, false, None).unwrap();
        assert_eq!(&*tree.data, "start");
    }

    #[test]
    fn unexpected_token_reports_expected_set() {
        let src = "start: \"a\" \"b\"\n";
        let (grammar, compiler, tables) = build_engine(src, "start");
        let engine = LalrEngine::new(&grammar, &tables);
        let code = Code::new(b"ac");
        let err = engine.parse_basic(&code, &compiler, false, false, None).unwrap_err();
        assert!(matches!(err, Error::UnexpectedCharacters(_) | Error::UnexpectedToken(_)));
    }
}
