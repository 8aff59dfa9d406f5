//! Earley parsing engine (spec §4.6 C7/C11): chart construction plus SPPF
//! materialisation, mirroring how [`crate::lalr::LalrEngine`] is the
//! single front door over its own pipeline stages.
pub mod chart;
pub mod forest;

pub use chart::{Cause, Chart, EItem, Edge, RuleIdx, ScanSource};
pub use forest::AmbiguityMode;

use crate::error::Error;
use crate::grammar::model::Grammar;
use crate::lex::{BasicLexer, DynamicLexer, DynamicMode, TerminalCompiler};
use crate::position::{Code, Span};
use crate::tree::{Token, Tree};
use std::collections::BTreeSet;
use std::rc::Rc;

fn span_of(code: &Code, start: usize, end: usize) -> Span {
    Span { start_pos: start, end_pos: end, start: code.obtain_position(start), end: code.obtain_position(end) }
}

/// `ScanSource` over a whole-input pre-tokenized stream (`lexer =
/// "basic"`): at most one candidate per start position, the same
/// determinism the LALR driver's `VecTokenSource` assumes.
pub struct BasicScanSource {
    tokens: Vec<Token>,
}

impl BasicScanSource {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }
}

impl ScanSource for BasicScanSource {
    fn candidates(&mut self, pos: usize, legal: &BTreeSet<Rc<str>>) -> Vec<(usize, Token)> {
        self.tokens
            .iter()
            .filter(|t| t.span.start_pos == pos && legal.contains(&t.ttype))
            .map(|t| (t.span.end_pos, t.clone()))
            .collect()
    }
}

/// `ScanSource` over the dynamic lexer (`lexer = "dynamic"` /
/// `"dynamic_complete"`): every terminal viable at a position, after
/// skipping any `%ignore`d run, restricted to what the chart currently
/// finds legal.
pub struct DynamicScanSource<'g, 'c> {
    grammar: &'g Grammar,
    lexer: DynamicLexer<'g>,
    code: Code<'c>,
    mode: DynamicMode,
}

impl<'g, 'c> DynamicScanSource<'g, 'c> {
    pub fn new(grammar: &'g Grammar, compiler: &'g TerminalCompiler, code: Code<'c>, mode: DynamicMode) -> Self {
        Self { grammar, lexer: DynamicLexer::new(compiler), code, mode }
    }
}

impl<'g, 'c> ScanSource for DynamicScanSource<'g, 'c> {
    fn candidates(&mut self, pos: usize, legal: &BTreeSet<Rc<str>>) -> Vec<(usize, Token)> {
        let start = self.lexer.skip_ignored(&self.code, pos);
        self.lexer
            .scan_at(&self.code, start, self.mode)
            .into_iter()
            .filter(|(name, _)| legal.contains(name))
            .map(|(name, len)| {
                let end = start + len;
                let keep = self.grammar.terminal(&name).map(|t| t.keep).unwrap_or(true);
                let value = self.code.as_str(start, end).to_string();
                (end, Token::new(name, value, span_of(&self.code, start, end), keep))
            })
            .collect()
    }
}

/// A compiled grammar ready to drive the Earley recognizer plus forest
/// materialiser for one start symbol.
pub struct EarleyEngine<'g> {
    grammar: &'g Grammar,
    start_symbol: Rc<str>,
}

impl<'g> EarleyEngine<'g> {
    pub fn new(grammar: &'g Grammar, start_symbol: &str) -> Self {
        Self { grammar, start_symbol: Rc::from(start_symbol) }
    }

    /// Tokenizes up front with `compiler`, then recognizes and
    /// materialises (`lexer = "basic"`, spec §4.6).
    pub fn parse_basic(
        &self,
        code: &Code,
        compiler: &TerminalCompiler,
        mode: AmbiguityMode,
        keep_all_tokens: bool,
        maybe_placeholders: bool,
    ) -> Result<Tree, Error> {
        let tokens = BasicLexer::new(compiler).tokenize(code)?;
        let len = code.len();
        let mut source = BasicScanSource::new(tokens);
        let chart = chart::recognize(self.grammar, &self.start_symbol, len, &mut source);
        self.materialize(&chart, len, mode, keep_all_tokens, maybe_placeholders)
    }

    /// Recognizes scannerlessly via the dynamic lexer (`lexer =
    /// "dynamic"`/`"dynamic_complete"`, spec §4.6).
    pub fn parse_dynamic<'c>(
        &self,
        code: Code<'c>,
        compiler: &'g TerminalCompiler,
        dynamic_mode: DynamicMode,
        ambiguity: AmbiguityMode,
        keep_all_tokens: bool,
        maybe_placeholders: bool,
    ) -> Result<Tree, Error> {
        let len = code.len();
        let mut source = DynamicScanSource::new(self.grammar, compiler, code, dynamic_mode);
        let chart = chart::recognize(self.grammar, &self.start_symbol, len, &mut source);
        self.materialize(&chart, len, ambiguity, keep_all_tokens, maybe_placeholders)
    }

    fn materialize(&self, chart: &Chart, input_len: usize, mode: AmbiguityMode, keep_all_tokens: bool, maybe_placeholders: bool) -> Result<Tree, Error> {
        match mode {
            AmbiguityMode::Resolve => forest::resolve(chart, self.grammar, &self.start_symbol, input_len, keep_all_tokens, maybe_placeholders),
            AmbiguityMode::Explicit => forest::explicit(chart, self.grammar, &self.start_symbol, input_len, keep_all_tokens, maybe_placeholders),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{self, NoImports, PriorityMode};

    fn build(src: &str, start: &str) -> (Grammar, TerminalCompiler) {
        let grammar = grammar::compile(src, &NoImports, vec![start.to_string()], PriorityMode::Normal).unwrap();
        let compiler = TerminalCompiler::compile(&grammar).unwrap();
        (grammar, compiler)
    }

    #[test]
    fn parses_a_small_expression_grammar_with_basic_lexer() {
        let src = "start: NUMBER (\"+\" NUMBER)*\nNUMBER: /[0-9]+/\n%ignore \" \"\n";
        let (grammar, compiler) = build(src, "start");
        let engine = EarleyEngine::new(&grammar, "start");
        let code = Code::new(b"1 + 2 + 3");
        let tree = engine.parse_basic(&code, &compiler, AmbiguityMode::Resolve, false, false).unwrap();
        assert_eq!(&*tree.data, "start");
        assert_eq!(tree.children.iter().filter(|c| c.as_token().map(|t| &*t.ttype == "NUMBER").unwrap_or(false)).count(), 3);
    }

    #[test]
    fn parses_with_dynamic_lexer_over_ambiguous_terminals() {
        // `a` and `b` both match the same text; the grammar forces a
        // particular split, exercising scan candidates of different
        // lengths at the same position.
        let src = "start: a a | b\na: \"x\"\nb: \"xx\"\n";
        let (grammar, compiler) = build(src, "start");
        let engine = EarleyEngine::new(&grammar, "start");
        let code = Code::new(b"xx");
        let tree = engine.parse_dynamic(code, &compiler, DynamicMode::Standard, AmbiguityMode::Explicit, false, false).unwrap();
        assert_eq!(&*tree.data, "_ambig");
        assert_eq!(tree.children.len(), 2);
    }

    #[test]
    fn unrecognized_input_is_an_error() {
        let src = "start: \"a\" \"b\"\n";
        let (grammar, compiler) = build(src, "start");
        let engine = EarleyEngine::new(&grammar, "start");
        let code = Code::new(b"ac");
        let err = engine.parse_basic(&code, &compiler, AmbiguityMode::Resolve, false, false).unwrap_err();
        assert!(matches!(err, Error::UnexpectedCharacters(_) | Error::UnexpectedEOF(_) | Error::UnexpectedToken(_)));
    }
}
