//! Public constructor options (spec §6 "Public constructor options").
use crate::earley::AmbiguityMode;
use crate::grammar::PriorityMode;

/// Which engine drives parsing (`parser` option).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserAlgorithm {
    Lalr,
    Earley,
}

/// How tokens are produced (`lexer` option). `Contextual` is LALR-only;
/// `Dynamic`/`DynamicComplete` are Earley-only -- `Parser::build` rejects
/// the mismatched combinations (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerMode {
    Basic,
    Contextual,
    Dynamic,
    DynamicComplete,
}

/// Construction-time knobs for [`crate::Parser`] (spec §6). Built with
/// the same fluent-setter-over-`Default` style as the teacher's own
/// configuration structs rather than a derive-macro builder, since every
/// field here already has an obvious default.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    pub start: Vec<String>,
    pub parser: ParserAlgorithm,
    pub lexer: LexerMode,
    pub ambiguity: AmbiguityMode,
    pub debug: bool,
    pub keep_all_tokens: bool,
    pub propagate_positions: bool,
    pub maybe_placeholders: bool,
    pub priority: PriorityMode,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            start: vec!["start".to_string()],
            parser: ParserAlgorithm::Earley,
            lexer: LexerMode::Basic,
            ambiguity: AmbiguityMode::Resolve,
            debug: false,
            keep_all_tokens: false,
            propagate_positions: false,
            maybe_placeholders: false,
            priority: PriorityMode::Normal,
        }
    }
}

impl ParserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, start: impl Into<String>) -> Self {
        self.start = vec![start.into()];
        self
    }

    pub fn starts(mut self, starts: Vec<String>) -> Self {
        self.start = starts;
        self
    }

    pub fn parser(mut self, parser: ParserAlgorithm) -> Self {
        self.parser = parser;
        self
    }

    pub fn lexer(mut self, lexer: LexerMode) -> Self {
        self.lexer = lexer;
        self
    }

    pub fn ambiguity(mut self, ambiguity: AmbiguityMode) -> Self {
        self.ambiguity = ambiguity;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn keep_all_tokens(mut self, keep: bool) -> Self {
        self.keep_all_tokens = keep;
        self
    }

    pub fn propagate_positions(mut self, propagate: bool) -> Self {
        self.propagate_positions = propagate;
        self
    }

    pub fn maybe_placeholders(mut self, maybe: bool) -> Self {
        self.maybe_placeholders = maybe;
        self
    }

    pub fn priority(mut self, priority: PriorityMode) -> Self {
        self.priority = priority;
        self
    }
}
