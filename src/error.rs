//! Error kinds for the grammar front-end and the parse-time engines.
//!
//! Every kind hand-implements `Display`/`std::error::Error` rather than
//! pulling in a derive-macro crate, following this codebase's own
//! convention (see the former `ImplementationError`/`ParseError` pair this
//! module grew out of).
use crate::position::Position;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// The grammar source text is not well-formed (spec §7 `GrammarSyntaxError`).
#[derive(Debug, Clone)]
pub struct GrammarSyntaxError {
    pub pointer: usize,
    pub position: Position,
    pub message: String,
}

impl GrammarSyntaxError {
    pub fn new(pointer: usize, position: Position, message: String) -> Self {
        Self { pointer, position, message }
    }
}

impl Display for GrammarSyntaxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GrammarSyntaxError: {} at {}", self.message, self.position)
    }
}
impl std::error::Error for GrammarSyntaxError {}

/// The grammar is syntactically well-formed but internally inconsistent:
/// an undefined symbol, an unresolved LR conflict, or an unpriority-able
/// regex-terminal collision (spec §7 `GrammarError`).
#[derive(Debug, Clone)]
pub struct GrammarError {
    pub message: String,
}

impl GrammarError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl Display for GrammarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GrammarError: {}", self.message)
    }
}
impl std::error::Error for GrammarError {}

/// The lexer found no terminal matching at `pointer` (spec §7
/// `UnexpectedCharacters`).
#[derive(Debug, Clone)]
pub struct UnexpectedCharacters {
    pub pointer: usize,
    pub position: Position,
    pub context: String,
}

impl Display for UnexpectedCharacters {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UnexpectedCharacters: no terminal matches at {} (near {:?})",
            self.position, self.context
        )
    }
}
impl std::error::Error for UnexpectedCharacters {}

/// The parser received a token type not accepted in the current state
/// (spec §7 `UnexpectedToken`).
#[derive(Debug, Clone)]
pub struct UnexpectedToken {
    pub token_type: String,
    pub value: String,
    pub pointer: usize,
    pub position: Position,
    pub expected: BTreeSet<String>,
}

impl Display for UnexpectedToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UnexpectedToken: got {} ({:?}) at {}, expected one of {:?}",
            self.token_type, self.value, self.position, self.expected
        )
    }
}
impl std::error::Error for UnexpectedToken {}

/// The parser reached the end of input mid-derivation (spec §7
/// `UnexpectedEOF`).
#[derive(Debug, Clone)]
pub struct UnexpectedEOF {
    pub expected: BTreeSet<String>,
}

impl Display for UnexpectedEOF {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UnexpectedEOF: expected one of {:?}", self.expected)
    }
}
impl std::error::Error for UnexpectedEOF {}

/// A transformer callback failed; wraps the underlying failure with the
/// rule name under which it was invoked (spec §7 `VisitError`).
#[derive(Debug)]
pub struct VisitError {
    pub rule: String,
    pub message: String,
}

impl Display for VisitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "VisitError: handler for rule {:?} failed: {}", self.rule, self.message)
    }
}
impl std::error::Error for VisitError {}

/// Unifying error type returned from the public constructor and `parse`
/// entry points so callers need only match on one type.
#[derive(Debug)]
pub enum Error {
    GrammarSyntax(GrammarSyntaxError),
    Grammar(GrammarError),
    UnexpectedCharacters(UnexpectedCharacters),
    UnexpectedToken(UnexpectedToken),
    UnexpectedEOF(UnexpectedEOF),
    Visit(VisitError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::GrammarSyntax(e) => Display::fmt(e, f),
            Error::Grammar(e) => Display::fmt(e, f),
            Error::UnexpectedCharacters(e) => Display::fmt(e, f),
            Error::UnexpectedToken(e) => Display::fmt(e, f),
            Error::UnexpectedEOF(e) => Display::fmt(e, f),
            Error::Visit(e) => Display::fmt(e, f),
        }
    }
}
impl std::error::Error for Error {}

impl From<GrammarSyntaxError> for Error {
    fn from(e: GrammarSyntaxError) -> Self { Error::GrammarSyntax(e) }
}
impl From<GrammarError> for Error {
    fn from(e: GrammarError) -> Self { Error::Grammar(e) }
}
impl From<UnexpectedCharacters> for Error {
    fn from(e: UnexpectedCharacters) -> Self { Error::UnexpectedCharacters(e) }
}
impl From<UnexpectedToken> for Error {
    fn from(e: UnexpectedToken) -> Self { Error::UnexpectedToken(e) }
}
impl From<UnexpectedEOF> for Error {
    fn from(e: UnexpectedEOF) -> Self { Error::UnexpectedEOF(e) }
}
impl From<VisitError> for Error {
    fn from(e: VisitError) -> Self { Error::Visit(e) }
}
