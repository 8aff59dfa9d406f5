//! Abstract syntax tree for the EBNF+ meta-grammar (spec §6), produced by
//! [`super::parser::parse_grammar`] and consumed by
//! [`super::loader::load`] / [`super::lower::lower`].
//!
//! This is the data-driven analogue of the teacher's compile-time
//! production combinators (`production::non_terminals::{Union,Concat}`,
//! `production::wrappers::{List,Nullable,SeparatedList}`): where the
//! teacher builds a parser by composing `Rc<dyn IProduction>` combinators
//! in Rust source, here the same shapes (sequence, alternation, optional,
//! repetition) are parsed out of grammar *text* into this closed enum so
//! they can be rewritten by the lowering pass (spec §9 "Variant
//! dispatch": pattern-match exhaustively rather than subtype polymorphism).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    None,
    Optional,
    Star,
    Plus,
    /// `~ n..m` (or `~ n` when `max` is `None`, meaning exactly `n`).
    Range { min: u32, max: Option<u32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    Group(Expansions),
    OptionalGroup(Expansions),
    StringLiteral { text: String, case_insensitive: bool },
    Regex(String),
    /// Reference to a rule or terminal by name; which it is cannot be
    /// determined until the loader has collected all declarations.
    Ref(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub atom: Atom,
    pub quantifier: Quantifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expansion {
    pub exprs: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub expansion: Expansion,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expansions {
    pub alts: Vec<Alias>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDecl {
    pub name: String,
    /// Leading `?`: inline-if-single-child.
    pub inline: bool,
    /// Leading `_`: filter-out (splice into parent).
    pub filter_out: bool,
    pub priority: Option<i32>,
    pub expansions: Expansions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDecl {
    pub name: String,
    /// Leading `_`: filtered from the token stream (`%ignore`-equivalent
    /// shorthand some grammars use directly on the terminal name).
    pub ignored: bool,
    pub priority: Option<i32>,
    pub expansions: Expansions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Rule(RuleDecl),
    Token(TokenDecl),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    pub path: Vec<String>,
    /// `(NAME, NAME2 -> RENAMED)`; empty means import the whole module
    /// under its own name (e.g. `%import common.NUMBER` with no list
    /// imports exactly `NUMBER`, recorded by the parser as a single
    /// `(name, None)` entry rather than a special case here).
    pub names: Vec<(String, Option<String>)>,
}

/// What a `%ignore` directive names: a previously declared terminal, or
/// an inline pattern (`%ignore " "`, `%ignore /[ \t]+/`) that has no
/// name of its own yet (spec §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreTarget {
    Name(String),
    Literal { text: String, case_insensitive: bool },
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Ignore(IgnoreTarget),
    Import(ImportStatement),
    Declare(Vec<String>),
    Override(Item),
    Extend(Item),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarItem {
    Rule(RuleDecl),
    Token(TokenDecl),
    Statement(Statement),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GrammarFile {
    pub items: Vec<GrammarItem>,
}
