//! The uniform parse-tree data model shared by both parser engines
//! (spec §3 `Tree`/`Token`, §4.7 parse-tree builder).
use crate::position::Span;
use ptree::TreeItem;
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// A single lexical token, immutable once emitted (spec §3 `Token`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub ttype: Rc<str>,
    pub value: String,
    pub span: Span,
    /// Whether this token should survive tree construction when the
    /// enclosing rule does not request `keep_all_tokens` -- false for
    /// anonymous string-literal terminals that exist only to drive the
    /// grammar, true for named/user terminals (spec §4.7).
    pub keep: bool,
}

impl Token {
    pub fn new(ttype: Rc<str>, value: String, span: Span, keep: bool) -> Self {
        Self { ttype, value, span, keep }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:?})", self.ttype, self.value)
    }
}

/// A node of the tree or token, ordered within a [`Tree`]'s children
/// (spec §3 `children: ordered sequence of (Tree|Token)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    Tree(Tree),
    Token(Token),
}

impl Child {
    pub fn span(&self) -> Span {
        match self {
            Child::Tree(t) => t.meta,
            Child::Token(t) => t.span,
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Child::Tree(t) => Some(t),
            Child::Token(_) => None,
        }
    }
    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Child::Token(t) => Some(t),
            Child::Tree(_) => None,
        }
    }
}

impl Display for Child {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Child::Tree(t) => Display::fmt(t, f),
            Child::Token(t) => Display::fmt(t, f),
        }
    }
}

/// A parse tree node (spec §3 `Tree`). `data` is the rule name, or its
/// alias when the producing rule declared one (`-> name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub data: Rc<str>,
    pub children: Vec<Child>,
    pub meta: Span,
}

impl Tree {
    pub fn new(data: Rc<str>, children: Vec<Child>, meta: Span) -> Self {
        Self { data, children, meta }
    }

    pub fn leaf(data: Rc<str>, meta: Span) -> Self {
        Self { data, children: Vec::with_capacity(0), meta }
    }

    /// Recompute `meta` as the join of all children spans; used when a
    /// rule's own span was not tracked directly (e.g. spliced anonymous
    /// rules) but its children carry real spans.
    pub fn span_from_children(children: &[Child]) -> Span {
        children
            .iter()
            .map(Child::span)
            .fold(None, |acc, s| Some(match acc {
                None => s,
                Some(a) => Span::join(&a, &s),
            }))
            .unwrap_or_default()
    }

    pub fn find(&self, name: &str) -> Option<&Tree> {
        if &*self.data == name {
            Some(self)
        } else {
            self.children.iter().find_map(|c| match c {
                Child::Tree(t) => t.find(name),
                Child::Token(_) => None,
            })
        }
    }

    pub fn children_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Tree> {
        self.children.iter().filter_map(move |c| match c {
            Child::Tree(t) if &*t.data == name => Some(t),
            _ => None,
        })
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let children_string = self.children.iter().map(|c| format!("{}", c));
        f.debug_struct("")
            .field("data", &(&self.data, self.meta.start_pos, self.meta.end_pos))
            .field("children", &children_string)
            .finish()
    }
}

impl TreeItem for Tree {
    type Child = Child;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _: &ptree::Style) -> std::io::Result<()> {
        write!(f, "{} # {}-{}", self.data, self.meta.start_pos, self.meta.end_pos)
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(&self.children)
    }
}

impl TreeItem for Child {
    type Child = Child;

    fn write_self<W: std::io::Write>(&self, f: &mut W, style: &ptree::Style) -> std::io::Result<()> {
        match self {
            Child::Tree(t) => t.write_self(f, style),
            Child::Token(t) => write!(f, "{} {:?} # {}-{}", t.ttype, t.value, t.span.start_pos, t.span.end_pos),
        }
    }

    fn children(&self) -> Cow<[Self::Child]> {
        match self {
            Child::Tree(t) => Cow::from(&t.children),
            Child::Token(_) => Cow::from(&[] as &[Child]),
        }
    }
}

impl Tree {
    pub fn print(&self) -> Result<(), std::io::Error> {
        ptree::print_tree(self)
    }
}

/// Parameters controlling how a reduced rule's children are turned into a
/// single [`Child`] (spec §4.7). Shared by the LALR driver and the Earley
/// forest materialiser so both engines agree on filter/inline semantics.
#[derive(Debug, Clone, Copy)]
pub struct BuildRule<'a> {
    pub lhs: &'a str,
    pub alias: Option<&'a str>,
    pub filter_out: bool,
    pub inline_if_single: bool,
    pub keep_all_tokens: bool,
}

/// Tree name given to a `maybe_placeholders` stand-in for an optional
/// item that did not match (spec §4.7 `maybe_placeholders`), shared by
/// both engines so a caller matching on rule name sees the same marker
/// regardless of which one produced the tree.
pub const MAYBE_PLACEHOLDER_RULE_NAME: &str = "__maybe_placeholder__";

/// A stand-in child for an optional item that did not match, under
/// `maybe_placeholders` (spec §4.7).
pub fn maybe_placeholder() -> Child {
    Child::Tree(Tree::leaf(Rc::from(MAYBE_PLACEHOLDER_RULE_NAME), Default::default()))
}

/// Build the [`Child`] produced by reducing `rule` over `raw_children`,
/// applying filter-out splicing, inline-if-single-child collapsing, and
/// anonymous-token dropping (spec §4.7). Returns the (possibly spliced)
/// sequence of children to append to the *parent's* child list, since a
/// `filter_out` rule does not produce a node of its own.
pub fn reduce_children(rule: BuildRule, mut raw_children: Vec<Child>) -> Vec<Child> {
    if !rule.keep_all_tokens {
        raw_children.retain(|c| match c {
            Child::Token(t) => t.keep,
            Child::Tree(_) => true,
        });
    }

    if rule.filter_out {
        return raw_children;
    }

    if rule.inline_if_single && raw_children.len() == 1 {
        return raw_children;
    }

    let name: Rc<str> = Rc::from(rule.alias.unwrap_or(rule.lhs));
    let meta = Tree::span_from_children(&raw_children);
    vec![Child::Tree(Tree::new(name, raw_children, meta))]
}
