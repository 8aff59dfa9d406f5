//! The lowered grammar data model (spec §3 `Terminal`/`Rule`/`Symbol`/
//! `Grammar`). Both parser engines (C6 LALR, C7 Earley) are built over
//! this flat representation; nothing downstream of lowering ever sees the
//! EBNF+ syntax sugar again (spec §4.3 invariant).
use std::collections::HashMap;
use std::rc::Rc;

/// A reference to either a terminal or a rule by interned name. Using
/// name lookups rather than object pointers keeps the naturally-cyclic
/// rule graph out of the data structure itself (spec §9 "Cyclic rule
/// graphs").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    Terminal(Rc<str>),
    Rule(Rc<str>),
}

impl Symbol {
    pub fn name(&self) -> &str {
        match self {
            Symbol::Terminal(n) | Symbol::Rule(n) => n,
        }
    }
}

/// How a terminal's text is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalPattern {
    /// An exact string literal, optionally case-insensitive (`"foo"i`).
    Literal { text: String, case_insensitive: bool },
    /// A regular expression, stored without the anchoring `^` the
    /// terminal compiler adds at match time.
    Regex(String),
    /// `%declare`d: the caller supplies matching tokens of this type
    /// directly (e.g. an external scanner); the terminal compiler never
    /// builds a pattern for it and the basic/contextual lexers never try
    /// to match it themselves.
    External,
}

impl TerminalPattern {
    /// Whether the pattern contains no regex metacharacters, used by the
    /// terminal compiler's specificity ordering (spec §4.4): literal
    /// keywords must win over identifier-like regexes of equal priority.
    pub fn is_literal_like(&self) -> bool {
        matches!(self, TerminalPattern::Literal { .. })
    }

    pub fn is_external(&self) -> bool {
        matches!(self, TerminalPattern::External)
    }
}

/// A named regular expression with priority and filtering behaviour
/// (spec §3 `Terminal`).
#[derive(Debug, Clone)]
pub struct Terminal {
    pub name: Rc<str>,
    pub pattern: TerminalPattern,
    pub priority: i32,
    /// `%ignore`-able: matched but never emitted into the token stream.
    pub ignored: bool,
    /// Whether the matched text is retained literally in the tree by
    /// default (false for anonymous string-literal terminals produced by
    /// inline `"..."` usage, true for user-declared `NAME: ...` terminals).
    pub keep: bool,
    /// Declaration order, used as the final collision tie-break.
    pub order: usize,
}

impl Terminal {
    /// A human-readable stand-in for this terminal in diagnostics: the
    /// quoted literal text for an anonymous string terminal (`"b"`
    /// rather than its internal `__ANON_3` name), the terminal's own
    /// name otherwise.
    pub fn display_name(&self) -> String {
        match &self.pattern {
            TerminalPattern::Literal { text, .. } => format!("{:?}", text),
            _ => self.name.to_string(),
        }
    }
}

/// A named production `LHS -> (symbol)*` (spec §3 `Rule`). Multiple
/// `Rule` entries may share `name`: each is one alternative, matching how
/// both the LALR and Earley engines naturally model alternation as
/// multiple productions of one non-terminal.
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: Rc<str>,
    pub symbols: Vec<Symbol>,
    /// Renames the produced tree node (`-> alias`).
    pub alias: Option<Rc<str>>,
    /// Every token in this rule's expansion is retained in the tree,
    /// including tokens that would otherwise be dropped as anonymous.
    pub keep_all_tokens: bool,
    /// Anonymous intermediate rule produced by desugaring: spliced into
    /// the parent's children rather than producing a tree node.
    pub filter_out: bool,
    /// `?`-prefixed rule: when exactly one child survives filtering, the
    /// rule's tree node is replaced by that child.
    pub inline_if_single: bool,
    /// The empty alternative desugared from a `?`/`[...]` quantifier
    /// (spec §4.3), as opposed to the structurally identical empty base
    /// case of `*`. Distinguishes the two so `maybe_placeholders` only
    /// ever fires for a genuine optional, never for zero repetitions.
    pub optional_epsilon: bool,
    /// Used by the LALR shift/reduce tie-break and the Earley ambiguity
    /// resolver (spec §4.5, §4.6).
    pub priority: i32,
    /// Declaration order, for leftmost-longest / first-wins tie-breaks.
    pub order: usize,
}

/// The fully lowered grammar (spec §3 `Grammar (lowered form)`).
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    pub terminals: Vec<Terminal>,
    pub rules: Vec<Rule>,
    pub start_symbols: Vec<Rc<str>>,
    terminal_index: HashMap<Rc<str>, usize>,
    rule_indices: HashMap<Rc<str>, Vec<usize>>,
}

impl Grammar {
    pub fn build(
        terminals: Vec<Terminal>,
        rules: Vec<Rule>,
        start_symbols: Vec<Rc<str>>,
    ) -> Self {
        let mut terminal_index = HashMap::new();
        for (i, t) in terminals.iter().enumerate() {
            terminal_index.insert(t.name.clone(), i);
        }
        let mut rule_indices: HashMap<Rc<str>, Vec<usize>> = HashMap::new();
        for (i, r) in rules.iter().enumerate() {
            rule_indices.entry(r.name.clone()).or_default().push(i);
        }
        Self { terminals, rules, start_symbols, terminal_index, rule_indices }
    }

    pub fn terminal(&self, name: &str) -> Option<&Terminal> {
        self.terminal_index.get(name).map(|&i| &self.terminals[i])
    }

    pub fn is_terminal(&self, name: &str) -> bool {
        self.terminal_index.contains_key(name)
    }

    pub fn is_rule(&self, name: &str) -> bool {
        self.rule_indices.contains_key(name)
    }

    /// All productions for a non-terminal, in declaration order.
    pub fn productions(&self, name: &str) -> impl Iterator<Item = &Rule> {
        self.rule_indices
            .get(name)
            .into_iter()
            .flat_map(|idxs| idxs.iter().map(|&i| &self.rules[i]))
    }

    pub fn ignored_terminals(&self) -> impl Iterator<Item = &Terminal> {
        self.terminals.iter().filter(|t| t.ignored)
    }

    pub fn non_terminals(&self) -> impl Iterator<Item = &str> {
        self.rule_indices.keys().map(|n| n.as_ref())
    }

    /// Validate the invariants from spec §3: every symbol referenced
    /// exists, every start symbol is a rule, and every non-terminal has
    /// at least one production.
    pub fn validate(&self) -> Result<(), crate::error::GrammarError> {
        for start in &self.start_symbols {
            if !self.is_rule(start) {
                return Err(crate::error::GrammarError::new(format!(
                    "start symbol {:?} is not a defined rule",
                    start
                )));
            }
        }
        for rule in &self.rules {
            for sym in &rule.symbols {
                match sym {
                    Symbol::Terminal(n) => {
                        if !self.is_terminal(n) {
                            return Err(crate::error::GrammarError::new(format!(
                                "rule {:?} references undefined terminal {:?}",
                                rule.name, n
                            )));
                        }
                    }
                    Symbol::Rule(n) => {
                        if !self.is_rule(n) {
                            return Err(crate::error::GrammarError::new(format!(
                                "rule {:?} references undefined rule {:?}",
                                rule.name, n
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
