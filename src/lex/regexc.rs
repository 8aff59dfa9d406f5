//! Terminal compiler (spec §4.4 C1): turns the lowered grammar's
//! [`crate::grammar::model::Terminal`] table into matchable patterns,
//! ordered for the longest-match-then-priority rule the runtime lexers
//! (`basic`, `contextual`, `dynamic`) all share.
//!
//! Grounded on `creative-forest-lang-pt/src/lexeme/pattern.rs`
//! (`Pattern::new` anchors and validates a `regex::Regex`, rejecting
//! nullable patterns) and `lexeme/punctuation.rs` (literal terminals get
//! their own non-regex fast path). Each compiled terminal is matched
//! independently rather than through one combined alternation regex: the
//! `regex` crate is leftmost-first, not leftmost-longest, so a single
//! alternation cannot guarantee the overall-longest match across
//! differently-ranked terminals the way independent per-terminal
//! anchored matches can.
use crate::error::GrammarError;
use crate::grammar::model::{Grammar, Terminal, TerminalPattern};
use once_cell::unsync::OnceCell;
use regex::Regex;
use std::rc::Rc;

pub struct CompiledTerminal {
    pub name: Rc<str>,
    pub ignored: bool,
    pub keep: bool,
    pub priority: i32,
    pub specific: bool,
    pub order: usize,
    matcher: Matcher,
    raw_pattern: Option<String>,
    full_regex: OnceCell<Option<Regex>>,
}

enum Matcher {
    Literal { text: String, case_insensitive: bool },
    Regex(Regex),
    External,
}

impl CompiledTerminal {
    /// Length of the match at the start of `text`, or `None`.
    pub fn match_len(&self, text: &str) -> Option<usize> {
        match &self.matcher {
            Matcher::Literal { text: lit, case_insensitive } => {
                if *case_insensitive {
                    let lower_text: String = text.chars().take(lit.chars().count()).collect();
                    if lower_text.eq_ignore_ascii_case(lit) { Some(lower_text.len()) } else { None }
                } else if text.starts_with(lit.as_str()) {
                    Some(lit.len())
                } else {
                    None
                }
            }
            Matcher::Regex(re) => re.find(text).filter(|m| m.start() == 0).map(|m| m.end()),
            Matcher::External => None,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.matcher, Matcher::External)
    }

    /// A human-readable stand-in for this terminal in diagnostics: the
    /// quoted literal text for an anonymous string terminal, its own
    /// name otherwise (mirrors [`Terminal::display_name`]).
    pub fn display_name(&self) -> String {
        match &self.matcher {
            Matcher::Literal { text, .. } => format!("{:?}", text),
            _ => self.name.to_string(),
        }
    }

    /// Every prefix length of `text` that this terminal matches exactly,
    /// for the Earley `dynamic_complete` lexer mode (spec §6 `lexer`
    /// option): unlike `match_len`, which reports only the longest, this
    /// enumerates every length an ambiguous grammar might want to scan.
    pub fn all_match_lens(&self, text: &str) -> Vec<usize> {
        match &self.matcher {
            Matcher::Literal { .. } => self.match_len(text).into_iter().collect(),
            Matcher::External => Vec::new(),
            Matcher::Regex(_) => {
                let max = match self.match_len(text) {
                    Some(m) => m,
                    None => return Vec::new(),
                };
                let full = self.full_regex.get_or_init(|| {
                    self.raw_pattern.as_ref().and_then(|p| Regex::new(&format!("^(?:{})$", p)).ok())
                });
                match full {
                    Some(re) => (1..=max).filter(|&len| text.is_char_boundary(len) && re.is_match(&text[..len])).collect(),
                    None => vec![max],
                }
            }
        }
    }
}

pub struct TerminalCompiler {
    pub terminals: Vec<CompiledTerminal>,
}

impl TerminalCompiler {
    pub fn compile(grammar: &Grammar) -> Result<Self, GrammarError> {
        let mut terminals = Vec::with_capacity(grammar.terminals.len());
        for t in &grammar.terminals {
            terminals.push(compile_one(t)?);
        }
        // Longest-match ties are broken by (priority desc, specificity
        // desc, declaration order asc), spec §4.4.
        terminals.sort_by(|a, b| {
            b.priority.cmp(&a.priority).then(b.specific.cmp(&a.specific)).then(a.order.cmp(&b.order))
        });
        Ok(Self { terminals })
    }

    /// Diagnostic stand-in for a terminal by name, falling back to the
    /// bare name itself when `name` is unknown to this compiler.
    pub fn display_name(&self, name: &str) -> String {
        self.terminals.iter().find(|t| &*t.name == name).map(CompiledTerminal::display_name).unwrap_or_else(|| name.to_string())
    }

    /// The longest match among `candidates` at the start of `text`,
    /// broken by the same ordering `compile` sorted terminals into.
    pub fn longest_match<'a>(&'a self, candidates: impl Iterator<Item = &'a CompiledTerminal>, text: &str) -> Option<(&'a CompiledTerminal, usize)> {
        let mut best: Option<(&CompiledTerminal, usize)> = None;
        for t in candidates {
            if let Some(len) = t.match_len(text) {
                if len == 0 {
                    continue;
                }
                match &best {
                    None => best = Some((t, len)),
                    Some((_, best_len)) if len > *best_len => best = Some((t, len)),
                    _ => {}
                }
            }
        }
        best
    }
}

fn compile_one(t: &Terminal) -> Result<CompiledTerminal, GrammarError> {
    let mut raw_pattern = None;
    let matcher = match &t.pattern {
        TerminalPattern::Literal { text, case_insensitive } => {
            if text.is_empty() {
                return Err(GrammarError::new(format!("terminal {:?} must not match the empty string", t.name)));
            }
            Matcher::Literal { text: text.clone(), case_insensitive: *case_insensitive }
        }
        TerminalPattern::Regex(pattern) => {
            let anchored = format!("^(?:{})", pattern);
            let re = Regex::new(&anchored)
                .map_err(|err| GrammarError::new(format!("terminal {:?} has an invalid pattern: {}", t.name, err)))?;
            if re.is_match("") {
                return Err(GrammarError::new(format!("terminal {:?} must not match the empty string", t.name)));
            }
            raw_pattern = Some(pattern.clone());
            Matcher::Regex(re)
        }
        TerminalPattern::External => Matcher::External,
    };
    Ok(CompiledTerminal {
        name: t.name.clone(),
        ignored: t.ignored,
        keep: t.keep,
        priority: t.priority,
        specific: t.pattern.is_literal_like(),
        order: t.order,
        matcher,
        raw_pattern,
        full_regex: OnceCell::new(),
    })
}
