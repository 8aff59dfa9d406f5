//! Recursive-descent parser over the EBNF+ meta-grammar token stream
//! (spec §4.1, §6). Grounded on the teacher's own parsing style: rather
//! than generating a table, the teacher hand-writes recursive-descent
//! `IProduction::advance_*` consumers; this module is the same approach
//! applied to data instead of to compile-time combinators, since the
//! meta-grammar itself is fixed and small enough not to warrant
//! bootstrapping through the very engines this crate builds.
use super::ast::*;
use super::lexer::{tokenize, Spanned, Tok};
use crate::error::GrammarSyntaxError;
use crate::position::Code;

pub fn parse_grammar(src: &str) -> Result<GrammarFile, GrammarSyntaxError> {
    let tokens = tokenize(src)?;
    let mut p = Parser { tokens, pos: 0, code: Code::new(src.as_bytes()) };
    p.parse_file()
}

struct Parser<'a> {
    tokens: Vec<Spanned<Tok>>,
    pos: usize,
    code: Code<'a>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek_pos(&self) -> usize {
        self.tokens[self.pos].pos
    }

    fn advance(&mut self) -> Tok {
        let t = self.tokens[self.pos].tok.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, msg: impl Into<String>) -> GrammarSyntaxError {
        let pos = self.peek_pos();
        GrammarSyntaxError::new(pos, self.code.obtain_position(pos), msg.into())
    }

    fn expect(&mut self, expected: &Tok) -> Result<(), GrammarSyntaxError> {
        if std::mem::discriminant(self.peek()) == std::mem::discriminant(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {:?}, found {:?}", expected, self.peek())))
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Tok::Newline) {
            self.advance();
        }
    }

    fn parse_file(&mut self) -> Result<GrammarFile, GrammarSyntaxError> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Tok::Newline => { self.advance(); }
                Tok::Eof => break,
                _ => items.push(self.parse_item()?),
            }
        }
        Ok(GrammarFile { items })
    }

    fn parse_item(&mut self) -> Result<GrammarItem, GrammarSyntaxError> {
        match self.peek().clone() {
            Tok::RuleName(_) => Ok(GrammarItem::Rule(self.parse_rule()?)),
            Tok::TokenName(_) => Ok(GrammarItem::Token(self.parse_token()?)),
            Tok::Directive(_) => Ok(GrammarItem::Statement(self.parse_statement()?)),
            other => Err(self.err(format!("expected rule, terminal, or directive, found {:?}", other))),
        }
    }

    fn parse_rule(&mut self) -> Result<RuleDecl, GrammarSyntaxError> {
        let name = match self.advance() {
            Tok::RuleName(n) => n,
            _ => unreachable!(),
        };
        let priority = self.parse_optional_priority()?;
        self.expect_colon_or_dot()?;
        let expansions = self.parse_expansions()?;
        self.end_statement()?;
        let inline = name.starts_with('?');
        let filter_out = name.starts_with('_');
        let bare = name.trim_start_matches(['?', '_']).to_string();
        Ok(RuleDecl { name: bare, inline, filter_out, priority, expansions })
    }

    fn parse_token(&mut self) -> Result<TokenDecl, GrammarSyntaxError> {
        let name = match self.advance() {
            Tok::TokenName(n) => n,
            _ => unreachable!(),
        };
        let priority = self.parse_optional_priority()?;
        self.expect(&Tok::Colon)?;
        let expansions = self.parse_expansions()?;
        self.end_statement()?;
        let ignored = name.starts_with('_');
        let bare = name.trim_start_matches('_').to_string();
        Ok(TokenDecl { name: bare, ignored, priority, expansions })
    }

    fn parse_optional_priority(&mut self) -> Result<Option<i32>, GrammarSyntaxError> {
        if matches!(self.peek(), Tok::Dot) {
            self.advance();
            match self.advance() {
                Tok::Number(n) => Ok(Some(n as i32)),
                other => Err(self.err(format!("expected priority number after '.', found {:?}", other))),
            }
        } else {
            Ok(None)
        }
    }

    fn expect_colon_or_dot(&mut self) -> Result<(), GrammarSyntaxError> {
        match self.peek() {
            Tok::Colon | Tok::Dot => { self.advance(); Ok(()) }
            other => Err(self.err(format!("expected ':' or '.', found {:?}", other))),
        }
    }

    fn end_statement(&mut self) -> Result<(), GrammarSyntaxError> {
        match self.peek() {
            Tok::Newline | Tok::Eof => { self.skip_newlines(); Ok(()) }
            other => Err(self.err(format!("expected end of statement, found {:?}", other))),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, GrammarSyntaxError> {
        let directive = match self.advance() {
            Tok::Directive(d) => d,
            _ => unreachable!(),
        };
        let stmt = match directive.as_str() {
            "ignore" => Statement::Ignore(self.parse_ignore_target()?),
            "import" => Statement::Import(self.parse_import()?),
            "declare" => {
                let mut names = Vec::new();
                names.push(self.parse_terminal_name_ref()?);
                while let Tok::TokenName(_) = self.peek() {
                    names.push(self.parse_terminal_name_ref()?);
                }
                Statement::Declare(names)
            }
            "override" => Statement::Override(self.parse_rule_or_token()?),
            "extend" => Statement::Extend(self.parse_rule_or_token()?),
            other => return Err(self.err(format!("unknown directive %{}", other))),
        };
        self.end_statement()?;
        Ok(stmt)
    }

    fn parse_terminal_name_ref(&mut self) -> Result<String, GrammarSyntaxError> {
        match self.advance() {
            Tok::TokenName(n) => Ok(n),
            other => Err(self.err(format!("expected terminal name, found {:?}", other))),
        }
    }

    /// `%ignore` accepts either a declared terminal's name or an inline
    /// string/regex literal, the same patterns an `Atom` can be built
    /// from (spec §4.2).
    fn parse_ignore_target(&mut self) -> Result<IgnoreTarget, GrammarSyntaxError> {
        match self.advance() {
            Tok::TokenName(n) => Ok(IgnoreTarget::Name(n)),
            Tok::Str(s, ci) => Ok(IgnoreTarget::Literal { text: s, case_insensitive: ci }),
            Tok::Regex(r) => Ok(IgnoreTarget::Regex(r)),
            other => Err(self.err(format!("expected terminal name or inline pattern after %ignore, found {:?}", other))),
        }
    }

    fn parse_rule_or_token(&mut self) -> Result<Item, GrammarSyntaxError> {
        match self.peek() {
            Tok::RuleName(_) => Ok(Item::Rule(self.parse_rule()?)),
            Tok::TokenName(_) => Ok(Item::Token(self.parse_token()?)),
            other => Err(self.err(format!("expected rule or terminal declaration, found {:?}", other))),
        }
    }

    fn parse_import(&mut self) -> Result<ImportStatement, GrammarSyntaxError> {
        let mut path = Vec::new();
        path.push(self.parse_path_segment()?);
        while matches!(self.peek(), Tok::Dot) {
            self.advance();
            path.push(self.parse_path_segment()?);
        }
        let names = if matches!(self.peek(), Tok::LParen) {
            self.advance();
            let mut names = Vec::new();
            loop {
                let from = self.parse_path_segment()?;
                let to = if matches!(self.peek(), Tok::Arrow) {
                    self.advance();
                    Some(self.parse_path_segment()?)
                } else {
                    None
                };
                names.push((from, to));
                if matches!(self.peek(), Tok::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(&Tok::RParen)?;
            names
        } else {
            // No explicit list: the final path segment is the imported
            // name, the rest is the module path (spec §4.2).
            let imported = path.pop().expect("path has at least one segment");
            vec![(imported, None)]
        };
        Ok(ImportStatement { path, names })
    }

    fn parse_path_segment(&mut self) -> Result<String, GrammarSyntaxError> {
        match self.advance() {
            Tok::RuleName(n) | Tok::TokenName(n) => Ok(n),
            other => Err(self.err(format!("expected identifier in import path, found {:?}", other))),
        }
    }

    fn parse_expansions(&mut self) -> Result<Expansions, GrammarSyntaxError> {
        let mut alts = vec![self.parse_alias()?];
        loop {
            // allow a leading-pipe continuation on the next physical line
            let save = self.pos;
            self.skip_newlines();
            if matches!(self.peek(), Tok::Pipe) {
                self.advance();
                alts.push(self.parse_alias()?);
            } else {
                self.pos = save;
                break;
            }
        }
        Ok(Expansions { alts })
    }

    fn parse_alias(&mut self) -> Result<Alias, GrammarSyntaxError> {
        let expansion = self.parse_expansion()?;
        let alias = if matches!(self.peek(), Tok::Arrow) {
            self.advance();
            match self.advance() {
                Tok::RuleName(n) => Some(n),
                other => return Err(self.err(format!("expected rule name after '->', found {:?}", other))),
            }
        } else {
            None
        };
        Ok(Alias { expansion, alias })
    }

    fn parse_expansion(&mut self) -> Result<Expansion, GrammarSyntaxError> {
        let mut exprs = Vec::new();
        while self.starts_atom() {
            exprs.push(self.parse_expr()?);
        }
        Ok(Expansion { exprs })
    }

    fn starts_atom(&self) -> bool {
        matches!(
            self.peek(),
            Tok::LParen | Tok::LBracket | Tok::Str(..) | Tok::Regex(_) | Tok::RuleName(_) | Tok::TokenName(_)
        )
    }

    fn parse_expr(&mut self) -> Result<Expr, GrammarSyntaxError> {
        let atom = self.parse_atom()?;
        let quantifier = match self.peek() {
            Tok::Question => { self.advance(); Quantifier::Optional }
            Tok::Star => { self.advance(); Quantifier::Star }
            Tok::Plus => { self.advance(); Quantifier::Plus }
            Tok::Tilde => {
                self.advance();
                let min = match self.advance() {
                    Tok::Number(n) => n,
                    other => return Err(self.err(format!("expected number after '~', found {:?}", other))),
                };
                let max = if matches!(self.peek(), Tok::DotDot) {
                    self.advance();
                    match self.advance() {
                        Tok::Number(n) => Some(n),
                        other => return Err(self.err(format!("expected number after '..', found {:?}", other))),
                    }
                } else {
                    None
                };
                Quantifier::Range { min, max }
            }
            _ => Quantifier::None,
        };
        Ok(Expr { atom, quantifier })
    }

    fn parse_atom(&mut self) -> Result<Atom, GrammarSyntaxError> {
        match self.advance() {
            Tok::LParen => {
                let e = self.parse_expansions()?;
                self.expect(&Tok::RParen)?;
                Ok(Atom::Group(e))
            }
            Tok::LBracket => {
                let e = self.parse_expansions()?;
                self.expect(&Tok::RBracket)?;
                Ok(Atom::OptionalGroup(e))
            }
            Tok::Str(s, ci) => Ok(Atom::StringLiteral { text: s, case_insensitive: ci }),
            Tok::Regex(r) => Ok(Atom::Regex(r)),
            Tok::RuleName(n) | Tok::TokenName(n) => Ok(Atom::Ref(n)),
            other => Err(self.err(format!("expected grammar atom, found {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hello_grammar() {
        let gf = parse_grammar("start: WORD \",\" WORD \"!\"\nWORD: /\\w+/\n%ignore \" \"\n").unwrap();
        assert_eq!(gf.items.len(), 3);
    }

    #[test]
    fn parses_repetition_and_alias() {
        let gf = parse_grammar("list: item (\",\" item)* -> items\nitem: /[0-9]+/\n").unwrap();
        match &gf.items[0] {
            GrammarItem::Rule(r) => {
                assert_eq!(r.name, "list");
                assert_eq!(r.expansions.alts[0].alias.as_deref(), Some("items"));
            }
            _ => panic!("expected rule"),
        }
    }

    #[test]
    fn parses_import_with_rename() {
        let gf = parse_grammar("%import common (NUMBER, WORD -> WORDLIKE)\n").unwrap();
        match &gf.items[0] {
            GrammarItem::Statement(Statement::Import(i)) => {
                assert_eq!(i.path, vec!["common".to_string()]);
                assert_eq!(i.names[1], ("WORD".to_string(), Some("WORDLIKE".to_string())));
            }
            _ => panic!("expected import statement"),
        }
    }
}
