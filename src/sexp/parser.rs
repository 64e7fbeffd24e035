//! Recursive-descent tree builder over the token stream (spec.md §4.1).

use super::lexer::Token;
use super::{Atom, AtomValue, List, SExp};
use crate::error::{Error, Result};

pub struct Parser {
    toks: Vec<(Token, usize)>,
    idx: usize,
}

impl Parser {
    pub fn new(toks: Vec<(Token, usize)>) -> Self {
        Self { toks, idx: 0 }
    }

    pub fn parse(mut self) -> Result<SExp> {
        let expr = self.parse_expr()?;
        if self.idx < self.toks.len() {
            let (_, pos) = self.toks[self.idx];
            return Err(Error::parse(pos, "unexpected content after top-level expression"));
        }
        Ok(expr)
    }

    fn peek(&self) -> Result<&(Token, usize)> {
        self.toks.get(self.idx).ok_or_else(|| Error::parse(usize::MAX, "unexpected end of input"))
    }

    fn bump(&mut self) -> Result<(Token, usize)> {
        let t = self.peek()?.clone();
        self.idx += 1;
        Ok(t)
    }

    fn parse_expr(&mut self) -> Result<SExp> {
        let (tok, pos) = self.peek()?.clone();
        match tok {
            Token::LParen => self.parse_list(),
            Token::RParen => Err(Error::parse(pos, "unexpected ')'")),
            Token::Str(s) => {
                self.idx += 1;
                Ok(SExp::Atom(Atom { value: AtomValue::Str(s), original: None }))
            }
            Token::Raw(text) => {
                self.idx += 1;
                Ok(SExp::Atom(parse_raw_atom(&text)))
            }
        }
    }

    fn parse_list(&mut self) -> Result<SExp> {
        let (_, start_pos) = self.bump()?; // consume '('

        // Empty list: `()`.
        if matches!(self.peek()?.0, Token::RParen) {
            self.idx += 1;
            return Ok(SExp::List(List::anonymous()));
        }

        let mut list = List::anonymous();
        let (first_tok, _) = self.peek()?.clone();
        match first_tok {
            Token::Raw(text) if is_valid_name(&text) => {
                list.name = Some(text);
                self.idx += 1;
            }
            _ => {
                let first_child = self.parse_expr()?;
                list.children.push(first_child);
            }
        }

        loop {
            match self.toks.get(self.idx) {
                None => return Err(Error::parse(start_pos, "unbalanced parentheses: missing ')'")),
                Some((Token::RParen, _)) => {
                    self.idx += 1;
                    return Ok(SExp::List(list));
                }
                Some(_) => list.children.push(self.parse_expr()?),
            }
        }
    }
}

/// A raw (unquoted) token is a valid list-name symbol iff its first
/// character is not a digit — the rule spec.md §4.1 gives for
/// distinguishing a tagged list from an anonymous one.
fn is_valid_name(text: &str) -> bool {
    match text.chars().next() {
        Some(c) => !c.is_ascii_digit(),
        None => false,
    }
}

fn parse_raw_atom(text: &str) -> Atom {
    if let Ok(i) = text.parse::<i64>() {
        return Atom { value: AtomValue::Int(i), original: Some(text.to_string()) };
    }
    if let Ok(f) = text.parse::<f64>() {
        // Reject things Rust's f64 parser is more liberal about than KiCad
        // numeric literals, e.g. "inf", "nan".
        if f.is_finite() {
            return Atom { value: AtomValue::Float(f), original: Some(text.to_string()) };
        }
    }
    Atom { value: AtomValue::Str(text.to_string()), original: None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexp::Lexer;

    fn parse(s: &str) -> SExp {
        let toks = Lexer::new(s).lex().unwrap();
        Parser::new(toks).parse().unwrap()
    }

    #[test]
    fn named_list() {
        let e = parse("(at 1 2 90)");
        let l = e.as_list().unwrap();
        assert_eq!(l.name.as_deref(), Some("at"));
        assert_eq!(l.children.len(), 3);
    }

    #[test]
    fn anonymous_list_digit_first() {
        let e = parse("(0 1 2)");
        let l = e.as_list().unwrap();
        assert_eq!(l.name, None);
        assert_eq!(l.children.len(), 3);
    }

    #[test]
    fn numeric_original_text_preserved() {
        let e = parse("(at 1.50000 2)");
        let l = e.as_list().unwrap();
        let a = l.get_atom(0).unwrap();
        assert_eq!(a.original.as_deref(), Some("1.50000"));
    }

    #[test]
    fn nested_lists() {
        let e = parse(r#"(footprint "R_0402" (at 1 2) (pad "1" smd rect))"#);
        let l = e.as_list().unwrap();
        assert_eq!(l.name.as_deref(), Some("footprint"));
        assert!(l.find("at").is_some());
        assert!(l.find("pad").is_some());
    }

    #[test]
    fn unbalanced_parens_errors() {
        let toks = Lexer::new("(foo 1").lex().unwrap();
        assert!(Parser::new(toks).parse().is_err());
    }
}
