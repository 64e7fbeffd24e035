//! Tokenizer: one character of lookahead, no backtracking (spec.md §4.1).

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    /// A `"`-delimited token, escapes already resolved.
    Str(String),
    /// An unquoted token: verbatim text, not yet classified as int/float/symbol.
    Raw(String),
}

pub struct Lexer {
    data: Vec<char>,
    idx: usize,
}

impl Lexer {
    pub fn new(text: &str) -> Self {
        Self { data: text.chars().collect(), idx: 0 }
    }

    pub fn lex(mut self) -> Result<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_ignored();
            if self.idx >= self.data.len() {
                break;
            }
            let start = self.idx;
            let c = self.data[self.idx];
            match c {
                '(' => {
                    self.idx += 1;
                    tokens.push((Token::LParen, start));
                }
                ')' => {
                    self.idx += 1;
                    tokens.push((Token::RParen, start));
                }
                '"' => {
                    let s = self.lex_string()?;
                    tokens.push((Token::Str(s), start));
                }
                _ => {
                    let s = self.lex_raw();
                    tokens.push((Token::Raw(s), start));
                }
            }
        }
        Ok(tokens)
    }

    fn skip_ignored(&mut self) {
        loop {
            while self.idx < self.data.len() && self.data[self.idx].is_whitespace() {
                self.idx += 1;
            }
            if self.idx < self.data.len() && self.data[self.idx] == '#' {
                while self.idx < self.data.len() && self.data[self.idx] != '\n' {
                    self.idx += 1;
                }
                continue;
            }
            break;
        }
    }

    fn lex_string(&mut self) -> Result<String> {
        debug_assert_eq!(self.data[self.idx], '"');
        let start = self.idx;
        self.idx += 1;
        let mut out = String::new();
        loop {
            if self.idx >= self.data.len() {
                return Err(Error::parse(start, "unterminated string"));
            }
            let c = self.data[self.idx];
            match c {
                '"' => {
                    self.idx += 1;
                    return Ok(out);
                }
                '\\' => {
                    self.idx += 1;
                    if self.idx >= self.data.len() {
                        return Err(Error::parse(start, "unterminated escape in string"));
                    }
                    let esc = self.data[self.idx];
                    out.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' => '\\',
                        '"' => '"',
                        other => other,
                    });
                    self.idx += 1;
                }
                _ => {
                    out.push(c);
                    self.idx += 1;
                }
            }
        }
    }

    fn lex_raw(&mut self) -> String {
        let start = self.idx;
        while self.idx < self.data.len() {
            let c = self.data[self.idx];
            if c.is_whitespace() || c == '(' || c == ')' || c == '"' || c == '#' {
                break;
            }
            self.idx += 1;
        }
        self.data[start..self.idx].iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(s: &str) -> Vec<Token> {
        Lexer::new(s).lex().unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn basic_list() {
        assert_eq!(
            lex("(foo 1 2.5 \"bar baz\")"),
            vec![
                Token::LParen,
                Token::Raw("foo".into()),
                Token::Raw("1".into()),
                Token::Raw("2.5".into()),
                Token::Str("bar baz".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn comment_skipped() {
        assert_eq!(lex("(a 1) # trailing comment\n(b 2)"), {
            let mut v = lex("(a 1)");
            v.extend(lex("(b 2)"));
            v
        });
    }

    #[test]
    fn escapes() {
        assert_eq!(lex(r#""a\nb\t\"c""#), vec![Token::Str("a\nb\t\"c".into())]);
    }
}
