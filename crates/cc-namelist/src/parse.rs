//! Namelist text reader.
//!
//! Supports the subset the sub-models write: `&group ... /` (or `&end`),
//! `key = value, value, ...` assignments spanning lines, `!` comments,
//! quoted strings, integers, reals with `e`/`d` exponents and logicals.
//! A single value reads as a scalar and an empty assignment as an empty
//! list; [`Value::as_slice`] treats a scalar as a list of one.
//! Indexed assignments (`key(2) = ...`) and repeat counts (`3*0`) are
//! rejected.

use crate::namelist::{Group, Namelist};
use crate::value::{Value, parse_logical};
use crate::{NamelistError, NamelistResult};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    GroupStart(String),
    GroupEnd,
    Equals,
    Comma,
    Str(String),
    Word(String),
}

struct Lexer<'a> {
    file: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(file: &'a str, text: &'a str) -> Self {
        Self {
            file,
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn error(&self, message: impl Into<String>) -> NamelistError {
        NamelistError::Parse {
            file: self.file.to_string(),
            line: self.line,
            message: message.into(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || matches!(c, ',' | '=' | '/' | '!' | '&' | '$' | '\'' | '"') {
                break;
            }
            word.push(c);
            self.bump();
        }
        word
    }

    fn quoted(&mut self, quote: char) -> NamelistResult<String> {
        let start_line = self.line;
        let mut text = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => {
                    // A doubled quote is an escaped quote character.
                    if self.chars.peek() == Some(&quote) {
                        self.bump();
                        text.push(quote);
                    } else {
                        return Ok(text);
                    }
                }
                Some(c) => text.push(c),
                None => {
                    return Err(NamelistError::Parse {
                        file: self.file.to_string(),
                        line: start_line,
                        message: "unterminated string".to_string(),
                    });
                }
            }
        }
    }

    fn tokens(mut self) -> NamelistResult<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.chars.peek() {
            let line = self.line;
            match c {
                c if c.is_whitespace() => {
                    self.bump();
                }
                '!' => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                '&' | '$' => {
                    self.bump();
                    let name = self.word();
                    if name.is_empty() {
                        return Err(self.error("group marker without a name"));
                    }
                    if name.eq_ignore_ascii_case("end") {
                        tokens.push((Token::GroupEnd, line));
                    } else {
                        tokens.push((Token::GroupStart(name.to_ascii_lowercase()), line));
                    }
                }
                '/' => {
                    self.bump();
                    tokens.push((Token::GroupEnd, line));
                }
                '=' => {
                    self.bump();
                    tokens.push((Token::Equals, line));
                }
                ',' => {
                    self.bump();
                    tokens.push((Token::Comma, line));
                }
                '\'' | '"' => {
                    self.bump();
                    let text = self.quoted(c)?;
                    tokens.push((Token::Str(text), line));
                }
                _ => {
                    let word = self.word();
                    tokens.push((Token::Word(word), line));
                }
            }
        }
        Ok(tokens)
    }
}

fn literal(word: &str) -> Option<Value> {
    if let Some(b) = parse_logical(word)
        && !word.chars().all(|c| c.is_ascii_digit())
    {
        return Some(Value::Bool(b));
    }
    if let Ok(v) = word.parse::<i64>() {
        return Some(Value::Int(v));
    }
    let looks_real = word
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | 'd' | 'D' | '+' | '-'))
        && word.chars().any(|c| c.is_ascii_digit());
    if looks_real {
        return word.replace(['d', 'D'], "e").parse::<f64>().ok().map(Value::Float);
    }
    None
}

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '%')
        && key.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
}

/// Parse namelist `text`; `file` names the source in errors.
pub fn parse_namelist(file: &str, text: &str) -> NamelistResult<Namelist> {
    let tokens = Lexer::new(file, text).tokens()?;
    let err = |line: usize, message: String| NamelistError::Parse {
        file: file.to_string(),
        line,
        message,
    };

    let mut namelist = Namelist::new(file);
    let mut current: Option<Group> = None;
    let mut i = 0;

    while i < tokens.len() {
        let (token, line) = &tokens[i];
        let line = *line;
        match (token, current.as_mut()) {
            (Token::GroupStart(name), None) => {
                current = Some(Group::new(name));
                i += 1;
            }
            (Token::GroupStart(name), Some(open)) => {
                return Err(err(
                    line,
                    format!("group '{}' starts before group '{}' is closed", name, open.name()),
                ));
            }
            (Token::GroupEnd, Some(_)) => {
                if let Some(group) = current.take() {
                    namelist.push_group(group);
                }
                i += 1;
            }
            (Token::Word(key), Some(group)) => {
                if !valid_key(key) {
                    return Err(err(line, format!("unsupported parameter name '{}'", key)));
                }
                if !matches!(tokens.get(i + 1), Some((Token::Equals, _))) {
                    return Err(err(line, format!("expected '=' after '{}'", key)));
                }
                i += 2;

                let mut values = Vec::new();
                while let Some((token, value_line)) = tokens.get(i) {
                    match token {
                        Token::Comma => i += 1,
                        Token::Str(s) => {
                            values.push(Value::Str(s.clone()));
                            i += 1;
                        }
                        Token::Word(w) => {
                            if matches!(tokens.get(i + 1), Some((Token::Equals, _))) {
                                break;
                            }
                            if w.contains('*') {
                                return Err(err(*value_line, format!("repeat counts are not supported ('{}')", w)));
                            }
                            let value = literal(w).ok_or_else(|| {
                                err(*value_line, format!("cannot interpret value '{}' of '{}'", w, key))
                            })?;
                            values.push(value);
                            i += 1;
                        }
                        Token::GroupEnd => break,
                        Token::Equals | Token::GroupStart(_) => {
                            return Err(err(*value_line, format!("unexpected token after '{}'", key)));
                        }
                    }
                }

                // No value at all is a null assignment, read as an empty list.
                let value = match values.len() {
                    1 => values.remove(0),
                    _ => Value::List(values),
                };
                group.set(key, value);
            }
            (_, Some(_)) => {
                return Err(err(line, "expected a parameter name".to_string()));
            }
            // Text between groups is commentary.
            (_, None) => i += 1,
        }
    }

    if let Some(open) = current {
        return Err(err(
            tokens.last().map(|(_, l)| *l).unwrap_or(1),
            format!("group '{}' is not terminated", open.name()),
        ));
    }

    Ok(namelist)
}
