// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell-style tokenizing for free-form command lines.
//!
//! Whitespace separates tokens, single and double quotes group, a
//! backslash escapes the next character. Tokens containing `=` split on
//! the first occurrence into kwargs; the rest stay positional.

use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unmatched quote")]
    UnmatchedQuote,

    #[error("trailing backslash")]
    TrailingEscape,
}

/// Split a line into tokens with shell-style quoting.
pub fn split(line: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else if c == '\\' && q == '"' {
                    // Inside double quotes a backslash still escapes
                    match chars.next() {
                        Some(next) => current.push(next),
                        None => return Err(ParseError::TrailingEscape),
                    }
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    in_token = true;
                }
                '\\' => match chars.next() {
                    Some(next) => {
                        current.push(next);
                        in_token = true;
                    }
                    None => return Err(ParseError::TrailingEscape),
                },
                _ if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                _ => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if quote.is_some() {
        return Err(ParseError::UnmatchedQuote);
    }
    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

/// Tokenize a command line into positional args and `key=value` kwargs.
///
/// The first `=` in a token splits it; both sides are trimmed. The first
/// positional token is the command.
pub fn parse_line(line: &str) -> Result<(Vec<String>, IndexMap<String, String>), ParseError> {
    let mut args = Vec::new();
    let mut kwargs = IndexMap::new();

    for token in split(line)? {
        match token.split_once('=') {
            Some((key, value)) => {
                kwargs.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => args.push(token),
        }
    }

    Ok((args, kwargs))
}

#[cfg(test)]
#[path = "shellwords_tests.rs"]
mod tests;
