// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell-style word splitting

use thiserror::Error;

/// Errors that can occur while splitting a command line
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenizeError {
    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),
    #[error("trailing backslash")]
    TrailingEscape,
}

/// Split a command line into words
///
/// Supports single quotes (literal), double quotes (backslash escapes
/// `"` and `\`), and backslash escapes outside quotes.
pub fn tokenize(input: &str) -> Result<Vec<String>, TokenizeError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(nc) => current.push(nc),
                        None => return Err(TokenizeError::UnterminatedQuote('\'')),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.peek() {
                            Some(&nc) if nc == '"' || nc == '\\' => {
                                current.push(nc);
                                chars.next();
                            }
                            _ => current.push('\\'),
                        },
                        Some(nc) => current.push(nc),
                        None => return Err(TokenizeError::UnterminatedQuote('"')),
                    }
                }
            }
            '\\' => {
                in_token = true;
                match chars.next() {
                    Some(nc) => current.push(nc),
                    None => return Err(TokenizeError::TrailingEscape),
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(
            tokenize("  build --select  orders ").unwrap(),
            vec!["build", "--select", "orders"]
        );
    }

    #[test]
    fn single_quotes_are_literal() {
        assert_eq!(
            tokenize(r#"run --vars '{"a": "b c"}'"#).unwrap(),
            vec!["run", "--vars", r#"{"a": "b c"}"#]
        );
    }

    #[test]
    fn double_quotes_allow_escapes() {
        assert_eq!(
            tokenize(r#"run --select "tag:\"nightly\" x""#).unwrap(),
            vec!["run", "--select", r#"tag:"nightly" x"#]
        );
    }

    #[test]
    fn empty_quotes_produce_empty_token() {
        assert_eq!(tokenize("run ''").unwrap(), vec!["run", ""]);
    }

    #[test]
    fn reports_unterminated_quotes() {
        assert_eq!(
            tokenize("run 'oops"),
            Err(TokenizeError::UnterminatedQuote('\''))
        );
        assert_eq!(tokenize("run \\"), Err(TokenizeError::TrailingEscape));
    }
}
