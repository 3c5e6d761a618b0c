//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer knows nothing about semantics beyond recognising keywords,
//! identifiers, numeric literals and operators.
//! Multi-character punctuators are matched before single-character ones to
//! avoid ambiguity, and every token remembers the line it came from so later
//! stages can anchor diagnostics.

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Punctuator,
  Keyword,
  Ident,
  Num,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  pub loc: usize,
  pub len: usize,
  pub line: u32,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(kind: TokenKind, loc: usize, len: usize, value: Option<i64>, line: u32) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
      line,
    }
  }
}

const KEYWORDS: &[&str] = &[
  "int", "return", "if", "else", "for", "while", "do", "break", "continue",
];

const TWO_CHAR_PUNCTUATORS: &[&str] = &[
  "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "++", "--",
];

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;
  let mut line: u32 = 1;

  while i < bytes.len() {
    let c = bytes[i];
    if c == b'\n' {
      line += 1;
      i += 1;
      continue;
    }
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let text = &input[start..i];
      let value = text.parse::<i64>().map_err(|err| CompileError::Lexical {
        message: format!("invalid number '{text}': {err}"),
        line,
      })?;
      tokens.push(Token::new(TokenKind::Num, start, i - start, Some(value), line));
      continue;
    }

    if c.is_ascii_alphabetic() || c == b'_' {
      let start = i;
      i += 1;
      while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
      }
      let text = &input[start..i];
      let kind = if KEYWORDS.contains(&text) {
        TokenKind::Keyword
      } else {
        TokenKind::Ident
      };
      tokens.push(Token::new(kind, start, i - start, None, line));
      continue;
    }

    if let Some(op) = TWO_CHAR_PUNCTUATORS
      .iter()
      .find(|op| input[i..].starts_with(**op))
    {
      tokens.push(Token::new(TokenKind::Punctuator, i, op.len(), None, line));
      i += op.len();
      continue;
    }

    if matches!(
      c,
      b'+'
        | b'-'
        | b'*'
        | b'/'
        | b'%'
        | b'~'
        | b'!'
        | b'&'
        | b'|'
        | b'^'
        | b'<'
        | b'>'
        | b'='
        | b';'
        | b','
        | b'('
        | b')'
        | b'{'
        | b'}'
        | b'?'
        | b':'
    ) {
      tokens.push(Token::new(TokenKind::Punctuator, i, 1, None, line));
      i += 1;
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::Lexical {
      message: format!("invalid character '{invalid_char}'"),
      line,
    });
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, None, line));
  Ok(tokens)
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source)
      .expect("tokenize should succeed")
      .iter()
      .map(|t| t.kind)
      .collect()
  }

  #[test]
  fn multi_char_punctuators_win_over_single() {
    let tokens = tokenize("a <<= b").expect("tokenize should succeed");
    // "<<=" lexes as "<<" then "=".
    let texts: Vec<&str> = tokens
      .iter()
      .filter(|t| t.kind == TokenKind::Punctuator)
      .map(|t| token_text(t, "a <<= b"))
      .collect();
    assert_eq!(texts, vec!["<<", "="]);
  }

  #[test]
  fn keywords_are_not_identifiers() {
    assert_eq!(
      kinds("return returned"),
      vec![TokenKind::Keyword, TokenKind::Ident, TokenKind::Eof]
    );
  }

  #[test]
  fn lines_are_tracked() {
    let tokens = tokenize("1\n2\n\n3").expect("tokenize should succeed");
    let lines: Vec<u32> = tokens.iter().map(|t| t.line).collect();
    assert_eq!(lines, vec![1, 2, 4, 4]);
  }

  #[test]
  fn invalid_character_is_a_lexical_error() {
    let err = tokenize("int x = @;").unwrap_err();
    assert!(matches!(err, CompileError::Lexical { line: 1, .. }));
  }

  #[test]
  fn stream_ends_with_eof() {
    let tokens = tokenize("").expect("tokenize should succeed");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::Eof);
  }
}
