use super::Parser;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::error::SyntaxErrorType;
use crate::error::SyntaxResult;
use crate::lex::LexMode;
use crate::loc::Loc;
use crate::num::parse_number;
use crate::token::TT;

fn hex_value(digits: &str) -> Option<char> {
  u32::from_str_radix(digits, 16).ok().and_then(char::from_u32)
}

/// Interprets escape sequences in the raw text between the delimiters of a string or template
/// chunk. Returns None on a malformed escape.
pub fn cook(raw: &str) -> Option<String> {
  let mut out = String::with_capacity(raw.len());
  let mut chars = raw.chars().peekable();
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    let esc = chars.next()?;
    match esc {
      'n' => out.push('\n'),
      'r' => out.push('\r'),
      't' => out.push('\t'),
      'b' => out.push('\u{8}'),
      'f' => out.push('\u{c}'),
      'v' => out.push('\u{b}'),
      '0' if !chars.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
      'x' => {
        let digits: String = chars.by_ref().take(2).collect();
        if digits.len() != 2 {
          return None;
        }
        out.push(hex_value(&digits)?);
      }
      'u' => {
        if chars.peek() == Some(&'{') {
          chars.next();
          let mut digits = String::new();
          loop {
            match chars.next()? {
              '}' => break,
              d => digits.push(d),
            };
          }
          out.push(hex_value(&digits)?);
        } else {
          let digits: String = chars.by_ref().take(4).collect();
          if digits.len() != 4 {
            return None;
          }
          out.push(hex_value(&digits)?);
        }
      }
      // Line continuation.
      '\n' | '\u{2028}' | '\u{2029}' => {}
      '\r' => {
        if chars.peek() == Some(&'\n') {
          chars.next();
        }
      }
      c if c.is_ascii_digit() => return None,
      c => out.push(c),
    };
  }
  Some(out)
}

impl<'a> Parser<'a> {
  pub fn lit_str(&mut self) -> SyntaxResult<(Loc, String)> {
    let t = self.require(TT::LiteralString)?;
    let raw = self.str(t.loc);
    let inner = &raw[1..raw.len() - 1];
    let value = cook(inner).ok_or_else(|| t.error(SyntaxErrorType::InvalidCharacterEscape))?;
    Ok((t.loc, value))
  }

  pub fn lit_num(&mut self) -> SyntaxResult<NodeId> {
    let t = self.require(TT::LiteralNumber)?;
    let value = parse_number(self.str(t.loc))
      .ok_or_else(|| t.error(SyntaxErrorType::MalformedLiteralNumber))?;
    Ok(self.push(t.loc, NodeKind::Num { value }))
  }

  /// Parses a template literal whose first chunk is the next token. Quasis keep their raw text.
  pub fn lit_template(&mut self) -> SyntaxResult<NodeId> {
    let first = self.consume();
    let mut loc = first.loc;
    let mut quasis = Vec::new();
    let mut exprs = Vec::new();
    let mut chunk = first;
    // The first chunk starts with the opening backtick.
    let mut skip_start = 1;
    loop {
      let raw = self.str(chunk.loc);
      let ends = chunk.typ == TT::LiteralTemplatePartStringEnd;
      let trim_end = if ends { 1 } else { 2 };
      if raw.len() < skip_start + trim_end {
        return Err(chunk.error(SyntaxErrorType::UnexpectedEnd));
      }
      let text = &raw[skip_start..raw.len() - trim_end];
      if cook(text).is_none() {
        return Err(chunk.error(SyntaxErrorType::InvalidCharacterEscape));
      }
      quasis.push(text.to_string());
      match chunk.typ {
        TT::LiteralTemplatePartStringEnd => break,
        TT::LiteralTemplatePartString => {}
        _ => return Err(chunk.error(SyntaxErrorType::ExpectedSyntax("template literal"))),
      };
      exprs.push(self.expr()?);
      self.require(TT::BraceClose)?;
      chunk = self.consume_with_mode(LexMode::TemplateStrContinue);
      if chunk.typ == TT::Invalid {
        return Err(chunk.error(SyntaxErrorType::UnexpectedEnd));
      }
      loc.extend(chunk.loc);
      skip_start = 0;
    }
    Ok(self.push(loc, NodeKind::Template { quasis, exprs }))
  }
}

#[cfg(test)]
mod tests {
  use super::cook;

  #[test]
  fn cooks_escapes() {
    assert_eq!(cook(r"a\nb").as_deref(), Some("a\nb"));
    assert_eq!(cook(r"\x41B\u{43}").as_deref(), Some("ABC"));
    assert_eq!(cook(r"\`\$").as_deref(), Some("`$"));
    assert_eq!(cook("a\\\nb").as_deref(), Some("ab"));
    assert_eq!(cook(r"\x4"), None);
    assert_eq!(cook(r"\1"), None);
  }
}
