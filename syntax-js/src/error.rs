use crate::loc::Loc;
use crate::token::TT;
use core::fmt;
use core::fmt::Debug;
use core::fmt::Formatter;
use std::error::Error;
use std::fmt::Display;

/// A stable classification of syntax errors produced by the parser.
///
/// Diagnostic codes (prefix `PS`) are assigned per variant and are stable:
/// - `PS0001`: [`SyntaxErrorType::ExpectedNotFound`]
/// - `PS0002`: [`SyntaxErrorType::ExpectedSyntax`]
/// - `PS0003`: [`SyntaxErrorType::InvalidAssigmentTarget`]
/// - `PS0004`: [`SyntaxErrorType::InvalidCharacterEscape`]
/// - `PS0005`: [`SyntaxErrorType::LineTerminatorInString`]
/// - `PS0006`: [`SyntaxErrorType::MalformedLiteralNumber`]
/// - `PS0007`: [`SyntaxErrorType::RequiredTokenNotFound`]
/// - `PS0008`: [`SyntaxErrorType::UnexpectedEnd`]
/// - `PS0009`: [`SyntaxErrorType::UnsupportedSyntax`]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SyntaxErrorType {
  ExpectedNotFound,
  ExpectedSyntax(&'static str),
  InvalidAssigmentTarget,
  InvalidCharacterEscape,
  LineTerminatorInString,
  MalformedLiteralNumber,
  RequiredTokenNotFound(TT),
  UnexpectedEnd,
  UnsupportedSyntax(&'static str),
}

#[derive(Clone)]
pub struct SyntaxError {
  pub typ: SyntaxErrorType,
  pub loc: Loc,
  pub actual_token: Option<TT>,
}

impl SyntaxError {
  pub fn new(typ: SyntaxErrorType, loc: Loc, actual_token: Option<TT>) -> SyntaxError {
    SyntaxError {
      typ,
      loc,
      actual_token,
    }
  }

  /// Renders `code: message at line:col` against the source the error was produced from.
  pub fn render(&self, source: &str) -> String {
    let (line, col) = self.loc.line_col(source);
    format!(
      "{}: {} at {}:{}",
      self.typ.code(),
      self.typ.message(self.actual_token),
      line,
      col
    )
  }
}

impl Debug for SyntaxError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{} around loc [{}:{}]", self, self.loc.0, self.loc.1)
  }
}

impl Display for SyntaxError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{} [token={:?}]", self.typ.message(self.actual_token), self.actual_token)
  }
}

impl Error for SyntaxError {}

impl PartialEq for SyntaxError {
  fn eq(&self, other: &Self) -> bool {
    self.typ == other.typ
  }
}

impl Eq for SyntaxError {}

pub type SyntaxResult<T> = Result<T, SyntaxError>;

impl SyntaxErrorType {
  /// Stable diagnostic code for this syntax error variant.
  pub fn code(&self) -> &'static str {
    match self {
      SyntaxErrorType::ExpectedNotFound => "PS0001",
      SyntaxErrorType::ExpectedSyntax(_) => "PS0002",
      SyntaxErrorType::InvalidAssigmentTarget => "PS0003",
      SyntaxErrorType::InvalidCharacterEscape => "PS0004",
      SyntaxErrorType::LineTerminatorInString => "PS0005",
      SyntaxErrorType::MalformedLiteralNumber => "PS0006",
      SyntaxErrorType::RequiredTokenNotFound(_) => "PS0007",
      SyntaxErrorType::UnexpectedEnd => "PS0008",
      SyntaxErrorType::UnsupportedSyntax(_) => "PS0009",
    }
  }

  /// Human-readable message describing this syntax error.
  pub fn message(&self, actual_token: Option<TT>) -> String {
    match self {
      SyntaxErrorType::ExpectedNotFound => "expected token not found".into(),
      SyntaxErrorType::ExpectedSyntax(expected) => format!("expected {}", expected),
      SyntaxErrorType::InvalidAssigmentTarget => "invalid assignment target".into(),
      SyntaxErrorType::InvalidCharacterEscape => "invalid character escape".into(),
      SyntaxErrorType::LineTerminatorInString => {
        "line terminator not allowed in string literal".into()
      }
      SyntaxErrorType::MalformedLiteralNumber => "malformed number literal".into(),
      SyntaxErrorType::RequiredTokenNotFound(token) => format!("expected token {:?}", token),
      SyntaxErrorType::UnexpectedEnd => actual_token
        .map(|tok| format!("unexpected end before {:?}", tok))
        .unwrap_or_else(|| "unexpected end of input".into()),
      SyntaxErrorType::UnsupportedSyntax(what) => format!("unsupported syntax: {}", what),
    }
  }
}
