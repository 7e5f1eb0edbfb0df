use crate::error::SyntaxError;
use crate::error::SyntaxErrorType;
use crate::loc::Loc;
use ahash::HashMap;
use ahash::HashMapExt;
use once_cell::sync::Lazy;
use serde::Serialize;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub enum TT {
  // Special token used to represent the end of the source code. Easier than using and handling Option everywhere.
  EOF,
  // Special token used to represent invalid source code, so that peeking never needs error handling.
  Invalid,
  // These are only used by lexer.
  CommentMultiline,
  CommentSingle,
  LineTerminator,
  Whitespace,

  Ampersand,
  AmpersandAmpersand,
  Asterisk,
  AsteriskAsterisk,
  AsteriskEquals,
  Bar,
  BarBar,
  BraceClose,
  BraceOpen,
  BracketClose,
  BracketOpen,
  Caret,
  ChevronLeft,
  ChevronLeftEquals,
  ChevronRight,
  ChevronRightEquals,
  Colon,
  Comma,
  Dot,
  DotDotDot,
  Equals,
  EqualsChevronRight,
  EqualsEquals,
  EqualsEqualsEquals,
  Exclamation,
  ExclamationEquals,
  ExclamationEqualsEquals,
  Hyphen,
  HyphenEquals,
  Identifier,
  KeywordAs,
  KeywordConst,
  KeywordDefault,
  KeywordElse,
  KeywordExport,
  KeywordFrom,
  KeywordFunction,
  KeywordIf,
  KeywordImport,
  KeywordLet,
  KeywordReturn,
  KeywordThrow,
  KeywordTypeof,
  KeywordVar,
  KeywordVoid,
  LiteralFalse,
  LiteralNull,
  LiteralNumber,
  LiteralString,
  // A template chunk that ends with `${`, i.e. more chunks follow.
  LiteralTemplatePartString,
  // A template chunk that ends with the closing backtick.
  LiteralTemplatePartStringEnd,
  LiteralTrue,
  ParenthesisClose,
  ParenthesisOpen,
  Percent,
  Plus,
  PlusEquals,
  Question,
  QuestionQuestion,
  Semicolon,
  Slash,
}

#[rustfmt::skip]
pub static OPERATORS_MAPPING: Lazy<HashMap<TT, &'static str>> = Lazy::new(|| {
  let mut map = HashMap::<TT, &'static str>::new();
  map.insert(TT::Ampersand, "&");
  map.insert(TT::AmpersandAmpersand, "&&");
  map.insert(TT::Asterisk, "*");
  map.insert(TT::AsteriskAsterisk, "**");
  map.insert(TT::AsteriskEquals, "*=");
  map.insert(TT::Bar, "|");
  map.insert(TT::BarBar, "||");
  map.insert(TT::BraceClose, "}");
  map.insert(TT::BraceOpen, "{");
  map.insert(TT::BracketClose, "]");
  map.insert(TT::BracketOpen, "[");
  map.insert(TT::Caret, "^");
  map.insert(TT::ChevronLeft, "<");
  map.insert(TT::ChevronLeftEquals, "<=");
  map.insert(TT::ChevronRight, ">");
  map.insert(TT::ChevronRightEquals, ">=");
  map.insert(TT::Colon, ":");
  map.insert(TT::Comma, ",");
  map.insert(TT::Dot, ".");
  map.insert(TT::DotDotDot, "...");
  map.insert(TT::Equals, "=");
  map.insert(TT::EqualsChevronRight, "=>");
  map.insert(TT::EqualsEquals, "==");
  map.insert(TT::EqualsEqualsEquals, "===");
  map.insert(TT::Exclamation, "!");
  map.insert(TT::ExclamationEquals, "!=");
  map.insert(TT::ExclamationEqualsEquals, "!==");
  map.insert(TT::Hyphen, "-");
  map.insert(TT::HyphenEquals, "-=");
  map.insert(TT::ParenthesisClose, ")");
  map.insert(TT::ParenthesisOpen, "(");
  map.insert(TT::Percent, "%");
  map.insert(TT::Plus, "+");
  map.insert(TT::PlusEquals, "+=");
  map.insert(TT::Question, "?");
  map.insert(TT::QuestionQuestion, "??");
  map.insert(TT::Semicolon, ";");
  map.insert(TT::Slash, "/");
  map
});

pub static KEYWORDS_MAPPING: Lazy<HashMap<TT, &'static str>> = Lazy::new(|| {
  let mut map = HashMap::<TT, &'static str>::new();
  map.insert(TT::KeywordAs, "as");
  map.insert(TT::KeywordConst, "const");
  map.insert(TT::KeywordDefault, "default");
  map.insert(TT::KeywordElse, "else");
  map.insert(TT::KeywordExport, "export");
  map.insert(TT::KeywordFrom, "from");
  map.insert(TT::KeywordFunction, "function");
  map.insert(TT::KeywordIf, "if");
  map.insert(TT::KeywordImport, "import");
  map.insert(TT::KeywordLet, "let");
  map.insert(TT::KeywordReturn, "return");
  map.insert(TT::KeywordThrow, "throw");
  map.insert(TT::KeywordTypeof, "typeof");
  map.insert(TT::KeywordVar, "var");
  map.insert(TT::KeywordVoid, "void");
  map.insert(TT::LiteralFalse, "false");
  map.insert(TT::LiteralNull, "null");
  map.insert(TT::LiteralTrue, "true");
  map
});

pub static KEYWORD_STRS: Lazy<HashMap<&'static str, TT>> = Lazy::new(|| {
  KEYWORDS_MAPPING.iter().map(|(tt, s)| (*s, *tt)).collect()
});

impl TT {
  /// Keywords that may still be used as binding and reference names.
  pub fn is_contextual_keyword(self) -> bool {
    matches!(self, TT::KeywordAs | TT::KeywordFrom | TT::KeywordLet)
  }

  /// Tokens that can name an object property or an import/export specifier.
  pub fn is_name_like(self) -> bool {
    self == TT::Identifier || KEYWORDS_MAPPING.contains_key(&self)
  }
}

#[derive(Clone, Debug)]
pub struct Token {
  pub loc: Loc,
  // Whether one or more whitespace characters appear immediately before this token, and at least
  // one of those whitespace characters is a line terminator.
  pub preceded_by_line_terminator: bool,
  pub typ: TT,
}

impl Token {
  pub fn error(&self, typ: SyntaxErrorType) -> SyntaxError {
    self.loc.error(typ, Some(self.typ))
  }
}
