use crate::loc::Loc;
use crate::token::Token;
use crate::token::KEYWORD_STRS;
use crate::token::OPERATORS_MAPPING;
use crate::token::TT;
use aho_corasick::AhoCorasick;
use aho_corasick::AhoCorasickBuilder;
use aho_corasick::AhoCorasickKind;
use aho_corasick::Anchored;
use aho_corasick::Input;
use aho_corasick::MatchKind;
use aho_corasick::StartKind;
use core::ops::Index;
use memchr::memchr;
use memchr::memchr2;
use once_cell::sync::Lazy;


#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LexMode {
  Standard,
  // Lexes the next chunk of a template literal, starting immediately after the `}` that closed the
  // previous substitution.
  TemplateStrContinue,
}

#[derive(Copy, Clone)]
pub struct LexerCheckpoint {
  next: usize,
}

// Contains the match length.
#[derive(Copy, Clone)]
struct Match(usize);

impl Match {
  pub fn len(&self) -> usize {
    self.0
  }
}

struct PatternMatcher {
  patterns: Vec<TT>,
  matcher: Option<AhoCorasick>,
}

impl PatternMatcher {
  pub fn new<D: AsRef<str>>(patterns: Vec<(TT, D)>) -> Self {
    let (tts, syns): (Vec<_>, Vec<_>) = patterns.into_iter().unzip();
    let byte_syns: Vec<Vec<u8>> = syns.iter().map(|s| s.as_ref().as_bytes().to_vec()).collect();
    // Building only fails for pathological pattern sets; an absent matcher simply never matches.
    let matcher = AhoCorasickBuilder::new()
      .start_kind(StartKind::Anchored)
      .kind(Some(AhoCorasickKind::DFA))
      .match_kind(MatchKind::LeftmostLongest)
      .build(byte_syns)
      .ok();
    PatternMatcher {
      patterns: tts,
      matcher,
    }
  }

  pub fn find(&self, lexer: &Lexer) -> Option<(TT, Match)> {
    let matcher = self.matcher.as_ref()?;
    matcher
      .find(Input::new(&lexer.source[lexer.next..]).anchored(Anchored::Yes))
      .map(|m| (self.patterns[m.pattern().as_usize()], Match(m.end())))
  }
}

static OPERATORS: Lazy<PatternMatcher> = Lazy::new(|| {
  PatternMatcher::new(
    OPERATORS_MAPPING
      .iter()
      .map(|(tt, s)| (*tt, *s))
      .collect::<Vec<_>>(),
  )
});

static INSIG: Lazy<PatternMatcher> = Lazy::new(|| {
  PatternMatcher::new(vec![
    (TT::LineTerminator, "\r"),
    (TT::LineTerminator, "\n"),
    (TT::LineTerminator, "\u{2028}"),
    (TT::LineTerminator, "\u{2029}"),
    (TT::Whitespace, " "),
    (TT::Whitespace, "\t"),
    (TT::Whitespace, "\u{000b}"),
    (TT::Whitespace, "\u{000c}"),
    (TT::Whitespace, "\u{00a0}"),
    (TT::Whitespace, "\u{feff}"),
    (TT::CommentMultiline, "/*"),
    (TT::CommentSingle, "//"),
  ])
});

pub struct Lexer<'a> {
  source: &'a str,
  next: usize,
}

impl<'a> Lexer<'a> {
  pub fn new(code: &'a str) -> Lexer<'a> {
    Lexer {
      source: code,
      next: 0,
    }
  }

  pub fn next(&self) -> usize {
    self.next
  }

  pub fn source(&self) -> &'a str {
    self.source
  }

  fn end(&self) -> usize {
    self.source.len()
  }

  fn remaining(&self) -> usize {
    self.end() - self.next
  }

  pub fn source_range(&self) -> Loc {
    Loc(0, self.end())
  }

  fn eof_range(&self) -> Loc {
    Loc(self.end(), self.end())
  }

  fn at_end(&self) -> bool {
    self.next >= self.end()
  }

  fn peek_or_eof(&self, n: usize) -> Option<char> {
    self.source[self.next..].chars().nth(n)
  }

  pub fn checkpoint(&self) -> LexerCheckpoint {
    LexerCheckpoint { next: self.next }
  }

  pub fn since_checkpoint(&self, checkpoint: LexerCheckpoint) -> Loc {
    Loc(checkpoint.next, self.next)
  }

  pub fn apply_checkpoint(&mut self, checkpoint: LexerCheckpoint) {
    self.next = checkpoint.next;
  }

  pub fn set_next(&mut self, next: usize) {
    self.next = next;
  }

  fn while_not_2_chars(&self, a: u8, b: u8) -> Match {
    Match(memchr2(a, b, self.source[self.next..].as_bytes()).unwrap_or(self.remaining()))
  }

  fn while_not_char(&self, c: u8) -> Match {
    Match(memchr(c, self.source[self.next..].as_bytes()).unwrap_or(self.remaining()))
  }

  fn while_pred(&self, pred: impl Fn(char) -> bool) -> Match {
    let mut len = 0;
    for ch in self.source[self.next..].chars() {
      if pred(ch) {
        len += ch.len_utf8();
      } else {
        break;
      }
    }
    Match(len)
  }

  fn consume(&mut self, m: Match) -> Match {
    self.next += m.len();
    m
  }

  fn consume_char(&mut self) -> Option<char> {
    let c = self.peek_or_eof(0)?;
    self.next += c.len_utf8();
    Some(c)
  }

  fn drive(&mut self, preceded_by_line_terminator: bool, f: impl FnOnce(&mut Self) -> Option<TT>) -> Token {
    let cp = self.checkpoint();
    let typ = f(self).unwrap_or(TT::Invalid);
    Token {
      loc: self.since_checkpoint(cp),
      typ,
      preceded_by_line_terminator,
    }
  }
}

impl<'a> Index<Loc> for Lexer<'a> {
  type Output = str;

  fn index(&self, index: Loc) -> &Self::Output {
    &self.source[index.0..index.1]
  }
}

pub fn is_id_start(c: char) -> bool {
  c == '$' || c == '_' || c.is_alphabetic()
}

pub fn is_id_continue(c: char) -> bool {
  is_id_start(c) || c.is_ascii_digit() || c == '\u{200c}' || c == '\u{200d}'
}

// Returns whether the comment contained a line terminator.
fn lex_multiline_comment(lexer: &mut Lexer<'_>) -> bool {
  let rest = &lexer.source[lexer.next + 2..];
  let (len, body) = match rest.find("*/") {
    Some(pos) => (pos + 4, &rest[..pos]),
    // An unterminated comment swallows the rest of the file.
    None => (rest.len() + 2, rest),
  };
  lexer.next += len;
  body.contains(|c: char| matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}'))
}

fn lex_identifier(lexer: &mut Lexer<'_>) -> TT {
  let m = lexer.while_pred(is_id_continue);
  let start = lexer.next;
  lexer.consume(m);
  let word = &lexer.source[start..lexer.next];
  KEYWORD_STRS.get(word).copied().unwrap_or(TT::Identifier)
}

fn lex_number(lexer: &mut Lexer<'_>) -> Option<TT> {
  if lexer.source[lexer.next..].starts_with("0x") || lexer.source[lexer.next..].starts_with("0X") {
    lexer.next += 2;
    let m = lexer.while_pred(|c| c.is_ascii_hexdigit());
    if m.len() == 0 {
      return None;
    }
    lexer.consume(m);
    return Some(TT::LiteralNumber);
  }
  lexer.consume(lexer.while_pred(|c| c.is_ascii_digit() || c == '_'));
  if lexer.peek_or_eof(0) == Some('.') {
    lexer.next += 1;
    lexer.consume(lexer.while_pred(|c| c.is_ascii_digit() || c == '_'));
  }
  if matches!(lexer.peek_or_eof(0), Some('e' | 'E')) {
    lexer.next += 1;
    if matches!(lexer.peek_or_eof(0), Some('+' | '-')) {
      lexer.next += 1;
    }
    let m = lexer.while_pred(|c| c.is_ascii_digit());
    if m.len() == 0 {
      return None;
    }
    lexer.consume(m);
  }
  if lexer.peek_or_eof(0).is_some_and(is_id_start) {
    return None;
  }
  Some(TT::LiteralNumber)
}

fn lex_string(lexer: &mut Lexer<'_>) -> Option<TT> {
  let quote = lexer.consume_char()?;
  loop {
    match lexer.consume_char()? {
      '\\' => {
        lexer.consume_char()?;
      }
      '\n' | '\r' => return None,
      c if c == quote => return Some(TT::LiteralString),
      _ => {}
    };
  }
}

// Lexes template characters up to and including either `${` or the closing backtick.
fn lex_template_chunk(lexer: &mut Lexer<'_>) -> Option<TT> {
  loop {
    let m = lexer.while_not_2_chars(b'`', b'\\');
    let chunk = &lexer.source[lexer.next..lexer.next + m.len()];
    if let Some(pos) = chunk.find("${") {
      lexer.next += pos + 2;
      return Some(TT::LiteralTemplatePartString);
    }
    lexer.consume(m);
    match lexer.consume_char()? {
      '`' => return Some(TT::LiteralTemplatePartStringEnd),
      // Escaped character; consumed verbatim and cooked by the parser.
      _ => {
        lexer.consume_char()?;
      }
    };
  }
}

pub fn lex_next(lexer: &mut Lexer<'_>, mode: LexMode) -> Token {
  if mode == LexMode::TemplateStrContinue {
    return lexer.drive(false, lex_template_chunk);
  };

  let mut preceded_by_line_terminator = false;
  while let Some((tt, mat)) = INSIG.find(lexer) {
    match tt {
      TT::LineTerminator => {
        lexer.consume(mat);
        preceded_by_line_terminator = true;
      }
      TT::Whitespace => {
        lexer.consume(mat);
      }
      TT::CommentMultiline => {
        preceded_by_line_terminator |= lex_multiline_comment(lexer);
      }
      TT::CommentSingle => {
        // The line terminator itself is left for the next iteration.
        lexer.consume(lexer.while_not_char(b'\n'));
      }
      _ => break,
    };
  }

  // EOF is different from Invalid, so we emit it specifically instead of letting drive return an Invalid.
  if lexer.at_end() {
    return Token {
      loc: lexer.eof_range(),
      typ: TT::EOF,
      preceded_by_line_terminator,
    };
  };

  lexer.drive(preceded_by_line_terminator, |lexer| {
    let c = lexer.peek_or_eof(0)?;
    if is_id_start(c) {
      return Some(lex_identifier(lexer));
    }
    if c.is_ascii_digit() {
      return lex_number(lexer);
    }
    if c == '.' && lexer.peek_or_eof(1).is_some_and(|c| c.is_ascii_digit()) {
      return lex_number(lexer);
    }
    if c == '"' || c == '\'' {
      return lex_string(lexer);
    }
    if c == '`' {
      lexer.next += 1;
      return lex_template_chunk(lexer);
    }
    let (tt, m) = OPERATORS.find(lexer)?;
    lexer.consume(m);
    Some(tt)
  })
}

/// Lexes the entire source in standard mode, stopping after EOF or the first invalid token.
/// Template literals are returned as their opening chunk only; this is a debugging aid.
pub fn lex_all(source: &str) -> Vec<Token> {
  let mut lexer = Lexer::new(source);
  let mut tokens = Vec::new();
  loop {
    let t = lex_next(&mut lexer, LexMode::Standard);
    let stop = matches!(t.typ, TT::EOF | TT::Invalid);
    tokens.push(t);
    if stop {
      break;
    }
  }
  tokens
}
