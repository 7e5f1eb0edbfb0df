use crate::ast::Ast;
use crate::ast::Node;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::error::SyntaxError;
use crate::error::SyntaxErrorType;
use crate::error::SyntaxResult;
use crate::lex::lex_next;
use crate::lex::LexMode;
use crate::lex::Lexer;
use crate::loc::Loc;
use crate::token::Token;
use crate::token::TT;
use std::sync::Arc;

pub mod expr;
pub mod import_export;
pub mod lit;
pub mod stmt;
#[cfg(test)]
mod tests;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TopLevelMode {
  // Scripts cannot contain import or export statements.
  Global,
  #[default]
  Module,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ParseOptions {
  pub top_level_mode: TopLevelMode,
}

// Passed by value to every statement parser; changes come from altered copies.
#[derive(Clone, Copy)]
pub struct ParseCtx {
  pub top_level: bool,
  pub in_function: bool,
  pub mode: TopLevelMode,
}

impl ParseCtx {
  pub fn nested(&self) -> ParseCtx {
    ParseCtx {
      top_level: false,
      ..*self
    }
  }

  pub fn in_function(&self) -> ParseCtx {
    ParseCtx {
      top_level: false,
      in_function: true,
      ..*self
    }
  }
}

#[derive(Debug)]
#[must_use]
pub struct MaybeToken {
  typ: TT,
  loc: Loc,
  matched: bool,
}

impl MaybeToken {
  pub fn is_match(&self) -> bool {
    self.matched
  }

  pub fn match_loc(&self) -> Option<Loc> {
    if self.matched {
      Some(self.loc)
    } else {
      None
    }
  }

  pub fn error(&self, err: SyntaxErrorType) -> SyntaxError {
    self.loc.error(err, Some(self.typ))
  }
}

#[derive(Clone, Copy)]
pub struct ParserCheckpoint {
  next_tok_i: usize,
}

struct BufferedToken {
  token: Token,
  lex_mode: LexMode,
}

pub struct Parser<'a> {
  lexer: Lexer<'a>,
  buf: Vec<BufferedToken>,
  next_tok_i: usize,
  nodes: Vec<Node>,
}

// Parsing methods live on `Parser` across the submodules so they can call each other through `self`
// without imports.
impl<'a> Parser<'a> {
  pub fn new(lexer: Lexer<'a>) -> Parser<'a> {
    Parser {
      lexer,
      buf: Vec::new(),
      next_tok_i: 0,
      nodes: Vec::new(),
    }
  }

  pub fn source_range(&self) -> Loc {
    self.lexer.source_range()
  }

  pub fn str(&self, loc: Loc) -> &'a str {
    loc.slice(self.lexer.source())
  }

  pub fn string(&self, loc: Loc) -> String {
    self.str(loc).to_string()
  }

  pub fn checkpoint(&self) -> ParserCheckpoint {
    ParserCheckpoint {
      next_tok_i: self.next_tok_i,
    }
  }

  pub fn restore_checkpoint(&mut self, checkpoint: ParserCheckpoint) {
    self.next_tok_i = checkpoint.next_tok_i;
  }

  fn reset_to(&mut self, n: usize) {
    self.next_tok_i = n;
    self.buf.truncate(n);
    match self.buf.last() {
      Some(t) => self.lexer.set_next(t.token.loc.1),
      None => self.lexer.set_next(0),
    };
  }

  fn forward<K: FnOnce(&Token) -> bool>(&mut self, mode: LexMode, keep: K) -> (bool, Token) {
    // A token buffered under a different lex mode must be re-lexed.
    if self
      .buf
      .get(self.next_tok_i)
      .is_some_and(|t| t.lex_mode != mode)
    {
      self.reset_to(self.next_tok_i);
    }
    if self.buf.len() == self.next_tok_i {
      let token = lex_next(&mut self.lexer, mode);
      self.buf.push(BufferedToken {
        token,
        lex_mode: mode,
      });
    }
    let t = self.buf[self.next_tok_i].token.clone();
    let k = keep(&t);
    if k {
      self.next_tok_i += 1;
    };
    (k, t)
  }

  pub fn consume_with_mode(&mut self, mode: LexMode) -> Token {
    self.forward(mode, |_| true).1
  }

  pub fn consume(&mut self) -> Token {
    self.consume_with_mode(LexMode::Standard)
  }

  pub fn peek(&mut self) -> Token {
    self.forward(LexMode::Standard, |_| false).1
  }

  pub fn peek_2(&mut self) -> (Token, Token) {
    let cp = self.checkpoint();
    let a = self.consume();
    let b = self.consume();
    self.restore_checkpoint(cp);
    (a, b)
  }

  pub fn consume_if(&mut self, typ: TT) -> MaybeToken {
    let (matched, t) = self.forward(LexMode::Standard, |t| t.typ == typ);
    MaybeToken {
      typ,
      matched,
      loc: t.loc,
    }
  }

  pub fn require_with_mode(&mut self, typ: TT, mode: LexMode) -> SyntaxResult<Token> {
    let t = self.consume_with_mode(mode);
    if t.typ != typ {
      Err(t.error(SyntaxErrorType::RequiredTokenNotFound(typ)))
    } else {
      Ok(t)
    }
  }

  pub fn require(&mut self, typ: TT) -> SyntaxResult<Token> {
    self.require_with_mode(typ, LexMode::Standard)
  }

  pub fn require_predicate<P: FnOnce(TT) -> bool>(
    &mut self,
    pred: P,
    expected: &'static str,
  ) -> SyntaxResult<Token> {
    let t = self.consume();
    if t.typ == TT::EOF {
      return Err(t.error(SyntaxErrorType::UnexpectedEnd));
    }
    if !pred(t.typ) {
      Err(t.error(SyntaxErrorType::ExpectedSyntax(expected)))
    } else {
      Ok(t)
    }
  }

  /// Requires a statement terminator: a semicolon, or an implied one before `}`, EOF, or a line
  /// break.
  pub fn require_stmt_end(&mut self) -> SyntaxResult<()> {
    if self.consume_if(TT::Semicolon).is_match() {
      return Ok(());
    }
    let t = self.peek();
    if matches!(t.typ, TT::BraceClose | TT::EOF) || t.preceded_by_line_terminator {
      Ok(())
    } else {
      Err(t.error(SyntaxErrorType::RequiredTokenNotFound(TT::Semicolon)))
    }
  }

  pub fn push(&mut self, loc: Loc, kind: NodeKind) -> NodeId {
    let id = NodeId(self.nodes.len() as u32);
    self.nodes.push(Node { loc, kind });
    id
  }

  pub fn loc_of(&self, id: NodeId) -> Loc {
    self.nodes[id.index()].loc
  }

  pub fn kind_of(&self, id: NodeId) -> &NodeKind {
    &self.nodes[id.index()].kind
  }

  pub fn top_level(mut self, mode: TopLevelMode) -> SyntaxResult<Ast> {
    let ctx = ParseCtx {
      top_level: true,
      in_function: false,
      mode,
    };
    let mut body = Vec::new();
    while self.peek().typ != TT::EOF {
      body.push(self.stmt(ctx)?);
    }
    let loc = self.source_range();
    let root = self.push(loc, NodeKind::Program { body });
    let source: Arc<str> = Arc::from(self.lexer.source());
    Ok(Ast::new(self.nodes, root, source))
  }
}
