use super::Parser;
use super::ParseCtx;
use super::TopLevelMode;
use crate::ast::AssignOp;
use crate::ast::BinaryOp;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::ast::PropKey;
use crate::ast::UnaryOp;
use crate::error::SyntaxErrorType;
use crate::error::SyntaxResult;
use crate::lex::LexMode;
use crate::token::TT;

/// Tokens that may name a binding or a reference.
pub fn is_binding_token(typ: TT) -> bool {
  typ == TT::Identifier || typ.is_contextual_keyword()
}

fn binary_op(typ: TT) -> Option<BinaryOp> {
  Some(match typ {
    TT::Ampersand => BinaryOp::BitAnd,
    TT::AmpersandAmpersand => BinaryOp::LogicalAnd,
    TT::Asterisk => BinaryOp::Mul,
    TT::AsteriskAsterisk => BinaryOp::Exp,
    TT::Bar => BinaryOp::BitOr,
    TT::BarBar => BinaryOp::LogicalOr,
    TT::Caret => BinaryOp::BitXor,
    TT::ChevronLeft => BinaryOp::Lt,
    TT::ChevronLeftEquals => BinaryOp::LtEq,
    TT::ChevronRight => BinaryOp::Gt,
    TT::ChevronRightEquals => BinaryOp::GtEq,
    TT::EqualsEquals => BinaryOp::Eq,
    TT::EqualsEqualsEquals => BinaryOp::StrictEq,
    TT::ExclamationEquals => BinaryOp::NotEq,
    TT::ExclamationEqualsEquals => BinaryOp::StrictNotEq,
    TT::Hyphen => BinaryOp::Sub,
    TT::Percent => BinaryOp::Rem,
    TT::Plus => BinaryOp::Add,
    TT::QuestionQuestion => BinaryOp::Nullish,
    TT::Slash => BinaryOp::Div,
    _ => return None,
  })
}

fn unary_op(typ: TT) -> Option<UnaryOp> {
  Some(match typ {
    TT::Exclamation => UnaryOp::Not,
    TT::Hyphen => UnaryOp::Neg,
    TT::KeywordTypeof => UnaryOp::Typeof,
    TT::KeywordVoid => UnaryOp::Void,
    TT::Plus => UnaryOp::Plus,
    _ => return None,
  })
}

fn assign_op(typ: TT) -> Option<AssignOp> {
  Some(match typ {
    TT::AsteriskEquals => AssignOp::MulAssign,
    TT::Equals => AssignOp::Assign,
    TT::HyphenEquals => AssignOp::SubAssign,
    TT::PlusEquals => AssignOp::AddAssign,
    _ => return None,
  })
}

impl<'a> Parser<'a> {
  pub fn expr(&mut self) -> SyntaxResult<NodeId> {
    self.assignment()
  }

  pub fn binding(&mut self) -> SyntaxResult<NodeId> {
    let t = self.peek();
    if matches!(t.typ, TT::BraceOpen | TT::BracketOpen | TT::DotDotDot) {
      return Err(t.error(SyntaxErrorType::UnsupportedSyntax("destructuring pattern")));
    }
    let t = self.require_predicate(is_binding_token, "identifier")?;
    let name = self.string(t.loc);
    Ok(self.push(t.loc, NodeKind::Binding { name }))
  }

  // Token-level lookahead; nothing is allocated, so the caller only needs to rewind the tokens.
  fn scan_arrow(&mut self) -> bool {
    let t = self.consume();
    if is_binding_token(t.typ) {
      return self.peek().typ == TT::EqualsChevronRight;
    }
    if t.typ != TT::ParenthesisOpen {
      return false;
    }
    let mut parens = 1usize;
    let mut braces = 0usize;
    // Brace depth at which each open template substitution started.
    let mut templates = Vec::<usize>::new();
    while parens > 0 {
      let t = self.consume();
      match t.typ {
        TT::ParenthesisOpen => parens += 1,
        TT::ParenthesisClose => parens -= 1,
        TT::BraceOpen => braces += 1,
        TT::LiteralTemplatePartString => templates.push(braces),
        TT::BraceClose if templates.last() == Some(&braces) => {
          match self.consume_with_mode(LexMode::TemplateStrContinue).typ {
            TT::LiteralTemplatePartStringEnd => {
              templates.pop();
            }
            TT::LiteralTemplatePartString => {}
            _ => return false,
          };
        }
        TT::BraceClose => braces = braces.saturating_sub(1),
        TT::EOF | TT::Invalid => return false,
        _ => {}
      };
    }
    let next = self.peek();
    next.typ == TT::EqualsChevronRight && !next.preceded_by_line_terminator
  }

  fn arrow_ahead(&mut self) -> bool {
    let cp = self.checkpoint();
    let res = self.scan_arrow();
    self.restore_checkpoint(cp);
    res
  }

  pub fn assignment(&mut self) -> SyntaxResult<NodeId> {
    if self.arrow_ahead() {
      return self.arrow_function();
    }
    let target = self.conditional()?;
    let t = self.peek();
    let Some(op) = assign_op(t.typ) else {
      return Ok(target);
    };
    if !matches!(
      self.kind_of(target),
      NodeKind::Ident { .. } | NodeKind::Member { .. } | NodeKind::Index { .. }
    ) {
      return Err(t.error(SyntaxErrorType::InvalidAssigmentTarget));
    }
    self.consume();
    let value = self.assignment()?;
    let loc = self.loc_of(target) + self.loc_of(value);
    Ok(self.push(loc, NodeKind::Assign { op, target, value }))
  }

  fn conditional(&mut self) -> SyntaxResult<NodeId> {
    let test = self.binary(1)?;
    if !self.consume_if(TT::Question).is_match() {
      return Ok(test);
    }
    let consequent = self.assignment()?;
    self.require(TT::Colon)?;
    let alternate = self.assignment()?;
    let loc = self.loc_of(test) + self.loc_of(alternate);
    Ok(self.push(loc, NodeKind::Conditional {
      test,
      consequent,
      alternate,
    }))
  }

  // Precedence climbing; `min_prec` is the loosest operator this call may consume.
  fn binary(&mut self, min_prec: u8) -> SyntaxResult<NodeId> {
    let mut left = self.unary()?;
    loop {
      let Some(op) = binary_op(self.peek().typ) else {
        break;
      };
      let prec = op.precedence();
      if prec < min_prec {
        break;
      }
      self.consume();
      let next_min = if op.is_right_associative() {
        prec
      } else {
        prec + 1
      };
      let right = self.binary(next_min)?;
      let loc = self.loc_of(left) + self.loc_of(right);
      left = self.push(loc, NodeKind::Binary { op, left, right });
    }
    Ok(left)
  }

  fn unary(&mut self) -> SyntaxResult<NodeId> {
    let t = self.peek();
    let Some(op) = unary_op(t.typ) else {
      return self.call_or_member();
    };
    self.consume();
    let arg = self.unary()?;
    let loc = t.loc + self.loc_of(arg);
    Ok(self.push(loc, NodeKind::Unary { op, arg }))
  }

  fn call_or_member(&mut self) -> SyntaxResult<NodeId> {
    let mut expr = self.primary()?;
    loop {
      let t = self.peek();
      expr = match t.typ {
        TT::Dot => {
          self.consume();
          let prop = self.require_predicate(TT::is_name_like, "property name")?;
          let property = self.string(prop.loc);
          let loc = self.loc_of(expr) + prop.loc;
          self.push(loc, NodeKind::Member {
            object: expr,
            property,
          })
        }
        TT::BracketOpen => {
          self.consume();
          let index = self.expr()?;
          let end = self.require(TT::BracketClose)?.loc;
          let loc = self.loc_of(expr) + end;
          self.push(loc, NodeKind::Index {
            object: expr,
            index,
          })
        }
        TT::ParenthesisOpen => {
          self.consume();
          let mut args = Vec::new();
          let end = loop {
            if let Some(end) = self.consume_if(TT::ParenthesisClose).match_loc() {
              break end;
            }
            if self.peek().typ == TT::DotDotDot {
              return Err(self.peek().error(SyntaxErrorType::UnsupportedSyntax("spread argument")));
            }
            args.push(self.assignment()?);
            if !self.consume_if(TT::Comma).is_match() {
              break self.require(TT::ParenthesisClose)?.loc;
            }
          };
          let loc = self.loc_of(expr) + end;
          self.push(loc, NodeKind::Call { callee: expr, args })
        }
        TT::LiteralTemplatePartString | TT::LiteralTemplatePartStringEnd => {
          let template = self.lit_template()?;
          let loc = self.loc_of(expr) + self.loc_of(template);
          self.push(loc, NodeKind::TaggedTemplate {
            tag: expr,
            template,
          })
        }
        _ => break,
      };
    }
    Ok(expr)
  }

  fn primary(&mut self) -> SyntaxResult<NodeId> {
    let t = self.peek();
    Ok(match t.typ {
      typ if is_binding_token(typ) => {
        self.consume();
        let name = self.string(t.loc);
        self.push(t.loc, NodeKind::Ident { name })
      }
      TT::LiteralNumber => self.lit_num()?,
      TT::LiteralString => {
        let (loc, value) = self.lit_str()?;
        self.push(loc, NodeKind::Str { value })
      }
      TT::LiteralTemplatePartString | TT::LiteralTemplatePartStringEnd => self.lit_template()?,
      TT::LiteralTrue | TT::LiteralFalse => {
        self.consume();
        self.push(t.loc, NodeKind::Bool {
          value: t.typ == TT::LiteralTrue,
        })
      }
      TT::LiteralNull => {
        self.consume();
        self.push(t.loc, NodeKind::Null)
      }
      TT::ParenthesisOpen => {
        self.consume();
        let expr = self.expr()?;
        let end = self.require(TT::ParenthesisClose)?.loc;
        self.push(t.loc + end, NodeKind::Paren { expr })
      }
      TT::BracketOpen => self.array()?,
      TT::BraceOpen => self.object()?,
      TT::KeywordFunction => self.function(false)?,
      TT::EOF => return Err(t.error(SyntaxErrorType::UnexpectedEnd)),
      _ => return Err(t.error(SyntaxErrorType::ExpectedSyntax("expression"))),
    })
  }

  fn array(&mut self) -> SyntaxResult<NodeId> {
    let start = self.require(TT::BracketOpen)?.loc;
    let mut elements = Vec::new();
    let end = loop {
      if let Some(end) = self.consume_if(TT::BracketClose).match_loc() {
        break end;
      }
      let t = self.peek();
      if matches!(t.typ, TT::Comma | TT::DotDotDot) {
        return Err(t.error(SyntaxErrorType::UnsupportedSyntax("array hole or spread")));
      }
      elements.push(self.assignment()?);
      if !self.consume_if(TT::Comma).is_match() {
        break self.require(TT::BracketClose)?.loc;
      }
    };
    Ok(self.push(start + end, NodeKind::Array { elements }))
  }

  fn object(&mut self) -> SyntaxResult<NodeId> {
    let start = self.require(TT::BraceOpen)?.loc;
    let mut props = Vec::new();
    let end = loop {
      if let Some(end) = self.consume_if(TT::BraceClose).match_loc() {
        break end;
      }
      props.push(self.object_prop()?);
      if !self.consume_if(TT::Comma).is_match() {
        break self.require(TT::BraceClose)?.loc;
      }
    };
    Ok(self.push(start + end, NodeKind::Object { props }))
  }

  fn object_prop(&mut self) -> SyntaxResult<NodeId> {
    let t = self.peek();
    let key = match t.typ {
      TT::DotDotDot => {
        return Err(t.error(SyntaxErrorType::UnsupportedSyntax("object spread")));
      }
      TT::BracketOpen => {
        self.consume();
        let key = self.assignment()?;
        self.require(TT::BracketClose)?;
        PropKey::Computed(key)
      }
      TT::LiteralString => PropKey::Name(self.lit_str()?.1),
      TT::LiteralNumber => {
        self.consume();
        PropKey::Name(self.string(t.loc))
      }
      typ if typ.is_name_like() => {
        self.consume();
        PropKey::Name(self.string(t.loc))
      }
      _ => return Err(t.error(SyntaxErrorType::ExpectedSyntax("property name"))),
    };
    let next = self.peek();
    let (value, shorthand) = match next.typ {
      TT::Colon => {
        self.consume();
        (self.assignment()?, false)
      }
      // Method shorthand; represented as a property holding a function expression.
      TT::ParenthesisOpen => {
        let params = self.params()?;
        let body = self.fn_block()?;
        let loc = next.loc + self.loc_of(body);
        let func = self.push(loc, NodeKind::Function {
          name: None,
          params,
          body,
          arrow: false,
          decl: false,
        });
        (func, false)
      }
      _ if is_binding_token(t.typ) => {
        let name = self.string(t.loc);
        (self.push(t.loc, NodeKind::Ident { name }), true)
      }
      _ => return Err(next.error(SyntaxErrorType::RequiredTokenNotFound(TT::Colon))),
    };
    let loc = t.loc + self.loc_of(value);
    Ok(self.push(loc, NodeKind::Property {
      key,
      value,
      shorthand,
    }))
  }

  pub fn function(&mut self, decl: bool) -> SyntaxResult<NodeId> {
    let start = self.require(TT::KeywordFunction)?.loc;
    let t = self.peek();
    let name = if is_binding_token(t.typ) {
      Some(self.binding()?)
    } else if decl {
      return Err(t.error(SyntaxErrorType::ExpectedSyntax("function name")));
    } else {
      None
    };
    let params = self.params()?;
    let body = self.fn_block()?;
    let loc = start + self.loc_of(body);
    Ok(self.push(loc, NodeKind::Function {
      name,
      params,
      body,
      arrow: false,
      decl,
    }))
  }

  pub fn params(&mut self) -> SyntaxResult<Vec<NodeId>> {
    self.require(TT::ParenthesisOpen)?;
    let mut params = Vec::new();
    loop {
      if self.consume_if(TT::ParenthesisClose).is_match() {
        break;
      }
      params.push(self.binding()?);
      let t = self.peek();
      if t.typ == TT::Equals {
        return Err(t.error(SyntaxErrorType::UnsupportedSyntax("default parameter")));
      }
      if !self.consume_if(TT::Comma).is_match() {
        self.require(TT::ParenthesisClose)?;
        break;
      }
    }
    Ok(params)
  }

  pub fn fn_block(&mut self) -> SyntaxResult<NodeId> {
    self.block_stmt(ParseCtx {
      top_level: false,
      in_function: true,
      mode: TopLevelMode::Module,
    })
  }

  fn arrow_function(&mut self) -> SyntaxResult<NodeId> {
    let start = self.peek().loc;
    let params = if self.peek().typ == TT::ParenthesisOpen {
      self.params()?
    } else {
      vec![self.binding()?]
    };
    self.require(TT::EqualsChevronRight)?;
    let body = if self.peek().typ == TT::BraceOpen {
      self.fn_block()?
    } else {
      self.assignment()?
    };
    let loc = start + self.loc_of(body);
    Ok(self.push(loc, NodeKind::Function {
      name: None,
      params,
      body,
      arrow: true,
      decl: false,
    }))
  }
}
