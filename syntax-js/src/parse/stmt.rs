use super::expr::is_binding_token;
use super::ParseCtx;
use super::Parser;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::ast::VarDeclMode;
use crate::error::SyntaxErrorType;
use crate::error::SyntaxResult;
use crate::token::TT;

impl<'a> Parser<'a> {
  pub fn stmt(&mut self, ctx: ParseCtx) -> SyntaxResult<NodeId> {
    let (t0, t1) = self.peek_2();
    #[rustfmt::skip]
    let stmt = match t0.typ {
      TT::BraceOpen => self.block_stmt(ctx.nested())?,
      TT::KeywordConst | TT::KeywordVar => self.var_stmt()?,
      // `let` is contextual; only a declaration when followed by a binding.
      TT::KeywordLet if is_binding_token(t1.typ) || matches!(t1.typ, TT::BraceOpen | TT::BracketOpen) => self.var_stmt()?,
      TT::KeywordFunction => self.function(true)?,
      TT::KeywordIf => self.if_stmt(ctx)?,
      TT::KeywordReturn => self.return_stmt(ctx)?,
      TT::KeywordThrow => self.throw_stmt()?,
      TT::Semicolon => {
        self.consume();
        self.push(t0.loc, NodeKind::Empty)
      }
      TT::KeywordImport => self.import_stmt(ctx)?,
      TT::KeywordExport => self.export_stmt(ctx)?,
      _ => self.expr_stmt()?,
    };
    Ok(stmt)
  }

  pub fn block_stmt(&mut self, ctx: ParseCtx) -> SyntaxResult<NodeId> {
    let start = self.require(TT::BraceOpen)?.loc;
    let mut body = Vec::new();
    let end = loop {
      if let Some(end) = self.consume_if(TT::BraceClose).match_loc() {
        break end;
      }
      let t = self.peek();
      if t.typ == TT::EOF {
        return Err(t.error(SyntaxErrorType::UnexpectedEnd));
      }
      body.push(self.stmt(ctx.nested())?);
    };
    Ok(self.push(start + end, NodeKind::Block { body }))
  }

  /// Parses a declaration without its terminator, so `export` can share it.
  pub fn var_decl(&mut self) -> SyntaxResult<NodeId> {
    let t = self.consume();
    let mode = match t.typ {
      TT::KeywordConst => VarDeclMode::Const,
      TT::KeywordLet => VarDeclMode::Let,
      TT::KeywordVar => VarDeclMode::Var,
      _ => return Err(t.error(SyntaxErrorType::ExpectedSyntax("variable declaration"))),
    };
    let mut loc = t.loc;
    let mut declarators = Vec::new();
    loop {
      let binding = self.binding()?;
      let mut decl_loc = self.loc_of(binding);
      let init = if self.consume_if(TT::Equals).is_match() {
        let init = self.assignment()?;
        decl_loc.extend(self.loc_of(init));
        Some(init)
      } else if mode == VarDeclMode::Const {
        return Err(
          self
            .peek()
            .error(SyntaxErrorType::ExpectedSyntax("const initializer")),
        );
      } else {
        None
      };
      loc.extend(decl_loc);
      declarators.push(self.push(decl_loc, NodeKind::VarDeclarator { binding, init }));
      if !self.consume_if(TT::Comma).is_match() {
        break;
      }
    }
    Ok(self.push(loc, NodeKind::VarDecl { mode, declarators }))
  }

  fn var_stmt(&mut self) -> SyntaxResult<NodeId> {
    let decl = self.var_decl()?;
    self.require_stmt_end()?;
    Ok(decl)
  }

  fn if_stmt(&mut self, ctx: ParseCtx) -> SyntaxResult<NodeId> {
    let start = self.require(TT::KeywordIf)?.loc;
    self.require(TT::ParenthesisOpen)?;
    let test = self.expr()?;
    self.require(TT::ParenthesisClose)?;
    let consequent = self.stmt(ctx.nested())?;
    let mut loc = start + self.loc_of(consequent);
    let alternate = if self.consume_if(TT::KeywordElse).is_match() {
      let alt = self.stmt(ctx.nested())?;
      loc.extend(self.loc_of(alt));
      Some(alt)
    } else {
      None
    };
    Ok(self.push(loc, NodeKind::If {
      test,
      consequent,
      alternate,
    }))
  }

  fn return_stmt(&mut self, ctx: ParseCtx) -> SyntaxResult<NodeId> {
    let t = self.require(TT::KeywordReturn)?;
    if !ctx.in_function {
      return Err(t.error(SyntaxErrorType::UnsupportedSyntax("return outside of function")));
    }
    let next = self.peek();
    let value = if matches!(next.typ, TT::Semicolon | TT::BraceClose | TT::EOF)
      || next.preceded_by_line_terminator
    {
      None
    } else {
      Some(self.expr()?)
    };
    self.require_stmt_end()?;
    let loc = t.loc.add_option(value.map(|v| self.loc_of(v)));
    Ok(self.push(loc, NodeKind::Return { value }))
  }

  fn throw_stmt(&mut self) -> SyntaxResult<NodeId> {
    let start = self.require(TT::KeywordThrow)?.loc;
    let value = self.expr()?;
    self.require_stmt_end()?;
    let loc = start + self.loc_of(value);
    Ok(self.push(loc, NodeKind::Throw { value }))
  }

  fn expr_stmt(&mut self) -> SyntaxResult<NodeId> {
    let expr = self.expr()?;
    self.require_stmt_end()?;
    let loc = self.loc_of(expr);
    Ok(self.push(loc, NodeKind::ExprStmt { expr }))
  }
}
