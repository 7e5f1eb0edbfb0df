use super::expr::is_binding_token;
use super::ParseCtx;
use super::Parser;
use super::TopLevelMode;
use crate::ast::ImportName;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::error::SyntaxErrorType;
use crate::error::SyntaxResult;
use crate::loc::Loc;
use crate::token::Token;
use crate::token::TT;

impl<'a> Parser<'a> {
  fn require_module_top_level(&self, ctx: ParseCtx, t: &Token) -> SyntaxResult<()> {
    if !ctx.top_level || ctx.mode == TopLevelMode::Global {
      return Err(t.error(SyntaxErrorType::UnsupportedSyntax(
        "import or export outside module top level",
      )));
    }
    Ok(())
  }

  /// An exported or imported name: any identifier name or a string literal.
  fn module_name(&mut self) -> SyntaxResult<(Loc, String)> {
    let t = self.peek();
    if t.typ == TT::LiteralString {
      return self.lit_str();
    }
    let t = self.require_predicate(TT::is_name_like, "module export name")?;
    Ok((t.loc, self.string(t.loc)))
  }

  fn from_clause(&mut self) -> SyntaxResult<(Loc, String)> {
    self.require(TT::KeywordFrom)?;
    let (loc, source) = self.lit_str()?;
    self.require_stmt_end()?;
    Ok((loc, source))
  }

  pub fn import_stmt(&mut self, ctx: ParseCtx) -> SyntaxResult<NodeId> {
    let start = self.require(TT::KeywordImport)?;
    self.require_module_top_level(ctx, &start)?;

    if self.peek().typ == TT::LiteralString {
      let (end, source) = self.lit_str()?;
      self.require_stmt_end()?;
      return Ok(self.push(start.loc + end, NodeKind::Import {
        specifiers: Vec::new(),
        source,
      }));
    }

    let mut specifiers = Vec::new();
    let mut more = true;
    if is_binding_token(self.peek().typ) {
      let binding = self.binding()?;
      let loc = self.loc_of(binding);
      specifiers.push(self.push(loc, NodeKind::ImportSpecifier {
        imported: ImportName::Default,
        binding,
      }));
      more = self.consume_if(TT::Comma).is_match();
    }
    if more {
      let t = self.peek();
      match t.typ {
        TT::Asterisk => {
          self.consume();
          self.require(TT::KeywordAs)?;
          let binding = self.binding()?;
          let loc = t.loc + self.loc_of(binding);
          specifiers.push(self.push(loc, NodeKind::ImportSpecifier {
            imported: ImportName::Namespace,
            binding,
          }));
        }
        TT::BraceOpen => {
          self.consume();
          loop {
            if self.consume_if(TT::BraceClose).is_match() {
              break;
            }
            specifiers.push(self.import_specifier()?);
            if !self.consume_if(TT::Comma).is_match() {
              self.require(TT::BraceClose)?;
              break;
            }
          }
        }
        _ => return Err(t.error(SyntaxErrorType::ExpectedSyntax("import clause"))),
      };
    }
    let (end, source) = self.from_clause()?;
    Ok(self.push(start.loc + end, NodeKind::Import { specifiers, source }))
  }

  fn import_specifier(&mut self) -> SyntaxResult<NodeId> {
    let t = self.peek();
    let (name_loc, name) = self.module_name()?;
    let binding = if self.consume_if(TT::KeywordAs).is_match() {
      self.binding()?
    } else if is_binding_token(t.typ) {
      self.push(name_loc, NodeKind::Binding { name: name.clone() })
    } else {
      return Err(t.error(SyntaxErrorType::RequiredTokenNotFound(TT::KeywordAs)));
    };
    let imported = if name == "default" {
      ImportName::Default
    } else {
      ImportName::Named(name)
    };
    let loc = name_loc + self.loc_of(binding);
    Ok(self.push(loc, NodeKind::ImportSpecifier { imported, binding }))
  }

  pub fn export_stmt(&mut self, ctx: ParseCtx) -> SyntaxResult<NodeId> {
    let start = self.require(TT::KeywordExport)?;
    self.require_module_top_level(ctx, &start)?;
    let t = self.peek();
    match t.typ {
      TT::Asterisk => {
        self.consume();
        let alias = if self.consume_if(TT::KeywordAs).is_match() {
          Some(self.module_name()?.1)
        } else {
          None
        };
        let (end, from) = self.from_clause()?;
        Ok(self.push(start.loc + end, NodeKind::ExportAll { from, alias }))
      }
      TT::BraceOpen => {
        self.consume();
        let mut specifiers = Vec::new();
        let mut end = loop {
          if let Some(end) = self.consume_if(TT::BraceClose).match_loc() {
            break end;
          }
          let (local_loc, local_name) = self.module_name()?;
          let local = self.push(local_loc, NodeKind::Ident {
            name: local_name.clone(),
          });
          let (exported_loc, exported) = if self.consume_if(TT::KeywordAs).is_match() {
            self.module_name()?
          } else {
            (local_loc, local_name)
          };
          specifiers.push(self.push(local_loc + exported_loc, NodeKind::ExportSpecifier {
            local,
            exported,
          }));
          if !self.consume_if(TT::Comma).is_match() {
            break self.require(TT::BraceClose)?.loc;
          }
        };
        let from = if self.peek().typ == TT::KeywordFrom {
          let (loc, from) = self.from_clause()?;
          end = loc;
          Some(from)
        } else {
          self.require_stmt_end()?;
          None
        };
        Ok(self.push(start.loc + end, NodeKind::ExportList { specifiers, from }))
      }
      TT::KeywordDefault => {
        self.consume();
        let expr = if self.peek().typ == TT::KeywordFunction {
          let func = self.function(false)?;
          let _ = self.consume_if(TT::Semicolon);
          func
        } else {
          let expr = self.assignment()?;
          self.require_stmt_end()?;
          expr
        };
        let loc = start.loc + self.loc_of(expr);
        Ok(self.push(loc, NodeKind::ExportDefault { expr }))
      }
      TT::KeywordConst | TT::KeywordLet | TT::KeywordVar => {
        let decl = self.var_decl()?;
        self.require_stmt_end()?;
        let loc = start.loc + self.loc_of(decl);
        Ok(self.push(loc, NodeKind::ExportDecl { decl }))
      }
      TT::KeywordFunction => {
        let decl = self.function(true)?;
        let loc = start.loc + self.loc_of(decl);
        Ok(self.push(loc, NodeKind::ExportDecl { decl }))
      }
      _ => Err(t.error(SyntaxErrorType::ExpectedSyntax("exportable declaration"))),
    }
  }
}
