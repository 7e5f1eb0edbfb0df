//! Source regeneration.
//!
//! Output is deterministic: the same tree always prints to the same text, statements go on their
//! own lines and blocks are indented by two spaces. Parentheses are never synthesized; they are
//! kept from the source as `Paren` nodes, which is sufficient because transformations only ever
//! drop or rename whole nodes.

use crate::ast::Ast;
use crate::ast::ImportName;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::ast::PropKey;
use crate::ast::UnaryOp;
use crate::lex::is_id_continue;
use crate::lex::is_id_start;
use crate::num::format_number;
use crate::token::KEYWORD_STRS;

/// Emits a string literal delimited by double quotes, escaping characters that would otherwise
/// terminate or change the meaning of the literal.
pub fn emit_string_literal_double_quoted(out: &mut String, value: &str) {
  out.push('"');
  let mut chars = value.chars().peekable();
  while let Some(ch) = chars.next() {
    match ch {
      '\\' => out.push_str("\\\\"),
      '"' => out.push_str("\\\""),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      '\0' => {
        if chars.peek().is_some_and(|c| c.is_ascii_digit()) {
          out.push_str("\\x00");
        } else {
          out.push_str("\\0");
        }
      }
      '\u{2028}' => out.push_str("\\u2028"),
      '\u{2029}' => out.push_str("\\u2029"),
      ch if ch < '\u{20}' => out.push_str(&format!("\\x{:02X}", ch as u32)),
      ch => out.push(ch),
    };
  }
  out.push('"');
}

pub fn is_valid_identifier(name: &str) -> bool {
  let mut chars = name.chars();
  chars.next().is_some_and(is_id_start)
    && chars.all(is_id_continue)
    && !KEYWORD_STRS.contains_key(name)
}

fn is_contextual_name(name: &str) -> bool {
  matches!(name, "as" | "from" | "let")
}

pub struct Emitter<'a> {
  ast: &'a Ast,
  out: String,
  indent: usize,
}

impl<'a> Emitter<'a> {
  pub fn new(ast: &'a Ast) -> Emitter<'a> {
    Emitter {
      ast,
      out: String::new(),
      indent: 0,
    }
  }

  pub fn finish(self) -> String {
    self.out
  }

  fn write(&mut self, s: &str) {
    self.out.push_str(s);
  }

  fn newline(&mut self) {
    self.out.push('\n');
    for _ in 0..self.indent {
      self.out.push_str("  ");
    }
  }

  fn module_name(&mut self, name: &str) {
    if is_valid_identifier(name) || is_contextual_name(name) || KEYWORD_STRS.contains_key(name) {
      self.write(name);
    } else {
      emit_string_literal_double_quoted(&mut self.out, name);
    }
  }

  fn list(&mut self, ids: &[NodeId], f: fn(&mut Self, NodeId)) {
    for (i, id) in ids.iter().enumerate() {
      if i > 0 {
        self.write(", ");
      }
      f(self, *id);
    }
  }

  pub fn program(&mut self) {
    let root = self.ast.root();
    let body = self.ast.children(root);
    for stmt in body {
      self.stmt(stmt);
      self.out.push('\n');
    }
  }

  fn block(&mut self, body: &[NodeId]) {
    if body.is_empty() {
      self.write("{}");
      return;
    }
    self.write("{");
    self.indent += 1;
    for stmt in body {
      self.newline();
      self.stmt(*stmt);
    }
    self.indent -= 1;
    self.newline();
    self.write("}");
  }

  pub fn stmt(&mut self, id: NodeId) {
    let ast = self.ast;
    match ast.kind(id) {
      NodeKind::Import { specifiers, source } => {
        self.write("import ");
        if !specifiers.is_empty() {
          self.import_clause(specifiers);
          self.write(" from ");
        }
        emit_string_literal_double_quoted(&mut self.out, source);
        self.write(";");
      }
      NodeKind::ExportDecl { decl } => {
        self.write("export ");
        self.stmt(*decl);
      }
      NodeKind::ExportDefault { expr } => {
        self.write("export default ");
        self.expr(*expr);
        if !matches!(ast.kind(*expr), NodeKind::Function { arrow: false, .. }) {
          self.write(";");
        }
      }
      NodeKind::ExportList { specifiers, from } => {
        self.write("export {");
        if !specifiers.is_empty() {
          self.write(" ");
          self.list(specifiers, Self::export_specifier);
          self.write(" ");
        }
        self.write("}");
        if let Some(from) = from {
          self.write(" from ");
          emit_string_literal_double_quoted(&mut self.out, from);
        }
        self.write(";");
      }
      NodeKind::ExportAll { from, alias } => {
        self.write("export * ");
        if let Some(alias) = alias {
          self.write("as ");
          self.module_name(alias);
          self.write(" ");
        }
        self.write("from ");
        emit_string_literal_double_quoted(&mut self.out, from);
        self.write(";");
      }
      NodeKind::VarDecl { mode, declarators } => {
        self.write(mode.keyword());
        self.write(" ");
        self.list(declarators, Self::declarator);
        self.write(";");
      }
      NodeKind::Return { value } => {
        self.write("return");
        if let Some(value) = value {
          self.write(" ");
          self.expr(*value);
        }
        self.write(";");
      }
      NodeKind::Throw { value } => {
        self.write("throw ");
        self.expr(*value);
        self.write(";");
      }
      NodeKind::If {
        test,
        consequent,
        alternate,
      } => {
        self.write("if (");
        self.expr(*test);
        self.write(") ");
        self.stmt(*consequent);
        if let Some(alt) = alternate {
          self.write(" else ");
          self.stmt(*alt);
        }
      }
      NodeKind::Block { body } => self.block(body),
      NodeKind::ExprStmt { expr } => {
        self.expr(*expr);
        self.write(";");
      }
      NodeKind::Empty => self.write(";"),
      NodeKind::Function { .. } => self.expr(id),
      _ => {
        self.expr(id);
        self.write(";");
      }
    };
  }

  fn import_clause(&mut self, specifiers: &[NodeId]) {
    let ast = self.ast;
    let mut named = Vec::new();
    let mut first = true;
    for spec in specifiers {
      let NodeKind::ImportSpecifier { imported, binding } = ast.kind(*spec) else {
        continue;
      };
      let local = ast.binding_name(*binding).unwrap_or_default();
      match imported {
        ImportName::Default => {
          if !first {
            self.write(", ");
          }
          self.write(local);
          first = false;
        }
        ImportName::Namespace => {
          if !first {
            self.write(", ");
          }
          self.write("* as ");
          self.write(local);
          first = false;
        }
        ImportName::Named(name) => named.push((name.as_str(), local)),
      };
    }
    if !named.is_empty() || first {
      if !first {
        self.write(", ");
      }
      self.write("{");
      for (i, (name, local)) in named.iter().enumerate() {
        self.write(if i == 0 { " " } else { ", " });
        self.module_name(name);
        if name != local {
          self.write(" as ");
          self.write(local);
        }
      }
      self.write(if named.is_empty() { "}" } else { " }" });
    }
  }

  fn export_specifier(&mut self, id: NodeId) {
    let ast = self.ast;
    let NodeKind::ExportSpecifier { local, exported } = ast.kind(id) else {
      return;
    };
    let local = ast.binding_name(*local).unwrap_or_default();
    self.module_name(local);
    if local != exported {
      self.write(" as ");
      self.module_name(exported);
    }
  }

  fn declarator(&mut self, id: NodeId) {
    let ast = self.ast;
    let NodeKind::VarDeclarator { binding, init } = ast.kind(id) else {
      return;
    };
    self.expr(*binding);
    if let Some(init) = init {
      self.write(" = ");
      self.expr(*init);
    }
  }

  fn function(&mut self, id: NodeId) {
    let ast = self.ast;
    let NodeKind::Function {
      name,
      params,
      body,
      arrow,
      ..
    } = ast.kind(id)
    else {
      return;
    };
    if *arrow {
      self.write("(");
      self.list(params, Self::expr);
      self.write(") => ");
      match ast.kind(*body) {
        NodeKind::Block { body } => self.block(body),
        _ => self.expr(*body),
      };
      return;
    }
    self.write("function");
    if let Some(name) = name {
      self.write(" ");
      self.expr(*name);
    }
    self.write("(");
    self.list(params, Self::expr);
    self.write(") ");
    self.stmt(*body);
  }

  fn prop_key(&mut self, key: &PropKey) {
    match key {
      PropKey::Name(name) => {
        if is_valid_identifier(name)
          || KEYWORD_STRS.contains_key(name.as_str())
          || name.chars().all(|c| c.is_ascii_digit()) && !name.is_empty()
        {
          self.write(name);
        } else {
          emit_string_literal_double_quoted(&mut self.out, name);
        }
      }
      PropKey::Computed(expr) => {
        self.write("[");
        self.expr(*expr);
        self.write("]");
      }
    };
  }

  pub fn expr(&mut self, id: NodeId) {
    let ast = self.ast;
    match ast.kind(id) {
      NodeKind::Ident { name } | NodeKind::Binding { name } => self.write(name),
      NodeKind::Num { value } => self.write(&format_number(*value)),
      NodeKind::Str { value } => emit_string_literal_double_quoted(&mut self.out, value),
      NodeKind::Bool { value } => self.write(if *value { "true" } else { "false" }),
      NodeKind::Null => self.write("null"),
      NodeKind::Template { quasis, exprs } => {
        self.write("`");
        for (i, quasi) in quasis.iter().enumerate() {
          self.write(quasi);
          if let Some(expr) = exprs.get(i) {
            self.write("${");
            self.expr(*expr);
            self.write("}");
          }
        }
        self.write("`");
      }
      NodeKind::TaggedTemplate { tag, template } => {
        self.expr(*tag);
        self.expr(*template);
      }
      NodeKind::Binary { op, left, right } => {
        self.expr(*left);
        self.write(" ");
        self.write(op.symbol());
        self.write(" ");
        self.expr(*right);
      }
      NodeKind::Unary { op, arg } => {
        self.write(op.symbol());
        // Avoid `--x` and `++x`.
        if matches!(op, UnaryOp::Neg | UnaryOp::Plus)
          && matches!(ast.kind(*arg), NodeKind::Unary {
            op: UnaryOp::Neg | UnaryOp::Plus,
            ..
          })
        {
          self.write(" ");
        }
        self.expr(*arg);
      }
      NodeKind::Conditional {
        test,
        consequent,
        alternate,
      } => {
        self.expr(*test);
        self.write(" ? ");
        self.expr(*consequent);
        self.write(" : ");
        self.expr(*alternate);
      }
      NodeKind::Assign { op, target, value } => {
        self.expr(*target);
        self.write(" ");
        self.write(op.symbol());
        self.write(" ");
        self.expr(*value);
      }
      NodeKind::Call { callee, args } => {
        self.expr(*callee);
        self.write("(");
        self.list(args, Self::expr);
        self.write(")");
      }
      NodeKind::Member { object, property } => {
        self.expr(*object);
        self.write(".");
        self.write(property);
      }
      NodeKind::Index { object, index } => {
        self.expr(*object);
        self.write("[");
        self.expr(*index);
        self.write("]");
      }
      NodeKind::Array { elements } => {
        self.write("[");
        self.list(elements, Self::expr);
        self.write("]");
      }
      NodeKind::Object { props } => {
        if props.is_empty() {
          self.write("{}");
        } else {
          self.write("{ ");
          self.list(props, Self::expr);
          self.write(" }");
        }
      }
      NodeKind::Property {
        key,
        value,
        shorthand,
      } => {
        if *shorthand {
          self.expr(*value);
        } else {
          self.prop_key(key);
          self.write(": ");
          self.expr(*value);
        }
      }
      NodeKind::Paren { expr } => {
        self.write("(");
        self.expr(*expr);
        self.write(")");
      }
      NodeKind::Function { .. } => self.function(id),
      // Statements never appear in expression position.
      _ => self.stmt(id),
    };
  }
}

/// Prints the tree reachable from the root.
pub fn emit(ast: &Ast) -> String {
  let mut emitter = Emitter::new(ast);
  emitter.program();
  emitter.finish()
}

#[cfg(test)]
mod tests {
  use super::emit_string_literal_double_quoted;
  use super::is_valid_identifier;

  #[test]
  fn escapes_string_literals() {
    let mut out = String::new();
    emit_string_literal_double_quoted(&mut out, "a\"b\\c\n\u{1}");
    assert_eq!(out, r#""a\"b\\c\n\x01""#);
  }

  #[test]
  fn identifier_validity() {
    assert!(is_valid_identifier("$foo_1"));
    assert!(!is_valid_identifier("1a"));
    assert!(!is_valid_identifier("const"));
    assert!(!is_valid_identifier("a-b"));
  }
}
