use crate::loc::Loc;
use ahash::HashMap;
use ahash::HashMapExt;
use serde::Serialize;
use std::sync::Arc;

/// Stable identity of a node within an [`Ast`] and every tree derived from it.
///
/// Ids are assigned in parse order. Derived trees (shaken, re-export-exploded) keep the ids of every
/// node they share with their source tree, so id-keyed side tables stay valid across derivations.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum VarDeclMode {
  Const,
  Let,
  Var,
}

impl VarDeclMode {
  pub fn keyword(self) -> &'static str {
    match self {
      VarDeclMode::Const => "const",
      VarDeclMode::Let => "let",
      VarDeclMode::Var => "var",
    }
  }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum ImportName {
  Default,
  Named(String),
  Namespace,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum BinaryOp {
  Add,
  BitAnd,
  BitOr,
  BitXor,
  Div,
  Eq,
  Exp,
  Gt,
  GtEq,
  LogicalAnd,
  LogicalOr,
  Lt,
  LtEq,
  Mul,
  NotEq,
  Nullish,
  Rem,
  StrictEq,
  StrictNotEq,
  Sub,
}

impl BinaryOp {
  pub fn symbol(self) -> &'static str {
    match self {
      BinaryOp::Add => "+",
      BinaryOp::BitAnd => "&",
      BinaryOp::BitOr => "|",
      BinaryOp::BitXor => "^",
      BinaryOp::Div => "/",
      BinaryOp::Eq => "==",
      BinaryOp::Exp => "**",
      BinaryOp::Gt => ">",
      BinaryOp::GtEq => ">=",
      BinaryOp::LogicalAnd => "&&",
      BinaryOp::LogicalOr => "||",
      BinaryOp::Lt => "<",
      BinaryOp::LtEq => "<=",
      BinaryOp::Mul => "*",
      BinaryOp::NotEq => "!=",
      BinaryOp::Nullish => "??",
      BinaryOp::Rem => "%",
      BinaryOp::StrictEq => "===",
      BinaryOp::StrictNotEq => "!==",
      BinaryOp::Sub => "-",
    }
  }

  /// Higher binds tighter.
  pub fn precedence(self) -> u8 {
    match self {
      BinaryOp::Nullish => 1,
      BinaryOp::LogicalOr => 2,
      BinaryOp::LogicalAnd => 3,
      BinaryOp::BitOr => 4,
      BinaryOp::BitXor => 5,
      BinaryOp::BitAnd => 6,
      BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => 7,
      BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => 8,
      BinaryOp::Add | BinaryOp::Sub => 9,
      BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 10,
      BinaryOp::Exp => 11,
    }
  }

  pub fn is_right_associative(self) -> bool {
    self == BinaryOp::Exp
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum UnaryOp {
  Neg,
  Not,
  Plus,
  Typeof,
  Void,
}

impl UnaryOp {
  pub fn symbol(self) -> &'static str {
    match self {
      UnaryOp::Neg => "-",
      UnaryOp::Not => "!",
      UnaryOp::Plus => "+",
      UnaryOp::Typeof => "typeof ",
      UnaryOp::Void => "void ",
    }
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum AssignOp {
  Assign,
  AddAssign,
  MulAssign,
  SubAssign,
}

impl AssignOp {
  pub fn symbol(self) -> &'static str {
    match self {
      AssignOp::Assign => "=",
      AssignOp::AddAssign => "+=",
      AssignOp::MulAssign => "*=",
      AssignOp::SubAssign => "-=",
    }
  }

  /// The binary operator applied before storing, for compound assignments.
  pub fn binary(self) -> Option<BinaryOp> {
    match self {
      AssignOp::Assign => None,
      AssignOp::AddAssign => Some(BinaryOp::Add),
      AssignOp::MulAssign => Some(BinaryOp::Mul),
      AssignOp::SubAssign => Some(BinaryOp::Sub),
    }
  }
}

#[derive(Clone, PartialEq, Debug, Serialize)]
pub enum PropKey {
  Name(String),
  Computed(NodeId),
}

#[derive(Clone, PartialEq, Debug, Serialize)]
pub enum NodeKind {
  Program {
    body: Vec<NodeId>,
  },

  // Module statements.
  Import {
    // Empty for side-effect-only imports.
    specifiers: Vec<NodeId>,
    source: String,
  },
  ImportSpecifier {
    imported: ImportName,
    binding: NodeId,
  },
  ExportDecl {
    decl: NodeId,
  },
  ExportDefault {
    expr: NodeId,
  },
  ExportList {
    specifiers: Vec<NodeId>,
    from: Option<String>,
  },
  // `local` is an `Ident`; for re-exports (`from` on the parent list) it names the imported export.
  ExportSpecifier {
    local: NodeId,
    exported: String,
  },
  ExportAll {
    from: String,
    alias: Option<String>,
  },

  // Statements.
  VarDecl {
    mode: VarDeclMode,
    declarators: Vec<NodeId>,
  },
  VarDeclarator {
    binding: NodeId,
    init: Option<NodeId>,
  },
  Return {
    value: Option<NodeId>,
  },
  Throw {
    value: NodeId,
  },
  If {
    test: NodeId,
    consequent: NodeId,
    alternate: Option<NodeId>,
  },
  Block {
    body: Vec<NodeId>,
  },
  ExprStmt {
    expr: NodeId,
  },
  Empty,

  // Declarations have `decl: true` and always a name. Arrow bodies may be an expression.
  Function {
    name: Option<NodeId>,
    params: Vec<NodeId>,
    body: NodeId,
    arrow: bool,
    decl: bool,
  },

  // Expressions.
  Ident {
    name: String,
  },
  // A declaring occurrence of a name (variable, function, parameter, import).
  Binding {
    name: String,
  },
  Num {
    value: f64,
  },
  Str {
    value: String,
  },
  Bool {
    value: bool,
  },
  Null,
  // `quasis` hold raw (uncooked) text; there is always one more quasi than expression.
  Template {
    quasis: Vec<String>,
    exprs: Vec<NodeId>,
  },
  TaggedTemplate {
    tag: NodeId,
    template: NodeId,
  },
  Binary {
    op: BinaryOp,
    left: NodeId,
    right: NodeId,
  },
  Unary {
    op: UnaryOp,
    arg: NodeId,
  },
  Conditional {
    test: NodeId,
    consequent: NodeId,
    alternate: NodeId,
  },
  Assign {
    op: AssignOp,
    target: NodeId,
    value: NodeId,
  },
  Call {
    callee: NodeId,
    args: Vec<NodeId>,
  },
  Member {
    object: NodeId,
    property: String,
  },
  Index {
    object: NodeId,
    index: NodeId,
  },
  Array {
    elements: Vec<NodeId>,
  },
  Object {
    props: Vec<NodeId>,
  },
  Property {
    key: PropKey,
    value: NodeId,
    shorthand: bool,
  },
  Paren {
    expr: NodeId,
  },
}

impl NodeKind {
  /// All direct children in source order.
  pub fn children(&self) -> Vec<NodeId> {
    let mut out = Vec::new();
    match self {
      NodeKind::Program { body } | NodeKind::Block { body } => out.extend(body.iter().copied()),
      NodeKind::Import { specifiers, .. } | NodeKind::ExportList { specifiers, .. } => {
        out.extend(specifiers.iter().copied())
      }
      NodeKind::ImportSpecifier { binding, .. } => out.push(*binding),
      NodeKind::ExportDecl { decl } => out.push(*decl),
      NodeKind::ExportDefault { expr } => out.push(*expr),
      NodeKind::ExportSpecifier { local, .. } => out.push(*local),
      NodeKind::ExportAll { .. } => {}
      NodeKind::VarDecl { declarators, .. } => out.extend(declarators.iter().copied()),
      NodeKind::VarDeclarator { binding, init } => {
        out.push(*binding);
        out.extend(init.iter().copied());
      }
      NodeKind::Return { value } => out.extend(value.iter().copied()),
      NodeKind::Throw { value } => out.push(*value),
      NodeKind::If {
        test,
        consequent,
        alternate,
      } => {
        out.push(*test);
        out.push(*consequent);
        out.extend(alternate.iter().copied());
      }
      NodeKind::ExprStmt { expr } => out.push(*expr),
      NodeKind::Empty => {}
      NodeKind::Function {
        name, params, body, ..
      } => {
        out.extend(name.iter().copied());
        out.extend(params.iter().copied());
        out.push(*body);
      }
      NodeKind::Ident { .. }
      | NodeKind::Binding { .. }
      | NodeKind::Num { .. }
      | NodeKind::Str { .. }
      | NodeKind::Bool { .. }
      | NodeKind::Null => {}
      NodeKind::Template { exprs, .. } => out.extend(exprs.iter().copied()),
      NodeKind::TaggedTemplate { tag, template } => {
        out.push(*tag);
        out.push(*template);
      }
      NodeKind::Binary { left, right, .. } => {
        out.push(*left);
        out.push(*right);
      }
      NodeKind::Unary { arg, .. } => out.push(*arg),
      NodeKind::Conditional {
        test,
        consequent,
        alternate,
      } => {
        out.push(*test);
        out.push(*consequent);
        out.push(*alternate);
      }
      NodeKind::Assign { target, value, .. } => {
        out.push(*target);
        out.push(*value);
      }
      NodeKind::Call { callee, args } => {
        out.push(*callee);
        out.extend(args.iter().copied());
      }
      NodeKind::Member { object, .. } => out.push(*object),
      NodeKind::Index { object, index } => {
        out.push(*object);
        out.push(*index);
      }
      NodeKind::Array { elements } => out.extend(elements.iter().copied()),
      NodeKind::Object { props } => out.extend(props.iter().copied()),
      NodeKind::Property { key, value, .. } => {
        if let PropKey::Computed(k) = key {
          out.push(*k);
        }
        out.push(*value);
      }
      NodeKind::Paren { expr } => out.push(*expr),
    };
    out
  }

  pub fn is_statement(&self) -> bool {
    matches!(
      self,
      NodeKind::Import { .. }
        | NodeKind::ExportDecl { .. }
        | NodeKind::ExportDefault { .. }
        | NodeKind::ExportList { .. }
        | NodeKind::ExportAll { .. }
        | NodeKind::VarDecl { .. }
        | NodeKind::Return { .. }
        | NodeKind::Throw { .. }
        | NodeKind::If { .. }
        | NodeKind::Block { .. }
        | NodeKind::ExprStmt { .. }
        | NodeKind::Empty
        | NodeKind::Function { decl: true, .. }
    )
  }

  /// Child lists from which individual entries may be dropped without breaking the syntax of the
  /// node itself.
  pub fn removable_children(&self) -> Option<&Vec<NodeId>> {
    match self {
      NodeKind::Program { body } => Some(body),
      NodeKind::Import { specifiers, .. } | NodeKind::ExportList { specifiers, .. } => {
        Some(specifiers)
      }
      NodeKind::VarDecl { declarators, .. } => Some(declarators),
      _ => None,
    }
  }

  /// Returns a copy with the removable child list replaced.
  pub fn with_removable_children(&self, kept: Vec<NodeId>) -> NodeKind {
    let mut next = self.clone();
    match &mut next {
      NodeKind::Program { body } => *body = kept,
      NodeKind::Import { specifiers, .. } | NodeKind::ExportList { specifiers, .. } => {
        *specifiers = kept
      }
      NodeKind::VarDecl { declarators, .. } => *declarators = kept,
      _ => {}
    };
    next
  }
}

#[derive(Clone, Debug, Serialize)]
pub struct Node {
  // After transformations there may be nodes that never existed in the source; those copy the
  // location of the node they were derived from.
  pub loc: Loc,
  pub kind: NodeKind,
}

/// A syntax tree stored as an arena.
///
/// The nodes produced by the parser are shared behind an `Arc`; nodes patched or appended by later
/// passes live in an overlay. Cloning an `Ast` therefore copies only the overlay, and every derived
/// tree shares unchanged nodes (and their ids) with its origin.
#[derive(Clone, Debug)]
pub struct Ast {
  base: Arc<Vec<Node>>,
  overlay: HashMap<NodeId, Node>,
  len: u32,
  root: NodeId,
  source: Arc<str>,
}

impl Ast {
  pub fn new(nodes: Vec<Node>, root: NodeId, source: Arc<str>) -> Ast {
    let len = nodes.len() as u32;
    Ast {
      base: Arc::new(nodes),
      overlay: HashMap::new(),
      len,
      root,
      source,
    }
  }

  pub fn root(&self) -> NodeId {
    self.root
  }

  pub fn source(&self) -> &Arc<str> {
    &self.source
  }

  /// Total number of ids ever allocated in this tree, including unreachable ones.
  pub fn len(&self) -> usize {
    self.len as usize
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn node(&self, id: NodeId) -> &Node {
    match self.overlay.get(&id) {
      Some(node) => node,
      None => &self.base[id.index()],
    }
  }

  pub fn kind(&self, id: NodeId) -> &NodeKind {
    &self.node(id).kind
  }

  pub fn loc(&self, id: NodeId) -> Loc {
    self.node(id).loc
  }

  /// Source text of the node as originally parsed.
  pub fn text(&self, id: NodeId) -> &str {
    self.loc(id).slice(&self.source)
  }

  pub fn push(&mut self, loc: Loc, kind: NodeKind) -> NodeId {
    let id = NodeId(self.len);
    self.len += 1;
    self.overlay.insert(id, Node { loc, kind });
    id
  }

  /// Replaces the syntax of an existing node, keeping its id and location.
  pub fn replace(&mut self, id: NodeId, kind: NodeKind) {
    let loc = self.loc(id);
    self.overlay.insert(id, Node { loc, kind });
  }

  pub fn is_patched(&self, id: NodeId) -> bool {
    self.overlay.contains_key(&id)
  }

  /// Whether both trees were derived from the same parse.
  pub fn shares_base_with(&self, other: &Ast) -> bool {
    Arc::ptr_eq(&self.base, &other.base)
  }

  pub fn children(&self, id: NodeId) -> Vec<NodeId> {
    self.kind(id).children()
  }

  /// Ids of every node reachable from the root, in pre-order.
  pub fn reachable(&self) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![self.root];
    while let Some(id) = stack.pop() {
      out.push(id);
      let children = self.children(id);
      stack.extend(children.into_iter().rev());
    }
    out
  }

  /// Statements of the program body, or nothing if the root is not a program.
  pub fn top_level_statements(&self) -> &[NodeId] {
    match self.kind(self.root) {
      NodeKind::Program { body } => body,
      _ => &[],
    }
  }

  pub fn binding_name(&self, id: NodeId) -> Option<&str> {
    match self.kind(id) {
      NodeKind::Binding { name } | NodeKind::Ident { name } => Some(name),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn leaf(ast_nodes: &mut Vec<Node>, kind: NodeKind) -> NodeId {
    ast_nodes.push(Node {
      loc: Loc(0, 0),
      kind,
    });
    NodeId(ast_nodes.len() as u32 - 1)
  }

  #[test]
  fn overlay_patches_without_touching_shared_base() {
    let mut nodes = Vec::new();
    let a = leaf(&mut nodes, NodeKind::Null);
    let b = leaf(&mut nodes, NodeKind::Bool { value: true });
    let root = leaf(&mut nodes, NodeKind::Program { body: vec![a, b] });
    let original = Ast::new(nodes, root, Arc::from(""));

    let mut derived = original.clone();
    derived.replace(root, NodeKind::Program { body: vec![b] });
    let c = derived.push(Loc(0, 0), NodeKind::Num { value: 1.0 });

    assert!(derived.shares_base_with(&original));
    assert_eq!(original.children(root), vec![a, b]);
    assert_eq!(derived.children(root), vec![b]);
    assert_eq!(derived.kind(c), &NodeKind::Num { value: 1.0 });
    assert_eq!(derived.len(), 4);
    assert_eq!(original.len(), 3);
    assert!(derived.is_patched(root));
    assert!(!derived.is_patched(b));
  }

  #[test]
  fn reachable_is_preorder() {
    let mut nodes = Vec::new();
    let x = leaf(&mut nodes, NodeKind::Ident { name: "x".into() });
    let y = leaf(&mut nodes, NodeKind::Ident { name: "y".into() });
    let sum = leaf(&mut nodes, NodeKind::Binary {
      op: BinaryOp::Add,
      left: x,
      right: y,
    });
    let stmt = leaf(&mut nodes, NodeKind::ExprStmt { expr: sum });
    let root = leaf(&mut nodes, NodeKind::Program { body: vec![stmt] });
    let ast = Ast::new(nodes, root, Arc::from("x + y"));
    assert_eq!(ast.reachable(), vec![root, stmt, sum, x, y]);
  }
}
