use crate::scope::Declaration;
use crate::scope::Resolution;
use crate::scope::ScopeKind;
use crate::scope::ScopeTracker;
use ahash::HashMap;
use ahash::HashMapExt;
use ahash::HashSet;
use ahash::HashSetExt;
use indexmap::IndexMap;
use syntax_js::ast::Ast;
use syntax_js::ast::ImportName;
use syntax_js::ast::NodeId;
use syntax_js::ast::NodeKind;
use syntax_js::ast::PropKey;
use syntax_js::ast::VarDeclMode;

/// One name a module needs from another module.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ImportRecord {
  pub source: String,
  pub imported: ImportName,
  // The node whose liveness demands this import: an import specifier, a re-exporting export
  // specifier, or an aliased `export * as ns`.
  pub node: NodeId,
  // The local binding for imports; None for re-exports.
  pub binding: Option<NodeId>,
}

/// Read of a namespace import binding. `property` is None when the namespace escapes (is used other
/// than through a static member access).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NamespaceUse {
  pub node: NodeId,
  pub property: Option<String>,
}

/// "A requires B" edges between syntax nodes of one module, plus the module's import and export
/// tables.
#[derive(Default, Debug)]
pub struct DependencyGraph {
  edges: HashMap<NodeId, Vec<NodeId>>,
  exports: IndexMap<String, Vec<NodeId>>,
  // `module.exports = value` writes whose value may provide any name.
  opaque_exports: Vec<NodeId>,
  imports: Vec<ImportRecord>,
  side_effect_imports: Vec<(String, NodeId)>,
  reexports: Vec<(String, NodeId)>,
  resolved: HashMap<NodeId, NodeId>,
  namespace_uses: HashMap<NodeId, Vec<NamespaceUse>>,
  globals: Vec<(String, NodeId)>,
}

impl DependencyGraph {
  pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
    if from == to {
      return;
    }
    let targets = self.edges.entry(from).or_default();
    if !targets.contains(&to) {
      targets.push(to);
    }
  }

  pub fn dependencies(&self, node: NodeId) -> &[NodeId] {
    self.edges.get(&node).map(|v| v.as_slice()).unwrap_or(&[])
  }

  /// Export name to the nodes that define it, in source order. A name written to the CommonJS
  /// export surface more than once has one node per write.
  pub fn exports(&self) -> &IndexMap<String, Vec<NodeId>> {
    &self.exports
  }

  /// `module.exports = value` assignments whose value is not an object literal, so any requested
  /// name may come from them.
  pub fn opaque_exports(&self) -> &[NodeId] {
    &self.opaque_exports
  }

  fn add_export(&mut self, name: String, node: NodeId) {
    let nodes = self.exports.entry(name).or_default();
    if !nodes.contains(&node) {
      nodes.push(node);
    }
  }

  pub fn imports(&self) -> &[ImportRecord] {
    &self.imports
  }

  /// `import "m"` statements.
  pub fn side_effect_imports(&self) -> &[(String, NodeId)] {
    &self.side_effect_imports
  }

  /// Un-aliased `export * from "m"` statements.
  pub fn reexports(&self) -> &[(String, NodeId)] {
    &self.reexports
  }

  /// The declaring binding of an identifier reference, if it resolved to a declaration in this
  /// module.
  pub fn declaration_of(&self, reference: NodeId) -> Option<NodeId> {
    self.resolved.get(&reference).copied()
  }

  pub fn namespace_uses(&self, binding: NodeId) -> &[NamespaceUse] {
    self
      .namespace_uses
      .get(&binding)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// References that never resolved to a declaration.
  pub fn globals(&self) -> &[(String, NodeId)] {
    &self.globals
  }
}

#[derive(Clone, Copy)]
struct Cx {
  // Nearest node the sweep can drop as a whole: a top-level statement, top-level declarator or
  // specifier.
  unit: NodeId,
  // Nearest enclosing statement, block or function, for upward edges from nested statements.
  container: Option<NodeId>,
  // Nearest enclosing statement.
  stmt: Option<NodeId>,
  top_level: bool,
}

struct Builder<'a> {
  ast: &'a Ast,
  scopes: ScopeTracker,
  graph: DependencyGraph,
  // (reference, write) pairs; the write becomes a dependency of whatever the reference resolves to.
  writes: Vec<(NodeId, NodeId)>,
  // Identifier reference to the static member expression reading through it.
  member_reads: HashMap<NodeId, (NodeId, String)>,
  namespaces: HashSet<NodeId>,
}

/// Leftmost identifier of a member/index chain, e.g. `a` in `a.b[c].d`.
fn root_ident(ast: &Ast, mut id: NodeId) -> Option<NodeId> {
  loop {
    match ast.kind(id) {
      NodeKind::Ident { .. } => return Some(id),
      NodeKind::Member { object, .. } | NodeKind::Index { object, .. } => id = *object,
      NodeKind::Paren { expr } => id = *expr,
      _ => return None,
    };
  }
}

enum ExportWrite {
  Named(String),
  Whole,
}

fn import_name_of(name: &str) -> ImportName {
  if name == "default" {
    ImportName::Default
  } else {
    ImportName::Named(name.to_string())
  }
}

impl<'a> Builder<'a> {
  fn declare(&mut self, binding: NodeId, hoistable: bool) {
    let ast = self.ast;
    let Some(name) = ast.binding_name(binding) else {
      return;
    };
    for reference in self.scopes.declare(name, binding, hoistable) {
      self.resolve(reference, binding);
    }
  }

  // Declares the `var` and function declarations `stmt` hoists into the enclosing function or
  // module, descending into nested blocks.
  fn predeclare_hoisted(&mut self, stmt: NodeId) {
    let ast = self.ast;
    match ast.kind(stmt) {
      NodeKind::ExportDecl { decl } => self.predeclare_hoisted(*decl),
      NodeKind::VarDecl {
        mode: VarDeclMode::Var,
        declarators,
      } => {
        for declarator in declarators {
          if let NodeKind::VarDeclarator { binding, .. } = ast.kind(*declarator) {
            self.declare(*binding, true);
          }
        }
      }
      NodeKind::Function {
        name: Some(name),
        decl: true,
        ..
      } => self.declare(*name, true),
      NodeKind::Block { body } => {
        for stmt in body {
          self.predeclare_hoisted(*stmt);
        }
      }
      NodeKind::If {
        consequent,
        alternate,
        ..
      } => {
        self.predeclare_hoisted(*consequent);
        if let Some(alternate) = alternate {
          self.predeclare_hoisted(*alternate);
        }
      }
      _ => {}
    };
  }

  // Declares the `let` and `const` bindings of a statement list in the innermost scope.
  fn predeclare_lexical(&mut self, stmts: &[NodeId]) {
    let ast = self.ast;
    for stmt in stmts {
      let decl = match ast.kind(*stmt) {
        NodeKind::ExportDecl { decl } => *decl,
        _ => *stmt,
      };
      let NodeKind::VarDecl { mode, declarators } = ast.kind(decl) else {
        continue;
      };
      if *mode == VarDeclMode::Var {
        continue;
      }
      for declarator in declarators {
        if let NodeKind::VarDeclarator { binding, .. } = ast.kind(*declarator) {
          self.declare(*binding, false);
        }
      }
    }
  }

  // Names a scope declares anywhere in `stmts` are visible to every reference in it, so they are
  // declared before the walk reaches any reference.
  fn predeclare(&mut self, stmts: &[NodeId]) {
    for stmt in stmts {
      self.predeclare_hoisted(*stmt);
    }
    self.predeclare_lexical(stmts);
  }

  fn resolve(&mut self, reference: NodeId, binding: NodeId) {
    self.graph.add_edge(reference, binding);
    self.graph.resolved.insert(reference, binding);
  }

  fn reference(&mut self, id: NodeId, name: &str) {
    if let Resolution::Declared(Declaration::Node(binding)) = self.scopes.add_reference(name, id) {
      self.resolve(id, binding);
    }
  }

  fn statement_edges(&mut self, id: NodeId, cx: Cx) {
    if let Some(container) = cx.container {
      self.graph.add_edge(id, container);
    }
  }

  fn children(&mut self, id: NodeId, cx: Cx) {
    let ast = self.ast;
    for child in ast.children(id) {
      self.graph.add_edge(id, child);
      self.visit(child, cx);
    }
  }

  fn var_decl(&mut self, id: NodeId, mode: VarDeclMode, declarators: &[NodeId], cx: Cx) {
    let ast = self.ast;
    for declarator in declarators {
      let NodeKind::VarDeclarator { binding, init } = ast.kind(*declarator) else {
        continue;
      };
      let (binding, init) = (*binding, *init);
      self.graph.add_edge(*declarator, id);
      // Nested declarations are kept or dropped with their statement.
      if !cx.top_level {
        self.graph.add_edge(id, *declarator);
      }
      self.declare(binding, mode == VarDeclMode::Var);
      self.graph.add_edge(binding, *declarator);
      if let Some(init) = init {
        self.graph.add_edge(*declarator, init);
        let unit = if cx.top_level { *declarator } else { cx.unit };
        self.visit(init, Cx {
          unit,
          stmt: Some(id),
          top_level: false,
          ..cx
        });
      }
    }
  }

  fn function(&mut self, id: NodeId, cx: Cx) {
    let ast = self.ast;
    let NodeKind::Function {
      name,
      params,
      body,
      decl,
      ..
    } = ast.kind(id)
    else {
      return;
    };
    let (name, body, decl) = (*name, *body, *decl);
    if id != cx.unit {
      self.graph.add_edge(id, cx.unit);
    }
    if decl {
      self.statement_edges(id, cx);
      if let Some(name) = name {
        self.declare(name, true);
        self.graph.add_edge(name, id);
      }
    }
    self.scopes.push(ScopeKind::Function);
    if !decl {
      if let Some(name) = name {
        self.declare(name, false);
        self.graph.add_edge(name, id);
      }
    }
    for param in params {
      self.declare(*param, false);
      self.graph.add_edge(*param, id);
      self.graph.add_edge(id, *param);
    }
    self.graph.add_edge(id, body);
    let inner = Cx {
      container: Some(body),
      stmt: None,
      top_level: false,
      ..cx
    };
    match ast.kind(body) {
      NodeKind::Block { body: stmts } => {
        self.graph.add_edge(body, id);
        self.predeclare(stmts);
        for stmt in stmts {
          self.graph.add_edge(body, *stmt);
          self.visit(*stmt, inner);
        }
      }
      _ => self.visit(body, Cx {
        container: Some(id),
        ..inner
      }),
    };
    self.scopes.pop();
  }

  fn module_item(&mut self, id: NodeId) {
    let ast = self.ast;
    let cx = Cx {
      unit: id,
      container: None,
      stmt: Some(id),
      top_level: true,
    };
    match ast.kind(id) {
      NodeKind::Import { specifiers, source } => {
        if specifiers.is_empty() {
          self.graph.side_effect_imports.push((source.clone(), id));
        }
        for spec in specifiers {
          let NodeKind::ImportSpecifier { imported, binding } = ast.kind(*spec) else {
            continue;
          };
          self.graph.add_edge(*spec, id);
          self.graph.add_edge(*binding, *spec);
          self.declare(*binding, false);
          if *imported == ImportName::Namespace {
            self.namespaces.insert(*binding);
          }
          self.graph.imports.push(ImportRecord {
            source: source.clone(),
            imported: imported.clone(),
            node: *spec,
            binding: Some(*binding),
          });
        }
      }
      NodeKind::ExportDecl { decl } => {
        let decl = *decl;
        self.graph.add_edge(id, decl);
        self.graph.add_edge(decl, id);
        match ast.kind(decl) {
          NodeKind::VarDecl { declarators, .. } => {
            for declarator in declarators {
              if let NodeKind::VarDeclarator { binding, .. } = ast.kind(*declarator) {
                if let Some(name) = ast.binding_name(*binding) {
                  self.graph.add_export(name.to_string(), *binding);
                }
              }
            }
          }
          NodeKind::Function {
            name: Some(name), ..
          } => {
            if let Some(exported) = ast.binding_name(*name) {
              self.graph.add_export(exported.to_string(), *name);
            }
          }
          _ => {}
        };
        self.visit(decl, Cx {
          unit: decl,
          stmt: Some(decl),
          ..cx
        });
      }
      NodeKind::ExportDefault { expr } => {
        let expr = *expr;
        self.graph.add_export("default".to_string(), id);
        self.graph.add_edge(id, expr);
        // `export default function f() {}` declares `f` in the module scope.
        if let NodeKind::Function {
          name: Some(name), ..
        } = ast.kind(expr)
        {
          self.declare(*name, true);
          self.graph.add_edge(*name, expr);
        }
        self.visit(expr, Cx {
          top_level: false,
          ..cx
        });
      }
      NodeKind::ExportList { specifiers, from } => {
        for spec in specifiers {
          let NodeKind::ExportSpecifier { local, exported } = ast.kind(*spec) else {
            continue;
          };
          self.graph.add_edge(*spec, id);
          self.graph.add_export(exported.clone(), *spec);
          match from {
            Some(source) => {
              let name = ast.binding_name(*local).unwrap_or_default();
              self.graph.imports.push(ImportRecord {
                source: source.clone(),
                imported: import_name_of(name),
                node: *spec,
                binding: None,
              });
            }
            None => {
              self.graph.add_edge(*spec, *local);
              self.visit(*local, Cx {
                unit: *spec,
                top_level: false,
                ..cx
              });
            }
          };
        }
      }
      NodeKind::ExportAll { from, alias } => match alias {
        Some(alias) => {
          self.graph.add_export(alias.clone(), id);
          self.graph.imports.push(ImportRecord {
            source: from.clone(),
            imported: ImportName::Namespace,
            node: id,
            binding: None,
          });
        }
        None => self.graph.reexports.push((from.clone(), id)),
      },
      _ => self.visit(id, cx),
    };
  }

  fn is_ambient(&self, id: NodeId, expected: &str) -> bool {
    matches!(self.ast.kind(id), NodeKind::Ident { name } if name == expected)
      && self.scopes.lookup(expected) == Some(Declaration::Ambient)
  }

  fn is_module_exports(&self, id: NodeId) -> bool {
    match self.ast.kind(id) {
      NodeKind::Member { object, property } => {
        property == "exports" && self.is_ambient(*object, "module")
      }
      NodeKind::Paren { expr } => self.is_module_exports(*expr),
      _ => false,
    }
  }

  fn export_target(&self, target: NodeId) -> Option<ExportWrite> {
    if self.is_module_exports(target) {
      return Some(ExportWrite::Whole);
    }
    let (object, name) = match self.ast.kind(target) {
      NodeKind::Member { object, property } => (*object, property.clone()),
      NodeKind::Index { object, index } => match self.ast.kind(*index) {
        NodeKind::Str { value } => (*object, value.clone()),
        _ => return None,
      },
      _ => return None,
    };
    (self.is_ambient(object, "exports") || self.is_module_exports(object))
      .then_some(ExportWrite::Named(name))
  }

  // Writes to the CommonJS export surface, at any depth, export what they assign. Replacing
  // `module.exports` provides `default` and, for an object literal, each of its keys.
  fn export_write(&mut self, assign: NodeId, target: NodeId, value: NodeId) {
    let ast = self.ast;
    match self.export_target(target) {
      Some(ExportWrite::Named(name)) => self.graph.add_export(name, assign),
      Some(ExportWrite::Whole) => {
        self.graph.add_export("default".to_string(), assign);
        let NodeKind::Object { props } = ast.kind(value) else {
          self.graph.opaque_exports.push(assign);
          return;
        };
        for prop in props {
          match ast.kind(*prop) {
            NodeKind::Property {
              key: PropKey::Name(name),
              ..
            } => self.graph.add_export(name.clone(), assign),
            _ => {
              if !self.graph.opaque_exports.contains(&assign) {
                self.graph.opaque_exports.push(assign);
              }
            }
          };
        }
      }
      None => {}
    };
  }

  fn visit(&mut self, id: NodeId, cx: Cx) {
    let ast = self.ast;
    match ast.kind(id) {
      NodeKind::VarDecl { mode, declarators } => {
        self.statement_edges(id, cx);
        self.var_decl(id, *mode, declarators, cx);
      }
      NodeKind::Function { .. } => self.function(id, cx),
      NodeKind::Block { body } => {
        self.statement_edges(id, cx);
        self.scopes.push(ScopeKind::Block);
        self.predeclare_lexical(body);
        let inner = Cx {
          container: Some(id),
          top_level: false,
          ..cx
        };
        for stmt in body {
          self.graph.add_edge(id, *stmt);
          self.visit(*stmt, inner);
        }
        self.scopes.pop();
      }
      NodeKind::If {
        test,
        consequent,
        alternate,
      } => {
        self.statement_edges(id, cx);
        let inner = Cx {
          container: Some(id),
          stmt: Some(id),
          top_level: false,
          ..cx
        };
        self.graph.add_edge(id, *test);
        self.visit(*test, inner);
        for branch in std::iter::once(*consequent).chain(*alternate) {
          self.graph.add_edge(id, branch);
          self.visit(branch, inner);
        }
      }
      NodeKind::ExprStmt { expr } => {
        self.statement_edges(id, cx);
        // A method call through a binding may mutate it.
        if let NodeKind::Call { callee, .. } = ast.kind(*expr) {
          if matches!(ast.kind(*callee), NodeKind::Member { .. } | NodeKind::Index { .. }) {
            if let Some(root) = root_ident(ast, *callee) {
              self.writes.push((root, id));
            }
          }
        }
        self.children(id, Cx {
          stmt: Some(id),
          top_level: false,
          ..cx
        });
      }
      NodeKind::Return { .. } | NodeKind::Throw { .. } | NodeKind::Empty => {
        self.statement_edges(id, cx);
        self.children(id, Cx {
          stmt: Some(id),
          top_level: false,
          ..cx
        });
      }
      NodeKind::Ident { name } => self.reference(id, name),
      NodeKind::Assign { target, value, .. } => {
        if let Some(stmt) = cx.stmt.or(cx.container) {
          self.graph.add_edge(id, stmt);
        }
        self.export_write(id, *target, *value);
        if let Some(root) = root_ident(ast, *target) {
          self.writes.push((root, id));
        }
        self.children(id, cx);
      }
      NodeKind::Member { object, property } => {
        if matches!(ast.kind(*object), NodeKind::Ident { .. }) {
          self.member_reads.insert(*object, (id, property.clone()));
        }
        self.children(id, cx);
      }
      _ => self.children(id, cx),
    };
  }

  fn finish(mut self) -> DependencyGraph {
    for (reference, write) in std::mem::take(&mut self.writes) {
      if let Some(binding) = self.graph.resolved.get(&reference).copied() {
        self.graph.add_edge(binding, write);
      }
    }
    let mut uses: Vec<(NodeId, NodeId)> = self
      .graph
      .resolved
      .iter()
      .filter(|(_, binding)| self.namespaces.contains(*binding))
      .map(|(reference, binding)| (*reference, *binding))
      .collect();
    uses.sort();
    for (reference, binding) in uses {
      let use_ = match self.member_reads.get(&reference) {
        Some((member, property)) => NamespaceUse {
          node: *member,
          property: Some(property.clone()),
        },
        None => NamespaceUse {
          node: reference,
          property: None,
        },
      };
      self
        .graph
        .namespace_uses
        .entry(binding)
        .or_default()
        .push(use_);
    }
    self.graph.globals = self.scopes.finish();
    self.graph
  }
}

/// Walks the module once, producing its dependency graph.
pub fn build_graph(ast: &Ast) -> DependencyGraph {
  let mut builder = Builder {
    ast,
    scopes: ScopeTracker::new(),
    graph: DependencyGraph::default(),
    writes: Vec::new(),
    member_reads: HashMap::new(),
    namespaces: HashSet::new(),
  };
  builder.predeclare(ast.top_level_statements());
  for stmt in ast.top_level_statements() {
    builder.module_item(*stmt);
  }
  builder.finish()
}
