use ahash::HashMap;
use ahash::HashMapExt;
use syntax_js::ast::NodeId;

/// Names the module scope declares before any source is visited. Writes through them
/// (`exports.name = value`) form the module's export surface.
pub const AMBIENT_BINDINGS: [&str; 2] = ["exports", "module"];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScopeKind {
  Module,
  Function,
  Block,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Declaration {
  Node(NodeId),
  Ambient,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Resolution {
  Declared(Declaration),
  // The declaration has not been visited yet; it will be reported by the `declare` call that
  // introduces it.
  Pending,
}

#[derive(Debug)]
struct PendingReference {
  name: String,
  reference: NodeId,
}

#[derive(Debug)]
struct Scope {
  kind: ScopeKind,
  bindings: HashMap<String, Declaration>,
  pending: Vec<PendingReference>,
}

impl Scope {
  fn new(kind: ScopeKind) -> Scope {
    Scope {
      kind,
      bindings: HashMap::new(),
      pending: Vec::new(),
    }
  }
}

/// Tracks declarations and references across nested lexical scopes during a single walk.
///
/// References to names that are not yet declared are parked in the innermost scope and move to the
/// parent scope when that scope is popped, so a later hoisted declaration (`var`, `function`) in any
/// enclosing scope still resolves them.
#[derive(Debug)]
pub struct ScopeTracker {
  scopes: Vec<Scope>,
}

impl ScopeTracker {
  pub fn new() -> ScopeTracker {
    let mut scope = Scope::new(ScopeKind::Module);
    for name in AMBIENT_BINDINGS {
      scope.bindings.insert(name.to_string(), Declaration::Ambient);
    }
    ScopeTracker {
      scopes: vec![scope],
    }
  }

  pub fn push(&mut self, kind: ScopeKind) {
    self.scopes.push(Scope::new(kind));
  }

  /// Leaves the innermost scope, discarding its bindings. Its unresolved references move outwards.
  pub fn pop(&mut self) {
    if self.scopes.len() <= 1 {
      return;
    }
    if let Some(scope) = self.scopes.pop() {
      if let Some(parent) = self.scopes.last_mut() {
        parent.pending.extend(scope.pending);
      }
    }
  }

  fn closure_scope_index(&self) -> usize {
    self
      .scopes
      .iter()
      .rposition(|s| matches!(s.kind, ScopeKind::Function | ScopeKind::Module))
      .unwrap_or(0)
  }

  /// Registers a binding in the nearest function scope if `hoistable`, otherwise in the innermost
  /// scope. Returns the previously pending references that this declaration resolves.
  pub fn declare(&mut self, name: &str, node: NodeId, hoistable: bool) -> Vec<NodeId> {
    let target = if hoistable {
      self.closure_scope_index()
    } else {
      self.scopes.len() - 1
    };
    self.scopes[target]
      .bindings
      .insert(name.to_string(), Declaration::Node(node));
    let mut resolved = Vec::new();
    for scope in &mut self.scopes[target..] {
      scope.pending.retain(|p| {
        if p.name == name {
          resolved.push(p.reference);
          false
        } else {
          true
        }
      });
    }
    resolved
  }

  pub fn lookup(&self, name: &str) -> Option<Declaration> {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|s| s.bindings.get(name).copied())
  }

  /// Resolves a reference against the visible bindings, parking it if nothing declares it yet.
  pub fn add_reference(&mut self, name: &str, reference: NodeId) -> Resolution {
    if let Some(decl) = self.lookup(name) {
      return Resolution::Declared(decl);
    }
    if let Some(scope) = self.scopes.last_mut() {
      scope.pending.push(PendingReference {
        name: name.to_string(),
        reference,
      });
    }
    Resolution::Pending
  }

  /// Ends the walk, returning references that no declaration ever resolved (globals).
  pub fn finish(mut self) -> Vec<(String, NodeId)> {
    while self.scopes.len() > 1 {
      self.pop();
    }
    self
      .scopes
      .pop()
      .map(|s| s.pending.into_iter().map(|p| (p.name, p.reference)).collect())
      .unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn resolves_through_nested_scopes() {
    let mut scopes = ScopeTracker::new();
    assert!(scopes.declare("a", NodeId(1), false).is_empty());
    scopes.push(ScopeKind::Function);
    scopes.push(ScopeKind::Block);
    assert_eq!(
      scopes.add_reference("a", NodeId(4)),
      Resolution::Declared(Declaration::Node(NodeId(1)))
    );
    assert_eq!(
      scopes.add_reference("exports", NodeId(5)),
      Resolution::Declared(Declaration::Ambient)
    );
  }

  #[test]
  fn shadowing_is_discarded_on_pop() {
    let mut scopes = ScopeTracker::new();
    scopes.declare("x", NodeId(1), false);
    scopes.push(ScopeKind::Block);
    scopes.declare("x", NodeId(3), false);
    assert_eq!(scopes.lookup("x"), Some(Declaration::Node(NodeId(3))));
    scopes.pop();
    assert_eq!(scopes.lookup("x"), Some(Declaration::Node(NodeId(1))));
  }

  #[test]
  fn forward_references_resolve_on_declaration() {
    let mut scopes = ScopeTracker::new();
    scopes.push(ScopeKind::Function);
    assert_eq!(scopes.add_reference("later", NodeId(2)), Resolution::Pending);
    scopes.pop();
    assert_eq!(scopes.declare("later", NodeId(3), false), vec![NodeId(2)]);
    assert!(scopes.finish().is_empty());
  }

  #[test]
  fn hoisted_declarations_skip_block_scopes() {
    let mut scopes = ScopeTracker::new();
    scopes.push(ScopeKind::Function);
    scopes.push(ScopeKind::Block);
    assert_eq!(scopes.add_reference("v", NodeId(3)), Resolution::Pending);
    assert_eq!(scopes.declare("v", NodeId(4), true), vec![NodeId(3)]);
    scopes.pop();
    assert_eq!(scopes.lookup("v"), Some(Declaration::Node(NodeId(4))));
    scopes.pop();
    scopes.pop();
    assert_eq!(scopes.lookup("v"), None);
  }

  #[test]
  fn unresolved_references_are_globals() {
    let mut scopes = ScopeTracker::new();
    scopes.push(ScopeKind::Block);
    scopes.add_reference("console", NodeId(2));
    assert_eq!(scopes.finish(), vec![("console".to_string(), NodeId(2))]);
  }
}
