use crate::graph::build_graph;
use crate::graph::DependencyGraph;
use ahash::HashSet;
use ahash::HashSetExt;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use syntax_js::ast::Ast;
use syntax_js::ast::ImportName;
use syntax_js::ast::NodeId;
use syntax_js::ast::NodeKind;
use syntax_js::emit;

/// Requested name meaning "every export".
pub const WILDCARD: &str = "*";

#[derive(Clone, Debug)]
pub struct ShakeOptions {
  /// Keep `import "m"` statements even though nothing depends on them.
  pub keep_side_effect_imports: bool,
}

impl Default for ShakeOptions {
  fn default() -> Self {
    ShakeOptions {
      keep_side_effect_imports: true,
    }
  }
}

#[derive(Clone, Debug)]
pub struct ShakeResult {
  pub ast: Ast,
  pub code: String,
  /// Module specifier to the names still required from it. `*` means all names; an empty set means
  /// the module is only imported for its side effects.
  pub imports: BTreeMap<String, BTreeSet<String>>,
}

fn requests_everything(only: Option<&BTreeSet<String>>) -> bool {
  only.map_or(true, |names| names.contains(WILDCARD))
}

/// Fixed-point reachability over the graph's edges.
pub fn mark(graph: &DependencyGraph, seeds: impl IntoIterator<Item = NodeId>) -> HashSet<NodeId> {
  let mut live = HashSet::new();
  let mut queue: Vec<NodeId> = seeds.into_iter().collect();
  while let Some(id) = queue.pop() {
    if !live.insert(id) {
      continue;
    }
    for dep in graph.dependencies(id) {
      if !live.contains(dep) {
        queue.push(*dep);
      }
    }
  }
  live
}

// Rebuilds the module with dead sweep units dropped. Only nodes whose own child list shrinks are
// patched, everything else is shared with the input tree.
fn sweep(ast: &Ast, live: &HashSet<NodeId>) -> Ast {
  let mut out = ast.clone();
  let mut kept_body = Vec::new();
  for stmt in ast.top_level_statements() {
    if !live.contains(stmt) {
      continue;
    }
    kept_body.push(*stmt);
    let target = match ast.kind(*stmt) {
      NodeKind::ExportDecl { decl } => *decl,
      _ => *stmt,
    };
    let kind = ast.kind(target);
    if let Some(children) = kind.removable_children() {
      let kept: Vec<NodeId> = children.iter().copied().filter(|c| live.contains(c)).collect();
      if kept.len() != children.len() {
        out.replace(target, kind.with_removable_children(kept));
      }
    }
  }
  let root = ast.root();
  if kept_body.len() != ast.top_level_statements().len() {
    let patched = ast.kind(root).with_removable_children(kept_body);
    out.replace(root, patched);
  }
  out
}

fn import_key(imported: &ImportName) -> String {
  match imported {
    ImportName::Default => "default".to_string(),
    ImportName::Named(name) => name.clone(),
    ImportName::Namespace => WILDCARD.to_string(),
  }
}

/// Removes everything from `ast` that the exports named in `only` do not need. `None` or a set
/// containing `*` keeps every export.
pub fn shake(ast: &Ast, only: Option<&BTreeSet<String>>, options: &ShakeOptions) -> ShakeResult {
  let graph = build_graph(ast);
  shake_with_graph(ast, &graph, only, options)
}

pub fn shake_with_graph(
  ast: &Ast,
  graph: &DependencyGraph,
  only: Option<&BTreeSet<String>>,
  options: &ShakeOptions,
) -> ShakeResult {
  let everything = requests_everything(only);
  let mut seeds = Vec::new();
  // Names that no local export provides; they may come through `export *`.
  let mut forwarded = BTreeSet::new();
  if everything {
    seeds.extend(graph.exports().values().flatten().copied());
    seeds.extend(graph.opaque_exports().iter().copied());
    seeds.extend(graph.reexports().iter().map(|(_, node)| *node));
  } else if let Some(names) = only {
    for name in names {
      if let Some(nodes) = graph.exports().get(name) {
        seeds.extend(nodes.iter().copied());
        continue;
      }
      seeds.extend(graph.opaque_exports().iter().copied());
      if !graph.reexports().is_empty() {
        forwarded.insert(name.clone());
        seeds.extend(graph.reexports().iter().map(|(_, node)| *node));
      }
    }
  }
  if options.keep_side_effect_imports {
    seeds.extend(graph.side_effect_imports().iter().map(|(_, node)| *node));
  }

  let live = mark(graph, seeds);
  let shaken = sweep(ast, &live);

  let mut imports: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
  for record in graph.imports() {
    if !live.contains(&record.node) {
      continue;
    }
    let names = imports.entry(record.source.clone()).or_default();
    match (&record.imported, record.binding) {
      (ImportName::Namespace, Some(binding)) => {
        let uses: Vec<_> = graph
          .namespace_uses(binding)
          .iter()
          .filter(|u| live.contains(&u.node))
          .collect();
        if uses.is_empty() || uses.iter().any(|u| u.property.is_none()) {
          names.insert(WILDCARD.to_string());
        } else {
          names.extend(uses.iter().filter_map(|u| u.property.clone()));
        }
      }
      (imported, _) => {
        names.insert(import_key(imported));
      }
    };
  }
  for (source, node) in graph.reexports() {
    if !live.contains(node) {
      continue;
    }
    let names = imports.entry(source.clone()).or_default();
    if everything {
      names.insert(WILDCARD.to_string());
    } else {
      names.extend(forwarded.iter().cloned());
    }
  }
  for (source, node) in graph.side_effect_imports() {
    if live.contains(node) {
      imports.entry(source.clone()).or_default();
    }
  }
  // Import statements kept only for their side effects after all specifiers were dropped.
  for stmt in shaken.top_level_statements() {
    if let NodeKind::Import { specifiers, source } = shaken.kind(*stmt) {
      if specifiers.is_empty() {
        imports.entry(source.clone()).or_default();
      }
    }
  }

  let code = emit(&shaken);
  ShakeResult {
    ast: shaken,
    code,
    imports,
  }
}
