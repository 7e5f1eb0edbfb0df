use crate::action::ActionKey;
use crate::action::Outcome;
use crate::entrypoint::Entrypoint;
use crate::entrypoint::EntrypointId;
use crate::host::FileId;
use crate::tags::PrevalPlan;
use ahash::HashMap;
use ahash::HashSet;
use ahash::HashSetExt;
use sha2::Digest;
use sha2::Sha256;
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::rc::Rc;
use syntax_js::ast::Ast;
use syntax_js::error::SyntaxError;
use tracing::debug;

/// Lowercase hex SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
  let digest = Sha256::digest(text.as_bytes());
  let mut out = String::with_capacity(digest.len() * 2);
  for byte in digest.iter() {
    let _ = write!(out, "{byte:02x}");
  }
  out
}

/// A module ready for evaluation: its shaken tree and the files its imports resolved to.
#[derive(Debug)]
pub struct PreparedModule {
  pub file: FileId,
  pub only: BTreeSet<String>,
  pub ast: Ast,
  pub code: String,
  /// Specifier to requested names, `*` meaning all names.
  pub imports: BTreeMap<String, BTreeSet<String>>,
  pub resolved: BTreeMap<String, FileId>,
  /// Tagged templates found in a root module.
  pub preval: Option<Rc<PrevalPlan>>,
}

/// Keyed storage shared by every action of a pipeline run, and optionally across runs.
///
/// Each family is keyed by file identity so that a changed file can be invalidated without touching
/// unrelated files. Writes are last-writer-wins; an entrypoint that has been superseded may still
/// write under its own action keys, which are never read again.
#[derive(Default)]
pub struct Cache {
  entrypoints: RefCell<HashMap<FileId, Rc<Entrypoint>>>,
  asts: RefCell<HashMap<FileId, Ast>>,
  resolved: RefCell<HashMap<FileId, HashMap<String, FileId>>>,
  exports: RefCell<HashMap<FileId, Rc<Vec<String>>>>,
  code: RefCell<HashMap<FileId, Rc<PreparedModule>>>,
  actions: RefCell<HashMap<FileId, HashMap<ActionKey, Outcome>>>,
  hashes: RefCell<HashMap<FileId, String>>,
  dependencies: RefCell<HashMap<FileId, BTreeSet<FileId>>>,
  next_entrypoint: Cell<u32>,
  parses: Cell<usize>,
}

impl Cache {
  pub fn new() -> Cache {
    Cache::default()
  }

  pub(crate) fn next_entrypoint_id(&self) -> EntrypointId {
    let id = self.next_entrypoint.get();
    self.next_entrypoint.set(id + 1);
    EntrypointId(id)
  }

  pub fn entrypoint(&self, file: &FileId) -> Option<Rc<Entrypoint>> {
    self.entrypoints.borrow().get(file).cloned()
  }

  pub(crate) fn set_entrypoint(&self, entrypoint: Rc<Entrypoint>) {
    self
      .entrypoints
      .borrow_mut()
      .insert(entrypoint.name.clone(), entrypoint);
  }

  /// The parsed tree of `file`, parsing `source` on a miss.
  pub fn ast(&self, file: &FileId, source: &str) -> Result<Ast, SyntaxError> {
    if let Some(ast) = self.asts.borrow().get(file) {
      debug!(%file, "ast cache hit");
      return Ok(ast.clone());
    }
    let ast = syntax_js::parse(source)?;
    self.parses.set(self.parses.get() + 1);
    self.asts.borrow_mut().insert(file.clone(), ast.clone());
    Ok(ast)
  }

  pub fn cached_ast(&self, file: &FileId) -> Option<Ast> {
    self.asts.borrow().get(file).cloned()
  }

  /// Number of parses performed through this cache.
  pub fn parse_count(&self) -> usize {
    self.parses.get()
  }

  pub fn resolved(&self, importer: &FileId, specifier: &str) -> Option<FileId> {
    self
      .resolved
      .borrow()
      .get(importer)
      .and_then(|m| m.get(specifier))
      .cloned()
  }

  pub(crate) fn set_resolved(&self, importer: &FileId, specifier: &str, file: FileId) {
    self
      .resolved
      .borrow_mut()
      .entry(importer.clone())
      .or_default()
      .insert(specifier.to_string(), file);
  }

  pub fn export_names(&self, file: &FileId) -> Option<Rc<Vec<String>>> {
    self.exports.borrow().get(file).cloned()
  }

  pub(crate) fn set_export_names(&self, file: &FileId, names: Rc<Vec<String>>) {
    self.exports.borrow_mut().insert(file.clone(), names);
  }

  pub fn code(&self, file: &FileId) -> Option<Rc<PreparedModule>> {
    self.code.borrow().get(file).cloned()
  }

  pub(crate) fn set_code(&self, module: Rc<PreparedModule>) {
    self.code.borrow_mut().insert(module.file.clone(), module);
  }

  pub(crate) fn action(&self, file: &FileId, key: &ActionKey) -> Option<Outcome> {
    self
      .actions
      .borrow()
      .get(file)
      .and_then(|m| m.get(key))
      .cloned()
  }

  pub(crate) fn set_action(&self, file: &FileId, key: ActionKey, outcome: Outcome) {
    self
      .actions
      .borrow_mut()
      .entry(file.clone())
      .or_default()
      .insert(key, outcome);
  }

  pub(crate) fn add_dependency(&self, importer: &FileId, dependency: &FileId) {
    self
      .dependencies
      .borrow_mut()
      .entry(importer.clone())
      .or_default()
      .insert(dependency.clone());
  }

  /// Every file reachable through imports from `file`, excluding `file` itself.
  pub fn transitive_dependencies(&self, file: &FileId) -> BTreeSet<FileId> {
    let deps = self.dependencies.borrow();
    let mut seen = BTreeSet::new();
    let mut queue = vec![file.clone()];
    while let Some(next) = queue.pop() {
      for dep in deps.get(&next).into_iter().flatten() {
        if dep != file && seen.insert(dep.clone()) {
          queue.push(dep.clone());
        }
      }
    }
    seen
  }

  /// Files that import `file` directly.
  pub fn dependents(&self, file: &FileId) -> BTreeSet<FileId> {
    self
      .dependencies
      .borrow()
      .iter()
      .filter(|(_, deps)| deps.contains(file))
      .map(|(importer, _)| importer.clone())
      .collect()
  }

  pub fn content_hash(&self, file: &FileId) -> Option<String> {
    self.hashes.borrow().get(file).cloned()
  }

  /// Records the hash of `source` for `file`. If a different hash was recorded before, every cached
  /// result for `file` and for the files importing it is dropped. Returns whether the content
  /// changed.
  pub fn invalidate_if_changed(&self, file: &FileId, source: &str) -> bool {
    let hash = content_hash(source);
    let previous = self.hashes.borrow_mut().insert(file.clone(), hash.clone());
    match previous {
      Some(previous) if previous != hash => {
        debug!(%file, "content changed");
        self.invalidate(file);
        true
      }
      _ => false,
    }
  }

  /// Drops every cached result for `file` and, transitively, for the files that import it. Content
  /// hashes are kept.
  pub fn invalidate(&self, file: &FileId) {
    let mut seen = HashSet::new();
    let mut queue = vec![file.clone()];
    while let Some(next) = queue.pop() {
      if !seen.insert(next.clone()) {
        continue;
      }
      queue.extend(self.dependents(&next));
      self.invalidate_one(&next);
    }
  }

  fn invalidate_one(&self, file: &FileId) {
    debug!(%file, "invalidating cache");
    self.entrypoints.borrow_mut().remove(file);
    self.asts.borrow_mut().remove(file);
    self.resolved.borrow_mut().remove(file);
    self.exports.borrow_mut().remove(file);
    self.code.borrow_mut().remove(file);
    self.actions.borrow_mut().remove(file);
    self.dependencies.borrow_mut().remove(file);
  }

  /// Number of files with a parsed tree, live entrypoint or prepared module.
  pub fn len(&self) -> usize {
    let mut files: HashSet<FileId> = HashSet::new();
    files.extend(self.asts.borrow().keys().cloned());
    files.extend(self.entrypoints.borrow().keys().cloned());
    files.extend(self.code.borrow().keys().cloned());
    files.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hashes_content() {
    assert_eq!(
      content_hash("abc"),
      "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
  }

  #[test]
  fn parses_once_per_file() {
    let cache = Cache::new();
    let file = FileId::new("/a.js");
    let first = cache.ast(&file, "export const a = 1;").unwrap();
    let second = cache.ast(&file, "export const a = 1;").unwrap();
    assert!(first.shares_base_with(&second));
    assert_eq!(cache.parse_count(), 1);
  }

  #[test]
  fn invalidation_cascades_to_importers_only() {
    let cache = Cache::new();
    let (a, b, c, d) = (
      FileId::new("/a.js"),
      FileId::new("/b.js"),
      FileId::new("/c.js"),
      FileId::new("/d.js"),
    );
    for file in [&a, &b, &c, &d] {
      cache.ast(file, "export const x = 1;").unwrap();
      assert!(!cache.invalidate_if_changed(file, "export const x = 1;"));
    }
    cache.add_dependency(&a, &b);
    cache.add_dependency(&b, &c);

    assert!(!cache.invalidate_if_changed(&c, "export const x = 1;"));
    assert!(cache.cached_ast(&a).is_some());

    assert!(cache.invalidate_if_changed(&c, "export const x = 2;"));
    assert!(cache.cached_ast(&a).is_none());
    assert!(cache.cached_ast(&b).is_none());
    assert!(cache.cached_ast(&c).is_none());
    assert!(cache.cached_ast(&d).is_some());
    assert_eq!(cache.content_hash(&c), Some(content_hash("export const x = 2;")));
  }

  #[test]
  fn collects_transitive_dependencies() {
    let cache = Cache::new();
    let (a, b, c) = (FileId::new("/a.js"), FileId::new("/b.js"), FileId::new("/c.js"));
    cache.add_dependency(&a, &b);
    cache.add_dependency(&b, &c);
    cache.add_dependency(&c, &a);
    assert_eq!(
      cache.transitive_dependencies(&a),
      [b.clone(), c.clone()].into_iter().collect()
    );
    assert_eq!(cache.dependents(&a), [c].into_iter().collect());
  }
}
