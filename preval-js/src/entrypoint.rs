use crate::error::PipelineError;
use crate::exports::Exports;
use crate::host::FileId;
use crate::services::Services;
use shaker_js::WILDCARD;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct EntrypointId(pub u32);

impl fmt::Display for EntrypointId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Whether `have` already provides every name in `want`.
pub fn covers(have: &BTreeSet<String>, want: &BTreeSet<String>) -> bool {
  have.contains(WILDCARD) || want.is_subset(have)
}

pub(crate) fn merge(a: &BTreeSet<String>, b: &BTreeSet<String>) -> BTreeSet<String> {
  if a.contains(WILDCARD) || b.contains(WILDCARD) {
    return [WILDCARD.to_string()].into_iter().collect();
  }
  a.union(b).cloned().collect()
}

type SupersedeCallback = Box<dyn FnOnce(&Rc<Entrypoint>)>;

/// One file processed for one set of requested export names.
///
/// An entrypoint never changes what it was asked for. A request that needs more names, or a change
/// of the file's content, creates a new entrypoint that supersedes this one; both coexist until the
/// actions holding the old one are gone.
pub struct Entrypoint {
  pub id: EntrypointId,
  pub name: FileId,
  /// Requested export names; `*` means all.
  pub only: BTreeSet<String>,
  evaluated_only: RefCell<BTreeSet<String>>,
  pub generation: u32,
  pub source: Arc<str>,
  pub parent: Option<Rc<Entrypoint>>,
  /// Number of ancestors.
  pub depth: usize,
  /// Matched an ignore rule: passes through unshaken.
  pub ignored: bool,
  exports: Rc<Exports>,
  superseded_with: RefCell<Option<Rc<Entrypoint>>>,
  on_supersede: RefCell<Vec<SupersedeCallback>>,
}

impl fmt::Debug for Entrypoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Entrypoint")
      .field("id", &self.id)
      .field("name", &self.name)
      .field("only", &self.only)
      .field("generation", &self.generation)
      .finish_non_exhaustive()
  }
}

pub enum Created {
  /// A new entrypoint (fresh or superseding) that needs processing.
  Created(Rc<Entrypoint>),
  /// The live entrypoint already covers the request.
  Cached(Rc<Entrypoint>),
  /// The file is already being processed by an ancestor. The entrypoint may have been superseded to
  /// cover the requested names, but the caller must not process it again.
  Loop(Rc<Entrypoint>),
}

impl Created {
  pub fn entrypoint(&self) -> &Rc<Entrypoint> {
    match self {
      Created::Created(e) | Created::Cached(e) | Created::Loop(e) => e,
    }
  }
}

impl Entrypoint {
  /// Returns the entrypoint for `name` covering `only`, reusing or superseding the live one.
  ///
  /// `loaded` is the current source text if the caller has it; a content change drops every cached
  /// result for the file first. Without it, the live entrypoint's source is reused or the file is
  /// loaded through the host.
  pub fn create(
    services: &Services,
    parent: Option<&Rc<Entrypoint>>,
    name: &FileId,
    only: &BTreeSet<String>,
    loaded: Option<Arc<str>>,
  ) -> Result<Created, PipelineError> {
    let cache = services.cache;
    let previous = cache.entrypoint(name);
    let source = match (loaded, &previous) {
      (Some(source), _) => source,
      (None, Some(previous)) => previous.source.clone(),
      (None, None) => services
        .loader
        .file_text(name)
        .map_err(|e| PipelineError::Load {
          file: name.clone(),
          message: e.message().to_string(),
        })?,
    };
    let changed = cache.invalidate_if_changed(name, &source);

    let is_loop = parent.is_some_and(|p| p.has_ancestor_file(name));
    if let Some(previous) = previous {
      if changed {
        let next = Rc::new(Entrypoint {
          id: cache.next_entrypoint_id(),
          name: name.clone(),
          only: only.clone(),
          evaluated_only: RefCell::new(BTreeSet::new()),
          generation: previous.generation + 1,
          source,
          parent: parent.cloned(),
          depth: parent.map_or(0, |p| p.depth + 1),
          ignored: services.ignore.is_ignored(name),
          exports: Rc::new(Exports::new()),
          superseded_with: RefCell::new(None),
          on_supersede: RefCell::new(Vec::new()),
        });
        debug!(file = %name, old = %previous.id, new = %next.id, "entrypoint replaced after content change");
        cache.set_entrypoint(next.clone());
        previous.supersede(&next);
        return Ok(if is_loop {
          Created::Loop(next)
        } else {
          Created::Created(next)
        });
      }

      if covers(&previous.only, only) {
        debug!(file = %name, id = %previous.id, is_loop, "entrypoint cache hit");
        return Ok(if is_loop {
          Created::Loop(previous)
        } else {
          Created::Cached(previous)
        });
      }

      let next = previous.widen(services, merge(&previous.only, only));
      return Ok(if is_loop {
        Created::Loop(next)
      } else {
        Created::Created(next)
      });
    }

    let entrypoint = Rc::new(Entrypoint {
      id: cache.next_entrypoint_id(),
      name: name.clone(),
      only: only.clone(),
      evaluated_only: RefCell::new(BTreeSet::new()),
      generation: 0,
      source,
      parent: parent.cloned(),
      depth: parent.map_or(0, |p| p.depth + 1),
      ignored: services.ignore.is_ignored(name),
      exports: Rc::new(Exports::new()),
      superseded_with: RefCell::new(None),
      on_supersede: RefCell::new(Vec::new()),
    });
    debug!(file = %name, id = %entrypoint.id, only = ?only, "entrypoint created");
    cache.set_entrypoint(entrypoint.clone());
    Ok(if is_loop {
      Created::Loop(entrypoint)
    } else {
      Created::Created(entrypoint)
    })
  }

  // Supersedes `self` with an entrypoint for more names. The parent, source, export values and
  // evaluation progress carry over.
  fn widen(self: &Rc<Self>, services: &Services, only: BTreeSet<String>) -> Rc<Entrypoint> {
    let next = Rc::new(Entrypoint {
      id: services.cache.next_entrypoint_id(),
      name: self.name.clone(),
      only,
      evaluated_only: RefCell::new(self.evaluated_only.borrow().clone()),
      generation: self.generation + 1,
      source: self.source.clone(),
      parent: self.parent.clone(),
      depth: self.depth,
      ignored: self.ignored,
      exports: self.exports.clone(),
      superseded_with: RefCell::new(None),
      on_supersede: RefCell::new(Vec::new()),
    });
    debug!(file = %self.name, old = %self.id, new = %next.id, only = ?next.only, "entrypoint superseded");
    services.cache.set_entrypoint(next.clone());
    self.supersede(&next);
    next
  }

  fn supersede(&self, next: &Rc<Entrypoint>) {
    *self.superseded_with.borrow_mut() = Some(next.clone());
    let callbacks = std::mem::take(&mut *self.on_supersede.borrow_mut());
    for callback in callbacks {
      callback(next);
    }
  }

  /// Runs `callback` with the superseding entrypoint once this one is superseded, or immediately if
  /// it already is.
  pub fn on_supersede(&self, callback: impl FnOnce(&Rc<Entrypoint>) + 'static) {
    let next = self.superseded_with.borrow().clone();
    match next {
      Some(next) => callback(&next.latest()),
      None => self.on_supersede.borrow_mut().push(Box::new(callback)),
    }
  }

  pub fn superseded_with(&self) -> Option<Rc<Entrypoint>> {
    self.superseded_with.borrow().clone()
  }

  pub fn is_superseded(&self) -> bool {
    self.superseded_with.borrow().is_some()
  }

  /// The newest entrypoint in this one's supersession chain.
  pub fn latest(self: &Rc<Self>) -> Rc<Entrypoint> {
    let mut current = self.clone();
    while let Some(next) = current.superseded_with() {
      current = next;
    }
    current
  }

  pub fn exports(&self) -> &Rc<Exports> {
    &self.exports
  }

  pub fn requests_everything(&self) -> bool {
    self.only.contains(WILDCARD)
  }

  /// Whether the names in `only` have all been evaluated already.
  pub fn is_evaluated(&self, only: &BTreeSet<String>) -> bool {
    covers(&self.evaluated_only.borrow(), only)
  }

  /// Records that `names` were evaluated. Names this entrypoint never requested are ignored.
  pub fn mark_evaluated(&self, names: &BTreeSet<String>) {
    let mut evaluated = self.evaluated_only.borrow_mut();
    for name in names {
      if self.only.contains(WILDCARD) || self.only.contains(name) {
        evaluated.insert(name.clone());
      }
    }
  }

  /// Ancestors from the parent up to the root.
  pub fn ancestors(&self) -> impl Iterator<Item = &Rc<Entrypoint>> {
    std::iter::successors(self.parent.as_ref(), |e| e.parent.as_ref())
  }

  /// Whether `file` is this entrypoint's file or one of its ancestors'.
  pub fn has_ancestor_file(&self, file: &FileId) -> bool {
    self.name == *file || self.ancestors().any(|e| e.name == *file)
  }

  /// Files from the root down to this one.
  pub fn stack(&self) -> Vec<FileId> {
    let mut stack: Vec<FileId> = self.ancestors().map(|e| e.name.clone()).collect();
    stack.reverse();
    stack.push(self.name.clone());
    stack
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::Cache;
  use crate::tests::TestHost;
  use std::cell::Cell;

  fn only(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
  }

  #[test]
  fn reuses_covering_entrypoints() {
    let host = TestHost::new(&[("/a.js", "export const a = 1, b = 2;")]);
    let cache = Cache::new();
    let services = host.services(&cache);
    let file = FileId::new("/a.js");

    let first = Entrypoint::create(&services, None, &file, &only(&["a", "b"]), None).unwrap();
    let Created::Created(first) = first else {
      panic!("expected a new entrypoint");
    };
    let second = Entrypoint::create(&services, None, &file, &only(&["a"]), None).unwrap();
    assert!(matches!(&second, Created::Cached(e) if Rc::ptr_eq(e, &first)));
  }

  #[test]
  fn wider_requests_supersede() {
    let host = TestHost::new(&[("/a.js", "export const a = 1, b = 2;")]);
    let cache = Cache::new();
    let services = host.services(&cache);
    let file = FileId::new("/a.js");

    let first = Entrypoint::create(&services, None, &file, &only(&["a"]), None).unwrap();
    let first = first.entrypoint().clone();
    first.mark_evaluated(&only(&["a"]));
    let fired = Rc::new(Cell::new(false));
    let flag = fired.clone();
    first.on_supersede(move |_| flag.set(true));

    let second = Entrypoint::create(&services, None, &file, &only(&["b"]), None).unwrap();
    let Created::Created(second) = second else {
      panic!("expected a superseding entrypoint");
    };
    assert!(fired.get());
    assert_eq!(second.only, only(&["a", "b"]));
    assert_eq!(second.generation, 1);
    assert!(Rc::ptr_eq(second.exports(), first.exports()));
    assert!(second.is_evaluated(&only(&["a"])));
    assert!(Rc::ptr_eq(&first.latest(), &second));
    assert!(Rc::ptr_eq(&cache.entrypoint(&file).unwrap(), &second));
  }

  #[test]
  fn detects_loops_through_file_identity() {
    let host = TestHost::new(&[
      ("/a.js", "import { b } from './b.js'; export const a = b;"),
      ("/b.js", "import { a } from './a.js'; export const b = 1;"),
    ]);
    let cache = Cache::new();
    let services = host.services(&cache);
    let (a, b) = (FileId::new("/a.js"), FileId::new("/b.js"));

    let root = Entrypoint::create(&services, None, &a, &only(&["a"]), None).unwrap();
    let root = root.entrypoint().clone();
    let child = Entrypoint::create(&services, Some(&root), &b, &only(&["b"]), None).unwrap();
    let child = child.entrypoint().clone();
    assert_eq!(child.stack(), vec![a.clone(), b.clone()]);

    let looped = Entrypoint::create(&services, Some(&child), &a, &only(&["a"]), None).unwrap();
    assert!(matches!(&looped, Created::Loop(e) if Rc::ptr_eq(e, &root)));

    // A loop still widens the requested names, keeping the original parent.
    let widened = Entrypoint::create(&services, Some(&child), &a, &only(&["x"]), None).unwrap();
    let Created::Loop(widened) = widened else {
      panic!("expected a loop");
    };
    assert_eq!(widened.only, only(&["a", "x"]));
    assert!(widened.parent.is_none());
    assert!(root.is_superseded());
  }

  #[test]
  fn content_changes_replace_the_entrypoint() {
    let host = TestHost::new(&[("/a.js", "export const a = 1;")]);
    let cache = Cache::new();
    let services = host.services(&cache);
    let file = FileId::new("/a.js");

    let first = Entrypoint::create(&services, None, &file, &only(&["a"]), None).unwrap();
    let first = first.entrypoint().clone();
    let same = Entrypoint::create(
      &services,
      None,
      &file,
      &only(&["a"]),
      Some(Arc::from("export const a = 1;")),
    )
    .unwrap();
    assert!(matches!(same, Created::Cached(_)));

    let changed = Entrypoint::create(
      &services,
      None,
      &file,
      &only(&["a"]),
      Some(Arc::from("export const a = 2;")),
    )
    .unwrap();
    let Created::Created(changed) = changed else {
      panic!("expected a replacement");
    };
    assert!(first.is_superseded());
    assert!(!Rc::ptr_eq(changed.exports(), first.exports()));
    assert_eq!(&*changed.source, "export const a = 2;");
  }

  #[test]
  fn wildcard_covers_everything() {
    assert!(covers(&only(&["*"]), &only(&["a", "b"])));
    assert!(!covers(&only(&["a"]), &only(&["*"])));
    assert_eq!(merge(&only(&["a"]), &only(&["*"])), only(&["*"]));
  }
}
