use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

struct Inner {
  aborted: Cell<bool>,
  parents: RefCell<Vec<AbortSignal>>,
}

/// Cancellation flag of one action.
///
/// A signal is aborted when it was aborted directly (its entrypoint was superseded) or when it has
/// parents (the signals of the actions awaiting it) and every one of them is aborted.
#[derive(Clone)]
pub struct AbortSignal(Rc<Inner>);

impl Default for AbortSignal {
  fn default() -> Self {
    AbortSignal::new()
  }
}

impl AbortSignal {
  pub fn new() -> AbortSignal {
    AbortSignal(Rc::new(Inner {
      aborted: Cell::new(false),
      parents: RefCell::new(Vec::new()),
    }))
  }

  pub fn child_of(parent: &AbortSignal) -> AbortSignal {
    let signal = AbortSignal::new();
    signal.add_parent(parent);
    signal
  }

  pub fn add_parent(&self, parent: &AbortSignal) {
    if Rc::ptr_eq(&self.0, &parent.0) {
      return;
    }
    self.0.parents.borrow_mut().push(parent.clone());
  }

  pub fn abort(&self) {
    self.0.aborted.set(true);
  }

  pub fn is_aborted(&self) -> bool {
    if self.0.aborted.get() {
      return true;
    }
    let parents = self.0.parents.borrow();
    !parents.is_empty() && parents.iter().all(AbortSignal::is_aborted)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn aborts_when_every_parent_is_aborted() {
    let a = AbortSignal::new();
    let b = AbortSignal::new();
    let child = AbortSignal::child_of(&a);
    child.add_parent(&b);
    let grandchild = AbortSignal::child_of(&child);

    a.abort();
    assert!(!child.is_aborted());
    b.abort();
    assert!(child.is_aborted());
    assert!(grandchild.is_aborted());
  }

  #[test]
  fn own_abort_wins() {
    let parent = AbortSignal::new();
    let child = AbortSignal::child_of(&parent);
    child.abort();
    assert!(child.is_aborted());
    assert!(!parent.is_aborted());
  }
}
