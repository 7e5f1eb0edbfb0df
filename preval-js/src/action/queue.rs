use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

pub type SlotId = usize;

/// Ordering inputs of a queued action, most significant first.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Priority {
  /// Fixed stage weight.
  pub weight: u8,
  /// How many actions currently wait on the action's entrypoint.
  pub refs: usize,
  /// Distance of the entrypoint from the root; closer runs first.
  pub depth: usize,
}

#[derive(PartialEq, Eq, Debug)]
struct Entry {
  priority: Priority,
  seq: u64,
  slot: SlotId,
  version: u64,
}

impl Entry {
  fn rank(&self) -> (u8, usize, Reverse<usize>, Reverse<u64>) {
    (
      self.priority.weight,
      self.priority.refs,
      Reverse(self.priority.depth),
      Reverse(self.seq),
    )
  }
}

impl Ord for Entry {
  fn cmp(&self, other: &Self) -> Ordering {
    self.rank().cmp(&other.rank())
  }
}

impl PartialOrd for Entry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

/// Max-heap of runnable actions.
///
/// Entries are never removed in place. Re-prioritising a slot pushes a new entry with a higher
/// version, and the scheduler skips entries whose version no longer matches the slot.
#[derive(Default)]
pub struct ActionQueue {
  heap: BinaryHeap<Entry>,
  seq: u64,
}

impl ActionQueue {
  pub fn push(&mut self, slot: SlotId, version: u64, priority: Priority) {
    self.seq += 1;
    self.heap.push(Entry {
      priority,
      seq: self.seq,
      slot,
      version,
    });
  }

  pub fn pop(&mut self) -> Option<(SlotId, u64)> {
    self.heap.pop().map(|e| (e.slot, e.version))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn priority(weight: u8, refs: usize, depth: usize) -> Priority {
    Priority {
      weight,
      refs,
      depth,
    }
  }

  #[test]
  fn orders_by_weight_then_refs_then_depth_then_age() {
    let mut queue = ActionQueue::default();
    queue.push(0, 0, priority(5, 1, 0));
    queue.push(1, 0, priority(50, 1, 3));
    queue.push(2, 0, priority(15, 1, 1));
    queue.push(3, 0, priority(15, 3, 2));
    queue.push(4, 0, priority(15, 1, 0));
    queue.push(5, 0, priority(15, 1, 0));
    let order: Vec<SlotId> = std::iter::from_fn(|| queue.pop().map(|(slot, _)| slot)).collect();
    assert_eq!(order, vec![1, 3, 4, 5, 2, 0]);
    assert!(queue.pop().is_none());
  }
}
