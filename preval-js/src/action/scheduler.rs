use super::abort::AbortSignal;
use super::queue::ActionQueue;
use super::queue::Priority;
use super::queue::SlotId;
use super::stage_for;
use super::ActionKind;
use super::ActionKey;
use super::ActionOutput;
use super::ActionRequest;
use super::Outcome;
use super::ResolveRequest;
use super::Resume;
use super::Stage;
use super::Step;
use crate::entrypoint::Entrypoint;
use crate::entrypoint::EntrypointId;
use crate::error::PipelineError;
use crate::host::AsyncResolver;
use crate::host::FileId;
use crate::host::HostError;
use crate::host::Resolver;
use crate::services::Services;
use ahash::HashMap;
use ahash::HashMapExt;
use ahash::HashSet;
use ahash::HashSetExt;
use futures_util::future::join_all;
use futures_util::future::LocalBoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::FutureExt;
use futures_util::StreamExt;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;
use tracing::debug_span;
use tracing::trace;

/// Who is waiting for an action's outcome.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Listener {
  Root,
  Action { slot: SlotId, index: usize },
}

enum SlotState {
  Queued(Resume),
  Running,
  Waiting,
  Resolving,
}

struct Slot {
  request: ActionRequest,
  key: ActionKey,
  stage: Box<dyn Stage>,
  signal: AbortSignal,
  listeners: Vec<Listener>,
  state: SlotState,
  results: Vec<Option<ActionOutput>>,
  pending: usize,
  version: u64,
}

type Inbox = Rc<RefCell<Vec<(EntrypointId, Rc<Entrypoint>)>>>;

/// Runs actions to completion in priority order, one suspension at a time.
///
/// Requests with the same [`ActionKey`] share a single execution; finished outcomes are stored in
/// the cache and replayed to later requesters. When an entrypoint is superseded, every action bound
/// to it is aborted and whoever still waits for one is re-attached to the same action on the
/// superseding entrypoint.
pub struct Scheduler<'s, 'a> {
  services: &'s Services<'a>,
  slots: BTreeMap<SlotId, Slot>,
  next_slot: SlotId,
  by_key: HashMap<ActionKey, SlotId>,
  queue: ActionQueue,
  refs: HashMap<EntrypointId, usize>,
  watched: HashSet<EntrypointId>,
  inbox: Inbox,
  resolves: Vec<(SlotId, Vec<ResolveRequest>)>,
  root: Option<Outcome>,
  root_signal: AbortSignal,
}

impl<'s, 'a> Scheduler<'s, 'a> {
  pub fn new(services: &'s Services<'a>) -> Scheduler<'s, 'a> {
    Scheduler {
      services,
      slots: BTreeMap::new(),
      next_slot: 0,
      by_key: HashMap::new(),
      queue: ActionQueue::default(),
      refs: HashMap::new(),
      watched: HashSet::new(),
      inbox: Rc::new(RefCell::new(Vec::new())),
      resolves: Vec::new(),
      root: None,
      root_signal: AbortSignal::new(),
    }
  }

  /// Runs `request` and everything it depends on, resolving specifiers synchronously as soon as a
  /// stage asks for them.
  pub fn run_blocking(mut self, request: ActionRequest, resolver: &dyn Resolver) -> Outcome {
    let file = request.entrypoint.name.clone();
    self.attach(request, Listener::Root);
    loop {
      if let Some(outcome) = self.root.take() {
        return outcome;
      }
      if let Some((slot, requests)) = self.resolves.pop() {
        let results = requests
          .iter()
          .map(|r| resolver.resolve(&r.specifier, &r.importer, &r.stack))
          .collect();
        self.resolved(slot, results);
        continue;
      }
      if !self.step() {
        return Err(PipelineError::Stalled(file));
      }
    }
  }

  /// Runs `request` and everything it depends on. Pending resolutions do not block actions of other
  /// entrypoints; the scheduler only awaits a resolver when nothing else can run.
  pub async fn run_async(mut self, request: ActionRequest, resolver: &dyn AsyncResolver) -> Outcome {
    let file = request.entrypoint.name.clone();
    self.attach(request, Listener::Root);
    let mut in_flight: FuturesUnordered<LocalBoxFuture<'_, (SlotId, Vec<Result<FileId, HostError>>)>> =
      FuturesUnordered::new();
    loop {
      if let Some(outcome) = self.root.take() {
        return outcome;
      }
      for (slot, requests) in self.resolves.drain(..) {
        trace!(slot, count = requests.len(), "resolving asynchronously");
        let futures: Vec<_> = requests
          .into_iter()
          .map(|r| resolver.resolve_async(r.specifier, r.importer, r.stack))
          .collect();
        in_flight.push(async move { (slot, join_all(futures).await) }.boxed_local());
      }
      if self.step() {
        continue;
      }
      match in_flight.next().await {
        Some((slot, results)) => self.resolved(slot, results),
        None => return Err(PipelineError::Stalled(file)),
      }
    }
  }

  /// Runs the next queued action until it suspends or finishes. Returns false if nothing is queued.
  fn step(&mut self) -> bool {
    self.drain_supersessions();
    let Some(id) = self.next_runnable() else {
      return false;
    };
    self.run(id);
    true
  }

  fn next_runnable(&mut self) -> Option<SlotId> {
    while let Some((id, version)) = self.queue.pop() {
      let Some(slot) = self.slots.get(&id) else {
        continue;
      };
      if slot.version != version || !matches!(slot.state, SlotState::Queued(_)) {
        continue;
      }
      if slot.signal.is_aborted() {
        trace!(kind = slot.request.kind.name(), "skipping aborted action");
        self.discard(id);
        continue;
      }
      return Some(id);
    }
    None
  }

  fn run(&mut self, id: SlotId) {
    let services = self.services;
    let step = {
      let Some(slot) = self.slots.get_mut(&id) else {
        return;
      };
      let SlotState::Queued(input) = std::mem::replace(&mut slot.state, SlotState::Running) else {
        return;
      };
      let entrypoint = &slot.request.entrypoint;
      let span = debug_span!(
        "action",
        kind = slot.request.kind.name(),
        file = %entrypoint.name,
        entrypoint = %entrypoint.id,
      );
      let _enter = span.enter();
      slot.stage.resume(services, input)
    };
    match step {
      Ok(Step::Done(output)) => self.complete(id, Ok(output)),
      Err(err) => self.complete(id, Err(err)),
      Ok(Step::Next(requests)) => self.await_actions(id, requests),
      Ok(Step::Resolve(requests)) => {
        if let Some(slot) = self.slots.get_mut(&id) {
          slot.state = SlotState::Resolving;
        }
        self.resolves.push((id, requests));
      }
    };
  }

  fn await_actions(&mut self, id: SlotId, requests: Vec<ActionRequest>) {
    if requests.is_empty() {
      self.enqueue(id, Resume::Actions(Vec::new()));
      return;
    }
    let Some(slot) = self.slots.get_mut(&id) else {
      return;
    };
    slot.state = SlotState::Waiting;
    slot.pending = requests.len();
    slot.results = vec![None; requests.len()];
    for (index, request) in requests.into_iter().enumerate() {
      // A replayed failure completes the waiting action right away.
      if !self.slots.contains_key(&id) {
        break;
      }
      self.attach(request, Listener::Action { slot: id, index });
    }
  }

  fn listener_signal(&self, listener: &Listener) -> Option<AbortSignal> {
    match listener {
      Listener::Root => Some(self.root_signal.clone()),
      Listener::Action { slot, .. } => self.slots.get(slot).map(|s| s.signal.clone()),
    }
  }

  // Whether `listener` is, through any chain of waiting actions, awaited by `slot`.
  fn waits_for(&self, slot: SlotId, listener: &Listener) -> bool {
    let Listener::Action { slot: start, .. } = *listener else {
      return false;
    };
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
      if id == slot {
        return true;
      }
      if !seen.insert(id) {
        continue;
      }
      if let Some(s) = self.slots.get(&id) {
        stack.extend(s.listeners.iter().filter_map(|l| match l {
          Listener::Action { slot, .. } => Some(*slot),
          Listener::Root => None,
        }));
      }
    }
    false
  }

  fn listener_alive(&self, listener: &Listener) -> bool {
    match listener {
      Listener::Root => true,
      Listener::Action { slot, .. } => self
        .slots
        .get(slot)
        .is_some_and(|s| !s.signal.is_aborted()),
    }
  }

  fn attach(&mut self, request: ActionRequest, listener: Listener) {
    let key = request.key();
    if let Some(outcome) = self.services.cache.action(&request.entrypoint.name, &key) {
      trace!(kind = request.kind.name(), entrypoint = %request.entrypoint.id, "replaying outcome");
      self.deliver(listener, outcome);
      return;
    }

    let parent = self.listener_signal(&listener);
    if let Some(&existing) = self.by_key.get(&key) {
      let live = self
        .slots
        .get(&existing)
        .is_some_and(|s| !s.signal.is_aborted());
      if live && self.waits_for(existing, &listener) {
        // Two import chains reached each other's files through different parents. The action
        // already runs further up this chain, so waiting for it would never finish.
        debug!(kind = request.kind.name(), entrypoint = %request.entrypoint.id, "not joining action waiting on its requester");
        let outcome = match request.kind {
          ActionKind::ProcessEntrypoint => Ok(ActionOutput::Unit),
          _ => Err(PipelineError::Stalled(request.entrypoint.name.clone())),
        };
        self.deliver(listener, outcome);
        return;
      }
      if live {
        trace!(kind = request.kind.name(), entrypoint = %request.entrypoint.id, "joining in-flight action");
        *self.refs.entry(request.entrypoint.id).or_default() += 1;
        let requeue = match self.slots.get_mut(&existing) {
          Some(slot) => {
            slot.listeners.push(listener);
            if let Some(parent) = &parent {
              slot.signal.add_parent(parent);
            }
            matches!(slot.state, SlotState::Queued(_))
          }
          None => false,
        };
        if requeue {
          self.push(existing);
        }
        return;
      }
      self.discard(existing);
    }

    self.watch(&request.entrypoint);
    let signal = match &parent {
      Some(parent) => AbortSignal::child_of(parent),
      None => AbortSignal::new(),
    };
    let id = self.next_slot;
    self.next_slot += 1;
    trace!(kind = request.kind.name(), entrypoint = %request.entrypoint.id, slot = id, "queueing action");
    *self.refs.entry(request.entrypoint.id).or_default() += 1;
    self.by_key.insert(key.clone(), id);
    self.slots.insert(id, Slot {
      stage: stage_for(&request),
      request,
      key,
      signal,
      listeners: vec![listener],
      state: SlotState::Queued(Resume::Start),
      results: Vec::new(),
      pending: 0,
      version: 0,
    });
    self.push(id);
  }

  fn deliver(&mut self, listener: Listener, outcome: Outcome) {
    let (id, index) = match listener {
      Listener::Root => {
        self.root = Some(outcome);
        return;
      }
      Listener::Action { slot, index } => (slot, index),
    };
    let output = match outcome {
      Ok(output) => output,
      Err(err) => {
        self.complete(id, Err(err));
        return;
      }
    };
    let Some(slot) = self.slots.get_mut(&id) else {
      return;
    };
    if !matches!(slot.state, SlotState::Waiting) {
      return;
    }
    match slot.results.get_mut(index) {
      Some(entry) if entry.is_none() => *entry = Some(output),
      _ => return,
    };
    slot.pending -= 1;
    if slot.pending == 0 {
      let results = std::mem::take(&mut slot.results).into_iter().flatten().collect();
      self.enqueue(id, Resume::Actions(results));
    }
  }

  fn complete(&mut self, id: SlotId, outcome: Outcome) {
    let Some(slot) = self.remove(id) else {
      return;
    };
    let kind = slot.request.kind.name();
    if slot.signal.is_aborted() {
      trace!(kind, "dropping outcome of aborted action");
      return;
    }
    match &outcome {
      Ok(_) => debug!(kind, file = %slot.request.entrypoint.name, "action done"),
      Err(err) => debug!(kind, file = %slot.request.entrypoint.name, error = %err, "action failed"),
    };
    self
      .services
      .cache
      .set_action(&slot.request.entrypoint.name, slot.key, outcome.clone());
    for listener in slot.listeners {
      self.deliver(listener, outcome.clone());
    }
  }

  fn resolved(&mut self, id: SlotId, results: Vec<Result<FileId, HostError>>) {
    let aborted = match self.slots.get(&id) {
      Some(slot) => slot.signal.is_aborted(),
      None => return,
    };
    if aborted {
      self.discard(id);
      return;
    }
    self.enqueue(id, Resume::Resolved(results));
  }

  fn enqueue(&mut self, id: SlotId, input: Resume) {
    if let Some(slot) = self.slots.get_mut(&id) {
      slot.state = SlotState::Queued(input);
      self.push(id);
    }
  }

  fn push(&mut self, id: SlotId) {
    let Some(slot) = self.slots.get_mut(&id) else {
      return;
    };
    slot.version += 1;
    let entrypoint = &slot.request.entrypoint;
    let priority = Priority {
      weight: slot.request.kind.weight(),
      refs: self.refs.get(&entrypoint.id).copied().unwrap_or(0),
      depth: entrypoint.depth,
    };
    self.queue.push(id, slot.version, priority);
  }

  fn remove(&mut self, id: SlotId) -> Option<Slot> {
    let slot = self.slots.remove(&id)?;
    if self.by_key.get(&slot.key) == Some(&id) {
      self.by_key.remove(&slot.key);
    }
    if let Some(refs) = self.refs.get_mut(&slot.request.entrypoint.id) {
      *refs = refs.saturating_sub(slot.listeners.len());
    }
    Some(slot)
  }

  fn discard(&mut self, id: SlotId) {
    if let Some(slot) = self.remove(id) {
      trace!(kind = slot.request.kind.name(), "discarded action");
    }
  }

  // Registers for supersession of `entrypoint` once per run.
  fn watch(&mut self, entrypoint: &Rc<Entrypoint>) {
    if !self.watched.insert(entrypoint.id) {
      return;
    }
    let inbox = Rc::downgrade(&self.inbox);
    let old = entrypoint.id;
    entrypoint.on_supersede(move |next| {
      if let Some(inbox) = inbox.upgrade() {
        inbox.borrow_mut().push((old, next.clone()));
      }
    });
  }

  fn drain_supersessions(&mut self) {
    let events = std::mem::take(&mut *self.inbox.borrow_mut());
    for (old, next) in events {
      let next = next.latest();
      let stale: Vec<SlotId> = self
        .slots
        .iter()
        .filter(|(_, s)| s.request.entrypoint.id == old)
        .map(|(id, _)| *id)
        .collect();
      for id in &stale {
        if let Some(slot) = self.slots.get(id) {
          slot.signal.abort();
        }
      }
      for id in stale {
        let Some(slot) = self.remove(id) else {
          continue;
        };
        debug!(
          kind = slot.request.kind.name(),
          old = %old,
          new = %next.id,
          "redirecting action of superseded entrypoint"
        );
        for listener in slot.listeners {
          if self.listener_alive(&listener) {
            let request = ActionRequest {
              kind: slot.request.kind,
              entrypoint: next.clone(),
              data: slot.request.data.clone(),
            };
            self.attach(request, listener);
          }
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::action::ActionData;
  use crate::action::ActionKind;
  use crate::cache::Cache;
  use crate::tests::TestHost;
  use std::collections::BTreeSet;

  fn only(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
  }

  #[test]
  fn shared_dependencies_are_processed_once() {
    let host = TestHost::new(&[
      ("/a.js", "import { b } from './b.js';\nimport { c } from './c.js';\nexport const a = b + c;\n"),
      ("/b.js", "import { d } from './d.js';\nexport const b = d;\n"),
      ("/c.js", "import { d } from './d.js';\nexport const c = d;\n"),
      ("/d.js", "export const d = 1;\n"),
    ]);
    let cache = Cache::new();
    let services = host.services(&cache);
    let a = FileId::new("/a.js");
    let root = Entrypoint::create(&services, None, &a, &only(&["a"]), None).unwrap();
    let request = ActionRequest::new(ActionKind::ProcessEntrypoint, root.entrypoint(), ActionData::None);

    let module = Scheduler::new(&services)
      .run_blocking(request, &host)
      .unwrap()
      .into_prepared()
      .unwrap();
    assert_eq!(module.file, a);
    assert_eq!(cache.parse_count(), 4);
    let d = cache.entrypoint(&FileId::new("/d.js")).unwrap();
    assert_eq!(d.generation, 0);
    assert!(cache.code(&FileId::new("/d.js")).is_some());
  }

  #[test]
  fn requests_follow_supersession() {
    let host = TestHost::new(&[("/a.js", "export const a = 1;\nexport const b = 2;\n")]);
    let cache = Cache::new();
    let services = host.services(&cache);
    let file = FileId::new("/a.js");
    let first = Entrypoint::create(&services, None, &file, &only(&["a"]), None).unwrap();
    let first = first.entrypoint().clone();
    Entrypoint::create(&services, None, &file, &only(&["b"]), None).unwrap();
    assert!(first.is_superseded());

    let request = ActionRequest::new(ActionKind::ProcessEntrypoint, &first, ActionData::None);
    let module = Scheduler::new(&services)
      .run_blocking(request, &host)
      .unwrap()
      .into_prepared()
      .unwrap();
    assert_eq!(module.only, only(&["a", "b"]));
    assert!(module.code.contains("const b = 2"));
  }

  #[test]
  fn failures_are_replayed_from_the_cache() {
    let host = TestHost::new(&[("/a.js", "import { x } from './missing.js';\nexport const a = x;\n")]);
    let cache = Cache::new();
    let services = host.services(&cache);
    let file = FileId::new("/a.js");
    let root = Entrypoint::create(&services, None, &file, &only(&["a"]), None).unwrap();
    let request = ActionRequest::new(ActionKind::ProcessEntrypoint, root.entrypoint(), ActionData::None);

    let first = Scheduler::new(&services).run_blocking(request.clone(), &host);
    assert!(matches!(first, Err(PipelineError::Resolve { .. })));
    let parses = cache.parse_count();
    let second = Scheduler::new(&services).run_blocking(request, &host);
    assert!(matches!(second, Err(PipelineError::Resolve { .. })));
    assert_eq!(cache.parse_count(), parses);
  }
}
