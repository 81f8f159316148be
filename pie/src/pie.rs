use std::collections::{HashMap, VecDeque};

use crate::cancel::CancelToken;
use crate::context::bottom_up::Queue;
use crate::dependency::{Observability, TaskData};
use crate::error::Result;
use crate::layer::Layer;
use crate::layer::validation::{ValidationLayer, ValidationOptions};
use crate::resource::fs::FsResourceService;
use crate::resource::{ResourceKey, ResourceService};
use crate::stamp::DefaultStampers;
use crate::store::in_memory::InMemoryStore;
use crate::store::{self, Store, StoreReadTxn, StoreWriteTxn};
use crate::task::{Tags, Task, TaskDef, TaskDefs, TaskKey};
use crate::tracker::Tracker;
use crate::value::Value;

/// Main entry point into PIE, an incremental build engine.
pub struct Pie<A = (), S = InMemoryStore> {
  store: S,
  defs: TaskDefs,
  resources: Box<dyn ResourceService>,
  layer: Box<dyn Layer>,
  tracker: A,
  stampers: DefaultStampers,
  callbacks: Callbacks,
}

impl Default for Pie {
  #[inline]
  fn default() -> Self { PieBuilder::new().build() }
}

impl<A: Tracker, S: Store> Pie<A, S> {
  /// Creates a new build session. Only one session may be active at once, enforced via mutable (exclusive) borrow.
  pub fn new_session(&mut self) -> Session<'_> {
    self.layer.session_start();
    Session(SessionData {
      txn: self.store.write_txn(),
      defs: &self.defs,
      resources: self.resources.as_ref(),
      layer: self.layer.as_mut(),
      tracker: &mut self.tracker,
      callbacks: &mut self.callbacks,
      stampers: self.stampers,
      visited: HashMap::default(),
      requiring: Vec::new(),
      scheduled: Queue::default(),
      tags: Tags::default(),
      cancel: CancelToken::default(),
    })
  }
  /// Runs `f` inside a new build session.
  #[inline]
  pub fn run_in_session<R>(&mut self, f: impl FnOnce(Session) -> R) -> R {
    let session = self.new_session();
    f(session)
  }

  #[inline]
  pub fn task_defs(&self) -> &TaskDefs { &self.defs }
  /// Registers `def`, replacing a definition with the same identifier.
  #[inline]
  pub fn add_task_def(&mut self, def: impl TaskDef + 'static) { self.defs.add(def); }
  #[inline]
  pub fn resources(&self) -> &dyn ResourceService { self.resources.as_ref() }

  #[inline]
  pub fn store(&self) -> &S { &self.store }
  #[inline]
  pub fn store_mut(&mut self) -> &mut S { &mut self.store }
  /// Flushes the store to durable media.
  #[inline]
  pub fn sync(&mut self) -> Result<()> { self.store.sync() }
  /// Flushes the store and returns it.
  pub fn close(mut self) -> Result<S> {
    self.store.close()?;
    Ok(self.store)
  }

  #[inline]
  pub fn tracker(&self) -> &A { &self.tracker }
  #[inline]
  pub fn tracker_mut(&mut self) -> &mut A { &mut self.tracker }

  /// Sets `callback` for task `key`, which is called with the output of that task whenever it is executed or found to
  /// be up-to-date. Replaces an existing callback of that task.
  #[inline]
  pub fn set_callback(&mut self, key: TaskKey, callback: impl FnMut(&Value) + 'static) {
    self.callbacks.set(key, callback);
  }
  #[inline]
  pub fn remove_callback(&mut self, key: &TaskKey) { self.callbacks.remove(key); }
  /// Removes all callbacks.
  #[inline]
  pub fn drop_callbacks(&mut self) { self.callbacks.clear(); }
}


/// Builder for [`Pie`].
pub struct PieBuilder<A = (), S = InMemoryStore> {
  store: S,
  defs: TaskDefs,
  resources: Box<dyn ResourceService>,
  layer: Box<dyn Layer>,
  tracker: A,
  stampers: DefaultStampers,
}

impl Default for PieBuilder {
  fn default() -> Self {
    Self {
      store: InMemoryStore::default(),
      defs: TaskDefs::default(),
      resources: Box::new(FsResourceService),
      layer: Box::<ValidationLayer>::default(),
      tracker: (),
      stampers: DefaultStampers::default(),
    }
  }
}

impl PieBuilder {
  /// Creates a builder with an in-memory store, the file system as resource service, a [`ValidationLayer`] with
  /// [normal](ValidationOptions::normal) options, and no tracker.
  #[inline]
  pub fn new() -> Self { Self::default() }
}

impl<A, S> PieBuilder<A, S> {
  pub fn with_store<S2: Store>(self, store: S2) -> PieBuilder<A, S2> {
    PieBuilder {
      store,
      defs: self.defs,
      resources: self.resources,
      layer: self.layer,
      tracker: self.tracker,
      stampers: self.stampers,
    }
  }
  pub fn with_tracker<A2: Tracker>(self, tracker: A2) -> PieBuilder<A2, S> {
    PieBuilder {
      store: self.store,
      defs: self.defs,
      resources: self.resources,
      layer: self.layer,
      tracker,
      stampers: self.stampers,
    }
  }

  #[inline]
  pub fn with_task_defs(mut self, defs: TaskDefs) -> Self {
    self.defs = defs;
    self
  }
  #[inline]
  pub fn with_task_def(mut self, def: impl TaskDef + 'static) -> Self {
    self.defs.add(def);
    self
  }
  #[inline]
  pub fn with_resources(mut self, resources: impl ResourceService + 'static) -> Self {
    self.resources = Box::new(resources);
    self
  }
  #[inline]
  pub fn with_layer(mut self, layer: impl Layer + 'static) -> Self {
    self.layer = Box::new(layer);
    self
  }
  /// Validates builds with a [`ValidationLayer`] configured by `options`.
  #[inline]
  pub fn with_validation(self, options: ValidationOptions) -> Self {
    self.with_layer(ValidationLayer::new(options))
  }
  #[inline]
  pub fn with_default_stampers(mut self, stampers: DefaultStampers) -> Self {
    self.stampers = stampers;
    self
  }

  pub fn build(self) -> Pie<A, S> {
    Pie {
      store: self.store,
      defs: self.defs,
      resources: self.resources,
      layer: self.layer,
      tracker: self.tracker,
      stampers: self.stampers,
      callbacks: Callbacks::default(),
    }
  }
}


/// A session in which builds are executed. Every task is executed or checked at most once per session: the second
/// require of a task returns the result of the first.
pub struct Session<'p>(SessionData<'p>);

impl<'p> Session<'p> {
  /// Requires `task` in a top-down build, returning its up-to-date output. The task becomes explicitly observed.
  #[inline]
  pub fn require(&mut self, task: &Task) -> Result<Value> {
    self.require_top_down(task, true, CancelToken::default())
  }
  /// Requires `task` like [`require`](Self::require), aborting with [`Error::Cancelled`](crate::Error::Cancelled)
  /// when `cancel` is cancelled.
  #[inline]
  pub fn require_with_cancel(&mut self, task: &Task, cancel: &CancelToken) -> Result<Value> {
    self.require_top_down(task, true, cancel.clone())
  }
  /// Requires `task` in a top-down build without changing the observability of any task.
  #[inline]
  pub fn require_without_observing(&mut self, task: &Task) -> Result<Value> {
    self.require_top_down(task, false, CancelToken::default())
  }

  fn require_top_down(&mut self, task: &Task, modify_observability: bool, cancel: CancelToken) -> Result<Value> {
    let data = &mut self.0;
    data.cancel = cancel;
    data.scheduled = Queue::default();
    let key = task.key();
    data.tracker.build_start();
    data.tracker.require_top_down_initial_start(&key, task);
    let result = data.require_initial(&key, task, modify_observability);
    data.tracker.require_top_down_initial_end(&key, task, result.as_ref().ok());
    data.tracker.build_end();
    result
  }

  /// Executes all observed tasks affected by the `changed` resources in a bottom-up build.
  #[inline]
  pub fn update_affected_by(&mut self, changed: &[ResourceKey]) -> Result<()> {
    self.update_affected_by_with_cancel(changed, &Tags::default(), &CancelToken::default())
  }
  /// Executes all observed tasks affected by the `changed` resources in a bottom-up build, deferring tasks whose
  /// definition does not want to be executed under `tags`.
  #[inline]
  pub fn update_affected_by_with_tags(&mut self, changed: &[ResourceKey], tags: &Tags) -> Result<()> {
    self.update_affected_by_with_cancel(changed, tags, &CancelToken::default())
  }
  /// Executes a bottom-up build like [`update_affected_by_with_tags`](Self::update_affected_by_with_tags), aborting
  /// with [`Error::Cancelled`](crate::Error::Cancelled) when `cancel` is cancelled.
  pub fn update_affected_by_with_cancel(&mut self, changed: &[ResourceKey], tags: &Tags, cancel: &CancelToken) -> Result<()> {
    let data = &mut self.0;
    data.cancel = cancel.clone();
    data.tags = tags.clone();
    data.tracker.build_start();
    data.tracker.require_bottom_up_initial_start(changed, tags);
    let result = data.update_affected_by(changed);
    data.tracker.require_bottom_up_initial_end();
    data.tracker.build_end();
    result
  }

  /// Explicitly unobserves task `key`. It stays implicitly observed while an observed caller requires it, otherwise it
  /// becomes unobserved, along with the tasks it requires that no observed task requires anymore.
  #[inline]
  pub fn unobserve(&mut self, key: &TaskKey) {
    store::explicit_unobserve(self.0.txn, key, self.0.tracker);
  }
  #[inline]
  pub fn is_observed(&self, key: &TaskKey) -> bool { self.0.txn.observability(key).is_observed() }
  #[inline]
  pub fn is_explicitly_observed(&self, key: &TaskKey) -> bool {
    self.0.txn.observability(key) == Observability::ExplicitObserved
  }
  /// Makes an implicitly observed task `key` explicitly observed. Returns `false` when the task is unobserved, in which
  /// case nothing changes.
  pub fn set_implicit_to_explicitly_observed(&mut self, key: &TaskKey) -> bool {
    match self.0.txn.observability(key) {
      Observability::Unobserved => false,
      Observability::ImplicitObserved => {
        store::set_observability(self.0.txn, key, Observability::ExplicitObserved, self.0.tracker);
        true
      }
      Observability::ExplicitObserved => true,
    }
  }
  /// Returns whether task `key` has been executed, in this or an earlier session.
  #[inline]
  pub fn has_been_executed(&self, key: &TaskKey) -> bool { self.0.txn.output(key).is_some() }

  /// Deletes the data of unobserved tasks for which `should_delete` returns `true`, starting at tasks without callers
  /// and continuing with the tasks they required as long as those have no callers left. Returns the keys of the deleted
  /// tasks.
  pub fn delete_unobserved_tasks(&mut self, mut should_delete: impl FnMut(&TaskKey, &TaskData) -> bool) -> Vec<TaskKey> {
    let txn = &mut *self.0.txn;
    let mut deleted = Vec::new();
    let mut queue: VecDeque<_> = txn.tasks_without_callers().into();
    while let Some(key) = queue.pop_front() {
      if txn.observability(&key).is_observed() || !txn.callers_of(&key).is_empty() { continue; }
      let Some(data) = txn.data(&key) else { continue };
      if !should_delete(&key, &data) { continue; }
      if txn.delete_data(&key).is_some() {
        log::trace!("deleted unobserved task {}", key);
        queue.extend(data.task_requires.into_iter().map(|dep| dep.callee));
        deleted.push(key);
      }
    }
    deleted
  }

  /// Gets a read transaction of the store.
  #[inline]
  pub fn store(&self) -> &dyn StoreReadTxn { self.0.txn.as_read() }
}


/// Internals for [`Session`].
pub(crate) struct SessionData<'p> {
  pub txn: &'p mut dyn StoreWriteTxn,
  pub defs: &'p TaskDefs,
  pub resources: &'p dyn ResourceService,
  pub layer: &'p mut dyn Layer,
  pub tracker: &'p mut dyn Tracker,
  pub callbacks: &'p mut Callbacks,
  pub stampers: DefaultStampers,
  pub visited: HashMap<TaskKey, TaskData>,
  /// Tasks currently being required, innermost last.
  pub requiring: Vec<TaskKey>,
  pub scheduled: Queue,
  pub tags: Tags,
  pub cancel: CancelToken,
}


/// Callbacks per task, called with the output of the task.
#[derive(Default)]
pub(crate) struct Callbacks {
  callbacks: HashMap<TaskKey, Box<dyn FnMut(&Value)>>,
}

impl Callbacks {
  #[inline]
  fn set(&mut self, key: TaskKey, callback: impl FnMut(&Value) + 'static) {
    self.callbacks.insert(key, Box::new(callback));
  }
  #[inline]
  fn remove(&mut self, key: &TaskKey) { self.callbacks.remove(key); }
  #[inline]
  fn clear(&mut self) { self.callbacks.clear(); }

  /// Calls the callback of task `key` with `output`, if it has one.
  pub(crate) fn invoke(&mut self, key: &TaskKey, output: &Value, tracker: &mut dyn Tracker) {
    if let Some(callback) = self.callbacks.get_mut(key) {
      tracker.invoke_callback_start(key, output);
      callback(output);
      tracker.invoke_callback_end(key);
    }
  }
}
