use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use pie_graph::Dag;

use crate::dependency::{Observability, ResourceProvideDep, ResourceRequireDep, TaskData, TaskRequireDep};
use crate::error::{Error, Result};
use crate::resource::ResourceKey;
use crate::store::{Store, StoreReadTxn, StoreWriteTxn};
use crate::task::TaskKey;
use crate::value::Value;

/// [`Store`] that keeps all data in memory.
///
/// Task records live in a map, resource reverse indexes in separate maps, and task-to-task dependencies in a [`Dag`]
/// which doubles as the caller index and maintains the dependency order incrementally. All of these are updated
/// together on every write.
#[derive(Default, Debug)]
pub struct InMemoryStore {
  tasks: HashMap<TaskKey, TaskRecord>,
  graph: Dag<TaskKey>,
  requirers: HashMap<ResourceKey, HashSet<TaskKey>>,
  providers: HashMap<ResourceKey, TaskKey>,
  deferred: HashSet<TaskKey>,
}

#[derive(Default, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct TaskRecord {
  input: Option<Value>,
  output: Option<Value>,
  observability: Observability,
  task_requires: Vec<TaskRequireDep>,
  resource_requires: Vec<ResourceRequireDep>,
  resource_provides: Vec<ResourceProvideDep>,
}

impl InMemoryStore {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Gets the number of tasks with a record.
  #[inline]
  pub fn num_tasks(&self) -> usize { self.tasks.len() }

  #[inline]
  fn record(&self, key: &TaskKey) -> Option<&TaskRecord> { self.tasks.get(key) }
  #[inline]
  fn record_mut(&mut self, key: &TaskKey) -> &mut TaskRecord {
    if !self.tasks.contains_key(key) {
      self.graph.add_node(key.clone());
    }
    self.tasks.entry(key.clone()).or_default()
  }

  fn replace_task_requires(&mut self, key: &TaskKey, deps: &[TaskRequireDep]) -> Result<()> {
    self.graph.add_node(key.clone());
    let previous_callees = self.graph.remove_outgoing_edges(key);
    for dep in deps {
      if self.graph.add_edge(key, &dep.callee).is_err() {
        self.graph.remove_outgoing_edges(key);
        for callee in &previous_callees {
          // Restoring edges that existed before cannot introduce a cycle.
          self.graph.add_edge(key, callee).ok();
        }
        return Err(Error::CyclicDependency { key: dep.callee.clone(), stack: vec![key.clone()] });
      }
    }
    Ok(())
  }

  fn remove_resource_requires(&mut self, key: &TaskKey, deps: &[ResourceRequireDep]) {
    for dep in deps {
      if let Some(requirers) = self.requirers.get_mut(&dep.key) {
        requirers.remove(key);
        if requirers.is_empty() {
          self.requirers.remove(&dep.key);
        }
      }
    }
  }
  fn remove_resource_provides(&mut self, key: &TaskKey, deps: &[ResourceProvideDep]) {
    for dep in deps {
      if self.providers.get(&dep.key) == Some(key) {
        self.providers.remove(&dep.key);
      }
    }
  }
}

impl Store for InMemoryStore {
  #[inline]
  fn read_txn(&self) -> &dyn StoreReadTxn { self }
  #[inline]
  fn write_txn(&mut self) -> &mut dyn StoreWriteTxn { self }
}

impl StoreReadTxn for InMemoryStore {
  #[inline]
  fn input(&self, key: &TaskKey) -> Option<Value> {
    self.record(key).and_then(|r| r.input.clone())
  }
  #[inline]
  fn output(&self, key: &TaskKey) -> Option<Value> {
    self.record(key).and_then(|r| r.output.clone())
  }
  #[inline]
  fn observability(&self, key: &TaskKey) -> Observability {
    self.record(key).map(|r| r.observability).unwrap_or_default()
  }

  #[inline]
  fn task_requires(&self, key: &TaskKey) -> Vec<TaskRequireDep> {
    self.record(key).map(|r| r.task_requires.clone()).unwrap_or_default()
  }
  #[inline]
  fn resource_requires(&self, key: &TaskKey) -> Vec<ResourceRequireDep> {
    self.record(key).map(|r| r.resource_requires.clone()).unwrap_or_default()
  }
  #[inline]
  fn resource_provides(&self, key: &TaskKey) -> Vec<ResourceProvideDep> {
    self.record(key).map(|r| r.resource_provides.clone()).unwrap_or_default()
  }

  #[inline]
  fn callers_of(&self, key: &TaskKey) -> HashSet<TaskKey> {
    self.graph.parents(key).cloned().collect()
  }
  #[inline]
  fn requirers_of(&self, resource: &ResourceKey) -> HashSet<TaskKey> {
    self.requirers.get(resource).cloned().unwrap_or_default()
  }
  #[inline]
  fn provider_of(&self, resource: &ResourceKey) -> Option<TaskKey> {
    self.providers.get(resource).cloned()
  }

  fn data(&self, key: &TaskKey) -> Option<TaskData> {
    let record = self.record(key)?;
    Some(TaskData {
      input: record.input.clone()?,
      output: record.output.clone()?,
      observability: record.observability,
      task_requires: record.task_requires.clone(),
      resource_requires: record.resource_requires.clone(),
      resource_provides: record.resource_provides.clone(),
    })
  }

  #[inline]
  fn requires_transitively(&self, caller: &TaskKey, callee: &TaskKey) -> bool {
    self.graph.contains_transitive_edge(caller, callee)
  }
  #[inline]
  fn dependency_order_cmp(&self, a: &TaskKey, b: &TaskKey) -> Ordering {
    self.graph.topo_cmp(a, b)
  }

  fn deferred_tasks(&self) -> Vec<TaskKey> {
    self.deferred.iter().cloned().collect()
  }
  fn tasks_without_callers(&self) -> Vec<TaskKey> {
    self.tasks.keys().filter(|k| self.graph.parents(k).next().is_none()).cloned().collect()
  }
  fn num_source_files(&self) -> usize {
    self.requirers.keys().filter(|r| !self.providers.contains_key(*r)).count()
  }
}

impl StoreWriteTxn for InMemoryStore {
  #[inline]
  fn as_read(&self) -> &dyn StoreReadTxn { self }

  #[inline]
  fn set_input(&mut self, key: &TaskKey, input: Value) {
    self.record_mut(key).input = Some(input);
  }
  #[inline]
  fn set_output(&mut self, key: &TaskKey, output: Value) {
    self.record_mut(key).output = Some(output);
  }
  #[inline]
  fn set_observability(&mut self, key: &TaskKey, observability: Observability) {
    self.record_mut(key).observability = observability;
  }

  fn set_task_requires(&mut self, key: &TaskKey, deps: Vec<TaskRequireDep>) -> Result<()> {
    self.replace_task_requires(key, &deps)?;
    self.record_mut(key).task_requires = deps;
    Ok(())
  }
  fn set_resource_requires(&mut self, key: &TaskKey, deps: Vec<ResourceRequireDep>) {
    let previous = std::mem::take(&mut self.record_mut(key).resource_requires);
    self.remove_resource_requires(key, &previous);
    for dep in &deps {
      self.requirers.entry(dep.key.clone()).or_default().insert(key.clone());
    }
    self.record_mut(key).resource_requires = deps;
  }
  fn set_resource_provides(&mut self, key: &TaskKey, deps: Vec<ResourceProvideDep>) {
    let previous = std::mem::take(&mut self.record_mut(key).resource_provides);
    self.remove_resource_provides(key, &previous);
    for dep in &deps {
      self.providers.insert(dep.key.clone(), key.clone());
    }
    self.record_mut(key).resource_provides = deps;
  }

  fn delete_data(&mut self, key: &TaskKey) -> Option<TaskData> {
    let record = self.tasks.remove(key)?;
    self.graph.remove_outgoing_edges(key);
    if self.graph.parents(key).next().is_none() {
      self.graph.remove_node(key);
    }
    self.remove_resource_requires(key, &record.resource_requires);
    self.remove_resource_provides(key, &record.resource_provides);
    self.deferred.remove(key);
    Some(TaskData {
      input: record.input?,
      output: record.output?,
      observability: record.observability,
      task_requires: record.task_requires,
      resource_requires: record.resource_requires,
      resource_provides: record.resource_provides,
    })
  }

  #[inline]
  fn add_deferred(&mut self, key: &TaskKey) {
    self.deferred.insert(key.clone());
  }
  #[inline]
  fn remove_deferred(&mut self, key: &TaskKey) -> bool {
    self.deferred.remove(key)
  }

  fn clear(&mut self) {
    self.tasks.clear();
    self.graph.clear();
    self.requirers.clear();
    self.providers.clear();
    self.deferred.clear();
  }
}


/// Serialized form of an [`InMemoryStore`]. Indexes are rebuilt when loading.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize, serde::Serialize)]
struct StoreSnapshot {
  tasks: Vec<(TaskKey, TaskRecord)>,
  deferred: Vec<TaskKey>,
}

#[cfg(feature = "serde")]
impl InMemoryStore {
  fn to_snapshot(&self) -> StoreSnapshot {
    let mut tasks: Vec<_> = self.tasks.iter().map(|(k, r)| (k.clone(), r.clone())).collect();
    // Callers first, so that loading adds edges that already agree with the topological order.
    tasks.sort_by(|(a, _), (b, _)| self.graph.topo_cmp(a, b));
    StoreSnapshot { tasks, deferred: self.deferred.iter().cloned().collect() }
  }

  fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
    let mut store = Self::new();
    for (key, record) in snapshot.tasks {
      let TaskRecord { input, output, observability, task_requires, resource_requires, resource_provides } = record;
      store.set_task_requires(&key, task_requires)?;
      let record = store.record_mut(&key);
      record.input = input;
      record.output = output;
      record.observability = observability;
      store.set_resource_requires(&key, resource_requires);
      store.set_resource_provides(&key, resource_provides);
    }
    store.deferred.extend(snapshot.deferred);
    Ok(store)
  }
}

#[cfg(feature = "serde")]
impl serde::Serialize for InMemoryStore {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serde::Serialize::serialize(&self.to_snapshot(), serializer)
  }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for InMemoryStore {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
    let snapshot = <StoreSnapshot as serde::Deserialize>::deserialize(deserializer)?;
    Self::from_snapshot(snapshot).map_err(serde::de::Error::custom)
  }
}
