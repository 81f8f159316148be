#![forbid(unsafe_code, missing_docs)]

//! A directed acyclic graph (DAG) over arbitrary hashable keys, which maintains a topological order of its nodes in the
//! face of single updates: adding nodes, adding edges, removing edges, and removing nodes.
//!
//! Adding nodes and removing nodes or edges never changes the topological order. Adding an edge may change the order,
//! in which case only the affected region between the two endpoints is reordered. An edge that would introduce a cycle
//! is rejected and leaves the graph unchanged.
//!
//! A topological order `ord` of a DAG `(V, E)` maps nodes to priorities such that `ord(x) < ord(y)` holds for every
//! edge `(x, y) ∈ E`. Edges therefore always point from lower to higher order, which also allows pruning searches for
//! transitive edges.
//!
//! ## Examples
//!
//! ```
//! use pie_graph::{Dag, Error};
//! use std::cmp::Ordering::*;
//!
//! let mut dag = Dag::new();
//! assert_eq!(dag.add_edge(&"build", &"compile"), Ok(true));
//! assert_eq!(dag.add_edge(&"compile", &"parse"), Ok(true));
//! assert_eq!(dag.add_edge(&"build", &"compile"), Ok(false));
//! assert_eq!(dag.add_edge(&"parse", &"build"), Err(Error::CycleDetected));
//!
//! assert!(dag.contains_transitive_edge(&"build", &"parse"));
//! assert!(!dag.contains_transitive_edge(&"parse", &"build"));
//! assert_eq!(dag.topo_cmp(&"build", &"parse"), Less);
//! ```
//!
//! ## Sources
//!
//! The ordering maintenance follows the algorithm from the [paper by D. J. Pearce and P. H. J. Kelly].
//!
//! [paper by D. J. Pearce and P. H. J. Kelly]: http://www.doc.ic.ac.uk/~phjk/Publications/DynamicTopoSortAlg-JEA-07.pdf

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};

use hashlink::LinkedHashSet;
use slotmap::{DefaultKey, SlotMap};

/// Position of a node in the topological order.
pub type TopoOrder = u32;

/// Directed acyclic graph over keys of type `K`, with an incrementally maintained topological order.
///
/// Iterating over the children or parents of a node yields them in edge insertion order.
pub struct Dag<K, H = RandomState> {
  nodes: SlotMap<DefaultKey, NodeInfo<K, H>>,
  index: HashMap<K, DefaultKey, H>,
  last_topo_order: TopoOrder,
}

struct NodeInfo<K, H> {
  key: K,
  topo_order: TopoOrder,
  parents: LinkedHashSet<DefaultKey, H>,
  children: LinkedHashSet<DefaultKey, H>,
}

/// Failures that can occur while updating the graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
  /// Adding the edge would form a cycle.
  CycleDetected,
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::CycleDetected => write!(f, "adding the edge would form a cycle"),
    }
  }
}

impl std::error::Error for Error {}


impl<K, H: BuildHasher + Default> Default for Dag<K, H> {
  #[inline]
  fn default() -> Self {
    Self {
      nodes: SlotMap::default(),
      index: HashMap::with_hasher(H::default()),
      last_topo_order: 0,
    }
  }
}

impl<K: Hash + Eq + Clone> Dag<K> {
  /// Creates a new empty graph.
  #[inline]
  pub fn new() -> Self { Self::default() }
}

impl<K: Hash + Eq + Clone, H: BuildHasher + Default> Dag<K, H> {
  /// Adds a node for `key`, placing it last in the topological order. Returns `true` if the node was added, `false` if
  /// the graph already contained it.
  #[inline]
  pub fn add_node(&mut self, key: K) -> bool {
    if self.index.contains_key(&key) {
      return false;
    }
    self.insert_node(key);
    true
  }

  /// Returns `true` if the graph contains a node for `key`.
  #[inline]
  pub fn contains_node<Q: Hash + Eq + ?Sized>(&self, key: &Q) -> bool where K: Borrow<Q> {
    self.index.contains_key(key)
  }

  /// Removes the node for `key` and all its incoming and outgoing edges. Returns `true` if the node was removed.
  ///
  /// The relative order of the remaining nodes is unchanged.
  pub fn remove_node<Q: Hash + Eq + ?Sized>(&mut self, key: &Q) -> bool where K: Borrow<Q> {
    let Some(id) = self.index.remove(key) else {
      return false;
    };
    let Some(info) = self.nodes.remove(id) else {
      return false;
    };
    for child in info.children.iter() {
      if let Some(child_info) = self.nodes.get_mut(*child) {
        child_info.parents.remove(&id);
      }
    }
    for parent in info.parents.iter() {
      if let Some(parent_info) = self.nodes.get_mut(*parent) {
        parent_info.children.remove(&id);
      }
    }
    true
  }

  /// Adds an edge from `src` to `dst`, adding nodes for them if needed. Afterwards, `src` always comes before `dst` in
  /// the topological order.
  ///
  /// Returns `Ok(true)` if the edge was added, or `Ok(false)` if the graph already contained it.
  ///
  /// # Errors
  ///
  /// Returns [`Error::CycleDetected`] if `src` equals `dst`, or if `dst` already (transitively) reaches `src`. The
  /// edges of the graph are left unchanged in that case.
  pub fn add_edge(&mut self, src: &K, dst: &K) -> Result<bool, Error> {
    if src == dst {
      return Err(Error::CycleDetected);
    }
    let src_id = self.get_or_insert_node(src);
    let dst_id = self.get_or_insert_node(dst);
    if self.nodes[src_id].children.contains(&dst_id) {
      return Ok(false);
    }

    let upper_bound = self.nodes[src_id].topo_order;
    let lower_bound = self.nodes[dst_id].topo_order;
    // Only the region between the two endpoints is affected, and only when the edge points backwards in the order.
    if lower_bound < upper_bound {
      let mut visited = HashSet::with_hasher(H::default());
      let change_forward = self.dfs_forward(dst_id, &mut visited, upper_bound)?;
      let change_backward = self.dfs_backward(src_id, &mut visited, lower_bound);
      self.reorder_nodes(change_forward, change_backward);
    }

    self.nodes[src_id].children.insert(dst_id);
    self.nodes[dst_id].parents.insert(src_id);
    Ok(true)
  }

  /// Removes the edge from `src` to `dst`. Returns `true` if the edge was removed.
  pub fn remove_edge(&mut self, src: &K, dst: &K) -> bool {
    let (Some(src_id), Some(dst_id)) = (self.id(src), self.id(dst)) else {
      return false;
    };
    if !self.nodes[src_id].children.remove(&dst_id) {
      return false;
    }
    self.nodes[dst_id].parents.remove(&src_id);
    true
  }

  /// Removes all outgoing edges of `src`, returning the keys of the nodes they pointed to.
  pub fn remove_outgoing_edges(&mut self, src: &K) -> Vec<K> {
    let Some(src_id) = self.id(src) else {
      return Vec::new();
    };
    let children: Vec<DefaultKey> = self.nodes[src_id].children.drain().collect();
    let mut removed = Vec::with_capacity(children.len());
    for child in children {
      if let Some(child_info) = self.nodes.get_mut(child) {
        child_info.parents.remove(&src_id);
        removed.push(child_info.key.clone());
      }
    }
    removed
  }

  /// Returns `true` if the graph contains an edge from `src` to `dst`.
  #[inline]
  pub fn contains_edge(&self, src: &K, dst: &K) -> bool {
    match (self.id(src), self.id(dst)) {
      (Some(src_id), Some(dst_id)) => self.nodes[src_id].children.contains(&dst_id),
      _ => false,
    }
  }

  /// Returns `true` if `dst` is reachable from `src` by following one or more edges.
  ///
  /// The search skips nodes ordered after `dst`, as no path from those nodes can lead back to `dst`.
  pub fn contains_transitive_edge(&self, src: &K, dst: &K) -> bool {
    let (Some(src_id), Some(dst_id)) = (self.id(src), self.id(dst)) else {
      return false;
    };
    if src_id == dst_id {
      return false;
    }
    let dst_order = self.nodes[dst_id].topo_order;
    if self.nodes[src_id].topo_order > dst_order {
      return false;
    }

    let mut visited = HashSet::with_hasher(H::default());
    let mut stack = vec![src_id];
    while let Some(id) = stack.pop() {
      if !visited.insert(id) {
        continue;
      }
      for child in self.nodes[id].children.iter() {
        if *child == dst_id {
          return true;
        }
        if self.nodes[*child].topo_order < dst_order {
          stack.push(*child);
        }
      }
    }
    false
  }

  /// Returns an iterator over the keys of the nodes that `src` has an edge to.
  pub fn children<'a>(&'a self, src: &K) -> impl Iterator<Item=&'a K> + 'a {
    self.id(src)
      .and_then(|id| self.nodes.get(id))
      .into_iter()
      .flat_map(|info| info.children.iter())
      .filter_map(move |id| self.nodes.get(*id))
      .map(|info| &info.key)
  }

  /// Returns an iterator over the keys of the nodes that have an edge to `dst`.
  pub fn parents<'a>(&'a self, dst: &K) -> impl Iterator<Item=&'a K> + 'a {
    self.id(dst)
      .and_then(|id| self.nodes.get(id))
      .into_iter()
      .flat_map(|info| info.parents.iter())
      .filter_map(move |id| self.nodes.get(*id))
      .map(|info| &info.key)
  }

  /// Returns the position of `key` in the topological order, or `None` if the graph does not contain it.
  #[inline]
  pub fn topo_order(&self, key: &K) -> Option<TopoOrder> {
    self.id(key).map(|id| self.nodes[id].topo_order)
  }

  /// Compares `a` and `b` by their position in the topological order. Keys without a node are ordered before all
  /// keys with a node.
  #[inline]
  pub fn topo_cmp(&self, a: &K, b: &K) -> Ordering {
    self.topo_order(a).cmp(&self.topo_order(b))
  }

  /// Returns an iterator over all keys in the graph, in no particular order.
  #[inline]
  pub fn keys(&self) -> impl Iterator<Item=&K> + '_ {
    self.nodes.values().map(|info| &info.key)
  }

  /// Returns the number of nodes in the graph.
  #[inline]
  pub fn len(&self) -> usize { self.nodes.len() }

  /// Returns `true` if the graph has no nodes.
  #[inline]
  pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

  /// Removes all nodes and edges.
  #[inline]
  pub fn clear(&mut self) {
    self.nodes.clear();
    self.index.clear();
    self.last_topo_order = 0;
  }


  #[inline]
  fn id(&self, key: &K) -> Option<DefaultKey> {
    self.index.get(key).copied()
  }

  #[inline]
  fn get_or_insert_node(&mut self, key: &K) -> DefaultKey {
    match self.id(key) {
      Some(id) => id,
      None => self.insert_node(key.clone()),
    }
  }

  fn insert_node(&mut self, key: K) -> DefaultKey {
    self.last_topo_order += 1;
    let info = NodeInfo {
      key: key.clone(),
      topo_order: self.last_topo_order,
      parents: LinkedHashSet::with_hasher(H::default()),
      children: LinkedHashSet::with_hasher(H::default()),
    };
    let id = self.nodes.insert(info);
    self.index.insert(key, id);
    id
  }

  /// Collects the nodes reachable from `start` that are ordered before `upper_bound`. Reaching the node at
  /// `upper_bound` itself means the new edge closes a cycle.
  fn dfs_forward(
    &self,
    start: DefaultKey,
    visited: &mut HashSet<DefaultKey, H>,
    upper_bound: TopoOrder,
  ) -> Result<Vec<DefaultKey>, Error> {
    let mut stack = vec![start];
    let mut result = Vec::new();
    while let Some(id) = stack.pop() {
      if !visited.insert(id) {
        continue;
      }
      result.push(id);
      for child in self.nodes[id].children.iter() {
        let child_order = self.nodes[*child].topo_order;
        if child_order == upper_bound {
          return Err(Error::CycleDetected);
        }
        if child_order < upper_bound && !visited.contains(child) {
          stack.push(*child);
        }
      }
    }
    Ok(result)
  }

  /// Collects the nodes that reach `start` and are ordered after `lower_bound`.
  fn dfs_backward(
    &self,
    start: DefaultKey,
    visited: &mut HashSet<DefaultKey, H>,
    lower_bound: TopoOrder,
  ) -> Vec<DefaultKey> {
    let mut stack = vec![start];
    let mut result = Vec::new();
    while let Some(id) = stack.pop() {
      if !visited.insert(id) {
        continue;
      }
      result.push(id);
      for parent in self.nodes[id].parents.iter() {
        let parent_order = self.nodes[*parent].topo_order;
        if lower_bound < parent_order && !visited.contains(parent) {
          stack.push(*parent);
        }
      }
    }
    result
  }

  /// Reassigns the orders of the affected nodes so that all backward-reachable nodes come before all forward-reachable
  /// nodes, reusing the same pool of order values.
  fn reorder_nodes(&mut self, mut change_forward: Vec<DefaultKey>, mut change_backward: Vec<DefaultKey>) {
    change_forward.sort_unstable_by_key(|id| self.nodes[*id].topo_order);
    change_backward.sort_unstable_by_key(|id| self.nodes[*id].topo_order);

    let mut orders: Vec<TopoOrder> = change_backward.iter().chain(change_forward.iter())
      .map(|id| self.nodes[*id].topo_order)
      .collect();
    orders.sort_unstable();

    for (id, order) in change_backward.into_iter().chain(change_forward).zip(orders) {
      self.nodes[id].topo_order = order;
    }
  }
}

impl<K: fmt::Debug, H> fmt::Debug for Dag<K, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_map()
      .entries(self.nodes.values().map(|info| (&info.key, info.topo_order)))
      .finish()
  }
}


#[cfg(test)]
mod test {
  use std::cmp::Ordering::*;

  use super::*;

  fn assert_edges_respect_order(dag: &Dag<u32>) {
    for key in dag.keys() {
      for child in dag.children(key) {
        assert_eq!(dag.topo_cmp(key, child), Less, "edge {} -> {} does not respect the order", key, child);
      }
    }
  }

  #[test]
  fn test_add_node() {
    let mut dag = Dag::new();
    assert!(dag.add_node(1));
    assert!(dag.add_node(2));
    assert!(!dag.add_node(1));
    assert_eq!(dag.len(), 2);
    assert!(dag.contains_node(&1));
    assert!(!dag.contains_node(&3));
  }

  #[test]
  fn test_add_edge_creates_nodes() {
    let mut dag = Dag::new();
    assert_eq!(dag.add_edge(&1, &2), Ok(true));
    assert!(dag.contains_node(&1));
    assert!(dag.contains_node(&2));
    assert!(dag.contains_edge(&1, &2));
    assert!(!dag.contains_edge(&2, &1));
  }

  #[test]
  fn test_duplicate_edge() {
    let mut dag = Dag::new();
    assert_eq!(dag.add_edge(&1, &2), Ok(true));
    assert_eq!(dag.add_edge(&1, &2), Ok(false));
    assert_eq!(dag.children(&1).count(), 1);
  }

  #[test]
  fn test_self_edge_is_cycle() {
    let mut dag = Dag::new();
    assert_eq!(dag.add_edge(&1, &1), Err(Error::CycleDetected));
  }

  #[test]
  fn test_cycle_rejected_and_graph_unchanged() {
    let mut dag = Dag::new();
    dag.add_edge(&1, &2).unwrap();
    dag.add_edge(&2, &3).unwrap();
    assert_eq!(dag.add_edge(&3, &1), Err(Error::CycleDetected));
    assert!(!dag.contains_edge(&3, &1));
    assert!(dag.parents(&1).next().is_none());
    assert_edges_respect_order(&dag);
  }

  #[test]
  fn test_reorder_on_backward_edge() {
    let mut dag = Dag::new();
    for i in 1..=5 {
      dag.add_node(i);
    }
    // 5 is ordered last; make it a parent of 1 so it has to move in front.
    dag.add_edge(&5, &1).unwrap();
    dag.add_edge(&4, &5).unwrap();
    dag.add_edge(&1, &2).unwrap();
    assert_eq!(dag.topo_cmp(&5, &1), Less);
    assert_eq!(dag.topo_cmp(&4, &5), Less);
    assert_edges_respect_order(&dag);
  }

  #[test]
  fn test_transitive_edge() {
    let mut dag = Dag::new();
    dag.add_edge(&1, &2).unwrap();
    dag.add_edge(&2, &3).unwrap();
    dag.add_edge(&4, &3).unwrap();
    assert!(dag.contains_transitive_edge(&1, &3));
    assert!(dag.contains_transitive_edge(&1, &2));
    assert!(!dag.contains_transitive_edge(&3, &1));
    assert!(!dag.contains_transitive_edge(&4, &1));
    assert!(!dag.contains_transitive_edge(&1, &1));
    assert!(!dag.contains_transitive_edge(&1, &9));
  }

  #[test]
  fn test_remove_edge() {
    let mut dag = Dag::new();
    dag.add_edge(&1, &2).unwrap();
    assert!(dag.remove_edge(&1, &2));
    assert!(!dag.remove_edge(&1, &2));
    assert!(!dag.contains_edge(&1, &2));
    // Removing the edge allows the reverse edge.
    assert_eq!(dag.add_edge(&2, &1), Ok(true));
    assert_edges_respect_order(&dag);
  }

  #[test]
  fn test_remove_outgoing_edges() {
    let mut dag = Dag::new();
    dag.add_edge(&1, &2).unwrap();
    dag.add_edge(&1, &3).unwrap();
    let mut removed = dag.remove_outgoing_edges(&1);
    removed.sort();
    assert_eq!(removed, vec![2, 3]);
    assert!(dag.children(&1).next().is_none());
    assert!(dag.parents(&2).next().is_none());
    assert!(dag.remove_outgoing_edges(&9).is_empty());
  }

  #[test]
  fn test_remove_node() {
    let mut dag = Dag::new();
    dag.add_edge(&1, &2).unwrap();
    dag.add_edge(&2, &3).unwrap();
    assert!(dag.remove_node(&2));
    assert!(!dag.remove_node(&2));
    assert!(!dag.contains_transitive_edge(&1, &3));
    assert!(dag.children(&1).next().is_none());
    assert!(dag.parents(&3).next().is_none());
    assert_eq!(dag.len(), 2);
  }

  #[test]
  fn test_children_in_insertion_order() {
    let mut dag = Dag::new();
    dag.add_edge(&1, &4).unwrap();
    dag.add_edge(&1, &2).unwrap();
    dag.add_edge(&1, &3).unwrap();
    assert_eq!(dag.children(&1).copied().collect::<Vec<_>>(), vec![4, 2, 3]);
  }

  #[test]
  fn test_many_random_edges_keep_order() {
    let mut dag = Dag::new();
    // Deterministic pseudo-random edges; cycles are rejected, all accepted edges must respect the order.
    let mut state = 17u32;
    for _ in 0..500 {
      state = state.wrapping_mul(1103515245).wrapping_add(12345);
      let a = (state >> 16) % 40;
      state = state.wrapping_mul(1103515245).wrapping_add(12345);
      let b = (state >> 16) % 40;
      let _ = dag.add_edge(&a, &b);
    }
    assert_edges_respect_order(&dag);
  }

  #[test]
  fn test_clear() {
    let mut dag = Dag::new();
    dag.add_edge(&1, &2).unwrap();
    dag.clear();
    assert!(dag.is_empty());
    assert_eq!(dag.topo_order(&1), None);
  }
}
