//! Reader/target edges between datums and script bodies.
//!
//! Edges are never authored; the graph derives them from expression text
//! and replaces a vertex's outgoing set wholesale with [`DependencyTracker::set_reads`].

use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::datum::DatumId;
use crate::node::NodeId;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Vertex {
    Datum(DatumId),
    /// The body of a node's script
    Script(NodeId),
}

type Edges = SmallVec<[Vertex; 4]>;

#[derive(Debug, Default)]
pub struct DependencyTracker {
    /// vertex -> vertices it reads from
    reads: FxHashMap<Vertex, Edges>,
    /// vertex -> vertices reading from it
    readers: FxHashMap<Vertex, Edges>,
    /// vertices whose text names something that does not exist yet
    unresolved: FxHashSet<Vertex>,
}

/// Result of ordering an affected subgraph.
#[derive(Debug, Default)]
pub struct EvaluationOrder {
    /// Dependencies before dependents
    pub order: Vec<Vertex>,
    pub circular: FxHashSet<Vertex>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the outgoing edges of `vertex`.
    pub fn set_reads(
        &mut self,
        vertex: Vertex,
        reads: impl IntoIterator<Item = Vertex>,
        has_unresolved: bool,
    ) {
        let mut new_reads = Edges::new();
        for target in reads {
            if !new_reads.contains(&target) {
                new_reads.push(target);
            }
        }
        if let Some(old_reads) = self.reads.remove(&vertex) {
            for target in old_reads {
                self.unlink_reader(target, vertex);
            }
        }
        for target in &new_reads {
            self.readers.entry(*target).or_default().push(vertex);
        }
        if !new_reads.is_empty() {
            self.reads.insert(vertex, new_reads);
        }
        if has_unresolved {
            self.unresolved.insert(vertex);
        } else {
            self.unresolved.remove(&vertex);
        }
    }

    pub fn reads_of(&self, vertex: Vertex) -> &[Vertex] {
        self.reads
            .get(&vertex)
            .map(|edges| edges.as_slice())
            .unwrap_or(&[])
    }

    pub fn readers_of(&self, vertex: Vertex) -> &[Vertex] {
        self.readers
            .get(&vertex)
            .map(|edges| edges.as_slice())
            .unwrap_or(&[])
    }

    /// Vertices that named something missing when their edges were last set.
    pub fn unresolved(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.unresolved.iter().copied()
    }

    /// Drops every edge touching `vertex`, returning its former readers.
    pub fn remove_vertex(&mut self, vertex: Vertex) -> Edges {
        self.set_reads(vertex, [], false);
        let readers = self.readers.remove(&vertex).unwrap_or_default();
        for reader in &readers {
            if let Some(reads) = self.reads.get_mut(reader) {
                reads.retain(|target| *target != vertex);
                if reads.is_empty() {
                    self.reads.remove(reader);
                }
            }
        }
        readers
            .into_iter()
            .filter(|reader| *reader != vertex)
            .collect()
    }

    fn unlink_reader(&mut self, target: Vertex, reader: Vertex) {
        if let Some(readers) = self.readers.get_mut(&target) {
            readers.retain(|vertex| *vertex != reader);
            if readers.is_empty() {
                self.readers.remove(&target);
            }
        }
    }

    /// The start vertices plus every transitive reader.
    pub fn invalidate(&self, start: impl IntoIterator<Item = Vertex>) -> IndexSet<Vertex> {
        let mut affected = IndexSet::new();
        let mut pending: Vec<Vertex> = start.into_iter().collect();
        while let Some(vertex) = pending.pop() {
            if affected.insert(vertex) {
                pending.extend(
                    self.readers_of(vertex)
                        .iter()
                        .filter(|reader| !affected.contains(*reader)),
                );
            }
        }
        affected
    }

    /// Orders `affected` dependencies first, using Tarjan's strongly
    /// connected components. Every member of a component with more than one
    /// vertex, or of a vertex reading itself, is circular. `key` breaks ties
    /// between vertices that do not depend on each other.
    pub fn evaluation_order<K: Ord>(
        &self,
        affected: &IndexSet<Vertex>,
        key: impl Fn(Vertex) -> K,
    ) -> EvaluationOrder {
        let dependencies = |vertex: Vertex| -> Edges {
            let mut dependencies: Edges = self
                .reads_of(vertex)
                .iter()
                .copied()
                .filter(|target| affected.contains(target))
                .collect();
            dependencies.sort_by_key(|target| (key(*target), *target));
            dependencies
        };

        let mut starts: Vec<Vertex> = affected.iter().copied().collect();
        starts.sort_by_key(|vertex| (key(*vertex), *vertex));

        let mut result = EvaluationOrder::default();
        let mut components = Components::default();
        for start in starts {
            if components.visits.contains_key(&start) {
                continue;
            }
            components.enter(start);
            let mut path: Vec<(Vertex, Edges, usize)> = vec![(start, dependencies(start), 0)];
            while let Some((vertex, vertex_dependencies, next)) = path.last_mut() {
                let vertex = *vertex;
                if let Some(dependency) = vertex_dependencies.get(*next).copied() {
                    *next += 1;
                    match components.visits.get(&dependency).map(|visit| visit.index) {
                        None => {
                            components.enter(dependency);
                            path.push((dependency, dependencies(dependency), 0));
                        }
                        Some(index) if components.on_stack.contains(&dependency) => {
                            components.lower(vertex, index);
                        }
                        Some(_) => {}
                    }
                    continue;
                }

                path.pop();
                let Some(visit) = components.visits.get(&vertex).copied() else {
                    continue;
                };
                if let Some((parent, ..)) = path.last() {
                    components.lower(*parent, visit.low);
                }
                if visit.low != visit.index {
                    continue;
                }
                let mut component = components.pop_component(vertex);
                let circular = component.len() > 1 || self.reads_of(vertex).contains(&vertex);
                component.sort_by_key(|member| (key(*member), *member));
                if circular {
                    result.circular.extend(component.iter().copied());
                }
                result.order.extend(component);
            }
        }
        result
    }
}

#[derive(Clone, Copy)]
struct Visit {
    index: usize,
    /// Smallest index reachable through the vertices still on the stack
    low: usize,
}

#[derive(Default)]
struct Components {
    visits: FxHashMap<Vertex, Visit>,
    stack: Vec<Vertex>,
    on_stack: FxHashSet<Vertex>,
}

impl Components {
    fn enter(&mut self, vertex: Vertex) {
        let index = self.visits.len();
        self.visits.insert(vertex, Visit { index, low: index });
        self.stack.push(vertex);
        self.on_stack.insert(vertex);
    }

    fn lower(&mut self, vertex: Vertex, low: usize) {
        if let Some(visit) = self.visits.get_mut(&vertex) {
            visit.low = visit.low.min(low);
        }
    }

    /// Pops the component rooted at `root` off the stack.
    fn pop_component(&mut self, root: Vertex) -> Vec<Vertex> {
        let mut component = Vec::new();
        while let Some(vertex) = self.stack.pop() {
            self.on_stack.remove(&vertex);
            component.push(vertex);
            if vertex == root {
                break;
            }
        }
        component
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::SlotId;

    fn datum(index: u32) -> Vertex {
        Vertex::Datum(DatumId(SlotId {
            index,
            generation: 0,
        }))
    }

    fn order_of(tracker: &DependencyTracker, start: &[Vertex]) -> EvaluationOrder {
        let affected = tracker.invalidate(start.iter().copied());
        tracker.evaluation_order(&affected, |vertex| vertex)
    }

    #[test]
    fn dependencies_come_first() {
        let mut tracker = DependencyTracker::new();
        // c reads b, b reads a
        tracker.set_reads(datum(2), [datum(1)], false);
        tracker.set_reads(datum(1), [datum(0)], false);
        let order = order_of(&tracker, &[datum(0)]);
        assert_eq!(order.order, vec![datum(0), datum(1), datum(2)]);
        assert!(order.circular.is_empty());
    }

    #[test]
    fn diamond_is_ordered_once() {
        let mut tracker = DependencyTracker::new();
        tracker.set_reads(datum(1), [datum(0)], false);
        tracker.set_reads(datum(2), [datum(0)], false);
        tracker.set_reads(datum(3), [datum(1), datum(2)], false);
        let order = order_of(&tracker, &[datum(0)]);
        assert_eq!(order.order, vec![datum(0), datum(1), datum(2), datum(3)]);
    }

    #[test]
    fn invalidation_stops_at_unaffected_vertices() {
        let mut tracker = DependencyTracker::new();
        tracker.set_reads(datum(1), [datum(0)], false);
        tracker.set_reads(datum(2), [datum(3)], false);
        let affected = tracker.invalidate([datum(0)]);
        assert_eq!(affected.len(), 2);
        assert!(!affected.contains(&datum(2)));
    }

    #[test]
    fn cycles_terminate_and_are_marked() {
        let mut tracker = DependencyTracker::new();
        tracker.set_reads(datum(0), [datum(1)], false);
        tracker.set_reads(datum(1), [datum(0)], false);
        tracker.set_reads(datum(2), [datum(1)], false);
        let order = order_of(&tracker, &[datum(0)]);
        assert_eq!(order.order.len(), 3);
        assert!(order.circular.contains(&datum(0)));
        assert!(order.circular.contains(&datum(1)));
        assert!(!order.circular.contains(&datum(2)));
    }

    #[test]
    fn cycle_reached_through_finished_vertex_is_marked() {
        let mut tracker = DependencyTracker::new();
        // a reads b and d, b reads c, c reads a, d reads b; e reads a
        let [a, b, c, d, e] = [datum(0), datum(1), datum(2), datum(3), datum(4)];
        tracker.set_reads(a, [b, d], false);
        tracker.set_reads(b, [c], false);
        tracker.set_reads(c, [a], false);
        tracker.set_reads(d, [b], false);
        tracker.set_reads(e, [a], false);
        let order = order_of(&tracker, &[a]);
        for member in [a, b, c, d] {
            assert!(order.circular.contains(&member), "{member:?} not circular");
        }
        assert!(!order.circular.contains(&e));
        assert_eq!(order.order.len(), 5);
        assert_eq!(order.order.last(), Some(&e));
    }

    #[test]
    fn components_come_after_their_dependencies() {
        let mut tracker = DependencyTracker::new();
        // 1 and 2 read each other, both read 0; 3 reads 2
        tracker.set_reads(datum(1), [datum(0), datum(2)], false);
        tracker.set_reads(datum(2), [datum(0), datum(1)], false);
        tracker.set_reads(datum(3), [datum(2)], false);
        let order = order_of(&tracker, &[datum(0)]);
        assert_eq!(order.order, vec![datum(0), datum(1), datum(2), datum(3)]);
        assert!(!order.circular.contains(&datum(0)));
        assert!(!order.circular.contains(&datum(3)));
    }

    #[test]
    fn self_reference_is_circular() {
        let mut tracker = DependencyTracker::new();
        tracker.set_reads(datum(0), [datum(0)], false);
        let order = order_of(&tracker, &[datum(0)]);
        assert!(order.circular.contains(&datum(0)));
    }

    #[test]
    fn replacing_reads_unlinks_old_targets() {
        let mut tracker = DependencyTracker::new();
        tracker.set_reads(datum(1), [datum(0)], false);
        tracker.set_reads(datum(1), [datum(2)], true);
        assert!(tracker.readers_of(datum(0)).is_empty());
        assert_eq!(tracker.readers_of(datum(2)), &[datum(1)]);
        assert_eq!(tracker.unresolved().collect::<Vec<_>>(), vec![datum(1)]);
    }

    #[test]
    fn removing_vertex_returns_readers() {
        let mut tracker = DependencyTracker::new();
        tracker.set_reads(datum(1), [datum(0)], false);
        tracker.set_reads(datum(2), [datum(0), datum(3)], false);
        let readers = tracker.remove_vertex(datum(0));
        assert_eq!(readers.as_slice(), &[datum(1), datum(2)]);
        assert!(tracker.reads_of(datum(1)).is_empty());
        assert_eq!(tracker.reads_of(datum(2)), &[datum(3)]);
    }
}
