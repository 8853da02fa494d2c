use super::{END, FlowEdge, START};
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;

/// Adjacency lookup over one fragment's flow edges.
///
/// Edge order within a node is the authoring order, so every traversal here
/// is deterministic.
#[derive(Debug, Clone)]
pub struct FlowIndex<'a> {
    outgoing: AHashMap<&'a str, Vec<&'a FlowEdge>>,
}

impl<'a> FlowIndex<'a> {
    pub fn new(flow: &'a [FlowEdge]) -> Self {
        let mut outgoing: AHashMap<&'a str, Vec<&'a FlowEdge>> = AHashMap::new();
        for edge in flow {
            outgoing.entry(edge.from.as_str()).or_default().push(edge);
        }
        Self { outgoing }
    }

    pub fn outgoing(&self, id: &str) -> &[&'a FlowEdge] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The id as borrowed from the flow, if the node has outgoing edges.
    pub fn intern(&self, id: &str) -> Option<&'a str> {
        self.outgoing.get_key_value(id).map(|(k, _)| *k)
    }

    /// The node the flow enters first.
    pub fn start(&self) -> Option<&'a str> {
        self.next(START)
    }

    /// The target of the first outgoing edge.
    pub fn next(&self, id: &str) -> Option<&'a str> {
        self.outgoing(id).first().map(|e| e.to.as_str())
    }

    pub fn labeled(&self, id: &str, label: &str) -> Option<&'a str> {
        self.outgoing(id)
            .iter()
            .find(|e| e.label.as_deref() == Some(label))
            .map(|e| e.to.as_str())
    }

    pub fn unlabeled(&self, id: &str) -> Option<&'a str> {
        self.outgoing(id)
            .iter()
            .find(|e| e.label.is_none())
            .map(|e| e.to.as_str())
    }

    /// Every node reachable from `from` (inclusive), in breadth-first order.
    pub fn bfs(&self, from: &'a str) -> Vec<&'a str> {
        self.bfs_avoiding(from, &[])
    }

    /// Breadth-first order from `from` that never enters any of `avoid`.
    pub fn bfs_avoiding(&self, from: &'a str, avoid: &[&str]) -> Vec<&'a str> {
        let mut order = Vec::new();
        if avoid.contains(&from) {
            return order;
        }
        let mut seen = AHashSet::new();
        let mut queue = VecDeque::from([from]);
        seen.insert(from);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for edge in self.outgoing(id) {
                let to = edge.to.as_str();
                if !avoid.contains(&to) && seen.insert(to) {
                    queue.push_back(to);
                }
            }
        }
        order
    }

    pub fn reachable(&self, from: &'a str) -> AHashSet<&'a str> {
        self.bfs(from).into_iter().collect()
    }

    /// Breadth-first order from `from` that records any of `bounds` it
    /// reaches but never walks past them.
    pub fn bfs_bounded(&self, from: &'a str, bounds: &[&str]) -> Vec<&'a str> {
        let mut order = Vec::new();
        let mut seen = AHashSet::new();
        let mut queue = VecDeque::from([from]);
        seen.insert(from);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            if bounds.contains(&id) {
                continue;
            }
            for edge in self.outgoing(id) {
                let to = edge.to.as_str();
                if seen.insert(to) {
                    queue.push_back(to);
                }
            }
        }
        order
    }

    /// Where the arms `a` and `b` of a decision meet again.
    pub fn join_point(&self, a: &'a str, b: &'a str) -> Option<&'a str> {
        self.join_point_within(a, b, &[])
    }

    /// Where the arms `a` and `b` of a decision meet again, without walking
    /// past any of `bounds` (the decision itself, enclosing loop heads and
    /// outer joins).
    ///
    /// The join is the earliest node other than `end` that both arms reach
    /// and from which every other shared node is reached. An arm that runs
    /// into `end` early does not pull the join down to `end`. When the arms
    /// share nothing but `end`, the join is `end`; when they share nothing at
    /// all, there is none. Swapping the arms gives the same join for any
    /// structured region.
    pub fn join_point_within(
        &self,
        a: &'a str,
        b: &'a str,
        bounds: &[&str],
    ) -> Option<&'a str> {
        let from_a = self.bfs_bounded(a, bounds);
        let from_b: AHashSet<&str> = self.bfs_bounded(b, bounds).into_iter().collect();
        let shared: Vec<&'a str> = from_a
            .iter()
            .copied()
            .filter(|id| *id != END && from_b.contains(id))
            .collect();

        if shared.is_empty() {
            let both_end = from_b.contains(END) && from_a.contains(&END);
            return both_end.then_some(END);
        }

        let dominates = |candidate: &'a str| {
            let reach: AHashSet<&str> = self.bfs_bounded(candidate, bounds).into_iter().collect();
            shared.iter().all(|id| reach.contains(id))
        };
        shared
            .iter()
            .copied()
            .find(|id| dominates(*id))
            .or_else(|| shared.first().copied())
    }
}
