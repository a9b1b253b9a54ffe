use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use crate::log_space::LogProbability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One prefix hypothesis. The prefix is the chain of labels from the root
/// (exclusive) down to this node.
#[derive(Debug, Clone)]
pub struct BeamNode {
    pub label: usize,
    pub parent: Option<NodeId>,
    /// Probabilities at the previous timestep.
    pub previous: LogProbability,
    /// Probabilities at the timestep being computed.
    pub current: LogProbability,
    children: HashMap<usize, NodeId>,
}

impl BeamNode {
    fn new(label: usize, parent: Option<NodeId>) -> Self {
        Self {
            label,
            parent,
            previous: LogProbability::default(),
            current: LogProbability::default(),
            children: HashMap::new(),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        !self.current.is_zero()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Prefix tree stored in an index arena.
///
/// [`BeamTree::delete`] only rewires the tree: it zeroes a node and, when
/// allowed, unlinks it from its parent and drops its child links. A detached
/// node keeps its `parent` index, so a live hypothesis below it still reads
/// its full label chain. Slots are handed back by [`BeamTree::collect`],
/// which keeps everything reachable from the root or a pinned node and frees
/// the rest.
#[derive(Debug, Default)]
pub struct BeamTree {
    slots: Vec<Option<BeamNode>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    live: usize,
    marks: Vec<bool>,
    stack: Vec<NodeId>,
}

impl BeamTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every node, including the root.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.root = None;
        self.live = 0;
    }

    /// Number of allocated nodes.
    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Number of slots ever allocated since the last [`BeamTree::clear`].
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    pub fn get(&self, id: NodeId) -> Option<&BeamNode> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Creates the sentinel root: empty prefix with probability one, all of
    /// it blank.
    pub fn add_root(&mut self, blank: usize) -> NodeId {
        let mut root = BeamNode::new(blank, None);
        root.current = LogProbability::certain_blank();
        let id = self.alloc(root);
        self.root = Some(id);
        id
    }

    fn alloc(&mut self, node: BeamNode) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(id) => {
                self.slots[id.0] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    /// Returns the child of `parent` extended by `label`, creating it on
    /// first use.
    pub fn get_child(&mut self, parent: NodeId, label: usize) -> NodeId {
        if let Some(&child) = self[parent].children.get(&label) {
            return child;
        }
        let child = self.alloc(BeamNode::new(label, Some(parent)));
        self[parent].children.insert(label, child);
        child
    }

    pub fn is_linked(&self, parent: NodeId, child: NodeId) -> bool {
        let label = self[child].label;
        self[parent].children.get(&label) == Some(&child)
    }

    /// Labels from the root (exclusive) down to `id`.
    pub fn label_sequence(&self, id: NodeId) -> Vec<usize> {
        let mut seq = Vec::new();
        let mut cursor = id;
        while let Some(parent) = self[cursor].parent {
            seq.push(self[cursor].label);
            cursor = parent;
        }
        seq.reverse();
        seq
    }

    pub fn has_active_ancestor(&self, id: NodeId) -> bool {
        let mut cursor = self[id].parent;
        while let Some(p) = cursor {
            if self[p].is_active() {
                return true;
            }
            cursor = self[p].parent;
        }
        false
    }

    pub fn has_active_descendant(&self, id: NodeId) -> bool {
        let mut stack: Vec<NodeId> = self[id].children.values().copied().collect();
        while let Some(n) = stack.pop() {
            let node = &self[n];
            if node.is_active() {
                return true;
            }
            stack.extend(node.children.values().copied());
        }
        false
    }

    /// A node may be cut out only if it is not the sole link between a live
    /// ancestor and a live descendant.
    pub fn is_detachable(&self, id: NodeId) -> bool {
        self[id].parent.is_some()
            && !(self.has_active_ancestor(id) && self.has_active_descendant(id))
    }

    /// Zeroes both probability snapshots of `id`. When
    /// [`BeamTree::is_detachable`] holds, also unlinks it from its parent
    /// (unless `children_only`), deletes its inactive children and drops all
    /// of its child links. An inactive parent left behind is deleted in turn.
    pub fn delete(&mut self, id: NodeId, children_only: bool) {
        let node = &mut self[id];
        node.previous.reset();
        node.current.reset();

        if !self.is_detachable(id) {
            return;
        }

        if !children_only {
            if let Some(parent) = self[id].parent {
                self.unlink_child(parent, id);
            }
        }

        let children: Vec<NodeId> = self[id].children.values().copied().collect();
        for child in children {
            if !self[child].is_active() {
                self.delete(child, true);
            }
        }
        self[id].children.clear();
    }

    fn unlink_child(&mut self, parent: NodeId, child: NodeId) {
        if self.is_linked(parent, child) {
            let label = self[child].label;
            self[parent].children.remove(&label);
        }
        if !self[parent].is_active() {
            self.delete(parent, false);
        }
    }

    /// Frees every node that can no longer be reached from the root or from
    /// `pinned`, following both child links and parent indices. Returns the
    /// number of freed slots. Call only when no other index is held.
    pub fn collect(&mut self, pinned: &[NodeId]) -> usize {
        let mut marks = std::mem::take(&mut self.marks);
        let mut stack = std::mem::take(&mut self.stack);
        marks.clear();
        marks.resize(self.slots.len(), false);
        stack.clear();
        stack.extend(self.root);
        stack.extend_from_slice(pinned);

        while let Some(id) = stack.pop() {
            if marks[id.0] {
                continue;
            }
            let Some(node) = self.slots[id.0].as_ref() else {
                continue;
            };
            marks[id.0] = true;
            stack.extend(node.parent);
            stack.extend(node.children.values().copied());
        }

        let mut freed = 0;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_some() && !marks[i] {
                *slot = None;
                self.free.push(NodeId(i));
                freed += 1;
            }
        }
        self.live -= freed;

        self.marks = marks;
        self.stack = stack;
        freed
    }
}

impl Index<NodeId> for BeamTree {
    type Output = BeamNode;

    fn index(&self, id: NodeId) -> &Self::Output {
        match self.slots.get(id.0) {
            Some(Some(node)) => node,
            _ => panic!("beam node {} was already reclaimed", id.0),
        }
    }
}

impl IndexMut<NodeId> for BeamTree {
    fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
        match self.slots.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => panic!("beam node {} was already reclaimed", id.0),
        }
    }
}
