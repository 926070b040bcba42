// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use std::collections::HashMap;

use crate::address::Address;
use crate::block::BasicBlock;

/// The kind of control-flow transition an [`Edge`] represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Jump,
    Jumpi,
    ConditionTrue,
    ConditionFalse,
    Call,
    Delegatecall,
    Staticcall,
    Create,
    Return,
    Destruct,
    Terminate,
    Invalid,
    Sequence,
    Unknown,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use EdgeKind::*;
        let s = match self {
            Jump => "JUMP",
            Jumpi => "JUMPI",
            ConditionTrue => "CONDITION_TRUE",
            ConditionFalse => "CONDITION_FALSE",
            Call => "CALL",
            Delegatecall => "DELEGATECALL",
            Staticcall => "STATICCALL",
            Create => "CREATE",
            Return => "RETURN",
            Destruct => "DESTRUCT",
            Terminate => "TERMINATE",
            Invalid => "INVALID",
            Sequence => "SEQUENCE",
            Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// A CFG node: one basic block, identified by its `(contract_address,
/// start_pc)` key.
#[derive(Clone, Debug)]
pub struct Node {
    pub block: BasicBlock,
}

/// A directed transition between two nodes, identified by index into
/// [`Cfg::nodes`].
#[derive(Clone, Copy, Debug)]
pub struct Edge {
    pub edge_id: usize,
    pub source: usize,
    pub target: usize,
    pub kind: EdgeKind,
}

/// A control-flow graph: an arena of [`Node`]s and [`Edge`]s indexed
/// by position, plus a side index for `(address, start_pc) -> node
/// index` lookup. Removing a node tombstones it (its slot becomes
/// `None`) and cascades to every incident edge, so edge IDs already
/// handed out are never reused or renumbered.
#[derive(Clone, Debug, Default)]
pub struct Cfg {
    pub name: String,
    nodes: Vec<Option<Node>>,
    edges: Vec<Option<Edge>>,
    index: HashMap<(Address, usize), usize>,
    next_edge_id: usize,
}

impl Cfg {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
            index: HashMap::new(),
            next_edge_id: 0,
        }
    }

    /// Add a node for `block`, returning its index. Does not
    /// deduplicate; callers that want node reuse should consult
    /// [`Cfg::find_node`] first.
    pub fn add_node(&mut self, block: BasicBlock) -> usize {
        let key = (block.contract_address, block.start_pc);
        let idx = self.nodes.len();
        self.nodes.push(Some(Node { block }));
        self.index.insert(key, idx);
        idx
    }

    /// Look up an existing node by its `(contract_address, start_pc)`
    /// key.
    pub fn find_node(&self, address: Address, start_pc: usize) -> Option<usize> {
        self.index.get(&(address, start_pc)).copied()
    }

    pub fn node(&self, idx: usize) -> Option<&Node> {
        self.nodes.get(idx).and_then(|n| n.as_ref())
    }

    /// Add an edge from `source` to `target`, returning its fresh,
    /// monotonically increasing ID.
    pub fn add_edge(&mut self, source: usize, target: usize, kind: EdgeKind) -> usize {
        let edge_id = self.next_edge_id;
        self.next_edge_id += 1;
        self.edges.push(Some(Edge { edge_id, source, target, kind }));
        edge_id
    }

    /// Remove a node and every edge touching it. Leaves a tombstone in
    /// place so other node indices stay valid.
    pub fn remove_node(&mut self, idx: usize) {
        if let Some(node) = self.nodes.get(idx).and_then(|n| n.as_ref()) {
            let key = (node.block.contract_address, node.block.start_pc);
            self.index.remove(&key);
        }
        if let Some(slot) = self.nodes.get_mut(idx) {
            *slot = None;
        }
        for edge in self.edges.iter_mut() {
            let remove = matches!(edge, Some(e) if e.source == idx || e.target == idx);
            if remove {
                *edge = None;
            }
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = (usize, &Node)> {
        self.nodes.iter().enumerate().filter_map(|(i, n)| n.as_ref().map(|n| (i, n)))
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter_map(|e| e.as_ref())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_some()).count()
    }

    /// In-edges that still reference a live node: whether `idx` has at
    /// least one incoming edge.
    pub fn has_incoming_edge(&self, idx: usize) -> bool {
        self.edges().any(|e| e.target == idx)
    }
}
