//! The live control tree.
//!
//! [`ControlTree`] owns every node in an arena keyed by [`NodeId`] and keeps
//! a tree-owned registry from qualified key to node. The registry is what
//! lets the mutation and population channels target a subtree by id, so its
//! invariant is hard: a qualified key is unique within the tree at any
//! instant, and registering a duplicate is a configuration error. Multiple
//! independent trees coexist freely; there is no ambient shared state.

pub mod builder;
pub mod node;
pub mod populate;

use std::collections::HashMap;

use serde_json::Value;

use crate::error::FormError;
use crate::validators;

pub use builder::{ElementKind, ElementTypeMap};
pub use node::{
    ArrayState, ArrayTemplate, ContainerKind, ControlNode, GroupState, NodeId, NodeKind,
    UpdateTrigger, ValueState,
};

pub struct ControlTree {
    nodes: HashMap<NodeId, ControlNode>,
    registry: HashMap<String, NodeId>,
    /// Registration order; broadcasts deliver in this order.
    order: Vec<NodeId>,
    root: NodeId,
    next_id: u64,
}

impl ControlTree {
    pub(crate) fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            ControlNode {
                id: root,
                key: String::new(),
                qualified_key: String::new(),
                parent: None,
                kind: NodeKind::Group(GroupState {
                    children: Vec::new(),
                    container: ContainerKind::FormGroup,
                    active_tab: None,
                }),
                sync_validators: Vec::new(),
                async_validators: Vec::new(),
                update_on: UpdateTrigger::Change,
                errors: Default::default(),
                message_overrides: Default::default(),
            },
        );
        Self {
            nodes,
            registry: HashMap::new(),
            order: Vec::new(),
            root,
            next_id: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&ControlNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut ControlNode> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Resolves a qualified key to its node.
    pub fn lookup(&self, qualified_key: &str) -> Option<NodeId> {
        self.registry.get(qualified_key).copied()
    }

    /// Number of registered controls (the root is not counted).
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// All qualified keys in registration order.
    pub fn qualified_keys(&self) -> Vec<String> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| n.qualified_key.clone())
            .collect()
    }

    pub(crate) fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn qualified(&self, parent: NodeId, key: &str) -> String {
        match self.nodes.get(&parent) {
            Some(node) if !node.qualified_key.is_empty() => {
                format!("{}.{}", node.qualified_key, key)
            }
            _ => key.to_string(),
        }
    }

    /// Inserts a node into the arena and the registry. Fails on a duplicate
    /// qualified key instead of shadowing the existing node.
    pub(crate) fn register(&mut self, node: ControlNode) -> Result<NodeId, FormError> {
        let id = node.id;
        let qualified = node.qualified_key.clone();
        if self.registry.contains_key(&qualified) {
            return Err(FormError::Configuration(format!(
                "duplicate qualified key '{qualified}'"
            )));
        }
        self.registry.insert(qualified, id);
        self.order.push(id);
        self.nodes.insert(id, node);
        Ok(id)
    }

    pub(crate) fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(&parent) {
            match &mut node.kind {
                NodeKind::Group(state) => state.children.push(child),
                NodeKind::Array(state) => state.items.push(child),
                NodeKind::Value(_) => {}
            }
        }
    }

    /// Snapshot of `(id, local key)` pairs in registration order.
    pub(crate) fn registration_order(&self) -> Vec<(NodeId, String)> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| (n.id, n.key.clone()))
            .collect()
    }

    pub(crate) fn group_children(&self, id: NodeId) -> Result<Vec<(NodeId, String)>, FormError> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| FormError::UnknownKey(id.to_string()))?;
        let group = node.as_group().ok_or_else(|| {
            FormError::Configuration(format!("'{}' is not a group node", node.qualified_key))
        })?;
        Ok(group
            .children
            .iter()
            .filter_map(|c| self.nodes.get(c))
            .map(|c| (c.id, c.key.clone()))
            .collect())
    }

    pub(crate) fn array_items(&self, id: NodeId) -> Result<Vec<NodeId>, FormError> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| FormError::UnknownKey(id.to_string()))?;
        let array = node.as_array().ok_or_else(|| {
            FormError::Configuration(format!("'{}' is not an array node", node.qualified_key))
        })?;
        Ok(array.items.clone())
    }

    /// Materializes the raw value of a subtree: groups become objects keyed
    /// by child key, arrays become ordered value lists.
    pub fn node_value(&self, id: NodeId) -> Value {
        let Some(node) = self.nodes.get(&id) else {
            return Value::Null;
        };
        match &node.kind {
            NodeKind::Value(state) => state.value.clone(),
            NodeKind::Group(state) => {
                let mut object = serde_json::Map::new();
                for child_id in &state.children {
                    if let Some(child) = self.nodes.get(child_id) {
                        object.insert(child.key.clone(), self.node_value(*child_id));
                    }
                }
                Value::Object(object)
            }
            NodeKind::Array(state) => {
                Value::Array(state.items.iter().map(|i| self.node_value(*i)).collect())
            }
        }
    }

    /// The full form value.
    pub fn value(&self) -> Value {
        self.node_value(self.root)
    }

    /// Assigns a value node and re-runs its sync validators. Group and array
    /// assignment goes through [`populate`].
    pub(crate) fn set_value(&mut self, id: NodeId, value: Value) {
        if let Some(node) = self.nodes.get_mut(&id) {
            if let NodeKind::Value(state) = &mut node.kind {
                state.value = value;
            }
        }
        self.run_sync_validators(id);
    }

    /// Re-runs the node's sync validators against its current value.
    /// The `asyncBackend` error entry is owned by the async path and is left
    /// untouched here.
    pub(crate) fn run_sync_validators(&mut self, id: NodeId) {
        if !self.nodes.contains_key(&id) {
            return;
        }
        let value = self.node_value(id);
        let results: Vec<(&'static str, Option<Value>)> = {
            let node = &self.nodes[&id];
            node.sync_validators
                .iter()
                .map(|rule| (rule.name(), rule.check(&value)))
                .collect()
        };
        let node = self.nodes.get_mut(&id).expect("checked above");
        for (name, outcome) in results {
            match outcome {
                Some(payload) => {
                    node.errors.insert(name.to_string(), payload);
                }
                None => {
                    node.errors.remove(name);
                }
            }
        }
    }

    /// Whether every node in the tree is error-free.
    pub fn is_valid(&self) -> bool {
        self.nodes.values().all(ControlNode::is_valid)
    }

    /// Resolved error messages for one node.
    pub fn error_messages(&self, id: NodeId) -> Vec<String> {
        match self.nodes.get(&id) {
            Some(node) => validators::resolve_messages(&node.errors, &node.message_overrides),
            None => Vec::new(),
        }
    }

    /// Detaches `id` from its parent and removes the whole subtree from the
    /// arena and the registry. Returns every removed id so the owner can
    /// cancel outstanding work tied to those nodes.
    pub(crate) fn destroy(&mut self, id: NodeId) -> Vec<NodeId> {
        if id == self.root || !self.nodes.contains_key(&id) {
            return Vec::new();
        }

        if let Some(parent_id) = self.nodes.get(&id).and_then(|n| n.parent) {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                match &mut parent.kind {
                    NodeKind::Group(state) => state.children.retain(|c| *c != id),
                    NodeKind::Array(state) => state.items.retain(|c| *c != id),
                    NodeKind::Value(_) => {}
                }
            }
        }

        let mut removed = Vec::new();
        self.collect_subtree(id, &mut removed);
        for node_id in &removed {
            if let Some(node) = self.nodes.remove(node_id) {
                if !node.qualified_key.is_empty() {
                    self.registry.remove(&node.qualified_key);
                }
            }
        }
        self.order.retain(|o| !removed.contains(o));
        removed
    }

    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        if let Some(node) = self.nodes.get(&id) {
            match &node.kind {
                NodeKind::Group(state) => {
                    for child in &state.children {
                        self.collect_subtree(*child, out);
                    }
                }
                NodeKind::Array(state) => {
                    for item in &state.items {
                        self.collect_subtree(*item, out);
                    }
                }
                NodeKind::Value(_) => {}
            }
        }
    }

    /// Moves a subtree to a new qualified key, updating the registry for the
    /// node and all descendants. Used when array entries shift position.
    pub(crate) fn requalify(&mut self, id: NodeId, new_qualified: String) -> Result<(), FormError> {
        let old = match self.nodes.get(&id) {
            Some(node) => node.qualified_key.clone(),
            None => return Ok(()),
        };
        if old == new_qualified {
            return Ok(());
        }
        if self.registry.contains_key(&new_qualified) {
            return Err(FormError::Configuration(format!(
                "duplicate qualified key '{new_qualified}'"
            )));
        }
        self.registry.remove(&old);
        self.registry.insert(new_qualified.clone(), id);

        if let Some(node) = self.nodes.get_mut(&id) {
            node.qualified_key = new_qualified.clone();
        }

        let child_ids: Vec<NodeId> = match self.nodes.get(&id).map(|n| &n.kind) {
            Some(NodeKind::Group(state)) => state.children.clone(),
            Some(NodeKind::Array(state)) => state.items.clone(),
            _ => Vec::new(),
        };
        let children: Vec<(NodeId, String)> = child_ids
            .iter()
            .filter_map(|c| self.nodes.get(c))
            .map(|c| (c.id, c.key.clone()))
            .collect();

        for (child, key) in children {
            self.requalify(child, format!("{new_qualified}.{key}"))?;
        }
        Ok(())
    }

    /// Restores every value node to its seeded initial value.
    pub(crate) fn reset_values(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            let initial = match self.nodes.get(&id).map(|n| &n.kind) {
                Some(NodeKind::Value(state)) => Some(state.initial.clone()),
                _ => None,
            };
            if let Some(initial) = initial {
                self.set_value(id, initial);
            }
        }
    }
}

impl std::fmt::Debug for ControlTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlTree")
            .field("nodes", &self.nodes.len())
            .field("registered", &self.order.len())
            .finish()
    }
}
