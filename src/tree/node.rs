//! Control-tree node records.
//!
//! The original design expressed controls as a deep inheritance chain of
//! input and container-host classes. Here a node is one flat record: a
//! tagged [`NodeKind`] plus the validator and error state every kind shares.
//! Per-type behavior lives in the builder's type map, not in subclasses.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::domain::FormElement;
use crate::validators::{BackendValidator, ValidatorRule};

/// Arena handle for a control node. Stable for the node's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// When validation fires for a node: on every value change (default) or
/// only when the host reports the control lost focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateTrigger {
    #[default]
    Change,
    Blur,
}

/// The container flavor of a group node. Only `TabContainer` carries extra
/// runtime behavior (active-tab tracking); the rest differ in rendering,
/// which is outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Fieldset,
    Card,
    FormGroup,
    Row,
    Col,
    TabContainer,
    TabPane,
}

impl ContainerKind {
    pub fn from_type(element_type: &str) -> Option<Self> {
        match element_type {
            "fieldset" => Some(ContainerKind::Fieldset),
            "card" => Some(ContainerKind::Card),
            "formGroup" => Some(ContainerKind::FormGroup),
            "row" => Some(ContainerKind::Row),
            "col" => Some(ContainerKind::Col),
            "tabContainer" => Some(ContainerKind::TabContainer),
            "tabPane" => Some(ContainerKind::TabPane),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum NodeKind {
    Value(ValueState),
    Group(GroupState),
    Array(ArrayState),
}

#[derive(Debug)]
pub struct ValueState {
    pub value: Value,
    /// Seeded value, restored on form reset.
    pub initial: Value,
}

#[derive(Debug)]
pub struct GroupState {
    /// Child node ids in declaration order. Keys are unique among children.
    pub children: Vec<NodeId>,
    pub container: ContainerKind,
    /// Index of the active pane; only meaningful for `TabContainer`.
    pub active_tab: Option<usize>,
}

#[derive(Debug)]
pub struct ArrayState {
    /// Entries in order. Position is identity; local keys mirror the index.
    pub items: Vec<NodeId>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    /// Blueprint for building additional entries at runtime.
    pub template: ArrayTemplate,
}

/// What one array entry is built from: a single value element (`multiple`
/// inputs) or a child-element list (repeaters, multi form-groups).
#[derive(Debug, Clone)]
pub enum ArrayTemplate {
    Element(Box<FormElement>),
    Children(Vec<FormElement>),
}

/// One live control. Owned by the [`crate::tree::ControlTree`] arena;
/// parents own their children transitively through `NodeKind`.
#[derive(Debug)]
pub struct ControlNode {
    pub id: NodeId,
    /// Key segment within the parent (array entries use their index).
    pub key: String,
    /// Dotted path from the root; unique across the whole tree.
    pub qualified_key: String,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub sync_validators: Vec<ValidatorRule>,
    pub async_validators: Vec<BackendValidator>,
    pub update_on: UpdateTrigger,
    /// Current error state: validator name -> payload.
    pub errors: BTreeMap<String, Value>,
    /// Element-level error message overrides, keyed by validator name.
    pub message_overrides: HashMap<String, String>,
}

impl ControlNode {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn as_group(&self) -> Option<&GroupState> {
        match &self.kind {
            NodeKind::Group(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayState> {
        match &self.kind {
            NodeKind::Array(state) => Some(state),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&ValueState> {
        match &self.kind {
            NodeKind::Value(state) => Some(state),
            _ => None,
        }
    }
}
