//! External data population.
//!
//! [`broadcast`] pushes an arbitrary data object into the live tree: it is
//! delivered to every registered node whose local key appears as a property
//! of the data, in registration order. Arrays resize to the incoming length
//! before any positional assignment; groups and values deep-patch: only
//! keys present in the incoming object are assigned, everything else is left
//! untouched. Keys with no matching node are ignored.

use serde_json::Value;

use crate::error::FormError;
use crate::tree::builder::{self, ElementTypeMap};
use crate::tree::node::{NodeId, NodeKind};
use crate::tree::ControlTree;

/// Applies `data` to every registered node whose key it contains. Returns
/// the ids of nodes destroyed by array shrinking so the owner can cancel
/// work tied to them.
pub(crate) fn broadcast(
    tree: &mut ControlTree,
    types: &ElementTypeMap,
    data: &Value,
) -> Result<Vec<NodeId>, FormError> {
    let Some(object) = data.as_object() else {
        return Err(FormError::Configuration(
            "populate expects a JSON object".into(),
        ));
    };

    let mut removed = Vec::new();
    for (id, key) in tree.registration_order() {
        // An earlier delivery in this broadcast may have shrunk an array
        // this node lived in.
        if !tree.contains(id) {
            continue;
        }
        if let Some(value) = object.get(&key) {
            removed.extend(apply(tree, types, id, value)?);
        }
    }
    Ok(removed)
}

/// Applies one incoming value to one node, recursively.
pub(crate) fn apply(
    tree: &mut ControlTree,
    types: &ElementTypeMap,
    id: NodeId,
    value: &Value,
) -> Result<Vec<NodeId>, FormError> {
    enum Shape {
        Value,
        Group,
        Array,
    }
    let shape = match tree.node(id).map(|n| &n.kind) {
        Some(NodeKind::Value(_)) => Shape::Value,
        Some(NodeKind::Group(_)) => Shape::Group,
        Some(NodeKind::Array(_)) => Shape::Array,
        None => return Ok(Vec::new()),
    };

    let mut removed = Vec::new();
    match shape {
        Shape::Value => {
            tree.set_value(id, value.clone());
        }
        Shape::Group => {
            // Non-object payloads for a group are ignored rather than erased.
            if let Some(object) = value.as_object() {
                for (child, key) in tree.group_children(id)? {
                    if let Some(child_value) = object.get(&key) {
                        removed.extend(apply(tree, types, child, child_value)?);
                    }
                }
            }
        }
        Shape::Array => {
            if let Some(incoming) = value.as_array() {
                removed.extend(builder::resize_array(tree, types, id, incoming.len())?);
                let items = tree.array_items(id)?;
                for (item, item_value) in items.iter().zip(incoming) {
                    removed.extend(apply(tree, types, *item, item_value)?);
                }
            }
        }
    }
    Ok(removed)
}
