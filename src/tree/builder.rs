//! Recursive materialization of a form config into control nodes.
//!
//! Dispatch is a type-to-strategy map instead of per-type classes: value
//! elements become value nodes (or arrays of value nodes when `multiple`),
//! containers become keyed groups, repeaters become arrays of groups built
//! from a child-element template. The map is open for extension, so a host
//! can register additional element types without touching the builder.

use std::collections::HashMap;

use serde_json::Value;

use crate::domain::{FormConfig, FormElement};
use crate::error::FormError;
use crate::schema;
use crate::tree::node::{
    ArrayState, ArrayTemplate, ContainerKind, ControlNode, GroupState, NodeId, NodeKind,
    ValueState,
};
use crate::tree::{populate, ControlTree};
use crate::validators::{self, CompiledValidators, ValidatorRule};

/// Node-construction strategy for one element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Value,
    Group(ContainerKind),
    Array,
    /// Renders content but owns no control (e.g. `form-text`).
    Display,
}

/// The type-to-strategy map used by the builder.
#[derive(Debug, Clone)]
pub struct ElementTypeMap {
    map: HashMap<String, ElementKind>,
}

impl Default for ElementTypeMap {
    fn default() -> Self {
        let mut map = HashMap::new();
        for value_type in schema::VALUE_TYPES {
            map.insert(value_type.to_string(), ElementKind::Value);
        }
        for group_type in schema::GROUP_TYPES {
            let container = ContainerKind::from_type(group_type)
                .expect("every group type has a container kind");
            map.insert(group_type.to_string(), ElementKind::Group(container));
        }
        for array_type in schema::ARRAY_TYPES {
            map.insert(array_type.to_string(), ElementKind::Array);
        }
        for display_type in schema::DISPLAY_TYPES {
            map.insert(display_type.to_string(), ElementKind::Display);
        }
        Self { map }
    }
}

impl ElementTypeMap {
    pub fn classify(&self, element_type: &str) -> Option<ElementKind> {
        self.map.get(element_type).copied()
    }

    /// Registers (or overrides) a strategy for an element type.
    pub fn register(&mut self, element_type: impl Into<String>, kind: ElementKind) {
        self.map.insert(element_type.into(), kind);
    }
}

/// Builds a fresh control tree from a validated config.
pub(crate) fn build_tree(
    config: &FormConfig,
    types: &ElementTypeMap,
) -> Result<ControlTree, FormError> {
    let mut tree = ControlTree::new();
    let root = tree.root();
    for element in &config.elements {
        build_element(&mut tree, types, root, element)?;
    }
    Ok(tree)
}

/// Builds one element (and its subtree) under `parent`. Returns `None` for
/// display elements, which own no control.
pub(crate) fn build_element(
    tree: &mut ControlTree,
    types: &ElementTypeMap,
    parent: NodeId,
    element: &FormElement,
) -> Result<Option<NodeId>, FormError> {
    let kind = types.classify(&element.element_type).ok_or_else(|| {
        FormError::Configuration(format!(
            "unrecognized element type '{}' for key '{}'",
            element.element_type, element.key
        ))
    })?;

    if element.multiple == Some(true)
        && !matches!(element.element_type.as_str(), "input" | "select")
    {
        return Err(FormError::Configuration(
            "the \"multiple\" config parameter is only suitable for the primitive types \
             \"input\" and \"select\""
                .into(),
        ));
    }

    match kind {
        ElementKind::Display => Ok(None),
        ElementKind::Value => build_value(tree, types, parent, element).map(Some),
        ElementKind::Group(container) => {
            if container == ContainerKind::FormGroup && element.settings_flag("multiple") {
                build_group_array(tree, types, parent, element).map(Some)
            } else {
                build_group(tree, types, parent, element, container).map(Some)
            }
        }
        ElementKind::Array => build_repeater(tree, types, parent, element).map(Some),
    }
}

fn build_value(
    tree: &mut ControlTree,
    types: &ElementTypeMap,
    parent: NodeId,
    element: &FormElement,
) -> Result<NodeId, FormError> {
    if element.multiple == Some(true) {
        let template = entry_template(element);
        let array_id = create_node(
            tree,
            parent,
            &element.key,
            NodeKind::Array(ArrayState {
                items: Vec::new(),
                min_items: None,
                max_items: None,
                template: ArrayTemplate::Element(Box::new(template)),
            }),
            CompiledValidators::default(),
        )?;

        if let Some(Value::Array(values)) = &element.value {
            for value in values {
                let entry = append_array_entry(tree, types, array_id)?;
                tree.set_value(entry, value.clone());
            }
        }
        return Ok(array_id);
    }

    let compiled = validators::compile(element)?;
    let initial = element.value.clone().unwrap_or(Value::Null);
    let id = create_node(
        tree,
        parent,
        &element.key,
        NodeKind::Value(ValueState {
            value: initial.clone(),
            initial,
        }),
        compiled,
    )?;
    tree.run_sync_validators(id);
    Ok(id)
}

fn build_group(
    tree: &mut ControlTree,
    types: &ElementTypeMap,
    parent: NodeId,
    element: &FormElement,
    container: ContainerKind,
) -> Result<NodeId, FormError> {
    let compiled = validators::compile(element)?;
    let group_id = create_node(
        tree,
        parent,
        &element.key,
        NodeKind::Group(GroupState {
            children: Vec::new(),
            container,
            active_tab: None,
        }),
        compiled,
    )?;

    for child in element.children.as_deref().unwrap_or_default() {
        build_element(tree, types, group_id, child)?;
    }

    if container == ContainerKind::TabContainer {
        let has_children = tree
            .node(group_id)
            .and_then(ControlNode::as_group)
            .map(|g| !g.children.is_empty())
            .unwrap_or(false);
        if has_children {
            if let Some(node) = tree.node_mut(group_id) {
                if let NodeKind::Group(state) = &mut node.kind {
                    state.active_tab = Some(0);
                }
            }
        }
    }

    Ok(group_id)
}

/// A `formGroup` with `settings.multiple` wraps its group in an array with a
/// single initial entry, so further entries can be appended at runtime.
fn build_group_array(
    tree: &mut ControlTree,
    types: &ElementTypeMap,
    parent: NodeId,
    element: &FormElement,
) -> Result<NodeId, FormError> {
    let children = element.children.clone().unwrap_or_default();
    let array_id = create_node(
        tree,
        parent,
        &element.key,
        NodeKind::Array(ArrayState {
            items: Vec::new(),
            min_items: None,
            max_items: None,
            template: ArrayTemplate::Children(children),
        }),
        CompiledValidators::default(),
    )?;
    append_array_entry(tree, types, array_id)?;
    Ok(array_id)
}

fn build_repeater(
    tree: &mut ControlTree,
    types: &ElementTypeMap,
    parent: NodeId,
    element: &FormElement,
) -> Result<NodeId, FormError> {
    let compiled = validators::compile(element)?;
    let (min_items, max_items) = item_bounds(&compiled.sync);
    let array_id = create_node(
        tree,
        parent,
        &element.key,
        NodeKind::Array(ArrayState {
            items: Vec::new(),
            min_items,
            max_items,
            template: ArrayTemplate::Children(element.children.clone().unwrap_or_default()),
        }),
        compiled,
    )?;

    if let Some(Value::Array(entries)) = &element.value {
        for entry_value in entries {
            let entry = append_array_entry(tree, types, array_id)?;
            // Patch after the entry's children exist.
            populate::apply(tree, types, entry, entry_value)?;
        }
    }
    tree.run_sync_validators(array_id);
    Ok(array_id)
}

/// Appends one entry built from the array's template. The entry's local key
/// is its index.
pub(crate) fn append_array_entry(
    tree: &mut ControlTree,
    types: &ElementTypeMap,
    array_id: NodeId,
) -> Result<NodeId, FormError> {
    let (template, index) = {
        let node = tree
            .node(array_id)
            .ok_or_else(|| FormError::UnknownKey(array_id.to_string()))?;
        let array = node.as_array().ok_or_else(|| {
            FormError::Configuration(format!("'{}' is not an array node", node.qualified_key))
        })?;
        (array.template.clone(), array.items.len())
    };
    let key = index.to_string();

    match template {
        ArrayTemplate::Element(element) => {
            let compiled = validators::compile(&element)?;
            let id = create_node(
                tree,
                array_id,
                &key,
                NodeKind::Value(ValueState {
                    value: Value::Null,
                    initial: Value::Null,
                }),
                compiled,
            )?;
            tree.run_sync_validators(id);
            Ok(id)
        }
        ArrayTemplate::Children(children) => {
            let group_id = create_node(
                tree,
                array_id,
                &key,
                NodeKind::Group(GroupState {
                    children: Vec::new(),
                    container: ContainerKind::FormGroup,
                    active_tab: None,
                }),
                CompiledValidators::default(),
            )?;
            for child in &children {
                build_element(tree, types, group_id, child)?;
            }
            Ok(group_id)
        }
    }
}

/// Destroys the entry at `index` and renumbers the remainder so positional
/// identity and qualified keys stay consistent. Returns the destroyed ids.
pub(crate) fn remove_array_entry(
    tree: &mut ControlTree,
    array_id: NodeId,
    index: usize,
) -> Result<Vec<NodeId>, FormError> {
    let items = tree.array_items(array_id)?;
    let target = *items.get(index).ok_or_else(|| {
        FormError::Configuration(format!(
            "array entry index {index} out of bounds (len {})",
            items.len()
        ))
    })?;
    let removed = tree.destroy(target);
    renumber_entries(tree, array_id)?;
    tree.run_sync_validators(array_id);
    Ok(removed)
}

/// Grows or shrinks an array to `target_len`. Growth appends empty-valued
/// entries from the template; shrinking removes from the tail. Returns the
/// ids destroyed by shrinking.
pub(crate) fn resize_array(
    tree: &mut ControlTree,
    types: &ElementTypeMap,
    array_id: NodeId,
    target_len: usize,
) -> Result<Vec<NodeId>, FormError> {
    let current = tree.array_items(array_id)?.len();
    let mut removed = Vec::new();
    if target_len > current {
        for _ in current..target_len {
            append_array_entry(tree, types, array_id)?;
        }
    } else if target_len < current {
        let items = tree.array_items(array_id)?;
        for item in items.iter().skip(target_len).rev() {
            removed.extend(tree.destroy(*item));
        }
    }
    tree.run_sync_validators(array_id);
    Ok(removed)
}

fn renumber_entries(tree: &mut ControlTree, array_id: NodeId) -> Result<(), FormError> {
    let items = tree.array_items(array_id)?;
    let parent_qualified = tree
        .node(array_id)
        .map(|n| n.qualified_key.clone())
        .unwrap_or_default();
    for (index, item) in items.iter().enumerate() {
        let key = index.to_string();
        if let Some(node) = tree.node_mut(*item) {
            node.key = key.clone();
        }
        tree.requalify(*item, format!("{parent_qualified}.{key}"))?;
    }
    Ok(())
}

fn item_bounds(rules: &[ValidatorRule]) -> (Option<usize>, Option<usize>) {
    let mut min_items = None;
    let mut max_items = None;
    for rule in rules {
        match rule {
            ValidatorRule::MinItems(min) => min_items = Some(*min),
            ValidatorRule::MaxItems(max) => max_items = Some(*max),
            _ => {}
        }
    }
    (min_items, max_items)
}

/// `multiple` entries build from the element itself, minus the fields that
/// only apply to the array as a whole.
fn entry_template(element: &FormElement) -> FormElement {
    let mut template = element.clone();
    template.multiple = None;
    template.value = None;
    template
}

fn create_node(
    tree: &mut ControlTree,
    parent: NodeId,
    key: &str,
    kind: NodeKind,
    compiled: CompiledValidators,
) -> Result<NodeId, FormError> {
    let qualified = tree.qualified(parent, key);
    let id = tree.alloc_id();
    let node = ControlNode {
        id,
        key: key.to_string(),
        qualified_key: qualified,
        parent: Some(parent),
        kind,
        sync_validators: compiled.sync,
        async_validators: compiled.backend,
        update_on: compiled.update_on,
        errors: Default::default(),
        message_overrides: compiled.overrides,
    };
    tree.register(node)?;
    tree.attach(parent, id);
    Ok(id)
}

/// Counts the input-like fields a config will materialize; the performance
/// monitor checks this against its field budgets.
pub(crate) fn count_fields(elements: &[FormElement], types: &ElementTypeMap) -> usize {
    let mut count = 0;
    for element in elements {
        match types.classify(&element.element_type) {
            Some(ElementKind::Value) | Some(ElementKind::Array) => count += 1,
            _ => {}
        }
        if let Some(children) = &element.children {
            count += count_fields(children, types);
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(raw: serde_json::Value) -> Result<ControlTree, FormError> {
        let config: FormConfig = serde_json::from_value(raw).unwrap();
        build_tree(&config, &ElementTypeMap::default())
    }

    #[test]
    fn builds_nested_groups_with_qualified_keys() {
        let tree = build(json!({
            "elements": [
                {"key": "name", "type": "input", "value": "Ada"},
                {"key": "address", "type": "fieldset", "children": [
                    {"key": "city", "type": "input", "value": "London"},
                    {"key": "zip", "type": "input"}
                ]}
            ]
        }))
        .unwrap();

        assert!(tree.lookup("name").is_some());
        assert!(tree.lookup("address").is_some());
        assert!(tree.lookup("address.city").is_some());
        assert_eq!(
            tree.value(),
            json!({"name": "Ada", "address": {"city": "London", "zip": null}})
        );
    }

    #[test]
    fn multiple_input_seeds_one_entry_per_value() {
        let tree = build(json!({
            "elements": [
                {"key": "tags", "type": "input", "multiple": true,
                 "value": ["a", "b", "c"],
                 "validators": [{"name": "minLength", "value": 1}]}
            ]
        }))
        .unwrap();

        let array_id = tree.lookup("tags").unwrap();
        assert_eq!(tree.array_items(array_id).unwrap().len(), 3);
        assert_eq!(tree.node_value(array_id), json!(["a", "b", "c"]));
        // Entry validators are attached per entry, not on the array.
        let entry = tree.lookup("tags.0").unwrap();
        assert_eq!(tree.node(entry).unwrap().sync_validators.len(), 1);
        assert!(tree.node(array_id).unwrap().sync_validators.is_empty());
    }

    #[test]
    fn multiple_on_checkbox_is_fatal() {
        let err = build(json!({
            "elements": [{"key": "ok", "type": "checkbox", "multiple": true}]
        }))
        .unwrap_err();
        assert!(matches!(err, FormError::Configuration(_)));
    }

    #[test]
    fn repeater_seeds_groups_from_template() {
        let tree = build(json!({
            "elements": [
                {"key": "contacts", "type": "repeater",
                 "validators": [{"name": "minItems", "value": 1}, {"name": "maxItems", "value": 3}],
                 "value": [{"name": "Ada"}, {"name": "Grace"}],
                 "children": [
                    {"key": "name", "type": "input"},
                    {"key": "phone", "type": "input"}
                 ]}
            ]
        }))
        .unwrap();

        let array_id = tree.lookup("contacts").unwrap();
        let array = tree.node(array_id).unwrap().as_array().unwrap();
        assert_eq!(array.items.len(), 2);
        assert_eq!(array.min_items, Some(1));
        assert_eq!(array.max_items, Some(3));
        assert_eq!(
            tree.node_value(array_id),
            json!([{"name": "Ada", "phone": null}, {"name": "Grace", "phone": null}])
        );
        assert!(tree.lookup("contacts.1.name").is_some());
    }

    #[test]
    fn form_group_multiple_wraps_in_array() {
        let tree = build(json!({
            "elements": [
                {"key": "phones", "type": "formGroup", "settings": {"multiple": true},
                 "children": [{"key": "number", "type": "input"}]}
            ]
        }))
        .unwrap();
        let array_id = tree.lookup("phones").unwrap();
        assert_eq!(tree.array_items(array_id).unwrap().len(), 1);
        assert!(tree.lookup("phones.0.number").is_some());
    }

    #[test]
    fn display_elements_own_no_control() {
        let tree = build(json!({
            "elements": [
                {"key": "blurb", "type": "form-text", "label": "Read this"},
                {"key": "name", "type": "input"}
            ]
        }))
        .unwrap();
        assert!(tree.lookup("blurb").is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn unrecognized_type_fails_loudly() {
        let err = build(json!({"elements": [{"key": "x", "type": "input"}]}));
        assert!(err.is_ok());
        let config = FormConfig {
            elements: vec![FormElement {
                key: "x".into(),
                element_type: "hologram".into(),
                value: None,
                label: None,
                required: None,
                validators: None,
                options: None,
                multiple: None,
                multiple_label: None,
                control_type: None,
                settings: None,
                children: None,
                class: None,
                help_text: None,
                order: None,
            }],
            buttons: None,
            submit_callback: None,
            settings: None,
        };
        assert!(matches!(
            build_tree(&config, &ElementTypeMap::default()),
            Err(FormError::Configuration(_))
        ));
    }

    #[test]
    fn remove_entry_renumbers_positions() {
        let mut tree = build(json!({
            "elements": [
                {"key": "items", "type": "repeater",
                 "value": [{"label": "first"}, {"label": "second"}, {"label": "third"}],
                 "children": [{"key": "label", "type": "input"}]}
            ]
        }))
        .unwrap();
        let types = ElementTypeMap::default();
        let array_id = tree.lookup("items").unwrap();

        remove_array_entry(&mut tree, array_id, 0).unwrap();
        assert_eq!(
            tree.node_value(array_id),
            json!([{"label": "second"}, {"label": "third"}])
        );
        // The shifted entry is reachable under its new position.
        let first = tree.lookup("items.0.label").unwrap();
        assert_eq!(tree.node_value(first), json!("second"));
        assert!(tree.lookup("items.2").is_none());

        let entry = append_array_entry(&mut tree, &types, array_id).unwrap();
        assert_eq!(tree.node(entry).unwrap().qualified_key, "items.2");
    }

    #[test]
    fn initial_values_are_validated_at_build_time() {
        let tree = build(json!({
            "elements": [
                {"key": "name", "type": "input",
                 "validators": [{"name": "required"}]}
            ]
        }))
        .unwrap();
        let id = tree.lookup("name").unwrap();
        assert!(!tree.node(id).unwrap().is_valid());
        assert!(!tree.is_valid());
    }

    #[test]
    fn count_fields_walks_children() {
        let config: FormConfig = serde_json::from_value(json!({
            "elements": [
                {"key": "a", "type": "input"},
                {"key": "grp", "type": "fieldset", "children": [
                    {"key": "b", "type": "select"},
                    {"key": "note", "type": "form-text"}
                ]},
                {"key": "rep", "type": "repeater", "children": [{"key": "c", "type": "input"}]}
            ]
        }))
        .unwrap();
        assert_eq!(count_fields(&config.elements, &ElementTypeMap::default()), 4);
    }
}
