//! The form engine facade.
//!
//! [`DynamicForm`] owns a control tree behind `Arc<RwLock>` and exposes the
//! inbound surface (`set_value`, `populate`, `add_element`, `remove_element`,
//! repeater item management, `submit`/`reset`/`cancel`) plus an outward
//! [`FormEvent`] broadcast. All tree mutation happens under the write lock
//! within one task turn; backend validation runs in spawned tasks that are
//! aborted and replaced when a newer value supersedes them (debounce) and
//! aborted when their node is destroyed.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::{FormButton, FormConfig, FormElement, FormElementOption, FormEvent};
use crate::error::FormError;
use crate::perf::PerformanceMonitor;
use crate::remote::{map_options, FormLoader};
use crate::tree::node::{ContainerKind, ControlNode, NodeId, NodeKind, UpdateTrigger};
use crate::tree::{builder, populate, ControlTree, ElementTypeMap};
use crate::validators::BackendValidator;

const EVENT_CAPACITY: usize = 64;

pub struct DynamicForm {
    config: FormConfig,
    types: ElementTypeMap,
    tree: Arc<RwLock<ControlTree>>,
    http: reqwest::Client,
    events: broadcast::Sender<FormEvent>,
    validation_tasks: Arc<Mutex<HashMap<NodeId, JoinHandle<()>>>>,
    monitor: PerformanceMonitor,
}

impl DynamicForm {
    /// Materializes a validated config into a live control tree.
    pub fn from_config(config: FormConfig) -> Result<Self, FormError> {
        Self::with_types(config, ElementTypeMap::default())
    }

    /// Same as [`DynamicForm::from_config`] with a custom element-type map,
    /// for hosts that register their own element types.
    pub fn with_types(config: FormConfig, types: ElementTypeMap) -> Result<Self, FormError> {
        let monitor = PerformanceMonitor::new();
        monitor.start_tracking();

        let tree = builder::build_tree(&config, &types)?;
        let field_count = builder::count_fields(&config.elements, &types);
        let elapsed_ms = monitor.end_tracking(field_count);
        info!(fields = field_count, elapsed_ms, "control tree built");

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            config,
            types,
            tree: Arc::new(RwLock::new(tree)),
            http: reqwest::Client::new(),
            events,
            validation_tasks: Arc::new(Mutex::new(HashMap::new())),
            monitor,
        })
    }

    /// Fetches, validates and materializes a remote configuration.
    pub async fn from_url(loader: &FormLoader, url: &str) -> Result<Self, FormError> {
        let config = loader.load_config(url, false).await?;
        let form = Self::from_config(config)?;
        let _ = form.events.send(FormEvent::ConfigLoaded {
            url: url.to_string(),
        });
        Ok(form)
    }

    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    pub fn buttons(&self) -> &[FormButton] {
        self.config.buttons.as_deref().unwrap_or_default()
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    /// Subscribes to outward form events.
    pub fn subscribe(&self) -> broadcast::Receiver<FormEvent> {
        self.events.subscribe()
    }

    /// The full form value, groups as objects and arrays in order.
    pub async fn value(&self) -> Value {
        self.tree.read().await.value()
    }

    pub async fn value_of(&self, key: &str) -> Result<Value, FormError> {
        let tree = self.tree.read().await;
        let id = lookup(&tree, key)?;
        Ok(tree.node_value(id))
    }

    pub async fn is_valid(&self) -> bool {
        self.tree.read().await.is_valid()
    }

    /// Resolved error messages for one control.
    pub async fn errors(&self, key: &str) -> Result<Vec<String>, FormError> {
        let tree = self.tree.read().await;
        let id = lookup(&tree, key)?;
        Ok(tree.error_messages(id))
    }

    /// All qualified keys in registration order.
    pub async fn qualified_keys(&self) -> Vec<String> {
        self.tree.read().await.qualified_keys()
    }

    /// Assigns a value to the control registered under `key`, re-running its
    /// sync validators and scheduling backend validation for change-triggered
    /// async validators.
    pub async fn set_value(&self, key: &str, value: Value) -> Result<(), FormError> {
        let (id, backends, update_on, removed) = {
            let mut tree = self.tree.write().await;
            let id = lookup(&tree, key)?;
            let removed = populate::apply(&mut tree, &self.types, id, &value)?;
            let (backends, update_on) = match tree.node(id) {
                Some(node) => (node.async_validators.clone(), node.update_on),
                None => (Vec::new(), UpdateTrigger::Change),
            };
            (id, backends, update_on, removed)
        };
        self.cancel_tasks(&removed).await;

        let _ = self.events.send(FormEvent::ValueChanged {
            key: key.to_string(),
            value: value.clone(),
        });

        if !backends.is_empty() && update_on == UpdateTrigger::Change {
            self.schedule_backend_validation(id, backends, value).await;
        }
        Ok(())
    }

    /// Reports that the control lost focus, firing blur-triggered backend
    /// validation against its current value.
    pub async fn notify_blur(&self, key: &str) -> Result<(), FormError> {
        let (id, backends, update_on, current) = {
            let tree = self.tree.read().await;
            let id = lookup(&tree, key)?;
            let node = tree.node(id).expect("looked up");
            (
                id,
                node.async_validators.clone(),
                node.update_on,
                tree.node_value(id),
            )
        };
        if !backends.is_empty() && update_on == UpdateTrigger::Blur {
            self.schedule_backend_validation(id, backends, current).await;
        }
        Ok(())
    }

    /// Builds `element` and attaches it as a child of the group registered
    /// under `target_container_id`. A `tabContainer` target activates the
    /// newly added pane.
    pub async fn add_element(
        &self,
        element: FormElement,
        target_container_id: &str,
    ) -> Result<(), FormError> {
        {
            let mut tree = self.tree.write().await;
            let target = tree.lookup(target_container_id).ok_or_else(|| {
                warn!(
                    container = target_container_id,
                    "mutation targeted an unregistered container"
                );
                FormError::TargetNotFound(target_container_id.to_string())
            })?;
            let container = tree
                .node(target)
                .and_then(ControlNode::as_group)
                .map(|g| g.container)
                .ok_or_else(|| {
                    FormError::Configuration(format!(
                        "'{target_container_id}' is not a group container"
                    ))
                })?;

            builder::build_element(&mut tree, &self.types, target, &element)?;

            if container == ContainerKind::TabContainer {
                if let Some(node) = tree.node_mut(target) {
                    if let NodeKind::Group(state) = &mut node.kind {
                        if !state.children.is_empty() {
                            state.active_tab = Some(state.children.len() - 1);
                        }
                    }
                }
            }
        }

        let _ = self.events.send(FormEvent::ElementAdded {
            key: element.key.clone(),
            target_container_id: target_container_id.to_string(),
        });
        Ok(())
    }

    /// Detaches and destroys the subtree registered under `element_id`,
    /// cancelling any outstanding backend validation owned by it. Removing
    /// the active pane of a `tabContainer` activates the previous sibling.
    pub async fn remove_element(&self, element_id: &str) -> Result<(), FormError> {
        let removed = {
            let mut tree = self.tree.write().await;
            let id = tree.lookup(element_id).ok_or_else(|| {
                warn!(element = element_id, "removal targeted an unregistered element");
                FormError::TargetNotFound(element_id.to_string())
            })?;
            let parent = tree.node(id).and_then(|n| n.parent);

            match parent {
                Some(parent_id) => {
                    let parent_is_array = tree
                        .node(parent_id)
                        .map(|n| matches!(n.kind, NodeKind::Array(_)))
                        .unwrap_or(false);

                    if parent_is_array {
                        // Positional identity: removal renumbers the rest.
                        let index = tree
                            .array_items(parent_id)?
                            .iter()
                            .position(|item| *item == id)
                            .expect("child listed under parent");
                        builder::remove_array_entry(&mut tree, parent_id, index)?
                    } else {
                        let tab_state = tree
                            .node(parent_id)
                            .and_then(ControlNode::as_group)
                            .filter(|g| g.container == ContainerKind::TabContainer)
                            .map(|g| g.children.iter().position(|c| *c == id));
                        let removed = tree.destroy(id);
                        if let Some(removed_index) = tab_state.flatten() {
                            if let Some(node) = tree.node_mut(parent_id) {
                                if let NodeKind::Group(state) = &mut node.kind {
                                    if state.children.is_empty() {
                                        state.active_tab = None;
                                    } else if removed_index > 0 {
                                        state.active_tab = Some(removed_index - 1);
                                    } else {
                                        state.active_tab = Some(0);
                                    }
                                }
                            }
                        }
                        removed
                    }
                }
                None => tree.destroy(id),
            }
        };
        self.cancel_tasks(&removed).await;

        let _ = self.events.send(FormEvent::ElementRemoved {
            key: element_id.to_string(),
        });
        Ok(())
    }

    /// Pushes external data into the tree; see [`populate`] for semantics.
    pub async fn populate(&self, data: &Value) -> Result<(), FormError> {
        let removed = {
            let mut tree = self.tree.write().await;
            populate::broadcast(&mut tree, &self.types, data)?
        };
        self.cancel_tasks(&removed).await;
        Ok(())
    }

    /// Fetches a data object from `url` and broadcasts it into the tree.
    pub async fn populate_from_url(&self, url: &str) -> Result<(), FormError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| FormError::Transport {
                message: err.to_string(),
                status: None,
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(FormError::Transport {
                message: format!("server responded with {status}"),
                status: Some(status.as_u16()),
            });
        }
        let data: Value = response.json().await.map_err(|err| FormError::Transport {
            message: format!("malformed response body: {err}"),
            status: Some(status.as_u16()),
        })?;
        self.populate(&data).await
    }

    /// Appends an empty entry to the array registered under `array_key`.
    pub async fn add_item(&self, array_key: &str) -> Result<(), FormError> {
        let mut tree = self.tree.write().await;
        let id = lookup(&tree, array_key)?;
        builder::append_array_entry(&mut tree, &self.types, id)?;
        Ok(())
    }

    /// Removes the entry at `index` from the array registered under
    /// `array_key`, renumbering the remainder.
    pub async fn remove_item(&self, array_key: &str, index: usize) -> Result<(), FormError> {
        let removed = {
            let mut tree = self.tree.write().await;
            let id = lookup(&tree, array_key)?;
            builder::remove_array_entry(&mut tree, id, index)?
        };
        self.cancel_tasks(&removed).await;
        Ok(())
    }

    /// Whether the array is at its `maxItems` bound.
    pub async fn is_add_disabled(&self, array_key: &str) -> Result<bool, FormError> {
        let tree = self.tree.read().await;
        let id = lookup(&tree, array_key)?;
        let array = tree.node(id).and_then(ControlNode::as_array).ok_or_else(|| {
            FormError::Configuration(format!("'{array_key}' is not an array node"))
        })?;
        Ok(array
            .max_items
            .map(|max| array.items.len() >= max)
            .unwrap_or(false))
    }

    /// Whether the array is at its `minItems` bound.
    pub async fn is_remove_disabled(&self, array_key: &str) -> Result<bool, FormError> {
        let tree = self.tree.read().await;
        let id = lookup(&tree, array_key)?;
        let array = tree.node(id).and_then(ControlNode::as_array).ok_or_else(|| {
            FormError::Configuration(format!("'{array_key}' is not an array node"))
        })?;
        Ok(array
            .min_items
            .map(|min| array.items.len() <= min)
            .unwrap_or(false))
    }

    /// Fetches the option list for an element whose settings carry an
    /// `asyncURL` (e.g. `data-select`), projected through its
    /// `valueKey`/`labelKey` settings.
    pub async fn load_options_for(
        &self,
        loader: &FormLoader,
        key: &str,
    ) -> Result<Vec<FormElementOption>, FormError> {
        let element = find_element(&self.config.elements, key)
            .ok_or_else(|| FormError::UnknownKey(key.to_string()))?;
        let url = element.settings_str("asyncURL").ok_or_else(|| {
            FormError::Configuration(format!("element '{key}' has no asyncURL setting"))
        })?;
        let records = loader.load_options(url, false).await?;
        Ok(map_options(
            &records,
            element.settings_str("valueKey"),
            element.settings_str("labelKey"),
        ))
    }

    /// The active pane index of a tab container, if any.
    pub async fn active_tab(&self, key: &str) -> Result<Option<usize>, FormError> {
        let tree = self.tree.read().await;
        let id = lookup(&tree, key)?;
        let group = tree.node(id).and_then(ControlNode::as_group).ok_or_else(|| {
            FormError::Configuration(format!("'{key}' is not a group container"))
        })?;
        Ok(group.active_tab)
    }

    /// Emits [`FormEvent::Submit`] with the full value if the tree is valid.
    /// Returns whether the submission went through.
    pub async fn submit(&self) -> bool {
        let (valid, value) = {
            let tree = self.tree.read().await;
            (tree.is_valid(), tree.value())
        };
        if !valid {
            warn!("form submission blocked: form is invalid");
            return false;
        }
        let _ = self.events.send(FormEvent::Submit { value });
        true
    }

    /// Restores every value control to its seeded initial value.
    pub async fn reset(&self) {
        self.tree.write().await.reset_values();
        let _ = self.events.send(FormEvent::Reset);
    }

    pub async fn cancel(&self) {
        let _ = self.events.send(FormEvent::Cancel);
    }

    /// Whether a button wired with `disableIfFormInvalid` should currently
    /// be disabled.
    pub async fn is_button_disabled(&self, button: &FormButton) -> bool {
        let gated = button
            .settings
            .as_ref()
            .and_then(|s| s.disable_if_form_invalid)
            .unwrap_or(false);
        gated && !self.is_valid().await
    }

    /// Aborts the in-flight check for `id` (if any) and spawns a fresh one.
    /// The abort-and-respawn is what gives debounce semantics: a burst of
    /// changes produces exactly one backend call, one debounce window after
    /// the last change.
    async fn schedule_backend_validation(
        &self,
        id: NodeId,
        backends: Vec<BackendValidator>,
        value: Value,
    ) {
        let mut tasks = self.validation_tasks.lock().await;
        if let Some(previous) = tasks.remove(&id) {
            previous.abort();
        }

        let tree = self.tree.clone();
        let client = self.http.clone();
        let handle = tokio::spawn(async move {
            let mut failure = None;
            for backend in &backends {
                if let Some(payload) = backend.check(&client, &value).await {
                    failure = Some(payload);
                    break;
                }
            }
            let mut tree = tree.write().await;
            // The node may have been destroyed while the check was in flight.
            if let Some(node) = tree.node_mut(id) {
                match failure {
                    Some(payload) => {
                        node.errors.insert("asyncBackend".to_string(), payload);
                    }
                    None => {
                        node.errors.remove("asyncBackend");
                    }
                }
            }
        });
        tasks.insert(id, handle);
    }

    async fn cancel_tasks(&self, removed: &[NodeId]) {
        if removed.is_empty() {
            return;
        }
        let mut tasks = self.validation_tasks.lock().await;
        for id in removed {
            if let Some(handle) = tasks.remove(id) {
                handle.abort();
            }
        }
    }
}

fn lookup(tree: &ControlTree, key: &str) -> Result<NodeId, FormError> {
    tree.lookup(key)
        .ok_or_else(|| FormError::UnknownKey(key.to_string()))
}

fn find_element<'a>(elements: &'a [FormElement], key: &str) -> Option<&'a FormElement> {
    for element in elements {
        if element.key == key {
            return Some(element);
        }
        if let Some(children) = &element.children {
            if let Some(found) = find_element(children, key) {
                return Some(found);
            }
        }
    }
    None
}

impl std::fmt::Debug for DynamicForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicForm")
            .field("elements", &self.config.elements.len())
            .finish()
    }
}
