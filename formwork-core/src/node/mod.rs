//! Form Nodes
//!
//! The node tree is a closed set of three variants:
//!
//! - [`FieldNode`]: a single value with its own validators.
//! - [`GroupNode`]: a fixed, ordered set of named children.
//! - [`ArrayNode`]: an ordered list of [`GroupNode`] items built from one item
//!   schema.
//!
//! All three implement [`Control`], the capability interface for reading
//! state and driving the shared mutators. [`FormNode`] wraps any of them.
//!
//! # Handles
//!
//! Every node type is a cheap handle over shared state, like
//! [`Signal`](crate::reactive::Signal). Cloning a `GroupNode` does not copy
//! the form; both handles observe and mutate the same tree.
//!
//! # Derived State
//!
//! A composite's value, status and interaction flags are computed from its
//! children on every read, through tracked signal reads. Nothing is cached,
//! so there is nothing to invalidate, and any read inside an
//! [`Effect`](crate::reactive::Effect) subscribes to exactly the leaves it
//! touched.
//!
//! # Disabled Nodes
//!
//! A disabled node is left out of its parent's value, never validates, and
//! counts as neither invalid nor pending.

mod array;
mod field;
mod group;
mod schema;
mod state;

pub use array::ArrayNode;
pub use field::FieldNode;
pub use group::{GroupNode, WeakGroupNode};
pub use schema::{
    ArraySchema, BehaviorSchemaFn, Component, FieldConfig, FormConfig, GroupSchema, NodeSchema,
    ValidationSchemaFn,
};

pub(crate) use state::NodeState;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::FormSettings;
use crate::error::Result;
use crate::reactive::untracked;
use crate::validation::{ErrorFilter, ValidationError, ValidationOutcome, ValidationRun};

/// Validation status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Valid,
    Invalid,
    Pending,
}

/// Which variant a [`FormNode`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Field,
    Group,
    Array,
}

/// Options for [`FieldNode::set_value_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetValueOptions {
    /// Mark the leaf dirty.
    pub mark_dirty: bool,
    /// Run validation if the leaf's update trigger is `Change`.
    pub validate: bool,
}

impl Default for SetValueOptions {
    fn default() -> Self {
        Self {
            mark_dirty: true,
            validate: true,
        }
    }
}

impl SetValueOptions {
    /// Programmatic write: validate, but leave the dirty flag alone.
    pub fn programmatic() -> Self {
        Self {
            mark_dirty: false,
            validate: true,
        }
    }

    /// Write without marking dirty or validating.
    pub fn silent() -> Self {
        Self {
            mark_dirty: false,
            validate: false,
        }
    }
}

/// State and mutators every node supports.
///
/// Reads (`value`, `status`, `touched`, ...) are tracked: inside an effect
/// they subscribe it. Mutators propagate through the subtree the way each
/// variant defines.
pub trait Control {
    /// Current value. Composite values omit disabled children.
    fn value(&self) -> Value;

    /// Current value, without creating a reactive dependency.
    fn get_value(&self) -> Value {
        untracked(|| self.value())
    }

    /// Replace the value. On composites, keys/items absent from `value` keep
    /// their current value; lists resize to the given length.
    fn set_value(&self, value: Value);

    /// Like `set_value`, but lists only update existing items.
    fn patch_value(&self, value: Value);

    /// The node's own errors.
    fn errors(&self) -> Vec<ValidationError>;

    /// The node's own errors, filtered.
    fn get_errors(&self, filter: &ErrorFilter) -> Vec<ValidationError> {
        filter.apply(self.errors())
    }

    /// Replace the node's own errors, without running any validator.
    fn set_errors(&self, errors: Vec<ValidationError>);

    fn clear_errors(&self) {
        self.set_errors(Vec::new());
    }

    fn invalid(&self) -> bool;

    fn pending(&self) -> bool;

    fn status(&self) -> NodeStatus {
        if self.invalid() {
            NodeStatus::Invalid
        } else if self.pending() {
            NodeStatus::Pending
        } else {
            NodeStatus::Valid
        }
    }

    fn valid(&self) -> bool {
        self.status() == NodeStatus::Valid
    }

    fn touched(&self) -> bool;

    fn dirty(&self) -> bool;

    fn disabled(&self) -> bool;

    fn enabled(&self) -> bool {
        !self.disabled()
    }

    fn visible(&self) -> bool;

    fn mark_as_touched(&self);

    fn mark_as_untouched(&self);

    fn mark_as_dirty(&self);

    fn mark_as_pristine(&self);

    /// Mark this node and every enabled descendant touched.
    fn touch_all(&self) {
        self.mark_as_touched();
    }

    /// Re-enable the node (and subtree) and re-run its validation.
    fn enable(&self);

    /// Exclude the node (and subtree) from values and validation.
    fn disable(&self);

    fn show(&self);

    fn hide(&self);

    /// Clear flags and errors; set the value to `value`, or to the initial
    /// value when `None`.
    fn reset(&self, value: Option<Value>);

    /// Return to the value captured at construction.
    fn reset_to_initial(&self);

    /// Run validation now.
    ///
    /// The synchronous pass happens before this returns; the future resolves
    /// once async validators finish.
    fn validate(&self) -> BoxFuture<'static, ValidationOutcome>;

    /// Tear down every subscription the node owns, recursively. Idempotent.
    fn dispose(&self);

    /// Deserialize the current value.
    fn value_as<T: DeserializeOwned>(&self) -> Result<T>
    where
        Self: Sized,
    {
        Ok(serde_json::from_value(self.get_value())?)
    }

    /// Serialize `value` and set it.
    fn set_typed<T: Serialize>(&self, value: &T) -> Result<()>
    where
        Self: Sized,
    {
        self.set_value(serde_json::to_value(value)?);
        Ok(())
    }
}

/// Any node in the tree.
#[derive(Debug, Clone)]
pub enum FormNode {
    Field(FieldNode),
    Group(GroupNode),
    Array(ArrayNode),
}

macro_rules! dispatch {
    ($self:ident, $node:ident => $body:expr) => {
        match $self {
            FormNode::Field($node) => $body,
            FormNode::Group($node) => $body,
            FormNode::Array($node) => $body,
        }
    };
}

impl FormNode {
    pub(crate) fn build(schema: &NodeSchema, settings: &FormSettings, value: Option<&Value>) -> Self {
        match schema {
            NodeSchema::Field(config) => {
                FormNode::Field(FieldNode::build(config, settings, value.cloned()))
            }
            NodeSchema::Group(schema) => {
                FormNode::Group(GroupNode::build(schema, settings, value))
            }
            NodeSchema::Array(schema) => {
                FormNode::Array(ArrayNode::build(schema, settings, value))
            }
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            FormNode::Field(_) => NodeKind::Field,
            FormNode::Group(_) => NodeKind::Group,
            FormNode::Array(_) => NodeKind::Array,
        }
    }

    pub fn as_field(&self) -> Option<&FieldNode> {
        match self {
            FormNode::Field(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupNode> {
        match self {
            FormNode::Group(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayNode> {
        match self {
            FormNode::Array(node) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn begin_validation(&self) -> ValidationRun {
        dispatch!(self, node => node.begin_validation())
    }

    /// Validate in the background, honoring a leaf's debounce.
    pub(crate) fn revalidate(&self) {
        dispatch!(self, node => node.trigger_validation())
    }

    /// Drop in-flight attempts whose futures will never be polled.
    pub(crate) fn abandon_validation(&self) {
        dispatch!(self, node => node.abandon_validation())
    }

    pub(crate) fn append_errors(&self, errors: Vec<ValidationError>) {
        if errors.is_empty() {
            return;
        }
        dispatch!(self, node => node.append_errors(errors))
    }
}

impl From<FieldNode> for FormNode {
    fn from(node: FieldNode) -> Self {
        FormNode::Field(node)
    }
}

impl From<GroupNode> for FormNode {
    fn from(node: GroupNode) -> Self {
        FormNode::Group(node)
    }
}

impl From<ArrayNode> for FormNode {
    fn from(node: ArrayNode) -> Self {
        FormNode::Array(node)
    }
}

impl Control for FormNode {
    fn value(&self) -> Value {
        dispatch!(self, node => node.value())
    }

    fn set_value(&self, value: Value) {
        dispatch!(self, node => node.set_value(value))
    }

    fn patch_value(&self, value: Value) {
        dispatch!(self, node => node.patch_value(value))
    }

    fn errors(&self) -> Vec<ValidationError> {
        dispatch!(self, node => node.errors())
    }

    fn set_errors(&self, errors: Vec<ValidationError>) {
        dispatch!(self, node => node.set_errors(errors))
    }

    fn invalid(&self) -> bool {
        dispatch!(self, node => node.invalid())
    }

    fn pending(&self) -> bool {
        dispatch!(self, node => node.pending())
    }

    fn touched(&self) -> bool {
        dispatch!(self, node => node.touched())
    }

    fn dirty(&self) -> bool {
        dispatch!(self, node => node.dirty())
    }

    fn disabled(&self) -> bool {
        dispatch!(self, node => node.disabled())
    }

    fn visible(&self) -> bool {
        dispatch!(self, node => node.visible())
    }

    fn mark_as_touched(&self) {
        dispatch!(self, node => node.mark_as_touched())
    }

    fn mark_as_untouched(&self) {
        dispatch!(self, node => node.mark_as_untouched())
    }

    fn mark_as_dirty(&self) {
        dispatch!(self, node => node.mark_as_dirty())
    }

    fn mark_as_pristine(&self) {
        dispatch!(self, node => node.mark_as_pristine())
    }

    fn touch_all(&self) {
        dispatch!(self, node => node.touch_all())
    }

    fn enable(&self) {
        dispatch!(self, node => node.enable())
    }

    fn disable(&self) {
        dispatch!(self, node => node.disable())
    }

    fn show(&self) {
        dispatch!(self, node => node.show())
    }

    fn hide(&self) {
        dispatch!(self, node => node.hide())
    }

    fn reset(&self, value: Option<Value>) {
        dispatch!(self, node => node.reset(value))
    }

    fn reset_to_initial(&self) {
        dispatch!(self, node => node.reset_to_initial())
    }

    fn validate(&self) -> BoxFuture<'static, ValidationOutcome> {
        dispatch!(self, node => node.validate())
    }

    fn dispose(&self) {
        dispatch!(self, node => node.dispose())
    }
}
