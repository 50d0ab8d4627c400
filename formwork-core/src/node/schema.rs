//! Schemas nodes are built from.
//!
//! A [`GroupSchema`] is an ordered map of field name to [`NodeSchema`]. Leaves
//! are described by [`FieldConfig`], nested objects by another
//! [`GroupSchema`], and lists by an [`ArraySchema`] wrapping the item schema.
//!
//! ```rust,ignore
//! let schema = GroupSchema::new()
//!     .field("email", FieldConfig::new("").validator(required))
//!     .field("address", GroupSchema::new().field("city", FieldConfig::new("")))
//!     .field("items", ArraySchema::new(item_schema));
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use indexmap::IndexMap;
use serde_json::Value;

use crate::behavior::BehaviorContext;
use crate::config::{FormSettings, UpdateOn};
use crate::validation::{AsyncValidator, SyncValidator, ValidationBuilder, ValidationError};

/// Opaque render-time metadata attached to a leaf.
///
/// The engine stores and hands it back; it never looks inside.
#[derive(Clone)]
pub struct Component(Arc<dyn Any + Send + Sync>);

impl Component {
    pub fn new<T: Any + Send + Sync>(descriptor: T) -> Self {
        Self(Arc::new(descriptor))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Component(..)")
    }
}

/// Configuration of a single leaf.
#[derive(Clone)]
pub struct FieldConfig {
    pub(crate) value: Value,
    pub(crate) component: Option<Component>,
    pub(crate) validators: Vec<SyncValidator>,
    pub(crate) async_validators: Vec<AsyncValidator>,
    pub(crate) update_on: Option<UpdateOn>,
    pub(crate) debounce: Option<Duration>,
    pub(crate) disabled: bool,
}

impl FieldConfig {
    /// A leaf whose initial value is `value`.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            component: None,
            validators: Vec::new(),
            async_validators: Vec::new(),
            update_on: None,
            debounce: None,
            disabled: false,
        }
    }

    /// Attach a render descriptor.
    pub fn component<T: Any + Send + Sync>(mut self, descriptor: T) -> Self {
        self.component = Some(Component::new(descriptor));
        self
    }

    /// Add a synchronous validator.
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Option<ValidationError> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Add an asynchronous validator.
    pub fn async_validator<F, Fut>(mut self, validator: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<ValidationError>> + Send + 'static,
    {
        self.async_validators
            .push(Arc::new(move |value: Value| validator(value).boxed()));
        self
    }

    pub fn update_on(mut self, trigger: UpdateOn) -> Self {
        self.update_on = Some(trigger);
        self
    }

    /// Debounce validation triggered by value changes.
    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = Some(delay);
        self
    }

    /// Start the leaf disabled.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("value", &self.value)
            .field("validators", &self.validators.len())
            .field("async_validators", &self.async_validators.len())
            .field("update_on", &self.update_on)
            .field("debounce", &self.debounce)
            .field("disabled", &self.disabled)
            .finish()
    }
}

/// Schema for one node of any kind.
#[derive(Debug, Clone)]
pub enum NodeSchema {
    Field(FieldConfig),
    Group(GroupSchema),
    Array(ArraySchema),
}

impl From<FieldConfig> for NodeSchema {
    fn from(config: FieldConfig) -> Self {
        NodeSchema::Field(config)
    }
}

impl From<GroupSchema> for NodeSchema {
    fn from(schema: GroupSchema) -> Self {
        NodeSchema::Group(schema)
    }
}

impl From<ArraySchema> for NodeSchema {
    fn from(schema: ArraySchema) -> Self {
        NodeSchema::Array(schema)
    }
}

/// Ordered set of named child schemas.
#[derive(Debug, Clone, Default)]
pub struct GroupSchema {
    pub(crate) fields: IndexMap<String, NodeSchema>,
}

impl GroupSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a child.
    pub fn field(mut self, name: impl Into<String>, schema: impl Into<NodeSchema>) -> Self {
        self.fields.insert(name.into(), schema.into());
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Schema for a list of homogeneous object items.
#[derive(Debug, Clone)]
pub struct ArraySchema {
    pub(crate) item: GroupSchema,
    pub(crate) initial: Vec<Value>,
}

impl ArraySchema {
    pub fn new(item: GroupSchema) -> Self {
        Self {
            item,
            initial: Vec::new(),
        }
    }

    /// Items present at construction. Each value patches the item schema's
    /// defaults and becomes that item's initial value.
    pub fn with_items<I>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.initial = items.into_iter().collect();
        self
    }
}

/// A behavior schema function.
pub type BehaviorSchemaFn = Arc<dyn Fn(&mut BehaviorContext) + Send + Sync>;

/// A validation schema function.
pub type ValidationSchemaFn = Arc<dyn Fn(&mut ValidationBuilder) + Send + Sync>;

/// Structured form configuration: schema plus automation.
#[derive(Clone)]
pub struct FormConfig {
    pub(crate) form: GroupSchema,
    pub(crate) behavior: Option<BehaviorSchemaFn>,
    pub(crate) validation: Option<ValidationSchemaFn>,
    pub(crate) settings: FormSettings,
}

impl FormConfig {
    pub fn new(form: GroupSchema) -> Self {
        Self {
            form,
            behavior: None,
            validation: None,
            settings: FormSettings::default(),
        }
    }

    pub fn behavior<F>(mut self, schema: F) -> Self
    where
        F: Fn(&mut BehaviorContext) + Send + Sync + 'static,
    {
        self.behavior = Some(Arc::new(schema));
        self
    }

    pub fn validation<F>(mut self, schema: F) -> Self
    where
        F: Fn(&mut ValidationBuilder) + Send + Sync + 'static,
    {
        self.validation = Some(Arc::new(schema));
        self
    }

    pub fn settings(mut self, settings: FormSettings) -> Self {
        self.settings = settings;
        self
    }
}
