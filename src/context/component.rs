//! Named, typed attachments to an execution context

use std::any::{Any, TypeId};
use std::sync::Arc;

/// A value registered under a name and a declared type
#[derive(Clone)]
pub struct ContextComponent {
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
    use_once: bool,
}

impl ContextComponent {
    pub fn new<T: Any + Send + Sync>(name: impl Into<String>, value: T) -> Self {
        Self::with_use_once(name, value, false)
    }

    /// Create a component, marking it single-use
    pub fn with_use_once<T: Any + Send + Sync>(
        name: impl Into<String>,
        value: T,
        use_once: bool,
    ) -> Self {
        Self {
            name: name.into(),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
            use_once,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True if the component should not be used more than once
    pub fn is_use_once(&self) -> bool {
        self.use_once
    }

    /// Typed access to the value
    pub fn value<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    fn is<T: Any>(&self, name: &str) -> bool {
        self.name == name && self.type_id == TypeId::of::<T>()
    }
}

/// Components are equal when name and declared type match; the value is ignored
impl PartialEq for ContextComponent {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.type_id == other.type_id
    }
}

impl Eq for ContextComponent {}

impl std::fmt::Debug for ContextComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextComponent")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("use_once", &self.use_once)
            .finish()
    }
}

/// Registry of context components
///
/// Registering a component equal to an existing one replaces it. Single-use
/// components are not removed on lookup; callers remove them explicitly.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    components: Vec<ContextComponent>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component, returning the stored handle
    pub fn register(&mut self, component: ContextComponent) -> ContextComponent {
        self.components.retain(|existing| existing != &component);
        self.components.push(component.clone());
        component
    }

    /// Find a component by name and type
    pub fn lookup<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.components
            .iter()
            .find(|c| c.is::<T>(name))
            .and_then(|c| c.value::<T>())
    }

    /// Find the component handle by name and type
    pub fn component<T: Any + Send + Sync>(&self, name: &str) -> Option<&ContextComponent> {
        self.components.iter().find(|c| c.is::<T>(name))
    }

    /// Remove a component by name and type
    pub fn remove<T: Any + Send + Sync>(&mut self, name: &str) -> Option<ContextComponent> {
        let index = self.components.iter().position(|c| c.is::<T>(name))?;
        Some(self.components.remove(index))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
