use std::sync::Arc;

use dashmap::DashMap;

use crate::error::RuntimeResult;
use crate::value::Value;

/// Body of a generated method, supplied by the embedder. Receives the
/// receiver (`Value::Null` for static methods) and already-cast arguments.
pub type NativeMethod = Arc<dyn Fn(&Value, &[Value]) -> RuntimeResult<Value> + Send + Sync>;

/// Method bodies keyed by `class.method`. Methods without a registered body
/// behave as no-op stubs returning null.
#[derive(Default, Clone)]
pub struct NativeRegistry {
    methods: Arc<DashMap<String, NativeMethod>>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, class: &str, method: &str, body: F)
    where
        F: Fn(&Value, &[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        self.methods
            .insert(format!("{class}.{method}"), Arc::new(body));
    }

    pub fn lookup(&self, class: &str, method: &str) -> Option<NativeMethod> {
        self.methods
            .get(&format!("{class}.{method}"))
            .map(|entry| entry.value().clone())
    }
}

impl std::fmt::Debug for NativeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRegistry")
            .field("methods", &self.methods.len())
            .finish()
    }
}
