use std::sync::Arc;

use qk_core::emit::Backend;
use qk_java::JavaBackend;
use qk_javascript::JavaScriptBackend;
use qk_python::PythonBackend;
use qk_ruby::RubyBackend;

use crate::error::PipelineError;

pub const TARGETS: &[&str] = &["javascript", "python", "ruby", "java"];

/// Look a backend up by name or common alias.
pub fn backend_for(name: &str) -> Option<Arc<dyn Backend>> {
    let backend: Arc<dyn Backend> = match name.trim().to_ascii_lowercase().as_str() {
        "javascript" | "js" | "node" => Arc::new(JavaScriptBackend::new()),
        "python" | "py" => Arc::new(PythonBackend::new()),
        "ruby" | "rb" => Arc::new(RubyBackend::new()),
        "java" => Arc::new(JavaBackend::new()),
        _ => return None,
    };
    Some(backend)
}

/// Backends for `targets`, every known target when empty.
pub fn resolve_targets(targets: &[String]) -> Result<Vec<Arc<dyn Backend>>, PipelineError> {
    if targets.is_empty() {
        return Ok(TARGETS.iter().filter_map(|name| backend_for(name)).collect());
    }
    targets
        .iter()
        .map(|name| {
            backend_for(name).ok_or_else(|| {
                PipelineError::new(
                    "targets",
                    format!("unknown target `{}` (expected one of {})", name, TARGETS.join(", ")),
                )
            })
        })
        .collect()
}
