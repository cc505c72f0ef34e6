use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

fn env_true(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| {
        let trimmed = val.trim();
        !trimmed.is_empty() && !matches!(trimmed, "0" | "false" | "FALSE" | "False")
    })
}

fn bool_from_env(key: &str) -> bool {
    env_true(key).unwrap_or(false)
}

/// Forces lock-guarded lazy thunks on every backend, not only on
/// multi-threaded targets.
pub fn guarded_lazy_mode() -> bool {
    static GUARDED: OnceLock<bool> = OnceLock::new();
    *GUARDED.get_or_init(|| bool_from_env("QUARK_GUARDED_LAZY"))
}

pub fn verbose_mode() -> bool {
    static VERBOSE: OnceLock<bool> = OnceLock::new();
    *VERBOSE.get_or_init(|| bool_from_env("QUARK_VERBOSE"))
}

/// Options shared by every stage of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    /// Backend names to emit, e.g. `javascript`, `python`.
    pub targets: Vec<String>,
    /// Wrap every run-once guard in a lock.
    pub guarded_lazy: bool,
    /// Spaces per nesting level in emitted sources.
    pub indent_size: usize,
    /// Emit a short header naming the generator at the top of every file.
    pub emit_header: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            guarded_lazy: guarded_lazy_mode(),
            indent_size: 4,
            emit_header: true,
        }
    }
}

impl GenerationOptions {
    pub fn for_targets<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_guarded_lazy(mut self, guarded: bool) -> Self {
        self.guarded_lazy = guarded;
        self
    }
}
