use itertools::Itertools;
use qk_core::ir::QualifiedName;
use thiserror::Error;

/// Errors raised by generated reflective code at run time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("cannot instantiate abstract class `{class}`")]
    AbstractInstantiation { class: QualifiedName },
    #[error("type cast failed: expected `{expected}`, found `{found}`")]
    TypeCast { expected: QualifiedName, found: String },
    #[error("`{callee}` expects {expected} arguments, got {found}")]
    Arity {
        callee: String,
        expected: usize,
        found: usize,
    },
    #[error("unknown class `{0}`")]
    UnknownClass(QualifiedName),
    #[error("unknown module `{0}`")]
    UnknownModule(QualifiedName),
    #[error("unknown static `{0}`")]
    UnknownStatic(String),
    #[error("`{name}` was forced while it was being initialized")]
    CircularInitialization { name: String },
    #[error("module load cycle: {}", .path.iter().join(" -> "))]
    LoadCycle { path: Vec<QualifiedName> },
    #[error("runtime has been dropped")]
    Detached,
    #[error("native method failed: {0}")]
    Native(String),
}

impl RuntimeError {
    pub fn cast(expected: &QualifiedName, found: impl Into<String>) -> Self {
        RuntimeError::TypeCast {
            expected: expected.clone(),
            found: found.into(),
        }
    }
}

impl From<eyre::Report> for RuntimeError {
    fn from(err: eyre::Report) -> Self {
        RuntimeError::Native(err.to_string())
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
