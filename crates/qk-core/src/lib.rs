#[macro_use]
pub mod macros;

pub mod config;
pub mod emit;
pub mod error;
pub mod ir;
pub mod logging;
pub mod names;
pub mod pretty;

// Re-export commonly used items for convenience
pub use tracing;

pub use emit::{Backend, EmissionSink, EmissionUnit, EmittedFile, GenerationPlan, ModulePlan};
pub use ir::{ClassDescriptor, FieldDescriptor, MethodDescriptor, Module, ParameterDescriptor, Program, QualifiedName};

// Alias for error types
pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
