//! Reference runtime for generated reflective code.
//!
//! Loads a [`GenerationPlan`](qk_core::GenerationPlan) and executes its
//! reflection objects, dispatch shims, lazy statics and module imports in
//! process, so the behaviour every backend must reproduce can be checked
//! directly.

#[macro_use]
extern crate qk_core;

pub mod class;
pub mod error;
pub mod lazy;
pub mod module;
pub mod native;
pub mod runtime;
pub mod types;
pub mod value;

pub use class::{ReflectClass, ReflectMethod};
pub use error::{RuntimeError, RuntimeResult};
pub use lazy::Thunk;
pub use module::{ImportHandle, LoadedModule, Root};
pub use native::{NativeMethod, NativeRegistry};
pub use runtime::Runtime;
pub use types::TypeTable;
pub use value::{Object, ObjectRef, Value};
