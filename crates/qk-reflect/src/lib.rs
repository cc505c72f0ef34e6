//! Reflection planning passes.
//!
//! Each pass is a pure function over the borrowed IR. `plan_program` runs
//! them in order and assembles one [`ModulePlan`](qk_core::ModulePlan) per
//! source module.

pub mod assemble;
pub mod index;
pub mod planner;
pub mod resolver;
pub mod shims;
pub mod statics;

pub use assemble::{assemble, plan_program};
pub use index::ProgramIndex;
pub use planner::{plan_class, plan_reflection, ReflectionPlan};
pub use resolver::{resolve_references, ReferenceGraph, ResolvedImports};
pub use shims::synthesize;
pub use statics::{schedule_statics, StaticSchedule};
