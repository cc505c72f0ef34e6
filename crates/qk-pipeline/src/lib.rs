//! Staged generation driver and target registry.

#[macro_use]
extern crate qk_core;

pub mod error;
pub mod pipeline;
pub mod stages;
pub mod targets;

pub use error::{Diagnostic, DiagnosticLevel, PipelineDiagnostics, PipelineError};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineStage};
pub use stages::{
    AssembleStage, EmitStage, GeneratedOutput, PlanStage, ResolveStage, ShimStage, StaticStage,
};
pub use targets::{backend_for, resolve_targets, TARGETS};

use qk_core::config::GenerationOptions;
use qk_core::ir::Program;
use qk_core::GenerationPlan;

/// The planning half of the pipeline, ending in a target-neutral plan.
pub fn planning_pipeline() -> Pipeline<Program, GenerationPlan> {
    PipelineBuilder::new()
        .add_stage(PlanStage)
        .add_stage(ShimStage)
        .add_stage(StaticStage)
        .add_stage(ResolveStage)
        .add_stage(AssembleStage)
        .build()
}

pub fn plan(program: Program, options: &GenerationOptions) -> Result<GenerationPlan, PipelineError> {
    let mut diagnostics = PipelineDiagnostics::default();
    planning_pipeline().run(program, &mut diagnostics, options)
}

/// Plan `program` and render it for every target in `options`. Any failure
/// aborts the run; no partial output is returned.
pub fn generate(program: Program, options: &GenerationOptions) -> Result<GeneratedOutput, PipelineError> {
    let backends = resolve_targets(&options.targets)?;
    let pipeline = PipelineBuilder::new()
        .add_stage(PlanStage)
        .add_stage(ShimStage)
        .add_stage(StaticStage)
        .add_stage(ResolveStage)
        .add_stage(AssembleStage)
        .add_stage(EmitStage::new(backends))
        .build();
    let mut diagnostics = PipelineDiagnostics::default();
    let output = pipeline.run(program, &mut diagnostics, options)?;
    debug!(
        "generated {} file(s) for {} target(s)",
        output.files.iter().map(|(_, files)| files.len()).sum::<usize>(),
        output.files.len()
    );
    Ok(output)
}
