//! The generation passes as pipeline stages:
//! plan → shims → statics → resolve → assemble → emit.

use std::sync::Arc;

use itertools::Itertools;
use qk_core::config::GenerationOptions;
use qk_core::emit::{Backend, DispatchShim, EmittedFile, GenerationPlan};
use qk_core::ir::{Program, QualifiedName};
use qk_core::Result;
use qk_reflect::{
    assemble, plan_reflection, resolve_references, schedule_statics, synthesize, ProgramIndex,
    ReflectionPlan, ResolvedImports, StaticSchedule,
};

use crate::error::{Diagnostic, PipelineDiagnostics};
use crate::pipeline::PipelineStage;

type ModulePlans = Vec<(QualifiedName, Vec<ReflectionPlan>)>;

pub struct PlannedProgram {
    pub program: Program,
    pub plans: ModulePlans,
}

pub struct SynthesizedProgram {
    pub program: Program,
    pub plans: ModulePlans,
    pub shims: Vec<DispatchShim>,
}

pub struct ScheduledProgram {
    pub program: Program,
    pub plans: ModulePlans,
    pub shims: Vec<DispatchShim>,
    pub schedule: StaticSchedule,
}

pub struct ResolvedProgram {
    pub plans: ModulePlans,
    pub shims: Vec<DispatchShim>,
    pub schedule: StaticSchedule,
    pub imports: ResolvedImports,
}

/// Everything one generation run produced.
#[derive(Debug, Clone)]
pub struct GeneratedOutput {
    pub plan: GenerationPlan,
    /// Files per backend, in the order the backends were requested.
    pub files: Vec<(String, Vec<EmittedFile>)>,
}

impl GeneratedOutput {
    pub fn files_for(&self, target: &str) -> Option<&[EmittedFile]> {
        self.files
            .iter()
            .find(|(name, _)| name == target)
            .map(|(_, files)| files.as_slice())
    }
}

pub struct PlanStage;

impl PipelineStage for PlanStage {
    type SrcCtx = Program;
    type DstCtx = PlannedProgram;

    fn name(&self) -> &'static str {
        "plan"
    }

    fn run(
        &self,
        program: Program,
        _options: &GenerationOptions,
        diagnostics: &mut PipelineDiagnostics,
    ) -> Result<PlannedProgram> {
        let index = ProgramIndex::build(&program)?;
        let mut plans = Vec::with_capacity(program.modules.len());
        for module in &program.modules {
            let class_plans = module
                .classes
                .iter()
                .map(|class| plan_reflection(&index, class))
                .collect::<Result<Vec<_>>>()?;
            let hidden = module.classes.iter().filter(|class| !class.reflectable).count();
            if hidden > 0 {
                diagnostics.push(Diagnostic::note(format!(
                    "module {}: {} class(es) without reflection",
                    module.name, hidden
                )));
            }
            plans.push((module.name.clone(), class_plans));
        }
        Ok(PlannedProgram { program, plans })
    }
}

pub struct ShimStage;

impl PipelineStage for ShimStage {
    type SrcCtx = PlannedProgram;
    type DstCtx = SynthesizedProgram;

    fn name(&self) -> &'static str {
        "shims"
    }

    fn run(
        &self,
        planned: PlannedProgram,
        _options: &GenerationOptions,
        _diagnostics: &mut PipelineDiagnostics,
    ) -> Result<SynthesizedProgram> {
        let shims = planned
            .program
            .classes()
            .filter(|(_, class)| class.reflectable)
            .map(|(_, class)| synthesize(class))
            .collect();
        Ok(SynthesizedProgram {
            program: planned.program,
            plans: planned.plans,
            shims,
        })
    }
}

pub struct StaticStage;

impl PipelineStage for StaticStage {
    type SrcCtx = SynthesizedProgram;
    type DstCtx = ScheduledProgram;

    fn name(&self) -> &'static str {
        "statics"
    }

    fn run(
        &self,
        synthesized: SynthesizedProgram,
        _options: &GenerationOptions,
        diagnostics: &mut PipelineDiagnostics,
    ) -> Result<ScheduledProgram> {
        let schedule = {
            let index = ProgramIndex::build(&synthesized.program)?;
            schedule_statics(&index, &synthesized.plans)?
        };
        diagnostics.push(Diagnostic::note(format!(
            "{} lazy statics across {} roots",
            schedule.statics.len(),
            schedule.roots.len()
        )));
        Ok(ScheduledProgram {
            program: synthesized.program,
            plans: synthesized.plans,
            shims: synthesized.shims,
            schedule,
        })
    }
}

pub struct ResolveStage;

impl PipelineStage for ResolveStage {
    type SrcCtx = ScheduledProgram;
    type DstCtx = ResolvedProgram;

    fn name(&self) -> &'static str {
        "resolve"
    }

    fn run(
        &self,
        scheduled: ScheduledProgram,
        _options: &GenerationOptions,
        diagnostics: &mut PipelineDiagnostics,
    ) -> Result<ResolvedProgram> {
        let imports = {
            let index = ProgramIndex::build(&scheduled.program)?;
            resolve_references(&index)?
        };
        for cycle in &imports.cycles {
            diagnostics.push(Diagnostic::note(format!(
                "import cycle between {}; imports made lazy",
                cycle.iter().join(", ")
            )));
        }
        Ok(ResolvedProgram {
            plans: scheduled.plans,
            shims: scheduled.shims,
            schedule: scheduled.schedule,
            imports,
        })
    }
}

pub struct AssembleStage;

impl PipelineStage for AssembleStage {
    type SrcCtx = ResolvedProgram;
    type DstCtx = GenerationPlan;

    fn name(&self) -> &'static str {
        "assemble"
    }

    fn run(
        &self,
        resolved: ResolvedProgram,
        _options: &GenerationOptions,
        _diagnostics: &mut PipelineDiagnostics,
    ) -> Result<GenerationPlan> {
        Ok(assemble(
            &resolved.plans,
            &resolved.shims,
            &resolved.schedule,
            &resolved.imports,
        ))
    }
}

/// Renders the plan with every requested backend. All backends must
/// succeed; one failure discards the whole output.
pub struct EmitStage {
    backends: Vec<Arc<dyn Backend>>,
}

impl EmitStage {
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Self {
        Self { backends }
    }
}

impl PipelineStage for EmitStage {
    type SrcCtx = GenerationPlan;
    type DstCtx = GeneratedOutput;

    fn name(&self) -> &'static str {
        "emit"
    }

    fn run(
        &self,
        plan: GenerationPlan,
        options: &GenerationOptions,
        diagnostics: &mut PipelineDiagnostics,
    ) -> Result<GeneratedOutput> {
        let mut files = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            let emitted = backend.emit(&plan, options)?;
            diagnostics.push(Diagnostic::note(format!(
                "{}: {} file(s)",
                backend.name(),
                emitted.len()
            )));
            files.push((backend.name().to_string(), emitted));
        }
        Ok(GeneratedOutput { plan, files })
    }
}
