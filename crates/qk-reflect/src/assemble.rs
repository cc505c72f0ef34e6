use qk_core::emit::{DispatchShim, EmissionUnit, GenerationPlan, ImportKind, ModulePlan};
use qk_core::ir::{Program, QualifiedName};
use qk_core::Result;
use tracing::debug;

use crate::index::ProgramIndex;
use crate::planner::{plan_reflection, ReflectionPlan};
use crate::resolver::{resolve_references, ResolvedImports};
use crate::shims::synthesize;
use crate::statics::{schedule_statics, StaticSchedule};

/// Run every planning pass over `program`. Any error aborts the whole run.
pub fn plan_program(program: &Program) -> Result<GenerationPlan> {
    let index = ProgramIndex::build(program)?;

    let mut plans = Vec::with_capacity(program.modules.len());
    let mut shims = Vec::new();
    for module in &program.modules {
        let class_plans = module
            .classes
            .iter()
            .map(|class| plan_reflection(&index, class))
            .collect::<Result<Vec<_>>>()?;
        shims.extend(
            module
                .classes
                .iter()
                .filter(|class| class.reflectable)
                .map(synthesize),
        );
        plans.push((module.name.clone(), class_plans));
    }

    let schedule = schedule_statics(&index, &plans)?;
    let imports = resolve_references(&index)?;
    Ok(assemble(&plans, &shims, &schedule, &imports))
}

/// Lay the pass outputs out as ordered units: imports, native classes with
/// their shims, reflection objects, lazy statics, then the root aggregate.
pub fn assemble(
    plans: &[(QualifiedName, Vec<ReflectionPlan>)],
    shims: &[DispatchShim],
    schedule: &StaticSchedule,
    imports: &ResolvedImports,
) -> GenerationPlan {
    let mut modules = Vec::with_capacity(plans.len());
    for (module, class_plans) in plans {
        let mut plan = ModulePlan::new(module.clone());

        for import in imports.for_module(module) {
            plan.units.push(match import.kind {
                ImportKind::Eager => EmissionUnit::EagerImport(import.clone()),
                ImportKind::Lazy => EmissionUnit::LazyImport(import.clone()),
            });
        }

        for class_plan in class_plans {
            plan.units
                .push(EmissionUnit::NativeClass(class_plan.native.clone()));
            if let Some(shim) = shims.iter().find(|shim| shim.class == class_plan.native.name) {
                plan.units.push(EmissionUnit::DispatchShim(shim.clone()));
            }
        }

        for reflection in class_plans.iter().filter_map(|p| p.reflection.as_ref()) {
            plan.units
                .push(EmissionUnit::ReflectionObject(reflection.clone()));
        }

        for lazy in schedule.for_module(module) {
            plan.units.push(EmissionUnit::LazyStatic(lazy.clone()));
        }

        if let Some(root) = schedule.root(module) {
            plan.units.push(EmissionUnit::RootAggregate(root.clone()));
        }

        debug!("module {}: {} emission units", module, plan.units.len());
        modules.push(plan);
    }
    GenerationPlan { modules }
}
