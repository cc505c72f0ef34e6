//! Static/singleton scheduling.
//!
//! Every module-level binding becomes its own lazy thunk. Edges record which
//! thunks a thunk forces while it runs; deferred reads add no edge. The
//! schedule lists thunks dependency-first, and a cycle made only of forcing
//! edges cannot be broken and aborts generation.

use std::collections::{HashMap, HashSet, VecDeque};

use qk_core::emit::{
    DefaultValue, LazyStatic, RootAggregate, RootEntry, StaticInit, StaticKey,
};
use qk_core::ir::{ClassDescriptor, Initializer, QualifiedName};
use qk_core::{names, Error, Result};
use tracing::debug;

use crate::index::ProgramIndex;
use crate::planner::ReflectionPlan;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticSchedule {
    /// All lazy statics of the program, dependency-first.
    pub statics: Vec<LazyStatic>,
    pub roots: Vec<RootAggregate>,
}

impl StaticSchedule {
    pub fn for_module<'s>(&'s self, module: &'s QualifiedName) -> impl Iterator<Item = &'s LazyStatic> {
        self.statics.iter().filter(move |lazy| &lazy.module == module)
    }

    pub fn root(&self, module: &QualifiedName) -> Option<&RootAggregate> {
        self.roots.iter().find(|root| &root.module == module)
    }
}

/// Schedule the statics of every planned class. `plans` is grouped by module
/// in program order.
pub fn schedule_statics(
    index: &ProgramIndex<'_>,
    plans: &[(QualifiedName, Vec<ReflectionPlan>)],
) -> Result<StaticSchedule> {
    let mut declared: Vec<LazyStatic> = Vec::new();
    let mut roots = Vec::new();

    for (module, class_plans) in plans {
        let mut entries = Vec::new();
        for plan in class_plans {
            let class = &plan.native.name;
            if let Some(reflection) = &plan.reflection {
                declared.push(LazyStatic {
                    key: StaticKey::singleton(class.clone()),
                    module: module.clone(),
                    init: StaticInit::ReflectionSingleton {
                        class: class.clone(),
                        reflection_type: reflection.type_name.clone(),
                    },
                    depends_on: Vec::new(),
                });
            }

            for field in &plan.native.statics {
                declared.push(LazyStatic {
                    key: StaticKey::class(class.clone(), field.name.clone()),
                    module: module.clone(),
                    init: StaticInit::Value(field.default.clone()),
                    depends_on: forced_by(index, &field.default),
                });
            }

            if let Some(class_ref) = &plan.native.class_ref {
                let entry = StaticKey::root_entry(module.clone(), class);
                declared.push(LazyStatic {
                    key: StaticKey::class(class.clone(), class_ref.clone()),
                    module: module.clone(),
                    init: StaticInit::Alias(entry.clone()),
                    depends_on: vec![entry],
                });
            }
        }

        for plan in class_plans.iter().filter(|plan| plan.reflection.is_some()) {
            let class = &plan.native.name;
            let key = StaticKey::root_entry(module.clone(), class);
            let target = StaticKey::singleton(class.clone());
            declared.push(LazyStatic {
                key: key.clone(),
                module: module.clone(),
                init: StaticInit::Alias(target.clone()),
                depends_on: vec![target.clone()],
            });
            entries.push(RootEntry {
                name: names::reflection_object(class),
                class: class.clone(),
                target,
            });
        }

        roots.push(RootAggregate {
            module: module.clone(),
            metadata_module: names::metadata_module(module),
            entries,
        });
    }

    let statics = order(declared)?;
    debug!("scheduled {} lazy statics", statics.len());
    Ok(StaticSchedule { statics, roots })
}

/// Statics a default value forces when evaluated.
fn forced_by(index: &ProgramIndex<'_>, value: &DefaultValue) -> Vec<StaticKey> {
    let mut out = Vec::new();
    let mut visiting = HashSet::new();
    collect_forced(index, value, &mut visiting, &mut out);
    out
}

fn collect_forced(
    index: &ProgramIndex<'_>,
    value: &DefaultValue,
    visiting: &mut HashSet<QualifiedName>,
    out: &mut Vec<StaticKey>,
) {
    match value {
        DefaultValue::Static(key) => {
            if !out.contains(key) {
                out.push(key.clone());
            }
        }
        DefaultValue::New(class) => {
            // constructing runs the instance field initializers of the class
            // and of every generated ancestor
            if !visiting.insert(class.clone()) {
                return;
            }
            for descriptor in ancestry(index, class) {
                for field in descriptor.instance_fields() {
                    let nested = match &field.initializer {
                        Some(Initializer::Static { class, field }) => {
                            DefaultValue::Static(StaticKey::class(class.clone(), field.clone()))
                        }
                        Some(Initializer::New { class }) => DefaultValue::New(class.clone()),
                        _ => continue,
                    };
                    collect_forced(index, &nested, visiting, out);
                }
            }
            visiting.remove(class);
        }
        _ => {}
    }
}

/// `class` and its program-declared ancestors, each once.
fn ancestry<'p>(index: &ProgramIndex<'p>, class: &QualifiedName) -> Vec<&'p ClassDescriptor> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut queue = VecDeque::from([class.clone()]);
    while let Some(current) = queue.pop_front() {
        if !seen.insert(current.clone()) {
            continue;
        }
        if let Some(descriptor) = index.class(&current) {
            queue.extend(descriptor.parents.iter().cloned());
            out.push(descriptor);
        }
    }
    out
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first topological order, stable with respect to declaration order.
fn order(declared: Vec<LazyStatic>) -> Result<Vec<LazyStatic>> {
    let mut positions = HashMap::new();
    for (position, lazy) in declared.iter().enumerate() {
        if positions.insert(lazy.key.clone(), position).is_some() {
            return Err(Error::ir(format!("static `{}` is declared twice", lazy.key)));
        }
    }
    for lazy in &declared {
        for dep in &lazy.depends_on {
            if !positions.contains_key(dep) {
                return Err(Error::ir(format!(
                    "static `{}` depends on unknown static `{}`",
                    lazy.key, dep
                )));
            }
        }
    }

    let mut marks: Vec<Option<Mark>> = vec![None; declared.len()];
    let mut stack = Vec::new();
    let mut sorted = Vec::with_capacity(declared.len());
    for start in 0..declared.len() {
        visit(start, &declared, &positions, &mut marks, &mut stack, &mut sorted)?;
    }

    let mut slots: Vec<Option<LazyStatic>> = declared.into_iter().map(Some).collect();
    Ok(sorted
        .into_iter()
        .filter_map(|position| slots[position].take())
        .collect())
}

fn visit(
    position: usize,
    declared: &[LazyStatic],
    positions: &HashMap<StaticKey, usize>,
    marks: &mut [Option<Mark>],
    stack: &mut Vec<usize>,
    sorted: &mut Vec<usize>,
) -> Result<()> {
    match marks[position] {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let from = stack.iter().position(|p| *p == position).unwrap_or(0);
            let mut path: Vec<String> = stack[from..]
                .iter()
                .map(|p| declared[*p].key.to_string())
                .collect();
            path.push(declared[position].key.to_string());
            return Err(Error::CircularInitialization { path });
        }
        None => {}
    }

    marks[position] = Some(Mark::Visiting);
    stack.push(position);
    for dep in &declared[position].depends_on {
        visit(positions[dep], declared, positions, marks, stack, sorted)?;
    }
    stack.pop();
    marks[position] = Some(Mark::Done);
    sorted.push(position);
    Ok(())
}
