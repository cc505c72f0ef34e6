//! Java backend.
//!
//! One source file per class. Native classes carry their dispatch shim and
//! their own statics; reflection classes, method descriptors and `Root` live
//! in the `<module>_md` package. Java programs initialize statics from many
//! threads, so every holder is synchronized regardless of options.

pub mod emitter;

use std::collections::HashMap;

use qk_core::config::GenerationOptions;
use qk_core::emit::{
    Backend, EmissionSink, LazyStatic, ModulePlan, ModuleScope, StaticOwner, UnitKind,
};
use qk_core::ir::QualifiedName;
use qk_core::names;
use qk_core::Result;
use tracing::trace;

use crate::emitter::{package_line, source_path, JavaEmitter};

pub const HEADER: &str = "// Code generated by qk. DO NOT EDIT.";

#[derive(Debug, Default, Clone)]
pub struct JavaBackend;

impl JavaBackend {
    pub fn new() -> Self {
        Self
    }
}

fn write_file(
    sink: &mut dyn EmissionSink,
    options: &GenerationOptions,
    class: &QualifiedName,
    kind: UnitKind,
    body: String,
) {
    let path = source_path(class.as_str());
    trace!("java: writing {}", path);
    sink.begin_file(path);
    if options.emit_header {
        sink.declaration(None, HEADER.to_string());
    }
    if let Some(package) = package_line(class) {
        sink.declaration(None, package);
    }
    sink.declaration(Some(kind), body);
}

impl Backend for JavaBackend {
    fn name(&self) -> &'static str {
        "java"
    }

    fn file_extension(&self) -> &'static str {
        "java"
    }

    fn multi_threaded(&self) -> bool {
        true
    }

    fn emit_module(
        &self,
        module: &ModulePlan,
        options: &GenerationOptions,
        sink: &mut dyn EmissionSink,
    ) -> Result<()> {
        let scope = ModuleScope::new(module);
        let emitter = JavaEmitter {
            scope: &scope,
            indent_size: options.indent_size,
        };
        let package = QualifiedName::new(module.metadata_module.clone());

        let mut statics: HashMap<&StaticOwner, Vec<&LazyStatic>> = HashMap::new();
        for lazy in module.statics() {
            statics.entry(&lazy.key.owner).or_default().push(lazy);
        }
        let owned = |owner: StaticOwner| statics.get(&owner).cloned().unwrap_or_default();

        for class in module.native_classes() {
            let body = emitter.native_class(
                class,
                module.shim_for(&class.name),
                &owned(StaticOwner::Class(class.name.clone())),
            );
            write_file(sink, options, &class.name, UnitKind::NativeClass, body);
        }

        for reflection in module.reflections() {
            let shim = module.shim_for(&reflection.class);
            for method in &reflection.methods {
                let invoke = shim.and_then(|s| s.invoke.iter().find(|i| i.method == method.name));
                let body = emitter.method_reflection(method, invoke);
                write_file(
                    sink,
                    options,
                    &package.child(&method.type_name),
                    UnitKind::ReflectionObject,
                    body,
                );
            }
            let body = emitter.reflection(
                reflection,
                shim,
                &owned(StaticOwner::Reflection(reflection.class.clone())),
            );
            write_file(
                sink,
                options,
                &package.child(&reflection.type_name),
                UnitKind::ReflectionObject,
                body,
            );
        }

        if let Some(root) = module.root() {
            let body = emitter.root(root, &owned(StaticOwner::Root(module.module.clone())));
            write_file(
                sink,
                options,
                &package.child(names::ROOT_TYPE),
                UnitKind::RootAggregate,
                body,
            );
        }
        Ok(())
    }
}
