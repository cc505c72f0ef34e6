//! Python backend: one package per module plus its `_md` metadata package.

pub mod codegen;

use qk_core::config::GenerationOptions;
use qk_core::emit::{
    is_class_static, Backend, EmissionSink, EmissionUnit, ModulePlan, ModuleScope, UnitKind,
};
use qk_core::Result;
use tracing::trace;

use crate::codegen::{package_name, package_path, PythonGenerator};

pub const HEADER: &str = "# Code generated by qk. DO NOT EDIT.";

#[derive(Debug, Default, Clone)]
pub struct PythonBackend;

impl PythonBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for PythonBackend {
    fn name(&self) -> &'static str {
        "python"
    }

    fn file_extension(&self) -> &'static str {
        "py"
    }

    fn emit_module(
        &self,
        module: &ModulePlan,
        options: &GenerationOptions,
        sink: &mut dyn EmissionSink,
    ) -> Result<()> {
        let scope = ModuleScope::new(module);
        let package = package_name(&module.module);
        let native = PythonGenerator {
            scope: &scope,
            in_metadata: false,
            guarded: self.guarded(options),
            indent_size: options.indent_size,
        };
        let meta = PythonGenerator {
            in_metadata: true,
            ..native
        };

        let mut main: Vec<(Option<UnitKind>, String)> = vec![(None, native.render_imports(None))];
        let mut metadata: Vec<(Option<UnitKind>, String)> =
            vec![(None, meta.render_imports(Some(&package)))];
        let mut metadata_statics = Vec::new();

        if module.native_classes().any(|class| class.class_ref.is_some()) {
            main.push((Some(UnitKind::LazyImport), native.render_metadata_import()));
        }

        for unit in &module.units {
            let kind = Some(unit.kind());
            match unit {
                EmissionUnit::EagerImport(import) | EmissionUnit::LazyImport(import) => {
                    let lazy = unit.is_lazy_import();
                    main.push((kind, native.render_import(import, lazy)));
                    metadata.push((kind, meta.render_import(import, lazy)));
                }
                EmissionUnit::NativeClass(class) => {
                    main.push((kind, native.render_class(class)));
                }
                EmissionUnit::DispatchShim(shim) => {
                    main.push((kind, native.render_shim(shim)));
                }
                EmissionUnit::ReflectionObject(reflection) => {
                    let shim = module.shim_for(&reflection.class);
                    metadata.push((kind, meta.render_reflection(reflection, shim)));
                }
                EmissionUnit::LazyStatic(lazy) if is_class_static(&lazy.key) => {
                    main.push((kind, native.render_static(lazy)));
                }
                EmissionUnit::LazyStatic(lazy) => {
                    metadata_statics.push((kind, meta.render_static(lazy)));
                }
                EmissionUnit::RootAggregate(root) => {
                    metadata.push((kind, meta.render_root(root)));
                }
            }
        }
        // Owners must exist before statics are attached to them.
        metadata.extend(metadata_statics);

        for (name, declarations) in [(package, main), (module.metadata_module.clone(), metadata)] {
            let path = package_path(&name);
            trace!("python: writing {} ({} declarations)", path, declarations.len());
            sink.begin_file(path);
            if options.emit_header {
                sink.declaration(None, HEADER.to_string());
            }
            for (kind, text) in declarations {
                sink.declaration(kind, text);
            }
        }
        Ok(())
    }
}
