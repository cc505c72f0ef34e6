//! CommonJS backend.
//!
//! Every module becomes two files: `<module>/index.js` with the native
//! classes and their dispatch shims, and `<module>_md/index.js` with the
//! reflection classes, their singletons and the module `Root`.

pub mod emitter;

use qk_core::config::GenerationOptions;
use qk_core::emit::{
    is_class_static, Backend, EmissionSink, EmissionUnit, ModulePlan, ModuleScope, UnitKind,
};
use qk_core::Result;
use tracing::trace;

use crate::emitter::{module_path, module_var, JsEmitter};

pub const HEADER: &str = "// Code generated by qk. DO NOT EDIT.";

#[derive(Debug, Default, Clone)]
pub struct JavaScriptBackend;

impl JavaScriptBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for JavaScriptBackend {
    fn name(&self) -> &'static str {
        "javascript"
    }

    fn file_extension(&self) -> &'static str {
        "js"
    }

    fn emit_module(
        &self,
        module: &ModulePlan,
        options: &GenerationOptions,
        sink: &mut dyn EmissionSink,
    ) -> Result<()> {
        let scope = ModuleScope::new(module);
        let guarded = self.guarded(options);
        let native = JsEmitter {
            scope: &scope,
            in_metadata: false,
            guarded,
            indent_size: options.indent_size,
        };
        let meta = JsEmitter {
            in_metadata: true,
            ..native
        };

        let mut main: Vec<(Option<UnitKind>, String)> = vec![(None, native.prelude())];
        let mut metadata: Vec<(Option<UnitKind>, String)> = vec![
            (None, meta.prelude()),
            (
                None,
                meta.require(
                    &module_var(&module.module),
                    &format!("../{}", module_path(&module_var(&module.module))),
                    false,
                ),
            ),
        ];
        let mut metadata_statics = Vec::new();

        if module.native_classes().any(|class| class.class_ref.is_some()) {
            main.push((Some(UnitKind::LazyImport), native.metadata_import()));
        }

        for unit in &module.units {
            let kind = Some(unit.kind());
            match unit {
                EmissionUnit::EagerImport(import) | EmissionUnit::LazyImport(import) => {
                    let lazy = unit.is_lazy_import();
                    main.push((kind, native.import(import, lazy)));
                    metadata.push((kind, meta.import(import, lazy)));
                }
                EmissionUnit::NativeClass(class) => {
                    main.push((kind, native.native_class(class)));
                }
                EmissionUnit::DispatchShim(shim) => {
                    main.push((kind, native.shim(shim)));
                }
                EmissionUnit::ReflectionObject(reflection) => {
                    let shim = module.shim_for(&reflection.class);
                    metadata.push((kind, meta.reflection(reflection, shim)));
                }
                EmissionUnit::LazyStatic(lazy) if is_class_static(&lazy.key) => {
                    main.push((kind, native.lazy_static(lazy)));
                }
                EmissionUnit::LazyStatic(lazy) => {
                    metadata_statics.push((kind, meta.lazy_static(lazy)));
                }
                EmissionUnit::RootAggregate(root) => {
                    metadata.push((kind, meta.root(root)));
                }
            }
        }
        metadata.extend(metadata_statics);

        for (dir, declarations) in [
            (module_var(&module.module), main),
            (module.metadata_module.clone(), metadata),
        ] {
            let path = module_path(&dir);
            trace!("javascript: writing {} ({} declarations)", path, declarations.len());
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
