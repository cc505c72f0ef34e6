//! Ruby backend.
//!
//! Each module becomes `lib/<module>.rb` and `lib/<module>_md.rb`, both
//! nested under the `Quark` namespace and reached through lower-case
//! accessor methods so derived names keep their exact spelling.

pub mod emitter;

use qk_core::config::GenerationOptions;
use qk_core::emit::{
    is_class_static, Backend, EmissionSink, EmissionUnit, ModulePlan, ModuleScope, UnitKind,
};
use qk_core::names;
use qk_core::Result;
use tracing::trace;

use crate::emitter::{file_path, RubyEmitter};

pub const HEADER: &str = "# Code generated by qk. DO NOT EDIT.";

type Declarations = Vec<(Option<UnitKind>, String)>;

#[derive(Debug, Default, Clone)]
pub struct RubyBackend;

impl RubyBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for RubyBackend {
    fn name(&self) -> &'static str {
        "ruby"
    }

    fn file_extension(&self) -> &'static str {
        "rb"
    }

    fn emit_module(
        &self,
        module: &ModulePlan,
        options: &GenerationOptions,
        sink: &mut dyn EmissionSink,
    ) -> Result<()> {
        let scope = ModuleScope::new(module);
        let native = RubyEmitter {
            scope: &scope,
            in_metadata: false,
            guarded: self.guarded(options),
            indent_size: options.indent_size,
        };
        let meta = RubyEmitter {
            in_metadata: true,
            ..native
        };

        let mut main_imports: Declarations = Vec::new();
        let mut metadata_imports: Declarations = vec![(
            Some(UnitKind::EagerImport),
            meta.require(&names::flatten(&module.module), false),
        )];
        let mut main: Declarations = Vec::new();
        let mut metadata: Declarations = Vec::new();
        let mut metadata_statics: Declarations = Vec::new();

        if module.native_classes().any(|class| class.class_ref.is_some()) {
            main_imports.push((Some(UnitKind::LazyImport), native.metadata_import()));
        }

        for unit in &module.units {
            let kind = Some(unit.kind());
            match unit {
                EmissionUnit::EagerImport(import) | EmissionUnit::LazyImport(import) => {
                    let lazy = unit.is_lazy_import();
                    main_imports.push((kind, native.import(import, lazy)));
                    metadata_imports.push((kind, meta.import(import, lazy)));
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

        for (emitter, imports, body) in [
            (&native, main_imports, main),
            (&meta, metadata_imports, metadata),
        ] {
            let path = file_path(&emitter.namespace());
            trace!("ruby: writing {} ({} declarations)", path, body.len());
            sink.begin_file(path);
            if options.emit_header {
                sink.declaration(None, HEADER.to_string());
            }
            sink.declaration(None, emitter.prelude());
            for (kind, text) in imports {
                sink.declaration(kind, text);
            }
            sink.declaration(None, emitter.open());
            for (kind, text) in body {
                sink.declaration(kind, text);
            }
            sink.declaration(None, emitter.close());
        }
        Ok(())
    }
}
