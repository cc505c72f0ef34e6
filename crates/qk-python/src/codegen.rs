use itertools::Itertools;
use qk_core::emit::{
    ClassReflection, ConstructShim, DefaultValue, DispatchShim, InvokeShim, LazyStatic,
    ModuleImport, ModuleScope, NativeClass, Receiver, ReturnKind, RootAggregate, StaticInit,
    StaticKey, StaticOwner,
};
use qk_core::ir::{QualifiedName, BOOL, FLOAT, INT, LONG, ROOT_CLASS, STRING, VOID};
use qk_core::names;
use qk_core::pretty::{quote, SourceWriter};

/// Package holding a module's native classes.
pub fn package_name(module: &QualifiedName) -> String {
    names::flatten(module)
}

pub fn package_path(package: &str) -> String {
    format!("{package}/__init__.py")
}

/// Header line and an indented body, without a closing line.
fn suite<F>(w: &mut SourceWriter, header: impl AsRef<str>, body: F)
where
    F: FnOnce(&mut SourceWriter),
{
    w.line(header);
    w.with_indent(body);
}

/// Generates Python source for the units of one package.
pub struct PythonGenerator<'a> {
    pub scope: &'a ModuleScope,
    pub in_metadata: bool,
    pub guarded: bool,
    pub indent_size: usize,
}

impl PythonGenerator<'_> {
    fn writer(&self) -> SourceWriter {
        SourceWriter::with_indent_size(self.indent_size)
    }

    pub fn class_ref(&self, class: &QualifiedName) -> String {
        match self.scope.module_of(class) {
            Some(module) if *module == self.scope.module && !self.in_metadata => {
                class.simple_name().to_string()
            }
            Some(module) => format!("{}.{}", package_name(module), class.simple_name()),
            None => class.to_string(),
        }
    }

    fn render_type(&self, ty: &QualifiedName) -> String {
        match ty.as_str() {
            STRING => "str".to_string(),
            BOOL => "bool".to_string(),
            INT | LONG => "int".to_string(),
            FLOAT => "float".to_string(),
            ROOT_CLASS | VOID => "object".to_string(),
            _ => self.class_ref(ty),
        }
    }

    pub fn cast(&self, value: &str, ty: &QualifiedName) -> String {
        format!("_qrt.cast({}, lambda: {})", value, self.render_type(ty))
    }

    fn static_owner(&self, key: &StaticKey) -> String {
        match &key.owner {
            StaticOwner::Class(class) => self.class_ref(class),
            StaticOwner::Reflection(class) if self.in_metadata => names::reflection_type(class),
            StaticOwner::Reflection(class) => {
                let module = self.scope.module_of(class).unwrap_or(&self.scope.module);
                format!(
                    "{}.{}",
                    names::metadata_module(module),
                    names::reflection_type(class)
                )
            }
            StaticOwner::Root(module) if self.in_metadata && *module == self.scope.module => {
                names::ROOT_TYPE.to_string()
            }
            StaticOwner::Root(module) => {
                format!("{}.{}", names::metadata_module(module), names::ROOT_TYPE)
            }
        }
    }

    pub fn static_ref(&self, key: &StaticKey) -> String {
        format!("{}.{}", self.static_owner(key), key.name)
    }

    pub fn render_value(&self, value: &DefaultValue) -> String {
        match value {
            DefaultValue::Null => "None".to_string(),
            DefaultValue::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            DefaultValue::Int(i) => i.to_string(),
            DefaultValue::Float(x) => format!("{x:?}"),
            DefaultValue::String(s) => quote(s),
            DefaultValue::New(class) => format!("{}()", self.class_ref(class)),
            DefaultValue::Static(key) => self.static_ref(key),
            DefaultValue::Deferred(key) => format!("_qrt.lazy_ref(lambda: {})", self.static_ref(key)),
        }
    }

    pub fn render_imports(&self, own_package: Option<&str>) -> String {
        let mut w = self.writer();
        w.line("import quark");
        w.line("import quark_runtime as _qrt");
        if let Some(package) = own_package {
            w.line(format!("import {package}"));
        }
        w.finish()
    }

    pub fn render_import(&self, import: &ModuleImport, lazy: bool) -> String {
        let package = package_name(&import.target);
        if lazy {
            format!("{package} = _qrt.lazy_import({})", quote(&package))
        } else {
            format!("import {package}")
        }
    }

    /// The metadata package imports this one, so it is always bound lazily.
    pub fn render_metadata_import(&self) -> String {
        let package = &self.scope.metadata_module;
        format!("{package} = _qrt.lazy_import({})", quote(package))
    }

    pub fn render_class(&self, class: &NativeClass) -> String {
        let name = class.name.simple_name();
        let base = class
            .parents
            .iter()
            .filter(|parent| parent.as_str() != ROOT_CLASS)
            .map(|parent| self.class_ref(parent))
            .collect::<Vec<_>>();
        let has_base = !base.is_empty();
        let bases = if has_base {
            base.join(", ")
        } else {
            "quark.Object".to_string()
        };

        let mut w = self.writer();
        w.block(format!("class {name}({bases}):"), "", |w| {
            let params = std::iter::once("self".to_string())
                .chain(class.constructor.iter().map(|p| format!("{}=None", p.name)))
                .join(", ");
            w.block(format!("def __init__({params}):"), "", |w| {
                w.line("self._init_fields()");
                for param in &class.constructor {
                    if class.fields.iter().any(|field| field.name == param.name) {
                        w.line(format!("self.{0} = {0}", param.name));
                    }
                }
            });
            w.block("def _init_fields(self):", "", |w| {
                if has_base {
                    w.line("super()._init_fields()");
                }
                for field in &class.fields {
                    w.line(format!("self.{} = {}", field.name, self.render_value(&field.default)));
                }
                if !has_base && class.fields.is_empty() {
                    w.line("pass");
                }
            });
            for method in &class.methods {
                let receiver = if method.is_static {
                    w.line("@staticmethod");
                    None
                } else {
                    Some("self".to_string())
                };
                let params = receiver
                    .into_iter()
                    .chain(method.params.iter().map(|p| p.name.clone()))
                    .join(", ");
                w.block(format!("def {}({}):", method.name, params), "", |w| {
                    w.line("pass");
                });
            }
        });
        w.finish()
    }

    pub fn render_shim(&self, shim: &DispatchShim) -> String {
        let name = shim.class.simple_name();
        let base = shim.base.as_ref().map(|base| self.class_ref(base));
        let mut w = self.writer();
        w.block(format!("def _{name}__getClass(self):"), "", |w| {
            w.line(format!("return {}", quote(shim.class.as_str())));
        });
        w.block(format!("def _{name}__getField(self, name):"), "", |w| {
            for getter in &shim.get_field {
                suite(w, format!("if name == {}:", quote(&getter.field)), |w| {
                    w.line(format!("return self.{}", getter.field));
                });
            }
            match &base {
                Some(base) => w.line(format!("return {base}._getField(self, name)")),
                None => w.line("return None"),
            };
        });
        w.block(format!("def _{name}__setField(self, name, value):"), "", |w| {
            for setter in &shim.set_field {
                suite(w, format!("if name == {}:", quote(&setter.field)), |w| {
                    w.line(format!(
                        "self.{} = {}",
                        setter.field,
                        self.cast("value", &setter.cast)
                    ));
                    if base.is_some() {
                        w.line("return");
                    }
                });
            }
            if let Some(base) = &base {
                w.line(format!("{base}._setField(self, name, value)"));
            } else if shim.set_field.is_empty() {
                w.line("pass");
            }
        });
        for accessor in ["_getClass", "_getField", "_setField"] {
            w.line(format!("{name}.{accessor} = _{name}_{accessor}"));
        }
        w.finish()
    }

    fn render_absent_accessors(w: &mut SourceWriter) {
        w.block("def _getField(self, name):", "", |w| {
            w.line("return None");
        });
        w.block("def _setField(self, name, value):", "", |w| {
            w.line("pass");
        });
    }

    fn render_invoke(&self, w: &mut SourceWriter, invoke: &InvokeShim) {
        let target = match &invoke.receiver {
            Receiver::Instance { cast } => {
                w.line(format!("obj = {}", self.cast("object", cast)));
                "obj".to_string()
            }
            Receiver::Static { class } => self.class_ref(class),
        };
        let args = invoke
            .args
            .iter()
            .map(|arg| self.cast(&format!("args[{}]", arg.index), &arg.ty))
            .join(", ");
        let call = format!("{}.{}({})", target, invoke.method, args);
        match invoke.returns {
            ReturnKind::Void => {
                w.line(call);
                w.line("return None");
            }
            ReturnKind::Value(_) => {
                w.line(format!("return {call}"));
            }
        }
    }

    pub fn render_reflection(
        &self,
        reflection: &ClassReflection,
        shim: Option<&DispatchShim>,
    ) -> String {
        let mut w = self.writer();
        for method in &reflection.methods {
            let params = method
                .parameters
                .iter()
                .map(|p| quote(p.ty.as_str()))
                .join(", ");
            w.block(
                format!("class {}(quark.reflect.Method):", method.type_name),
                "",
                |w| {
                    w.block("def __init__(self):", "", |w| {
                        w.line(format!(
                            "super().__init__({}, {}, [{}])",
                            quote(method.returns.as_str()),
                            quote(&method.name),
                            params
                        ));
                    });
                    let invoke = shim.and_then(|s| s.invoke.iter().find(|i| i.method == method.name));
                    if let Some(invoke) = invoke {
                        w.block("def invoke(self, object, args):", "", |w| {
                            self.render_invoke(w, invoke);
                        });
                    }
                    Self::render_absent_accessors(w);
                },
            );
        }

        let name = &reflection.type_name;
        w.block(format!("class {name}(quark.reflect.Class):"), "", |w| {
            w.block("def __init__(self):", "", |w| {
                w.line(format!("super().__init__({})", quote(&reflection.name)));
                w.line(format!("self.name = {}", quote(&reflection.name)));
                w.line(format!(
                    "self.parameters = [{}]",
                    reflection.parameters.iter().map(|p| quote(p)).join(", ")
                ));
                w.line(format!(
                    "self.fields = [{}]",
                    reflection
                        .fields
                        .iter()
                        .map(|f| format!(
                            "quark.reflect.Field({}, {})",
                            quote(f.ty.as_str()),
                            quote(&f.name)
                        ))
                        .join(", ")
                ));
                w.line(format!(
                    "self.methods = [{}]",
                    reflection
                        .methods
                        .iter()
                        .map(|m| format!("{}()", m.type_name))
                        .join(", ")
                ));
                w.line(format!(
                    "self.parents = [{}]",
                    reflection.parents.iter().map(|p| quote(p.as_str())).join(", ")
                ));
            });
            if let Some(ConstructShim::Native { class, args }) = shim.map(|s| &s.construct) {
                let args = args
                    .iter()
                    .map(|arg| self.cast(&format!("args[{}]", arg.index), &arg.ty))
                    .join(", ");
                w.block("def construct(self, args):", "", |w| {
                    w.line(format!("return {}({})", self.class_ref(class), args));
                });
            }
            w.block("def isAbstract(self):", "", |w| {
                w.line(if reflection.is_abstract {
                    "return True"
                } else {
                    "return False"
                });
            });
            Self::render_absent_accessors(w);
        });
        w.finish()
    }

    pub fn render_static(&self, lazy: &LazyStatic) -> String {
        let init = match &lazy.init {
            StaticInit::ReflectionSingleton {
                reflection_type, ..
            } => format!("{reflection_type}()"),
            StaticInit::Alias(target) => self.static_ref(target),
            StaticInit::Value(value) => self.render_value(value),
        };
        let register = if self.guarded {
            "guarded_static"
        } else {
            "lazy_static"
        };
        format!(
            "_qrt.{}({}, {}, lambda: {})",
            register,
            self.static_owner(&lazy.key),
            quote(&lazy.key.name),
            init
        )
    }

    pub fn render_root(&self, root: &RootAggregate) -> String {
        let name = names::ROOT_TYPE;
        let mut w = self.writer();
        w.block(format!("class {name}(object):"), "", |w| {
            w.block("def _getField(self, name):", "", |w| {
                for entry in &root.entries {
                    suite(w, format!("if name == {}:", quote(&entry.name)), |w| {
                        w.line(format!("return {name}.{}", entry.name));
                    });
                }
                w.line("return None");
            });
            w.block("def _setField(self, name, value):", "", |w| {
                w.line("pass");
            });
        });
        w.finish()
    }
}
