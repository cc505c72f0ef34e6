use itertools::Itertools;
use qk_core::emit::{
    ClassReflection, ConstructShim, DefaultValue, DispatchShim, InvokeShim, LazyStatic,
    ModuleImport, ModuleScope, NativeClass, Receiver, ReturnKind, RootAggregate, StaticInit,
    StaticKey, StaticOwner,
};
use qk_core::ir::{QualifiedName, BOOL, FLOAT, INT, LONG, ROOT_CLASS, STRING, VOID};
use qk_core::names;
use qk_core::pretty::{escape_string, SourceWriter};

pub const CORE: &str = "::DatawireQuarkCore";
pub const ROOT: &str = "Quark";

/// Ruby constants must start with an upper-case letter; derived names keep
/// their exact spelling through a same-named accessor method.
pub fn constant(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn file_path(name: &str) -> String {
    format!("lib/{name}.rb")
}

pub fn ruby_string(input: &str) -> String {
    format!("\"{}\"", escape_string(input).replace('#', "\\#"))
}

fn accessor(name: &str) -> String {
    format!("def self.{}; {}; end", name, constant(name))
}

/// Renders one file of a module: the native namespace or its `_md`
/// metadata namespace.
pub struct RubyEmitter<'a> {
    pub scope: &'a ModuleScope,
    pub in_metadata: bool,
    pub guarded: bool,
    pub indent_size: usize,
}

impl RubyEmitter<'_> {
    fn writer(&self) -> SourceWriter {
        SourceWriter::with_indent_size(self.indent_size)
    }

    pub fn namespace(&self) -> String {
        if self.in_metadata {
            self.scope.metadata_module.clone()
        } else {
            names::flatten(&self.scope.module)
        }
    }

    pub fn class_ref(&self, class: &QualifiedName) -> String {
        if class.as_str() == ROOT_CLASS {
            return format!("{CORE}::QuarkObject");
        }
        match self.scope.module_of(class) {
            Some(module) if *module == self.scope.module && !self.in_metadata => {
                constant(class.simple_name())
            }
            Some(module) => format!(
                "::{ROOT}.{}.{}",
                names::flatten(module),
                class.simple_name()
            ),
            None => format!("::{ROOT}.{}", class),
        }
    }

    fn cast_target(&self, ty: &QualifiedName) -> String {
        match ty.as_str() {
            STRING => "::String".to_string(),
            BOOL => format!("{CORE}::Bool"),
            INT | LONG => "::Integer".to_string(),
            FLOAT => "::Float".to_string(),
            ROOT_CLASS | VOID => "::Object".to_string(),
            _ => self.class_ref(ty),
        }
    }

    pub fn cast(&self, value: &str, ty: &QualifiedName) -> String {
        format!("{CORE}.cast({}) {{ {} }}", value, self.cast_target(ty))
    }

    fn static_owner(&self, key: &StaticKey) -> String {
        match &key.owner {
            StaticOwner::Class(class) => self.class_ref(class),
            StaticOwner::Reflection(class) if self.in_metadata => {
                constant(&names::reflection_type(class))
            }
            StaticOwner::Reflection(class) => {
                let module = self.scope.module_of(class).unwrap_or(&self.scope.module);
                format!(
                    "::{ROOT}.{}.{}",
                    names::metadata_module(module),
                    names::reflection_type(class)
                )
            }
            StaticOwner::Root(module) if self.in_metadata && *module == self.scope.module => {
                names::ROOT_TYPE.to_string()
            }
            StaticOwner::Root(module) => {
                format!("::{ROOT}.{}.{}", names::metadata_module(module), names::ROOT_TYPE)
            }
        }
    }

    pub fn static_ref(&self, key: &StaticKey) -> String {
        format!("{}.{}", self.static_owner(key), key.name)
    }

    pub fn value(&self, value: &DefaultValue) -> String {
        match value {
            DefaultValue::Null => "nil".to_string(),
            DefaultValue::Bool(b) => b.to_string(),
            DefaultValue::Int(i) => i.to_string(),
            DefaultValue::Float(x) => format!("{x:?}"),
            DefaultValue::String(s) => ruby_string(s),
            DefaultValue::New(class) => format!("{}.new", self.class_ref(class)),
            DefaultValue::Static(key) => self.static_ref(key),
            DefaultValue::Deferred(key) => {
                format!("{CORE}.lazy_ref {{ {} }}", self.static_ref(key))
            }
        }
    }

    /// `require`, the outer `Quark` module and this namespace's accessor.
    pub fn prelude(&self) -> String {
        let mut w = self.writer();
        w.line("require \"quark\"");
        w.line(format!("module {ROOT}"));
        w.line(accessor(&self.namespace()));
        w.finish()
    }

    pub fn open(&self) -> String {
        format!("module {}", constant(&self.namespace()))
    }

    pub fn close(&self) -> String {
        let mut w = self.writer();
        w.line(format!("end # module {}", constant(&self.namespace())));
        w.line(format!("end # module {ROOT}"));
        w.finish()
    }

    pub fn import(&self, import: &ModuleImport, lazy: bool) -> String {
        self.require(&names::flatten(&import.target), lazy)
    }

    pub fn require(&self, name: &str, lazy: bool) -> String {
        let mut w = self.writer();
        if lazy {
            w.line(format!(
                "autoload :{}, File.expand_path({}, __dir__)",
                constant(name),
                ruby_string(name)
            ));
            w.line(accessor(name));
        } else {
            w.line(format!("require_relative {}", ruby_string(name)));
        }
        w.finish()
    }

    /// The metadata namespace requires this one back, so it is autoloaded.
    pub fn metadata_import(&self) -> String {
        self.require(&self.scope.metadata_module, true)
    }

    fn def<F>(w: &mut SourceWriter, header: impl AsRef<str>, body: F)
    where
        F: FnOnce(&mut SourceWriter),
    {
        w.blank();
        w.block(format!("def {}", header.as_ref()), "end", body);
    }

    fn when_name<F>(w: &mut SourceWriter, name: &str, body: F)
    where
        F: FnOnce(&mut SourceWriter),
    {
        w.block(format!("if ((name) == ({}))", ruby_string(name)), "end", body);
    }

    pub fn native_class(&self, class: &NativeClass) -> String {
        let simple = class.name.simple_name();
        let name = constant(simple);
        let base = class
            .parents
            .iter()
            .find(|parent| parent.as_str() != ROOT_CLASS)
            .map(|parent| self.class_ref(parent));
        let superclass = base
            .clone()
            .unwrap_or_else(|| format!("{CORE}::QuarkObject"));

        let mut w = self.writer();
        w.line(accessor(simple));
        w.block(format!("class {name} < {superclass}"), "end", |w| {
            if !class.fields.is_empty() {
                w.line(format!(
                    "attr_accessor {}",
                    class.fields.iter().map(|f| format!(":{}", f.name)).join(", ")
                ));
            }
            w.line(format!("extend {CORE}::Static"));
            let params = class
                .constructor
                .iter()
                .map(|p| format!("{} = nil", p.name))
                .join(", ");
            Self::def(w, format!("initialize({params})"), |w| {
                if base.is_some() {
                    w.line("super()");
                }
                w.line("self.__init_fields__");
                for param in &class.constructor {
                    if class.fields.iter().any(|field| field.name == param.name) {
                        w.line(format!("self.{0} = {0}", param.name));
                    }
                }
                w.line("nil");
            });
            Self::def(w, "__init_fields__()", |w| {
                if base.is_some() {
                    w.line("super");
                }
                for field in &class.fields {
                    w.line(format!("self.{} = {}", field.name, self.value(&field.default)));
                }
                w.line("nil");
            });
            for method in &class.methods {
                let params = method.params.iter().map(|p| p.name.as_str()).join(", ");
                let receiver = if method.is_static { "self." } else { "" };
                Self::def(w, format!("{receiver}{}({params})", method.name), |w| {
                    w.line("nil");
                });
            }
        });
        w.finish()
    }

    /// Reopens the native class with its string-keyed accessors.
    pub fn shim(&self, shim: &DispatchShim) -> String {
        let name = constant(shim.class.simple_name());
        let mut w = self.writer();
        w.block(format!("class {name}"), "end", |w| {
            Self::def(w, "_getClass()", |w| {
                w.line(format!("return {}", ruby_string(shim.class.as_str())));
            });
            Self::def(w, "_getField(name)", |w| {
                for getter in &shim.get_field {
                    Self::when_name(w, &getter.field, |w| {
                        w.line(format!("return (self).{}", getter.field));
                    });
                }
                if shim.base.is_some() {
                    w.line("return super(name)");
                } else {
                    w.line("return nil");
                }
            });
            Self::def(w, "_setField(name, value)", |w| {
                for setter in &shim.set_field {
                    Self::when_name(w, &setter.field, |w| {
                        w.line(format!(
                            "(self).{} = {}",
                            setter.field,
                            self.cast("value", &setter.cast)
                        ));
                        if shim.base.is_some() {
                            w.line("return nil");
                        }
                    });
                }
                if shim.base.is_some() {
                    w.line("super(name, value)");
                }
                w.line("nil");
            });
        });
        w.finish()
    }

    fn absent_accessors(w: &mut SourceWriter) {
        Self::def(w, "_getField(name)", |w| {
            w.line("return nil");
        });
        Self::def(w, "_setField(name, value)", |w| {
            w.line("nil");
        });
    }

    fn invoke_body(&self, w: &mut SourceWriter, invoke: &InvokeShim) {
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
        match &invoke.returns {
            ReturnKind::Void => {
                w.line(call);
                w.line("return nil");
            }
            ReturnKind::Value(_) => {
                w.line(format!("return {call}"));
            }
        }
    }

    pub fn reflection(&self, reflection: &ClassReflection, shim: Option<&DispatchShim>) -> String {
        let mut w = self.writer();
        for method in &reflection.methods {
            let name = constant(&method.type_name);
            let params = method
                .parameters
                .iter()
                .map(|p| ruby_string(p.ty.as_str()))
                .join(", ");
            w.line(accessor(&method.type_name));
            w.block(
                format!("class {name} < ::{ROOT}.quark.reflect.Method"),
                "end",
                |w| {
                    Self::def(w, "initialize()", |w| {
                        w.line(format!(
                            "super({}, {}, [{}])",
                            ruby_string(method.returns.as_str()),
                            ruby_string(&method.name),
                            params
                        ));
                        w.line("nil");
                    });
                    let invoke =
                        shim.and_then(|s| s.invoke.iter().find(|i| i.method == method.name));
                    if let Some(invoke) = invoke {
                        Self::def(w, "invoke(object, args)", |w| {
                            self.invoke_body(w, invoke);
                        });
                    }
                    Self::absent_accessors(w);
                },
            );
            w.blank();
        }

        let name = constant(&reflection.type_name);
        w.line(accessor(&reflection.type_name));
        w.block(
            format!("class {name} < ::{ROOT}.quark.reflect.Class"),
            "end",
            |w| {
                w.line(format!("extend {CORE}::Static"));
                Self::def(w, "initialize()", |w| {
                    w.line(format!("super({})", ruby_string(&reflection.name)));
                    w.line(format!("self.name = {}", ruby_string(&reflection.name)));
                    w.line(format!(
                        "self.parameters = [{}]",
                        reflection.parameters.iter().map(|p| ruby_string(p)).join(", ")
                    ));
                    w.line(format!(
                        "self.fields = [{}]",
                        reflection
                            .fields
                            .iter()
                            .map(|f| format!(
                                "::{ROOT}.quark.reflect.Field.new({}, {})",
                                ruby_string(f.ty.as_str()),
                                ruby_string(&f.name)
                            ))
                            .join(", ")
                    ));
                    w.line(format!(
                        "self.methods = [{}]",
                        reflection
                            .methods
                            .iter()
                            .map(|m| format!("{}.new", constant(&m.type_name)))
                            .join(", ")
                    ));
                    w.line(format!(
                        "self.parents = [{}]",
                        reflection
                            .parents
                            .iter()
                            .map(|p| ruby_string(p.as_str()))
                            .join(", ")
                    ));
                    w.line("nil");
                });
                if let Some(ConstructShim::Native { class, args }) = shim.map(|s| &s.construct) {
                    let args = args
                        .iter()
                        .map(|arg| self.cast(&format!("args[{}]", arg.index), &arg.ty))
                        .join(", ");
                    Self::def(w, "construct(args)", |w| {
                        w.line(format!("return {}.new({})", self.class_ref(class), args));
                    });
                }
                Self::def(w, "isAbstract()", |w| {
                    w.line(format!("return {}", reflection.is_abstract));
                });
                Self::absent_accessors(w);
            },
        );
        w.finish()
    }

    pub fn lazy_static(&self, lazy: &LazyStatic) -> String {
        let init = match &lazy.init {
            StaticInit::ReflectionSingleton {
                reflection_type, ..
            } => format!("{}.new", constant(reflection_type)),
            StaticInit::Alias(target) => self.static_ref(target),
            StaticInit::Value(value) => self.value(value),
        };
        let register = if self.guarded {
            "guarded_static"
        } else {
            "static"
        };
        format!(
            "{}.{} {}: -> {{ {} }}",
            self.static_owner(&lazy.key),
            register,
            lazy.key.name,
            init
        )
    }

    pub fn root(&self, root: &RootAggregate) -> String {
        let name = names::ROOT_TYPE;
        let mut w = self.writer();
        w.line(accessor(name));
        w.block(format!("class {name} < {CORE}::QuarkObject"), "end", |w| {
            w.line(format!("extend {CORE}::Static"));
            Self::def(w, "_getField(name)", |w| {
                for entry in &root.entries {
                    Self::when_name(w, &entry.name, |w| {
                        w.line(format!("return {name}.{}", entry.name));
                    });
                }
                w.line("return nil");
            });
            Self::def(w, "_setField(name, value)", |w| {
                w.line("nil");
            });
        });
        w.finish()
    }
}
