use itertools::Itertools;
use qk_core::emit::{
    ClassReflection, ConstructShim, DefaultValue, DispatchShim, InvokeShim, LazyStatic,
    ModuleImport, ModuleScope, NativeClass, Receiver, ReturnKind, RootAggregate, StaticInit,
    StaticKey, StaticOwner,
};
use qk_core::ir::{QualifiedName, BOOL, FLOAT, INT, LONG, ROOT_CLASS, STRING, VOID};
use qk_core::names;
use qk_core::pretty::{quote, SourceWriter};

pub const RUNTIME: &str = "quark/quark_runtime.js";

pub fn module_var(module: &QualifiedName) -> String {
    names::flatten(module)
}

/// `<dir>/index.js` relative to the output root.
pub fn module_path(dir: &str) -> String {
    format!("{dir}/index.js")
}

fn require_path(dir: &str) -> String {
    format!("../{}", module_path(dir))
}

/// Renders units for one file of a module. `in_metadata` selects the
/// metadata file, where the module's own classes are reached through the
/// module import.
pub struct JsEmitter<'a> {
    pub scope: &'a ModuleScope,
    pub in_metadata: bool,
    pub guarded: bool,
    pub indent_size: usize,
}

impl JsEmitter<'_> {
    fn writer(&self) -> SourceWriter {
        SourceWriter::with_indent_size(self.indent_size)
    }

    pub fn class_ref(&self, class: &QualifiedName) -> String {
        match self.scope.module_of(class) {
            Some(module) if *module == self.scope.module && !self.in_metadata => {
                class.simple_name().to_string()
            }
            Some(module) => format!("{}.{}", module_var(module), class.simple_name()),
            None => class.to_string(),
        }
    }

    fn cast_target(&self, ty: &QualifiedName) -> String {
        match ty.as_str() {
            STRING => "String".to_string(),
            BOOL => "Boolean".to_string(),
            INT | LONG | FLOAT => "Number".to_string(),
            ROOT_CLASS | VOID => "Object".to_string(),
            _ => self.class_ref(ty),
        }
    }

    pub fn cast(&self, value: &str, ty: &QualifiedName) -> String {
        format!(
            "_qrt.cast({}, function () {{ return {}; }})",
            value,
            self.cast_target(ty)
        )
    }

    fn static_owner(&self, key: &StaticKey) -> String {
        match &key.owner {
            StaticOwner::Class(class) => self.class_ref(class),
            StaticOwner::Reflection(class) if self.in_metadata => names::reflection_type(class),
            StaticOwner::Reflection(class) => format!(
                "{}.{}",
                self.metadata_var_of(class),
                names::reflection_type(class)
            ),
            StaticOwner::Root(module) if self.in_metadata && *module == self.scope.module => {
                names::ROOT_TYPE.to_string()
            }
            StaticOwner::Root(module) => {
                format!("{}.{}", names::metadata_module(module), names::ROOT_TYPE)
            }
        }
    }

    fn metadata_var_of(&self, class: &QualifiedName) -> String {
        let module = self.scope.module_of(class).unwrap_or(&self.scope.module);
        names::metadata_module(module)
    }

    pub fn static_ref(&self, key: &StaticKey) -> String {
        format!("{}.{}", self.static_owner(key), key.name)
    }

    pub fn value(&self, value: &DefaultValue) -> String {
        match value {
            DefaultValue::Null => "null".to_string(),
            DefaultValue::Bool(b) => b.to_string(),
            DefaultValue::Int(i) => i.to_string(),
            DefaultValue::Float(x) => format!("{x:?}"),
            DefaultValue::String(s) => quote(s),
            DefaultValue::New(class) => format!("new {}()", self.class_ref(class)),
            DefaultValue::Static(key) => self.static_ref(key),
            DefaultValue::Deferred(key) => {
                format!("_qrt.lazyRef(function () {{ return {}; }})", self.static_ref(key))
            }
        }
    }

    pub fn prelude(&self) -> String {
        let mut w = self.writer();
        w.line(format!("var _qrt = require({});", quote(RUNTIME)));
        w.line("var quark = require('quark').quark;");
        w.finish()
    }

    pub fn import(&self, import: &ModuleImport, lazy: bool) -> String {
        let var = module_var(&import.target);
        let path = require_path(&module_var(&import.target));
        self.require(&var, &path, lazy)
    }

    pub fn require(&self, var: &str, path: &str, lazy: bool) -> String {
        let mut w = self.writer();
        if lazy {
            w.block(
                format!("var {var}; _qrt.lazyImport('{path}', function(){{"),
                "});",
                |w| {
                    w.line(format!("{var} = require('{path}');"));
                },
            );
        } else {
            w.line(format!("var {var} = require('{path}');"));
        }
        w.finish()
    }

    /// Lazy handle on the metadata module, which itself requires this one.
    pub fn metadata_import(&self) -> String {
        let dir = &self.scope.metadata_module;
        self.require(dir, &require_path(dir), true)
    }

    fn base_class<'c>(&self, class: &'c NativeClass) -> Option<&'c QualifiedName> {
        class.parents.iter().find(|parent| parent.as_str() != ROOT_CLASS)
    }

    pub fn native_class(&self, class: &NativeClass) -> String {
        let name = class.name.simple_name();
        let base = self.base_class(class).map(|parent| self.class_ref(parent));
        let mut w = self.writer();
        w.line(format!("// CLASS {name}"));
        let params = class.constructor.iter().map(|p| p.name.as_str()).join(", ");
        w.block(format!("function {name}({params}) {{"), "}", |w| {
            if base.is_some() {
                w.line(format!("{name}.super_.call(this);"));
            }
            w.line("this.__init_fields__();");
            for param in &class.constructor {
                if class.fields.iter().any(|field| field.name == param.name) {
                    w.line(format!("this.{0} = {0};", param.name));
                }
            }
        });
        w.line(format!("exports.{name} = {name};"));
        if let Some(base) = &base {
            w.line(format!("_qrt.util.inherits({name}, {base});"));
        }
        w.blank();
        w.block(format!("function {name}__init_fields__() {{"), "}", |w| {
            if let Some(base) = &base {
                w.line(format!("{base}.prototype.__init_fields__.call(this);"));
            }
            for field in &class.fields {
                w.line(format!("this.{} = {};", field.name, self.value(&field.default)));
            }
        });
        w.line(format!("{name}.prototype.__init_fields__ = {name}__init_fields__;"));
        for method in &class.methods {
            w.blank();
            let params = method.params.iter().map(|p| p.name.as_str()).join(", ");
            w.line(format!("function {name}_{}({params}) {{}}", method.name));
            if method.is_static {
                w.line(format!("{name}.{0} = {name}_{0};", method.name));
            } else {
                w.line(format!("{name}.prototype.{0} = {name}_{0};", method.name));
            }
        }
        w.finish()
    }

    pub fn shim(&self, shim: &DispatchShim) -> String {
        let name = shim.class.simple_name();
        let base = shim.base.as_ref().map(|base| self.class_ref(base));
        let mut w = self.writer();
        w.block(format!("function {name}__getClass() {{"), "}", |w| {
            w.line(format!("return {};", quote(shim.class.as_str())));
        });
        w.line(format!("{name}.prototype._getClass = {name}__getClass;"));
        w.blank();
        w.block(format!("function {name}__getField(name) {{"), "}", |w| {
            for getter in &shim.get_field {
                w.block(format!("if (name === {}) {{", quote(&getter.field)), "}", |w| {
                    w.line(format!("return this.{};", getter.field));
                });
            }
            match &base {
                Some(base) => w.line(format!("return {base}.prototype._getField.call(this, name);")),
                None => w.line("return null;"),
            };
        });
        w.line(format!("{name}.prototype._getField = {name}__getField;"));
        w.blank();
        w.block(format!("function {name}__setField(name, value) {{"), "}", |w| {
            for setter in &shim.set_field {
                w.block(format!("if (name === {}) {{", quote(&setter.field)), "}", |w| {
                    w.line(format!(
                        "this.{} = {};",
                        setter.field,
                        self.cast("value", &setter.cast)
                    ));
                    if base.is_some() {
                        w.line("return;");
                    }
                });
            }
            if let Some(base) = &base {
                w.line(format!("{base}.prototype._setField.call(this, name, value);"));
            }
        });
        w.line(format!("{name}.prototype._setField = {name}__setField;"));
        w.finish()
    }

    fn absent_accessors(w: &mut SourceWriter, name: &str) {
        w.blank();
        w.block(format!("function {name}__getField(name) {{"), "}", |w| {
            w.line("return null;");
        });
        w.line(format!("{name}.prototype._getField = {name}__getField;"));
        w.blank();
        w.line(format!("function {name}__setField(name, value) {{}}"));
        w.line(format!("{name}.prototype._setField = {name}__setField;"));
    }

    fn invoke_body(&self, w: &mut SourceWriter, invoke: &InvokeShim) {
        let target = match &invoke.receiver {
            Receiver::Instance { cast } => {
                w.line(format!("var obj = {};", self.cast("object", cast)));
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
                w.line(format!("{call};"));
                w.line("return null;");
            }
            ReturnKind::Value(_) => {
                w.line(format!("return {call};"));
            }
        }
    }

    pub fn reflection(&self, reflection: &ClassReflection, shim: Option<&DispatchShim>) -> String {
        let mut w = self.writer();
        for method in &reflection.methods {
            let name = &method.type_name;
            w.line(format!("// CLASS {name}"));
            w.blank();
            let params = method
                .parameters
                .iter()
                .map(|p| quote(p.ty.as_str()))
                .join(", ");
            w.block(format!("function {name}() {{"), "}", |w| {
                w.line(format!(
                    "{name}.super_.call(this, {}, {}, [{}]);",
                    quote(method.returns.as_str()),
                    quote(&method.name),
                    params
                ));
            });
            w.line(format!("exports.{name} = {name};"));
            w.line(format!("_qrt.util.inherits({name}, quark.reflect.Method);"));
            if let Some(invoke) = shim.and_then(|s| s.invoke.iter().find(|i| i.method == method.name)) {
                w.blank();
                w.block(format!("function {name}_invoke(object, args) {{"), "}", |w| {
                    self.invoke_body(w, invoke);
                });
                w.line(format!("{name}.prototype.invoke = {name}_invoke;"));
            }
            Self::absent_accessors(&mut w, name);
            w.blank();
        }

        let name = &reflection.type_name;
        w.line(format!("// CLASS {name}"));
        w.blank();
        w.block(format!("function {name}() {{"), "}", |w| {
            w.line(format!("{name}.super_.call(this, {});", quote(&reflection.name)));
            w.line(format!("this.name = {};", quote(&reflection.name)));
            w.line(format!(
                "this.parameters = [{}];",
                reflection.parameters.iter().map(|p| quote(p)).join(", ")
            ));
            w.line(format!(
                "this.fields = [{}];",
                reflection
                    .fields
                    .iter()
                    .map(|f| format!(
                        "new quark.reflect.Field({}, {})",
                        quote(f.ty.as_str()),
                        quote(&f.name)
                    ))
                    .join(", ")
            ));
            w.line(format!(
                "this.methods = [{}];",
                reflection
                    .methods
                    .iter()
                    .map(|m| format!("new {}()", m.type_name))
                    .join(", ")
            ));
            w.line(format!(
                "this.parents = [{}];",
                reflection.parents.iter().map(|p| quote(p.as_str())).join(", ")
            ));
        });
        w.line(format!("exports.{name} = {name};"));
        w.line(format!("_qrt.util.inherits({name}, quark.reflect.Class);"));
        if let Some(ConstructShim::Native { class, args }) = shim.map(|s| &s.construct) {
            let args = args
                .iter()
                .map(|arg| self.cast(&format!("args[{}]", arg.index), &arg.ty))
                .join(", ");
            w.blank();
            w.block(format!("function {name}_construct(args) {{"), "}", |w| {
                w.line(format!("return new {}({});", self.class_ref(class), args));
            });
            w.line(format!("{name}.prototype.construct = {name}_construct;"));
        }
        w.blank();
        w.block(format!("function {name}_isAbstract() {{"), "}", |w| {
            w.line(format!("return {};", reflection.is_abstract));
        });
        w.line(format!("{name}.prototype.isAbstract = {name}_isAbstract;"));
        Self::absent_accessors(&mut w, name);
        w.finish()
    }

    pub fn lazy_static(&self, lazy: &LazyStatic) -> String {
        let init = match &lazy.init {
            StaticInit::ReflectionSingleton {
                reflection_type, ..
            } => format!("new {reflection_type}()"),
            StaticInit::Alias(target) => self.static_ref(target),
            StaticInit::Value(value) => self.value(value),
        };
        let register = if self.guarded {
            "guardedStatic"
        } else {
            "lazyStatic"
        };
        let mut w = self.writer();
        w.block(
            format!(
                "_qrt.{}({}, {}, function () {{",
                register,
                self.static_owner(&lazy.key),
                quote(&lazy.key.name)
            ),
            "});",
            |w| {
                w.line(format!("return {init};"));
            },
        );
        w.finish()
    }

    pub fn root(&self, root: &RootAggregate) -> String {
        let name = names::ROOT_TYPE;
        let mut w = self.writer();
        w.line(format!("// CLASS {name}"));
        w.line(format!("function {name}() {{}}"));
        w.line(format!("exports.{name} = {name};"));
        w.blank();
        w.block(format!("function {name}__getField(name) {{"), "}", |w| {
            for entry in &root.entries {
                w.block(format!("if (name === {}) {{", quote(&entry.name)), "}", |w| {
                    w.line(format!("return {name}.{};", entry.name));
                });
            }
            w.line("return null;");
        });
        w.line(format!("{name}.prototype._getField = {name}__getField;"));
        w.blank();
        w.line(format!("function {name}__setField(name, value) {{}}"));
        w.line(format!("{name}.prototype._setField = {name}__setField;"));
        w.finish()
    }
}
