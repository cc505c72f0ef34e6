use itertools::Itertools;
use qk_core::emit::{
    ClassReflection, ConstructShim, DefaultValue, DispatchShim, InvokeShim, LazyStatic,
    MethodReflection, ModuleScope, NativeClass, Receiver, ReturnKind, RootAggregate, StaticInit,
    StaticKey, StaticOwner,
};
use qk_core::ir::{
    MethodDescriptor, QualifiedName, BOOL, FLOAT, INT, LONG, REFLECT_CLASS, REFLECT_FIELD,
    REFLECT_METHOD, ROOT_CLASS, STRING, VOID,
};
use qk_core::names;
use qk_core::pretty::{quote, SourceWriter};

pub const QOBJECT: &str = "io.datawire.quark.runtime.QObject";
pub const BUILTINS: &str = "io.datawire.quark.runtime.Builtins";
const ARGS: &str = "java.util.ArrayList<Object>";

/// `a/b/C.java` for `a.b.C`.
pub fn source_path(class: &str) -> String {
    format!("{}.java", class.replace('.', "/"))
}

pub fn package_line(class: &QualifiedName) -> Option<String> {
    class.namespace().map(|ns| format!("package {ns};"))
}

fn list(element: &str, items: impl IntoIterator<Item = String>) -> String {
    format!(
        "new java.util.ArrayList<{element}>(java.util.Arrays.asList(new {element}[]{{{}}}))",
        items.into_iter().join(", ")
    )
}

fn name_matches(name: &str) -> String {
    let name = quote(name);
    format!("if ((name)==({name}) || ((name) != null && (name).equals({name})))")
}

/// Renders whole class files. Every name is fully qualified, so the
/// emitter never needs import statements.
pub struct JavaEmitter<'a> {
    pub scope: &'a ModuleScope,
    pub indent_size: usize,
}

impl JavaEmitter<'_> {
    fn writer(&self) -> SourceWriter {
        SourceWriter::with_indent_size(self.indent_size)
    }

    pub fn java_type(&self, ty: &QualifiedName) -> String {
        match ty.as_str() {
            STRING => "String".to_string(),
            BOOL => "Boolean".to_string(),
            INT => "Integer".to_string(),
            LONG => "Long".to_string(),
            FLOAT => "Double".to_string(),
            ROOT_CLASS => "Object".to_string(),
            VOID => "void".to_string(),
            _ => ty.to_string(),
        }
    }

    pub fn cast(&self, value: &str, ty: &QualifiedName) -> String {
        format!("({}) ({})", self.java_type(ty), value)
    }

    /// Fully qualified class the reflection type of `class` is generated as.
    pub fn reflection_class(&self, class: &QualifiedName) -> String {
        let module = self.scope.module_of(class).unwrap_or(&self.scope.module);
        format!(
            "{}.{}",
            names::metadata_module(module),
            names::reflection_type(class)
        )
    }

    pub fn static_owner(&self, key: &StaticKey) -> String {
        match &key.owner {
            StaticOwner::Class(class) => class.to_string(),
            StaticOwner::Reflection(class) => self.reflection_class(class),
            StaticOwner::Root(module) => {
                format!("{}.{}", names::metadata_module(module), names::ROOT_TYPE)
            }
        }
    }

    pub fn static_ref(&self, key: &StaticKey) -> String {
        format!("{}.{}()", self.static_owner(key), key.name)
    }

    pub fn value(&self, value: &DefaultValue, ty: Option<&QualifiedName>) -> String {
        match value {
            DefaultValue::Null => "null".to_string(),
            DefaultValue::Bool(b) => b.to_string(),
            DefaultValue::Int(i) if ty.is_some_and(|ty| ty.as_str() == LONG) => format!("{i}L"),
            DefaultValue::Int(i) => i.to_string(),
            DefaultValue::Float(x) => format!("{x:?}"),
            DefaultValue::String(s) => quote(s),
            DefaultValue::New(class) => format!("new {class}()"),
            DefaultValue::Static(key) => self.static_ref(key),
            DefaultValue::Deferred(key) => {
                format!("{BUILTINS}.deferred(() -> {})", self.static_ref(key))
            }
        }
    }

    /// Declared type of a lazy static's accessor.
    pub fn static_type(&self, lazy: &LazyStatic, class: Option<&NativeClass>) -> String {
        match (&lazy.key.owner, &lazy.init) {
            (_, StaticInit::ReflectionSingleton { class: reflected, .. }) => {
                self.reflection_class(reflected)
            }
            (StaticOwner::Root(_), _) => REFLECT_CLASS.to_string(),
            (StaticOwner::Class(_), StaticInit::Alias(target))
                if matches!(target.owner, StaticOwner::Root(_)) =>
            {
                REFLECT_CLASS.to_string()
            }
            _ => class
                .and_then(|class| class.statics.iter().find(|f| f.name == lazy.key.name))
                .map(|field| self.java_type(&field.ty))
                .unwrap_or_else(|| "Object".to_string()),
        }
    }

    /// Run-once holder behind a synchronized accessor.
    fn holder(
        &self,
        w: &mut SourceWriter,
        lazy: &LazyStatic,
        ty: &str,
        field_ty: Option<&QualifiedName>,
    ) {
        let name = &lazy.key.name;
        let init = match &lazy.init {
            StaticInit::ReflectionSingleton { class, .. } => {
                format!("new {}()", self.reflection_class(class))
            }
            StaticInit::Alias(target) => self.static_ref(target),
            StaticInit::Value(value) => self.value(value, field_ty),
        };
        w.line(format!("private static {ty} {name}__value;"));
        w.line(format!("private static boolean {name}__ready;"));
        w.block(format!("public static synchronized {ty} {name}() {{"), "}", |w| {
            w.block(format!("if (!{name}__ready) {{"), "}", |w| {
                w.line(format!("{name}__value = {init};"));
                w.line(format!("{name}__ready = true;"));
            });
            w.line(format!("return {name}__value;"));
        });
    }

    fn statics(&self, w: &mut SourceWriter, statics: &[&LazyStatic], class: Option<&NativeClass>) {
        for lazy in statics {
            let ty = self.static_type(lazy, class);
            let field_ty = class
                .and_then(|class| class.statics.iter().find(|f| f.name == lazy.key.name))
                .map(|field| &field.ty);
            self.holder(w, lazy, &ty, field_ty);
        }
    }

    fn method_stub(&self, w: &mut SourceWriter, method: &MethodDescriptor) {
        let returns = self.java_type(&method.returns);
        let modifiers = if method.is_static {
            "public static"
        } else {
            "public"
        };
        let params = method
            .params
            .iter()
            .map(|p| format!("{} {}", self.java_type(&p.ty), p.name))
            .join(", ");
        let header = format!("{modifiers} {returns} {}({params}) {{", method.name);
        if method.is_void() {
            w.line(format!("{header}}}"));
        } else {
            w.block(header, "}", |w| {
                w.line("return null;");
            });
        }
    }

    /// Native class file body, dispatch shim and class statics included.
    pub fn native_class(
        &self,
        class: &NativeClass,
        shim: Option<&DispatchShim>,
        statics: &[&LazyStatic],
    ) -> String {
        let name = class.name.simple_name();
        let base = class
            .parents
            .iter()
            .find(|parent| parent.as_str() != ROOT_CLASS);
        let inherits = match base {
            Some(base) => format!("extends {base}"),
            None => format!("implements {QOBJECT}"),
        };
        let modifiers = if class.is_abstract {
            "public abstract class"
        } else {
            "public class"
        };

        let mut w = self.writer();
        w.block(format!("{modifiers} {name} {inherits} {{"), "}", |w| {
            self.statics(w, statics, Some(class));
            for field in &class.fields {
                w.line(format!(
                    "public {} {} = {};",
                    self.java_type(&field.ty),
                    field.name,
                    self.value(&field.default, Some(&field.ty))
                ));
            }
            let params = class
                .constructor
                .iter()
                .map(|p| format!("{} {}", self.java_type(&p.ty), p.name))
                .join(", ");
            w.block(format!("public {name}({params}) {{"), "}", |w| {
                if base.is_some() {
                    w.line("super();");
                }
                for param in &class.constructor {
                    if class.fields.iter().any(|field| field.name == param.name) {
                        w.line(format!("(this).{0} = {0};", param.name));
                    }
                }
            });
            if !class.constructor.is_empty() {
                w.line(format!("public {name}() {{}}"));
            }
            for method in &class.methods {
                self.method_stub(w, method);
            }
            if let Some(shim) = shim {
                self.shim(w, shim);
            }
        });
        w.finish()
    }

    fn shim(&self, w: &mut SourceWriter, shim: &DispatchShim) {
        w.block("public String _getClass() {", "}", |w| {
            w.line(format!("return {};", quote(shim.class.as_str())));
        });
        w.block("public Object _getField(String name) {", "}", |w| {
            for getter in &shim.get_field {
                w.block(format!("{} {{", name_matches(&getter.field)), "}", |w| {
                    w.line(format!("return (this).{};", getter.field));
                });
            }
            if shim.base.is_some() {
                w.line("return super._getField(name);");
            } else {
                w.line("return null;");
            }
        });
        w.block("public void _setField(String name, Object value) {", "}", |w| {
            for setter in &shim.set_field {
                w.block(format!("{} {{", name_matches(&setter.field)), "}", |w| {
                    w.line(format!(
                        "(this).{} = {};",
                        setter.field,
                        self.cast("value", &setter.cast)
                    ));
                    if shim.base.is_some() {
                        w.line("return;");
                    }
                });
            }
            if shim.base.is_some() {
                w.line("super._setField(name, value);");
            }
        });
    }

    fn absent_accessors(w: &mut SourceWriter) {
        w.block("public Object _getField(String name) {", "}", |w| {
            w.line("return null;");
        });
        w.line("public void _setField(String name, Object value) {}");
    }

    fn invoke_body(&self, w: &mut SourceWriter, invoke: &InvokeShim) {
        let target = match &invoke.receiver {
            Receiver::Instance { cast } => {
                w.line(format!(
                    "{} obj = {};",
                    self.java_type(cast),
                    self.cast("object", cast)
                ));
                "obj".to_string()
            }
            Receiver::Static { class } => class.to_string(),
        };
        let args = invoke
            .args
            .iter()
            .map(|arg| self.cast(&format!("(args).get({})", arg.index), &arg.ty))
            .join(", ");
        let call = format!("({}).{}({})", target, invoke.method, args);
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

    pub fn method_reflection(
        &self,
        method: &MethodReflection,
        invoke: Option<&InvokeShim>,
    ) -> String {
        let name = &method.type_name;
        let params = list("String", method.parameters.iter().map(|p| quote(p.ty.as_str())));
        let mut w = self.writer();
        w.block(
            format!("public class {name} extends {REFLECT_METHOD} implements {QOBJECT} {{"),
            "}",
            |w| {
                w.block(format!("public {name}() {{"), "}", |w| {
                    w.line(format!(
                        "super({}, {}, {});",
                        quote(method.returns.as_str()),
                        quote(&method.name),
                        params
                    ));
                });
                if let Some(invoke) = invoke {
                    w.block(
                        format!("public Object invoke(Object object, {ARGS} args) {{"),
                        "}",
                        |w| {
                            self.invoke_body(w, invoke);
                        },
                    );
                }
                Self::absent_accessors(w);
            },
        );
        w.finish()
    }

    pub fn reflection(
        &self,
        reflection: &ClassReflection,
        shim: Option<&DispatchShim>,
        statics: &[&LazyStatic],
    ) -> String {
        let name = &reflection.type_name;
        let module = names::metadata_module(&self.scope.module);
        let mut w = self.writer();
        w.block(
            format!("public class {name} extends {REFLECT_CLASS} implements {QOBJECT} {{"),
            "}",
            |w| {
                self.statics(w, statics, None);
                w.block(format!("public {name}() {{"), "}", |w| {
                    w.line(format!("super({});", quote(&reflection.name)));
                    w.line(format!("(this).name = {};", quote(&reflection.name)));
                    w.line(format!(
                        "(this).parameters = {};",
                        list("String", reflection.parameters.iter().map(|p| quote(p)))
                    ));
                    w.line(format!(
                        "(this).fields = {};",
                        list(
                            REFLECT_FIELD,
                            reflection.fields.iter().map(|f| format!(
                                "new {REFLECT_FIELD}({}, {})",
                                quote(f.ty.as_str()),
                                quote(&f.name)
                            ))
                        )
                    ));
                    w.line(format!(
                        "(this).methods = {};",
                        list(
                            REFLECT_METHOD,
                            reflection
                                .methods
                                .iter()
                                .map(|m| format!("new {module}.{}()", m.type_name))
                        )
                    ));
                    w.line(format!(
                        "(this).parents = {};",
                        list("String", reflection.parents.iter().map(|p| quote(p.as_str())))
                    ));
                });
                if let Some(ConstructShim::Native { class, args }) = shim.map(|s| &s.construct) {
                    let args = args
                        .iter()
                        .map(|arg| self.cast(&format!("(args).get({})", arg.index), &arg.ty))
                        .join(", ");
                    w.block(format!("public Object construct({ARGS} args) {{"), "}", |w| {
                        w.line(format!("return new {class}({args});"));
                    });
                }
                w.block("public Boolean isAbstract() {", "}", |w| {
                    w.line(format!("return {};", reflection.is_abstract));
                });
                Self::absent_accessors(w);
            },
        );
        w.finish()
    }

    pub fn root(&self, root: &RootAggregate, statics: &[&LazyStatic]) -> String {
        let name = names::ROOT_TYPE;
        let mut w = self.writer();
        w.block(format!("public class {name} implements {QOBJECT} {{"), "}", |w| {
            self.statics(w, statics, None);
            w.block("public Object _getField(String name) {", "}", |w| {
                for entry in &root.entries {
                    w.block(format!("{} {{", name_matches(&entry.name)), "}", |w| {
                        w.line(format!("return {name}.{}();", entry.name));
                    });
                }
                w.line("return null;");
            });
            w.line("public void _setField(String name, Object value) {}");
        });
        w.finish()
    }
}
