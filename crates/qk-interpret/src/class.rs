//! Reflection objects as live values: `quark.reflect.Class` and
//! `quark.reflect.Method` instances backed by the planned dispatch shims.

use std::sync::{Arc, Weak};

use qk_core::emit::{
    ClassReflection, ConstructShim, DispatchShim, FieldReflection, InvokeShim, MethodReflection,
    Receiver, ReturnKind,
};
use qk_core::ir::{ParameterDescriptor, QualifiedName};

use crate::error::{RuntimeError, RuntimeResult};
use crate::runtime::Shared;
use crate::value::Value;

fn check_arity(callee: &str, expected: usize, args: &[Value]) -> RuntimeResult<()> {
    if args.len() != expected {
        return Err(RuntimeError::Arity {
            callee: callee.to_string(),
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

pub struct ReflectClass {
    reflection: ClassReflection,
    shim: DispatchShim,
    methods: Vec<Arc<ReflectMethod>>,
    runtime: Weak<Shared>,
}

impl ReflectClass {
    pub(crate) fn new(reflection: ClassReflection, shim: DispatchShim, runtime: Weak<Shared>) -> Self {
        let methods = reflection
            .methods
            .iter()
            .filter_map(|method| {
                let invoke = shim.invoke.iter().find(|invoke| invoke.method == method.name);
                if invoke.is_none() {
                    warn!("{}: no invoke shim for `{}`", reflection.name, method.name);
                }
                invoke.map(|invoke| {
                    Arc::new(ReflectMethod {
                        reflection: method.clone(),
                        shim: invoke.clone(),
                        runtime: runtime.clone(),
                    })
                })
            })
            .collect();
        Self {
            reflection,
            shim,
            methods,
            runtime,
        }
    }

    fn runtime(&self) -> RuntimeResult<Arc<Shared>> {
        self.runtime.upgrade().ok_or(RuntimeError::Detached)
    }

    pub fn name(&self) -> &str {
        &self.reflection.name
    }

    pub fn class(&self) -> &QualifiedName {
        &self.reflection.class
    }

    /// Type parameters; always empty for generated classes.
    pub fn parameters(&self) -> &[String] {
        &self.reflection.parameters
    }

    pub fn fields(&self) -> &[FieldReflection] {
        &self.reflection.fields
    }

    pub fn methods(&self) -> &[Arc<ReflectMethod>] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&Arc<ReflectMethod>> {
        self.methods.iter().find(|method| method.name() == name)
    }

    pub fn parents(&self) -> &[QualifiedName] {
        &self.reflection.parents
    }

    pub fn is_abstract(&self) -> bool {
        self.shim.is_abstract()
    }

    pub fn construct(&self, args: &[Value]) -> RuntimeResult<Value> {
        match &self.shim.construct {
            ConstructShim::Abstract { class } => Err(RuntimeError::AbstractInstantiation {
                class: class.clone(),
            }),
            ConstructShim::Native { class, args: casts } => {
                check_arity(self.name(), casts.len(), args)?;
                let runtime = self.runtime()?;
                let values = casts
                    .iter()
                    .zip(args)
                    .map(|(cast, arg)| runtime.types().cast(arg.clone(), &cast.ty))
                    .collect::<RuntimeResult<Vec<_>>>()?;
                runtime.instantiate(class, values).map(Value::Object)
            }
        }
    }

    /// Current value of `name`, or null when neither the class nor any of its
    /// superclasses declares such a field. Deferred references are forced.
    pub fn get_field(&self, instance: &Value, name: &str) -> RuntimeResult<Value> {
        let declares = |shim: &DispatchShim| {
            shim.get_field
                .iter()
                .any(|getter| getter.field == name)
                .then_some(())
        };
        let declared = declares(&self.shim).is_some() || self.inherited(declares).is_some();
        if !declared {
            return Ok(Value::Null);
        }
        match instance.as_object().and_then(|object| object.get(name)) {
            Some(Value::Deferred(thunk)) => Ok(thunk.force()?.clone()),
            Some(value) => Ok(value),
            None => Ok(Value::Null),
        }
    }

    /// Checked assignment; unknown names are ignored.
    pub fn set_field(&self, instance: &Value, name: &str, value: Value) -> RuntimeResult<()> {
        let setter_for = |shim: &DispatchShim| {
            shim.set_field
                .iter()
                .find(|setter| setter.field == name)
                .cloned()
        };
        let Some(setter) = setter_for(&self.shim).or_else(|| self.inherited(setter_for)) else {
            return Ok(());
        };
        let runtime = self.runtime()?;
        let object = match runtime.types().cast(instance.clone(), self.class())? {
            Value::Object(object) => object,
            other => return Err(RuntimeError::cast(self.class(), other.type_name())),
        };
        let value = runtime.types().cast(value, &setter.cast)?;
        if !object.set(name, value) {
            warn!("{}: instance of {} has no slot `{}`", self.name(), object.class(), name);
        }
        Ok(())
    }

    /// Answer from the shims of the superclasses, nearest first.
    fn inherited<T>(&self, lookup: impl Fn(&DispatchShim) -> Option<T>) -> Option<T> {
        let base = self.shim.base.as_ref()?;
        self.runtime().ok()?.inherited_shim(base, lookup)
    }

    /// Invoke a method by name. Unknown names yield null.
    pub fn invoke(&self, instance: &Value, name: &str, args: &[Value]) -> RuntimeResult<Value> {
        match self.method(name) {
            Some(method) => method.invoke(instance, args),
            None => Ok(Value::Null),
        }
    }
}

impl std::fmt::Debug for ReflectClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectClass")
            .field("name", &self.reflection.name)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// Method descriptor. Exposes no fields of its own.
pub struct ReflectMethod {
    reflection: MethodReflection,
    shim: InvokeShim,
    runtime: Weak<Shared>,
}

impl ReflectMethod {
    pub fn name(&self) -> &str {
        &self.reflection.name
    }

    pub fn owner(&self) -> &QualifiedName {
        &self.reflection.owner
    }

    pub fn type_name(&self) -> &str {
        &self.reflection.type_name
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.reflection.parameters
    }

    pub fn returns(&self) -> &QualifiedName {
        &self.reflection.returns
    }

    pub fn is_static(&self) -> bool {
        self.reflection.is_static
    }

    pub fn fields(&self) -> &[FieldReflection] {
        &[]
    }

    pub fn get_field(&self, _instance: &Value, _name: &str) -> RuntimeResult<Value> {
        Ok(Value::Null)
    }

    pub fn set_field(&self, _instance: &Value, _name: &str, _value: Value) -> RuntimeResult<()> {
        Ok(())
    }

    pub fn invoke(&self, instance: &Value, args: &[Value]) -> RuntimeResult<Value> {
        let runtime = self.runtime.upgrade().ok_or(RuntimeError::Detached)?;
        let receiver = match &self.shim.receiver {
            Receiver::Instance { cast } if instance.is_null() => {
                return Err(RuntimeError::cast(cast, instance.type_name()));
            }
            Receiver::Instance { cast } => runtime.types().cast(instance.clone(), cast)?,
            Receiver::Static { .. } => Value::Null,
        };
        check_arity(self.type_name(), self.shim.args.len(), args)?;
        let args = self
            .shim
            .args
            .iter()
            .zip(args)
            .map(|(cast, arg)| runtime.types().cast(arg.clone(), &cast.ty))
            .collect::<RuntimeResult<Vec<_>>>()?;

        let result = match runtime.natives().lookup(self.owner().as_str(), self.name()) {
            Some(body) => body(&receiver, &args)?,
            None => Value::Null,
        };
        match &self.shim.returns {
            ReturnKind::Void => Ok(Value::Null),
            ReturnKind::Value(ty) => runtime.types().cast(result, ty),
        }
    }
}

impl std::fmt::Debug for ReflectMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectMethod")
            .field("owner", &self.reflection.owner)
            .field("name", &self.reflection.name)
            .finish()
    }
}
