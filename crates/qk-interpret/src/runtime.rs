//! Loads a [`GenerationPlan`] and executes it in process.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use parking_lot::Mutex;
use qk_core::emit::{
    ClassReflection, DefaultValue, DispatchShim, EmissionUnit, GenerationPlan, LazyStatic,
    ModulePlan, NativeClass, StaticInit, StaticKey,
};
use qk_core::ir::{Program, QualifiedName, ROOT_CLASS};

use crate::class::ReflectClass;
use crate::error::{RuntimeError, RuntimeResult};
use crate::lazy::Thunk;
use crate::module::{ImportHandle, LoadedModule, Root};
use crate::native::NativeRegistry;
use crate::types::TypeTable;
use crate::value::{Object, ObjectRef, Value};

struct ClassEntry {
    native: NativeClass,
    reflection: Option<ClassReflection>,
    shim: Option<DispatchShim>,
}

impl ClassEntry {
    fn base(&self) -> Option<&QualifiedName> {
        self.native
            .parents
            .iter()
            .find(|parent| parent.as_str() != ROOT_CLASS)
    }
}

pub(crate) struct Shared {
    me: Weak<Shared>,
    plan: GenerationPlan,
    types: TypeTable,
    natives: NativeRegistry,
    classes: HashMap<QualifiedName, ClassEntry>,
    statics: HashMap<StaticKey, Arc<Thunk<Value>>>,
    initializations: DashMap<StaticKey, usize>,
    modules: DashMap<QualifiedName, Arc<LoadedModule>>,
    loading: Mutex<HashMap<ThreadId, Vec<QualifiedName>>>,
}

impl Shared {
    fn build(me: &Weak<Shared>, plan: GenerationPlan) -> Self {
        let mut classes: HashMap<QualifiedName, ClassEntry> = HashMap::new();
        let mut statics = HashMap::new();
        for unit in plan.units() {
            match unit {
                EmissionUnit::NativeClass(native) => {
                    classes.insert(
                        native.name.clone(),
                        ClassEntry {
                            native: native.clone(),
                            reflection: None,
                            shim: None,
                        },
                    );
                }
                EmissionUnit::ReflectionObject(reflection) => {
                    if let Some(entry) = classes.get_mut(&reflection.class) {
                        entry.reflection = Some(reflection.clone());
                    }
                }
                EmissionUnit::DispatchShim(shim) => {
                    if let Some(entry) = classes.get_mut(&shim.class) {
                        entry.shim = Some(shim.clone());
                    }
                }
                EmissionUnit::LazyStatic(lazy) => {
                    statics.insert(lazy.key.clone(), Arc::new(static_thunk(me.clone(), lazy.clone())));
                }
                _ => {}
            }
        }
        Self {
            me: me.clone(),
            types: TypeTable::from_plan(&plan),
            plan,
            natives: NativeRegistry::new(),
            classes,
            statics,
            initializations: DashMap::new(),
            modules: DashMap::new(),
            loading: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn types(&self) -> &TypeTable {
        &self.types
    }

    pub(crate) fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    fn thunk(&self, key: &StaticKey) -> RuntimeResult<Arc<Thunk<Value>>> {
        self.statics
            .get(key)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownStatic(key.to_string()))
    }

    fn static_value(&self, key: &StaticKey) -> RuntimeResult<Value> {
        let thunk = self.thunk(key)?;
        let value = thunk.force()?.clone();
        Ok(value)
    }

    fn initialize(&self, lazy: &LazyStatic) -> RuntimeResult<Value> {
        *self.initializations.entry(lazy.key.clone()).or_insert(0) += 1;
        debug!("initializing {}", lazy.key);
        match &lazy.init {
            StaticInit::ReflectionSingleton { class, .. } => {
                self.reflect(class).map(|class| Value::Class(Arc::new(class)))
            }
            StaticInit::Alias(target) => self.static_value(target),
            StaticInit::Value(default) => self.evaluate(default),
        }
    }

    fn reflect(&self, class: &QualifiedName) -> RuntimeResult<ReflectClass> {
        let entry = self
            .classes
            .get(class)
            .ok_or_else(|| RuntimeError::UnknownClass(class.clone()))?;
        match (&entry.reflection, &entry.shim) {
            (Some(reflection), Some(shim)) => Ok(ReflectClass::new(
                reflection.clone(),
                shim.clone(),
                self.me.clone(),
            )),
            _ => Err(RuntimeError::UnknownClass(class.clone())),
        }
    }

    fn evaluate(&self, default: &DefaultValue) -> RuntimeResult<Value> {
        Ok(match default {
            DefaultValue::Null => Value::Null,
            DefaultValue::Bool(value) => Value::Bool(*value),
            DefaultValue::Int(value) => Value::Int(*value),
            DefaultValue::Float(value) => Value::Float(*value),
            DefaultValue::String(value) => Value::string(value),
            DefaultValue::New(class) => Value::Object(self.instantiate(class, Vec::new())?),
            DefaultValue::Static(key) => self.static_value(key)?,
            DefaultValue::Deferred(key) => Value::Deferred(self.thunk(key)?),
        })
    }

    /// `class` followed by its generated superclasses, nearest first.
    fn lineage(&self, class: &QualifiedName) -> Vec<&ClassEntry> {
        let mut chain: Vec<&ClassEntry> = Vec::new();
        let mut next = self.classes.get(class);
        while let Some(entry) = next {
            if chain.iter().any(|seen| seen.native.name == entry.native.name) {
                break;
            }
            chain.push(entry);
            next = entry.base().and_then(|base| self.classes.get(base));
        }
        chain
    }

    /// First answer `lookup` gives for the shim of `class` or of the nearest
    /// superclass.
    pub(crate) fn inherited_shim<T>(
        &self,
        class: &QualifiedName,
        lookup: impl Fn(&DispatchShim) -> Option<T>,
    ) -> Option<T> {
        self.lineage(class)
            .into_iter()
            .filter_map(|entry| entry.shim.as_ref())
            .find_map(lookup)
    }

    /// Native construction: field defaults base-first, then constructor
    /// arguments bound to the class's own fields of the same name.
    pub(crate) fn instantiate(
        &self,
        class: &QualifiedName,
        args: Vec<Value>,
    ) -> RuntimeResult<ObjectRef> {
        let lineage = self.lineage(class);
        let entry = lineage
            .first()
            .ok_or_else(|| RuntimeError::UnknownClass(class.clone()))?;
        if entry.native.is_abstract {
            return Err(RuntimeError::AbstractInstantiation {
                class: class.clone(),
            });
        }
        let mut fields: Vec<(String, Value)> = Vec::new();
        for ancestor in lineage.iter().rev() {
            for field in &ancestor.native.fields {
                let value = self.evaluate(&field.default)?;
                match fields.iter_mut().find(|(name, _)| *name == field.name) {
                    Some((_, slot)) => *slot = value,
                    None => fields.push((field.name.clone(), value)),
                }
            }
        }
        let object = Object::new(class.clone(), fields);
        for (param, value) in entry.native.constructor.iter().zip(args) {
            if entry.native.fields.iter().any(|field| field.name == param.name) {
                object.set(&param.name, value);
            }
        }
        Ok(Arc::new(object))
    }

    fn load(&self, name: &QualifiedName) -> RuntimeResult<Arc<LoadedModule>> {
        if let Some(module) = self.modules.get(name) {
            return Ok(module.clone());
        }
        let plan = self
            .plan
            .module(name)
            .ok_or_else(|| RuntimeError::UnknownModule(name.clone()))?;

        let me = thread::current().id();
        {
            let mut loading = self.loading.lock();
            let stack = loading.entry(me).or_default();
            if let Some(start) = stack.iter().position(|module| module == name) {
                let mut path = stack[start..].to_vec();
                path.push(name.clone());
                return Err(RuntimeError::LoadCycle { path });
            }
            stack.push(name.clone());
        }
        let linked = self.link(plan);
        if let Some(stack) = self.loading.lock().get_mut(&me) {
            stack.pop();
        }

        let module = Arc::new(linked?);
        debug!("loaded module {}", name);
        Ok(self
            .modules
            .entry(name.clone())
            .or_insert(module)
            .clone())
    }

    fn link(&self, plan: &ModulePlan) -> RuntimeResult<LoadedModule> {
        let mut imports = Vec::new();
        for unit in &plan.units {
            match unit {
                EmissionUnit::EagerImport(import) => {
                    let module = self.load(&import.target)?;
                    imports.push((import.target.clone(), ImportHandle::Eager(module)));
                }
                EmissionUnit::LazyImport(import) => {
                    let weak = self.me.clone();
                    let target = import.target.clone();
                    let thunk = Thunk::new(format!("import {}", import.target), move || {
                        weak.upgrade()
                            .ok_or(RuntimeError::Detached)?
                            .load(&target)
                    });
                    imports.push((import.target.clone(), ImportHandle::Lazy(Arc::new(thunk))));
                }
                _ => {}
            }
        }
        let entries = match plan.root() {
            Some(root) => root
                .entries
                .iter()
                .map(|entry| Ok((entry.name.clone(), self.thunk(&entry.target)?)))
                .collect::<RuntimeResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(LoadedModule {
            name: plan.module.clone(),
            metadata_module: plan.metadata_module.clone(),
            imports,
            root: Root { entries },
        })
    }
}

fn static_thunk(runtime: Weak<Shared>, lazy: LazyStatic) -> Thunk<Value> {
    Thunk::new(lazy.key.to_string(), move || {
        runtime
            .upgrade()
            .ok_or(RuntimeError::Detached)?
            .initialize(&lazy)
    })
}

/// In-process host for generated reflective code.
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<Shared>,
}

impl Runtime {
    pub fn new(plan: GenerationPlan) -> Self {
        let shared = Arc::new_cyclic(|me| Shared::build(me, plan));
        Self { shared }
    }

    pub fn from_program(program: &Program) -> qk_core::Result<Self> {
        Ok(Self::new(qk_reflect::plan_program(program)?))
    }

    pub fn plan(&self) -> &GenerationPlan {
        &self.shared.plan
    }

    pub fn natives(&self) -> &NativeRegistry {
        &self.shared.natives
    }

    pub fn register_native<F>(&self, class: &str, method: &str, body: F)
    where
        F: Fn(&Value, &[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        self.shared.natives.register(class, method, body);
    }

    /// Load a module and, transitively, its eager imports. Every module is
    /// loaded at most once.
    pub fn load(&self, module: &QualifiedName) -> RuntimeResult<Arc<LoadedModule>> {
        self.shared.load(module)
    }

    pub fn load_all(&self) -> RuntimeResult<Vec<Arc<LoadedModule>>> {
        self.shared
            .plan
            .modules
            .iter()
            .map(|module| self.shared.load(&module.module))
            .collect()
    }

    pub fn is_loaded(&self, module: &QualifiedName) -> bool {
        self.shared.modules.contains_key(module)
    }

    pub fn lazy_static(&self, key: &StaticKey) -> RuntimeResult<Arc<Thunk<Value>>> {
        self.shared.thunk(key)
    }

    pub fn static_value(&self, key: &StaticKey) -> RuntimeResult<Value> {
        self.shared.static_value(key)
    }

    /// How many times the initializer of `key` has run.
    pub fn initializations(&self, key: &StaticKey) -> usize {
        self.shared
            .initializations
            .get(key)
            .map(|count| *count)
            .unwrap_or(0)
    }

    /// The reflection singleton of `class`.
    pub fn class(&self, class: &QualifiedName) -> RuntimeResult<Arc<ReflectClass>> {
        match self.static_value(&StaticKey::singleton(class.clone())) {
            Ok(Value::Class(reflect)) => Ok(reflect),
            Ok(_) | Err(RuntimeError::UnknownStatic(_)) => {
                Err(RuntimeError::UnknownClass(class.clone()))
            }
            Err(err) => Err(err),
        }
    }

    /// Native construction, bypassing the reflective shim.
    pub fn instantiate(&self, class: &QualifiedName, args: Vec<Value>) -> RuntimeResult<ObjectRef> {
        self.shared.instantiate(class, args)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("modules", &self.shared.plan.modules.len())
            .field("statics", &self.shared.statics.len())
            .finish()
    }
}
