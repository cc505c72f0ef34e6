//! Emission units: the pre-decided plan each backend renders.
//!
//! Nothing in here requires a backend to make semantic decisions. Names are
//! already derived, defaults computed, cycles broken.

use std::fmt::{self, Display};

use derive_more::IsVariant;
use serde::{Deserialize, Serialize};

use crate::ir::{MethodDescriptor, ParameterDescriptor, QualifiedName};
use crate::names;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IsVariant)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum EmissionUnit {
    NativeClass(NativeClass),
    ReflectionObject(ClassReflection),
    DispatchShim(DispatchShim),
    LazyStatic(LazyStatic),
    EagerImport(ModuleImport),
    LazyImport(ModuleImport),
    RootAggregate(RootAggregate),
}

impl EmissionUnit {
    pub fn kind(&self) -> UnitKind {
        match self {
            EmissionUnit::NativeClass(_) => UnitKind::NativeClass,
            EmissionUnit::ReflectionObject(_) => UnitKind::ReflectionObject,
            EmissionUnit::DispatchShim(_) => UnitKind::DispatchShim,
            EmissionUnit::LazyStatic(_) => UnitKind::LazyStatic,
            EmissionUnit::EagerImport(_) => UnitKind::EagerImport,
            EmissionUnit::LazyImport(_) => UnitKind::LazyImport,
            EmissionUnit::RootAggregate(_) => UnitKind::RootAggregate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    NativeClass,
    ReflectionObject,
    DispatchShim,
    LazyStatic,
    EagerImport,
    LazyImport,
    RootAggregate,
}

/// A field's value before the constructor body runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DefaultValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    New(QualifiedName),
    Static(StaticKey),
    Deferred(StaticKey),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPlan {
    pub name: String,
    pub ty: QualifiedName,
    pub default: DefaultValue,
}

/// The class as the target's own type: typed fields, constructor and method
/// stubs. Reflection hangs off it but is emitted separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeClass {
    pub name: QualifiedName,
    pub parents: Vec<QualifiedName>,
    pub fields: Vec<FieldPlan>,
    pub statics: Vec<FieldPlan>,
    pub methods: Vec<MethodDescriptor>,
    pub constructor: Vec<ParameterDescriptor>,
    pub is_abstract: bool,
    /// Static pointing at the reflection object, absent for hidden classes.
    pub class_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReflection {
    pub name: String,
    pub ty: QualifiedName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodReflection {
    pub type_name: String,
    pub owner: QualifiedName,
    pub name: String,
    pub returns: QualifiedName,
    pub parameters: Vec<ParameterDescriptor>,
    pub is_static: bool,
}

/// Plan of the reflection object describing one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReflection {
    pub class: QualifiedName,
    pub type_name: String,
    pub object_name: String,
    pub name: String,
    pub parameters: Vec<String>,
    pub fields: Vec<FieldReflection>,
    pub methods: Vec<MethodReflection>,
    pub parents: Vec<QualifiedName>,
    pub is_abstract: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgCast {
    pub index: usize,
    pub name: String,
    pub ty: QualifiedName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, IsVariant)]
pub enum ConstructShim {
    Native {
        class: QualifiedName,
        args: Vec<ArgCast>,
    },
    /// No body: construction raises `AbstractInstantiationError`.
    Abstract { class: QualifiedName },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldGetter {
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSetter {
    pub field: String,
    pub cast: QualifiedName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Receiver {
    Instance { cast: QualifiedName },
    Static { class: QualifiedName },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnKind {
    Void,
    Value(QualifiedName),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeShim {
    pub method_type: String,
    pub method: String,
    pub receiver: Receiver,
    pub args: Vec<ArgCast>,
    pub returns: ReturnKind,
}

/// String-keyed dispatch primitives for one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchShim {
    pub class: QualifiedName,
    pub reflection_type: String,
    /// Superclass whose shim answers names this one does not declare.
    pub base: Option<QualifiedName>,
    pub construct: ConstructShim,
    pub get_field: Vec<FieldGetter>,
    pub set_field: Vec<FieldSetter>,
    pub invoke: Vec<InvokeShim>,
}

impl DispatchShim {
    pub fn is_abstract(&self) -> bool {
        self.construct.is_abstract()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StaticOwner {
    /// A static declared on (or generated for) a native class.
    Class(QualifiedName),
    /// The reflection class generated for the named native class.
    Reflection(QualifiedName),
    /// The root aggregate of the named module.
    Root(QualifiedName),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StaticKey {
    pub owner: StaticOwner,
    pub name: String,
}

impl StaticKey {
    pub fn class(class: QualifiedName, name: impl Into<String>) -> Self {
        Self {
            owner: StaticOwner::Class(class),
            name: name.into(),
        }
    }

    pub fn singleton(class: QualifiedName) -> Self {
        Self {
            owner: StaticOwner::Reflection(class),
            name: names::SINGLETON.to_string(),
        }
    }

    pub fn root_entry(module: QualifiedName, class: &QualifiedName) -> Self {
        Self {
            owner: StaticOwner::Root(module),
            name: names::reflection_object(class),
        }
    }

    /// Target-neutral type path the static is declared on, e.g.
    /// `slackpack_md.Root` or `slack.User`.
    pub fn owner_path(&self) -> String {
        match &self.owner {
            StaticOwner::Class(class) => class.to_string(),
            StaticOwner::Reflection(class) => names::reflection_type(class),
            StaticOwner::Root(module) => {
                format!("{}.{}", names::metadata_module(module), names::ROOT_TYPE)
            }
        }
    }
}

impl Display for StaticKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner_path(), self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StaticInit {
    /// `new <reflection_type>()`.
    ReflectionSingleton {
        class: QualifiedName,
        reflection_type: String,
    },
    /// Reads another lazy static.
    Alias(StaticKey),
    Value(DefaultValue),
}

/// One guarded lazy initializer. `depends_on` lists the statics this one
/// forces while running; all of them precede it in the module's unit order
/// when they live in the same module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LazyStatic {
    pub key: StaticKey,
    pub module: QualifiedName,
    pub init: StaticInit,
    pub depends_on: Vec<StaticKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootEntry {
    pub name: String,
    pub class: QualifiedName,
    pub target: StaticKey,
}

/// Per-module aggregate exposing every reflection singleton under its
/// derived name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootAggregate {
    pub module: QualifiedName,
    pub metadata_module: String,
    pub entries: Vec<RootEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportKind {
    Eager,
    Lazy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleImport {
    pub from: QualifiedName,
    pub target: QualifiedName,
    pub kind: ImportKind,
    pub symbols: Vec<QualifiedName>,
}

/// Ordered units for one source module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulePlan {
    pub module: QualifiedName,
    pub metadata_module: String,
    pub units: Vec<EmissionUnit>,
}

impl ModulePlan {
    pub fn new(module: QualifiedName) -> Self {
        Self {
            metadata_module: names::metadata_module(&module),
            module,
            units: Vec::new(),
        }
    }

    pub fn imports(&self) -> impl Iterator<Item = &ModuleImport> {
        self.units.iter().filter_map(|unit| match unit {
            EmissionUnit::EagerImport(import) | EmissionUnit::LazyImport(import) => Some(import),
            _ => None,
        })
    }

    pub fn native_classes(&self) -> impl Iterator<Item = &NativeClass> {
        self.units.iter().filter_map(|unit| match unit {
            EmissionUnit::NativeClass(class) => Some(class),
            _ => None,
        })
    }

    pub fn reflections(&self) -> impl Iterator<Item = &ClassReflection> {
        self.units.iter().filter_map(|unit| match unit {
            EmissionUnit::ReflectionObject(reflection) => Some(reflection),
            _ => None,
        })
    }

    pub fn shims(&self) -> impl Iterator<Item = &DispatchShim> {
        self.units.iter().filter_map(|unit| match unit {
            EmissionUnit::DispatchShim(shim) => Some(shim),
            _ => None,
        })
    }

    pub fn shim_for(&self, class: &QualifiedName) -> Option<&DispatchShim> {
        self.shims().find(|shim| &shim.class == class)
    }

    pub fn statics(&self) -> impl Iterator<Item = &LazyStatic> {
        self.units.iter().filter_map(|unit| match unit {
            EmissionUnit::LazyStatic(lazy) => Some(lazy),
            _ => None,
        })
    }

    pub fn root(&self) -> Option<&RootAggregate> {
        self.units.iter().find_map(|unit| match unit {
            EmissionUnit::RootAggregate(root) => Some(root),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationPlan {
    pub modules: Vec<ModulePlan>,
}

impl GenerationPlan {
    pub fn module(&self, name: &QualifiedName) -> Option<&ModulePlan> {
        self.modules.iter().find(|module| &module.module == name)
    }

    pub fn units(&self) -> impl Iterator<Item = &EmissionUnit> {
        self.modules.iter().flat_map(|module| module.units.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_key_paths() {
        let user = QualifiedName::new("slack.User");
        assert_eq!(
            StaticKey::root_entry("slackpack".into(), &user).to_string(),
            "slackpack_md.Root.slack_User_md"
        );
        assert_eq!(
            StaticKey::singleton(user.clone()).to_string(),
            "slack_User.singleton"
        );
        assert_eq!(
            StaticKey::class(user, "slack_User_ref").to_string(),
            "slack.User.slack_User_ref"
        );
    }
}
