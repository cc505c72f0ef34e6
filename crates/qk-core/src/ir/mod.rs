//! The validated intermediate representation handed over by the front-end.
//!
//! The tree is read-only for everything downstream: planners borrow it and
//! never mutate it. Builder-style helpers exist so tests and embedders can
//! assemble programs without going through JSON.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

mod builtins;

pub use builtins::*;

/// Dot-separated, globally unique name of a class, module or type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualifiedName(String);

impl QualifiedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Last segment, e.g. `User` for `slack.User`.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Everything before the last segment, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(ns, _)| ns)
    }

    pub fn child(&self, name: &str) -> Self {
        Self(format!("{}.{}", self.0, name))
    }
}

impl Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for QualifiedName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for QualifiedName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub modules: Vec<Module>,
    /// Classes provided by the target runtime library rather than the program.
    #[serde(default)]
    pub externs: Vec<QualifiedName>,
}

impl Program {
    pub fn new(modules: Vec<Module>) -> Self {
        Self {
            modules,
            externs: default_externs(),
        }
    }

    pub fn from_json(text: &str) -> crate::Result<Self> {
        let mut program: Program = serde_json::from_str(text)?;
        for builtin in default_externs() {
            if !program.externs.contains(&builtin) {
                program.externs.push(builtin);
            }
        }
        Ok(program)
    }

    pub fn with_extern(mut self, name: impl Into<QualifiedName>) -> Self {
        self.externs.push(name.into());
        self
    }

    pub fn classes(&self) -> impl Iterator<Item = (&Module, &ClassDescriptor)> {
        self.modules
            .iter()
            .flat_map(|module| module.classes.iter().map(move |class| (module, class)))
    }

    pub fn class(&self, name: &QualifiedName) -> Option<&ClassDescriptor> {
        self.classes()
            .map(|(_, class)| class)
            .find(|class| &class.name == name)
    }

    pub fn module_of(&self, class: &QualifiedName) -> Option<&Module> {
        self.modules
            .iter()
            .find(|module| module.classes.iter().any(|c| &c.name == class))
    }

    pub fn is_extern(&self, name: &QualifiedName) -> bool {
        self.externs.contains(name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: QualifiedName,
    #[serde(default)]
    pub classes: Vec<ClassDescriptor>,
}

impl Module {
    pub fn new(name: impl Into<QualifiedName>) -> Self {
        Self {
            name: name.into(),
            classes: Vec::new(),
        }
    }

    pub fn with_class(mut self, class: ClassDescriptor) -> Self {
        self.classes.push(class);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    pub name: QualifiedName,
    /// The first parent may be a concrete base, the rest are interface-like.
    #[serde(default)]
    pub parents: Vec<QualifiedName>,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    #[serde(default)]
    pub constructor: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub singleton: bool,
    #[serde(default = "default_true")]
    pub reflectable: bool,
}

fn default_true() -> bool {
    true
}

impl ClassDescriptor {
    pub fn new(name: impl Into<QualifiedName>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructor: Vec::new(),
            is_abstract: false,
            singleton: false,
            reflectable: true,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<QualifiedName>) -> Self {
        self.parents.push(parent.into());
        self
    }

    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_constructor(mut self, params: Vec<ParameterDescriptor>) -> Self {
        self.constructor = params;
        self
    }

    pub fn into_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn into_singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.reflectable = false;
        self
    }

    pub fn instance_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| !field.is_static)
    }

    pub fn static_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|field| field.is_static)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|method| method.name == name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    #[serde(default = "void_type")]
    pub returns: QualifiedName,
    #[serde(default)]
    pub params: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub is_static: bool,
}

impl MethodDescriptor {
    /// A `quark.void` method with no parameters: the shape used for
    /// abstract and interface declarations.
    pub fn stub(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            returns: void_type(),
            params: Vec::new(),
            is_static: false,
        }
    }

    pub fn returning(mut self, ty: impl Into<QualifiedName>) -> Self {
        self.returns = ty.into();
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, ty: impl Into<QualifiedName>) -> Self {
        self.params.push(ParameterDescriptor::new(name, ty));
        self
    }

    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn is_void(&self) -> bool {
        self.returns.as_str() == VOID
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: QualifiedName,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, ty: impl Into<QualifiedName>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: QualifiedName,
    #[serde(default)]
    pub initializer: Option<Initializer>,
    #[serde(default)]
    pub is_static: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, ty: impl Into<QualifiedName>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            initializer: None,
            is_static: false,
        }
    }

    pub fn with_initializer(mut self, initializer: Initializer) -> Self {
        self.initializer = Some(initializer);
        self
    }

    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }
}

/// Field initializers the generator understands. Anything richer is lowered
/// by the front-end into constructor bodies before reaching this layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Initializer {
    Null,
    Bool { value: bool },
    Int { value: i64 },
    Float { value: f64 },
    String { value: String },
    /// `new C()` with the class's default constructor.
    New { class: QualifiedName },
    /// Reads another static when this one is initialized.
    Static { class: QualifiedName, field: String },
    /// Stores a lazy reference to another static without forcing it.
    Deferred { class: QualifiedName, field: String },
}

impl Initializer {
    pub fn string(value: impl Into<String>) -> Self {
        Initializer::String {
            value: value.into(),
        }
    }

    pub fn new_instance(class: impl Into<QualifiedName>) -> Self {
        Initializer::New {
            class: class.into(),
        }
    }

    pub fn static_ref(class: impl Into<QualifiedName>, field: impl Into<String>) -> Self {
        Initializer::Static {
            class: class.into(),
            field: field.into(),
        }
    }

    pub fn deferred(class: impl Into<QualifiedName>, field: impl Into<String>) -> Self {
        Initializer::Deferred {
            class: class.into(),
            field: field.into(),
        }
    }

    /// Class named by the initializer, if it refers to one.
    pub fn referenced_class(&self) -> Option<&QualifiedName> {
        match self {
            Initializer::New { class }
            | Initializer::Static { class, .. }
            | Initializer::Deferred { class, .. } => Some(class),
            _ => None,
        }
    }
}
