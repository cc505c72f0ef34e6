use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use qk_core::ir::{QualifiedName, REFLECT_CLASS, REFLECT_METHOD};

use crate::class::{ReflectClass, ReflectMethod};
use crate::lazy::Thunk;

pub type ObjectRef = Arc<Object>;

/// Dynamically typed value flowing through the reflective API.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
    Object(ObjectRef),
    Class(Arc<ReflectClass>),
    Method(Arc<ReflectMethod>),
    /// Lazy reference to a static that has not necessarily been computed.
    Deferred(Arc<Thunk<Value>>),
}

impl Value {
    pub fn string(value: impl AsRef<str>) -> Self {
        Value::String(Arc::from(value.as_ref()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Arc<ReflectClass>> {
        match self {
            Value::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Name of the runtime type, used in cast diagnostics.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "quark.bool".to_string(),
            Value::Int(_) => "quark.int".to_string(),
            Value::Float(_) => "quark.float".to_string(),
            Value::String(_) => "quark.String".to_string(),
            Value::Object(obj) => obj.class().to_string(),
            Value::Class(_) => REFLECT_CLASS.to_string(),
            Value::Method(_) => REFLECT_METHOD.to_string(),
            Value::Deferred(thunk) => format!("lazy {}", thunk.name()),
        }
    }

    /// Identity for reference values, equality for scalars.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => Arc::ptr_eq(a, b),
            (Value::Deferred(a), Value::Deferred(b)) => Arc::ptr_eq(a, b),
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b) || a.structurally_eq(b),
            (Value::Class(a), Value::Class(b)) => a.name() == b.name(),
            (Value::Method(a), Value::Method(b)) => {
                a.owner() == b.owner() && a.name() == b.name()
            }
            (Value::Deferred(a), Value::Deferred(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(obj) => write!(f, "<{} object>", obj.class()),
            Value::Class(class) => write!(f, "<class {}>", class.name()),
            Value::Method(method) => write!(f, "<method {}.{}>", method.owner(), method.name()),
            Value::Deferred(thunk) => write!(f, "<lazy {}>", thunk.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

/// Instance of a generated class: the typed storage the dispatch shims read
/// and write.
pub struct Object {
    class: QualifiedName,
    fields: Mutex<Vec<(String, Value)>>,
}

impl Object {
    pub fn new(class: QualifiedName, fields: Vec<(String, Value)>) -> Self {
        Self {
            class,
            fields: Mutex::new(fields),
        }
    }

    pub fn class(&self) -> &QualifiedName {
        &self.class
    }

    /// Native accessor; `None` when the class has no such field.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields
            .lock()
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.clone())
    }

    /// Native assignment; returns false when the class has no such field.
    pub fn set(&self, name: &str, value: Value) -> bool {
        let mut fields = self.fields.lock();
        match fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    fn structurally_eq(&self, other: &Object) -> bool {
        if self.class != other.class {
            return false;
        }
        let mine = self.fields.lock().clone();
        let theirs = other.fields.lock().clone();
        mine == theirs
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class)
            .field("fields", &*self.fields.lock())
            .finish()
    }
}
