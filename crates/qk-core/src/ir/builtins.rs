use super::QualifiedName;

pub const ROOT_CLASS: &str = "quark.Object";
pub const VOID: &str = "quark.void";
pub const BOOL: &str = "quark.bool";
pub const INT: &str = "quark.int";
pub const LONG: &str = "quark.long";
pub const FLOAT: &str = "quark.float";
pub const STRING: &str = "quark.String";
pub const REFLECT_CLASS: &str = "quark.reflect.Class";
pub const REFLECT_METHOD: &str = "quark.reflect.Method";
pub const REFLECT_FIELD: &str = "quark.reflect.Field";

/// Scalar types every target maps onto a native value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Bool,
    Int,
    Long,
    Float,
    String,
}

impl Primitive {
    pub fn of(ty: &QualifiedName) -> Option<Self> {
        match ty.as_str() {
            BOOL => Some(Primitive::Bool),
            INT => Some(Primitive::Int),
            LONG => Some(Primitive::Long),
            FLOAT => Some(Primitive::Float),
            STRING => Some(Primitive::String),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Primitive::Int | Primitive::Long | Primitive::Float)
    }
}

pub fn void_type() -> QualifiedName {
    QualifiedName::new(VOID)
}

pub fn root_class() -> QualifiedName {
    QualifiedName::new(ROOT_CLASS)
}

pub fn default_externs() -> Vec<QualifiedName> {
    [
        ROOT_CLASS,
        VOID,
        BOOL,
        INT,
        LONG,
        FLOAT,
        STRING,
        REFLECT_CLASS,
        REFLECT_METHOD,
        REFLECT_FIELD,
    ]
    .into_iter()
    .map(QualifiedName::new)
    .collect()
}
