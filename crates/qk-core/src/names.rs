//! Derived names shared by every backend.
//!
//! These must stay bit-exact across targets: interoperability tests compare
//! the names emitted by different backends for the same IR.

use crate::ir::QualifiedName;

pub const REFLECTION_SUFFIX: &str = "_md";
pub const METHOD_SUFFIX: &str = "_Method";
pub const CLASS_REF_SUFFIX: &str = "_ref";
pub const ROOT_TYPE: &str = "Root";
pub const SINGLETON: &str = "singleton";

pub fn flatten(name: &QualifiedName) -> String {
    name.segments().collect::<Vec<_>>().join("_")
}

/// Type name of the reflection class generated for `class`.
pub fn reflection_type(class: &QualifiedName) -> String {
    flatten(class)
}

/// Address of the reflection object on the module root.
pub fn reflection_object(class: &QualifiedName) -> String {
    format!("{}{}", flatten(class), REFLECTION_SUFFIX)
}

pub fn method_type(class: &QualifiedName, method: &str) -> String {
    format!("{}_{}{}", flatten(class), method, METHOD_SUFFIX)
}

/// Static on the native class pointing back at its reflection object.
pub fn class_ref(class: &QualifiedName) -> String {
    format!("{}{}", flatten(class), CLASS_REF_SUFFIX)
}

/// Module holding the `Root` aggregate and the reflection classes of `module`.
pub fn metadata_module(module: &QualifiedName) -> String {
    format!("{}{}", flatten(module), REFLECTION_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_names() {
        let foo = QualifiedName::new("org.example.foo.Foo");
        assert_eq!(flatten(&foo), "org_example_foo_Foo");
        assert_eq!(reflection_object(&foo), "org_example_foo_Foo_md");
        assert_eq!(method_type(&foo, "test"), "org_example_foo_Foo_test_Method");
        assert_eq!(class_ref(&foo), "org_example_foo_Foo_ref");
        assert_eq!(
            metadata_module(&QualifiedName::new("org.example.foo")),
            "org_example_foo_md"
        );
    }
}
