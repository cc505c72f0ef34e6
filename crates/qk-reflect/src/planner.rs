//! Reflection descriptor planning.
//!
//! For every class the planner decides what the native declaration carries
//! and, for reflectable classes, what the reflection object reports.

use std::collections::HashSet;

use qk_core::emit::{
    ClassReflection, DefaultValue, FieldPlan, FieldReflection, MethodReflection, NativeClass,
    StaticKey,
};
use qk_core::ir::{
    root_class, ClassDescriptor, FieldDescriptor, Initializer, Primitive, QualifiedName,
    ROOT_CLASS,
};
use qk_core::{names, Error, Result};
use tracing::trace;

use crate::index::ProgramIndex;

#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionPlan {
    pub native: NativeClass,
    pub reflection: Option<ClassReflection>,
}

/// Plan the reflection object of a single class.
///
/// Only name uniqueness inside the class is checked; parent resolution needs
/// the whole program and happens in [`plan_reflection`].
pub fn plan_class(class: &ClassDescriptor) -> Result<ClassReflection> {
    check_unique_members(class)?;

    let fields = class
        .instance_fields()
        .map(|field| FieldReflection {
            name: field.name.clone(),
            ty: field.ty.clone(),
        })
        .collect();

    let methods = class
        .methods
        .iter()
        .map(|method| MethodReflection {
            type_name: names::method_type(&class.name, &method.name),
            owner: class.name.clone(),
            name: method.name.clone(),
            returns: method.returns.clone(),
            parameters: method.params.clone(),
            is_static: method.is_static,
        })
        .collect();

    Ok(ClassReflection {
        class: class.name.clone(),
        type_name: names::reflection_type(&class.name),
        object_name: names::reflection_object(&class.name),
        name: class.name.to_string(),
        parameters: Vec::new(),
        fields,
        methods,
        parents: reflected_parents(class),
        is_abstract: class.is_abstract,
    })
}

/// Plan both surfaces of a class: its native declaration and, when the class
/// is reflectable, its reflection object.
pub fn plan_reflection(index: &ProgramIndex<'_>, class: &ClassDescriptor) -> Result<ReflectionPlan> {
    check_unique_members(class)?;
    for parent in &class.parents {
        if parent == &class.name {
            return Err(Error::ir(format!("class `{}` lists itself as a parent", class.name)));
        }
        if !index.is_known(parent) {
            return Err(Error::ir(format!(
                "class `{}` has unresolved parent `{}`",
                class.name, parent
            )));
        }
    }

    let reflection = if class.reflectable {
        Some(plan_class(class)?)
    } else {
        None
    };

    let fields = class
        .instance_fields()
        .map(|field| plan_field(index, class, field))
        .collect::<Result<Vec<_>>>()?;
    let statics = class
        .static_fields()
        .map(|field| plan_field(index, class, field))
        .collect::<Result<Vec<_>>>()?;

    trace!(
        "planned {}: {} fields, {} statics, {} methods",
        class.name,
        fields.len(),
        statics.len(),
        class.methods.len()
    );

    Ok(ReflectionPlan {
        native: NativeClass {
            name: class.name.clone(),
            parents: class.parents.clone(),
            fields,
            statics,
            methods: class.methods.clone(),
            constructor: class.constructor.clone(),
            is_abstract: class.is_abstract,
            class_ref: class.reflectable.then(|| names::class_ref(&class.name)),
        },
        reflection,
    })
}

/// Declared parents in order, root ancestor last (and only once).
fn reflected_parents(class: &ClassDescriptor) -> Vec<QualifiedName> {
    if class.name.as_str() == ROOT_CLASS {
        return Vec::new();
    }
    let mut parents: Vec<QualifiedName> = class
        .parents
        .iter()
        .filter(|parent| parent.as_str() != ROOT_CLASS)
        .cloned()
        .collect();
    parents.push(root_class());
    parents
}

fn check_unique_members(class: &ClassDescriptor) -> Result<()> {
    let mut seen = HashSet::new();
    for field in &class.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(Error::ir(format!(
                "class `{}` declares field `{}` twice",
                class.name, field.name
            )));
        }
    }
    let mut seen = HashSet::new();
    for method in &class.methods {
        if !seen.insert(method.name.as_str()) {
            return Err(Error::ir(format!(
                "class `{}` declares method `{}` twice",
                class.name, method.name
            )));
        }
    }
    let mut seen = HashSet::new();
    for param in &class.constructor {
        if !seen.insert(param.name.as_str()) {
            return Err(Error::ir(format!(
                "constructor of `{}` declares parameter `{}` twice",
                class.name, param.name
            )));
        }
    }
    Ok(())
}

fn plan_field(
    index: &ProgramIndex<'_>,
    class: &ClassDescriptor,
    field: &FieldDescriptor,
) -> Result<FieldPlan> {
    let default = match &field.initializer {
        None => zero_value(&field.ty),
        Some(init) => lower_initializer(index, class, init)?,
    };
    Ok(FieldPlan {
        name: field.name.clone(),
        ty: field.ty.clone(),
        default,
    })
}

/// Value of a field without an initializer.
pub fn zero_value(ty: &QualifiedName) -> DefaultValue {
    match Primitive::of(ty) {
        Some(Primitive::Bool) => DefaultValue::Bool(false),
        Some(Primitive::Int | Primitive::Long) => DefaultValue::Int(0),
        Some(Primitive::Float) => DefaultValue::Float(0.0),
        Some(Primitive::String) | None => DefaultValue::Null,
    }
}

fn lower_initializer(
    index: &ProgramIndex<'_>,
    class: &ClassDescriptor,
    init: &Initializer,
) -> Result<DefaultValue> {
    Ok(match init {
        Initializer::Null => DefaultValue::Null,
        Initializer::Bool { value } => DefaultValue::Bool(*value),
        Initializer::Int { value } => DefaultValue::Int(*value),
        Initializer::Float { value } => DefaultValue::Float(*value),
        Initializer::String { value } => DefaultValue::String(value.clone()),
        Initializer::New { class: target } => {
            let target_class = index.require_class(target, &format!("initializer in `{}`", class.name))?;
            if target_class.is_abstract {
                return Err(Error::ir(format!(
                    "initializer in `{}` instantiates abstract class `{}`",
                    class.name, target
                )));
            }
            DefaultValue::New(target.clone())
        }
        Initializer::Static { class: owner, field } => {
            DefaultValue::Static(static_target(index, class, owner, field)?)
        }
        Initializer::Deferred { class: owner, field } => {
            DefaultValue::Deferred(static_target(index, class, owner, field)?)
        }
    })
}

fn static_target(
    index: &ProgramIndex<'_>,
    class: &ClassDescriptor,
    owner: &QualifiedName,
    field: &str,
) -> Result<StaticKey> {
    let target = index.require_class(owner, &format!("initializer in `{}`", class.name))?;
    match target.field(field) {
        Some(found) if found.is_static => Ok(StaticKey::class(owner.clone(), field)),
        _ => Err(Error::ir(format!(
            "initializer in `{}` reads `{}.{}` which is not a static field",
            class.name, owner, field
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use qk_core::ir::{MethodDescriptor, Module, Program, STRING};

    #[test]
    fn foo_with_one_method() {
        let foo = ClassDescriptor::new("org.example.foo.Foo")
            .with_method(MethodDescriptor::stub("test"));
        let plan = plan_class(&foo).unwrap();
        assert_eq!(plan.name, "org.example.foo.Foo");
        assert!(plan.fields.is_empty());
        assert!(plan.parameters.is_empty());
        assert_eq!(plan.methods.len(), 1);
        assert_eq!(plan.methods[0].name, "test");
        assert_eq!(plan.methods[0].type_name, "org_example_foo_Foo_test_Method");
        assert_eq!(plan.parents, vec![QualifiedName::new("quark.Object")]);
    }

    #[test]
    fn parents_keep_order_with_root_last() {
        let class = ClassDescriptor::new("a.C")
            .with_parent("quark.Object")
            .with_parent("a.Base")
            .with_parent("a.Iface");
        let plan = plan_class(&class).unwrap();
        let parents: Vec<_> = plan.parents.iter().map(|p| p.as_str()).collect();
        assert_eq!(parents, vec!["a.Base", "a.Iface", "quark.Object"]);
    }

    #[test]
    fn root_class_has_no_parents() {
        let plan = plan_class(&ClassDescriptor::new(ROOT_CLASS)).unwrap();
        assert!(plan.parents.is_empty());
    }

    #[test]
    fn methods_preserve_declaration_order() {
        let class = ClassDescriptor::new("a.C")
            .with_method(MethodDescriptor::stub("z"))
            .with_method(MethodDescriptor::stub("a"))
            .with_method(MethodDescriptor::stub("m"));
        let plan = plan_class(&class).unwrap();
        let names: Vec<_> = plan.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn duplicate_members_are_rejected() {
        let dup_field = ClassDescriptor::new("a.C")
            .with_field(FieldDescriptor::new("x", STRING))
            .with_field(FieldDescriptor::new("x", STRING));
        assert!(matches!(plan_class(&dup_field), Err(Error::IrConsistency(_))));

        let dup_method = ClassDescriptor::new("a.C")
            .with_method(MethodDescriptor::stub("m"))
            .with_method(MethodDescriptor::stub("m"));
        assert!(matches!(plan_class(&dup_method), Err(Error::IrConsistency(_))));
    }

    #[test]
    fn unresolved_parent_is_rejected() {
        let program = Program::new(vec![
            Module::new("a").with_class(ClassDescriptor::new("a.C").with_parent("a.Missing"))
        ]);
        let index = ProgramIndex::build(&program).unwrap();
        let class = &program.modules[0].classes[0];
        let err = plan_reflection(&index, class).unwrap_err();
        assert!(err.to_string().contains("a.Missing"));
    }

    #[test]
    fn defaults_follow_declared_types() {
        let program = Program::new(vec![Module::new("a").with_class(
            ClassDescriptor::new("a.C")
                .with_field(FieldDescriptor::new("n", "quark.int"))
                .with_field(FieldDescriptor::new("ok", "quark.bool"))
                .with_field(FieldDescriptor::new("s", STRING))
                .with_field(
                    FieldDescriptor::new("greeting", STRING)
                        .with_initializer(Initializer::string("hi")),
                ),
        )]);
        let index = ProgramIndex::build(&program).unwrap();
        let plan = plan_reflection(&index, &program.modules[0].classes[0]).unwrap();
        let defaults: Vec<_> = plan.native.fields.iter().map(|f| f.default.clone()).collect();
        assert_eq!(
            defaults,
            vec![
                DefaultValue::Int(0),
                DefaultValue::Bool(false),
                DefaultValue::Null,
                DefaultValue::String("hi".into()),
            ]
        );
        assert_eq!(plan.native.class_ref.as_deref(), Some("a_C_ref"));
    }

    #[test]
    fn hidden_classes_get_no_reflection_object() {
        let program = Program::new(vec![
            Module::new("a").with_class(ClassDescriptor::new("a.C").hidden())
        ]);
        let index = ProgramIndex::build(&program).unwrap();
        let plan = plan_reflection(&index, &program.modules[0].classes[0]).unwrap();
        assert!(plan.reflection.is_none());
        assert!(plan.native.class_ref.is_none());
    }
}
