use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use qk_core::emit::{EmissionUnit, StaticKey};
use qk_core::ir::{
    ClassDescriptor, FieldDescriptor, Initializer, MethodDescriptor, Module, ParameterDescriptor,
    Program, QualifiedName, INT, STRING,
};
use qk_interpret::{RuntimeError, Runtime, Value};

fn slack() -> Program {
    Program::new(vec![Module::new("slack")
        .with_class(
            ClassDescriptor::new("slack.User")
                .with_field(FieldDescriptor::new("client", "slack.Client"))
                .with_field(FieldDescriptor::new("user", STRING))
                .with_constructor(vec![
                    ParameterDescriptor::new("client", "slack.Client"),
                    ParameterDescriptor::new("user", STRING),
                ]),
        )
        .with_class(
            ClassDescriptor::new("slack.Client")
                .with_method(MethodDescriptor::stub("connect"))
                .with_method(
                    MethodDescriptor::stub("describe")
                        .returning(STRING)
                        .with_param("user", "slack.User"),
                ),
        )
        .with_class(
            ClassDescriptor::new("slack.SlackHandler")
                .into_abstract()
                .with_method(MethodDescriptor::stub("onHello").with_param("hello", "slack.User")),
        )
        .with_class(ClassDescriptor::new("slack.Bot").with_parent("slack.SlackHandler"))])
}

fn runtime(program: &Program) -> Runtime {
    Runtime::from_program(program).unwrap()
}

#[test]
fn method_only_class_reflects_and_invokes_to_null() {
    let program = Program::new(vec![Module::new("org.example.foo").with_class(
        ClassDescriptor::new("org.example.foo.Foo").with_method(MethodDescriptor::stub("test")),
    )]);
    let runtime = runtime(&program);
    let foo = runtime.class(&"org.example.foo.Foo".into()).unwrap();

    assert_eq!(foo.name(), "org.example.foo.Foo");
    assert!(foo.fields().is_empty());
    assert!(foo.parameters().is_empty());
    assert_eq!(foo.methods().len(), 1);
    assert_eq!(foo.methods()[0].name(), "test");
    assert_eq!(foo.methods()[0].type_name(), "org_example_foo_Foo_test_Method");

    let instance = foo.construct(&[]).unwrap();
    assert_eq!(foo.methods()[0].invoke(&instance, &[]).unwrap(), Value::Null);
}

#[test]
fn void_methods_discard_native_results() {
    let program = Program::new(vec![Module::new("org.example.foo").with_class(
        ClassDescriptor::new("org.example.foo.Foo").with_method(MethodDescriptor::stub("test")),
    )]);
    let runtime = runtime(&program);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    runtime.register_native("org.example.foo.Foo", "test", move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Int(42))
    });

    let foo = runtime.class(&"org.example.foo.Foo".into()).unwrap();
    let instance = foo.construct(&[]).unwrap();
    assert_eq!(foo.invoke(&instance, "test", &[]).unwrap(), Value::Null);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(foo.invoke(&instance, "missing", &[]).unwrap(), Value::Null);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn user_fields_round_trip() {
    let runtime = runtime(&slack());
    let user = runtime.class(&"slack.User".into()).unwrap();
    let u = user.construct(&[Value::Null, Value::Null]).unwrap();

    assert_eq!(user.get_field(&u, "user").unwrap(), Value::Null);
    user.set_field(&u, "user", Value::from("alice")).unwrap();
    assert_eq!(user.get_field(&u, "user").unwrap(), Value::from("alice"));

    let client = runtime
        .class(&"slack.Client".into())
        .unwrap()
        .construct(&[])
        .unwrap();
    user.set_field(&u, "client", client.clone()).unwrap();
    assert!(user.get_field(&u, "client").unwrap().same(&client));
}

fn zoo() -> Program {
    Program::new(vec![Module::new("zoo")
        .with_class(
            ClassDescriptor::new("zoo.Animal")
                .with_field(FieldDescriptor::new("name", STRING))
                .with_field(
                    FieldDescriptor::new("legs", INT).with_initializer(Initializer::Int { value: 4 }),
                ),
        )
        .with_class(
            ClassDescriptor::new("zoo.Bird")
                .with_parent("zoo.Animal")
                .with_field(FieldDescriptor::new("wingspan", INT))
                .with_field(
                    FieldDescriptor::new("legs", INT).with_initializer(Initializer::Int { value: 2 }),
                ),
        )])
}

#[test]
fn inherited_fields_round_trip_through_either_class() {
    let runtime = runtime(&zoo());
    let animal = runtime.class(&"zoo.Animal".into()).unwrap();
    let bird = runtime.class(&"zoo.Bird".into()).unwrap();
    let b = bird.construct(&[]).unwrap();

    assert_eq!(
        b.as_object().unwrap().field_names(),
        vec!["name", "legs", "wingspan"]
    );
    assert_eq!(bird.get_field(&b, "legs").unwrap(), Value::Int(2));

    animal.set_field(&b, "name", Value::from("tweety")).unwrap();
    assert_eq!(animal.get_field(&b, "name").unwrap(), Value::from("tweety"));
    assert_eq!(bird.get_field(&b, "name").unwrap(), Value::from("tweety"));

    bird.set_field(&b, "name", Value::from("polly")).unwrap();
    assert_eq!(animal.get_field(&b, "name").unwrap(), Value::from("polly"));

    assert_eq!(
        bird.set_field(&b, "name", Value::Int(1)).unwrap_err(),
        RuntimeError::cast(&STRING.into(), "quark.int")
    );
    assert_eq!(bird.get_field(&b, "feathers").unwrap(), Value::Null);
    assert_eq!(animal.get_field(&b, "wingspan").unwrap(), Value::Null);
}

#[test]
fn deferred_instance_fields_read_as_their_value() {
    let program = Program::new(vec![Module::new("cfg")
        .with_class(
            ClassDescriptor::new("cfg.Settings").with_field(
                FieldDescriptor::new("greeting", STRING)
                    .with_initializer(Initializer::string("hi"))
                    .into_static(),
            ),
        )
        .with_class(
            ClassDescriptor::new("cfg.Greeter").with_field(
                FieldDescriptor::new("greeting", STRING)
                    .with_initializer(Initializer::deferred("cfg.Settings", "greeting")),
            ),
        )]);
    let runtime = runtime(&program);
    let greeter = runtime.class(&"cfg.Greeter".into()).unwrap();
    let g = greeter.construct(&[]).unwrap();
    let key = StaticKey::class("cfg.Settings".into(), "greeting");

    assert_eq!(runtime.initializations(&key), 0);
    assert_eq!(greeter.get_field(&g, "greeting").unwrap(), Value::from("hi"));
    assert_eq!(greeter.get_field(&g, "greeting").unwrap(), Value::from("hi"));
    assert_eq!(runtime.initializations(&key), 1);
}

#[test]
fn constructor_arguments_bind_to_fields() {
    let runtime = runtime(&slack());
    let user = runtime.class(&"slack.User".into()).unwrap();
    let u = user.construct(&[Value::Null, Value::from("bob")]).unwrap();
    assert_eq!(user.get_field(&u, "user").unwrap(), Value::from("bob"));

    assert_eq!(
        user.construct(&[Value::Null]).unwrap_err(),
        RuntimeError::Arity {
            callee: "slack.User".into(),
            expected: 2,
            found: 1
        }
    );
    assert_eq!(
        user.construct(&[Value::Int(1), Value::Null]).unwrap_err(),
        RuntimeError::cast(&"slack.Client".into(), "quark.int")
    );
}

#[test]
fn name_miss_is_absent_but_type_mismatch_fails() {
    let runtime = runtime(&slack());
    let user = runtime.class(&"slack.User".into()).unwrap();
    let u = user.construct(&[Value::Null, Value::Null]).unwrap();

    assert_eq!(user.get_field(&u, "nonexistent").unwrap(), Value::Null);
    user.set_field(&u, "nonexistent", Value::Int(1)).unwrap();

    let err = user.set_field(&u, "user", Value::Int(3)).unwrap_err();
    assert_eq!(err, RuntimeError::cast(&STRING.into(), "quark.int"));
    assert_eq!(user.get_field(&u, "user").unwrap(), Value::Null);

    let err = user
        .set_field(&Value::from("not a user"), "user", Value::from("x"))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::TypeCast { .. }));
}

#[test]
fn abstract_classes_refuse_construction() {
    let runtime = runtime(&slack());
    let handler = runtime.class(&"slack.SlackHandler".into()).unwrap();
    assert!(handler.is_abstract());
    assert_eq!(
        handler.construct(&[]).unwrap_err(),
        RuntimeError::AbstractInstantiation {
            class: "slack.SlackHandler".into()
        }
    );

    let bot = runtime.class(&"slack.Bot".into()).unwrap();
    assert!(!bot.is_abstract());
    let parents: Vec<_> = bot.parents().iter().map(QualifiedName::as_str).collect();
    assert_eq!(parents, vec!["slack.SlackHandler", "quark.Object"]);
}

#[test]
fn invoke_checks_receiver_and_arguments() {
    let runtime = runtime(&slack());
    runtime.register_native("slack.Client", "describe", |_, args| {
        Ok(Value::string(format!("{:?}", args[0].type_name())))
    });
    let client_class = runtime.class(&"slack.Client".into()).unwrap();
    let client = client_class.construct(&[]).unwrap();
    let user = runtime
        .class(&"slack.User".into())
        .unwrap()
        .construct(&[Value::Null, Value::Null])
        .unwrap();
    let describe = client_class.method("describe").unwrap();

    assert_eq!(
        describe.invoke(&client, &[user.clone()]).unwrap(),
        Value::from("\"slack.User\"")
    );
    assert!(matches!(
        describe.invoke(&user, &[user.clone()]).unwrap_err(),
        RuntimeError::TypeCast { .. }
    ));
    assert!(matches!(
        describe.invoke(&Value::Null, &[user.clone()]).unwrap_err(),
        RuntimeError::TypeCast { .. }
    ));
    assert!(matches!(
        describe.invoke(&client, &[client.clone()]).unwrap_err(),
        RuntimeError::TypeCast { .. }
    ));
    assert!(matches!(
        describe.invoke(&client, &[]).unwrap_err(),
        RuntimeError::Arity { .. }
    ));
}

#[test]
fn method_descriptors_expose_no_fields() {
    let runtime = runtime(&slack());
    let client = runtime.class(&"slack.Client".into()).unwrap();
    let connect = client.method("connect").unwrap();
    assert!(connect.fields().is_empty());
    assert_eq!(connect.get_field(&Value::Null, "anything").unwrap(), Value::Null);
    connect.set_field(&Value::Null, "anything", Value::Int(1)).unwrap();
}

#[test]
fn singletons_are_shared_and_initialized_once() {
    let runtime = runtime(&slack());
    let class: QualifiedName = "slack.User".into();
    let first = runtime.class(&class).unwrap();
    for _ in 0..5 {
        assert!(Arc::ptr_eq(&first, &runtime.class(&class).unwrap()));
    }
    assert_eq!(runtime.initializations(&StaticKey::singleton(class.clone())), 1);

    let module = runtime.load(&"slack".into()).unwrap();
    let via_root = module.root().get("slack_User_md").unwrap();
    assert!(via_root.same(&Value::Class(first.clone())));
    let via_ref = runtime
        .static_value(&StaticKey::class(class.clone(), "slack_User_ref"))
        .unwrap();
    assert!(via_ref.same(&Value::Class(first)));
    assert_eq!(runtime.initializations(&StaticKey::singleton(class)), 1);
}

#[test]
fn static_fields_follow_their_initializers() {
    let program = Program::new(vec![Module::new("cfg").with_class(
        ClassDescriptor::new("cfg.Settings")
            .with_field(
                FieldDescriptor::new("greeting", STRING)
                    .with_initializer(Initializer::string("hi"))
                    .into_static(),
            )
            .with_field(
                FieldDescriptor::new("alias", STRING)
                    .with_initializer(Initializer::static_ref("cfg.Settings", "greeting"))
                    .into_static(),
            )
            .with_field(
                FieldDescriptor::new("later", STRING)
                    .with_initializer(Initializer::deferred("cfg.Settings", "greeting"))
                    .into_static(),
            )
            .with_field(FieldDescriptor::new("count", INT).into_static()),
    )]);
    let runtime = runtime(&program);
    let key = |name: &str| StaticKey::class("cfg.Settings".into(), name);

    let later = runtime.static_value(&key("later")).unwrap();
    assert!(matches!(later, Value::Deferred(_)));
    assert_eq!(runtime.initializations(&key("greeting")), 0);

    assert_eq!(runtime.static_value(&key("alias")).unwrap(), Value::from("hi"));
    assert_eq!(runtime.static_value(&key("count")).unwrap(), Value::Int(0));
    assert_eq!(runtime.initializations(&key("greeting")), 1);
    match later {
        Value::Deferred(thunk) => assert_eq!(thunk.force().unwrap(), &Value::from("hi")),
        other => panic!("expected deferred value, got {other:?}"),
    }
}

fn cyclic() -> Program {
    Program::new(vec![
        Module::new("a").with_class(
            ClassDescriptor::new("a.A").with_field(FieldDescriptor::new("b", "b.B")),
        ),
        Module::new("b").with_class(
            ClassDescriptor::new("b.B").with_field(FieldDescriptor::new("a", "a.A")),
        ),
    ])
}

#[test]
fn cyclic_modules_load_and_share_symbols() {
    let runtime = runtime(&cyclic());
    let a = runtime.load(&"a".into()).unwrap();
    assert!(!runtime.is_loaded(&"b".into()));
    let handle = a.import(&"b".into()).unwrap();
    assert!(handle.is_lazy());
    assert!(!handle.is_bound());

    let b = a.imported(&"b".into()).unwrap();
    assert!(runtime.is_loaded(&"b".into()));
    let a_from_b = b.imported(&"a".into()).unwrap();
    assert!(Arc::ptr_eq(&a, &a_from_b));

    let direct = a.root().get("a_A_md").unwrap();
    let through_b = a_from_b.root().get("a_A_md").unwrap();
    assert_eq!(direct, through_b);
    assert!(direct.same(&through_b));
}

#[test]
fn eager_import_cycle_is_reported() {
    let mut plan = qk_reflect::plan_program(&cyclic()).unwrap();
    for module in &mut plan.modules {
        for unit in &mut module.units {
            let eager = match unit {
                EmissionUnit::LazyImport(import) => EmissionUnit::EagerImport(import.clone()),
                _ => continue,
            };
            *unit = eager;
        }
    }
    let runtime = Runtime::new(plan);
    assert_eq!(
        runtime.load(&"a".into()).unwrap_err(),
        RuntimeError::LoadCycle {
            path: vec!["a".into(), "b".into(), "a".into()]
        }
    );
    assert!(!runtime.is_loaded(&"a".into()));
}

#[test]
fn unknown_names_are_reported() {
    let runtime = runtime(&slack());
    assert_eq!(
        runtime.class(&"slack.Nope".into()).unwrap_err(),
        RuntimeError::UnknownClass("slack.Nope".into())
    );
    assert_eq!(
        runtime.load(&"nope".into()).unwrap_err(),
        RuntimeError::UnknownModule("nope".into())
    );
}
