use pretty_assertions::assert_eq;
use qk_core::config::GenerationOptions;
use qk_core::emit::{Backend, EmittedFile};
use qk_core::ir::{
    ClassDescriptor, FieldDescriptor, MethodDescriptor, Module, ParameterDescriptor, Program,
    STRING,
};
use qk_javascript::JavaScriptBackend;

fn emit(program: &Program, options: &GenerationOptions) -> Vec<EmittedFile> {
    let plan = qk_reflect::plan_program(program).unwrap();
    JavaScriptBackend::new().emit(&plan, options).unwrap()
}

fn file<'a>(files: &'a [EmittedFile], path: &str) -> &'a str {
    &files
        .iter()
        .find(|file| file.path == path)
        .unwrap_or_else(|| panic!("missing {path}"))
        .contents
}

fn foo() -> Program {
    Program::new(vec![Module::new("org.example.foo").with_class(
        ClassDescriptor::new("org.example.foo.Foo").with_method(MethodDescriptor::stub("test")),
    )])
}

#[test]
fn module_and_metadata_files() {
    let files = emit(&foo(), &GenerationOptions::default());
    let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["org_example_foo/index.js", "org_example_foo_md/index.js"]
    );
    assert!(files[0].contents.starts_with("// Code generated by qk. DO NOT EDIT.\n"));
}

#[test]
fn method_reflection_invokes_through_a_cast() {
    let files = emit(&foo(), &GenerationOptions::default());
    let md = file(&files, "org_example_foo_md/index.js");
    assert!(md.contains(
        "function org_example_foo_Foo_test_Method_invoke(object, args) {\n\
         \x20   var obj = _qrt.cast(object, function () { return org_example_foo.Foo; });\n\
         \x20   obj.test();\n\
         \x20   return null;\n\
         }\n"
    ));
    assert!(md.contains(
        "org_example_foo_Foo_test_Method.super_.call(this, \"quark.void\", \"test\", []);"
    ));
    assert!(md.contains("this.fields = [];"));
    assert!(md.contains("this.methods = [new org_example_foo_Foo_test_Method()];"));
    assert!(md.contains("this.parents = [\"quark.Object\"];"));
}

#[test]
fn statics_are_lazy_and_root_follows_reflection() {
    let files = emit(&foo(), &GenerationOptions::default().with_guarded_lazy(false));
    let md = file(&files, "org_example_foo_md/index.js");
    let singleton = md
        .find(
            "_qrt.lazyStatic(org_example_foo_Foo, \"singleton\", function () {\n\
             \x20   return new org_example_foo_Foo();\n\
             });",
        )
        .unwrap();
    let root_type = md.find("function Root() {}").unwrap();
    let entry = md
        .find(
            "_qrt.lazyStatic(Root, \"org_example_foo_Foo_md\", function () {\n\
             \x20   return org_example_foo_Foo.singleton;\n\
             });",
        )
        .unwrap();
    assert!(root_type < singleton);
    assert!(singleton < entry);

    let main = file(&files, "org_example_foo/index.js");
    assert!(main.contains(
        "_qrt.lazyStatic(Foo, \"org_example_foo_Foo_ref\", function () {\n\
         \x20   return org_example_foo_md.Root.org_example_foo_Foo_md;\n\
         });"
    ));
    assert!(main.contains("var org_example_foo_md; _qrt.lazyImport('../org_example_foo_md/index.js', function(){"));
}

#[test]
fn guarded_mode_uses_locked_statics() {
    let files = emit(&foo(), &GenerationOptions::default().with_guarded_lazy(true));
    let md = file(&files, "org_example_foo_md/index.js");
    assert!(md.contains("_qrt.guardedStatic(org_example_foo_Foo, \"singleton\""));
    assert!(!md.contains("_qrt.lazyStatic("));
}

#[test]
fn shims_branch_on_field_names() {
    let program = Program::new(vec![Module::new("slack")
        .with_class(
            ClassDescriptor::new("slack.User")
                .with_field(FieldDescriptor::new("client", "slack.Client"))
                .with_field(FieldDescriptor::new("user", STRING))
                .with_constructor(vec![
                    ParameterDescriptor::new("client", "slack.Client"),
                    ParameterDescriptor::new("user", STRING),
                ]),
        )
        .with_class(ClassDescriptor::new("slack.Client"))
        .with_class(ClassDescriptor::new("slack.SlackHandler").into_abstract())]);
    let files = emit(&program, &GenerationOptions::default());
    let main = file(&files, "slack/index.js");
    assert!(main.contains(
        "function User__setField(name, value) {\n\
         \x20   if (name === \"client\") {\n\
         \x20       this.client = _qrt.cast(value, function () { return Client; });\n\
         \x20   }\n\
         \x20   if (name === \"user\") {\n\
         \x20       this.user = _qrt.cast(value, function () { return String; });\n\
         \x20   }\n\
         }\n"
    ));
    assert!(main.contains("function User(client, user) {"));
    assert!(main.contains("    this.user = user;\n"));

    let md = file(&files, "slack_md/index.js");
    assert!(md.contains(
        "return new slack.User(_qrt.cast(args[0], function () { return slack.Client; }), \
         _qrt.cast(args[1], function () { return String; }));"
    ));
    assert!(!md.contains("slack_SlackHandler_construct"));
    assert!(md.contains("function slack_SlackHandler_isAbstract() {\n    return true;\n}"));
}

#[test]
fn cyclic_modules_import_each_other_lazily() {
    let program = Program::new(vec![
        Module::new("a").with_class(
            ClassDescriptor::new("a.A").with_field(FieldDescriptor::new("b", "b.B")),
        ),
        Module::new("b").with_class(
            ClassDescriptor::new("b.B").with_field(FieldDescriptor::new("a", "a.A")),
        ),
    ]);
    let files = emit(&program, &GenerationOptions::default());
    let a = file(&files, "a/index.js");
    assert!(a.contains(
        "var b; _qrt.lazyImport('../b/index.js', function(){\n    b = require('../b/index.js');\n});"
    ));
    assert!(a.contains("this.b = _qrt.cast(value, function () { return b.B; });"));
    assert!(!a.contains("var b = require"));
}

fn zoo() -> Program {
    Program::new(vec![Module::new("zoo")
        .with_class(ClassDescriptor::new("zoo.Animal").with_field(FieldDescriptor::new("name", STRING)))
        .with_class(
            ClassDescriptor::new("zoo.Bird")
                .with_parent("zoo.Animal")
                .with_field(FieldDescriptor::new("wingspan", "quark.int")),
        )])
}

#[test]
fn subclass_accessors_delegate_to_the_base_prototype() {
    let files = emit(&zoo(), &GenerationOptions::default());
    let main = file(&files, "zoo/index.js");
    assert!(main.contains("    return Animal.prototype._getField.call(this, name);\n}\n"));
    assert!(main.contains("    Animal.prototype._setField.call(this, name, value);\n}\n"));
    assert!(main.contains("    Animal.prototype.__init_fields__.call(this);\n"));
    assert_eq!(main.matches("prototype._getField.call").count(), 1);
}
