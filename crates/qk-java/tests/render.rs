use pretty_assertions::assert_eq;
use qk_core::config::GenerationOptions;
use qk_core::emit::{Backend, EmittedFile};
use qk_core::ir::{
    ClassDescriptor, FieldDescriptor, Initializer, MethodDescriptor, Module, ParameterDescriptor,
    Program, LONG, STRING,
};
use qk_java::JavaBackend;

fn emit(program: &Program, options: &GenerationOptions) -> Vec<EmittedFile> {
    let plan = qk_reflect::plan_program(program).unwrap();
    JavaBackend::new().emit(&plan, options).unwrap()
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
fn one_file_per_class() {
    let files = emit(&foo(), &GenerationOptions::default());
    let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "org/example/foo/Foo.java",
            "org_example_foo_md/org_example_foo_Foo_test_Method.java",
            "org_example_foo_md/org_example_foo_Foo.java",
            "org_example_foo_md/Root.java",
        ]
    );
    assert!(files[0].contents.starts_with(
        "// Code generated by qk. DO NOT EDIT.\n\npackage org.example.foo;\n\n\
         public class Foo implements io.datawire.quark.runtime.QObject {\n"
    ));
}

#[test]
fn statics_are_synchronized_even_without_the_option() {
    let files = emit(&foo(), &GenerationOptions::default().with_guarded_lazy(false));
    let md = file(&files, "org_example_foo_md/org_example_foo_Foo.java");
    assert!(md.contains(
        "    public static synchronized org_example_foo_md.org_example_foo_Foo singleton() {\n\
         \x20       if (!singleton__ready) {\n\
         \x20           singleton__value = new org_example_foo_md.org_example_foo_Foo();\n\
         \x20           singleton__ready = true;\n\
         \x20       }\n\
         \x20       return singleton__value;\n\
         \x20   }\n"
    ));

    let root = file(&files, "org_example_foo_md/Root.java");
    assert!(root.contains(
        "org_example_foo_Foo_md__value = org_example_foo_md.org_example_foo_Foo.singleton();"
    ));
    assert!(root.contains("return Root.org_example_foo_Foo_md();"));

    let main = file(&files, "org/example/foo/Foo.java");
    assert!(main.contains("public static synchronized quark.reflect.Class org_example_foo_Foo_ref() {"));
    assert!(main.contains(
        "org_example_foo_Foo_ref__value = org_example_foo_md.Root.org_example_foo_Foo_md();"
    ));
}

#[test]
fn method_descriptor_invokes_through_a_cast() {
    let files = emit(&foo(), &GenerationOptions::default());
    let method = file(
        &files,
        "org_example_foo_md/org_example_foo_Foo_test_Method.java",
    );
    assert!(method.contains(
        "public class org_example_foo_Foo_test_Method extends quark.reflect.Method \
         implements io.datawire.quark.runtime.QObject {"
    ));
    assert!(method.contains(
        "    public Object invoke(Object object, java.util.ArrayList<Object> args) {\n\
         \x20       org.example.foo.Foo obj = (org.example.foo.Foo) (object);\n\
         \x20       (obj).test();\n\
         \x20       return null;\n\
         \x20   }\n"
    ));
    assert!(method.contains("    public void _setField(String name, Object value) {}\n"));

    let class = file(&files, "org_example_foo_md/org_example_foo_Foo.java");
    assert!(class.contains(
        "(this).methods = new java.util.ArrayList<quark.reflect.Method>(java.util.Arrays.asList(\
         new quark.reflect.Method[]{new org_example_foo_md.org_example_foo_Foo_test_Method()}));"
    ));
    assert!(class.contains("return new org.example.foo.Foo();"));
}

#[test]
fn shims_are_merged_into_native_classes() {
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
    let user = file(&files, "slack/User.java");
    assert!(user.contains("    public slack.Client client = null;\n"));
    assert!(user.contains("    public User(slack.Client client, String user) {\n"));
    assert!(user.contains("    public User() {}\n"));
    assert!(user.contains(
        "        if ((name)==(\"user\") || ((name) != null && (name).equals(\"user\"))) {\n\
         \x20           (this).user = (String) (value);\n\
         \x20       }\n"
    ));

    let md = file(&files, "slack_md/slack_User.java");
    assert!(md.contains(
        "return new slack.User((slack.Client) ((args).get(0)), (String) ((args).get(1)));"
    ));
    let handler = file(&files, "slack_md/slack_SlackHandler.java");
    assert!(!handler.contains("construct"));
    assert!(handler.contains("    public Boolean isAbstract() {\n        return true;\n    }\n"));
    assert!(file(&files, "slack/SlackHandler.java").contains("public abstract class SlackHandler"));
}

#[test]
fn static_fields_become_typed_holders() {
    let program = Program::new(vec![Module::new("counters").with_class(
        ClassDescriptor::new("counters.Counter").with_field(
            FieldDescriptor::new("start", LONG)
                .with_initializer(Initializer::Int { value: 7 })
                .into_static(),
        ),
    )]);
    let files = emit(&program, &GenerationOptions::default());
    let counter = file(&files, "counters/Counter.java");
    assert!(counter.contains("public static synchronized Long start() {"));
    assert!(counter.contains("start__value = 7L;"));
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
fn subclass_accessors_delegate_to_super() {
    let files = emit(&zoo(), &GenerationOptions::default());
    let bird = file(&files, "zoo/Bird.java");
    assert!(bird.contains("public class Bird extends zoo.Animal"));
    assert!(bird.contains(
        "            return (this).wingspan;\n\
         \x20       }\n\
         \x20       return super._getField(name);\n\
         \x20   }\n"
    ));
    assert!(bird.contains(
        "            (this).wingspan = (Integer) (value);\n\
         \x20           return;\n\
         \x20       }\n\
         \x20       super._setField(name, value);\n\
         \x20   }\n"
    ));
    let animal = file(&files, "zoo/Animal.java");
    assert!(!animal.contains("super._getField"));
    assert!(!animal.contains("super._setField"));
}
