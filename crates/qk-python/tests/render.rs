use pretty_assertions::assert_eq;
use qk_core::config::GenerationOptions;
use qk_core::emit::{Backend, EmittedFile};
use qk_core::ir::{
    ClassDescriptor, FieldDescriptor, MethodDescriptor, Module, ParameterDescriptor, Program,
    STRING,
};
use qk_python::PythonBackend;

fn emit(program: &Program, options: &GenerationOptions) -> Vec<EmittedFile> {
    let plan = qk_reflect::plan_program(program).unwrap();
    PythonBackend::new().emit(&plan, options).unwrap()
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
        .with_class(ClassDescriptor::new("slack.Client"))
        .with_class(ClassDescriptor::new("slack.SlackHandler").into_abstract())])
}

#[test]
fn package_and_metadata_package() {
    let files = emit(&foo(), &GenerationOptions::default());
    let paths: Vec<_> = files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["org_example_foo/__init__.py", "org_example_foo_md/__init__.py"]
    );
    assert!(files[0].contents.starts_with("# Code generated by qk. DO NOT EDIT.\n"));
    assert!(file(&files, "org_example_foo_md/__init__.py").contains("import org_example_foo\n"));
}

#[test]
fn method_reflection_invokes_through_a_cast() {
    let files = emit(&foo(), &GenerationOptions::default());
    let md = file(&files, "org_example_foo_md/__init__.py");
    assert!(md.contains(
        "class org_example_foo_Foo_test_Method(quark.reflect.Method):\n\
         \x20   def __init__(self):\n\
         \x20       super().__init__(\"quark.void\", \"test\", [])\n"
    ));
    assert!(md.contains(
        "    def invoke(self, object, args):\n\
         \x20       obj = _qrt.cast(object, lambda: org_example_foo.Foo)\n\
         \x20       obj.test()\n\
         \x20       return None\n"
    ));
    assert!(md.contains("        self.methods = [org_example_foo_Foo_test_Method()]\n"));
    assert!(md.contains("        self.parents = [\"quark.Object\"]\n"));
}

#[test]
fn root_is_declared_before_its_statics() {
    let files = emit(&foo(), &GenerationOptions::default().with_guarded_lazy(false));
    let md = file(&files, "org_example_foo_md/__init__.py");
    let root_type = md.find("class Root(object):").unwrap();
    let singleton = md
        .find(
            "_qrt.lazy_static(org_example_foo_Foo, \"singleton\", \
             lambda: org_example_foo_Foo())",
        )
        .unwrap();
    let entry = md
        .find(
            "_qrt.lazy_static(Root, \"org_example_foo_Foo_md\", \
             lambda: org_example_foo_Foo.singleton)",
        )
        .unwrap();
    assert!(root_type < singleton);
    assert!(singleton < entry);
    assert!(md.contains(
        "        if name == \"org_example_foo_Foo_md\":\n\
         \x20           return Root.org_example_foo_Foo_md\n"
    ));

    let main = file(&files, "org_example_foo/__init__.py");
    assert!(main.contains(
        "_qrt.lazy_static(Foo, \"org_example_foo_Foo_ref\", \
         lambda: org_example_foo_md.Root.org_example_foo_Foo_md)"
    ));
    assert!(main.contains("org_example_foo_md = _qrt.lazy_import(\"org_example_foo_md\")"));
}

#[test]
fn guarded_mode_uses_locked_statics() {
    let files = emit(&foo(), &GenerationOptions::default().with_guarded_lazy(true));
    let md = file(&files, "org_example_foo_md/__init__.py");
    assert!(md.contains("_qrt.guarded_static(org_example_foo_Foo, \"singleton\""));
    assert!(!md.contains("_qrt.lazy_static("));
}

#[test]
fn shims_branch_on_field_names() {
    let files = emit(&slack(), &GenerationOptions::default());
    let main = file(&files, "slack/__init__.py");
    assert!(main.contains(
        "def _User__setField(self, name, value):\n\
         \x20   if name == \"client\":\n\
         \x20       self.client = _qrt.cast(value, lambda: Client)\n\
         \x20   if name == \"user\":\n\
         \x20       self.user = _qrt.cast(value, lambda: str)\n"
    ));
    assert!(main.contains("User._setField = _User__setField\n"));
    assert!(main.contains("    def __init__(self, client=None, user=None):\n"));
    assert!(main.contains("        self.user = user\n"));

    let md = file(&files, "slack_md/__init__.py");
    assert!(md.contains(
        "return slack.User(_qrt.cast(args[0], lambda: slack.Client), \
         _qrt.cast(args[1], lambda: str))"
    ));
    let handler = &md[md.find("class slack_SlackHandler(quark.reflect.Class):").unwrap()..];
    let handler = &handler[..handler.find("class Root").unwrap_or(handler.len())];
    assert!(!handler.contains("def construct"));
    assert!(handler.contains("    def isAbstract(self):\n        return True\n"));
}

#[test]
fn field_less_shims_fall_through() {
    let files = emit(&foo(), &GenerationOptions::default());
    let main = file(&files, "org_example_foo/__init__.py");
    assert!(main.contains(
        "def _Foo__getField(self, name):\n\
         \x20   return None\n"
    ));
    assert!(main.contains(
        "def _Foo__setField(self, name, value):\n\
         \x20   pass\n"
    ));
}

#[test]
fn cyclic_packages_import_each_other_lazily() {
    let program = Program::new(vec![
        Module::new("a").with_class(
            ClassDescriptor::new("a.A").with_field(FieldDescriptor::new("b", "b.B")),
        ),
        Module::new("b").with_class(
            ClassDescriptor::new("b.B").with_field(FieldDescriptor::new("a", "a.A")),
        ),
    ]);
    let files = emit(&program, &GenerationOptions::default());
    let a = file(&files, "a/__init__.py");
    assert!(a.contains("b = _qrt.lazy_import(\"b\")"));
    assert!(a.contains("self.b = _qrt.cast(value, lambda: b.B)"));
    assert!(!a.contains("import b\n"));
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
fn subclass_accessors_delegate_to_the_base_class() {
    let files = emit(&zoo(), &GenerationOptions::default());
    let main = file(&files, "zoo/__init__.py");
    assert!(main.contains("    return Animal._getField(self, name)\n"));
    assert!(main.contains("    Animal._setField(self, name, value)\n"));
    assert!(main.contains("        return\n"));
    assert_eq!(main.matches("._getField(self, name)").count(), 1);
}
