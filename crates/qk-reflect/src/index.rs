use std::collections::{HashMap, HashSet};

use qk_core::ir::{ClassDescriptor, Program, QualifiedName};
use qk_core::{Error, Result};

/// Lookup tables over a borrowed program.
pub struct ProgramIndex<'a> {
    pub program: &'a Program,
    classes: HashMap<&'a QualifiedName, &'a ClassDescriptor>,
    owners: HashMap<&'a QualifiedName, &'a QualifiedName>,
}

impl<'a> ProgramIndex<'a> {
    pub fn build(program: &'a Program) -> Result<Self> {
        let mut classes = HashMap::new();
        let mut owners = HashMap::new();
        let mut modules = HashSet::new();
        for module in &program.modules {
            if !modules.insert(&module.name) {
                return Err(Error::ir(format!("duplicate module `{}`", module.name)));
            }
            for class in &module.classes {
                if classes.insert(&class.name, class).is_some() {
                    return Err(Error::ir(format!(
                        "duplicate class `{}` (second definition in module `{}`)",
                        class.name, module.name
                    )));
                }
                owners.insert(&class.name, &module.name);
            }
        }
        Ok(Self {
            program,
            classes,
            owners,
        })
    }

    pub fn class(&self, name: &QualifiedName) -> Option<&'a ClassDescriptor> {
        self.classes.get(name).copied()
    }

    pub fn module_of(&self, class: &QualifiedName) -> Option<&'a QualifiedName> {
        self.owners.get(class).copied()
    }

    /// Defined by the program or provided by the runtime library.
    pub fn is_known(&self, name: &QualifiedName) -> bool {
        self.classes.contains_key(name) || self.program.is_extern(name)
    }

    pub fn require_class(&self, name: &QualifiedName, context: &str) -> Result<&'a ClassDescriptor> {
        self.class(name)
            .ok_or_else(|| Error::ir(format!("{context}: unknown class `{name}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qk_core::ir::Module;

    #[test]
    fn rejects_duplicate_qualified_names() {
        let program = Program::new(vec![
            Module::new("a").with_class(ClassDescriptor::new("a.A")),
            Module::new("b").with_class(ClassDescriptor::new("a.A")),
        ]);
        let err = ProgramIndex::build(&program).err().unwrap();
        assert!(matches!(err, Error::IrConsistency(_)));
    }

    #[test]
    fn maps_classes_to_modules() {
        let program = Program::new(vec![Module::new("a").with_class(ClassDescriptor::new("a.A"))]);
        let index = ProgramIndex::build(&program).unwrap();
        assert_eq!(index.module_of(&"a.A".into()).unwrap().as_str(), "a");
        assert!(index.is_known(&"quark.Object".into()));
        assert!(!index.is_known(&"b.B".into()));
    }
}
