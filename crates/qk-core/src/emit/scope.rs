use std::collections::HashMap;

use super::{ModulePlan, StaticKey, StaticOwner};
use crate::ir::QualifiedName;

/// Where the classes a module mentions live, as seen from that module.
///
/// Built from the module's own native classes and the symbol lists of its
/// imports; anything else is provided by the target runtime library.
#[derive(Debug, Clone)]
pub struct ModuleScope {
    pub module: QualifiedName,
    pub metadata_module: String,
    owners: HashMap<QualifiedName, QualifiedName>,
}

impl ModuleScope {
    pub fn new(plan: &ModulePlan) -> Self {
        let mut owners = HashMap::new();
        for import in plan.imports() {
            for symbol in &import.symbols {
                owners.insert(symbol.clone(), import.target.clone());
            }
        }
        for class in plan.native_classes() {
            owners.insert(class.name.clone(), plan.module.clone());
        }
        Self {
            module: plan.module.clone(),
            metadata_module: plan.metadata_module.clone(),
            owners,
        }
    }

    pub fn module_of(&self, class: &QualifiedName) -> Option<&QualifiedName> {
        self.owners.get(class)
    }

    pub fn is_local(&self, class: &QualifiedName) -> bool {
        self.module_of(class) == Some(&self.module)
    }

    /// Classes neither declared here nor imported come from the runtime
    /// library.
    pub fn is_extern(&self, class: &QualifiedName) -> bool {
        self.module_of(class).is_none()
    }
}

/// Statics declared on native classes live with the classes; reflection
/// singletons and root entries live in the metadata module.
pub fn is_class_static(key: &StaticKey) -> bool {
    matches!(key.owner, StaticOwner::Class(_))
}
