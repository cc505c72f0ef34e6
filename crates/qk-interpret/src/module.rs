use std::sync::Arc;

use qk_core::ir::QualifiedName;

use crate::error::{RuntimeError, RuntimeResult};
use crate::lazy::Thunk;
use crate::value::Value;

/// How a loaded module holds one of its dependencies.
#[derive(Debug, Clone)]
pub enum ImportHandle {
    Eager(Arc<LoadedModule>),
    /// Bound on first access, cached afterwards.
    Lazy(Arc<Thunk<Arc<LoadedModule>>>),
}

impl ImportHandle {
    pub fn is_lazy(&self) -> bool {
        matches!(self, ImportHandle::Lazy(_))
    }

    pub fn is_bound(&self) -> bool {
        match self {
            ImportHandle::Eager(_) => true,
            ImportHandle::Lazy(thunk) => thunk.is_resolved(),
        }
    }

    pub fn get(&self) -> RuntimeResult<Arc<LoadedModule>> {
        match self {
            ImportHandle::Eager(module) => Ok(module.clone()),
            ImportHandle::Lazy(thunk) => thunk.force().cloned(),
        }
    }
}

/// The per-module `Root`: reflection singletons under their `_md` names.
#[derive(Debug)]
pub struct Root {
    pub(crate) entries: Vec<(String, Arc<Thunk<Value>>)>,
}

impl Root {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> RuntimeResult<Value> {
        let (_, thunk) = self
            .entries
            .iter()
            .find(|(entry, _)| entry == name)
            .ok_or_else(|| RuntimeError::UnknownStatic(name.to_string()))?;
        thunk.force().cloned()
    }
}

#[derive(Debug)]
pub struct LoadedModule {
    pub(crate) name: QualifiedName,
    pub(crate) metadata_module: String,
    pub(crate) imports: Vec<(QualifiedName, ImportHandle)>,
    pub(crate) root: Root,
}

impl LoadedModule {
    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn metadata_module(&self) -> &str {
        &self.metadata_module
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn import(&self, target: &QualifiedName) -> Option<&ImportHandle> {
        self.imports
            .iter()
            .find(|(name, _)| name == target)
            .map(|(_, handle)| handle)
    }

    /// The imported module, loading it now if the import is lazy.
    pub fn imported(&self, target: &QualifiedName) -> RuntimeResult<Arc<LoadedModule>> {
        self.import(target)
            .ok_or_else(|| RuntimeError::UnknownModule(target.clone()))?
            .get()
    }
}
