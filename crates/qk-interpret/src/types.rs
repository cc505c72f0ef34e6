//! Checked downcasts used by `setField`, `construct` and `invoke`.

use std::collections::{HashMap, HashSet, VecDeque};

use qk_core::emit::GenerationPlan;
use qk_core::ir::{Primitive, QualifiedName, REFLECT_CLASS, REFLECT_METHOD, ROOT_CLASS};

use crate::error::{RuntimeError, RuntimeResult};
use crate::value::Value;

/// Declared parents of every generated class.
#[derive(Debug, Default)]
pub struct TypeTable {
    parents: HashMap<QualifiedName, Vec<QualifiedName>>,
}

impl TypeTable {
    pub fn from_plan(plan: &GenerationPlan) -> Self {
        let parents = plan
            .modules
            .iter()
            .flat_map(|module| module.native_classes())
            .map(|class| (class.name.clone(), class.parents.clone()))
            .collect();
        Self { parents }
    }

    pub fn contains(&self, class: &QualifiedName) -> bool {
        self.parents.contains_key(class)
    }

    /// `class` is `ancestor` or inherits from it through any parent chain.
    pub fn is_subclass(&self, class: &QualifiedName, ancestor: &QualifiedName) -> bool {
        if class == ancestor || ancestor.as_str() == ROOT_CLASS {
            return true;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([class]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            for parent in self.parents.get(current).into_iter().flatten() {
                if parent == ancestor {
                    return true;
                }
                queue.push_back(parent);
            }
        }
        false
    }

    /// Check `value` against `ty`. Null passes every cast; deferred
    /// references are resolved first.
    pub fn cast(&self, value: Value, ty: &QualifiedName) -> RuntimeResult<Value> {
        if let Value::Deferred(thunk) = &value {
            let resolved = thunk.force()?.clone();
            return self.cast(resolved, ty);
        }
        if value.is_null() || ty.as_str() == ROOT_CLASS {
            return Ok(value);
        }
        let ok = match (Primitive::of(ty), &value) {
            (Some(Primitive::Bool), Value::Bool(_)) => true,
            (Some(Primitive::Int | Primitive::Long), Value::Int(_)) => true,
            (Some(Primitive::Float), Value::Float(_)) => true,
            (Some(Primitive::String), Value::String(_)) => true,
            (Some(_), _) => false,
            (None, Value::Object(obj)) => self.is_subclass(obj.class(), ty),
            (None, Value::Class(_)) => ty.as_str() == REFLECT_CLASS,
            (None, Value::Method(_)) => ty.as_str() == REFLECT_METHOD,
            (None, _) => false,
        };
        if ok {
            Ok(value)
        } else {
            Err(RuntimeError::cast(ty, value.type_name()))
        }
    }
}
