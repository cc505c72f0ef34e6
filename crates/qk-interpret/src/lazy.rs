//! Run-once thunks backing lazy statics and lazy imports.

use std::fmt;
use std::thread::{self, ThreadId};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::{RuntimeError, RuntimeResult};

type Init<T> = Box<dyn Fn() -> RuntimeResult<T> + Send + Sync>;

/// A value computed on first use and shared by every holder afterwards.
///
/// The cell is a first-class value: dependents can hold an `Arc<Thunk<_>>`
/// before anything has been computed. Concurrent first uses are serialized;
/// a thread forcing the thunk from inside its own initializer gets
/// [`RuntimeError::CircularInitialization`] instead of a deadlock. A failed
/// initializer leaves the thunk unresolved, so the next access retries.
pub struct Thunk<T> {
    name: String,
    cell: OnceCell<T>,
    owner: Mutex<Option<ThreadId>>,
    init: Init<T>,
}

impl<T> Thunk<T> {
    pub fn new<F>(name: impl Into<String>, init: F) -> Self
    where
        F: Fn() -> RuntimeResult<T> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            cell: OnceCell::new(),
            owner: Mutex::new(None),
            init: Box::new(init),
        }
    }

    /// Already resolved; the initializer never runs.
    pub fn ready(name: impl Into<String>, value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        let name = name.into();
        let cell = OnceCell::new();
        let _ = cell.set(value);
        let unreachable = name.clone();
        Self {
            name,
            cell,
            owner: Mutex::new(None),
            init: Box::new(move || {
                Err(RuntimeError::CircularInitialization {
                    name: unreachable.clone(),
                })
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn force(&self) -> RuntimeResult<&T> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let me = thread::current().id();
        if *self.owner.lock() == Some(me) {
            return Err(RuntimeError::CircularInitialization {
                name: self.name.clone(),
            });
        }
        self.cell.get_or_try_init(|| {
            let _owner = OwnerGuard::claim(&self.owner, me);
            (self.init)()
        })
    }
}

/// Marks the initializing thread; released on return and on unwind.
struct OwnerGuard<'a> {
    owner: &'a Mutex<Option<ThreadId>>,
}

impl<'a> OwnerGuard<'a> {
    fn claim(owner: &'a Mutex<Option<ThreadId>>, me: ThreadId) -> Self {
        *owner.lock() = Some(me);
        Self { owner }
    }
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        *self.owner.lock() = None;
    }
}

impl<T: fmt::Debug> fmt::Debug for Thunk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thunk")
            .field("name", &self.name)
            .field("value", &self.cell.get())
            .finish()
    }
}
