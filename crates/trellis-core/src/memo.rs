//! Derived-value cache backing `use_memo` and `use_callback`.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::key::HookKey;

/// Mapping from hook key to a cached value.
///
/// Values are only touched from the render thread, so plain `Rc`/`RefCell`
/// storage is enough here.
#[derive(Default)]
pub struct MemoStore {
    values: RefCell<HashMap<HookKey, Box<dyn Any>>>,
}

impl MemoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &HookKey) -> bool {
        self.values.borrow().contains_key(key)
    }

    /// Clone out the cached value for `key`.
    pub fn get<T: Clone + 'static>(&self, key: &HookKey) -> Option<T> {
        self.values.borrow().get(key).map(|value| {
            value.downcast_ref::<T>().cloned().unwrap_or_else(|| {
                panic!(
                    "trellis hooks error: memo at `{}` holds a different type than `{}`",
                    key,
                    std::any::type_name::<T>()
                )
            })
        })
    }

    pub fn insert<T: 'static>(&self, key: HookKey, value: T) {
        self.values.borrow_mut().insert(key, Box::new(value));
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

/// Stable, cheaply clonable handle to a cached callback.
///
/// Two handles are the same callback iff [`Callback::ptr_eq`] holds; the
/// cache only swaps the handle when a dependency changed.
pub struct Callback<A, R = ()> {
    f: Rc<dyn Fn(A) -> R>,
}

impl<A, R> Callback<A, R> {
    pub fn new(f: impl Fn(A) -> R + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    pub fn call(&self, args: A) -> R {
        (self.f)(args)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }
}

impl<A, R> Clone for Callback<A, R> {
    fn clone(&self) -> Self {
        Self {
            f: Rc::clone(&self.f),
        }
    }
}

impl<A, R> fmt::Debug for Callback<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(...)")
    }
}

/// Mapping from hook key to the currently cached callback.
#[derive(Default)]
pub struct CallbackStore {
    inner: MemoStore,
}

impl CallbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &HookKey) -> bool {
        self.inner.contains(key)
    }

    pub fn get<A: 'static, R: 'static>(&self, key: &HookKey) -> Option<Callback<A, R>> {
        self.inner.get::<Callback<A, R>>(key)
    }

    pub fn insert<A: 'static, R: 'static>(&self, key: HookKey, callback: Callback<A, R>) {
        self.inner.insert(key, callback);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{CallSite, KeyAllocator};

    #[test]
    fn memo_store_round_trips_typed_values() {
        let store = MemoStore::new();
        let key = KeyAllocator::new().next(CallSite::caller());
        assert_eq!(store.get::<u32>(&key), None);
        store.insert(key, 7u32);
        assert_eq!(store.get::<u32>(&key), Some(7));
        assert!(store.contains(&key));
    }

    #[test]
    fn callback_identity_survives_clone() {
        let cb = Callback::new(|n: i32| n * 2);
        let other = cb.clone();
        assert!(cb.ptr_eq(&other));
        assert_eq!(other.call(21), 42);
        assert!(!cb.ptr_eq(&Callback::new(|n: i32| n * 2)));
    }

    #[test]
    fn callback_store_returns_the_stored_handle() {
        let store = CallbackStore::new();
        let key = KeyAllocator::new().next(CallSite::caller());
        let cb: Callback<(), &'static str> = Callback::new(|()| "hi");
        store.insert(key, cb.clone());
        let loaded = store.get::<(), &'static str>(&key).expect("stored");
        assert!(loaded.ptr_eq(&cb));
        assert_eq!(store.len(), 1);
    }
}
