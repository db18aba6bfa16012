//! State cells and the store that keeps them alive across renders.
//!
//! A cell is created the first time its [`HookKey`] is seen and is never
//! dropped afterwards. Handles returned to components point at the cell
//! itself, so two handles obtained at the same call site in different passes
//! compare equal with [`State::same_cell`].

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use crate::key::HookKey;

/// Receives a notification whenever a setter mutates a cell.
///
/// The render loop implements this by enqueueing a render signal.
pub trait Scheduler: Send + Sync {
    fn request_render(&self);
}

/// Whether a render pass is currently running.
///
/// Shared between the [`Scope`](crate::Scope) and every setter so that
/// mutations made mid-pass are attributed to the next pass. Setters hold the
/// read side while they touch a cell's flags; pass transitions take the write
/// side, so a write lands either wholly before or wholly after a transition.
#[derive(Debug, Default)]
pub struct RenderPhase {
    rendering: RwLock<bool>,
}

impl RenderPhase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_rendering(&self) -> bool {
        *self.read()
    }

    pub(crate) fn set_rendering(&self, rendering: bool) {
        self.transition(rendering, || {});
    }

    /// Run `f` with writers held off, then switch to `rendering`.
    pub(crate) fn transition(&self, rendering: bool, f: impl FnOnce()) {
        let mut phase = self.rendering.write().unwrap_or_else(PoisonError::into_inner);
        f();
        *phase = rendering;
    }

    fn read(&self) -> RwLockReadGuard<'_, bool> {
        self.rendering.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Unique identifier of a state cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct CellId(u64);

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

static NEXT_CELL_ID: AtomicU64 = AtomicU64::new(0);

fn next_cell_id() -> CellId {
    CellId(NEXT_CELL_ID.fetch_add(1, Ordering::SeqCst))
}

struct Slot<T> {
    value: T,
    changed: bool,
    /// Raised by setters that ran while a pass was in progress.
    pending: bool,
    version: u64,
}

/// Storage unit behind a [`State`] handle.
pub struct StateCell<T> {
    id: CellId,
    slot: Mutex<Slot<T>>,
    phase: Arc<RenderPhase>,
    scheduler: Arc<dyn Scheduler>,
}

impl<T> StateCell<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, value: T) {
        {
            let rendering = self.phase.read();
            let mut slot = self.lock();
            slot.value = value;
            slot.version += 1;
            if *rendering {
                slot.pending = true;
            } else {
                slot.changed = true;
            }
        }
        self.scheduler.request_render();
    }
}

/// Type-erased view of a cell used for change bookkeeping.
pub(crate) trait TrackedCell: Send + Sync {
    fn has_changed(&self) -> bool;
    /// Exit action of a pass: pending changes become visible, the rest clear.
    fn settle(&self);
    /// Make pending changes visible without clearing anything.
    fn promote_pending(&self);
}

impl<T: Send> TrackedCell for StateCell<T> {
    fn has_changed(&self) -> bool {
        self.lock().changed
    }

    fn settle(&self) {
        let mut slot = self.lock();
        slot.changed = std::mem::take(&mut slot.pending);
    }

    fn promote_pending(&self) {
        let mut slot = self.lock();
        if std::mem::take(&mut slot.pending) {
            slot.changed = true;
        }
    }
}

/// Stable handle to a state cell.
pub struct State<T> {
    cell: Arc<StateCell<T>>,
}

impl<T> State<T> {
    pub fn cell_id(&self) -> CellId {
        self.cell.id
    }

    /// Whether both handles point at the same cell.
    pub fn same_cell(&self, other: &State<T>) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// The cell's change flag at this moment.
    pub fn is_changed(&self) -> bool {
        self.cell.lock().changed
    }

    /// Number of setter writes so far. Silent writes do not count.
    pub fn version(&self) -> u64 {
        self.cell.lock().version
    }

    /// Borrow the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.lock().value)
    }

    /// Overwrite the value without raising the change flag or requesting a
    /// render. Used by two-way bindings to mirror an input's text.
    pub fn set_silently(&self, value: T) {
        self.cell.lock().value = value;
    }

    /// A setter for this cell.
    pub fn setter(&self) -> Setter<T> {
        Setter {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone> State<T> {
    pub fn get(&self) -> T {
        self.cell.lock().value.clone()
    }
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.cell.lock();
        f.debug_struct("State")
            .field("id", &self.cell.id)
            .field("value", &slot.value)
            .field("changed", &slot.changed)
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.cell.lock().value, f)
    }
}

/// Mutates a state cell and requests a re-render.
pub struct Setter<T> {
    cell: Arc<StateCell<T>>,
}

impl<T> Setter<T> {
    /// Replace the value, raise the change flag and request a render.
    pub fn set(&self, value: T) {
        self.cell.write(value);
    }

    pub fn cell_id(&self) -> CellId {
        self.cell.id
    }
}

impl<T: Clone> Setter<T> {
    /// Modify the value in place, then behave like [`Setter::set`].
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.cell.lock().value.clone();
        f(&mut value);
        self.cell.write(value);
    }
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter").field("id", &self.cell.id).finish()
    }
}

struct StateEntry {
    tracked: Arc<dyn TrackedCell>,
    any: Arc<dyn Any + Send + Sync>,
}

/// Mapping from hook key to state cell.
pub struct StateStore {
    entries: RefCell<HashMap<HookKey, StateEntry>>,
    phase: Arc<RenderPhase>,
    scheduler: Arc<dyn Scheduler>,
}

impl StateStore {
    pub fn new(phase: Arc<RenderPhase>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            phase,
            scheduler,
        }
    }

    /// Return the cell stored under `key`, creating it with `init` on first
    /// use. The boolean is `true` when the cell was just created.
    pub fn get_or_insert<T: Send + 'static>(
        &self,
        key: HookKey,
        init: impl FnOnce() -> T,
    ) -> (State<T>, bool) {
        if let Some(entry) = self.entries.borrow().get(&key) {
            let cell = Arc::clone(&entry.any)
                .downcast::<StateCell<T>>()
                .unwrap_or_else(|_| {
                    panic!(
                        "trellis hooks error: state at `{}` was created with a different type \
                         than `{}`",
                        key,
                        std::any::type_name::<T>()
                    )
                });
            return (State { cell }, false);
        }

        // `init` may itself read other hooks, so no borrow is held here.
        let value = init();
        let cell = Arc::new(StateCell {
            id: next_cell_id(),
            slot: Mutex::new(Slot {
                value,
                changed: false,
                pending: false,
                version: 0,
            }),
            phase: Arc::clone(&self.phase),
            scheduler: Arc::clone(&self.scheduler),
        });
        self.entries.borrow_mut().insert(
            key,
            StateEntry {
                tracked: cell.clone(),
                any: cell.clone(),
            },
        );
        (State { cell }, true)
    }

    /// Exit action of a pass, applied to every cell.
    pub fn settle_all(&self) {
        for entry in self.entries.borrow().values() {
            entry.tracked.settle();
        }
    }

    /// Used when a pass fails: flags survive so the next pass still sees
    /// every change.
    pub fn promote_pending(&self) {
        for entry in self.entries.borrow().values() {
            entry.tracked.promote_pending();
        }
    }

    /// Number of cells whose change flag is raised.
    pub fn changed_count(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|entry| entry.tracked.has_changed())
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::key::{CallSite, KeyAllocator};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    pub(crate) struct CountingScheduler {
        pub(crate) requests: AtomicUsize,
    }

    impl Scheduler for CountingScheduler {
        fn request_render(&self) {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn store() -> (StateStore, Arc<RenderPhase>, Arc<CountingScheduler>) {
        let phase = Arc::new(RenderPhase::new());
        let scheduler = Arc::new(CountingScheduler::default());
        let store = StateStore::new(Arc::clone(&phase), scheduler.clone());
        (store, phase, scheduler)
    }

    #[test]
    fn init_runs_once_per_key() {
        let (store, _, _) = store();
        let key = KeyAllocator::new().next(CallSite::caller());

        let (first, created) = store.get_or_insert(key, || 1);
        assert!(created);
        let (second, created) = store.get_or_insert(key, || 99);
        assert!(!created);

        assert!(first.same_cell(&second));
        assert_eq!(second.get(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn setter_raises_flag_and_requests_render() {
        let (store, _, scheduler) = store();
        let key = KeyAllocator::new().next(CallSite::caller());
        let (state, _) = store.get_or_insert(key, String::new);

        assert!(!state.is_changed());
        state.setter().set("x".to_string());

        assert!(state.is_changed());
        assert_eq!(state.get(), "x");
        assert_eq!(scheduler.requests.load(Ordering::SeqCst), 1);

        store.settle_all();
        assert!(!state.is_changed());
        assert_eq!(state.get(), "x");
    }

    #[test]
    fn set_during_pass_survives_settle() {
        let (store, phase, _) = store();
        let key = KeyAllocator::new().next(CallSite::caller());
        let (state, _) = store.get_or_insert(key, || 0);

        phase.set_rendering(true);
        state.setter().set(5);
        assert!(!state.is_changed());
        phase.set_rendering(false);

        store.settle_all();
        assert!(state.is_changed());

        store.settle_all();
        assert!(!state.is_changed());
    }

    #[test]
    fn set_racing_pass_exit_is_not_cleared() {
        let (store, phase, _) = store();
        let key = KeyAllocator::new().next(CallSite::caller());
        let (state, _) = store.get_or_insert(key, || 0);
        let setter = state.setter();

        phase.set_rendering(true);
        let mut writer = None;
        phase.transition(false, || {
            writer = Some(std::thread::spawn(move || setter.set(7)));
            // Give the writer every chance to slip in before the flags settle.
            std::thread::sleep(Duration::from_millis(50));
            store.settle_all();
        });
        writer.expect("spawned").join().expect("writer");

        assert_eq!(state.get(), 7);
        assert!(state.is_changed());
        assert!(!phase.is_rendering());
    }

    #[test]
    fn update_modifies_in_place() {
        let (store, _, _) = store();
        let key = KeyAllocator::new().next(CallSite::caller());
        let (state, _) = store.get_or_insert(key, || vec![1, 2]);
        state.setter().update(|v| v.push(3));
        assert_eq!(state.get(), vec![1, 2, 3]);
        assert_eq!(store.changed_count(), 1);
    }

    #[test]
    fn set_silently_does_not_notify() {
        let (store, _, scheduler) = store();
        let key = KeyAllocator::new().next(CallSite::caller());
        let (state, _) = store.get_or_insert(key, String::new);
        state.set_silently("typed".into());
        assert_eq!(state.get(), "typed");
        assert!(!state.is_changed());
        assert_eq!(scheduler.requests.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn setter_is_send() {
        fn assert_send<T: Send + Sync>(_: &T) {}
        let (store, _, _) = store();
        let key = KeyAllocator::new().next(CallSite::caller());
        let (state, _) = store.get_or_insert(key, || 0u32);
        assert_send(&state.setter());
    }

    #[test]
    #[should_panic(expected = "different type")]
    fn type_mismatch_panics() {
        let (store, _, _) = store();
        let key = KeyAllocator::new().next(CallSite::caller());
        let _ = store.get_or_insert(key, || 0u32);
        let _ = store.get_or_insert(key, String::new);
    }
}
