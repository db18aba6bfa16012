//! Hook-style state management for re-rendered components.
//!
//! Components are plain functions `fn(&Scope) -> impl Into<Node>` that run
//! from scratch on every render pass. Hooks give them state that persists
//! between passes:
//!
//! | Hook | Purpose |
//! |------|---------|
//! | [`use_state`] | Persistent cell with a setter that requests a re-render |
//! | [`use_memo`] | Value recomputed only when a dependency changed |
//! | [`use_callback`] | Callback handle replaced only when a dependency changed |
//! | [`use_effect`] | Side effect run when a dependency changed |
//!
//! ```ignore
//! fn counter(cx: &Scope) -> Node {
//!     let (count, set_count) = use_state(cx, || 0);
//!     let doubled = use_memo(cx, || count.get() * 2, &[&count]);
//!     div((
//!         p(format!("{count} x 2 = {doubled}")),
//!         button("+1").child(on_click(move |_| set_count.update(|n| *n += 1))),
//!     ))
//!     .into()
//! }
//! ```
//!
//! # Identity
//!
//! A hook is identified by the source location of its call, the number of
//! times that location was already hit in the current pass, and the key
//! group entered with [`Scope::keyed`]. Calling a component twice therefore
//! gives each call its own cells, as long as the calls happen in the same
//! order every pass. Inside loops over data that can be reordered, wrap each
//! item in `cx.keyed(&item_key, || ..)`.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::bindings::{ApplyReport, BindingRegistry};
use crate::change::{Dependency, detect_changed};
use crate::dom::Dom;
use crate::error::Result;
use crate::key::{CallSite, HookKey, KeyAllocator};
use crate::markup::{Compiler, Node};
use crate::memo::{Callback, CallbackStore, MemoStore};
use crate::state::{RenderPhase, Scheduler, Setter, State, StateStore};

/// Metadata about a hook for debugging purposes.
#[derive(Debug, Clone)]
pub struct HookMeta {
    /// The hook function name (e.g., "use_state", "use_effect")
    pub hook_type: &'static str,
    /// The type of value stored (from std::any::type_name)
    pub value_type: &'static str,
    pub key: HookKey,
}

/// Everything that survives between render passes.
///
/// One `Scope` exists per runtime. It owns the state, memo and callback
/// stores, the binding registry of the current commit and the stylesheets
/// requested by components.
pub struct Scope {
    phase: Arc<RenderPhase>,
    states: StateStore,
    memos: MemoStore,
    callbacks: CallbackStore,
    bindings: RefCell<BindingRegistry>,
    keys: RefCell<KeyAllocator>,
    stylesheets: RefCell<Vec<String>>,
    hooks: RefCell<Vec<HookMeta>>,
    seen: RefCell<HashSet<HookKey>>,
    /// Dependency versions each effect last ran with.
    effects: RefCell<HashMap<HookKey, Vec<u64>>>,
    passes: Cell<u64>,
}

impl Scope {
    /// Create a scope whose setters notify `scheduler`.
    pub fn new(scheduler: Arc<dyn Scheduler>, id_prefix: impl Into<String>) -> Self {
        let phase = Arc::new(RenderPhase::new());
        Self {
            states: StateStore::new(Arc::clone(&phase), scheduler),
            phase,
            memos: MemoStore::new(),
            callbacks: CallbackStore::new(),
            bindings: RefCell::new(BindingRegistry::new(id_prefix)),
            keys: RefCell::new(KeyAllocator::new()),
            stylesheets: RefCell::new(Vec::new()),
            hooks: RefCell::new(Vec::new()),
            seen: RefCell::new(HashSet::new()),
            effects: RefCell::new(HashMap::new()),
            passes: Cell::new(0),
        }
    }

    /// Enter a render pass: reset hook counters and drop last commit's
    /// bindings.
    pub fn begin_pass(&self) {
        self.keys.borrow_mut().reset();
        self.bindings.borrow_mut().clear();
        self.phase.set_rendering(true);
    }

    /// Leave a render pass successfully.
    ///
    /// Change flags are cleared, except for cells set while the pass was
    /// running: those stay raised for the next pass. Setters on other
    /// threads wait for the flags to settle, so none of their writes is
    /// cleared unseen.
    pub fn end_pass(&self) {
        self.phase.transition(false, || self.states.settle_all());
        self.passes.set(self.passes.get() + 1);
    }

    /// Leave a render pass that did not reach the document. No flag is
    /// cleared.
    pub fn abort_pass(&self) {
        self.phase.transition(false, || self.states.promote_pending());
        self.keys.borrow_mut().reset();
    }

    pub fn is_rendering(&self) -> bool {
        self.phase.is_rendering()
    }

    /// Number of completed passes.
    pub fn pass_count(&self) -> u64 {
        self.passes.get()
    }

    /// Run `f` with hooks keyed by `key` instead of call order alone.
    ///
    /// ```ignore
    /// for_each(&todos, |_, todo| cx.keyed(&todo.id, || todo_row(cx, todo)))
    /// ```
    pub fn keyed<K: Hash + ?Sized, R>(&self, key: &K, f: impl FnOnce() -> R) -> R {
        self.keys.borrow_mut().push_group(key);
        let result = f();
        self.keys.borrow_mut().pop_group();
        result
    }

    /// Compile `node` against `dom`, recording listeners in the binding
    /// registry.
    pub fn compile<D: Dom>(&self, dom: &D, node: &Node) -> Result<String> {
        Compiler::new(dom, &mut self.bindings.borrow_mut()).compile(node)
    }

    /// Install the bindings recorded by the last [`Scope::compile`].
    pub fn apply_bindings<D: Dom>(&self, dom: &D) -> ApplyReport {
        self.bindings.borrow().apply(dom)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.borrow().len()
    }

    /// Queue a stylesheet for injection at the next commit.
    pub fn request_stylesheet(&self, path: impl Into<String>) {
        self.stylesheets.borrow_mut().push(path.into());
    }

    /// Drain stylesheets requested since the last call.
    pub fn take_stylesheets(&self) -> Vec<String> {
        std::mem::take(&mut *self.stylesheets.borrow_mut())
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Cells whose change flag is currently raised.
    pub fn changed_count(&self) -> usize {
        self.states.changed_count()
    }

    /// Hooks in creation order. Useful for devtools inspection.
    pub fn hooks_debug_info(&self) -> Vec<HookMeta> {
        self.hooks.borrow().clone()
    }

    fn next_key(&self, hook_type: &'static str, site: CallSite) -> HookKey {
        if !self.is_rendering() {
            panic!(
                "\n\n\x1b[1;31mtrellis hooks error: `{}` called outside of render!\x1b[0m\n\
                Called at {}.\n\
                Hooks can only be called while a component is rendering.\n\
                Make sure you're not calling hooks in:\n\
                - Event handlers\n\
                - Async tasks\n\
                - Effects or callbacks\n",
                hook_type, site
            );
        }
        self.keys.borrow_mut().next(site)
    }

    fn record(&self, hook_type: &'static str, value_type: &'static str, key: HookKey) {
        if self.seen.borrow_mut().insert(key) {
            self.hooks.borrow_mut().push(HookMeta {
                hook_type,
                value_type,
                key,
            });
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("rendering", &self.is_rendering())
            .field("passes", &self.passes.get())
            .field("states", &self.states.len())
            .field("memos", &self.memos.len())
            .field("callbacks", &self.callbacks.len())
            .field("bindings", &self.binding_count())
            .finish()
    }
}

// ============================================================================
// Public API - Hook functions
// ============================================================================

/// Create or retrieve a persistent state cell.
///
/// `init` runs only the first time this hook is reached. The returned
/// [`State`] handle refers to the same cell on every pass; the [`Setter`]
/// replaces the value and requests a re-render.
///
/// ```ignore
/// let (name, set_name) = use_state(cx, String::new);
/// ```
#[track_caller]
pub fn use_state<T: Send + 'static>(
    cx: &Scope,
    init: impl FnOnce() -> T,
) -> (State<T>, Setter<T>) {
    let key = cx.next_key("use_state", CallSite::caller());
    let (state, _) = cx.states.get_or_insert(key, init);
    cx.record("use_state", std::any::type_name::<T>(), key);
    let setter = state.setter();
    (state, setter)
}

/// Memoize a computation.
///
/// Computed on first use, then recomputed only when one of `deps` changed
/// since the last commit. An empty dependency list recomputes every pass.
#[track_caller]
pub fn use_memo<T: Clone + 'static>(
    cx: &Scope,
    compute: impl FnOnce() -> T,
    deps: &[&dyn Dependency],
) -> T {
    let key = cx.next_key("use_memo", CallSite::caller());
    if !detect_changed(deps)
        && let Some(value) = cx.memos.get::<T>(&key)
    {
        return value;
    }

    let value = compute();
    cx.memos.insert(key, value.clone());
    cx.record("use_memo", std::any::type_name::<T>(), key);
    value
}

/// Memoize a callback so its handle stays the same between passes.
///
/// ```ignore
/// let greet = use_callback(cx, move |name: String| format!("hi {name}"), &[]);
/// ```
#[track_caller]
pub fn use_callback<A: 'static, R: 'static>(
    cx: &Scope,
    f: impl Fn(A) -> R + 'static,
    deps: &[&dyn Dependency],
) -> Callback<A, R> {
    let key = cx.next_key("use_callback", CallSite::caller());
    if !detect_changed(deps)
        && let Some(callback) = cx.callbacks.get::<A, R>(&key)
    {
        return callback;
    }

    let callback = Callback::new(f);
    cx.callbacks.insert(key, callback.clone());
    cx.record("use_callback", std::any::type_name::<Callback<A, R>>(), key);
    callback
}

/// Run a side effect when a dependency changed.
///
/// The effect runs synchronously, in the middle of the pass. With
/// dependencies it runs once for every pass that follows a change of one of
/// them (and not on the first pass); without dependencies it runs every pass.
///
/// A pass that fails to commit keeps change flags raised for the retry, but
/// an effect that already ran for the same writes is not run again.
#[track_caller]
pub fn use_effect(cx: &Scope, effect: impl FnOnce(), deps: &[&dyn Dependency]) {
    let key = cx.next_key("use_effect", CallSite::caller());
    cx.record("use_effect", "()", key);
    if !detect_changed(deps) {
        return;
    }
    if !deps.is_empty() {
        let versions: Vec<u64> = deps.iter().map(|dep| dep.version()).collect();
        let mut effects = cx.effects.borrow_mut();
        if effects.get(&key) == Some(&versions) {
            return;
        }
        effects.insert(key, versions);
    }
    effect();
}

/// Link a stylesheet into the document head. Repeated requests for the same
/// path produce a single `<link>`.
pub fn stylesheet(cx: &Scope, path: impl Into<String>) {
    cx.request_stylesheet(path);
}
