//! Dependency change detection.

use crate::state::{CellId, State};

/// Something a memo, callback or effect can depend on.
pub trait Dependency {
    fn cell_id(&self) -> CellId;
    fn has_changed(&self) -> bool;
    /// Number of setter writes so far.
    fn version(&self) -> u64;
}

impl<T> Dependency for State<T> {
    fn cell_id(&self) -> CellId {
        State::cell_id(self)
    }

    fn has_changed(&self) -> bool {
        self.is_changed()
    }

    fn version(&self) -> u64 {
        State::version(self)
    }
}

/// Whether any of `deps` changed since the last commit.
///
/// An empty list always reports a change, so dependency-free hooks run on
/// every pass. Cells listed more than once are only inspected once.
pub fn detect_changed(deps: &[&dyn Dependency]) -> bool {
    if deps.is_empty() {
        return true;
    }

    let mut seen: Vec<CellId> = Vec::with_capacity(deps.len());
    for dep in deps {
        let id = dep.cell_id();
        if seen.contains(&id) {
            continue;
        }
        seen.push(id);
        if dep.has_changed() {
            return true;
        }
    }
    false
}
