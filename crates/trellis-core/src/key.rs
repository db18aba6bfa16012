//! Call-site identity for hooks.
//!
//! Every hook function is `#[track_caller]`, so the source location of the
//! call is known without any runtime reflection. A [`HookKey`] combines that
//! location with the explicit key group (see [`Scope::keyed`]) and the number
//! of times the same site was already hit during the current pass.
//!
//! [`Scope::keyed`]: crate::Scope::keyed

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;

/// Source position of a hook call.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CallSite {
    file: &'static str,
    line: u32,
    column: u32,
}

impl CallSite {
    /// Capture the location of the caller.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    pub fn from_location(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}:{}", self.file, self.line, self.column)
    }
}

/// Identity of one logical hook slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct HookKey {
    site: CallSite,
    group: u64,
    occurrence: u32,
}

impl HookKey {
    pub fn site(&self) -> CallSite {
        self.site
    }

    pub fn group(&self) -> u64 {
        self.group
    }

    /// How many times the same site had already been hit in this group
    /// during the pass that produced this key.
    pub fn occurrence(&self) -> u32 {
        self.occurrence
    }
}

impl fmt::Display for HookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group == 0 {
            write!(f, "{}/{}", self.site, self.occurrence)
        } else {
            write!(f, "{}[{:x}]/{}", self.site, self.group, self.occurrence)
        }
    }
}

/// Hands out [`HookKey`]s during a render pass.
///
/// Reset at the start of each pass so that the n-th hit of a site maps to the
/// same key as the n-th hit in the previous pass.
#[derive(Debug, Default)]
pub struct KeyAllocator {
    occurrences: HashMap<(CallSite, u64), u32>,
    groups: Vec<u64>,
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all per-pass counters and any dangling key groups.
    pub fn reset(&mut self) {
        self.occurrences.clear();
        self.groups.clear();
    }

    /// Allocate the key for the next hit of `site`.
    pub fn next(&mut self, site: CallSite) -> HookKey {
        let group = self.current_group();
        let counter = self.occurrences.entry((site, group)).or_insert(0);
        let occurrence = *counter;
        *counter += 1;
        HookKey {
            site,
            group,
            occurrence,
        }
    }

    /// Enter a key group nested in the current one.
    pub fn push_group<K: Hash + ?Sized>(&mut self, key: &K) {
        let mut hasher = DefaultHasher::new();
        self.current_group().hash(&mut hasher);
        key.hash(&mut hasher);
        // 0 is reserved for the root group
        let group = hasher.finish().max(1);
        self.groups.push(group);
    }

    pub fn pop_group(&mut self) {
        self.groups.pop();
    }

    fn current_group(&self) -> u64 {
        self.groups.last().copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn site() -> CallSite {
        CallSite::caller()
    }

    #[test]
    fn caller_is_the_calling_line() {
        let a = site();
        let b = site();
        assert_eq!(a.file(), file!());
        assert_ne!(a, b);
        assert_eq!(a.line() + 1, b.line());
    }

    #[test]
    fn repeated_site_gets_increasing_occurrence() {
        let mut keys = KeyAllocator::new();
        let s = site();
        let first = keys.next(s);
        let second = keys.next(s);
        assert_eq!(first.occurrence(), 0);
        assert_eq!(second.occurrence(), 1);
        assert_ne!(first, second);
    }

    #[test]
    fn reset_replays_the_same_keys() {
        let mut keys = KeyAllocator::new();
        let s = site();
        let before = (keys.next(s), keys.next(s));
        keys.reset();
        let after = (keys.next(s), keys.next(s));
        assert_eq!(before, after);
    }

    #[test]
    fn groups_separate_slots() {
        let mut keys = KeyAllocator::new();
        let s = site();

        keys.push_group("a");
        let in_a = keys.next(s);
        keys.pop_group();

        keys.push_group("b");
        let in_b = keys.next(s);
        keys.pop_group();

        let root = keys.next(s);

        assert_eq!(in_a.occurrence(), 0);
        assert_eq!(in_b.occurrence(), 0);
        assert_eq!(root.occurrence(), 0);
        assert_ne!(in_a, in_b);
        assert_ne!(in_a, root);
        assert_eq!(root.group(), 0);
    }

    #[test]
    fn display_names_file_and_line() {
        let mut keys = KeyAllocator::new();
        let key = keys.next(site());
        let shown = key.to_string();
        assert!(shown.starts_with(file!()));
        assert!(shown.ends_with("/0"));
    }
}
