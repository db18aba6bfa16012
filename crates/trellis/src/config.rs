//! Runtime configuration.

use trellis_core::bindings::DEFAULT_ID_PREFIX;

/// Where committed markup is written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MountPoint {
    /// Replace the whole `<body>`.
    #[default]
    Body,
    /// Replace the content of the element with this id.
    ElementId(String),
}

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub mount: MountPoint,
    /// Fold render requests that queued up during a commit into a single
    /// follow-up commit.
    pub coalesce_signals: bool,
    /// Prefix for element ids generated for listeners.
    pub id_prefix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mount: MountPoint::Body,
            coalesce_signals: true,
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mount(mut self, mount: MountPoint) -> Self {
        self.mount = mount;
        self
    }

    /// Mount into the element with the given id instead of the body.
    pub fn with_mount_id(self, id: impl Into<String>) -> Self {
        self.with_mount(MountPoint::ElementId(id.into()))
    }

    pub fn with_coalesce_signals(mut self, coalesce: bool) -> Self {
        self.coalesce_signals = coalesce;
        self
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }
}
