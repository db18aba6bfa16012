//! The render loop.
//!
//! Every setter call sends a [`RenderSignal`] into one channel. The loop
//! consumes it and performs a commit: run the root component, compile the
//! tree, replace the mount point's content and install the bindings. Only one
//! commit runs at a time; signals sent while a commit is running wait for the
//! next iteration.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};
use trellis_core::{Dom, Node, Scheduler, Scope};

use crate::config::{MountPoint, RuntimeConfig};
use crate::error::{RenderError, Result};
use crate::stylesheet::Stylesheets;

/// Message consumed by the render loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderSignal {
    Render,
    Shutdown,
}

/// Feeds setter notifications into the render channel.
struct ChannelScheduler {
    sender: UnboundedSender<RenderSignal>,
}

impl Scheduler for ChannelScheduler {
    fn request_render(&self) {
        if self.sender.send(RenderSignal::Render).is_err() {
            debug!("render loop is gone, dropping render request");
        }
    }
}

/// Handle for driving the loop from outside components, e.g. from timers or
/// other threads.
#[derive(Debug, Clone)]
pub struct RenderHandle {
    sender: UnboundedSender<RenderSignal>,
}

impl RenderHandle {
    /// Ask for a commit. Returns `false` if the loop has been dropped.
    pub fn request_render(&self) -> bool {
        self.sender.send(RenderSignal::Render).is_ok()
    }

    /// Stop the loop after any commit already queued.
    pub fn shutdown(&self) -> bool {
        self.sender.send(RenderSignal::Shutdown).is_ok()
    }
}

/// Summary of one successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitStats {
    /// Number of completed passes, including this one.
    pub pass: u64,
    /// Length of the markup written to the mount point.
    pub bytes: usize,
    pub bindings: usize,
    /// Bindings whose element could not be found after writing the markup.
    pub missing_targets: usize,
}

/// Ends the pass when dropped without [`PassGuard::finish`], so a panicking
/// component does not leave the scope stuck in the rendering phase.
struct PassGuard<'a> {
    scope: &'a Scope,
    finished: bool,
}

impl<'a> PassGuard<'a> {
    fn begin(scope: &'a Scope) -> Self {
        scope.begin_pass();
        Self {
            scope,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
        self.scope.end_pass();
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.scope.abort_pass();
        }
    }
}

/// Owns the document, the hook scope and the render channel.
pub struct Runtime<D: Dom> {
    dom: D,
    scope: Scope,
    config: RuntimeConfig,
    sender: UnboundedSender<RenderSignal>,
    receiver: UnboundedReceiver<RenderSignal>,
    stylesheets: Stylesheets,
}

impl<D: Dom> Runtime<D> {
    pub fn new(dom: D) -> Self {
        Self::with_config(dom, RuntimeConfig::default())
    }

    pub fn with_config(dom: D, config: RuntimeConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let scheduler = Arc::new(ChannelScheduler {
            sender: sender.clone(),
        });
        let scope = Scope::new(scheduler, config.id_prefix.clone());
        Self {
            dom,
            scope,
            config,
            sender,
            receiver,
            stylesheets: Stylesheets::new(),
        }
    }

    pub fn handle(&self) -> RenderHandle {
        RenderHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Link a stylesheet into the document head, once per path.
    pub fn stylesheet(&mut self, path: &str) -> bool {
        self.stylesheets.link(&self.dom, path)
    }

    fn mount(&self) -> Result<D::Handle> {
        match &self.config.mount {
            MountPoint::Body => Ok(self.dom.body()),
            MountPoint::ElementId(id) => self
                .dom
                .get_element_by_id(id)
                .ok_or_else(|| RenderError::MountNotFound(id.clone())),
        }
    }

    /// Run one full pass and write the result to the document.
    ///
    /// The tree is compiled before the document is touched: if compilation
    /// fails, the previous content and listeners stay in place and no change
    /// flag is cleared.
    pub fn commit<F, N>(&mut self, root: &F) -> Result<CommitStats>
    where
        F: Fn(&Scope) -> N,
        N: Into<Node>,
    {
        let mount = self.mount()?;
        let guard = PassGuard::begin(&self.scope);

        let node = root(&self.scope).into();
        let html = self.scope.compile(&self.dom, &node)?;

        for path in self.scope.take_stylesheets() {
            self.stylesheets.link(&self.dom, &path);
        }
        self.dom.clear_listeners();
        self.dom.set_inner_html(&mount, "");
        self.dom.set_inner_html(&mount, &html);
        let report = self.scope.apply_bindings(&self.dom);
        guard.finish();

        let stats = CommitStats {
            pass: self.scope.pass_count(),
            bytes: html.len(),
            bindings: report.installed + report.missing,
            missing_targets: report.missing,
        };
        debug!(
            pass = stats.pass,
            bytes = stats.bytes,
            bindings = stats.bindings,
            "commit finished"
        );
        Ok(stats)
    }

    fn commit_logged<F, N>(&mut self, root: &F)
    where
        F: Fn(&Scope) -> N,
        N: Into<Node>,
    {
        if let Err(err) = self.commit(root) {
            error!("commit failed, keeping previous document: {}", err);
        }
    }

    /// Drive the loop until a [`RenderSignal::Shutdown`] arrives.
    ///
    /// Performs the initial commit right away.
    pub async fn run<F, N>(&mut self, root: F)
    where
        F: Fn(&Scope) -> N,
        N: Into<Node>,
    {
        info!("render loop started");
        self.commit_logged(&root);

        while let Some(signal) = self.receiver.recv().await {
            let (render, shutdown) = self.collect(signal);
            if render {
                debug!("render signal received");
                self.commit_logged(&root);
            }
            if shutdown {
                break;
            }
        }

        info!(passes = self.scope.pass_count(), "render loop stopped");
    }

    /// Perform the commits that queued signals ask for, without waiting.
    ///
    /// For hosts that drive the document themselves. Returns the number of
    /// commits performed; stops early at a shutdown signal.
    pub fn process_pending<F, N>(&mut self, root: &F) -> usize
    where
        F: Fn(&Scope) -> N,
        N: Into<Node>,
    {
        let mut commits = 0;
        while let Ok(signal) = self.receiver.try_recv() {
            let (render, shutdown) = self.collect(signal);
            if render {
                self.commit_logged(root);
                commits += 1;
            }
            if shutdown {
                break;
            }
        }
        commits
    }

    /// Fold queued signals into the one just received when coalescing.
    fn collect(&mut self, first: RenderSignal) -> (bool, bool) {
        let mut render = first == RenderSignal::Render;
        let mut shutdown = first == RenderSignal::Shutdown;
        if self.config.coalesce_signals && !shutdown {
            while let Ok(next) = self.receiver.try_recv() {
                match next {
                    RenderSignal::Render => render = true,
                    RenderSignal::Shutdown => {
                        shutdown = true;
                        break;
                    }
                }
            }
        }
        (render, shutdown)
    }
}

/// Start the render loop on `dom` and block until it shuts down.
///
/// ```ignore
/// use trellis::prelude::*;
///
/// fn app(cx: &Scope) -> Node {
///     let (count, set_count) = use_state(cx, || 0);
///     div((
///         h1(format!("Count: {count}")),
///         button("+1").child(on_click(move |_| set_count.update(|n| *n += 1))),
///     ))
///     .into()
/// }
///
/// fn main() -> Result<(), trellis::RenderError> {
///     trellis::render(MemoryDom::new(), app)
/// }
/// ```
pub fn render<D, F, N>(dom: D, root: F) -> Result<()>
where
    D: Dom,
    F: Fn(&Scope) -> N,
    N: Into<Node>,
{
    render_with(dom, RuntimeConfig::default(), root)
}

/// [`render`] with an explicit configuration.
pub fn render_with<D, F, N>(dom: D, config: RuntimeConfig, root: F) -> Result<()>
where
    D: Dom,
    F: Fn(&Scope) -> N,
    N: Into<Node>,
{
    // Initialize tracing
    let _ = tracing_subscriber::fmt::try_init();

    let executor = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let mut runtime = Runtime::with_config(dom, config);
    executor.block_on(runtime.run(root));
    Ok(())
}
