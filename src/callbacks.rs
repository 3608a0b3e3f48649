//! Execution callbacks attached to a call's configuration.
//!
//! Callbacks are local observers: they never travel over the wire. A call
//! can carry either a plain list of handlers or a [`CallbackManager`]; in both
//! cases adding a handler produces a *new* value and leaves the caller's
//! original untouched.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::options::StreamLogOptions;

/// An observer of run execution events.
///
/// Handlers are shared behind `Arc` so that copying a callback list or
/// manager never duplicates handler state.
pub trait CallbackHandler: Send + Sync {
    /// A short name identifying the handler, used in debug output.
    fn name(&self) -> &str;
}

/// Callbacks attached to a call: a plain handler list or a manager.
#[derive(Clone)]
pub enum Callbacks {
    /// An ordered list of handlers.
    Handlers(Vec<Arc<dyn CallbackHandler>>),
    /// A manager with separate local and inheritable handler lists.
    Manager(CallbackManager),
}

impl Callbacks {
    /// Return a new callbacks value with `handler` added.
    ///
    /// - a list gets `handler` appended to a copy of the list
    /// - a manager is copied and `handler` is appended to the copy's
    ///   inheritable handlers
    ///
    /// `self` is only borrowed, so the original cannot be modified.
    pub fn with_handler(&self, handler: Arc<dyn CallbackHandler>) -> Callbacks {
        match self {
            Callbacks::Handlers(handlers) => {
                let mut handlers = handlers.clone();
                handlers.push(handler);
                Callbacks::Handlers(handlers)
            }
            Callbacks::Manager(manager) => {
                let mut copied = manager.copy();
                copied.inheritable_handlers.push(handler);
                Callbacks::Manager(copied)
            }
        }
    }

    /// Number of handlers visible to child runs (the whole list, or the
    /// manager's inheritable handlers).
    pub fn inheritable_len(&self) -> usize {
        match self {
            Callbacks::Handlers(handlers) => handlers.len(),
            Callbacks::Manager(manager) => manager.inheritable_handlers().len(),
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callbacks::Handlers(handlers) => f
                .debug_tuple("Handlers")
                .field(&handler_names(handlers))
                .finish(),
            Callbacks::Manager(manager) => f.debug_tuple("Manager").field(manager).finish(),
        }
    }
}

impl From<Vec<Arc<dyn CallbackHandler>>> for Callbacks {
    fn from(handlers: Vec<Arc<dyn CallbackHandler>>) -> Self {
        Callbacks::Handlers(handlers)
    }
}

impl From<CallbackManager> for Callbacks {
    fn from(manager: CallbackManager) -> Self {
        Callbacks::Manager(manager)
    }
}

/// Add `handler` to optional existing callbacks, producing new callbacks.
///
/// With no existing callbacks the handler becomes the sole entry of a list.
pub fn append_handler(
    existing: Option<&Callbacks>,
    handler: Arc<dyn CallbackHandler>,
) -> Callbacks {
    match existing {
        None => Callbacks::Handlers(vec![handler]),
        Some(callbacks) => callbacks.with_handler(handler),
    }
}

fn handler_names(handlers: &[Arc<dyn CallbackHandler>]) -> Vec<&str> {
    handlers.iter().map(|h| h.name()).collect()
}

/// Groups handlers for a run: `handlers` apply to the run itself,
/// `inheritable_handlers` are also passed down to child runs.
#[derive(Clone, Default)]
pub struct CallbackManager {
    handlers: Vec<Arc<dyn CallbackHandler>>,
    inheritable_handlers: Vec<Arc<dyn CallbackHandler>>,
    parent_run_id: Option<Uuid>,
}

impl CallbackManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty manager for a child of the given run.
    pub fn with_parent_run_id(parent_run_id: Uuid) -> Self {
        Self {
            parent_run_id: Some(parent_run_id),
            ..Self::default()
        }
    }

    /// Add a handler; `inherit` also registers it for child runs.
    pub fn add_handler(&mut self, handler: Arc<dyn CallbackHandler>, inherit: bool) {
        if inherit {
            self.inheritable_handlers.push(Arc::clone(&handler));
        }
        self.handlers.push(handler);
    }

    /// Handlers applied to this run.
    pub fn handlers(&self) -> &[Arc<dyn CallbackHandler>] {
        &self.handlers
    }

    /// Handlers passed down to child runs.
    pub fn inheritable_handlers(&self) -> &[Arc<dyn CallbackHandler>] {
        &self.inheritable_handlers
    }

    /// The parent run this manager belongs to, if any.
    pub fn parent_run_id(&self) -> Option<Uuid> {
        self.parent_run_id
    }

    /// An independent copy: later additions to either side are not seen by
    /// the other. Handlers themselves are shared.
    pub fn copy(&self) -> Self {
        self.clone()
    }
}

impl fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackManager")
            .field("handlers", &handler_names(&self.handlers))
            .field(
                "inheritable_handlers",
                &handler_names(&self.inheritable_handlers),
            )
            .field("parent_run_id", &self.parent_run_id)
            .finish()
    }
}

/// Handler that captures a run as a stream of log patches.
///
/// `stream_log` injects one of these (with `auto_close` off) next to the
/// caller's own callbacks. Any local diffing of run state is its concern;
/// the wire always carries full snapshots.
#[derive(Debug, Clone, Default)]
pub struct LogStreamCallbackHandler {
    options: StreamLogOptions,
    auto_close: bool,
}

impl LogStreamCallbackHandler {
    /// Create a handler with the given filters.
    pub fn new(options: StreamLogOptions, auto_close: bool) -> Self {
        Self {
            options,
            auto_close,
        }
    }

    /// The include/exclude filters this handler applies.
    pub fn options(&self) -> &StreamLogOptions {
        &self.options
    }

    /// Whether the handler closes its stream when the root run ends.
    pub fn auto_close(&self) -> bool {
        self.auto_close
    }
}

impl CallbackHandler for LogStreamCallbackHandler {
    fn name(&self) -> &str {
        "log_stream_tracer"
    }
}
