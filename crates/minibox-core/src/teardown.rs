//! Ordered release of partially acquired resources.
//!
//! Multi-step setup pushes one undo action per acquired resource. If the
//! sequence fails, the stack unwinds in reverse order; once every step has
//! succeeded the caller commits and nothing is undone.

use minibox_common::error::Result;

type UndoFn<'a> = Box<dyn FnOnce() -> Result<()> + 'a>;

/// Stack of undo actions, unwound in reverse on drop unless committed.
pub struct TeardownStack<'a> {
    scope: &'static str,
    steps: Vec<(&'static str, UndoFn<'a>)>,
}

impl<'a> TeardownStack<'a> {
    /// Creates an empty stack; `scope` labels its log lines.
    #[must_use]
    pub fn new(scope: &'static str) -> Self {
        Self {
            scope,
            steps: Vec::new(),
        }
    }

    /// Records how to release a resource that was just acquired.
    pub fn push(&mut self, resource: &'static str, undo: impl FnOnce() -> Result<()> + 'a) {
        self.steps.push((resource, Box::new(undo)));
    }

    /// Number of resources currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if nothing has been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Keeps every acquired resource; no undo action will run.
    pub fn commit(mut self) {
        tracing::debug!(scope = self.scope, held = self.steps.len(), "teardown committed");
        self.steps.clear();
    }

    /// Runs every undo action in reverse order.
    ///
    /// Failures are logged and do not stop the remaining actions.
    pub fn unwind(&mut self) {
        while let Some((resource, undo)) = self.steps.pop() {
            match undo() {
                Ok(()) => tracing::debug!(scope = self.scope, resource, "released"),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(scope = self.scope, resource, "already released");
                }
                Err(e) => {
                    tracing::warn!(scope = self.scope, resource, error = %e, "release failed");
                }
            }
        }
    }
}

impl Drop for TeardownStack<'_> {
    fn drop(&mut self) {
        if !self.steps.is_empty() {
            tracing::warn!(scope = self.scope, held = self.steps.len(), "unwinding partial setup");
            self.unwind();
        }
    }
}
