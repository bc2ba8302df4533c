//! Resource tracker
//!
//! Owns the backend cursors (and the statements that produced them) that outlive a single
//! execution call. Cursors are addressed by `CursorToken`, never by reference, and are
//! released by the session manager: `release` when one stream ends, `release_all` when the
//! execution context ends.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, warn};

use crate::backend::{BackendCursor, BackendStatement};
use crate::core::{BackendError, ProxyError, ResultMetadata, Value};

/// Scope under which tracked resources are released together (a session or a statement lifecycle)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Handle to a tracked cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorToken {
    context: ContextId,
    slot: u64,
}

impl CursorToken {
    #[must_use]
    pub const fn context(self) -> ContextId {
        self.context
    }
}

impl fmt::Display for CursorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.context, self.slot)
    }
}

struct TrackedCursor {
    cursor: Box<dyn BackendCursor>,
    statement: Box<dyn BackendStatement>,
}

impl TrackedCursor {
    /// Cursor first, then its statement; resources already closed are skipped
    fn close(mut self) -> Result<(), BackendError> {
        let cursor_result = if self.cursor.is_closed() {
            Ok(())
        } else {
            self.cursor.close()
        };
        let statement_result = if self.statement.is_closed() {
            Ok(())
        } else {
            self.statement.close()
        };
        cursor_result.and(statement_result)
    }
}

#[derive(Default)]
pub struct ResourceTracker {
    contexts: HashMap<ContextId, BTreeMap<u64, TrackedCursor>>,
    next_slot: u64,
}

impl ResourceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live cursor together with the statement that owns it
    pub fn track(
        &mut self,
        context: ContextId,
        statement: Box<dyn BackendStatement>,
        cursor: Box<dyn BackendCursor>,
    ) -> CursorToken {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.contexts
            .entry(context)
            .or_default()
            .insert(slot, TrackedCursor { cursor, statement });

        let token = CursorToken { context, slot };
        debug!(%token, "tracking backend cursor");
        token
    }

    /// Pulls the next row from a tracked cursor
    pub fn fetch(&mut self, token: CursorToken) -> Result<Option<Vec<Value>>, ProxyError> {
        let entry = self.entry_mut(token)?;
        Ok(entry.cursor.fetch()?)
    }

    pub fn metadata(&self, token: CursorToken) -> Result<ResultMetadata, ProxyError> {
        let entry = self
            .contexts
            .get(&token.context)
            .and_then(|cursors| cursors.get(&token.slot))
            .ok_or(ProxyError::UnknownCursor(token))?;
        Ok(entry.cursor.metadata()?)
    }

    #[must_use]
    pub fn is_tracked(&self, token: CursorToken) -> bool {
        self.contexts
            .get(&token.context)
            .is_some_and(|cursors| cursors.contains_key(&token.slot))
    }

    /// Number of cursors tracked under a context
    #[must_use]
    pub fn tracked(&self, context: ContextId) -> usize {
        self.contexts.get(&context).map_or(0, BTreeMap::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Releases a single cursor when its stream ends
    pub fn release(&mut self, token: CursorToken) -> Result<(), ProxyError> {
        let cursors = self
            .contexts
            .get_mut(&token.context)
            .ok_or(ProxyError::UnknownCursor(token))?;
        let entry = cursors
            .remove(&token.slot)
            .ok_or(ProxyError::UnknownCursor(token))?;
        if cursors.is_empty() {
            self.contexts.remove(&token.context);
        }

        debug!(%token, "releasing backend cursor");
        Ok(entry.close()?)
    }

    /// Releases every cursor of a context and returns how many were released.
    ///
    /// Never fails: close errors are logged and the remaining resources are still closed.
    pub fn release_all(&mut self, context: ContextId) -> usize {
        let Some(cursors) = self.contexts.remove(&context) else {
            return 0;
        };

        let released = cursors.len();
        for (slot, entry) in cursors {
            if let Err(e) = entry.close() {
                warn!(%context, slot, error = %e, "failed to close tracked backend cursor");
            }
        }
        debug!(%context, released, "released execution context");
        released
    }

    /// Releases every context
    pub fn close(&mut self) -> usize {
        let contexts: Vec<ContextId> = self.contexts.keys().copied().collect();
        contexts
            .into_iter()
            .map(|context| self.release_all(context))
            .sum()
    }

    fn entry_mut(&mut self, token: CursorToken) -> Result<&mut TrackedCursor, ProxyError> {
        self.contexts
            .get_mut(&token.context)
            .and_then(|cursors| cursors.get_mut(&token.slot))
            .ok_or(ProxyError::UnknownCursor(token))
    }
}

impl Drop for ResourceTracker {
    fn drop(&mut self) {
        if !self.contexts.is_empty() {
            let released = self.close();
            warn!(released, "resource tracker dropped with live cursors");
        }
    }
}
