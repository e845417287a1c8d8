use std::collections::HashMap;

use crate::error::{ClientError, Result};
use crate::methods::Method;

/// Assigns request identifiers and matches replies back to their methods.
///
/// Ids start at 1 and increase strictly; an id is never reused while its
/// request is outstanding. A reply referencing an id that is not pending
/// means the byte stream is desynchronized, which is fatal for the session.
pub struct RequestCorrelator {
    next_id: u32,
    pending: HashMap<u32, Method>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            pending: HashMap::new(),
        }
    }

    /// Next request identifier, unique for the lifetime of the session.
    pub fn next_request_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Record which method an outgoing request belongs to.
    ///
    /// Must be called before the frame is sent, so a reply can never race
    /// ahead of the bookkeeping.
    pub fn track(&mut self, request_id: u32, method: Method) {
        self.pending.insert(request_id, method);
    }

    /// Match an incoming reply to the method that requested it.
    ///
    /// Streamed methods answer one request with several replies; the entry
    /// stays pending until the reply marked `last` arrives.
    pub fn resolve(&mut self, request_id: u32, last: bool) -> Result<Method> {
        let method = match self.pending.get(&request_id) {
            Some(method) => *method,
            None => return Err(ClientError::UnknownRequest(request_id)),
        };
        if last {
            self.pending.remove(&request_id);
        }
        Ok(method)
    }

    /// Number of requests awaiting a (final) reply.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Drop all pending state. Request ids are not reset; a session never
    /// reuses one.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new()
    }
}
