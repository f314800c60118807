use std::cell::RefCell;

/// One of the trace points an operation emits as it moves through latch
/// acquisition, lock read, data read, and write-lock completion. Forwarded
/// to `log::trace!`; also buffered so tests can assert on the sequence of
/// events a single call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    AcquireLatches,
    ReadLock,
    ReadDB,
    EndWriteLock,
}

/// Per-request scratch state: a reusable buffer and a trace sink. Created
/// fresh per call in this crate (real deployments pool these per RPC
/// connection); never shared across threads.
#[derive(Default)]
pub struct RequestCtx {
    buf: RefCell<Vec<u8>>,
    events: RefCell<Vec<TraceEvent>>,
}

impl RequestCtx {
    pub fn new() -> Self {
        RequestCtx::default()
    }

    pub fn trace(&self, event: TraceEvent) {
        log::trace!("{:?}", event);
        self.events.borrow_mut().push(event);
    }

    /// Hands back the scratch buffer, cleared, for the caller to reuse.
    pub fn scratch(&self) -> std::cell::RefMut<'_, Vec<u8>> {
        let mut buf = self.buf.borrow_mut();
        buf.clear();
        buf
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }
}
