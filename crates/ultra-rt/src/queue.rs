use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};

use crate::task::TaskDescriptor;

/// Work items crossing from guest OS calls into the dispatch thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// An RSP task, snapshotted at submission time.
    SpTask { task: TaskDescriptor },
    /// Present `buffer` (the `next` framebuffer captured when the swap was
    /// queued) at physical `origin`.
    SwapBuffers { origin: u32, buffer: u32 },
}

/// The action queue: unbounded so producers never block; the single
/// consumer pops with a timeout so it can interleave input polling.
pub(crate) fn action_queue() -> (Sender<Action>, Receiver<Action>) {
    crossbeam_channel::unbounded()
}

/// Cooperative shutdown for the core threads.
///
/// Listeners hold receiver clones; `request` drops the only sender, which
/// wakes every blocked listener with a disconnect. Idempotent.
#[derive(Clone)]
pub(crate) struct ShutdownSignal {
    tx: Arc<Mutex<Option<Sender<()>>>>,
    rx: Receiver<()>,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
            rx,
        }
    }

    pub(crate) fn request(&self) {
        self.tx.lock().unwrap().take();
    }

    pub(crate) fn subscribe(&self) -> Receiver<()> {
        self.rx.clone()
    }
}
