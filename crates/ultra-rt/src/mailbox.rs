use std::sync::{Arc, Mutex};

use crate::mesg::{OsMesg, OsMesgQueue};

/// Event sources that can signal a registered mailbox.
///
/// SP and DP are the two halves of the RCP (signal processor and display
/// processor), SI the serial interface, AI audio, VI the video retrace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventKind {
    SP = 0,
    SI = 1,
    AI = 2,
    VI = 3,
    DP = 4,
}

pub const EVENT_KIND_COUNT: usize = 5;

struct Registration {
    queue: Arc<OsMesgQueue>,
    mesg: OsMesg,
}

struct RegistryState {
    slots: [Option<Registration>; EVENT_KIND_COUNT],
    /// Retraces between VI messages, as requested by the latest
    /// registration. The timing thread samples it when its countdown
    /// expires.
    vi_retrace_count: u32,
}

/// Mailbox registry — one registration slot per event kind.
///
/// A single lock covers every slot so a retrace can deliver its VI and AI
/// messages without a re-registration landing between the two sends.
pub struct MailboxRegistry {
    state: Mutex<RegistryState>,
}

impl MailboxRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                slots: [None, None, None, None, None],
                vi_retrace_count: 1,
            }),
        }
    }

    /// Register `queue` to receive `mesg` when `kind` fires. Replaces any
    /// previous registration for that kind.
    pub fn register(&self, kind: EventKind, queue: Arc<OsMesgQueue>, mesg: OsMesg) {
        let mut state = self.state.lock().unwrap();
        state.slots[kind as usize] = Some(Registration { queue, mesg });
    }

    /// Register the VI mailbox and set how many retraces elapse between
    /// deliveries. A count of 0 behaves as 1.
    pub fn register_vi(&self, queue: Arc<OsMesgQueue>, mesg: OsMesg, retrace_count: u32) {
        let mut state = self.state.lock().unwrap();
        state.slots[EventKind::VI as usize] = Some(Registration { queue, mesg });
        state.vi_retrace_count = retrace_count.max(1);
    }

    /// Deliver `kind`'s registered message. Unregistered kinds and full
    /// queues drop the message without blocking.
    pub fn deliver(&self, kind: EventKind) {
        let state = self.state.lock().unwrap();
        deliver_slot(&state.slots[kind as usize], kind);
    }

    /// One retrace: the VI message first (when due), then the AI message,
    /// inside a single critical section. Returns the configured retrace
    /// interval so the caller can reload its countdown from the same
    /// critical section.
    pub fn deliver_retrace(&self, vi_due: bool) -> u32 {
        let state = self.state.lock().unwrap();
        if vi_due {
            deliver_slot(&state.slots[EventKind::VI as usize], EventKind::VI);
        }
        deliver_slot(&state.slots[EventKind::AI as usize], EventKind::AI);
        state.vi_retrace_count
    }
}

impl Default for MailboxRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver_slot(slot: &Option<Registration>, kind: EventKind) {
    if let Some(reg) = slot {
        if reg.queue.try_send(reg.mesg).is_err() {
            log::trace!("{:?} event dropped, mailbox full", kind);
        }
    }
}
