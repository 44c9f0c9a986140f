use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Message word passed through an [`OsMesgQueue`]. 32 bits, the console
/// ABI's pointer-sized payload.
pub type OsMesg = u32;

/// A fixed-capacity message queue in the console OS style.
///
/// Senders never block: a full queue rejects the message and the caller
/// decides whether that matters. Receivers may block, with or without a
/// deadline.
pub struct OsMesgQueue {
    inner: Mutex<VecDeque<OsMesg>>,
    capacity: usize,
    ready: Condvar,
}

impl OsMesgQueue {
    /// A queue holding up to `capacity` undelivered messages. Zero behaves
    /// as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            ready: Condvar::new(),
        }
    }

    /// Non-blocking send. Returns the message back when the queue is full.
    pub fn try_send(&self, mesg: OsMesg) -> Result<(), OsMesg> {
        let mut queue = self.inner.lock().unwrap();
        if queue.len() >= self.capacity {
            return Err(mesg);
        }
        queue.push_back(mesg);
        self.ready.notify_one();
        Ok(())
    }

    /// Non-blocking receive.
    pub fn try_recv(&self) -> Option<OsMesg> {
        self.inner.lock().unwrap().pop_front()
    }

    /// Block until a message arrives.
    pub fn recv(&self) -> OsMesg {
        let mut queue = self.inner.lock().unwrap();
        loop {
            if let Some(mesg) = queue.pop_front() {
                return mesg;
            }
            queue = self.ready.wait(queue).unwrap();
        }
    }

    /// Block until a message arrives or `timeout` passes.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<OsMesg> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.inner.lock().unwrap();
        loop {
            if let Some(mesg) = queue.pop_front() {
                return Some(mesg);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, _timed_out) = self.ready.wait_timeout(queue, remaining).unwrap();
            queue = guard;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn try_send_rejects_when_full() {
        let queue = OsMesgQueue::new(2);
        assert_eq!(queue.try_send(1), Ok(()));
        assert_eq!(queue.try_send(2), Ok(()));
        assert_eq!(queue.try_send(3), Err(3));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn messages_arrive_in_fifo_order() {
        let queue = OsMesgQueue::new(4);
        for mesg in [10, 20, 30] {
            queue.try_send(mesg).unwrap();
        }
        assert_eq!(queue.try_recv(), Some(10));
        assert_eq!(queue.try_recv(), Some(20));
        assert_eq!(queue.try_recv(), Some(30));
        assert_eq!(queue.try_recv(), None);
    }

    #[test]
    fn zero_capacity_holds_one_message() {
        let queue = OsMesgQueue::new(0);
        assert_eq!(queue.try_send(7), Ok(()));
        assert_eq!(queue.try_send(8), Err(8));
        assert_eq!(queue.try_recv(), Some(7));
    }

    #[test]
    fn recv_timeout_expires_on_empty_queue() {
        let queue = OsMesgQueue::new(1);
        let before = Instant::now();
        assert_eq!(queue.recv_timeout(Duration::from_millis(20)), None);
        assert!(before.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn recv_timeout_returns_pending_message_immediately() {
        let queue = OsMesgQueue::new(1);
        queue.try_send(42).unwrap();
        assert_eq!(queue.recv_timeout(Duration::from_secs(5)), Some(42));
    }

    #[test]
    fn blocking_recv_wakes_on_send() {
        let queue = Arc::new(OsMesgQueue::new(1));
        let sender = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            sender.try_send(99).unwrap();
        });
        assert_eq!(queue.recv(), 99);
        handle.join().unwrap();
    }
}
