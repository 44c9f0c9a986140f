use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::dispatch::{self, DispatchContext};
use crate::input::{ControllerState, InputBackend};
use crate::mailbox::{EventKind, MailboxRegistry};
use crate::mem::{virtual_to_physical, MemoryImage};
use crate::mesg::{OsMesg, OsMesgQueue};
use crate::queue::{self, Action, ShutdownSignal};
use crate::renderer::{BackendError, RendererBackend};
use crate::task::TaskDescriptor;
use crate::vi::{self, FramebufferState};

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("event system already started")]
    AlreadyStarted,
    #[error("renderer backend: {0}")]
    Backend(#[from] BackendError),
    #[error("thread spawn failed: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Runtime tuning knobs.
#[derive(Debug, Clone)]
pub struct EventsConfig {
    /// Retrace pacing as a percentage of real time (100 = full speed).
    pub speed_percent: u32,
    /// How long the dispatch thread waits on an empty action queue before
    /// polling input again.
    pub pop_timeout: Duration,
    /// Input events drained per dispatch iteration.
    pub max_input_events: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            speed_percent: 100,
            pop_timeout: Duration::from_millis(1),
            max_input_events: 16,
        }
    }
}

impl EventsConfig {
    /// Build a config from the environment.
    ///
    /// `ULTRA_SPEED=<percent>` scales retrace pacing, clamped to 25..=400.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("ULTRA_SPEED") {
            match raw.trim().parse::<u32>() {
                Ok(percent) => config.speed_percent = percent.clamp(25, 400),
                Err(_) => log::warn!(
                    "Unknown ULTRA_SPEED value {:?}; keeping {}%",
                    raw,
                    config.speed_percent
                ),
            }
        }
        config
    }
}

/// Join handles for the two core threads, returned by
/// [`EventSystem::start`].
pub struct EventThreads {
    vi: JoinHandle<()>,
    dispatch: JoinHandle<()>,
}

impl EventThreads {
    /// Block until both core threads have exited.
    pub fn join(self) {
        let _ = self.vi.join();
        let _ = self.dispatch.join();
    }
}

/// The event system — everything the guest OS layer talks to.
///
/// Owns the mailbox registry, the framebuffer pair, the action queue, and
/// the shared memory image. `start` launches the VI timing thread and the
/// event dispatch thread; `shutdown` stops both.
pub struct EventSystem {
    mem: Arc<MemoryImage>,
    rom: Vec<u8>,
    registry: Arc<MailboxRegistry>,
    framebuffer: Arc<FramebufferState>,
    controller: Arc<Mutex<ControllerState>>,
    action_tx: Sender<Action>,
    action_rx: Mutex<Option<Receiver<Action>>>,
    shutdown_signal: ShutdownSignal,
    config: EventsConfig,
    started: AtomicBool,
}

impl EventSystem {
    pub fn new(rom: Vec<u8>, config: EventsConfig) -> Self {
        let (action_tx, action_rx) = queue::action_queue();
        Self {
            mem: Arc::new(MemoryImage::new()),
            rom,
            registry: Arc::new(MailboxRegistry::new()),
            framebuffer: Arc::new(FramebufferState::new()),
            controller: Arc::new(Mutex::new(ControllerState::default())),
            action_tx,
            action_rx: Mutex::new(Some(action_rx)),
            shutdown_signal: ShutdownSignal::new(),
            config,
            started: AtomicBool::new(false),
        }
    }

    /// Shared RDRAM handle. Recompiled code and backends read and write
    /// through this.
    pub fn memory(&self) -> Arc<MemoryImage> {
        Arc::clone(&self.mem)
    }

    pub fn config(&self) -> &EventsConfig {
        &self.config
    }

    /// Initialize the renderer and launch the timing and dispatch threads.
    ///
    /// The renderer is initialized on the calling thread so a failure is
    /// observable here instead of inside a thread. Can only succeed once.
    pub fn start(
        &self,
        mut renderer: Box<dyn RendererBackend>,
        mut input: Box<dyn InputBackend>,
    ) -> Result<EventThreads, StartError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(StartError::AlreadyStarted);
        }

        renderer.initialize(&self.rom, &self.mem)?;
        log::info!("renderer backend ready: {}", renderer.name());

        let actions = self
            .action_rx
            .lock()
            .unwrap()
            .take()
            .ok_or(StartError::AlreadyStarted)?;

        let vi_thread = {
            let registry = Arc::clone(&self.registry);
            let shutdown = self.shutdown_signal.subscribe();
            let speed_percent = self.config.speed_percent;
            thread::Builder::new()
                .name("vi-timing".into())
                .spawn(move || vi::run_vi_loop(&registry, speed_percent, &shutdown))?
        };

        let dispatch_thread = {
            let ctx = DispatchContext {
                mem: Arc::clone(&self.mem),
                registry: Arc::clone(&self.registry),
                framebuffer: Arc::clone(&self.framebuffer),
                controller: Arc::clone(&self.controller),
                shutdown: self.shutdown_signal.clone(),
                pop_timeout: self.config.pop_timeout,
                max_input_events: self.config.max_input_events,
            };
            thread::Builder::new()
                .name("event-dispatch".into())
                .spawn(move || {
                    dispatch::run_dispatch_loop(&ctx, &mut *renderer, &mut *input, actions)
                })?
        };

        Ok(EventThreads {
            vi: vi_thread,
            dispatch: dispatch_thread,
        })
    }

    /// Ask both core threads to stop. Idempotent; join the handles from
    /// [`start`](Self::start) to wait for them.
    pub fn shutdown(&self) {
        self.shutdown_signal.request();
    }

    /// Register `queue` to receive `mesg` when `kind` fires.
    pub fn register_event(&self, kind: EventKind, queue: Arc<OsMesgQueue>, mesg: OsMesg) {
        self.registry.register(kind, queue, mesg);
    }

    /// Register the retrace mailbox. `retrace_count` retraces elapse
    /// between messages; 0 behaves as 1, and a new count takes effect when
    /// the current countdown expires.
    pub fn register_vi_event(&self, queue: Arc<OsMesgQueue>, mesg: OsMesg, retrace_count: u32) {
        self.registry.register_vi(queue, mesg, retrace_count);
    }

    /// Queue an RSP task for the dispatch thread. The descriptor is copied
    /// here; later edits to the guest-side record do not reach it.
    pub fn submit_task(&self, task: TaskDescriptor) {
        let _ = self.action_tx.send(Action::SpTask { task });
    }

    /// Swap to the framebuffer at virtual address `vaddr`. `next` changes
    /// immediately; `current` follows when the dispatch thread presents
    /// this swap. The presented origin sits 640 bytes (one 320-pixel
    /// 16-bit scanline) past the buffer start.
    pub fn swap_buffer(&self, vaddr: u32) {
        self.framebuffer.set_next(vaddr);
        let _ = self.action_tx.send(Action::SwapBuffers {
            origin: virtual_to_physical(vaddr) + 640,
            buffer: vaddr,
        });
    }

    /// Framebuffer the screen is showing.
    pub fn current_framebuffer(&self) -> u32 {
        self.framebuffer.current()
    }

    /// Framebuffer most recently swapped in by the guest.
    pub fn next_framebuffer(&self) -> u32 {
        self.framebuffer.next()
    }

    /// Signal completion of a serial interface transaction.
    pub fn signal_si_complete(&self) {
        self.registry.deliver(EventKind::SI);
    }

    /// Latest pad state drained from the input backend.
    pub fn controller(&self) -> ControllerState {
        *self.controller.lock().unwrap()
    }
}
