use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{select, Receiver};

use crate::input::{ControllerState, InputBackend, InputEvent};
use crate::mailbox::{EventKind, MailboxRegistry};
use crate::mem::{virtual_to_physical, MemoryImage};
use crate::queue::{Action, ShutdownSignal};
use crate::renderer::RendererBackend;
use crate::task::{TaskDescriptor, TaskKind};
use crate::vi::FramebufferState;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown RSP task type {0:#X}")]
    UnknownTaskKind(u32),
}

/// Everything the dispatch thread touches, cloned out of the event system
/// at start.
pub(crate) struct DispatchContext {
    pub mem: Arc<MemoryImage>,
    pub registry: Arc<MailboxRegistry>,
    pub framebuffer: Arc<FramebufferState>,
    pub controller: Arc<Mutex<ControllerState>>,
    pub shutdown: ShutdownSignal,
    pub pop_timeout: Duration,
    pub max_input_events: usize,
}

/// Run one action to completion, signalling the mailboxes the guest OS
/// expects for that task type.
pub(crate) fn dispatch_action(
    ctx: &DispatchContext,
    renderer: &mut dyn RendererBackend,
    action: Action,
) -> Result<(), DispatchError> {
    match action {
        Action::SpTask { task } => match task.kind() {
            TaskKind::Graphics => {
                log::debug!("graphics task, data {:#010X}", task.data_ptr);
                renderer.submit_task(&ctx.mem, &task);
                ctx.registry.deliver(EventKind::SP);
                ctx.registry.deliver(EventKind::DP);
            }
            TaskKind::Audio => {
                log::debug!("audio task, data {:#010X}", task.data_ptr);
                ctx.registry.deliver(EventKind::SP);
            }
            TaskKind::JpegDecode => {
                decode_jpeg_task(&ctx.mem, &task);
                ctx.registry.deliver(EventKind::SP);
            }
            TaskKind::Unknown(code) => return Err(DispatchError::UnknownTaskKind(code)),
        },
        Action::SwapBuffers { origin, buffer } => {
            ctx.framebuffer.set_current(buffer);
            renderer.present(origin);
        }
    }
    Ok(())
}

/// Stand-in for the JPEG decode microcode: clear the destination so stale
/// data never reaches the screen.
///
/// The task's data pointer names three parameter words: destination
/// address, macroblock count, mode. Each macroblock decodes to subblocks
/// of 0x40 two-byte samples, 4 subblocks in mode 0 and 6 otherwise.
fn decode_jpeg_task(mem: &MemoryImage, task: &TaskDescriptor) {
    let params = virtual_to_physical(0x8000_0000 | task.data_ptr);
    let dest = mem.read_u32(params) | 0x8000_0000;
    let macroblock_count = mem.read_u32(params + 4);
    let mode = mem.read_u32(params + 8);

    let subblocks = if mode == 0 { 4 } else { 6 };
    let bytes = macroblock_count as usize * 0x40 * 2 * subblocks;
    log::debug!(
        "JPEG decode task: dest {:#010X}, {} macroblocks, mode {}",
        dest,
        macroblock_count,
        mode
    );
    mem.fill(virtual_to_physical(dest), bytes, 0);
}

/// Pull pending host input, at most `max_input_events` per call so a
/// chatty backend cannot starve the action queue. True when the backend
/// asked to quit.
pub(crate) fn drain_input(ctx: &DispatchContext, input: &mut dyn InputBackend) -> bool {
    for _ in 0..ctx.max_input_events {
        match input.poll_event() {
            Some(InputEvent::Controller(state)) => {
                *ctx.controller.lock().unwrap() = state;
            }
            Some(InputEvent::Quit) => {
                log::info!("quit requested by input backend");
                return true;
            }
            None => break,
        }
    }
    false
}

/// Dispatch thread body: pop actions with a timeout, interleave input
/// polling, stop on shutdown. An unknown task type is unrecoverable and
/// terminates the process here, the outermost boundary.
pub(crate) fn run_dispatch_loop(
    ctx: &DispatchContext,
    renderer: &mut dyn RendererBackend,
    input: &mut dyn InputBackend,
    actions: Receiver<Action>,
) {
    let shutdown = ctx.shutdown.subscribe();
    log::info!("event dispatch thread running");

    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(actions) -> action => match action {
                Ok(action) => {
                    if let Err(err) = dispatch_action(ctx, renderer, action) {
                        log::error!("{}", err);
                        std::process::exit(1);
                    }
                }
                Err(_) => break,
            },
            default(ctx.pop_timeout) => {}
        }

        if drain_input(ctx, input) {
            ctx.shutdown.request();
            break;
        }
    }

    log::info!("event dispatch thread stopped");
}
