use crate::mem::MemoryImage;
use crate::task::TaskDescriptor;

/// Error surfaced by a renderer backend.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Renderer seam. The dispatch thread drives it; implementations bring
/// their own graphics API.
pub trait RendererBackend: Send {
    /// One-time setup with the ROM image and the shared memory view. Runs
    /// on the thread that starts the event system, before any task is
    /// dispatched.
    fn initialize(&mut self, rom: &[u8], mem: &MemoryImage) -> Result<(), BackendError>;

    /// Hand a graphics task to the renderer. The display list and ucode
    /// live in `mem` at the addresses the task names.
    fn submit_task(&mut self, mem: &MemoryImage, task: &TaskDescriptor);

    /// Show the frame whose pixels start at physical `origin`.
    fn present(&mut self, origin: u32);

    fn name(&self) -> &'static str {
        "renderer"
    }
}
