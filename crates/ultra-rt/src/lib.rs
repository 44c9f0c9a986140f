pub mod dispatch;
pub mod events;
pub mod input;
pub mod mailbox;
pub mod mem;
pub mod mesg;
pub mod queue;
pub mod renderer;
pub mod task;
pub mod vi;

pub use events::EventSystem;
