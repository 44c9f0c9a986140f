/// Controller pad state mirrored from the host input backend.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControllerState {
    pub buttons: u16,
    pub stick_x: i8,
    pub stick_y: i8,
}

/// Controller button masks, matching the console's pad status word.
pub mod buttons {
    pub const A: u16 = 0x8000;
    pub const B: u16 = 0x4000;
    pub const Z: u16 = 0x2000;
    pub const START: u16 = 0x1000;
    pub const D_UP: u16 = 0x0800;
    pub const D_DOWN: u16 = 0x0400;
    pub const D_LEFT: u16 = 0x0200;
    pub const D_RIGHT: u16 = 0x0100;
    pub const L: u16 = 0x0020;
    pub const R: u16 = 0x0010;
    pub const C_UP: u16 = 0x0008;
    pub const C_DOWN: u16 = 0x0004;
    pub const C_LEFT: u16 = 0x0002;
    pub const C_RIGHT: u16 = 0x0001;
}

/// One host input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Fresh pad snapshot.
    Controller(ControllerState),
    /// The host asked to close (window close, Ctrl-C, ...).
    Quit,
}

/// Input seam, polled from the dispatch thread between queue pops.
pub trait InputBackend: Send {
    /// Next pending event, or `None` when nothing new arrived.
    fn poll_event(&mut self) -> Option<InputEvent>;
}
