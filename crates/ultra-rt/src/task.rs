use crate::mem::{virtual_to_physical, MemoryImage};

// Task type codes in the first word of the OS task header.
pub const M_GFXTASK: u32 = 1;
pub const M_AUDTASK: u32 = 2;
pub const M_NJPEGTASK: u32 = 4;

/// The 64-byte OS task header handed to the signal processor.
///
/// Sixteen big-endian words, in record order. Pointer fields hold guest
/// virtual addresses.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub task_type: u32,
    pub flags: u32,
    pub ucode_boot: u32,
    pub ucode_boot_size: u32,
    pub ucode: u32,
    pub ucode_size: u32,
    pub ucode_data: u32,
    pub ucode_data_size: u32,
    pub dram_stack: u32,
    pub dram_stack_size: u32,
    pub output_buff: u32,
    pub output_buff_size: u32,
    pub data_ptr: u32,
    pub data_size: u32,
    pub yield_data_ptr: u32,
    pub yield_data_size: u32,
}

/// What a task asks the signal processor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Graphics,
    Audio,
    JpegDecode,
    Unknown(u32),
}

impl TaskDescriptor {
    pub fn kind(&self) -> TaskKind {
        match self.task_type {
            M_GFXTASK => TaskKind::Graphics,
            M_AUDTASK => TaskKind::Audio,
            M_NJPEGTASK => TaskKind::JpegDecode,
            other => TaskKind::Unknown(other),
        }
    }

    /// Read a task record out of guest memory at virtual address `vaddr`.
    pub fn read_from(mem: &MemoryImage, vaddr: u32) -> Self {
        let base = virtual_to_physical(vaddr);
        let word = |i: u32| mem.read_u32(base + i * 4);
        Self {
            task_type: word(0),
            flags: word(1),
            ucode_boot: word(2),
            ucode_boot_size: word(3),
            ucode: word(4),
            ucode_size: word(5),
            ucode_data: word(6),
            ucode_data_size: word(7),
            dram_stack: word(8),
            dram_stack_size: word(9),
            output_buff: word(10),
            output_buff_size: word(11),
            data_ptr: word(12),
            data_size: word(13),
            yield_data_ptr: word(14),
            yield_data_size: word(15),
        }
    }
}
