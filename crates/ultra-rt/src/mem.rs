use std::sync::Mutex;

pub const RDRAM_SIZE: usize = 8 * 1024 * 1024; // 8 MB (Expansion Pak)

/// RDRAM — the console's main memory, shared across host threads.
///
/// The recompiled game code, the dispatch thread, and renderer submissions
/// all read and write it, so the byte store sits behind a mutex. Accessors
/// take physical addresses; callers translate segment pointers first.
pub struct MemoryImage {
    data: Mutex<Vec<u8>>,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(vec![0u8; RDRAM_SIZE]),
        }
    }

    pub fn read_u8(&self, paddr: u32) -> u8 {
        let data = self.data.lock().unwrap();
        let index = (paddr as usize) & (RDRAM_SIZE - 1);
        data[index]
    }

    pub fn read_u32(&self, paddr: u32) -> u32 {
        let data = self.data.lock().unwrap();
        let index = (paddr as usize) & (RDRAM_SIZE - 1);
        u32::from_be_bytes([
            data[index],
            data[index + 1],
            data[index + 2],
            data[index + 3],
        ])
    }

    pub fn write_u8(&self, paddr: u32, val: u8) {
        let mut data = self.data.lock().unwrap();
        let index = (paddr as usize) & (RDRAM_SIZE - 1);
        data[index] = val;
    }

    pub fn write_u32(&self, paddr: u32, val: u32) {
        let mut data = self.data.lock().unwrap();
        let index = (paddr as usize) & (RDRAM_SIZE - 1);
        let bytes = val.to_be_bytes();
        data[index..index + 4].copy_from_slice(&bytes);
    }

    /// Copy `bytes` into memory starting at `paddr`, truncating at the end
    /// of RDRAM.
    pub fn write_bytes(&self, paddr: u32, bytes: &[u8]) {
        let mut data = self.data.lock().unwrap();
        let start = (paddr as usize) & (RDRAM_SIZE - 1);
        let end = (start + bytes.len()).min(RDRAM_SIZE);
        data[start..end].copy_from_slice(&bytes[..end - start]);
    }

    /// Set `len` bytes starting at `paddr` to `val`, truncating at the end
    /// of RDRAM.
    pub fn fill(&self, paddr: u32, len: usize, val: u8) {
        let mut data = self.data.lock().unwrap();
        let start = (paddr as usize) & (RDRAM_SIZE - 1);
        let end = (start + len).min(RDRAM_SIZE);
        data[start..end].fill(val);
    }
}

impl Default for MemoryImage {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate a virtual address to physical.
///
/// kseg0 (0x8000_0000..0x9FFF_FFFF): direct mapped, cached
/// kseg1 (0xA000_0000..0xBFFF_FFFF): direct mapped, uncached
/// Anything else keeps its low 29 bits; the recompiled titles this runtime
/// hosts only use the direct-mapped segments.
pub fn virtual_to_physical(vaddr: u32) -> u32 {
    match vaddr {
        0x8000_0000..=0x9FFF_FFFF => vaddr - 0x8000_0000,
        0xA000_0000..=0xBFFF_FFFF => vaddr - 0xA000_0000,
        _ => vaddr & 0x1FFF_FFFF,
    }
}

/// Physical address back to its cached kseg0 alias.
pub fn phys_to_kseg0(paddr: u32) -> u32 {
    0x8000_0000 | paddr
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kseg0_and_kseg1_map_to_same_physical() {
        assert_eq!(virtual_to_physical(0x8010_0000), 0x0010_0000);
        assert_eq!(virtual_to_physical(0xA010_0000), 0x0010_0000);
    }

    #[test]
    fn phys_to_kseg0_inverts_translation() {
        let paddr = 0x0030_1A40;
        assert_eq!(virtual_to_physical(phys_to_kseg0(paddr)), paddr);
    }

    #[test]
    fn low_segment_addresses_keep_low_bits() {
        assert_eq!(virtual_to_physical(0x0000_1000), 0x0000_1000);
        assert_eq!(virtual_to_physical(0xC000_2000), 0x0000_2000);
    }

    #[test]
    fn word_accessors_are_big_endian() {
        let mem = MemoryImage::new();
        mem.write_u32(0x100, 0x1234_5678);
        assert_eq!(mem.read_u8(0x100), 0x12);
        assert_eq!(mem.read_u8(0x103), 0x78);
        assert_eq!(mem.read_u32(0x100), 0x1234_5678);
    }

    #[test]
    fn addresses_mask_to_rdram_size() {
        let mem = MemoryImage::new();
        mem.write_u32(RDRAM_SIZE as u32 + 0x40, 0xDEAD_BEEF);
        assert_eq!(mem.read_u32(0x40), 0xDEAD_BEEF);
    }

    #[test]
    fn fill_truncates_at_end_of_memory() {
        let mem = MemoryImage::new();
        let start = RDRAM_SIZE as u32 - 0x10;
        mem.fill(start, 0x100, 0xAA);
        assert_eq!(mem.read_u8(RDRAM_SIZE as u32 - 1), 0xAA);
        // The wrap-around region stays untouched.
        assert_eq!(mem.read_u8(0), 0x00);
    }

    #[test]
    fn write_bytes_lands_in_order() {
        let mem = MemoryImage::new();
        mem.write_bytes(0x200, &[1, 2, 3, 4, 5]);
        assert_eq!(mem.read_u32(0x200), 0x0102_0304);
        assert_eq!(mem.read_u8(0x204), 5);
    }
}
