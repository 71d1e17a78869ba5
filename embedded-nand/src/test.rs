use crate::{Access, BlockIndex, FlashGeometry, NandFlash, NandFlashErrorKind};

/// A virtual NAND flash implementation that can be used for testing purposes.
///
/// Programming can only clear bits, erasing sets a whole block back to 0xFF. Blocks can
/// be marked as failing so that erase and program report a failure.
#[derive(Debug, Clone)]
pub struct VirtualNandFlash<const SIZE: usize> {
    geometry: FlashGeometry,
    storage: [u8; SIZE],
    failing: Option<BlockIndex>,
    erase_count: u32,
    program_count: u32,
}

impl<const SIZE: usize> VirtualNandFlash<SIZE> {
    /// Creates a new, fully erased virtual NAND flash.
    ///
    /// # Panics
    ///
    /// Panics if the geometry does not describe exactly `SIZE` bytes.
    pub fn new(geometry: FlashGeometry) -> Self {
        assert_eq!(geometry.total_size() as usize, SIZE);
        Self {
            geometry,
            storage: [0xFF; SIZE],
            failing: None,
            erase_count: 0,
            program_count: 0,
        }
    }

    /// Report a failure for any erase or program touching `block`
    pub fn fail_block(&mut self, block: BlockIndex) {
        self.failing = Some(block);
    }

    /// Number of blocks erased so far
    pub fn erase_count(&self) -> u32 {
        self.erase_count
    }

    /// Number of pages programmed so far
    pub fn program_count(&self) -> u32 {
        self.program_count
    }

    pub fn contents(&self) -> &[u8] {
        &self.storage
    }
}

impl<const SIZE: usize> crate::ErrorType for VirtualNandFlash<SIZE> {
    type Error = NandFlashErrorKind;
}

impl<const SIZE: usize> NandFlash for VirtualNandFlash<SIZE> {
    fn geometry(&self) -> FlashGeometry {
        self.geometry
    }

    fn erase(&mut self, offset: u32, length: u32) -> Result<(), Self::Error> {
        let span = self.geometry.plan_erase(offset, length)?;
        trace!(
            "Erasing {} blocks from block {}",
            span.block_count,
            span.first_block.as_u32()
        );
        for block in span.blocks() {
            if self.failing == Some(block) {
                let address = self.geometry.block_address(block).as_u32();
                return Err(NandFlashErrorKind::BlockFail(Some(address)));
            }
            let start = self.geometry.block_address(block).as_u32() as usize;
            self.storage[start..start + self.geometry.block_size() as usize].fill(0xFF);
            self.erase_count += 1;
        }
        Ok(())
    }

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<usize, Self::Error> {
        self.geometry.check_bounds(offset, bytes.len())?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.storage[start..start + bytes.len()]);
        Ok(bytes.len())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<usize, Self::Error> {
        let plan = self.geometry.plan_access(Access::Program, offset, bytes.len())?;
        for (slice, chunk) in plan.zip(bytes.chunks(self.geometry.page_size() as usize)) {
            let address = self.geometry.page_address(slice.page).as_u32();
            if self.failing == Some(self.geometry.block_of_page(slice.page)) {
                return Err(NandFlashErrorKind::BlockFail(Some(address)));
            }
            let start = address as usize;
            for (cell, byte) in self.storage[start..start + chunk.len()]
                .iter_mut()
                .zip(chunk)
            {
                *cell &= *byte;
            }
            self.program_count += 1;
        }
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Adds logging to the test automatically
    // control with RUST_LOG="LEVEL"
    // requires --features log passed to cargo test
    use test_log::test;

    const GEOMETRY: FlashGeometry = FlashGeometry::new(32, 4, 8, 8192);
    const CAPACITY: usize = 8192;

    /// Test read, write and erase of entire flash
    #[test]
    fn test_all_rwe() {
        let mut flash = VirtualNandFlash::<CAPACITY>::new(GEOMETRY);
        let buffer = [0; CAPACITY];
        assert_eq!(flash.write(0, &buffer).unwrap(), CAPACITY);
        let mut rbuffer = [1; CAPACITY];
        flash.read(0, &mut rbuffer).unwrap();
        assert_eq!(buffer, rbuffer);
        flash.erase(0, CAPACITY as u32).unwrap();
        flash.read(0, &mut rbuffer).unwrap();
        assert_eq!(rbuffer, [0xFF; CAPACITY]);
        assert_eq!(flash.erase_count(), GEOMETRY.block_count());
    }

    /// Programming only clears bits
    #[test]
    fn program_ands_bits() {
        let mut flash = VirtualNandFlash::<CAPACITY>::new(GEOMETRY);
        flash.write(128, &[0xF0; 128]).unwrap();
        flash.write(128, &[0x3C; 128]).unwrap();
        let mut rbuffer = [0; 128];
        flash.read(128, &mut rbuffer).unwrap();
        assert_eq!(rbuffer, [0x30; 128]);
    }

    /// Reads across page and block boundaries at any alignment
    #[test]
    fn test_block_boundary_read() {
        let mut flash = VirtualNandFlash::<CAPACITY>::new(GEOMETRY);
        let mut page = [0; 1024];
        for (i, b) in page.iter_mut().enumerate() {
            *b = i as u8;
        }
        flash.write(0, &page).unwrap();
        let mut rbuffer = [0; 300];
        flash.read(1024 - 700, &mut rbuffer).unwrap();
        assert_eq!(rbuffer[..], page[324..624]);
    }

    #[test]
    fn failing_block_stops_erase() {
        let mut flash = VirtualNandFlash::<CAPACITY>::new(GEOMETRY);
        flash.write(0, &[0; 3 * 1024]).unwrap();
        flash.fail_block(BlockIndex::new(1));
        assert_eq!(
            flash.erase(0, 3 * 1024),
            Err(NandFlashErrorKind::BlockFail(Some(1024)))
        );
        assert_eq!(flash.erase_count(), 1);
        assert!(flash.contents()[..1024].iter().all(|&b| b == 0xFF));
        assert!(flash.contents()[2048..3072].iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_partial_page_write() {
        let mut flash = VirtualNandFlash::<CAPACITY>::new(GEOMETRY);
        assert_eq!(
            flash.write(0, &[0; 127]),
            Err(NandFlashErrorKind::NotAligned)
        );
        assert_eq!(flash.program_count(), 0);
    }
}
