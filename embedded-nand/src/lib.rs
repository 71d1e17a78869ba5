#![no_std]

#[cfg(test)]
extern crate std;

// Must be first to share macros across crate
mod fmt;

mod address;
pub mod command;
mod geometry;
pub mod iter;
pub mod plan;
pub mod test;

pub use address::{BlockIndex, ByteAddress, ColumnAddress, PageIndex};
pub use command::{Command, Response};
pub use geometry::{FlashGeometry, GeometryError, MAX_PAGE_COUNT};
pub use iter::{PageSlice, PageSlices};
pub use plan::{Access, EraseSpan};

pub trait NandFlashError: core::fmt::Debug {
    /// Convert a specific NAND flash error into a generic error kind
    fn kind(&self) -> NandFlashErrorKind;
}

/// A trait that NandFlash implementations can use to share an error type.
pub trait ErrorType {
    /// Errors returned by this NAND flash.
    type Error: NandFlashError;
}

/// NAND flash error kinds.
///
/// NAND flash implementations must map their error to those generic error kinds through the
/// [`NandFlashError`] trait.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum NandFlashErrorKind {
    /// The arguments are not properly aligned.
    NotAligned,

    /// The arguments are out of bounds.
    OutOfBounds,

    /// The device reported that an erase or program did not succeed.
    /// Contains byte address of the failed unit, or [None] if unknown
    BlockFail(Option<u32>),

    /// The device did not become ready in time. The outcome of the last command is unknown.
    Busy,

    /// Error specific to the implementation.
    Other,
}

impl NandFlashErrorKind {
    /// The request itself was invalid and nothing was sent to the device
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            NandFlashErrorKind::NotAligned | NandFlashErrorKind::OutOfBounds
        )
    }
}

impl NandFlashError for NandFlashErrorKind {
    fn kind(&self) -> NandFlashErrorKind {
        *self
    }
}

/// Byte addressed erase/read/write contract over a NAND flash device.
///
/// Calls take `&mut self`: a device runs a single command at a time, so callers sharing a
/// device must serialise access themselves (one lock per device).
pub trait NandFlash: ErrorType {
    /// Layout of the device
    fn geometry(&self) -> FlashGeometry;

    /// The capacity of the peripheral in bytes.
    fn capacity(&self) -> u32 {
        self.geometry().total_size()
    }

    /// Erase `length` bytes starting at `offset`.
    /// The range will contain all 1s (0xFF) afterwards.
    ///
    /// Erase is not transactional. If a block fails, blocks before it stay erased and the
    /// failed block is indeterminate until erased again.
    ///
    /// # Errors
    ///
    /// Returns an error if `offset` or `length` is not a multiple of the block size, or the
    /// range is out of bounds. Nothing is erased in that case.
    fn erase(&mut self, offset: u32, length: u32) -> Result<(), Self::Error>;

    /// Erase a block by block index.
    fn erase_block(&mut self, block: BlockIndex) -> Result<(), Self::Error> {
        let geometry = self.geometry();
        self.erase(
            geometry.block_address(block).as_u32(),
            geometry.block_size(),
        )
    }

    /// Read `bytes.len()` bytes starting at `offset`. Any alignment is accepted.
    ///
    /// Returns the number of bytes read.
    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<usize, Self::Error>;

    /// Program whole pages starting at `offset`. The pages must have been erased.
    ///
    /// Pages are programmed in ascending order. If a page fails, earlier pages stay
    /// programmed and later pages are not attempted.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if `offset` or `bytes.len()` is not a multiple of the page size, or
    /// the range is out of bounds.
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<usize, Self::Error>;

    /// Iterate over every block of the device
    fn block_iter(&self) -> iter::BlockIter {
        iter::BlockIter {
            count: 0,
            end: self.geometry().block_count(),
        }
    }
}
