//! Translation of linear byte requests into page and block plans.
//!
//! Every check happens here, before a single command reaches the device.

use crate::{
    iter::{BlockIter, BlockPageIter, PageSlices},
    BlockIndex, FlashGeometry, NandFlashErrorKind, PageIndex,
};

/// Kind of page access being planned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Access {
    /// Any byte range can be read
    Read,
    /// Only whole, page aligned pages can be programmed
    Program,
}

/// Range of whole blocks to erase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EraseSpan {
    pub first_block: BlockIndex,
    pub block_count: u32,
    pages_per_block: u32,
}

impl EraseSpan {
    /// Blocks in the span, in ascending order
    pub fn blocks(&self) -> BlockIter {
        BlockIter {
            count: self.first_block.0,
            end: self.first_block.0 + self.block_count,
        }
    }

    /// Address of each block in the span as the page index sent with the erase command
    pub fn pages(&self) -> BlockPageIter {
        BlockPageIter {
            blocks: self.blocks(),
            pages_per_block: self.pages_per_block,
        }
    }

    pub fn start_page(&self) -> PageIndex {
        PageIndex(self.first_block.0 * self.pages_per_block)
    }

    /// Last page covered by the span, or [None] if the span is empty
    pub fn end_page(&self) -> Option<PageIndex> {
        if self.block_count == 0 {
            None
        } else {
            Some(PageIndex(
                (self.first_block.0 + self.block_count) * self.pages_per_block - 1,
            ))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.block_count == 0
    }
}

impl FlashGeometry {
    /// Check that `length` bytes from `offset` fit in the device.
    pub fn check_bounds(&self, offset: u32, length: usize) -> Result<(), NandFlashErrorKind> {
        let length = u32::try_from(length).map_err(|_| NandFlashErrorKind::OutOfBounds)?;
        if length > self.total_size() || offset > self.total_size() - length {
            return Err(NandFlashErrorKind::OutOfBounds);
        }
        Ok(())
    }

    /// Plan an erase of `length` bytes from `offset`.
    ///
    /// Both must be multiples of the block size.
    pub fn plan_erase(&self, offset: u32, length: u32) -> Result<EraseSpan, NandFlashErrorKind> {
        self.check_bounds(offset, length as usize)?;
        if !self.is_block_aligned(offset) || !self.is_block_aligned(length) {
            return Err(NandFlashErrorKind::NotAligned);
        }
        Ok(EraseSpan {
            first_block: BlockIndex(offset / self.block_size()),
            block_count: length / self.block_size(),
            pages_per_block: self.pages_per_block(),
        })
    }

    /// Plan a read or program of `length` bytes from `offset`.
    ///
    /// Programs must be page aligned and a whole number of pages, reads have no alignment
    /// constraint.
    pub fn plan_access(
        &self,
        access: Access,
        offset: u32,
        length: usize,
    ) -> Result<PageSlices, NandFlashErrorKind> {
        self.check_bounds(offset, length)?;
        if access == Access::Program
            && (!self.is_page_aligned(offset) || length % self.page_size() as usize != 0)
        {
            return Err(NandFlashErrorKind::NotAligned);
        }
        Ok(PageSlices {
            page_size: self.page_size(),
            next: offset,
            end: offset + length as u32,
        })
    }
}
