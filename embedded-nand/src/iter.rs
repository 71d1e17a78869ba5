use crate::{BlockIndex, ColumnAddress, PageIndex};

/// The part of one page touched by a read or program request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageSlice {
    /// Page holding the bytes
    pub page: PageIndex,
    /// First byte within the page
    pub column: ColumnAddress,
    /// Number of bytes within the page
    pub len: usize,
}

/// Split a linear byte range into per-page slices, in ascending page order.
///
/// The first slice starts at the true column offset, interior slices cover whole pages
/// and the last slice ends at the end of the range. Slice lengths always sum to the
/// length of the range.
#[derive(Debug, Clone)]
pub struct PageSlices {
    pub(crate) page_size: u32,
    /// Byte address of the next slice
    pub(crate) next: u32,
    /// Byte address one past the end of the range
    pub(crate) end: u32,
}

impl Iterator for PageSlices {
    type Item = PageSlice;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let page = self.next / self.page_size;
        let column = self.next % self.page_size;
        let len = (self.page_size - column).min(self.end - self.next);
        self.next += len;
        Some(PageSlice {
            page: PageIndex(page),
            column: ColumnAddress(column as u16),
            len: len as usize,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.next >= self.end {
            0
        } else {
            ((self.end - 1) / self.page_size - self.next / self.page_size + 1) as usize
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PageSlices {}

/// Iterate over consecutive blocks
#[derive(Debug, Clone)]
pub struct BlockIter {
    pub(crate) count: u32,
    pub(crate) end: u32,
}

impl Iterator for BlockIter {
    type Item = BlockIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.count < self.end {
            let block = BlockIndex(self.count);
            self.count += 1;
            Some(block)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.count) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BlockIter {}

/// Iterate over the first page of consecutive blocks, stepping by a constant stride
#[derive(Debug, Clone)]
pub struct BlockPageIter {
    pub(crate) blocks: BlockIter,
    pub(crate) pages_per_block: u32,
}

impl Iterator for BlockPageIter {
    type Item = PageIndex;

    fn next(&mut self) -> Option<Self::Item> {
        self.blocks
            .next()
            .map(|block| PageIndex(block.0 * self.pages_per_block))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.blocks.size_hint()
    }
}

impl ExactSizeIterator for BlockPageIter {}
