use crate::{BlockIndex, ByteAddress, ColumnAddress, PageIndex};

/// Largest number of pages a device may have. Page addresses are sent as 16 bits.
pub const MAX_PAGE_COUNT: u32 = 1 << 16;

/// Reasons a [FlashGeometry] can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GeometryError {
    /// Column size, columns per page or pages per block is zero or not a power of two
    #[error("Geometry sizes must be non-zero powers of two")]
    NotPowerOfTwo,
    /// Total size is zero or not a whole number of blocks
    #[error("Total size must be a non-zero multiple of the block size")]
    PartialBlock,
    /// More pages than the 16 bit page address can reach
    #[error("Too many pages for a 16 bit page address")]
    TooManyPages,
    /// A page is too large for the 16 bit column address
    #[error("Page too large for a 16 bit column address")]
    PageTooLarge,
}

/// Fixed layout of a NAND flash device.
///
/// A page is `columns_per_page` columns of `column_size` bytes, a block is
/// `pages_per_block` pages. The geometry never changes for the lifetime of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlashGeometry {
    column_size: u32,
    columns_per_page: u32,
    pages_per_block: u32,
    total_size: u32,
}

impl FlashGeometry {
    /// Create a geometry, panicking if it is invalid.
    ///
    /// Intended for `const` device descriptions, where an invalid layout becomes a
    /// compile error. Use [FlashGeometry::try_new] for values known only at runtime.
    pub const fn new(
        column_size: u32,
        columns_per_page: u32,
        pages_per_block: u32,
        total_size: u32,
    ) -> Self {
        match Self::try_new(column_size, columns_per_page, pages_per_block, total_size) {
            Ok(geometry) => geometry,
            Err(GeometryError::NotPowerOfTwo) => panic!("geometry sizes must be powers of two"),
            Err(GeometryError::PartialBlock) => panic!("total size must be whole blocks"),
            Err(GeometryError::TooManyPages) => panic!("too many pages for 16 bit addressing"),
            Err(GeometryError::PageTooLarge) => panic!("page too large for 16 bit columns"),
        }
    }

    /// Create a geometry, checking every size constraint.
    pub const fn try_new(
        column_size: u32,
        columns_per_page: u32,
        pages_per_block: u32,
        total_size: u32,
    ) -> Result<Self, GeometryError> {
        if !column_size.is_power_of_two()
            || !columns_per_page.is_power_of_two()
            || !pages_per_block.is_power_of_two()
        {
            return Err(GeometryError::NotPowerOfTwo);
        }
        let page_size = match column_size.checked_mul(columns_per_page) {
            Some(size) if size <= u16::MAX as u32 + 1 => size,
            _ => return Err(GeometryError::PageTooLarge),
        };
        let block_size = match page_size.checked_mul(pages_per_block) {
            Some(size) => size,
            None => return Err(GeometryError::TooManyPages),
        };
        if total_size == 0 || total_size % block_size != 0 {
            return Err(GeometryError::PartialBlock);
        }
        if total_size / page_size > MAX_PAGE_COUNT {
            return Err(GeometryError::TooManyPages);
        }
        Ok(FlashGeometry {
            column_size,
            columns_per_page,
            pages_per_block,
            total_size,
        })
    }

    /// Size of a column in bytes
    pub const fn column_size(&self) -> u32 {
        self.column_size
    }

    pub const fn columns_per_page(&self) -> u32 {
        self.columns_per_page
    }

    pub const fn pages_per_block(&self) -> u32 {
        self.pages_per_block
    }

    /// The total capacity of the device in bytes
    pub const fn total_size(&self) -> u32 {
        self.total_size
    }

    /// Size of a page in bytes, the program and page-read unit
    pub const fn page_size(&self) -> u32 {
        self.column_size * self.columns_per_page
    }

    /// Size of a block in bytes, the erase unit
    pub const fn block_size(&self) -> u32 {
        self.page_size() * self.pages_per_block
    }

    pub const fn page_count(&self) -> u32 {
        self.total_size / self.page_size()
    }

    pub const fn block_count(&self) -> u32 {
        self.total_size / self.block_size()
    }

    /// Page containing the byte address
    pub fn page_of(&self, address: ByteAddress) -> PageIndex {
        PageIndex(address.0 / self.page_size())
    }

    /// Offset of the byte address within its page
    pub fn column_of(&self, address: ByteAddress) -> ColumnAddress {
        ColumnAddress((address.0 % self.page_size()) as u16)
    }

    /// Block containing the byte address
    pub fn block_of(&self, address: ByteAddress) -> BlockIndex {
        BlockIndex(address.0 / self.block_size())
    }

    pub fn page_address(&self, page: PageIndex) -> ByteAddress {
        ByteAddress(page.0 * self.page_size())
    }

    pub fn block_address(&self, block: BlockIndex) -> ByteAddress {
        ByteAddress(block.0 * self.block_size())
    }

    /// First page of a block
    pub fn first_page(&self, block: BlockIndex) -> PageIndex {
        PageIndex(block.0 * self.pages_per_block)
    }

    /// Block a page belongs to
    pub fn block_of_page(&self, page: PageIndex) -> BlockIndex {
        BlockIndex(page.0 / self.pages_per_block)
    }

    pub fn is_page_aligned(&self, offset: u32) -> bool {
        offset % self.page_size() == 0
    }

    pub fn is_block_aligned(&self, offset: u32) -> bool {
        offset % self.block_size() == 0
    }
}
