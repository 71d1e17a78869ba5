use core::{
    fmt::Display,
    ops::{Add, AddAssign},
};

/// Index of a page in the flash device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageIndex(pub(crate) u32);

impl PageIndex {
    pub const fn new(index: u32) -> Self {
        PageIndex(index)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn inc(&mut self) {
        self.0 += 1;
    }

    /// The page address as sent on the wire, most significant byte first
    pub const fn to_be_bytes(&self) -> [u8; 2] {
        (self.0 as u16).to_be_bytes()
    }
}

/// Index of a block (erase unit) in the flash device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockIndex(pub(crate) u32);

impl BlockIndex {
    pub const fn new(index: u32) -> Self {
        BlockIndex(index)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl Add<u32> for BlockIndex {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        BlockIndex(self.0 + rhs)
    }
}

impl AddAssign<u32> for BlockIndex {
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}

/// Linear address of a byte in the flash device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteAddress(pub(crate) u32);

impl ByteAddress {
    pub const fn new(address: u32) -> Self {
        ByteAddress(address)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl Add<u32> for ByteAddress {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        ByteAddress(self.0 + rhs)
    }
}

impl AddAssign<u32> for ByteAddress {
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs;
    }
}

/// Offset of a byte within a page, as held in the device cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnAddress(pub(crate) u16);

impl ColumnAddress {
    pub const fn new(address: u16) -> Self {
        ColumnAddress(address)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// The column address as sent on the wire, most significant byte first
    pub const fn to_be_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

macro_rules! impl_raw {
    ($($ty:ident => $raw:ty),*) => {
        $(
            impl From<$ty> for $raw {
                fn from(value: $ty) -> Self {
                    value.0
                }
            }

            impl Display for $ty {
                fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                    self.0.fmt(f)
                }
            }
        )*
    };
}

impl_raw!(PageIndex => u32, BlockIndex => u32, ByteAddress => u32, ColumnAddress => u16);
