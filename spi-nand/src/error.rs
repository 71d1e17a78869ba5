use core::fmt::Debug;
use embedded_nand::{NandFlashError, NandFlashErrorKind};

use crate::JedecID;

/// Error type for the SPI NAND driver.
///
/// It is generic over the SPI error type (SE), which allows for different SPI implementations.
///
/// Erase can fail with every variant except [SpiNandError::ProgramFailed], program with every
/// variant except [SpiNandError::EraseFailed], read only with transport, argument and
/// timeout errors.
#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpiNandError<SE> {
    /// Error from the SPI peripheral, passed through unchanged
    #[error("SpiDevice error: {0:?}")]
    Spi(SE),
    /// Requested bytes not aligned to the page or block size
    #[error("Requested bytes not aligned")]
    NotAligned,
    /// Requested bytes out of bounds
    #[error("Requested bytes out of bounds")]
    OutOfBounds,
    /// The busy flag did not clear within the polling budget.
    /// Whether the pending command completed is unknown.
    #[error("Device still busy after {polls} status polls")]
    Timeout { polls: u32 },
    /// Block erase failed, the erase fail latch was set.
    /// This can happen if the block is protected, write is disabled or block has failed.
    #[error("Erase failed at byte address {address:#x}")]
    EraseFailed { address: u32 },
    /// Program failed, the program fail latch was set.
    /// This can happen if the write is disabled, block is protected or the block has failed.
    #[error("Program failed at byte address {address:#x}")]
    ProgramFailed { address: u32 },
    /// The device answered with an unexpected JEDEC ID
    #[error("Unexpected JEDEC ID {0:?}")]
    UnknownDevice(JedecID),
}

impl<SE> SpiNandError<SE> {
    /// The request was rejected before any bus activity
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, SpiNandError::NotAligned | SpiNandError::OutOfBounds)
    }

    /// The failure is transient and the caller may retry.
    /// The effect of the interrupted command is indeterminate.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SpiNandError::Timeout { .. })
    }
}

// Convert from SPI error to more generic NandFlashError
impl<SE: Debug> NandFlashError for SpiNandError<SE> {
    fn kind(&self) -> NandFlashErrorKind {
        match self {
            SpiNandError::NotAligned => NandFlashErrorKind::NotAligned,
            SpiNandError::OutOfBounds => NandFlashErrorKind::OutOfBounds,
            SpiNandError::Spi(_) => NandFlashErrorKind::Other,
            SpiNandError::Timeout { .. } => NandFlashErrorKind::Busy,
            SpiNandError::EraseFailed { address } => NandFlashErrorKind::BlockFail(Some(*address)),
            SpiNandError::ProgramFailed { address } => {
                NandFlashErrorKind::BlockFail(Some(*address))
            }
            SpiNandError::UnknownDevice(_) => NandFlashErrorKind::Other,
        }
    }
}

// This impl is only for the planner functions for auto conversion from errors
impl<SE> From<NandFlashErrorKind> for SpiNandError<SE> {
    fn from(kind: NandFlashErrorKind) -> Self {
        match kind {
            NandFlashErrorKind::NotAligned => SpiNandError::NotAligned,
            // Planners only report argument errors
            _ => SpiNandError::OutOfBounds,
        }
    }
}
