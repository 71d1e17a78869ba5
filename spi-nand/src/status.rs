/// Contents of the status register (0xC0).
///
/// Always read fresh after a command, never cached across commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Status(pub u8);

impl Status {
    /// Device is executing a command
    pub const BUSY: u8 = 0b0000_0001;
    /// Write enable latch
    pub const WRITE_ENABLE_LATCH: u8 = 0b0000_0010;
    /// Last erase failed
    pub const ERASE_FAIL: u8 = 0b0000_0100;
    /// Last program failed
    pub const PROGRAM_FAIL: u8 = 0b0000_1000;

    pub fn is_busy(&self) -> bool {
        self.0 & Self::BUSY != 0
    }

    pub fn write_enabled(&self) -> bool {
        self.0 & Self::WRITE_ENABLE_LATCH != 0
    }

    pub fn erase_failed(&self) -> bool {
        self.0 & Self::ERASE_FAIL != 0
    }

    pub fn program_failed(&self) -> bool {
        self.0 & Self::PROGRAM_FAIL != 0
    }

    /// Any of the fail latches in `mask` is set
    pub fn failed(&self, mask: u8) -> bool {
        self.0 & mask != 0
    }
}
