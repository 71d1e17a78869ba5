#![no_std]

#[cfg(any(test, feature = "sim"))]
extern crate alloc;
#[cfg(test)]
extern crate std;

// Must be first to share macros across crate
pub(crate) mod fmt;

pub mod cmd_blocking;
mod device;
pub mod error;
mod session;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod status;
pub mod wait;

pub use device::SpiNandDevice;
pub use embedded_nand::FlashGeometry;
pub use session::SessionState;

/// Core trait that a SPI NAND flash device must implement.
///
/// Enables use of the [crate::cmd_blocking::SpiNandBlocking] trait.
///
/// At minimum requires the [SpiNand::GEOMETRY] and JEDEC ID constants to describe the
/// device. Default command opcodes and register addresses can be overriden by changing
/// the constants.
pub trait SpiNand {
    // Device layout
    /// Column, page and block layout of the device
    const GEOMETRY: FlashGeometry;
    /// Expected manufacturer byte of the JEDEC ID
    const JEDEC_MANUFACTURER_ID: u8;
    /// Expected device bytes of the JEDEC ID
    const JEDEC_DEVICE_ID: u16;

    // Commands
    /// The command to read the JEDEC ID of the flash device
    const JEDEC_COMMAND: u8 = 0x9F;
    /// Command to read a status/configuration register
    const STATUS_REGISTER_READ_COMMAND: u8 = 0x05;
    /// Command to write a status/configuration register
    const STATUS_REGISTER_WRITE_COMMAND: u8 = 0x01;
    /// Enable writing to the flash device, including erasing
    const WRITE_ENABLE_COMMAND: u8 = 0x06;
    /// Disable writing to the flash device
    const WRITE_DISABLE_COMMAND: u8 = 0x04;
    /// Command to read a page into the device buffer/register
    const PAGE_READ_COMMAND: u8 = 0x13;
    /// Command to read a page from the device buffer/register
    const PAGE_READ_BUFFER_COMMAND: u8 = 0x03;
    /// Command to write bytes to the device buffer/register, resetting current values (0xFF)
    const PROGRAM_LOAD_COMMAND: u8 = 0x02;
    /// Command to program the device buffer/register to a page
    const PROGRAM_EXECUTE_COMMAND: u8 = 0x10;
    /// Command to erase a block of flash memory
    const BLOCK_ERASE_COMMAND: u8 = 0xD8;

    // Registers
    /// Block protection register, must be cleared before erase or program
    const PROTECTION_REGISTER: u8 = 0xA0;
    /// Configuration register
    const CONFIGURATION_REGISTER: u8 = 0xB0;
    /// Status register holding the busy and fail flags
    const STATUS_REGISTER: u8 = 0xC0;

    // Timing
    /// Default sleep between busy polls, in microseconds
    const POLL_INTERVAL_US: u32 = wait::PollConfig::DEFAULT_INTERVAL_US;
    /// Default number of busy polls before timing out
    const MAX_POLLS: u32 = wait::PollConfig::DEFAULT_MAX_POLLS;
}

/// The JEDEC ID of a flash device
/// See https://www.jedec.org/standards-documents/docs/jep-106ab for a list of JEDEC IDs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JedecID {
    /// Manufacturer byte
    pub manufacturer: u8,
    /// The device id. MSB first on wire
    pub device: u16,
}

impl JedecID {
    pub fn new(manufacturer: u8, device: u16) -> Self {
        JedecID {
            manufacturer,
            device,
        }
    }

    /// The ID a device of type `D` should report
    pub fn expected<D: SpiNand>() -> Self {
        JedecID::new(D::JEDEC_MANUFACTURER_ID, D::JEDEC_DEVICE_ID)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for JedecID {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "JedecID(manufacturer: {:02X}, device: {:04X})",
            self.manufacturer,
            self.device
        );
    }
}
