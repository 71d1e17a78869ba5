use embedded_hal::{
    delay::DelayNs,
    spi::{Operation, SpiDevice},
};
use embedded_nand::{ColumnAddress, PageIndex};
use utils::{spi_transaction, spi_write, spi_write_then_read};

use crate::{
    error::SpiNandError,
    status::Status,
    wait::{await_ready, Outcome, PollConfig},
    JedecID, SpiNand,
};

/// Blocking SPI NAND flash trait.
/// Contains the low level, single SPI transaction commands and register access,
/// plus the busy-wait on the status register.
///
/// Each command is one bus transaction. None of them wait for the device, callers must
/// use [SpiNandBlocking::await_ready] before issuing the next command.
///
/// The default implementations are fairly generic and should work for most SPI NAND flash devices.
/// Look to make changes to the [SpiNand] trait first to change the default behavior.
/// If this isn't possible, override the default function(s).
pub trait SpiNandBlocking<SPI: SpiDevice>: SpiNand {
    // ============= Commands =============

    /// Read the JEDEC ID of the flash device.
    /// Sends the command and a dummy byte, then reads manufacturer and 2 device bytes
    fn read_jedec_id_cmd(&self, spi: &mut SPI) -> Result<JedecID, SpiNandError<SPI::Error>> {
        let mut buf = [0; 3];
        spi_write_then_read(spi, &[Self::JEDEC_COMMAND, 0], &mut buf)?;
        Ok(JedecID::new(buf[0], u16::from_be_bytes([buf[1], buf[2]])))
    }

    /// Read a status/configuration register
    fn read_register_cmd(&self, spi: &mut SPI, address: u8) -> Result<u8, SpiNandError<SPI::Error>> {
        let mut buf = [0; 1];
        spi_write_then_read(
            spi,
            &[Self::STATUS_REGISTER_READ_COMMAND, address],
            &mut buf,
        )?;
        Ok(buf[0])
    }

    /// Write a status/configuration register
    fn write_register_cmd(
        &self,
        spi: &mut SPI,
        address: u8,
        value: u8,
    ) -> Result<(), SpiNandError<SPI::Error>> {
        spi_write(spi, &[Self::STATUS_REGISTER_WRITE_COMMAND, address, value])
    }

    /// Read the status register
    fn read_status_cmd(&self, spi: &mut SPI) -> Result<Status, SpiNandError<SPI::Error>> {
        self.read_register_cmd(spi, Self::STATUS_REGISTER).map(Status)
    }

    /// Enable writing to the flash device
    fn write_enable_cmd(&self, spi: &mut SPI) -> Result<(), SpiNandError<SPI::Error>> {
        spi_write(spi, &[Self::WRITE_ENABLE_COMMAND])
    }

    /// Disable writing to the flash device
    fn write_disable_cmd(&self, spi: &mut SPI) -> Result<(), SpiNandError<SPI::Error>> {
        spi_write(spi, &[Self::WRITE_DISABLE_COMMAND])
    }

    /// Read a page into the device buffer/register
    fn page_read_cmd(
        &self,
        spi: &mut SPI,
        address: PageIndex,
    ) -> Result<(), SpiNandError<SPI::Error>> {
        let [hi, lo] = address.to_be_bytes();
        spi_write(spi, &[Self::PAGE_READ_COMMAND, 0, hi, lo])
    }

    /// Read bytes of a page from the device buffer/register starting from column address
    fn page_read_buffer_cmd(
        &self,
        spi: &mut SPI,
        ca: ColumnAddress,
        buf: &mut [u8],
    ) -> Result<(), SpiNandError<SPI::Error>> {
        let [hi, lo] = ca.to_be_bytes();
        spi_write_then_read(spi, &[Self::PAGE_READ_BUFFER_COMMAND, hi, lo, 0], buf)
    }

    /// Write bytes to the device buffer/register
    ///
    /// This will reset the buffer/register to 0xFF
    ///
    /// Use [SpiNandBlocking::write_enable_cmd] to enable writing before this command
    ///
    /// Use [SpiNandBlocking::program_execute_cmd] to write the buffer/register to a page
    fn program_load_cmd(
        &self,
        spi: &mut SPI,
        ca: ColumnAddress,
        buf: &[u8],
    ) -> Result<(), SpiNandError<SPI::Error>> {
        let [hi, lo] = ca.to_be_bytes();
        let header = [Self::PROGRAM_LOAD_COMMAND, hi, lo];
        spi_transaction(spi, &mut [Operation::Write(&header), Operation::Write(buf)])
    }

    /// Write the device buffer/register to a page
    ///
    /// Use [SpiNandBlocking::program_load_cmd] to write to the buffer/register
    ///
    /// Use [SpiNandBlocking::await_ready] with [Status::PROGRAM_FAIL] to check the result
    fn program_execute_cmd(
        &self,
        spi: &mut SPI,
        address: PageIndex,
    ) -> Result<(), SpiNandError<SPI::Error>> {
        let [hi, lo] = address.to_be_bytes();
        spi_write(spi, &[Self::PROGRAM_EXECUTE_COMMAND, 0, hi, lo])
    }

    /// Erase the block containing the page
    fn erase_block_cmd(
        &self,
        spi: &mut SPI,
        address: PageIndex,
    ) -> Result<(), SpiNandError<SPI::Error>> {
        let [hi, lo] = address.to_be_bytes();
        spi_write(spi, &[Self::BLOCK_ERASE_COMMAND, 0, hi, lo])
    }

    // ============= Status functions ============

    /// Wait until the busy flag clears, then decode the fail latches in `fail_mask`.
    ///
    /// Sleeps `config.interval_us` between status reads and gives up after
    /// `config.max_polls` reads.
    fn await_ready<DL: DelayNs>(
        &self,
        spi: &mut SPI,
        delay: &mut DL,
        config: &PollConfig,
        fail_mask: u8,
    ) -> Result<Outcome, SpiNandError<SPI::Error>> {
        await_ready(delay, config, fail_mask, || self.read_status_cmd(spi))
    }

    /// Disable block protection by clearing the protection register
    fn disable_block_protection(&self, spi: &mut SPI) -> Result<(), SpiNandError<SPI::Error>> {
        self.write_register_cmd(spi, Self::PROTECTION_REGISTER, 0)
    }
}

pub mod utils {
    use embedded_hal::spi::{Operation, SpiDevice};

    use super::SpiNandError;

    /// Wrapper around [SpiDevice::write] that maps errors
    pub fn spi_write<SPI: SpiDevice>(
        spi: &mut SPI,
        buf: &[u8],
    ) -> Result<(), SpiNandError<SPI::Error>> {
        spi.write(buf).map_err(SpiNandError::Spi)
    }

    /// Send a header then read `read.len()` bytes in one transaction
    pub fn spi_write_then_read<SPI: SpiDevice>(
        spi: &mut SPI,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), SpiNandError<SPI::Error>> {
        spi_transaction(spi, &mut [Operation::Write(write), Operation::Read(read)])
    }

    /// Wrapper around [SpiDevice::transaction] that maps errors
    pub fn spi_transaction<SPI: SpiDevice>(
        spi: &mut SPI,
        operations: &mut [Operation<'_, u8>],
    ) -> Result<(), SpiNandError<SPI::Error>> {
        spi.transaction(operations).map_err(SpiNandError::Spi)
    }
}
