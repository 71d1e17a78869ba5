use core::fmt::Debug;

use embedded_hal::{delay::DelayNs, spi::SpiDevice};
use embedded_nand::{
    Access, ColumnAddress, ErrorType, FlashGeometry, NandFlash, PageIndex,
};

use crate::{
    cmd_blocking::SpiNandBlocking,
    error::SpiNandError,
    session::{CommandSession, SessionState, UnitKind},
    status::Status,
    wait::{Outcome, PollConfig},
    JedecID, SpiNand,
};

/// A SPI NAND flash device instance.
///
/// Owns the SPI device, the delay used between busy polls and the chip description.
/// Every call takes `&mut self`, so at most one command is in flight. Callers sharing the
/// device must serialise access themselves (one lock per instance).
///
/// [SpiNandDevice] implements the [embedded_nand::NandFlash] trait, which translates linear
/// byte requests into page reads, page programs and block erases.
///
/// The device D must implement [SpiNandBlocking], SPI must implement
/// [embedded_hal::spi::SpiDevice] and DL [embedded_hal::delay::DelayNs].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiNandDevice<SPI, DL, D> {
    pub spi: SPI,
    pub delay: DL,
    pub device: D,
    poll: PollConfig,
}
// Manually implement Debug to avoid bounds on SPI and DL
// D must implement Debug, which should be fine as its just data
impl<SPI, DL, D> Debug for SpiNandDevice<SPI, DL, D>
where
    D: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpiNandDevice")
            .field("device", &self.device)
            .field("poll", &self.poll)
            .finish()
    }
}

impl<SPI, DL, D: SpiNand> SpiNandDevice<SPI, DL, D> {
    /// Create a new [SpiNandDevice] with the given SPI peripheral, delay and flash device.
    ///
    /// Polling uses the device's default interval and budget.
    /// Call [SpiNandDevice::init] before erasing or programming.
    pub fn new(spi: SPI, delay: DL, device: D) -> Self {
        SpiNandDevice {
            spi,
            delay,
            device,
            poll: PollConfig::new(D::POLL_INTERVAL_US, D::MAX_POLLS),
        }
    }

    /// Replace the busy polling configuration
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn set_poll_config(&mut self, poll: PollConfig) {
        self.poll = poll;
    }

    pub fn poll_config(&self) -> PollConfig {
        self.poll
    }

    /// Layout of the device
    pub fn geometry(&self) -> FlashGeometry {
        D::GEOMETRY
    }

    /// Give back the SPI device and delay
    pub fn release(self) -> (SPI, DL) {
        (self.spi, self.delay)
    }
}

impl<SPI: SpiDevice, DL: DelayNs, D: SpiNandBlocking<SPI>> SpiNandDevice<SPI, DL, D> {
    /// Bring the device up: check the JEDEC ID and clear block protection.
    pub fn init(&mut self) -> Result<JedecID, SpiNandError<SPI::Error>> {
        let id = self.jedec_id()?;
        if id != JedecID::expected::<D>() {
            error!(
                "Unexpected JEDEC ID {:#x} {:#x}",
                id.manufacturer,
                id.device
            );
            return Err(SpiNandError::UnknownDevice(id));
        }
        self.init_unchecked()?;
        Ok(id)
    }

    /// Clear block protection without checking the JEDEC ID
    pub fn init_unchecked(&mut self) -> Result<(), SpiNandError<SPI::Error>> {
        self.device.disable_block_protection(&mut self.spi)?;
        let protection = self.read_register(D::PROTECTION_REGISTER)?;
        let configuration = self.read_register(D::CONFIGURATION_REGISTER)?;
        let status = self.read_register(D::STATUS_REGISTER)?;
        info!(
            "SPI NAND ready, protection {:#x} configuration {:#x} status {:#x}",
            protection,
            configuration,
            status
        );
        Ok(())
    }

    /// Get the JEDEC ID of the flash device
    pub fn jedec_id(&mut self) -> Result<JedecID, SpiNandError<SPI::Error>> {
        self.device.read_jedec_id_cmd(&mut self.spi)
    }

    pub fn read_register(&mut self, address: u8) -> Result<u8, SpiNandError<SPI::Error>> {
        self.device.read_register_cmd(&mut self.spi, address)
    }

    pub fn write_register(&mut self, address: u8, value: u8) -> Result<(), SpiNandError<SPI::Error>> {
        self.device.write_register_cmd(&mut self.spi, address, value)
    }

    /// Read the status register
    pub fn status(&mut self) -> Result<Status, SpiNandError<SPI::Error>> {
        self.device.read_status_cmd(&mut self.spi)
    }

    pub fn write_disable(&mut self) -> Result<(), SpiNandError<SPI::Error>> {
        self.device.write_disable_cmd(&mut self.spi)
    }

    /// Run one erase or program unit: write enable, `issue`, then wait for the result.
    ///
    /// On a fail latch the write enable latch is dropped before returning the error.
    fn run_unit<F>(
        &mut self,
        kind: UnitKind,
        page: PageIndex,
        issue: F,
    ) -> Result<(), SpiNandError<SPI::Error>>
    where
        F: FnOnce(&D, &mut SPI) -> Result<(), SpiNandError<SPI::Error>>,
    {
        let mut session = CommandSession::new(kind, page);
        self.device.write_enable_cmd(&mut self.spi)?;
        session.advance(SessionState::WriteEnableAsserted);
        issue(&self.device, &mut self.spi)?;
        session.advance(SessionState::CommandIssued);

        let fail_mask = match kind {
            UnitKind::Erase => Status::ERASE_FAIL,
            UnitKind::Program => Status::PROGRAM_FAIL,
        };
        session.advance(SessionState::Busy);
        let outcome =
            self.device
                .await_ready(&mut self.spi, &mut self.delay, &self.poll, fail_mask)?;
        match outcome {
            Outcome::Ready(_) => {
                session.advance(SessionState::Ready);
                Ok(())
            }
            Outcome::Failed(status) => {
                session.advance(SessionState::Failed);
                let address = D::GEOMETRY.page_address(page).as_u32();
                warn!(
                    "{:?} failed at page {}, status {:#x}",
                    kind,
                    page.as_u32(),
                    status.0
                );
                self.device.write_disable_cmd(&mut self.spi)?;
                Err(match kind {
                    UnitKind::Erase => SpiNandError::EraseFailed { address },
                    UnitKind::Program => SpiNandError::ProgramFailed { address },
                })
            }
        }
    }

    /// Erase the block containing `page`
    pub fn erase_block_at(&mut self, page: PageIndex) -> Result<(), SpiNandError<SPI::Error>> {
        self.run_unit(UnitKind::Erase, page, |device, spi| {
            device.erase_block_cmd(spi, page)
        })
    }

    /// Program one full page from `buf`, loaded at column 0
    pub fn program_page(
        &mut self,
        page: PageIndex,
        buf: &[u8],
    ) -> Result<(), SpiNandError<SPI::Error>> {
        if buf.len() != D::GEOMETRY.page_size() as usize {
            return Err(SpiNandError::NotAligned);
        }
        self.run_unit(UnitKind::Program, page, |device, spi| {
            device.program_load_cmd(spi, ColumnAddress::new(0), buf)?;
            device.program_execute_cmd(spi, page)
        })
    }

    /// Load `page` into the device cache and read `buf.len()` bytes from `column`
    pub fn read_page_slice(
        &mut self,
        page: PageIndex,
        column: ColumnAddress,
        buf: &mut [u8],
    ) -> Result<(), SpiNandError<SPI::Error>> {
        trace!(
            "Reading {} bytes from page {} column {}",
            buf.len(),
            page.as_u32(),
            column.as_u16()
        );
        self.device.page_read_cmd(&mut self.spi, page)?;
        self.device
            .await_ready(&mut self.spi, &mut self.delay, &self.poll, 0)?;
        self.device.page_read_buffer_cmd(&mut self.spi, column, buf)
    }
}

impl<SPI: SpiDevice, DL, D> ErrorType for SpiNandDevice<SPI, DL, D> {
    type Error = SpiNandError<SPI::Error>;
}

impl<SPI: SpiDevice, DL: DelayNs, D: SpiNandBlocking<SPI>> NandFlash for SpiNandDevice<SPI, DL, D> {
    fn geometry(&self) -> FlashGeometry {
        D::GEOMETRY
    }

    fn erase(&mut self, offset: u32, length: u32) -> Result<(), Self::Error> {
        debug!("Erasing {} bytes from offset {}", length, offset);
        let span = D::GEOMETRY.plan_erase(offset, length)?;
        // One block erase per block, stepping a whole block of pages each time
        for page in span.pages() {
            self.erase_block_at(page)?;
        }
        Ok(())
    }

    fn read(&mut self, offset: u32, mut bytes: &mut [u8]) -> Result<usize, Self::Error> {
        debug!("Reading {} bytes from offset {}", bytes.len(), offset);
        let plan = D::GEOMETRY.plan_access(Access::Read, offset, bytes.len())?;
        let total = bytes.len();
        // Slices come in ascending page order, so the buffer fills front to back
        for slice in plan {
            let (chunk, rest) = core::mem::take(&mut bytes).split_at_mut(slice.len);
            self.read_page_slice(slice.page, slice.column, chunk)?;
            bytes = rest;
        }
        Ok(total)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<usize, Self::Error> {
        debug!("Writing {} bytes to offset {}", bytes.len(), offset);
        let plan = D::GEOMETRY.plan_access(Access::Program, offset, bytes.len())?;
        for (slice, chunk) in plan.zip(bytes.chunks(D::GEOMETRY.page_size() as usize)) {
            self.program_page(slice.page, chunk)?;
        }
        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use embedded_nand::{BlockIndex, NandFlashError, NandFlashErrorKind};

    use super::*;
    use crate::sim::{NoopDelay, SimError, SimulatedNand, POWER_ON_PROTECTION};

    use test_log::test;

    /// Four blocks of four 2048 byte pages
    #[derive(Debug)]
    struct TestChip;

    impl SpiNand for TestChip {
        const GEOMETRY: FlashGeometry = FlashGeometry::new(512, 4, 4, 4 * 8192);
        const JEDEC_MANUFACTURER_ID: u8 = 0xEF;
        const JEDEC_DEVICE_ID: u16 = 0xBA21;
    }

    impl<SPI: SpiDevice> SpiNandBlocking<SPI> for TestChip {}

    type Flash = SpiNandDevice<SimulatedNand, NoopDelay, TestChip>;

    fn raw_flash() -> Flash {
        SpiNandDevice::new(
            SimulatedNand::new(TestChip::GEOMETRY),
            NoopDelay::new(),
            TestChip,
        )
    }

    /// Brought up, with an empty transaction log
    fn flash() -> Flash {
        let mut flash = raw_flash();
        flash.init().unwrap();
        flash.spi.clear_log();
        flash
    }

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
    }

    fn with_opcode(flash: &Flash, opcode: u8) -> Vec<Vec<u8>> {
        flash
            .spi
            .transactions()
            .iter()
            .filter(|t| t[0] == opcode)
            .cloned()
            .collect()
    }

    #[test]
    fn init_clears_block_protection() {
        let mut flash = raw_flash();
        let id = flash.init().unwrap();
        assert_eq!(id, JedecID::new(0xEF, 0xBA21));
        assert_eq!(flash.spi.register(0xA0), 0);
        let log = flash.spi.transactions();
        assert_eq!(log[0], [0x9F, 0]);
        assert_eq!(log[1], [0x01, 0xA0, 0x00]);
        assert_eq!(log[2], [0x05, 0xA0]);
    }

    #[test]
    fn init_rejects_unknown_device() {
        let mut flash = raw_flash();
        flash.spi.set_jedec_id([0xC2, 0x22, 0x12]);
        let err = flash.init().unwrap_err();
        assert!(matches!(
            err,
            SpiNandError::UnknownDevice(JedecID {
                manufacturer: 0xC2,
                device: 0x2212
            })
        ));
        assert_eq!(flash.spi.register(0xA0), POWER_ON_PROTECTION);

        flash.init_unchecked().unwrap();
        assert_eq!(flash.spi.register(0xA0), 0);
    }

    #[test]
    fn write_then_read_back() {
        let mut flash = flash();
        let data = pattern(2 * 2048, 3);
        assert_eq!(flash.write(2048, &data).unwrap(), data.len());

        let mut buf = [0; 2 * 2048];
        assert_eq!(flash.read(2048, &mut buf).unwrap(), buf.len());
        assert_eq!(&buf[..], &data[..]);
        assert_eq!(flash.spi.peek(2048, 4096), data);
    }

    #[test]
    fn program_wire_sequence() {
        let mut flash = flash();
        let data = pattern(2048, 0);
        flash.write(3 * 2048, &data).unwrap();

        let log = flash.spi.transactions();
        assert_eq!(log[0], [0x06]);
        assert_eq!(log[1][..3], [0x02, 0x00, 0x00]);
        assert_eq!(log[1][3..], data[..]);
        assert_eq!(log[2], [0x10, 0x00, 0x00, 0x03]);
        assert_eq!(log[3], [0x05, 0xC0]);
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn erase_restores_erased_state() {
        let mut flash = flash();
        flash.write(0, &pattern(4 * 2048, 1)).unwrap();
        flash.write(8192, &pattern(2048, 2)).unwrap();
        flash.spi.clear_log();

        flash.erase(0, 16384).unwrap();
        // One block erase per block, addressed by the block's first page
        assert_eq!(
            with_opcode(&flash, 0xD8),
            [[0xD8, 0, 0, 0], [0xD8, 0, 0, 4]]
        );

        let mut buf = [0; 1024];
        flash.read(8192 + 512, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xFF));
        assert!(flash.spi.peek(0, 16384).iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn erase_block_by_index() {
        let mut flash = flash();
        flash.write(3 * 8192, &pattern(2048, 9)).unwrap();
        flash.erase_block(BlockIndex::new(3)).unwrap();
        assert!(flash.spi.peek(3 * 8192, 2048).iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn invalid_arguments_touch_nothing() {
        let mut flash = flash();
        let page = pattern(2048, 0);
        let mut buf = [0; 16];

        assert!(matches!(flash.write(100, &page), Err(SpiNandError::NotAligned)));
        assert!(matches!(flash.write(0, &page[..100]), Err(SpiNandError::NotAligned)));
        assert!(matches!(flash.erase(1, 8192), Err(SpiNandError::NotAligned)));
        assert!(matches!(flash.erase(2048, 8192), Err(SpiNandError::NotAligned)));
        assert!(matches!(flash.write(0, &page[..2047]), Err(SpiNandError::NotAligned)));
        assert!(matches!(flash.erase(0, 100), Err(SpiNandError::NotAligned)));
        assert!(matches!(flash.erase(0, 5 * 8192), Err(SpiNandError::OutOfBounds)));
        assert!(matches!(
            flash.read(4 * 8192 - 8, &mut buf),
            Err(SpiNandError::OutOfBounds)
        ));

        let err = flash.write(100, &page).unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(err.kind(), NandFlashErrorKind::NotAligned);
        assert!(flash.spi.transactions().is_empty());
    }

    #[test]
    fn empty_requests_are_no_ops() {
        let mut flash = flash();
        assert_eq!(flash.read(100, &mut []).unwrap(), 0);
        assert_eq!(flash.write(0, &[]).unwrap(), 0);
        flash.erase(8192, 0).unwrap();
        assert!(flash.spi.transactions().is_empty());
    }

    #[test]
    fn read_across_page_boundary() {
        let mut flash = flash();
        flash.write(2048, &pattern(2 * 2048, 5)).unwrap();
        flash.spi.clear_log();

        let mut buf = [0; 1500];
        assert_eq!(flash.read(3000, &mut buf).unwrap(), 1500);
        assert_eq!(&buf[..], &flash.spi.peek(3000, 1500)[..]);

        assert_eq!(
            with_opcode(&flash, 0x13),
            [[0x13, 0, 0, 1], [0x13, 0, 0, 2]]
        );
        // Tail of page 1 from column 952, then the head of page 2
        assert_eq!(
            with_opcode(&flash, 0x03),
            [[0x03, 0x03, 0xB8, 0], [0x03, 0, 0, 0]]
        );
    }

    #[test]
    fn program_failure_stops_sequence() {
        let mut flash = flash();
        flash.spi.inject_program_failure(PageIndex::new(1));
        let data = pattern(3 * 2048, 4);

        let err = flash.write(0, &data).unwrap_err();
        assert!(matches!(err, SpiNandError::ProgramFailed { address: 2048 }));
        assert_eq!(err.kind(), NandFlashErrorKind::BlockFail(Some(2048)));

        assert_eq!(flash.spi.peek(0, 2048), data[..2048]);
        assert!(flash.spi.peek(2048, 4096).iter().all(|&b| b == 0xFF));
        assert_eq!(
            with_opcode(&flash, 0x10),
            [[0x10, 0, 0, 0], [0x10, 0, 0, 1]]
        );
        // Write enable dropped after the failure, nothing issued afterwards
        assert_eq!(flash.spi.transactions().last().unwrap(), &[0x04]);
        assert!(!flash.status().unwrap().write_enabled());
    }

    #[test]
    fn erase_failure_reports_block_address() {
        let mut flash = flash();
        flash.spi.inject_erase_failure(BlockIndex::new(1));

        let err = flash.erase(0, 3 * 8192).unwrap_err();
        assert!(matches!(err, SpiNandError::EraseFailed { address: 8192 }));
        assert_eq!(flash.spi.count_opcode(0xD8), 2);
        assert_eq!(flash.spi.count_opcode(0x04), 1);
    }

    #[test]
    fn erase_without_bring_up_fails() {
        let mut flash = raw_flash();
        let err = flash.erase(0, 8192).unwrap_err();
        assert!(matches!(err, SpiNandError::EraseFailed { address: 0 }));
    }

    #[test]
    fn stuck_busy_times_out() {
        let mut flash = flash().with_poll_config(PollConfig::new(50, 5));
        flash.spi.set_stuck_busy(true);

        let err = flash.erase(0, 2 * 8192).unwrap_err();
        assert!(matches!(err, SpiNandError::Timeout { polls: 5 }));
        assert!(err.is_retryable());
        assert_eq!(err.kind(), NandFlashErrorKind::Busy);

        // Only the first block was attempted and no write disable followed the timeout
        assert_eq!(flash.spi.count_opcode(0xD8), 1);
        assert_eq!(flash.spi.count_opcode(0x05), 5);
        assert_eq!(flash.spi.count_opcode(0x04), 0);
        assert_eq!(flash.delay.calls(), 4);
    }

    #[test]
    fn busy_polls_sleep_between_reads() {
        let mut flash = flash();
        flash.set_poll_config(PollConfig::new(250, 10));
        flash.spi.set_busy_polls(3);

        let mut buf = [0; 8];
        flash.read(0, &mut buf).unwrap();
        assert_eq!(flash.spi.count_opcode(0x05), 4);
        assert_eq!(flash.delay.calls(), 3);
        assert_eq!(flash.delay.total_ns(), 3 * 250_000);
    }

    #[test]
    fn transport_error_passes_through() {
        let mut flash = flash();
        flash.spi.fail_transport_after(6);

        let err = flash.write(0, &pattern(3 * 2048, 0)).unwrap_err();
        assert!(matches!(err, SpiNandError::Spi(SimError)));
        assert_eq!(err.kind(), NandFlashErrorKind::Other);
    }

    #[test]
    fn default_poll_config() {
        let flash = raw_flash();
        assert_eq!(flash.poll_config(), PollConfig::default());
        assert_eq!(flash.geometry().page_size(), 2048);
        let (spi, _delay) = flash.release();
        assert!(spi.transactions().is_empty());
    }
}
