//! In-memory SPI NAND chip for host tests.
//!
//! [SimulatedNand] decodes the command set on the wire, so the engines can be checked
//! against both stored contents and the exact bytes they sent.

use alloc::{collections::BTreeMap, vec, vec::Vec};

use embedded_hal::{
    delay::DelayNs,
    spi::{self, ErrorKind, ErrorType, Operation, SpiDevice},
};
use embedded_nand::{BlockIndex, FlashGeometry, PageIndex};

use crate::status::Status;

/// Transport failure raised by [SimulatedNand::fail_transport_after]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SimError;

impl spi::Error for SimError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Protection register value at power on, all blocks locked
pub const POWER_ON_PROTECTION: u8 = 0x7C;

/// A simulated chip speaking the SPI NAND command set.
///
/// Pages start erased. Block protection starts set, so the device must be brought up
/// before erasing or programming succeeds.
#[derive(Debug)]
pub struct SimulatedNand {
    geometry: FlashGeometry,
    jedec: [u8; 3],
    pages: BTreeMap<u32, Vec<u8>>,
    cache: Vec<u8>,
    protection: u8,
    configuration: u8,
    write_enabled: bool,
    erase_fail: bool,
    program_fail: bool,
    busy_polls: u32,
    busy_remaining: u32,
    stuck_busy: bool,
    failing_pages: Vec<u32>,
    failing_blocks: Vec<u32>,
    fail_after: Option<usize>,
    log: Vec<Vec<u8>>,
    count: usize,
}

impl SimulatedNand {
    pub fn new(geometry: FlashGeometry) -> Self {
        SimulatedNand {
            geometry,
            jedec: [0xEF, 0xBA, 0x21],
            pages: BTreeMap::new(),
            cache: vec![0xFF; geometry.page_size() as usize],
            protection: POWER_ON_PROTECTION,
            configuration: 0x18,
            write_enabled: false,
            erase_fail: false,
            program_fail: false,
            busy_polls: 0,
            busy_remaining: 0,
            stuck_busy: false,
            failing_pages: Vec::new(),
            failing_blocks: Vec::new(),
            fail_after: None,
            log: Vec::new(),
            count: 0,
        }
    }

    /// Bytes returned by the JEDEC ID command
    pub fn set_jedec_id(&mut self, id: [u8; 3]) {
        self.jedec = id;
    }

    /// Report busy for `polls` status reads after every page read, program or erase
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Never clear the busy flag
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    /// Latch a program failure whenever `page` is programmed
    pub fn inject_program_failure(&mut self, page: PageIndex) {
        self.failing_pages.push(page.as_u32());
    }

    /// Latch an erase failure whenever `block` is erased
    pub fn inject_erase_failure(&mut self, block: BlockIndex) {
        self.failing_blocks.push(block.as_u32());
    }

    /// Let `count` more transactions through, then fail every one after
    pub fn fail_transport_after(&mut self, count: usize) {
        self.fail_after = Some(self.count + count);
    }

    /// Bytes written in each transaction so far
    pub fn transactions(&self) -> &[Vec<u8>] {
        &self.log
    }

    /// Number of logged transactions starting with `opcode`
    pub fn count_opcode(&self, opcode: u8) -> usize {
        self.log.iter().filter(|t| t.first() == Some(&opcode)).count()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Stored contents starting at byte `address`
    pub fn peek(&self, address: u32, len: usize) -> Vec<u8> {
        let page_size = self.geometry.page_size();
        (address..address + len as u32)
            .map(|a| {
                self.pages
                    .get(&(a / page_size))
                    .map_or(0xFF, |page| page[(a % page_size) as usize])
            })
            .collect()
    }

    /// Current value of a register, as a register read would see it
    pub fn register(&self, address: u8) -> u8 {
        match address {
            0xA0 => self.protection,
            0xB0 => self.configuration,
            0xC0 => self.status(),
            _ => 0,
        }
    }

    fn status(&self) -> u8 {
        let mut status = 0;
        if self.stuck_busy || self.busy_remaining > 0 {
            status |= Status::BUSY;
        }
        if self.write_enabled {
            status |= Status::WRITE_ENABLE_LATCH;
        }
        if self.erase_fail {
            status |= Status::ERASE_FAIL;
        }
        if self.program_fail {
            status |= Status::PROGRAM_FAIL;
        }
        status
    }

    fn start_busy(&mut self) {
        self.busy_remaining = self.busy_polls;
    }

    fn page_of(command: &[u8]) -> u32 {
        u16::from_be_bytes([command[2], command[3]]) as u32
    }

    fn column_of(command: &[u8]) -> usize {
        u16::from_be_bytes([command[1], command[2]]) as usize
    }

    /// Run one command, returning the bytes clocked out during the read phase
    fn execute(&mut self, command: &[u8]) -> Vec<u8> {
        let Some(&opcode) = command.first() else {
            return Vec::new();
        };
        match opcode {
            0x9F => self.jedec.to_vec(),
            0x05 if command.len() >= 2 => {
                let value = self.register(command[1]);
                if command[1] == 0xC0 && self.busy_remaining > 0 {
                    self.busy_remaining -= 1;
                }
                vec![value]
            }
            0x01 if command.len() >= 3 => {
                match command[1] {
                    0xA0 => self.protection = command[2],
                    0xB0 => self.configuration = command[2],
                    _ => {}
                }
                Vec::new()
            }
            0x06 => {
                self.write_enabled = true;
                Vec::new()
            }
            0x04 => {
                self.write_enabled = false;
                Vec::new()
            }
            0x13 if command.len() >= 4 => {
                let page = Self::page_of(command);
                self.cache = self
                    .pages
                    .get(&page)
                    .cloned()
                    .unwrap_or_else(|| vec![0xFF; self.geometry.page_size() as usize]);
                self.start_busy();
                Vec::new()
            }
            0x03 if command.len() >= 4 => {
                let column = Self::column_of(command);
                self.cache.get(column..).map(<[u8]>::to_vec).unwrap_or_default()
            }
            0x02 if command.len() >= 3 => {
                let column = Self::column_of(command);
                self.cache.fill(0xFF);
                for (byte, data) in self.cache.iter_mut().skip(column).zip(&command[3..]) {
                    *byte = *data;
                }
                Vec::new()
            }
            0x10 if command.len() >= 4 => {
                if self.write_enabled {
                    let page = Self::page_of(command);
                    self.program_fail =
                        self.protection != 0 || self.failing_pages.contains(&page);
                    if !self.program_fail {
                        let size = self.geometry.page_size() as usize;
                        let stored = self.pages.entry(page).or_insert_with(|| vec![0xFF; size]);
                        for (byte, data) in stored.iter_mut().zip(&self.cache) {
                            *byte &= *data;
                        }
                    }
                    self.write_enabled = false;
                    self.start_busy();
                }
                Vec::new()
            }
            0xD8 if command.len() >= 4 => {
                if self.write_enabled {
                    let pages_per_block = self.geometry.pages_per_block();
                    let block = Self::page_of(command) / pages_per_block;
                    self.erase_fail =
                        self.protection != 0 || self.failing_blocks.contains(&block);
                    if !self.erase_fail {
                        let first = block * pages_per_block;
                        self.pages
                            .retain(|page, _| !(first..first + pages_per_block).contains(page));
                    }
                    self.write_enabled = false;
                    self.start_busy();
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

impl ErrorType for SimulatedNand {
    type Error = SimError;
}

impl SpiDevice for SimulatedNand {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        if self.fail_after.is_some_and(|limit| self.count >= limit) {
            return Err(SimError);
        }
        self.count += 1;

        let mut command = Vec::new();
        for op in operations.iter() {
            match op {
                Operation::Write(buf) => command.extend_from_slice(buf),
                Operation::Transfer(_, write) => command.extend_from_slice(write),
                _ => {}
            }
        }
        let response = self.execute(&command);
        self.log.push(command);

        let mut response = response.into_iter().chain(core::iter::repeat(0xFF));
        for op in operations.iter_mut() {
            match op {
                Operation::Read(buf) | Operation::Transfer(buf, _) => {
                    buf.iter_mut().for_each(|b| *b = response.next().unwrap_or(0xFF));
                }
                Operation::TransferInPlace(buf) => {
                    buf.iter_mut().for_each(|b| *b = response.next().unwrap_or(0xFF));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Delay that returns immediately and records what was asked of it
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelay {
    calls: u32,
    total_ns: u64,
}

impl NoopDelay {
    pub fn new() -> Self {
        NoopDelay::default()
    }

    pub fn calls(&self) -> u32 {
        self.calls
    }

    pub fn total_ns(&self) -> u64 {
        self.total_ns
    }
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ns += ns as u64;
    }
}
