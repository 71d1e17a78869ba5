//! Bounded busy-wait on the status register.

use embedded_hal::delay::DelayNs;

use crate::{error::SpiNandError, status::Status};

/// How long to wait for the busy flag to clear.
///
/// The worst case wait is roughly `interval_us * (max_polls - 1)` plus the bus time of
/// `max_polls` status reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PollConfig {
    /// Sleep between two status reads, in microseconds
    pub interval_us: u32,
    /// Status reads before giving up. Zero is treated as one.
    pub max_polls: u32,
}

impl PollConfig {
    pub const DEFAULT_INTERVAL_US: u32 = 10_000;
    pub const DEFAULT_MAX_POLLS: u32 = 500;

    pub const fn new(interval_us: u32, max_polls: u32) -> Self {
        PollConfig {
            interval_us,
            max_polls,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig::new(Self::DEFAULT_INTERVAL_US, Self::DEFAULT_MAX_POLLS)
    }
}

/// Terminal state of a command once the device is no longer busy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// None of the requested fail latches were set
    Ready(Status),
    /// At least one requested fail latch was set
    Failed(Status),
}

/// Poll `read_status` until the busy bit clears, sleeping between reads.
///
/// Once ready, the same status byte is checked against `fail_mask`. Gives up with
/// [SpiNandError::Timeout] after `config.max_polls` reads.
pub fn await_ready<SE, DL, F>(
    delay: &mut DL,
    config: &PollConfig,
    fail_mask: u8,
    mut read_status: F,
) -> Result<Outcome, SpiNandError<SE>>
where
    DL: DelayNs,
    F: FnMut() -> Result<Status, SpiNandError<SE>>,
{
    let max_polls = config.max_polls.max(1);
    for poll in 1..=max_polls {
        let status = read_status()?;
        if !status.is_busy() {
            trace!("Ready after {} polls, status {:#x}", poll, status.0);
            return Ok(if status.failed(fail_mask) {
                Outcome::Failed(status)
            } else {
                Outcome::Ready(status)
            });
        }
        if poll < max_polls {
            delay.delay_us(config.interval_us);
        }
    }
    warn!("Device still busy after {} polls", max_polls);
    Err(SpiNandError::Timeout { polls: max_polls })
}
