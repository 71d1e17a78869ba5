//! Typed storage requests.
//!
//! A closed set of operations for management interfaces that forward requests to a
//! [NandFlash] device, each variant carrying its own arguments.

use crate::{FlashGeometry, NandFlash};

/// A request against a [NandFlash] device
#[derive(Debug)]
pub enum Command<'a> {
    /// Report the device layout
    Geometry,
    /// Erase whole blocks
    Erase { offset: u32, length: u32 },
    /// Read into the caller's buffer
    Read { offset: u32, buf: &'a mut [u8] },
    /// Program whole pages from the caller's buffer
    Write { offset: u32, buf: &'a [u8] },
}

/// Result of a successful [Command]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    Geometry(FlashGeometry),
    Erased,
    /// Number of bytes read
    Read(usize),
    /// Number of bytes written
    Written(usize),
}

impl Command<'_> {
    /// Run the command against a device
    pub fn execute<F: NandFlash>(self, flash: &mut F) -> Result<Response, F::Error> {
        match self {
            Command::Geometry => Ok(Response::Geometry(flash.geometry())),
            Command::Erase { offset, length } => {
                debug!("Command erase {} bytes at {}", length, offset);
                flash.erase(offset, length).map(|_| Response::Erased)
            }
            Command::Read { offset, buf } => {
                debug!("Command read {} bytes at {}", buf.len(), offset);
                flash.read(offset, buf).map(Response::Read)
            }
            Command::Write { offset, buf } => {
                debug!("Command write {} bytes at {}", buf.len(), offset);
                flash.write(offset, buf).map(Response::Written)
            }
        }
    }
}
