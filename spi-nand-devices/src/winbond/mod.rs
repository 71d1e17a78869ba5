//! Winbond serial NAND parts
mod w25n;

pub use w25n::*;
