//! Concrete SPI NAND flash parts for the [spi_nand] driver.
#![no_std]

#[cfg(test)]
extern crate std;

pub mod winbond;
