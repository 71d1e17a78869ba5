use embedded_nand::FlashGeometry;
use spi_nand::SpiNand;

/// Concrete type that implements all the flash device features
/// for the W25N series of NAND flash devices.
///
/// `B` is the block count and `ID` the two JEDEC device bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct W25N<const B: u32, const ID: u16>();

/// Specific flash device with block count and ID
pub type W25N512G = W25N<512, 0xAA20>;
pub type W25N01GV = W25N<1024, 0xAA21>;
/// 1.8V 1Gbit part, the reference device
pub type W25N01GW = W25N<1024, 0xBA21>;
pub type W25N01KV = W25N<1024, 0xAE21>;

impl<const B: u32, const ID: u16> W25N<B, ID> {
    /// Creates a new instance of the W25N flash device.
    pub fn new() -> Self {
        Self()
    }
}

impl<const B: u32, const ID: u16> Default for W25N<B, ID> {
    fn default() -> Self {
        Self::new()
    }
}

// All W25N devices have four 512 byte columns per page and 64 pages per block
impl<const B: u32, const ID: u16> SpiNand for W25N<B, ID> {
    const GEOMETRY: FlashGeometry = FlashGeometry::new(512, 4, 64, B * 64 * 2048);
    const JEDEC_MANUFACTURER_ID: u8 = 0xEF;
    const JEDEC_DEVICE_ID: u16 = ID;
}

// Implement blocking trait
mod blocking {
    use super::W25N;
    use embedded_hal::spi::SpiDevice;
    use spi_nand::cmd_blocking::SpiNandBlocking;

    impl<SPI: SpiDevice, const B: u32, const ID: u16> SpiNandBlocking<SPI> for W25N<B, ID> {}
}

#[cfg(test)]
mod tests {
    use std::vec;

    use embedded_nand::NandFlash;
    use spi_nand::{
        sim::{NoopDelay, SimulatedNand},
        JedecID, SpiNandDevice,
    };

    use super::*;

    use test_log::test;

    #[test]
    fn reference_geometry() {
        let geometry = W25N01GW::GEOMETRY;
        assert_eq!(geometry.page_size(), 2048);
        assert_eq!(geometry.block_size(), 131_072);
        assert_eq!(geometry.total_size(), 128 * 1024 * 1024);
        assert_eq!(geometry.page_count(), 65_536);
        assert_eq!(geometry.block_count(), 1024);
        assert_eq!(W25N512G::GEOMETRY.block_count(), 512);
    }

    #[test]
    fn expected_ids() {
        assert_eq!(JedecID::expected::<W25N01GW>(), JedecID::new(0xEF, 0xBA21));
        assert_eq!(JedecID::expected::<W25N01KV>(), JedecID::new(0xEF, 0xAE21));
    }

    #[test]
    fn bring_up_and_use() {
        let mut flash = SpiNandDevice::new(
            SimulatedNand::new(W25N01GW::GEOMETRY),
            NoopDelay::new(),
            W25N01GW::new(),
        );
        assert_eq!(flash.init().unwrap(), JedecID::new(0xEF, 0xBA21));

        // Last block of the device
        let offset = W25N01GW::GEOMETRY.total_size() - 131_072;
        let data = vec![0x5A; 4096];
        flash.write(offset, &data).unwrap();

        let mut buf = vec![0; 4096];
        flash.read(offset, &mut buf).unwrap();
        assert_eq!(buf, data);

        flash.erase(offset, 131_072).unwrap();
        flash.read(offset, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn wrong_part_rejected() {
        let mut flash = SpiNandDevice::new(
            SimulatedNand::new(W25N01KV::GEOMETRY),
            NoopDelay::new(),
            W25N01KV::new(),
        );
        assert!(flash.init().is_err());
    }
}
