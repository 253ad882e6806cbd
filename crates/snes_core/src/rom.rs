//! Cartridge image loading: copier-header stripping, LoROM/HiROM header
//! detection, and the address-mapping function the bus fabric uses to turn
//! a 24-bit SNES address into a ROM file offset.
//!
//! Grounded on `Cartridge::Validate`/`FindHeader` in `original_source`: both
//! candidate header offsets are probed by validating the title is printable
//! ASCII, the mode byte names a known map, and the checksum/complement pair
//! XORs to 0xFFFF; whichever offset passes wins.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::CoreError;

const LOROM_HEADER_OFFSET: usize = 0x7FC0;
const HIROM_HEADER_OFFSET: usize = 0xFFC0;
const MODE_OFFSET: usize = 0x15;
const CHECKSUM_OFFSET: usize = 0x1C;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Map {
    LoRom,
    HiRom,
}

#[derive(Debug, Clone)]
pub struct CartridgeHeader {
    pub title: String,
    pub map: Map,
    pub fast_speed: bool,
    pub checksum: u16,
    pub checksum_complement: u16,
}

fn header_looks_valid(data: &[u8], offset: usize) -> Option<CartridgeHeader> {
    if data.len() < offset + 0x20 {
        return None;
    }
    let title_bytes = &data[offset..offset + 20];
    if !title_bytes.iter().all(|&b| (0x20..=0x7E).contains(&b)) {
        return None;
    }

    let mode = data[offset + MODE_OFFSET];
    let map = match mode & 0x0F {
        0x00 => Map::LoRom,
        0x01 => Map::HiRom,
        _ => return None,
    };

    let checksum_complement = LittleEndian::read_u16(&data[offset + CHECKSUM_OFFSET..]);
    let checksum = LittleEndian::read_u16(&data[offset + CHECKSUM_OFFSET + 2..]);
    if checksum ^ checksum_complement != 0xFFFF {
        return None;
    }

    let title = String::from_utf8_lossy(title_bytes).trim_end().to_string();
    Some(CartridgeHeader {
        title,
        map,
        fast_speed: mode & 0x10 != 0,
        checksum,
        checksum_complement,
    })
}

/// Strips a copier header (a multiple-of-512-byte prefix some dumping tools
/// add) and locates a valid LoROM or HiROM header in what's left.
pub fn detect_header(data: &mut Vec<u8>) -> Result<CartridgeHeader, CoreError> {
    let copier_len = data.len() % 1024;
    if copier_len != 0 {
        data.drain(0..copier_len);
    }

    if data.len() < 0xFFFF {
        return Err(CoreError::InvalidRom {
            reason: "file is too small to contain a header".into(),
        });
    }

    if let Some(header) = header_looks_valid(data, LOROM_HEADER_OFFSET) {
        return Ok(header);
    }
    if let Some(header) = header_looks_valid(data, HIROM_HEADER_OFFSET) {
        return Ok(header);
    }

    Err(CoreError::InvalidRom {
        reason: "unable to locate a valid LoROM or HiROM header".into(),
    })
}

pub struct Cartridge {
    pub rom: Vec<u8>,
    pub sram: Vec<u8>,
    pub header: CartridgeHeader,
}

impl Cartridge {
    pub fn load(mut data: Vec<u8>) -> Result<Self, CoreError> {
        let header = detect_header(&mut data)?;
        let sram = vec![0u8; 0x2000];
        Ok(Cartridge { rom: data, header, sram })
    }

    /// Maps a 24-bit SNES address to a ROM byte offset, or `None` if the
    /// address isn't backed by ROM under this cartridge's map (e.g. the
    /// LoROM banks' low $0000-$7FFF half, which the bus routes to WRAM/IO).
    pub fn map_rom_offset(&self, addr: u32) -> Option<usize> {
        let bank = (addr >> 16) as u8;
        let offset = (addr & 0xFFFF) as u16;
        match self.header.map {
            Map::LoRom => {
                if offset < 0x8000 {
                    return None;
                }
                let bank_index = (bank & 0x7F) as usize;
                let rom_offset = bank_index * 0x8000 + (offset as usize - 0x8000);
                Some(rom_offset % self.rom.len().max(1))
            }
            Map::HiRom => {
                let bank_index = (bank & 0x3F) as usize;
                let rom_offset = bank_index * 0x10000 + offset as usize;
                Some(rom_offset % self.rom.len().max(1))
            }
        }
    }

    pub fn read_rom(&self, addr: u32) -> u8 {
        self.map_rom_offset(addr).map(|o| self.rom[o]).unwrap_or(0)
    }

    pub fn read_sram(&self, addr: u32) -> u8 {
        if self.sram.is_empty() {
            return 0;
        }
        self.sram[addr as usize % self.sram.len()]
    }

    pub fn write_sram(&mut self, addr: u32, value: u8) {
        if self.sram.is_empty() {
            return;
        }
        let len = self.sram.len();
        self.sram[addr as usize % len] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lorom_image(size: usize) -> Vec<u8> {
        let mut data = vec![0u8; size];
        let title = b"TEST CARTRIDGE      ";
        data[LOROM_HEADER_OFFSET..LOROM_HEADER_OFFSET + title.len()].copy_from_slice(title);
        data[LOROM_HEADER_OFFSET + MODE_OFFSET] = 0x00;
        let complement: u16 = 0x1234;
        let checksum = complement ^ 0xFFFF;
        data[LOROM_HEADER_OFFSET + CHECKSUM_OFFSET..LOROM_HEADER_OFFSET + CHECKSUM_OFFSET + 2]
            .copy_from_slice(&complement.to_le_bytes());
        data[LOROM_HEADER_OFFSET + CHECKSUM_OFFSET + 2..LOROM_HEADER_OFFSET + CHECKSUM_OFFSET + 4]
            .copy_from_slice(&checksum.to_le_bytes());
        data
    }

    #[test]
    fn detects_lorom_header_and_strips_copier_header() {
        let mut image = vec![0xFFu8; 512];
        image.extend(lorom_image(0x20000));
        let header = detect_header(&mut image).unwrap();
        assert_eq!(header.map, Map::LoRom);
        assert_eq!(header.title, "TEST CARTRIDGE");
    }

    #[test]
    fn lorom_maps_bank_0_high_half_to_the_start_of_the_rom_image() {
        let cart = Cartridge::load(lorom_image(0x20000)).unwrap();
        assert_eq!(cart.map_rom_offset(0x008000), Some(0));
        assert_eq!(cart.map_rom_offset(0x000000), None);
    }

    #[test]
    fn rejects_too_small_images() {
        let mut data = vec![0u8; 0x10];
        assert!(detect_header(&mut data).is_err());
    }
}
