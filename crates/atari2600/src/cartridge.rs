//! Cartridge ROM and bank switching.
//!
//! The cartridge window is 4 KB ($1000-$1FFF). Larger ROMs rotate banks
//! through it by *hotspots*: designated addresses whose mere access (read
//! or write, the data is irrelevant) selects a bank. A hotspot access
//! switches first and then reads, so the returned byte comes from the
//! newly selected bank.
//!
//! Supported schemes: 2K and 4K (no banking), F8 (8K), E0 (8K in 1 KB
//! slots), FA (12K + 256 B cart RAM), F6 (16K), F4 (32K), EF (64K). F6,
//! F4 and EF optionally carry the 128 B SuperChip RAM overlay: writes at
//! $1000-$107F, reads at $1080-$10FF.

use serde::{Deserialize, Serialize};

/// Bank-switching scheme. The serde names match the configuration tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankScheme {
    #[serde(rename = "2k")]
    Rom2K,
    #[serde(rename = "4k")]
    Rom4K,
    F8,
    E0,
    FA,
    F6,
    F4,
    EF,
}

impl BankScheme {
    /// Parse a configuration tag; `""` means "guess from the ROM size".
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "2k" => Some(BankScheme::Rom2K),
            "4k" => Some(BankScheme::Rom4K),
            "f8" => Some(BankScheme::F8),
            "e0" => Some(BankScheme::E0),
            "fa" => Some(BankScheme::FA),
            "f6" => Some(BankScheme::F6),
            "f4" => Some(BankScheme::F4),
            "ef" => Some(BankScheme::EF),
            _ => None,
        }
    }

    /// The de-facto standard scheme for a ROM size.
    pub fn guess(rom_len: usize) -> Option<Self> {
        match rom_len {
            2048 => Some(BankScheme::Rom2K),
            4096 => Some(BankScheme::Rom4K),
            8192 => Some(BankScheme::F8),
            12288 => Some(BankScheme::FA),
            16384 => Some(BankScheme::F6),
            32768 => Some(BankScheme::F4),
            65536 => Some(BankScheme::EF),
            _ => None,
        }
    }
}

/// A cartridge: ROM image, bank-switch state, and on-cart RAM.
#[derive(Debug, Clone)]
pub struct Cartridge {
    rom: Vec<u8>,
    scheme: BankScheme,
    /// Selected 4 KB bank for the single-window schemes.
    bank: usize,
    /// E0: bank selected into each 1 KB slot. Slot 3 is fixed to bank 7.
    slots: [usize; 4],
    /// FA cart RAM (256 B) or SuperChip RAM (128 B); empty otherwise.
    ram: Vec<u8>,
    super_chip: bool,
}

impl Cartridge {
    /// Build a cartridge. `scheme` comes from the configuration tag
    /// (`None` = guess from size); an unsupported size falls back to the
    /// 4K mapping at best effort.
    pub fn new(rom: Vec<u8>, scheme: Option<BankScheme>, super_chip: bool) -> Self {
        let scheme = scheme.or_else(|| BankScheme::guess(rom.len())).unwrap_or_else(|| {
            log::warn!(
                "unsupported ROM size {} bytes, defaulting to the 4K mapping",
                rom.len()
            );
            BankScheme::Rom4K
        });

        let super_chip = super_chip
            && matches!(scheme, BankScheme::F6 | BankScheme::F4 | BankScheme::EF);
        let ram = match scheme {
            // FA carts carry their RAM unconditionally
            BankScheme::FA => vec![0; 256],
            _ if super_chip => vec![0; 128],
            _ => Vec::new(),
        };

        Self {
            rom,
            scheme,
            bank: 0,
            slots: [0, 0, 0, 7],
            ram,
            super_chip,
        }
    }

    pub fn scheme(&self) -> BankScheme {
        self.scheme
    }

    pub fn super_chip(&self) -> bool {
        self.super_chip
    }

    pub fn current_bank(&self) -> usize {
        match self.scheme {
            BankScheme::E0 => self.slots[0],
            _ => self.bank,
        }
    }

    pub fn size(&self) -> usize {
        self.rom.len()
    }

    /// Back to power-on bank state; ROM and cart RAM contents stay.
    pub fn reset(&mut self) {
        self.bank = 0;
        self.slots = [0, 0, 0, 7];
        self.ram.fill(0);
    }

    fn bank_byte(&self, bank: usize, offset: usize) -> u8 {
        self.rom.get(bank * 0x1000 + offset).copied().unwrap_or(0xFF)
    }

    /// Read from the cartridge window. Hotspots fire before the data is
    /// fetched, so the byte comes from the newly selected bank.
    pub fn read(&mut self, addr: u16) -> u8 {
        let offset = (addr & 0x0FFF) as usize;
        match self.scheme {
            BankScheme::Rom2K => self.rom.get(offset & 0x7FF).copied().unwrap_or(0xFF),
            BankScheme::Rom4K => self.rom.get(offset).copied().unwrap_or(0xFF),
            BankScheme::E0 => {
                self.touch(offset);
                let slot = offset >> 10;
                self.rom
                    .get(self.slots[slot] * 0x400 + (offset & 0x3FF))
                    .copied()
                    .unwrap_or(0xFF)
            }
            BankScheme::FA => {
                // cart RAM reads back at +$100 over the write addresses
                if offset & 0xF00 == 0x100 {
                    return self.ram[offset & 0xFF];
                }
                self.touch(offset);
                self.bank_byte(self.bank, offset)
            }
            BankScheme::F8 | BankScheme::F6 | BankScheme::F4 | BankScheme::EF => {
                if self.super_chip && offset & 0xF80 == 0x080 {
                    return self.ram[offset & 0x7F];
                }
                self.touch(offset);
                self.bank_byte(self.bank, offset)
            }
        }
    }

    /// Write into the cartridge window: cart RAM and hotspots only, the
    /// ROM itself ignores data.
    pub fn write(&mut self, addr: u16, val: u8) {
        let offset = (addr & 0x0FFF) as usize;
        match self.scheme {
            BankScheme::Rom2K | BankScheme::Rom4K => {}
            BankScheme::FA => {
                if offset & 0xF00 == 0 {
                    self.ram[offset & 0xFF] = val;
                }
                self.touch(offset);
            }
            _ => {
                if self.super_chip && offset & 0xF80 == 0 {
                    self.ram[offset & 0x7F] = val;
                }
                self.touch(offset);
            }
        }
    }

    /// Apply any bank-switch hotspot at `offset` (low 12 bits).
    fn touch(&mut self, offset: usize) {
        match self.scheme {
            BankScheme::Rom2K | BankScheme::Rom4K => {}
            BankScheme::F8 => match offset {
                0xFF8 => self.bank = 0,
                0xFF9 => self.bank = 1,
                _ => {}
            },
            BankScheme::FA => match offset {
                0xFF8 => self.bank = 0,
                0xFF9 => self.bank = 1,
                0xFFA => self.bank = 2,
                _ => {}
            },
            BankScheme::F6 => {
                if (0xFF6..=0xFF9).contains(&offset) {
                    self.bank = offset - 0xFF6;
                }
            }
            BankScheme::F4 => {
                if (0xFF4..=0xFFB).contains(&offset) {
                    self.bank = offset - 0xFF4;
                }
            }
            BankScheme::EF => {
                if (0xFE0..=0xFEF).contains(&offset) {
                    self.bank = offset - 0xFE0;
                }
            }
            BankScheme::E0 => {
                // three rotating 1 KB slots; the fourth is hard-wired
                match offset & 0xFF8 {
                    0xFE0 => self.slots[0] = offset & 0x7,
                    0xFE8 => self.slots[1] = offset & 0x7,
                    0xFF0 => self.slots[2] = offset & 0x7,
                    _ => {}
                }
            }
        }
    }
}
