//! The 6507's view of the world: a 13-bit address bus decoded into TIA,
//! RIOT RAM, RIOT registers, and the cartridge window.
//!
//! Decode rule, highest bit first: `addr & 0x1000` selects the cartridge;
//! otherwise `addr & 0x200` the RIOT registers; otherwise `addr & 0x80`
//! the 128 bytes of RAM; otherwise the TIA. Every mirror the hardware has
//! falls out of this rule, the stack page included: $01FF lands in RAM
//! at $7F, while a stack pointer below $80 scribbles on the TIA window
//! exactly as the address math dictates.

use vcs_core::cpu_6502::Memory6502;

use crate::cartridge::Cartridge;
use crate::clock::{Clock, CLOCKS_PER_CPU_CYCLE};
use crate::controller::Controller;
use crate::tia::Tia;

pub struct Atari2600Bus {
    pub clock: Clock,
    pub tia: Tia,
    pub cartridge: Cartridge,
    pub controller: Box<dyn Controller>,
    ram: [u8; 128],
    port_a_ddr: u8,
    port_b_ddr: u8,
}

impl Atari2600Bus {
    pub fn new(cartridge: Cartridge, controller: Box<dyn Controller>, tia: Tia) -> Self {
        Self {
            clock: Clock::new(),
            tia,
            cartridge,
            controller,
            ram: [0; 128],
            port_a_ddr: 0,
            port_b_ddr: 0,
        }
    }

    pub fn reset(&mut self) {
        self.clock.reset();
        self.tia.reset();
        self.cartridge.reset();
        self.ram = [0; 128];
        self.port_a_ddr = 0;
        self.port_b_ddr = 0;
    }
}

impl Memory6502 for Atari2600Bus {
    fn read(&mut self, addr: u16) -> u8 {
        let addr = addr & 0x1FFF;
        if addr & 0x1000 != 0 {
            self.cartridge.read(addr)
        } else if addr & 0x0200 != 0 {
            match addr & 0x7F {
                // input ports, gated by the data-direction registers
                0x00 => self.controller.port_a() & !self.port_a_ddr,
                0x01 => self.port_a_ddr,
                0x02 => self.controller.port_b() & !self.port_b_ddr,
                0x03 => self.port_b_ddr,
                0x04 | 0x06 => self.clock.read_timer(),
                0x05 | 0x07 => self.clock.read_timer_status(),
                _ => 0,
            }
        } else if addr & 0x80 != 0 {
            self.ram[(addr & 0x7F) as usize]
        } else {
            // TIA reads decode 4 address bits: collisions, then inputs
            let reg = (addr & 0x0F) as u8;
            match reg {
                0x00..=0x07 => self.tia.read_collision(reg),
                0x08..=0x0D => self.controller.tia_input((reg - 0x08) as usize),
                _ => 0,
            }
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        let addr = addr & 0x1FFF;
        if addr & 0x1000 != 0 {
            self.cartridge.write(addr, val);
        } else if addr & 0x0200 != 0 {
            match addr & 0x7F {
                0x00 | 0x02 => {
                    log::trace!("ignored write to input port data: {:#05x} = {:#04x}", addr, val)
                }
                0x01 => self.port_a_ddr = val,
                0x03 => self.port_b_ddr = val,
                0x14 => self.clock.set_timer(val, 1),
                0x15 => self.clock.set_timer(val, 8),
                0x16 => self.clock.set_timer(val, 64),
                0x17 => self.clock.set_timer(val, 1024),
                _ => {}
            }
        } else if addr & 0x80 != 0 {
            self.ram[(addr & 0x7F) as usize] = val;
        } else {
            // the TIA decodes 6 address bits of the write strobes
            self.tia.write((addr & 0x3F) as u8, val, &mut self.clock);
        }
    }

    fn on_cycles(&mut self, cpu_cycles: u32) {
        self.clock.advance(cpu_cycles as u64 * CLOCKS_PER_CPU_CYCLE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Joystick;
    use crate::tia::Tia;
    use crate::PresentError;
    use vcs_core::types::Frame;

    struct NullVideo;
    impl crate::VideoSink for NullVideo {
        fn present(&mut self, _canvas: &Frame) -> Result<(), PresentError> {
            Ok(())
        }
    }

    struct NullAudio;
    impl crate::AudioSink for NullAudio {
        fn play(&mut self, _voices: [crate::Voice; 2]) {}
    }

    fn bus_with_rom(rom: Vec<u8>) -> Atari2600Bus {
        let cartridge = Cartridge::new(rom, None, false);
        let tia = Tia::new([0; 128], Box::new(NullVideo), Box::new(NullAudio));
        Atari2600Bus::new(cartridge, Box::new(Joystick::new()), tia)
    }

    fn bus() -> Atari2600Bus {
        bus_with_rom(vec![0; 4096])
    }

    #[test]
    fn ram_reads_back_through_mirrors() {
        let mut bus = bus();
        bus.write(0x0080, 0x12);
        assert_eq!(bus.read(0x0080), 0x12);
        // the stack page mirrors into the same 128 bytes
        bus.write(0x01FF, 0x34);
        assert_eq!(bus.read(0x00FF), 0x34);
        // 13-bit decoding: the upper address bits are ignored
        assert_eq!(bus.read(0x21FF), 0x34);
    }

    #[test]
    fn cartridge_window_is_mirrored() {
        let mut rom = vec![0; 4096];
        rom[0] = 0x42;
        rom[0xFFC] = 0xCD;
        let mut bus = bus_with_rom(rom);
        assert_eq!(bus.read(0x1000), 0x42);
        assert_eq!(bus.read(0xF000), 0x42);
        assert_eq!(bus.read(0xFFFC), 0xCD);
    }

    #[test]
    fn riot_timer_registers() {
        let mut bus = bus();
        bus.write(0x0296, 10); // TIM64T
        bus.on_cycles(64);
        assert_eq!(bus.read(0x0284), 9); // INTIM
        assert_eq!(bus.read(0x0285) & 0x80, 0); // INSTAT
    }

    #[test]
    fn ddr_masks_input_port_reads() {
        let mut bus = bus();
        assert_eq!(bus.read(0x0280), 0xFF); // SWCHA, joystick idle
        bus.write(0x0281, 0xF0); // DDR-A: upper nibble output
        assert_eq!(bus.read(0x0280), 0x0F);
        assert_eq!(bus.read(0x0281), 0xF0);

        assert_eq!(bus.read(0x0282), 0x3F); // SWCHB
        bus.write(0x0283, 0x03);
        assert_eq!(bus.read(0x0282), 0x3C);
    }

    #[test]
    fn tia_reads_route_collisions_and_inputs() {
        let mut bus = bus();
        // INPT4: joystick fire idle reads high
        assert_eq!(bus.read(0x000C), 0x80);
        // collision registers start clear
        assert_eq!(bus.read(0x0000), 0x00);
        assert_eq!(bus.read(0x0007), 0x00);
    }

    #[test]
    fn tia_write_mirrors_decode_low_six_bits() {
        let mut bus = bus();
        // WSYNC through a mirror: $42 decodes to strobe $02
        bus.on_cycles(10);
        bus.write(0x0042, 0);
        assert_eq!(bus.clock.time % 228, 0);
    }

    #[test]
    fn cycles_publish_as_color_clocks() {
        let mut bus = bus();
        bus.on_cycles(5);
        assert_eq!(bus.clock.time, 15);
    }
}
