//! Atari 2600 (VCS) console core.
//!
//! Three cycle-coupled chips (the 6507 CPU, the TIA video/audio
//! generator, and the RIOT RAM/IO/timer) bound by one color-clock time
//! axis and a bank-switched cartridge window. The outside world plugs in
//! through three seams: a [`VideoSink`] that receives finished frames, an
//! [`AudioSink`] that receives the two voice descriptors once per frame,
//! and a [`Controller`] fed with logical input events.

#![allow(clippy::upper_case_acronyms)]

pub mod audio;
pub mod bus;
pub mod cartridge;
pub mod clock;
pub mod controller;
pub mod tia;

pub use audio::Voice;
pub use cartridge::{BankScheme, Cartridge};
pub use controller::{ConsoleInput, ControlEvent, Controller, Joystick};

use bus::Atari2600Bus;
use thiserror::Error;
use tia::Tia;
use vcs_core::cpu_6502::{Cpu6502, CpuError};
use vcs_core::types::Frame;

#[derive(Debug, Error)]
pub enum Atari2600Error {
    #[error("CPU fault: {0}")]
    Cpu(#[from] CpuError),
    #[error(transparent)]
    Present(#[from] PresentError),
}

/// Why a frame could not be handed to the host.
#[derive(Debug, Error)]
pub enum PresentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("display error: {0}")]
    Display(String),
}

/// Receives the finished canvas at every VSYNC rising edge.
///
/// The canvas is 228 color clocks wide by 220 lines; the leftmost 68
/// columns of every line are horizontal blank and are meant to be cropped
/// by the display.
pub trait VideoSink {
    fn present(&mut self, canvas: &Frame) -> Result<(), PresentError>;
}

/// Receives both square-wave voice descriptors at every VSYNC rising
/// edge, replacing the previous frame's tones.
pub trait AudioSink {
    fn play(&mut self, voices: [Voice; 2]);
}

/// The assembled console.
pub struct Atari2600 {
    cpu: Cpu6502<Atari2600Bus>,
}

impl Atari2600 {
    /// Wire up a console around a cartridge. The palette maps the TIA's
    /// 128 7-bit color indices to host colors.
    pub fn new(
        cartridge: Cartridge,
        controller: Box<dyn Controller>,
        palette: [u32; 128],
        video_sink: Box<dyn VideoSink>,
        audio_sink: Box<dyn AudioSink>,
    ) -> Self {
        let tia = Tia::new(palette, video_sink, audio_sink);
        let bus = Atari2600Bus::new(cartridge, controller, tia);
        let mut cpu = Cpu6502::new(bus);
        cpu.reset();
        Self { cpu }
    }

    /// Power-cycle: bus and chip state back to power-on, PC reloaded from
    /// the reset vector.
    pub fn reset(&mut self) {
        self.cpu.memory.reset();
        self.cpu.reset();
    }

    /// Execute a single instruction.
    pub fn step(&mut self) -> Result<(), Atari2600Error> {
        self.cpu.step()?;
        Ok(())
    }

    /// Run the CPU until the TIA delivers a frame (the VSYNC rising edge
    /// presents the canvas and flushes the audio voices synchronously,
    /// inside the CPU step that wrote the register).
    pub fn run_frame(&mut self) -> Result<(), Atari2600Error> {
        while !self.cpu.memory.clock.take_frame_done() {
            self.cpu.step()?;
        }
        if let Some(e) = self.cpu.memory.tia.take_present_error() {
            return Err(e.into());
        }
        Ok(())
    }

    /// The controller, for frontends to feed input events between frames.
    pub fn controller_mut(&mut self) -> &mut dyn Controller {
        self.cpu.memory.controller.as_mut()
    }

    /// Diagnostic snapshot for frontends.
    pub fn debug_state(&self) -> serde_json::Value {
        let cpu = &self.cpu;
        let clock = &cpu.memory.clock;
        serde_json::json!({
            "cpu": {
                "a": cpu.a,
                "x": cpu.x,
                "y": cpu.y,
                "sp": cpu.sp,
                "pc": cpu.pc,
                "cycles": cpu.cycles,
            },
            "time": clock.time,
            "scanline": clock.scanline(),
            "beam_column": clock.beam_column(),
            "bank": cpu.memory.cartridge.current_bank(),
            "v_sync": cpu.memory.tia.v_sync(),
            "v_blank": cpu.memory.tia.v_blank(),
        })
    }
}
