//! Interactive entry point: pick a ROM, run the console at 60 Hz.
//!
//! No flags. ROM selection and key-binds come from `settings.json` next
//! to the executable; diagnostics are controlled with `RUST_LOG`.

mod palette;
mod settings;
mod sinks;

use std::fs;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use vcs_atari2600::{Atari2600, BankScheme, Cartridge, Joystick};

use settings::Settings;
use sinks::{HeadlessVideo, LoggingAudio};

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut settings = Settings::load_or_create(Settings::default_path())?;

    for (input, key) in settings.key_bindings() {
        log::debug!("{} bound to {}", input.config_name(), key);
    }

    let entry = settings.choose_rom()?;
    let rom = fs::read(&entry.file).with_context(|| format!("loading ROM {}", entry.file))?;

    let scheme = match entry.bank_switching.as_str() {
        "" => None,
        tag => match BankScheme::from_tag(tag) {
            Some(scheme) => Some(scheme),
            None => {
                log::warn!(
                    "unknown bank-switching method {:?} in settings, guessing from size",
                    tag
                );
                None
            }
        },
    };
    let cartridge = Cartridge::new(rom, scheme, entry.super_chip_enabled());
    log::info!(
        "bank switching method: {:?}{}",
        cartridge.scheme(),
        if cartridge.super_chip() {
            " -- superchip enabled"
        } else {
            ""
        }
    );

    let mut system = Atari2600::new(
        cartridge,
        Box::new(Joystick::new()),
        palette::ntsc_palette(),
        Box::new(HeadlessVideo::new()),
        Box::new(LoggingAudio::new()),
    );

    // The frame loop: emulate a frame, drain host input, sleep off the
    // remainder of the 60 Hz budget. The keyboard event source is a host
    // collaborator; headless, there is nothing to drain and the console
    // runs on its own until interrupted.
    let frame_budget = Duration::from_secs_f64(1.0 / 60.0);
    let mut window_start = Instant::now();
    let mut frames_in_window = 0u32;
    loop {
        let frame_start = Instant::now();
        system.run_frame().context("emulation halted")?;

        frames_in_window += 1;
        if frames_in_window == 60 {
            let fps = 60.0 / window_start.elapsed().as_secs_f64();
            log::info!("{:.1} fps", fps);
            log::trace!("{}", system.debug_state());
            window_start = Instant::now();
            frames_in_window = 0;
        }

        if let Some(remaining) = frame_budget.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }
}
