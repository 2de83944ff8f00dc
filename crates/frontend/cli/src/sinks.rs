//! Headless stand-ins for the display and mixer collaborators.
//!
//! The core hands every finished frame and voice pair to these sinks; a
//! windowed frontend would blit and synthesize instead. The display
//! geometry the core was built for is recorded here for that frontend:
//! crop the 68-column horizontal blank, then scale the 160x220 visible
//! region 5:3.

use vcs_atari2600::{AudioSink, PresentError, VideoSink, Voice};
use vcs_core::types::Frame;

/// Horizontal scale factor of the 5:3 aspect correction.
pub const WIDTH_RATIO: u32 = 5;
/// Vertical scale factor.
pub const HEIGHT_RATIO: u32 = 3;
/// Window size for a real display: 160x220 visible pixels, scaled.
pub const WINDOW_WIDTH: u32 = 160 * WIDTH_RATIO;
pub const WINDOW_HEIGHT: u32 = 220 * HEIGHT_RATIO;

/// Mixer contract for a real audio sink: render each voice as 16-bit
/// signed mono samples at the TIA audio clock
/// ([`vcs_atari2600::audio::BASE_FREQUENCY`]), mixed at this fixed gain.
pub const MIXER_GAIN: f32 = 0.2;

/// Counts frames and keeps the most recent one around.
pub struct HeadlessVideo {
    frames: u64,
    last: Option<Frame>,
}

impl HeadlessVideo {
    pub fn new() -> Self {
        Self {
            frames: 0,
            last: None,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last.as_ref()
    }
}

impl Default for HeadlessVideo {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSink for HeadlessVideo {
    fn present(&mut self, canvas: &Frame) -> Result<(), PresentError> {
        self.frames += 1;
        self.last = Some(canvas.clone());
        Ok(())
    }
}

/// Logs voice changes with their square-wave frequencies instead of
/// playing them.
pub struct LoggingAudio {
    last: [Voice; 2],
}

impl LoggingAudio {
    pub fn new() -> Self {
        Self {
            last: [Voice::default(); 2],
        }
    }
}

impl Default for LoggingAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for LoggingAudio {
    fn play(&mut self, voices: [Voice; 2]) {
        for (i, voice) in voices.iter().enumerate() {
            if *voice != self.last[i] {
                if voice.is_silent() {
                    log::debug!("voice {}: silent", i);
                } else if let Some(hz) = voice.tone_frequency() {
                    log::debug!("voice {}: {} Hz, volume {}", i, hz, voice.volume);
                }
            }
        }
        self.last = voices;
    }
}
