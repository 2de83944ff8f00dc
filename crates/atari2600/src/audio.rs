//! TIA audio voice descriptors.
//!
//! The core does not sample waveforms cycle by cycle. Each voice is a lazy
//! `(control, frequency, volume)` descriptor handed to the audio sink once
//! per frame at VSYNC; the sink renders a one-frame tone from it.

use serde::{Deserialize, Serialize};

/// The TIA audio clock in Hz.
pub const BASE_FREQUENCY: u32 = 31_400;

/// One TIA audio voice as last programmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// AUDC: 4-bit waveform/divider selector.
    pub control: u8,
    /// AUDF: 5-bit frequency divider.
    pub frequency: u8,
    /// AUDV: 4-bit volume.
    pub volume: u8,
}

impl Voice {
    /// Tone frequency in Hz for a square-wave rendition of this voice, or
    /// `None` when the control code selects silence. Polynomial-noise
    /// controls are approximated by the undivided tone at their rate.
    pub fn tone_frequency(&self) -> Option<u32> {
        let base = BASE_FREQUENCY / (self.frequency as u32 + 1);
        match self.control & 0x0F {
            0 | 11 => None,
            1 => Some(base),      // 4-bit poly
            2 => Some(base / 15), // 4-bit poly / 15
            3 => Some(base),      // 5-bit poly into 4-bit poly
            4 | 5 => {
                // pure tone / 2; a zero divider latches the output flat
                if self.frequency == 0 {
                    None
                } else {
                    Some(base / 2)
                }
            }
            6 | 10 => Some(base / 31),
            7 | 9 => Some(base / 2), // 5-bit poly / 2
            8 => Some(base),         // 9-bit poly
            12 | 13 => Some(base / 6),
            14 => Some(base / 93),
            _ => Some(base / 6), // 15: 5-bit poly / 6
        }
    }

    /// True when the sink has nothing to render for this voice.
    pub fn is_silent(&self) -> bool {
        self.volume == 0 || self.tone_frequency().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(control: u8, frequency: u8) -> Voice {
        Voice {
            control,
            frequency,
            volume: 8,
        }
    }

    #[test]
    fn silent_controls() {
        assert_eq!(voice(0, 4).tone_frequency(), None);
        assert_eq!(voice(11, 4).tone_frequency(), None);
    }

    #[test]
    fn pure_tone_dividers() {
        assert_eq!(voice(4, 1).tone_frequency(), Some(BASE_FREQUENCY / 2 / 2));
        assert_eq!(voice(12, 0).tone_frequency(), Some(BASE_FREQUENCY / 6));
        assert_eq!(voice(6, 0).tone_frequency(), Some(BASE_FREQUENCY / 31));
        assert_eq!(voice(14, 0).tone_frequency(), Some(BASE_FREQUENCY / 93));
    }

    #[test]
    fn divide_by_two_is_silent_at_zero_divider() {
        assert_eq!(voice(4, 0).tone_frequency(), None);
        assert_eq!(voice(5, 0).tone_frequency(), None);
    }

    #[test]
    fn poly_controls_approximate_to_tones() {
        assert_eq!(voice(1, 0).tone_frequency(), Some(BASE_FREQUENCY));
        assert_eq!(voice(2, 0).tone_frequency(), Some(BASE_FREQUENCY / 15));
        assert_eq!(voice(8, 3).tone_frequency(), Some(BASE_FREQUENCY / 4));
        assert_eq!(voice(15, 0).tone_frequency(), Some(BASE_FREQUENCY / 6));
    }

    #[test]
    fn zero_volume_is_silent() {
        let v = Voice {
            control: 4,
            frequency: 10,
            volume: 0,
        };
        assert!(v.is_silent());
    }
}
