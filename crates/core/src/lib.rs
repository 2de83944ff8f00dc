//! Reusable emulation primitives: the 6502 CPU core and shared types.

pub mod cpu_6502;

pub mod types {
    use serde::{Deserialize, Serialize};

    /// A rectangular pixel buffer in 0x00RRGGBB, row-major.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }

        /// Zero every pixel without reallocating.
        pub fn clear(&mut self) {
            self.pixels.fill(0);
        }
    }

    pub type AudioSample = i16;
}
