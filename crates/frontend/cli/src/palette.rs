//! Generated NTSC color palette.
//!
//! The TIA's color registers hold a 7-bit index: 16 hues by 8 luminance
//! steps. A proper palette comes from measuring composite output; this
//! approximation blends a per-hue tint with the luminance ramp and is
//! close enough to tell objects apart on any display.

/// Unit tints for the 16 NTSC hues, as (r, g, b) in 0..=255.
const HUE_TINTS: [(u32, u32, u32); 16] = [
    (255, 255, 255), // 0: grey
    (255, 224, 112), // 1: gold
    (255, 192, 96),  // 2: orange
    (255, 160, 112), // 3: red-orange
    (255, 128, 144), // 4: pink
    (255, 112, 224), // 5: purple
    (208, 112, 255), // 6: violet
    (144, 128, 255), // 7: blue-purple
    (112, 144, 255), // 8: blue
    (96, 176, 255),  // 9: light blue
    (96, 224, 255),  // 10: cyan
    (96, 255, 208),  // 11: teal
    (112, 255, 144), // 12: green
    (160, 255, 112), // 13: yellow-green
    (208, 240, 96),  // 14: olive
    (240, 224, 96),  // 15: brown-yellow
];

/// Build the 128-entry palette: index = COLUxx >> 1, hue in the high
/// three bits' neighborhood (bits 3-6), luminance in bits 0-2.
pub fn ntsc_palette() -> [u32; 128] {
    let mut palette = [0u32; 128];
    for (i, color) in palette.iter_mut().enumerate() {
        let hue = i >> 3;
        let luma = (i & 0x7) as u32;
        let (tr, tg, tb) = HUE_TINTS[hue];
        // luminance ramp from dark to near-white
        let scale = 30 + luma * 28;
        let r = (tr * scale / 255).min(255);
        let g = (tg * scale / 255).min(255);
        let b = (tb * scale / 255).min(255);
        *color = r << 16 | g << 8 | b;
    }
    palette
}
