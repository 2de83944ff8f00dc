//! TIA: beam-racing video generator, collision latches, and audio voices.
//!
//! The TIA has no framebuffer of its own. It keeps a *line template*, the
//! 228-clock scanline the register file currently describes, and lazily
//! commits it into the frame canvas whenever a register write is about to
//! change what the beam would paint. The commit covers every color clock
//! from the last checkpoint up to the write's effect time (`time + delay`,
//! where `delay` models the register's write-to-effect latency). After the
//! write the compositor rebuilds the template, so later commits pick up
//! the change from the current beam position onward.

use crate::audio::Voice;
use crate::clock::{Clock, CLOCKS_PER_LINE};
use crate::{AudioSink, PresentError, VideoSink};
use vcs_core::types::Frame;

/// Visible columns per scanline, after horizontal blank.
pub const VISIBLE_WIDTH: usize = 160;
/// Horizontal blank width in color clocks.
pub const HBLANK: usize = 68;
/// Full scanline width in color clocks.
pub const LINE_WIDTH: usize = CLOCKS_PER_LINE as usize;
/// Scanlines kept in the canvas; the visible frame the sink receives.
pub const CANVAS_HEIGHT: usize = 220;

const CANVAS_PIXELS: i64 = (LINE_WIDTH * CANVAS_HEIGHT) as i64;

/// Scan coverage of one object over the 160 visible columns, one bit per
/// pixel. Collision latching is "intersection non-empty" over these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bits160([u64; 3]);

impl Bits160 {
    #[inline]
    fn set(&mut self, x: usize) {
        self.0[x >> 6] |= 1 << (x & 63);
    }

    #[inline]
    fn get(&self, x: usize) -> bool {
        self.0[x >> 6] & 1 << (x & 63) != 0
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.0.iter().zip(other.0.iter()).any(|(a, b)| a & b != 0)
    }

    /// Coverage of a sprite of `width` pixels at `start`. Sprites hanging
    /// off either edge of the line are not drawn and cover nothing.
    fn span(start: i32, width: i32) -> Self {
        let mut bits = Self::default();
        let start = start.max(0);
        if start + width <= VISIBLE_WIDTH as i32 {
            for x in start..start + width {
                bits.set(x as usize);
            }
        }
        bits
    }
}

/// TIA chip state.
pub struct Tia {
    // frame assembly
    canvas: Frame,
    line: [u32; LINE_WIDTH],
    /// Canvas index the beam has reached, in color clocks. Advances past
    /// the canvas during blanking; re-anchored by VBLANK toggles.
    current_pixel: i64,
    v_sync: bool,
    v_blank: bool,

    // resolved colors (palette entries, looked up at write time)
    palette: [u32; 128],
    color_p0: u32,
    color_p1: u32,
    color_pf: u32,
    color_bk: u32,

    // playfield: PF0 (high nibble), PF1 (msb first), PF2 (lsb first)
    pf: [u8; 3],
    pf_reflected: bool,
    pf_score: bool,
    pf_priority: bool,
    decoded_pf: Bits160,

    // players
    p0_graphics: u8,
    p1_graphics: u8,
    p0_reflected: bool,
    p1_reflected: bool,
    p0_size: u8,
    p1_size: u8,
    p0_draw_time: i32,
    p1_draw_time: i32,
    decoded_p0: Bits160,
    decoded_p1: Bits160,

    // missiles and ball
    m0_enabled: bool,
    m1_enabled: bool,
    bl_enabled: bool,
    m0_width: i32,
    m1_width: i32,
    bl_width: i32,
    m0_draw_time: i32,
    m1_draw_time: i32,
    bl_draw_time: i32,
    /// RESMP latches: while set the missile is hidden and pinned to its
    /// player; clearing the latch parks it on the player core.
    res_m_p0: bool,
    res_m_p1: bool,

    // pending horizontal motion, sign-extended to -8..=7
    p0_hm: i32,
    p1_hm: i32,
    m0_hm: i32,
    m1_hm: i32,
    bl_hm: i32,

    /// CXM0P, CXM1P, CXP0FB, CXP1FB, CXM0FB, CXM1FB, CXBLPF, CXPPMM.
    collisions: [u8; 8],

    // audio voices, flushed at VSYNC
    voice0: Voice,
    voice1: Voice,

    video_sink: Box<dyn VideoSink>,
    audio_sink: Box<dyn AudioSink>,
    present_error: Option<PresentError>,
}

impl Tia {
    pub fn new(
        palette: [u32; 128],
        video_sink: Box<dyn VideoSink>,
        audio_sink: Box<dyn AudioSink>,
    ) -> Self {
        let color = palette[0];
        Self {
            canvas: Frame::new(LINE_WIDTH as u32, CANVAS_HEIGHT as u32),
            line: [0; LINE_WIDTH],
            current_pixel: 0,
            v_sync: false,
            v_blank: false,
            palette,
            color_p0: color,
            color_p1: color,
            color_pf: color,
            color_bk: color,
            pf: [0; 3],
            pf_reflected: false,
            pf_score: false,
            pf_priority: false,
            decoded_pf: Bits160::default(),
            p0_graphics: 0,
            p1_graphics: 0,
            p0_reflected: false,
            p1_reflected: false,
            p0_size: 0,
            p1_size: 0,
            p0_draw_time: 0,
            p1_draw_time: 0,
            decoded_p0: Bits160::default(),
            decoded_p1: Bits160::default(),
            m0_enabled: false,
            m1_enabled: false,
            bl_enabled: false,
            m0_width: 1,
            m1_width: 1,
            bl_width: 1,
            m0_draw_time: 0,
            m1_draw_time: 0,
            bl_draw_time: 0,
            res_m_p0: false,
            res_m_p1: false,
            p0_hm: 0,
            p1_hm: 0,
            m0_hm: 0,
            m1_hm: 0,
            bl_hm: 0,
            collisions: [0; 8],
            voice0: Voice::default(),
            voice1: Voice::default(),
            video_sink,
            audio_sink,
            present_error: None,
        }
    }

    /// Back to power-on register state; sinks and palette stay.
    pub fn reset(&mut self) {
        let palette = self.palette;
        let video_sink = std::mem::replace(&mut self.video_sink, Box::new(NullVideo));
        let audio_sink = std::mem::replace(&mut self.audio_sink, Box::new(NullAudio));
        *self = Tia::new(palette, video_sink, audio_sink);
    }

    pub fn v_sync(&self) -> bool {
        self.v_sync
    }

    pub fn v_blank(&self) -> bool {
        self.v_blank
    }

    /// Surface a failed frame presentation to the orchestrator.
    pub fn take_present_error(&mut self) -> Option<PresentError> {
        self.present_error.take()
    }

    /// Read a collision register (low 3 bits of the address).
    pub fn read_collision(&self, reg: u8) -> u8 {
        self.collisions[(reg & 0x7) as usize]
    }

    /// Dispatch a register write. `reg` is the low 6 bits of the address;
    /// the chip does not decode more, so mirrors fall out naturally and
    /// unknown offsets are silently ignored.
    pub fn write(&mut self, reg: u8, val: u8, clock: &mut Clock) {
        match reg {
            0x00 => {
                // VSYNC: the rising edge of bit 1 ends the frame
                if (val & 0x02 != 0) != self.v_sync {
                    if val & 0x02 != 0 {
                        self.update(0, clock);
                        self.deliver_frame(clock);
                    }
                    self.v_sync = val & 0x02 != 0;
                }
            }
            0x01 => {
                // VBLANK: a toggle of bit 1 re-anchors the canvas to the
                // current beam position
                if (val & 0x02 != 0) != self.v_blank {
                    self.update(1, clock);
                    self.current_pixel = (clock.time % CLOCKS_PER_LINE) as i64 + 1;
                    self.v_blank = val & 0x02 != 0;
                }
            }
            0x02 => clock.wsync(),
            0x03 => {} // RSYNC is a test pin; accepted and ignored
            0x04 => {
                self.update(0, clock);
                self.p0_size = val & 0x07;
                self.m0_width = 1 << ((val >> 4) & 0x03);
                self.decode_p0();
                self.draw_line();
            }
            0x05 => {
                self.update(0, clock);
                self.p1_size = val & 0x07;
                self.m1_width = 1 << ((val >> 4) & 0x03);
                self.decode_p1();
                self.draw_line();
            }
            0x06 => {
                self.update(0, clock);
                self.color_p0 = self.palette[(val >> 1) as usize];
                self.draw_line();
            }
            0x07 => {
                self.update(0, clock);
                self.color_p1 = self.palette[(val >> 1) as usize];
                self.draw_line();
            }
            0x08 => {
                self.update(0, clock);
                self.color_pf = self.palette[(val >> 1) as usize];
                self.draw_line();
            }
            0x09 => {
                self.update(0, clock);
                self.color_bk = self.palette[(val >> 1) as usize];
                self.draw_line();
            }
            0x0A => {
                // CTRLPF: reflect, score, priority, ball width
                self.update(0, clock);
                self.pf_priority = val & 0x04 != 0;
                self.pf_score = val & 0x02 != 0;
                self.bl_width = 1 << ((val >> 4) & 0x03);
                if self.pf_reflected != (val & 0x01 != 0) {
                    self.pf_reflected = val & 0x01 != 0;
                    self.decode_playfield();
                } else {
                    self.draw_line();
                }
            }
            0x0B => {
                self.update(1, clock);
                self.p0_reflected = val & 0x08 != 0;
                self.decode_p0();
                self.draw_line();
            }
            0x0C => {
                self.update(1, clock);
                self.p1_reflected = val & 0x08 != 0;
                self.decode_p1();
                self.draw_line();
            }
            0x0D..=0x0F => {
                let idx = (reg - 0x0D) as usize;
                if self.pf[idx] != val {
                    self.update(2, clock);
                    self.pf[idx] = val;
                    self.decode_playfield();
                }
            }
            0x10 => {
                self.update(0, clock);
                self.p0_draw_time = clock.beam_column() as i32 - 63;
                self.decode_p0();
                self.draw_line();
            }
            0x11 => {
                self.update(0, clock);
                self.p1_draw_time = clock.beam_column() as i32 - 63;
                self.decode_p1();
                self.draw_line();
            }
            0x12 => {
                self.update(0, clock);
                self.m0_draw_time = clock.beam_column() as i32 - 64;
                self.draw_line();
            }
            0x13 => {
                self.update(0, clock);
                self.m1_draw_time = clock.beam_column() as i32 - 64;
                self.draw_line();
            }
            0x14 => {
                self.update(0, clock);
                self.bl_draw_time = clock.beam_column() as i32 - 64;
                self.draw_line();
            }
            0x15 => self.voice0.control = val & 0x0F,
            0x16 => self.voice1.control = val & 0x0F,
            0x17 => self.voice0.frequency = val & 0x1F,
            0x18 => self.voice1.frequency = val & 0x1F,
            0x19 => self.voice0.volume = val & 0x0F,
            0x1A => self.voice1.volume = val & 0x0F,
            0x1B => {
                if self.p0_graphics != val {
                    self.update(1, clock);
                    self.p0_graphics = val;
                    self.decode_p0();
                    self.draw_line();
                }
            }
            0x1C => {
                if self.p1_graphics != val {
                    self.update(1, clock);
                    self.p1_graphics = val;
                    self.decode_p1();
                    self.draw_line();
                }
            }
            0x1D => {
                self.update(1, clock);
                self.m0_enabled = val & 0x02 != 0;
                self.draw_line();
            }
            0x1E => {
                self.update(1, clock);
                self.m1_enabled = val & 0x02 != 0;
                self.draw_line();
            }
            0x1F => {
                self.update(1, clock);
                self.bl_enabled = val & 0x02 != 0;
                self.draw_line();
            }
            0x20 => self.p0_hm = convert_hm(val),
            0x21 => self.p1_hm = convert_hm(val),
            0x22 => self.m0_hm = convert_hm(val),
            0x23 => self.m1_hm = convert_hm(val),
            0x24 => self.bl_hm = convert_hm(val),
            0x25..=0x27 => {
                // VDELP0/VDELP1/VDELBL: acknowledged, but the delay latch
                // itself is not implemented
                self.update(0, clock);
                self.draw_line();
            }
            0x28 => {
                self.update(0, clock);
                self.res_m_p0 = val & 0x02 != 0;
                if !self.res_m_p0 {
                    // releasing the latch parks the missile on the player core
                    self.m0_draw_time = self.p0_draw_time + 4;
                }
                self.draw_line();
            }
            0x29 => {
                self.update(0, clock);
                self.res_m_p1 = val & 0x02 != 0;
                if !self.res_m_p1 {
                    self.m1_draw_time = self.p1_draw_time + 4;
                }
                self.draw_line();
            }
            0x2A => {
                // HMOVE applies every pending offset at once
                self.update(6, clock);
                self.p0_draw_time -= self.p0_hm;
                self.p1_draw_time -= self.p1_hm;
                self.m0_draw_time -= self.m0_hm;
                self.m1_draw_time -= self.m1_hm;
                self.bl_draw_time -= self.bl_hm;
                self.decode_p0();
                self.decode_p1();
                self.draw_line();
            }
            0x2B => {
                self.p0_hm = 0;
                self.p1_hm = 0;
                self.m0_hm = 0;
                self.m1_hm = 0;
                self.bl_hm = 0;
            }
            0x2C => self.collisions = [0; 8],
            _ => {} // not decoded by the chip
        }
    }

    /// Commit the line template into the canvas from the last checkpoint
    /// up to `time + delay`, then move the checkpoint. Nothing is written
    /// during vertical blank or past the canvas, but the beam position
    /// advances regardless.
    fn update(&mut self, delay: u64, clock: &mut Clock) {
        let pixels = (clock.time + delay) as i64 - clock.tia_last_update as i64;

        if !self.v_blank
            && pixels > 0
            && self.current_pixel >= 0
            && self.current_pixel + pixels < CANVAS_PIXELS
        {
            let mut cp = self.current_pixel as usize;
            let mut remaining = pixels as usize;
            let mut col = cp % LINE_WIDTH;
            while remaining > 0 {
                let n = remaining.min(LINE_WIDTH - col);
                self.canvas.pixels[cp..cp + n].copy_from_slice(&self.line[col..col + n]);
                cp += n;
                remaining -= n;
                col = 0;
            }
        }

        clock.tia_last_update = clock.time + delay;
        self.current_pixel += pixels;
    }

    /// VSYNC rising edge: flush the audio voices, hand the canvas to the
    /// video sink, and start the next frame.
    fn deliver_frame(&mut self, clock: &mut Clock) {
        self.audio_sink.play([self.voice0, self.voice1]);
        if let Err(e) = self.video_sink.present(&self.canvas) {
            log::error!("frame presentation failed: {}", e);
            self.present_error = Some(e);
        }
        self.canvas.clear();
        clock.set_frame_done();
    }

    // -- Compositor ---------------------------------------------------------

    fn decode_p0(&mut self) {
        self.decoded_p0 = decode_player(
            self.p0_graphics,
            self.p0_reflected,
            self.p0_size,
            self.p0_draw_time,
        );
    }

    fn decode_p1(&mut self) {
        self.decoded_p1 = decode_player(
            self.p1_graphics,
            self.p1_reflected,
            self.p1_size,
            self.p1_draw_time,
        );
    }

    /// Expand PF0/PF1/PF2 into the 160-column playfield bitmap: a 20-bit
    /// pattern, pixel-quadrupled over the left half, repeated or
    /// reflected over the right.
    fn decode_playfield(&mut self) {
        let mut left = [false; 20];
        for i in 0..4 {
            left[i] = self.pf[0] & (0x10 << i) != 0;
        }
        for i in 0..8 {
            left[4 + i] = self.pf[1] & (0x80 >> i) != 0;
        }
        for i in 0..8 {
            left[12 + i] = self.pf[2] & (0x01 << i) != 0;
        }

        let mut bits = Bits160::default();
        for x in 0..VISIBLE_WIDTH {
            let idx = if x < 80 {
                x / 4
            } else if self.pf_reflected {
                19 - (x - 80) / 4
            } else {
                (x - 80) / 4
            };
            if left[idx] {
                bits.set(x);
            }
        }
        self.decoded_pf = bits;

        self.draw_line();
    }

    /// Rebuild the line template from the current register state and
    /// latch any collisions the new line produces.
    fn draw_line(&mut self) {
        let (p0c, p1c, pfc, bkc) = (self.color_p0, self.color_p1, self.color_pf, self.color_bk);
        let m0_on = self.m0_enabled && !self.res_m_p0;
        let m1_on = self.m1_enabled && !self.res_m_p1;
        let vis = &mut self.line[HBLANK..];

        if self.pf_priority {
            vis.fill(bkc);
            if self.p1_graphics != 0 {
                paint_bits(vis, &self.decoded_p1, p1c);
            }
            if m1_on {
                paint_span(vis, self.m1_draw_time, self.m1_width, p1c);
            }
            if self.p0_graphics != 0 {
                paint_bits(vis, &self.decoded_p0, p0c);
            }
            if m0_on {
                paint_span(vis, self.m0_draw_time, self.m0_width, p0c);
            }
            if self.bl_enabled {
                paint_span(vis, self.bl_draw_time, self.bl_width, pfc);
            }
            if self.pf_score {
                for (x, px) in vis.iter_mut().enumerate() {
                    if self.decoded_pf.get(x) {
                        *px = if x < 80 { p0c } else { p1c };
                    }
                }
            } else {
                paint_bits(vis, &self.decoded_pf, pfc);
            }
        } else {
            if self.pf_score {
                for (x, px) in vis.iter_mut().enumerate() {
                    *px = if self.decoded_pf.get(x) {
                        if x < 80 {
                            p0c
                        } else {
                            p1c
                        }
                    } else {
                        bkc
                    };
                }
            } else {
                for (x, px) in vis.iter_mut().enumerate() {
                    *px = if self.decoded_pf.get(x) { pfc } else { bkc };
                }
            }
            if self.bl_enabled {
                paint_span(vis, self.bl_draw_time, self.bl_width, pfc);
            }
            if self.p1_graphics != 0 {
                paint_bits(vis, &self.decoded_p1, p1c);
            }
            if m1_on {
                paint_span(vis, self.m1_draw_time, self.m1_width, p1c);
            }
            if self.p0_graphics != 0 {
                paint_bits(vis, &self.decoded_p0, p0c);
            }
            if m0_on {
                paint_span(vis, self.m0_draw_time, self.m0_width, p0c);
            }
        }

        self.latch_collisions();
    }

    /// OR the 15 pairwise overlap bits into the collision registers.
    /// Latches are sticky until CXCLR.
    fn latch_collisions(&mut self) {
        let pf = self.decoded_pf;
        let p0 = (self.p0_graphics != 0).then_some(self.decoded_p0);
        let p1 = (self.p1_graphics != 0).then_some(self.decoded_p1);
        let m0 = (self.m0_enabled && !self.res_m_p0)
            .then(|| Bits160::span(self.m0_draw_time, self.m0_width));
        let m1 = (self.m1_enabled && !self.res_m_p1)
            .then(|| Bits160::span(self.m1_draw_time, self.m1_width));
        let bl = self
            .bl_enabled
            .then(|| Bits160::span(self.bl_draw_time, self.bl_width));

        let hit = |a: &Option<Bits160>, b: &Option<Bits160>| match (a, b) {
            (Some(a), Some(b)) => a.overlaps(b),
            _ => false,
        };
        let hit_pf = |a: &Option<Bits160>| a.map(|a| a.overlaps(&pf)).unwrap_or(false);

        let cx = &mut self.collisions;
        if hit(&m0, &p1) {
            cx[0] |= 0x80;
        }
        if hit(&m0, &p0) {
            cx[0] |= 0x40;
        }
        if hit(&m1, &p0) {
            cx[1] |= 0x80;
        }
        if hit(&m1, &p1) {
            cx[1] |= 0x40;
        }
        if hit_pf(&p0) {
            cx[2] |= 0x80;
        }
        if hit(&p0, &bl) {
            cx[2] |= 0x40;
        }
        if hit_pf(&p1) {
            cx[3] |= 0x80;
        }
        if hit(&p1, &bl) {
            cx[3] |= 0x40;
        }
        if hit_pf(&m0) {
            cx[4] |= 0x80;
        }
        if hit(&m0, &bl) {
            cx[4] |= 0x40;
        }
        if hit_pf(&m1) {
            cx[5] |= 0x80;
        }
        if hit(&m1, &bl) {
            cx[5] |= 0x40;
        }
        if hit_pf(&bl) {
            cx[6] |= 0x80;
        }
        if hit(&p0, &p1) {
            cx[7] |= 0x80;
        }
        if hit(&m0, &m1) {
            cx[7] |= 0x40;
        }
    }
}

/// HM register encoding: bits 4-7 hold a signed offset, -8..=7.
fn convert_hm(val: u8) -> i32 {
    if val & 0x80 != 0 {
        ((val >> 4) & 0x07) as i32 - 8
    } else {
        ((val >> 4) & 0x07) as i32
    }
}

/// Build a player's 160-column bitmap: the 8-bit graphics pattern
/// (optionally reflected), replicated and scaled per NUSIZ bits 0-2.
/// Copies OR together and wrap at column 160; a negative start clamps
/// to the left edge.
fn decode_player(graphics: u8, reflected: bool, size: u8, draw_time: i32) -> Bits160 {
    let mut pattern = [false; 8];
    for (i, bit) in pattern.iter_mut().enumerate() {
        *bit = graphics & (0x80 >> i) != 0;
    }
    if reflected {
        pattern.reverse();
    }

    let mut out = Bits160::default();
    let mut place = |time: i32, scale: usize| {
        let t = time.max(0) as usize;
        for j in 0..8 * scale {
            if pattern[j / scale] {
                out.set((t + j) % VISIBLE_WIDTH);
            }
        }
    };

    match size & 0x07 {
        0 => place(draw_time, 1),
        1 => {
            place(draw_time, 1);
            place(draw_time + 0x10, 1);
        }
        2 => {
            place(draw_time, 1);
            place(draw_time + 0x20, 1);
        }
        3 => {
            place(draw_time, 1);
            place(draw_time + 0x10, 1);
            place(draw_time + 0x20, 1);
        }
        4 => {
            place(draw_time, 1);
            place(draw_time + 0x40, 1);
        }
        5 => place(draw_time + 1, 2),
        6 => {
            place(draw_time, 1);
            place(draw_time + 0x20, 1);
            place(draw_time + 0x40, 1);
        }
        _ => place(draw_time + 1, 4),
    }
    out
}

fn paint_bits(line: &mut [u32], bits: &Bits160, color: u32) {
    for (x, px) in line.iter_mut().enumerate() {
        if bits.get(x) {
            *px = color;
        }
    }
}

/// Paint a missile or the ball: `width` pixels at `start`, skipped when
/// the sprite would hang off the line.
fn paint_span(line: &mut [u32], start: i32, width: i32, color: u32) {
    let start = start.max(0);
    if start + width <= VISIBLE_WIDTH as i32 {
        for px in &mut line[start as usize..(start + width) as usize] {
            *px = color;
        }
    }
}

struct NullVideo;

impl VideoSink for NullVideo {
    fn present(&mut self, _canvas: &Frame) -> Result<(), PresentError> {
        Ok(())
    }
}

struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, _voices: [Voice; 2]) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct CountingVideo {
        frames: Arc<AtomicUsize>,
        last: Arc<Mutex<Option<Frame>>>,
        fail: bool,
    }

    impl VideoSink for CountingVideo {
        fn present(&mut self, canvas: &Frame) -> Result<(), PresentError> {
            if self.fail {
                return Err(PresentError::Display("display gone".into()));
            }
            self.frames.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(canvas.clone());
            Ok(())
        }
    }

    struct CapturingAudio(Arc<Mutex<Vec<[Voice; 2]>>>);

    impl AudioSink for CapturingAudio {
        fn play(&mut self, voices: [Voice; 2]) {
            self.0.lock().unwrap().push(voices);
        }
    }

    struct Harness {
        tia: Tia,
        clock: Clock,
        frames: Arc<AtomicUsize>,
        last_frame: Arc<Mutex<Option<Frame>>>,
        voices: Arc<Mutex<Vec<[Voice; 2]>>>,
    }

    fn test_palette() -> [u32; 128] {
        let mut palette = [0u32; 128];
        for (i, c) in palette.iter_mut().enumerate() {
            *c = 0x0101_0101u32.wrapping_mul(i as u32);
        }
        palette
    }

    fn harness() -> Harness {
        let frames = Arc::new(AtomicUsize::new(0));
        let last_frame = Arc::new(Mutex::new(None));
        let voices = Arc::new(Mutex::new(Vec::new()));
        let tia = Tia::new(
            test_palette(),
            Box::new(CountingVideo {
                frames: frames.clone(),
                last: last_frame.clone(),
                fail: false,
            }),
            Box::new(CapturingAudio(voices.clone())),
        );
        Harness {
            tia,
            clock: Clock::new(),
            frames,
            last_frame,
            voices,
        }
    }

    /// Palette color a COLUxx write of `val` resolves to.
    fn color(val: u8) -> u32 {
        test_palette()[(val >> 1) as usize]
    }

    #[test]
    fn vsync_rising_edge_delivers_one_frame() {
        let mut h = harness();
        h.tia.write(0x00, 0x02, &mut h.clock);
        assert_eq!(h.frames.load(Ordering::SeqCst), 1);
        assert!(h.clock.take_frame_done());
        // holding the bit does not deliver again
        h.tia.write(0x00, 0x02, &mut h.clock);
        assert_eq!(h.frames.load(Ordering::SeqCst), 1);
        // falling edge arms the next rise
        h.tia.write(0x00, 0x00, &mut h.clock);
        h.tia.write(0x00, 0x02, &mut h.clock);
        assert_eq!(h.frames.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn vsync_flushes_audio_voices() {
        let mut h = harness();
        h.tia.write(0x15, 0x04, &mut h.clock); // AUDC0
        h.tia.write(0x17, 0x1F, &mut h.clock); // AUDF0
        h.tia.write(0x19, 0x0F, &mut h.clock); // AUDV0
        h.tia.write(0x00, 0x02, &mut h.clock);
        let voices = h.voices.lock().unwrap();
        assert_eq!(voices.len(), 1);
        assert_eq!(
            voices[0][0],
            Voice {
                control: 4,
                frequency: 0x1F,
                volume: 0x0F
            }
        );
        assert_eq!(voices[0][1], Voice::default());
    }

    #[test]
    fn wsync_aligns_time() {
        let mut h = harness();
        h.clock.time = 123;
        h.tia.write(0x02, 0, &mut h.clock);
        assert_eq!(h.clock.time, 228);
    }

    #[test]
    fn canvas_commit_precedes_register_effect() {
        let mut h = harness();
        // start the visible frame: vblank off at line start
        h.tia.write(0x09, 0x20, &mut h.clock); // background color A
        h.tia.write(0x01, 0x02, &mut h.clock); // vblank on
        h.tia.write(0x01, 0x00, &mut h.clock); // vblank off -> canvas anchored

        // beam moves 90 clocks into the line, then the background changes
        h.clock.advance(90);
        h.tia.write(0x09, 0x40, &mut h.clock); // background color B

        // everything up to the write still carries color A
        let anchor = h.tia.current_pixel as usize - 90;
        let canvas = &h.tia.canvas.pixels;
        assert!(canvas[anchor + HBLANK..anchor + 90]
            .iter()
            .all(|&p| p == color(0x20)));

        // and the template from the write onward carries color B
        h.clock.advance(60);
        h.tia.write(0x09, 0x40, &mut h.clock);
        // nothing before the previous checkpoint was rewritten
        assert!(h.tia.canvas.pixels[anchor + HBLANK..anchor + 90]
            .iter()
            .all(|&p| p == color(0x20)));
    }

    #[test]
    fn vblank_suppresses_canvas_writes() {
        let mut h = harness();
        h.tia.write(0x09, 0x20, &mut h.clock);
        h.tia.write(0x01, 0x02, &mut h.clock); // vblank on
        h.clock.advance(228 * 3);
        h.tia.write(0x09, 0x40, &mut h.clock);
        assert!(h.tia.canvas.pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn playfield_decoding() {
        let mut h = harness();
        h.tia.write(0x0D, 0x10, &mut h.clock); // PF0 bit 4 -> pattern bit 0
        h.tia.write(0x0E, 0x80, &mut h.clock); // PF1 msb -> pattern bit 4
        h.tia.write(0x0F, 0x01, &mut h.clock); // PF2 lsb -> pattern bit 12

        // each pattern bit covers four columns
        let pf = h.tia.decoded_pf;
        assert!(pf.get(0) && pf.get(3) && !pf.get(4));
        assert!(pf.get(16) && pf.get(19) && !pf.get(20));
        assert!(pf.get(48) && pf.get(51) && !pf.get(52));
        // repeated (not reflected) right half
        assert!(pf.get(80) && pf.get(96) && pf.get(128));

        // reflection mirrors the right half
        h.tia.write(0x0A, 0x01, &mut h.clock);
        let pf = h.tia.decoded_pf;
        assert!(!pf.get(80));
        assert!(pf.get(156) && pf.get(159)); // pattern bit 0 lands rightmost
        assert!(pf.get(140) && pf.get(143)); // pattern bit 4
        assert!(pf.get(108) && pf.get(111)); // pattern bit 12
    }

    #[test]
    fn playfield_score_mode_splits_colors() {
        let mut h = harness();
        h.tia.write(0x06, 0x20, &mut h.clock); // COLUP0
        h.tia.write(0x07, 0x40, &mut h.clock); // COLUP1
        h.tia.write(0x08, 0x60, &mut h.clock); // COLUPF
        h.tia.write(0x0D, 0xF0, &mut h.clock); // PF0: columns 0..16
        h.tia.write(0x0A, 0x02, &mut h.clock); // score mode

        let vis = &h.tia.line[HBLANK..];
        assert_eq!(vis[0], color(0x20));
        // the same playfield pattern repeats at the right half in COLUP1
        assert_eq!(vis[80], color(0x40));
    }

    #[test]
    fn player_nusiz_copies_and_scaling() {
        // one copy at draw_time 0: pattern 0x80 -> single pixel column 0
        let p = decode_player(0x80, false, 0, 0);
        assert!(p.get(0) && !p.get(1));

        // two copies 16 apart
        let p = decode_player(0x80, false, 1, 0);
        assert!(p.get(0) && p.get(16) && !p.get(32));

        // three copies 32 apart
        let p = decode_player(0x80, false, 6, 0);
        assert!(p.get(0) && p.get(32) && p.get(64));

        // double width shifts one column and doubles each bit
        let p = decode_player(0x80, false, 5, 0);
        assert!(p.get(1) && p.get(2) && !p.get(3));

        // quad width
        let p = decode_player(0x80, false, 7, 0);
        assert!(p.get(1) && p.get(4) && !p.get(5));

        // reflection reverses the pattern
        let p = decode_player(0x80, true, 0, 0);
        assert!(p.get(7) && !p.get(0));

        // copies wrap at column 160
        let p = decode_player(0xFF, false, 0, 156);
        assert!(p.get(156) && p.get(159) && p.get(0) && p.get(3));
    }

    #[test]
    fn resp_positions_from_beam() {
        let mut h = harness();
        h.clock.time = 100;
        h.tia.write(0x10, 0, &mut h.clock); // RESP0
        assert_eq!(h.tia.p0_draw_time, 100 - 63);
        h.tia.write(0x12, 0, &mut h.clock); // RESM0
        assert_eq!(h.tia.m0_draw_time, 100 - 64);
    }

    #[test]
    fn hmove_applies_and_hmclr_clears() {
        let mut h = harness();
        h.tia.write(0x10, 0, &mut h.clock);
        let before = h.tia.p0_draw_time;

        h.tia.write(0x20, 0x30, &mut h.clock); // HMP0 = +3
        h.tia.write(0x24, 0x80, &mut h.clock); // HMBL = -8
        h.tia.write(0x2A, 0, &mut h.clock); // HMOVE
        assert_eq!(h.tia.p0_draw_time, before - 3);
        assert_eq!(h.tia.bl_draw_time, 8);

        // HMOVE, HMCLR, HMOVE leaves everything where the first move put it
        let (p0, bl) = (h.tia.p0_draw_time, h.tia.bl_draw_time);
        h.tia.write(0x2B, 0, &mut h.clock); // HMCLR
        h.tia.write(0x2A, 0, &mut h.clock); // HMOVE
        assert_eq!(h.tia.p0_draw_time, p0);
        assert_eq!(h.tia.bl_draw_time, bl);
    }

    #[test]
    fn hm_encoding_sign_extends() {
        assert_eq!(convert_hm(0x00), 0);
        assert_eq!(convert_hm(0x70), 7);
        assert_eq!(convert_hm(0x80), -8);
        assert_eq!(convert_hm(0xF0), -1);
    }

    #[test]
    fn players_collide_and_latch() {
        let mut h = harness();
        h.tia.write(0x10, 0, &mut h.clock); // RESP0 at column 0 area
        h.tia.write(0x11, 0, &mut h.clock); // RESP1 same spot
        h.tia.p0_draw_time = 50;
        h.tia.p1_draw_time = 50;
        h.tia.write(0x1B, 0xFF, &mut h.clock); // GRP0
        h.tia.write(0x1C, 0xFF, &mut h.clock); // GRP1
        assert_eq!(h.tia.read_collision(7) & 0x80, 0x80);

        // latches are sticky: moving the players apart keeps the bit
        h.tia.p1_draw_time = 100;
        h.tia.decode_p1();
        h.tia.draw_line();
        assert_eq!(h.tia.read_collision(7) & 0x80, 0x80);

        // CXCLR drops all of them
        h.tia.write(0x2C, 0, &mut h.clock);
        assert_eq!(h.tia.read_collision(7), 0);
    }

    #[test]
    fn missile_playfield_collision() {
        let mut h = harness();
        h.tia.write(0x0D, 0x10, &mut h.clock); // PF0 -> columns 0..4
        h.tia.m0_draw_time = 2;
        h.tia.write(0x1D, 0x02, &mut h.clock); // ENAM0
        assert_eq!(h.tia.read_collision(4) & 0x80, 0x80);
    }

    #[test]
    fn resmp_hides_missile_and_parks_it_on_release() {
        let mut h = harness();
        h.tia.p0_draw_time = 40;
        h.tia.decode_p0();
        h.tia.write(0x1D, 0x02, &mut h.clock); // ENAM0
        h.tia.write(0x28, 0x02, &mut h.clock); // RESMP0 on
        h.tia.write(0x2C, 0, &mut h.clock); // clear anything latched so far
        h.tia.write(0x0D, 0xF0, &mut h.clock); // playfield under the missile
        // hidden missile latches nothing
        assert_eq!(h.tia.read_collision(4), 0);

        h.tia.write(0x28, 0x00, &mut h.clock); // release
        assert_eq!(h.tia.m0_draw_time, 44);
    }

    #[test]
    fn present_failure_is_stashed() {
        let frames = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(Mutex::new(None));
        let mut tia = Tia::new(
            test_palette(),
            Box::new(CountingVideo {
                frames,
                last,
                fail: true,
            }),
            Box::new(NullAudio),
        );
        let mut clock = Clock::new();
        tia.write(0x00, 0x02, &mut clock);
        assert!(tia.take_present_error().is_some());
        assert!(tia.take_present_error().is_none());
    }

    #[test]
    fn frame_is_cleared_after_delivery() {
        let mut h = harness();
        h.tia.write(0x09, 0x7E, &mut h.clock);
        h.tia.write(0x01, 0x02, &mut h.clock);
        h.tia.write(0x01, 0x00, &mut h.clock);
        h.clock.advance(228 * 10);
        h.tia.write(0x09, 0x7E, &mut h.clock); // forces a commit
        h.tia.write(0x00, 0x02, &mut h.clock); // vsync: deliver

        let delivered = h.last_frame.lock().unwrap().take().unwrap();
        assert!(delivered.pixels[..228 * 10]
            .iter()
            .skip(HBLANK)
            .take(100)
            .any(|&p| p == color(0x7E)));
        // the working canvas starts the next frame black
        assert!(h.tia.canvas.pixels.iter().all(|&p| p == 0));
    }
}
