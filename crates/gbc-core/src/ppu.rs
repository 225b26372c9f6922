use crate::bus::Bus;
use crate::clock::{Clock, Mode};
use crate::interrupts::Interrupt;

// Screen resolution used by the Game Boy PPU
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;
/// RGBA32 frame buffer size.
pub const FRAME_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT * 4;

// LY of the last VBlank line
const LAST_LINE: u8 = 153;

// Sprite limits
const MAX_SPRITES_PER_LINE: usize = 10;
const TOTAL_SPRITES: usize = 40;

// Window X position is clipped if greater than this value
const WINDOW_X_MAX: u8 = 166;

// VRAM layout, as offsets from 0x8000
const BG_MAP_0_BASE: usize = 0x1800;
const BG_MAP_1_BASE: usize = 0x1C00;
const TILE_DATA_UNSIGNED_BASE: usize = 0x0000;
const TILE_DATA_SIGNED_BASE: usize = 0x1000;

/// Gray level for each of the four palette shades, lightest first.
const SHADES: [u8; 4] = [255, 192, 96, 0];

/// 0xFF40-0xFF4B. Owned by the bus; the PPU drives LY and the STAT low bits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LcdRegisters {
    pub lcdc: u8,
    pub stat: u8,
    pub scy: u8,
    pub scx: u8,
    pub ly: u8,
    pub lyc: u8,
    pub dma: u8,
    pub bgp: u8,
    pub obp0: u8,
    pub obp1: u8,
    pub wy: u8,
    pub wx: u8,
}

impl LcdRegisters {
    /// Values left behind by the boot ROM.
    pub fn post_boot() -> Self {
        Self {
            lcdc: 0x91,
            stat: 0x04,
            bgp: 0xFC,
            obp0: 0xFF,
            obp1: 0xFF,
            ..Self::default()
        }
    }

    pub fn enabled(&self) -> bool {
        self.lcdc & 0x80 != 0
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => self.stat | 0x80,
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF46 => self.dma,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => self.lcdc = val,
            // Mode and coincidence bits are read-only.
            0xFF41 => self.stat = (self.stat & 0x07) | (val & 0x78),
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => self.lyc = val,
            0xFF46 => self.dma = val,
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PixelSource {
    #[default]
    Background,
    Window,
    Sprite,
}

/// A decoded pixel of the current scanline, before palette lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pixel {
    /// 2-bit color index from the tile data.
    pub color: u8,
    pub tile: u8,
    /// Palette register the color index goes through.
    pub palette: u8,
    pub source: PixelSource,
}

impl Pixel {
    fn shade(self) -> u8 {
        SHADES[((self.palette >> (self.color * 2)) & 0x03) as usize]
    }
}

#[derive(Copy, Clone, Default)]
struct Sprite {
    x: i16,
    y: i16,
    tile: u8,
    flags: u8,
    oam_index: usize,
}

pub struct Ppu {
    mode: Mode,
    line: [Pixel; SCREEN_WIDTH],
    frame: Vec<u8>,
    /// Internal window line counter
    window_line: u8,
    /// LCDC bit 7 as of the last tick, to detect the LCD coming back on.
    lcd_on: bool,
    stat_irq_line: bool,
    lines_rendered: u64,
    frames: u64,
}

impl Ppu {
    pub fn new() -> Self {
        Self {
            mode: Mode::Oam,
            line: [Pixel::default(); SCREEN_WIDTH],
            frame: vec![0xFF; FRAME_BYTES],
            window_line: 0,
            lcd_on: false,
            stat_irq_line: false,
            lines_rendered: 0,
            frames: 0,
        }
    }

    /// Start over at LY 0 in mode OAM, timed from the current cycle.
    pub fn reset(&mut self, bus: &mut Bus, clock: &mut Clock) {
        *self = Self::new();
        bus.set_ly(0);
        if bus.lcd.enabled() {
            self.lcd_on = true;
            self.enter(Mode::Oam, bus);
            clock.resync(Mode::Oam);
        } else {
            bus.set_mode(Mode::HBlank);
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// RGBA32, row-major, 160x144.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    /// Decoded pixels of the most recently rendered line.
    pub fn line(&self) -> &[Pixel] {
        &self.line
    }

    pub fn lines_rendered(&self) -> u64 {
        self.lines_rendered
    }

    /// VBlank periods entered since the last reset.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Process every mode transition that is due at the current cycle.
    pub fn tick(&mut self, bus: &mut Bus, clock: &mut Clock) {
        if !bus.lcd.enabled() {
            if self.lcd_on {
                self.lcd_on = false;
                self.mode = Mode::HBlank;
                self.window_line = 0;
                self.stat_irq_line = false;
            }
            return;
        }

        if !self.lcd_on {
            self.lcd_on = true;
            self.window_line = 0;
            bus.set_ly(0);
            self.enter(Mode::Oam, bus);
            clock.resync(Mode::Oam);
            log::debug!("LCD switched on at cycle {}", clock.get());
            return;
        }

        while clock.cycles_until_next_mode() <= 0 {
            self.step_mode(bus, clock);
        }
    }

    fn step_mode(&mut self, bus: &mut Bus, clock: &mut Clock) {
        match self.mode {
            Mode::Oam => {
                self.enter(Mode::Transfer, bus);
                clock.schedule(Mode::Transfer);
            }
            Mode::Transfer => {
                self.render_scanline(bus);
                self.enter(Mode::HBlank, bus);
                clock.schedule(Mode::HBlank);
            }
            Mode::HBlank => {
                let ly = bus.lcd.ly.wrapping_add(1);
                bus.set_ly(ly);
                if ly as usize == SCREEN_HEIGHT {
                    bus.request_interrupt(Interrupt::VBlank);
                    self.frames = self.frames.wrapping_add(1);
                    self.enter(Mode::VBlank, bus);
                    clock.schedule(Mode::VBlank);
                } else {
                    self.enter(Mode::Oam, bus);
                    clock.schedule(Mode::Oam);
                }
            }
            Mode::VBlank => {
                if bus.lcd.ly >= LAST_LINE {
                    bus.set_ly(0);
                    self.window_line = 0;
                    self.enter(Mode::Oam, bus);
                    clock.schedule(Mode::Oam);
                } else {
                    bus.set_ly(bus.lcd.ly + 1);
                    self.update_stat(bus);
                    clock.schedule(Mode::VBlank);
                }
            }
        }
    }

    fn enter(&mut self, mode: Mode, bus: &mut Bus) {
        self.mode = mode;
        bus.set_mode(mode);
        self.update_stat(bus);
    }

    /// Refresh the coincidence flag and raise the STAT interrupt on a rising
    /// edge of any enabled source.
    fn update_stat(&mut self, bus: &mut Bus) {
        let lcd = &mut bus.lcd;
        let coincidence = lcd.ly == lcd.lyc;
        if coincidence {
            lcd.stat |= 0x04;
        } else {
            lcd.stat &= !0x04;
        }
        let mode_signal = match self.mode {
            Mode::HBlank => lcd.stat & 0x08 != 0,
            Mode::VBlank => lcd.stat & 0x10 != 0,
            Mode::Oam => lcd.stat & 0x20 != 0,
            Mode::Transfer => false,
        };
        let signal = mode_signal || (coincidence && lcd.stat & 0x40 != 0);
        if signal && !self.stat_irq_line {
            bus.request_interrupt(Interrupt::LcdStat);
        }
        self.stat_irq_line = signal;
    }

    #[inline(always)]
    fn color_at(lo: u8, hi: u8, bit: u8) -> u8 {
        ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1)
    }

    /// Both bitplane bytes of one row of a background or window tile.
    fn bg_tile_row(vram: &[u8], lcdc: u8, tile: u8, row: usize) -> (u8, u8) {
        let base = if lcdc & 0x10 != 0 {
            TILE_DATA_UNSIGNED_BASE + tile as usize * 16
        } else {
            (TILE_DATA_SIGNED_BASE as isize + tile as i8 as isize * 16) as usize
        };
        (vram[base + row * 2], vram[base + row * 2 + 1])
    }

    fn render_scanline(&mut self, bus: &Bus) {
        let lcd = &bus.lcd;
        let ly = lcd.ly as usize;
        if ly >= SCREEN_HEIGHT {
            return;
        }
        let vram = &bus.vram[0];

        // Blank line when the background is off.
        self.line = [Pixel::default(); SCREEN_WIDTH];

        if lcd.lcdc & 0x01 != 0 {
            let map_base = if lcd.lcdc & 0x08 != 0 {
                BG_MAP_1_BASE
            } else {
                BG_MAP_0_BASE
            };
            let y = lcd.ly.wrapping_add(lcd.scy) as usize;
            for (x, pixel) in self.line.iter_mut().enumerate() {
                let px = (x as u8).wrapping_add(lcd.scx) as usize;
                let tile = vram[map_base + (y / 8) * 32 + px / 8];
                let (lo, hi) = Self::bg_tile_row(vram, lcd.lcdc, tile, y % 8);
                *pixel = Pixel {
                    color: Self::color_at(lo, hi, 7 - (px % 8) as u8),
                    tile,
                    palette: lcd.bgp,
                    source: PixelSource::Background,
                };
            }

            if lcd.lcdc & 0x20 != 0 && lcd.ly >= lcd.wy && lcd.wx <= WINDOW_X_MAX {
                let map_base = if lcd.lcdc & 0x40 != 0 {
                    BG_MAP_1_BASE
                } else {
                    BG_MAP_0_BASE
                };
                let start = lcd.wx as i16 - 7;
                let wy = self.window_line as usize;
                for x in start.max(0) as usize..SCREEN_WIDTH {
                    let wxp = (x as i16 - start) as usize;
                    let tile = vram[map_base + (wy / 8) * 32 + wxp / 8];
                    let (lo, hi) = Self::bg_tile_row(vram, lcd.lcdc, tile, wy % 8);
                    self.line[x] = Pixel {
                        color: Self::color_at(lo, hi, 7 - (wxp % 8) as u8),
                        tile,
                        palette: lcd.bgp,
                        source: PixelSource::Window,
                    };
                }
                self.window_line = self.window_line.wrapping_add(1);
            }
        }

        if lcd.lcdc & 0x02 != 0 {
            self.render_sprites(bus);
        }

        let row = ly * SCREEN_WIDTH * 4;
        for (x, pixel) in self.line.iter().enumerate() {
            let shade = pixel.shade();
            let i = row + x * 4;
            self.frame[i..i + 4].copy_from_slice(&[shade, shade, shade, 0xFF]);
        }
        self.lines_rendered = self.lines_rendered.wrapping_add(1);
    }

    /// Collect up to 10 sprites on the current line in DMG priority order.
    fn oam_scan(bus: &Bus, height: i16) -> Vec<Sprite> {
        let ly = bus.lcd.ly as i16;
        let mut sprites: Vec<Sprite> = (0..TOTAL_SPRITES)
            .map(|i| {
                let base = i * 4;
                Sprite {
                    y: bus.oam[base] as i16 - 16,
                    x: bus.oam[base + 1] as i16 - 8,
                    tile: bus.oam[base + 2],
                    flags: bus.oam[base + 3],
                    oam_index: i,
                }
            })
            .filter(|s| ly >= s.y && ly < s.y + height)
            .take(MAX_SPRITES_PER_LINE)
            .collect();
        sprites.sort_by_key(|s| (s.x, s.oam_index));
        sprites
    }

    fn render_sprites(&mut self, bus: &Bus) {
        let lcd = &bus.lcd;
        let height: i16 = if lcd.lcdc & 0x04 != 0 { 16 } else { 8 };
        let vram = &bus.vram[0];
        let mut drawn = [false; SCREEN_WIDTH];

        for s in Self::oam_scan(bus, height) {
            let tile = if height == 16 { s.tile & 0xFE } else { s.tile };
            let mut row = lcd.ly as i16 - s.y;
            if s.flags & 0x40 != 0 {
                row = height - 1 - row;
            }
            let row = row as usize;
            let addr = (tile as usize + row / 8) * 16 + (row % 8) * 2;
            let (lo, hi) = (vram[addr], vram[addr + 1]);
            let palette = if s.flags & 0x10 != 0 {
                lcd.obp1
            } else {
                lcd.obp0
            };

            for px in 0..8u8 {
                let bit = if s.flags & 0x20 != 0 { px } else { 7 - px };
                let color = Self::color_at(lo, hi, bit);
                if color == 0 {
                    continue;
                }
                let sx = s.x + px as i16;
                if !(0..SCREEN_WIDTH as i16).contains(&sx) || drawn[sx as usize] {
                    continue;
                }
                let sx = sx as usize;
                // The first opaque sprite pixel owns the dot even when the
                // background then hides it.
                drawn[sx] = true;
                if s.flags & 0x80 != 0 && self.line[sx].color != 0 {
                    continue;
                }
                self.line[sx] = Pixel {
                    color,
                    tile,
                    palette,
                    source: PixelSource::Sprite,
                };
            }
        }
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FRAME_CYCLES, LINE_CYCLES};

    fn lcd_bus(lcdc: u8) -> Bus {
        let mut bus = Bus::new(false);
        bus.lcd.lcdc = lcdc;
        bus.lcd.bgp = 0xE4;
        bus.lcd.obp0 = 0xE4;
        bus
    }

    fn pixel(ppu: &Ppu, x: usize, y: usize) -> [u8; 4] {
        let i = (y * SCREEN_WIDTH + x) * 4;
        let mut out = [0; 4];
        out.copy_from_slice(&ppu.frame()[i..i + 4]);
        out
    }

    #[test]
    fn register_masks() {
        let mut lcd = LcdRegisters::default();
        lcd.write(0xFF41, 0xFF);
        assert_eq!(lcd.read(0xFF41), 0xF8);
        lcd.write(0xFF44, 0x12);
        assert_eq!(lcd.read(0xFF44), 0x00);
        lcd.write(0xFF47, 0x1B);
        assert_eq!(lcd.read(0xFF47), 0x1B);
    }

    #[test]
    fn unsigned_tile_data() {
        let mut bus = lcd_bus(0x91);
        bus.vram[0][BG_MAP_0_BASE] = 0x01;
        // Tile 1, row 0: color 1 across.
        bus.vram[0][0x0010] = 0xFF;
        let mut ppu = Ppu::new();
        ppu.render_scanline(&bus);
        assert_eq!(pixel(&ppu, 0, 0), [192, 192, 192, 255]);
        assert_eq!(pixel(&ppu, 7, 0), [192, 192, 192, 255]);
        assert_eq!(pixel(&ppu, 8, 0), [255, 255, 255, 255]);
        assert_eq!(ppu.line()[0].tile, 1);
        assert_eq!(ppu.lines_rendered(), 1);
    }

    #[test]
    fn signed_tile_data() {
        let mut bus = lcd_bus(0x81);
        bus.vram[0][BG_MAP_0_BASE] = 0xFF;
        // Tile -1 sits just below 0x9000.
        bus.vram[0][0x0FF1] = 0xFF;
        // Tile 0 in signed mode is at 0x9000, not 0x8000.
        bus.vram[0][0x0000] = 0xFF;
        bus.vram[0][0x1001] = 0x80;
        let mut ppu = Ppu::new();
        ppu.render_scanline(&bus);
        assert_eq!(pixel(&ppu, 0, 0), [96, 96, 96, 255]);
        assert_eq!(pixel(&ppu, 8, 0), [96, 96, 96, 255]);
        assert_eq!(pixel(&ppu, 9, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn scroll_and_high_map() {
        let mut bus = lcd_bus(0x99);
        bus.lcd.scx = 4;
        bus.lcd.scy = 9;
        // Map row 1, column 0 of the 0x9C00 map.
        bus.vram[0][BG_MAP_1_BASE + 32] = 0x02;
        // Row 1 of tile 2, only the fifth pixel is set.
        bus.vram[0][0x0022] = 0x08;
        bus.vram[0][0x0023] = 0x08;
        let mut ppu = Ppu::new();
        ppu.render_scanline(&bus);
        assert_eq!(pixel(&ppu, 0, 0), [0, 0, 0, 255]);
        assert_eq!(pixel(&ppu, 1, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn palette_remaps_colors() {
        let mut bus = lcd_bus(0x91);
        bus.lcd.bgp = 0x1B;
        let mut ppu = Ppu::new();
        ppu.render_scanline(&bus);
        assert_eq!(pixel(&ppu, 0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn window_covers_background() {
        let mut bus = lcd_bus(0xF1);
        bus.lcd.wx = 7 + 80;
        bus.lcd.wy = 0;
        // Window map at 0x9C00 uses tile 3, solid color 3.
        bus.vram[0][BG_MAP_1_BASE] = 0x03;
        bus.vram[0][0x0030] = 0xFF;
        bus.vram[0][0x0031] = 0xFF;
        let mut ppu = Ppu::new();
        ppu.render_scanline(&bus);
        assert_eq!(pixel(&ppu, 79, 0), [255, 255, 255, 255]);
        assert_eq!(pixel(&ppu, 80, 0), [0, 0, 0, 255]);
        assert_eq!(ppu.line()[80].source, PixelSource::Window);
        assert_eq!(ppu.window_line, 1);
    }

    #[test]
    fn sprite_draws_over_background() {
        let mut bus = lcd_bus(0x93);
        bus.oam[0] = 16;
        bus.oam[1] = 8;
        bus.oam[2] = 0x04;
        bus.vram[0][0x0040] = 0x80;
        let mut ppu = Ppu::new();
        ppu.render_scanline(&bus);
        assert_eq!(pixel(&ppu, 0, 0), [192, 192, 192, 255]);
        assert_eq!(ppu.line()[0].source, PixelSource::Sprite);
        assert_eq!(pixel(&ppu, 1, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn behind_background_sprite_only_shows_on_color_zero() {
        let mut bus = lcd_bus(0x93);
        bus.vram[0][BG_MAP_0_BASE] = 0x01;
        bus.vram[0][0x0010] = 0xF0;
        bus.oam[0] = 16;
        bus.oam[1] = 8;
        bus.oam[2] = 0x04;
        bus.oam[3] = 0x80;
        bus.vram[0][0x0041] = 0xFF;
        let mut ppu = Ppu::new();
        ppu.render_scanline(&bus);
        assert_eq!(ppu.line()[0].source, PixelSource::Background);
        assert_eq!(ppu.line()[4].source, PixelSource::Sprite);
        assert_eq!(pixel(&ppu, 4, 0), [96, 96, 96, 255]);
    }

    #[test]
    fn hidden_sprite_still_masks_lower_priority_sprites() {
        let mut bus = lcd_bus(0x93);
        bus.vram[0][BG_MAP_0_BASE] = 0x01;
        bus.vram[0][0x0010] = 0xFF;
        // OAM 0 sits behind the background, OAM 1 would draw on top.
        for (i, flags) in [(0usize, 0x80u8), (1, 0x00)] {
            bus.oam[i * 4] = 16;
            bus.oam[i * 4 + 1] = 8;
            bus.oam[i * 4 + 2] = 0x04;
            bus.oam[i * 4 + 3] = flags;
        }
        bus.vram[0][0x0040] = 0xFF;
        bus.vram[0][0x0041] = 0xFF;
        let mut ppu = Ppu::new();
        ppu.render_scanline(&bus);
        assert_eq!(ppu.line()[0].source, PixelSource::Background);
        assert_eq!(pixel(&ppu, 0, 0), [192, 192, 192, 255]);
    }

    #[test]
    fn ten_sprites_per_line() {
        let mut bus = lcd_bus(0x93);
        for i in 0..12 {
            bus.oam[i * 4] = 16;
            bus.oam[i * 4 + 1] = 8 + 8 * i as u8;
            bus.oam[i * 4 + 2] = 0x04;
        }
        bus.vram[0][0x0040] = 0xFF;
        let mut ppu = Ppu::new();
        ppu.render_scanline(&bus);
        assert_eq!(ppu.line()[79].source, PixelSource::Sprite);
        assert_eq!(ppu.line()[80].source, PixelSource::Background);
    }

    #[test]
    fn full_frame_timing() {
        let mut bus = lcd_bus(0x91);
        let mut clock = Clock::new();
        let mut ppu = Ppu::new();
        ppu.reset(&mut bus, &mut clock);
        assert_eq!(ppu.mode(), Mode::Oam);

        let mut vblanks = 0;
        while clock.get() < FRAME_CYCLES {
            clock.advance(4);
            ppu.tick(&mut bus, &mut clock);
            if bus.if_reg() & 0x01 != 0 {
                vblanks += 1;
                bus.clear_interrupt(Interrupt::VBlank);
            }
            if clock.get() == 144 * LINE_CYCLES {
                assert_eq!(ppu.mode(), Mode::VBlank);
                assert_eq!(bus.lcd.ly, 144);
            }
        }
        assert_eq!(vblanks, 1);
        assert_eq!(ppu.lines_rendered(), 144);
        assert_eq!(bus.lcd.ly, 0);
        assert_eq!(ppu.mode(), Mode::Oam);
        assert_eq!(bus.lcd.read(0xFF41) & 0x03, 2);
    }

    #[test]
    fn lcd_off_freezes() {
        let mut bus = lcd_bus(0x91);
        let mut clock = Clock::new();
        let mut ppu = Ppu::new();
        ppu.reset(&mut bus, &mut clock);
        bus.write(0xFF40, 0x11);
        clock.advance(FRAME_CYCLES);
        ppu.tick(&mut bus, &mut clock);
        assert_eq!(ppu.lines_rendered(), 0);
        assert_eq!(bus.lcd.ly, 0);

        bus.write(0xFF40, 0x91);
        ppu.tick(&mut bus, &mut clock);
        assert_eq!(ppu.mode(), Mode::Oam);
        assert_eq!(clock.cycles_until_next_mode(), 80);
    }

    #[test]
    fn lyc_match_raises_stat() {
        let mut bus = lcd_bus(0x91);
        bus.lcd.lyc = 2;
        bus.lcd.stat = 0x40;
        let mut clock = Clock::new();
        let mut ppu = Ppu::new();
        ppu.reset(&mut bus, &mut clock);
        clock.advance(2 * LINE_CYCLES);
        ppu.tick(&mut bus, &mut clock);
        assert_eq!(bus.lcd.ly, 2);
        assert_ne!(bus.lcd.stat & 0x04, 0);
        assert_ne!(bus.if_reg() & 0x02, 0);
    }
}
