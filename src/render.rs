use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::cmp::min;
use std::io::{self, Write};
use tankflow::geometry::{Point, Rect};
use tankflow::report::{Report, REPORT_TITLE};
use tankflow::FlowController;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    #[cfg(test)]
    pub(crate) fn get(&self, x: u16, y: u16) -> Option<Cell> {
        (x < self.w && y < self.h).then(|| self.cells[self.idx(x, y)])
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self, bg: Color) {
        for c in &mut self.cells {
            *c = Cell {
                bg,
                ..Cell::default()
            };
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Pixel {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

impl Pixel {
    const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

const PIPE_WALL: Pixel = Pixel::rgba(128, 128, 128, 255);
const PIPE_LIQUID: Pixel = Pixel::rgba(0, 180, 255, 255);
const TANK_LIQUID: Pixel = Pixel::rgba(0, 120, 255, 200);
const TANK_WALL: Pixel = Pixel::rgba(255, 255, 255, 255);

pub(crate) struct PixelCanvas {
    pub(crate) w: u32,
    pub(crate) h: u32,
    pub(crate) px: Vec<Pixel>,
}

impl PixelCanvas {
    pub(crate) fn new(w: u32, h: u32) -> Self {
        Self {
            w,
            h,
            px: vec![Pixel::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn clear(&mut self, p: Pixel) {
        self.px.fill(p);
    }
    #[cfg(test)]
    pub(crate) fn get(&self, x: i32, y: i32) -> Option<Pixel> {
        if x < 0 || y < 0 || x as u32 >= self.w || y as u32 >= self.h {
            return None;
        }
        Some(self.px[self.idx(x as u32, y as u32)])
    }

    fn blend_over(&mut self, x: i32, y: i32, src: Pixel) {
        if x < 0 || y < 0 {
            return;
        }
        let (x, y) = (x as u32, y as u32);
        if x >= self.w || y >= self.h {
            return;
        }
        let i = self.idx(x, y);
        let dst = self.px[i];

        let sa = src.a as f32 / 255.0;
        let da = dst.a as f32 / 255.0;

        let out_a = sa + da * (1.0 - sa);
        if out_a <= 1e-6 {
            self.px[i] = Pixel::default();
            return;
        }

        let blend = |sc: u8, dc: u8| -> u8 {
            let sc = sc as f32 / 255.0;
            let dc = dc as f32 / 255.0;
            let out = (sc * sa + dc * da * (1.0 - sa)) / out_a;
            (out.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
        };

        self.px[i] = Pixel {
            r: blend(src.r, dst.r),
            g: blend(src.g, dst.g),
            b: blend(src.b, dst.b),
            a: (out_a.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
        };
    }

    fn fill_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, p: Pixel) {
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend_over(x, y, p);
            }
        }
    }

    fn stroke_rect(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, p: Pixel) {
        for x in x0..=x1 {
            self.blend_over(x, y0, p);
            self.blend_over(x, y1, p);
        }
        for y in y0..=y1 {
            self.blend_over(x0, y, p);
            self.blend_over(x1, y, p);
        }
    }

    /// Thick segment: a square brush of half-width `r` walked along the line.
    fn stroke_segment(&mut self, a: (i32, i32), b: (i32, i32), r: i32, p: Pixel) {
        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let steps = dx.abs().max(dy.abs()).max(1);
        let mut last = None;
        for s in 0..=steps {
            let x = a.0 + (dx * s) / steps;
            let y = a.1 + (dy * s) / steps;
            if last == Some((x, y)) {
                continue;
            }
            last = Some((x, y));
            for oy in -r..=r {
                for ox in -r..=r {
                    self.set_opaque(x + ox, y + oy, p);
                }
            }
        }
    }

    // overwrite instead of blending so overlapping brush stamps stay flat
    fn set_opaque(&mut self, x: i32, y: i32, p: Pixel) {
        if x >= 0 && y >= 0 && (x as u32) < self.w && (y as u32) < self.h {
            let i = self.idx(x as u32, y as u32);
            self.px[i] = p;
        }
    }
}

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
    pub(crate) canvas: PixelCanvas,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        let prev = CellBuffer::new(cols, rows);
        let cur = CellBuffer::new(cols, rows);

        // Braille: 2×4 pixels per cell
        let canvas = PixelCanvas::new(cols as u32 * 2, rows as u32 * 4);

        Ok(Self {
            out,
            cols,
            rows,
            prev,
            cur,
            canvas,
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        self.canvas = PixelCanvas::new(c as u32 * 2, r as u32 * 4);
        // force a full repaint
        queue!(self.out, Clear(ClearType::All))?;
        for c in &mut self.prev.cells {
            c.ch = '\0';
        }
        Ok(true)
    }

    pub(crate) fn present(&mut self) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

/* -----------------------------
   Braille encoding: 2×4 pixels -> U+2800..U+28FF
------------------------------ */

fn braille_bit(dx: u32, dy: u32) -> u8 {
    // Dot mapping:
    // (0,0)=1 (0,1)=2 (0,2)=4 (0,3)=64
    // (1,0)=8 (1,1)=16 (1,2)=32 (1,3)=128
    match (dx, dy) {
        (0, 0) => 0x01,
        (0, 1) => 0x02,
        (0, 2) => 0x04,
        (0, 3) => 0x40,
        (1, 0) => 0x08,
        (1, 1) => 0x10,
        (1, 2) => 0x20,
        (1, 3) => 0x80,
        _ => 0x00,
    }
}

pub(crate) fn canvas_to_cells(canvas: &PixelCanvas, out: &mut CellBuffer, enable_color: bool, bg: Color) {
    let cols = out.w as u32;
    let rows = out.h as u32;

    for cy in 0..rows {
        for cx in 0..cols {
            let mut mask: u8 = 0;
            let (mut sum_r, mut sum_g, mut sum_b) = (0u32, 0u32, 0u32);
            let mut ink_count: u32 = 0;

            for dy in 0..4 {
                for dx in 0..2 {
                    let x = cx * 2 + dx;
                    let y = cy * 4 + dy;
                    if x >= canvas.w || y >= canvas.h {
                        continue;
                    }
                    let p = canvas.px[canvas.idx(x, y)];
                    // threshold: treat alpha as ink
                    if p.a >= 32 {
                        mask |= braille_bit(dx, dy);
                        sum_r += p.r as u32;
                        sum_g += p.g as u32;
                        sum_b += p.b as u32;
                        ink_count += 1;
                    }
                }
            }
            if mask == 0 {
                continue;
            }

            let ch = char::from_u32(0x2800 + (mask as u32)).unwrap_or(' ');
            let fg = if enable_color && ink_count > 0 {
                Color::Rgb {
                    r: (sum_r / ink_count) as u8,
                    g: (sum_g / ink_count) as u8,
                    b: (sum_b / ink_count) as u8,
                }
            } else {
                Color::White
            };

            out.set(cx as u16, cy as u16, Cell { ch, fg, bg });
        }
    }
}

/* -----------------------------
   Installation view
------------------------------ */

#[derive(Clone, Copy, Debug)]
pub(crate) struct Viewport {
    pub(crate) x: i32,
    pub(crate) y: i32,
    pub(crate) w: i32,
    pub(crate) h: i32,
}

/// Uniform scale from layout units onto canvas subpixels, centred in the
/// viewport.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LayoutMap {
    origin: Point,
    scale: f32,
    off_x: f32,
    off_y: f32,
}

impl LayoutMap {
    pub(crate) fn fit(bounds: Rect, vp: Viewport) -> Self {
        // braille subpixels are roughly twice as tall as wide on screen,
        // so stretch x to keep tanks upright
        let sx = vp.w as f32 / (bounds.w * 2.0);
        let sy = vp.h as f32 / bounds.h;
        let scale = sx.min(sy).max(1e-3);
        let used_w = bounds.w * 2.0 * scale;
        let used_h = bounds.h * scale;
        Self {
            origin: Point::new(bounds.x, bounds.y),
            scale,
            off_x: vp.x as f32 + (vp.w as f32 - used_w) / 2.0,
            off_y: vp.y as f32 + (vp.h as f32 - used_h) / 2.0,
        }
    }

    pub(crate) fn to_px(&self, p: Point) -> (i32, i32) {
        let x = self.off_x + (p.x - self.origin.x) * 2.0 * self.scale;
        let y = self.off_y + (p.y - self.origin.y) * self.scale;
        (x.round() as i32, y.round() as i32)
    }

    pub(crate) fn to_cell(&self, p: Point) -> (i32, i32) {
        let (x, y) = self.to_px(p);
        (x.div_euclid(2), y.div_euclid(4))
    }

    fn len(&self, v: f32) -> i32 {
        (v * self.scale).round() as i32
    }
}

pub(crate) fn layout_bounds(controller: &FlowController) -> Rect {
    let mut tanks = controller.tanks().iter().map(|t| t.frame());
    let first = tanks.next().unwrap_or(Rect::new(0.0, 0.0, 1.0, 1.0));
    // headroom for the labels above each tank
    tanks.fold(first, |acc, r| acc.union(&r)).inflate(30.0)
}

pub(crate) fn draw_installation(canvas: &mut PixelCanvas, controller: &FlowController, map: &LayoutMap) {
    let wall = map.len(6.0).max(1);
    for pipe in controller.pipes() {
        let color = if pipe.is_flowing() { PIPE_LIQUID } else { PIPE_WALL };
        for seg in pipe.path().windows(2) {
            canvas.stroke_segment(map.to_px(seg[0]), map.to_px(seg[1]), wall, color);
        }
    }

    for tank in controller.tanks() {
        let f = tank.frame();
        let (x0, y0) = map.to_px(Point::new(f.x, f.y));
        let (x1, y1) = map.to_px(Point::new(f.right(), f.bottom()));

        let level = tank.fill_fraction() as f32;
        if level > 0.0 {
            let h = f.h * level;
            let (lx0, ly0) = map.to_px(Point::new(f.x + 3.0, f.bottom() - h));
            let (lx1, _) = map.to_px(Point::new(f.right() - 3.0, f.bottom()));
            canvas.fill_rect(lx0, ly0.min(y1 - 1), lx1, y1, TANK_LIQUID);
        }
        canvas.stroke_rect(x0, y0, x1, y1, TANK_WALL);
    }
}

pub(crate) fn draw_tank_labels(buf: &mut CellBuffer, controller: &FlowController, map: &LayoutMap, selected: usize) {
    for (i, tank) in controller.tanks().iter().enumerate() {
        let f = tank.frame();
        let (cx, cy) = map.to_cell(Point::new(f.x, f.y));
        let y = cy - 1;
        if cx < 0 || y < 0 {
            continue;
        }
        let marker = if i == selected { '>' } else { ' ' };
        let text = format!("{marker}{} {:>3.0}%", tank.label(), tank.fill_fraction() * 100.0);
        let fg = if i == selected { Color::Yellow } else { Color::White };
        draw_text(buf, cx as u16, y as u16, &text, fg, Color::Black);
    }
}

/* -----------------------------
   Text views
------------------------------ */

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(xx, y, Cell { ch, fg, bg });
    }
}

pub(crate) fn bar(value01: f64, width: usize) -> String {
    let v = value01.clamp(0.0, 1.0);
    let fill = (v * width as f64 + 0.5) as usize;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < fill { '█' } else { ' ' });
    }
    s.push(']');
    s
}

pub(crate) fn draw_report(buf: &mut CellBuffer, report: &Report, x: u16, y: u16) {
    let (fg, bg) = (Color::White, Color::Black);
    let title = format!("{REPORT_TITLE}   refreshed {}", report.generated_at.format("%H:%M:%S"));
    draw_text(buf, x, y, &title, fg, bg);
    for (i, line) in report.lines.iter().enumerate() {
        let row = y + 2 + i as u16;
        let s = format!("{} {:<28}", bar(line.fill_fraction, 20), line.to_string());
        draw_text(buf, x, row, &s, fg, bg);
    }
}

pub(crate) struct Hud<'a> {
    pub(crate) running: bool,
    pub(crate) ticks: u64,
    pub(crate) selected: &'a str,
    pub(crate) view: &'a str,
    pub(crate) status: &'a str,
}

pub(crate) fn draw_hud(buf: &mut CellBuffer, hud: &Hud) {
    let bg = Color::Black;
    let state = if hud.running { "RUNNING" } else { "STOPPED" };
    let title = format!(
        "tankflow  |  {state}  |  tick {}  |  selected {}  |  {}",
        hud.ticks, hud.selected, hud.view
    );
    let fg = if hud.running { Color::Green } else { Color::White };
    draw_text(buf, 1, 0, &title, fg, bg);

    let rows = buf.h;
    if !hud.status.is_empty() {
        draw_text(buf, 1, rows.saturating_sub(2), hud.status, Color::Yellow, bg);
    }
    draw_text(
        buf,
        1,
        rows.saturating_sub(1),
        "Keys: space start/stop | 1-4 select | + fill | - empty | t tanks | r report | c color | h help | q quit",
        Color::White,
        bg,
    );
}

pub(crate) fn draw_center_box(buf: &mut CellBuffer, title: &str, body: &str) {
    let (w, h) = (buf.w, buf.h);
    let bw = min(60, w.saturating_sub(4));
    let bh = min(18, h.saturating_sub(4));
    if bw < 2 || bh < 2 {
        return;
    }
    let x0 = (w - bw) / 2;
    let y0 = (h - bh) / 2;

    let frame = |ch| Cell {
        ch,
        fg: Color::White,
        bg: Color::Black,
    };
    for y in y0..y0 + bh {
        for x in x0..x0 + bw {
            buf.set(x, y, frame(' '));
        }
    }
    for x in x0..x0 + bw {
        buf.set(x, y0, frame('─'));
        buf.set(x, y0 + bh - 1, frame('─'));
    }
    for y in y0..y0 + bh {
        buf.set(x0, y, frame('│'));
        buf.set(x0 + bw - 1, y, frame('│'));
    }
    buf.set(x0, y0, frame('┌'));
    buf.set(x0 + bw - 1, y0, frame('┐'));
    buf.set(x0, y0 + bh - 1, frame('└'));
    buf.set(x0 + bw - 1, y0 + bh - 1, frame('┘'));

    draw_text(buf, x0 + 2, y0 + 1, title, Color::White, Color::Black);
    let mut yy = y0 + 3;
    for line in body.lines() {
        if yy >= y0 + bh - 1 {
            break;
        }
        draw_text(buf, x0 + 2, yy, line, Color::White, Color::Black);
        yy += 1;
    }
}
