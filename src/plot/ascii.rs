//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Segments with an endpoint outside the axes are dropped whole rather than
//! clipped. Lines only fill blank cells, so whatever is drawn first wins;
//! [`AsciiPlot::mark`] always overwrites.

use crate::domain::Segment;
use crate::plot::{Axes, SegmentSink};

#[derive(Debug, Clone)]
pub struct AsciiPlot {
    axes: Axes,
    x_label: String,
    y_label: String,
    grid: Vec<Vec<char>>,
}

impl AsciiPlot {
    pub fn new(axes: Axes, width: usize, height: usize) -> Self {
        let width = width.max(10);
        let height = height.max(5);
        Self {
            axes,
            x_label: "va (V)".to_string(),
            y_label: "ia (mA)".to_string(),
            grid: vec![vec![' '; width]; height],
        }
    }

    fn width(&self) -> usize {
        self.grid[0].len()
    }

    fn height(&self) -> usize {
        self.grid.len()
    }

    /// Put `glyph` at a data point, overwriting the cell. Out-of-range points are ignored.
    pub fn mark(&mut self, x: f64, y: f64, glyph: char) {
        if !self.axes.contains(x, y) {
            return;
        }
        let col = map_x(x, &self.axes, self.width());
        let row = map_y(y, &self.axes, self.height());
        self.grid[row][col] = glyph;
    }

    pub fn render(&self) -> String {
        let a = &self.axes;
        let mut out = format!(
            "Plot: {}=[{:.1}, {:.1}] step {} | {}=[{:.2}, {:.2}] step {}\n",
            self.x_label, a.x_min, a.x_max, a.x_interval, self.y_label, a.y_min, a.y_max, a.y_interval
        );
        for row in &self.grid {
            out.extend(row.iter());
            out.push('\n');
        }
        out
    }
}

impl SegmentSink for AsciiPlot {
    fn draw_segment(&mut self, segment: &Segment, glyph: char) {
        if !(self.axes.contains(segment.x1, segment.y1) && self.axes.contains(segment.x2, segment.y2)) {
            return;
        }
        let (w, h) = (self.width(), self.height());
        let x0 = map_x(segment.x1, &self.axes, w);
        let y0 = map_y(segment.y1, &self.axes, h);
        let x1 = map_x(segment.x2, &self.axes, w);
        let y1 = map_y(segment.y2, &self.axes, h);
        draw_line(&mut self.grid, x0, y0, x1, y1, glyph);
    }
}

fn map_x(x: f64, axes: &Axes, width: usize) -> usize {
    let span = axes.x_max - axes.x_min;
    let u = if span > 0.0 { ((x - axes.x_min) / span).clamp(0.0, 1.0) } else { 0.0 };
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, axes: &Axes, height: usize) -> usize {
    let span = axes.y_max - axes.y_min;
    let u = if span > 0.0 { ((y - axes.y_min) / span).clamp(0.0, 1.0) } else { 0.0 };
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
