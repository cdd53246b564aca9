//! Plotting collaborators.
//!
//! The core hands out plain [`Segment`] sequences; a sink decides how to draw
//! them and which ones fall outside its axes.

pub mod ascii;

pub use ascii::AsciiPlot;

use crate::domain::Segment;

/// Axis ranges and tick spacing in data coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axes {
    pub x_min: f64,
    pub x_max: f64,
    pub x_interval: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub y_interval: f64,
}

impl Axes {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }
}

/// Something that can draw line segments.
pub trait SegmentSink {
    /// Draw one segment with `glyph`. Segments the sink cannot show are dropped.
    fn draw_segment(&mut self, segment: &Segment, glyph: char);

    fn draw_segments<'a, I>(&mut self, segments: I, glyph: char)
    where
        I: IntoIterator<Item = &'a Segment>,
    {
        for segment in segments {
            self.draw_segment(segment, glyph);
        }
    }
}
