use std::sync::Arc;

use parking_lot::Mutex;

use crate::{art::TextArt, engine::RenderTarget, fit::ScaleTransform, glyph_metrics::DEFAULT_SAMPLE};

/// 8-bit coverage image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl Bitmap {
    /// Creates a fully transparent bitmap.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Coverage at `(x, y)`, or `None` outside the bitmap.
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.data[y * self.width + x])
    }

    /// Adds `value` to the pixel, saturating at 255. Out of bounds writes are
    /// ignored.
    pub fn accumulate(&mut self, x: usize, y: usize, value: u8) {
        if x >= self.width || y >= self.height {
            return;
        }
        let pixel = &mut self.data[y * self.width + x];
        *pixel = pixel.saturating_add(value);
    }

    /// Number of pixels with any coverage.
    pub fn coverage(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct RasterState {
    transform: ScaleTransform,
    max_height: Option<f32>,
}

/// CPU render target for banners.
///
/// The engine writes the transform and container cap into it; the host keeps
/// a clone and calls [`RasterTarget::render`] whenever it needs pixels.
#[derive(Clone)]
pub struct RasterTarget {
    state: Arc<Mutex<RasterState>>,
}

impl Default for RasterTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterTarget {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RasterState {
                transform: ScaleTransform::identity(),
                max_height: None,
            })),
        }
    }

    /// Transform last written by the engine.
    pub fn transform(&self) -> ScaleTransform {
        self.state.lock().transform
    }

    /// Container cap last written by the engine; `None` when unscaled.
    pub fn container_max_height(&self) -> Option<f32> {
        self.state.lock().max_height
    }

    /// Rasterizes `art` with the applied scale, clipped to the container cap.
    pub fn render(&self, art: &TextArt, font: &fontdue::Font, font_size: f32) -> Bitmap {
        let RasterState {
            transform,
            max_height,
        } = *self.state.lock();

        // Uniform scale, so either diagonal entry will do.
        rasterize_art(art, font, font_size * transform.m11, max_height)
    }
}

impl RenderTarget for RasterTarget {
    fn set_transform(&mut self, transform: ScaleTransform) {
        self.state.lock().transform = transform;
    }

    fn set_container_max_height(&mut self, max_height: Option<f32>) {
        self.state.lock().max_height = max_height;
    }
}

/// Draws every row of `art` on a fixed-pitch grid at `font_size` pixels.
///
/// Cells are as wide as the sample glyph's advance and as tall as the font's
/// line height. Whitespace is skipped but still occupies its cell.
pub fn rasterize_art(
    art: &TextArt,
    font: &fontdue::Font,
    font_size: f32,
    clip_height: Option<f32>,
) -> Bitmap {
    if art.is_empty() || !font_size.is_finite() || font_size <= 0.0 {
        return Bitmap::new(0, 0);
    }

    let cell_width = font.metrics(DEFAULT_SAMPLE, font_size).advance_width;
    let (ascent, line_height) = match font.horizontal_line_metrics(font_size) {
        Some(line) => (line.ascent, line.ascent - line.descent + line.line_gap),
        None => (font_size, font_size),
    };

    let full_height = art.row_count() as f32 * line_height;
    let height = clip_height.map_or(full_height, |clip| clip.min(full_height));
    let width = (art.max_row_len() as f32 * cell_width).ceil() as usize;

    let mut bitmap = Bitmap::new(width, height.max(0.0).ceil() as usize);
    if bitmap.width == 0 || bitmap.height == 0 {
        return bitmap;
    }

    for (row_index, row) in art.rows().iter().enumerate() {
        let baseline = row_index as f32 * line_height + ascent;
        for (col, ch) in row.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let origin_x = col as f32 * cell_width;
            draw_glyph(&mut bitmap, font, ch, font_size, origin_x, baseline);
        }
    }

    bitmap
}

/// Accumulates one glyph's coverage with its origin on the baseline.
fn draw_glyph(
    bitmap: &mut Bitmap,
    font: &fontdue::Font,
    ch: char,
    font_size: f32,
    origin_x: f32,
    baseline: f32,
) {
    let (metrics, coverage) = font.rasterize(ch, font_size);
    if metrics.width == 0 || metrics.height == 0 {
        return;
    }

    // `ymin` is the offset of the bitmap's bottom edge from the baseline.
    let left = origin_x + metrics.xmin as f32;
    let top = baseline - (metrics.height as f32 + metrics.ymin as f32);

    for row in 0..metrics.height {
        let y = top + row as f32;
        if y < 0.0 {
            continue;
        }
        let iy = y.floor() as usize;
        if iy >= bitmap.height {
            break;
        }

        for col in 0..metrics.width {
            let alpha = coverage[row * metrics.width + col];
            if alpha == 0 {
                continue;
            }

            let x = left + col as f32;
            if x < 0.0 {
                continue;
            }
            bitmap.accumulate(x.floor() as usize, iy, alpha);
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{FitConfig, FitEngine},
        font_storage::FontStorage,
        glyph_metrics::{FontGlyphMetrics, GlyphMetrics},
        viewport::SharedViewport,
    };

    fn system_monospace() -> Option<Arc<fontdue::Font>> {
        let mut storage = FontStorage::new();
        storage.load_system_fonts();
        storage.monospace().map(|(_, font)| font)
    }

    #[test]
    fn accumulate_saturates_and_clips() {
        let mut bitmap = Bitmap::new(2, 2);
        bitmap.accumulate(1, 1, 200);
        bitmap.accumulate(1, 1, 200);
        bitmap.accumulate(5, 0, 10);

        assert_eq!(bitmap.get(1, 1), Some(255));
        assert_eq!(bitmap.get(0, 0), Some(0));
        assert_eq!(bitmap.get(2, 0), None);
        assert_eq!(bitmap.coverage(), 1);
    }

    #[test]
    fn target_records_engine_output() {
        let target = RasterTarget::new();
        let viewport = Arc::new(SharedViewport::new(1000.0));
        let mut engine = FitEngine::new(
            FitConfig::default(),
            crate::glyph_metrics::FixedGlyphMetrics::new(8.0, 16.0),
            viewport,
            target.clone(),
        );

        engine
            .set_art(TextArt::from_rows((0..10).map(|_| "#".repeat(40))))
            .unwrap();

        assert_eq!(target.transform(), ScaleTransform::scale(0.75, 0.75));
        assert_eq!(target.container_max_height(), Some(120.0));
    }

    // Depends on the host having a monospace font installed.
    #[test]
    fn scaled_render_is_smaller() {
        let Some(font) = system_monospace() else {
            return;
        };
        let art = TextArt::parse("##\n##");

        let full = rasterize_art(&art, &font, 32.0, None);
        let half = rasterize_art(&art, &font, 16.0, None);

        assert!(full.coverage() > 0);
        assert!(half.width < full.width);
        assert!(half.height < full.height);
    }

    #[test]
    fn render_respects_container_cap() {
        let Some(font) = system_monospace() else {
            return;
        };
        let art = TextArt::parse("#\n#\n#\n#");
        let mut target = RasterTarget::new();
        target.set_container_max_height(Some(10.0));

        let bitmap = target.render(&art, &font, 32.0);
        assert!(bitmap.height <= 10);
    }

    #[test]
    fn font_metrics_match_raster_grid() {
        let Some(font) = system_monospace() else {
            return;
        };
        let glyph = FontGlyphMetrics::new(font.clone(), 20.0)
            .measure()
            .unwrap();
        let art = TextArt::parse("WWWW\nWW");

        let bitmap = rasterize_art(&art, &font, 20.0, None);
        assert_eq!(bitmap.width, (4.0 * glyph.width).ceil() as usize);
        assert_eq!(bitmap.height, (2.0 * glyph.height).ceil() as usize);
    }

    #[test]
    fn empty_art_renders_nothing() {
        let Some(font) = system_monospace() else {
            return;
        };
        let bitmap = rasterize_art(&TextArt::default(), &font, 16.0, None);
        assert_eq!((bitmap.width, bitmap.height), (0, 0));
    }
}
