use std::{fmt, sync::Arc};

use crate::font_storage::FontStorage;

/// Glyph used to probe the cell size of a fixed-pitch font.
pub const DEFAULT_SAMPLE: char = 'W';

/// Pixel footprint of one fixed-pitch glyph.
///
/// Only valid for the font, zoom and DPI state it was measured under.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphSize {
    pub height: f32,
    pub width: f32,
}

impl GlyphSize {
    /// Validates a measured geometry. Zero, negative or non-finite sides are
    /// rejected so callers never divide by a degenerate size.
    pub fn new(width: f32, height: f32) -> Result<Self, MeasurementError> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if valid(width) && valid(height) {
            Ok(Self { height, width })
        } else {
            Err(MeasurementError::Degenerate { width, height })
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MeasurementError {
    /// No font matched the requested family.
    NoFont,
    /// The font has no glyph for the sample character.
    MissingGlyph(char),
    /// The font does not provide horizontal line metrics.
    NoLineMetrics,
    /// The measured box was empty, negative or not finite.
    Degenerate { width: f32, height: f32 },
    /// The host surface could not produce a geometry for the probe.
    ProbeUnavailable(String),
}

impl fmt::Display for MeasurementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFont => write!(f, "no monospace font available"),
            Self::MissingGlyph(ch) => write!(f, "font has no glyph for {ch:?}"),
            Self::NoLineMetrics => write!(f, "font has no horizontal line metrics"),
            Self::Degenerate { width, height } => {
                write!(f, "degenerate glyph size {width}x{height}")
            }
            Self::ProbeUnavailable(reason) => write!(f, "probe measurement failed: {reason}"),
        }
    }
}

impl std::error::Error for MeasurementError {}

/// Reports the footprint of a representative fixed-pitch glyph under the
/// current rendering conditions.
pub trait GlyphMetrics: Send {
    fn measure(&mut self) -> Result<GlyphSize, MeasurementError>;
}

/// Known cell size, e.g. a terminal cell or a host that already laid out the
/// font.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedGlyphMetrics {
    pub width: f32,
    pub height: f32,
}

impl FixedGlyphMetrics {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl GlyphMetrics for FixedGlyphMetrics {
    fn measure(&mut self) -> Result<GlyphSize, MeasurementError> {
        GlyphSize::new(self.width, self.height)
    }
}

/// Measures the sample glyph straight from a `fontdue` font.
///
/// The width is the advance width and the height is the line height
/// (`ascent - descent + line_gap`), the same box a row of the art occupies.
#[derive(Clone)]
pub struct FontGlyphMetrics {
    font: Arc<fontdue::Font>,
    font_size: f32,
    sample: char,
}

impl FontGlyphMetrics {
    pub fn new(font: Arc<fontdue::Font>, font_size: f32) -> Self {
        Self {
            font,
            font_size,
            sample: DEFAULT_SAMPLE,
        }
    }

    /// Picks the monospace family from `font_storage`.
    pub fn monospace(
        font_storage: &mut FontStorage,
        font_size: f32,
    ) -> Result<Self, MeasurementError> {
        let (_, font) = font_storage.monospace().ok_or(MeasurementError::NoFont)?;
        Ok(Self::new(font, font_size))
    }

    pub fn with_sample(mut self, sample: char) -> Self {
        self.sample = sample;
        self
    }

    /// Font the glyph is measured from.
    pub fn font(&self) -> &Arc<fontdue::Font> {
        &self.font
    }

    /// Pixel size used for measurement.
    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    /// Changes the pixel size, e.g. after a zoom. The engine must be told to
    /// re-measure afterwards.
    pub fn set_font_size(&mut self, font_size: f32) {
        self.font_size = font_size;
    }
}

impl GlyphMetrics for FontGlyphMetrics {
    fn measure(&mut self) -> Result<GlyphSize, MeasurementError> {
        if self.font.lookup_glyph_index(self.sample) == 0 {
            return Err(MeasurementError::MissingGlyph(self.sample));
        }

        let line = self
            .font
            .horizontal_line_metrics(self.font_size)
            .ok_or(MeasurementError::NoLineMetrics)?;
        let metrics = self.font.metrics(self.sample, self.font_size);

        GlyphSize::new(
            metrics.advance_width,
            line.ascent - line.descent + line.line_gap,
        )
    }
}

/// Surface that can host a transient measurement probe, such as a DOM node or
/// a retained widget tree.
pub trait ProbeHost: Send {
    type Probe;

    /// Inserts a probe showing `sample` into the art container.
    fn insert_probe(&mut self, sample: char) -> Result<Self::Probe, MeasurementError>;
    /// Reads the `[width, height]` of the rendered probe.
    fn probe_size(&mut self, probe: &Self::Probe) -> Result<[f32; 2], MeasurementError>;
    fn remove_probe(&mut self, probe: Self::Probe);
}

/// Removes the probe when dropped, on every exit path.
struct ProbeGuard<'a, H: ProbeHost> {
    host: &'a mut H,
    probe: Option<H::Probe>,
}

impl<H: ProbeHost> ProbeGuard<'_, H> {
    fn size(&mut self) -> Result<[f32; 2], MeasurementError> {
        match &self.probe {
            Some(probe) => self.host.probe_size(probe),
            None => Err(MeasurementError::ProbeUnavailable("probe already removed".into())),
        }
    }
}

impl<H: ProbeHost> Drop for ProbeGuard<'_, H> {
    fn drop(&mut self) {
        if let Some(probe) = self.probe.take() {
            self.host.remove_probe(probe);
        }
    }
}

/// Measures the sample glyph by rendering a probe into a [`ProbeHost`].
///
/// The probe only exists for the duration of [`GlyphMetrics::measure`].
pub struct ProbeMeasurer<H: ProbeHost> {
    host: H,
    sample: char,
}

impl<H: ProbeHost> ProbeMeasurer<H> {
    /// Measures [`DEFAULT_SAMPLE`] on `host`.
    pub fn new(host: H) -> Self {
        Self {
            host,
            sample: DEFAULT_SAMPLE,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

impl<H: ProbeHost> GlyphMetrics for ProbeMeasurer<H> {
    fn measure(&mut self) -> Result<GlyphSize, MeasurementError> {
        let probe = self.host.insert_probe(self.sample)?;
        let mut guard = ProbeGuard {
            host: &mut self.host,
            probe: Some(probe),
        };
        let [width, height] = guard.size()?;
        drop(guard);

        GlyphSize::new(width, height)
    }
}
