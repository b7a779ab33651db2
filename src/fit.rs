use crate::{art::TextArt, glyph_metrics::GlyphSize};

/// Extra width added to the longest row.
pub const ART_PADDING: f32 = 50.0;

/// Device pixel unit for `euclid` geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Px;

/// Uniform scale transform handed to render targets.
pub type ScaleTransform = euclid::Transform2D<f32, Px, Px>;

/// Pixel size of the unscaled art.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ArtBoundingBox {
    pub height: f32,
    pub width: f32,
}

impl ArtBoundingBox {
    /// Derives the footprint of `art` rendered with `glyph`.
    ///
    /// Art with zero rows has a zero box; padding only applies to non-empty
    /// art.
    pub fn measure(art: &TextArt, glyph: GlyphSize, padding: f32) -> Self {
        if art.is_empty() {
            return Self::default();
        }

        Self {
            height: art.row_count() as f32 * glyph.height,
            width: art.max_row_len() as f32 * glyph.width + padding,
        }
    }

    /// `true` if either side is zero; such a box is never scaled.
    pub fn is_empty(&self) -> bool {
        self.height == 0.0 || self.width == 0.0
    }

    /// Size of the box after `factor` is applied to both axes.
    pub fn scaled(&self, factor: ScaleFactor) -> euclid::Size2D<f32, Px> {
        euclid::Size2D::new(self.width, self.height) * factor.get()
    }
}

/// Limits the art must fit inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitConstraints {
    pub max_height: f32,
    pub viewport_width: f32,
}

/// Multiplier applied to both axes of the art.
///
/// Always positive and finite.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct ScaleFactor(f32);

impl Default for ScaleFactor {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl ScaleFactor {
    /// No scaling.
    pub const NEUTRAL: Self = Self(1.0);
    /// Lower bound used when a constraint collapses to zero.
    pub const MIN: Self = Self(1e-4);

    /// Returns `None` unless `value` is positive and finite.
    pub fn new(value: f32) -> Option<Self> {
        (value.is_finite() && value > 0.0).then_some(Self(value))
    }

    /// The raw multiplier.
    pub fn get(self) -> f32 {
        self.0
    }

    /// `true` for exactly 1, i.e. no scaling.
    pub fn is_neutral(self) -> bool {
        self.0 == 1.0
    }

    /// Uniform 2-D scale transform for this factor.
    pub fn to_transform(self) -> ScaleTransform {
        ScaleTransform::scale(self.0, self.0)
    }
}

/// Picks the factor that makes `bbox` fit inside `constraints`.
///
/// Art that already fits (boundaries included) keeps the neutral factor, and
/// the result is never above 1. Otherwise the more restrictive axis wins so
/// both limits hold at once. A box with a zero side is left unscaled.
pub fn compute_scale(bbox: ArtBoundingBox, constraints: FitConstraints) -> ScaleFactor {
    if bbox.is_empty() {
        return ScaleFactor::NEUTRAL;
    }

    let height_offset = bbox.height - constraints.max_height;
    let width_offset = bbox.width - constraints.viewport_width;

    if height_offset <= 0.0 && width_offset <= 0.0 {
        return ScaleFactor::NEUTRAL;
    }

    let scale_y = constraints.max_height / bbox.height;
    let scale_x = constraints.viewport_width / bbox.width;
    let factor = scale_x.min(scale_y).min(1.0);

    ScaleFactor::new(factor).unwrap_or_else(|| {
        log::debug!(
            "Constraints {:?} collapse the art to {}, clamping.",
            constraints,
            factor
        );
        ScaleFactor::MIN
    })
}
