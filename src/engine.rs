use std::sync::Arc;

use crate::{
    art::TextArt,
    fit::{ART_PADDING, ArtBoundingBox, FitConstraints, ScaleFactor, ScaleTransform, compute_scale},
    glyph_metrics::{GlyphMetrics, GlyphSize, MeasurementError},
    viewport::ViewportSource,
};

/// Settings fixed for the lifetime of a [`FitEngine`].
#[derive(Clone, Debug, PartialEq)]
pub struct FitConfig {
    /// Maximum rendered height of the art in device pixels.
    pub max_height: f32,
    /// Extra width added to the longest row.
    pub padding: f32,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_height: 120.0,
            padding: ART_PADDING,
        }
    }
}

/// Element the art is drawn into, plus its container.
pub trait RenderTarget: Send {
    /// Replaces the transform of the art element.
    fn set_transform(&mut self, transform: ScaleTransform);
    /// Caps the container height so siblings reflow around the scaled art.
    ///
    /// Receives `None` when the art fits unscaled (the neutral factor), which
    /// removes any cap left by an earlier pass.
    fn set_container_max_height(&mut self, max_height: Option<f32>);
}

/// Lifecycle of a [`FitEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitState {
    /// No pass has completed yet.
    Unmeasured,
    /// Art is present and a factor has been applied.
    Fitted,
}

/// Result of the last pass that reached the render target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AppliedFit {
    pub bbox: ArtBoundingBox,
    pub factor: ScaleFactor,
    pub viewport_width: f32,
}

/// Keeps a block of text art inside a maximum height and the viewport width.
///
/// Every art replacement runs a full pass with a fresh glyph measurement.
/// Viewport changes reuse the last measured glyph. A failed measurement
/// leaves the last applied fit in place.
pub struct FitEngine {
    config: FitConfig,
    metrics: Box<dyn GlyphMetrics>,
    viewport: Arc<dyn ViewportSource>,
    target: Box<dyn RenderTarget>,
    art: Option<TextArt>,
    glyph: Option<GlyphSize>,
    applied: Option<AppliedFit>,
}

impl FitEngine {
    /// Creates an engine in the [`FitState::Unmeasured`] state. Nothing is
    /// measured or applied until art arrives.
    pub fn new(
        config: FitConfig,
        metrics: impl GlyphMetrics + 'static,
        viewport: Arc<dyn ViewportSource>,
        target: impl RenderTarget + 'static,
    ) -> Self {
        Self {
            config,
            metrics: Box::new(metrics),
            viewport,
            target: Box::new(target),
            art: None,
            glyph: None,
            applied: None,
        }
    }

    /// Settings the engine was created with.
    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Source of the live viewport width.
    pub fn viewport(&self) -> &Arc<dyn ViewportSource> {
        &self.viewport
    }

    /// [`FitState::Fitted`] once any pass has reached the target.
    pub fn state(&self) -> FitState {
        match self.applied {
            Some(_) => FitState::Fitted,
            None => FitState::Unmeasured,
        }
    }

    /// Current art. May be newer than the applied fit if its measurement
    /// failed.
    pub fn art(&self) -> Option<&TextArt> {
        self.art.as_ref()
    }

    /// Glyph size from the last successful measurement.
    pub fn glyph_size(&self) -> Option<GlyphSize> {
        self.glyph
    }

    /// Last fit written to the target.
    pub fn applied(&self) -> Option<AppliedFit> {
        self.applied
    }

    /// Constraints as they stand now, reading the live viewport width.
    pub fn constraints(&self) -> FitConstraints {
        FitConstraints {
            max_height: self.config.max_height,
            viewport_width: self.viewport.width(),
        }
    }

    /// Bounding box of the current art with the last measured glyph.
    pub fn bounding_box(&self) -> Option<ArtBoundingBox> {
        let art = self.art.as_ref()?;
        let glyph = self.glyph?;
        Some(ArtBoundingBox::measure(art, glyph, self.config.padding))
    }
}

/// fit passes
impl FitEngine {
    /// Replaces the art and runs a full pass, measuring the glyph again.
    ///
    /// The new art is kept even when the measurement fails; the previously
    /// applied factor then stays on the target.
    pub fn set_art(&mut self, art: TextArt) -> Result<ScaleFactor, MeasurementError> {
        self.art = Some(art);
        self.remeasure()?;
        Ok(self.refit())
    }

    /// Re-fits the current art to the live viewport width.
    ///
    /// The glyph is not measured again. Ignored, returning `None`, until a
    /// pass has completed, even if art or a glyph size is already stored.
    pub fn on_viewport_change(&mut self) -> Option<ScaleFactor> {
        if self.state() == FitState::Unmeasured {
            log::debug!("Viewport change before art was fitted, ignoring.");
            return None;
        }

        Some(self.refit())
    }

    /// Measures the glyph again after a font, zoom or DPI change and re-fits
    /// the art if there is any. On failure the previous glyph size is kept.
    pub fn invalidate_metrics(&mut self) -> Result<Option<ScaleFactor>, MeasurementError> {
        self.remeasure()?;
        Ok(self.art.is_some().then(|| self.refit()))
    }

    /// Applies `factor` to the target using the current bounding box.
    ///
    /// The transform is always reset to identity first, so applying the same
    /// factor twice ends in the same state as applying it once. The neutral
    /// factor clears the container cap.
    pub fn apply(&mut self, factor: ScaleFactor) {
        let Some(bbox) = self.bounding_box() else {
            log::warn!("Apply called before art was measured.");
            return;
        };

        let viewport_width = self.viewport.width();
        self.apply_fit(bbox, factor, viewport_width);
    }

    fn remeasure(&mut self) -> Result<GlyphSize, MeasurementError> {
        let glyph = self.metrics.measure().inspect_err(|e| {
            log::error!("Glyph measurement failed, keeping last fit: {}", e);
        })?;
        self.glyph = Some(glyph);
        Ok(glyph)
    }

    fn refit(&mut self) -> ScaleFactor {
        let Some(bbox) = self.bounding_box() else {
            return ScaleFactor::NEUTRAL;
        };

        let constraints = self.constraints();
        let factor = compute_scale(bbox, constraints);

        log::debug!(
            "Fit pass: box {}x{}, limits {}x{}, factor {}",
            bbox.width,
            bbox.height,
            constraints.viewport_width,
            constraints.max_height,
            factor.get()
        );

        self.apply_fit(bbox, factor, constraints.viewport_width);
        factor
    }

    fn apply_fit(&mut self, bbox: ArtBoundingBox, factor: ScaleFactor, viewport_width: f32) {
        self.target.set_transform(ScaleTransform::identity());

        if factor.is_neutral() {
            self.target.set_container_max_height(None);
        } else {
            self.target.set_transform(factor.to_transform());
            self.target.set_container_max_height(Some(bbox.height * factor.get()));
        }

        self.applied = Some(AppliedFit {
            bbox,
            factor,
            viewport_width,
        });
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{glyph_metrics::FixedGlyphMetrics, viewport::SharedViewport};
    use parking_lot::Mutex;

    /// Render target that records every call for inspection.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingTarget {
        pub(crate) state: Arc<Mutex<TargetState>>,
    }

    #[derive(Debug, Default)]
    pub(crate) struct TargetState {
        pub(crate) transform: Option<ScaleTransform>,
        pub(crate) max_height: Option<f32>,
        pub(crate) calls: usize,
    }

    impl RenderTarget for RecordingTarget {
        fn set_transform(&mut self, transform: ScaleTransform) {
            let mut state = self.state.lock();
            state.transform = Some(transform);
            state.calls += 1;
        }

        fn set_container_max_height(&mut self, max_height: Option<f32>) {
            self.state.lock().max_height = max_height;
        }
    }

    /// Glyph metrics that can be switched to failing between passes.
    #[derive(Clone)]
    pub(crate) struct ToggleMetrics {
        pub(crate) size: Arc<Mutex<Option<(f32, f32)>>>,
        pub(crate) measured: Arc<Mutex<usize>>,
    }

    impl ToggleMetrics {
        pub(crate) fn new(width: f32, height: f32) -> Self {
            Self {
                size: Arc::new(Mutex::new(Some((width, height)))),
                measured: Arc::new(Mutex::new(0)),
            }
        }
    }

    impl GlyphMetrics for ToggleMetrics {
        fn measure(&mut self) -> Result<GlyphSize, MeasurementError> {
            *self.measured.lock() += 1;
            match *self.size.lock() {
                Some((w, h)) => GlyphSize::new(w, h),
                None => Err(MeasurementError::ProbeUnavailable("detached".into())),
            }
        }
    }

    pub(crate) fn scenario_art() -> TextArt {
        TextArt::from_rows((0..10).map(|_| "#".repeat(40)))
    }

    fn engine(width: f32) -> (FitEngine, Arc<SharedViewport>, RecordingTarget) {
        let viewport = Arc::new(SharedViewport::new(width));
        let target = RecordingTarget::default();
        let engine = FitEngine::new(
            FitConfig::default(),
            FixedGlyphMetrics {
                width: 8.0,
                height: 16.0,
            },
            viewport.clone(),
            target.clone(),
        );
        (engine, viewport, target)
    }

    #[test]
    fn starts_unmeasured() {
        let (mut engine, _, target) = engine(1000.0);
        assert_eq!(engine.state(), FitState::Unmeasured);
        assert_eq!(engine.on_viewport_change(), None);
        assert_eq!(target.state.lock().calls, 0);
    }

    #[test]
    fn set_art_fits_height() {
        let (mut engine, _, target) = engine(1000.0);

        let factor = engine.set_art(scenario_art()).unwrap();
        assert_eq!(factor.get(), 0.75);
        assert_eq!(engine.state(), FitState::Fitted);

        let state = target.state.lock();
        assert_eq!(state.transform, Some(ScaleTransform::scale(0.75, 0.75)));
        assert_eq!(state.max_height, Some(120.0));
    }

    #[test]
    fn viewport_change_refits_width() {
        let (mut engine, viewport, target) = engine(1000.0);
        engine.set_art(scenario_art()).unwrap();

        viewport.set_width(200.0);
        let factor = engine.on_viewport_change().unwrap();
        assert!((factor.get() - 200.0 / 370.0).abs() < 1e-4);
        assert_eq!(engine.applied().unwrap().viewport_width, 200.0);

        let max_height = target.state.lock().max_height.unwrap();
        assert!((max_height - 160.0 * 200.0 / 370.0).abs() < 1e-3);
    }

    #[test]
    fn growing_viewport_restores_neutral_and_clears_cap() {
        let (mut engine, viewport, target) = engine(200.0);
        engine.set_art(TextArt::from_rows(["#".repeat(40)])).unwrap();
        assert!(target.state.lock().max_height.is_some());

        viewport.set_width(2000.0);
        assert!(engine.on_viewport_change().unwrap().is_neutral());

        let state = target.state.lock();
        assert_eq!(state.transform, Some(ScaleTransform::identity()));
        assert_eq!(state.max_height, None);
    }

    #[test]
    fn empty_art_is_neutral() {
        let (mut engine, _, target) = engine(10.0);

        let factor = engine.set_art(TextArt::default()).unwrap();
        assert!(factor.is_neutral());
        assert_eq!(engine.bounding_box(), Some(ArtBoundingBox::default()));
        assert_eq!(target.state.lock().transform, Some(ScaleTransform::identity()));
    }

    #[test]
    fn apply_is_idempotent() {
        let (mut engine, _, target) = engine(1000.0);
        engine.set_art(scenario_art()).unwrap();

        let factor = ScaleFactor::new(0.5).unwrap();
        engine.apply(factor);
        let once = {
            let state = target.state.lock();
            (state.transform, state.max_height)
        };
        engine.apply(factor);
        let twice = {
            let state = target.state.lock();
            (state.transform, state.max_height)
        };

        assert_eq!(once, twice);
        assert_eq!(once.0, Some(ScaleTransform::scale(0.5, 0.5)));
        assert_eq!(once.1, Some(80.0));
    }

    #[test]
    fn apply_before_measure_does_nothing() {
        let (mut engine, _, target) = engine(1000.0);
        engine.apply(ScaleFactor::new(0.5).unwrap());
        assert_eq!(target.state.lock().calls, 0);
        assert_eq!(engine.state(), FitState::Unmeasured);
    }

    #[test]
    fn measurement_error_keeps_last_fit() {
        let viewport = Arc::new(SharedViewport::new(1000.0));
        let target = RecordingTarget::default();
        let metrics = ToggleMetrics::new(8.0, 16.0);
        let mut engine = FitEngine::new(
            FitConfig::default(),
            metrics.clone(),
            viewport.clone(),
            target.clone(),
        );

        engine.set_art(scenario_art()).unwrap();
        let before = engine.applied();

        *metrics.size.lock() = None;
        let err = engine.set_art(TextArt::from_rows(["tiny"]));
        assert!(err.is_err());
        assert_eq!(engine.applied(), before);
        assert_eq!(
            target.state.lock().transform,
            Some(ScaleTransform::scale(0.75, 0.75))
        );
        assert_eq!(engine.art().unwrap().rows(), ["tiny"]);
    }

    #[test]
    fn first_measurement_failure_stays_unmeasured() {
        let viewport = Arc::new(SharedViewport::new(1000.0));
        let metrics = ToggleMetrics::new(8.0, 16.0);
        *metrics.size.lock() = None;
        let mut engine = FitEngine::new(
            FitConfig::default(),
            metrics,
            viewport,
            RecordingTarget::default(),
        );

        assert!(engine.set_art(scenario_art()).is_err());
        assert_eq!(engine.state(), FitState::Unmeasured);
        assert_eq!(engine.on_viewport_change(), None);
    }

    #[test]
    fn resize_after_failed_first_art_stays_unmeasured() {
        let viewport = Arc::new(SharedViewport::new(1000.0));
        let target = RecordingTarget::default();
        let metrics = ToggleMetrics::new(8.0, 16.0);
        let mut engine = FitEngine::new(
            FitConfig::default(),
            metrics.clone(),
            viewport.clone(),
            target.clone(),
        );

        // A glyph size is stored but no art has been fitted.
        assert_eq!(engine.invalidate_metrics().unwrap(), None);
        *metrics.size.lock() = None;
        assert!(engine.set_art(scenario_art()).is_err());
        assert!(engine.art().is_some());
        assert!(engine.glyph_size().is_some());

        viewport.set_width(200.0);
        assert_eq!(engine.on_viewport_change(), None);
        assert_eq!(engine.state(), FitState::Unmeasured);
        assert_eq!(engine.applied(), None);
        assert_eq!(target.state.lock().calls, 0);
    }

    #[test]
    fn viewport_change_does_not_remeasure() {
        let viewport = Arc::new(SharedViewport::new(1000.0));
        let metrics = ToggleMetrics::new(8.0, 16.0);
        let mut engine = FitEngine::new(
            FitConfig::default(),
            metrics.clone(),
            viewport.clone(),
            RecordingTarget::default(),
        );

        engine.set_art(scenario_art()).unwrap();
        viewport.set_width(300.0);
        engine.on_viewport_change();
        engine.on_viewport_change();
        assert_eq!(*metrics.measured.lock(), 1);

        engine.invalidate_metrics().unwrap();
        assert_eq!(*metrics.measured.lock(), 2);
    }

    #[test]
    fn invalidate_metrics_uses_new_glyph() {
        let viewport = Arc::new(SharedViewport::new(1000.0));
        let metrics = ToggleMetrics::new(8.0, 16.0);
        let mut engine = FitEngine::new(
            FitConfig::default(),
            metrics.clone(),
            viewport,
            RecordingTarget::default(),
        );
        engine.set_art(scenario_art()).unwrap();

        *metrics.size.lock() = Some((4.0, 8.0));
        let factor = engine.invalidate_metrics().unwrap().unwrap();
        assert_eq!(
            engine.glyph_size(),
            Some(GlyphSize {
                width: 4.0,
                height: 8.0,
            })
        );
        assert_eq!(engine.bounding_box().unwrap().height, 80.0);
        assert!(factor.is_neutral());
    }

    #[test]
    fn invalidate_without_art_only_measures() {
        let (mut engine, _, target) = engine(1000.0);
        assert_eq!(engine.invalidate_metrics().unwrap(), None);
        assert!(engine.glyph_size().is_some());
        assert_eq!(target.state.lock().calls, 0);
    }
}
