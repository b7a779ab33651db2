//! # Noren
//!
//! Keeps a block of monospace text art, such as a figlet banner, inside a
//! bounded box.
//!
//! ## Overview
//!
//! A [`FitEngine`] measures one fixed-pitch glyph, derives the footprint of the
//! art from it, and picks a single scale factor so the art stays below a
//! maximum height and within the viewport width. The factor is applied to a
//! [`RenderTarget`] as a uniform transform. The pass runs again whenever the
//! art is replaced or the viewport changes.
//!
//! [`Banner`] owns an engine together with its event sources: it subscribes to
//! viewport resizes, loads the art through an [`ArtProvider`] and releases
//! everything on teardown.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use noren::{
//!     FitConfig, FitEngine, FontStorage, RasterTarget, TextArt,
//!     glyph_metrics::FontGlyphMetrics, viewport::SharedViewport,
//! };
//!
//! let mut storage = FontStorage::new();
//! storage.load_system_fonts();
//! let metrics = FontGlyphMetrics::monospace(&mut storage, 16.0).unwrap();
//!
//! let viewport = Arc::new(SharedViewport::new(1280.0));
//! let target = RasterTarget::new();
//! let mut engine = FitEngine::new(FitConfig::default(), metrics, viewport.clone(), target.clone());
//!
//! let factor = engine.set_art(TextArt::parse(" _ __   ___  _ __ ___ _ __\n| '_ \\ / _ \\| '__/ _ \\ '_ \\")).unwrap();
//! println!("fitted at {}", factor.get());
//!
//! viewport.set_width(640.0);
//! engine.on_viewport_change();
//! ```
//!
//! ## Features
//!
//! *   **Uniform scaling**: one factor for both axes, never above 1.
//! *   **Pluggable measurement**: `fontdue` fonts, fixed cell sizes, or a
//!     probe inserted into any host surface.
//! *   **Safe reloads**: stale and post-teardown art loads are discarded.
//! *   **CPU output**: [`RasterTarget`] rasterizes the fitted art.

pub mod art;
pub mod banner;
pub mod engine;
pub mod fit;
pub mod font_storage;
pub mod glyph_metrics;
pub mod loader;
pub mod raster;
pub mod viewport;

// common re-exports
pub use art::TextArt;
pub use banner::Banner;
pub use engine::{FitConfig, FitEngine, RenderTarget};
pub use fit::{ArtBoundingBox, FitConstraints, ScaleFactor, compute_scale};
pub use font_storage::FontStorage;
pub use glyph_metrics::{GlyphMetrics, GlyphSize, MeasurementError};
pub use loader::{ArtProvider, FetchError, LoadTicket};
pub use raster::RasterTarget;

// re-export dependencies
pub use euclid;
pub use fontdb;
pub use fontdue;
pub use parking_lot;
