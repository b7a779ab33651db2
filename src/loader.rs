//! Delivery of art payloads fetched outside the engine.

use std::{fmt, sync::Weak};

use crate::{art::TextArt, banner::Shared, fit::ScaleFactor, glyph_metrics::MeasurementError};

/// Art retrieval failed. The previous art stays on screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchError {
    pub message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "art fetch failed: {}", self.message)
    }
}

impl std::error::Error for FetchError {}

/// Source of raw art text, e.g. an HTTP endpoint rendering a figlet banner.
///
/// Implementations start the fetch and hand the result to
/// [`LoadTicket::deliver`], on any thread and at any later time.
pub trait ArtProvider: Send + Sync {
    fn fetch_art(&self, query: &str, ticket: LoadTicket);
}

/// What happened to a delivered payload.
#[derive(Clone, Debug, PartialEq)]
pub enum DeliveryOutcome {
    /// The art replaced the current one and was fitted.
    Applied(ScaleFactor),
    /// The art replaced the current one but the glyph could not be measured.
    MeasurementFailed(MeasurementError),
    /// The fetch failed; nothing changed.
    FetchFailed,
    /// A newer load was started after this one; the payload was dropped.
    Stale,
    /// The banner was torn down; the payload was dropped.
    TornDown,
}

/// Handle for one outstanding load.
///
/// Holds only a weak reference, so a ticket outliving its banner can never
/// reach the engine.
pub struct LoadTicket {
    pub(crate) shared: Weak<Shared>,
    pub(crate) generation: u64,
}

impl LoadTicket {
    /// Sequence number of the load; higher is newer.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Hands the fetch result to the engine.
    pub fn deliver(self, result: Result<String, FetchError>) -> DeliveryOutcome {
        let Some(shared) = self.shared.upgrade().filter(|shared| shared.is_alive()) else {
            log::debug!("Art load {} finished after teardown.", self.generation);
            return DeliveryOutcome::TornDown;
        };

        match result {
            Ok(raw) => shared.deliver_art(self.generation, TextArt::parse(&raw)),
            Err(e) => {
                log::warn!("{}, keeping previous art.", e);
                DeliveryOutcome::FetchFailed
            }
        }
    }
}
