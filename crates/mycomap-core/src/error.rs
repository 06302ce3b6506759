//! Error taxonomy for a load cycle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Terminal failure of a load cycle. Each variant maps to exactly one
/// user-visible message.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("source unavailable ({location}): {reason}")]
    SourceUnavailable { location: String, reason: String },

    #[error("no usable records: {rows} data rows, none with valid coordinates")]
    NoUsableRecords { rows: usize },

    #[error("transform failure: {0}")]
    TransformFailure(String),

    #[error("map session is not active")]
    SessionInactive,
}

impl LoadError {
    pub fn source_unavailable(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Message shown to the user in place of the map.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::SourceUnavailable { .. } => {
                "Error loading map data. Please check that the data file is available."
            }
            Self::NoUsableRecords { .. } => "No valid coordinate data found in the data file.",
            Self::TransformFailure(_) => "Error processing map data.",
            Self::SessionInactive => "The map session has been closed.",
        }
    }

    /// `NoUsableRecords` is reported but does not indicate a broken load.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NoUsableRecords { .. })
    }
}

/// Why one side (plant or fungus) of a row produced no entity. Recovered
/// inside the parser and only surfaced as counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RowRejection {
    #[error("coordinate missing or blank")]
    MissingCoordinate,
    #[error("coordinate is the missing-value sentinel")]
    Sentinel,
    #[error("coordinate is not a finite number")]
    Unparseable,
}

/// Per-side rejection counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionTally {
    pub missing: usize,
    pub sentinel: usize,
    pub unparseable: usize,
}

impl RejectionTally {
    pub fn record(&mut self, rejection: RowRejection) {
        match rejection {
            RowRejection::MissingCoordinate => self.missing += 1,
            RowRejection::Sentinel => self.sentinel += 1,
            RowRejection::Unparseable => self.unparseable += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.missing + self.sentinel + self.unparseable
    }
}
