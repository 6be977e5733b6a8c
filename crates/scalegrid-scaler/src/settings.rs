//! Scaler settings.

use serde::{Deserialize, Serialize};
use tracing::warn;

use scalegrid_executor::Timeouts;

/// Ceiling applied when the configured maximum scale is unusable.
pub const DEFAULT_MAX_SCALE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalerSettings {
    /// Largest quantity a single request may ask for. Signed so that a
    /// misconfigured value can be detected rather than rejected at parse
    /// time.
    pub max_scale: i64,
    pub timeouts: Timeouts,
}

impl Default for ScalerSettings {
    fn default() -> Self {
        Self {
            max_scale: i64::from(DEFAULT_MAX_SCALE),
            timeouts: Timeouts::default(),
        }
    }
}

impl ScalerSettings {
    /// The effective quantity ceiling.
    ///
    /// A configured value below 1 falls back to [`DEFAULT_MAX_SCALE`] with a
    /// warning; it never fails the request on its own.
    pub fn max_scale_ceiling(&self) -> u32 {
        if self.max_scale < 1 {
            warn!(
                configured = self.max_scale,
                fallback = DEFAULT_MAX_SCALE,
                "invalid maximum scale configured, using default"
            );
            return DEFAULT_MAX_SCALE;
        }
        u32::try_from(self.max_scale).unwrap_or(u32::MAX)
    }
}
