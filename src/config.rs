//! Driver configuration (C11).

use serde::{Deserialize, Serialize};

/// Runtime policy knobs for [`crate::Driver`].
///
/// Carried as a serializable type so a host can persist it alongside its
/// own settings rather than needing a separate format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// When `true` (the default), a tied note does not re-initialize the
    /// vibrato LFO — the LFO continues uninterrupted through the tie.
    /// When `false`, every note (tied or not) restarts the LFO from its
    /// base parameters. Corresponds to the source's build-time
    /// `KEEP_VIBRATO_TIE` policy, exposed here as a runtime option.
    pub keep_vibrato_tie: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            keep_vibrato_tie: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keeps_vibrato_through_ties() {
        assert!(DriverConfig::default().keep_vibrato_tie);
    }
}
