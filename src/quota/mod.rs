//! Rolling quota-window tracking.
//!
//! The external agent enforces a hard usage quota that resets on a fixed
//! window. This module keeps the local ledger: how many tokens the current
//! window has consumed, whether a prospective session fits, and when the
//! window reopens.
//!
//! The window clock opens lazily on the first non-zero consumption report
//! and rolls forward forever; an expired window archives its session list
//! and reopens with zero usage.

mod tracker;
mod window;

pub use tracker::{Admission, QuotaStatus, QuotaTracker};
pub use window::{ArchivedWindow, DeferredSession, PlanTier, QuotaWindow, SessionUsage};

/// Fixed quota window duration.
pub const WINDOW_DURATION_HOURS: i64 = 5;

/// Usage percentage bands. Each band fires its notification exactly once
/// per window, tracked by a last-acknowledged watermark.
pub const USAGE_BANDS: [u8; 6] = [10, 25, 50, 75, 90, 95];

/// Retry margin added past the reset instant when deferring a session.
pub const DEFER_RETRY_MINS: i64 = 1;

/// Number of archived windows retained in the record.
pub const ARCHIVE_KEEP: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_are_strictly_increasing() {
        for pair in USAGE_BANDS.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
