//! Recording-time offset handling
//!
//! Stored timestamps may be obfuscated by subtracting them from a per-recording offset and
//! storing the negated result. Obfuscated values are therefore negative; non-negative stored
//! values are already absolute uutc.

/// Marker for "no timestamp recorded"
pub const UUTC_NO_ENTRY: i64 = i64::MIN;

/// Offset used to de-obfuscate stored timestamps into absolute uutc
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordingTimeOffset(i64);

impl RecordingTimeOffset {
    pub fn new(offset: i64) -> Self {
        Self(offset)
    }

    /// An offset that leaves every timestamp unchanged
    pub fn none() -> Self {
        Self(0)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Convert a stored timestamp into absolute time
    pub fn remove(&self, stored: i64) -> i64 {
        if stored == UUTC_NO_ENTRY || stored >= 0 {
            stored
        } else {
            self.0 - stored
        }
    }

    /// Convert an absolute timestamp into its stored (obfuscated) form
    pub fn apply(&self, absolute: i64) -> i64 {
        if absolute == UUTC_NO_ENTRY || self.0 == 0 {
            absolute
        } else {
            -(absolute - self.0)
        }
    }
}
