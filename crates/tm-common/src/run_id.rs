//! Identifiers for match runs.
//!
//! Every matching run gets its own ULID so log lines, API responses and the
//! CLI output of one run can be correlated. ULIDs sort by creation time.

use once_cell::sync::Lazy;
use ulid::Ulid;

static INSTANCE_ID: Lazy<String> = Lazy::new(|| Ulid::new().to_string());

/// ID of the current process, fixed for its lifetime.
///
/// Logged once at startup by the binaries.
pub fn instance() -> &'static str {
    &INSTANCE_ID
}

/// Fresh ULID for a single match run.
pub fn generate() -> String {
    Ulid::new().to_string()
}
