//! Process exit codes.

/// Success, or no hook matched the event
pub const EXIT_SUCCESS: i32 = 0;

/// A `stop` hook failed, timed out, or was rejected; a pre-flight check
/// failed; or an operational error occurred
pub const EXIT_FAILURE: i32 = 1;

/// The manifest is missing or failed schema validation
pub const EXIT_MANIFEST_INVALID: i32 = 2;

/// An operator interrupt cancelled the run
pub const EXIT_INTERRUPTED: i32 = 130;
