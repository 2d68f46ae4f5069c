//! Exit code constants for the promptforge CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, unreadable files, bad observation templates)
//! - 2: Configuration error (credentials, model, provider availability)
//! - 3: Provider call failure (network, auth, rate limit, bad payload)
//! - 4: Extraction failure (expected tags missing from a model response)
//! - 5: Substitution failure (unresolved template placeholders)
//! - 6: Harness failure (format violations, unmet requirements, limits)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, unreadable input, invalid state.
pub const USER_ERROR: i32 = 1;

/// Configuration error: missing credentials, unknown or unavailable provider.
pub const CONFIG_ERROR: i32 = 2;

/// The LLM provider call failed.
pub const PROVIDER_FAILURE: i32 = 3;

/// A model response did not contain the tags the pipeline depends on.
pub const EXTRACTION_FAILURE: i32 = 4;

/// A template still contained placeholders after filling.
pub const SUBSTITUTION_FAILURE: i32 = 5;

/// A multi-turn harness run failed.
pub const HARNESS_FAILURE: i32 = 6;
