//! Error types for promptforge.
//!
//! Uses thiserror for derive macros. Each variant names the specific element
//! that was missing or invalid so the CLI can report it verbatim.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for promptforge operations.
#[derive(Error, Debug)]
pub enum ForgeError {
    /// User provided invalid arguments or input files.
    #[error("{0}")]
    UserError(String),

    /// Required configuration (credentials, model name) is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The requested provider is not compiled into this build.
    #[error("provider '{0}' is not available in this build")]
    ProviderUnavailable(String),

    /// A raw client was supplied but its provider could not be determined.
    #[error("cannot determine provider for supplied client: {0}")]
    ProviderMismatch(String),

    /// The provider call failed (transport, HTTP status, or payload shape).
    #[error("provider request failed: {0}")]
    Provider(String),

    /// A model response lacked the tags the pipeline extracts from.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Placeholders remained in a template after substitution.
    #[error("Some variables were not replaced in the prompt: {}", .missing.join(", "))]
    Substitution {
        /// Unresolved placeholder names, sorted.
        missing: Vec<String>,
    },

    /// The model repeatedly violated the tool-call output format.
    #[error("Repeated format violation on turn {turn}: {message}")]
    Protocol {
        /// Turn on which the retry budget ran out.
        turn: u32,
        /// The last violation observed.
        message: String,
    },

    /// The conversation finished but a configured requirement was not met.
    #[error("requirement not met: {0}")]
    Requirement(String),

    /// The finish tool was never called.
    #[error("Finish tool '{finish_tool}' was not called within {max_turns} turns.")]
    TurnLimit { finish_tool: String, max_turns: u32 },

    /// The overall harness deadline elapsed.
    #[error("harness deadline of {seconds}s exceeded before turn {turn}")]
    Deadline { seconds: u64, turn: u32 },
}

impl ForgeError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ForgeError::UserError(_) => exit_codes::USER_ERROR,
            ForgeError::Config(_)
            | ForgeError::ProviderUnavailable(_)
            | ForgeError::ProviderMismatch(_) => exit_codes::CONFIG_ERROR,
            ForgeError::Provider(_) => exit_codes::PROVIDER_FAILURE,
            ForgeError::Extraction(_) => exit_codes::EXTRACTION_FAILURE,
            ForgeError::Substitution { .. } => exit_codes::SUBSTITUTION_FAILURE,
            ForgeError::Protocol { .. }
            | ForgeError::Requirement(_)
            | ForgeError::TurnLimit { .. }
            | ForgeError::Deadline { .. } => exit_codes::HARNESS_FAILURE,
        }
    }
}

/// Result type alias for promptforge operations.
pub type Result<T> = std::result::Result<T, ForgeError>;
