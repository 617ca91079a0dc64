//! Constants for the Gemini wire format
//!
//! Roles, finish reasons, and safety settings used when building
//! `generateContent` requests and reading their responses.

/// Content role constants
pub mod role {
    /// User role identifier
    pub const USER: &str = "user";
}

/// Candidate finish reason constants
pub mod finish {
    /// Natural stop
    pub const STOP: &str = "STOP";

    /// Output token limit reached
    pub const MAX_TOKENS: &str = "MAX_TOKENS";

    /// Candidate withheld by safety filters
    pub const SAFETY: &str = "SAFETY";

    /// Candidate withheld for recitation
    pub const RECITATION: &str = "RECITATION";
}

/// Harm categories the gateway configures thresholds for
pub mod harm {
    pub const HARASSMENT: &str = "HARM_CATEGORY_HARASSMENT";
    pub const HATE_SPEECH: &str = "HARM_CATEGORY_HATE_SPEECH";
    pub const SEXUALLY_EXPLICIT: &str = "HARM_CATEGORY_SEXUALLY_EXPLICIT";
    pub const DANGEROUS_CONTENT: &str = "HARM_CATEGORY_DANGEROUS_CONTENT";

    /// Every category above, in request order
    pub const ALL: [&str; 4] = [HARASSMENT, HATE_SPEECH, SEXUALLY_EXPLICIT, DANGEROUS_CONTENT];

    /// Threshold applied to every category
    pub const BLOCK_MEDIUM_AND_ABOVE: &str = "BLOCK_MEDIUM_AND_ABOVE";
}

/// Header carrying the Gemini API key
pub const API_KEY_HEADER: &str = "x-goog-api-key";
