//! Requests to the hosted AI service.
//!
//! Every operation is one outbound request with no retry or backoff. Failures
//! keep their cause in [`AiError`] for logging; the student only ever sees the
//! fixed per-operation message from [`Operation::failure_message`].

pub mod codec;
#[cfg(feature = "network")]
pub mod gemini;
pub mod prompts;
pub mod worker;

use rust_i18n::t;
use thiserror::Error;

use crate::store::schema::SavedProblem;

#[derive(Debug, Error)]
pub enum AiError {
    #[cfg(feature = "network")]
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response contained no usable content")]
    EmptyResponse,
    #[error("no API key configured")]
    MissingApiKey,
    #[error("built without network support")]
    Offline,
    #[error("audio payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("audio payload decoded to no samples")]
    EmptyAudio,
}

/// The user-visible operations, used to pick a display message for a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Recognize,
    Solve,
    Drills,
    Speech,
    Analysis,
}

impl Operation {
    pub fn failure_message(self) -> String {
        match self {
            Operation::Recognize => t!("error.recognize").to_string(),
            Operation::Solve => t!("error.solve").to_string(),
            Operation::Drills => t!("error.drills").to_string(),
            Operation::Speech => t!("error.speech").to_string(),
            Operation::Analysis => t!("error.analysis").to_string(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Recognize => "recognize",
            Operation::Solve => "solve",
            Operation::Drills => "drills",
            Operation::Speech => "speech",
            Operation::Analysis => "analysis",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePart {
    pub mime_type: String,
    /// Base64 of the raw file bytes.
    pub data: String,
}

/// What the student submitted for recognition: a photo, typed text, or both.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProblemInput {
    pub image: Option<ImagePart>,
    pub text: String,
}

pub trait AiService: Send + Sync {
    /// Restate the submitted problem as clean text.
    fn verify(&self, input: &ProblemInput) -> Result<String, AiError>;
    /// Step-by-step solution markup.
    fn solve(&self, problem: &str) -> Result<String, AiError>;
    /// Variant practice problems derived from a solved problem.
    fn generate_drills(&self, problem: &str, solution: &str) -> Result<String, AiError>;
    /// Narration of `text`, returned as base64 of raw 16-bit PCM.
    fn synthesize_speech(&self, text: &str) -> Result<String, AiError>;
    /// Learning-analysis report markup over the saved problems.
    fn analyze_library(&self, problems: &[SavedProblem]) -> Result<String, AiError>;
}

/// Stand-in used when the crate is built without the `network` feature.
pub struct OfflineService;

impl AiService for OfflineService {
    fn verify(&self, _input: &ProblemInput) -> Result<String, AiError> {
        Err(AiError::Offline)
    }

    fn solve(&self, _problem: &str) -> Result<String, AiError> {
        Err(AiError::Offline)
    }

    fn generate_drills(&self, _problem: &str, _solution: &str) -> Result<String, AiError> {
        Err(AiError::Offline)
    }

    fn synthesize_speech(&self, _text: &str) -> Result<String, AiError> {
        Err(AiError::Offline)
    }

    fn analyze_library(&self, _problems: &[SavedProblem]) -> Result<String, AiError> {
        Err(AiError::Offline)
    }
}
