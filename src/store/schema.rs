use serde::{Deserialize, Serialize};

/// A persisted snapshot of a question, its solution and the tags the
/// student attached when saving it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProblem {
    pub id: String,
    pub title: String,
    pub question_text: String,
    pub solution_html: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
}

pub const TITLE_CHARS: usize = 30;
pub const UNTITLED: &str = "新题目";

impl SavedProblem {
    pub fn new(question_text: &str, solution_html: &str, tags: Vec<String>, now_ms: i64) -> Self {
        let title_source = if question_text.is_empty() {
            UNTITLED
        } else {
            question_text
        };
        Self {
            id: now_ms.to_string(),
            title: title_source.chars().take(TITLE_CHARS).collect(),
            question_text: question_text.to_string(),
            solution_html: solution_html.to_string(),
            tags,
            is_favorite: false,
            timestamp: now_ms,
        }
    }
}

pub fn encode_library(problems: &[SavedProblem]) -> serde_json::Result<String> {
    serde_json::to_string(problems)
}

pub fn decode_library(raw: &str) -> serde_json::Result<Vec<SavedProblem>> {
    serde_json::from_str(raw)
}
