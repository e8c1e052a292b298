use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::prompts;
use crate::ai::{AiError, AiService, ProblemInput};
use crate::config::Config;
use crate::markup;
use crate::store::schema::SavedProblem;

/// Client for the Generative Language `generateContent` endpoint.
pub struct GeminiClient {
    http: Client,
    api_base: String,
    api_key: String,
    text_model: String,
    speech_model: String,
    voice: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }
}

fn user_content(parts: Vec<Part>) -> Content {
    Content {
        role: Some("user".to_string()),
        parts,
    }
}

fn text_request(parts: Vec<Part>) -> GenerateRequest {
    GenerateRequest {
        contents: vec![user_content(parts)],
        system_instruction: Some(Content {
            role: None,
            parts: vec![Part::text(prompts::TUTOR_SYSTEM)],
        }),
        generation_config: None,
    }
}

fn speech_request(text: &str, voice: &str) -> GenerateRequest {
    GenerateRequest {
        contents: vec![user_content(vec![Part::text(prompts::speech_prompt(text))])],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_modalities: vec!["AUDIO".to_string()],
            speech_config: Some(SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: voice.to_string(),
                    },
                },
            }),
        }),
    }
}

fn first_parts(response: &GenerateResponse) -> &[Part] {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|c| c.parts.as_slice())
        .unwrap_or(&[])
}

fn extract_text(response: &GenerateResponse) -> Result<String, AiError> {
    let joined: String = first_parts(response)
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();
    let text = strip_code_fence(&joined);
    if text.is_empty() {
        return Err(AiError::EmptyResponse);
    }
    Ok(text.to_string())
}

fn extract_audio(response: &GenerateResponse) -> Result<String, AiError> {
    first_parts(response)
        .iter()
        .find_map(|p| p.inline_data.as_ref())
        .map(|d| d.data.clone())
        .filter(|d| !d.is_empty())
        .ok_or(AiError::EmptyResponse)
}

/// Models sometimes wrap markup in a ```html fence despite being told not to.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

impl GeminiClient {
    pub fn from_config(config: &Config) -> Result<Self, AiError> {
        let api_key = config.resolved_api_key().ok_or(AiError::MissingApiKey)?;
        let http = Client::builder()
            .timeout(None::<std::time::Duration>)
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            text_model: config.text_model.clone(),
            speech_model: config.speech_model.clone(),
            voice: config.voice.clone(),
        })
    }

    fn generate(&self, model: &str, request: &GenerateRequest) -> Result<GenerateResponse, AiError> {
        let url = format!("{}/models/{model}:generateContent", self.api_base);
        debug!(model, "sending generateContent request");
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json()?)
    }

    fn generate_text(&self, parts: Vec<Part>) -> Result<String, AiError> {
        let response = self.generate(&self.text_model, &text_request(parts))?;
        extract_text(&response)
    }
}

impl AiService for GeminiClient {
    fn verify(&self, input: &ProblemInput) -> Result<String, AiError> {
        let mut parts = Vec::new();
        if let Some(image) = &input.image {
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                }),
            });
        }
        parts.push(Part::text(prompts::verify_prompt(&input.text)));
        self.generate_text(parts)
    }

    fn solve(&self, problem: &str) -> Result<String, AiError> {
        self.generate_text(vec![Part::text(prompts::solve_prompt(problem))])
    }

    fn generate_drills(&self, problem: &str, solution: &str) -> Result<String, AiError> {
        self.generate_text(vec![Part::text(prompts::drills_prompt(problem, solution))])
    }

    fn synthesize_speech(&self, text: &str) -> Result<String, AiError> {
        let narration = markup::to_plain_text(text);
        let response = self.generate(&self.speech_model, &speech_request(&narration, &self.voice))?;
        extract_audio(&response)
    }

    fn analyze_library(&self, problems: &[SavedProblem]) -> Result<String, AiError> {
        self.generate_text(vec![Part::text(prompts::analysis_prompt(problems))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn text_parts_are_joined() {
        let response = parse(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"<p>a"},{"text":"b</p>"}]}}]}"#,
        );
        assert_eq!(extract_text(&response).unwrap(), "<p>ab</p>");
    }

    #[test]
    fn missing_candidates_is_empty_response() {
        assert!(matches!(extract_text(&parse("{}")), Err(AiError::EmptyResponse)));
        assert!(matches!(
            extract_audio(&parse(r#"{"candidates":[{}]}"#)),
            Err(AiError::EmptyResponse)
        ));
    }

    #[test]
    fn audio_comes_from_inline_data() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"audio/L16;rate=24000","data":"AAAA"}}]}}]}"#,
        );
        assert_eq!(extract_audio(&response).unwrap(), "AAAA");
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fence("```html\n<p>x</p>\n```"), "<p>x</p>");
        assert_eq!(strip_code_fence("  <p>x</p> "), "<p>x</p>");
        assert_eq!(strip_code_fence("```\nplain\n```"), "plain");
    }

    #[test]
    fn speech_request_asks_for_audio() {
        let json = serde_json::to_value(speech_request("hi", "Kore")).unwrap();
        assert_eq!(json["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            json["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn text_request_carries_system_instruction() {
        let json = serde_json::to_value(text_request(vec![Part::text("q")])).unwrap();
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "q");
        assert!(json["systemInstruction"]["parts"][0]["text"].is_string());
        assert!(json.get("generationConfig").is_none());
    }
}
