//! Google Generative AI (Gemini) API provider

use crate::{
    error::{Error, Result},
    stream::{ReplyEvent, ReplyStream},
    types::{Completion, Content, Context, Model, Role, StopReason, Turn, Usage},
};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

/// Environment variables consulted for the API key, in order
pub const API_KEY_ENV_VARS: &[&str] = &["GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// Google Generative AI client
pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
}

impl GoogleProvider {
    /// Create a new Google provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = super::get_api_key(None, API_KEY_ENV_VARS)?;
        Ok(Self::new(api_key))
    }

    /// List models that support generateContent
    pub async fn list_models(&self) -> Result<Vec<GoogleModelInfo>> {
        let url = format!(
            "{}/models?key={}",
            crate::models::DEFAULT_BASE_URL,
            self.api_key
        );

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_response(status.as_u16(), &text));
        }

        let list: GoogleModelList = response.json().await?;

        let chat_models: Vec<_> = list
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .collect();

        Ok(chat_models)
    }

    /// Stream a reply from Gemini
    pub async fn stream_reply(&self, model: &Model, context: &Context) -> Result<ReplyStream> {
        let request = build_request(model, context);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            model.base_url, model.id, self.api_key
        );

        let request_builder = self.client.post(&url).json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("failed to create event source: {}", e)))?;

        tracing::debug!(model = %model.id, turns = context.turns.len(), "starting streamed call");
        Ok(Box::pin(create_stream(event_source)))
    }

    /// Retrieve a complete reply in one call
    pub async fn generate_reply(&self, model: &Model, context: &Context) -> Result<Completion> {
        let request = build_request(model, context);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            model.base_url, model.id, self.api_key
        );

        tracing::debug!(model = %model.id, turns = context.turns.len(), "starting one-shot call");
        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(error_from_response(status.as_u16(), &text));
        }

        let body: GeminiResponse = response.json().await?;
        completion_from_response(body)
    }
}

#[async_trait]
impl super::ModelProvider for GoogleProvider {
    async fn stream(&self, model: &Model, context: &Context) -> Result<ReplyStream> {
        self.stream_reply(model, context).await
    }

    async fn generate(&self, model: &Model, context: &Context) -> Result<Completion> {
        self.generate_reply(model, context).await
    }
}

/// Map an HTTP error response to a typed error
fn error_from_response(status_code: u16, body: &str) -> Error {
    match serde_json::from_str::<GeminiErrorResponse>(body) {
        Ok(parsed) if status_code == 404 => Error::ModelNotFound(parsed.error.message),
        Ok(parsed) => Error::api(parsed.error.status, parsed.error.message),
        Err(_) => Error::api(status_code.to_string(), body.to_string()),
    }
}

fn build_request(model: &Model, context: &Context) -> GeminiRequest {
    let contents = context.turns.iter().filter_map(convert_turn).collect();

    let system_instruction = context
        .system_instruction
        .as_ref()
        .map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text { text: text.clone() }],
        });

    GeminiRequest {
        contents,
        system_instruction,
        generation_config: Some(GeminiGenerationConfig {
            max_output_tokens: Some(model.max_tokens),
        }),
    }
}

/// Map internal roles and content to the wire vocabulary.
/// Assistant turns travel under Gemini's "model" role.
fn convert_turn(turn: &Turn) -> Option<GeminiContent> {
    let parts: Vec<GeminiPart> = turn
        .content
        .iter()
        .map(|c| match c {
            Content::Text { text } => GeminiPart::Text { text: text.clone() },
            Content::Image { data, mime_type } => GeminiPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                },
            },
        })
        .collect();

    if parts.is_empty() {
        return None;
    }

    let role = match turn.role {
        Role::User => "user",
        Role::Assistant => "model",
    };

    Some(GeminiContent {
        role: Some(role.to_string()),
        parts,
    })
}

fn map_finish_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("MAX_TOKENS") => StopReason::Length,
        Some("SAFETY") | Some("RECITATION") | Some("PROHIBITED_CONTENT") => StopReason::Safety,
        _ => StopReason::Stop,
    }
}

fn completion_from_response(response: GeminiResponse) -> Result<Completion> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| Error::UnexpectedResponse("response contained no candidates".into()))?;

    let text: String = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    Ok(Completion {
        turn: Turn::assistant(text),
        usage: response.usage_metadata.map(Usage::from).unwrap_or_default(),
        stop_reason: map_finish_reason(candidate.finish_reason.as_deref()),
    })
}

fn create_stream(mut event_source: EventSource) -> impl futures::Stream<Item = ReplyEvent> {
    stream! {
        let mut accumulated_text = String::new();
        let mut finish_reason: Option<String> = None;
        let mut usage = Usage::default();

        yield ReplyEvent::Start;

        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    if msg.data.is_empty() || msg.data == "[DONE]" {
                        continue;
                    }

                    match serde_json::from_str::<GeminiResponse>(&msg.data) {
                        Ok(response) => {
                            for candidate in &response.candidates {
                                if let Some(ref content) = candidate.content {
                                    for part in &content.parts {
                                        if let Some(ref text) = part.text {
                                            accumulated_text.push_str(text);
                                            yield ReplyEvent::TextDelta { delta: text.clone() };
                                        }
                                    }
                                }
                                if let Some(ref reason) = candidate.finish_reason {
                                    finish_reason = Some(reason.clone());
                                }
                            }
                            if let Some(meta) = response.usage_metadata {
                                usage = Usage::from(meta);
                            }
                        }
                        Err(e) => {
                            // Mid-stream error chunks arrive as error JSON
                            if let Ok(error_response) =
                                serde_json::from_str::<GeminiErrorResponse>(&msg.data)
                            {
                                yield ReplyEvent::Error {
                                    message: error_response.error.message,
                                };
                                return;
                            }
                            yield ReplyEvent::Error {
                                message: format!("failed to parse chunk: {}", e),
                            };
                            return;
                        }
                    }
                }
                // Server closed the connection: the reply is complete
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(code, response)) => {
                    let body = response.text().await.unwrap_or_default();
                    let detail = serde_json::from_str::<GeminiErrorResponse>(&body)
                        .map(|r| r.error.message)
                        .unwrap_or(body);
                    yield ReplyEvent::Error {
                        message: format!("HTTP {}: {}", code.as_u16(), detail),
                    };
                    return;
                }
                Err(e) => {
                    yield ReplyEvent::Error {
                        message: format!("SSE error: {}", e),
                    };
                    return;
                }
            }
        }

        yield ReplyEvent::Done {
            completion: Completion {
                turn: Turn::assistant(accumulated_text),
                usage,
                stop_reason: map_finish_reason(finish_reason.as_deref()),
            },
        };
    }
}

// Request types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

// Response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

impl From<GeminiUsageMetadata> for Usage {
    fn from(meta: GeminiUsageMetadata) -> Self {
        Usage {
            input: meta.prompt_token_count.unwrap_or(0),
            output: meta.candidates_token_count.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    #[serde(default)]
    status: String,
}

// Model listing types

/// Model info returned from the models endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleModelInfo {
    /// Model name (e.g., "models/gemini-1.5-flash")
    pub name: String,
    /// Display name
    pub display_name: String,
    /// Supported generation methods
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
    /// Input token limit
    #[serde(default)]
    pub input_token_limit: Option<u32>,
    /// Output token limit
    #[serde(default)]
    pub output_token_limit: Option<u32>,
}

impl GoogleModelInfo {
    /// Get the model ID (without "models/" prefix)
    pub fn id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleModelList {
    models: Vec<GoogleModelInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resolve_model;

    fn sample_context() -> Context {
        let mut ctx = Context::with_system("You are a scheduling assistant.");
        ctx.push(Turn::user("Monday 10:00 standup"));
        ctx.push(Turn::assistant("Noted. Anything else?"));
        ctx.push(Turn::user("Monday 10:30 review"));
        ctx
    }

    #[test]
    fn test_request_maps_roles_to_wire_vocabulary() {
        let model = resolve_model("gemini-1.5-flash");
        let request = build_request(&model, &sample_context());

        let roles: Vec<Option<&str>> = request
            .contents
            .iter()
            .map(|c| c.role.as_deref())
            .collect();
        assert_eq!(roles, vec![Some("user"), Some("model"), Some("user")]);
    }

    #[test]
    fn test_request_carries_system_instruction_separately() {
        let model = resolve_model("gemini-1.5-flash");
        let request = build_request(&model, &sample_context());

        let system = request.system_instruction.expect("system instruction");
        assert!(system.role.is_none());
        assert_eq!(request.contents.len(), 3);
    }

    #[test]
    fn test_request_serializes_inline_image() {
        let model = resolve_model("gemini-1.5-flash");
        let mut ctx = Context::default();
        ctx.push(Turn::user_with_content(vec![
            Content::text("check this calendar"),
            Content::image("aGVsbG8=", "image/png"),
        ]));

        let value = serde_json::to_value(build_request(&model, &ctx)).unwrap();
        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "check this calendar");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "aGVsbG8=");
    }

    #[test]
    fn test_request_skips_empty_turns() {
        let model = resolve_model("gemini-1.5-flash");
        let mut ctx = Context::default();
        ctx.push(Turn::user_with_content(vec![]));
        ctx.push(Turn::user("hello"));

        let request = build_request(&model, &ctx);
        assert_eq!(request.contents.len(), 1);
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(map_finish_reason(Some("STOP")), StopReason::Stop);
        assert_eq!(map_finish_reason(Some("MAX_TOKENS")), StopReason::Length);
        assert_eq!(map_finish_reason(Some("SAFETY")), StopReason::Safety);
        assert_eq!(map_finish_reason(None), StopReason::Stop);
    }

    #[test]
    fn test_completion_from_response_joins_parts() {
        let body = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Mon "}, {"text": "10:00"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 2}
        }"#;
        let response: GeminiResponse = serde_json::from_str(body).unwrap();
        let completion = completion_from_response(response).unwrap();
        assert_eq!(completion.turn.text(), "Mon 10:00");
        assert_eq!(completion.usage, Usage { input: 7, output: 2 });
    }

    #[test]
    fn test_error_from_response_classifies_404_as_model_not_found() {
        let body = r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#;
        let err = error_from_response(404, body);
        assert!(matches!(err, Error::ModelNotFound(_)));
        assert!(err.is_model_unavailable());
    }

    #[test]
    fn test_error_from_response_preserves_api_status() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}}"#;
        let err = error_from_response(400, body);
        assert!(err.is_auth());
    }

    #[test]
    fn test_model_info_id_strips_prefix() {
        let info = GoogleModelInfo {
            name: "models/gemini-1.5-flash".into(),
            display_name: "Gemini 1.5 Flash".into(),
            supported_generation_methods: vec!["generateContent".into()],
            input_token_limit: None,
            output_token_limit: None,
        };
        assert_eq!(info.id(), "gemini-1.5-flash");
    }
}
