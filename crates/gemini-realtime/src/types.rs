//! Wire types for the Gemini Live `BidiGenerateContent` protocol.
//!
//! Every frame on the socket is a JSON envelope. Outbound envelopes are
//! externally tagged (`{"setup": {...}}`, `{"realtimeInput": {...}}`), inbound
//! envelopes carry at most one populated top-level field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mime type of outbound microphone audio: 16 kHz, mono, 16-bit PCM.
pub const INPUT_AUDIO_MIME: &str = "audio/pcm;rate=16000";
/// Mime type of outbound camera frames.
pub const VIDEO_FRAME_MIME: &str = "image/jpeg";
/// Prefix matched against inbound inline data to recognise playable audio.
pub const OUTPUT_AUDIO_MIME_PREFIX: &str = "audio/pcm";
/// Sample rate assumed for inbound audio whose mime type carries no `rate=`.
pub const DEFAULT_OUTPUT_SAMPLE_RATE: u32 = 24_000;

// --- Client -> server ---

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
    ClientContent(ClientContent),
    ToolResponse(ToolResponseMessage),
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub realtime_input_config: RealtimeInputConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<AudioTranscriptionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<AudioTranscriptionConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<ResponseModality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Text,
    #[default]
    Audio,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputConfig {
    pub automatic_activity_detection: AutomaticActivityDetection,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct AutomaticActivityDetection {
    pub disabled: bool,
}

/// Enables transcription of one audio direction. Serializes as `{}`.
#[derive(Serialize, Debug, Clone, Default)]
pub struct AudioTranscriptionConfig {}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// A tool the model may invoke, as announced in the setup message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

#[derive(Serialize, Debug, Clone)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Serialize, Debug, Clone)]
pub struct Part {
    pub text: String,
}

#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Blob>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Blob>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Content>,
    pub turn_complete: bool,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponseMessage {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Serialize, Debug, Clone)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}

// --- Server -> client ---

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<Value>,
    #[serde(default)]
    pub go_away: Option<GoAway>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub tool_call: Option<ToolCallMessage>,
    #[serde(default)]
    pub tool_call_cancellation: Option<ToolCallCancellationMessage>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<TimeLeft>,
}

/// `timeLeft` arrives as `{"seconds": n}` (proto3 JSON sends int64 seconds
/// as a string, so `{"seconds": "30"}` too) or as a duration string such as
/// `"12s"` / `"0.5s"`. Any other shape keeps the goAway but loses the hint.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum TimeLeft {
    Seconds {
        #[serde(default)]
        seconds: Option<DurationSeconds>,
    },
    Text(String),
    Unknown(serde_json::Value),
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum DurationSeconds {
    Number(f64),
    Text(String),
}

fn parse_duration_text(text: &str) -> Option<f64> {
    text.trim().trim_end_matches('s').trim().parse().ok()
}

impl TimeLeft {
    pub fn as_seconds(&self) -> Option<f64> {
        match self {
            TimeLeft::Seconds { seconds: None } => Some(0.0),
            TimeLeft::Seconds {
                seconds: Some(DurationSeconds::Number(seconds)),
            } => Some(*seconds),
            TimeLeft::Seconds {
                seconds: Some(DurationSeconds::Text(text)),
            }
            | TimeLeft::Text(text) => parse_duration_text(text),
            TimeLeft::Unknown(_) => None,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub interrupted: Option<bool>,
    #[serde(default)]
    pub model_turn: Option<ServerContentTurn>,
    #[serde(default)]
    pub turn_complete: Option<bool>,
    #[serde(default)]
    pub input_transcription: Option<Transcription>,
    #[serde(default)]
    pub output_transcription: Option<Transcription>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ServerContentTurn {
    #[serde(default)]
    pub parts: Vec<ServerPart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ServerPart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<InlineData>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

impl InlineData {
    pub fn is_pcm_audio(&self) -> bool {
        self.mime_type.starts_with(OUTPUT_AUDIO_MIME_PREFIX)
    }

    /// Sample rate from a `rate=` mime parameter, if any.
    pub fn sample_rate(&self) -> u32 {
        self.mime_type
            .split(';')
            .filter_map(|param| param.trim().strip_prefix("rate="))
            .find_map(|rate| rate.parse().ok())
            .unwrap_or(DEFAULT_OUTPUT_SAMPLE_RATE)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallMessage {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Deserialize, Debug)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Deserialize, Debug, Default)]
pub struct ToolCallCancellationMessage {
    #[serde(default)]
    pub ids: Vec<String>,
}

// --- Domain-facing tool types ---

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl From<FunctionCall> for ToolCall {
    fn from(call: FunctionCall) -> Self {
        Self {
            id: call.id,
            name: call.name,
            arguments: call.args,
        }
    }
}

/// The result of a tool invocation, correlated with its call by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResponse {
    pub id: String,
    pub name: String,
    pub result: Value,
}

impl From<ToolResponse> for FunctionResponse {
    fn from(response: ToolResponse) -> Self {
        Self {
            id: response.id,
            name: response.name,
            response: response.result,
        }
    }
}
