use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::types::{
    AudioTranscriptionConfig, AutomaticActivityDetection, ClientMessage, Content,
    FunctionDeclaration, GenerationConfig, Part, PrebuiltVoiceConfig, RealtimeInputConfig,
    ResponseModality, Setup, SpeechConfig, Tool, VoiceConfig,
};

pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const DEFAULT_MODEL: &str = "models/gemini-2.0-flash-live-001";
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// Everything needed to open and set up one Live connection.
#[derive(Debug)]
pub struct LiveConfig {
    pub endpoint: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub response_modality: ResponseModality,
    pub system_instruction: Option<String>,
    pub voice_name: Option<String>,
    pub transcribe_input: bool,
    pub transcribe_output: bool,
    pub tools: Vec<FunctionDeclaration>,
    pub handshake_timeout: Duration,
    /// Bound of the outbound queue; sends beyond it are dropped.
    pub outbound_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            response_modality: ResponseModality::Audio,
            system_instruction: None,
            voice_name: None,
            transcribe_input: true,
            transcribe_output: true,
            tools: Vec::new(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

impl Clone for LiveConfig {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            api_key: self
                .api_key
                .as_ref()
                .map(|key| SecretString::from(key.expose_secret().to_owned())),
            model: self.model.clone(),
            response_modality: self.response_modality,
            system_instruction: self.system_instruction.clone(),
            voice_name: self.voice_name.clone(),
            transcribe_input: self.transcribe_input,
            transcribe_output: self.transcribe_output,
            tools: self.tools.clone(),
            handshake_timeout: self.handshake_timeout,
            outbound_capacity: self.outbound_capacity,
        }
    }
}

impl LiveConfig {
    /// True when an API key is present and non-blank.
    pub fn has_credentials(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|key| !key.expose_secret().trim().is_empty())
    }

    /// The socket URL, with the API key appended as a query parameter.
    pub(crate) fn url(&self) -> String {
        match &self.api_key {
            Some(key) => {
                let separator = if self.endpoint.contains('?') { '&' } else { '?' };
                format!("{}{}key={}", self.endpoint, separator, key.expose_secret())
            }
            None => self.endpoint.clone(),
        }
    }

    /// Builds the first frame sent on every new connection.
    pub fn setup_message(&self) -> ClientMessage {
        let speech_config = self.voice_name.as_ref().map(|voice_name| SpeechConfig {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: voice_name.clone(),
                },
            },
        });
        let tools = if self.tools.is_empty() {
            vec![]
        } else {
            vec![Tool {
                function_declarations: self.tools.clone(),
            }]
        };

        ClientMessage::Setup(Setup {
            model: self.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: vec![self.response_modality],
                speech_config,
            },
            system_instruction: self.system_instruction.as_ref().map(|text| Content {
                role: None,
                parts: vec![Part { text: text.clone() }],
            }),
            realtime_input_config: RealtimeInputConfig {
                automatic_activity_detection: AutomaticActivityDetection { disabled: false },
            },
            input_audio_transcription: self.transcribe_input.then(AudioTranscriptionConfig::default),
            output_audio_transcription: self
                .transcribe_output
                .then(AudioTranscriptionConfig::default),
            tools,
        })
    }
}
