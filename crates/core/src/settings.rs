use gemini_realtime::LiveConfig;
use std::time::Duration;

pub const DEFAULT_VIDEO_FRAME_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_STATE_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_CAPTURE_CHUNK: Duration = Duration::from_millis(100);

/// Per-controller settings, shared by every session it starts.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Connection template; its `tools` are replaced by what the tool bridge declares.
    pub live: LiveConfig,
    /// Minimum time between two video frames sent to the model.
    pub video_frame_interval: Duration,
    /// How often connection and tool state are mirrored into the snapshot.
    pub state_poll_interval: Duration,
    /// Duration of each capture audio chunk sent to the model.
    pub capture_chunk: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            live: LiveConfig::default(),
            video_frame_interval: DEFAULT_VIDEO_FRAME_INTERVAL,
            state_poll_interval: DEFAULT_STATE_POLL_INTERVAL,
            capture_chunk: DEFAULT_CAPTURE_CHUNK,
        }
    }
}

impl SessionSettings {
    pub fn new(live: LiveConfig) -> Self {
        Self {
            live,
            ..Default::default()
        }
    }
}
