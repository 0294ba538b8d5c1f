use serde::Deserialize;

use crate::constants::*;
use crate::error::TutorialError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: Option<String>,

    pub media: MediaConfig,
    pub tutorials: TutorialsConfig,
    pub seek: SeekConfig,
    pub streaming: StreamingConfig,
    pub discover: DiscoverConfig,

    pub base_src: BaseSrcSettings,
    pub base_sink: BaseSinkSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub uri: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_MEDIA_URI.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TutorialsConfig {
    pub test_pattern: String,
}

impl Default for TutorialsConfig {
    fn default() -> Self {
        Self {
            test_pattern: DEFAULT_TEST_PATTERN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeekConfig {
    pub trigger_secs: u64,
    pub target_secs: u64,
}

impl Default for SeekConfig {
    fn default() -> Self {
        Self {
            trigger_secs: SEEK_TRIGGER_SECS,
            target_secs: SEEK_TARGET_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Buffering percentage below which playback is paused.
    pub low_watermark: i32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            low_watermark: BUFFERING_LOW_WATERMARK,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoverConfig {
    pub timeout_secs: u64,
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DISCOVER_TIMEOUT_SECS,
        }
    }
}

/// Overrides for properties every GstBaseSrc subclass has.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaseSrcSettings {
    pub blocksize: Option<u32>,
    pub num_buffers: Option<i32>,
    pub do_timestamp: Option<bool>,
    pub automatic_eos: Option<bool>,
}

/// Overrides for properties every GstBaseSink subclass has.
/// Durations are given in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaseSinkSettings {
    pub sync: Option<bool>,
    pub max_lateness_ms: Option<i64>,
    pub qos: Option<bool>,
    pub async_state_change: Option<bool>,
    pub ts_offset_ms: Option<i64>,
    pub enable_last_sample: Option<bool>,
    pub blocksize: Option<u32>,
    pub render_delay_ms: Option<u64>,
    pub throttle_time_ms: Option<u64>,
    pub max_bitrate: Option<u64>,
    pub processing_deadline_ms: Option<u64>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), TutorialError> {
        if self.media.uri.trim().is_empty() {
            return Err(TutorialError::Config("media.uri must not be empty".into()));
        }
        if self.seek.target_secs == 0 {
            return Err(TutorialError::Config("seek.target_secs must be > 0".into()));
        }
        if self.discover.timeout_secs == 0 {
            return Err(TutorialError::Config(
                "discover.timeout_secs must be > 0".into(),
            ));
        }
        if !(0..=100).contains(&self.streaming.low_watermark) {
            return Err(TutorialError::Config(format!(
                "streaming.low_watermark must be within 0..=100, got {}",
                self.streaming.low_watermark
            )));
        }
        if let Some(num_buffers) = self.base_src.num_buffers {
            if num_buffers < -1 {
                return Err(TutorialError::Config(
                    "base_src.num_buffers must be -1 (unlimited) or >= 0".into(),
                ));
            }
        }
        if let Some(max_lateness) = self.base_sink.max_lateness_ms {
            if max_lateness < -1 {
                return Err(TutorialError::Config(
                    "base_sink.max_lateness_ms must be -1 (unlimited) or >= 0".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.media.uri, DEFAULT_MEDIA_URI);
        assert_eq!(cfg.seek.trigger_secs, SEEK_TRIGGER_SECS);
        assert_eq!(cfg.base_src, BaseSrcSettings::default());
    }

    #[test]
    fn watermark_out_of_range_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.streaming.low_watermark = 101;
        assert!(matches!(cfg.validate(), Err(TutorialError::Config(_))));
    }

    #[test]
    fn negative_lateness_other_than_unlimited_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.base_sink.max_lateness_ms = Some(-1);
        assert!(cfg.validate().is_ok());
        cfg.base_sink.max_lateness_ms = Some(-5);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn num_buffers_below_unlimited_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.base_src.num_buffers = Some(-1);
        assert!(cfg.validate().is_ok());
        cfg.base_src.num_buffers = Some(-2);
        assert!(matches!(cfg.validate(), Err(TutorialError::Config(_))));
    }
}
