use std::time::Duration;

pub const DEFAULT_MEDIA_URI: &str =
    "https://www.freedesktop.org/software/gstreamer-sdk/data/media/sintel_trailer-480p.webm";
pub const DEFAULT_CONFIG_PATH: &str = "./gst_learn.toml";
pub const DEFAULT_TEST_PATTERN: &str = "smpte";

// Bus polling
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const EOS_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

// b4
pub const SEEK_TRIGGER_SECS: u64 = 3;
pub const SEEK_TARGET_SECS: u64 = 20;

// b8
pub const CHUNK_SIZE: usize = 1024; // bytes per pushed buffer
pub const SAMPLE_RATE: u32 = 44_100;

// b9
pub const DISCOVER_TIMEOUT_SECS: u64 = 5;

// b12
pub const BUFFERING_LOW_WATERMARK: i32 = 30;

// b13
pub const KEY_POLL_INTERVAL: Duration = Duration::from_millis(50);
