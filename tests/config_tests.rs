use std::fs;

use tempfile::TempDir;

use gst_learn::constants::{DEFAULT_MEDIA_URI, SEEK_TARGET_SECS};
use gst_learn::error::TutorialError;
use gst_learn::utils::{load_config, load_config_or_default};

fn write_config(dir: &TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("gst_learn.toml");
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn partial_file_keeps_defaults_for_the_rest() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(
        &tmp,
        r#"
log_level = "debug"

[seek]
trigger_secs = 1

[base_sink]
sync = false
ts_offset_ms = -20
"#,
    );

    let cfg = load_config(&path).unwrap();
    assert_eq!(cfg.log_level.as_deref(), Some("debug"));
    assert_eq!(cfg.seek.trigger_secs, 1);
    assert_eq!(cfg.seek.target_secs, SEEK_TARGET_SECS);
    assert_eq!(cfg.media.uri, DEFAULT_MEDIA_URI);
    assert_eq!(cfg.base_sink.sync, Some(false));
    assert_eq!(cfg.base_sink.ts_offset_ms, Some(-20));
    assert!(cfg.base_src.blocksize.is_none());
}

#[test]
fn out_of_range_watermark_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(&tmp, "[streaming]\nlow_watermark = 150\n");

    let err = load_config(&path).unwrap_err();
    assert!(matches!(err.downcast_ref::<TutorialError>(), Some(TutorialError::Config(_))));
}

#[test]
fn negative_num_buffers_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(&tmp, "[base_src]\nnum_buffers = -2\n");

    let err = load_config(&path).unwrap_err();
    assert!(matches!(err.downcast_ref::<TutorialError>(), Some(TutorialError::Config(_))));
}

#[test]
fn zero_discover_timeout_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(&tmp, "[discover]\ntimeout_secs = 0\n");
    assert!(load_config(&path).is_err());
}

#[test]
fn unknown_base_sink_field_is_a_parse_error() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(&tmp, "[base_sink]\nsnyc = true\n");

    let err = load_config(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("snyc"));
}

#[test]
fn explicit_missing_path_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    assert!(load_config_or_default(Some(&missing)).is_err());
}

#[test]
fn explicit_path_is_used() {
    let tmp = TempDir::new().unwrap();
    let path = write_config(&tmp, "[media]\nuri = \"file:///tmp/clip.webm\"\n");

    let cfg = load_config_or_default(Some(&path)).unwrap();
    assert_eq!(cfg.media.uri, "file:///tmp/clip.webm");
}
