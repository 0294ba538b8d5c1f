use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{error, info};

use crate::bus::{self, BusEvent, PipelineGuard};
use crate::session::Session;
use crate::tutorials::make_element;

/// Whether a newly exposed pad should be hooked up to the audio branch.
pub fn is_raw_audio(caps_name: &str) -> bool {
    caps_name.starts_with("audio/x-raw")
}

fn on_pad_added(src: &gst::Element, src_pad: &gst::Pad, convert: &gst::Element) {
    info!("Received new pad {} from {}", src_pad.name(), src.name());

    let Some(sink_pad) = convert.static_pad("sink") else {
        error!("audioconvert has no sink pad");
        return;
    };
    if sink_pad.is_linked() {
        info!("We are already linked. Ignoring.");
        return;
    }

    let caps = src_pad
        .current_caps()
        .unwrap_or_else(|| src_pad.query_caps(None));
    let Some(new_pad_type) = caps.structure(0).map(|s| s.name().to_string()) else {
        info!("New pad has empty caps. Ignoring.");
        return;
    };

    if !is_raw_audio(&new_pad_type) {
        info!("It has type {} which is not raw audio. Ignoring.", new_pad_type);
        return;
    }

    match src_pad.link(&sink_pad) {
        Ok(_) => info!("Link succeeded (type {}).", new_pad_type),
        Err(e) => error!("Type is {} but link failed: {:?}", new_pad_type, e),
    }
}

/// uridecodebin only exposes its pads once it knows the media, so only the
/// audio output chain is linked up front.
pub fn run(session: &Session) -> Result<()> {
    gst::init().context("Failed to init gstreamer")?;

    let source = make_element("uridecodebin", "source")?;
    let convert = make_element("audioconvert", "convert")?;
    let resample = make_element("audioresample", "resample")?;
    let sink = make_element("autoaudiosink", "sink")?;

    let pipeline = gst::Pipeline::with_name("test-pipeline");
    let _guard = PipelineGuard::new(&pipeline);

    pipeline
        .add_many([&source, &convert, &resample, &sink])
        .context("Failed to add elements to pipeline")?;
    gst::Element::link_many([&convert, &resample, &sink])
        .context("Elements could not be linked")?;

    source.set_property("uri", session.media_uri());

    let convert_weak = convert.downgrade();
    source.connect_pad_added(move |src, src_pad| {
        if let Some(convert) = convert_weak.upgrade() {
            on_pad_added(src, src_pad, &convert);
        }
    });

    pipeline
        .set_state(gst::State::Playing)
        .context("Unable to set the pipeline to the `Playing` state")?;

    bus::run_until_eos(session, &pipeline, |msg| {
        if let Some(msg) = msg {
            if let gst::MessageView::StateChanged(state_changed) = msg.view() {
                if bus::is_from(msg, &pipeline) {
                    info!(
                        "Pipeline state changed from {:?} to {:?}",
                        state_changed.old(),
                        state_changed.current()
                    );
                }
            }
        }
        Ok(BusEvent::Continue)
    })?;

    bus::shutdown(&pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_raw_audio_is_linked() {
        assert!(is_raw_audio("audio/x-raw"));
        assert!(!is_raw_audio("video/x-raw"));
        assert!(!is_raw_audio("audio/x-vorbis"));
    }
}
