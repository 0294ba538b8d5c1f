use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;

use crate::bus::{self, BusEvent, PipelineGuard};
use crate::session::Session;
use crate::tutorials::{link_tee_branch, make_element};

/// One source split by a tee into an audio branch and a wavescope branch.
/// Each queue starts a new streaming thread.
pub fn run(session: &Session) -> Result<()> {
    gst::init().context("Failed to init gstreamer")?;

    let audio_source = make_element("audiotestsrc", "audio_source")?;
    let tee = make_element("tee", "tee")?;
    let audio_queue = make_element("queue", "audio_queue")?;
    let audio_convert = make_element("audioconvert", "audio_convert")?;
    let audio_resample = make_element("audioresample", "audio_resample")?;
    let audio_sink = make_element("autoaudiosink", "audio_sink")?;
    let video_queue = make_element("queue", "video_queue")?;
    let visual = make_element("wavescope", "visual")?;
    let video_convert = make_element("videoconvert", "video_convert")?;
    let video_sink = make_element("autovideosink", "video_sink")?;

    audio_source.set_property("freq", 440.0_f64);
    visual.set_property_from_str("shader", "none");
    visual.set_property_from_str("style", "lines");

    let pipeline = gst::Pipeline::with_name("pipeline");
    let _guard = PipelineGuard::new(&pipeline);

    pipeline
        .add_many([
            &audio_source,
            &tee,
            &audio_queue,
            &audio_convert,
            &audio_resample,
            &audio_sink,
            &video_queue,
            &visual,
            &video_convert,
            &video_sink,
        ])
        .context("Failed to add elements to pipeline")?;

    gst::Element::link_many([&audio_source, &tee]).context("Failed to link source to tee")?;
    gst::Element::link_many([&audio_queue, &audio_convert, &audio_resample, &audio_sink])
        .context("Failed to link audio branch")?;
    gst::Element::link_many([&video_queue, &visual, &video_convert, &video_sink])
        .context("Failed to link video branch")?;

    // tee src pads are request pads, they do not exist until asked for
    link_tee_branch(&tee, &audio_queue)?;
    link_tee_branch(&tee, &video_queue)?;

    pipeline
        .set_state(gst::State::Playing)
        .context("Unable to set the pipeline to the `Playing` state")?;

    bus::run_until_eos(session, &pipeline, |_| Ok(BusEvent::Continue))?;

    bus::shutdown(&pipeline)
}
