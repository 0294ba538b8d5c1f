use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use tracing::{info, warn};

use crate::base_props::{apply_base_sink, apply_base_src};
use crate::bus::{self, BusEvent, PipelineGuard};
use crate::session::Session;
use crate::tutorials::{link_tee_branch, make_element};

fn fmt_time(time: Option<gst::ClockTime>) -> String {
    time.map(|t| t.to_string()).unwrap_or_else(|| "none".to_string())
}

/// One log line for a sample pulled from the appsink: buffer timing, caps
/// and the segment it belongs to.
pub fn sample_summary(sample: &gst::SampleRef) -> String {
    let buffer = match sample.buffer() {
        Some(buffer) => format!(
            "pts={} duration={} size={}",
            fmt_time(buffer.pts()),
            fmt_time(buffer.duration()),
            buffer.size()
        ),
        None => "no buffer".to_string(),
    };
    let caps = sample
        .caps()
        .map(|caps| caps.to_string())
        .unwrap_or_else(|| "no caps".to_string());
    let segment = match sample.segment() {
        Some(segment) => match segment.downcast_ref::<gst::ClockTime>() {
            Some(segment) => format!(
                "segment=time start={} position={} rate={}",
                fmt_time(segment.start()),
                fmt_time(segment.position()),
                segment.rate()
            ),
            None => format!("segment={:?}", segment.format()),
        },
        None => "no segment".to_string(),
    };
    format!("{buffer} caps={caps} {segment}")
}

/// Live test pattern shown on screen while an appsink branch logs the
/// metadata of every buffer it receives.
pub fn run(session: &Session) -> Result<()> {
    gst::init().context("Failed to init gstreamer")?;
    let config = session.config();

    let source = make_element("videotestsrc", "source")?;
    let timeoverlay = make_element("timeoverlay", "timeoverlay")?;
    let tee = make_element("tee", "tee")?;
    let prev_queue = make_element("queue", "prev_queue")?;
    let prev_sink = make_element("autovideosink", "sink")?;
    let app_queue = make_element("queue", "app_queue")?;
    let app_sink = gst_app::AppSink::builder().name("appsink").build();

    source.set_property_from_str("pattern", &config.tutorials.test_pattern);
    source.set_property("is-live", true);
    // live sources can stamp buffers with the running time
    source.set_property("do-timestamp", true);

    let applied = apply_base_src(&source, &config.base_src)?;
    if !applied.is_empty() {
        info!("GstBaseSrc overrides on {}: {}", source.name(), applied.join(", "));
    }
    let app_sink_element = app_sink.upcast_ref::<gst::Element>();
    let applied = apply_base_sink(app_sink_element, &config.base_sink)?;
    if !applied.is_empty() {
        info!("GstBaseSink overrides on {}: {}", app_sink.name(), applied.join(", "));
    }

    let pipeline = gst::Pipeline::with_name("test-pipeline");
    let _guard = PipelineGuard::new(&pipeline);

    pipeline
        .add_many([
            &source,
            &timeoverlay,
            &tee,
            &prev_queue,
            &prev_sink,
            &app_queue,
            app_sink_element,
        ])
        .context("Failed to add elements to pipeline")?;

    gst::Element::link_many([&source, &timeoverlay, &tee])
        .context("Failed to link source to tee")?;
    gst::Element::link_many([&prev_queue, &prev_sink]).context("Failed to link preview branch")?;
    gst::Element::link_many([&app_queue, app_sink_element]).context("Failed to link app branch")?;
    link_tee_branch(&tee, &prev_queue)?;
    link_tee_branch(&tee, &app_queue)?;

    app_sink.set_callbacks(
        gst_app::AppSinkCallbacks::builder()
            .new_sample(|app_sink| {
                let sample = app_sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                info!(
                    "{} base_time={}",
                    sample_summary(&sample),
                    fmt_time(app_sink.base_time())
                );
                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );

    pipeline
        .set_state(gst::State::Playing)
        .context("Unable to set the pipeline to the `Playing` state")?;

    bus::run_until_eos(session, &pipeline, |msg| {
        if let Some(msg) = msg {
            if let gst::MessageView::Warning(w) = msg.view() {
                warn!("Warning from {:?}: {}", w.src().map(|s| s.path_string()), w.error());
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
    fn summary_lists_buffer_timing_and_caps() {
        gst::init().unwrap();

        let mut buffer = gst::Buffer::with_size(16).unwrap();
        {
            let buffer = buffer.get_mut().unwrap();
            buffer.set_pts(gst::ClockTime::from_mseconds(40));
            buffer.set_duration(gst::ClockTime::from_mseconds(33));
        }
        let caps = gst::Caps::builder("video/x-raw").field("width", 320i32).build();
        let mut segment = gst::FormattedSegment::<gst::ClockTime>::new();
        segment.set_position(gst::ClockTime::from_mseconds(40));
        let sample = gst::Sample::builder()
            .buffer(&buffer)
            .caps(&caps)
            .segment(&segment)
            .build();

        let line = sample_summary(&sample);
        assert!(line.starts_with("pts=0:00:00.040000000 duration=0:00:00.033000000 size=16"));
        assert!(line.contains("caps=video/x-raw, width=(int)320"));
        assert!(line.ends_with(
            "segment=time start=0:00:00.000000000 position=0:00:00.040000000 rate=1"
        ));
    }

    #[test]
    fn empty_sample_is_reported() {
        gst::init().unwrap();
        let sample = gst::Sample::builder().build();
        assert!(sample_summary(&sample).starts_with("no buffer caps=no caps "));
    }
}
