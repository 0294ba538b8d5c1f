use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;

use crate::bus::{self, BusEvent, PipelineGuard};
use crate::session::Session;
use crate::tutorials::make_element;

/// Builds the pipeline by hand instead of letting playbin do it.
pub fn run(session: &Session) -> Result<()> {
    gst::init().context("Failed to init gstreamer")?;

    let source = make_element("videotestsrc", "source")?;
    let sink = make_element("autovideosink", "sink")?;

    let pipeline = gst::Pipeline::with_name("test-pipeline");
    let _guard = PipelineGuard::new(&pipeline);

    pipeline
        .add_many([&source, &sink])
        .context("Failed to add elements to pipeline")?;
    source
        .link(&sink)
        .context("Elements could not be linked")?;

    source.set_property_from_str("pattern", &session.config().tutorials.test_pattern);

    pipeline
        .set_state(gst::State::Playing)
        .context("Unable to set the pipeline to the `Playing` state")?;

    bus::run_until_eos(session, &pipeline, |_| Ok(BusEvent::Continue))?;

    bus::shutdown(&pipeline)
}
