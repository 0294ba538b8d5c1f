use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::info;

use crate::bus::{self, BusEvent, PipelineGuard};
use crate::rgb2gray;
use crate::session::Session;
use crate::tutorials::make_element;

/// Runs the test pattern through our own `rsrgb2gray` video filter.
pub fn run(session: &Session, invert: bool, shift: u32) -> Result<()> {
    gst::init().context("Failed to init gstreamer")?;
    rgb2gray::register_static().context("Failed to register rsrgb2gray")?;

    let source = make_element("videotestsrc", "source")?;
    let convert_in = make_element("videoconvert", "convert_in")?;
    let filter = gst::ElementFactory::make(rgb2gray::ELEMENT_NAME)
        .name("rgb2gray")
        .property("invert", invert)
        .property("shift", shift)
        .build()
        .context("Failed to create rsrgb2gray")?;
    let convert_out = make_element("videoconvert", "convert_out")?;
    let sink = make_element("autovideosink", "sink")?;

    source.set_property_from_str("pattern", &session.config().tutorials.test_pattern);
    info!("rsrgb2gray invert={} shift={}", invert, shift);

    let pipeline = gst::Pipeline::with_name("grayscale-pipeline");
    let _guard = PipelineGuard::new(&pipeline);

    let elements = [&source, &convert_in, &filter, &convert_out, &sink];
    pipeline
        .add_many(elements)
        .context("Failed to add elements to pipeline")?;
    gst::Element::link_many(elements).context("Elements could not be linked")?;

    pipeline
        .set_state(gst::State::Playing)
        .context("Unable to set the pipeline to the `Playing` state")?;

    bus::run_until_eos(session, &pipeline, |_| Ok(BusEvent::Continue))?;

    bus::shutdown(&pipeline)
}
