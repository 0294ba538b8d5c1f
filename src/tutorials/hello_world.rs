use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;

use crate::bus::{self, BusEvent, PipelineGuard};
use crate::session::Session;

/// `playbin uri=...` played until it ends.
pub fn run(session: &Session) -> Result<()> {
    gst::init().context("Failed to init gstreamer")?;

    let pipeline = gst::parse::launch(&format!("playbin uri={}", session.media_uri()))
        .context("Failed to build playbin")?;
    let _guard = PipelineGuard::new(&pipeline);

    pipeline
        .set_state(gst::State::Playing)
        .context("Unable to set the pipeline to the `Playing` state")?;

    bus::run_until_eos(session, &pipeline, |_| Ok(BusEvent::Continue))?;

    bus::shutdown(&pipeline)
}
