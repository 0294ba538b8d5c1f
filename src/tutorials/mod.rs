use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::info;

use crate::cli::Tutorial;
use crate::session::Session;

pub mod concepts;
pub mod dynamic_pipeline;
pub mod grayscale;
pub mod gui_toolkit;
pub mod hello_world;
pub mod media_info;
pub mod media_pads;
pub mod multithread;
pub mod playback_speed;
pub mod preview_metadata;
pub mod props;
pub mod short_cutting;
pub mod streaming;
pub mod time_management;
pub mod waveform;

/// Runs the selected tutorial to completion.
pub fn run(tutorial: &Tutorial, session: &Session) -> Result<()> {
    info!(
        "Starting tutorial {} at {}",
        tutorial.id(),
        chrono::Local::now().format("%m-%d-%Y %H:%M:%S")
    );

    let res = match tutorial {
        Tutorial::B1 => hello_world::run(session),
        Tutorial::B2 => concepts::run(session),
        Tutorial::B3 => dynamic_pipeline::run(session),
        Tutorial::B4 => time_management::run(session),
        Tutorial::B5 => gui_toolkit::run(session),
        Tutorial::B6 => media_pads::run(session),
        Tutorial::B7 => multithread::run(session),
        Tutorial::B8 => short_cutting::run(session),
        Tutorial::B9 { uri } => {
            let uri = uri.as_deref().unwrap_or(session.media_uri());
            media_info::run(session, uri)
        }
        Tutorial::B12 => streaming::run(session),
        Tutorial::B13 => playback_speed::run(session),
        Tutorial::T1 => preview_metadata::run(session),
        Tutorial::P1 { invert, shift } => grayscale::run(session, *invert, *shift),
        Tutorial::Props { element, filter } => props::run(element, filter.as_deref()),
    };

    info!(
        "Tutorial {} finished at {}",
        tutorial.id(),
        chrono::Local::now().format("%m-%d-%Y %H:%M:%S")
    );
    res
}

pub(crate) fn make_element(factory: &str, name: &str) -> Result<gst::Element> {
    gst::ElementFactory::make(factory)
        .name(name)
        .build()
        .with_context(|| format!("Failed to create {}", factory))
}

/// Links a fresh `src_%u` request pad of `tee` to the static sink pad of `dst`.
pub(crate) fn link_tee_branch(tee: &gst::Element, dst: &gst::Element) -> Result<()> {
    let tee_pad = tee
        .request_pad_simple("src_%u")
        .context("Failed to request pad from tee")?;
    info!("Obtained request pad {} for {} branch", tee_pad.name(), dst.name());

    let sink_pad = dst
        .static_pad("sink")
        .with_context(|| format!("{} has no sink pad", dst.name()))?;
    tee_pad
        .link(&sink_pad)
        .with_context(|| format!("Failed to link tee to {}", dst.name()))?;
    Ok(())
}

pub(crate) fn playbin(uri: &str) -> Result<gst::Element> {
    gst::ElementFactory::make("playbin")
        .name("playbin")
        .property("uri", uri)
        .build()
        .context("Failed to create playbin")
}
