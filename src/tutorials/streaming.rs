use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use tracing::{debug, info};

use crate::bus::{self, PipelineGuard};
use crate::session::Session;

/// State the pipeline should be in for a given buffering level.
pub fn buffering_target(percent: i32, low_watermark: i32) -> gst::State {
    if percent < low_watermark {
        gst::State::Paused
    } else {
        gst::State::Playing
    }
}

/// Network playback that pauses while the queue refills.
pub fn run(session: &Session) -> Result<()> {
    gst::init().context("Failed to init gstreamer")?;

    let pipeline = gst::parse::launch(&format!("playbin uri={}", session.media_uri()))
        .context("Failed to build playbin")?;
    let _guard = PipelineGuard::new(&pipeline);

    let res = pipeline
        .set_state(gst::State::Playing)
        .context("Unable to set the pipeline to the `Playing` state")?;
    // live sources do not preroll, buffering has no meaning for them
    let is_live = res == gst::StateChangeSuccess::NoPreroll;
    if is_live {
        info!("Live stream, buffering messages will be ignored");
    }

    let low_watermark = session.config().streaming.low_watermark;
    let main_loop = glib::MainLoop::new(None, false);
    let main_loop_clone = main_loop.clone();
    let pipeline_weak = pipeline.downgrade();
    let bus = pipeline.bus().context("Pipeline has no bus")?;
    let _bus_watch = bus
        .add_watch(move |_, msg| {
            use gst::MessageView;

            let Some(pipeline) = pipeline_weak.upgrade() else {
                return glib::ControlFlow::Continue;
            };

            match msg.view() {
                MessageView::Error(err) => {
                    bus::log_error(err);
                    main_loop_clone.quit();
                }
                MessageView::Eos(..) => {
                    info!("End-Of-Stream reached");
                    let _ = pipeline.set_state(gst::State::Ready);
                    main_loop_clone.quit();
                }
                MessageView::Buffering(buffering) if !is_live => {
                    let percent = buffering.percent();
                    info!("Buffering ({percent}%)");
                    let target = buffering_target(percent, low_watermark);
                    debug!("Buffering wants {:?}", target);
                    let _ = pipeline.set_state(target);
                }
                MessageView::ClockLost(..) => {
                    info!("Clock lost, selecting a new one");
                    let _ = pipeline.set_state(gst::State::Paused);
                    let _ = pipeline.set_state(gst::State::Playing);
                }
                _ => (),
            }
            glib::ControlFlow::Continue
        })
        .context("Failed to add bus watch")?;
    session.quit_on_shutdown(&main_loop);

    main_loop.run();

    bus::shutdown(&pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pauses_below_watermark() {
        assert_eq!(buffering_target(0, 30), gst::State::Paused);
        assert_eq!(buffering_target(29, 30), gst::State::Paused);
        assert_eq!(buffering_target(30, 30), gst::State::Playing);
        assert_eq!(buffering_target(100, 100), gst::State::Playing);
    }
}
