use std::time::Instant;

use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{error, info, warn};

use crate::constants::{EOS_DRAIN_TIMEOUT, POLL_INTERVAL};
use crate::error::TutorialError;
use crate::session::Session;

/// What a bus handler wants the loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    Continue,
    Stop,
}

pub fn log_error(err: &gst::message::Error) {
    error!(
        "Error from {:?}: {} ({:?})",
        err.src().map(|s| s.path_string()),
        err.error(),
        err.debug()
    );
}

/// True when `msg` was posted by `element` itself, not by one of its children.
pub fn is_from(msg: &gst::MessageRef, element: &impl IsA<gst::Object>) -> bool {
    msg.src()
        .map(|s| s == element.upcast_ref::<gst::Object>())
        .unwrap_or(false)
}

/// Sets the element to NULL when dropped, whatever path leaves the tutorial.
pub struct PipelineGuard {
    pipeline: gst::Element,
}

impl PipelineGuard {
    pub fn new(pipeline: &impl IsA<gst::Element>) -> Self {
        Self {
            pipeline: pipeline.clone().upcast(),
        }
    }
}

impl Drop for PipelineGuard {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            error!("Unable to set the pipeline to the `Null` state: {}", e);
        }
    }
}

pub fn shutdown(pipeline: &impl IsA<gst::Element>) -> Result<()> {
    pipeline
        .set_state(gst::State::Null)
        .context("Unable to set the pipeline to the `Null` state")?;
    Ok(())
}

/// Pops bus messages until EOS, an error, the handler asks to stop, or the
/// session is shut down. The handler also gets `None` on every poll interval
/// without a message.
///
/// On shutdown EOS is sent once and the loop keeps draining so sinks can
/// finish; it gives up after `EOS_DRAIN_TIMEOUT`.
pub fn run_until_eos<F>(
    session: &Session,
    pipeline: &impl IsA<gst::Element>,
    mut on_message: F,
) -> Result<()>
where
    F: FnMut(Option<&gst::Message>) -> Result<BusEvent>,
{
    use gst::MessageView;

    let bus = pipeline.bus().ok_or(TutorialError::NoBus)?;
    let poll = gst::ClockTime::from_mseconds(POLL_INTERVAL.as_millis() as u64);
    let mut drain_deadline: Option<Instant> = None;

    loop {
        if !session.is_running() && drain_deadline.is_none() {
            info!("Shutdown requested, sending EOS");
            pipeline.send_event(gst::event::Eos::new());
            drain_deadline = Some(Instant::now() + EOS_DRAIN_TIMEOUT);
        }
        if let Some(deadline) = drain_deadline {
            if Instant::now() >= deadline {
                warn!("No EOS after {:?}, giving up", EOS_DRAIN_TIMEOUT);
                break;
            }
        }

        let Some(msg) = bus.timed_pop(poll) else {
            if on_message(None)? == BusEvent::Stop {
                break;
            }
            continue;
        };

        match msg.view() {
            MessageView::Eos(..) => {
                info!("End-Of-Stream reached");
                break;
            }
            MessageView::Error(err) => {
                log_error(err);
                break;
            }
            _ => {
                if on_message(Some(&msg))? == BusEvent::Stop {
                    break;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn playing_live_pipeline() -> (gst::Element, PipelineGuard) {
        gst::init().unwrap();
        let pipeline = gst::parse::launch("fakesrc is-live=true ! fakesink sync=true").unwrap();
        let guard = PipelineGuard::new(&pipeline);
        pipeline.set_state(gst::State::Playing).unwrap();
        let (res, _, _) = pipeline.state(gst::ClockTime::from_seconds(5));
        assert!(res.is_ok());
        (pipeline, guard)
    }

    #[test]
    fn shutdown_ends_a_live_pipeline_through_eos() {
        let (pipeline, _guard) = playing_live_pipeline();
        let session = Session::new(AppConfig::default());
        session.request_shutdown();

        let start = Instant::now();
        let mut calls = 0;
        run_until_eos(&session, &pipeline, |_| {
            calls += 1;
            Ok(BusEvent::Continue)
        })
        .unwrap();

        // EOS made it through the sink well before the drain deadline
        assert!(start.elapsed() < EOS_DRAIN_TIMEOUT);
        assert!(calls < 20);
    }

    #[test]
    fn handler_can_stop_the_loop() {
        let (pipeline, _guard) = playing_live_pipeline();
        let session = Session::new(AppConfig::default());

        let mut calls = 0;
        run_until_eos(&session, &pipeline, |_| {
            calls += 1;
            Ok(BusEvent::Stop)
        })
        .unwrap();

        assert_eq!(calls, 1);
        assert!(session.is_running());
    }

    #[test]
    fn handler_errors_are_propagated() {
        let (pipeline, _guard) = playing_live_pipeline();
        let session = Session::new(AppConfig::default());

        let res = run_until_eos(&session, &pipeline, |_| anyhow::bail!("handler failed"));
        assert!(res.is_err());
    }

    #[test]
    fn is_from_checks_the_message_source() {
        let (pipeline, _guard) = playing_live_pipeline();
        let other = gst::ElementFactory::make("fakesink").build().unwrap();

        let msg = gst::message::Application::builder(gst::Structure::new_empty("ping"))
            .src(&pipeline)
            .build();
        assert!(is_from(&msg, &pipeline));
        assert!(!is_from(&msg, &other));
    }
}
