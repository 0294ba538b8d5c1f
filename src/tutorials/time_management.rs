use std::cell::RefCell;

use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{error, info};

use crate::bus::{self, BusEvent, PipelineGuard};
use crate::session::Session;
use crate::tutorials::playbin;

/// Decides when the single demo seek happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeekPlan {
    trigger: gst::ClockTime,
    target: gst::ClockTime,
    done: bool,
}

impl SeekPlan {
    pub fn new(trigger: gst::ClockTime, target: gst::ClockTime) -> Self {
        Self {
            trigger,
            target,
            done: false,
        }
    }

    /// Returns the seek target at most once: when seeking is possible and
    /// playback has passed the trigger position.
    pub fn poll(&mut self, seek_enabled: bool, position: gst::ClockTime) -> Option<gst::ClockTime> {
        if self.done || !seek_enabled || position <= self.trigger {
            return None;
        }
        self.done = true;
        Some(self.target)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

struct CustomData {
    playbin: gst::Element,
    playing: bool,
    seek_enabled: bool,
    duration: Option<gst::ClockTime>,
    seek: SeekPlan,
}

impl CustomData {
    fn handle_message(&mut self, msg: &gst::Message) {
        use gst::MessageView;

        match msg.view() {
            MessageView::DurationChanged(_) => {
                // re-queried on the next tick
                self.duration = gst::ClockTime::NONE;
            }
            MessageView::StateChanged(state_changed) if bus::is_from(msg, &self.playbin) => {
                let new_state = state_changed.current();
                info!(
                    "Pipeline state changed from {:?} to {:?}",
                    state_changed.old(),
                    new_state
                );

                self.playing = new_state == gst::State::Playing;
                if self.playing {
                    self.query_seeking();
                }
            }
            _ => {}
        }
    }

    fn query_seeking(&mut self) {
        let mut seeking = gst::query::Seeking::new(gst::Format::Time);
        if self.playbin.query(&mut seeking) {
            let (seekable, start, end) = seeking.result();
            self.seek_enabled = seekable;
            if seekable {
                info!("Seeking is ENABLED from {} to {}", start, end);
            } else {
                info!("Seeking is DISABLED for this stream");
            }
        } else {
            error!("Seeking query failed");
        }
    }

    fn refresh(&mut self) -> Result<()> {
        if !self.playing {
            return Ok(());
        }

        let Some(position) = self.playbin.query_position::<gst::ClockTime>() else {
            error!("Could not query current position");
            return Ok(());
        };

        if self.duration.is_none() {
            self.duration = self.playbin.query_duration();
        }

        info!("Position {} / {}", position, self.duration.display());

        if let Some(target) = self.seek.poll(self.seek_enabled, position) {
            info!("Reached {}, performing seek to {}...", position, target);
            // FLUSH drops queued data so the seek is visible at once,
            // KEY_UNIT snaps to the nearest keyframe
            self.playbin
                .seek_simple(gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT, target)
                .context("Seek failed")?;
        }
        Ok(())
    }
}

/// Queries position and duration while playing and seeks once.
pub fn run(session: &Session) -> Result<()> {
    gst::init().context("Failed to init gstreamer")?;

    let playbin = playbin(session.media_uri())?;
    let _guard = PipelineGuard::new(&playbin);

    playbin
        .set_state(gst::State::Playing)
        .context("Unable to set the playbin to the `Playing` state")?;

    let seek_cfg = &session.config().seek;
    let data = RefCell::new(CustomData {
        playbin: playbin.clone(),
        playing: false,
        seek_enabled: false,
        duration: gst::ClockTime::NONE,
        seek: SeekPlan::new(
            gst::ClockTime::from_seconds(seek_cfg.trigger_secs),
            gst::ClockTime::from_seconds(seek_cfg.target_secs),
        ),
    });

    bus::run_until_eos(session, &playbin, |msg| {
        let mut data = data.borrow_mut();
        match msg {
            Some(msg) => data.handle_message(msg),
            None => data.refresh()?,
        }
        Ok(BusEvent::Continue)
    })?;

    bus::shutdown(&playbin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeks_exactly_once_after_trigger() {
        let mut plan = SeekPlan::new(
            gst::ClockTime::from_seconds(3),
            gst::ClockTime::from_seconds(20),
        );

        assert_eq!(plan.poll(true, gst::ClockTime::from_seconds(1)), None);
        assert_eq!(plan.poll(true, gst::ClockTime::from_seconds(3)), None);
        assert_eq!(
            plan.poll(true, gst::ClockTime::from_mseconds(3100)),
            Some(gst::ClockTime::from_seconds(20))
        );
        assert!(plan.is_done());
        assert_eq!(plan.poll(true, gst::ClockTime::from_seconds(25)), None);
    }

    #[test]
    fn never_seeks_unseekable_stream() {
        let mut plan = SeekPlan::new(
            gst::ClockTime::from_seconds(3),
            gst::ClockTime::from_seconds(20),
        );
        assert_eq!(plan.poll(false, gst::ClockTime::from_seconds(10)), None);
        assert!(!plan.is_done());
        assert!(plan.poll(true, gst::ClockTime::from_seconds(10)).is_some());
    }
}
