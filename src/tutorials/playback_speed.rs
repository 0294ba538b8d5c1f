use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};
use std::thread;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use gstreamer::{SeekFlags, SeekType};
use tracing::{error, info, warn};

use crate::bus::{self, PipelineGuard};
use crate::constants::KEY_POLL_INTERVAL;
use crate::session::Session;

const USAGE: &str = "\
USAGE: Choose one of the following options:
 'P' to toggle between PAUSE and PLAY
 'S' to increase playback speed, 's' to decrease playback speed
 'D' to toggle playback direction
 'N' to move to next frame (in the current direction, better in PAUSE)
 'Q' to quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    PlayPause,
    RateUp,
    RateDown,
    Reverse,
    NextFrame,
    Quit,
}

pub fn command_for_key(key: &KeyEvent) -> Option<Command> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match key.code {
        KeyCode::Char('c' | 'C') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Command::Quit)
        }
        KeyCode::Char('p' | 'P') => Some(Command::PlayPause),
        KeyCode::Char('S') => Some(Command::RateUp),
        KeyCode::Char('s') => Some(Command::RateDown),
        KeyCode::Char('d' | 'D') => Some(Command::Reverse),
        KeyCode::Char('n' | 'N') => Some(Command::NextFrame),
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Some(Command::Quit),
        _ => None,
    }
}

/// Current playback rate; a new rate only sticks once the seek was accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateControl {
    rate: f64,
}

impl Default for RateControl {
    fn default() -> Self {
        Self { rate: 1.0 }
    }
}

impl RateControl {
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Rate requested by a command, `None` for commands that keep the rate.
    pub fn proposed(&self, command: Command) -> Option<f64> {
        match command {
            Command::RateUp => Some(self.rate * 2.0),
            Command::RateDown => Some(self.rate / 2.0),
            Command::Reverse => Some(-self.rate),
            _ => None,
        }
    }

    pub fn commit(&mut self, rate: f64) {
        self.rate = rate;
    }
}

/// Segment for a rate change at `position`: forward plays from position to
/// the end, reverse plays from position back to the start.
pub fn seek_range(
    rate: f64,
    position: gst::ClockTime,
) -> (SeekType, gst::ClockTime, SeekType, gst::ClockTime) {
    if rate > 0.0 {
        (SeekType::Set, position, SeekType::End, gst::ClockTime::ZERO)
    } else {
        (SeekType::Set, gst::ClockTime::ZERO, SeekType::Set, position)
    }
}

/// Rate and step events go to the video sink so audio does not get in the way.
fn event_target(pipeline: &gst::Element) -> gst::Element {
    pipeline
        .property::<Option<gst::Element>>("video-sink")
        .unwrap_or_else(|| pipeline.clone())
}

fn send_seek_event(pipeline: &gst::Element, rate: f64) -> bool {
    let Some(position) = pipeline.query_position::<gst::ClockTime>() else {
        error!("Unable to retrieve current position");
        return false;
    };

    let (start_type, start, stop_type, stop) = seek_range(rate, position);
    let seek_event = gst::event::Seek::new(
        rate,
        SeekFlags::FLUSH | SeekFlags::ACCURATE,
        start_type,
        start,
        stop_type,
        stop,
    );

    let accepted = event_target(pipeline).send_event(seek_event);
    if accepted {
        info!("Current rate: {}", rate);
    } else {
        warn!("Seek event to rate {} was not handled", rate);
    }
    accepted
}

struct Player {
    pipeline: gst::Element,
    playing: bool,
    rate: RateControl,
}

impl Player {
    /// Returns false once the user asked to quit.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::PlayPause => {
                let (state, label) = if self.playing {
                    (gst::State::Paused, "PAUSE")
                } else {
                    (gst::State::Playing, "PLAYING")
                };
                if let Err(e) = self.pipeline.set_state(state) {
                    error!("Failed to set state {}: {}", label, e);
                } else {
                    self.playing = !self.playing;
                    info!("Setting state to {}", label);
                }
            }
            Command::RateUp | Command::RateDown | Command::Reverse => {
                if let Some(new_rate) = self.rate.proposed(command) {
                    if send_seek_event(&self.pipeline, new_rate) {
                        self.rate.commit(new_rate);
                    }
                }
            }
            Command::NextFrame => {
                let step = gst::event::Step::new(
                    gst::format::Buffers::from_u64(1),
                    self.rate.rate().abs(),
                    true,
                    false,
                );
                if event_target(&self.pipeline).send_event(step) {
                    info!("Stepping one frame");
                }
            }
            Command::Quit => return false,
        }
        true
    }
}

/// Leaves raw mode again however the reader thread exits.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to put terminal in raw mode")?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn read_keyboard(tx: Sender<Command>, running: Arc<AtomicBool>) -> Result<()> {
    // raw mode: keys arrive without waiting for return
    let _raw = RawMode::enable()?;

    while running.load(Ordering::SeqCst) {
        if !event::poll(KEY_POLL_INTERVAL).context("Failed to poll terminal")? {
            continue;
        }
        let Event::Key(key) = event::read().context("Failed to read terminal event")? else {
            continue;
        };
        let Some(command) = command_for_key(&key) else {
            continue;
        };
        if tx.send(command).is_err() || command == Command::Quit {
            break;
        }
    }
    Ok(())
}

/// Keyboard driven rate changes, direction changes and frame stepping.
pub fn run(session: &Session) -> Result<()> {
    gst::init().context("Failed to init gstreamer")?;

    println!("{USAGE}");

    let main_context = glib::MainContext::default();
    let _ctx = main_context
        .acquire()
        .context("Default main context is owned by another thread")?;

    let pipeline = gst::parse::launch(&format!("playbin uri={}", session.media_uri()))
        .context("Failed to build playbin")?;
    let _guard = PipelineGuard::new(&pipeline);

    let (tx, rx) = channel::<Command>();
    let reader_running = Arc::new(AtomicBool::new(true));
    let reader = {
        let reader_running = reader_running.clone();
        thread::spawn(move || {
            if let Err(e) = read_keyboard(tx, reader_running) {
                error!("Keyboard reader stopped: {:#}", e);
            }
        })
    };

    pipeline
        .set_state(gst::State::Playing)
        .context("Unable to set the pipeline to the `Playing` state")?;

    let main_loop = glib::MainLoop::new(Some(&main_context), false);

    let mut player = Player {
        pipeline: pipeline.clone(),
        playing: true,
        rate: RateControl::default(),
    };
    let main_loop_clone = main_loop.clone();
    glib::timeout_add_local(KEY_POLL_INTERVAL, move || {
        while let Ok(command) = rx.try_recv() {
            if !player.handle(command) {
                main_loop_clone.quit();
                return glib::ControlFlow::Break;
            }
        }
        glib::ControlFlow::Continue
    });

    let main_loop_clone = main_loop.clone();
    let bus = pipeline.bus().context("Pipeline has no bus")?;
    let _bus_watch = bus
        .add_watch_local(move |_, msg| {
            use gst::MessageView;

            match msg.view() {
                MessageView::Error(err) => {
                    bus::log_error(err);
                    main_loop_clone.quit();
                }
                MessageView::Eos(..) => main_loop_clone.quit(),
                _ => (),
            }
            glib::ControlFlow::Continue
        })
        .context("Failed to add bus watch")?;
    session.quit_on_shutdown(&main_loop);

    main_loop.run();

    reader_running.store(false, Ordering::SeqCst);
    if reader.join().is_err() {
        error!("Keyboard reader thread panicked");
    }

    bus::shutdown(&pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn key_bindings() {
        assert_eq!(command_for_key(&key('p')), Some(Command::PlayPause));
        assert_eq!(command_for_key(&key('S')), Some(Command::RateUp));
        assert_eq!(command_for_key(&key('s')), Some(Command::RateDown));
        assert_eq!(command_for_key(&key('D')), Some(Command::Reverse));
        assert_eq!(command_for_key(&key('n')), Some(Command::NextFrame));
        assert_eq!(command_for_key(&key('Q')), Some(Command::Quit));
        assert_eq!(command_for_key(&key('x')), None);
        assert_eq!(
            command_for_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Command::Quit)
        );
        assert_eq!(command_for_key(&key('c')), None);
    }

    #[test]
    fn rate_changes_only_when_committed() {
        let mut rate = RateControl::default();
        assert_eq!(rate.proposed(Command::RateUp), Some(2.0));
        assert_eq!(rate.rate(), 1.0);

        rate.commit(2.0);
        assert_eq!(rate.proposed(Command::RateDown), Some(1.0));
        assert_eq!(rate.proposed(Command::Reverse), Some(-2.0));
        assert_eq!(rate.proposed(Command::PlayPause), None);
        assert_eq!(rate.proposed(Command::NextFrame), None);
    }

    #[test]
    fn reverse_playback_runs_back_to_start() {
        let pos = gst::ClockTime::from_seconds(12);

        let (start_type, start, stop_type, stop) = seek_range(2.0, pos);
        assert_eq!((start_type, start), (SeekType::Set, pos));
        assert_eq!((stop_type, stop), (SeekType::End, gst::ClockTime::ZERO));

        let (start_type, start, stop_type, stop) = seek_range(-1.0, pos);
        assert_eq!((start_type, start), (SeekType::Set, gst::ClockTime::ZERO));
        assert_eq!((stop_type, stop), (SeekType::Set, pos));
    }
}
