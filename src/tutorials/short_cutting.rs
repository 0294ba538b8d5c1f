use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use byte_slice_cast::*;
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_audio as gst_audio;
use tracing::{error, info};

use crate::bus::{self, PipelineGuard};
use crate::constants::{CHUNK_SIZE, SAMPLE_RATE};
use crate::session::Session;
use crate::tutorials::{link_tee_branch, make_element};
use crate::tutorials::waveform::WaveGenerator;

/// State shared between the appsrc callbacks and the idle feeder.
struct Feeder {
    source_id: Option<glib::SourceId>,
    wave: WaveGenerator,
}

/// A panic while holding the lock leaves the generator state usable.
fn lock_feeder(feeder: &Mutex<Feeder>) -> MutexGuard<'_, Feeder> {
    feeder.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One CHUNK_SIZE buffer of S16 mono samples, timestamped from the sample count.
pub fn make_chunk(wave: &mut WaveGenerator) -> Result<gst::Buffer> {
    let num_samples = CHUNK_SIZE / 2; // 16 bit samples
    let pts = wave.pts();
    let duration = wave.duration(num_samples);

    let mut buffer = gst::Buffer::with_size(CHUNK_SIZE).context("Failed to allocate buffer")?;
    {
        let buffer = buffer
            .get_mut()
            .context("Freshly allocated buffer is not writable")?;
        buffer.set_pts(pts);
        buffer.set_duration(duration);

        let mut map = buffer
            .map_writable()
            .context("Failed to map buffer writable")?;
        let samples = map
            .as_mut_slice()
            .as_mut_slice_of::<i16>()
            .context("Buffer is not a whole number of samples")?;
        wave.fill(samples);
    }

    Ok(buffer)
}

fn start_feeding(feeder: &Arc<Mutex<Feeder>>, appsrc: &gst_app::AppSrc) {
    let mut guard = lock_feeder(feeder);
    if guard.source_id.is_some() {
        return;
    }
    info!("Start feeding");

    let feeder_weak = Arc::downgrade(feeder);
    let appsrc = appsrc.clone();
    // Runs whenever the main loop has nothing better to do
    guard.source_id = Some(glib::idle_add(move || {
        let Some(feeder) = feeder_weak.upgrade() else {
            return glib::ControlFlow::Break;
        };

        let buffer = {
            let mut feeder = lock_feeder(&feeder);
            match make_chunk(&mut feeder.wave) {
                Ok(buffer) => buffer,
                Err(e) => {
                    error!("Failed to generate samples: {:#}", e);
                    feeder.source_id = None;
                    return glib::ControlFlow::Break;
                }
            }
        };

        // Lock released: pushing may call enough-data synchronously
        if appsrc.push_buffer(buffer).is_err() {
            lock_feeder(&feeder).source_id = None;
            return glib::ControlFlow::Break;
        }
        glib::ControlFlow::Continue
    }));
}

fn stop_feeding(feeder: &Mutex<Feeder>) {
    if let Some(source) = lock_feeder(feeder).source_id.take() {
        info!("Stop feeding");
        source.remove();
    }
}

/// Application generated audio goes in through appsrc and comes back out
/// through appsink, with a speaker and a wavescope branch in between.
pub fn run(session: &Session) -> Result<()> {
    gst::init().context("Failed to init gstreamer")?;

    let info = gst_audio::AudioInfo::builder(gst_audio::AudioFormat::S16le, SAMPLE_RATE, 1)
        .build()
        .context("Failed to build audio info")?;
    let audio_caps = info.to_caps().context("Failed to build audio caps")?;

    let appsrc = gst_app::AppSrc::builder()
        .name("audio_source")
        .caps(&audio_caps)
        .format(gst::Format::Time)
        .build();
    let tee = make_element("tee", "tee")?;
    let audio_queue = make_element("queue", "audio_queue")?;
    let audio_convert1 = make_element("audioconvert", "audio_convert1")?;
    let audio_resample = make_element("audioresample", "audio_resample")?;
    let audio_sink = make_element("autoaudiosink", "audio_sink")?;
    let video_queue = make_element("queue", "video_queue")?;
    let audio_convert2 = make_element("audioconvert", "audio_convert2")?;
    let visual = make_element("wavescope", "visual")?;
    let video_convert = make_element("videoconvert", "video_convert")?;
    let video_sink = make_element("autovideosink", "video_sink")?;
    let app_queue = make_element("queue", "app_queue")?;
    let appsink = gst_app::AppSink::builder()
        .name("app_sink")
        .caps(&audio_caps)
        .build();

    visual.set_property_from_str("shader", "none");
    visual.set_property_from_str("style", "lines");

    let pipeline = gst::Pipeline::with_name("pipeline");
    let _guard = PipelineGuard::new(&pipeline);

    pipeline
        .add_many([
            appsrc.upcast_ref::<gst::Element>(),
            &tee,
            &audio_queue,
            &audio_convert1,
            &audio_resample,
            &audio_sink,
            &video_queue,
            &audio_convert2,
            &visual,
            &video_convert,
            &video_sink,
            &app_queue,
            appsink.upcast_ref::<gst::Element>(),
        ])
        .context("Failed to add elements to pipeline")?;

    gst::Element::link_many([appsrc.upcast_ref::<gst::Element>(), &tee])
        .context("Failed to link appsrc to tee")?;
    gst::Element::link_many([&audio_queue, &audio_convert1, &audio_resample, &audio_sink])
        .context("Failed to link audio branch")?;
    gst::Element::link_many([&video_queue, &audio_convert2, &visual, &video_convert, &video_sink])
        .context("Failed to link video branch")?;
    gst::Element::link_many([&app_queue, appsink.upcast_ref::<gst::Element>()])
        .context("Failed to link app branch")?;

    link_tee_branch(&tee, &audio_queue)?;
    link_tee_branch(&tee, &video_queue)?;
    link_tee_branch(&tee, &app_queue)?;

    let feeder = Arc::new(Mutex::new(Feeder {
        source_id: None,
        wave: WaveGenerator::new(SAMPLE_RATE),
    }));

    // need-data: appsrc queue is running low; enough-data: it is full
    let need_feeder = Arc::downgrade(&feeder);
    let enough_feeder = Arc::downgrade(&feeder);
    appsrc.set_callbacks(
        gst_app::AppSrcCallbacks::builder()
            .need_data(move |appsrc, _| {
                if let Some(feeder) = need_feeder.upgrade() {
                    start_feeding(&feeder, appsrc);
                }
            })
            .enough_data(move |_| {
                if let Some(feeder) = enough_feeder.upgrade() {
                    stop_feeding(&feeder);
                }
            })
            .build(),
    );

    appsink.set_callbacks(
        gst_app::AppSinkCallbacks::builder()
            .new_sample(|appsink| {
                let _sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                // one star per buffer that made it through the pipeline
                print!("*");
                let _ = std::io::stdout().flush();
                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );

    let main_loop = glib::MainLoop::new(None, false);
    let main_loop_clone = main_loop.clone();
    let bus = pipeline.bus().context("Pipeline has no bus")?;
    let _bus_watch = bus
        .add_watch(move |_, msg| {
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

    pipeline
        .set_state(gst::State::Playing)
        .context("Unable to set the pipeline to the `Playing` state")?;

    main_loop.run();
    println!();

    stop_feeding(&feeder);
    bus::shutdown(&pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_are_contiguous() {
        gst::init().unwrap();
        let mut wave = WaveGenerator::new(SAMPLE_RATE);

        let first = make_chunk(&mut wave).unwrap();
        let second = make_chunk(&mut wave).unwrap();

        assert_eq!(first.size(), CHUNK_SIZE);
        assert_eq!(first.pts(), Some(gst::ClockTime::ZERO));
        assert_eq!(first.pts().unwrap() + first.duration().unwrap(), second.pts().unwrap());
        assert_eq!(wave.num_samples(), (CHUNK_SIZE / 2 * 2) as u64);
    }

    #[test]
    fn poisoned_feeder_can_still_be_stopped() {
        let feeder = Arc::new(Mutex::new(Feeder {
            source_id: None,
            wave: WaveGenerator::new(SAMPLE_RATE),
        }));
        let feeder_clone = feeder.clone();
        let _ = std::thread::spawn(move || {
            let _held = feeder_clone.lock().unwrap();
            panic!("generator blew up");
        })
        .join();
        assert!(feeder.is_poisoned());

        stop_feeding(&feeder);
        let mut guard = lock_feeder(&feeder);
        assert!(guard.source_id.is_none());
        let mut samples = [0i16; 4];
        guard.wave.fill(&mut samples);
        assert_eq!(guard.wave.num_samples(), 4);
    }
}
