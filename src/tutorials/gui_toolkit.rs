use gstreamer as gst;

/// Text view lines for one playbin stream.
pub fn describe_stream_tags(kind: &str, index: i32, tags: &gst::TagListRef) -> Vec<String> {
    let mut lines = vec![format!("{kind} stream {index}:")];
    if let Some(codec) = tags.get::<gst::tags::VideoCodec>() {
        lines.push(format!("    codec: {}", codec.get()));
    }
    if let Some(codec) = tags.get::<gst::tags::AudioCodec>() {
        lines.push(format!("    codec: {}", codec.get()));
    }
    if let Some(lang) = tags.get::<gst::tags::LanguageCode>() {
        lines.push(format!("    language: {}", lang.get()));
    }
    if let Some(bitrate) = tags.get::<gst::tags::Bitrate>() {
        lines.push(format!("    bitrate: {}", bitrate.get()));
    }
    lines
}

#[cfg(not(feature = "tutorial5"))]
pub fn run(_session: &crate::session::Session) -> anyhow::Result<()> {
    Err(crate::error::TutorialError::FeatureDisabled {
        tutorial: "b5",
        features: "tutorial5-x11, tutorial5-wayland or tutorial5-quartz",
    }
    .into())
}

#[cfg(feature = "tutorial5")]
pub use imp::run;

#[cfg(feature = "tutorial5")]
mod imp {
    use std::cell::RefCell;
    use std::rc::Rc;

    use anyhow::{Context, Result, anyhow};
    use gstreamer as gst;
    use gstreamer::prelude::*;
    use gtk::prelude::*;
    use gtk::{gdk, gio, glib};
    use tracing::{error, info, warn};

    use super::describe_stream_tags;
    use crate::bus;
    use crate::session::Session;
    use crate::tutorials::playbin;

    const TAGS_CHANGED: &str = "tags-changed";

    fn post_tags_changed(playbin: &gst::Element) {
        // called from a streaming thread; the bus hands it to the GTK thread
        let msg = gst::message::Application::new(gst::Structure::new_empty(TAGS_CHANGED));
        if playbin.post_message(msg).is_err() {
            warn!("Failed to post {} message", TAGS_CHANGED);
        }
    }

    fn analyze_streams(playbin: &gst::Element, textbuf: &gtk::TextBuffer) {
        let mut text = String::new();
        for kind in ["video", "audio", "text"] {
            let n = playbin.property::<i32>(&format!("n-{kind}"));
            let signal = format!("get-{kind}-tags");
            for i in 0..n {
                let Some(tags) = playbin.emit_by_name::<Option<gst::TagList>>(&signal, &[&i])
                else {
                    continue;
                };
                for line in describe_stream_tags(kind, i, &tags) {
                    text.push_str(&line);
                    text.push('\n');
                }
            }
        }
        textbuf.set_text(&text);
    }

    fn set_state(playbin: &gst::Element, state: gst::State) {
        if let Err(e) = playbin.set_state(state) {
            error!("Unable to set the pipeline to the `{:?}` state: {}", state, e);
        }
    }

    /// Everything that has to be torn down when the application shuts down.
    struct Ui {
        playbin: gst::Element,
        window: gtk::ApplicationWindow,
        refresh_id: Option<glib::SourceId>,
        shutdown_source: glib::Source,
        bus_watch: Option<gst::bus::BusWatchGuard>,
    }

    impl Drop for Ui {
        fn drop(&mut self) {
            self.window.close();
            drop(self.bus_watch.take());
            set_state(&self.playbin, gst::State::Null);
            if let Some(id) = self.refresh_id.take() {
                id.remove();
            }
            self.shutdown_source.destroy();
        }
    }

    fn create_ui(app: &gtk::Application, session: &Session) -> Result<Ui> {
        let playbin = playbin(session.media_uri())?;

        let video_sink = gst::ElementFactory::make("gtk4paintablesink")
            .build()
            .context("Failed to create gtk4paintablesink")?;
        let paintable = video_sink.property::<gdk::Paintable>("paintable");
        playbin.set_property("video-sink", &video_sink);

        for kind in ["video", "audio", "text"] {
            playbin.connect(&format!("{kind}-tags-changed"), false, |args| {
                if let Ok(playbin) = args[0].get::<gst::Element>() {
                    post_tags_changed(&playbin);
                }
                None
            });
        }

        let picture = gtk::Picture::for_paintable(&paintable);
        picture.set_hexpand(true);
        picture.set_vexpand(true);

        let play_button = gtk::Button::from_icon_name("media-playback-start");
        let pipeline = playbin.clone();
        play_button.connect_clicked(move |_| set_state(&pipeline, gst::State::Playing));

        let pause_button = gtk::Button::from_icon_name("media-playback-pause");
        let pipeline = playbin.clone();
        pause_button.connect_clicked(move |_| set_state(&pipeline, gst::State::Paused));

        let stop_button = gtk::Button::from_icon_name("media-playback-stop");
        let pipeline = playbin.clone();
        stop_button.connect_clicked(move |_| set_state(&pipeline, gst::State::Ready));

        let slider = gtk::Scale::with_range(gtk::Orientation::Horizontal, 0.0, 100.0, 1.0);
        slider.set_draw_value(false);
        slider.set_hexpand(true);
        let pipeline = playbin.clone();
        let slider_update_signal_id = slider.connect_value_changed(move |slider| {
            let value = slider.value() as u64;
            if pipeline
                .seek_simple(
                    gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT,
                    gst::ClockTime::from_seconds(value),
                )
                .is_err()
            {
                warn!("Seeking to {} failed", value);
            }
        });

        // once a second, without feeding the update back into a seek
        let pipeline_weak = playbin.downgrade();
        let slider_clone = slider.clone();
        let refresh_id = glib::timeout_add_seconds_local(1, move || {
            let Some(pipeline) = pipeline_weak.upgrade() else {
                return glib::ControlFlow::Break;
            };
            if pipeline.current_state() < gst::State::Paused {
                return glib::ControlFlow::Continue;
            }
            if let Some(duration) = pipeline.query_duration::<gst::ClockTime>() {
                slider_clone.set_range(0.0, duration.seconds() as f64);
            }
            if let Some(position) = pipeline.query_position::<gst::ClockTime>() {
                slider_clone.block_signal(&slider_update_signal_id);
                slider_clone.set_value(position.seconds() as f64);
                slider_clone.unblock_signal(&slider_update_signal_id);
            }
            glib::ControlFlow::Continue
        });

        let controls = gtk::Box::new(gtk::Orientation::Horizontal, 0);
        controls.append(&play_button);
        controls.append(&pause_button);
        controls.append(&stop_button);
        controls.append(&slider);

        let streams_list = gtk::TextView::new();
        streams_list.set_editable(false);

        let hbox = gtk::Box::new(gtk::Orientation::Horizontal, 0);
        hbox.append(&picture);
        hbox.append(&streams_list);

        let main_box = gtk::Box::new(gtk::Orientation::Vertical, 0);
        main_box.append(&hbox);
        main_box.append(&controls);

        let window = gtk::ApplicationWindow::new(app);
        window.set_title(Some("GStreamer GTK integration"));
        window.set_default_size(640, 480);
        window.set_child(Some(&main_box));
        let app_weak = app.downgrade();
        window.connect_close_request(move |_| {
            if let Some(app) = app_weak.upgrade() {
                app.quit();
            }
            glib::Propagation::Proceed
        });

        let bus = playbin.bus().context("Pipeline has no bus")?;
        let app_weak = app.downgrade();
        let pipeline_weak = playbin.downgrade();
        let textbuf = streams_list.buffer();
        let bus_watch = bus
            .add_watch_local(move |_, msg| {
                use gst::MessageView;

                let (Some(app), Some(pipeline)) = (app_weak.upgrade(), pipeline_weak.upgrade())
                else {
                    return glib::ControlFlow::Break;
                };

                match msg.view() {
                    MessageView::Error(err) => {
                        bus::log_error(err);
                        app.quit();
                    }
                    MessageView::Eos(..) => {
                        info!("End-Of-Stream reached");
                        set_state(&pipeline, gst::State::Ready);
                    }
                    MessageView::StateChanged(state_changed) => {
                        if bus::is_from(msg, &pipeline) {
                            info!("State set to {:?}", state_changed.current());
                        }
                    }
                    MessageView::Application(application) => {
                        if application.structure().is_some_and(|s| s.has_name(TAGS_CHANGED)) {
                            analyze_streams(&pipeline, &textbuf);
                        }
                    }
                    _ => (),
                }
                glib::ControlFlow::Continue
            })
            .context("Failed to add bus watch")?;

        let app_weak = app.downgrade();
        let main_context = glib::MainContext::default();
        let shutdown_source = session.on_shutdown_local(&main_context, move || {
            if let Some(app) = app_weak.upgrade() {
                info!("Shutdown requested, closing window");
                app.quit();
            }
        });

        window.present();

        playbin
            .set_state(gst::State::Playing)
            .context("Unable to set the pipeline to the `Playing` state")?;

        Ok(Ui {
            playbin,
            window,
            refresh_id: Some(refresh_id),
            shutdown_source,
            bus_watch: Some(bus_watch),
        })
    }

    /// Playbin rendered into a GTK4 window with transport controls, a seek
    /// slider and a list of the streams' tags.
    pub fn run(session: &Session) -> Result<()> {
        gst::init().context("Failed to init gstreamer")?;
        gtk::init().context("Failed to initialize GTK")?;
        gstgtk4::plugin_register_static().context("Failed to register gstgtk4 plugin")?;

        let app = gtk::Application::new(None::<&str>, gio::ApplicationFlags::default());

        let ui: Rc<RefCell<Option<Ui>>> = Rc::new(RefCell::new(None));
        let failure: Rc<RefCell<Option<anyhow::Error>>> = Rc::new(RefCell::new(None));

        {
            let ui = ui.clone();
            let failure = failure.clone();
            let session = session.clone();
            app.connect_activate(move |app| match create_ui(app, &session) {
                Ok(created) => *ui.borrow_mut() = Some(created),
                Err(e) => {
                    *failure.borrow_mut() = Some(e);
                    app.quit();
                }
            });
        }
        {
            let ui = ui.clone();
            app.connect_shutdown(move |_| drop(ui.borrow_mut().take()));
        }

        // our own arguments were parsed already, GTK gets none of them
        let res = app.run_with_args::<&str>(&[]);
        drop(ui.borrow_mut().take());

        if let Some(e) = failure.borrow_mut().take() {
            return Err(e);
        }
        if res != glib::ExitCode::SUCCESS {
            return Err(anyhow!("GTK application exited with {:?}", res));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_tags_are_listed() {
        gst::init().unwrap();
        let mut tags = gst::TagList::new();
        {
            let tags = tags.get_mut().unwrap();
            tags.add::<gst::tags::AudioCodec>(&"Vorbis", gst::TagMergeMode::Replace);
            tags.add::<gst::tags::LanguageCode>(&"en", gst::TagMergeMode::Replace);
            tags.add::<gst::tags::Bitrate>(&80_000, gst::TagMergeMode::Replace);
        }

        let lines = describe_stream_tags("audio", 1, &tags);
        assert_eq!(
            lines,
            vec![
                "audio stream 1:",
                "    codec: Vorbis",
                "    language: en",
                "    bitrate: 80000",
            ]
        );
    }
}
