use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gstreamer as gst;
use gst::glib;
use gst::glib::thread_guard::ThreadGuard;
use tracing::info;

use crate::config::AppConfig;
use crate::constants::POLL_INTERVAL;

/// Everything a tutorial needs besides its own arguments.
#[derive(Clone)]
pub struct Session {
    config: AppConfig,
    running: Arc<AtomicBool>,
}

impl Session {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn media_uri(&self) -> &str {
        &self.config.media.uri
    }

    /// Shared flag, cleared by the signal thread.
    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Quits `main_loop` once a shutdown was requested. The source is
    /// attached to the loop's own context and removes itself after firing.
    pub fn quit_on_shutdown(&self, main_loop: &glib::MainLoop) -> glib::Source {
        let running = self.running.clone();
        let main_loop_clone = main_loop.clone();
        let source = glib::timeout_source_new(
            POLL_INTERVAL,
            Some("quit-on-shutdown"),
            glib::Priority::DEFAULT,
            move || {
                if running.load(Ordering::SeqCst) {
                    return glib::ControlFlow::Continue;
                }
                info!("Shutdown requested, leaving main loop");
                main_loop_clone.quit();
                glib::ControlFlow::Break
            },
        );
        source.attach(Some(&main_loop.context()));
        source
    }

    /// Runs `on_shutdown` once after a shutdown was requested, on the thread
    /// owning `context`. The source stays attached until the caller destroys
    /// it, so tearing it down later is always valid.
    pub fn on_shutdown_local<F>(
        &self,
        context: &glib::MainContext,
        on_shutdown: F,
    ) -> glib::Source
    where
        F: FnOnce() + 'static,
    {
        let running = self.running.clone();
        let mut on_shutdown = ThreadGuard::new(Some(on_shutdown));
        let source = glib::timeout_source_new(
            POLL_INTERVAL,
            Some("on-shutdown"),
            glib::Priority::DEFAULT,
            move || {
                if !running.load(Ordering::SeqCst) {
                    if let Some(f) = on_shutdown.get_mut().take() {
                        f();
                    }
                }
                glib::ControlFlow::Continue
            },
        );
        source.attach(Some(context));
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_is_visible_through_shared_flag() {
        let session = Session::new(AppConfig::default());
        let flag = session.running();
        assert!(session.is_running());

        flag.store(false, Ordering::SeqCst);
        assert!(!session.is_running());
    }

    #[test]
    fn media_uri_comes_from_config() {
        let mut cfg = AppConfig::default();
        cfg.media.uri = "file:///tmp/clip.webm".into();
        let session = Session::new(cfg);
        assert_eq!(session.media_uri(), "file:///tmp/clip.webm");
    }

    #[test]
    fn main_loop_quits_after_shutdown() {
        let context = glib::MainContext::new();
        let main_loop = glib::MainLoop::new(Some(&context), false);
        let session = Session::new(AppConfig::default());
        session.request_shutdown();

        let source = session.quit_on_shutdown(&main_loop);
        main_loop.run();

        assert!(!main_loop.is_running());
        assert!(source.is_destroyed());
    }

    #[test]
    fn shutdown_callback_fires_once_and_keeps_its_source() {
        let context = glib::MainContext::new();
        let _owner = context.acquire().unwrap();
        let session = Session::new(AppConfig::default());
        session.request_shutdown();

        let calls = std::rc::Rc::new(std::cell::Cell::new(0));
        let calls_clone = calls.clone();
        let source = session.on_shutdown_local(&context, move || {
            calls_clone.set(calls_clone.get() + 1);
        });

        for _ in 0..3 {
            context.iteration(true);
        }
        assert_eq!(calls.get(), 1);

        // still attached; destroying it from the owner is fine
        assert!(!source.is_destroyed());
        source.destroy();
        assert!(source.is_destroyed());
    }
}
