use std::process;
use std::sync::atomic::Ordering;
use std::thread;

use anyhow::Result;
use clap::Parser;
use signal_hook::consts::signal::*;
use signal_hook::iterator::Signals;
use tracing::{error, info, warn};

use gst_learn::cli::Opt;
use gst_learn::session::Session;
use gst_learn::{log, tutorials, utils};

fn run(opt: Opt) -> Result<()> {
    let mut config = utils::load_config_or_default(opt.config.as_deref())?;
    if let Some(uri) = opt.uri {
        config.media.uri = uri;
        config.validate()?;
    }

    log::setup_trace_logging(log::resolve_level(opt.verbose, config.log_level.as_deref()))?;

    let session = Session::new(config);

    let running = session.running();
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGQUIT, SIGHUP])?;

    // First signal asks the tutorial to wind down, a second one exits
    thread::spawn(move || {
        for sig in signals.forever() {
            if running.swap(false, Ordering::SeqCst) {
                info!("Received signal {}, shutting down", sig);
            } else {
                warn!("Received signal {} again, exiting now", sig);
                process::exit(128 + sig);
            }
        }
    });

    tutorials::run(&opt.tid, &session)
}

fn main() {
    let opt = Opt::parse();

    if let Err(e) = run(opt) {
        // config errors happen before the subscriber is installed
        if tracing::dispatcher::has_been_set() {
            error!("{:#}", e);
        } else {
            eprintln!("Error: {:#}", e);
        }
        process::exit(1);
    }
}
