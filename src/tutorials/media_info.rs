use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use gstreamer_pbutils::prelude::*;
use gstreamer_pbutils::{
    Discoverer, DiscovererContainerInfo, DiscovererInfo, DiscovererResult, DiscovererStreamInfo,
};
use tracing::{info, warn};

use crate::session::Session;

fn send_value_as_str(v: &glib::SendValue) -> Option<String> {
    if let Ok(s) = v.get::<&str>() {
        Some(s.to_string())
    } else if let Ok(serialized) = v.serialize() {
        Some(serialized.into())
    } else {
        None
    }
}

/// `tag: v1, v2`
pub fn join_tag_values<I>(tag: &str, values: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let values: Vec<String> = values.into_iter().collect();
    format!("{tag}: {}", values.join(", "))
}

/// Indentation used for a node of the stream topology.
pub fn indent(depth: usize) -> String {
    " ".repeat(2 * depth)
}

fn print_tags(tags: &gst::TagListRef, depth: usize) {
    for (tag, values) in tags.iter_generic() {
        let line = join_tag_values(tag, values.filter_map(send_value_as_str));
        info!("{}{}", indent(depth), line);
    }
}

fn print_stream_info(info: &DiscovererStreamInfo, depth: usize) {
    let caps_str = match info.caps() {
        Some(caps) if caps.is_fixed() => caps
            .structure(0)
            .map(|s| s.name().to_string())
            .unwrap_or_default(),
        Some(caps) => caps.to_string(),
        None => String::new(),
    };

    info!("{}{}: {}", indent(depth), info.stream_type_nick(), caps_str);

    if let Some(tags) = info.tags() {
        info!("{}Tags:", indent(depth));
        print_tags(&tags, depth + 2);
    }
}

fn print_topology(info: &DiscovererStreamInfo, depth: usize) {
    print_stream_info(info, depth);

    if let Some(next) = info.next() {
        print_topology(&next, depth + 1);
    } else if let Some(container_info) = info.downcast_ref::<DiscovererContainerInfo>() {
        for stream in container_info.streams() {
            print_topology(&stream, depth + 1);
        }
    }
}

fn on_discovered(discoverer_info: &DiscovererInfo, error: Option<&glib::Error>) {
    let uri = discoverer_info.uri();
    match discoverer_info.result() {
        DiscovererResult::Ok => info!("Discovered {uri}"),
        DiscovererResult::UriInvalid => warn!("Invalid URI {uri}"),
        DiscovererResult::Error => match error {
            Some(err) => warn!("Discoverer error: {err}"),
            None => warn!("Unknown error"),
        },
        DiscovererResult::Timeout => warn!("Timeout"),
        DiscovererResult::Busy => warn!("Busy"),
        DiscovererResult::MissingPlugins => {
            for detail in discoverer_info.missing_elements_installer_details() {
                warn!("Missing plugin: {detail}");
            }
        }
        _ => warn!("Unknown result"),
    }

    if discoverer_info.result() != DiscovererResult::Ok {
        return;
    }

    info!("Duration: {}", discoverer_info.duration().display());

    if let Some(tags) = discoverer_info.tags() {
        info!("Tags:");
        print_tags(&tags, 1);
    }

    info!(
        "Seekable: {}",
        if discoverer_info.is_seekable() { "yes" } else { "no" }
    );

    info!("Stream information:");
    if let Some(stream_info) = discoverer_info.stream_info() {
        print_topology(&stream_info, 1);
    }
}

/// Asynchronous discovery of codecs, tags and stream topology of one URI.
pub fn run(session: &Session, uri: &str) -> Result<()> {
    gst::init().context("Failed to init gstreamer")?;

    info!("Discovering {uri}");

    let timeout = gst::ClockTime::from_seconds(session.config().discover.timeout_secs);
    let discoverer = Discoverer::new(timeout).context("Failed to create discoverer")?;

    let main_loop = glib::MainLoop::new(None, false);
    discoverer.connect_discovered(|_, info, error| on_discovered(info, error));
    let main_loop_clone = main_loop.clone();
    discoverer.connect_finished(move |_| {
        info!("Finished discovering");
        main_loop_clone.quit();
    });
    session.quit_on_shutdown(&main_loop);

    discoverer.start();
    discoverer
        .discover_uri_async(uri)
        .with_context(|| format!("Failed to start discovering {uri}"))?;

    main_loop.run();
    discoverer.stop();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_values_are_comma_joined() {
        let line = join_tag_values("title", vec!["a".to_string(), "b".to_string()]);
        assert_eq!(line, "title: a, b");
        assert_eq!(join_tag_values("empty", Vec::new()), "empty: ");
    }

    #[test]
    fn topology_indents_two_spaces_per_level() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "    ");
    }
}
