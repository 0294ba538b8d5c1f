use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{error, info};

use crate::bus::{self, BusEvent, PipelineGuard};
use crate::error::TutorialError;
use crate::session::Session;

/// Human readable lines for a caps set, one per structure and one per field.
pub fn describe_caps(caps: &gst::CapsRef, prefix: &str) -> Vec<String> {
    if caps.is_any() {
        return vec![format!("{prefix}ANY")];
    }
    if caps.is_empty() {
        return vec![format!("{prefix}EMPTY")];
    }

    let mut lines = Vec::new();
    for structure in caps.iter() {
        lines.push(format!("{prefix}{}", structure.name()));
        for (field, value) in structure.iter() {
            let value = value
                .serialize()
                .map(|s| s.to_string())
                .unwrap_or_else(|_| format!("{:?}", value));
            lines.push(format!("{prefix}  {field}:{value}"));
        }
    }
    lines
}

fn print_caps(caps: &gst::CapsRef, prefix: &str) {
    for line in describe_caps(caps, prefix) {
        info!("{line}");
    }
}

fn direction_label(direction: gst::PadDirection) -> &'static str {
    match direction {
        gst::PadDirection::Src => "SRC",
        gst::PadDirection::Sink => "SINK",
        _ => "UNKNOWN!!!",
    }
}

fn presence_label(presence: gst::PadPresence) -> &'static str {
    match presence {
        gst::PadPresence::Always => "Always",
        gst::PadPresence::Sometimes => "Sometimes",
        gst::PadPresence::Request => "On request",
        _ => "UNKNOWN!!!",
    }
}

fn print_pad_template_information(factory: &gst::ElementFactory) {
    let long_name = factory.metadata("long-name").unwrap_or("<unnamed>");
    info!("Pad Templates for {long_name}:");
    if factory.num_pad_templates() == 0 {
        info!("  None");
        return;
    }

    for pad_template in factory.static_pad_templates() {
        info!(
            "  {} template: '{}'",
            direction_label(pad_template.direction()),
            pad_template.name_template()
        );
        info!("    Availability: {}", presence_label(pad_template.presence()));

        info!("    Capabilities:");
        print_caps(&pad_template.caps(), "      ");
    }
}

/// Negotiated caps if any, otherwise what the pad could accept.
fn print_pad_capabilities(element: &gst::Element, pad_name: &str) {
    let Some(pad) = element.static_pad(pad_name) else {
        error!("Could not retrieve pad '{}'", pad_name);
        return;
    };

    info!("Caps for the {} pad:", pad_name);
    let caps = pad.current_caps().unwrap_or_else(|| pad.query_caps(None));
    print_caps(&caps, "      ");
}

fn find_factory(name: &str) -> Result<gst::ElementFactory> {
    gst::ElementFactory::find(name)
        .ok_or_else(|| TutorialError::MissingElement(name.to_string()).into())
}

/// Shows pad templates of two factories and how caps get fixed while the
/// pipeline goes up to PLAYING.
pub fn run(session: &Session) -> Result<()> {
    gst::init().context("Failed to init gstreamer")?;

    let source_factory = find_factory("audiotestsrc")?;
    let sink_factory = find_factory("autoaudiosink")?;

    print_pad_template_information(&source_factory);
    print_pad_template_information(&sink_factory);

    let source = source_factory
        .create()
        .name("source")
        .build()
        .context("Failed to create source element")?;
    let sink = sink_factory
        .create()
        .name("sink")
        .build()
        .context("Failed to create sink element")?;

    let pipeline = gst::Pipeline::with_name("test-pipeline");
    let _guard = PipelineGuard::new(&pipeline);

    pipeline
        .add_many([&source, &sink])
        .context("Failed to add elements to pipeline")?;
    source
        .link(&sink)
        .context("Elements could not be linked")?;

    info!("In NULL state:");
    print_pad_capabilities(&sink, "sink");

    pipeline
        .set_state(gst::State::Playing)
        .context("Unable to set the pipeline to the `Playing` state")?;

    bus::run_until_eos(session, &pipeline, |msg| {
        if let Some(msg) = msg {
            if let gst::MessageView::StateChanged(state_changed) = msg.view() {
                if bus::is_from(msg, &pipeline) {
                    info!(
                        "Pipeline state changed from {:?} to {:?}",
                        state_changed.old(),
                        state_changed.current()
                    );
                    print_pad_capabilities(&sink, "sink");
                }
            }
        }
        Ok(BusEvent::Continue)
    })?;

    bus::shutdown(&pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_and_empty_caps() {
        gst::init().unwrap();
        assert_eq!(describe_caps(&gst::Caps::new_any(), "  "), vec!["  ANY"]);
        assert_eq!(describe_caps(&gst::Caps::new_empty(), ""), vec!["EMPTY"]);
    }

    #[test]
    fn structures_and_fields_are_listed() {
        gst::init().unwrap();
        let caps = gst::Caps::builder("audio/x-raw")
            .field("rate", 44_100i32)
            .field("channels", 2i32)
            .build();

        let lines = describe_caps(&caps, "> ");
        assert_eq!(lines[0], "> audio/x-raw");
        assert!(lines.contains(&">   rate:44100".to_string()));
        assert!(lines.contains(&">   channels:2".to_string()));
        assert_eq!(lines.len(), 3);
    }
}
