//! Reference for the properties GstBaseSrc and GstBaseSink give every
//! source and sink element, and helpers to apply configured overrides.

use anyhow::Result;
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use gstreamer_base as gst_base;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::{BaseSinkSettings, BaseSrcSettings};
use crate::error::TutorialError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseClass {
    Src,
    Sink,
}

impl BaseClass {
    pub fn type_name(&self) -> &'static str {
        match self {
            BaseClass::Src => "GstBaseSrc",
            BaseClass::Sink => "GstBaseSink",
        }
    }

    fn glib_type(&self) -> glib::Type {
        match self {
            BaseClass::Src => gst_base::BaseSrc::static_type(),
            BaseClass::Sink => gst_base::BaseSink::static_type(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyDoc {
    pub name: &'static str,
    pub value_type: &'static str,
    pub default: &'static str,
    pub summary: &'static str,
}

const fn doc(
    name: &'static str,
    value_type: &'static str,
    default: &'static str,
    summary: &'static str,
) -> PropertyDoc {
    PropertyDoc {
        name,
        value_type,
        default,
        summary,
    }
}

static BASE_SRC_PROPERTIES: [PropertyDoc; 5] = [
    doc(
        "blocksize",
        "guint",
        "4096",
        "Size in bytes to read per buffer, -1 = default",
    ),
    doc(
        "num-buffers",
        "gint",
        "-1",
        "Number of buffers to output before sending EOS, -1 = unlimited",
    ),
    doc(
        "typefind",
        "gboolean",
        "false",
        "Run typefind before negotiating (deprecated, non-functional)",
    ),
    doc(
        "do-timestamp",
        "gboolean",
        "false",
        "Apply current stream time to buffers; useful for live sources",
    ),
    doc(
        "automatic-eos",
        "gboolean",
        "true",
        "Automatically go EOS when the configured size is reached",
    ),
];

static BASE_SINK_PROPERTIES: [PropertyDoc; 13] = [
    doc(
        "sync",
        "gboolean",
        "true",
        "Synchronize rendering to the clock",
    ),
    doc(
        "max-lateness",
        "gint64",
        "-1",
        "Maximum ns a buffer can be late before it is dropped, -1 = unlimited",
    ),
    doc(
        "qos",
        "gboolean",
        "false",
        "Generate quality-of-service events upstream",
    ),
    doc(
        "async",
        "gboolean",
        "true",
        "Go asynchronously to PAUSED (preroll)",
    ),
    doc(
        "ts-offset",
        "gint64",
        "0",
        "Timestamp offset in ns applied for final synchronisation",
    ),
    doc(
        "enable-last-sample",
        "gboolean",
        "true",
        "Keep a reference to the last sample rendered",
    ),
    doc(
        "last-sample",
        "GstSample",
        "NULL",
        "The last sample received by the sink (read-only)",
    ),
    doc(
        "blocksize",
        "guint",
        "4096",
        "Size in bytes to pull per buffer in pull mode",
    ),
    doc(
        "render-delay",
        "guint64",
        "0",
        "Additional ns to render ahead of the clock",
    ),
    doc(
        "throttle-time",
        "guint64",
        "0",
        "Minimum ns between consecutive rendered buffers, 0 = disabled",
    ),
    doc(
        "max-bitrate",
        "guint64",
        "0",
        "Maximum bits per second to render, 0 = disabled",
    ),
    doc(
        "processing-deadline",
        "guint64",
        "20000000",
        "Maximum processing time in ns for a buffer in a live pipeline",
    ),
    doc(
        "stats",
        "GstStructure",
        "",
        "Sink statistics: rendered and dropped counts, average rate (read-only)",
    ),
];

pub fn catalogue(class: BaseClass) -> &'static [PropertyDoc] {
    match class {
        BaseClass::Src => &BASE_SRC_PROPERTIES,
        BaseClass::Sink => &BASE_SINK_PROPERTIES,
    }
}

pub fn lookup(class: BaseClass, name: &str) -> Option<&'static PropertyDoc> {
    catalogue(class).iter().find(|p| p.name == name)
}

pub fn base_class_of(element: &gst::Element) -> Option<BaseClass> {
    if element.is::<gst_base::BaseSrc>() {
        Some(BaseClass::Src)
    } else if element.is::<gst_base::BaseSink>() {
        Some(BaseClass::Sink)
    } else {
        None
    }
}

fn ms_to_ns_signed(ms: i64) -> i64 {
    ms.saturating_mul(1_000_000)
}

fn ms_to_ns(ms: u64) -> u64 {
    ms.saturating_mul(1_000_000)
}

impl BaseSrcSettings {
    /// Property assignments for every configured field.
    pub fn to_assignments(&self) -> Vec<(&'static str, glib::Value)> {
        let mut out = Vec::new();
        if let Some(v) = self.blocksize {
            out.push(("blocksize", v.to_value()));
        }
        if let Some(v) = self.num_buffers {
            out.push(("num-buffers", v.to_value()));
        }
        if let Some(v) = self.do_timestamp {
            out.push(("do-timestamp", v.to_value()));
        }
        if let Some(v) = self.automatic_eos {
            out.push(("automatic-eos", v.to_value()));
        }
        out
    }
}

impl BaseSinkSettings {
    pub fn to_assignments(&self) -> Vec<(&'static str, glib::Value)> {
        let mut out = Vec::new();
        if let Some(v) = self.sync {
            out.push(("sync", v.to_value()));
        }
        if let Some(v) = self.max_lateness_ms {
            // -1 means unlimited and is passed through untouched
            let ns = if v < 0 { -1 } else { ms_to_ns_signed(v) };
            out.push(("max-lateness", ns.to_value()));
        }
        if let Some(v) = self.qos {
            out.push(("qos", v.to_value()));
        }
        if let Some(v) = self.async_state_change {
            out.push(("async", v.to_value()));
        }
        if let Some(v) = self.ts_offset_ms {
            out.push(("ts-offset", ms_to_ns_signed(v).to_value()));
        }
        if let Some(v) = self.enable_last_sample {
            out.push(("enable-last-sample", v.to_value()));
        }
        if let Some(v) = self.blocksize {
            out.push(("blocksize", v.to_value()));
        }
        if let Some(v) = self.render_delay_ms {
            out.push(("render-delay", ms_to_ns(v).to_value()));
        }
        if let Some(v) = self.throttle_time_ms {
            out.push(("throttle-time", ms_to_ns(v).to_value()));
        }
        if let Some(v) = self.max_bitrate {
            out.push(("max-bitrate", v.to_value()));
        }
        if let Some(v) = self.processing_deadline_ms {
            out.push(("processing-deadline", ms_to_ns(v).to_value()));
        }
        out
    }
}

/// Type and numeric range check against the property's pspec; setting a
/// value the pspec rejects would panic.
fn value_fits(pspec: &glib::ParamSpec, value: &glib::Value) -> bool {
    if !value.type_().is_a(pspec.value_type()) {
        return false;
    }
    if let Some(p) = pspec.downcast_ref::<glib::ParamSpecInt>() {
        return value
            .get::<i32>()
            .is_ok_and(|v| (p.minimum()..=p.maximum()).contains(&v));
    }
    if let Some(p) = pspec.downcast_ref::<glib::ParamSpecUInt>() {
        return value
            .get::<u32>()
            .is_ok_and(|v| (p.minimum()..=p.maximum()).contains(&v));
    }
    if let Some(p) = pspec.downcast_ref::<glib::ParamSpecInt64>() {
        return value
            .get::<i64>()
            .is_ok_and(|v| (p.minimum()..=p.maximum()).contains(&v));
    }
    if let Some(p) = pspec.downcast_ref::<glib::ParamSpecUInt64>() {
        return value
            .get::<u64>()
            .is_ok_and(|v| (p.minimum()..=p.maximum()).contains(&v));
    }
    true
}

fn apply(
    element: &gst::Element,
    class: BaseClass,
    assignments: Vec<(&'static str, glib::Value)>,
) -> Result<Vec<&'static str>> {
    if base_class_of(element) != Some(class) {
        return Err(TutorialError::NotBaseClass {
            element: element.name().to_string(),
            expected: class.type_name(),
        }
        .into());
    }

    let mut applied = Vec::with_capacity(assignments.len());
    for (name, value) in assignments {
        // automatic-eos only exists since GStreamer 1.24
        let Some(pspec) = element.find_property(name) else {
            warn!("{} has no property {}, skipping", element.name(), name);
            continue;
        };
        if !value_fits(&pspec, &value) {
            return Err(TutorialError::Config(format!(
                "{:?} is not a valid value for {}::{}",
                value,
                element.name(),
                name
            ))
            .into());
        }
        debug!("Setting {}::{} = {:?}", element.name(), name, value);
        element.set_property_from_value(name, &value);
        applied.push(name);
    }
    Ok(applied)
}

pub fn apply_base_src(
    element: &gst::Element,
    settings: &BaseSrcSettings,
) -> Result<Vec<&'static str>> {
    apply(element, BaseClass::Src, settings.to_assignments())
}

pub fn apply_base_sink(
    element: &gst::Element,
    settings: &BaseSinkSettings,
) -> Result<Vec<&'static str>> {
    apply(element, BaseClass::Sink, settings.to_assignments())
}

/// One line of `props` output.
#[derive(Debug, Clone)]
pub struct PropertyRow {
    pub name: String,
    pub type_name: String,
    pub readable: bool,
    pub writable: bool,
    pub value: Option<String>,
    pub blurb: Option<String>,
    /// Set when the property is declared by GstBaseSrc or GstBaseSink.
    pub inherited_from: Option<BaseClass>,
}

impl PropertyRow {
    pub fn catalogue_doc(&self) -> Option<&'static PropertyDoc> {
        self.inherited_from.and_then(|class| lookup(class, &self.name))
    }
}

fn serialize_value(value: &glib::Value) -> String {
    match value.serialize() {
        Ok(s) => s.to_string(),
        Err(_) => format!("{:?}", value),
    }
}

pub fn describe_properties(element: &gst::Element, filter: Option<&Regex>) -> Vec<PropertyRow> {
    let mut rows = Vec::new();

    for pspec in element.list_properties().iter() {
        let name = pspec.name();
        if let Some(filter) = filter {
            if !filter.is_match(name) {
                continue;
            }
        }

        let flags = pspec.flags();
        let readable = flags.contains(glib::ParamFlags::READABLE);
        let writable = flags.contains(glib::ParamFlags::WRITABLE);
        let value = readable.then(|| serialize_value(&element.property_value(name)));

        let owner = pspec.owner_type();
        let inherited_from = [BaseClass::Src, BaseClass::Sink]
            .into_iter()
            .find(|class| class.glib_type() == owner);

        rows.push(PropertyRow {
            name: name.to_string(),
            type_name: pspec.value_type().name().to_string(),
            readable,
            writable,
            value,
            blurb: pspec.blurb().map(str::to_string),
            inherited_from,
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        gst::init().unwrap();
    }

    #[test]
    fn catalogue_covers_documented_knobs() {
        for name in ["blocksize", "do-timestamp", "num-buffers"] {
            assert!(lookup(BaseClass::Src, name).is_some(), "{name}");
        }
        for name in ["sync", "qos", "ts-offset", "max-lateness", "async"] {
            assert!(lookup(BaseClass::Sink, name).is_some(), "{name}");
        }
        assert!(lookup(BaseClass::Src, "qos").is_none());
    }

    #[test]
    fn unset_settings_assign_nothing() {
        assert!(BaseSrcSettings::default().to_assignments().is_empty());
        assert!(BaseSinkSettings::default().to_assignments().is_empty());
    }

    #[test]
    fn sink_durations_are_converted_to_nanoseconds() {
        let settings = BaseSinkSettings {
            ts_offset_ms: Some(-40),
            render_delay_ms: Some(5),
            max_lateness_ms: Some(-1),
            async_state_change: Some(false),
            ..Default::default()
        };
        let assignments = settings.to_assignments();
        let get = |name: &str| {
            assignments
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };

        assert_eq!(get("ts-offset").get::<i64>().unwrap(), -40_000_000);
        assert_eq!(get("render-delay").get::<u64>().unwrap(), 5_000_000);
        assert_eq!(get("max-lateness").get::<i64>().unwrap(), -1);
        assert!(!get("async").get::<bool>().unwrap());
    }

    #[test]
    fn applies_src_settings_to_fakesrc() {
        init();
        let src = gst::ElementFactory::make("fakesrc").build().unwrap();
        assert_eq!(base_class_of(&src), Some(BaseClass::Src));

        let settings = BaseSrcSettings {
            blocksize: Some(512),
            num_buffers: Some(10),
            do_timestamp: Some(true),
            ..Default::default()
        };
        let applied = apply_base_src(&src, &settings).unwrap();

        assert_eq!(applied, vec!["blocksize", "num-buffers", "do-timestamp"]);
        assert_eq!(src.property::<u32>("blocksize"), 512);
        assert_eq!(src.property::<i32>("num-buffers"), 10);
        assert!(src.property::<bool>("do-timestamp"));
    }

    #[test]
    fn out_of_range_value_is_an_error() {
        init();
        let src = gst::ElementFactory::make("fakesrc").build().unwrap();

        let settings = BaseSrcSettings {
            num_buffers: Some(-2),
            ..Default::default()
        };
        let err = apply_base_src(&src, &settings).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TutorialError>(),
            Some(TutorialError::Config(msg)) if msg.contains("num-buffers")
        ));
        assert_eq!(src.property::<i32>("num-buffers"), -1);
    }

    #[test]
    fn applies_sink_settings_to_fakesink() {
        init();
        let sink = gst::ElementFactory::make("fakesink").build().unwrap();

        let settings = BaseSinkSettings {
            sync: Some(false),
            qos: Some(true),
            ts_offset_ms: Some(15),
            ..Default::default()
        };
        apply_base_sink(&sink, &settings).unwrap();

        assert!(!sink.property::<bool>("sync"));
        assert!(sink.property::<bool>("qos"));
        assert_eq!(sink.property::<i64>("ts-offset"), 15_000_000);
    }

    #[test]
    fn rejects_wrong_base_class() {
        init();
        let src = gst::ElementFactory::make("fakesrc").build().unwrap();
        let err = apply_base_sink(&src, &BaseSinkSettings::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TutorialError>(),
            Some(TutorialError::NotBaseClass { .. })
        ));
    }

    #[test]
    fn describe_marks_inherited_properties() {
        init();
        let sink = gst::ElementFactory::make("fakesink").build().unwrap();
        let rows = describe_properties(&sink, None);

        let sync = rows.iter().find(|r| r.name == "sync").unwrap();
        assert_eq!(sync.inherited_from, Some(BaseClass::Sink));
        assert!(sync.catalogue_doc().is_some());
        assert_eq!(sync.value.as_deref(), Some("false"));

        let dump = rows.iter().find(|r| r.name == "dump").unwrap();
        assert_eq!(dump.inherited_from, None);

        let filter = Regex::new("^ts-").unwrap();
        let rows = describe_properties(&sink, Some(&filter));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "ts-offset");
    }
}
