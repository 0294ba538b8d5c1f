use anyhow::Result;
use gstreamer as gst;
use regex::Regex;
use tracing::info;

use crate::base_props::{PropertyRow, base_class_of, describe_properties};
use crate::error::TutorialError;

pub fn compile_filter(pattern: Option<&str>) -> Result<Option<Regex>, TutorialError> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|source| TutorialError::InvalidFilter {
                pattern: p.to_string(),
                source,
            })
        })
        .transpose()
}

fn access(row: &PropertyRow) -> &'static str {
    match (row.readable, row.writable) {
        (true, true) => "rw",
        (true, false) => "r-",
        (false, true) => "-w",
        (false, false) => "--",
    }
}

/// `name [rw] type = value (GstBaseSink)`
pub fn format_row(row: &PropertyRow) -> String {
    let mut line = format!("{} [{}] {}", row.name, access(row), row.type_name);
    if let Some(value) = &row.value {
        line.push_str(" = ");
        line.push_str(value);
    }
    if let Some(class) = row.inherited_from {
        line.push_str(&format!(" ({})", class.type_name()));
    }
    line
}

/// Lists the properties of one element, pointing out the ones it gets from
/// GstBaseSrc or GstBaseSink.
pub fn run(element: &str, filter: Option<&str>) -> Result<()> {
    gst::init()?;

    let filter = compile_filter(filter)?;
    let instance = gst::ElementFactory::make(element)
        .build()
        .map_err(|_| TutorialError::MissingElement(element.to_string()))?;

    match base_class_of(&instance) {
        Some(class) => info!("{} is a {}", element, class.type_name()),
        None => info!("{} is neither a GstBaseSrc nor a GstBaseSink", element),
    }

    let rows = describe_properties(&instance, filter.as_ref());
    for row in &rows {
        info!("{}", format_row(row));
        if let Some(blurb) = &row.blurb {
            info!("    {}", blurb);
        }
        if let Some(doc) = row.catalogue_doc() {
            info!("    default {}: {}", doc.default, doc.summary);
        }
    }
    info!("{} properties listed", rows.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_props::BaseClass;

    #[test]
    fn bad_filter_is_reported() {
        let err = compile_filter(Some("sync(")).unwrap_err();
        assert!(matches!(
            err,
            TutorialError::InvalidFilter { ref pattern, .. } if pattern == "sync("
        ));
        assert!(compile_filter(None).unwrap().is_none());
    }

    #[test]
    fn unknown_element_fails() {
        let err = run("no-such-element-anywhere", None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TutorialError>(),
            Some(TutorialError::MissingElement(name)) if name == "no-such-element-anywhere"
        ));
    }

    #[test]
    fn sink_properties_are_marked() {
        gst::init().unwrap();
        let sink = gst::ElementFactory::make("fakesink").build().unwrap();
        let filter = compile_filter(Some("^sync$")).unwrap();

        let rows = describe_properties(&sink, filter.as_ref());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].inherited_from, Some(BaseClass::Sink));
        assert_eq!(format_row(&rows[0]), "sync [rw] gboolean = false (GstBaseSink)");
    }
}
