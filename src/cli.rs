use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Walks through the GStreamer tutorials", long_about = None)]
pub struct Opt {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Media URI used by the playbin based tutorials
    #[arg(long, global = true)]
    pub uri: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub tid: Tutorial,
}

/// B? = basic tutorial, T? = own experiments, P? = plugin tutorial
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Tutorial {
    /// Basic tutorial 1: hello world
    #[command(alias = "B1")]
    B1,
    /// Basic tutorial 2: GStreamer concepts
    #[command(alias = "B2")]
    B2,
    /// Basic tutorial 3: dynamic pipelines
    #[command(alias = "B3")]
    B3,
    /// Basic tutorial 4: time management
    #[command(alias = "B4")]
    B4,
    /// Basic tutorial 5: GUI toolkit integration
    #[command(alias = "B5")]
    B5,
    /// Basic tutorial 6: media formats and pad capabilities
    #[command(alias = "B6")]
    B6,
    /// Basic tutorial 7: multithreading and pad availability
    #[command(alias = "B7")]
    B7,
    /// Basic tutorial 8: short-cutting the pipeline
    #[command(alias = "B8")]
    B8,
    /// Basic tutorial 9: media information gathering
    #[command(alias = "B9")]
    B9 {
        /// URI to discover, defaults to the configured media URI
        uri: Option<String>,
    },
    /// Basic tutorial 12: streaming
    #[command(alias = "B12")]
    B12,
    /// Basic tutorial 13: playback speed
    #[command(alias = "B13")]
    B13,
    /// Live test source preview with sample metadata
    #[command(alias = "T1")]
    T1,
    /// Plugin tutorial: RGB to grayscale filter
    #[command(alias = "P1")]
    P1 {
        /// Invert the grayscale output
        #[arg(long)]
        invert: bool,
        /// Shift the grayscale output, wrapping around
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=255))]
        shift: u32,
    },
    /// List an element's properties, marking GstBaseSrc/GstBaseSink ones
    Props {
        /// Element factory name, e.g. videotestsrc
        element: String,
        /// Only show properties whose name matches this regex
        #[arg(long)]
        filter: Option<String>,
    },
}

impl Tutorial {
    pub fn id(&self) -> &'static str {
        match self {
            Tutorial::B1 => "b1",
            Tutorial::B2 => "b2",
            Tutorial::B3 => "b3",
            Tutorial::B4 => "b4",
            Tutorial::B5 => "b5",
            Tutorial::B6 => "b6",
            Tutorial::B7 => "b7",
            Tutorial::B8 => "b8",
            Tutorial::B9 { .. } => "b9",
            Tutorial::B12 => "b12",
            Tutorial::B13 => "b13",
            Tutorial::T1 => "t1",
            Tutorial::P1 { .. } => "p1",
            Tutorial::Props { .. } => "props",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_tutorial_id() {
        let opt = Opt::try_parse_from(["gst_learn", "b5"]).unwrap();
        assert_eq!(opt.tid, Tutorial::B5);
        assert_eq!(opt.tid.id(), "b5");
        assert!(opt.config.is_none());
    }

    #[test]
    fn upper_case_alias() {
        let opt = Opt::try_parse_from(["gst_learn", "B12"]).unwrap();
        assert_eq!(opt.tid, Tutorial::B12);
    }

    #[test]
    fn discover_takes_optional_uri() {
        let opt = Opt::try_parse_from(["gst_learn", "b9"]).unwrap();
        assert_eq!(opt.tid, Tutorial::B9 { uri: None });

        let opt = Opt::try_parse_from(["gst_learn", "b9", "file:///tmp/a.webm"]).unwrap();
        assert_eq!(
            opt.tid,
            Tutorial::B9 {
                uri: Some("file:///tmp/a.webm".to_string())
            }
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let opt =
            Opt::try_parse_from(["gst_learn", "b1", "--uri", "file:///x.ogg", "-vv"]).unwrap();
        assert_eq!(opt.uri.as_deref(), Some("file:///x.ogg"));
        assert_eq!(opt.verbose, 2);
    }

    #[test]
    fn shift_is_range_checked() {
        let opt = Opt::try_parse_from(["gst_learn", "p1", "--invert", "--shift", "12"]).unwrap();
        assert_eq!(
            opt.tid,
            Tutorial::P1 {
                invert: true,
                shift: 12
            }
        );
        assert!(Opt::try_parse_from(["gst_learn", "p1", "--shift", "256"]).is_err());
    }

    #[test]
    fn unknown_tutorial_is_rejected() {
        assert!(Opt::try_parse_from(["gst_learn", "b10"]).is_err());
    }
}
