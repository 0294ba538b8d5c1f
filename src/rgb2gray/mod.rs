// Copyright (C) 2017,2018 Sebastian Dröge <sebastian@centricular.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `rsrgb2gray`: BGRx in, GRAY8 or grayscale BGRx out.

use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use gstreamer_base as gst_base;
use gstreamer_video as gst_video;

mod imp;

pub const ELEMENT_NAME: &str = "rsrgb2gray";

glib::wrapper! {
    pub struct Rgb2Gray(ObjectSubclass<imp::Rgb2Gray>)
        @extends gst_video::VideoFilter, gst_base::BaseTransform, gst::Element, gst::Object;
}

/// Registers the element with the application's registry, no plugin file
/// involved. Calling it again is a no-op.
pub fn register_static() -> Result<(), glib::BoolError> {
    if gst::ElementFactory::find(ELEMENT_NAME).is_some() {
        return Ok(());
    }
    gst::Element::register(
        None,
        ELEMENT_NAME,
        gst::Rank::NONE,
        Rgb2Gray::static_type(),
    )
}

/// BT.601 luma of one BGRx pixel, then wrapping `shift`, then optional inversion.
#[inline]
pub fn bgrx_to_gray(in_p: &[u8], shift: u8, invert: bool) -> u8 {
    const R_Y: u32 = 19595; // 0.299 * 65536
    const G_Y: u32 = 38470; // 0.587 * 65536
    const B_Y: u32 = 7471; // 0.114 * 65536

    debug_assert_eq!(in_p.len(), 4);

    let b = u32::from(in_p[0]);
    let g = u32::from(in_p[1]);
    let r = u32::from(in_p[2]);

    let gray = ((r * R_Y) + (g * G_Y) + (b * B_Y)) / 65536;
    let gray = (gray as u8).wrapping_add(shift);

    if invert { 255 - gray } else { gray }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_weights() {
        assert_eq!(bgrx_to_gray(&[0, 0, 0, 0], 0, false), 0);
        assert_eq!(bgrx_to_gray(&[255, 255, 255, 0], 0, false), 255);
        // pure red, green, blue
        assert_eq!(bgrx_to_gray(&[0, 0, 255, 0], 0, false), 76);
        assert_eq!(bgrx_to_gray(&[0, 255, 0, 0], 0, false), 149);
        assert_eq!(bgrx_to_gray(&[255, 0, 0, 0], 0, false), 29);
    }

    #[test]
    fn shift_wraps_and_invert_applies_last() {
        assert_eq!(bgrx_to_gray(&[255, 255, 255, 0], 1, false), 0);
        assert_eq!(bgrx_to_gray(&[0, 0, 0, 0], 10, false), 10);
        assert_eq!(bgrx_to_gray(&[0, 0, 0, 0], 10, true), 245);
        assert_eq!(bgrx_to_gray(&[255, 255, 255, 0], 0, true), 0);
    }

    #[test]
    fn registered_element_exposes_properties() {
        gst::init().unwrap();
        register_static().unwrap();
        register_static().unwrap();

        let element = gst::ElementFactory::make(ELEMENT_NAME)
            .property("invert", true)
            .property("shift", 7u32)
            .build()
            .unwrap();

        assert!(element.is::<Rgb2Gray>());
        assert!(element.property::<bool>("invert"));
        assert_eq!(element.property::<u32>("shift"), 7);

        let sink = element.static_pad("sink").unwrap();
        let caps = sink.query_caps(None);
        let s = caps.structure(0).unwrap();
        assert_eq!(s.get::<&str>("format").unwrap(), "BGRx");
    }
}
