//! BGR <-> HSV conversion on planar 8-bit rasters.
//!
//! Uses the common 8-bit HSV encoding:
//! - H: hue in degrees / 2, range 0-179
//! - S: saturation scaled to 0-255
//! - V: max(R, G, B), range 0-255
//!
//! V is always the third plane. Because V is the channel maximum it
//! survives a round trip exactly; H and S carry quantization error.

use crate::decode::{ChannelBuffer, ChannelLayout, RasterImage};

/// Convert a BGR raster to HSV planes.
pub fn bgr_to_hsv(image: &RasterImage) -> RasterImage {
    debug_assert_eq!(image.layout, ChannelLayout::Bgr);
    let count = image.pixel_count();
    let mut hue = Vec::with_capacity(count);
    let mut sat = Vec::with_capacity(count);
    let mut val = Vec::with_capacity(count);

    let planes = (&image.channels[0].data, &image.channels[1].data, &image.channels[2].data);
    for ((&b, &g), &r) in planes.0.iter().zip(planes.1).zip(planes.2) {
        let (h, s, v) = pixel_bgr_to_hsv(b, g, r);
        hue.push(h);
        sat.push(s);
        val.push(v);
    }

    let (w, h) = (image.width, image.height);
    RasterImage {
        width: w,
        height: h,
        layout: ChannelLayout::Hsv,
        channels: vec![
            ChannelBuffer::new(w, h, hue),
            ChannelBuffer::new(w, h, sat),
            ChannelBuffer::new(w, h, val),
        ],
    }
}

/// Convert HSV planes back to a BGR raster.
pub fn hsv_to_bgr(image: &RasterImage) -> RasterImage {
    debug_assert_eq!(image.layout, ChannelLayout::Hsv);
    let count = image.pixel_count();
    let mut blue = Vec::with_capacity(count);
    let mut green = Vec::with_capacity(count);
    let mut red = Vec::with_capacity(count);

    let planes = (&image.channels[0].data, &image.channels[1].data, &image.channels[2].data);
    for ((&h, &s), &v) in planes.0.iter().zip(planes.1).zip(planes.2) {
        let (b, g, r) = pixel_hsv_to_bgr(h, s, v);
        blue.push(b);
        green.push(g);
        red.push(r);
    }

    let (w, h) = (image.width, image.height);
    RasterImage::from_bgr_planes(
        ChannelBuffer::new(w, h, blue),
        ChannelBuffer::new(w, h, green),
        ChannelBuffer::new(w, h, red),
    )
}

/// Convert one BGR pixel to 8-bit HSV.
#[inline]
pub fn pixel_bgr_to_hsv(b: u8, g: u8, r: u8) -> (u8, u8, u8) {
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = (v - min) as f32;

    if v == 0 || diff == 0.0 {
        return (0, 0, v);
    }

    let s = (255.0 * diff / v as f32).round() as u8;

    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let mut h = if v == r {
        60.0 * (gf - bf) / diff
    } else if v == g {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = (h / 2.0).round() as u32 % 180;
    (h as u8, s, v)
}

/// Convert one 8-bit HSV pixel to BGR.
#[inline]
pub fn pixel_hsv_to_bgr(h: u8, s: u8, v: u8) -> (u8, u8, u8) {
    if s == 0 {
        return (v, v, v);
    }

    let hue = (h as f32 * 2.0) % 360.0;
    let sat = s as f32 / 255.0;
    let val = v as f32;

    let sector_f = hue / 60.0;
    let sector = sector_f.floor();
    let f = sector_f - sector;

    let p = val * (1.0 - sat);
    let q = val * (1.0 - sat * f);
    let t = val * (1.0 - sat * (1.0 - f));

    let (r, g, b) = match sector as u32 {
        0 => (val, t, p),
        1 => (q, val, p),
        2 => (p, val, t),
        3 => (p, q, val),
        4 => (t, p, val),
        _ => (val, p, q),
    };

    (to_u8(b), to_u8(g), to_u8(r))
}

#[inline]
fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: V survives a round trip exactly.
        #[test]
        fn prop_value_round_trips(b in any::<u8>(), g in any::<u8>(), r in any::<u8>()) {
            let (h, s, v) = pixel_bgr_to_hsv(b, g, r);
            let (b2, g2, r2) = pixel_hsv_to_bgr(h, s, v);
            prop_assert_eq!(b2.max(g2).max(r2), v);
        }

        /// Property: Round trip error is bounded by hue/saturation quantization.
        #[test]
        fn prop_round_trip_error_bounded(b in any::<u8>(), g in any::<u8>(), r in any::<u8>()) {
            let (h, s, v) = pixel_bgr_to_hsv(b, g, r);
            let (b2, g2, r2) = pixel_hsv_to_bgr(h, s, v);
            prop_assert!((b as i32 - b2 as i32).abs() <= 6);
            prop_assert!((g as i32 - g2 as i32).abs() <= 6);
            prop_assert!((r as i32 - r2 as i32).abs() <= 6);
        }
    }
}
