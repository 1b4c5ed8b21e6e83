//! Polyline representation and codec for route geometries.
//!
//! The routing backend may ship leg geometry as an encoded polyline string
//! (precision 1e-5, latitude delta first). Decoding happens once, when a
//! response is converted into a [`Route`](crate::route::Route); everything
//! downstream works on decoded coordinates.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DecodeError;
use crate::geo::LatLng;

/// Fixed-point scale of the encoding.
const PRECISION: f64 = 1e5;

/// Bits a single varint may carry. Six chunks cover any delta between two
/// valid coordinates at 1e-5 precision.
const MAX_SHIFT: u32 = 30;

/// Highest chunk value in the encoding alphabet (`'~'`).
const MAX_CHUNK: u8 = 0x3f;

/// A polyline representing a route geometry as decoded coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<LatLng>,
}

impl Polyline {
    pub fn new(points: Vec<LatLng>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[LatLng] {
        &self.points
    }

    pub fn into_points(self) -> Vec<LatLng> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Encodes the points back into the compact string form.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        let (mut prev_lat, mut prev_lng) = (0i64, 0i64);

        for point in &self.points {
            let lat = (point.lat * PRECISION).round() as i64;
            let lng = (point.lng * PRECISION).round() as i64;
            encode_value(lat - prev_lat, &mut out);
            encode_value(lng - prev_lng, &mut out);
            prev_lat = lat;
            prev_lng = lng;
        }

        out
    }
}

/// Decodes an encoded polyline, returning the recoverable prefix on
/// malformed input.
///
/// Truncation is logged rather than raised: a partial path is more useful to
/// the tracker than no path at all.
pub fn decode(encoded: &str) -> Polyline {
    match try_decode(encoded) {
        Ok(polyline) => polyline,
        Err(err) => {
            warn!(
                partial_count = err.partial_count(),
                position = err.position,
                "polyline decode stopped early"
            );
            err.partial
        }
    }
}

/// Decodes an encoded polyline, failing if the input ends mid-point, holds a
/// byte outside the alphabet or accumulates past the representable range.
pub fn try_decode(encoded: &str) -> Result<Polyline, DecodeError> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let (mut lat, mut lng) = (0i64, 0i64);
    let mut points = Vec::with_capacity(bytes.len() / 4);

    while index < bytes.len() {
        let next = read_value(bytes, index).and_then(|(dlat, after_lat)| {
            let (dlng, after_lng) = read_value(bytes, after_lat)?;
            Some((lat.checked_add(dlat)?, lng.checked_add(dlng)?, after_lng))
        });

        match next {
            Some((next_lat, next_lng, after)) => {
                lat = next_lat;
                lng = next_lng;
                index = after;
                points.push(LatLng::new(lat as f64 / PRECISION, lng as f64 / PRECISION));
            }
            None => {
                return Err(DecodeError {
                    position: index,
                    partial: Polyline::new(points),
                });
            }
        }
    }

    Ok(Polyline::new(points))
}

/// Reads one zig-zag varint starting at `index`. Returns the signed value and
/// the index just past it, or `None` if the input ends before a terminating
/// chunk, holds a byte outside the encoding alphabet or runs longer than
/// [`MAX_SHIFT`] bits.
fn read_value(bytes: &[u8], mut index: usize) -> Option<(i64, usize)> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;

    loop {
        let chunk = bytes.get(index)?.checked_sub(63)?;
        if chunk > MAX_CHUNK {
            return None;
        }
        index += 1;
        result |= i64::from(chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
        if shift >= MAX_SHIFT {
            return None;
        }
    }

    let value = if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    };
    Some((value, index))
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push((((v & 0x1f) | 0x20) as u8 + 63) as char);
        v >>= 5;
    }
    out.push((v as u8 + 63) as char);
}
