use crate::error::{MuralError, MuralResult};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Stable identifier for a block instance. Ids are unique within the issuing
/// store for the instance's lifetime; imported blocks always get a fresh id.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct BlockId(pub u64);

/// Monotonic id source owned by a [`crate::store::BlockStore`].
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct IdGen {
    next: u64,
}

impl IdGen {
    pub fn fresh(&mut self) -> BlockId {
        let id = BlockId(self.next);
        self.next += 1;
        id
    }

    /// Advance past `id` so restored state never re-issues a live id.
    pub fn reserve(&mut self, id: BlockId) {
        if id.0 >= self.next {
            self.next = id.0 + 1;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

/// The 5 aspect ratios the generation collaborator accepts. Anything else
/// normalizes to square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "16:9")]
    Wide,
}

impl AspectRatio {
    pub fn normalize(raw: &str) -> Self {
        match raw.trim() {
            "3:4" => Self::Portrait,
            "4:3" => Self::Landscape,
            "9:16" => Self::Tall,
            "16:9" => Self::Wide,
            _ => Self::Square,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Portrait => "3:4",
            Self::Landscape => "4:3",
            Self::Tall => "9:16",
            Self::Wide => "16:9",
        }
    }

    /// Wider-than-tall ratios get bespoke close-shot phrasing in the prompt
    /// compiler to compensate for model framing bias.
    pub fn is_wide(self) -> bool {
        matches!(self, Self::Landscape | Self::Wide)
    }
}

/// A raster frame. `data` is RGBA8, row-major, premultiplied alpha. Every
/// compositing stage assumes premultiplied input; conversion to/from straight
/// alpha happens only at the PNG boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    pub fn from_premul(width: u32, height: u32, data: Vec<u8>) -> MuralResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| MuralError::validation("frame size overflow"))?;
        if data.len() != expected {
            return Err(MuralError::validation(
                "frame data must be width*height*4 bytes",
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Ingest straight-alpha RGBA8 (e.g. a decoded PNG), premultiplying.
    pub fn from_straight(width: u32, height: u32, mut data: Vec<u8>) -> MuralResult<Self> {
        for px in data.chunks_exact_mut(4) {
            let a = px[3];
            px[0] = premul_channel(px[0], a);
            px[1] = premul_channel(px[1], a);
            px[2] = premul_channel(px[2], a);
        }
        Self::from_premul(width, height, data)
    }

    /// Unpremultiplied copy of the pixel data, for encode-time handoff.
    pub fn to_straight(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        for px in out.chunks_exact_mut(4) {
            let a = px[3];
            px[0] = unpremul_channel(px[0], a);
            px[1] = unpremul_channel(px[1], a);
            px[2] = unpremul_channel(px[2], a);
        }
        out
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }
}

pub fn premul_channel(c: u8, a: u8) -> u8 {
    (((u16::from(c) * u16::from(a)) + 127) / 255) as u8
}

pub fn unpremul_channel(c: u8, a: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    let v = (u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a);
    v.min(255) as u8
}

/// SplitMix64 mixing function.
pub fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Minimal SplitMix64 stream used by the grain stage. Deterministic for a
/// given seed; the compositor derives the seed from (document seed, nonce).
#[derive(Clone, Copy, Debug)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        mix64(self.state)
    }

    /// Uniform in [-1, 1).
    pub fn next_signed_unit(&mut self) -> f32 {
        let bits = (self.next_u64() >> 40) as u32; // 24 random bits
        (bits as f32) / 8_388_608.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idgen_is_monotonic_and_reserve_skips() {
        let mut g = IdGen::default();
        let a = g.fresh();
        let b = g.fresh();
        assert!(b.0 > a.0);
        g.reserve(BlockId(100));
        assert_eq!(g.fresh(), BlockId(101));
    }

    #[test]
    fn aspect_ratio_normalizes_unknown_to_square() {
        assert_eq!(AspectRatio::normalize("16:9"), AspectRatio::Wide);
        assert_eq!(AspectRatio::normalize("2:3"), AspectRatio::Square);
        assert_eq!(AspectRatio::normalize(""), AspectRatio::Square);
    }

    #[test]
    fn premul_roundtrip_is_lossless_for_opaque() {
        let frame = Frame::from_straight(1, 1, vec![200, 100, 50, 255]).unwrap();
        assert_eq!(frame.to_straight(), vec![200, 100, 50, 255]);
    }

    #[test]
    fn from_premul_rejects_bad_length() {
        assert!(Frame::from_premul(2, 2, vec![0u8; 15]).is_err());
    }

    #[test]
    fn splitmix_streams_are_reproducible() {
        let mut a = SplitMix64::new(7);
        let mut b = SplitMix64::new(7);
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        let mut c = SplitMix64::new(8);
        assert_ne!(a.next_u64(), c.next_u64());
    }

    #[test]
    fn signed_unit_stays_in_range() {
        let mut r = SplitMix64::new(42);
        for _ in 0..256 {
            let v = r.next_signed_unit();
            assert!((-1.0..1.0).contains(&v));
        }
    }
}
