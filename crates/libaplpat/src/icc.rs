
// ICC.1:2001-04 (ICC profile format specification, v2 flavor).

use chrono::{Datelike, Timelike, Utc};

use crate::colorspace::RgbColorSpace;
use crate::error::ExportError;

pub const HEADER_LEN: usize = 128;

/// Number of entries in the tag table: desc, wtpt, rXYZ, gXYZ, bXYZ,
/// rTRC, gTRC, bTRC, cprt.
const TAG_COUNT: usize = 9;

/// UTC creation timestamp stored in the profile header.
///
/// Injectable so profile bytes can be reproduced exactly; the memoized
/// cache path stamps profiles with the build time instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IccDateTime {
    pub year: u16,
    pub month: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
}

impl IccDateTime {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            year: now.year() as u16,
            month: now.month() as u16,
            day: now.day() as u16,
            hour: now.hour() as u16,
            minute: now.minute() as u16,
            second: now.second() as u16,
        }
    }
}

/// Builds an ICC v2 RGB profile from chromaticities and a gamma TRC.
///
/// The layout is fixed: 128-byte header, 9-entry tag table, then the tag
/// data region with 4-byte-aligned payloads. Identical payloads (the three
/// TRC curves; copyright aliasing the description) share one offset.
pub struct IccProfileBuilder<'a> {
    space: &'a RgbColorSpace,
    timestamp: IccDateTime,
}

impl<'a> IccProfileBuilder<'a> {
    pub fn new(space: &'a RgbColorSpace) -> Self {
        Self { space, timestamp: IccDateTime::now() }
    }

    pub fn with_timestamp(mut self, timestamp: IccDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn build(self) -> Result<Vec<u8>, ExportError> {
        let [r_xyz, g_xyz, b_xyz] = self.space.scaled_colorants()?;

        let desc = desc_tag(self.space.label)?;
        let wtpt = xyz_tag(self.space.white_xyz());
        let r_tag = xyz_tag(r_xyz);
        let g_tag = xyz_tag(g_xyz);
        let b_tag = xyz_tag(b_xyz);
        let curv = curv_tag(self.space.gamma);

        // Payload index per tag signature; repeated indices dedup to one
        // offset in the emitted file.
        let payloads: [&[u8]; 6] = [&desc, &wtpt, &r_tag, &g_tag, &b_tag, &curv];
        let table: [(&[u8; 4], usize); TAG_COUNT] = [
            (b"desc", 0),
            (b"wtpt", 1),
            (b"rXYZ", 2),
            (b"gXYZ", 3),
            (b"bXYZ", 4),
            (b"rTRC", 5),
            (b"gTRC", 5),
            (b"bTRC", 5),
            (b"cprt", 0),
        ];

        let data_offset = HEADER_LEN + 4 + TAG_COUNT * 12;

        // Lay out unique payloads in first-appearance order, 4-byte aligned.
        let mut offsets = [0u32; 6];
        let mut placed = [false; 6];
        let mut data = Vec::new();
        for &(_, index) in &table {
            if placed[index] {
                continue;
            }
            offsets[index] = (data_offset + data.len()) as u32;
            placed[index] = true;
            data.extend_from_slice(payloads[index]);
            while data.len() % 4 != 0 {
                data.push(0);
            }
        }

        let profile_size = data_offset + data.len();

        let mut profile = Vec::with_capacity(profile_size);
        self.put_header(&mut profile, profile_size as u32);
        if profile.len() != HEADER_LEN {
            return Err(ExportError::assertion(format!(
                "ICC header is {} bytes, expected {HEADER_LEN}",
                profile.len()
            )));
        }

        profile.extend_from_slice(&(TAG_COUNT as u32).to_be_bytes());
        for &(signature, index) in &table {
            profile.extend_from_slice(signature);
            profile.extend_from_slice(&offsets[index].to_be_bytes());
            profile.extend_from_slice(&(payloads[index].len() as u32).to_be_bytes());
        }
        profile.extend_from_slice(&data);

        if profile.len() != profile_size {
            return Err(ExportError::assertion(format!(
                "ICC profile is {} bytes, declared {profile_size}",
                profile.len()
            )));
        }
        Ok(profile)
    }

    fn put_header(&self, buf: &mut Vec<u8>, profile_size: u32) {
        buf.extend_from_slice(&profile_size.to_be_bytes());
        buf.extend_from_slice(b"none"); // preferred CMM
        buf.extend_from_slice(&0x0240_0000u32.to_be_bytes()); // version 2.4.0
        buf.extend_from_slice(b"mntr"); // device class: display
        buf.extend_from_slice(b"RGB "); // data color space
        buf.extend_from_slice(b"XYZ "); // profile connection space
        for field in [
            self.timestamp.year,
            self.timestamp.month,
            self.timestamp.day,
            self.timestamp.hour,
            self.timestamp.minute,
            self.timestamp.second,
        ] {
            buf.extend_from_slice(&field.to_be_bytes());
        }
        buf.extend_from_slice(b"acsp"); // profile file signature
        buf.extend_from_slice(b"MSFT"); // primary platform
        buf.extend_from_slice(&[0u8; 4]); // profile flags
        buf.extend_from_slice(&[0u8; 4]); // device manufacturer
        buf.extend_from_slice(&[0u8; 4]); // device model
        buf.extend_from_slice(&[0u8; 8]); // device attributes
        buf.extend_from_slice(&0u32.to_be_bytes()); // rendering intent: perceptual
        // PCS illuminant: D50
        buf.extend_from_slice(&s15f16(0.9642));
        buf.extend_from_slice(&s15f16(1.0));
        buf.extend_from_slice(&s15f16(0.8249));
        buf.extend_from_slice(&[0u8; 4]); // profile creator
        buf.extend_from_slice(&[0u8; 16]); // profile ID
        buf.extend_from_slice(&[0u8; 28]); // reserved
    }
}

/// ICC s15Fixed16Number, big-endian.
fn s15f16(value: f64) -> [u8; 4] {
    (((value * 65536.0).round()) as i32).to_be_bytes()
}

/// `textDescription` tag: ASCII string plus empty Unicode and ScriptCode
/// sections, padded to a 4-byte boundary.
fn desc_tag(label: &str) -> Result<Vec<u8>, ExportError> {
    if !label.is_ascii() {
        return Err(ExportError::assertion(format!(
            "profile description must be ASCII: {label:?}"
        )));
    }
    let mut tag = Vec::new();
    tag.extend_from_slice(b"desc");
    tag.extend_from_slice(&[0u8; 4]);
    tag.extend_from_slice(&((label.len() + 1) as u32).to_be_bytes());
    tag.extend_from_slice(label.as_bytes());
    tag.push(0);
    tag.extend_from_slice(&[0u8; 4]); // Unicode language code
    tag.extend_from_slice(&[0u8; 4]); // Unicode count
    tag.extend_from_slice(&[0u8; 2]); // ScriptCode code
    tag.push(0); // ScriptCode count
    tag.extend_from_slice(&[0u8; 67 + 1]);
    while tag.len() % 4 != 0 {
        tag.push(0);
    }
    Ok(tag)
}

fn xyz_tag(xyz: [f64; 3]) -> Vec<u8> {
    let mut tag = Vec::with_capacity(20);
    tag.extend_from_slice(b"XYZ ");
    tag.extend_from_slice(&[0u8; 4]);
    for component in xyz {
        tag.extend_from_slice(&s15f16(component));
    }
    tag
}

/// `curveType` with count 1: a single u8.8 gamma value.
fn curv_tag(gamma: f64) -> Vec<u8> {
    let mut tag = Vec::with_capacity(14);
    tag.extend_from_slice(b"curv");
    tag.extend_from_slice(&[0u8; 4]);
    tag.extend_from_slice(&1u32.to_be_bytes());
    tag.extend_from_slice(&(((gamma * 256.0).round()) as u16).to_be_bytes());
    tag.extend_from_slice(&[0u8; 2]);
    tag
}
