//! The game's four-entry resolution table.
//!
//! Each record is 16 bytes: width, height and fov as little-endian `i32`,
//! followed by the HUD scale as the raw bits of a little-endian `f32`.

use std::f64::consts::PI;
use std::io::{Read, Seek, Write};

use serde::{Deserialize, Serialize};

use crate::catalog::{RESOLUTION_RECORD_LEN, RESOLUTION_SLOTS, STOCK_RESOLUTIONS, VariantDescriptor};
use crate::core_api::{CoreError, CoreErrorCode};
use crate::image::BinaryImage;

/// Raw HUD scale bits the game uses for an unreadable entry.
pub const HUD_SCALE_SENTINEL: u32 = 0xFFFF_FFFF;

/// Inputs closer than this to a default are written as the exact default.
pub const SNAP_TOLERANCE: f64 = 0.015;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionSlot {
    pub width: i32,
    pub height: i32,
    /// Internal field-of-view unit, see [`fov_to_degrees`].
    pub fov: i32,
    pub hud_scale: f32,
}

impl ResolutionSlot {
    /// Stock values for slot `index`: shipped size with default fov and HUD.
    pub fn stock(index: usize) -> Option<Self> {
        let (width, height) = *STOCK_RESOLUTIONS.get(index)?;
        Some(Self::with_defaults(width, height))
    }

    pub fn with_defaults(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            fov: default_fov(height),
            hud_scale: default_hud_scale(height),
        }
    }

    pub fn fov_degrees(&self) -> f64 {
        fov_to_degrees(self.fov, self.height)
    }

    /// True when this slot differs from the stock values of slot `index`.
    pub fn differs_from_stock(&self, index: usize) -> bool {
        let Some((width, height)) = STOCK_RESOLUTIONS.get(index).copied() else {
            return true;
        };
        self.width != width
            || self.height != height
            || self.fov != default_fov(self.height)
            || self.hud_scale.to_bits() != default_hud_scale(self.height).to_bits()
    }

    /// The 16-byte on-disk form of this slot.
    pub fn to_record(self) -> [u8; RESOLUTION_RECORD_LEN] {
        let mut record = [0u8; RESOLUTION_RECORD_LEN];
        record[0..4].copy_from_slice(&self.width.to_le_bytes());
        record[4..8].copy_from_slice(&self.height.to_le_bytes());
        record[8..12].copy_from_slice(&self.fov.to_le_bytes());
        record[12..16].copy_from_slice(&self.hud_scale.to_bits().to_le_bytes());
        record
    }
}

/// A slot as a user describes it: fov in degrees rather than internal units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRequest {
    pub width: i32,
    pub height: i32,
    pub fov_degrees: f64,
    pub hud_scale: f64,
}

impl ResolutionRequest {
    /// Converts to stored values, snapping near-default inputs to the exact
    /// defaults for `height`.
    pub fn resolve(&self) -> ResolutionSlot {
        let height = self.height;

        let default_fov = default_fov(height);
        let default_degrees = fov_to_degrees(default_fov, height);
        let fov = if (self.fov_degrees - default_degrees).abs() < SNAP_TOLERANCE {
            default_fov
        } else {
            degrees_to_fov(self.fov_degrees, height)
        };

        let default_hud = default_hud_scale(height);
        let hud_scale = if (self.hud_scale - f64::from(default_hud)).abs() < SNAP_TOLERANCE {
            default_hud
        } else {
            self.hud_scale as f32
        };

        ResolutionSlot {
            width: self.width,
            height,
            fov,
            hud_scale,
        }
    }
}

impl From<ResolutionSlot> for ResolutionRequest {
    fn from(slot: ResolutionSlot) -> Self {
        Self {
            width: slot.width,
            height: slot.height,
            fov_degrees: slot.fov_degrees(),
            hud_scale: f64::from(slot.hud_scale),
        }
    }
}

pub fn decode<F>(
    image: &BinaryImage<F>,
    variant: &VariantDescriptor,
) -> Result<[ResolutionSlot; RESOLUTION_SLOTS], CoreError> {
    let mut slots = [ResolutionSlot::with_defaults(0, 0); RESOLUTION_SLOTS];

    for (index, &offset) in variant.resolution_offsets.iter().enumerate() {
        let record = image.read_at(offset, RESOLUTION_RECORD_LEN).ok_or_else(|| {
            CoreError::new(
                CoreErrorCode::Decode,
                format!("resolution slot {index} at {offset:#x} lies outside the file"),
            )
        })?;

        let width = read_i32_le(record, 0);
        let height = read_i32_le(record, 4);
        let fov = read_i32_le(record, 8);
        let hud_bits = u32::from_le_bytes([record[12], record[13], record[14], record[15]]);

        if width < 0 || height < 0 || fov < 0 || hud_bits == HUD_SCALE_SENTINEL {
            return Err(CoreError::new(
                CoreErrorCode::Decode,
                format!(
                    "could not read resolution slot {index}: width={width} height={height} fov={fov} hud_bits={hud_bits:#010x}"
                ),
            ));
        }

        slots[index] = ResolutionSlot {
            width,
            height,
            fov,
            hud_scale: f32::from_bits(hud_bits),
        };
    }

    Ok(slots)
}

pub fn encode<F: Read + Write + Seek>(
    image: &mut BinaryImage<F>,
    variant: &VariantDescriptor,
    slot: &ResolutionSlot,
    index: usize,
) -> Result<(), CoreError> {
    let offset = *variant.resolution_offsets.get(index).ok_or_else(|| {
        CoreError::new(
            CoreErrorCode::InvalidArgument,
            format!("resolution slot {index} out of range"),
        )
    })?;
    image.write_at(offset, &slot.to_record())
}

/// Horizontal view angle in degrees for a 4:3 view of the given height.
pub fn fov_to_degrees(fov: i32, height: i32) -> f64 {
    let half_width = f64::from(height) * 2.0 / 3.0;
    half_width.atan2(f64::from(fov)) * 2.0 * 180.0 / PI
}

pub fn degrees_to_fov(degrees: f64, height: i32) -> i32 {
    let half_width = f64::from(height) * 2.0 / 3.0;
    (half_width / (degrees / 2.0 * PI / 180.0).tan()).round() as i32
}

pub fn default_fov(height: i32) -> i32 {
    ((i64::from(height) * 16 + 7) / 15) as i32
}

pub fn default_hud_scale(height: i32) -> f32 {
    if height <= 600 {
        1.0
    } else {
        height as f32 / 600.0
    }
}

fn read_i32_le(record: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::catalog::{VariantId, variant};

    const HEIGHTS: [i32; 8] = [480, 600, 768, 864, 1080, 1200, 2160, 8192];

    fn image_with_stock_table(variant: &VariantDescriptor) -> BinaryImage<Cursor<Vec<u8>>> {
        BinaryImage::from_stream(Cursor::new(variant.stock_image())).expect("load")
    }

    #[test]
    fn stock_defaults_match_shipped_table() {
        assert_eq!(default_fov(480), 512);
        assert_eq!(default_fov(600), 640);
        assert_eq!(default_fov(864), 922);
        assert_eq!(default_fov(1200), 1280);
        assert_eq!(default_hud_scale(480), 1.0);
        assert_eq!(default_hud_scale(1200), 2.0);
    }

    #[test]
    fn decode_reads_stock_table() {
        let variant = variant(VariantId::Cd);
        let image = image_with_stock_table(variant);
        let slots = decode(&image, variant).expect("decode");

        for (index, slot) in slots.iter().enumerate() {
            assert_eq!(Some(*slot), ResolutionSlot::stock(index));
            assert!(!slot.differs_from_stock(index));
        }
    }

    #[test]
    fn re_encoding_decoded_slots_is_byte_identical() {
        let variant = variant(VariantId::Steam);
        let mut image = image_with_stock_table(variant);
        image
            .write_at(variant.resolution_offsets[2], &{
                let mut record = [0u8; RESOLUTION_RECORD_LEN];
                record[0..4].copy_from_slice(&1920i32.to_le_bytes());
                record[4..8].copy_from_slice(&1080i32.to_le_bytes());
                record[8..12].copy_from_slice(&1001i32.to_le_bytes());
                record[12..16].copy_from_slice(&0x3FB3_3333u32.to_le_bytes());
                record
            })
            .expect("seed slot");
        let before = image.bytes().to_vec();

        let slots = decode(&image, variant).expect("decode");
        for (index, slot) in slots.iter().enumerate() {
            encode(&mut image, variant, slot, index).expect("encode");
        }

        assert_eq!(image.bytes(), &before[..]);
    }

    #[test]
    fn decode_rejects_negative_fields_and_sentinel() {
        let variant = variant(VariantId::Cd);
        let offset = variant.resolution_offsets[1];

        let cases: [(usize, [u8; 4]); 4] = [
            (0, (-1i32).to_le_bytes()),
            (4, (-480i32).to_le_bytes()),
            (8, (-3i32).to_le_bytes()),
            (12, HUD_SCALE_SENTINEL.to_le_bytes()),
        ];
        for (field, raw) in cases {
            let mut image = image_with_stock_table(variant);
            image.write_at(offset + field, &raw).expect("corrupt field");
            let err = decode(&image, variant).expect_err("decode should fail");
            assert_eq!(err.code, CoreErrorCode::Decode);
        }
    }

    #[test]
    fn decode_rejects_truncated_image() {
        let variant = variant(VariantId::Cd);
        let image = BinaryImage::from_stream(Cursor::new(vec![0u8; 0x100])).expect("load");
        let err = decode(&image, variant).expect_err("table is past the end");
        assert_eq!(err.code, CoreErrorCode::Decode);
    }

    #[test]
    fn fov_round_trips_exactly_through_degrees() {
        for height in HEIGHTS {
            for fov in [1, 28, 100, 512, 640, default_fov(height), 5000, 60_000] {
                let degrees = fov_to_degrees(fov, height);
                assert_eq!(degrees_to_fov(degrees, height), fov, "fov={fov} h={height}");
            }
        }
    }

    #[test]
    fn degrees_round_trip_within_quantisation() {
        for height in HEIGHTS {
            let mut degrees = 10.0;
            while degrees <= 170.0 {
                let back = fov_to_degrees(degrees_to_fov(degrees, height), height);
                assert!(
                    (back - degrees).abs() < 0.25,
                    "h={height} d={degrees} back={back}"
                );
                degrees += 0.5;
            }
        }
    }

    #[test]
    fn near_default_inputs_snap_to_exact_defaults() {
        for height in HEIGHTS {
            let default_degrees = fov_to_degrees(default_fov(height), height);
            let default_hud = f64::from(default_hud_scale(height));
            let request = ResolutionRequest {
                width: 1024,
                height,
                fov_degrees: default_degrees + 0.0149,
                hud_scale: default_hud - 0.0149,
            };

            let slot = request.resolve();
            assert_eq!(slot.fov, default_fov(height));
            assert_eq!(slot.hud_scale.to_bits(), default_hud_scale(height).to_bits());
        }
    }

    #[test]
    fn snapped_values_are_stable_across_cycles() {
        let variant = variant(VariantId::Cd);
        let mut image = image_with_stock_table(variant);
        let mut request = ResolutionRequest {
            width: 1280,
            height: 960,
            fov_degrees: fov_to_degrees(default_fov(960), 960) - 0.01,
            hud_scale: f64::from(default_hud_scale(960)) + 0.01,
        };

        for _ in 0..5 {
            encode(&mut image, variant, &request.resolve(), 0).expect("encode");
            let slot = decode(&image, variant).expect("decode")[0];
            assert_eq!(slot.fov, default_fov(960));
            assert_eq!(slot.hud_scale, default_hud_scale(960));
            request = ResolutionRequest::from(slot);
        }
    }

    #[test]
    fn values_outside_snap_window_are_converted() {
        let request = ResolutionRequest {
            width: 1024,
            height: 768,
            fov_degrees: 90.0,
            hud_scale: 1.0,
        };
        let slot = request.resolve();
        assert_eq!(slot.fov, 512);
        assert_eq!(slot.hud_scale, 1.0);
        assert!((slot.fov_degrees() - 90.0).abs() < 1e-9);
        assert!(slot.differs_from_stock(0));
    }

    #[test]
    fn encode_rejects_slot_index_out_of_range() {
        let variant = variant(VariantId::Cd);
        let mut image = image_with_stock_table(variant);
        let slot = ResolutionSlot::with_defaults(640, 480);
        let err = encode(&mut image, variant, &slot, RESOLUTION_SLOTS).expect_err("bad index");
        assert_eq!(err.code, CoreErrorCode::InvalidArgument);
    }
}
