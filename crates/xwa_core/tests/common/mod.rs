#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use xwa_core::catalog::{self, RESOLUTION_RECORD_LEN, VariantDescriptor, VariantId};
use xwa_core::resolution::ResolutionSlot;

/// Stock image with some trailing bytes past the last cataloged region.
pub fn stock_bytes(variant: &VariantDescriptor) -> Vec<u8> {
    let mut bytes = variant.stock_image();
    bytes.resize(bytes.len() + 0x200, 0);
    bytes
}

pub fn record(slot: &ResolutionSlot) -> [u8; RESOLUTION_RECORD_LEN] {
    slot.to_record()
}

pub fn write_exe(dir: &Path, bytes: &[u8]) -> PathBuf {
    let path = dir.join("XWingAlliance.exe");
    fs::write(&path, bytes).expect("failed to write fixture executable");
    path
}

pub fn write_stock_exe(dir: &Path, id: VariantId) -> PathBuf {
    write_exe(dir, &stock_bytes(catalog::variant(id)))
}
