#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use xwa_core::catalog::{self, VariantId};

pub fn write_stock_exe(dir: &Path, id: VariantId) -> PathBuf {
    let mut bytes = catalog::variant(id).stock_image();
    bytes.resize(bytes.len() + 0x100, 0);

    let path = dir.join("XWingAlliance.exe");
    fs::write(&path, bytes).expect("failed to write fixture executable");
    path
}

pub fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xwahacker"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run xwahacker CLI")
}
