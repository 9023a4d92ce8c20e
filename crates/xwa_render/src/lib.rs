use std::fmt::Write as _;

use xwa_core::core_api::{OptionEntry, ResolutionEntry, SaveSummary, Snapshot};
use serde_json::{Map as JsonMap, Value as JsonValue};

const STOCK_COL_WIDTH: usize = 11;
const RES_COL_WIDTH: usize = 12;
const FOV_COL_WIDTH: usize = 9;
const HUD_COL_WIDTH: usize = 7;
const OPTION_COL_WIDTH: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRenderOptions {
    /// Also list option descriptions and the choices each option accepts.
    pub verbose: bool,
}

pub fn render_json(snapshot: &Snapshot) -> JsonValue {
    let mut out = JsonMap::new();

    out.insert(
        "variant".to_string(),
        JsonValue::String(snapshot.variant.as_str().to_string()),
    );
    out.insert(
        "variant_name".to_string(),
        JsonValue::String(snapshot.variant_name.clone()),
    );
    out.insert("recognized".to_string(), JsonValue::Bool(snapshot.recognized));
    out.insert(
        "known_group_count".to_string(),
        JsonValue::from(snapshot.known_group_count),
    );
    out.insert(
        "total_group_count".to_string(),
        JsonValue::from(snapshot.total_group_count),
    );
    out.insert(
        "options_editable".to_string(),
        JsonValue::Bool(snapshot.capabilities.can_edit_options),
    );
    out.insert(
        "resolutions".to_string(),
        JsonValue::Array(snapshot.resolutions.iter().map(resolution_to_json).collect()),
    );
    out.insert(
        "options".to_string(),
        JsonValue::Array(snapshot.options.iter().map(option_to_json).collect()),
    );

    JsonValue::Object(out)
}

pub fn render_save_summary_json(summary: &SaveSummary) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert(
        "resolutions_written".to_string(),
        JsonValue::from(summary.resolutions_written),
    );
    out.insert(
        "options_written".to_string(),
        JsonValue::from(summary.options_written),
    );
    JsonValue::Object(out)
}

pub fn render_text(snapshot: &Snapshot) -> String {
    render_text_with_options(snapshot, TextRenderOptions::default())
}

pub fn render_text_with_options(snapshot: &Snapshot, options: TextRenderOptions) -> String {
    let mut out = String::new();

    writeln!(&mut out, "Binary:  {}", snapshot.variant_name)
        .expect("writing to String cannot fail");
    writeln!(
        &mut out,
        "Patches: {}/{} known{}",
        snapshot.known_group_count,
        snapshot.total_group_count,
        if snapshot.recognized {
            ""
        } else {
            " (file has unsupported modifications, options disabled)"
        }
    )
    .expect("writing to String cannot fail");
    writeln!(&mut out).expect("writing to String cannot fail");

    writeln!(
        &mut out,
        "{:<sw$}{:<rw$}{:>fw$}{:>hw$}",
        "Original",
        "Resolution",
        "FOV",
        "HUD",
        sw = STOCK_COL_WIDTH,
        rw = RES_COL_WIDTH,
        fw = FOV_COL_WIDTH,
        hw = HUD_COL_WIDTH,
    )
    .expect("writing to String cannot fail");
    for entry in &snapshot.resolutions {
        writeln!(&mut out, "{}", format_resolution_row(entry))
            .expect("writing to String cannot fail");
    }
    writeln!(&mut out).expect("writing to String cannot fail");

    writeln!(&mut out, "Options:").expect("writing to String cannot fail");
    for entry in &snapshot.options {
        writeln!(&mut out, "  {}", format_option_row(entry, snapshot.recognized))
            .expect("writing to String cannot fail");
        if options.verbose {
            writeln!(&mut out, "    {}", entry.description)
                .expect("writing to String cannot fail");
            writeln!(&mut out, "    choices: {}", entry.choices.join(", "))
                .expect("writing to String cannot fail");
        }
    }

    out
}

pub fn render_save_summary(summary: &SaveSummary) -> String {
    if summary.total() == 0 {
        return "No changes to save".to_string();
    }
    format!(
        "Saved {} resolution slot(s) and {} option(s)",
        summary.resolutions_written, summary.options_written
    )
}

fn format_resolution_row(entry: &ResolutionEntry) -> String {
    let stock = format!("{}x{}", entry.stock_width, entry.stock_height);
    let current = format!("{}x{}", entry.width, entry.height);
    let mut row = format!(
        "{:<sw$}{:<rw$}{:>fw$.2}{:>hw$.2}",
        stock,
        current,
        entry.fov_degrees,
        entry.hud_scale,
        sw = STOCK_COL_WIDTH,
        rw = RES_COL_WIDTH,
        fw = FOV_COL_WIDTH,
        hw = HUD_COL_WIDTH,
    );
    if entry.modified {
        row.push_str("  *");
    }
    if entry.pending {
        row.push_str("  (unsaved)");
    }
    row
}

fn format_option_row(entry: &OptionEntry, editable: bool) -> String {
    let mut row = format!(
        "{:<ow$}{}",
        entry.id.as_str(),
        entry.state_label,
        ow = OPTION_COL_WIDTH
    );
    if entry.pending {
        row.push_str(" (unsaved)");
    }
    if !editable {
        row.push_str(" [locked]");
    }
    row
}

fn resolution_to_json(entry: &ResolutionEntry) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert("slot".to_string(), JsonValue::from(entry.index));
    out.insert(
        "original".to_string(),
        JsonValue::String(format!("{}x{}", entry.stock_width, entry.stock_height)),
    );
    out.insert("width".to_string(), JsonValue::from(entry.width));
    out.insert("height".to_string(), JsonValue::from(entry.height));
    out.insert("fov".to_string(), JsonValue::from(entry.fov));
    out.insert(
        "fov_degrees".to_string(),
        JsonValue::from(round_to(entry.fov_degrees, 2)),
    );
    out.insert(
        "hud_scale".to_string(),
        JsonValue::from(round_to(f64::from(entry.hud_scale), 3)),
    );
    out.insert("modified".to_string(), JsonValue::Bool(entry.modified));
    JsonValue::Object(out)
}

fn option_to_json(entry: &OptionEntry) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert(
        "id".to_string(),
        JsonValue::String(entry.id.as_str().to_string()),
    );
    out.insert(
        "state".to_string(),
        JsonValue::String(entry.state_label.clone()),
    );
    out.insert(
        "description".to_string(),
        JsonValue::String(entry.description.clone()),
    );
    out.insert(
        "choices".to_string(),
        JsonValue::Array(
            entry
                .choices
                .iter()
                .map(|c| JsonValue::String(c.clone()))
                .collect(),
        ),
    );
    JsonValue::Object(out)
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
