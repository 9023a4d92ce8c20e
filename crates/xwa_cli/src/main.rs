use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use serde_json::Value as JsonValue;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use xwa_core::catalog::{GroupId, RESOLUTION_SLOTS, VariantId};
use xwa_core::core_api::{Engine, Session};
use xwa_core::patch::Choice;
use xwa_core::resolution::ResolutionRequest;
use xwa_render::{
    TextRenderOptions, render_json, render_save_summary, render_save_summary_json,
    render_text_with_options,
};

const WIDTH_RANGE: (i32, i32) = (640, 8192);
const HEIGHT_RANGE: (i32, i32) = (480, 8192);
const FOV_RANGE: (f64, f64) = (10.0, 170.0);
const HUD_RANGE: (f64, f64) = (0.1, 10.0);

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    Cd,
    Steam,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OptionArg {
    #[value(name = "32bit")]
    Render32Bit,
    FixedClear,
    #[value(name = "force-800")]
    Force800,
    NoCd,
    NoStars,
    MsgLoop,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ShowFpsArg {
    Disabled,
    Fps,
    SceneStats,
    TexStats,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SizeEdit {
    slot: usize,
    width: i32,
    height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ValueEdit {
    slot: usize,
    value: f64,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(value_name = "XWINGALLIANCE.EXE")]
    path: PathBuf,
    /// Skip detection and use this build's patch table.
    #[arg(long, value_name = "cd|steam")]
    variant: Option<VariantArg>,
    #[arg(long)]
    json: bool,
    /// Change a slot's resolution. FOV and HUD return to the defaults for
    /// the new height.
    #[arg(long = "set-res", value_name = "SLOT=WxH", value_parser = parse_size_edit)]
    set_res: Vec<SizeEdit>,
    /// Set a slot's horizontal field of view in degrees.
    #[arg(long = "set-fov", value_name = "SLOT=DEG", value_parser = parse_fov_edit)]
    set_fov: Vec<ValueEdit>,
    #[arg(long = "set-hud", value_name = "SLOT=SCALE", value_parser = parse_hud_edit)]
    set_hud: Vec<ValueEdit>,
    /// Restore a slot's stock resolution, FOV and HUD scale.
    #[arg(long = "reset-res", value_name = "SLOT", value_parser = parse_slot)]
    reset_res: Vec<usize>,
    #[arg(long, value_name = "OPTION")]
    enable: Vec<OptionArg>,
    #[arg(long, value_name = "OPTION")]
    disable: Vec<OptionArg>,
    #[arg(long = "show-fps", value_name = "MODE")]
    show_fps: Option<ShowFpsArg>,
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn has_edits(&self) -> bool {
        !self.set_res.is_empty()
            || !self.set_fov.is_empty()
            || !self.set_hud.is_empty()
            || !self.reset_res.is_empty()
            || !self.enable.is_empty()
            || !self.disable.is_empty()
            || self.show_fps.is_some()
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let engine = Engine::new();
    let hint = cli.variant.map(to_core_variant);
    let mut session = engine.open_path(&cli.path, hint).unwrap_or_else(|e| {
        eprintln!("Error opening {}", cli.path.display());
        eprintln!("  {e}");
        process::exit(1);
    });

    if !cli.has_edits() {
        if cli.json {
            print_json(&render_json(&session.snapshot()));
        } else {
            let options = TextRenderOptions {
                verbose: cli.verbose,
            };
            print!("{}", render_text_with_options(&session.snapshot(), options));
        }
        return;
    }

    apply_edits(&cli, &mut session);

    match session.save() {
        Ok(summary) => {
            if cli.json {
                print_json(&render_save_summary_json(&summary));
            } else {
                println!("{}", render_save_summary(&summary));
            }
        }
        Err(failure) => {
            eprintln!("Error saving {}: {failure}", cli.path.display());
            eprintln!("  {}", failure.error);
            process::exit(if failure.succeeded > 0 { 3 } else { 1 });
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn apply_edits<F>(cli: &Cli, session: &mut Session<F>) {
    for &slot in &cli.reset_res {
        session.reset_resolution(slot).unwrap_or_else(|e| {
            eprintln!("Error resetting resolution slot {slot}: {e}");
            process::exit(1);
        });
    }
    for edit in &cli.set_res {
        session
            .set_resolution_size(edit.slot, edit.width, edit.height)
            .unwrap_or_else(|e| {
                eprintln!("Error applying resolution edit: {e}");
                process::exit(1);
            });
    }
    for edit in &cli.set_fov {
        edit_slot(session, edit.slot, |request| request.fov_degrees = edit.value);
    }
    for edit in &cli.set_hud {
        edit_slot(session, edit.slot, |request| request.hud_scale = edit.value);
    }

    let mut choices: Vec<(GroupId, Choice)> = Vec::new();
    choices.extend(cli.enable.iter().map(|&o| (to_core_group(o), Choice::Member(0))));
    choices.extend(cli.disable.iter().map(|&o| (to_core_group(o), Choice::Original)));
    if let Some(mode) = cli.show_fps {
        choices.push((GroupId::ShowFps, show_fps_choice(mode)));
    }
    for (group, choice) in choices {
        debug!(option = group.as_str(), ?choice, "requesting option change");
        session.set_group_variant(group, choice).unwrap_or_else(|e| {
            eprintln!("Error changing option {}: {e}", group.as_str());
            process::exit(1);
        });
    }
}

fn edit_slot<F>(
    session: &mut Session<F>,
    slot: usize,
    edit: impl FnOnce(&mut ResolutionRequest),
) {
    let Some(current) = session.resolution(slot) else {
        eprintln!("Error: resolution slot {slot} does not exist");
        process::exit(1);
    };
    let mut request = ResolutionRequest::from(*current);
    edit(&mut request);
    session.set_resolution(slot, request).unwrap_or_else(|e| {
        eprintln!("Error applying resolution edit: {e}");
        process::exit(1);
    });
}

fn print_json(value: &JsonValue) {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error rendering JSON output: {e}");
        process::exit(1);
    });
    println!("{rendered}");
}

fn parse_slot(value: &str) -> Result<usize, String> {
    let slot: usize = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid slot '{value}'"))?;
    if slot >= RESOLUTION_SLOTS {
        return Err(format!(
            "slot {slot} out of range, expected 0-{}",
            RESOLUTION_SLOTS - 1
        ));
    }
    Ok(slot)
}

fn split_slot(value: &str) -> Result<(usize, &str), String> {
    let (slot, rest) = value
        .split_once('=')
        .ok_or_else(|| format!("expected SLOT=VALUE, got '{value}'"))?;
    Ok((parse_slot(slot)?, rest.trim()))
}

fn parse_size_edit(value: &str) -> Result<SizeEdit, String> {
    let (slot, size) = split_slot(value)?;
    let (width, height) = size
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{size}'"))?;
    let width = parse_in_range("width", width, WIDTH_RANGE)?;
    let height = parse_in_range("height", height, HEIGHT_RANGE)?;
    Ok(SizeEdit {
        slot,
        width,
        height,
    })
}

fn parse_fov_edit(value: &str) -> Result<ValueEdit, String> {
    let (slot, degrees) = split_slot(value)?;
    Ok(ValueEdit {
        slot,
        value: parse_in_range("fov", degrees, FOV_RANGE)?,
    })
}

fn parse_hud_edit(value: &str) -> Result<ValueEdit, String> {
    let (slot, scale) = split_slot(value)?;
    Ok(ValueEdit {
        slot,
        value: parse_in_range("hud scale", scale, HUD_RANGE)?,
    })
}

fn parse_in_range<T>(name: &str, value: &str, (min, max): (T, T)) -> Result<T, String>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display + Copy,
{
    let parsed: T = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid {name} '{value}'"))?;
    if !(min..=max).contains(&parsed) {
        return Err(format!("{name} {parsed} out of range, expected {min}-{max}"));
    }
    Ok(parsed)
}

fn to_core_variant(variant: VariantArg) -> VariantId {
    match variant {
        VariantArg::Cd => VariantId::Cd,
        VariantArg::Steam => VariantId::Steam,
    }
}

fn to_core_group(option: OptionArg) -> GroupId {
    match option {
        OptionArg::Render32Bit => GroupId::Render32Bit,
        OptionArg::FixedClear => GroupId::FixedClear,
        OptionArg::Force800 => GroupId::ForceResolution,
        OptionArg::NoCd => GroupId::NoCdCheck,
        OptionArg::NoStars => GroupId::NoStars,
        OptionArg::MsgLoop => GroupId::MessageLoop,
    }
}

fn show_fps_choice(mode: ShowFpsArg) -> Choice {
    match mode {
        ShowFpsArg::Disabled => Choice::Member(0),
        ShowFpsArg::Fps => Choice::Member(1),
        ShowFpsArg::SceneStats => Choice::Member(2),
        ShowFpsArg::TexStats => Choice::Member(3),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_size_edits() {
        assert_eq!(
            parse_size_edit("2=1920x1080"),
            Ok(SizeEdit {
                slot: 2,
                width: 1920,
                height: 1080
            })
        );
        assert!(parse_size_edit("4=1920x1080").is_err());
        assert!(parse_size_edit("0=320x240").is_err());
        assert!(parse_size_edit("0=1920").is_err());
        assert!(parse_size_edit("1920x1080").is_err());
    }

    #[test]
    fn parses_value_edits_within_ui_ranges() {
        assert_eq!(
            parse_fov_edit("1=90"),
            Ok(ValueEdit {
                slot: 1,
                value: 90.0
            })
        );
        assert!(parse_fov_edit("1=5").is_err());
        assert!(parse_fov_edit("1=171").is_err());
        assert!(parse_hud_edit("3=1.5").is_ok());
        assert!(parse_hud_edit("3=0.05").is_err());
        assert!(parse_hud_edit("3=abc").is_err());
        assert!(parse_fov_edit("1=NaN").is_err());
        assert!(parse_hud_edit("0=nan").is_err());
        assert!(parse_fov_edit("1=inf").is_err());
    }

    #[test]
    fn option_names_match_core_ids() {
        for option in OptionArg::value_variants() {
            let name = option
                .to_possible_value()
                .expect("every option has a name")
                .get_name()
                .to_string();
            assert_eq!(name, to_core_group(*option).as_str());
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
