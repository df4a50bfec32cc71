// SPDX-License-Identifier: GPL-3.0-only

//! Command-line front end for inspecting and managing LVM snapshots

mod config;
mod logging;

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lvsnap_engine::{Actions, EngineError, ErrorKind, LvmEngine, VersionCheck, VolumeUsage};
use lvsnap_sys::{CommandExecutor, SystemExecutor, is_privileged};
use lvsnap_types::{LogicalVolume, StateSnapshot, VolumeRef, bytes_to_pretty};
use serde::Serialize;

use crate::config::Config;

/// Inspect, create and delete LVM snapshots
#[derive(Parser)]
#[command(name = "lvsnap")]
#[command(about = "LVM snapshot manager", long_about = None)]
struct Cli {
    /// Configuration file (overrides LVSNAP_CONFIG and /etc/lvsnap/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List volume groups and logical volumes
    List,
    /// Show usage and allowed actions for one volume
    Show {
        /// Volume as vg/lv
        volume: String,
    },
    /// Create a snapshot of an ordinary logical volume
    Create {
        /// Origin volume as vg/lv
        volume: String,
        /// Name of the new snapshot
        name: String,
        /// Copy-on-write space, e.g. 500M or 1G (defaults to the first preset)
        #[arg(short, long)]
        size: Option<String>,
    },
    /// Delete a snapshot
    Delete {
        /// Snapshot as vg/lv
        volume: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Compare the installed LVM release with the tested one
    Version,
    /// List the size presets offered for new snapshots
    Presets,
}

#[derive(Serialize)]
struct VolumeView<'a> {
    label: String,
    #[serde(flatten)]
    volume: &'a LogicalVolume,
    usage: VolumeUsage,
    actions: Actions,
}

#[derive(Serialize)]
struct ErrorView<'a> {
    kind: ErrorKind,
    message: String,
    hint: Option<&'a str>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("lvsnap: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config, cli.verbose);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err, cli.json);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::List => {
            let engine = LvmEngine::load(config.executor())?;
            list(&engine.state(), cli.json)
        }
        Commands::Show { volume } => {
            let target = parse_volume(volume)?;
            let mut engine = LvmEngine::load(config.executor())?;
            engine.select(target)?;
            show(&engine, cli.json)
        }
        Commands::Create { volume, name, size } => {
            let target = parse_volume(volume)?;
            let mut engine = open_for_changes(config, cli.json)?;
            engine.select(target)?;
            let size = size.as_deref().unwrap_or(config.default_size());
            let outcome = engine.create_snapshot(name, size)?;
            print_outcome(&outcome, cli.json)
        }
        Commands::Delete { volume, yes } => {
            let target = parse_volume(volume)?;
            let mut engine = open_for_changes(config, cli.json)?;
            engine.select(target.clone())?;
            let confirmed = *yes || (should_prompt(&engine) && confirm(&target)?);
            let outcome = engine.delete_snapshot(confirmed)?;
            print_outcome(&outcome, cli.json)
        }
        Commands::Version => {
            let mut engine = LvmEngine::new(config.executor());
            let check = engine.check_version(&config.tested_version());
            print_version(&check, cli.json)
        }
        Commands::Presets => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&config.size_presets)?);
            } else {
                for preset in &config.size_presets {
                    println!("{preset}");
                }
            }
            Ok(())
        }
    }
}

fn parse_volume(value: &str) -> Result<VolumeRef> {
    VolumeRef::parse(value)
        .with_context(|| format!("expected a volume as vg/lv, got {value:?}"))
}

/// Load state for a create or delete, warning once about untested releases.
fn open_for_changes(config: &Config, json: bool) -> Result<LvmEngine<SystemExecutor>> {
    let mut engine = LvmEngine::new(config.executor());
    if let VersionCheck::NewerThanTested { found, tested } =
        engine.check_version(&config.tested_version())
    {
        if !json {
            eprintln!(
                "Warning: LVM {found} is newer than the tested {tested}; some features may not work as expected."
            );
        }
    }
    engine.refresh()?;
    Ok(engine)
}

/// Only ask when the selection can actually be deleted; the engine reports anything else.
fn should_prompt<E: CommandExecutor>(engine: &LvmEngine<E>) -> bool {
    engine
        .selected()
        .is_some_and(|volume| engine.actions(volume).can_delete)
}

fn confirm(target: &VolumeRef) -> Result<bool> {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return Ok(false);
    }

    let mut stderr = std::io::stderr();
    write!(
        stderr,
        "Are you sure you want to delete snapshot '{}' from volume group '{}'? [y/N] ",
        target.lv_name, target.vg_name
    )?;
    stderr.flush()?;

    let mut answer = String::new();
    stdin.lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES" | "Yes"))
}

fn list(state: &StateSnapshot, json: bool) -> Result<()> {
    if json {
        let volumes: Vec<_> = state
            .logical_volumes
            .iter()
            .map(|volume| view(state, volume))
            .collect();
        let document = serde_json::json!({
            "volume_groups": state.volume_groups,
            "logical_volumes": volumes,
            "malformed_rows": state.malformed_rows,
            "captured_at": state.captured_at,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    if state.volume_groups.is_empty() && state.logical_volumes.is_empty() {
        println!("No volume groups found.");
        return Ok(());
    }

    for group in &state.volume_groups {
        println!(
            "{}  {} total, {} free",
            group.name,
            bytes_to_pretty(group.size, false),
            bytes_to_pretty(group.free, false)
        );
    }
    println!();
    for volume in &state.logical_volumes {
        println!(
            "{:<40} {:>12}",
            state.display_label(volume),
            bytes_to_pretty(volume.size, false)
        );
    }
    if state.malformed_rows > 0 {
        println!();
        println!("{} report row(s) could not be read.", state.malformed_rows);
    }
    Ok(())
}

fn view<'a>(state: &StateSnapshot, volume: &'a LogicalVolume) -> VolumeView<'a> {
    VolumeView {
        label: state.display_label(volume),
        volume,
        usage: lvsnap_engine::volume_usage(state, volume),
        actions: Actions::for_volume(volume),
    }
}

fn show(engine: &LvmEngine<SystemExecutor>, json: bool) -> Result<()> {
    let state = engine.state();
    let volume = engine.selected().ok_or(EngineError::NothingSelected)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view(&state, volume))?);
        return Ok(());
    }

    let actions = engine.actions(volume);
    println!("{}", state.display_label(volume));
    println!("Size: {}", bytes_to_pretty(volume.size, true));
    println!("{}", engine.selected_usage()?);
    if !volume.is_snapshot() {
        let origin = volume.volume_ref();
        let snapshots: Vec<String> = state
            .snapshots_of(&origin)
            .map(LogicalVolume::display_name)
            .collect();
        if snapshots.is_empty() {
            println!("Snapshots: none");
        } else {
            println!("Snapshots: {}", snapshots.join(", "));
        }
    }
    println!(
        "Create snapshot: {}",
        if actions.can_create { "allowed" } else { "not allowed" }
    );
    println!(
        "Delete snapshot: {}",
        if actions.can_delete { "allowed" } else { "not allowed" }
    );
    Ok(())
}

fn print_outcome(outcome: &lvsnap_engine::OperationOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        println!("{}", outcome.message);
    }
    Ok(())
}

fn print_version(check: &VersionCheck, json: bool) -> Result<()> {
    let (status, found, tested) = match check {
        VersionCheck::Supported(found) => ("supported", Some(found.to_string()), None),
        VersionCheck::NewerThanTested { found, tested } => (
            "newer_than_tested",
            Some(found.to_string()),
            Some(tested.to_string()),
        ),
        VersionCheck::Unknown => ("unknown", None, None),
    };

    if json {
        let document = serde_json::json!({
            "status": status,
            "found": found,
            "tested": tested,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    match check {
        VersionCheck::Supported(found) => println!("LVM {found}"),
        VersionCheck::NewerThanTested { found, tested } => println!(
            "LVM {found} (newer than the tested {tested}; some features may not work as expected)"
        ),
        VersionCheck::Unknown => println!("LVM version could not be determined"),
    }
    Ok(())
}

fn hint(kind: ErrorKind) -> Option<&'static str> {
    match kind {
        ErrorKind::Unavailable => Some("install the lvm2 package or set lvm_bin_dir"),
        ErrorKind::PermissionDenied => Some("LVM operations require root; try again with sudo"),
        ErrorKind::Timeout => Some("raise command_timeout_secs if LVM is slow on this system"),
        ErrorKind::NotConfirmed => Some("answer 'y' at the prompt or pass --yes"),
        ErrorKind::NotFound => Some("run `lvsnap list` to see the available volumes"),
        _ => None,
    }
}

fn report(err: &anyhow::Error, json: bool) {
    let engine_error = err.downcast_ref::<EngineError>();
    let kind = engine_error.map(EngineError::kind);
    let mut advice = kind.and_then(hint);
    if kind == Some(ErrorKind::PermissionDenied) && is_privileged() {
        advice = None;
    }

    if json {
        let view = ErrorView {
            kind: kind.unwrap_or(ErrorKind::InvalidInput),
            message: format!("{err:#}"),
            hint: advice,
        };
        match serde_json::to_string_pretty(&view) {
            Ok(text) => println!("{text}"),
            Err(_) => eprintln!("Error: {err:#}"),
        }
        return;
    }

    eprintln!("Error: {err:#}");
    if let Some(advice) = advice {
        eprintln!("Hint: {advice}");
    }
}
