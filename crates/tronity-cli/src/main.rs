//! # Tronity CLI
//!
//! Command-line utilities for inspecting vehicle telemetry.

use anyhow::{bail, Context, Result};
use std::env;
use tronity_agent::{Agent, AgentConfig};
use tronity_core::{DeviceClass, StateClass, FIELDS};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "fields" => print_fields(),
        "snapshot" => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to start runtime")?;
            runtime.block_on(snapshot())?;
        }
        "help" | "--help" | "-h" => {
            print_help();
        }
        cmd => {
            eprintln!("Unknown command: {cmd}");
            print_help();
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_fields() {
    println!(
        "{:<22} {:<6} {:<14} {:<18} ICON",
        "KEY", "UNIT", "DEVICE CLASS", "STATE CLASS"
    );
    for spec in FIELDS {
        println!(
            "{:<22} {:<6} {:<14} {:<18} {}",
            spec.key,
            spec.unit.unwrap_or("-"),
            spec.device_class.map_or("-", DeviceClass::as_str),
            spec.state_class.map_or("-", StateClass::as_str),
            spec.icon.unwrap_or("-"),
        );
    }
}

async fn snapshot() -> Result<()> {
    let config = AgentConfig::from_env()?;
    let agent = Agent::new(config)?;
    let handle = agent.register().await?;

    let state = handle.coordinator().state();
    agent.registry().shutdown().await;

    match state.last_snapshot {
        Some(snapshot) => {
            let json = serde_json::to_string_pretty(&*snapshot)?;
            println!("{json}");
            Ok(())
        }
        None => match state.last_error {
            Some(err) => bail!("Refresh failed: {err}"),
            None => bail!("No snapshot available"),
        },
    }
}

fn print_help() {
    println!(
        r#"Tronity CLI

USAGE:
    tronity <COMMAND>

COMMANDS:
    fields      List the telemetry fields and their units
    snapshot    Fetch the configured vehicle's latest record as JSON
    help        Show this help message

ENVIRONMENT:
    TRONITY_CLIENT_ID, TRONITY_CLIENT_SECRET, TRONITY_VEHICLE_ID (required)
    TRONITY_AUTH_URL, TRONITY_VEHICLES_URL, TRONITY_TIMEOUT_SECS (optional)

EXAMPLES:
    tronity fields
    TRONITY_VEHICLE_ID=veh-1 tronity snapshot
"#
    );
}
