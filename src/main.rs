// ABOUTME: Entry point for the karavi dry-run CLI.
// ABOUTME: Parses arguments and dispatches to the resolution and planning code.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use karavi::error::Result;
use karavi::manifest::{Enforcement, ManifestPackage, ManifestSource, OverrideLevel};
use karavi::resize::{self, Instruction, RoundingRegime};
use karavi::routes;
use karavi::types::NamePolicy;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Resolve {
            files,
            fallback_name,
            fallback_instances,
            routes: infra_routes,
            strict,
            allow_special_characters,
        } => resolve(
            files,
            &fallback_name,
            fallback_instances,
            infra_routes,
            strict,
            allow_special_characters,
        ),
        Commands::PlanResize {
            max_instances,
            upsize_percent,
            upsize_count,
            downsize_percent,
            downsize_count,
            v2_rounding,
        } => {
            plan_resize(
                max_instances,
                instruction(upsize_percent, upsize_count),
                instruction(downsize_percent, downsize_count),
                v2_rounding,
            );
            Ok(())
        }
    }
}

fn resolve(
    files: Vec<PathBuf>,
    fallback_name: &str,
    fallback_instances: u32,
    infra_routes: Vec<String>,
    strict: bool,
    allow_special_characters: bool,
) -> Result<()> {
    let mut contents = Vec::new();
    for path in &files {
        contents.push(fs::read_to_string(path)?);
    }

    let mut sources = BTreeMap::new();
    sources.insert(OverrideLevel::Service, ManifestSource::Inline(contents));

    let enforcement = if strict {
        Enforcement::Strict
    } else {
        Enforcement::Lenient
    };
    let policy = if allow_special_characters {
        NamePolicy::AllowSpecialCharacters
    } else {
        NamePolicy::Sanitize
    };

    let package = ManifestPackage::resolve(&sources, enforcement)?;
    let app_name = package.fetch_application_name(fallback_name, policy)?;
    let max_count = package.fetch_max_count(fallback_instances)?;
    let derived = routes::route_maps(&package.manifest_yml, &infra_routes)?;
    let derived = routes::apply_variable_substitution(derived, &package)?;

    println!("application: {app_name}");
    println!("max instances: {max_count}");
    if derived.is_empty() {
        println!("routes: (none)");
    } else {
        println!("routes:");
        for route in derived {
            println!("  - {route}");
        }
    }
    Ok(())
}

fn instruction(percent: Option<u32>, count: Option<u32>) -> Option<Instruction> {
    match (percent, count) {
        (Some(p), _) => Some(Instruction::Percentage(p)),
        (None, Some(c)) => Some(Instruction::Count(c)),
        (None, None) => None,
    }
}

fn plan_resize(
    max_instances: u32,
    upsize: Option<Instruction>,
    downsize: Option<Instruction>,
    v2_rounding: bool,
) {
    let regime = if v2_rounding {
        RoundingRegime::V2
    } else {
        RoundingRegime::Legacy
    };

    let up = upsize.map(|i| resize::upsize_count(i, max_instances));
    let keep = resize::downsize_keep_count(regime, downsize, upsize, max_instances);

    match up {
        Some(up) => println!("new application instances: {up}"),
        None => println!("new application instances: (unchanged)"),
    }
    println!("old application instances kept: {keep}");
}
