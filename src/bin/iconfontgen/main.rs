/// Icon font generator binary entry point
///
/// Loads a project file and writes the subset fonts, headers, embedded sources and glyph cards
/// it requests.
///
/// # Examples
///
/// Basic usage:
/// ```sh
/// cargo run --bin iconfontgen -- --project icons.toml
/// ```
///
/// Merge every enabled font into one output, with debug logs:
/// ```sh
/// cargo run --bin iconfontgen -- -v --project icons.toml --mode merged --output-dir generated
/// ```
///
/// Only look for duplicated names and code points:
/// ```sh
/// cargo run --bin iconfontgen -- --project icons.toml --check
/// ```
use clap::Parser;
use iconfontgen::config::{load_project, plan_for_mode, ConfigSource};
use iconfontgen::generator::Generator;
use iconfontgen::messages::LogSink;
use iconfontgen::project::{GenerationPlan, ProjectSelection};
use iconfontgen::remap::DuplicateFlags;
use log::{debug, error, info, warn};
use std::fs;
use std::process;

mod args;
mod logging;

use args::IconFontArgs;
use logging::init_logging;

/// How a run ended, when it did not fail outright
enum RunStatus {
    Success,
    Duplicates,
    ArtifactsFailed(usize),
}

fn main() {
    let args = IconFontArgs::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    debug!("Parsed arguments: {:?}", args);

    match run(&args) {
        Ok(RunStatus::Success) => info!("Generation completed successfully"),
        Ok(RunStatus::Duplicates) => {
            error!("Duplicated names or code points found");
            process::exit(1);
        }
        Ok(RunStatus::ArtifactsFailed(count)) => {
            error!("{} artifact(s) could not be generated", count);
            process::exit(1);
        }
        Err(e) => {
            error!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn describe(flags: DuplicateFlags) -> String {
    match (flags.name_in_double, flags.code_point_in_double) {
        (true, true) => "names and code points".to_string(),
        (true, false) => "names".to_string(),
        _ => "code points".to_string(),
    }
}

/// Logs the duplicate report, returns true when something is duplicated.
///
/// Disabled fonts are left out, except the font of a current mode plan.
fn report_duplicates(project: &ProjectSelection, plan: GenerationPlan) -> bool {
    let report = project.duplicate_report();
    let mut found = report.any();
    if let GenerationPlan::Current { font: id, .. } = plan {
        if let Some(font) = project.font(id).filter(|f| !f.settings.enabled) {
            let flags = font.duplicate_flags();
            if flags.any() {
                warn!("{} has duplicated {}", font.display_name(), describe(flags));
                found = true;
            }
        }
    }
    for id in project.ids() {
        let flags = report.font(id);
        if flags.any() {
            let name = project.font(id).map(|f| f.display_name()).unwrap_or_default();
            warn!("{} has duplicated {}", name, describe(flags));
        }
    }
    if report.global.any() {
        warn!("Duplicated {} across fonts, merged generation is not possible", describe(report.global));
    }
    found
}

/// Main entry point for generation logic
fn run(args: &IconFontArgs) -> Result<RunStatus, Box<dyn std::error::Error>> {
    let project_path = args.project.to_string_lossy();
    debug!("Loading project from: {:?}", args.project);
    let (mut project, mut request) = load_project(ConfigSource::File(&project_path))?;
    info!("Project loaded with {} font(s)", project.fonts.len());

    if let Some(dir) = &args.output_dir {
        project.output_dir = dir.clone();
    }

    if args.mode.is_some() || args.font.is_some() {
        let mode = args.mode.clone().unwrap_or_else(|| "current".to_string());
        let current = match (args.font, request.plan) {
            (Some(index), _) => index,
            (None, GenerationPlan::Current { font, .. }) => font.0,
            (None, _) => 0,
        };
        request.plan = plan_for_mode(&mode, current, request.plan.targets(), &project)?;
        debug!("Plan overridden: {:?}", request.plan);
    }

    let has_duplicates = report_duplicates(&project, request.plan);
    if args.check {
        if has_duplicates {
            return Ok(RunStatus::Duplicates);
        }
        info!("No duplicated name or code point");
        return Ok(RunStatus::Success);
    }

    if !project.output_dir.as_os_str().is_empty() && !project.output_dir.exists() {
        debug!("Creating output directory: {:?}", project.output_dir);
        fs::create_dir_all(&project.output_dir)?;
        info!("Created output directory: {:?}", project.output_dir);
    }

    let sink = LogSink;
    let outcome = Generator::new(&project, &sink).generate(&request);
    for path in &outcome.written {
        debug!("Wrote {:?}", path);
    }

    if outcome.is_success() {
        Ok(RunStatus::Success)
    } else {
        Ok(RunStatus::ArtifactsFailed(outcome.failures.len()))
    }
}
