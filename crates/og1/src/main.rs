use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use og1_core::archive::{
    read_dive_archive, read_mission_archive, write_mission_archive, MissionArchive,
};
use og1_core::attributes::{default_attribute_config, AttributeConfig};
use og1_core::model::DiveRecord;
use og1_core::pipeline::process_mission;
use og1_core::vocabulary::{default_vocabulary, Vocabulary};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert glider dive archives into an OG1 mission dataset", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a directory of dive archives into one mission archive
    Convert(ConvertArgs),
    /// Print the contents of a mission or dive archive
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Directory containing one zip archive per dive
    #[arg(long)]
    input: PathBuf,
    /// Path of the mission archive to write
    #[arg(long, default_value = "mission_og1.zip")]
    output: PathBuf,
    /// Lowest dive number to include
    #[arg(long)]
    start_dive: Option<i64>,
    /// Highest dive number to include
    #[arg(long)]
    end_dive: Option<i64>,
    /// TOML file with vocabulary overrides
    #[arg(long)]
    vocabulary: Option<PathBuf>,
    /// TOML file with dataset attribute overrides
    #[arg(long)]
    attributes: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Archive to describe
    #[arg(long)]
    archive: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Convert(args) => handle_convert(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_convert(args: ConvertArgs) -> Result<()> {
    let vocab = match &args.vocabulary {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Vocabulary::from_toml_str(&text)
                .with_context(|| format!("invalid vocabulary overrides in {}", path.display()))?
        }
        None => default_vocabulary().clone(),
    };
    let config = match &args.attributes {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            AttributeConfig::from_toml_str(&text)
                .with_context(|| format!("invalid attribute overrides in {}", path.display()))?
        }
        None => default_attribute_config().clone(),
    };

    let pattern = args.input.join("*.zip").to_string_lossy().into_owned();
    let mut records: Vec<DiveRecord> = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry?;
        let bytes = fs::read(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match read_dive_archive(&bytes) {
            Ok(record) => records.push(record),
            Err(err) => warn!("skipping {}: {err}", path.display()),
        }
    }
    if let Some(start) = args.start_dive {
        records.retain(|record| record.dive_number >= start);
    }
    if let Some(end) = args.end_dive {
        records.retain(|record| record.dive_number <= end);
    }
    records.sort_by_key(|record| record.dive_number);
    if records.is_empty() {
        bail!("no dive archives found under {}", args.input.display());
    }

    let total = records.len();
    let now = Utc::now();
    let dataset = process_mission(records, &vocab, &config, now)?;

    for warning in dataset.warnings.iter() {
        warn!("{warning}");
    }
    for skipped in &dataset.skipped {
        error!("dive {} excluded: {}", skipped.dive_number, skipped.reason);
    }

    let bytes = write_mission_archive(&dataset, Uuid::new_v4(), now)?;
    fs::write(&args.output, bytes)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    let converted = total - dataset.skipped.len();
    println!(
        "Converted {converted} of {total} dives into {}",
        args.output.display()
    );
    if !dataset.skipped.is_empty() {
        println!("Skipped {} dives:", dataset.skipped.len());
        for skipped in &dataset.skipped {
            println!("  dive {}: {}", skipped.dive_number, skipped.reason);
        }
    }
    if !dataset.warnings.is_empty() {
        println!(
            "{} conversion warnings were recorded in the archive manifest.",
            dataset.warnings.len()
        );
    }

    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let bytes = fs::read(&args.archive)
        .with_context(|| format!("failed to read {}", args.archive.display()))?;
    match read_mission_archive(&bytes) {
        Ok(mission) => print_mission(&mission),
        Err(mission_err) => match read_dive_archive(&bytes) {
            Ok(record) => print_dive(&record),
            Err(_) => Err(mission_err).with_context(|| {
                format!("{} is not a recognized archive", args.archive.display())
            }),
        },
    }
}

fn print_mission(archive: &MissionArchive) -> Result<()> {
    let manifest = &archive.manifest;
    println!("Mission archive {}", manifest.id);
    println!("  created: {}", manifest.created);
    println!("  axis: {}", manifest.axis);
    println!(
        "  rows: {}, variables: {}",
        archive.frame.height(),
        manifest.variables.len()
    );
    for variable in &manifest.variables {
        match variable.attrs.get("units") {
            Some(units) => println!("    {} [{units}]", variable.name),
            None => println!("    {}", variable.name),
        }
    }
    println!("  sensors: {}", manifest.sensors.len());
    for sensor in &manifest.sensors {
        println!("    {}", sensor.name);
    }
    if !manifest.warnings.is_empty() {
        println!("  warnings:");
        for warning in &manifest.warnings {
            println!("    {warning}");
        }
    }
    if !manifest.skipped_dives.is_empty() {
        println!("  skipped dives:");
        for skipped in &manifest.skipped_dives {
            println!("    dive {}: {}", skipped.dive_number, skipped.reason);
        }
    }
    println!(
        "  attributes: {}",
        serde_json::to_string_pretty(&manifest.attributes)?
    );
    Ok(())
}

fn print_dive(record: &DiveRecord) -> Result<()> {
    println!("Dive archive for dive {}", record.dive_number);
    println!("  fields: {}", record.fields.len());
    for field in &record.fields {
        if field.dims.is_empty() {
            println!("    {} (scalar)", field.name);
        } else {
            println!(
                "    {} [{}] ({} samples)",
                field.name,
                field.dims.join(", "),
                field.len()
            );
        }
    }
    println!("  sensors: {}", record.sensors.len());
    for sensor in &record.sensors {
        println!("    {} ({})", sensor.source_attribute, sensor.make_model);
    }
    println!(
        "  attributes: {}",
        serde_json::to_string_pretty(&record.attributes)?
    );
    Ok(())
}
