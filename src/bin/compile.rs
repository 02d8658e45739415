//! Protocol Compiler CLI
//!
//! Compiles endpoint declarations and definitions into JSON Schema artifacts.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tachyon_schemas::checksum::MANIFEST_FILE;
use tachyon_schemas::{load_project, ChecksumManifest, CompilerConfig, OutputFormat};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tachyon-compile")]
#[command(about = "Compile Tachyon endpoint declarations into JSON Schema artifacts")]
struct Cli {
    /// Source root (one directory per service, plus definitions/)
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Config file, layered over tachyon.toml and the environment
    #[arg(short, long)]
    config: Option<String>,

    /// Write compact JSON instead of four-space indentation
    #[arg(long)]
    compact: bool,

    /// Skip checksums.sha256
    #[arg(long)]
    no_checksums: bool,

    /// Compile and report, but don't write anything
    #[arg(long)]
    dry_run: bool,

    /// Verify an existing output directory against its checksums instead of compiling
    #[arg(long, conflicts_with = "dry_run")]
    verify: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = CompilerConfig::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(source) = cli.source {
        config.source.root = source;
    }
    if let Some(out) = cli.out {
        config.output.dir = out;
    }
    if cli.compact {
        config.output.format = OutputFormat::Compact;
    }
    if cli.no_checksums {
        config.output.include_checksums = false;
    }

    if cli.verify {
        return verify(&config);
    }

    let artifacts = load_project(&config)
        .with_context(|| format!("Failed to compile {}", config.source.root.display()))?;

    println!("🔍 Compiled {}", config.source.root.display());
    for (service, endpoints) in &artifacts.schema_meta.service_ids {
        println!("  {} ({} endpoints)", service, endpoints.len());
        for endpoint in artifacts.ordered_endpoints(service) {
            println!("    └─ {}", endpoint);
        }
    }
    println!(
        "  {} commands, {} definitions",
        artifacts.command_configs.len(),
        artifacts.definitions.len()
    );

    if cli.dry_run {
        let files = artifacts.files(config.output.include_meta)?;
        println!();
        println!("Dry run - would write {} files to {}:", files.len(), config.output.dir.display());
        for file in files {
            println!("  {}", file.path);
        }
        return Ok(());
    }

    let written = artifacts
        .write(&config.output.dir, &config.output)
        .with_context(|| format!("Failed to write artifacts to {}", config.output.dir.display()))?;

    println!("✅ Wrote {} files to {}", written.len(), config.output.dir.display());
    Ok(())
}

fn verify(config: &CompilerConfig) -> anyhow::Result<()> {
    let manifest_path = config.output.dir.join(MANIFEST_FILE);
    let content = fs::read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;

    let manifest = ChecksumManifest::parse(&content);
    let mismatched = manifest.verify(&config.output.dir)?;

    if mismatched.is_empty() {
        println!("✅ {} artifacts match {}", manifest.entries().len(), MANIFEST_FILE);
        Ok(())
    } else {
        for path in &mismatched {
            println!("  ❌ {}", path);
        }
        bail!("{} artifact(s) do not match {}", mismatched.len(), MANIFEST_FILE)
    }
}
