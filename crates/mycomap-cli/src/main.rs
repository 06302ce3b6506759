//! Mycomap CLI: turn plant-fungus symbiosis records into map-ready GeoJSON.

use std::time::Instant;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use mycomap_core::config::MapConfig;
use mycomap_core::error::LoadError;
use mycomap_core::output::{write_output, MapData};
use mycomap_core::pipeline;
use mycomap_core::session::{MapSession, RenderSink};
use mycomap_core::source::SourceLocation;

#[derive(Parser)]
#[command(
    name = "mycomap",
    about = "Mycomap - Map plants, their fungal partners, and the links between them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build GeoJSON map layers from a delimited symbiosis dataset
    Build {
        /// Data file path, http(s) URL, or `-` for stdin
        source: String,

        /// Output JSON file path
        #[arg(short, long)]
        output: Option<String>,

        /// Force a field delimiter instead of auto-detecting it
        #[arg(long)]
        delimiter: Option<char>,

        /// Timeout for URL sources, in seconds
        #[arg(long, default_value = "30")]
        timeout_secs: u64,

        /// Show per-phase timing breakdown and debug logging
        #[arg(long)]
        verbose: bool,

        /// Suppress all output except errors
        #[arg(long)]
        quiet: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            source,
            output,
            delimiter,
            timeout_secs,
            verbose,
            quiet,
        } => {
            init_logging(verbose, quiet);

            let location = SourceLocation::parse(&source);
            let output_path = output.unwrap_or_else(|| format!("{}.mycomap.json", location.stem()));

            let config = MapConfig {
                source: location.to_string(),
                output_path: Some(output_path.clone()),
                delimiter,
                fetch_timeout_secs: timeout_secs,
                verbose,
                quiet,
                ..Default::default()
            };

            run(config, &location, &output_path);
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Writes each presented dataset to the output file.
struct FileSink {
    output_path: String,
    pb: ProgressBar,
    written: bool,
}

impl RenderSink for FileSink {
    fn present(&mut self, data: &MapData) -> Result<(), LoadError> {
        self.pb.finish_and_clear();
        write_output(data, &self.output_path).map_err(|e| {
            LoadError::TransformFailure(format!("writing {}: {e}", self.output_path))
        })?;
        self.written = true;
        Ok(())
    }

    fn show_error(&mut self, error: &LoadError) {
        self.pb.finish_and_clear();
        eprintln!("{} {}", style("✗").red().bold(), error.user_message());
        eprintln!("  {}", style(error).dim());
    }

    fn clear(&mut self) {
        if self.written {
            let _ = std::fs::remove_file(&self.output_path);
            self.written = false;
        }
    }
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        pb.set_style(
            spinner_style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
    }
    pb.set_message("Initialising...");
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

fn run(config: MapConfig, location: &SourceLocation, output_path: &str) {
    let pb = spinner(config.quiet);

    let progress: pipeline::ProgressCallback = {
        let pb = pb.clone();
        Box::new(move |_name, label| {
            pb.set_message(label.to_string());
        })
    };

    let sink = FileSink {
        output_path: output_path.to_string(),
        pb,
        written: false,
    };
    let mut session = MapSession::new(config, sink).with_progress(progress);
    let MapConfig { quiet, verbose, .. } = *session.config();

    let start = Instant::now();
    let result = match session.load(location) {
        Ok(data) => data,
        Err(LoadError::NoUsableRecords { .. }) => std::process::exit(2),
        Err(_) => std::process::exit(1),
    };

    if quiet {
        return;
    }

    // Summary
    println!(
        "\n{}  Mycomap: {}",
        style("✓").green().bold(),
        style(location).bold()
    );
    for (label, key) in [
        ("Rows:", "rows"),
        ("Plants:", "plants"),
        ("Fungi:", "fungi"),
        ("Connections:", "connections"),
    ] {
        println!("  {:<14} {}", label, result.stat(key));
    }

    let default_matches = result.stat("default_key_connections");
    if default_matches > 0 {
        println!(
            "  {:<14} {} {}",
            "Unknown keys:",
            style(default_matches).yellow(),
            style("(connections matched on the \"Unknown\" placeholder)").dim()
        );
    }

    let duration = start.elapsed();
    println!(
        "  {:<14} {:.1}ms",
        "Duration:",
        duration.as_secs_f64() * 1000.0
    );

    if verbose {
        if let Some(serde_json::Value::Object(timings)) = result.metadata.get("phase_timings") {
            println!("\n  Phase Timings:");
            for (phase, secs) in timings {
                if let Some(val) = secs.as_f64() {
                    println!("    {:<14} {:.1}ms", phase, val * 1000.0);
                }
            }
        }
        println!(
            "  {:<14} {} plant, {} fungus",
            "Rejected:",
            result.stat("plant_rejections"),
            result.stat("fungus_rejections")
        );
    }

    println!(
        "\n  {} {}",
        style("Output written to:").green(),
        output_path
    );
}
