//! # WebP Express - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento delle preferenze e override dai flag
//! - Creazione dell'engine e avvio del batch
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (file, destinazione, quality, preset, workers)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Filtra gli input e crea la directory di destinazione
//! 4. Aggiunge i file all'engine e sottomette il batch
//! 5. Mostra il progresso, poi la tabella per file e il riepilogo
//!
//! ## Esempio di utilizzo:
//! ```bash
//! webp-express photos/*.jpg --output ./webp --quality 85 --preset photo --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use webp_express::{
    config::{default_workers, Preset, Settings},
    engine::PathResolver,
    file_manager::FileManager,
    json_output::{JsonConfig, JsonMessage},
    progress::{spawn_listener, ProgressManager},
    savings::format_size,
    AddPolicy, BatchEngine, JobItem, JobState,
};

#[derive(Parser)]
#[command(name = "webp-express")]
#[command(about = "Convert images to WebP in parallel")]
struct Args {
    /// Image files (or directories of images) to convert
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Destination directory for the .webp files
    #[arg(short, long)]
    output: PathBuf,

    /// WebP quality (50-100, step 5)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Encoder preset
    #[arg(short, long, value_enum)]
    preset: Option<Preset>,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Keep already converted items in the list when adding
    #[arg(long)]
    keep_succeeded: bool,

    /// Emit one JSON object per line instead of the progress bar
    #[arg(long)]
    json: bool,

    /// Persist quality, preset and workers as the new defaults
    #[arg(long)]
    save_settings: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging, stdout stays free for results and JSON lines
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let json = args.json;
    if let Err(e) = run(args).await {
        if json {
            JsonMessage::error(e.to_string(), e.chain().nth(1).map(|cause| cause.to_string())).emit();
        }
        return Err(e);
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let settings_path = Settings::default_path()?;
    let mut settings = Settings::from_file(&settings_path).await?;
    if let Some(quality) = args.quality {
        settings.quality = quality;
    }
    if let Some(preset) = args.preset {
        settings.preset = preset;
    }
    if let Some(workers) = args.workers {
        settings.workers = Some(workers);
    }
    settings.validate()?;

    if args.save_settings {
        settings.save_to_file(&settings_path).await?;
        info!("Saved settings to {}", settings_path.display());
    }

    let inputs = FileManager::collect_inputs(&args.files).await;
    for (path, reason) in &inputs.skipped {
        warn!("Skipping {}: {}", path.display(), reason);
    }
    if inputs.accepted.is_empty() {
        return Err(anyhow::anyhow!("No image files to convert"));
    }

    PathResolver::ensure_destination(&args.output).await?;

    let config = settings.conversion_config();
    let workers = settings.workers.unwrap_or_else(default_workers);
    let engine = BatchEngine::new(workers);

    let policy = if args.keep_succeeded {
        AddPolicy::KeepSucceeded
    } else {
        AddPolicy::PurgeSucceeded
    };
    engine.add(inputs.accepted, policy).await;

    let total = engine.jobs().len().await;
    let progress = (!args.json).then(|| ProgressManager::new(total as u64));
    let listener = match &progress {
        Some(progress) => {
            let bar = progress.clone();
            spawn_listener(engine.subscribe_jobs(), total, move |item| bar.record(item))
        }
        None => {
            JsonMessage::start(args.output.clone(), total, JsonConfig::new(&config, workers)).emit();
            spawn_listener(engine.subscribe_jobs(), total, |item| {
                JsonMessage::file_complete(item).emit()
            })
        }
    };

    let handle = match engine.submit(&args.output, config).await? {
        Some(handle) => handle,
        None => {
            listener.abort();
            info!("Nothing to convert");
            return Ok(());
        }
    };
    let result = handle.wait().await?;

    // Every terminal event is already queued once the batch settles
    if tokio::time::timeout(Duration::from_secs(2), listener).await.is_err() {
        warn!("Progress listener did not finish");
    }

    match progress {
        Some(progress) => {
            progress.finish(&result.format_summary());
            print_table(&engine.jobs().snapshot().await);
            println!("\n{}", result.format_summary());
        }
        None => JsonMessage::complete(&result).emit(),
    }

    engine.shutdown().await;
    Ok(())
}

fn state_label(state: JobState) -> &'static str {
    match state {
        JobState::Unstarted => "pending",
        JobState::Processing => "converting",
        JobState::Success => "done",
        JobState::Fail => "failed",
    }
}

fn print_table(items: &[JobItem]) {
    let width = items
        .iter()
        .map(|item| item.file_name().len())
        .max()
        .unwrap_or(4)
        .max(4);

    println!("\n{:<width$}  {:<10}  {:>10}  {}", "Name", "State", "Size", "Space saved", width = width);
    for item in items {
        let size = item
            .source_size_bytes
            .map(format_size)
            .unwrap_or_default();
        let detail = match (&item.state, &item.last_error) {
            (JobState::Fail, Some(failure)) => failure.message.clone(),
            _ => item.savings_display(),
        };
        println!(
            "{:<width$}  {:<10}  {:>10}  {}",
            item.file_name(),
            state_label(item.state),
            size,
            detail,
            width = width
        );
    }
}
