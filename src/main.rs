use clap::{Parser, Subcommand};
use imgstage::config::{self, UploadConfig};
use imgstage::imaging::{CropRect, RustBackend};
use imgstage::output;
use imgstage::pipeline::Pipeline;
use imgstage::store::FsStore;
use imgstage::types::{ProcessOptions, UploadedFile};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imgstage")]
#[command(about = "Validate, crop and version uploaded images")]
#[command(long_about = "\
Validate, crop and version uploaded images

Every file is sniffed by content, never by name. Accepted images (GIF, JPEG,
PNG) are promoted to the processing directory, optionally cropped, and
resized into the configured versions:

  public/
  ├── images/processing/     # validated, waiting for crop (short-lived)
  ├── images/uploaded/       # versions: 1377287616449_thmb.jpg, ...
  └── images/originals/      # preserved uploads (optional)
  tmp/staging/               # scratch space, emptied after every upload

Log verbosity follows RUST_LOG (default: warn).

Run 'imgstage gen-config' to generate a documented imgstage.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Flags shared by commands that take local files as uploads.
#[derive(clap::Args, Clone)]
struct UploadArgs {
    /// Image files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Form field the files arrive in (default: first configured input field)
    #[arg(long)]
    field: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Validate, crop and version files
    Upload {
        #[command(flatten)]
        upload: UploadArgs,

        /// Crop rectangle as x1,y1,w,h
        #[arg(long)]
        crop: Option<CropRect>,

        /// Base name under the custom naming convention
        #[arg(long)]
        name: Option<String>,
    },
    /// Validate files into the processing directory without versioning them
    Validate {
        #[command(flatten)]
        upload: UploadArgs,
    },
    /// Crop a file waiting in the processing directory and version it
    Crop {
        /// File name inside the processing directory
        processing_name: String,

        /// Crop rectangle as x1,y1,w,h
        #[arg(long)]
        rect: Option<CropRect>,

        /// Base name under the custom naming convention
        #[arg(long)]
        name: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove stale staging and processing files
    Sweep {
        /// Minimum age in seconds of files to remove
        #[arg(long, default_value_t = 86_400)]
        older_than: u64,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock imgstage.toml with all options documented
    GenConfig,
    /// Load and validate the config file
    CheckConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let upload_config = config::load_config(&cli.config)?;
    let store = FsStore::new();
    let backend = RustBackend::new();
    let pipeline = Pipeline::new(&upload_config, &store, &backend);

    match cli.command {
        Command::Upload { upload, crop, name } => {
            let files: Vec<_> = uploaded_files(&upload, &upload_config)?
                .into_iter()
                .filter(|f| pipeline.accepts(f))
                .collect();
            let options = ProcessOptions {
                crop,
                custom_name: name,
                original_name: None,
            };
            let results: Vec<_> = files
                .iter()
                .map(|file| (file, pipeline.ingest(file, &options)))
                .collect();
            let failed = results.iter().filter(|(_, r)| r.is_err()).count();

            if upload.json {
                let json: Vec<_> = results
                    .iter()
                    .map(|(file, r)| match r {
                        Ok(p) => serde_json::json!({ "file": file.declared_name, "result": p }),
                        Err(e) => error_json(&file.declared_name, e),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                for (i, (file, r)) in results.iter().enumerate() {
                    output::print_lines(&output::format_processed(i + 1, &file.declared_name, r));
                }
                println!();
                println!("{}", output::format_summary("Processed", results.len() - failed, failed));
            }
            fail_if_any(failed, results.len())?;
        }
        Command::Validate { upload } => {
            init_thread_pool(&upload_config.processing);
            let files = uploaded_files(&upload, &upload_config)?;
            let outcomes = pipeline.upload_all(&files);
            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();

            if upload.json {
                let json: Vec<_> = outcomes
                    .iter()
                    .map(|o| match &o.result {
                        Ok(v) => serde_json::json!({ "file": o.declared_name, "result": v }),
                        Err(e) => error_json(&o.declared_name, e),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                for (i, o) in outcomes.iter().enumerate() {
                    output::print_lines(&output::format_validation(i + 1, &o.declared_name, &o.result));
                }
                println!();
                println!("{}", output::format_summary("Validated", outcomes.len() - failed, failed));
            }
            fail_if_any(failed, outcomes.len())?;
        }
        Command::Crop {
            processing_name,
            rect,
            name,
            json,
        } => {
            let options = ProcessOptions {
                crop: rect,
                custom_name: name,
                original_name: None,
            };
            let versions = pipeline
                .open_processing(&processing_name)
                .and_then(|file| pipeline.crop(file, options.crop))
                .and_then(|file| pipeline.process(file, &options))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&versions)?);
            } else {
                for artifact in &versions {
                    println!("{}", output::format_artifact(artifact));
                }
            }
        }
        Command::Sweep { older_than, json } => {
            let report = pipeline.sweep(Duration::from_secs(older_than));
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_sweep(&report);
            }
        }
        Command::CheckConfig => {
            println!("Config OK: {}", describe_config_source(&cli.config));
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Log to stderr so stdout stays clean for results and `--json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Describe local files the way a request decoder would.
fn uploaded_files(
    args: &UploadArgs,
    config: &UploadConfig,
) -> Result<Vec<UploadedFile>, Box<dyn std::error::Error>> {
    let field = match &args.field {
        Some(field) => field.clone(),
        None => config
            .input_fields
            .first()
            .cloned()
            .ok_or("no input_fields configured")?,
    };

    args.files
        .iter()
        .map(|path| -> Result<UploadedFile, Box<dyn std::error::Error>> {
            let declared_size = std::fs::metadata(path)?.len();
            Ok(UploadedFile {
                field_name: field.clone(),
                temp_path: path.clone(),
                declared_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                declared_size,
            })
        })
        .collect()
}

fn error_json(file: &str, err: &imgstage::UploadError) -> serde_json::Value {
    serde_json::json!({
        "file": file,
        "error": err.to_string(),
        "rejected": err.is_rejection(),
    })
}

fn fail_if_any(failed: usize, total: usize) -> Result<(), Box<dyn std::error::Error>> {
    if failed > 0 {
        return Err(format!("{failed} of {total} files failed").into());
    }
    Ok(())
}

fn describe_config_source(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} not found, using stock defaults", path.display())
    }
}
