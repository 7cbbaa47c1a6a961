use clap::{Parser, Subcommand};
use retouch::config;
use retouch::edit::{EditPipeline, EditRequest};
use retouch::history::OperationLog;
use retouch::imaging::RustBackend;
use retouch::output;
use retouch::renditions::Target;
use retouch::restore::RestorePipeline;
use retouch::store::{AttachmentStore, FsStore};
use retouch::types::AssetId;
use retouch::upload;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "retouch")]
#[command(about = "Non-destructive image editing for media libraries")]
#[command(long_about = "\
Non-destructive image editing for media libraries

Images live under a library root; retouch keeps per-asset metadata and a
backup registry in <root>/.retouch/. Every save writes a new -e<suffix> file
and archives what it replaces, so the uploaded original can always be
restored.

Library layout:

  photos/
  ├── retouch.toml                      # Editor config (optional)
  ├── .retouch/beach.json               # Metadata + backup registry
  └── 2024/
      ├── beach.jpg                     # Uploaded original, never modified
      ├── beach-150x150.jpg             # Renditions
      ├── beach-e1700000000123.jpg      # Edited full size
      └── beach-e1700000000123-150x150.jpg

Edit histories are JSON arrays, applied in order:

  [{\"r\":90},{\"f\":1},{\"c\":{\"x\":10,\"y\":10,\"w\":200,\"h\":150}}]

  r  rotate, degrees counter-clockwise
  f  flip, 1 = horizontal axis, 2 = vertical axis, 3 = both
  c  crop, in preview pixels

Run 'retouch gen-config' to generate a documented retouch.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Library root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Where an edit history comes from.
#[derive(clap::Args, Clone)]
#[group(multiple = false)]
struct HistoryArgs {
    /// History as a JSON string
    #[arg(long)]
    history: Option<String>,

    /// File holding the history JSON
    #[arg(long)]
    history_file: Option<PathBuf>,
}

impl HistoryArgs {
    fn load(&self) -> Result<Option<OperationLog>, Box<dyn std::error::Error>> {
        let json = match (&self.history, &self.history_file) {
            (Some(json), _) => json.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => return Ok(None),
        };
        Ok(Some(OperationLog::from_json(&json)?))
    }
}

#[derive(Subcommand)]
enum Command {
    /// Register an image under the root as a new asset
    Import {
        /// Asset identifier
        id: AssetId,
        /// Image path, relative to the root
        file: PathBuf,
    },
    /// Apply an edit history, or scale the full size, and save a new version
    Edit {
        id: AssetId,
        #[command(flatten)]
        history: HistoryArgs,
        /// Which files to rewrite: all, full, nothumb, thumbnail
        #[arg(long, default_value = "all")]
        target: Target,
        /// Scale the full-size image to WxH instead of applying a history
        #[arg(long, value_parser = parse_dimensions, conflicts_with_all = ["history", "history_file"])]
        scale: Option<(u32, u32)>,
    },
    /// Return an asset to its uploaded original
    Restore { id: AssetId },
    /// Render an edit history at preview size without saving
    Preview {
        id: AssetId,
        #[command(flatten)]
        history: HistoryArgs,
        /// Output image path
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Print an asset's metadata and backups
    Show { id: AssetId },
    /// Print a stock retouch.toml with all options documented
    GenConfig,
}

fn parse_dimensions(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| format!("invalid dimension '{}'", v))
    };
    Ok((parse(w)?, parse(h)?))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if matches!(cli.command, Command::GenConfig) {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.root)?;
    let store = FsStore::new(&cli.root);
    let backend = RustBackend::new();

    match cli.command {
        Command::Import { id, file } => {
            let meta = upload::import(&backend, &store, &config, &id, &file)
                .map_err(|e| output::format_error(e.kind(), &e.to_string()))?;
            output::print_import_output(&id, &meta);
        }
        Command::Edit {
            id,
            history,
            target,
            scale,
        } => {
            let request = match (scale, history.load()?) {
                (Some((width, height)), _) => EditRequest::scale(id.clone(), width, height),
                (None, Some(log)) => EditRequest::new(id.clone(), log, target),
                (None, None) => return Err("edit needs --history, --history-file or --scale".into()),
            };
            let summary = EditPipeline::new(&backend, &store, &config)
                .apply(&request)
                .map_err(|e| output::format_error(e.kind(), &e.to_string()))?;
            output::print_save_output(&id, &summary);
        }
        Command::Restore { id } => {
            let summary = RestorePipeline::new(&store, &config)
                .restore(&id)
                .map_err(|e| output::format_error(e.kind(), &e.to_string()))?;
            output::print_restore_output(&id, &summary);
        }
        Command::Preview {
            id,
            history,
            output: out,
        } => {
            let log = history
                .load()?
                .ok_or("preview needs --history or --history-file")?;
            let size = EditPipeline::new(&backend, &store, &config)
                .preview(&id, &log, &out)
                .map_err(|e| output::format_error(e.kind(), &e.to_string()))?;
            output::print_preview_output(&out, size);
        }
        Command::Show { id } => show(&store, &id)?,
        Command::GenConfig => {}
    }

    Ok(())
}

fn show(store: &FsStore, id: &AssetId) -> Result<(), Box<dyn std::error::Error>> {
    let meta = store
        .load_metadata(id)?
        .ok_or_else(|| format!("no asset '{}' under {}", id, store.root().display()))?;
    let registry = store.load_backup_registry(id)?;
    output::print_show_output(id, &meta, &registry);
    Ok(())
}
