use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vault_mirror::config::{self, SyncConfig};
use vault_mirror::sync::{self, SyncEvent, SyncOptions, SyncReport};
use vault_mirror::{output, scan};

#[derive(Parser)]
#[command(name = "vault-mirror")]
#[command(about = "Mirror an Obsidian vault into a Docusaurus site")]
#[command(long_about = "\
Mirror an Obsidian vault into a Docusaurus site

Top-level vault folders are mirrored by name. Each run converts only what
changed since the last one, deletes what disappeared, and regenerates the
image variants the converted documents reference.

Vault structure:

  vault/
  ├── docs/                        # Docs plugin → website/docs/
  │   ├── 01-intro.md              # → docs/01-intro.md
  │   ├── 01-intro__de.md          # German → i18n/de/docusaurus-plugin-content-docs/current/
  │   ├── 02-guides+/              # Group folder: collapses into one page
  │   │   └── setup.md             # → docs/guides.md
  │   └── meta.yml.md              # Companion: copied as meta.yml
  ├── blog/                        # Blog plugin → website/blog/
  │   └── 2024-05-01-launch.md     # linked as /blog/2024/05/01/launch
  ├── news__blog/                  # Additional blog instance → website/news/
  └── assets/                      # Embedded images and downloads

Markdown rewriting:
  ![[photo.png|300]]   → ![](/assets/photo_w300.webp), resized on sync
  ![[chart.svg]]       → dark and light theme pair
  [x](../docs/a.md)    → [x](/docs/a)
  > [!warning] Title   → :::warning Title ... :::

State lives under <site>/.vault-mirror/. Run 'vault-mirror gen-config' to
generate a documented vault-mirror.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file means defaults)
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Vault directory (overrides the config file)
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// Docusaurus site directory (overrides the config file)
    #[arg(long, global = true)]
    site: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mirror the vault into the site, converting only what changed
    Sync {
        /// Keep untracked files in mirrored site folders
        #[arg(long)]
        no_sweep: bool,
    },
    /// Show the vault inventory and what the next sync would do
    Check,
    /// Delete every tracked target and forget all sync state
    Reset,
    /// Print a stock vault-mirror.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = load(&cli)?;
    init_logging(config.debug);

    match cli.command {
        Command::Sync { no_sweep } => {
            init_thread_pool(&config.processing);
            let options = SyncOptions {
                orphan_sweep: no_sweep.then_some(false),
            };
            println!(
                "==> Syncing {} → {}",
                config.vault_path.display(),
                config.site_path.display()
            );
            let report = with_printer(|tx| sync::sync(&config, &options, Some(tx)))?;
            output::print_report(&report);
        }
        Command::Check => {
            println!("==> Checking {}", config.vault_path.display());
            let scanned = scan::scan(&config)?;
            let plan = sync::plan(&config)?;
            output::print_check(&scanned, &plan);
        }
        Command::Reset => {
            println!("==> Resetting {}", config.site_path.display());
            let report = with_printer(|tx| sync::reset(&config, Some(tx)))?;
            output::print_report(&report);
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Config file values, then command-line overrides, validated once more.
fn load(cli: &Cli) -> Result<SyncConfig, config::ConfigError> {
    let mut config = config::load_config(&cli.config)?;
    if let Some(vault) = &cli.vault {
        config.vault_path = vault.clone();
    }
    if let Some(site) = &cli.site {
        config.site_path = site.clone();
    }
    config.debug |= cli.debug;
    config.validate()?;
    Ok(config)
}

/// `RUST_LOG` wins when set; otherwise `debug` picks the level.
fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug {
            "vault_mirror=debug"
        } else {
            "vault_mirror=info"
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

/// Run `f` with a progress channel drained by a printer thread.
fn with_printer<F>(f: F) -> Result<SyncReport, sync::SyncError>
where
    F: FnOnce(std::sync::mpsc::Sender<SyncEvent>) -> Result<SyncReport, sync::SyncError>,
{
    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_sync_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = f(tx);
    printer.join().ok();
    result
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
