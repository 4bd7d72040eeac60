use clap::{CommandFactory, Parser, Subcommand};
use gallery_import::config::{self, DEFAULT_CONFIG_FILE};
use gallery_import::output;
use gallery_import::pipeline::{self, ImportError, ImportOptions};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "gallery-import")]
#[command(about = "Import photos and videos into site galleries")]
#[command(long_about = "\
Import photos and videos into site galleries

Every directory under SOURCE that directly holds media becomes a gallery.
Images get a full-size re-encode and a vignette; videos are copied. Each
gallery gets an index.md manifest with capture metadata and place names
resolved from GPS tags.

Output layout:

  assets/
  └── 2024/Japan/
      ├── 20240315123045_Tokyo_vignette.jpg
      └── _fullsize/
          └── 20240315123045_Tokyo.jpg
  src/content/galleries/
  └── 2024/Japan/
      └── index.md

Both output roots are cleared at the start of every run. Resolved places are
kept in the location cache between runs.

Run 'gallery-import gen-config' to generate a documented import.toml.")]
#[command(version)]
struct Cli {
    /// Source media directory
    #[arg(env = "MEDIA_DIR")]
    source: Option<PathBuf>,

    /// Output directory for derivatives
    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    /// Output directory for gallery manifests
    #[arg(long, default_value = "src/content/galleries")]
    content: PathBuf,

    /// Persistent reverse-geocoding cache
    #[arg(long, default_value = "cached-locations.json")]
    cache_file: PathBuf,

    /// Import configuration (optional; defaults apply when missing)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print a stock import.toml with all options documented
    GenConfig,
}

fn run(cli: Cli, source: PathBuf) -> Result<(), ImportError> {
    let options = ImportOptions {
        source,
        assets_dir: cli.assets,
        content_dir: cli.content,
        cache_file: cli.cache_file,
        config: config::load_config(&cli.config)?,
    };

    let summary = pipeline::run_import(&options)?;
    output::print_summary(&summary);
    output::print_content_tree(&options.content_dir);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let mut cli = Cli::parse();

    if let Some(Command::GenConfig) = cli.command {
        print!("{}", config::stock_config_toml());
        return ExitCode::SUCCESS;
    }

    let Some(source) = cli.source.take() else {
        Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "no source directory: pass SOURCE or set MEDIA_DIR",
            )
            .exit()
    };

    match run(cli, source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Error during media import: {e}");
            ExitCode::FAILURE
        }
    }
}
