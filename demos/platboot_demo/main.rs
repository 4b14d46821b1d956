//! Platboot demo: locate and boot an application installation.
//!
//! Run from inside (or below) a CMS install, or point it somewhere with `--cwd`:
//!
//! ```sh
//! cargo run --example platboot_demo -- --level settings
//! cargo run --example platboot_demo -- --cwd /var/www/site/sites/shop --level cms
//! cargo run --example platboot_demo -- --platform 'drupal:///var/www/site?host=shop.example.com'
//! cargo run --example platboot_demo -- --print-template
//! ```
//!
//! | Flag                  | Effect                                              |
//! |-----------------------|-----------------------------------------------------|
//! | `--level LEVEL`       | `none`, `settings`, `platform` (`cms`) or `full`    |
//! | `--cwd DIR`           | start the search from `DIR`                         |
//! | `--settings FILE`     | use this settings file                              |
//! | `--platform SPEC`     | boot the platform named by `SPEC`                   |
//! | `--flavor NAME`       | only consider this flavor                           |
//! | `--hostname HOST`     | pick a multisite tenant by hostname                 |
//! | `--url URL`           | URL of the simulated web request                    |
//! | `-U USER`             | log in as `USER`                                    |
//! | `--config FILE`       | extra `platboot.toml` layer                         |
//! | `--base-url URL`      | override `base_url` from config                     |
//! | `-v` / `-vv`          | debug / trace logging on stderr                     |
//!
//! The report is printed to stdout as JSON. `RUST_LOG` overrides `-v`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use platboot::{BootArgs, BootOrchestrator, ConfigLoader, EnvSnapshot, SystemHost, config};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(name = "platboot-demo", about = "Locate and boot an application installation")]
struct Cli {
    #[command(flatten)]
    boot: BootArgs,

    /// Additional config file, layered over the platform one.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override `base_url` from config.
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Print a commented `platboot.toml` template and exit.
    #[arg(long)]
    print_template: bool,

    /// Increase log verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.print_template {
        print!("{}", config::template());
        return Ok(());
    }

    let env = EnvSnapshot::from_process();
    let mut loader = ConfigLoader::new().set("base_url", cli.base_url);
    if let Some(path) = cli.config {
        loader = loader.file(path);
    }
    let config = loader.load(&env)?;
    tracing::debug!(?config, "configuration loaded");

    let mut orchestrator = BootOrchestrator::builder()
        .config(config)
        .host(SystemHost)
        .build()?;
    let report = orchestrator.run(&cli.boot.into_request())?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
