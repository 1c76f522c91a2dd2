use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use inistore::Ini;
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a file and print it back in normalized form
    Print {
        /// INI file to read
        path: PathBuf,
    },
    /// Print a single value
    Get {
        /// INI file to read
        path: PathBuf,
        key: String,
        /// Section to look in (default section if omitted)
        #[arg(short, long)]
        section: Option<String>,
        /// Printed when the key is missing or has no value
        #[arg(short, long, default_value = "")]
        default: String,
    },
    /// Set a value and write the file back
    Set {
        /// INI file to update; created if it does not exist
        path: PathBuf,
        key: String,
        value: String,
        /// Section to write into (default section if omitted)
        #[arg(short, long)]
        section: Option<String>,
        /// Write the result here instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load(path: &Path) -> Result<Ini> {
    Ini::from_path(path).wrap_err_with(|| format!("Failed to read {}", path.display()))
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .without_time()
        .init();

    match cli.command {
        Command::Print { path } => {
            let ini = load(&path)?;
            let stdout = io::stdout();
            ini.store_to_writer(stdout.lock())?;
        }
        Command::Get {
            path,
            key,
            section,
            default,
        } => {
            let ini = load(&path)?;
            let value = ini.get(section.as_deref(), &key, &default);
            debug!(section = ?section, key = %key, "Looked up value");
            writeln!(io::stdout(), "{value}")?;
        }
        Command::Set {
            path,
            key,
            value,
            section,
            output,
        } => {
            let mut ini = if path.exists() {
                load(&path)?
            } else {
                info!("{} does not exist, starting from an empty file", path.display());
                Ini::new()
            };

            ini.set(section.as_deref(), &key, Some(value.as_str()))?;

            let target = output.unwrap_or(path);
            ini.store_to_path(&target)
                .wrap_err_with(|| format!("Failed to write {}", target.display()))?;
            info!("Wrote {}", target.display());
        }
    }

    Ok(())
}
