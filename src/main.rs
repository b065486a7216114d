use anyhow::Result;
use clap::Parser;
use dialoguer::Confirm;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use slug_migrate::config::{self, MigrationConfig, Settings};
use slug_migrate::fsops::HostFs;
use slug_migrate::validity::Validity;
use slug_migrate::{discover, migrate};

/// Rename legacy escaped home directories to safe slugs.
///
/// Without --force nothing is changed; every decision is still printed.
#[derive(Parser, Debug)]
#[command(name = "slug-migrate", version)]
struct Cli {
    /// Directory holding the `*<suffix>` storage roots [default: /export]
    #[arg(long = "base_dir")]
    base_dir: Option<PathBuf>,

    /// Name suffix of the storage roots under base_dir [default: -filestore]
    #[arg(long)]
    suffix: Option<String>,

    /// Actually rename directories
    #[arg(long)]
    force: bool,

    /// Entry names under prod directories to leave alone [default: _shared]
    #[arg(long = "exclude_dir_lists", num_args = 1..)]
    exclude_dir_lists: Option<Vec<String>>,

    /// Process these prod directories instead of discovering them
    #[arg(long = "prod_dir", num_args = 1..)]
    prod_dirs: Option<Vec<PathBuf>>,

    /// Maximum slug length, 12 to 63 [default: 32]
    #[arg(long = "max_length")]
    max_length: Option<usize>,

    /// Which names count as already safe [default: object]
    #[arg(long, value_enum)]
    validity: Option<Validity>,

    /// JSON file with the same settings; flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Do not ask before applying changes with --force
    #[arg(long)]
    yes: bool,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            base_dir: self.base_dir.clone(),
            suffix: self.suffix.clone(),
            exclude_dir_lists: self.exclude_dir_lists.clone(),
            prod_dirs: self.prod_dirs.clone(),
            max_length: self.max_length,
            validity: self.validity,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    run(cli).map_err(|e| {
        eprintln!("Error: {:#}", e);
        e
    })
}

fn run(cli: Cli) -> Result<()> {
    let mut layers = vec![cli.settings()];
    if let Some(path) = &cli.config {
        layers.push(config::load_settings(path)?);
    }
    let mut config = MigrationConfig::resolve(&layers, cli.force)?;

    let prod_dirs = if config.prod_dirs.is_empty() {
        let roots = discover::suffix_roots(&config.base_dir, &config.suffix);
        discover::prod_roots(&roots)
    } else {
        config.prod_dirs.clone()
    };
    if prod_dirs.is_empty() {
        println!("No 'prod' directories found.");
        return Ok(());
    }
    println!("Found 'prod' directories:");
    for path in &prod_dirs {
        println!("{}", path.display());
    }

    if config.force && !cli.yes && io::stdin().is_terminal() {
        let go = Confirm::new()
            .with_prompt(format!("Rename directories under {} prod directories?", prod_dirs.len()))
            .default(false)
            .interact()?;
        if !go {
            println!("Continuing as a dry run.");
            config.force = false;
        }
    }

    let summary = migrate::run(&config, &prod_dirs, &HostFs, |report| print!("{}", report));
    println!("{}", summary);
    Ok(())
}
