use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rsre::{HostConfig, ScriptHost};
use tracing::{debug, info};

mod logging;
mod repl;

#[derive(Parser)]
#[command(version, about = "Run Rhai scripts with timers, files and processes", long_about = None)]
pub struct Cli {
    /// Scripts to run, in order
    files: Vec<PathBuf>,

    /// Directory relative script paths are resolved against
    #[arg(short, long)]
    asset_root: Option<PathBuf>,

    /// Source to evaluate after the files; may be repeated
    #[arg(short, long = "eval", value_name = "CODE")]
    eval: Vec<String>,

    /// Start a REPL after running files and --eval sources
    #[arg(short, long)]
    interactive: bool,

    /// Exit without waiting for pending timers
    #[arg(long)]
    no_drain: bool,

    /// Skip the startup script
    #[arg(long)]
    no_rc: bool,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enables debug mode
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// Also write logs to a file in the data directory
    #[arg(long)]
    log_file: bool,

    /// Arguments exposed to scripts as `process::argv`
    #[arg(last = true)]
    args: Vec<String>,
}

impl Cli {
    fn host_config(&self) -> anyhow::Result<HostConfig> {
        let mut config = match &self.config {
            Some(path) => HostConfig::load_from(path)?,
            None => HostConfig::load()?,
        };

        if let Some(root) = &self.asset_root {
            config.asset_root = root.clone();
        }
        if self.no_rc {
            config.load_startup_script = false;
        }

        let program = std::env::args().next().unwrap_or_else(|| "rsre".to_string());
        config.argv = Some(
            std::iter::once(program)
                .chain(self.args.iter().cloned())
                .collect(),
        );

        Ok(config)
    }

    fn wants_repl(&self) -> bool {
        self.interactive || (self.files.is_empty() && self.eval.is_empty())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init_logging(cli.debug, cli.log_file)?;

    let config = cli.host_config()?;
    debug!("Asset root: {}", config.asset_root.display());
    let host = ScriptHost::with_config(config)?;

    for file in &cli.files {
        host.exec(file)
            .with_context(|| format!("Failed to run {}", file.display()))?;
    }

    for source in &cli.eval {
        let value = host.run(source.as_str())?;
        if !value.is_unit() {
            println!("{}", host.pretty_print(&value));
        }
    }

    if cli.wants_repl() {
        repl::run(&host)?;
    }

    if cli.no_drain {
        host.stop(false);
    } else {
        info!("Waiting for pending timers");
        host.stop(true);
    }

    Ok(())
}
