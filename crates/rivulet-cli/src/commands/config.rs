//! Engine configuration command.

use clap::Args;
use rivulet_config::EngineConfig;
use std::path::PathBuf;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write the default configuration to this file instead of printing it
    #[arg(long, value_name = "PATH")]
    write: Option<PathBuf>,

    /// Load and validate a configuration file
    #[arg(long, value_name = "PATH", conflicts_with = "write")]
    check: Option<PathBuf>,
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    if let Some(path) = args.check {
        let config = EngineConfig::load(&path)?;
        let ctx = config.to_context()?;
        println!("{} is valid", path.display());
        println!(
            "  {} Hz, {} samples per block, {} control values per block, {} channel(s)",
            ctx.sample_rate(),
            ctx.block_size(),
            ctx.control_block_len(),
            config.channels
        );
        return Ok(());
    }

    let config = EngineConfig::default();
    match args.write {
        Some(path) => {
            config.save(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        None => print!("{}", config.to_toml()?),
    }
    Ok(())
}
