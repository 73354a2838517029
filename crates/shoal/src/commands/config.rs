//! Config command - shows the resolved configuration.

use anyhow::Result;
use clap::Args;
use console::Style;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// List the files the configuration was read from
    #[arg(long)]
    pub sources: bool,
}

/// Run the config command.
pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&ctx.config)?);
        return Ok(());
    }

    if args.sources || ctx.verbose {
        let dim = Style::new().dim();
        if ctx.loaded_from.is_empty() {
            println!("{}", dim.apply_to("# no config files found, using defaults"));
        }
        for path in &ctx.loaded_from {
            println!("{}", dim.apply_to(format!("# loaded from {}", path.display())));
        }
    }

    print!("{}", ctx.config.to_toml()?);
    Ok(())
}
