use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = vpnsmith::cli::Cli::parse();
    cli.run()
}
