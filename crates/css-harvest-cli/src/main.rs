use anyhow::Result;
use clap::Parser;
use css_harvest_cli::{harvest_cmd, init_tracing, output, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let report = harvest_cmd::run(&cli).await?;
    output::print_report(&report, cli.json)
}
