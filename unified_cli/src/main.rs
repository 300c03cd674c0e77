use clap::Parser;
use unified_cli::cli::Cli;
use unified_core::config::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // JSON logs on stderr; UNIFIED_LOG_FORMAT=pretty for local runs.
    unified_core::o11y::init_global_from_env()?;
    let cli = Cli::parse();
    let config = EngineConfig::from_env()?;

    let output = unified_cli::commands::run(cli.command, &config).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
