use clap::Parser;
use northbase::Cli;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = northbase::run(cli).await {
        tracing::debug!(error = ?e, "Command failed");
        eprintln!("northbase: {e:#}");
        std::process::exit(1);
    }
}
