use clap::Parser;
use goalprob::api::{Cli, run_cli};
use goalprob::logging::init_tracing;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(&cli.log_filter) {
        eprintln!("Logging setup failed: {e}");
    }

    if let Err(e) = run_cli(cli).await {
        tracing::error!(error = %e, "command failed");
        eprintln!("{e}");
        std::process::exit(1);
    }
}
