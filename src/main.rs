use clap::Parser;
use env_logger::Env;
use invoice_roi::cli::{Cli, run};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}
