use crate::app::{run_app, Cli};
use clap::Parser;

mod app;
pub mod config;
mod management;
mod storage;

fn init_logger() {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger();
    run_app(cli).await
}
