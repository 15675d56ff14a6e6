use clap::Parser;
use conveyor_driver_log::app;
use conveyor_driver_log::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run(Config::parse()).await
}
