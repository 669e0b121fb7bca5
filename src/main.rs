use anyhow::Result;
use clap::Parser;

use mirage::Opts;
use mirage::cli::SubCommandExtend;
use mirage::config::SubCommand;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Compare(config) => config.run(&opts).await,
        SubCommand::Server(config) => config.run(&opts).await,
        SubCommand::Info(config) => config.run(&opts).await,
    }
}
