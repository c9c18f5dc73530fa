use clap::Parser;
use shoplist::cli::Cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    shoplist::cli::run(Cli::parse()).await
}
