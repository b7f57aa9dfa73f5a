use clap::Parser;
use pricechart::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
