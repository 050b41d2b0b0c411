use std::process;

use clap::Parser;

use shadowtunnel::cli::{self, Args};

fn main() {
    let args = Args::parse();
    if cli::run(args).is_err() {
        process::exit(1);
    }
}
