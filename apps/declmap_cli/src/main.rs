use clap::Parser;

use declmap_cli::cli::Args;

fn main() {
    // Usage errors exit 2 via clap; parse failures in the input exit 1.
    let args = Args::parse();
    std::process::exit(declmap_cli::run(args));
}
