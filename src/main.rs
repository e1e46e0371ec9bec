// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process;

use clap::Parser;

use posture_inference::cli::analyze::run_analysis;
use posture_inference::cli::args::{Cli, Commands};
use posture_inference::{error, logging};

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Analyze(args) => {
            logging::set_verbose(args.verbose);
            if let Err(e) = run_analysis(args) {
                error!("{e}");
                process::exit(1);
            }
        }
    }
}
