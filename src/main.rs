use clap::Parser;
use point_obs_nc::cli::{self, Args};
use std::process;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    match cli::run(args) {
        Ok(()) => process::exit(0),
        Err(error) => {
            // Error occurred - print to stderr and exit with error code
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}
