use clap::{self, Parser};
use log::{error, info, Level};
use simple_logger::init_with_level;

use mir_target::{
    cli::{Args, Command},
    core::{score_alignments, validate_cleavage},
};

fn main() {
    let start = std::time::Instant::now();
    init_with_level(Level::Info).unwrap();

    let args: Args = Args::parse();
    args.check().unwrap_or_else(|e| {
        error!("{}", e);
        std::process::exit(1);
    });

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads())
        .build_global()
        .unwrap();

    match args.command {
        Command::Score(args) => {
            score_alignments(args).unwrap_or_else(|e| {
                error!("{:?}", e);
                std::process::exit(1);
            });
        }
        Command::Validate(args) => {
            validate_cleavage(args).unwrap_or_else(|e| {
                error!("{:?}", e);
                std::process::exit(1);
            });
        }
    }

    let elapsed = start.elapsed();
    info!("Elapsed time: {:?}", elapsed);
}
