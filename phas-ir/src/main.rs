use clap::{self, Parser};
use log::{error, info, Level};
use simple_logger::init_with_level;

use phas_ir::{
    cli::{Args, Command},
    core::{run_chart, run_validate},
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
        Command::Validate(args) => {
            let summary = run_validate(args).unwrap_or_else(|e| {
                error!("{:?}", e);
                std::process::exit(1);
            });
            info!(
                "IR: {} | Fo: {} | No: {}",
                summary.ir, summary.foldback, summary.not_ir
            );
        }
        Command::Chart(args) => {
            run_chart(args).unwrap_or_else(|e| {
                error!("{:?}", e);
                std::process::exit(1);
            });
        }
    }

    let elapsed = start.elapsed();
    info!("Elapsed time: {:?}", elapsed);
}
