/// phastools: phasiRNA and miRNA target pipelines
///
/// This is the entry point for the phastools CLI.
/// It parses the subcommand and hands every remaining
/// argument to the selected pipeline:
///
/// - ir: inverted-repeat validation of phased loci [phas-ir]
/// - target: miRNA-target scoring and PARE validation [mir-target]
///
/// Both pipelines share the 'config' crate, which holds the
/// universal constants, run modes and error types.
///
/// To get help on the subcommands, you can run:
///
/// ```shell
/// phastools ir -- validate --help
/// ```
///
use clap::{Args, Parser, Subcommand};
use log::{error, info, Level};
use simple_logger::init_with_level;

use phastools::{lib, Tool};

#[derive(Parser)]
#[command(name = "phastools")]
#[command(about = "phastools: phasiRNA IR validation and miRNA target pipelines")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = "ir")]
    Ir(ToolArgs),
    #[command(name = "target")]
    Target(ToolArgs),
}

#[derive(Args)]
struct ToolArgs {
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    let start = std::time::Instant::now();
    init_with_level(Level::Info).unwrap();
    let cli = Cli::parse();

    init();

    let (tool, args) = match cli.command {
        Commands::Ir(args) => (Tool::Ir, args.args),
        Commands::Target(args) => (Tool::Target, args.args),
    };

    lib(tool, args).unwrap_or_else(|e| {
        error!("{:?}", e);
        std::process::exit(1);
    });

    let elapsed = start.elapsed();
    info!("Elapsed time: {:?}", elapsed);
}

fn init() {
    let message = format!(
        r#"

        phastools: phasiRNA IR validation and miRNA target pipelines

        this is the entry point for the phastools CLI
        and it is responsible for dispatching the
        arguments of each pipeline:

        - ir      [validate | chart]
        - target  [score | validate]

        > version: {}

        * to get help on the subcommands, run:
            phastools <SUBCOMMAND> -- --help

        "#,
        env!("CARGO_PKG_VERSION")
    );

    println!("{}", message);
}
