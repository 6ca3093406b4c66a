//! miRNA target scoring and PARE validation
//!
//! `score` rebuilds every target from the aligner record and scores the
//! interaction under the seedless or the standard policy. `validate`
//! categorises degradome tags per library and keeps the targets with a
//! significant tag at their cleavage site.

pub mod cli;
pub mod core;
pub mod utils;

use log::info;

use crate::cli::{Args, Command};

pub fn lib_mir_target(args: Vec<String>) -> anyhow::Result<()> {
    let args = Args::from(args);
    args.check()?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads())
        .build()?;

    pool.install(|| -> anyhow::Result<()> {
        match args.command {
            Command::Score(args) => {
                let summary = crate::core::score_alignments(args)?;
                info!("Interactions scored: {}", summary.interactions);
                Ok(())
            }
            Command::Validate(args) => {
                let summary = crate::core::validate_cleavage(args)?;
                let validated: usize = summary.libraries.iter().map(|l| l.validated).sum();
                info!("Validated targets over all libraries: {}", validated);
                Ok(())
            }
        }
    })
}
