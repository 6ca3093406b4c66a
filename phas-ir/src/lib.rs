//! Inverted-repeat validation of phased siRNA loci
//!
//! Candidate transcript pairs are inferred from reverse-complement hits,
//! folded with einverted and called IR, Fo or No from the phase
//! positions of both arms. Transcripts left without a pair are
//! summarised through their isoforms and chart inputs are written per
//! small-RNA library.

pub mod cli;
pub mod core;
pub mod record;
pub mod utils;

use log::info;

use crate::cli::{Args, Command};

pub fn lib_phas_ir(args: Vec<String>) -> anyhow::Result<()> {
    let args = Args::from(args);
    args.check()?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads())
        .build()?;

    pool.install(|| -> anyhow::Result<()> {
        match args.command {
            Command::Validate(args) => {
                let summary = crate::core::run_validate(args)?;
                info!(
                    "IR: {} | Fo: {} | No: {} | unassigned: {}",
                    summary.ir, summary.foldback, summary.not_ir, summary.unassigned
                );
                Ok(())
            }
            Command::Chart(args) => {
                let charts = crate::core::run_chart(args)?;
                info!("Chart inputs written: {}", charts.len());
                Ok(())
            }
        }
    })
}
