use log::info;

use mir_target::lib_mir_target;
use phas_ir::lib_phas_ir;

/// Pipelines reachable from the umbrella binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ir,
    Target,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Ir => "phas-ir",
            Tool::Target => "mir-target",
        }
    }
}

/// Runs a pipeline in-process with its own arguments
///
/// # Arguments
///
/// * `tool` - pipeline to run
/// * `args` - arguments after the subcommand, parsed by the pipeline itself
///
/// # Example
///
/// ```rust, ignore
/// use phastools::{lib, Tool};
///
/// let args = vec!["score".to_string(), "--alignments".to_string(), "frag_1.targ".to_string()];
/// lib(Tool::Target, args).unwrap();
/// ```
pub fn lib(tool: Tool, args: Vec<String>) -> anyhow::Result<()> {
    info!("Running {} with {} arguments", tool.name(), args.len());

    match tool {
        Tool::Ir => lib_phas_ir(args),
        Tool::Target => lib_mir_target(args),
    }
}
