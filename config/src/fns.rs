use anyhow::Context;
use flate2::read::MultiGzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;

use std::fmt::Debug;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mods::{CliError, PipelineError, Task};

// os
#[cfg(not(windows))]
const TICK_SETTINGS: (&str, u64) = ("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ", 80);
#[cfg(windows)]
const TICK_SETTINGS: (&str, u64) = (r"+-x| ", 200);

/// return a pre-configured progress bar
pub fn get_progress_bar(length: u64, msg: &str) -> ProgressBar {
    let progressbar_style = ProgressStyle::default_spinner()
        .tick_chars(TICK_SETTINGS.0)
        .template(" {spinner} {msg:<30} {wide_bar} ETA {eta_precise} ")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());

    let progress_bar = ProgressBar::new(length);

    progress_bar.set_style(progressbar_style);
    progress_bar.enable_steady_tick(Duration::from_millis(TICK_SETTINGS.1));
    progress_bar.set_message(msg.to_owned());

    progress_bar
}

/// read a whole file into memory, decompressing .gz inputs
pub fn reader<P: AsRef<Path> + Debug>(file: P) -> anyhow::Result<String> {
    let path = file.as_ref();
    let handle = File::open(path).with_context(|| format!("cannot open {:?}", path))?;

    let mut contents = String::new();
    if path.extension().map_or(false, |ext| ext == "gz") {
        MultiGzDecoder::new(handle)
            .read_to_string(&mut contents)
            .with_context(|| format!("cannot decompress {:?}", path))?;
    } else {
        let mut handle = handle;
        handle
            .read_to_string(&mut contents)
            .with_context(|| format!("cannot read {:?}", path))?;
    }

    Ok(contents)
}

/// read many files in parallel and concatenate them in input order
pub fn par_reader<P: AsRef<Path> + Debug + Sync + Send>(files: &[P]) -> anyhow::Result<String> {
    let contents = files
        .par_iter()
        .map(reader)
        .collect::<anyhow::Result<Vec<String>>>()?;

    Ok(contents.concat())
}

/// write any collection of lines to a file
pub fn write_collection<P: AsRef<Path> + Debug>(data: &[String], fname: P) -> anyhow::Result<()> {
    log::info!("Lines in {:?}: {}. Writing...", fname, data.len());
    let f = File::create(fname.as_ref())
        .with_context(|| format!("cannot create {:?}", fname.as_ref()))?;
    let mut writer = BufWriter::new(f);

    for line in data.iter() {
        writeln!(writer, "{}", line)?;
    }

    writer.flush()?;
    Ok(())
}

/// write a serializable summary as pretty JSON
pub fn write_summary<T: Serialize, P: AsRef<Path> + Debug>(summary: &T, fname: P) -> anyhow::Result<()> {
    let f = File::create(fname.as_ref())
        .with_context(|| format!("cannot create {:?}", fname.as_ref()))?;
    let mut writer = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writeln!(writer)?;
    writer.flush()?;

    log::info!("Summary written to {:?}", fname);
    Ok(())
}

/// run independent tasks on the current rayon pool
///
/// Every task reads its own input and writes its own output; the first
/// failing task aborts the whole dispatch.
pub fn run_tasks<F>(tasks: &[Task], msg: &str, job: F) -> anyhow::Result<()>
where
    F: Fn(&Task) -> anyhow::Result<()> + Sync + Send,
{
    let pb = get_progress_bar(tasks.len() as u64, msg);

    tasks.par_iter().try_for_each(|task| -> anyhow::Result<()> {
        job(task).with_context(|| format!("task on {:?} failed", task.input))?;
        pb.inc(1);
        Ok(())
    })?;

    pb.finish_and_clear();
    Ok(())
}

/// split a line into tab-separated fields, tolerating CRLF endings
pub fn split_tabs(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\r', '\n']).split('\t').collect()
}

/// fetch a field by index or fail with a parse error carrying the location
pub fn field<'a>(
    fields: &[&'a str],
    idx: usize,
    file: &str,
    line: usize,
) -> Result<&'a str, PipelineError> {
    fields.get(idx).copied().ok_or_else(|| {
        PipelineError::parse(file, line, format!("missing column {idx} ({} found)", fields.len()))
    })
}

/// parse a field into any FromStr type with location-aware errors
pub fn parse_field<T: std::str::FromStr>(
    fields: &[&str],
    idx: usize,
    file: &str,
    line: usize,
) -> Result<T, PipelineError> {
    let raw = field(fields, idx, file, line)?;
    raw.trim().parse::<T>().map_err(|_| {
        PipelineError::parse(file, line, format!("cannot parse column {idx} value '{raw}'"))
    })
}

/// argument checker for all subcommands
pub trait ArgCheck {
    fn check(&self) -> Result<(), CliError> {
        self.validate_args()
    }

    fn validate_args(&self) -> Result<(), CliError> {
        let inputs = self.get_inputs();
        if inputs.is_empty() {
            let err = "No input files provided".to_string();
            return Err(CliError::InvalidInput(err));
        }

        for input in inputs {
            validate(input)?;
        }

        for optional in self.get_optional() {
            if optional.as_os_str().is_empty() {
                continue;
            }
            validate(optional)?;
        }

        Ok(())
    }

    fn get_inputs(&self) -> Vec<&PathBuf>;

    fn get_optional(&self) -> Vec<&PathBuf> {
        Vec::new()
    }
}

/// argument validation
pub fn validate(arg: &PathBuf) -> Result<(), CliError> {
    if !arg.exists() {
        return Err(CliError::InvalidInput(format!("{:?} does not exist", arg)));
    }

    if !arg.is_file() {
        return Err(CliError::InvalidInput(format!("{:?} is not a file", arg)));
    }

    match std::fs::metadata(arg) {
        Ok(metadata) if metadata.len() == 0 => {
            Err(CliError::InvalidInput(format!("file {:?} is empty", arg)))
        }
        Ok(_) => Ok(()),
        Err(e) => Err(CliError::IoError(e)),
    }
}

/// file stem without any .gz and last extension
pub fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name).to_string();

    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    }
}
