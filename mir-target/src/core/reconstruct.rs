//! Target reconstruction from a miRNA alignment record
//!
//! The aligner reports the reverse-complemented miRNA as the read, a
//! CIGAR-like gap string and an MD-like mismatch string. The target is
//! rebuilt from the read by marking insertions first and then writing the
//! reference bases at the mismatch offsets.

use config::{field, parse_field, split_tabs, PipelineError, GAP_SYMBOL};

/// One bowtie2 record of a miRNA aligned against a target fragment
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    pub mirna: String,
    pub target: String,
    pub position: u64,
    pub cigar: String,
    pub read: String,
    pub mismatch: String,
}

impl AlignmentRecord {
    pub fn parse(line: &str, file: &str, lineno: usize) -> Result<Self, PipelineError> {
        let fields = split_tabs(line);
        if fields.len() < 11 {
            return Err(PipelineError::parse(
                file,
                lineno,
                format!("expected at least 11 columns, found {}", fields.len()),
            ));
        }

        let md = fields[fields.len() - 2];
        let mismatch = md.rsplit(':').next().unwrap_or_default();

        Ok(Self {
            mirna: field(&fields, 0, file, lineno)?.to_string(),
            target: field(&fields, 2, file, lineno)?.to_string(),
            position: parse_field(&fields, 3, file, lineno)?,
            cigar: field(&fields, 5, file, lineno)?.to_string(),
            read: field(&fields, 9, file, lineno)?.to_string(),
            mismatch: mismatch.to_string(),
        })
    }

    /// `pos-(pos+len-1)` on the target
    pub fn bind_site(&self) -> String {
        let len = self.read.len() as u64;
        format!(
            "{}-{}",
            self.position,
            (self.position + len).saturating_sub(1)
        )
    }
}

/// `<run><op>` pairs of a descriptor string
///
/// A trailing run without an operation is dropped and characters that
/// are neither digits nor operations are skipped.
pub fn descriptor_ops(desc: &str, is_op: fn(u8) -> bool) -> Vec<(usize, u8)> {
    let mut ops = Vec::new();
    let mut run = 0usize;

    for &c in desc.as_bytes() {
        if c.is_ascii_digit() {
            run = run.saturating_mul(10).saturating_add((c - b'0') as usize);
        } else if is_op(c) {
            ops.push((run, c));
            run = 0;
        }
    }

    ops
}

fn is_cigar_op(c: u8) -> bool {
    c.is_ascii_uppercase()
}

fn is_md_base(c: u8) -> bool {
    matches!(c, b'A' | b'T' | b'G' | b'C' | b'N')
}

/// Rebuilds the target (RNA alphabet) under a read
///
/// # Arguments
///
/// * `read` - aligned read, the reverse complement of the miRNA
/// * `cigar` - gap string; `I` runs mark the target with a gap symbol
/// * `mismatch` - mismatch string; 1-based reference offsets and bases
///
/// # Returns
///
/// * `String` - target sequence with `T` written as `U`
///
/// # Example
///
/// ```rust, ignore
/// let target = reconstruct_target("ACGTACGT", "8M", "3A4");
/// assert_eq!(target, "ACGAACGU");
/// ```
pub fn reconstruct_target(read: &str, cigar: &str, mismatch: &str) -> String {
    let mut target = read.as_bytes().to_vec();

    let mut offset = 0usize;
    for (run, op) in descriptor_ops(cigar, is_cigar_op) {
        if op == b'I' {
            if let Some(base) = target.get_mut(offset) {
                *base = GAP_SYMBOL;
            }
        }
        offset = offset.saturating_add(run);
    }

    let mut offset = 0usize;
    for (run, base) in descriptor_ops(mismatch, is_md_base) {
        offset = offset.saturating_add(run).saturating_add(1);

        let upto = (offset - 1).min(target.len());
        let gaps = target[..upto].iter().filter(|&&b| b == GAP_SYMBOL).count();
        if let Some(slot) = target.get_mut((offset - 1).saturating_add(gaps)) {
            *slot = base;
        }
    }

    String::from_utf8_lossy(&target).replace('T', "U")
}

/// miRNA written 3' to 5' in RNA, the complement of the aligned read
pub fn mirna_sequence(read: &str) -> String {
    read.chars()
        .map(|c| match c {
            'T' => 'A',
            'A' => 'U',
            'C' => 'G',
            'G' => 'C',
            other => other,
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn sam_line(read: &str, cigar: &str, md: &str) -> String {
    format!(
        "miR1\t16\tAT1G01\t101\t255\t{cigar}\t*\t0\t0\t{read}\t{}\tAS:i:0\tMD:Z:{md}\tYT:Z:UU",
        "I".repeat(read.len())
    )
}
