//! Records flowing through the IR validation pipeline
//!
//! Every entity is created by a single read pass over an external tool's
//! output, transformed once and written out again; none of them is mutated
//! after parsing.

use std::fmt;
use std::str::FromStr;

use hashbrown::HashMap;

use config::{field, parse_field, split_tabs, PipelineError, Strand};

/// A phased transcript loaded from the FASTA collection
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub name: String,
    pub seq: String,
}

impl Transcript {
    pub fn new(name: &str, seq: &str) -> Self {
        Self {
            name: name.to_string(),
            seq: seq.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// Transcripts in file order with lookup by name
#[derive(Debug, Default, Clone)]
pub struct TranscriptSet {
    records: Vec<Transcript>,
    index: HashMap<String, usize>,
}

impl TranscriptSet {
    pub fn new(records: Vec<Transcript>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            // last definition wins, as a dictionary built from the file would
            index.insert(record.name.clone(), i);
        }

        Self { records, index }
    }

    pub fn get(&self, name: &str) -> Option<&Transcript> {
        self.index.get(name).map(|&i| &self.records[i])
    }

    pub fn length_of(&self, name: &str) -> Option<u64> {
        self.get(name).map(|t| t.len() as u64)
    }

    pub fn lengths(&self) -> HashMap<String, u64> {
        self.records
            .iter()
            .map(|t| (t.name.clone(), t.len() as u64))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transcript> {
        self.records.iter()
    }
}

/// One BLAST-like tabular hit between two phased transcripts
///
/// Columns used: query(0), subject(1), identity(2), alignment length(3),
/// query length(4), bit score(14) and the hang/offset fields (15, 16).
/// The raw fields are kept so the hit can be echoed verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentHit {
    pub query: String,
    pub subject: String,
    pub identity: f64,
    pub length: u64,
    pub query_length: u64,
    pub bitscore: f64,
    pub hang5: String,
    pub hang3: String,
    pub fields: Vec<String>,
}

impl AlignmentHit {
    pub fn parse(line: &str, file: &str, lineno: usize) -> Result<Self, PipelineError> {
        let fields = split_tabs(line);

        Ok(Self {
            query: field(&fields, 0, file, lineno)?.trim().to_string(),
            subject: field(&fields, 1, file, lineno)?.trim().to_string(),
            identity: parse_field(&fields, 2, file, lineno)?,
            length: parse_field::<f64>(&fields, 3, file, lineno)? as u64,
            query_length: parse_field::<f64>(&fields, 4, file, lineno)? as u64,
            bitscore: parse_field(&fields, 14, file, lineno)?,
            hang5: fields.get(15).unwrap_or(&"").to_string(),
            hang3: fields.get(16).unwrap_or(&"").to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        })
    }

    pub fn is_self(&self) -> bool {
        self.query == self.subject
    }

    pub fn involves(&self, name: &str) -> bool {
        self.query == name || self.subject == name
    }

    /// fraction of the query covered by the alignment, rounded to 2 decimals
    pub fn map_ratio(&self) -> f64 {
        if self.query_length == 0 {
            return 0.0;
        }
        let ratio = self.length as f64 / self.query_length as f64;
        (ratio * 100.0).round() / 100.0
    }

    pub fn line(&self) -> String {
        self.fields.join("\t")
    }
}

/// An accepted, exclusive pairing of two transcripts (or one self-paired
/// transcript) as the arms of a candidate hairpin
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePair {
    pub transcript5: String,
    pub transcript3: String,
    pub identity: f64,
    pub bitscore: f64,
    pub hang5: String,
    pub hang3: String,
    pub matches: u64,
    pub kind: &'static str,
    pub hit: AlignmentHit,
}

impl CandidatePair {
    pub fn from_hit(hit: &AlignmentHit, kind: &'static str) -> Self {
        Self {
            transcript5: hit.query.clone(),
            transcript3: hit.subject.clone(),
            identity: hit.identity,
            bitscore: hit.bitscore,
            hang5: hit.hang5.clone(),
            hang3: hit.hang3.clone(),
            matches: (hit.length as f64 * hit.identity / 100.0).round() as u64,
            kind,
            hit: hit.clone(),
        }
    }

    /// a self pair is a single-transcript hairpin
    pub fn is_self_pair(&self) -> bool {
        self.transcript5 == self.transcript3
    }

    pub fn name(&self) -> String {
        if self.is_self_pair() {
            self.transcript5.clone()
        } else {
            format!("{}-{}", self.transcript5, self.transcript3)
        }
    }
}

/// A phased locus reported by the phasing predictor
#[derive(Debug, Clone, PartialEq)]
pub struct PhasedLocus {
    pub name: String,
    pub pvalue: String,
    pub transcript: String,
    pub start: String,
    pub end: String,
    pub strand: String,
    pub library: String,
}

impl PhasedLocus {
    pub fn parse(line: &str, file: &str, lineno: usize) -> Result<Self, PipelineError> {
        let fields = split_tabs(line);
        if fields.len() < 7 {
            return Err(PipelineError::parse(
                file,
                lineno,
                format!("expected 7 columns, found {}", fields.len()),
            ));
        }

        Ok(Self {
            name: fields[0].to_string(),
            pvalue: fields[1].to_string(),
            transcript: fields[2].trim().to_string(),
            start: fields[3].to_string(),
            end: fields[4].to_string(),
            strand: fields[5].to_string(),
            library: fields[6].to_string(),
        })
    }

    pub fn end_position(&self) -> Result<i64, PipelineError> {
        self.end.trim().parse::<i64>().map_err(|_| {
            PipelineError::DataConsistency(format!(
                "locus {} has a non-numeric end '{}'",
                self.name, self.end
            ))
        })
    }
}

/// One read of a phase cluster
#[derive(Debug, Clone, PartialEq)]
pub struct PhasedRead {
    pub name: String,
    pub strand: Strand,
    pub abundance: u64,
    pub seq: String,
    pub length: usize,
    pub hits: u64,
    pub position: i64,
}

impl PhasedRead {
    /// parse a tab-separated read line of a cluster block
    pub fn parse(line: &str, file: &str, lineno: usize) -> Result<Self, PipelineError> {
        let fields = split_tabs(line);
        let strand = Strand::from_symbol(field(&fields, 2, file, lineno)?)?;
        let hits = field(&fields, 10, file, lineno)?;
        let hits = hits
            .split_once('=')
            .map(|(_, v)| v)
            .unwrap_or(hits)
            .trim()
            .parse::<u64>()
            .map_err(|_| PipelineError::parse(file, lineno, format!("bad hits descriptor '{hits}'")))?;

        Ok(Self {
            name: field(&fields, 4, file, lineno)?.replace('|', "_"),
            strand,
            abundance: parse_field(&fields, 7, file, lineno)?,
            seq: field(&fields, 5, file, lineno)?.to_string(),
            length: parse_field(&fields, 6, file, lineno)?,
            hits,
            position: parse_field(&fields, 3, file, lineno)?,
        })
    }

    pub fn line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.name, self.strand, self.abundance, self.seq, self.length, self.hits, self.position
        )
    }
}

/// A `>`-delimited block of the phasing cluster file
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterBlock {
    pub id: String,
    pub transcript: String,
    pub start: String,
    pub end: String,
    pub lines: Vec<String>,
}

impl ClusterBlock {
    /// header tokens by fixed index: id(2), transcript(6), start(10), end(12)
    pub fn parse(block: &str, file: &str, lineno: usize) -> Result<Self, PipelineError> {
        let mut lines = block.lines();
        let header = lines.next().unwrap_or_default();
        let tokens: Vec<&str> = header.split_whitespace().collect();

        let token = |idx: usize| -> Result<String, PipelineError> {
            tokens.get(idx).map(|t| t.to_string()).ok_or_else(|| {
                PipelineError::parse(file, lineno, format!("cluster header lacks token {idx}"))
            })
        };

        Ok(Self {
            id: token(2)?,
            transcript: token(6)?.replace("chr", "").replace("Chr", ""),
            start: token(10)?,
            end: token(12)?,
            lines: lines
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.to_string())
                .collect(),
        })
    }

    pub fn reads(&self, file: &str) -> Result<Vec<PhasedRead>, PipelineError> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, l)| PhasedRead::parse(l, file, i + 1))
            .collect()
    }
}

/// Arm boundaries of one hairpin reported by the inverted-repeat finder
#[derive(Debug, Clone, PartialEq)]
pub struct InvertedRepeatCoords {
    pub name: String,
    pub score: String,
    pub matches: String,
    pub percent: f64,
    pub gaps: String,
    pub align_len: u64,
    pub start5: i64,
    pub end5: i64,
    pub start3: i64,
    pub end3: i64,
    pub loop_len: i64,
}

/// Final call for one tested pair of phased loci
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrStatus {
    /// arms overlap and overhangs support a Dicer-processed hairpin
    Ir,
    /// not an IR-derived locus
    No,
    /// foldback present, arms do not overlap in phase
    Fo,
}

impl fmt::Display for IrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrStatus::Ir => write!(f, "IR"),
            IrStatus::No => write!(f, "No"),
            IrStatus::Fo => write!(f, "Fo"),
        }
    }
}

impl FromStr for IrStatus {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "IR" => Ok(IrStatus::Ir),
            "No" => Ok(IrStatus::No),
            "Fo" => Ok(IrStatus::Fo),
            other => Err(PipelineError::DataConsistency(format!(
                "unknown pair status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub hit: AlignmentHit,
    pub total_phased: usize,
    pub valid5: usize,
    pub valid3: usize,
    pub status: IrStatus,
}

impl ValidationResult {
    pub fn line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.hit.line(),
            config::PAIR_TYPE,
            self.total_phased,
            self.valid5,
            self.valid3,
            self.status
        )
    }

    /// parse a row of a previous finalPairs.txt: hit fields then 5 trailing columns
    pub fn parse(line: &str, file: &str, lineno: usize) -> Result<Self, PipelineError> {
        let fields = split_tabs(line);
        if fields.len() < 6 {
            return Err(PipelineError::parse(file, lineno, "truncated final pair row"));
        }

        let n = fields.len();
        let hit = AlignmentHit::parse(&fields[..n - 5].join("\t"), file, lineno)?;

        Ok(Self {
            hit,
            total_phased: parse_field(&fields, n - 4, file, lineno)?,
            valid5: parse_field(&fields, n - 3, file, lineno)?,
            valid3: parse_field(&fields, n - 2, file, lineno)?,
            status: fields[n - 1].parse()?,
        })
    }
}

/// Provenance of a chart row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RnaFlag {
    /// phasiRNA read back from phased.clust
    Phased,
    /// any sRNA from a library map
    Library,
}

impl fmt::Display for RnaFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RnaFlag::Phased => write!(f, "P"),
            RnaFlag::Library => write!(f, "S"),
        }
    }
}

/// A small RNA positioned on a transcript, as plotted on a hairpin chart
#[derive(Debug, Clone, PartialEq)]
pub struct SmallRna {
    pub name: String,
    pub strand: Strand,
    pub abundance: u64,
    pub seq: String,
    pub length: usize,
    pub hits: u64,
    pub flag: RnaFlag,
    pub position: i64,
}

impl SmallRna {
    /// bowtie map line: `name_abundance, strand, transcript, position, sequence,
    /// qualities, hits, mismatches`; returns the transcript with the record
    pub fn from_map(line: &str, file: &str, lineno: usize) -> Result<(String, Self), PipelineError> {
        let fields = split_tabs(line);
        let name = field(&fields, 0, file, lineno)?;
        let abundance = name
            .rsplit_once('_')
            .and_then(|(_, abundance)| abundance.parse::<u64>().ok())
            .ok_or_else(|| {
                PipelineError::parse(file, lineno, format!("read name '{name}' carries no abundance"))
            })?;
        let seq = field(&fields, 4, file, lineno)?.trim();

        let record = Self {
            name: name.to_string(),
            strand: Strand::from_symbol(field(&fields, 1, file, lineno)?)?,
            abundance,
            seq: seq.to_string(),
            length: seq.len(),
            hits: parse_field::<u64>(&fields, 6, file, lineno)? + 1,
            flag: RnaFlag::Library,
            position: parse_field(&fields, 3, file, lineno)?,
        };

        Ok((field(&fields, 2, file, lineno)?.trim().to_string(), record))
    }

    /// read line of phased.clust, see [`PhasedRead::line`]
    pub fn from_clust(line: &str, file: &str, lineno: usize) -> Result<Self, PipelineError> {
        let fields = split_tabs(line);

        Ok(Self {
            name: field(&fields, 0, file, lineno)?.to_string(),
            strand: Strand::from_symbol(field(&fields, 1, file, lineno)?)?,
            abundance: parse_field(&fields, 2, file, lineno)?,
            seq: field(&fields, 3, file, lineno)?.to_string(),
            length: parse_field(&fields, 4, file, lineno)?,
            hits: parse_field(&fields, 5, file, lineno)?,
            flag: RnaFlag::Phased,
            position: parse_field(&fields, 6, file, lineno)?,
        })
    }

    pub fn at(&self, position: i64) -> Self {
        Self {
            position,
            ..self.clone()
        }
    }

    pub fn line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.name,
            self.strand,
            self.abundance,
            self.seq,
            self.length,
            self.hits,
            self.flag,
            self.position
        )
    }
}

#[cfg(test)]
pub(crate) fn hit_line(q: &str, s: &str, pid: f64, len: u64, qlen: u64, bits: f64) -> String {
    let mut fields: Vec<String> = vec![
        q.into(),
        s.into(),
        pid.to_string(),
        len.to_string(),
        qlen.to_string(),
    ];
    fields.extend((5..14).map(|i| i.to_string()));
    fields.push(bits.to_string());
    fields.push("h5".into());
    fields.push("h3".into());
    fields.join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_hit_parse() {
        let line = hit_line("geneA", "geneB", 92.0, 140, 150, 250.0);
        let hit = AlignmentHit::parse(&line, "rc.txt", 2).unwrap();

        assert_eq!(hit.query, "geneA");
        assert_eq!(hit.subject, "geneB");
        assert_eq!(hit.length, 140);
        assert_eq!(hit.bitscore, 250.0);
        assert_eq!(hit.hang5, "h5");
        assert_eq!(hit.line(), line);
        assert_eq!(hit.map_ratio(), 0.93);
    }

    #[test]
    fn test_alignment_hit_short_line_fails() {
        assert!(AlignmentHit::parse("a\tb\t90", "rc.txt", 4).is_err());
    }

    #[test]
    fn test_cluster_block_parse() {
        let block = "Cluster 1 c1 x y z Chr7 a b c 100 d 300\n\
                     0\t1\t+\t105\tr|1\tACGT\t21\t10\tq\tq\tHits=2\n\
                     0\t1\t-\t124\tr|2\tTTTT\t21\t3\tq\tq\tHits=1\n";
        let block = ClusterBlock::parse(block, "c.cluster", 1).unwrap();

        assert_eq!(block.id, "c1");
        assert_eq!(block.transcript, "7");
        assert_eq!(block.start, "100");
        assert_eq!(block.end, "300");

        let reads = block.reads("c.cluster").unwrap();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].name, "r_1");
        assert_eq!(reads[0].strand, Strand::Watson);
        assert_eq!(reads[0].hits, 2);
        assert_eq!(reads[1].strand, Strand::Crick);
        assert_eq!(reads[1].line(), "r_2\tc\t3\tTTTT\t21\t1\t124");
    }

    #[test]
    fn test_validation_result_round_trip_from_line() {
        let hit = AlignmentHit::parse(&hit_line("T1", "T1", 90.0, 200, 200, 300.0), "f", 1).unwrap();
        let res = ValidationResult {
            hit,
            total_phased: 7,
            valid5: 3,
            valid3: 2,
            status: IrStatus::Fo,
        };

        let parsed = ValidationResult::parse(&res.line(), "finalPairs.txt", 2).unwrap();
        assert_eq!(parsed, res);
    }

    #[test]
    fn test_small_rna_from_map() {
        let line = "Tag12_340\t+\tgeneA\t57\tACGTACGTACGTACGTACGTA\tIIII\t0\t";
        let (trans, rna) = SmallRna::from_map(line, "lib.map", 1).unwrap();

        assert_eq!(trans, "geneA");
        assert_eq!(rna.abundance, 340);
        assert_eq!(rna.hits, 1);
        assert_eq!(rna.length, 21);
        assert_eq!(rna.flag, RnaFlag::Library);
        assert_eq!(rna.at(3).line(), "Tag12_340\tw\t340\tACGTACGTACGTACGTACGTA\t21\t1\tS\t3");
    }

    #[test]
    fn test_candidate_pair_names() {
        let hit = AlignmentHit::parse(&hit_line("a", "b", 90.0, 200, 200, 1.0), "f", 1).unwrap();
        let pair = CandidatePair::from_hit(&hit, "IR");
        assert_eq!(pair.name(), "a-b");
        assert_eq!(pair.matches, 180);
        assert!(!pair.is_self_pair());
    }
}
