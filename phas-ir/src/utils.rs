use anyhow::{Context, Result};
use hashbrown::{HashMap, HashSet};
use log::{info, warn};

use std::path::Path;

use config::{reader, PipelineError, Strand};

use crate::record::{
    AlignmentHit, ClusterBlock, PhasedLocus, SmallRna, Transcript, TranscriptSet, ValidationResult,
};

/// A BLAST-like tabular file: the verbatim header and its hits
#[derive(Debug, Default, Clone)]
pub struct BlastTable {
    pub header: String,
    pub hits: Vec<AlignmentHit>,
}

impl BlastTable {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Reads a (multi-line) FASTA collection
///
/// # Arguments
///
/// * `path` - FASTA file, optionally gzipped
///
/// # Returns
///
/// * `Result<TranscriptSet>` - transcripts in file order
///
/// # Example
///
/// ```rust, ignore
/// let transcripts = read_fasta(&PathBuf::from("24Phas.fa")).unwrap();
/// assert!(transcripts.get("TRINITY_1").is_some());
/// ```
pub fn read_fasta(path: &Path) -> Result<TranscriptSet> {
    let contents = reader(path)?;
    let transcripts = parse_fasta(&contents);

    info!("Transcripts in {:?}: {}", path, transcripts.len());
    Ok(transcripts)
}

pub fn parse_fasta(contents: &str) -> TranscriptSet {
    let records = contents
        .split('>')
        .skip(1)
        .filter_map(|record| {
            let mut lines = record.lines();
            let name = lines.next()?.split_whitespace().next()?;
            let seq: String = lines.map(|l| l.trim()).collect();

            Some(Transcript::new(name, &seq))
        })
        .collect();

    TranscriptSet::new(records)
}

/// Reads one of the BLAST result variants; the first line is the header
pub fn read_blast(path: &Path) -> Result<BlastTable> {
    let contents = reader(path)?;
    let table = parse_blast(&contents, &display_name(path))?;

    info!("Hits in {:?}: {}", path, table.len());
    Ok(table)
}

pub fn parse_blast(contents: &str, file: &str) -> Result<BlastTable, PipelineError> {
    let mut lines = contents.lines();
    let header = lines
        .next()
        .map(|h| h.trim_end_matches('\r').to_string())
        .unwrap_or_default();

    let hits = lines
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| AlignmentHit::parse(line, file, i + 2))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BlastTable { header, hits })
}

/// Reads the phasing predictor results
///
/// Returns every locus plus the distinct phased transcripts in order of
/// first appearance.
pub fn read_phased_loci(path: &Path) -> Result<(Vec<PhasedLocus>, Vec<String>)> {
    let contents = reader(path)?;
    let (loci, transcripts) = parse_phased_loci(&contents, &display_name(path))?;

    info!(
        "Total phased loci: {} | Phased transcripts: {}",
        loci.len(),
        transcripts.len()
    );
    Ok((loci, transcripts))
}

pub fn parse_phased_loci(
    contents: &str,
    file: &str,
) -> Result<(Vec<PhasedLocus>, Vec<String>), PipelineError> {
    let loci = contents
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| PhasedLocus::parse(line, file, i + 1))
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = HashSet::new();
    let transcripts = loci
        .iter()
        .filter(|locus| seen.insert(locus.transcript.clone()))
        .map(|locus| locus.transcript.clone())
        .collect();

    Ok((loci, transcripts))
}

/// Reads the phasing cluster file, one block per `>`
pub fn read_clusters(path: &Path) -> Result<Vec<ClusterBlock>> {
    let contents = reader(path)?;
    let clusters = parse_clusters(&contents, &display_name(path))?;

    info!("Clusters in {:?}: {}", path, clusters.len());
    Ok(clusters)
}

pub fn parse_clusters(contents: &str, file: &str) -> Result<Vec<ClusterBlock>, PipelineError> {
    // text before the first '>' is not a cluster
    contents
        .split('>')
        .skip(1)
        .enumerate()
        .map(|(i, block)| ClusterBlock::parse(block, file, i + 1))
        .collect()
}

/// Reads a finalPairs.txt written by an earlier validation run
pub fn read_final_pairs(path: &Path) -> Result<Vec<ValidationResult>> {
    let contents = reader(path)?;
    let file = display_name(path);

    let results = contents
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| ValidationResult::parse(line, &file, i + 1))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("cannot load previous results from {:?}", path))?;

    info!("Final pairs loaded from {:?}: {}", path, results.len());
    Ok(results)
}

/// Sense-strand sRNAs of a bowtie map, grouped by transcript
pub fn parse_map(contents: &str, file: &str) -> Result<HashMap<String, Vec<SmallRna>>, PipelineError> {
    let mut acc: HashMap<String, Vec<SmallRna>> = HashMap::new();

    for (i, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let (transcript, rna) = SmallRna::from_map(line, file, i + 1)?;
        if rna.strand == Strand::Watson {
            acc.entry(transcript).or_default().push(rna);
        }
    }

    Ok(acc)
}

/// Sense-strand phasiRNAs of phased.clust, grouped by transcript
///
/// A transcript written by several loci combinations keeps its last block.
pub fn parse_phased_clust(
    contents: &str,
    file: &str,
) -> Result<HashMap<String, Vec<SmallRna>>, PipelineError> {
    let mut acc = HashMap::new();

    for (i, block) in contents.split('>').skip(1).enumerate() {
        let mut lines = block.lines();
        let transcript = lines.next().unwrap_or_default().trim().to_string();

        let reads = lines
            .filter(|l| !l.trim().is_empty())
            .map(|l| SmallRna::from_clust(l, file, i + 1))
            .filter(|r| !matches!(r, Ok(rna) if rna.strand != Strand::Watson))
            .collect::<Result<Vec<_>, _>>()?;

        if acc.insert(transcript.clone(), reads).is_some() {
            warn!("Transcript {} appears in more than one phased cluster", transcript);
        }
    }

    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::hit_line;

    #[test]
    fn test_parse_fasta_multiline() {
        let fa = ">T1 some description\nACGT\nACGT\n>T2\nGG\n";
        let set = parse_fasta(fa);

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("T1").unwrap().seq, "ACGTACGT");
        assert_eq!(set.length_of("T2"), Some(2));
        assert_eq!(set.length_of("T3"), None);
    }

    #[test]
    fn test_parse_blast_keeps_header() {
        let contents = format!(
            "qseqid\tsseqid\tpident\n{}\n\n{}\n",
            hit_line("a", "b", 90.0, 200, 210, 300.0),
            hit_line("c", "d", 88.0, 190, 200, 280.0)
        );
        let table = parse_blast(&contents, "rc.txt").unwrap();

        assert_eq!(table.header, "qseqid\tsseqid\tpident");
        assert_eq!(table.len(), 2);
        assert_eq!(table.hits[1].query, "c");
    }

    #[test]
    fn test_parse_phased_loci_distinct_transcripts() {
        let contents = "name\tpval\ttrans\tstart\tend\tstrand\tlib\n\
                        L1\t1e-9\tT1\t10\t300\tw\t5233\n\
                        L2\t1e-8\tT2\t20\t400\tw\t5233\n\
                        L3\t1e-7\tT1\t500\t800\tc\t5233\n";
        let (loci, transcripts) = parse_phased_loci(contents, "phas.csv").unwrap();

        assert_eq!(loci.len(), 3);
        assert_eq!(transcripts, vec!["T1".to_string(), "T2".to_string()]);
        assert_eq!(loci[2].start, "500");
    }

    #[test]
    fn test_phased_loci_keep_raw_coordinates() {
        use config::CoordMatch;

        let contents = "name\tpval\ttrans\tstart\tend\tstrand\tlib\n\
                        L1\t1e-9\tT1\t 010\t300 \tw\t5233\n";
        let (loci, _) = parse_phased_loci(contents, "phas.csv").unwrap();

        assert_eq!(loci[0].start, " 010");
        assert_eq!(loci[0].end, "300 ");
        assert!(!CoordMatch::Strict.matches("10", &loci[0].start));
        assert!(CoordMatch::Loose.matches("10", &loci[0].start));
        assert_eq!(loci[0].end_position().unwrap(), 300);
    }

    #[test]
    fn test_parse_clusters_skips_preamble() {
        let contents = "preamble\n>Cluster 1 c1 x y z T1 a b c 10 d 300\n0\t1\t+\t12\tr1\tACGT\t21\t4\tq\tq\tHits=1\n";
        let clusters = parse_clusters(contents, "c.cluster").unwrap();

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].transcript, "T1");
        assert_eq!(clusters[0].lines.len(), 1);
    }

    #[test]
    fn test_parse_map_keeps_sense_only() {
        let contents = "Tag1_10\t+\tT1\t5\tACGT\tIIII\t0\t\nTag2_3\t-\tT1\t9\tTTTT\tIIII\t1\t\n";
        let map = parse_map(contents, "lib.map").unwrap();

        assert_eq!(map.len(), 1);
        assert_eq!(map["T1"].len(), 1);
        assert_eq!(map["T1"][0].abundance, 10);
    }

    #[test]
    fn test_parse_phased_clust() {
        let contents = ">T1\nr1\tw\t4\tACGT\t4\t1\t12\nr2\tc\t2\tTTTT\t4\t1\t30\n>T2\nr3\tw\t7\tGGGG\t4\t2\t44\n";
        let clusts = parse_phased_clust(contents, "phased.clust").unwrap();

        assert_eq!(clusts["T1"].len(), 1);
        assert_eq!(clusts["T1"][0].position, 12);
        assert_eq!(clusts["T2"][0].hits, 2);
    }

    #[test]
    fn test_read_final_pairs_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finalPairs.txt");
        let row = format!("{}\tIR\t6\t3\t2\tIR", hit_line("a", "b", 90.0, 200, 200, 300.0));
        std::fs::write(&path, format!("header\ttype\n{row}\n")).unwrap();

        let results = read_final_pairs(&path).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].valid5, 3);
        assert_eq!(results[0].line(), row);
    }
}
