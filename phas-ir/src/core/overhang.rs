//! Overhang consensus between the two arms of a hairpin
//!
//! Every query position votes against every reference position on the
//! opposite arm. A vote is IR when the distance, folded into one phase
//! cycle, is the 3 nt (or phase - 3) signature of a 2 nt Dicer overhang,
//! tolerating one nt of slop on either side. Local winners per query
//! position are then tallied into the final call.

use log::debug;

use config::{PhaseMode, DICER_OFFSETS, PHASED_OVERHANG};

use crate::record::IrStatus;

/// Decides whether two trimmed, normalised arms look Dicer-processed
///
/// # Arguments
///
/// * `arm5` - trimmed positions of arm 5
/// * `arm3` - trimmed positions of arm 3
/// * `phase` - phase length
/// * `mode` - guessed ladders compare arm5 to arm3; observed positions use
///   the shorter arm as the query
///
/// # Returns
///
/// * `IrStatus` - `Ir` or `No`
///
/// # Example
///
/// ```rust, ignore
/// let status = check_overhang(&[100, 121, 142], &[103, 124], 21, PhaseMode::Observed);
/// assert_eq!(status, IrStatus::Ir);
/// ```
pub fn check_overhang(arm5: &[i64], arm3: &[i64], phase: i64, mode: PhaseMode) -> IrStatus {
    let (query, reference) = match mode {
        PhaseMode::Guessed => (arm5, arm3),
        PhaseMode::Observed => {
            if arm3.len() < arm5.len() {
                (arm3, arm5)
            } else {
                (arm5, arm3)
            }
        }
    };

    let mut dominant = Vec::with_capacity(query.len());
    for &x in query {
        let votes: Vec<IrStatus> = reference.iter().map(|&y| vote(x, y, phase)).collect();
        let counts = tally(&votes);

        match counts.as_slice() {
            [] => {}
            [(single, _)] => dominant.push(*single),
            [(first, n1), (second, n2), ..] => {
                if n1 > n2 {
                    dominant.push(*first);
                } else {
                    // tie: both stay
                    dominant.push(*first);
                    dominant.push(*second);
                }
            }
        }
    }

    let counts = tally(&dominant);
    debug!("Dominant overhang status: {:?}", counts);

    match counts.as_slice() {
        [] => IrStatus::No,
        [(single, _)] => *single,
        [first, second, ..] => {
            if first.0 == IrStatus::Ir || second.0 == IrStatus::Ir {
                IrStatus::Ir
            } else {
                IrStatus::No
            }
        }
    }
}

/// classifies the distance between two phase positions
pub fn vote(x: i64, y: i64, phase: i64) -> IrStatus {
    let z = (x.abs() - y.abs()).abs();
    let overhang = if z > phase { z % phase } else { z };

    if overhang == PHASED_OVERHANG || overhang == phase - PHASED_OVERHANG {
        return IrStatus::Ir;
    }

    let dicer_offset = DICER_OFFSETS
        .iter()
        .any(|&d| overhang == d || overhang == phase - d);

    if dicer_offset {
        IrStatus::Ir
    } else {
        IrStatus::No
    }
}

/// label counts, most common first, ties in order of first appearance
fn tally(labels: &[IrStatus]) -> Vec<(IrStatus, usize)> {
    let mut counts: Vec<(IrStatus, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(l, _)| l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((*label, 1)),
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
