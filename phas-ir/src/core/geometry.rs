//! Arm geometry of a candidate hairpin
//!
//! Phase positions of both arms are moved into the frame of the combined
//! sequence, filtered to the reported arms, re-based so that position 1 of
//! either arm is the fold point and finally trimmed to their overlap.

use config::TRIM_WIGGLE;

use crate::core::einverted::HairpinFrame;

/// Inclusive arm boundaries in the combined sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmBounds {
    pub start1: i64,
    pub end1: i64,
    pub start2: i64,
    pub end2: i64,
}

impl From<&HairpinFrame> for ArmBounds {
    fn from(frame: &HairpinFrame) -> Self {
        Self {
            start1: frame.coords.start5,
            end1: frame.coords.end5,
            start2: frame.coords.start3,
            end2: frame.coords.end3,
        }
    }
}

impl ArmBounds {
    pub fn in_arm5(&self, pos: i64) -> bool {
        pos >= self.start1 && pos <= self.end1
    }

    pub fn in_arm3(&self, pos: i64) -> bool {
        pos >= self.start2 && pos <= self.end2
    }

    /// distance from the left edge of arm 5, 1-based
    pub fn norm5(&self, pos: i64) -> i64 {
        pos - self.start1 + 1
    }

    /// distance from the right edge of arm 3, 1-based
    pub fn norm3(&self, pos: i64) -> i64 {
        (pos - self.end2).abs() + 1
    }
}

/// Result of projecting both arms of a locus combination onto a hairpin
#[derive(Debug, Clone, PartialEq)]
pub enum ArmProjection {
    /// at least one arm has no position inside the hairpin
    Outside { valid5: usize, valid3: usize },
    /// both arms inside, but their normalised positions do not overlap
    Disjoint { valid5: usize, valid3: usize },
    /// trimmed, normalised positions of both arms
    Overlap {
        valid5: usize,
        valid3: usize,
        arm5: Vec<i64>,
        arm3: Vec<i64>,
    },
}

impl ArmProjection {
    pub fn valid_counts(&self) -> (usize, usize) {
        match self {
            ArmProjection::Outside { valid5, valid3 }
            | ArmProjection::Disjoint { valid5, valid3 }
            | ArmProjection::Overlap { valid5, valid3, .. } => (*valid5, *valid3),
        }
    }

    /// both arms contributed phases from inside the hairpin
    pub fn has_valid_arms(&self) -> bool {
        !matches!(self, ArmProjection::Outside { .. })
    }
}

/// shifts arm 3 positions into the combined sequence
pub fn shift(positions: &[i64], offset: i64) -> Vec<i64> {
    positions.iter().map(|p| p + offset).collect()
}

/// keeps positions passing the arm predicate, in order
pub fn within<F: Fn(i64) -> bool>(positions: &[i64], inside: F) -> Vec<i64> {
    positions.iter().copied().filter(|&p| inside(p)).collect()
}

/// Projects arm positions onto a hairpin
///
/// # Arguments
///
/// * `arm5` - phase positions on transcript 5
/// * `arm3` - phase positions on transcript 3, in its own coordinates
/// * `frame` - hairpin and arm lengths
///
/// # Returns
///
/// * `ArmProjection` - the fast-reject, no-overlap or trimmed outcome
pub fn project(arm5: &[i64], arm3: &[i64], frame: &HairpinFrame) -> ArmProjection {
    let bounds = ArmBounds::from(frame);

    let valid5 = within(arm5, |p| bounds.in_arm5(p));
    let valid3 = within(&shift(arm3, frame.shift()), |p| bounds.in_arm3(p));
    let (n5, n3) = (valid5.len(), valid3.len());

    if valid5.is_empty() || valid3.is_empty() {
        return ArmProjection::Outside {
            valid5: n5,
            valid3: n3,
        };
    }

    let norm5: Vec<i64> = valid5.iter().map(|&p| bounds.norm5(p)).collect();
    // read arm 3 from the fold point outwards
    let norm3: Vec<i64> = valid3.iter().rev().map(|&p| bounds.norm3(p)).collect();

    let (arm5, arm3) = trim(&norm5, &norm3);
    if arm5.is_empty() || arm3.is_empty() {
        return ArmProjection::Disjoint {
            valid5: n5,
            valid3: n3,
        };
    }

    ArmProjection::Overlap {
        valid5: n5,
        valid3: n3,
        arm5,
        arm3,
    }
}

/// Restricts both arms to their shared window, widened by a few nt
pub fn trim(arm5: &[i64], arm3: &[i64]) -> (Vec<i64>, Vec<i64>) {
    let (Some(amin), Some(amax), Some(bmin), Some(bmax)) = (
        arm5.iter().min(),
        arm5.iter().max(),
        arm3.iter().min(),
        arm3.iter().max(),
    ) else {
        return (Vec::new(), Vec::new());
    };

    let lo = amin.max(bmin) - TRIM_WIGGLE;
    let hi = amax.min(bmax) + TRIM_WIGGLE;

    let keep = |p: i64| p >= lo && p <= hi;
    (within(arm5, keep), within(arm3, keep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::einverted::coords;

    fn frame(start5: i64, end5: i64, start3: i64, end3: i64, len5: i64, self_pair: bool) -> HairpinFrame {
        HairpinFrame {
            coords: coords("h", start5, end5, start3, end3),
            len5,
            len3: len5,
            self_pair,
        }
    }

    #[test]
    fn test_normalized_positions_stay_in_arm() {
        let bounds = ArmBounds {
            start1: 37,
            end1: 240,
            start2: 310,
            end2: 515,
        };

        for p in bounds.start1..=bounds.end1 {
            let n = bounds.norm5(p);
            assert!(n >= 1 && n <= bounds.end1 - bounds.start1 + 1);
        }
        for q in bounds.start2..=bounds.end2 {
            let m = bounds.norm3(q);
            assert!(m >= 1 && m <= bounds.end2 - bounds.start2 + 1);
        }
    }

    #[test]
    fn test_self_pair_has_no_shift() {
        let f = frame(10, 200, 260, 450, 500, true);
        let res = project(&[50], &[300], &f);

        assert_eq!(res.valid_counts(), (1, 1));
    }

    #[test]
    fn test_two_transcripts_shift_arm3() {
        // arm 3 position 30 sits at 230 in the combined sequence
        let f = frame(10, 150, 210, 350, 200, false);
        let res = project(&[100], &[30], &f);
        assert_eq!(res.valid_counts(), (1, 1));

        let res = project(&[100], &[300], &f);
        assert_eq!(
            res,
            ArmProjection::Outside {
                valid5: 1,
                valid3: 0
            }
        );
        assert!(!res.has_valid_arms());
    }

    #[test]
    fn test_disjoint_arms_are_foldback_only() {
        // arm5 normalises to 1, arm3 to 100
        let f = frame(1, 200, 301, 500, 600, true);
        let res = project(&[1], &[401], &f);

        assert!(matches!(res, ArmProjection::Disjoint { .. }));
        assert!(res.has_valid_arms());
    }

    #[test]
    fn test_overlap_is_trimmed_and_reflected() {
        let f = frame(1, 200, 301, 500, 600, true);
        // arm3 500 -> 1, 479 -> 22, 458 -> 43; read back from the fold
        let res = project(&[3, 24, 45, 150], &[458, 479, 500], &f);

        match res {
            ArmProjection::Overlap { arm5, arm3, .. } => {
                assert_eq!(arm3, vec![1, 22, 43]);
                assert_eq!(arm5, vec![3, 24, 45]);
            }
            other => panic!("unexpected projection {:?}", other),
        }
    }

    #[test]
    fn test_trim_window() {
        let (a, b) = trim(&[1, 10, 20, 90], &[15, 30, 40]);
        // window [12, 43]
        assert_eq!(a, vec![20]);
        assert_eq!(b, vec![15, 30, 40]);
    }
}
