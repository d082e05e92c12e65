//! Sequence gap detection.
//!
//! Upstream sequence numbers are expected to be dense: each batch should
//! start right after the previous watermark and run without holes. Gaps do
//! occur, upstream prunes and renumbers on its own schedule, so they are
//! reported for observability and never block ingestion.

/// An inclusive range of missing sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub first_missing: u64,
    pub last_missing: u64,
}

impl Gap {
    /// How many sequence numbers the gap spans.
    pub fn missing_count(&self) -> u64 {
        self.last_missing - self.first_missing + 1
    }
}

/// Find gaps between `watermark` and a batch of ascending sequence numbers.
///
/// A non-zero watermark that does not directly precede the first sequence
/// yields a leading gap; non-consecutive neighbours yield intra-batch gaps.
/// A zero watermark means no history, so no leading gap is possible.
pub fn detect_gaps(watermark: u64, seqs: &[u64]) -> Vec<Gap> {
    let mut gaps = Vec::new();
    let Some(&first) = seqs.first() else {
        return gaps;
    };

    if watermark > 0 && first > watermark + 1 {
        gaps.push(Gap {
            first_missing: watermark + 1,
            last_missing: first - 1,
        });
    }

    for pair in seqs.windows(2) {
        if pair[1] > pair[0] + 1 {
            gaps.push(Gap {
                first_missing: pair[0] + 1,
                last_missing: pair[1] - 1,
            });
        }
    }

    gaps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_batch_has_no_gaps() {
        assert!(detect_gaps(100, &[101, 102, 103]).is_empty());
    }

    #[test]
    fn test_leading_gap_after_watermark() {
        let gaps = detect_gaps(100, &[103, 104, 105]);
        assert_eq!(
            gaps,
            vec![Gap {
                first_missing: 101,
                last_missing: 102,
            }]
        );
        assert_eq!(gaps[0].missing_count(), 2);
    }

    #[test]
    fn test_intra_batch_gaps() {
        let gaps = detect_gaps(0, &[1, 2, 5, 6, 9]);
        assert_eq!(
            gaps,
            vec![
                Gap {
                    first_missing: 3,
                    last_missing: 4,
                },
                Gap {
                    first_missing: 7,
                    last_missing: 8,
                },
            ]
        );
    }

    #[test]
    fn test_zero_watermark_has_no_leading_gap() {
        assert!(detect_gaps(0, &[5000, 5001]).is_empty());
    }

    #[test]
    fn test_leading_and_intra_gaps_combine() {
        let gaps = detect_gaps(10, &[13, 15]);
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].first_missing, 11);
        assert_eq!(gaps[0].last_missing, 12);
        assert_eq!(gaps[1].first_missing, 14);
        assert_eq!(gaps[1].last_missing, 14);
        assert_eq!(gaps[1].missing_count(), 1);
    }

    #[test]
    fn test_empty_batch_has_no_gaps() {
        assert!(detect_gaps(42, &[]).is_empty());
    }

    #[test]
    fn test_single_missing_neighbour() {
        let gaps = detect_gaps(7, &[9]);
        assert_eq!(
            gaps,
            vec![Gap {
                first_missing: 8,
                last_missing: 8,
            }]
        );
    }
}
