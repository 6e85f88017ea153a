use serde::Serialize;

/// Beyond this many stories the indicator switches to grouped buckets.
pub const MAX_INDICATORS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressIndicator {
    /// Fill percentage per segment, each in `[0, 100]` for in-range input.
    pub segments: Vec<f64>,
    /// `"{n} of {total}"`, only present in grouped mode.
    pub label: Option<String>,
}

impl ProgressIndicator {
    pub fn is_grouped(&self) -> bool {
        self.label.is_some()
    }
}

pub fn map_progress(total: usize, current_index: usize, progress: f64) -> ProgressIndicator {
    if total == 0 {
        return ProgressIndicator {
            segments: Vec::new(),
            label: None,
        };
    }

    if total <= MAX_INDICATORS {
        let segments = (0..total)
            .map(|i| fill_for(i, current_index, progress))
            .collect();
        return ProgressIndicator {
            segments,
            label: None,
        };
    }

    let segment_size = total.div_ceil(MAX_INDICATORS);
    let current_segment = current_index / segment_size;
    let within = (current_index % segment_size) as f64 / segment_size as f64 * 100.0;
    let current_fill = within + progress / segment_size as f64;

    let segments = (0..MAX_INDICATORS)
        .map(|i| {
            if i < current_segment {
                100.0
            } else if i == current_segment {
                current_fill
            } else {
                0.0
            }
        })
        .collect();

    ProgressIndicator {
        segments,
        label: Some(format!("{} of {}", current_index + 1, total)),
    }
}

fn fill_for(segment: usize, current_index: usize, progress: f64) -> f64 {
    if segment < current_index {
        100.0
    } else if segment == current_index {
        progress
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_feed_has_no_segments() {
        let indicator = map_progress(0, 0, 50.0);
        assert!(indicator.segments.is_empty());
        assert_eq!(indicator.label, None);
    }

    #[test]
    fn one_segment_per_story_up_to_ten() {
        let indicator = map_progress(5, 2, 40.0);
        assert_eq!(indicator.segments, vec![100.0, 100.0, 40.0, 0.0, 0.0]);
        assert!(!indicator.is_grouped());

        for total in 1..=MAX_INDICATORS {
            assert_eq!(map_progress(total, 0, 0.0).segments.len(), total);
        }
    }

    #[test]
    fn large_feeds_are_grouped_into_ten_buckets() {
        // 25 stories -> buckets of 3; index 7 sits in bucket 2 at offset 1.
        let indicator = map_progress(25, 7, 60.0);
        assert_eq!(indicator.segments.len(), MAX_INDICATORS);
        assert_eq!(indicator.segments[0], 100.0);
        assert_eq!(indicator.segments[1], 100.0);
        let expected = (1.0 / 3.0) * 100.0 + 60.0 / 3.0;
        assert!((indicator.segments[2] - expected).abs() < 1e-9);
        assert!(indicator.segments[3..].iter().all(|fill| *fill == 0.0));
        assert_eq!(indicator.label.as_deref(), Some("8 of 25"));
    }

    #[test]
    fn eleven_stories_use_buckets_of_two() {
        let indicator = map_progress(11, 10, 0.0);
        assert_eq!(indicator.segments.len(), MAX_INDICATORS);
        assert_eq!(indicator.segments[4], 100.0);
        assert_eq!(indicator.segments[5], 0.0);
        assert_eq!(indicator.label.as_deref(), Some("11 of 11"));
    }
}
