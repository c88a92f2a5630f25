//! Fit scoring for candidate merges.
//!
//! The merge core never computes a score itself: it hands the stitched
//! coordinates of a candidate pair to a [`Scorer`] and gives the value to
//! an acceptance predicate. [`max_offset`] is the reference scorer, the
//! same chord-offset measure Douglas-Peucker style simplification uses.

use crate::types::Point;

/// Result of scoring a coordinate sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Index (into the scored coordinates) of the vertex that produced
    /// `value`, if any vertex did.
    pub index: Option<usize>,
    /// Fit value. Higher is a worse fit.
    pub value: f64,
}

impl Score {
    /// A score that did not single out any vertex.
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self { index: None, value }
    }
}

/// Scores the coordinates of a candidate merged fragment.
///
/// Must be pure: the merge core may call it in any order and memoizes
/// nothing but the fact that a pair was scored.
pub trait Scorer {
    /// Score `coordinates`.
    fn score(&self, coordinates: &[Point]) -> Score;
}

impl<F> Scorer for F
where
    F: Fn(&[Point]) -> Score,
{
    fn score(&self, coordinates: &[Point]) -> Score {
        self(coordinates)
    }
}

/// Maximum perpendicular offset of the interior vertices from the chord
/// joining the first and last coordinate.
///
/// Sequences with fewer than 3 points have no interior and score 0.
#[must_use]
pub fn max_offset(coordinates: &[Point]) -> Score {
    let (Some(&first), Some(&last)) = (coordinates.first(), coordinates.last()) else {
        return Score::new(0.0);
    };
    if coordinates.len() < 3 {
        return Score::new(0.0);
    }

    let mut worst = Score {
        index: Some(1),
        value: 0.0,
    };
    for (k, &p) in coordinates.iter().enumerate().take(coordinates.len() - 1).skip(1) {
        let d = chord_offset(p, first, last);
        if d > worst.value {
            worst = Score {
                index: Some(k),
                value: d,
            };
        }
    }
    worst
}

/// Offset of `p` from the infinite line through the chord `start..end`.
/// A closed chord degenerates to the distance from `start`.
fn chord_offset(p: Point, start: Point, end: Point) -> f64 {
    let chord = (end.x - start.x, end.y - start.y);
    let span = chord.0.hypot(chord.1);
    if span == 0.0 {
        return p.distance(start);
    }
    // Twice the signed area of (start, end, p) over the base length.
    let area2 = chord.0.mul_add(p.y - start.y, -(chord.1 * (p.x - start.x)));
    area2.abs() / span
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_sequences_score_zero() {
        assert_eq!(max_offset(&[]), Score::new(0.0));
        assert_eq!(max_offset(&[Point::new(1.0, 1.0)]), Score::new(0.0));
        assert_eq!(
            max_offset(&[Point::new(0.0, 0.0), Point::new(5.0, 5.0)]),
            Score::new(0.0)
        );
    }

    #[test]
    fn collinear_points_score_zero() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
        ];
        let score = max_offset(&pts);
        assert!(score.value.abs() < 1e-12);
    }

    #[test]
    fn reports_worst_interior_vertex() {
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 1.0),
            Point::new(4.0, -3.0),
            Point::new(6.0, 0.0),
        ];
        let score = max_offset(&pts);
        assert_eq!(score.index, Some(2));
        assert!((score.value - 3.0).abs() < 1e-10);
    }

    #[test]
    fn closures_are_scorers() {
        let constant = |_: &[Point]| Score::new(40.0);
        let score = constant.score(&[Point::new(0.0, 0.0)]);
        assert!((score.value - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn function_items_are_scorers() {
        fn score_with<S: Scorer>(s: &S, pts: &[Point]) -> f64 {
            s.score(pts).value
        }
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 3.0),
            Point::new(2.0, 0.0),
        ];
        assert!((score_with(&max_offset, &pts) - 3.0).abs() < 1e-10);
    }

    #[test]
    fn chord_offset_of_diagonal_chord() {
        let d = chord_offset(Point::new(2.0, -1.0), Point::new(0.0, 0.0), Point::new(4.0, 2.0));
        let expected = 8.0 / 20.0_f64.sqrt();
        assert!((d - expected).abs() < 1e-10, "got {d}, expected {expected}");
    }

    #[test]
    fn chord_offset_measures_from_the_extended_line() {
        // Past the chord's end but on its line.
        let d = chord_offset(Point::new(6.0, 0.0), Point::new(0.0, 0.0), Point::new(2.0, 0.0));
        assert!(d.abs() < 1e-10);
    }

    #[test]
    fn closed_chord_falls_back_to_point_distance() {
        let d = chord_offset(Point::new(3.0, 4.0), Point::new(0.0, 0.0), Point::new(0.0, 0.0));
        assert!((d - 5.0).abs() < 1e-10);
    }
}
