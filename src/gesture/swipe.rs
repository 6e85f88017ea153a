use serde::{Deserialize, Serialize};

use crate::settings::StorefrontSettings;

/// Minimum travel, in touch coordinate units, before a gesture counts as a swipe.
pub const DEFAULT_SWIPE_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Turns a touch start / move / end sequence into at most one swipe.
///
/// Distances are measured as `start - end`, so a finger travelling towards
/// the left edge yields a positive `distance_x` and a [`SwipeDirection::Left`].
#[derive(Debug, Clone)]
pub struct SwipeInterpreter {
    threshold: f64,
    start: Option<Point>,
    last: Option<Point>,
}

impl Default for SwipeInterpreter {
    fn default() -> Self {
        Self::new(DEFAULT_SWIPE_THRESHOLD)
    }
}

impl SwipeInterpreter {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            start: None,
            last: None,
        }
    }

    pub fn from_settings(settings: &StorefrontSettings) -> Self {
        Self::new(settings.swipe_threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn touch_start(&mut self, point: Point) {
        self.last = None;
        self.start = Some(point);
    }

    pub fn touch_move(&mut self, point: Point) {
        self.last = Some(point);
    }

    /// Classifies the finished gesture. State is cleared whatever the outcome.
    pub fn touch_end(&mut self) -> Option<SwipeDirection> {
        let start = self.start.take();
        let last = self.last.take();
        let (start, end) = (start?, last?);
        classify(start, end, self.threshold)
    }
}

pub fn classify(start: Point, end: Point, threshold: f64) -> Option<SwipeDirection> {
    let distance_x = start.x - end.x;
    let distance_y = start.y - end.y;

    if distance_x.abs() > distance_y.abs() {
        if distance_x > threshold {
            Some(SwipeDirection::Left)
        } else if distance_x < -threshold {
            Some(SwipeDirection::Right)
        } else {
            None
        }
    } else if distance_y > threshold {
        Some(SwipeDirection::Up)
    } else if distance_y < -threshold {
        Some(SwipeDirection::Down)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swipe(from: (f64, f64), to: (f64, f64)) -> Option<SwipeDirection> {
        let mut interpreter = SwipeInterpreter::default();
        interpreter.touch_start(Point::new(from.0, from.1));
        interpreter.touch_move(Point::new(to.0, to.1));
        interpreter.touch_end()
    }

    #[test]
    fn short_leftward_drag_past_threshold_is_left() {
        assert_eq!(swipe((300.0, 400.0), (240.0, 410.0)), Some(SwipeDirection::Left));
    }

    #[test]
    fn rightward_and_vertical_swipes() {
        assert_eq!(swipe((100.0, 400.0), (220.0, 380.0)), Some(SwipeDirection::Right));
        assert_eq!(swipe((200.0, 500.0), (210.0, 300.0)), Some(SwipeDirection::Up));
        assert_eq!(swipe((200.0, 300.0), (190.0, 420.0)), Some(SwipeDirection::Down));
    }

    #[test]
    fn travel_at_threshold_is_ignored() {
        assert_eq!(swipe((300.0, 400.0), (250.0, 400.0)), None);
        assert_eq!(swipe((300.0, 400.0), (300.0, 450.0)), None);
    }

    #[test]
    fn diagonal_tie_is_treated_as_vertical() {
        assert_eq!(swipe((300.0, 400.0), (200.0, 300.0)), Some(SwipeDirection::Up));
    }

    #[test]
    fn tap_without_move_fires_nothing() {
        let mut interpreter = SwipeInterpreter::default();
        interpreter.touch_start(Point::new(10.0, 10.0));
        assert_eq!(interpreter.touch_end(), None);
    }

    #[test]
    fn state_is_cleared_after_every_end() {
        let mut interpreter = SwipeInterpreter::default();
        interpreter.touch_start(Point::new(300.0, 400.0));
        interpreter.touch_move(Point::new(100.0, 400.0));
        assert_eq!(interpreter.touch_end(), Some(SwipeDirection::Left));

        // A stray end with no new start must not replay the last gesture.
        assert_eq!(interpreter.touch_end(), None);

        // A new start discards a move left over from an abandoned gesture.
        interpreter.touch_move(Point::new(0.0, 0.0));
        interpreter.touch_start(Point::new(50.0, 50.0));
        assert_eq!(interpreter.touch_end(), None);
    }

    #[test]
    fn threshold_comes_from_settings() {
        let settings = StorefrontSettings {
            swipe_threshold: 120.0,
            ..StorefrontSettings::default()
        };
        let mut interpreter = SwipeInterpreter::from_settings(&settings);
        interpreter.touch_start(Point::new(300.0, 400.0));
        interpreter.touch_move(Point::new(240.0, 410.0));
        assert_eq!(interpreter.touch_end(), None);
    }
}
