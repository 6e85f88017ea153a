pub mod swipe;

pub use swipe::{Point, SwipeDirection, SwipeInterpreter, DEFAULT_SWIPE_THRESHOLD};
