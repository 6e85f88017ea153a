pub mod controller;
pub mod input;
pub mod progress;
pub mod state;

pub use controller::{StoryController, StoryEvent, StoryOptions, StorySnapshot};
pub use input::StoryIntent;
pub use progress::{map_progress, ProgressIndicator, MAX_INDICATORS};
pub use state::{
    clamp_index, Navigation, StoryPhase, StoryState, Tick, DEFAULT_STORY_DURATION_MS,
};
