use serde::{Deserialize, Serialize};

use crate::gesture::SwipeDirection;

/// What the viewer wants the story feed to do in response to user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoryIntent {
    Next,
    Previous,
    /// Open the purchase message sheet for the current story.
    OpenMessage,
    /// Close whatever overlay is open.
    Dismiss,
    Hold(bool),
}

impl StoryIntent {
    pub fn from_swipe(direction: SwipeDirection) -> Option<Self> {
        match direction {
            SwipeDirection::Left => Some(StoryIntent::Next),
            SwipeDirection::Right => Some(StoryIntent::Previous),
            SwipeDirection::Up => Some(StoryIntent::OpenMessage),
            SwipeDirection::Down => None,
        }
    }

    /// Maps a DOM-style key name.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" => Some(StoryIntent::Previous),
            "ArrowRight" | " " => Some(StoryIntent::Next),
            "Escape" => Some(StoryIntent::Dismiss),
            _ => None,
        }
    }

    /// Intents the playback controller handles itself.
    pub fn is_playback(&self) -> bool {
        matches!(
            self,
            StoryIntent::Next | StoryIntent::Previous | StoryIntent::Hold(_)
        )
    }
}
