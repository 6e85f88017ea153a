use serde::Serialize;
use tokio::time::Instant;

pub const DEFAULT_STORY_DURATION_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StoryPhase {
    /// No sequence yet and playback never started.
    Idle,
    Playing,
    /// Autoplay suspended while the user keeps a finger down.
    HeldPaused,
    /// Explicit `pause()` by the caller.
    ManuallyStopped,
    /// Playback not started (autoplay off) or stopped by `reset()`.
    Stopped,
}

/// Result of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Moved(usize),
    /// Already on the last story; the caller decides between looping and
    /// showing an end screen.
    Ended,
    Unchanged,
}

/// Result of one autoplay tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// Timing is not active; the ticker should wind down.
    Inactive,
    Progress(f64),
    Advanced(usize),
    Ended,
}

/// Story playback state. Every transition takes `now` explicitly so the
/// machine can be driven by the runtime clock or by tests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryState {
    pub current_index: usize,
    pub len: usize,
    pub playing: bool,
    pub paused: bool,
    pub holding: bool,
    pub progress: f64,
    pub duration_ms: u64,
    /// Elapsed time carried over from earlier running windows of the current
    /// story; combines with `running_anchor` to compute the true elapsed time.
    #[serde(skip)]
    elapsed_baseline_ms: u64,
    #[serde(skip)]
    running_anchor: Option<Instant>,
    #[serde(skip)]
    end_signalled: bool,
}

impl Default for StoryState {
    fn default() -> Self {
        Self::new(DEFAULT_STORY_DURATION_MS)
    }
}

impl StoryState {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            current_index: 0,
            len: 0,
            playing: false,
            paused: false,
            holding: false,
            progress: 0.0,
            duration_ms,
            elapsed_baseline_ms: 0,
            running_anchor: None,
            end_signalled: false,
        }
    }

    pub fn phase(&self) -> StoryPhase {
        match (self.playing, self.holding, self.paused) {
            (true, true, _) => StoryPhase::HeldPaused,
            (true, false, true) => StoryPhase::ManuallyStopped,
            (true, false, false) => StoryPhase::Playing,
            (false, _, _) if self.len == 0 && self.current_index == 0 => StoryPhase::Idle,
            (false, _, _) => StoryPhase::Stopped,
        }
    }

    /// True while the autoplay clock should be advancing.
    pub fn is_running(&self) -> bool {
        self.playing && !self.paused && !self.holding && self.len > 0
    }

    pub fn elapsed_ms(&self, now: Instant) -> u64 {
        match self.running_anchor {
            Some(anchor) => self
                .elapsed_baseline_ms
                .saturating_add(now.saturating_duration_since(anchor).as_millis() as u64),
            None => self.elapsed_baseline_ms,
        }
    }

    /// Recomputes `progress` from the clock without advancing.
    pub fn sync_progress(&mut self, now: Instant) {
        if self.is_running() {
            self.progress = self.progress_at(now);
        }
    }

    fn progress_at(&self, now: Instant) -> f64 {
        percent_of(self.elapsed_ms(now), self.duration_ms)
    }

    pub fn play(&mut self, now: Instant) {
        self.playing = true;
        self.paused = false;
        self.refresh_anchor(now);
    }

    pub fn pause(&mut self, now: Instant) {
        self.paused = true;
        self.refresh_anchor(now);
    }

    /// A hold pauses like `pause()`; releasing resumes only if playback had
    /// been started, keeping the elapsed time of the current story.
    pub fn set_holding(&mut self, holding: bool, now: Instant) {
        self.holding = holding;
        if holding {
            self.pause(now);
        } else if self.playing {
            self.play(now);
        } else {
            self.refresh_anchor(now);
        }
    }

    pub fn reset(&mut self) {
        self.current_index = 0;
        self.progress = 0.0;
        self.playing = false;
        self.paused = false;
        self.elapsed_baseline_ms = 0;
        self.running_anchor = None;
        self.end_signalled = false;
    }

    pub fn set_duration(&mut self, duration_ms: u64, now: Instant) {
        self.duration_ms = duration_ms;
        self.sync_progress(now);
    }

    pub fn go_to_next(&mut self, now: Instant) -> Navigation {
        if self.current_index + 1 < self.len {
            self.set_index(self.current_index + 1, now);
            Navigation::Moved(self.current_index)
        } else {
            Navigation::Ended
        }
    }

    pub fn go_to_previous(&mut self, now: Instant) -> Navigation {
        if self.current_index > 0 && self.len > 0 {
            self.set_index(self.current_index - 1, now);
            Navigation::Moved(self.current_index)
        } else {
            Navigation::Unchanged
        }
    }

    /// Out-of-range targets are ignored.
    pub fn go_to_index(&mut self, index: usize, now: Instant) -> Navigation {
        if index < self.len {
            self.set_index(index, now);
            Navigation::Moved(index)
        } else {
            Navigation::Unchanged
        }
    }

    /// Applies a new sequence length, clamping the index into bounds.
    /// Returns true when the clamp moved the index.
    pub fn set_len(&mut self, len: usize, now: Instant) -> bool {
        self.len = len;
        let mut moved = false;
        if len > 0 && self.current_index > len - 1 {
            self.set_index(len - 1, now);
            moved = true;
        }
        self.refresh_anchor(now);
        moved
    }

    pub fn tick(&mut self, now: Instant) -> Tick {
        if !self.is_running() {
            return Tick::Inactive;
        }

        self.progress = self.progress_at(now);
        if self.elapsed_ms(now) < self.duration_ms {
            return Tick::Progress(self.progress);
        }

        if self.end_signalled {
            return Tick::Progress(self.progress);
        }

        match self.go_to_next(now) {
            Navigation::Moved(index) => Tick::Advanced(index),
            _ => {
                self.end_signalled = true;
                Tick::Ended
            }
        }
    }

    // Index-change side effects: progress restarts and the timing window is
    // rebased to `now` if the clock is running.
    fn set_index(&mut self, index: usize, now: Instant) {
        self.current_index = index;
        self.progress = 0.0;
        self.elapsed_baseline_ms = 0;
        self.end_signalled = false;
        self.running_anchor = self.is_running().then_some(now);
    }

    // Keeps the anchor present exactly while the clock runs, folding any
    // finished window into the baseline.
    fn refresh_anchor(&mut self, now: Instant) {
        match (self.is_running(), self.running_anchor) {
            (true, None) => self.running_anchor = Some(now),
            (false, Some(anchor)) => {
                self.elapsed_baseline_ms = self
                    .elapsed_baseline_ms
                    .saturating_add(now.saturating_duration_since(anchor).as_millis() as u64);
                self.progress = percent_of(self.elapsed_baseline_ms, self.duration_ms);
                self.running_anchor = None;
            }
            _ => {}
        }
    }
}

fn percent_of(elapsed_ms: u64, duration_ms: u64) -> f64 {
    (elapsed_ms as f64 * 100.0 / duration_ms.max(1) as f64).min(100.0)
}

/// Clamps a persisted index into `[0, len - 1]`; `None` for an empty sequence.
pub fn clamp_index(raw: i64, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let max = (len - 1) as i64;
    Some(raw.clamp(0, max) as usize)
}
