// src/player/gestures.rs
//
// Gesture-to-control mapping
//
// Horizontal drags seek, vertical drags step brightness (left half of the
// screen) or volume (right half). A drag accumulates a signed offset from a
// reference point; when the offset exceeds the threshold one step is applied
// and the reference moves to the current touch point.
//
// Pure state machines: nothing here talks to the engine.

/// Base seek step
pub const SEEK_STEP_MS: u64 = 1000;

/// Horizontal distance that triggers one seek step
pub const SEEK_THRESHOLD_DP: f32 = 8.0;

/// Vertical distance that triggers one level step
pub const LEVEL_THRESHOLD_DP: f32 = 16.0;

/// Upper bound of the seek speed factor
pub const MAX_SPEED_FACTOR: u64 = 10;

/// Screen metrics needed to interpret touch coordinates (pixels)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Pixels per dp
    pub density: f32,
    pub screen_width_px: f32,
}

impl GestureConfig {
    pub fn new(density: f32, screen_width_px: f32) -> Self {
        Self {
            density: if density > 0.0 { density } else { 1.0 },
            screen_width_px,
        }
    }

    pub fn dp_to_px(&self, dp: f32) -> f32 {
        dp * self.density
    }

    pub fn px_to_dp(&self, px: f32) -> f32 {
        px / self.density
    }

    /// Multiplier for the seek step, from how far the finger moved in one event
    pub fn speed_factor(&self, delta_px: f32) -> u64 {
        let factor = (self.px_to_dp(delta_px.abs()) / 4.0) as u64;
        factor.clamp(1, MAX_SPEED_FACTOR)
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self::new(1.0, 1080.0)
    }
}

// ============================================================================
// SEEK
// ============================================================================

/// An in-progress horizontal seek drag
#[derive(Debug, Clone, PartialEq)]
pub struct SeekDrag {
    reference_x: f32,
    last_x: f32,
    start_position_ms: u64,
    change_ms: i64,
    duration_ms: Option<u64>,
    resume_play_when_ready: bool,
}

impl SeekDrag {
    /// Start a seek drag at `x`. Remembers the play-when-ready flag to restore on end.
    pub fn begin(
        x: f32,
        position_ms: u64,
        duration_ms: Option<u64>,
        play_when_ready: bool,
    ) -> Self {
        Self {
            reference_x: x,
            last_x: x,
            start_position_ms: position_ms,
            change_ms: 0,
            duration_ms,
            resume_play_when_ready: play_when_ready,
        }
    }

    /// Feed a new touch position. Returns the position to seek to when a step was applied.
    pub fn update(&mut self, x: f32, config: &GestureConfig) -> Option<u64> {
        let delta_px = x - self.last_x;
        self.last_x = x;

        // Positive offset: the finger moved left, which seeks backward
        let offset = self.reference_x - x;
        if offset.abs() <= config.dp_to_px(SEEK_THRESHOLD_DP) {
            return None;
        }
        self.reference_x = x;

        let step = (SEEK_STEP_MS * config.speed_factor(delta_px)) as i64;
        let current = self.start_position_ms as i64 + self.change_ms;

        if offset > 0.0 {
            if current - step < 0 {
                return None;
            }
            self.change_ms -= step;
        } else {
            let allowed = match self.duration_ms {
                Some(duration) => current + step < duration as i64,
                None => true,
            };
            if !allowed {
                return None;
            }
            self.change_ms += step;
        }

        Some(self.position_ms())
    }

    /// Position the drag currently points at
    pub fn position_ms(&self) -> u64 {
        (self.start_position_ms as i64 + self.change_ms).max(0) as u64
    }

    /// Signed distance from where the drag started
    pub fn change_ms(&self) -> i64 {
        self.change_ms
    }

    /// Finish the drag; returns the play-when-ready flag to restore
    pub fn end(self) -> bool {
        self.resume_play_when_ready
    }
}

// ============================================================================
// BRIGHTNESS / VOLUME
// ============================================================================

/// Which level a vertical drag adjusts
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LevelBar {
    Brightness,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelStep {
    Increase,
    Decrease,
}

impl LevelStep {
    /// Apply the step to `level`, clamped to `[0, max]`
    pub fn apply(self, level: u32, max: u32) -> u32 {
        match self {
            LevelStep::Increase => level.saturating_add(1).min(max),
            LevelStep::Decrease => level.saturating_sub(1).min(max),
        }
    }
}

/// An in-progress vertical drag
#[derive(Debug, Clone, PartialEq)]
pub struct LevelDrag {
    bar: LevelBar,
    reference_y: f32,
}

impl LevelDrag {
    pub fn begin(x: f32, y: f32, config: &GestureConfig) -> Self {
        let bar = if x < config.screen_width_px / 2.0 {
            LevelBar::Brightness
        } else {
            LevelBar::Volume
        };
        Self { bar, reference_y: y }
    }

    pub fn bar(&self) -> LevelBar {
        self.bar
    }

    /// Feed a new touch position. Returns a step when the threshold was crossed.
    pub fn update(&mut self, y: f32, config: &GestureConfig) -> Option<LevelStep> {
        // Screen y grows downward, so a positive offset means the finger moved up
        let offset = self.reference_y - y;
        if offset.abs() <= config.dp_to_px(LEVEL_THRESHOLD_DP) {
            return None;
        }
        self.reference_y = y;

        Some(if offset > 0.0 {
            LevelStep::Increase
        } else {
            LevelStep::Decrease
        })
    }
}
