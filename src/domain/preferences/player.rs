use serde::{Deserialize, Serialize};

/// Playback preferences (singleton record)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerPreferences {
    pub save_brightness_level: bool,
    pub save_playback_speed: bool,
    pub brightness_level: u32,
    pub resume: Resume,
    /// Playback speed in percent (100 = normal)
    pub playback_speed: u32,
    pub fast_seeking: bool,
    pub aspect_ratio: AspectRatio,
}

impl Default for PlayerPreferences {
    fn default() -> Self {
        Self {
            save_brightness_level: true,
            save_playback_speed: false,
            brightness_level: 15,
            resume: Resume::Always,
            playback_speed: 100,
            fast_seeking: true,
            aspect_ratio: AspectRatio::FitScreen,
        }
    }
}

impl PlayerPreferences {
    pub fn playback_speed_factor(&self) -> f32 {
        self.playback_speed as f32 / 100.0
    }
}

/// What to do with a saved resume point when playback starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resume {
    Always,
    Never,
    Ask,
}

impl Resume {
    pub fn title(&self) -> &'static str {
        match self {
            Resume::Always => "Always",
            Resume::Never => "Never",
            Resume::Ask => "Ask at startup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    FitScreen,
    Stretch,
    Crop,
    HundredPercent,
}

impl AspectRatio {
    pub fn title(&self) -> &'static str {
        match self {
            AspectRatio::FitScreen => "Fit to Screen",
            AspectRatio::Stretch => "Stretch",
            AspectRatio::Crop => "Crop",
            AspectRatio::HundredPercent => "100%",
        }
    }

    /// Mode selected by the aspect-ratio button after this one
    pub fn next(self) -> Self {
        match self {
            AspectRatio::FitScreen => AspectRatio::Stretch,
            AspectRatio::Stretch => AspectRatio::Crop,
            AspectRatio::Crop => AspectRatio::HundredPercent,
            AspectRatio::HundredPercent => AspectRatio::FitScreen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_cycles_back_to_start() {
        let mut ratio = AspectRatio::FitScreen;
        for _ in 0..4 {
            ratio = ratio.next();
        }
        assert_eq!(ratio, AspectRatio::FitScreen);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let prefs: PlayerPreferences = serde_json::from_str(r#"{"resume":"ask"}"#).unwrap();
        assert_eq!(prefs.resume, Resume::Ask);
        assert_eq!(prefs.brightness_level, 15);
        assert!(prefs.fast_seeking);
    }
}
