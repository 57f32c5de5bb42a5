// src/integrations/mpv/properties.rs
//
// mpv property parsing and change detection.
//
// The event pump polls a fixed set of properties into an `MpvSnapshot`;
// `diff` turns two consecutive snapshots into engine notifications.

use serde::Deserialize;
use serde_json::Value;

use crate::player::engine::{
    EngineEvent, Format, MediaItemTransitionReason, PlaybackState, PositionInfo, Timeline,
    TrackGroup, TrackType, VideoSize,
};

/// Properties read on every poll
pub const POLLED_PROPERTIES: &[&str] = &[
    "idle-active",
    "playlist-pos",
    "playlist-count",
    "time-pos",
    "duration",
    "pause",
    "paused-for-cache",
    "seeking",
    "eof-reached",
    "speed",
    "volume",
    "mute",
    "video-params",
    "track-list",
];

/// One entry of mpv's `track-list`
#[derive(Debug, Clone, Deserialize)]
struct MpvTrack {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    codec: Option<String>,
    #[serde(default)]
    selected: bool,
}

/// Parse `track-list` into one group per track. Unknown track types are skipped.
pub fn parse_track_list(value: &Value) -> Vec<TrackGroup> {
    let tracks: Vec<MpvTrack> = match serde_json::from_value(value.clone()) {
        Ok(tracks) => tracks,
        Err(e) => {
            log::debug!("unreadable track-list: {}", e);
            return Vec::new();
        }
    };

    tracks
        .into_iter()
        .filter_map(|track| {
            let track_type = match track.kind.as_str() {
                "video" => TrackType::Video,
                "audio" => TrackType::Audio,
                "sub" => TrackType::Text,
                _ => return None,
            };
            Some(TrackGroup {
                track_type,
                formats: vec![Format {
                    id: track.id.to_string(),
                    label: track.title,
                    language: track.lang,
                    codec: track.codec,
                }],
                is_selected: track.selected,
                is_supported: true,
            })
        })
        .collect()
}

/// Parse `video-params` (`w`, `h`, `rotate`)
pub fn parse_video_params(value: &Value) -> VideoSize {
    let field = |name: &str| value.get(name).and_then(Value::as_u64).unwrap_or(0) as u32;
    VideoSize {
        width: field("w"),
        height: field("h"),
        rotation_degrees: field("rotate"),
    }
}

fn seconds_to_ms(value: Option<&Value>) -> Option<u64> {
    value
        .and_then(Value::as_f64)
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(|s| (s * 1000.0).round() as u64)
}

/// Polled player state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MpvSnapshot {
    pub idle: bool,
    pub index: Option<usize>,
    pub item_count: usize,
    pub position_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub paused: bool,
    pub buffering: bool,
    pub eof: bool,
    pub speed: f32,
    pub volume: f32,
    pub muted: bool,
    pub video_size: VideoSize,
    pub groups: Vec<TrackGroup>,
}

impl MpvSnapshot {
    /// Build a snapshot from `(name, value)` pairs; missing values read as unavailable
    pub fn from_properties<'a, I>(properties: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<Value>)>,
    {
        let mut snapshot = MpvSnapshot {
            speed: 1.0,
            volume: 1.0,
            ..MpvSnapshot::default()
        };

        for (name, value) in properties {
            let value = value.as_ref();
            let flag = || value.and_then(Value::as_bool).unwrap_or(false);
            match name {
                "idle-active" => snapshot.idle = flag(),
                "playlist-pos" => {
                    snapshot.index = value
                        .and_then(Value::as_i64)
                        .filter(|i| *i >= 0)
                        .map(|i| i as usize)
                }
                "playlist-count" => {
                    snapshot.item_count = value.and_then(Value::as_u64).unwrap_or(0) as usize
                }
                "time-pos" => snapshot.position_ms = seconds_to_ms(value),
                "duration" => snapshot.duration_ms = seconds_to_ms(value),
                "pause" => snapshot.paused = flag(),
                "paused-for-cache" | "seeking" => snapshot.buffering |= flag(),
                "eof-reached" => snapshot.eof = flag(),
                "speed" => {
                    snapshot.speed = value.and_then(Value::as_f64).unwrap_or(1.0) as f32
                }
                "volume" => {
                    snapshot.volume =
                        (value.and_then(Value::as_f64).unwrap_or(100.0) / 100.0) as f32
                }
                "mute" => snapshot.muted = flag(),
                "video-params" => {
                    snapshot.video_size = value.map(parse_video_params).unwrap_or_default()
                }
                "track-list" => snapshot.groups = value.map(parse_track_list).unwrap_or_default(),
                _ => {}
            }
        }
        snapshot
    }

    pub fn playback_state(&self) -> PlaybackState {
        if self.idle || self.index.is_none() {
            PlaybackState::Idle
        } else if self.eof {
            PlaybackState::Ended
        } else if self.buffering || self.position_ms.is_none() {
            PlaybackState::Buffering
        } else {
            PlaybackState::Ready
        }
    }

    pub fn is_playing(&self) -> bool {
        !self.paused && self.playback_state() == PlaybackState::Ready
    }

    fn selected_format(&self, track_type: TrackType) -> Option<Format> {
        self.groups
            .iter()
            .find(|g| g.track_type == track_type && g.is_selected)
            .and_then(|g| g.first_format().cloned())
    }

    pub fn video_format(&self) -> Option<Format> {
        self.selected_format(TrackType::Video)
    }

    pub fn audio_format(&self) -> Option<Format> {
        self.selected_format(TrackType::Audio)
    }

    pub fn timeline(&self) -> Timeline {
        Timeline {
            item_count: self.item_count,
            duration_ms: self.duration_ms,
        }
    }
}

/// Notifications implied by moving from `previous` to `next`.
///
/// `requested_index` is the item a seek-to-item call asked for, which turns
/// the resulting transition into a `Seek` instead of an automatic advance.
pub fn diff(
    previous: &MpvSnapshot,
    next: &MpvSnapshot,
    requested_index: Option<usize>,
    first_frame_reported: bool,
) -> Vec<EngineEvent> {
    let mut events = Vec::new();

    if let (Some(old_index), Some(new_index)) = (previous.index, next.index) {
        if old_index != new_index {
            events.push(EngineEvent::PositionDiscontinuity {
                old: PositionInfo {
                    media_item_index: old_index,
                    position_ms: previous.position_ms.unwrap_or(0),
                },
                new: PositionInfo {
                    media_item_index: new_index,
                    position_ms: next.position_ms.unwrap_or(0),
                },
            });
            let reason = if requested_index == Some(new_index) {
                MediaItemTransitionReason::Seek
            } else {
                MediaItemTransitionReason::Auto
            };
            events.push(EngineEvent::MediaItemTransition {
                index: new_index,
                reason,
            });
        }
    } else if previous.index.is_none() {
        if let Some(new_index) = next.index {
            events.push(EngineEvent::MediaItemTransition {
                index: new_index,
                reason: MediaItemTransitionReason::PlaylistChanged,
            });
        }
    }

    // The timeline describes the current item, so it follows the transition
    if previous.timeline() != next.timeline() {
        events.push(EngineEvent::TimelineChanged(next.timeline()));
    }

    if previous.playback_state() != next.playback_state() {
        events.push(EngineEvent::PlaybackStateChanged(next.playback_state()));
    }
    if previous.buffering != next.buffering {
        events.push(EngineEvent::IsLoadingChanged(next.buffering));
    }
    if previous.paused != next.paused {
        events.push(EngineEvent::PlayWhenReadyChanged(!next.paused));
    }
    if previous.is_playing() != next.is_playing() {
        events.push(EngineEvent::IsPlayingChanged(next.is_playing()));
    }
    if previous.groups != next.groups {
        events.push(EngineEvent::TracksChanged(next.groups.clone()));
    }
    if previous.video_format() != next.video_format() {
        events.push(EngineEvent::VideoFormatChanged(next.video_format()));
    }
    if previous.audio_format() != next.audio_format() {
        events.push(EngineEvent::AudioFormatChanged(next.audio_format()));
    }
    if previous.video_size != next.video_size {
        events.push(EngineEvent::VideoSizeChanged(next.video_size));
    }
    if (previous.speed - next.speed).abs() > f32::EPSILON {
        events.push(EngineEvent::PlaybackSpeedChanged(next.speed));
    }
    if (previous.volume - next.volume).abs() > f32::EPSILON {
        events.push(EngineEvent::VolumeChanged(next.volume));
    }
    if !first_frame_reported && next.position_ms.is_some() && next.index.is_some() && !next.idle {
        events.push(EngineEvent::RenderedFirstFrame);
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn playing(index: usize, position_ms: u64) -> MpvSnapshot {
        MpvSnapshot {
            index: Some(index),
            item_count: 3,
            position_ms: Some(position_ms),
            duration_ms: Some(600_000),
            speed: 1.0,
            volume: 1.0,
            ..MpvSnapshot::default()
        }
    }

    #[test]
    fn test_parse_track_list() {
        let value = json!([
            {"id": 1, "type": "video", "codec": "h264", "selected": true},
            {"id": 1, "type": "audio", "lang": "jpn", "title": "Stereo", "selected": true},
            {"id": 2, "type": "audio", "lang": "eng", "selected": false},
            {"id": 1, "type": "sub", "lang": "eng"},
            {"id": 9, "type": "attachment"}
        ]);

        let groups = parse_track_list(&value);

        assert_eq!(groups.len(), 4);
        assert_eq!(groups[1].track_type, TrackType::Audio);
        assert_eq!(groups[1].formats[0].label.as_deref(), Some("Stereo"));
        assert!(groups[1].is_selected);
        assert_eq!(groups[2].formats[0].id, "2");
        assert_eq!(groups[3].track_type, TrackType::Text);
        assert!(!groups[3].is_selected);
    }

    #[test]
    fn test_garbage_track_list_is_empty() {
        assert!(parse_track_list(&json!({"not": "a list"})).is_empty());
    }

    #[test]
    fn test_snapshot_from_properties() {
        let snapshot = MpvSnapshot::from_properties(vec![
            ("playlist-pos", Some(json!(1))),
            ("playlist-count", Some(json!(4))),
            ("time-pos", Some(json!(12.5))),
            ("duration", Some(json!(90.0))),
            ("pause", Some(json!(false))),
            ("volume", Some(json!(50.0))),
            ("video-params", Some(json!({"w": 1920, "h": 1080, "rotate": 90}))),
            ("paused-for-cache", None),
        ]);

        assert_eq!(snapshot.index, Some(1));
        assert_eq!(snapshot.position_ms, Some(12_500));
        assert_eq!(snapshot.duration_ms, Some(90_000));
        assert!((snapshot.volume - 0.5).abs() < f32::EPSILON);
        assert_eq!(snapshot.video_size.rotation_degrees, 90);
        assert_eq!(snapshot.playback_state(), PlaybackState::Ready);
        assert!(snapshot.is_playing());
    }

    #[test]
    fn test_negative_playlist_pos_means_nothing_loaded() {
        let snapshot = MpvSnapshot::from_properties(vec![("playlist-pos", Some(json!(-1)))]);
        assert_eq!(snapshot.index, None);
        assert_eq!(snapshot.playback_state(), PlaybackState::Idle);
    }

    #[test]
    fn test_automatic_advance() {
        let events = diff(&playing(0, 599_000), &playing(1, 0), None, true);

        assert!(events.contains(&EngineEvent::PositionDiscontinuity {
            old: PositionInfo {
                media_item_index: 0,
                position_ms: 599_000
            },
            new: PositionInfo {
                media_item_index: 1,
                position_ms: 0
            },
        }));
        assert!(events.contains(&EngineEvent::MediaItemTransition {
            index: 1,
            reason: MediaItemTransitionReason::Auto
        }));
    }

    #[test]
    fn test_requested_item_change_is_a_seek() {
        let events = diff(&playing(0, 5_000), &playing(2, 0), Some(2), true);
        assert!(events.contains(&EngineEvent::MediaItemTransition {
            index: 2,
            reason: MediaItemTransitionReason::Seek
        }));
    }

    #[test]
    fn test_discontinuity_comes_before_transition() {
        let events = diff(&playing(0, 5_000), &playing(1, 0), None, true);
        let discontinuity = events
            .iter()
            .position(|e| matches!(e, EngineEvent::PositionDiscontinuity { .. }))
            .unwrap();
        let transition = events
            .iter()
            .position(|e| matches!(e, EngineEvent::MediaItemTransition { .. }))
            .unwrap();
        assert!(discontinuity < transition);
    }

    #[test]
    fn test_new_item_duration_follows_the_transition() {
        let mut next = playing(1, 0);
        next.duration_ms = Some(90_000);

        let events = diff(&playing(0, 5_000), &next, None, true);

        let transition = events
            .iter()
            .position(|e| matches!(e, EngineEvent::MediaItemTransition { .. }))
            .unwrap();
        let timeline = events
            .iter()
            .position(|e| matches!(e, EngineEvent::TimelineChanged(_)))
            .unwrap();
        assert!(transition < timeline);
    }

    #[test]
    fn test_pause_and_first_frame() {
        let mut paused = playing(0, 1_000);
        paused.paused = true;

        let events = diff(&playing(0, 1_000), &paused, None, false);

        assert!(events.contains(&EngineEvent::PlayWhenReadyChanged(false)));
        assert!(events.contains(&EngineEvent::IsPlayingChanged(false)));
        assert!(events.contains(&EngineEvent::RenderedFirstFrame));
    }

    #[test]
    fn test_identical_snapshots_produce_nothing() {
        assert!(diff(&playing(0, 1_000), &playing(0, 1_000), None, true).is_empty());
    }
}
