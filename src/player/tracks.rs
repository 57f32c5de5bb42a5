// src/player/tracks.rs
//
// Track selection
//
// Remembered tracks are stored as format identifiers. A group matches when
// its type matches and its first format carries that identifier.

use serde::{Deserialize, Serialize};

use super::engine::{PlaybackEngine, TrackGroup, TrackType};
use crate::domain::TrackKind;
use crate::error::AppResult;

/// One entry of the track selector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackOption {
    pub format_id: String,
    pub name: String,
    pub is_selected: bool,
    pub is_supported: bool,
}

pub fn track_type_for(kind: TrackKind) -> TrackType {
    match kind {
        TrackKind::Audio => TrackType::Audio,
        TrackKind::Subtitle => TrackType::Text,
    }
}

/// The group of `track_type` whose first format is `format_id`
pub fn find_group<'a>(
    groups: &'a [TrackGroup],
    track_type: TrackType,
    format_id: &str,
) -> Option<&'a TrackGroup> {
    groups.iter().find(|group| {
        group.track_type == track_type
            && group.first_format().map(|f| f.id.as_str()) == Some(format_id)
    })
}

/// Whether switching to `format_id` needs an override: it exists, is playable and is not active
pub fn needs_override(groups: &[TrackGroup], track_type: TrackType, format_id: &str) -> bool {
    find_group(groups, track_type, format_id)
        .map(|group| group.is_supported && !group.is_selected)
        .unwrap_or(false)
}

/// Switch the engine to a remembered track if it is available and not already active.
/// Returns whether an override was issued.
pub fn switch_track(
    engine: &dyn PlaybackEngine,
    groups: &[TrackGroup],
    track_type: TrackType,
    format_id: &str,
) -> AppResult<bool> {
    if !needs_override(groups, track_type, format_id) {
        return Ok(false);
    }
    engine.override_track(track_type, format_id)?;
    log::debug!("switched {:?} track to {}", track_type, format_id);
    Ok(true)
}

/// Re-apply the remembered audio and subtitle tracks of the current item
pub fn reapply_remembered_tracks(
    engine: &dyn PlaybackEngine,
    audio_track_id: Option<&str>,
    subtitle_track_id: Option<&str>,
) -> AppResult<()> {
    if audio_track_id.is_none() && subtitle_track_id.is_none() {
        return Ok(());
    }

    let groups = engine.track_groups();
    if let Some(id) = audio_track_id {
        switch_track(engine, &groups, TrackType::Audio, id)?;
    }
    if let Some(id) = subtitle_track_id {
        switch_track(engine, &groups, TrackType::Text, id)?;
    }
    Ok(())
}

/// Selector entries for one track type, in engine order
pub fn track_options(groups: &[TrackGroup], track_type: TrackType) -> Vec<TrackOption> {
    groups
        .iter()
        .filter(|group| group.track_type == track_type)
        .filter_map(|group| {
            let format = group.first_format()?;
            let name = format
                .label
                .clone()
                .or_else(|| format.language.clone())
                .unwrap_or_else(|| format!("Track {}", format.id));
            Some(TrackOption {
                format_id: format.id.clone(),
                name,
                is_selected: group.is_selected,
                is_supported: group.is_supported,
            })
        })
        .collect()
}
