//! Media command bridge.
//!
//! Two independent channels feed the same three commands: the OS media-key
//! tap and the page's script-message channel. The bridge never owns
//! playback truth; commands are relayed into the page by evaluating a
//! script against its player controls, and the page's self-reported state
//! is relayed outward to the system now-playing surface.

use log::debug;
use serde::Deserialize;

use crate::hotkeys::PlaybackAction;

/// Maximum accepted script-message size. Larger payloads are dropped
/// before parsing to keep a misbehaving page from exhausting memory.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

// IOKit media-key codes carried in system-defined NSEvents (data1 >> 16).
pub const MEDIA_KEY_PLAY: u32 = 16;
pub const MEDIA_KEY_NEXT: u32 = 17;
pub const MEDIA_KEY_PREVIOUS: u32 = 18;
pub const MEDIA_KEY_FAST: u32 = 19;
pub const MEDIA_KEY_REWIND: u32 = 20;

/// A playback command, regardless of which channel produced it.
pub type MediaCommand = PlaybackAction;

/// Map a hardware media-key code to a command. Non-playback keys
/// (brightness, volume, eject) fall through as `None`.
pub fn media_key_command(key_code: u32) -> Option<MediaCommand> {
    match key_code {
        MEDIA_KEY_PLAY => Some(PlaybackAction::PlayPause),
        MEDIA_KEY_NEXT | MEDIA_KEY_FAST => Some(PlaybackAction::Next),
        MEDIA_KEY_PREVIOUS | MEDIA_KEY_REWIND => Some(PlaybackAction::Previous),
        _ => None,
    }
}

/// Script evaluated against the page for each command. The selectors match
/// the player bar controls the injected script also relies on.
pub fn command_script(command: MediaCommand) -> &'static str {
    match command {
        PlaybackAction::PlayPause => {
            "document.querySelector('#play-pause-button, .play-pause-button').click();"
        }
        PlaybackAction::Next => {
            "document.querySelector('.next-button, [aria-label=\"Next\"]').click();"
        }
        PlaybackAction::Previous => {
            "document.querySelector('.previous-button, [aria-label=\"Previous\"]').click();"
        }
    }
}

/// Structured message the injected page script posts whenever its playback
/// state changes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlaybackUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    #[serde(default)]
    pub playing: bool,
    pub elapsed: Option<f64>,
    pub duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PageMessage {
    Playback(PlaybackUpdate),
}

impl PlaybackUpdate {
    /// Parse a raw script-message body. Oversized, malformed, or
    /// unrecognized payloads are ignored; the page is not trusted to
    /// always post well-formed messages.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() > MAX_MESSAGE_SIZE {
            debug!("dropping oversized page message ({} bytes)", raw.len());
            return None;
        }
        match serde_json::from_str::<PageMessage>(raw) {
            Ok(PageMessage::Playback(update)) => Some(update),
            Err(err) => {
                debug!("ignoring unrecognized page message: {err}");
                None
            }
        }
    }
}

/// Shared now-playing state, kept in sync from the page's messages and
/// mirrored out to the system now-playing surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NowPlaying {
    pub track: PlaybackUpdate,
}

impl NowPlaying {
    /// Apply an update. Returns `true` when anything changed, so callers
    /// can skip redundant pushes to the now-playing surface.
    pub fn apply(&mut self, update: PlaybackUpdate) -> bool {
        if self.track == update {
            return false;
        }
        self.track = update;
        true
    }
}

/// Whether the media-key tap is delivering events. Starting the tap is
/// explicit and may be denied by the OS; denial leaves the tap inactive
/// and everything else working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TapState {
    #[default]
    Inactive,
    Active,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_keys_map_to_commands() {
        assert_eq!(
            media_key_command(MEDIA_KEY_PLAY),
            Some(PlaybackAction::PlayPause)
        );
        assert_eq!(media_key_command(MEDIA_KEY_FAST), Some(PlaybackAction::Next));
        assert_eq!(
            media_key_command(MEDIA_KEY_REWIND),
            Some(PlaybackAction::Previous)
        );
        // Volume-up is 0; not a playback key.
        assert_eq!(media_key_command(0), None);
    }

    #[test]
    fn every_command_has_a_script() {
        for action in PlaybackAction::ALL {
            assert!(command_script(action).contains("click()"));
        }
    }

    #[test]
    fn parses_a_playback_message() {
        let update = PlaybackUpdate::parse(
            r#"{"type":"playback","title":"Song","artist":"Band","playing":true,"elapsed":12.5,"duration":240.0}"#,
        )
        .unwrap();
        assert_eq!(update.title.as_deref(), Some("Song"));
        assert!(update.playing);
        assert_eq!(update.duration, Some(240.0));
    }

    #[test]
    fn malformed_and_unknown_messages_are_ignored() {
        assert!(PlaybackUpdate::parse("not json").is_none());
        assert!(PlaybackUpdate::parse(r#"{"type":"telemetry"}"#).is_none());
        assert!(PlaybackUpdate::parse(&"x".repeat(MAX_MESSAGE_SIZE + 1)).is_none());
    }

    #[test]
    fn now_playing_reports_changes_once() {
        let mut now = NowPlaying::default();
        let update = PlaybackUpdate {
            title: Some("Song".to_string()),
            playing: true,
            ..PlaybackUpdate::default()
        };
        assert!(now.apply(update.clone()));
        assert!(!now.apply(update));
    }
}
