//! Callback seams between the platform layer and the shell logic.
//!
//! Every asynchronous source (page loads, navigation-state changes, page
//! messages, playback commands, script evaluations) surfaces through one of
//! these handlers. There is no ordering guarantee between independent
//! sources; each handler is invoked once per event, on the main thread.

use crate::media::{MediaCommand, PlaybackUpdate};
use crate::navigation::NavKind;

/// Outcome of one script evaluation against the page: the result's textual
/// description when evaluation produced one, or the error's description.
/// Evaluation errors are logged and never block anything else.
pub type ScriptOutcome = Result<Option<String>, String>;

/// Callback for script-evaluation outcomes.
pub type ScriptCallback = Box<dyn Fn(ScriptOutcome)>;

/// Callback for completed page loads: (url, host of the loaded page).
pub type PageLoadCallback = Box<dyn Fn(&str, Option<&str>)>;

/// Callback for back/forward-availability changes.
pub type NavChangeCallback = Box<dyn Fn(NavKind, bool)>;

/// Callback for playback updates posted by the page.
pub type PlaybackUpdateCallback = Box<dyn Fn(&PlaybackUpdate)>;

/// Callback for playback commands relayed into the page.
pub type CommandCallback = Box<dyn Fn(MediaCommand)>;

/// Stored event handlers for the shell. All optional; an unset handler
/// drops its event.
pub struct ShellHandlers {
    pub on_page_load: Option<PageLoadCallback>,
    pub on_navigation_change: Option<NavChangeCallback>,
    pub on_playback_update: Option<PlaybackUpdateCallback>,
    pub on_command: Option<CommandCallback>,
    pub on_script_result: Option<ScriptCallback>,
}

impl ShellHandlers {
    pub fn new() -> Self {
        Self {
            on_page_load: None,
            on_navigation_change: None,
            on_playback_update: None,
            on_command: None,
            on_script_result: None,
        }
    }
}

impl Default for ShellHandlers {
    fn default() -> Self {
        Self::new()
    }
}
