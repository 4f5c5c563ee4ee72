//! Process-scoped shell state.
//!
//! Everything lives on the AppKit main thread in thread_local storage.
//! Delegate callbacks that fire while the state is mutably borrowed defer
//! their work into the pending buffers, and callbacks that need the webview
//! while the UI is unavailable enqueue a command; the run-loop pump flushes
//! both on the next tick.

use std::cell::RefCell;

use log::warn;

use crate::events::ShellHandlers;
use crate::hotkeys::{HotkeyRegistry, ShortcutSpecs};
use crate::media::{MediaCommand, NowPlaying, PlaybackUpdate, TapState};
use crate::navigation::{NavButtons, NavKind};
use crate::options::ShellOptions;

/// Commands queued by callbacks for execution on the next pump tick.
#[derive(Debug, Clone)]
pub enum Command {
    /// Relay a playback command into the page's player controls.
    Playback(MediaCommand),
    /// Traverse the page's history.
    Navigate(NavKind),
    /// Evaluate a script against the page.
    EvaluateScript(String),
}

/// State owned by the single shell window.
pub struct Shell {
    pub options: ShellOptions,
    pub nav: NavButtons,
    pub hotkeys: HotkeyRegistry,
    pub now_playing: NowPlaying,
    pub tap: TapState,
    pub handlers: ShellHandlers,
}

impl Shell {
    fn new() -> Self {
        Self {
            options: ShellOptions::default(),
            nav: NavButtons::new(),
            hotkeys: HotkeyRegistry::new(),
            now_playing: NowPlaying::default(),
            tap: TapState::Inactive,
            handlers: ShellHandlers::new(),
        }
    }
}

/// Commands are still accepted past this point, with a warning; dropping
/// them would lose user input.
const MAX_COMMAND_QUEUE: usize = 1_024;

thread_local! {
    static SHELL: RefCell<Shell> = RefCell::new(Shell::new());
    /// Queued commands. Stored outside SHELL so callbacks can enqueue while
    /// SHELL is mutably borrowed.
    static COMMAND_QUEUE: RefCell<Vec<Command>> = RefCell::new(Vec::new());
    /// Navigation-availability changes deferred while SHELL was borrowed.
    pub static PENDING_NAV_CHANGES: RefCell<Vec<(NavKind, bool)>> = RefCell::new(Vec::new());
    /// Playback updates deferred while SHELL was borrowed.
    pub static PENDING_UPDATES: RefCell<Vec<PlaybackUpdate>> = RefCell::new(Vec::new());
}

/// Execute a closure with mutable access to the shell state.
pub fn with_shell<F, R>(f: F) -> R
where
    F: FnOnce(&mut Shell) -> R,
{
    SHELL.with(|s| f(&mut s.borrow_mut()))
}

/// Non-blocking variant for delegate callbacks: returns `None` when SHELL
/// is already borrowed, so the caller can defer instead.
pub fn try_with_shell<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut Shell) -> R,
{
    SHELL.with(|s| match s.try_borrow_mut() {
        Ok(mut shell) => Some(f(&mut shell)),
        Err(_) => None,
    })
}

/// Install the options and build the initial shortcut bindings.
pub fn init(options: ShellOptions, shortcuts: &ShortcutSpecs) {
    with_shell(|shell| {
        shell.options = options;
        shell.hotkeys.initialize(shortcuts);
    });
}

pub fn enqueue(cmd: Command) {
    COMMAND_QUEUE.with(|q| {
        let mut queue = q.borrow_mut();
        if queue.len() >= MAX_COMMAND_QUEUE {
            warn!(
                "command queue has {} entries; the run-loop pump is not draining",
                queue.len()
            );
        }
        queue.push(cmd);
    });
}

pub fn drain_commands() -> Vec<Command> {
    COMMAND_QUEUE.with(|q| std::mem::take(&mut *q.borrow_mut()))
}

/// Host of a page URL, lowercased. `None` for URLs without a host
/// (about:blank, data URLs), which never match the injection gate.
pub fn page_host(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    parsed.host_str().map(|host| host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_host_lowercases_and_strips_the_rest() {
        assert_eq!(
            page_host("https://Music.YouTube.com/watch?v=x").as_deref(),
            Some("music.youtube.com")
        );
        assert_eq!(
            page_host("https://user:pw@music.youtube.com:8443/a").as_deref(),
            Some("music.youtube.com")
        );
    }

    #[test]
    fn hostless_urls_have_no_host() {
        assert_eq!(page_host("about:blank"), None);
        assert_eq!(page_host("data:text/html,hi"), None);
        assert_eq!(page_host("not a url"), None);
    }

    #[test]
    fn commands_drain_in_order() {
        enqueue(Command::Playback(MediaCommand::PlayPause));
        enqueue(Command::Navigate(NavKind::Back));
        let drained = drain_commands();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], Command::Playback(_)));
        assert!(matches!(drained[1], Command::Navigate(NavKind::Back)));
        assert!(drain_commands().is_empty());
    }

    #[test]
    fn enqueue_works_while_the_shell_is_borrowed() {
        with_shell(|_shell| {
            enqueue(Command::EvaluateScript("1 + 1".to_string()));
            assert!(try_with_shell(|_| ()).is_none());
        });
        assert_eq!(drain_commands().len(), 1);
    }

    #[test]
    fn init_builds_the_default_bindings() {
        init(ShellOptions::default(), &ShortcutSpecs::default());
        with_shell(|shell| {
            assert_eq!(shell.hotkeys.len(), 3);
            assert_eq!(shell.options.expected_host, "music.youtube.com");
        });
    }
}
