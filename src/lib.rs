//! A thin native macOS shell around a music streaming web player.
//!
//! The webview owns the page; the shell adds the chrome around it:
//! relocated window buttons, back/forward controls, global playback
//! shortcuts, hardware media keys, and the system now-playing surface.
//! The pure modules hold all decision logic; `platform` is the only
//! AppKit/WebKit-facing code.

pub mod chrome;
pub mod config;
pub mod events;
pub mod hotkeys;
pub mod inject;
pub mod media;
pub mod navigation;
pub mod options;
mod platform;
pub mod rules;
pub mod shell;

pub use config::Preferences;
pub use options::ShellOptions;

/// Create the shell window and run until it closes.
/// Must be called from the process's main thread.
#[cfg(target_os = "macos")]
pub fn run(prefs: Preferences) -> anyhow::Result<()> {
    platform::macos::run(prefs)
}

#[cfg(not(target_os = "macos"))]
pub fn run(_prefs: Preferences) -> anyhow::Result<()> {
    anyhow::bail!("unsupported platform; the shell requires macOS")
}
