//! Preferences file handling.
//!
//! Preferences live in a small TOML file probed from a few candidate
//! locations. A missing file means defaults; a present file is also watched,
//! and every content change invokes the registered callback so the shortcut
//! bindings can be rebuilt.

use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::Context;
use log::warn;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;

use crate::hotkeys::ShortcutSpecs;
use crate::options::ShellOptions;

/// Resolved preferences, with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    /// Overrides the default start URL when set.
    pub start_url: Option<String>,
    /// Attach the service-worker block rule before the first navigation.
    pub block_service_worker: bool,
    /// Shortcut combo specs per playback action.
    pub shortcuts: ShortcutSpecs,
    /// File the preferences were read from, if any. Watched for changes.
    pub source: Option<PathBuf>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            start_url: None,
            block_service_worker: true,
            shortcuts: ShortcutSpecs::default(),
            source: None,
        }
    }
}

impl Preferences {
    /// Probe the candidate locations and load the first file that exists.
    /// No file at all is not an error; defaults apply.
    pub fn load() -> anyhow::Result<Self> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = env::current_dir() {
            candidates.push(current_dir.join("music-shell.toml"));
            candidates.push(current_dir.join("config").join("music-shell.toml"));
        }

        if let Ok(exe) = env::current_exe() {
            if let Some(dir) = exe.parent() {
                candidates.push(dir.join("music-shell.toml"));
            }
        }

        for path in candidates {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read preferences: {}", path.display()))?;
        let doc: PreferencesDocument = toml::from_str(&data)
            .with_context(|| format!("failed to parse preferences: {}", path.display()))?;
        Ok(doc.into_preferences(path))
    }

    /// Window and page options derived from these preferences.
    pub fn shell_options(&self) -> ShellOptions {
        let mut options = ShellOptions::default();
        if let Some(url) = &self.start_url {
            options.start_url = url.clone();
        }
        options.block_service_worker = self.block_service_worker;
        options
    }
}

#[derive(Debug, Default, Deserialize)]
struct PreferencesDocument {
    start_url: Option<String>,
    block_service_worker: Option<bool>,
    #[serde(default)]
    shortcuts: ShortcutsSection,
}

#[derive(Debug, Default, Deserialize)]
struct ShortcutsSection {
    play_pause: Option<String>,
    next: Option<String>,
    previous: Option<String>,
}

impl PreferencesDocument {
    fn into_preferences(self, source: &Path) -> Preferences {
        let defaults = ShortcutSpecs::default();
        Preferences {
            start_url: self.start_url,
            block_service_worker: self.block_service_worker.unwrap_or(true),
            shortcuts: ShortcutSpecs {
                play_pause: self.shortcuts.play_pause.unwrap_or(defaults.play_pause),
                next: self.shortcuts.next.unwrap_or(defaults.next),
                previous: self.shortcuts.previous.unwrap_or(defaults.previous),
            },
            source: Some(source.to_path_buf()),
        }
    }
}

/// Watches the preferences file and invokes the registered callback on
/// every content change. The callback runs on the watcher's own thread;
/// forward it to the main thread before touching any shell state.
pub struct PreferenceWatcher {
    _watcher: RecommendedWatcher,
}

impl PreferenceWatcher {
    pub fn watch<F>(path: &Path, on_change: F) -> anyhow::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        // Watch the parent directory: editors replace files by rename, which
        // would silently drop a watch on the file itself.
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        let file_name = path.file_name().map(|n| n.to_os_string());

        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    let relevant = matches!(
                        event.kind,
                        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                    ) && event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant {
                        on_change();
                    }
                }
                Err(err) => warn!("preference watcher error: {err}"),
            })
            .context("failed to create preference watcher")?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", directory.display()))?;

        Ok(Self { _watcher: watcher })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn defaults_apply_without_a_file() {
        let prefs = Preferences::default();
        assert!(prefs.block_service_worker);
        assert_eq!(prefs.shortcuts, ShortcutSpecs::default());
        assert!(prefs.start_url.is_none());
        assert!(prefs.source.is_none());
    }

    #[test]
    fn parses_a_full_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("music-shell.toml");
        fs::write(
            &path,
            r#"
start_url = "https://music.youtube.com/library"
block_service_worker = false

[shortcuts]
play_pause = "cmd+p"
next = "shift+cmd+right"
previous = "shift+cmd+left"
"#,
        )
        .unwrap();

        let prefs = Preferences::load_from(&path).unwrap();
        assert_eq!(
            prefs.start_url.as_deref(),
            Some("https://music.youtube.com/library")
        );
        assert!(!prefs.block_service_worker);
        assert_eq!(prefs.shortcuts.play_pause, "cmd+p");
        assert_eq!(prefs.source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn partial_documents_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("music-shell.toml");
        fs::write(&path, "[shortcuts]\nnext = \"cmd+n\"\n").unwrap();

        let prefs = Preferences::load_from(&path).unwrap();
        assert!(prefs.block_service_worker);
        assert_eq!(prefs.shortcuts.next, "cmd+n");
        assert_eq!(
            prefs.shortcuts.play_pause,
            ShortcutSpecs::default().play_pause
        );
    }

    #[test]
    fn malformed_documents_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("music-shell.toml");
        fs::write(&path, "start_url = [not toml").unwrap();
        assert!(Preferences::load_from(&path).is_err());
    }

    #[test]
    fn shell_options_carry_the_overrides() {
        let prefs = Preferences {
            start_url: Some("https://music.youtube.com/explore".to_string()),
            block_service_worker: false,
            ..Preferences::default()
        };
        let options = prefs.shell_options();
        assert_eq!(options.start_url, "https://music.youtube.com/explore");
        assert!(!options.block_service_worker);

        let defaults = Preferences::default().shell_options();
        assert_eq!(defaults.start_url, ShellOptions::default().start_url);
    }

    #[test]
    fn watcher_reports_content_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("music-shell.toml");
        fs::write(&path, "block_service_worker = true\n").unwrap();

        let (tx, rx) = mpsc::channel();
        let _watcher = PreferenceWatcher::watch(&path, move || {
            let _ = tx.send(());
        })
        .unwrap();

        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "start_url = \"https://music.youtube.com\"").unwrap();
        file.sync_all().unwrap();

        assert!(rx.recv_timeout(Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn watcher_ignores_sibling_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("music-shell.toml");
        fs::write(&path, "block_service_worker = true\n").unwrap();

        let (tx, rx) = mpsc::channel();
        let _watcher = PreferenceWatcher::watch(&path, move || {
            let _ = tx.send(());
        })
        .unwrap();

        fs::write(dir.path().join("other.toml"), "x = 1\n").unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());
    }
}
