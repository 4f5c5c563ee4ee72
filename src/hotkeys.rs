//! Global keyboard shortcuts for playback control.
//!
//! The registry owns the full set of bindings and replaces it wholesale on
//! every rebuild. Matching works on raw macOS virtual key codes and
//! modifier-flag bits so the platform layer can feed `NSEvent` fields
//! straight in; the same representation keeps the logic testable off-macOS.

use std::collections::HashMap;

use log::warn;

// NSEvent modifier-flag bits (device independent).
pub const FLAG_SHIFT: usize = 1 << 17;
pub const FLAG_CONTROL: usize = 1 << 18;
pub const FLAG_OPTION: usize = 1 << 19;
pub const FLAG_COMMAND: usize = 1 << 20;

const FLAG_ALL: usize = FLAG_SHIFT | FLAG_CONTROL | FLAG_OPTION | FLAG_COMMAND;

/// Logical playback actions a shortcut can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackAction {
    PlayPause,
    Next,
    Previous,
}

impl PlaybackAction {
    pub const ALL: [PlaybackAction; 3] = [
        PlaybackAction::PlayPause,
        PlaybackAction::Next,
        PlaybackAction::Previous,
    ];

    /// Stable identifier, unique per action, used to key installed bindings.
    pub fn identifier(self) -> &'static str {
        match self {
            PlaybackAction::PlayPause => "play-pause",
            PlaybackAction::Next => "next",
            PlaybackAction::Previous => "previous",
        }
    }
}

/// A physical key plus the exact modifier set that must be held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCombo {
    pub key_code: u16,
    pub modifiers: usize,
}

impl KeyCombo {
    /// Parse a combo spec like `"shift+cmd+space"`. Returns `None` for an
    /// unknown key name or an empty modifier set; a global binding without
    /// modifiers would swallow plain typing.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut modifiers = 0usize;
        let mut key_code = None;

        for part in spec.split('+') {
            let part = part.trim().to_lowercase();
            match part.as_str() {
                "" => return None,
                "shift" => modifiers |= FLAG_SHIFT,
                "ctrl" | "control" => modifiers |= FLAG_CONTROL,
                "alt" | "opt" | "option" => modifiers |= FLAG_OPTION,
                "cmd" | "command" => modifiers |= FLAG_COMMAND,
                key => {
                    if key_code.is_some() {
                        return None;
                    }
                    key_code = Some(key_code_for(key)?);
                }
            }
        }

        if modifiers == 0 {
            return None;
        }

        Some(Self {
            key_code: key_code?,
            modifiers,
        })
    }

    /// True when a key event with these raw fields matches this combo.
    /// Only the four device-independent modifier bits take part.
    pub fn matches(&self, key_code: u16, modifier_flags: usize) -> bool {
        self.key_code == key_code && (modifier_flags & FLAG_ALL) == self.modifiers
    }
}

/// macOS hardware virtual key codes for the names a combo spec can use.
fn key_code_for(name: &str) -> Option<u16> {
    let code = match name {
        "space" => 49,
        "return" | "enter" => 36,
        "pageup" => 116,
        "pagedown" => 121,
        "home" => 115,
        "end" => 119,
        "left" => 123,
        "right" => 124,
        "down" => 125,
        "up" => 126,
        "a" => 0,
        "b" => 11,
        "d" => 2,
        "f" => 3,
        "j" => 38,
        "k" => 40,
        "l" => 37,
        "n" => 45,
        "p" => 35,
        "r" => 15,
        "s" => 1,
        _ => return None,
    };
    Some(code)
}

/// One installed binding.
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub action: PlaybackAction,
    pub combo: KeyCombo,
}

/// Shortcut specs per action, as read from preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutSpecs {
    pub play_pause: String,
    pub next: String,
    pub previous: String,
}

impl Default for ShortcutSpecs {
    fn default() -> Self {
        Self {
            play_pause: "shift+cmd+space".to_string(),
            next: "shift+cmd+pageup".to_string(),
            previous: "shift+cmd+pagedown".to_string(),
        }
    }
}

impl ShortcutSpecs {
    fn spec_for(&self, action: PlaybackAction) -> &str {
        match action {
            PlaybackAction::PlayPause => &self.play_pause,
            PlaybackAction::Next => &self.next,
            PlaybackAction::Previous => &self.previous,
        }
    }
}

/// Process-scoped shortcut registry.
///
/// Lifecycle: `initialize()` once, `refresh()` on every preference change,
/// `teardown()` on exit. Rebuilds are wholesale: the old binding for each
/// identifier is removed before the new one is installed, so no action can
/// end up with two live bindings.
#[derive(Debug, Default)]
pub struct HotkeyRegistry {
    bindings: HashMap<&'static str, Binding>,
    initialized: bool,
}

impl HotkeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initialize(&mut self, specs: &ShortcutSpecs) {
        self.initialized = true;
        self.rebuild(specs);
    }

    pub fn refresh(&mut self, specs: &ShortcutSpecs) {
        if !self.initialized {
            self.initialize(specs);
            return;
        }
        self.rebuild(specs);
    }

    pub fn teardown(&mut self) {
        self.bindings.clear();
        self.initialized = false;
    }

    fn rebuild(&mut self, specs: &ShortcutSpecs) {
        for action in PlaybackAction::ALL {
            let id = action.identifier();
            self.bindings.remove(id);
            match KeyCombo::parse(specs.spec_for(action)) {
                Some(combo) => {
                    self.bindings.insert(id, Binding { action, combo });
                }
                None => {
                    // Per-binding skip: the other shortcuts still install.
                    warn!(
                        "skipping shortcut {:?}: cannot parse {:?}",
                        id,
                        specs.spec_for(action)
                    );
                }
            }
        }
    }

    /// Resolve a key event against the installed bindings.
    pub fn match_event(&self, key_code: u16, modifier_flags: usize) -> Option<PlaybackAction> {
        self.bindings
            .values()
            .find(|b| b.combo.matches(key_code, modifier_flags))
            .map(|b| b.action)
    }

    pub fn binding(&self, action: PlaybackAction) -> Option<Binding> {
        self.bindings.get(action.identifier()).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_default_combos() {
        let combo = KeyCombo::parse("shift+cmd+space").unwrap();
        assert_eq!(combo.key_code, 49);
        assert_eq!(combo.modifiers, FLAG_SHIFT | FLAG_COMMAND);

        assert_eq!(KeyCombo::parse("shift+cmd+pageup").unwrap().key_code, 116);
        assert_eq!(KeyCombo::parse("shift+cmd+pagedown").unwrap().key_code, 121);
    }

    #[test]
    fn rejects_unknown_keys_and_empty_modifier_sets() {
        assert!(KeyCombo::parse("shift+cmd+wheel").is_none());
        assert!(KeyCombo::parse("space").is_none());
        assert!(KeyCombo::parse("").is_none());
        assert!(KeyCombo::parse("shift+cmd").is_none());
    }

    #[test]
    fn matching_requires_the_exact_modifier_set() {
        let combo = KeyCombo::parse("shift+cmd+space").unwrap();
        assert!(combo.matches(49, FLAG_SHIFT | FLAG_COMMAND));
        // Caps-lock style device bits outside the four flags are ignored.
        assert!(combo.matches(49, FLAG_SHIFT | FLAG_COMMAND | 0x100));
        assert!(!combo.matches(49, FLAG_COMMAND));
        assert!(!combo.matches(49, FLAG_SHIFT | FLAG_COMMAND | FLAG_OPTION));
        assert!(!combo.matches(50, FLAG_SHIFT | FLAG_COMMAND));
    }

    #[test]
    fn initialize_installs_one_binding_per_action() {
        let mut registry = HotkeyRegistry::new();
        registry.initialize(&ShortcutSpecs::default());
        assert_eq!(registry.len(), 3);
        for action in PlaybackAction::ALL {
            assert!(registry.binding(action).is_some());
        }
    }

    #[test]
    fn refresh_replaces_bindings_exclusively() {
        let mut registry = HotkeyRegistry::new();
        registry.initialize(&ShortcutSpecs::default());

        let specs = ShortcutSpecs {
            play_pause: "cmd+p".to_string(),
            ..ShortcutSpecs::default()
        };
        registry.refresh(&specs);

        // Exactly one binding per action, and play/pause now carries the
        // new combo only.
        assert_eq!(registry.len(), 3);
        let b = registry.binding(PlaybackAction::PlayPause).unwrap();
        assert_eq!(b.combo, KeyCombo::parse("cmd+p").unwrap());
        assert!(registry
            .match_event(49, FLAG_SHIFT | FLAG_COMMAND)
            .is_none());
    }

    #[test]
    fn unparseable_spec_skips_only_that_binding() {
        let mut registry = HotkeyRegistry::new();
        let specs = ShortcutSpecs {
            next: "bogus".to_string(),
            ..ShortcutSpecs::default()
        };
        registry.initialize(&specs);
        assert_eq!(registry.len(), 2);
        assert!(registry.binding(PlaybackAction::Next).is_none());
        assert!(registry.binding(PlaybackAction::PlayPause).is_some());
        assert!(registry.binding(PlaybackAction::Previous).is_some());
    }

    #[test]
    fn refresh_drops_a_binding_that_became_unparseable() {
        let mut registry = HotkeyRegistry::new();
        registry.initialize(&ShortcutSpecs::default());

        let specs = ShortcutSpecs {
            previous: "???".to_string(),
            ..ShortcutSpecs::default()
        };
        registry.refresh(&specs);
        assert!(registry.binding(PlaybackAction::Previous).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn match_event_resolves_the_bound_action() {
        let mut registry = HotkeyRegistry::new();
        registry.initialize(&ShortcutSpecs::default());
        assert_eq!(
            registry.match_event(49, FLAG_SHIFT | FLAG_COMMAND),
            Some(PlaybackAction::PlayPause)
        );
        assert_eq!(
            registry.match_event(116, FLAG_SHIFT | FLAG_COMMAND),
            Some(PlaybackAction::Next)
        );
        assert_eq!(registry.match_event(116, FLAG_COMMAND), None);
    }

    #[test]
    fn teardown_releases_everything() {
        let mut registry = HotkeyRegistry::new();
        registry.initialize(&ShortcutSpecs::default());
        registry.teardown();
        assert!(registry.is_empty());
    }
}
