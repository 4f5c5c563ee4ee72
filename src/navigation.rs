//! Tracks the webview's back/forward traversal availability and derives the
//! state of the two navigation buttons from it.
//!
//! The webview owns the truth; availability changes are pushed in through
//! KVO callbacks and every change produces exactly one button update.

/// Back/forward availability as last reported by the webview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigationState {
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

/// Which of the two navigation buttons an update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKind {
    Back,
    Forward,
}

/// Icon asset variant for a navigation button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconVariant {
    Active,
    Inactive,
}

impl IconVariant {
    /// The icon is a pure function of the enabled flag: active iff enabled.
    pub fn for_enabled(enabled: bool) -> Self {
        if enabled {
            IconVariant::Active
        } else {
            IconVariant::Inactive
        }
    }
}

/// Displayed state of one navigation button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonState {
    pub enabled: bool,
    pub icon: IconVariant,
}

impl ButtonState {
    fn disabled() -> Self {
        Self {
            enabled: false,
            icon: IconVariant::Inactive,
        }
    }

    fn from_availability(available: bool) -> Self {
        Self {
            enabled: available,
            icon: IconVariant::for_enabled(available),
        }
    }
}

/// The pair of navigation buttons. Both start disabled with the inactive
/// icon until the webview reports otherwise.
#[derive(Debug, Clone, Copy)]
pub struct NavButtons {
    state: NavigationState,
    back: ButtonState,
    forward: ButtonState,
}

impl Default for NavButtons {
    fn default() -> Self {
        Self {
            state: NavigationState::default(),
            back: ButtonState::disabled(),
            forward: ButtonState::disabled(),
        }
    }
}

impl NavButtons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one availability change. Returns the new state of the affected
    /// button; the other button is untouched.
    pub fn observe(&mut self, kind: NavKind, available: bool) -> ButtonState {
        let state = ButtonState::from_availability(available);
        match kind {
            NavKind::Back => {
                self.state.can_go_back = available;
                self.back = state;
            }
            NavKind::Forward => {
                self.state.can_go_forward = available;
                self.forward = state;
            }
        }
        state
    }

    pub fn navigation_state(&self) -> NavigationState {
        self.state
    }

    pub fn button(&self, kind: NavKind) -> ButtonState {
        match kind {
            NavKind::Back => self.back,
            NavKind::Forward => self.forward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buttons_start_disabled_with_inactive_icons() {
        let nav = NavButtons::new();
        for kind in [NavKind::Back, NavKind::Forward] {
            let b = nav.button(kind);
            assert!(!b.enabled);
            assert_eq!(b.icon, IconVariant::Inactive);
        }
    }

    #[test]
    fn icon_is_a_pure_function_of_enabled() {
        assert_eq!(IconVariant::for_enabled(true), IconVariant::Active);
        assert_eq!(IconVariant::for_enabled(false), IconVariant::Inactive);
    }

    #[test]
    fn button_state_tracks_the_most_recent_observation() {
        let mut nav = NavButtons::new();
        for value in [true, false, false, true] {
            nav.observe(NavKind::Back, value);
            assert_eq!(nav.button(NavKind::Back).enabled, value);
            assert_eq!(
                nav.button(NavKind::Back).icon,
                IconVariant::for_enabled(value)
            );
        }
    }

    #[test]
    fn back_navigation_enables_back_without_touching_forward() {
        let mut nav = NavButtons::new();
        nav.observe(NavKind::Back, false);
        nav.observe(NavKind::Forward, false);

        let back = nav.observe(NavKind::Back, true);
        assert!(back.enabled);
        assert_eq!(back.icon, IconVariant::Active);

        let forward = nav.button(NavKind::Forward);
        assert!(!forward.enabled);
        assert_eq!(forward.icon, IconVariant::Inactive);
    }
}
