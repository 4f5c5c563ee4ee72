//! Window chrome layout: where the relocated standard window buttons, the
//! draggable title strip, and the navigation buttons go.
//!
//! The webview is the window's content view and may use either a flipped
//! (origin top-left) or unflipped (origin bottom-left) coordinate system.
//! All vertical placement goes through the math here so both orientations
//! are covered; getting this wrong puts the controls off-screen.

/// Height of the draggable strip standing in for the hidden title bar.
pub const TITLEBAR_HEIGHT: f64 = 64.0;

/// Vertical inset of the navigation buttons from the titlebar edge.
pub const NAV_OFFSET_Y: f64 = 16.0;

/// Navigation buttons are square.
pub const NAV_BUTTON_SIZE: f64 = 32.0;

/// X origins: standard buttons container, then back, then forward.
pub const STANDARD_BUTTONS_X: f64 = 14.0;
pub const BACK_BUTTON_X: f64 = 90.0;
pub const FORWARD_BUTTON_X: f64 = 130.0;

/// Width reserved for the three standard window buttons.
pub const STANDARD_BUTTONS_WIDTH: f64 = 80.0;
pub const STANDARD_BUTTONS_HEIGHT: f64 = 29.0 + NAV_OFFSET_Y;

/// A frame in the content view's own coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The three standard window controls that get re-hosted out of the
/// default title bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardButton {
    Close,
    Minimize,
    Zoom,
}

impl StandardButton {
    pub const ALL: [StandardButton; 3] = [
        StandardButton::Close,
        StandardButton::Minimize,
        StandardButton::Zoom,
    ];
}

/// Frame of the container the standard buttons are re-hosted into.
/// Anchored to the top-left corner regardless of content size.
pub fn standard_buttons_frame() -> Frame {
    Frame {
        x: STANDARD_BUTTONS_X,
        y: 0.0,
        width: STANDARD_BUTTONS_WIDTH,
        height: STANDARD_BUTTONS_HEIGHT,
    }
}

/// Frame of the full-width draggable strip. In an unflipped view the top
/// edge is at `height`, so the strip's origin sits `TITLEBAR_HEIGHT` below
/// it; in a flipped view the top edge is y = 0.
pub fn drag_strip_frame(flipped: bool, width: f64, height: f64) -> Frame {
    Frame {
        x: 0.0,
        y: if flipped { 0.0 } else { height - TITLEBAR_HEIGHT },
        width,
        height: TITLEBAR_HEIGHT,
    }
}

/// Y origin shared by both navigation buttons.
pub fn nav_button_y(flipped: bool, height: f64) -> f64 {
    if flipped {
        NAV_OFFSET_Y
    } else {
        height - NAV_BUTTON_SIZE - NAV_OFFSET_Y
    }
}

pub fn back_button_frame(flipped: bool, height: f64) -> Frame {
    Frame {
        x: BACK_BUTTON_X,
        y: nav_button_y(flipped, height),
        width: NAV_BUTTON_SIZE,
        height: NAV_BUTTON_SIZE,
    }
}

pub fn forward_button_frame(flipped: bool, height: f64) -> Frame {
    Frame {
        x: FORWARD_BUTTON_X,
        y: nav_button_y(flipped, height),
        width: NAV_BUTTON_SIZE,
        height: NAV_BUTTON_SIZE,
    }
}

/// Host of the standard window buttons. The platform implementation adopts
/// a button by re-parenting its view into the custom container; adopting a
/// view that is already hosted must be a no-op.
pub trait ButtonHost {
    /// True when the button already sits inside the custom container.
    fn is_hosted(&self, button: StandardButton) -> bool;
    /// Re-parent the button into the custom container.
    fn adopt(&mut self, button: StandardButton);
}

/// One relocation pass. Runs on every layout pass of the window and is
/// idempotent: buttons already re-hosted are left alone.
pub fn relocate_standard_buttons<H: ButtonHost>(host: &mut H) {
    for button in StandardButton::ALL {
        if !host.is_hosted(button) {
            host.adopt(button);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeHost {
        hosted: HashMap<StandardButton, bool>,
        adoptions: usize,
    }

    impl FakeHost {
        fn new() -> Self {
            Self {
                hosted: HashMap::new(),
                adoptions: 0,
            }
        }
    }

    impl ButtonHost for FakeHost {
        fn is_hosted(&self, button: StandardButton) -> bool {
            self.hosted.get(&button).copied().unwrap_or(false)
        }

        fn adopt(&mut self, button: StandardButton) {
            self.hosted.insert(button, true);
            self.adoptions += 1;
        }
    }

    #[test]
    fn relocation_is_idempotent() {
        let mut host = FakeHost::new();
        for _ in 0..5 {
            relocate_standard_buttons(&mut host);
        }
        assert_eq!(host.adoptions, 3);
        for button in StandardButton::ALL {
            assert!(host.is_hosted(button));
        }
    }

    #[test]
    fn drag_strip_hugs_the_top_edge_in_both_orientations() {
        let flipped = drag_strip_frame(true, 1024.0, 768.0);
        assert_eq!(flipped.y, 0.0);
        assert_eq!(flipped.width, 1024.0);

        let unflipped = drag_strip_frame(false, 1024.0, 768.0);
        assert_eq!(unflipped.y, 768.0 - TITLEBAR_HEIGHT);
        assert_eq!(unflipped.height, TITLEBAR_HEIGHT);
    }

    #[test]
    fn nav_buttons_stay_inside_the_titlebar_strip() {
        for (flipped, height) in [(true, 768.0), (false, 768.0), (false, 480.0)] {
            let y = nav_button_y(flipped, height);
            let strip = drag_strip_frame(flipped, 1024.0, height);
            assert!(y >= strip.y);
            assert!(y + NAV_BUTTON_SIZE <= strip.y + strip.height);
        }
    }

    #[test]
    fn back_sits_left_of_forward_at_the_same_height() {
        let back = back_button_frame(false, 768.0);
        let forward = forward_button_frame(false, 768.0);
        assert!(back.x < forward.x);
        assert_eq!(back.y, forward.y);
    }
}
