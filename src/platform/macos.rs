//! AppKit/WebKit glue for the shell window.
//!
//! Everything Cocoa-facing lives here: window and webview creation, the
//! delegate classes, chrome relocation, the event monitors feeding the
//! hotkey registry and media command bridge, and the run-loop pump that
//! drains deferred work. The decision logic itself stays in the pure
//! modules; this file only wires AppKit callbacks into it.

use std::cell::RefCell;
use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::mpsc;

use anyhow::anyhow;
use block2::RcBlock;
use log::{debug, info, warn};
use objc2::rc::Retained;
use objc2::runtime::{AnyObject, ProtocolObject};
use objc2::{define_class, msg_send, sel, ClassType, DefinedClass, MainThreadMarker, MainThreadOnly};
use objc2_app_kit::{
    NSApplication, NSApplicationActivationPolicy, NSBackingStoreType, NSButton, NSEvent,
    NSEventMask, NSImage, NSRunningApplication, NSView, NSWindow, NSWindowButton,
    NSWindowDelegate, NSWindowStyleMask, NSWindowTitleVisibility,
};
use objc2_foundation::{
    ns_string, NSError, NSKeyValueObservingOptions, NSMutableDictionary, NSNotification, NSNumber,
    NSObjectProtocol, NSPoint, NSRect, NSSize, NSString, NSTimer, NSURLRequest, NSURL,
};
use objc2_media_player::{
    MPMediaItemPropertyArtist, MPMediaItemPropertyPlaybackDuration, MPMediaItemPropertyTitle,
    MPNowPlayingInfoCenter, MPNowPlayingInfoPropertyElapsedPlaybackTime,
    MPNowPlayingInfoPropertyPlaybackRate, MPNowPlayingPlaybackState, MPRemoteCommand,
    MPRemoteCommandCenter, MPRemoteCommandEvent, MPRemoteCommandHandlerStatus,
};
use objc2_web_kit::{
    WKContentRuleList, WKContentRuleListStore, WKNavigation, WKNavigationDelegate,
    WKScriptMessage, WKScriptMessageHandler, WKUserContentController, WKWebView,
    WKWebViewConfiguration,
};

use crate::chrome::{self, ButtonHost, StandardButton};
use crate::config::{PreferenceWatcher, Preferences};
use crate::events::ScriptOutcome;
use crate::inject;
use crate::media::{self, MediaCommand, PlaybackUpdate, TapState};
use crate::navigation::{ButtonState, IconVariant, NavKind};
use crate::options::ShellOptions;
use crate::rules;
use crate::shell::{self, try_with_shell, Command};

/// How often the pump timer drains deferred work.
const PUMP_INTERVAL: f64 = 0.05;

/// UI handles for the single shell window. Lives in its own thread_local so
/// delegate callbacks can reach the views while SHELL is borrowed.
struct ShellUi {
    window: Retained<NSWindow>,
    webview: Retained<WKWebView>,
    standard_container: Retained<NSView>,
    drag_strip: Retained<DragStripView>,
    back_button: Retained<NSButton>,
    forward_button: Retained<NSButton>,
    _window_delegate: Retained<ProtocolObject<dyn NSWindowDelegate>>,
    _nav_delegate: Retained<ProtocolObject<dyn WKNavigationDelegate>>,
    _message_handler: Retained<ProtocolObject<dyn WKScriptMessageHandler>>,
    _nav_observer: Retained<NavStateObserver>,
    _back_target: Retained<NavButtonTarget>,
    _forward_target: Retained<NavButtonTarget>,
}

thread_local! {
    static UI: RefCell<Option<ShellUi>> = RefCell::new(None);
}

/// Run a closure against the UI handles. Returns `None` before the window
/// exists or while the UI is being (re)built.
fn with_ui<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&ShellUi) -> R,
{
    UI.with(|ui| ui.try_borrow().ok().and_then(|guard| guard.as_ref().map(f)))
}

// ── Page message handler ───────────────────────────────────────

// Receives the structured messages the injected script posts on the
// `observer` channel.
define_class!(
    #[unsafe(super(objc2::runtime::NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "PageMessageHandler"]
    #[ivars = ()]
    struct PageMessageHandler;

    unsafe impl NSObjectProtocol for PageMessageHandler {}

    unsafe impl WKScriptMessageHandler for PageMessageHandler {
        #[unsafe(method(userContentController:didReceiveScriptMessage:))]
        fn did_receive_script_message(
            &self,
            _controller: &WKUserContentController,
            message: &WKScriptMessage,
        ) {
            let body = unsafe { message.body() };
            let body_str: Retained<NSString> = unsafe { msg_send![&body, description] };
            let raw = body_str.to_string();

            if let Some(update) = PlaybackUpdate::parse(&raw) {
                handle_playback_update(update);
            }
        }
    }
);

impl PageMessageHandler {
    fn new(mtm: MainThreadMarker) -> Retained<Self> {
        let handler = Self::alloc(mtm).set_ivars(());
        unsafe { msg_send![super(handler), init] }
    }
}

// ── Navigation delegate ────────────────────────────────────────

// Runs the injection stage and reveals the window when a navigation
// completes; load failures are logged and nothing else.
define_class!(
    #[unsafe(super(objc2::runtime::NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "ShellNavigationDelegate"]
    #[ivars = ()]
    struct ShellNavigationDelegate;

    unsafe impl NSObjectProtocol for ShellNavigationDelegate {}

    unsafe impl WKNavigationDelegate for ShellNavigationDelegate {
        #[unsafe(method(webView:didFinishNavigation:))]
        fn did_finish(&self, web_view: &WKWebView, _navigation: Option<&WKNavigation>) {
            let url = current_url(web_view);
            let host = shell::page_host(&url);

            run_injection_stage(web_view, host.as_deref());
            // Reveal happens after every completed navigation, whether or
            // not the host matched or injection succeeded.
            reveal_window();

            try_with_shell(|shell| {
                if let Some(cb) = &shell.handlers.on_page_load {
                    cb(&url, host.as_deref());
                }
            });
        }

        #[unsafe(method(webView:didFailNavigation:withError:))]
        fn did_fail(
            &self,
            _web_view: &WKWebView,
            _navigation: Option<&WKNavigation>,
            error: &NSError,
        ) {
            warn!("navigation failed: {}", error.localizedDescription());
        }

        #[unsafe(method(webView:didFailProvisionalNavigation:withError:))]
        fn did_fail_provisional(
            &self,
            _web_view: &WKWebView,
            _navigation: Option<&WKNavigation>,
            error: &NSError,
        ) {
            warn!("provisional navigation failed: {}", error.localizedDescription());
        }
    }
);

impl ShellNavigationDelegate {
    fn new(mtm: MainThreadMarker) -> Retained<Self> {
        let delegate = Self::alloc(mtm).set_ivars(());
        unsafe { msg_send![super(delegate), init] }
    }
}

// ── Window delegate ────────────────────────────────────────────

// Chrome relocation runs on every layout pass; closing the only window
// ends the process.
define_class!(
    #[unsafe(super(objc2::runtime::NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "ShellWindowDelegate"]
    #[ivars = ()]
    struct ShellWindowDelegate;

    unsafe impl NSObjectProtocol for ShellWindowDelegate {}

    unsafe impl NSWindowDelegate for ShellWindowDelegate {
        #[unsafe(method(windowDidResize:))]
        fn window_did_resize(&self, _notification: &NSNotification) {
            relocate_chrome();
        }

        #[unsafe(method(windowWillClose:))]
        fn window_will_close(&self, _notification: &NSNotification) {
            let app = NSApplication::sharedApplication(self.mtm());
            unsafe {
                app.terminate(None);
            }
        }
    }
);

impl ShellWindowDelegate {
    fn new(mtm: MainThreadMarker) -> Retained<Self> {
        let delegate = Self::alloc(mtm).set_ivars(());
        unsafe { msg_send![super(delegate), init] }
    }
}

// ── Navigation-state observer ──────────────────────────────────

// KVO observer for the webview's canGoBack/canGoForward. Each change
// produces exactly one button update.
define_class!(
    #[unsafe(super(objc2::runtime::NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "NavStateObserver"]
    #[ivars = ()]
    struct NavStateObserver;

    unsafe impl NSObjectProtocol for NavStateObserver {}

    impl NavStateObserver {
        #[unsafe(method(observeValueForKeyPath:ofObject:change:context:))]
        fn observe_value(
            &self,
            key_path: *const NSString,
            object: *const AnyObject,
            _change: *const AnyObject,
            _context: *mut c_void,
        ) {
            if key_path.is_null() || object.is_null() {
                return;
            }
            let key_path = unsafe { &*key_path }.to_string();
            let webview = unsafe { &*object };

            let kind = match key_path.as_str() {
                "canGoBack" => NavKind::Back,
                "canGoForward" => NavKind::Forward,
                _ => return,
            };
            let available: bool = unsafe {
                match kind {
                    NavKind::Back => msg_send![webview, canGoBack],
                    NavKind::Forward => msg_send![webview, canGoForward],
                }
            };
            apply_nav_change(kind, available);
        }
    }
);

impl NavStateObserver {
    fn new(mtm: MainThreadMarker) -> Retained<Self> {
        let observer = Self::alloc(mtm).set_ivars(());
        unsafe { msg_send![super(observer), init] }
    }
}

// ── Navigation button targets ──────────────────────────────────

define_class!(
    #[unsafe(super(objc2::runtime::NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "NavButtonTarget"]
    #[ivars = NavKind]
    struct NavButtonTarget;

    unsafe impl NSObjectProtocol for NavButtonTarget {}

    impl NavButtonTarget {
        #[unsafe(method(navigate:))]
        fn navigate(&self, _sender: *const AnyObject) {
            traverse(*self.ivars());
        }
    }
);

impl NavButtonTarget {
    fn new(mtm: MainThreadMarker, kind: NavKind) -> Retained<Self> {
        let target = Self::alloc(mtm).set_ivars(kind);
        unsafe { msg_send![super(target), init] }
    }
}

// ── Draggable strip ────────────────────────────────────────────

// Full-width strip standing in for the hidden title bar; dragging it moves
// the window.
define_class!(
    #[unsafe(super(NSView))]
    #[thread_kind = MainThreadOnly]
    #[name = "DragStripView"]
    #[ivars = ()]
    struct DragStripView;

    unsafe impl NSObjectProtocol for DragStripView {}

    impl DragStripView {
        #[unsafe(method(mouseDownCanMoveWindow))]
        fn mouse_down_can_move_window(&self) -> bool {
            true
        }
    }
);

impl DragStripView {
    fn new(mtm: MainThreadMarker) -> Retained<Self> {
        let view = Self::alloc(mtm).set_ivars(());
        unsafe { msg_send![super(view), init] }
    }
}

// ── Chrome relocation ──────────────────────────────────────────

struct WindowButtonHost<'a> {
    window: &'a NSWindow,
    container: &'a NSView,
}

impl WindowButtonHost<'_> {
    fn standard_button(&self, button: StandardButton) -> Option<Retained<NSButton>> {
        let which = match button {
            StandardButton::Close => NSWindowButton::CloseButton,
            StandardButton::Minimize => NSWindowButton::MiniaturizeButton,
            StandardButton::Zoom => NSWindowButton::ZoomButton,
        };
        unsafe { msg_send![self.window, standardWindowButton: which] }
    }
}

impl ButtonHost for WindowButtonHost<'_> {
    fn is_hosted(&self, button: StandardButton) -> bool {
        // A missing button counts as hosted so adoption is never retried
        // against it.
        self.standard_button(button).map_or(true, |btn| unsafe {
            let superview: *const AnyObject = msg_send![&*btn, superview];
            superview == (self.container as *const NSView).cast()
        })
    }

    fn adopt(&mut self, button: StandardButton) {
        if let Some(btn) = self.standard_button(button) {
            unsafe {
                let _: () = msg_send![&*btn, removeFromSuperview];
                let _: () = msg_send![self.container, addSubview: &*btn];
            }
        }
    }
}

/// One relocation pass: re-host the standard buttons and reposition the
/// drag strip and navigation buttons for the current content size.
fn relocate_chrome() {
    with_ui(|ui| {
        let mut host = WindowButtonHost {
            window: &ui.window,
            container: &ui.standard_container,
        };
        chrome::relocate_standard_buttons(&mut host);

        let bounds: NSRect = unsafe { msg_send![&*ui.webview, bounds] };
        let flipped: bool = unsafe { msg_send![&*ui.webview, isFlipped] };
        let (width, height) = (bounds.size.width, bounds.size.height);

        set_frame(&ui.drag_strip, chrome::drag_strip_frame(flipped, width, height));
        set_frame(&ui.back_button, chrome::back_button_frame(flipped, height));
        set_frame(&ui.forward_button, chrome::forward_button_frame(flipped, height));
    });
}

fn set_frame(view: &NSView, frame: chrome::Frame) {
    let rect = NSRect::new(
        NSPoint::new(frame.x, frame.y),
        NSSize::new(frame.width, frame.height),
    );
    unsafe {
        let _: () = msg_send![view, setFrame: rect];
    }
}

// ── Navigation state → buttons ─────────────────────────────────

fn apply_nav_change(kind: NavKind, available: bool) {
    let state = try_with_shell(|shell| {
        let state = shell.nav.observe(kind, available);
        if let Some(cb) = &shell.handlers.on_navigation_change {
            cb(kind, available);
        }
        state
    });
    match state {
        Some(state) => apply_button_state(kind, state),
        None => {
            shell::PENDING_NAV_CHANGES.with(|p| p.borrow_mut().push((kind, available)));
        }
    }
}

fn apply_button_state(kind: NavKind, state: ButtonState) {
    with_ui(|ui| {
        let button = match kind {
            NavKind::Back => &ui.back_button,
            NavKind::Forward => &ui.forward_button,
        };
        unsafe {
            let _: () = msg_send![&**button, setEnabled: state.enabled];
            let _: () = msg_send![&**button, setAlphaValue: icon_alpha(state.icon)];
        }
    });
}

fn icon_alpha(icon: IconVariant) -> f64 {
    match icon {
        IconVariant::Active => 1.0,
        IconVariant::Inactive => 0.4,
    }
}

fn traverse(kind: NavKind) {
    let acted = with_ui(|ui| unsafe {
        match kind {
            NavKind::Back => {
                let _: *mut AnyObject = msg_send![&*ui.webview, goBack];
            }
            NavKind::Forward => {
                let _: *mut AnyObject = msg_send![&*ui.webview, goForward];
            }
        }
    });
    if acted.is_none() {
        shell::enqueue(Command::Navigate(kind));
    }
}

// ── Script evaluation ──────────────────────────────────────────

/// Best-effort evaluation: errors are logged and surfaced through the
/// script-result handler, never anything more.
fn evaluate_script(webview: &WKWebView, script: &str) {
    let source = NSString::from_str(script);
    let completion = RcBlock::new(move |result: *mut AnyObject, error: *mut NSError| {
        let outcome: ScriptOutcome = if error.is_null() {
            if result.is_null() {
                Ok(None)
            } else {
                let desc: Retained<NSString> = unsafe { msg_send![&*result, description] };
                Ok(Some(desc.to_string()))
            }
        } else {
            let desc: Retained<NSString> = unsafe { msg_send![&*error, localizedDescription] };
            Err(desc.to_string())
        };
        if let Err(err) = &outcome {
            warn!("script evaluation failed: {err}");
        }
        try_with_shell(|shell| {
            if let Some(cb) = &shell.handlers.on_script_result {
                cb(outcome.clone());
            }
        });
    });
    unsafe {
        let _: () = msg_send![webview, evaluateJavaScript: &*source, completionHandler: &*completion];
    }
}

// ── Injection stage and reveal ─────────────────────────────────

fn run_injection_stage(webview: &WKWebView, host: Option<&str>) {
    let expected = try_with_shell(|shell| shell.options.expected_host.clone())
        .unwrap_or_else(|| ShellOptions::default().expected_host);
    let scripts = inject::injection_scripts(host, &expected);
    if scripts.is_empty() {
        debug!("skipping injection for host {:?}", host);
        return;
    }
    for script in scripts {
        evaluate_script(webview, &script);
    }
}

fn reveal_window() {
    with_ui(|ui| unsafe {
        let animator: *mut AnyObject = msg_send![&*ui.window, animator];
        let _: () = msg_send![&*animator, setAlphaValue: 1.0f64];
    });
}

fn current_url(webview: &WKWebView) -> String {
    unsafe {
        let nsurl: Option<Retained<NSURL>> = msg_send![webview, URL];
        nsurl
            .and_then(|u| {
                let abs: Option<Retained<NSString>> = msg_send![&*u, absoluteString];
                abs.map(|s| s.to_string())
            })
            .unwrap_or_default()
    }
}

// ── Media command relay ────────────────────────────────────────

fn relay_command(cmd: MediaCommand) {
    debug!("relaying playback command {:?}", cmd);
    let script = media::command_script(cmd);
    let delivered = with_ui(|ui| evaluate_script(&ui.webview, script));
    if delivered.is_none() {
        shell::enqueue(Command::Playback(cmd));
    }
    try_with_shell(|shell| {
        if let Some(cb) = &shell.handlers.on_command {
            cb(cmd);
        }
    });
}

fn handle_playback_update(update: PlaybackUpdate) {
    let changed = try_with_shell(|shell| {
        let changed = shell.now_playing.apply(update.clone());
        if changed {
            if let Some(cb) = &shell.handlers.on_playback_update {
                cb(&update);
            }
        }
        changed
    });
    match changed {
        Some(true) => push_now_playing(&update),
        Some(false) => {}
        None => shell::PENDING_UPDATES.with(|p| p.borrow_mut().push(update)),
    }
}

/// Mirror the page's self-reported state to the system now-playing surface.
fn push_now_playing(update: &PlaybackUpdate) {
    unsafe {
        let center: Retained<MPNowPlayingInfoCenter> =
            msg_send![MPNowPlayingInfoCenter::class(), defaultCenter];
        let info: Retained<NSMutableDictionary> =
            msg_send![NSMutableDictionary::class(), dictionary];

        if let Some(title) = &update.title {
            let value = NSString::from_str(title);
            let _: () = msg_send![&*info, setObject: &*value, forKey: MPMediaItemPropertyTitle];
        }
        if let Some(artist) = &update.artist {
            let value = NSString::from_str(artist);
            let _: () = msg_send![&*info, setObject: &*value, forKey: MPMediaItemPropertyArtist];
        }
        if let Some(duration) = update.duration {
            let value = NSNumber::new_f64(duration);
            let _: () =
                msg_send![&*info, setObject: &*value, forKey: MPMediaItemPropertyPlaybackDuration];
        }
        if let Some(elapsed) = update.elapsed {
            let value = NSNumber::new_f64(elapsed);
            let _: () = msg_send![&*info, setObject: &*value,
                forKey: MPNowPlayingInfoPropertyElapsedPlaybackTime];
        }
        let rate = NSNumber::new_f64(if update.playing { 1.0 } else { 0.0 });
        let _: () =
            msg_send![&*info, setObject: &*rate, forKey: MPNowPlayingInfoPropertyPlaybackRate];

        let _: () = msg_send![&*center, setNowPlayingInfo: &*info];
        let state = if update.playing {
            MPNowPlayingPlaybackState::Playing
        } else {
            MPNowPlayingPlaybackState::Paused
        };
        let _: () = msg_send![&*center, setPlaybackState: state];
    }
}

// ── Event monitors ─────────────────────────────────────────────

/// Install the key-event monitors. The local monitor covers events while
/// the shell window is focused and can consume them; the global monitor is
/// the media-key tap, which the OS may refuse. Refusal leaves the tap
/// inactive and everything else working.
fn install_event_monitors() {
    let mask = NSEventMask::KeyDown | NSEventMask::SystemDefined;

    let local = RcBlock::new(|event: NonNull<NSEvent>| -> *mut NSEvent {
        let event_ref = unsafe { event.as_ref() };
        if handle_key_event(event_ref) || handle_media_key_event(event_ref) {
            std::ptr::null_mut()
        } else {
            event.as_ptr()
        }
    });
    let _: *mut AnyObject = unsafe {
        msg_send![
            NSEvent::class(),
            addLocalMonitorForEventsMatchingMask: mask,
            handler: &*local
        ]
    };

    let global = RcBlock::new(|event: NonNull<NSEvent>| {
        let event_ref = unsafe { event.as_ref() };
        if !handle_media_key_event(event_ref) {
            handle_key_event(event_ref);
        }
    });
    let monitor: *mut AnyObject = unsafe {
        msg_send![
            NSEvent::class(),
            addGlobalMonitorForEventsMatchingMask: mask,
            handler: &*global
        ]
    };

    let tap = if monitor.is_null() {
        warn!("media key tap denied; global media keys inactive");
        TapState::Inactive
    } else {
        TapState::Active
    };
    try_with_shell(|shell| shell.tap = tap);
}

/// Resolve a key-down event against the shortcut bindings.
/// Returns `true` if the event was consumed.
fn handle_key_event(event: &NSEvent) -> bool {
    unsafe {
        // NSEventType::KeyDown == 10
        let event_type: usize = msg_send![event, type];
        if event_type != 10 {
            return false;
        }
        let key_code: u16 = msg_send![event, keyCode];
        let modifier_flags: usize = msg_send![event, modifierFlags];

        match try_with_shell(|shell| shell.hotkeys.match_event(key_code, modifier_flags)).flatten()
        {
            Some(action) => {
                relay_command(action);
                true
            }
            None => false,
        }
    }
}

/// Translate a hardware media-key event into a playback command.
/// Returns `true` for any playback key so both the press and the release
/// are consumed; the command fires on the press.
fn handle_media_key_event(event: &NSEvent) -> bool {
    unsafe {
        // NSEventType::SystemDefined == 14, media-key subtype == 8
        let event_type: usize = msg_send![event, type];
        if event_type != 14 {
            return false;
        }
        let subtype: i16 = msg_send![event, subtype];
        if subtype != 8 {
            return false;
        }

        let data1: isize = msg_send![event, data1];
        let key_code = ((data1 as usize >> 16) & 0xFFFF) as u32;
        let key_flags = (data1 as usize) & 0xFFFF;
        let key_down = ((key_flags >> 8) & 0xFF) == 0x0A;

        match media::media_key_command(key_code) {
            Some(cmd) => {
                if key_down {
                    relay_command(cmd);
                }
                true
            }
            None => false,
        }
    }
}

// ── Remote commands ────────────────────────────────────────────

/// Register with the system remote-command surface (touch bar, headphone
/// controls, the Now Playing widget).
fn register_remote_commands() {
    unsafe {
        let center: Retained<MPRemoteCommandCenter> =
            msg_send![MPRemoteCommandCenter::class(), sharedCommandCenter];

        let toggle: Retained<MPRemoteCommand> = msg_send![&*center, togglePlayPauseCommand];
        let play: Retained<MPRemoteCommand> = msg_send![&*center, playCommand];
        let pause: Retained<MPRemoteCommand> = msg_send![&*center, pauseCommand];
        let next: Retained<MPRemoteCommand> = msg_send![&*center, nextTrackCommand];
        let previous: Retained<MPRemoteCommand> = msg_send![&*center, previousTrackCommand];

        register_remote(&toggle, MediaCommand::PlayPause);
        register_remote(&play, MediaCommand::PlayPause);
        register_remote(&pause, MediaCommand::PlayPause);
        register_remote(&next, MediaCommand::Next);
        register_remote(&previous, MediaCommand::Previous);
    }
}

fn register_remote(command: &MPRemoteCommand, relay: MediaCommand) {
    let handler = RcBlock::new(
        move |_event: NonNull<MPRemoteCommandEvent>| -> MPRemoteCommandHandlerStatus {
            relay_command(relay);
            MPRemoteCommandHandlerStatus::Success
        },
    );
    unsafe {
        let _: *mut AnyObject = msg_send![command, addTargetWithHandler: &*handler];
    }
}

// ── Content blocking ───────────────────────────────────────────

/// Compile the service-worker block rule and attach it to the content
/// controller. Compile failure is logged and the page loads unblocked.
fn configure_content_blocking(controller: Retained<WKUserContentController>) {
    let encoded = match rules::encoded_rules(&rules::service_worker_block_rules()) {
        Ok(json) => json,
        Err(err) => {
            warn!("content-blocking rule serialization failed: {err}; continuing unblocked");
            return;
        }
    };

    let completion = RcBlock::new(
        move |list: *mut WKContentRuleList, error: *mut NSError| {
            if !list.is_null() {
                unsafe {
                    let _: () = msg_send![&*controller, addContentRuleList: &*list];
                }
            } else if !error.is_null() {
                let desc: Retained<NSString> =
                    unsafe { msg_send![&*error, localizedDescription] };
                warn!("content-blocking rule compile failed: {desc}; continuing unblocked");
            }
        },
    );

    unsafe {
        let store: Retained<WKContentRuleListStore> =
            msg_send![WKContentRuleListStore::class(), defaultStore];
        let identifier = NSString::from_str(rules::RULE_LIST_IDENTIFIER);
        let source = NSString::from_str(&encoded);
        let _: () = msg_send![
            &*store,
            compileContentRuleListForIdentifier: &*identifier,
            encodedContentRuleList: &*source,
            completionHandler: &*completion
        ];
    }
}

// ── Window and webview creation ────────────────────────────────

fn make_nav_button(
    mtm: MainThreadMarker,
    symbol: &NSString,
    target: &NavButtonTarget,
) -> Retained<NSButton> {
    unsafe {
        let frame = NSRect::new(
            NSPoint::new(0.0, 0.0),
            NSSize::new(chrome::NAV_BUTTON_SIZE, chrome::NAV_BUTTON_SIZE),
        );
        let button: Retained<NSButton> = msg_send![NSButton::alloc(mtm), initWithFrame: frame];

        let image: Option<Retained<NSImage>> = msg_send![
            NSImage::class(),
            imageWithSystemSymbolName: symbol,
            accessibilityDescription: std::ptr::null::<NSString>()
        ];
        if let Some(image) = image {
            let _: () = msg_send![&*button, setImage: &*image];
        }

        let _: () = msg_send![&*button, setBordered: false];
        let _: () = msg_send![&*button, setEnabled: false];
        let _: () = msg_send![&*button, setAlphaValue: icon_alpha(IconVariant::Inactive)];
        let _: () = msg_send![&*button, setTarget: target];
        let _: () = msg_send![&*button, setAction: sel!(navigate:)];
        button
    }
}

fn build_ui(mtm: MainThreadMarker, options: &ShellOptions) {
    // Title bar hidden but present: the standard window buttons stay
    // obtainable while the content extends under the (transparent) bar.
    let style = NSWindowStyleMask::Titled
        | NSWindowStyleMask::Closable
        | NSWindowStyleMask::Miniaturizable
        | NSWindowStyleMask::Resizable
        | NSWindowStyleMask::FullSizeContentView;

    let frame = NSRect::new(
        NSPoint::new(200.0, 200.0),
        NSSize::new(options.width, options.height),
    );
    let window = unsafe {
        NSWindow::initWithContentRect_styleMask_backing_defer(
            NSWindow::alloc(mtm),
            frame,
            style,
            NSBackingStoreType::Buffered,
            false,
        )
    };
    window.setTitle(&NSString::from_str(&options.title));
    unsafe {
        let _: () = msg_send![&*window, setTitlebarAppearsTransparent: true];
        let _: () = msg_send![&*window, setTitleVisibility: NSWindowTitleVisibility::Hidden];
        // Starts invisible; the first completed navigation fades it in.
        let _: () = msg_send![&*window, setAlphaValue: 0.0f64];
    }

    let config = unsafe { WKWebViewConfiguration::new(mtm) };
    let content_controller = unsafe { config.userContentController() };

    let message_handler = PageMessageHandler::new(mtm);
    let message_handler_proto = ProtocolObject::from_retained(message_handler);
    unsafe {
        content_controller.addScriptMessageHandler_name(&message_handler_proto, ns_string!("observer"));
    }

    if options.block_service_worker {
        configure_content_blocking(content_controller.clone());
    } else {
        debug!("service-worker blocking disabled by preferences");
    }

    let content_rect = window.contentRectForFrameRect(window.frame());
    let webview = unsafe {
        WKWebView::initWithFrame_configuration(
            WKWebView::alloc(mtm),
            NSRect::new(NSPoint::new(0.0, 0.0), content_rect.size),
            &config,
        )
    };
    unsafe {
        let user_agent = NSString::from_str(&options.user_agent);
        let _: () = msg_send![&*webview, setCustomUserAgent: &*user_agent];
        let _: () = msg_send![&*webview, setAllowsBackForwardNavigationGestures: true];
    }
    if options.devtools {
        unsafe {
            let _: () = msg_send![&*webview, setInspectable: true];
        }
    }
    webview.setAutoresizingMask(
        objc2_app_kit::NSAutoresizingMaskOptions::ViewWidthSizable
            | objc2_app_kit::NSAutoresizingMaskOptions::ViewHeightSizable,
    );
    window.setContentView(Some(&webview));

    let nav_delegate = ShellNavigationDelegate::new(mtm);
    let nav_delegate_proto: Retained<ProtocolObject<dyn WKNavigationDelegate>> =
        ProtocolObject::from_retained(nav_delegate);
    unsafe {
        webview.setNavigationDelegate(Some(&nav_delegate_proto));
    }

    let window_delegate = ShellWindowDelegate::new(mtm);
    let window_delegate_proto: Retained<ProtocolObject<dyn NSWindowDelegate>> =
        ProtocolObject::from_retained(window_delegate);
    window.setDelegate(Some(&window_delegate_proto));

    // Chrome views are hosted inside the webview, like the title strip
    // they replace.
    let drag_strip = DragStripView::new(mtm);
    unsafe {
        let _: () = msg_send![&*webview, addSubview: &*drag_strip];
    }

    let standard_frame = chrome::standard_buttons_frame();
    let standard_container = unsafe {
        NSView::initWithFrame(
            NSView::alloc(mtm),
            NSRect::new(
                NSPoint::new(standard_frame.x, standard_frame.y),
                NSSize::new(standard_frame.width, standard_frame.height),
            ),
        )
    };
    unsafe {
        let _: () = msg_send![&*webview, addSubview: &*standard_container];
    }

    let back_target = NavButtonTarget::new(mtm, NavKind::Back);
    let forward_target = NavButtonTarget::new(mtm, NavKind::Forward);
    let back_button = make_nav_button(mtm, ns_string!("chevron.backward"), &back_target);
    let forward_button = make_nav_button(mtm, ns_string!("chevron.forward"), &forward_target);
    unsafe {
        let _: () = msg_send![&*webview, addSubview: &*back_button];
        let _: () = msg_send![&*webview, addSubview: &*forward_button];
    }

    let nav_observer = NavStateObserver::new(mtm);
    unsafe {
        let kvo_options = NSKeyValueObservingOptions::New;
        let _: () = msg_send![&*webview, addObserver: &*nav_observer,
            forKeyPath: ns_string!("canGoBack"), options: kvo_options,
            context: std::ptr::null_mut::<c_void>()];
        let _: () = msg_send![&*webview, addObserver: &*nav_observer,
            forKeyPath: ns_string!("canGoForward"), options: kvo_options,
            context: std::ptr::null_mut::<c_void>()];
    }

    UI.with(|ui| {
        *ui.borrow_mut() = Some(ShellUi {
            window,
            webview,
            standard_container,
            drag_strip,
            back_button,
            forward_button,
            _window_delegate: window_delegate_proto,
            _nav_delegate: nav_delegate_proto,
            _message_handler: message_handler_proto,
            _nav_observer: nav_observer,
            _back_target: back_target,
            _forward_target: forward_target,
        });
    });
}

fn load_start_page(webview: &WKWebView, url: &str) {
    unsafe {
        let url_string = NSString::from_str(url);
        let nsurl: Option<Retained<NSURL>> =
            msg_send![NSURL::class(), URLWithString: &*url_string];
        let Some(nsurl) = nsurl else {
            warn!("invalid start URL {url:?}");
            return;
        };
        let request: Retained<NSURLRequest> =
            msg_send![NSURLRequest::class(), requestWithURL: &*nsurl];
        let _: Option<Retained<WKNavigation>> = msg_send![webview, loadRequest: &*request];
    }
}

// ── Run-loop pump ──────────────────────────────────────────────

fn flush_pending() {
    let nav_changes: Vec<(NavKind, bool)> =
        shell::PENDING_NAV_CHANGES.with(|p| std::mem::take(&mut *p.borrow_mut()));
    for (kind, available) in nav_changes {
        apply_nav_change(kind, available);
    }

    let updates: Vec<PlaybackUpdate> =
        shell::PENDING_UPDATES.with(|p| std::mem::take(&mut *p.borrow_mut()));
    for update in updates {
        handle_playback_update(update);
    }
}

fn drain_commands() {
    for cmd in shell::drain_commands() {
        match cmd {
            Command::Playback(command) => relay_command(command),
            Command::Navigate(kind) => traverse(kind),
            Command::EvaluateScript(script) => {
                with_ui(|ui| evaluate_script(&ui.webview, &script));
            }
        }
    }
}

/// Re-read the preferences file and rebuild the shortcut bindings.
fn reload_preferences(source: Option<&Path>) {
    let reloaded = match source {
        Some(path) => Preferences::load_from(path),
        None => Preferences::load(),
    };
    match reloaded {
        Ok(prefs) => {
            try_with_shell(|shell| shell.hotkeys.refresh(&prefs.shortcuts));
            info!("preferences changed; shortcut bindings rebuilt");
        }
        Err(err) => warn!("keeping previous shortcuts: {err:#}"),
    }
}

fn start_pump_timer(source: Option<PathBuf>, rx: mpsc::Receiver<()>) -> Retained<NSTimer> {
    let block = RcBlock::new(move |_timer: NonNull<NSTimer>| {
        if rx.try_recv().is_ok() {
            // Collapse change bursts (editors write several events per save).
            while rx.try_recv().is_ok() {}
            reload_preferences(source.as_deref());
        }
        flush_pending();
        drain_commands();
    });
    unsafe {
        msg_send![
            NSTimer::class(),
            scheduledTimerWithTimeInterval: PUMP_INTERVAL,
            repeats: true,
            block: &*block
        ]
    }
}

// ── Entry point ────────────────────────────────────────────────

pub fn run(prefs: Preferences) -> anyhow::Result<()> {
    let mtm = MainThreadMarker::new()
        .ok_or_else(|| anyhow!("the shell must be started from the main thread"))?;
    let options = prefs.shell_options();

    let app = NSApplication::sharedApplication(mtm);
    app.setActivationPolicy(NSApplicationActivationPolicy::Regular);
    {
        let current_app = NSRunningApplication::currentApplication();
        #[allow(deprecated)]
        current_app.activateWithOptions(
            objc2_app_kit::NSApplicationActivationOptions::ActivateIgnoringOtherApps,
        );
    }

    shell::init(options.clone(), &prefs.shortcuts);
    build_ui(mtm, &options);
    // First layout pass; later passes run from windowDidResize.
    relocate_chrome();

    install_event_monitors();
    register_remote_commands();

    // The watcher thread only signals "changed"; the pump re-reads the file
    // on the main thread.
    let (tx, rx) = mpsc::channel();
    let _watcher = match prefs.source.as_deref() {
        Some(path) => match PreferenceWatcher::watch(path, move || {
            let _ = tx.send(());
        }) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!("preference watcher unavailable: {err:#}");
                None
            }
        },
        None => None,
    };
    let _timer = start_pump_timer(prefs.source.clone(), rx);

    with_ui(|ui| {
        load_start_page(&ui.webview, &options.start_url);
        ui.window.makeKeyAndOrderFront(None);
    });

    info!("shell running at {}", options.start_url);
    app.run();
    Ok(())
}
