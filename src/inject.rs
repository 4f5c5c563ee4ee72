//! Post-load injection of the bundled style sheet and behavior script.
//!
//! Runs once per completed navigation, and only when the page landed on
//! the expected service host. The style sheet travels inside a
//! single-quoted, single-line JavaScript string, so its content is escaped
//! first: newlines are removed and backslashes, quotes, and braces are
//! escaped so nothing can terminate the enclosing string or break the
//! structural braces of the surrounding script.

/// Style sheet applied on top of the service's own styles (titlebar
/// padding, scrollbar cleanup).
pub const STYLE_ASSET: &str = include_str!("../assets/custom.css");

/// Behavior script: posts playback updates to the `observer` message
/// channel and unregisters the service workers the page registers.
pub const SCRIPT_ASSET: &str = include_str!("../assets/custom.js");

/// Escape style-sheet content for embedding in a single-quoted,
/// single-line script string.
pub fn escape_style(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    for c in css.chars() {
        match c {
            '\n' | '\r' => {}
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            c => out.push(c),
        }
    }
    out
}

/// Build the script that installs the style sheet into the page.
pub fn style_injection_script(css: &str) -> String {
    format!(
        "var style = document.createElement('style'); style.innerHTML = '{}'; document.head.appendChild(style);",
        escape_style(css)
    )
}

/// The injection stage runs iff the completed navigation landed on the
/// expected host. A `None` host (about:blank, data URLs) never matches.
pub fn should_inject(loaded_host: Option<&str>, expected_host: &str) -> bool {
    loaded_host == Some(expected_host)
}

/// Scripts to evaluate after a completed navigation, in order: style
/// first, then behavior. Empty when the host gate rejects the page;
/// the caller still reveals the window either way.
pub fn injection_scripts(loaded_host: Option<&str>, expected_host: &str) -> Vec<String> {
    if !should_inject(loaded_host, expected_host) {
        return Vec::new();
    }
    vec![
        style_injection_script(STYLE_ASSET),
        SCRIPT_ASSET.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_removes_newlines_and_escapes_braces() {
        let css = "body {\n  color: red;\n}\n";
        let escaped = escape_style(css);
        assert!(!escaped.contains('\n'));
        assert_eq!(escaped, "body \\{  color: red;\\}");
    }

    #[test]
    fn escaped_output_has_no_bare_braces_or_quotes() {
        let css = "a { content: 'x\\''; }\r\n.b { }";
        let escaped = escape_style(css);
        let mut chars = escaped.chars().peekable();
        while let Some(c) = chars.next() {
            assert!(c != '\n' && c != '\r');
            if c == '\\' {
                // Consume the escaped character; any brace, quote, or
                // backslash here is part of a deliberate pair.
                assert!(chars.next().is_some());
                continue;
            }
            assert!(c != '{' && c != '}' && c != '\'');
        }
    }

    #[test]
    fn injection_script_is_a_single_line() {
        let script = style_injection_script("body {\n  margin: 0;\n}");
        assert!(!script.contains('\n'));
        assert!(script.starts_with("var style = document.createElement('style');"));
        assert!(script.ends_with("document.head.appendChild(style);"));
    }

    #[test]
    fn injection_is_gated_on_the_expected_host() {
        assert!(should_inject(Some("music.youtube.com"), "music.youtube.com"));
        assert!(!should_inject(Some("accounts.google.com"), "music.youtube.com"));
        assert!(!should_inject(None, "music.youtube.com"));
    }

    #[test]
    fn scripts_come_out_style_first_then_behavior() {
        let scripts = injection_scripts(Some("music.youtube.com"), "music.youtube.com");
        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].contains("createElement('style')"));
        assert_eq!(scripts[1], SCRIPT_ASSET);

        assert!(injection_scripts(Some("example.com"), "music.youtube.com").is_empty());
    }
}
