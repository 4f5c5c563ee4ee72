//! The declarative content-blocking rule attached to the webview before any
//! navigation.
//!
//! The streaming page registers a service worker that caches an app shell
//! the wrapped site then serves stale; blocking the worker script keeps the
//! page loading live. Compilation happens once at configuration time and
//! failure leaves the rule absent: the page still loads, just unblocked.

use serde::Serialize;

/// Identifier the compiled rule list is stored under.
pub const RULE_LIST_IDENTIFIER: &str = "ContentBlockingRules";

/// One declarative rule: a URL trigger and the action applied to matching
/// requests.
#[derive(Debug, Clone, Serialize)]
pub struct ContentRule {
    pub trigger: Trigger,
    pub action: Action,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trigger {
    #[serde(rename = "url-filter")]
    pub url_filter: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Block,
}

/// The rule list blocking the service-worker script.
pub fn service_worker_block_rules() -> Vec<ContentRule> {
    vec![ContentRule {
        trigger: Trigger {
            url_filter: "sw.js".to_string(),
        },
        action: Action {
            kind: ActionKind::Block,
        },
    }]
}

/// Serialize a rule list into the JSON form the rule compiler accepts.
pub fn encoded_rules(rules: &[ContentRule]) -> serde_json::Result<String> {
    serde_json::to_string(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_rule_serializes_to_the_compiler_shape() {
        let json = encoded_rules(&service_worker_block_rules()).unwrap();
        assert_eq!(
            json,
            r#"[{"trigger":{"url-filter":"sw.js"},"action":{"type":"block"}}]"#
        );
    }

    #[test]
    fn empty_rule_list_is_still_valid_json() {
        assert_eq!(encoded_rules(&[]).unwrap(), "[]");
    }
}
