//! Site-blocking rule compiler.
//!
//! [`compile`] is a pure projection of (session state, blocked list,
//! whitelist) onto a declarative rule set shaped like browser dynamic
//! redirect rules. Rule ids are the 1-based position of the host in the
//! filtered blocked list, so they are only meaningful inside one compiled
//! batch; installing a batch always retires every previously installed id.

mod sink;

pub use sink::{JsonRuleSink, MemoryRuleSink, RuleSink};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::RuleSinkError;
use crate::session::SessionPhase;
use crate::sites::is_valid_hostname;

/// Default internal page blocked navigations are redirected to.
pub const DEFAULT_BLOCK_PAGE: &str = "/blocked.html";
pub const DEFAULT_PRIORITY: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub extension_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub redirect: Redirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    /// `||host/`: the host and all of its subdomains.
    pub url_filter: String,
    pub resource_types: Vec<ResourceType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_request_domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl Rule {
    /// The host this rule's filter matches, if the filter is well formed.
    pub fn host(&self) -> Option<&str> {
        self.condition
            .url_filter
            .strip_prefix("||")
            .and_then(|rest| rest.strip_suffix('/'))
    }

    pub(crate) fn validate(&self) -> Result<(), RuleSinkError> {
        if self.id == 0 {
            return Err(RuleSinkError::ZeroId);
        }
        match self.host() {
            Some(host) if is_valid_hostname(host) => Ok(()),
            _ => Err(RuleSinkError::MalformedPattern {
                id: self.id,
                pattern: self.condition.url_filter.clone(),
            }),
        }
    }
}

/// An ordered batch of rules. Empty outside WORK sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.rules.iter().map(|r| r.id).collect()
    }
}

/// Knobs that shape emitted rules without changing which hosts match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub redirect_path: String,
    pub priority: u32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            redirect_path: DEFAULT_BLOCK_PAGE.to_string(),
            priority: DEFAULT_PRIORITY,
        }
    }
}

/// Compile with default options.
pub fn compile(state: SessionPhase, blocked: &[String], whitelisted: &[String]) -> RuleSet {
    compile_with(&CompileOptions::default(), state, blocked, whitelisted)
}

pub fn compile_with(
    options: &CompileOptions,
    state: SessionPhase,
    blocked: &[String],
    whitelisted: &[String],
) -> RuleSet {
    if state != SessionPhase::Work || blocked.is_empty() {
        return RuleSet::default();
    }

    let excluded: Vec<String> = whitelisted
        .iter()
        .filter(|site| {
            let ok = is_valid_hostname(site);
            if !ok {
                warn!(site = %site, "skipping invalid whitelisted host");
            }
            ok
        })
        .cloned()
        .collect();

    let rules = blocked
        .iter()
        .filter(|site| {
            let ok = is_valid_hostname(site);
            if !ok {
                warn!(site = %site, "skipping invalid blocked host");
            }
            ok
        })
        .enumerate()
        .map(|(index, site)| Rule {
            id: index as u32 + 1,
            priority: options.priority,
            action: RuleAction {
                kind: ActionType::Redirect,
                redirect: Redirect {
                    extension_path: options.redirect_path.clone(),
                },
            },
            condition: RuleCondition {
                url_filter: format!("||{site}/"),
                resource_types: vec![ResourceType::MainFrame],
                excluded_request_domains: excluded.clone(),
            },
        })
        .collect();

    RuleSet { rules }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sites(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_outside_work() {
        let blocked = sites(&["a.com"]);
        assert!(compile(SessionPhase::Idle, &blocked, &[]).is_empty());
        assert!(compile(SessionPhase::Break, &blocked, &[]).is_empty());
    }

    #[test]
    fn empty_without_blocked_sites() {
        assert!(compile(SessionPhase::Work, &[], &sites(&["a.com"])).is_empty());
    }

    #[test]
    fn two_sites_with_whitelist() {
        let set = compile(
            SessionPhase::Work,
            &sites(&["a.com", "b.com"]),
            &sites(&["x.a.com"]),
        );
        assert_eq!(set.ids(), vec![1, 2]);
        let a = &set.rules[0];
        assert_eq!(a.host(), Some("a.com"));
        assert!(a
            .condition
            .excluded_request_domains
            .contains(&"x.a.com".to_string()));
        assert_eq!(set.rules[1].host(), Some("b.com"));
    }

    #[test]
    fn invalid_hosts_are_skipped_and_ids_stay_dense() {
        let set = compile(
            SessionPhase::Work,
            &sites(&["", "a.com", "not a host", "b.com"]),
            &[],
        );
        assert_eq!(set.ids(), vec![1, 2]);
        assert_eq!(set.rules[0].host(), Some("a.com"));
        assert_eq!(set.rules[1].host(), Some("b.com"));
    }

    #[test]
    fn serializes_in_dynamic_rule_shape() {
        let set = compile(SessionPhase::Work, &sites(&["a.com"]), &sites(&["ok.a.com"]));
        assert_eq!(
            serde_json::to_value(&set).unwrap(),
            json!([{
                "id": 1,
                "priority": 1,
                "action": {"type": "redirect", "redirect": {"extensionPath": "/blocked.html"}},
                "condition": {
                    "urlFilter": "||a.com/",
                    "resourceTypes": ["main_frame"],
                    "excludedRequestDomains": ["ok.a.com"]
                }
            }])
        );
    }

    #[test]
    fn compile_is_idempotent() {
        let blocked = sites(&["a.com", "b.com", "c.org"]);
        let white = sites(&["m.a.com"]);
        let first = serde_json::to_string(&compile(SessionPhase::Work, &blocked, &white)).unwrap();
        let second = serde_json::to_string(&compile(SessionPhase::Work, &blocked, &white)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn options_change_redirect_and_priority() {
        let options = CompileOptions {
            redirect_path: "/focus.html".into(),
            priority: 7,
        };
        let set = compile_with(&options, SessionPhase::Work, &sites(&["a.com"]), &[]);
        assert_eq!(set.rules[0].priority, 7);
        assert_eq!(set.rules[0].action.redirect.extension_path, "/focus.html");
    }

    #[test]
    fn rule_validation() {
        let mut rule = compile(SessionPhase::Work, &sites(&["a.com"]), &[]).rules[0].clone();
        assert!(rule.validate().is_ok());
        rule.condition.url_filter = "a.com".into();
        assert!(matches!(
            rule.validate(),
            Err(RuleSinkError::MalformedPattern { id: 1, .. })
        ));
        rule.id = 0;
        assert!(matches!(rule.validate(), Err(RuleSinkError::ZeroId)));
    }
}
