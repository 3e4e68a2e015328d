//! Destinations for compiled rule sets.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::Rule;
use crate::error::RuleSinkError;

/// Something that holds the currently installed dynamic rules.
///
/// `replace` is all-or-nothing: a rejected batch must leave the installed
/// rules as they were.
pub trait RuleSink: Send + Sync {
    fn installed_ids(&self) -> Result<Vec<u32>, RuleSinkError>;

    fn replace(&self, remove_ids: &[u32], add_rules: &[Rule]) -> Result<(), RuleSinkError>;
}

/// Apply a replacement to `installed`, validating the result first.
fn merged(
    installed: &[Rule],
    remove_ids: &[u32],
    add_rules: &[Rule],
) -> Result<Vec<Rule>, RuleSinkError> {
    let remove: HashSet<u32> = remove_ids.iter().copied().collect();
    let mut out: Vec<Rule> = installed
        .iter()
        .filter(|r| !remove.contains(&r.id))
        .cloned()
        .collect();
    let mut seen: HashSet<u32> = out.iter().map(|r| r.id).collect();
    for rule in add_rules {
        rule.validate()?;
        if !seen.insert(rule.id) {
            return Err(RuleSinkError::DuplicateId(rule.id));
        }
        out.push(rule.clone());
    }
    Ok(out)
}

/// Rules held in memory.
#[derive(Debug, Default)]
pub struct MemoryRuleSink {
    rules: Mutex<Vec<Rule>>,
}

impl MemoryRuleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.rules.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl RuleSink for MemoryRuleSink {
    fn installed_ids(&self) -> Result<Vec<u32>, RuleSinkError> {
        Ok(self.rules().iter().map(|r| r.id).collect())
    }

    fn replace(&self, remove_ids: &[u32], add_rules: &[Rule]) -> Result<(), RuleSinkError> {
        let mut rules = self.rules.lock().unwrap_or_else(|p| p.into_inner());
        *rules = merged(&rules, remove_ids, add_rules)?;
        Ok(())
    }
}

/// Rules written to a JSON file for an external request filter to load.
///
/// The file holds the installed array in dynamic-rule shape. Writes go to a
/// sibling temp file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct JsonRuleSink {
    path: PathBuf,
}

impl JsonRuleSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Currently installed rules. A missing file means none.
    pub fn load(&self) -> Result<Vec<Rule>, RuleSinkError> {
        let read_failed = |message: String| RuleSinkError::ReadFailed {
            path: self.path.clone(),
            message,
        };
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| read_failed(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(read_failed(e.to_string())),
        }
    }

    fn store(&self, rules: &[Rule]) -> Result<(), RuleSinkError> {
        let write_failed = |message: String| RuleSinkError::WriteFailed {
            path: self.path.clone(),
            message,
        };
        let content = serde_json::to_string_pretty(rules).map_err(|e| write_failed(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_failed(e.to_string()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| write_failed(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| write_failed(e.to_string()))
    }
}

impl RuleSink for JsonRuleSink {
    fn installed_ids(&self) -> Result<Vec<u32>, RuleSinkError> {
        Ok(self.load()?.iter().map(|r| r.id).collect())
    }

    fn replace(&self, remove_ids: &[u32], add_rules: &[Rule]) -> Result<(), RuleSinkError> {
        let installed = self.load()?;
        let next = merged(&installed, remove_ids, add_rules)?;
        self.store(&next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::compile;
    use crate::session::SessionPhase;

    fn batch(sites: &[&str]) -> Vec<Rule> {
        let blocked: Vec<String> = sites.iter().map(|s| s.to_string()).collect();
        compile(SessionPhase::Work, &blocked, &[]).rules
    }

    #[test]
    fn memory_sink_replaces_whole_set() {
        let sink = MemoryRuleSink::new();
        sink.replace(&[], &batch(&["a.com", "b.com"])).unwrap();
        let ids = sink.installed_ids().unwrap();
        sink.replace(&ids, &batch(&["c.com"])).unwrap();
        let rules = sink.rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].host(), Some("c.com"));
    }

    #[test]
    fn reused_id_without_removal_is_rejected() {
        let sink = MemoryRuleSink::new();
        sink.replace(&[], &batch(&["a.com"])).unwrap();
        let err = sink.replace(&[], &batch(&["b.com"])).unwrap_err();
        assert!(matches!(err, RuleSinkError::DuplicateId(1)));
        assert_eq!(sink.rules()[0].host(), Some("a.com"));
    }

    #[test]
    fn json_sink_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonRuleSink::new(dir.path().join("rules").join("dynamic_rules.json"));
        assert!(sink.installed_ids().unwrap().is_empty());

        sink.replace(&[], &batch(&["a.com", "b.com"])).unwrap();
        assert_eq!(sink.installed_ids().unwrap(), vec![1, 2]);

        sink.replace(&[1, 2], &[]).unwrap();
        assert!(sink.load().unwrap().is_empty());
    }

    #[test]
    fn json_sink_keeps_file_on_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonRuleSink::new(dir.path().join("dynamic_rules.json"));
        sink.replace(&[], &batch(&["a.com"])).unwrap();
        let before = std::fs::read_to_string(sink.path()).unwrap();

        let mut bad = batch(&["b.com"]);
        bad[0].condition.url_filter = "||/".into();
        assert!(sink.replace(&[1], &bad).is_err());

        let after = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(before, after);
    }
}
