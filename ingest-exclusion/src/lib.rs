//! Rule-based suppression of artifacts, applied post-read. Grounded on
//! `ExclusionRulesService::should_exclude`/`_matches_*_rule`: rules are
//! loaded once per tenant (by the caller, typically from the
//! `exclusion_rules` table) and matched in-process against each candidate
//! entity id.
//!
//! Matching fails open: a malformed glob pattern logs a warning and is
//! treated as "does not match" rather than failing the whole read.

use globset::Glob;
use ingest_core::{ExclusionRule, ExclusionRuleKind};

/// Evaluates a fixed set of active exclusion rules for one tenant against
/// candidate entity ids. Cheap to construct per request; rule compilation
/// happens lazily per call since rule sets are typically small (tens, not
/// thousands, of rules per tenant).
#[derive(Debug, Default)]
pub struct ExclusionEngine {
    rules: Vec<ExclusionRule>,
}

impl ExclusionEngine {
    pub fn new(rules: Vec<ExclusionRule>) -> Self {
        Self { rules: rules.into_iter().filter(|r| r.active).collect() }
    }

    /// Whether `entity_id` of `kind` should be excluded, i.e. any active
    /// rule of the same kind matches it.
    pub fn should_exclude(&self, entity_id: &str, kind: ExclusionRuleKind) -> bool {
        self.rules
            .iter()
            .filter(|rule| rule.kind == kind)
            .any(|rule| rule_matches(entity_id, kind, &rule.pattern))
    }
}

fn rule_matches(entity_id: &str, kind: ExclusionRuleKind, pattern: &str) -> bool {
    match kind {
        ExclusionRuleKind::GithubFile => match_glob(entity_id, pattern),
        ExclusionRuleKind::SlackChannel => {
            let channel_id = entity_id.split('_').next().unwrap_or(entity_id);
            channel_id == pattern
        }
        ExclusionRuleKind::LinearIssue => match_glob(entity_id, pattern),
    }
}

fn match_glob(entity_id: &str, pattern: &str) -> bool {
    match Glob::new(pattern) {
        Ok(glob) => glob.compile_matcher().is_match(entity_id),
        Err(err) => {
            tracing::warn!(pattern, error = %err, "invalid exclusion rule glob, treating as no-match");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_core::{EntityIdType, ExclusionRuleId, TenantId};

    fn rule(kind: ExclusionRuleKind, pattern: &str) -> ExclusionRule {
        ExclusionRule {
            id: ExclusionRuleId::now_v7(),
            tenant_id: TenantId::now_v7(),
            kind,
            pattern: pattern.to_string(),
            active: true,
        }
    }

    #[test]
    fn github_file_matches_glob_over_full_entity_id() {
        let engine =
            ExclusionEngine::new(vec![rule(ExclusionRuleKind::GithubFile, "acme/repo/vendor/**")]);
        assert!(engine.should_exclude(
            "acme/repo/vendor/lib/foo.rs",
            ExclusionRuleKind::GithubFile
        ));
        assert!(!engine.should_exclude("acme/repo/src/foo.rs", ExclusionRuleKind::GithubFile));
    }

    #[test]
    fn slack_channel_matches_literal_id_after_stripping_date_suffix() {
        let engine =
            ExclusionEngine::new(vec![rule(ExclusionRuleKind::SlackChannel, "C1234567890")]);
        assert!(engine
            .should_exclude("C1234567890_2024-01-15", ExclusionRuleKind::SlackChannel));
        assert!(!engine.should_exclude("C9999999999_2024-01-15", ExclusionRuleKind::SlackChannel));
    }

    #[test]
    fn linear_issue_matches_glob_pattern() {
        let engine =
            ExclusionEngine::new(vec![rule(ExclusionRuleKind::LinearIssue, "issue_ENG-*")]);
        assert!(engine.should_exclude("issue_ENG-123", ExclusionRuleKind::LinearIssue));
        assert!(!engine.should_exclude("issue_OPS-1", ExclusionRuleKind::LinearIssue));
    }

    #[test]
    fn inactive_rules_are_ignored() {
        let mut r = rule(ExclusionRuleKind::SlackChannel, "C1234567890");
        r.active = false;
        let engine = ExclusionEngine::new(vec![r]);
        assert!(!engine.should_exclude("C1234567890_2024-01-15", ExclusionRuleKind::SlackChannel));
    }

    #[test]
    fn malformed_glob_fails_open_rather_than_panicking() {
        let engine = ExclusionEngine::new(vec![rule(ExclusionRuleKind::GithubFile, "[unterminated")]);
        assert!(!engine.should_exclude("acme/repo/file.rs", ExclusionRuleKind::GithubFile));
    }
}
