use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::collection::RuleCollection;
use crate::schema::RulesFile;

/// Load a [`RulesFile`] from a YAML file on disk.
///
/// Validates the file after deserialization (version check, unique rule names).
pub fn load_rules(path: impl AsRef<Path>) -> Result<RulesFile> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rules file: {}", path.display()))?;
    load_rules_from_str(&contents)
        .with_context(|| format!("failed to parse rules file: {}", path.display()))
}

/// Parse and validate a [`RulesFile`] from a YAML string.
pub fn load_rules_from_str(yaml: &str) -> Result<RulesFile> {
    let file: RulesFile = serde_yml::from_str(yaml).context("YAML deserialization failed")?;
    validate(&file)?;
    Ok(file)
}

/// Build every rule in `file` into a sorted [`RuleCollection`].
///
/// Fails on the first rule whose action or verb is invalid; the error names
/// the rule by its name or its position in the file.
pub fn build_collection(file: &RulesFile) -> Result<RuleCollection> {
    file.rules
        .iter()
        .enumerate()
        .map(|(idx, spec)| {
            spec.build().with_context(|| match &spec.name {
                Some(name) => format!("invalid rule '{name}'"),
                None => format!("invalid rule #{} in file", idx + 1),
            })
        })
        .collect()
}

/// Render a rules file as YAML, omitting facets that hold their defaults.
pub fn render_rules(file: &RulesFile) -> Result<String> {
    serde_yml::to_string(file).context("YAML serialization failed")
}

fn validate(file: &RulesFile) -> Result<()> {
    if file.version != "1.0" {
        bail!(
            "unsupported rules version '{}'; only '1.0' is supported",
            file.version
        );
    }

    // Names are optional, but those that are given must be unique.
    let mut seen = HashSet::new();
    for spec in &file.rules {
        let Some(name) = &spec.name else { continue };
        let name = name.trim();
        if name.is_empty() {
            bail!("rule name must not be blank");
        }
        if !seen.insert(name) {
            bail!("duplicate rule name: '{name}'");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::StaticPrincipal;
    use crate::verdict::Verdict;

    #[test]
    fn load_minimal_rules() {
        let yaml = r#"
version: "1.0"
rules: []
"#;
        let file = load_rules_from_str(yaml).unwrap();
        assert_eq!(file.version, "1.0");
        assert!(build_collection(&file).unwrap().is_empty());
    }

    #[test]
    fn reject_wrong_version() {
        let yaml = r#"
version: "2.0"
rules: []
"#;
        let err = load_rules_from_str(yaml).unwrap_err();
        assert!(
            err.to_string().contains("unsupported rules version"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn reject_duplicate_rule_names() {
        let yaml = r#"
version: "1.0"
rules:
  - name: "dup"
    action: allow
  - name: "dup "
    action: deny
"#;
        let err = load_rules_from_str(yaml).unwrap_err();
        assert!(
            err.to_string().contains("duplicate rule name"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn reject_blank_rule_name() {
        let yaml = r#"
version: "1.0"
rules:
  - name: "  "
    action: allow
"#;
        let err = load_rules_from_str(yaml).unwrap_err();
        assert!(
            err.to_string().contains("must not be blank"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn unnamed_rules_are_fine() {
        let yaml = r#"
version: "1.0"
rules:
  - action: allow
  - action: deny
"#;
        let file = load_rules_from_str(yaml).unwrap();
        assert_eq!(build_collection(&file).unwrap().len(), 2);
    }

    #[test]
    fn invalid_rule_is_reported_with_its_name() {
        let file = load_rules_from_str(
            r#"
version: "1.0"
rules:
  - name: "bad-verb"
    verb: delete
"#,
        )
        .unwrap();
        let err = build_collection(&file).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("bad-verb"), "unexpected error: {msg}");
        assert!(msg.contains("invalid rule verb"), "unexpected error: {msg}");
    }

    #[test]
    fn invalid_unnamed_rule_is_reported_by_position() {
        let file = load_rules_from_str(
            r#"
version: "1.0"
rules:
  - action: allow
  - action: maybe
"#,
        )
        .unwrap();
        let err = build_collection(&file).unwrap_err();
        assert!(
            err.to_string().contains("#2"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn load_from_nonexistent_file() {
        let err = load_rules("/does/not/exist.yaml").unwrap_err();
        assert!(
            err.to_string().contains("failed to read rules file"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn load_from_disk() {
        let path = std::env::temp_dir().join(format!("rulegate-loader-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            r#"
version: "1.0"
default_action: deny
rules:
  - name: "office"
    users: "@"
    ip: "192.168.*"
"#,
        )
        .unwrap();

        let file = load_rules(&path);
        std::fs::remove_file(&path).ok();
        let rules = build_collection(&file.unwrap()).unwrap();

        let alice = StaticPrincipal::user("alice");
        assert_eq!(rules.evaluate(&alice, "get", "192.168.1.5"), Verdict::Allow);
        assert_eq!(rules.evaluate(&alice, "get", "10.0.0.1"), Verdict::NoOpinion);
    }

    #[test]
    fn render_then_load_keeps_rules() {
        let file = load_rules_from_str(
            r#"
version: "1.0"
default_action: allow
rules:
  - name: "everyone"
  - name: "no-guests"
    action: Deny
    users: " ? "
    verb: Post
    priority: 1
"#,
        )
        .unwrap();
        let rules = build_collection(&file).unwrap();
        let compact = RulesFile::from_collection(&rules, file.default_action);
        let yaml = render_rules(&compact).unwrap();

        assert!(!yaml.contains("roles"), "default facets leaked: {yaml}");
        let reloaded = build_collection(&load_rules_from_str(&yaml).unwrap()).unwrap();
        assert_eq!(reloaded, rules);
    }
}
