use chrono::NaiveDate;
use serde::Deserialize;

/// One stored snapshot: a day's usage metrics for one organization.
///
/// The payload is parsed from the raw JSON text kept in the `data` column.
/// Rows with an unparseable payload surface as [`DaySnapshot::default`],
/// which contributes zero to every aggregate.
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    pub org: String,
    pub date: NaiveDate,
    pub data: DaySnapshot,
}

/// Daily snapshot payload as delivered by the metrics API.
///
/// Every level defaults to empty so that a missing or null subtree
/// contributes nothing instead of failing the whole batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaySnapshot {
    #[serde(default)]
    pub total_active_users: i64,
    #[serde(default)]
    pub total_engaged_users: i64,
    #[serde(default)]
    pub copilot_ide_code_completions: Option<CodeCompletions>,
}

impl DaySnapshot {
    /// Editors with code-completion activity, empty when the subtree is absent.
    pub fn editors(&self) -> &[EditorMetrics] {
        self.copilot_ide_code_completions
            .as_ref()
            .map(|c| c.editors.as_slice())
            .unwrap_or_default()
    }
}

/// The `copilot_ide_code_completions` subtree.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodeCompletions {
    #[serde(default)]
    pub editors: Vec<EditorMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditorMetrics {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub models: Vec<ModelMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelMetrics {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub languages: Vec<LanguageMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LanguageMetrics {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub total_code_lines_suggested: i64,
    #[serde(default)]
    pub total_code_lines_accepted: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_subtrees_default_to_zero() {
        let snapshot: DaySnapshot =
            serde_json::from_str(r#"{"date": "2025-06-02"}"#).expect("minimal payload");
        assert_eq!(snapshot.total_active_users, 0);
        assert_eq!(snapshot.total_engaged_users, 0);
        assert!(snapshot.editors().is_empty());
    }

    #[test]
    fn null_completions_subtree_is_empty() {
        let snapshot: DaySnapshot = serde_json::from_str(
            r#"{"total_active_users": 5, "copilot_ide_code_completions": null}"#,
        )
        .expect("null subtree");
        assert_eq!(snapshot.total_active_users, 5);
        assert!(snapshot.editors().is_empty());
    }

    #[test]
    fn nested_tree_parses() {
        let snapshot: DaySnapshot = serde_json::from_str(
            r#"{
                "total_active_users": 12,
                "total_engaged_users": 9,
                "copilot_ide_code_completions": {
                    "editors": [{
                        "name": "vscode",
                        "models": [{
                            "name": "default",
                            "languages": [{
                                "name": "rust",
                                "total_code_lines_suggested": 120,
                                "total_code_lines_accepted": 80
                            }]
                        }]
                    }]
                }
            }"#,
        )
        .expect("full payload");

        let editors = snapshot.editors();
        assert_eq!(editors.len(), 1);
        assert_eq!(editors[0].name, "vscode");
        assert_eq!(
            editors[0].models[0].languages[0].total_code_lines_suggested,
            120
        );
    }
}
