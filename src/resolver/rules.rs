//! Delivery classification rules.
//!
//! The name lists are heuristic and environment-specific, so they are
//! data: each category is a list of case-insensitive regex patterns,
//! overridable from the settings file. The defaults cover the legacy
//! edit family, Visual Studio, and WPF/Qt host windows.

use regex::{RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};

/// Delivery strategy family a target falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryCategory {
    /// Legacy edit controls: accept a direct paste message.
    ClassicEditControl,
    /// Single-HWND hosts for retained-mode toolkits (WPF, Qt).
    ManagedUiToolkitHost,
    /// IDE processes that drop direct messages.
    DeveloperEnvironmentProcess,
    Unclassified,
}

impl std::fmt::Display for DeliveryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ClassicEditControl => "classic-edit",
            Self::ManagedUiToolkitHost => "toolkit-host",
            Self::DeveloperEnvironmentProcess => "developer-environment",
            Self::Unclassified => "unclassified",
        };
        f.write_str(name)
    }
}

/// Pattern lists before compilation. Deserialized from the `rules`
/// section of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulePatterns {
    pub classic_edit_classes: Vec<String>,
    pub developer_processes: Vec<String>,
    pub toolkit_host_classes: Vec<String>,
}

impl Default for RulePatterns {
    fn default() -> Self {
        Self {
            classic_edit_classes: vec![r"^Edit$".into(), r"^RichEdit".into()],
            developer_processes: vec![r"^devenv$".into()],
            toolkit_host_classes: vec![r"^HwndWrapper\[".into(), r"^Qt".into()],
        }
    }
}

/// Compiled classification rules.
#[derive(Debug, Clone)]
pub struct ClassificationRules {
    classic_edit: RegexSet,
    developer: RegexSet,
    toolkit_host: RegexSet,
}

impl ClassificationRules {
    pub fn compile(patterns: &RulePatterns) -> Result<Self, regex::Error> {
        Ok(Self {
            classic_edit: build_set(&patterns.classic_edit_classes)?,
            developer: build_set(&patterns.developer_processes)?,
            toolkit_host: build_set(&patterns.toolkit_host_classes)?,
        })
    }

    /// Classify a (class name, process name) pair. First match wins:
    /// classic edit class, then developer process, then toolkit host
    /// class. Empty names never match.
    pub fn classify(&self, class_name: &str, process_name: &str) -> DeliveryCategory {
        if self.is_classic_edit(class_name) {
            DeliveryCategory::ClassicEditControl
        } else if self.is_developer_process(process_name) {
            DeliveryCategory::DeveloperEnvironmentProcess
        } else if self.is_toolkit_host(class_name) {
            DeliveryCategory::ManagedUiToolkitHost
        } else {
            DeliveryCategory::Unclassified
        }
    }

    pub fn is_classic_edit(&self, class_name: &str) -> bool {
        !class_name.is_empty() && self.classic_edit.is_match(class_name)
    }

    pub fn is_developer_process(&self, process_name: &str) -> bool {
        !process_name.is_empty() && self.developer.is_match(process_name)
    }

    pub fn is_toolkit_host(&self, class_name: &str) -> bool {
        !class_name.is_empty() && self.toolkit_host.is_match(class_name)
    }
}

impl Default for ClassificationRules {
    fn default() -> Self {
        // Built-in patterns are covered by `default_patterns_compile`.
        Self::compile(&RulePatterns::default()).expect("built-in patterns are valid")
    }
}

fn build_set(patterns: &[String]) -> Result<RegexSet, regex::Error> {
    RegexSetBuilder::new(patterns)
        .case_insensitive(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patterns_compile() {
        ClassificationRules::compile(&RulePatterns::default()).unwrap();
    }

    #[test]
    fn legacy_edit_family() {
        let rules = ClassificationRules::default();
        for class in ["Edit", "edit", "RichEdit20W", "RICHEDIT50W", "RichEdit"] {
            assert_eq!(
                rules.classify(class, "notepad"),
                DeliveryCategory::ClassicEditControl,
                "{class}"
            );
        }
        // Only an exact "Edit" counts; prefixes of other names do not.
        assert_eq!(
            rules.classify("EditPlus", ""),
            DeliveryCategory::Unclassified
        );
    }

    #[test]
    fn classic_edit_wins_over_developer_process() {
        let rules = ClassificationRules::default();
        assert_eq!(
            rules.classify("Edit", "devenv"),
            DeliveryCategory::ClassicEditControl
        );
    }

    #[test]
    fn developer_process_wins_over_toolkit_class() {
        let rules = ClassificationRules::default();
        assert_eq!(
            rules.classify("HwndWrapper[DefaultDomain;;abc]", "devenv"),
            DeliveryCategory::DeveloperEnvironmentProcess
        );
        assert_eq!(
            rules.classify("", "DevEnv"),
            DeliveryCategory::DeveloperEnvironmentProcess
        );
    }

    #[test]
    fn toolkit_hosts() {
        let rules = ClassificationRules::default();
        assert_eq!(
            rules.classify("HwndWrapper[app;;1234]", "app"),
            DeliveryCategory::ManagedUiToolkitHost
        );
        assert_eq!(
            rules.classify("Qt5152QWindowIcon", "telegram"),
            DeliveryCategory::ManagedUiToolkitHost
        );
    }

    #[test]
    fn unknown_names_are_unclassified() {
        let rules = ClassificationRules::default();
        assert_eq!(
            rules.classify("Chrome_WidgetWin_1", "chrome"),
            DeliveryCategory::Unclassified
        );
        assert_eq!(rules.classify("", ""), DeliveryCategory::Unclassified);
    }

    #[test]
    fn classification_is_deterministic() {
        let rules = ClassificationRules::default();
        let inputs = [
            ("Edit", "x"),
            ("Qt", "y"),
            ("Chrome_WidgetWin_1", "chrome"),
            ("", "devenv"),
        ];
        for (class, process) in inputs {
            let first = rules.classify(class, process);
            for _ in 0..10 {
                assert_eq!(rules.classify(class, process), first);
            }
            let recompiled = ClassificationRules::default();
            assert_eq!(recompiled.classify(class, process), first);
        }
    }

    #[test]
    fn custom_patterns_replace_defaults() {
        let patterns = RulePatterns {
            classic_edit_classes: vec![],
            developer_processes: vec![r"^(rider64|idea64)$".into()],
            toolkit_host_classes: vec![r"^SunAwt".into()],
        };
        let rules = ClassificationRules::compile(&patterns).unwrap();
        assert_eq!(rules.classify("Edit", ""), DeliveryCategory::Unclassified);
        assert_eq!(
            rules.classify("SunAwtFrame", "java"),
            DeliveryCategory::ManagedUiToolkitHost
        );
        assert_eq!(
            rules.classify("SunAwtFrame", "idea64"),
            DeliveryCategory::DeveloperEnvironmentProcess
        );
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let patterns = RulePatterns {
            classic_edit_classes: vec!["(".into()],
            ..RulePatterns::default()
        };
        assert!(ClassificationRules::compile(&patterns).is_err());
    }
}
