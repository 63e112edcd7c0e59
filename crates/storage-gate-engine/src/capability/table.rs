use super::Capability;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Failed to parse capability table: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Capability table rule {index} has max_sdk {max_sdk} below min_sdk {min_sdk}")]
    InvertedRange {
        index: usize,
        min_sdk: u32,
        max_sdk: u32,
    },
}

/// How missing capabilities are obtained on a given OS version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStrategy {
    /// System multi-permission prompt with a per-capability result
    Itemized,
    /// A single settings toggle; the result arrives only as a later lifecycle resume
    BroadAccess,
}

/// Capabilities required on the OS versions `min_sdk..=max_sdk`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRule {
    pub min_sdk: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sdk: Option<u32>,
    pub strategy: RequestStrategy,
    pub capabilities: Vec<Capability>,
}

impl CapabilityRule {
    pub fn applies_to(&self, sdk_version: u32) -> bool {
        sdk_version >= self.min_sdk && self.max_sdk.is_none_or(|max| sdk_version <= max)
    }
}

/// OS-version keyed capability requirements, supplied by the platform layer.
///
/// The first matching rule wins. A version with no matching rule requires nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityTable {
    #[serde(rename = "rule", default)]
    pub rules: Vec<CapabilityRule>,
}

impl CapabilityTable {
    /// Built-in table for Android.
    ///
    /// Up to API 29 the legacy read/write pair is requested through the runtime prompt
    /// (below API 23 the platform reports both as install-time grants). From API 30 the
    /// all-files-access toggle replaces them.
    pub fn android_default() -> Self {
        Self {
            rules: vec![
                CapabilityRule {
                    min_sdk: 0,
                    max_sdk: Some(29),
                    strategy: RequestStrategy::Itemized,
                    capabilities: vec![
                        Capability::ReadExternalStorage,
                        Capability::WriteExternalStorage,
                    ],
                },
                CapabilityRule {
                    min_sdk: 30,
                    max_sdk: None,
                    strategy: RequestStrategy::BroadAccess,
                    capabilities: vec![Capability::ManageExternalStorage],
                },
            ],
        }
    }

    /// A table with no rules: every OS version is treated as fully granted.
    pub fn unrestricted() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, TableError> {
        let table: CapabilityTable = toml::from_str(content)?;
        for (index, rule) in table.rules.iter().enumerate() {
            if let Some(max_sdk) = rule.max_sdk
                && max_sdk < rule.min_sdk
            {
                return Err(TableError::InvertedRange {
                    index,
                    min_sdk: rule.min_sdk,
                    max_sdk,
                });
            }
        }
        Ok(table)
    }

    pub fn rule_for(&self, sdk_version: u32) -> Option<&CapabilityRule> {
        self.rules.iter().find(|rule| rule.applies_to(sdk_version))
    }
}
