use serde::Serialize;

/// One unit (tag or plugin) that did not make it, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitIssue {
    pub key: String,
    pub reason: String,
}

impl UnitIssue {
    pub fn new(key: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Outcome of a batch of element definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DefineReport {
    pub defined: Vec<String>,
    pub skipped: Vec<UnitIssue>,
    pub failed: Vec<UnitIssue>,
}

impl DefineReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of a batch of plugin installs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub installed: Vec<String>,
    pub failed: Vec<UnitIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub uninstalled: Vec<String>,
    pub failed: Vec<UnitIssue>,
}

/// Serializable view of one registry slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub key: String,
    pub active: bool,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
