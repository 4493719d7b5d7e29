//! Classified outcome of one inspection.

use serde::{Deserialize, Serialize};

/// Whether the engine found anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Clean,
    Infected,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Clean => "clean",
            ScanStatus::Infected => "infected",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict produced by the inspection engine.
///
/// `threat_name` is empty for clean content, and may also be empty for
/// infected content when the engine output could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanVerdict {
    status: ScanStatus,
    threat_name: String,
}

impl ScanVerdict {
    pub fn clean() -> Self {
        Self {
            status: ScanStatus::Clean,
            threat_name: String::new(),
        }
    }

    pub fn infected(threat_name: impl Into<String>) -> Self {
        Self {
            status: ScanStatus::Infected,
            threat_name: threat_name.into(),
        }
    }

    pub fn status(&self) -> ScanStatus {
        self.status
    }

    pub fn threat_name(&self) -> &str {
        &self.threat_name
    }

    pub fn is_clean(&self) -> bool {
        self.status == ScanStatus::Clean
    }
}
