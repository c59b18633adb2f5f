use serde::{Deserialize, Serialize};

/// Installation strategy advertised by a manifest delivery entry.
///
/// Resolved once when the manifest is parsed; unrecognised names are kept
/// verbatim in `Unknown` so they can be reported, never guessed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstallMode {
    Archive,
    Installer,
    Unknown(String),
}

impl InstallMode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Archive => "archive",
            Self::Installer => "installer",
            Self::Unknown(raw) => raw,
        }
    }

    pub fn parse(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "archive" | "zip" => Self::Archive,
            "installer" | "setup" => Self::Installer,
            _ => Self::Unknown(input.trim().to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for InstallMode {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<InstallMode> for String {
    fn from(value: InstallMode) -> Self {
        value.as_str().to_string()
    }
}
