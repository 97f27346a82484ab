//! Runtime settings, loaded from an optional JSON file. Every field has a
//! default so a partial file (or none at all) is valid.

use crate::domain::limits::PayLimits;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub storage: StorageSettings,
    pub pay_limits: PayLimits,
    pub permissions: PermissionSettings,
    pub pay_pending: PendingSettings,
    pub session: SessionSettings,
    pub players: PlayerSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub use_durable_backend: bool,
    pub durable: DurableSettings,
    /// Directory holding the flat-file fallback.
    pub data_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            use_durable_backend: false,
            durable: DurableSettings::default(),
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurableSettings {
    pub path: PathBuf,
}

impl Default for DurableSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/economy-db"),
        }
    }
}

/// Permission names checked through the host. An empty name, `none` or
/// `disabled` means no permission is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionSettings {
    pub pay_use: String,
    pub balance_use: String,
    pub bypass_min: String,
    pub bypass_max: String,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            pay_use: "vault.pay".to_string(),
            balance_use: "vault.balance".to_string(),
            bypass_min: "vault.pay.bypass_min".to_string(),
            bypass_max: "vault.pay.bypass_max".to_string(),
        }
    }
}

/// Returns the permission to check, or `None` when the gate is switched off.
pub fn required_permission(name: &str) -> Option<&str> {
    let name = name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case("none") || name.eq_ignore_ascii_case("disabled")
    {
        None
    } else {
        Some(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendingSettings {
    pub max_on_join: usize,
}

impl Default for PendingSettings {
    fn default() -> Self {
        Self { max_on_join: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub cancel_keywords: Vec<String>,
    /// Idle seconds before an unfinished session is dropped. Zero disables.
    pub timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cancel_keywords: vec!["cancel".to_string(), "cancelar".to_string()],
            timeout_secs: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Resolve names nobody has seen to their deterministic offline id.
    pub offline_id_fallback: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            offline_id_fallback: true,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let json = r#"{ "pay_limits": { "min": 5 }, "pay_pending": { "max_on_join": 2 } }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.pay_limits.min, dec!(5));
        assert_eq!(settings.pay_limits.max, dec!(0));
        assert_eq!(settings.pay_pending.max_on_join, 2);
        assert_eq!(settings.permissions.pay_use, "vault.pay");
        assert_eq!(settings.session.cancel_keywords, vec!["cancel", "cancelar"]);
        assert!(!settings.storage.use_durable_backend);
        assert!(settings.players.offline_id_fallback);
    }

    #[test]
    fn test_disabled_permission_spellings() {
        assert_eq!(required_permission("vault.pay"), Some("vault.pay"));
        assert_eq!(required_permission(" "), None);
        assert_eq!(required_permission("None"), None);
        assert_eq!(required_permission("DISABLED"), None);
    }
}
