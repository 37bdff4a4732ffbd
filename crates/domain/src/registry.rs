//! Tracked accounts loaded once at startup.

use std::{collections::HashMap, fs, io, path::Path};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::model::Account;

/// Immutable address → alias mapping.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    aliases: HashMap<String, String>,
    // Load order, used for the subscription filter.
    addresses: Vec<String>,
}

impl AccountRegistry {
    /// Reads the JSON account source at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Like [`AccountRegistry::load`], but an unreadable or malformed source
    /// is logged and yields an empty registry so the process still starts.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(registry) => {
                info!(
                    accounts = registry.len(),
                    path = %path.display(),
                    "loaded tracked accounts"
                );
                registry
            }
            Err(err) => {
                error!(
                    error = %err,
                    path = %path.display(),
                    "failed to load accounts, tracking none"
                );
                Self::default()
            }
        }
    }

    /// Parses a JSON array of `{account, alias?}` records. Records without a
    /// string `account` are skipped; a missing alias becomes `"N/A"`.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigLoadError> {
        let records: Vec<Value> = serde_json::from_str(raw)?;
        let accounts = records.iter().filter_map(|record| {
            let address = record.get("account").and_then(Value::as_str);
            let Some(address) = address else {
                debug!(%record, "skipping account record without address");
                return None;
            };
            let alias = record.get("alias").map(|alias| match alias {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            });
            Some(Account::new(address, alias))
        });
        Ok(Self::from_accounts(accounts))
    }

    /// Builds a registry; a repeated address keeps its first position and its
    /// last alias.
    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let mut registry = Self::default();
        for account in accounts {
            if registry
                .aliases
                .insert(account.address.clone(), account.alias)
                .is_none()
            {
                registry.addresses.push(account.address);
            }
        }
        registry
    }

    pub fn contains(&self, address: &str) -> bool {
        self.aliases.contains_key(address)
    }

    pub fn alias_of(&self, address: &str) -> Option<&str> {
        self.aliases.get(address).map(String::as_str)
    }

    pub fn tracked_addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// The account source could not be read or parsed.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read account source: {0}")]
    Io(#[from] io::Error),
    #[error("malformed account source: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_records_and_defaults_alias() {
        let registry = AccountRegistry::from_json_str(
            r#"[
                {"account": "nano_1aaa", "alias": "cold"},
                {"account": "nano_1bbb"},
                {"alias": "orphan"},
                {"account": "nano_1ccc", "alias": 7}
            ]"#,
        )
        .expect("registry parses");

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.alias_of("nano_1aaa"), Some("cold"));
        assert_eq!(registry.alias_of("nano_1bbb"), Some("N/A"));
        assert_eq!(registry.alias_of("nano_1ccc"), Some("7"));
        assert!(!registry.contains("orphan"));
        assert_eq!(
            registry.tracked_addresses(),
            ["nano_1aaa", "nano_1bbb", "nano_1ccc"]
        );
    }

    #[test]
    fn duplicate_addresses_are_tracked_once() {
        let registry = AccountRegistry::from_accounts([
            Account::new("nano_1aaa", Some("first".into())),
            Account::new("nano_1aaa", Some("second".into())),
        ]);
        assert_eq!(registry.tracked_addresses(), ["nano_1aaa"]);
        assert_eq!(registry.alias_of("nano_1aaa"), Some("second"));
    }

    #[test]
    fn malformed_source_reports_parse_error() {
        let err = AccountRegistry::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigLoadError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_io_error() {
        let path = std::env::temp_dir().join(format!(
            "nano-notify-missing-{}.json",
            std::process::id()
        ));
        let err = AccountRegistry::load(&path).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Io(_)));
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "nano-notify-accounts-{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"[{"account": "nano_1disk", "alias": "disk"}]"#)
            .expect("write account file");
        let registry = AccountRegistry::load(&path).expect("registry loads");
        assert_eq!(registry.alias_of("nano_1disk"), Some("disk"));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn unreadable_sources_fall_back_to_empty_registry() {
        let missing = std::env::temp_dir().join(format!(
            "nano-notify-absent-{}.json",
            std::process::id()
        ));
        assert!(AccountRegistry::load_or_default(&missing).is_empty());

        let malformed = std::env::temp_dir().join(format!(
            "nano-notify-malformed-{}.json",
            std::process::id()
        ));
        fs::write(&malformed, "{\"account\": ").expect("write account file");
        let registry = AccountRegistry::load_or_default(&malformed);
        assert!(registry.is_empty());
        assert!(registry.tracked_addresses().is_empty());
        fs::remove_file(&malformed).ok();
    }

    #[test]
    fn load_or_default_keeps_valid_source() {
        let path = std::env::temp_dir().join(format!(
            "nano-notify-valid-{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"[{"account": "nano_1ok"}]"#).expect("write account file");
        let registry = AccountRegistry::load_or_default(&path);
        assert_eq!(registry.tracked_addresses(), ["nano_1ok"]);
        fs::remove_file(&path).ok();
    }
}
