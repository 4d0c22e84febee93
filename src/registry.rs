//! Namespaced uniqueness registry
//!
//! A registry record is an ordinary transaction from the reserving account to
//! the burn address with `amount = 0`, the namespace fee as `fee`, and a
//! payload of the form `{"namespace", "key", "attributes"}`. Nothing is stored
//! outside the chain: a key is taken once a confirmed transaction carries it.
//!
//! Startups, NFTs, tokens and DApps are all [`Namespace`] descriptors over the
//! same mechanism. They differ only in fee and in which attributes are checked.

use crate::economics::{
    positive_within_supply, within_supply, DAPP_FEE, NFT_FEE, STARTUP_FEE, TOKEN_FEE,
};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute constraints for one registry category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Namespace {
    pub name: &'static str,
    /// Fee burned by a reservation.
    pub fee: u64,
    /// String attributes that must be non-empty and unique across the
    /// namespace, in addition to the key.
    pub unique_fields: &'static [&'static str],
    /// Numeric attributes that must lie in `(0, MAX_SUPPLY]`.
    pub positive_fields: &'static [&'static str],
    /// Attributes that must start with `http://` or `https://`.
    pub url_fields: &'static [&'static str],
}

pub const STARTUP: Namespace = Namespace {
    name: "startup",
    fee: STARTUP_FEE,
    unique_fields: &[],
    positive_fields: &["required_funds"],
    url_fields: &[],
};

pub const NFT: Namespace = Namespace {
    name: "nft",
    fee: NFT_FEE,
    unique_fields: &[],
    positive_fields: &["price"],
    url_fields: &[],
};

pub const TOKEN: Namespace = Namespace {
    name: "token",
    fee: TOKEN_FEE,
    unique_fields: &["symbol"],
    positive_fields: &["supply", "price"],
    url_fields: &[],
};

pub const DAPP: Namespace = Namespace {
    name: "dapp",
    fee: DAPP_FEE,
    unique_fields: &[],
    positive_fields: &[],
    url_fields: &["url"],
};

pub const NAMESPACES: [Namespace; 4] = [STARTUP, NFT, TOKEN, DAPP];

/// Look up a registered namespace by name.
pub fn namespace(name: &str) -> Option<&'static Namespace> {
    NAMESPACES.iter().find(|ns| ns.name == name)
}

/// Accepts `http://` and `https://` locations only.
pub fn has_web_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Registry record as carried in a transaction payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub namespace: String,
    pub key: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl RegistryEntry {
    pub fn new(namespace: &str, key: &str, attributes: Map<String, Value>) -> Self {
        RegistryEntry {
            namespace: namespace.to_string(),
            key: key.to_string(),
            attributes,
        }
    }

    /// Decode a payload. Payloads that are not registry records yield `None`.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }

    pub fn to_payload(&self) -> Value {
        let mut object = Map::new();
        object.insert("namespace".to_string(), Value::String(self.namespace.clone()));
        object.insert("key".to_string(), Value::String(self.key.clone()));
        object.insert(
            "attributes".to_string(),
            Value::Object(self.attributes.clone()),
        );
        Value::Object(object)
    }

    /// Value of a unique string attribute, if present.
    pub fn unique_value(&self, field: &str) -> Option<&str> {
        self.attributes.get(field).and_then(Value::as_str)
    }
}

impl Namespace {
    /// Check key and attributes against this namespace's constraints.
    /// Uniqueness is checked by the ledger, which owns the history.
    pub fn validate(&self, key: &str, attributes: &Map<String, Value>) -> Result<()> {
        if key.trim().is_empty() {
            return Err(LedgerError::InvalidRegistryField(format!(
                "{} key must not be empty",
                self.name
            )));
        }

        for field in self.unique_fields {
            match attributes.get(*field).and_then(Value::as_str) {
                Some(value) if !value.trim().is_empty() => {}
                _ => {
                    return Err(LedgerError::InvalidRegistryField(format!(
                        "{}.{} must be a non-empty string",
                        self.name, field
                    )))
                }
            }
        }

        for field in self.positive_fields {
            let value = attributes.get(*field).and_then(Value::as_u64);
            if !value.is_some_and(positive_within_supply) {
                return Err(LedgerError::InvalidRegistryField(format!(
                    "{}.{} must be a positive integer no greater than the maximum supply",
                    self.name, field
                )));
            }
        }

        for field in self.url_fields {
            let value = attributes.get(*field).and_then(Value::as_str);
            if !value.is_some_and(has_web_scheme) {
                return Err(LedgerError::InvalidRegistryField(format!(
                    "{}.{} must start with http:// or https://",
                    self.name, field
                )));
            }
        }

        Ok(())
    }

    /// Check a caller supplied fee: at least the namespace fee, within supply.
    pub fn validate_fee(&self, fee: u64) -> Result<()> {
        if fee < self.fee || !within_supply(fee) {
            return Err(LedgerError::InvalidAmountOrFee(format!(
                "{} reservations burn between {} and the maximum supply, got {}",
                self.name, self.fee, fee
            )));
        }
        Ok(())
    }
}
