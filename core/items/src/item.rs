//! Vault item kinds and their record shapes.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Wire discriminator to item kind. The only place the mapping lives.
const DISCRIMINATORS: [(i64, ItemKind); 4] = [
    (1, ItemKind::Login),
    (2, ItemKind::SecureNote),
    (3, ItemKind::Card),
    (4, ItemKind::Identity),
];

/// Kind of a vault item, selected by the wire `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Login,
    SecureNote,
    Card,
    Identity,
}

impl ItemKind {
    /// Resolve a wire discriminator. Unknown values have no kind.
    pub fn from_discriminator(value: i64) -> Option<Self> {
        DISCRIMINATORS
            .iter()
            .find(|(discriminator, _)| *discriminator == value)
            .map(|(_, kind)| *kind)
    }

    /// The wire discriminator for this kind.
    pub fn discriminator(&self) -> i64 {
        DISCRIMINATORS
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(discriminator, _)| *discriminator)
            .unwrap_or_default()
    }

    /// Human readable label.
    pub fn friendly_name(&self) -> &'static str {
        match self {
            ItemKind::Login => "Login",
            ItemKind::SecureNote => "Secure Note",
            ItemKind::Card => "Card",
            ItemKind::Identity => "Identity",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.friendly_name())
    }
}

/// Treat an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Website login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRecord {
    #[serde(deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(deserialize_with = "null_as_default")]
    pub password: String,
    /// TOTP seed, if the login has one.
    #[serde(rename(deserialize = "totp"))]
    pub mfa_seed: Option<String>,
}

/// Free-form note. The content lives in the item's top-level `notes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecureNoteRecord {
    pub content: Option<String>,
}

/// Payment card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardRecord {
    #[serde(
        rename(deserialize = "cardholderName"),
        deserialize_with = "null_as_default"
    )]
    pub cardholder_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub brand: String,
    #[serde(deserialize_with = "null_as_default")]
    pub number: String,
    #[serde(rename(deserialize = "expMonth"), deserialize_with = "null_as_default")]
    pub expiration_month: String,
    #[serde(rename(deserialize = "expYear"), deserialize_with = "null_as_default")]
    pub expiration_year: String,
    #[serde(rename(deserialize = "code"), deserialize_with = "null_as_default")]
    pub security_code: String,
}

/// Personal identity details. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all(deserialize = "camelCase"))]
pub struct IdentityRecord {
    pub title: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(rename(deserialize = "address1"))]
    pub address_line1: Option<String>,
    #[serde(rename(deserialize = "address2"))]
    pub address_line2: Option<String>,
    #[serde(rename(deserialize = "address3"))]
    pub address_line3: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub ssn: Option<String>,
    pub username: Option<String>,
    #[serde(rename(deserialize = "passportNumber"))]
    pub document_number: Option<String>,
    pub license_number: Option<String>,
}

impl IdentityRecord {
    /// First, middle and last name joined by spaces, skipping blanks.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.first_name, &self.middle_name, &self.last_name]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Kind-specific payload of a vault item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VaultRecord {
    Login(LoginRecord),
    SecureNote(SecureNoteRecord),
    Card(CardRecord),
    Identity(IdentityRecord),
}

impl VaultRecord {
    /// The kind this record belongs to.
    pub fn kind(&self) -> ItemKind {
        match self {
            VaultRecord::Login(_) => ItemKind::Login,
            VaultRecord::SecureNote(_) => ItemKind::SecureNote,
            VaultRecord::Card(_) => ItemKind::Card,
            VaultRecord::Identity(_) => ItemKind::Identity,
        }
    }
}

/// A decoded vault item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultItem {
    /// Display name of the item.
    pub name: String,
    /// Kind-specific fields.
    #[serde(flatten)]
    pub record: VaultRecord,
}

impl VaultItem {
    /// Create an item from its parts.
    pub fn new(name: impl Into<String>, record: VaultRecord) -> Self {
        Self {
            name: name.into(),
            record,
        }
    }

    /// The item kind.
    pub fn kind(&self) -> ItemKind {
        self.record.kind()
    }

    /// Short identifying detail: the login username, the card brand or the
    /// identity's full name. Notes have none.
    pub fn summary(&self) -> Option<String> {
        let detail = match &self.record {
            VaultRecord::Login(login) => Some(login.username.clone()),
            VaultRecord::Card(card) => Some(card.brand.clone()),
            VaultRecord::Identity(identity) => identity.full_name(),
            VaultRecord::SecureNote(_) => None,
        };
        detail.filter(|value| !value.trim().is_empty())
    }

    pub fn as_login(&self) -> Option<&LoginRecord> {
        match &self.record {
            VaultRecord::Login(login) => Some(login),
            _ => None,
        }
    }

    pub fn as_secure_note(&self) -> Option<&SecureNoteRecord> {
        match &self.record {
            VaultRecord::SecureNote(note) => Some(note),
            _ => None,
        }
    }

    pub fn as_card(&self) -> Option<&CardRecord> {
        match &self.record {
            VaultRecord::Card(card) => Some(card),
            _ => None,
        }
    }

    pub fn as_identity(&self) -> Option<&IdentityRecord> {
        match &self.record {
            VaultRecord::Identity(identity) => Some(identity),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminator_table() {
        assert_eq!(ItemKind::from_discriminator(1), Some(ItemKind::Login));
        assert_eq!(ItemKind::from_discriminator(2), Some(ItemKind::SecureNote));
        assert_eq!(ItemKind::from_discriminator(3), Some(ItemKind::Card));
        assert_eq!(ItemKind::from_discriminator(4), Some(ItemKind::Identity));
        assert_eq!(ItemKind::from_discriminator(0), None);
        assert_eq!(ItemKind::from_discriminator(5), None);
        assert_eq!(ItemKind::from_discriminator(-1), None);
    }

    #[test]
    fn test_discriminator_is_inverse() {
        for kind in [
            ItemKind::Login,
            ItemKind::SecureNote,
            ItemKind::Card,
            ItemKind::Identity,
        ] {
            assert_eq!(ItemKind::from_discriminator(kind.discriminator()), Some(kind));
        }
    }

    #[test]
    fn test_friendly_names() {
        assert_eq!(ItemKind::SecureNote.friendly_name(), "Secure Note");
        assert_eq!(ItemKind::Card.to_string(), "Card");
    }

    #[test]
    fn test_login_null_fields() {
        let login: LoginRecord =
            serde_json::from_str(r#"{"username":null,"password":"pw","totp":null}"#).unwrap();
        assert_eq!(login.username, "");
        assert_eq!(login.password, "pw");
        assert_eq!(login.mfa_seed, None);
    }

    #[test]
    fn test_identity_full_name_skips_blanks() {
        let identity = IdentityRecord {
            first_name: Some("John".to_string()),
            middle_name: Some(" ".to_string()),
            last_name: Some("Doe".to_string()),
            ..Default::default()
        };
        assert_eq!(identity.full_name().as_deref(), Some("John Doe"));
        assert_eq!(IdentityRecord::default().full_name(), None);
    }

    #[test]
    fn test_summary_per_kind() {
        let login = VaultItem::new(
            "mail",
            VaultRecord::Login(LoginRecord {
                username: "user@example.com".to_string(),
                ..Default::default()
            }),
        );
        assert_eq!(login.summary().as_deref(), Some("user@example.com"));

        let card = VaultItem::new(
            "visa",
            VaultRecord::Card(CardRecord {
                brand: "Visa".to_string(),
                ..Default::default()
            }),
        );
        assert_eq!(card.summary().as_deref(), Some("Visa"));

        let note = VaultItem::new(
            "note",
            VaultRecord::SecureNote(SecureNoteRecord {
                content: Some("text".to_string()),
            }),
        );
        assert_eq!(note.summary(), None);

        let empty_login = VaultItem::new("empty", VaultRecord::Login(LoginRecord::default()));
        assert_eq!(empty_login.summary(), None);
    }

    #[test]
    fn test_item_serializes_with_kind_tag() {
        let item = VaultItem::new(
            "Test Card",
            VaultRecord::Card(CardRecord {
                brand: "Amex".to_string(),
                expiration_month: "3".to_string(),
                ..Default::default()
            }),
        );
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["name"], "Test Card");
        assert_eq!(json["kind"], "card");
        assert_eq!(json["brand"], "Amex");
        assert_eq!(json["expiration_month"], "3");
    }
}
