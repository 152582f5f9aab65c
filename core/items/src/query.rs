//! Decoding of item listing responses.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use vaultserve_common::{Error, Result};

use crate::item::{ItemKind, SecureNoteRecord, VaultItem, VaultRecord};

/// Response envelope: `{success, data: {data: [item, ...]}}`.
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ListData>,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    data: Option<Vec<Value>>,
}

/// Outcome of a vault query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    /// Whether the server reported success.
    pub succeeded: bool,
    /// Decoded items, in server order.
    pub items: Vec<VaultItem>,
}

impl QueryResult {
    /// An unsuccessful result with no items.
    pub fn failed() -> Self {
        Self::default()
    }

    /// Whether there are no items, regardless of `succeeded`.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VaultItem> {
        self.items.iter()
    }
}

impl IntoIterator for QueryResult {
    type Item = VaultItem;
    type IntoIter = std::vec::IntoIter<VaultItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Decode an item listing body.
///
/// # Errors
/// - `Serialization` if the body is not a well-formed envelope
/// - `UnknownItemType` if any item has a missing or unrecognised `type`;
///   the whole listing fails rather than dropping that item
pub fn decode(body: impl AsRef<[u8]>) -> Result<QueryResult> {
    let response: ListResponse = serde_json::from_slice(body.as_ref())?;

    let raw_items = response
        .data
        .and_then(|data| data.data)
        .unwrap_or_default();

    let items = raw_items
        .iter()
        .map(decode_item)
        .collect::<Result<Vec<_>>>()?;

    debug!(
        success = response.success,
        count = items.len(),
        "Decoded item listing"
    );

    Ok(QueryResult {
        succeeded: response.success,
        items,
    })
}

/// Decode a single entry, resolving its kind before touching any other field.
fn decode_item(raw: &Value) -> Result<VaultItem> {
    let object = raw
        .as_object()
        .ok_or_else(|| Error::Serialization("Vault item is not a JSON object".to_string()))?;

    let raw_type = object.get("type").filter(|value| !value.is_null());
    let kind = raw_type
        .and_then(Value::as_i64)
        .and_then(ItemKind::from_discriminator)
        .ok_or_else(|| {
            let discriminator = raw_type.map(Value::to_string);
            warn!(discriminator = ?discriminator, "Rejecting vault item with unknown type");
            Error::UnknownItemType(discriminator)
        })?;

    let name = string_field(object, "name").unwrap_or_default();

    let record = match kind {
        ItemKind::Login => VaultRecord::Login(nested_record(object, "login")?),
        ItemKind::SecureNote => VaultRecord::SecureNote(SecureNoteRecord {
            content: string_field(object, "notes"),
        }),
        ItemKind::Card => VaultRecord::Card(nested_record(object, "card")?),
        ItemKind::Identity => VaultRecord::Identity(nested_record(object, "identity")?),
    };

    Ok(VaultItem { name, record })
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Decode the kind-specific sub-object; absent or null gives an empty record.
fn nested_record<T>(object: &Map<String, Value>, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match object.get(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => T::deserialize(value)
            .map_err(|e| Error::Serialization(format!("Invalid `{}` object: {}", key, e))),
    }
}
