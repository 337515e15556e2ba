//! Attestation records as returned by the EAS indexer, and the decode step
//! that turns their schema payload into typed registry fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{DaoChainFields, DocumentChainFields};

/// Length of an attestation UID: `0x` followed by 64 hex characters.
const UID_LEN: usize = 66;

/// A zero `bytes32`, used on-chain as "no reference".
pub const ZERO_UID: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Returns true when `uid` matches `^0x[a-fA-F0-9]{64}$`.
pub fn is_valid_uid(uid: &str) -> bool {
    uid.len() == UID_LEN
        && uid.starts_with("0x")
        && uid[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Raw attestation as it appears in the indexer's GraphQL response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub id: String,
    pub attester: String,
    /// Unix seconds.
    pub time: i64,
    pub revoked: bool,
    pub schema_id: String,
    #[serde(default)]
    pub decoded_data_json: String,
}

/// Failure to turn an indexer payload into typed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The attestation record itself is malformed.
    InvalidRecord(String),
    /// `decodedDataJson` is not the expected array of named items.
    InvalidPayload(String),
    /// A required schema field is absent or empty.
    MissingField(&'static str),
    /// A field is present but has the wrong type.
    InvalidField { field: &'static str, reason: String },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidRecord(msg) => write!(f, "invalid attestation record: {}", msg),
            DecodeError::InvalidPayload(msg) => write!(f, "invalid decodedDataJson: {}", msg),
            DecodeError::MissingField(field) => write!(f, "missing schema field '{}'", field),
            DecodeError::InvalidField { field, reason } => {
                write!(f, "invalid schema field '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<DecodeError> for crate::errors::AppError {
    fn from(err: DecodeError) -> Self {
        crate::errors::AppError::Unprocessable(err.to_string())
    }
}

/// One `{ name, type, value: { value } }` item of `decodedDataJson`.
#[derive(Debug, Deserialize)]
struct DecodedItem {
    name: String,
    value: DecodedValue,
}

#[derive(Debug, Deserialize)]
struct DecodedValue {
    #[serde(default)]
    value: Value,
}

/// Named schema fields of a decoded attestation payload.
#[derive(Debug, Default)]
pub struct DecodedFields {
    items: Vec<(String, Value)>,
}

impl DecodedFields {
    /// Parse the indexer's `decodedDataJson` string.
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        if raw.trim().is_empty() {
            return Err(DecodeError::InvalidPayload("empty payload".to_string()));
        }
        let items: Vec<DecodedItem> = serde_json::from_str(raw)
            .map_err(|e| DecodeError::InvalidPayload(e.to_string()))?;
        Ok(Self {
            items: items
                .into_iter()
                .map(|item| (item.name, item.value.value))
                .collect(),
        })
    }

    /// First field whose name matches one of `names`, case-insensitively.
    fn lookup(&self, names: &[&str]) -> Option<&Value> {
        names.iter().find_map(|wanted| {
            self.items
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                .map(|(_, value)| value)
        })
    }

    /// Optional text field. Numbers are rendered as decimal strings; empty strings are `None`.
    pub fn text(&self, field: &'static str, aliases: &[&str]) -> Result<Option<String>, DecodeError> {
        let Some(value) = self.lookup(aliases) else {
            return Ok(None);
        };
        let text = match value {
            Value::Null => return Ok(None),
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Object(_) => big_number(value)
                .map(|n| n.to_string())
                .ok_or_else(|| DecodeError::InvalidField {
                    field,
                    reason: "expected text".to_string(),
                })?,
            Value::Array(_) => {
                return Err(DecodeError::InvalidField {
                    field,
                    reason: "expected text, found array".to_string(),
                })
            }
        };
        Ok(if text.is_empty() { None } else { Some(text) })
    }

    /// Required text field.
    pub fn required_text(&self, field: &'static str, aliases: &[&str]) -> Result<String, DecodeError> {
        self.text(field, aliases)?
            .ok_or(DecodeError::MissingField(field))
    }

    /// Optional unsigned integer. Accepts JSON numbers, decimal strings and `BigNumber` objects.
    pub fn unsigned(&self, field: &'static str, aliases: &[&str]) -> Result<Option<u64>, DecodeError> {
        let Some(value) = self.lookup(aliases) else {
            return Ok(None);
        };
        let invalid = |reason: &str| DecodeError::InvalidField {
            field,
            reason: reason.to_string(),
        };
        match value {
            Value::Null => Ok(None),
            Value::Number(n) => n.as_u64().map(Some).ok_or_else(|| invalid("not an unsigned integer")),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| invalid("not an unsigned integer")),
            Value::Object(_) => big_number(value)
                .map(Some)
                .ok_or_else(|| invalid("unreadable BigNumber")),
            _ => Err(invalid("not an unsigned integer")),
        }
    }
}

/// Reads `{ "type": "BigNumber", "hex": "0x..." }` values that fit in a u64.
fn big_number(value: &Value) -> Option<u64> {
    let hex = value.get("hex")?.as_str()?;
    u64::from_str_radix(hex.trim_start_matches("0x"), 16).ok()
}

/// Normalizes an optional attestation reference: zero UIDs and empty strings mean "none".
fn optional_reference(
    value: Option<String>,
    field: &'static str,
) -> Result<Option<String>, DecodeError> {
    match value {
        None => Ok(None),
        Some(v) if v == ZERO_UID => Ok(None),
        Some(v) if is_valid_uid(&v) => Ok(Some(v)),
        Some(v) => Err(DecodeError::InvalidField {
            field,
            reason: format!("'{}' is not an attestation uid", v),
        }),
    }
}

impl Attestation {
    /// Checks record-level shape before any payload decoding.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if !is_valid_uid(&self.id) {
            return Err(DecodeError::InvalidRecord(format!(
                "'{}' is not an attestation uid",
                self.id
            )));
        }
        if self.time < 0 {
            return Err(DecodeError::InvalidRecord(format!(
                "negative timestamp {}",
                self.time
            )));
        }
        Ok(())
    }

    /// Decode a DAO registration attestation.
    pub fn decode_dao(&self) -> Result<DaoChainFields, DecodeError> {
        self.validate()?;
        let fields = DecodedFields::parse(&self.decoded_data_json)?;

        Ok(DaoChainFields {
            id: self.id.clone(),
            name: fields.required_text("name", &["name", "daoName"])?,
            description: fields.text("description", &["description", "daoDescription"])?,
            location: fields.text("location", &["location", "country"])?,
            member_count: fields.unsigned("memberCount", &["memberCount", "members"])?,
            size: fields.text("size", &["size", "daoSize"])?,
            admin_address: fields.text("adminAddress", &["adminAddress", "admin"])?,
            founding_date: fields.text("foundingDate", &["foundingDate", "founded"])?,
            attester: self.attester.clone(),
            attested_at: self.time,
            revoked: self.revoked,
        })
    }

    /// Decode a document attestation.
    pub fn decode_document(&self) -> Result<DocumentChainFields, DecodeError> {
        self.validate()?;
        let fields = DecodedFields::parse(&self.decoded_data_json)?;

        let dao_id = fields.required_text("daoId", &["daoId", "daoUid", "daoAttestationId"])?;
        if !is_valid_uid(&dao_id) {
            return Err(DecodeError::InvalidField {
                field: "daoId",
                reason: format!("'{}' is not an attestation uid", dao_id),
            });
        }

        let previous_version_id = optional_reference(
            fields.text(
                "previousVersionId",
                &["previousVersionId", "previousVersion", "previousVersionUid"],
            )?,
            "previousVersionId",
        )?;

        Ok(DocumentChainFields {
            id: self.id.clone(),
            dao_id,
            title: fields.required_text("title", &["title", "documentTitle"])?,
            document_type: fields
                .text("documentType", &["documentType", "docType", "type"])?
                .unwrap_or_else(|| "other".to_string()),
            hash: fields.required_text("hash", &["documentHash", "hash", "fileHash"])?,
            ipfs_cid: fields.text("ipfsCid", &["ipfsCid", "ipfsHash", "cid"])?,
            version: fields
                .text("version", &["version", "documentVersion"])?
                .unwrap_or_else(|| "1".to_string()),
            previous_version_id,
            schema_version: fields
                .text("schemaVersion", &["schemaVersion"])?
                .unwrap_or_else(|| "1".to_string()),
            attester: self.attester.clone(),
            attested_at: self.time,
            revoked: self.revoked,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_uid_format() {
        assert!(is_valid_uid(&uid(1)));
        assert!(is_valid_uid(
            "0xABCDEFabcdef0123456789ABCDEFabcdef0123456789ABCDEFabcdef01234567"
        ));
        assert!(!is_valid_uid("not-a-valid-hex-id"));
        assert!(!is_valid_uid("0x1234"));
        assert!(!is_valid_uid(&format!("1x{}", "0".repeat(64))));
        assert!(!is_valid_uid(&format!("0x{}g", "0".repeat(63))));
        assert!(!is_valid_uid(&format!("0x{}", "0".repeat(65))));
    }

    #[test]
    fn test_decode_dao() {
        let fields = dao(1, "Alpha DAO", 1_700_000_100).decode_dao().unwrap();
        assert_eq!(fields.id, uid(1));
        assert_eq!(fields.name, "Alpha DAO");
        assert_eq!(fields.location.as_deref(), Some("Berlin"));
        assert_eq!(fields.member_count, Some(42));
        assert_eq!(fields.founding_date.as_deref(), Some("1700000000"));
        assert_eq!(fields.attested_at, 1_700_000_100);
        assert!(!fields.revoked);
    }

    #[test]
    fn test_decode_document_aliases_and_zero_reference() {
        let fields = document(10, 1, "Charter", None, 5).decode_document().unwrap();
        assert_eq!(fields.dao_id, uid(1));
        assert_eq!(fields.title, "Charter");
        assert_eq!(fields.document_type, "governance");
        assert!(fields.previous_version_id.is_none());
        assert_eq!(fields.schema_version, "2");

        let next = document(11, 1, "Charter v2", Some(10), 6)
            .decode_document()
            .unwrap();
        assert_eq!(next.previous_version_id, Some(uid(10)));
    }

    #[test]
    fn test_decode_rejects_missing_required_field() {
        let mut att = dao(1, "x", 1);
        att.decoded_data_json = r#"[{"name":"location","type":"string","value":{"value":"Oslo"}}]"#.to_string();
        assert_eq!(att.decode_dao(), Err(DecodeError::MissingField("name")));
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        let mut att = dao(1, "x", 1);
        att.decoded_data_json = "{\"not\": \"an array\"}".to_string();
        assert!(matches!(att.decode_dao(), Err(DecodeError::InvalidPayload(_))));

        att.decoded_data_json = String::new();
        assert!(matches!(att.decode_dao(), Err(DecodeError::InvalidPayload(_))));
    }

    #[test]
    fn test_decode_rejects_malformed_record_id() {
        let mut att = dao(1, "x", 1);
        att.id = "0xshort".to_string();
        assert!(matches!(att.decode_dao(), Err(DecodeError::InvalidRecord(_))));
    }

    #[test]
    fn test_decode_rejects_bad_dao_reference() {
        let mut att = document(10, 1, "Charter", None, 5);
        att.decoded_data_json = att.decoded_data_json.replace(&uid(1), "0xnope");
        assert!(matches!(
            att.decode_document(),
            Err(DecodeError::InvalidField { field: "daoId", .. })
        ));
    }
}
