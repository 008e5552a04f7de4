use crate::errors::{AppError, AppResult};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use serde_json::Value;

/// Marker carried on a record so decryption knows which fields to reverse.
pub const ENCRYPTED_FIELDS_KEY: &str = "encryptedFields";

/// Encrypts selected fields of a JSON record before they reach storage.
///
/// A sealed field is replaced by `"<b64 nonce>.<b64 ciphertext>"` where the
/// plaintext is the field's JSON encoding, so any serializable value round
/// trips. Key sourcing (OS keyring, config, derivation) is the embedding
/// application's concern.
pub struct FieldCipher {
    key: [u8; 32],
}

impl FieldCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn generate() -> Self {
        Self { key: rand::random() }
    }

    /// Seals the named fields in place. Fields that are absent or null are
    /// skipped; the marker records exactly what was transformed. Calling this
    /// on a record that already carries a marker is rejected rather than
    /// double-encrypted.
    pub fn encrypt_fields(&self, record: &mut Value, field_names: &[&str]) -> AppResult<()> {
        let object = record
            .as_object_mut()
            .ok_or_else(|| AppError::Validation("record must be a JSON object".to_string()))?;
        if object.contains_key(ENCRYPTED_FIELDS_KEY) {
            return Err(AppError::Validation(
                "record already has encrypted fields".to_string(),
            ));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|error| AppError::Io(error.to_string()))?;

        let mut sealed = Vec::new();
        for name in field_names {
            let Some(value) = object.get(*name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            let plaintext = serde_json::to_string(value)?;
            let nonce_bytes: [u8; 12] = rand::random();
            let nonce = Nonce::from_slice(&nonce_bytes);
            let ciphertext = cipher
                .encrypt(nonce, plaintext.as_bytes())
                .map_err(|error| AppError::Io(error.to_string()))?;

            let encoded = format!(
                "{}.{}",
                base64::engine::general_purpose::STANDARD.encode(nonce_bytes),
                base64::engine::general_purpose::STANDARD.encode(ciphertext)
            );
            object.insert((*name).to_string(), Value::String(encoded));
            sealed.push(Value::String((*name).to_string()));
        }

        if !sealed.is_empty() {
            object.insert(ENCRYPTED_FIELDS_KEY.to_string(), Value::Array(sealed));
        }
        Ok(())
    }

    /// Reverses `encrypt_fields` using the record's marker, then drops the
    /// marker. A plaintext that no longer parses as JSON is handed back as a
    /// raw string instead of failing the whole record.
    pub fn decrypt_fields(&self, record: &mut Value) -> AppResult<()> {
        let object = record
            .as_object_mut()
            .ok_or_else(|| AppError::Validation("record must be a JSON object".to_string()))?;
        let Some(marker) = object.remove(ENCRYPTED_FIELDS_KEY) else {
            return Ok(());
        };
        let names: Vec<String> = marker
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|error| AppError::Io(error.to_string()))?;

        for name in names {
            let Some(Value::String(encoded)) = object.get(&name) else {
                continue;
            };
            let Some((nonce_part, cipher_part)) = encoded.split_once('.') else {
                return Err(AppError::Internal(format!(
                    "malformed encrypted field '{name}'"
                )));
            };

            let nonce_bytes = base64::engine::general_purpose::STANDARD
                .decode(nonce_part)
                .map_err(|error| AppError::Io(error.to_string()))?;
            let ciphertext = base64::engine::general_purpose::STANDARD
                .decode(cipher_part)
                .map_err(|error| AppError::Io(error.to_string()))?;
            if nonce_bytes.len() != 12 {
                return Err(AppError::Internal(format!(
                    "malformed encrypted field '{name}'"
                )));
            }

            let nonce = Nonce::from_slice(&nonce_bytes);
            let plaintext = cipher
                .decrypt(nonce, ciphertext.as_ref())
                .map_err(|error| AppError::Io(error.to_string()))?;
            let plaintext = String::from_utf8(plaintext)
                .map_err(|error| AppError::Internal(error.to_string()))?;

            let restored = serde_json::from_str::<Value>(&plaintext)
                .unwrap_or(Value::String(plaintext));
            object.insert(name, restored);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldCipher, ENCRYPTED_FIELDS_KEY};
    use serde_json::json;

    #[test]
    fn string_and_object_fields_round_trip() {
        let cipher = FieldCipher::generate();
        let original = json!({
            "title": "Launch teaser",
            "script": "INT. STUDIO - DAY",
            "outline": {"beats": ["hook", "payoff"], "seconds": 30},
            "views": 120
        });

        let mut record = original.clone();
        cipher
            .encrypt_fields(&mut record, &["script", "outline"])
            .expect("encrypt");
        assert_ne!(record["script"], original["script"]);
        assert_ne!(record["outline"], original["outline"]);
        // Untouched fields stay plaintext.
        assert_eq!(record["title"], original["title"]);
        assert_eq!(record[ENCRYPTED_FIELDS_KEY], json!(["script", "outline"]));

        cipher.decrypt_fields(&mut record).expect("decrypt");
        assert_eq!(record, original);
    }

    #[test]
    fn absent_and_null_fields_are_skipped() {
        let cipher = FieldCipher::generate();
        let mut record = json!({"title": "t", "script": null});
        cipher
            .encrypt_fields(&mut record, &["script", "missing"])
            .expect("encrypt");
        assert!(record.get(ENCRYPTED_FIELDS_KEY).is_none());
        assert_eq!(record, json!({"title": "t", "script": null}));
    }

    #[test]
    fn decrypt_without_marker_is_a_no_op() {
        let cipher = FieldCipher::generate();
        let mut record = json!({"title": "plain"});
        cipher.decrypt_fields(&mut record).expect("decrypt");
        assert_eq!(record, json!({"title": "plain"}));
    }

    #[test]
    fn double_encrypt_is_rejected() {
        let cipher = FieldCipher::generate();
        let mut record = json!({"script": "once"});
        cipher.encrypt_fields(&mut record, &["script"]).expect("first");
        let err = cipher
            .encrypt_fields(&mut record, &["script"])
            .expect_err("second");
        assert!(err.to_string().contains("already"));
    }

    #[test]
    fn wrong_key_fails_instead_of_garbling() {
        let cipher = FieldCipher::generate();
        let mut record = json!({"script": "secret"});
        cipher.encrypt_fields(&mut record, &["script"]).expect("encrypt");

        let other = FieldCipher::generate();
        assert!(other.decrypt_fields(&mut record).is_err());
    }

    #[test]
    fn non_json_plaintext_falls_back_to_raw_string() {
        // Seal a field, then simulate a legacy record whose plaintext was
        // stored bare rather than JSON-encoded.
        let key = [7u8; 32];
        let cipher = FieldCipher::new(key);

        use aes_gcm::aead::{Aead, KeyInit};
        use aes_gcm::{Aes256Gcm, Nonce};
        use base64::Engine;

        let aes = Aes256Gcm::new_from_slice(&key).expect("cipher");
        let nonce_bytes = [9u8; 12];
        let sealed = aes
            .encrypt(Nonce::from_slice(&nonce_bytes), "not json at all".as_bytes())
            .expect("seal");
        let encoded = format!(
            "{}.{}",
            base64::engine::general_purpose::STANDARD.encode(nonce_bytes),
            base64::engine::general_purpose::STANDARD.encode(sealed)
        );

        let mut record = serde_json::json!({
            "script": encoded,
            "encryptedFields": ["script"]
        });
        cipher.decrypt_fields(&mut record).expect("decrypt");
        assert_eq!(record["script"], "not json at all");
    }
}
