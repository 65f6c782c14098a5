// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Text sanitising for collector values.
//!
//! Devices regularly report version strings and serial numbers as binary
//! garbage. Such values would corrupt identity matching and violate the
//! store's text constraints, so they are replaced with an escaped
//! representation before use.

use crate::diagnostics::Diagnostics;
use crate::model::{Shadow, Value};

/// Escaped, always-valid textual representation of raw bytes.
///
/// Printable ASCII passes through; everything else becomes `\xNN` or a
/// standard escape.
#[must_use]
pub fn safe_repr(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}

/// Turn a raw `Bytes` value into text.
///
/// Valid UTF-8 is decoded as is. Invalid input becomes [`safe_repr`] and
/// `true` is returned so the caller can report the correction.
pub fn normalize_value(value: &mut Value) -> bool {
    let Value::Bytes(bytes) = value else {
        return false;
    };
    match String::from_utf8(std::mem::take(bytes)) {
        Ok(text) => {
            *value = Value::Text(text);
            false
        }
        Err(err) => {
            *value = Value::Text(safe_repr(err.as_bytes()));
            true
        }
    }
}

/// Turn every raw attribute of a shadow into text, recording a correction
/// for each value that was not valid text.
///
/// Lookup keys and stored rows only ever hold text, so this has to run
/// before a shadow is matched against the store.
pub fn fix_binary_garbage(shadow: &mut Shadow, diag: &mut Diagnostics) {
    let kind = shadow.kind();
    let key = shadow.key().to_string();
    for (name, value) in shadow.fields_mut() {
        if !matches!(value, Value::Bytes(_)) {
            continue;
        }
        let original = value.clone();
        if normalize_value(value) {
            diag.correction(
                kind,
                &key,
                name,
                format!("invalid value for {}: {}, stored as {}", name, original, value),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityKind, ShadowKey};

    #[test]
    fn test_safe_repr_is_escaped() {
        assert_eq!(safe_repr(&[0xff, b'A', b'\n']), "\\xffA\\n");
    }

    #[test]
    fn test_normalize_valid_bytes_becomes_text() {
        let mut value = Value::Bytes(b"12.2(55)SE".to_vec());
        assert!(!normalize_value(&mut value));
        assert_eq!(value, Value::Text("12.2(55)SE".into()));
    }

    #[test]
    fn test_normalize_invalid_bytes_is_reported() {
        let mut value = Value::Bytes(vec![0x80, 0x81]);
        assert!(normalize_value(&mut value));
        assert_eq!(value, Value::Text("\\x80\\x81".into()));
    }

    #[test]
    fn test_normalize_leaves_other_values() {
        let mut value = Value::Int(3);
        assert!(!normalize_value(&mut value));
        assert_eq!(value, Value::Int(3));
    }

    #[test]
    fn test_fix_binary_garbage_decodes_every_raw_field() {
        let mut shadow = Shadow::new(EntityKind::Device, ShadowKey::Root);
        shadow
            .set("serial", vec![0xde, 0xad, 0xbe, 0xef])
            .set("software_version", b"15.2(7)E".to_vec())
            .set("hardware_version", "V02");
        let mut diag = Diagnostics::new("gw1");

        fix_binary_garbage(&mut shadow, &mut diag);

        assert_eq!(shadow.text("serial"), Some("\\xde\\xad\\xbe\\xef"));
        assert_eq!(shadow.text("software_version"), Some("15.2(7)E"));
        assert_eq!(shadow.text("hardware_version"), Some("V02"));
        assert_eq!(diag.corrections().len(), 1);
        assert_eq!(diag.corrections()[0].field, "serial");
    }
}
