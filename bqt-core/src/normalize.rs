//! Value normalization ahead of cell comparison
//!
//! Large objects and byte sequences on the actual side are turned into text so
//! they compare against the textual form kept in expected results. Whenever
//! the actual value is converted, the expected value is coerced to its text
//! form as well.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::types::{unbox_bytes, Value};

/// Actual and expected values ready for comparison
pub type NormalizedPair<'a> = (Cow<'a, Value>, Cow<'a, Value>);

/// Convert large-object and binary actual values into comparable text
///
/// Values that need no conversion are passed through borrowed.
pub fn normalize_pair<'a>(actual: &'a Value, expected: &'a Value) -> Result<NormalizedPair<'a>> {
    let converted = match actual {
        Value::Clob(lob) => lob
            .read_string()
            .map_err(|e| Error::large_object(format!("failed to read clob: {}", e)))?,
        Value::Xml(lob) => lob
            .read_string()
            .map_err(|e| Error::large_object(format!("failed to read xml: {}", e)))?,
        Value::Blob(lob) => {
            let bytes = lob
                .read_bytes()
                .map_err(|e| Error::large_object(format!("failed to read blob: {}", e)))?;
            BASE64.encode(bytes)
        }
        Value::Bytes(bytes) => BASE64.encode(bytes),
        Value::BoxedBytes(bytes) => BASE64.encode(unbox_bytes(bytes)),
        _ => return Ok((Cow::Borrowed(actual), Cow::Borrowed(expected))),
    };

    Ok((Cow::Owned(Value::Text(converted)), coerce_to_text(expected)))
}

fn coerce_to_text(value: &Value) -> Cow<'_, Value> {
    match value {
        Value::Text(_) | Value::Null => Cow::Borrowed(value),
        other => Cow::Owned(Value::Text(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LargeObject, LobSource};
    use std::io::Read;
    use std::sync::Arc;

    #[derive(Debug)]
    struct BrokenStream;

    impl LobSource for BrokenStream {
        fn open(&self) -> std::io::Result<Box<dyn Read + '_>> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "connection reset"))
        }
    }

    #[test]
    fn test_plain_values_pass_through() {
        let actual = Value::Integer(3);
        let expected = Value::Integer(3);
        let (a, e) = normalize_pair(&actual, &expected).unwrap();
        assert!(matches!(a, Cow::Borrowed(_)));
        assert!(matches!(e, Cow::Borrowed(_)));
    }

    #[test]
    fn test_clob_decoded_and_expected_coerced() {
        let actual = Value::Clob(LargeObject::from_bytes("<a>42</a>"));
        let expected = Value::Integer(42);
        let (a, e) = normalize_pair(&actual, &expected).unwrap();
        assert_eq!(*a, Value::Text("<a>42</a>".into()));
        assert_eq!(*e, Value::Text("42".into()));
    }

    #[test]
    fn test_blob_and_bytes_base64() {
        let expected = Value::from("AQID");
        let blob = Value::Blob(LargeObject::from_bytes(vec![1u8, 2, 3]));
        let (a, _) = normalize_pair(&blob, &expected).unwrap();
        assert_eq!(*a, Value::from("AQID"));

        let raw = Value::Bytes(vec![1, 2, 3]);
        let (a, _) = normalize_pair(&raw, &expected).unwrap();
        assert_eq!(*a, Value::from("AQID"));

        let boxed = Value::BoxedBytes(vec![1, 2, 3]);
        let (a, _) = normalize_pair(&boxed, &expected).unwrap();
        assert_eq!(*a, Value::from("AQID"));
    }

    #[test]
    fn test_stream_failure_is_fatal() {
        let actual = Value::Xml(LargeObject::from_source(Arc::new(BrokenStream)));
        let expected = Value::from("<x/>");
        let err = normalize_pair(&actual, &expected).unwrap_err();
        assert!(matches!(err, Error::LargeObject(_)));
        assert!(err.to_string().contains("connection reset"));
    }
}
