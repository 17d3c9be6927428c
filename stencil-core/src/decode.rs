//! Value decoding shared by the [`Param`](crate::Param) implementations

use crate::classify::Raw;
use crate::form;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

/// Decode a simple value from text
pub fn parse_text<T>(raw: Raw<'_>) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Raw::Text(text) => text.parse::<T>().map_err(|e| e.to_string()),
        other => Err(format!("expected a text value, got {}", other.describe())),
    }
}

/// Whether a body should be read as JSON: no content type, `application/json`
/// or a `+json` suffix
pub fn is_json(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.is_empty() || essence == "application/json" || essence.ends_with("+json")
}

/// Decode a structured value.
///
/// Bodies are JSON when the content type says so or is absent; any other
/// declared content type is read as flat form fields, every required field
/// present in a convertible shape. Flattened query fields are decoded as a
/// flat form. Text is read as JSON (textual defaults).
pub fn decode_structured<T: DeserializeOwned>(raw: Raw<'_>) -> Result<T, String> {
    match raw {
        Raw::Body { data, content_type } if is_json(content_type) => {
            serde_json::from_slice(data).map_err(|e| format!("invalid JSON body: {}", e))
        }
        Raw::Body { data, .. } => {
            serde_urlencoded::from_bytes(data).map_err(|e| format!("invalid form body: {}", e))
        }
        Raw::Fields(fields) => decode_fields(fields),
        Raw::Text(text) => {
            serde_json::from_str(text).map_err(|e| format!("invalid JSON value: {}", e))
        }
        Raw::Injected(_) => Err("structured value cannot be read from the request context".into()),
    }
}

/// Like [`decode_structured`], but non-JSON bodies are applied field by
/// field on top of `T::default()`; unknown or unconvertible fields are skipped.
pub fn decode_structured_lenient<T>(raw: Raw<'_>) -> Result<T, String>
where
    T: DeserializeOwned + Serialize + Default,
{
    match raw {
        Raw::Body { data, content_type } if !is_json(content_type) => {
            form::decode_lenient(data).map_err(|e| e.to_string())
        }
        other => decode_structured(other),
    }
}

/// Decode flat key/value pairs into `T`
pub fn decode_fields<T: DeserializeOwned>(fields: &[(String, String)]) -> Result<T, String> {
    let encoded = serde_urlencoded::to_string(fields).map_err(|e| e.to_string())?;
    serde_urlencoded::from_str(&encoded).map_err(|e| format!("invalid query fields: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Query {
        page: u32,
        size: Option<u32>,
        name: String,
    }

    #[test]
    fn test_is_json() {
        assert!(is_json(None));
        assert!(is_json(Some("application/json")));
        assert!(is_json(Some("Application/JSON; charset=utf-8")));
        assert!(is_json(Some("application/problem+json")));
        assert!(!is_json(Some("application/x-www-form-urlencoded")));
        assert!(!is_json(Some("text/plain")));
    }

    #[test]
    fn test_decode_fields_converts_scalars() {
        let fields = vec![
            ("page".to_string(), "3".to_string()),
            ("name".to_string(), "a b".to_string()),
        ];
        let query: Query = decode_fields(&fields).unwrap();
        assert_eq!(
            query,
            Query {
                page: 3,
                size: None,
                name: "a b".to_string()
            }
        );
    }

    #[test]
    fn test_decode_structured_defaults_to_json() {
        let raw = Raw::Body {
            data: br#"{"page": 1, "name": "x"}"#,
            content_type: None,
        };
        let query: Query = decode_structured(raw).unwrap();
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_decode_structured_strict_form_rejects_bad_field() {
        let raw = Raw::Body {
            data: b"page=abc&name=x",
            content_type: Some("application/x-www-form-urlencoded"),
        };
        assert!(decode_structured::<Query>(raw).is_err());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let raw = Raw::Body {
            data: b"{not json",
            content_type: Some("application/json"),
        };
        let err = decode_structured::<Query>(raw).unwrap_err();
        assert!(err.starts_with("invalid JSON body"));
    }

    #[test]
    fn test_other_content_types_decode_as_fields() {
        let raw = Raw::Body {
            data: b"page=2&name=Edsger",
            content_type: Some("text/plain"),
        };
        let query: Query = decode_structured(raw).unwrap();
        assert_eq!(query.page, 2);
        assert_eq!(query.name, "Edsger");
    }

    #[test]
    fn test_lenient_skips_unconvertible_fields_of_any_non_json_body() {
        #[derive(Debug, Default, Serialize, Deserialize)]
        struct Draft {
            title: String,
            words: u32,
        }

        let raw = Raw::Body {
            data: b"title=Notes&words=many",
            content_type: Some("text/plain; charset=utf-8"),
        };
        let draft: Draft = decode_structured_lenient(raw).unwrap();
        assert_eq!(draft.title, "Notes");
        assert_eq!(draft.words, 0);
    }
}
