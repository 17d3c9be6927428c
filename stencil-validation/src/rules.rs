//! Field rules behind `#[validate(..)]`.
//!
//! `#[derive(Structured)]` expands every field rule into one call to the
//! function of the same name here. Each function appends to the error list
//! instead of returning, so all failing rules of a value are reported together.
//! Optional fields that are `None` only fail `required`.

use crate::{IsEmail, Matches, Max, MaxLength, Min, MinLength, ValidationError};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;

static PATTERNS: Lazy<Mutex<HashMap<String, Matches>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Values that can be checked for presence
pub trait Presence {
    fn is_present(&self) -> bool;
}

/// Values that can be read as text
pub trait TextValue {
    fn as_text(&self) -> Option<&str>;
}

/// Values that can be read as a number
pub trait NumericValue {
    fn as_number(&self) -> Option<f64>;
}

impl Presence for String {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl Presence for str {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl<T: Presence> Presence for Option<T> {
    fn is_present(&self) -> bool {
        self.as_ref().is_some_and(Presence::is_present)
    }
}

impl<T> Presence for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl TextValue for String {
    fn as_text(&self) -> Option<&str> {
        Some(self)
    }
}

impl TextValue for str {
    fn as_text(&self) -> Option<&str> {
        Some(self)
    }
}

impl<T: TextValue> TextValue for Option<T> {
    fn as_text(&self) -> Option<&str> {
        self.as_ref().and_then(TextValue::as_text)
    }
}

impl<T: NumericValue> NumericValue for Option<T> {
    fn as_number(&self) -> Option<f64> {
        self.as_ref().and_then(NumericValue::as_number)
    }
}

macro_rules! numeric {
    ($($ty:ty),+) => {
        $(
            impl Presence for $ty {
                fn is_present(&self) -> bool {
                    true
                }
            }

            impl NumericValue for $ty {
                fn as_number(&self) -> Option<f64> {
                    Some(*self as f64)
                }
            }
        )+
    };
}

numeric!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

pub fn required<T: Presence + ?Sized>(value: &T, field: &str, errors: &mut Vec<ValidationError>) {
    if !value.is_present() {
        errors.push(
            ValidationError::new(field, format!("{} is required", field)).with_constraint("required"),
        );
    }
}

pub fn min_length<T: TextValue + ?Sized>(
    value: &T,
    field: &str,
    min: usize,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(Err(e)) = value.as_text().map(|text| MinLength(min).validate(text, field)) {
        errors.push(e);
    }
}

pub fn max_length<T: TextValue + ?Sized>(
    value: &T,
    field: &str,
    max: usize,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(Err(e)) = value.as_text().map(|text| MaxLength(max).validate(text, field)) {
        errors.push(e);
    }
}

pub fn email<T: TextValue + ?Sized>(value: &T, field: &str, errors: &mut Vec<ValidationError>) {
    if let Some(Err(e)) = value.as_text().map(|text| IsEmail::validate(text, field)) {
        errors.push(e);
    }
}

pub fn min<T: NumericValue + ?Sized>(
    value: &T,
    field: &str,
    min: f64,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(Err(e)) = value.as_number().map(|n| Min(min).validate(n, field)) {
        errors.push(e);
    }
}

pub fn max<T: NumericValue + ?Sized>(
    value: &T,
    field: &str,
    max: f64,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(Err(e)) = value.as_number().map(|n| Max(max).validate(n, field)) {
        errors.push(e);
    }
}

/// Match against a regex; compiled patterns are cached for the process lifetime
pub fn pattern<T: TextValue + ?Sized>(
    value: &T,
    field: &str,
    pattern: &str,
    errors: &mut Vec<ValidationError>,
) {
    let Some(text) = value.as_text() else {
        return;
    };

    let mut cache = match PATTERNS.lock() {
        Ok(cache) => cache,
        Err(poisoned) => poisoned.into_inner(),
    };

    if !cache.contains_key(pattern) {
        match Matches::new(pattern) {
            Ok(matcher) => {
                cache.insert(pattern.to_string(), matcher);
            }
            Err(e) => {
                errors.push(
                    ValidationError::new(field, format!("invalid pattern `{}`: {}", pattern, e))
                        .with_constraint("matches"),
                );
                return;
            }
        }
    }

    if let Some(Err(e)) = cache.get(pattern).map(|matcher| matcher.validate(text, field)) {
        errors.push(e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required() {
        let mut errors = Vec::new();
        required(&String::new(), "name", &mut errors);
        required(&None::<String>, "nick", &mut errors);
        required(&Some("x".to_string()), "alias", &mut errors);
        required(&Vec::<u8>::new(), "tags", &mut errors);
        required(&0u32, "count", &mut errors);

        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "nick", "tags"]);
    }

    #[test]
    fn test_optional_values_skip_other_rules() {
        let mut errors = Vec::new();
        min_length(&None::<String>, "nick", 3, &mut errors);
        email(&None::<String>, "email", &mut errors);
        min(&None::<i32>, "age", 18.0, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_numeric_bounds() {
        let mut errors = Vec::new();
        min(&17u8, "age", 18.0, &mut errors);
        max(&Some(200i64), "score", 100.0, &mut errors);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "age must be at least 18");
    }

    #[test]
    fn test_pattern() {
        let mut errors = Vec::new();
        pattern("abc-123", "code", r"^[a-z]+-\d+$", &mut errors);
        pattern("abc", "code", r"^[a-z]+-\d+$", &mut errors);
        pattern("abc", "code", r"(", &mut errors);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].constraint, "matches");
    }
}
