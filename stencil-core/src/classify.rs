//! Parameter type classification.
//!
//! Every operation parameter type implements [`Param`]. Its associated
//! [`Param::CLASS`] decides the binding source for route inference, binding
//! planning, dispatch and schema synthesis alike, so there is exactly one
//! place that says what kind of value a type is.
//!
//! * **Simple**: scalars read from a path segment or a query key
//!   (integers, floats, `bool`, `char`, `String`, `Uuid`, chrono dates and
//!   enumerants registered with [`simple_param!`](crate::simple_param)).
//! * **Special**: handles supplied by the runtime ([`HttpRequest`],
//!   [`RequestContext`], [`ResponseHandle`], [`CancellationToken`]).
//! * **Structured**: everything else, decoded from the body or from
//!   flattened query keys. Opt in with `#[derive(Structured)]` or
//!   [`structured_param!`](crate::structured_param).
//!
//! `Option<T>` keeps the class of `T` and marks the parameter nullable.

use crate::context::{RequestContext, ResponseHandle};
use crate::HttpRequest;
use std::any::Any;
use stencil_validation::ValidationError;
use tokio_util::sync::CancellationToken;

/// Binding classification of a parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Simple,
    Special(SpecialKind),
    Structured,
}

impl TypeClass {
    pub fn is_simple(&self) -> bool {
        matches!(self, TypeClass::Simple)
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, TypeClass::Structured)
    }

    pub fn is_special(&self) -> bool {
        matches!(self, TypeClass::Special(_))
    }
}

/// Which runtime handle a special parameter receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKind {
    Request,
    Response,
    Context,
    Cancellation,
}

/// Raw request data handed to [`Param::bind`]
#[derive(Debug, Clone, Copy)]
pub enum Raw<'a> {
    /// A path segment, query value or textual default
    Text(&'a str),
    /// Flattened query keys with their prefix already stripped
    Fields(&'a [(String, String)]),
    /// The request payload
    Body {
        data: &'a [u8],
        content_type: Option<&'a str>,
    },
    /// The per-request runtime context
    Injected(&'a RequestContext),
}

impl Raw<'_> {
    pub fn describe(&self) -> &'static str {
        match self {
            Raw::Text(_) => "a text value",
            Raw::Fields(_) => "query fields",
            Raw::Body { .. } => "a request body",
            Raw::Injected(_) => "the request context",
        }
    }
}

/// One field of a structured type, for form decoding and schema output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub type_name: &'static str,
    pub required: bool,
}

/// A type that can appear as an operation parameter
pub trait Param: Sized + Send + 'static {
    /// Binding classification of the type
    const CLASS: TypeClass;

    /// Whether an absent value is representable
    const NULLABLE: bool = false;

    /// Decode a value from raw request data
    fn bind(raw: Raw<'_>) -> Result<Self, String>;

    /// The zero/empty value used when the request carries nothing
    fn empty() -> Option<Self>;

    /// Errors from the declarative rules attached to the type
    fn check(&self) -> Vec<ValidationError> {
        Vec::new()
    }

    /// The value a type-specific validator is looked up for
    fn validation_target(&self) -> Option<&dyn Any> {
        Some(self)
    }

    /// Declared fields of a structured type
    fn fields() -> &'static [FieldInfo] {
        &[]
    }
}

/// Classification of `T`
pub fn classify<T: Param>() -> TypeClass {
    T::CLASS
}

impl<T: Param> Param for Option<T> {
    const CLASS: TypeClass = T::CLASS;
    const NULLABLE: bool = true;

    fn bind(raw: Raw<'_>) -> Result<Self, String> {
        T::bind(raw).map(Some)
    }

    fn empty() -> Option<Self> {
        Some(None)
    }

    fn check(&self) -> Vec<ValidationError> {
        self.as_ref().map(Param::check).unwrap_or_default()
    }

    fn validation_target(&self) -> Option<&dyn Any> {
        self.as_ref().and_then(|value| value.validation_target())
    }

    fn fields() -> &'static [FieldInfo] {
        T::fields()
    }
}

/// Implement [`Param`] as a simple type.
///
/// The type must implement `FromStr` (with a displayable error) and
/// `Default`; the default is the zero value for absent parameters. Use it
/// for enumerants that should bind from a path segment or a query key.
#[macro_export]
macro_rules! simple_param {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Param for $ty {
                const CLASS: $crate::TypeClass = $crate::TypeClass::Simple;

                fn bind(raw: $crate::Raw<'_>) -> ::std::result::Result<Self, ::std::string::String> {
                    $crate::decode::parse_text::<$ty>(raw)
                }

                fn empty() -> ::std::option::Option<Self> {
                    ::std::option::Option::Some(<$ty as ::std::default::Default>::default())
                }
            }
        )+
    };
}

/// Implement [`Param`] as a structured type.
///
/// `structured_param!(T)` decodes strictly and has no empty instance.
/// `structured_param!(T, default)` uses `T::default()` as the empty instance
/// and decodes form bodies field by field; it needs `Default + Serialize`.
#[macro_export]
macro_rules! structured_param {
    ($ty:ty) => {
        impl $crate::Param for $ty {
            const CLASS: $crate::TypeClass = $crate::TypeClass::Structured;

            fn bind(raw: $crate::Raw<'_>) -> ::std::result::Result<Self, ::std::string::String> {
                $crate::decode::decode_structured::<$ty>(raw)
            }

            fn empty() -> ::std::option::Option<Self> {
                ::std::option::Option::None
            }
        }
    };
    ($ty:ty, default) => {
        impl $crate::Param for $ty {
            const CLASS: $crate::TypeClass = $crate::TypeClass::Structured;

            fn bind(raw: $crate::Raw<'_>) -> ::std::result::Result<Self, ::std::string::String> {
                $crate::decode::decode_structured_lenient::<$ty>(raw)
            }

            fn empty() -> ::std::option::Option<Self> {
                ::std::option::Option::Some(<$ty as ::std::default::Default>::default())
            }
        }
    };
}

simple_param!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, String
);

simple_param!(
    uuid::Uuid,
    chrono::NaiveDate,
    chrono::NaiveTime,
    chrono::NaiveDateTime,
    chrono::DateTime<chrono::Utc>,
    chrono::DateTime<chrono::FixedOffset>,
);

macro_rules! special_param {
    ($ty:ty, $kind:ident, |$ctx:ident| $extract:expr) => {
        impl Param for $ty {
            const CLASS: TypeClass = TypeClass::Special(SpecialKind::$kind);

            fn bind(raw: Raw<'_>) -> Result<Self, String> {
                match raw {
                    Raw::Injected($ctx) => Ok($extract),
                    other => Err(format!(
                        "runtime handle cannot be read from {}",
                        other.describe()
                    )),
                }
            }

            fn empty() -> Option<Self> {
                None
            }
        }
    };
}

special_param!(HttpRequest, Request, |ctx| ctx.request().clone());
special_param!(RequestContext, Context, |ctx| ctx.clone());
special_param!(ResponseHandle, Response, |ctx| ctx.response().clone());
special_param!(CancellationToken, Cancellation, |ctx| ctx
    .cancellation()
    .clone());
