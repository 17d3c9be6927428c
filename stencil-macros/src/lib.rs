// Procedural macros for Stencil
// `#[service]` exposes an impl block as endpoints, `#[derive(Structured)]`
// makes a type bindable from bodies and flattened query keys

use proc_macro::TokenStream;

mod respond;
mod service;
mod structured;

/// Exposes the public `&self` methods of an inherent impl block as endpoints.
///
/// Module arguments: `prefix = "api/users"`, `tag = "Users"`, or `ignore`.
///
/// Inside the block:
/// * `#[operation(route = "/{id}/archive", method = "POST")]` or
///   `#[operation(methods = ["PUT", "PATCH"])]` overrides inference;
/// * `#[operation(ignore)]` keeps a method out of the catalog;
/// * `#[param(default = "10")]` on a parameter supplies a textual default
///   (JSON text for structured parameters).
///
/// ```ignore
/// #[service(prefix = "api/users")]
/// impl UserService {
///     pub fn get_user_by_id(&self, id: i32) -> Option<User> { .. }
///
///     pub async fn create_user(&self, user: NewUser) -> Result<User, StoreError> { .. }
/// }
/// ```
#[proc_macro_attribute]
pub fn service(attr: TokenStream, item: TokenStream) -> TokenStream {
    service::service_impl(attr, item)
}

/// Implements `Param` as a structured type, with `Validate` built from
/// `#[validate(..)]` field rules.
///
/// `#[structured(default)]` uses `Default` as the empty instance and decodes
/// form bodies field by field (requires `Default + Serialize`).
///
/// Field rules: `required`, `min_length = n`, `max_length = n`, `email`,
/// `min = n`, `max = n`, `pattern = "regex"`.
#[proc_macro_derive(Structured, attributes(structured, validate))]
pub fn structured_derive(input: TokenStream) -> TokenStream {
    structured::structured_impl(input)
}
