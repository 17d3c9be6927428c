use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{GenericArgument, PathArguments, Type};

/// Expression turning an operation's return value into an `Outcome`.
///
/// The shape is read from the declared return type: unit, `HttpResponse`,
/// `Option<T>` (`None` is an empty reply), `Result<T, E>` (recursing into
/// `T`), `Json<T>`, or any serializable value.
pub fn respond(ty: Option<&Type>, value: TokenStream2) -> TokenStream2 {
    let Some(ty) = ty.map(strip_parens) else {
        return quote! {{
            let _ = #value;
            ::stencil_core::Outcome::empty()
        }};
    };

    if let Type::Tuple(tuple) = ty {
        if tuple.elems.is_empty() {
            return quote! {{
                let _ = #value;
                ::stencil_core::Outcome::empty()
            }};
        }
    }

    let Type::Path(path) = ty else {
        return quote! { ::stencil_core::Outcome::json(&#value) };
    };
    let Some(last) = path.path.segments.last() else {
        return quote! { ::stencil_core::Outcome::json(&#value) };
    };

    match last.ident.to_string().as_str() {
        "HttpResponse" => quote! { ::stencil_core::Outcome::response(#value) },
        "Json" => quote! { ::stencil_core::Outcome::json(&(#value).0) },
        "Option" => {
            let Some(inner) = first_type_argument(&last.arguments) else {
                return quote! { ::stencil_core::Outcome::json(&#value) };
            };
            let on_some = respond(Some(inner), quote! { __some });
            quote! {
                match #value {
                    ::std::option::Option::Some(__some) => #on_some,
                    ::std::option::Option::None => ::stencil_core::Outcome::empty(),
                }
            }
        }
        "Result" => {
            let ok = first_type_argument(&last.arguments);
            let on_ok = respond(ok, quote! { __ok });
            quote! {
                match #value {
                    ::std::result::Result::Ok(__ok) => #on_ok,
                    ::std::result::Result::Err(__err) => ::stencil_core::Outcome::faulted(__err),
                }
            }
        }
        _ => quote! { ::stencil_core::Outcome::json(&#value) },
    }
}

fn strip_parens(ty: &Type) -> &Type {
    match ty {
        Type::Paren(inner) => strip_parens(&inner.elem),
        Type::Group(inner) => strip_parens(&inner.elem),
        other => other,
    }
}

fn first_type_argument(arguments: &PathArguments) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}
