use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Expr, Fields, GenericArgument, LitStr, PathArguments,
    Token, Type, meta::ParseNestedMeta, parse_macro_input, spanned::Spanned,
};

enum Rule {
    Required,
    MinLength(Expr),
    MaxLength(Expr),
    Email,
    Min(Expr),
    Max(Expr),
    Pattern(LitStr),
}

struct FieldSpec {
    ident: syn::Ident,
    wire_name: String,
    type_name: String,
    required: bool,
    rules: Vec<Rule>,
}

pub fn structured_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let lenient = container_default(&input.attrs)?;
    let container = container_serde(&input.attrs)?;

    let fields: Vec<FieldSpec> = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named
                .named
                .iter()
                .map(|field| field_spec(field, &container))
                .collect::<syn::Result<Vec<_>>>()?
                .into_iter()
                .flatten()
                .collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let checks = fields.iter().flat_map(|field| {
        let ident = &field.ident;
        let wire = &field.wire_name;
        field.rules.iter().map(move |rule| {
            let target = quote! { &self.#ident };
            match rule {
                Rule::Required => quote! {
                    ::stencil_core::validation::rules::required(#target, #wire, &mut __errors);
                },
                Rule::MinLength(n) => quote! {
                    ::stencil_core::validation::rules::min_length(#target, #wire, (#n) as usize, &mut __errors);
                },
                Rule::MaxLength(n) => quote! {
                    ::stencil_core::validation::rules::max_length(#target, #wire, (#n) as usize, &mut __errors);
                },
                Rule::Email => quote! {
                    ::stencil_core::validation::rules::email(#target, #wire, &mut __errors);
                },
                Rule::Min(n) => quote! {
                    ::stencil_core::validation::rules::min(#target, #wire, (#n) as f64, &mut __errors);
                },
                Rule::Max(n) => quote! {
                    ::stencil_core::validation::rules::max(#target, #wire, (#n) as f64, &mut __errors);
                },
                Rule::Pattern(p) => quote! {
                    ::stencil_core::validation::rules::pattern(#target, #wire, #p, &mut __errors);
                },
            }
        })
    });

    let infos = fields.iter().map(|field| {
        let FieldSpec {
            wire_name,
            type_name,
            required,
            ..
        } = field;
        quote! {
            ::stencil_core::FieldInfo {
                name: #wire_name,
                type_name: #type_name,
                required: #required,
            }
        }
    });

    let (bind, empty) = if lenient {
        (
            quote! { ::stencil_core::decode::decode_structured_lenient::<Self>(raw) },
            quote! { ::std::option::Option::Some(<Self as ::std::default::Default>::default()) },
        )
    } else {
        (
            quote! { ::stencil_core::decode::decode_structured::<Self>(raw) },
            quote! { ::std::option::Option::None },
        )
    };

    Ok(quote! {
        impl #impl_generics ::stencil_core::validation::Validate for #name #ty_generics #where_clause {
            fn validate(
                &self,
            ) -> ::std::result::Result<(), ::std::vec::Vec<::stencil_core::validation::ValidationError>> {
                #[allow(unused_mut)]
                let mut __errors = ::std::vec::Vec::new();
                #(#checks)*
                if __errors.is_empty() {
                    ::std::result::Result::Ok(())
                } else {
                    ::std::result::Result::Err(__errors)
                }
            }
        }

        impl #impl_generics ::stencil_core::Param for #name #ty_generics #where_clause {
            const CLASS: ::stencil_core::TypeClass = ::stencil_core::TypeClass::Structured;

            fn bind(raw: ::stencil_core::Raw<'_>) -> ::std::result::Result<Self, ::std::string::String> {
                #bind
            }

            fn empty() -> ::std::option::Option<Self> {
                #empty
            }

            fn check(&self) -> ::std::vec::Vec<::stencil_core::validation::ValidationError> {
                ::stencil_core::validation::Validate::validate(self)
                    .err()
                    .unwrap_or_default()
            }

            fn fields() -> &'static [::stencil_core::FieldInfo] {
                const FIELDS: &[::stencil_core::FieldInfo] = &[#(#infos),*];
                FIELDS
            }
        }
    })
}

fn container_default(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut lenient = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("structured")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                lenient = true;
                Ok(())
            } else {
                Err(meta.error("expected `default`"))
            }
        })?;
    }
    Ok(lenient)
}

/// Container-level serde settings that change the wire shape
#[derive(Default)]
struct ContainerSerde {
    rename_all: Option<String>,
    default: bool,
}

fn container_serde(attrs: &[Attribute]) -> syn::Result<ContainerSerde> {
    let mut settings = ContainerSerde::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") && meta.input.peek(Token![=]) {
                let style: LitStr = meta.value()?.parse()?;
                settings.rename_all = Some(style.value());
                Ok(())
            } else if meta.path.is_ident("default") {
                settings.default = true;
                skip_meta(&meta)
            } else {
                skip_meta(&meta)
            }
        })?;
    }
    Ok(settings)
}

/// `None` for fields serde skips
fn field_spec(field: &syn::Field, container: &ContainerSerde) -> syn::Result<Option<FieldSpec>> {
    let Some(ident) = field.ident.clone() else {
        return Ok(None);
    };

    let mut rename = None;
    let mut skipped = false;
    let mut defaulted = container.default;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(Token![=]) {
                let name: LitStr = meta.value()?.parse()?;
                rename = Some(name.value());
                Ok(())
            } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_deserializing") {
                skipped = true;
                Ok(())
            } else if meta.path.is_ident("default") {
                defaulted = true;
                skip_meta(&meta)
            } else {
                skip_meta(&meta)
            }
        })?;
    }
    if skipped {
        return Ok(None);
    }

    let mut rules = Vec::new();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("validate")) {
        attr.parse_nested_meta(|meta| {
            let rule = if meta.path.is_ident("required") {
                Rule::Required
            } else if meta.path.is_ident("email") {
                Rule::Email
            } else if meta.path.is_ident("min_length") {
                Rule::MinLength(meta.value()?.parse()?)
            } else if meta.path.is_ident("max_length") {
                Rule::MaxLength(meta.value()?.parse()?)
            } else if meta.path.is_ident("min") {
                Rule::Min(meta.value()?.parse()?)
            } else if meta.path.is_ident("max") {
                Rule::Max(meta.value()?.parse()?)
            } else if meta.path.is_ident("pattern") {
                Rule::Pattern(meta.value()?.parse()?)
            } else {
                return Err(meta.error(
                    "expected one of `required`, `min_length`, `max_length`, `email`, `min`, `max`, `pattern`",
                ));
            };
            rules.push(rule);
            Ok(())
        })?;
    }

    let raw_name = ident.to_string();
    let raw_name = raw_name.strip_prefix("r#").unwrap_or(&raw_name);
    let wire_name = match (rename, container.rename_all.as_deref()) {
        (Some(name), _) => name,
        (None, Some(style)) => apply_rename_all(raw_name, style)
            .ok_or_else(|| Error::new(field.span(), format!("unknown rename_all style `{}`", style)))?,
        (None, None) => raw_name.to_string(),
    };

    let ty = &field.ty;
    // Omittable fields are required only when a rule says so
    let omittable = is_option(ty) || defaulted;
    let required = !omittable || rules.iter().any(|r| matches!(r, Rule::Required));

    Ok(Some(FieldSpec {
        ident,
        wire_name,
        type_name: quote!(#ty).to_string().replace(' ', ""),
        required,
        rules,
    }))
}

/// Consume a serde attribute entry this macro does not interpret
fn skip_meta(meta: &ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(|inner| skip_meta(&inner))?;
    }
    Ok(())
}

fn is_option(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    path.path.segments.last().is_some_and(|segment| {
        segment.ident == "Option"
            && matches!(
                &segment.arguments,
                PathArguments::AngleBracketed(args)
                    if matches!(args.args.first(), Some(GenericArgument::Type(_)))
            )
    })
}

fn apply_rename_all(name: &str, style: &str) -> Option<String> {
    let words: Vec<&str> = name.split('_').filter(|w| !w.is_empty()).collect();
    let capitalize = |word: &str| {
        let mut chars = word.chars();
        chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect::<String>())
            .unwrap_or_default()
    };

    let renamed = match style {
        "lowercase" => name.to_lowercase(),
        "UPPERCASE" => name.to_uppercase(),
        "snake_case" => name.to_string(),
        "SCREAMING_SNAKE_CASE" => name.to_uppercase(),
        "kebab-case" => name.replace('_', "-"),
        "SCREAMING-KEBAB-CASE" => name.to_uppercase().replace('_', "-"),
        "PascalCase" => words.iter().map(|w| capitalize(w)).collect(),
        "camelCase" => words
            .iter()
            .enumerate()
            .map(|(i, w)| if i == 0 { w.to_string() } else { capitalize(w) })
            .collect(),
        _ => return None,
    };
    Some(renamed)
}
