use crate::respond::respond;
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Attribute, Error, FnArg, ImplItem, ImplItemFn, ItemImpl, Lit, LitStr, Pat, ReturnType, Type,
    Visibility, parse_macro_input, spanned::Spanned,
};

#[derive(Default)]
struct ServiceArgs {
    prefix: Option<LitStr>,
    tag: Option<LitStr>,
    ignore: bool,
}

#[derive(Default)]
struct OperationArgs {
    route: Option<LitStr>,
    methods: Vec<LitStr>,
    ignore: bool,
}

struct ParamSpec {
    name: String,
    ty: Type,
    default: Option<String>,
}

pub fn service_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = ServiceArgs::default();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("prefix") {
            args.prefix = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("tag") {
            args.tag = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("ignore") {
            args.ignore = true;
            Ok(())
        } else {
            Err(meta.error("expected `prefix`, `tag` or `ignore`"))
        }
    });
    parse_macro_input!(attr with parser);

    let mut input = parse_macro_input!(item as ItemImpl);

    match expand(&args, &mut input) {
        Ok(generated) => TokenStream::from(quote! {
            #input
            #generated
        }),
        Err(err) => {
            // Keep the impl so the error does not cascade into unrelated ones
            strip_helper_attributes(&mut input);
            let err = err.to_compile_error();
            TokenStream::from(quote! {
                #input
                #err
            })
        }
    }
}

fn expand(args: &ServiceArgs, input: &mut ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &input.trait_ {
        return Err(Error::new(
            path.span(),
            "#[service] goes on an inherent impl block, not a trait impl",
        ));
    }
    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "#[service] does not support generic impl blocks",
        ));
    }

    let self_ty = input.self_ty.as_ref().clone();
    let type_name = quote!(#self_ty).to_string().replace(' ', "");

    let mut chain = Vec::new();
    let mut invokers = Vec::new();

    for item in input.items.iter_mut() {
        let ImplItem::Fn(method) = item else {
            continue;
        };

        let op_args = take_operation_args(&mut method.attrs)?;
        let eligible = is_eligible(method);

        if !eligible {
            // Ineligible methods never become operations; reject markers on them
            if op_args.is_some() {
                return Err(Error::new(
                    method.sig.ident.span(),
                    "#[operation] requires a `pub` method with a `&self` receiver and no generics",
                ));
            }
            strip_param_attributes(method)?;
            continue;
        }

        let name = method.sig.ident.to_string();
        let name = name.strip_prefix("r#").unwrap_or(&name).to_string();
        let op_args = op_args.unwrap_or_default();

        if op_args.ignore {
            strip_param_attributes(method)?;
            chain.push(quote! { .ignored_operation(#name) });
            continue;
        }

        let params = collect_params(method)?;
        let invoker = format_ident!("__stencil_invoke_{}", name);
        invokers.push(invoker_fn(&invoker, &self_ty, method, &params));
        chain.push(operation_meta(&name, &invoker, method, &params, &op_args));
    }

    let mut module = Vec::new();
    if let Some(prefix) = &args.prefix {
        module.push(quote! { .prefix(#prefix) });
    }
    if let Some(tag) = &args.tag {
        module.push(quote! { .tag(#tag) });
    }
    if args.ignore {
        module.push(quote! { .ignore() });
    }

    Ok(quote! {
        impl ::stencil_core::ServiceModule for #self_ty {
            fn metadata() -> ::stencil_core::ServiceMeta {
                #(#invokers)*

                ::stencil_core::ServiceMeta::new::<#self_ty>()
                    #(#module)*
                    #(#chain)*
            }
        }

        ::stencil_core::inventory::submit! {
            ::stencil_core::ServiceRegistration::new(
                #type_name,
                <#self_ty as ::stencil_core::ServiceModule>::metadata,
            )
        }
    })
}

fn is_eligible(method: &ImplItemFn) -> bool {
    let public = matches!(method.vis, Visibility::Public(_));
    let by_ref = matches!(
        method.sig.inputs.first(),
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none()
    );
    public && by_ref && method.sig.generics.params.is_empty()
}

fn take_operation_args(attrs: &mut Vec<Attribute>) -> syn::Result<Option<OperationArgs>> {
    let mut found: Option<OperationArgs> = None;
    let mut error = None;

    attrs.retain(|attr| {
        if !attr.path().is_ident("operation") {
            return true;
        }
        let args = found.get_or_insert_with(OperationArgs::default);
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("route") {
                args.route = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("method") {
                args.methods.push(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("methods") {
                let value = meta.value()?;
                let list;
                syn::bracketed!(list in value);
                let verbs = list.parse_terminated(|input| input.parse::<LitStr>(), syn::Token![,])?;
                args.methods.extend(verbs);
                Ok(())
            } else if meta.path.is_ident("ignore") {
                args.ignore = true;
                Ok(())
            } else {
                Err(meta.error("expected `route`, `method`, `methods` or `ignore`"))
            }
        });
        if let Err(err) = parsed {
            error.get_or_insert(err);
        }
        false
    });

    match error {
        Some(err) => Err(err),
        None => Ok(found),
    }
}

fn take_param_default(attrs: &mut Vec<Attribute>) -> syn::Result<Option<String>> {
    let mut default = None;
    let mut error = None;

    attrs.retain(|attr| {
        if !attr.path().is_ident("param") {
            return true;
        }
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                let text = match meta.value()?.parse::<Lit>()? {
                    Lit::Str(s) => s.value(),
                    Lit::Int(i) => i.base10_digits().to_string(),
                    Lit::Float(f) => f.base10_digits().to_string(),
                    Lit::Bool(b) => b.value.to_string(),
                    Lit::Char(c) => c.value().to_string(),
                    other => return Err(Error::new(other.span(), "unsupported default literal")),
                };
                default = Some(text);
                Ok(())
            } else {
                Err(meta.error("expected `default`"))
            }
        });
        if let Err(err) = parsed {
            error.get_or_insert(err);
        }
        false
    });

    match error {
        Some(err) => Err(err),
        None => Ok(default),
    }
}

fn strip_param_attributes(method: &mut ImplItemFn) -> syn::Result<()> {
    for input in method.sig.inputs.iter_mut() {
        if let FnArg::Typed(typed) = input {
            take_param_default(&mut typed.attrs)?;
        }
    }
    Ok(())
}

fn strip_helper_attributes(input: &mut ItemImpl) {
    for item in input.items.iter_mut() {
        if let ImplItem::Fn(method) = item {
            method.attrs.retain(|attr| !attr.path().is_ident("operation"));
            for arg in method.sig.inputs.iter_mut() {
                if let FnArg::Typed(typed) = arg {
                    typed.attrs.retain(|attr| !attr.path().is_ident("param"));
                }
            }
        }
    }
}

fn collect_params(method: &mut ImplItemFn) -> syn::Result<Vec<ParamSpec>> {
    let mut params = Vec::new();

    for input in method.sig.inputs.iter_mut().skip(1) {
        let FnArg::Typed(typed) = input else {
            continue;
        };
        let default = take_param_default(&mut typed.attrs)?;

        let name = match typed.pat.as_ref() {
            Pat::Ident(ident) => {
                let name = ident.ident.to_string();
                name.strip_prefix("r#").unwrap_or(&name).to_string()
            }
            other => {
                return Err(Error::new(
                    other.span(),
                    "operation parameters must be plain identifiers",
                ));
            }
        };

        match typed.ty.as_ref() {
            Type::Reference(_) => {
                return Err(Error::new(
                    typed.ty.span(),
                    "operation parameters must be owned; borrow inside the method instead",
                ));
            }
            Type::ImplTrait(_) => {
                return Err(Error::new(
                    typed.ty.span(),
                    "operation parameters need a concrete type",
                ));
            }
            _ => {}
        }

        params.push(ParamSpec {
            name,
            ty: typed.ty.as_ref().clone(),
            default,
        });
    }

    Ok(params)
}

fn invoker_fn(
    invoker: &syn::Ident,
    self_ty: &Type,
    method: &ImplItemFn,
    params: &[ParamSpec],
) -> TokenStream2 {
    let ident = &method.sig.ident;
    let service_name = quote!(#self_ty).to_string().replace(' ', "");

    let args: Vec<_> = (0..params.len()).map(|i| format_ident!("__arg{}", i)).collect();
    let takes = params.iter().zip(&args).enumerate().map(|(i, (param, arg))| {
        let ty = &param.ty;
        quote! {
            let #arg = match __args.take::<#ty>(#i) {
                ::std::result::Result::Ok(value) => value,
                ::std::result::Result::Err(outcome) => return outcome,
            };
        }
    });

    let call = if method.sig.asyncness.is_some() {
        quote! { __service.#ident(#(#args),*).await }
    } else {
        quote! { __service.#ident(#(#args),*) }
    };

    let returns = match &method.sig.output {
        ReturnType::Default => None,
        ReturnType::Type(_, ty) => Some(ty.as_ref()),
    };
    let outcome = respond(returns, quote! { __value });

    let args_binding = if params.is_empty() {
        quote! { _ }
    } else {
        quote! { mut __args }
    };

    quote! {
        #[allow(non_snake_case, unused_variables)]
        fn #invoker(
            __instance: ::stencil_core::Instance,
            #args_binding: ::stencil_core::Arguments,
        ) -> ::stencil_core::OperationFuture {
            ::std::boxed::Box::pin(async move {
                let __service = match __instance.downcast::<#self_ty>() {
                    ::std::result::Result::Ok(service) => service,
                    ::std::result::Result::Err(_) => {
                        return ::stencil_core::Outcome::faulted(
                            ::std::concat!("resolved instance is not a `", #service_name, "`"),
                        );
                    }
                };
                #(#takes)*
                let __value = #call;
                #outcome
            })
        }
    }
}

fn operation_meta(
    name: &str,
    invoker: &syn::Ident,
    method: &ImplItemFn,
    params: &[ParamSpec],
    args: &OperationArgs,
) -> TokenStream2 {
    let params = params.iter().map(|param| {
        let ParamSpec { name, ty, default } = param;
        let default = match default {
            Some(text) => quote! { ::std::option::Option::Some(#text) },
            None => quote! { ::std::option::Option::None },
        };
        quote! { .param(::stencil_core::ParamMeta::of::<#ty>(#name, #default)) }
    });

    let returns = match &method.sig.output {
        ReturnType::Default => "()".to_string(),
        ReturnType::Type(_, ty) => quote!(#ty).to_string().replace(' ', ""),
    };

    let route = args.route.as_ref().map(|route| quote! { .route(#route) });
    let methods = args.methods.iter().map(|verb| quote! { .method(#verb) });
    let asynchronous = method.sig.asyncness.map(|_| quote! { .asynchronous() });

    quote! {
        .operation(
            ::stencil_core::OperationMeta::new(#name, #invoker)
                #(#params)*
                .returns(#returns)
                #route
                #(#methods)*
                #asynchronous
        )
    }
}
