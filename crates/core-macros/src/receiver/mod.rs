#[cfg(test)]
mod tests;

use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::{
    Expr, FnArg, GenericArgument, ItemFn, LitStr, Meta, PathArguments, Token, Type, TypePath,
};

/// Parsed `#[receiver(...)]` arguments
pub(crate) struct ReceiverArgs {
    pub(crate) signals: Vec<Expr>,
    pub(crate) sender: Option<Expr>,
    pub(crate) dispatch_uid: Option<LitStr>,
    pub(crate) weak: bool,
}

impl Parse for ReceiverArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.is_empty() {
            return Err(input.error("expected at least one signal"));
        }

        let signals = match input.parse::<Expr>()? {
            Expr::Array(array) => array.elems.into_iter().collect(),
            signal => vec![signal],
        };
        if signals.is_empty() {
            return Err(input.error("expected at least one signal"));
        }

        let mut args = ReceiverArgs {
            signals,
            sender: None,
            dispatch_uid: None,
            weak: false,
        };

        while !input.is_empty() {
            input.parse::<Token![,]>()?;
            if input.is_empty() {
                break;
            }
            match input.parse::<Meta>()? {
                Meta::Path(path) if path.is_ident("weak") => {
                    if args.weak {
                        return Err(syn::Error::new_spanned(path, "duplicate `weak`"));
                    }
                    args.weak = true;
                }
                Meta::NameValue(pair) if pair.path.is_ident("sender") => {
                    if args.sender.is_some() {
                        return Err(syn::Error::new_spanned(pair.path, "duplicate `sender`"));
                    }
                    args.sender = Some(pair.value);
                }
                Meta::NameValue(pair) if pair.path.is_ident("dispatch_uid") => {
                    if args.dispatch_uid.is_some() {
                        return Err(syn::Error::new_spanned(
                            pair.path,
                            "duplicate `dispatch_uid`",
                        ));
                    }
                    match pair.value {
                        Expr::Lit(syn::ExprLit {
                            lit: syn::Lit::Str(uid),
                            ..
                        }) => args.dispatch_uid = Some(uid),
                        other => {
                            return Err(syn::Error::new_spanned(
                                other,
                                "`dispatch_uid` must be a string literal",
                            ));
                        }
                    }
                }
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "unknown argument, expected `sender = ..`, `dispatch_uid = \"..\"` or `weak`",
                    ));
                }
            }
        }

        Ok(args)
    }
}

/// Generic arguments of the `Event<..>` the function takes
fn event_arguments(function: &ItemFn) -> syn::Result<TokenStream> {
    let signature = &function.sig;
    if !signature.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &signature.generics,
            "receiver functions cannot be generic",
        ));
    }

    let mut inputs = signature.inputs.iter();
    let (Some(input), None) = (inputs.next(), inputs.next()) else {
        return Err(syn::Error::new_spanned(
            &signature.inputs,
            "receiver functions take exactly one `Event` parameter",
        ));
    };
    let FnArg::Typed(input) = input else {
        return Err(syn::Error::new_spanned(
            input,
            "receiver functions cannot take `self`",
        ));
    };

    let event_type = match (signature.asyncness.is_some(), input.ty.as_ref()) {
        (false, Type::Reference(reference)) => reference.elem.as_ref(),
        (false, other) => {
            return Err(syn::Error::new_spanned(
                other,
                "sync receivers take `&Event<..>`",
            ));
        }
        (true, Type::Reference(reference)) => {
            return Err(syn::Error::new_spanned(
                reference,
                "async receivers take `Event<..>` by value",
            ));
        }
        (true, other) => other,
    };

    let Type::Path(TypePath { path, qself: None }) = event_type else {
        return Err(syn::Error::new_spanned(event_type, "expected `Event<..>`"));
    };
    let Some(last) = path.segments.last().filter(|segment| segment.ident == "Event") else {
        return Err(syn::Error::new_spanned(path, "expected `Event<..>`"));
    };
    let PathArguments::AngleBracketed(arguments) = &last.arguments else {
        return Err(syn::Error::new_spanned(
            last,
            "`Event` needs its payload type, as in `Event<Payload>`",
        ));
    };

    let types = arguments
        .args
        .iter()
        .map(|argument| match argument {
            GenericArgument::Type(ty) => Ok(ty),
            other => Err(syn::Error::new_spanned(
                other,
                "expected a payload or result type",
            )),
        })
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! { #(#types),* })
}

pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> syn::Result<TokenStream> {
    let args: ReceiverArgs = syn::parse2(attr)?;
    let function: ItemFn = syn::parse2(item)?;

    let arguments = event_arguments(&function)?;
    let visibility = &function.vis;
    let name = &function.sig.ident;
    let connect = format_ident!("connect_{}", name);

    let constructor = if function.sig.asyncness.is_some() {
        quote! { ::herald::Receiver::from_async(#name) }
    } else {
        quote! { ::herald::Receiver::new(#name) }
    };

    let mut options = quote! { ::herald::ConnectOptions::default() };
    if !args.weak {
        options = quote! { #options.strong() };
    }
    if let Some(sender) = &args.sender {
        options = quote! { #options.sender(#sender) };
    }
    if let Some(uid) = &args.dispatch_uid {
        options = quote! { #options.dispatch_uid(#uid) };
    }

    let signals = &args.signals;
    let doc = format!("Connect [`{}`] to its signals", name);

    Ok(quote! {
        #function

        #[doc = #doc]
        #visibility fn #connect() -> ::core::result::Result<
            ::herald::Receiver<#arguments>,
            ::herald::SignalError,
        > {
            let receiver: ::herald::Receiver<#arguments> = #constructor;
            let options = #options;
            #(
                (#signals).connect_with(&receiver, ::core::clone::Clone::clone(&options))?;
            )*
            ::core::result::Result::Ok(receiver)
        }
    })
}
