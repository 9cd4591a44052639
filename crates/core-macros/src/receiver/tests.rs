use super::*;
use quote::ToTokens;

fn parse_args(tokens: TokenStream) -> syn::Result<ReceiverArgs> {
    syn::parse2(tokens)
}

fn expand_to_string(attr: TokenStream, item: TokenStream) -> String {
    expand(attr, item).unwrap().to_string()
}

#[test]
fn test_single_signal() {
    let args = parse_args(quote! { ORDER_PLACED }).unwrap();

    assert_eq!(args.signals.len(), 1);
    assert_eq!(args.signals[0].to_token_stream().to_string(), "ORDER_PLACED");
    assert!(args.sender.is_none());
    assert!(args.dispatch_uid.is_none());
    assert!(!args.weak);
}

#[test]
fn test_signal_list_and_options() {
    let args = parse_args(quote! {
        [signals::SAVED, signals::DELETED], sender = "orders", dispatch_uid = "audit", weak,
    })
    .unwrap();

    assert_eq!(args.signals.len(), 2);
    assert_eq!(
        args.sender.unwrap().to_token_stream().to_string(),
        "\"orders\""
    );
    assert_eq!(args.dispatch_uid.unwrap().value(), "audit");
    assert!(args.weak);
}

#[test]
fn test_rejects_missing_signal() {
    assert!(parse_args(quote! {}).is_err());
    assert!(parse_args(quote! { [] }).is_err());
}

#[test]
fn test_rejects_unknown_and_duplicate_arguments() {
    assert!(parse_args(quote! { SIGNAL, priority = 3 }).is_err());
    assert!(parse_args(quote! { SIGNAL, weak, weak }).is_err());
    assert!(parse_args(quote! { SIGNAL, dispatch_uid = uid }).is_err());
}

#[test]
fn test_expands_sync_receiver() {
    let expanded = expand_to_string(
        quote! { SAVED, sender = "orders" },
        quote! {
            pub fn log_saved(event: &Event<Saved, u32>) -> Outcome<u32> {
                Ok(1)
            }
        },
    );

    assert!(expanded.contains("pub fn log_saved"));
    assert!(expanded.contains("pub fn connect_log_saved"));
    assert!(expanded.contains(":: herald :: Receiver :: new (log_saved)"));
    assert!(expanded.contains(":: herald :: Receiver < Saved , u32 >"));
    assert!(expanded.contains(". strong ()"));
    assert!(expanded.contains(". sender (\"orders\")"));
}

#[test]
fn test_expands_async_weak_receiver() {
    let expanded = expand_to_string(
        quote! { [FIRST, SECOND], weak, dispatch_uid = "mail" },
        quote! {
            async fn mail(event: Event<Saved>) -> Outcome {
                Ok(())
            }
        },
    );

    assert!(expanded.contains(":: herald :: Receiver :: from_async (mail)"));
    assert!(!expanded.contains(". strong ()"));
    assert!(expanded.contains(". dispatch_uid (\"mail\")"));
    assert!(expanded.contains("(FIRST) . connect_with"));
    assert!(expanded.contains("(SECOND) . connect_with"));
}

#[test]
fn test_rejects_wrong_parameter_shapes() {
    let sync_by_value = expand(
        quote! { SAVED },
        quote! { fn f(event: Event<Saved>) -> Outcome { Ok(()) } },
    );
    assert!(sync_by_value.is_err());

    let async_by_reference = expand(
        quote! { SAVED },
        quote! { async fn f(event: &Event<Saved>) -> Outcome { Ok(()) } },
    );
    assert!(async_by_reference.is_err());

    let two_parameters = expand(
        quote! { SAVED },
        quote! { fn f(event: &Event<Saved>, extra: u32) -> Outcome { Ok(()) } },
    );
    assert!(two_parameters.is_err());

    let not_an_event = expand(
        quote! { SAVED },
        quote! { fn f(payload: &Saved) -> Outcome { Ok(()) } },
    );
    assert!(not_an_event.is_err());

    let generic = expand(
        quote! { SAVED },
        quote! { fn f<T>(event: &Event<T>) -> Outcome { Ok(()) } },
    );
    assert!(generic.is_err());
}
