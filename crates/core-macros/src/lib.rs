use proc_macro::TokenStream;

mod receiver;

/// Declare a function as a receiver of one or more signals
///
/// The function is kept as written and a `connect_<name>()` function is
/// generated next to it, with the same visibility, that connects it to every
/// listed signal and returns the [`Receiver`] handle.
///
/// ```rust,ignore
/// static ORDER_PLACED: LazyLock<Signal<OrderPlaced>> = LazyLock::new(Signal::new);
///
/// #[receiver(ORDER_PLACED, sender = "checkout", dispatch_uid = "mailer")]
/// async fn send_confirmation(event: Event<OrderPlaced>) -> Outcome {
///     Ok(())
/// }
///
/// connect_send_confirmation()?;
/// ```
///
/// Arguments:
/// - the signal expression, or an array of them, first;
/// - `sender = <expr>`: only deliveries from this sender;
/// - `dispatch_uid = "<uid>"`: de-duplication key;
/// - `weak`: register weakly; the caller must then keep the returned handle.
///
/// Sync functions take `&Event<P, R>`, async functions take `Event<P, R>`.
///
/// [`Receiver`]: ../herald/struct.Receiver.html
#[proc_macro_attribute]
pub fn receiver(attr: TokenStream, item: TokenStream) -> TokenStream {
    receiver::expand(attr.into(), item.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
