use super::*;
use crate::receiver::Event;
use std::sync::Arc;

type Payload = &'static str;

fn noop() -> Receiver<Payload> {
    Receiver::new(|_event: &Event<Payload>| Ok(()))
}

fn registry() -> Registry<Payload> {
    Registry::new("test", false, false)
}

fn cached_len<P, R>(registry: &Registry<P, R>) -> usize {
    registry.state.lock().cache.len()
}

#[test]
fn test_connect_then_disconnect_restores_count() {
    let registry = registry();
    let receiver = noop();
    let options = ConnectOptions::default();

    assert_eq!(registry.len(), 0);
    assert!(registry.connect(&receiver, &options).unwrap());
    assert_eq!(registry.len(), 1);
    assert!(registry.has_listeners(&Sender::none()));

    assert!(registry.disconnect(&receiver, &options));
    assert_eq!(registry.len(), 0);
    assert!(!registry.has_listeners(&Sender::none()));
}

#[test]
fn test_duplicate_connect_is_ignored() {
    let registry = registry();
    let receiver = noop();
    let options = ConnectOptions::default();

    assert!(registry.connect(&receiver, &options).unwrap());
    assert!(!registry.connect(&receiver, &options).unwrap());
    assert!(!registry.connect(&receiver.clone(), &options).unwrap());

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.live_receivers(&Sender::none()).len(), 1);
}

#[test]
fn test_same_receiver_for_different_senders_registers_twice() {
    let registry = registry();
    let receiver = noop();

    registry
        .connect(&receiver, &ConnectOptions::default().sender("a"))
        .unwrap();
    registry
        .connect(&receiver, &ConnectOptions::default().sender("b"))
        .unwrap();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.live_receivers(&Sender::from("a")).len(), 1);
    assert_eq!(registry.live_receivers(&Sender::from("b")).len(), 1);
}

#[test]
fn test_dispatch_uid_replaces_identity() {
    let registry = registry();
    let first = noop();
    let second = noop();
    let options = ConnectOptions::default().dispatch_uid("audit");

    assert!(registry.connect(&first, &options).unwrap());
    assert!(!registry.connect(&second, &options).unwrap());
    assert_eq!(registry.len(), 1);

    assert!(registry.disconnect_uid("audit", &SenderFilter::Any));
    assert!(!registry.disconnect_uid("audit", &SenderFilter::Any));
    assert_eq!(registry.len(), 0);
}

#[test]
fn test_disconnect_unknown_returns_false() {
    let registry = registry();
    let connected = noop();
    let stranger = noop();
    registry
        .connect(&connected, &ConnectOptions::default())
        .unwrap();

    assert!(!registry.disconnect(&stranger, &ConnectOptions::default()));
    assert!(!registry.disconnect(&connected, &ConnectOptions::default().sender("x")));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_weak_registration_expires_on_drop() {
    let registry = registry();
    let receiver = noop();
    registry
        .connect(&receiver, &ConnectOptions::default())
        .unwrap();
    assert!(registry.has_listeners(&Sender::none()));

    drop(receiver);

    assert!(!registry.has_listeners(&Sender::none()));
    assert_eq!(registry.len(), 0);
}

#[test]
fn test_strong_registration_survives_drop() {
    let registry = registry();
    let receiver = noop();
    registry
        .connect(&receiver, &ConnectOptions::default().strong())
        .unwrap();

    drop(receiver);

    assert!(registry.has_listeners(&Sender::none()));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_connect_after_expiry_with_same_uid() {
    let registry = registry();
    let options = ConnectOptions::default().dispatch_uid("slot");

    let first = noop();
    registry.connect(&first, &options).unwrap();
    drop(first);

    let second = noop();
    assert!(registry.connect(&second, &options).unwrap());
    assert_eq!(registry.live_receivers(&Sender::none()), vec![second]);
}

#[test]
fn test_live_receivers_keeps_connection_order_across_filters() {
    let registry = registry();
    let first = noop();
    let second = noop();
    let third = noop();

    registry.connect(&first, &ConnectOptions::default()).unwrap();
    registry
        .connect(&second, &ConnectOptions::default().sender("orders"))
        .unwrap();
    registry.connect(&third, &ConnectOptions::default()).unwrap();

    assert_eq!(
        registry.live_receivers(&Sender::from("orders")),
        vec![first.clone(), second.clone(), third.clone()]
    );
    assert_eq!(
        registry.live_receivers(&Sender::from("invoices")),
        vec![first, third]
    );
}

#[test]
fn test_object_sender_filter_is_weak() {
    let registry = registry();
    let receiver = noop();
    let owner = Arc::new(String::from("owner"));

    registry
        .connect(&receiver, &ConnectOptions::default().sender(&owner))
        .unwrap();
    assert_eq!(Arc::strong_count(&owner), 1);
    assert!(registry.has_listeners(&Sender::object(&owner)));
    assert!(!registry.has_listeners(&Sender::none()));

    drop(owner);
    assert_eq!(registry.len(), 0);
}

#[test]
fn test_cache_is_filled_per_sender_and_cleared_on_mutation() {
    let registry = Registry::<Payload>::new("cached", false, true);
    let receiver = noop();
    registry
        .connect(&receiver, &ConnectOptions::default())
        .unwrap();

    assert_eq!(registry.live_receivers(&Sender::from("a")).len(), 1);
    assert_eq!(registry.live_receivers(&Sender::from("b")).len(), 1);
    assert_eq!(cached_len(&registry), 2);

    let other = noop();
    registry.connect(&other, &ConnectOptions::default()).unwrap();
    assert_eq!(cached_len(&registry), 0);
    assert_eq!(registry.live_receivers(&Sender::from("a")).len(), 2);

    registry.disconnect(&other, &ConnectOptions::default());
    assert_eq!(cached_len(&registry), 0);
    assert_eq!(registry.live_receivers(&Sender::from("a")).len(), 1);
}

#[test]
fn test_cache_does_not_keep_weak_receivers_alive() {
    let registry = Registry::<Payload>::new("cached", false, true);
    let receiver = noop();
    registry
        .connect(&receiver, &ConnectOptions::default())
        .unwrap();
    assert!(registry.has_listeners(&Sender::none()));
    assert_eq!(cached_len(&registry), 1);

    drop(receiver);

    assert!(!registry.has_listeners(&Sender::none()));
    assert_eq!(registry.len(), 0);
}

#[test]
fn test_stale_cache_hands_back_resolved_receivers() {
    let registry = Registry::<Payload>::new("cached", false, true);
    let first = noop();
    let second = noop();
    let options = ConnectOptions::default();
    registry.connect(&first, &options).unwrap();
    registry.connect(&second, &options).unwrap();
    assert_eq!(registry.live_receivers(&Sender::none()).len(), 2);

    drop(second);

    let partial = {
        let state = registry.state.lock();
        match state.cached(&Sender::none().key()) {
            Some(Err(partial)) => partial,
            _ => panic!("expected a stale cache entry"),
        }
    };
    assert_eq!(partial, vec![first.clone()]);
    drop(partial);

    assert_eq!(registry.live_receivers(&Sender::none()), vec![first.clone()]);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_set_caching_clears_cache() {
    let registry = Registry::<Payload>::new("toggle", false, false);
    let receiver = noop();
    registry
        .connect(&receiver, &ConnectOptions::default())
        .unwrap();

    registry.live_receivers(&Sender::none());
    assert_eq!(cached_len(&registry), 0);

    registry.set_caching(true);
    assert!(registry.caching());
    registry.live_receivers(&Sender::none());
    assert_eq!(cached_len(&registry), 1);

    registry.set_caching(false);
    assert_eq!(cached_len(&registry), 0);
}

#[test]
fn test_clear_removes_everything() {
    let registry = registry();
    let first = noop();
    let second = noop();
    registry.connect(&first, &ConnectOptions::default()).unwrap();
    registry
        .connect(&second, &ConnectOptions::default().strong())
        .unwrap();

    assert_eq!(registry.clear(), 2);
    assert!(registry.is_empty());
}

#[test]
fn test_debug_rejects_dead_receiver() {
    let registry = Registry::<Payload>::new("debug", true, false);
    let receiver = noop();
    let weak = receiver.downgrade();
    drop(receiver);

    let err = registry
        .connect(&weak, &ConnectOptions::default())
        .unwrap_err();
    assert!(matches!(err, SignalError::InvalidReceiver { .. }));
    assert!(registry.is_empty());
}

#[test]
fn test_non_debug_accepts_dead_receiver_and_prunes_it() {
    let registry = registry();
    let receiver = noop();
    let weak = receiver.downgrade();
    drop(receiver);

    assert!(registry.connect(&weak, &ConnectOptions::default()).unwrap());
    assert!(!registry.has_listeners(&Sender::none()));
    assert!(registry.is_empty());
}

#[test]
fn test_debug_checks_signature_of_weak_receivers() {
    let registry = Registry::<Payload>::new("debug", true, false);
    let payload_only = Receiver::<Payload>::payload_only(|_payload: &Payload| Ok(()));

    let err = registry
        .connect(&payload_only, &ConnectOptions::default())
        .unwrap_err();
    assert!(matches!(err, SignalError::InvalidReceiverSignature { .. }));

    assert!(
        registry
            .connect(&payload_only, &ConnectOptions::default().dispatch_uid("ok"))
            .unwrap()
    );
    assert!(
        registry
            .connect(&payload_only, &ConnectOptions::default().strong())
            .unwrap()
    );
    assert_eq!(registry.len(), 2);
}
