use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

struct Counter {
    hits: AtomicUsize,
}

impl Counter {
    fn on_event(&self, _event: &Event<u32, u32>) -> Outcome<u32> {
        Ok(self.hits.fetch_add(1, Ordering::SeqCst) as u32)
    }

    fn on_other(&self, event: &Event<u32, u32>) -> Outcome<u32> {
        Ok(*event.payload())
    }
}

fn event(payload: u32) -> Event<u32, u32> {
    Event::new(Signal::named("numbers"), Sender::from("tests"), payload)
}

#[test]
fn test_function_ids_follow_the_allocation() {
    let double = Receiver::new(|event: &Event<u32, u32>| Ok(event.payload() * 2));
    let other = Receiver::new(|event: &Event<u32, u32>| Ok(event.payload() * 2));

    assert_eq!(double.id(), double.clone().id());
    assert_eq!(double.id(), double.downgrade().id());
    assert_ne!(double.id(), other.id());
}

#[test]
fn test_rebound_method_has_same_id() {
    let counter = Arc::new(Counter {
        hits: AtomicUsize::new(0),
    });
    let other_counter = Arc::new(Counter {
        hits: AtomicUsize::new(0),
    });

    let first = Receiver::method(&counter, Counter::on_event);
    let second = Receiver::method(&counter, Counter::on_event);
    let other_method = Receiver::method(&counter, Counter::on_other);
    let other_instance = Receiver::method(&other_counter, Counter::on_event);

    assert_eq!(first, second);
    assert_ne!(first, other_method);
    assert_ne!(first, other_instance);
}

#[test]
fn test_weak_receiver_tracks_function() {
    let receiver = Receiver::new(|event: &Event<u32, u32>| Ok(*event.payload()));
    let weak = receiver.downgrade();

    assert!(weak.is_alive());
    assert_eq!(weak.upgrade(), Some(receiver.clone()));

    drop(receiver);

    assert!(!weak.is_alive());
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_weak_receiver_tracks_instance() {
    let counter = Arc::new(Counter {
        hits: AtomicUsize::new(0),
    });
    let weak = Receiver::method(&counter, Counter::on_event).downgrade();

    assert!(weak.is_alive());
    drop(counter);
    assert!(!weak.is_alive());
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_async_flag() {
    let sync = Receiver::new(|event: &Event<u32, u32>| Ok(*event.payload()));
    let asynchronous =
        Receiver::from_async(|event: Event<u32, u32>| async move { Ok(*event.payload()) });

    assert!(!sync.is_async());
    assert!(asynchronous.is_async());
}

#[test]
fn test_event_accessors() {
    let event = event(4);

    assert_eq!(*event.payload(), 4);
    assert_eq!(event.sender(), &Sender::from("tests"));
    assert_eq!(event.signal().name(), Some("numbers"));

    let copy = event.clone();
    assert_eq!(copy.signal(), event.signal());
}

#[tokio::test]
async fn test_invoke_each_form() {
    let counter = Arc::new(Counter {
        hits: AtomicUsize::new(0),
    });
    let receivers = [
        Receiver::new(|event: &Event<u32, u32>| Ok(event.payload() + 1)),
        Receiver::from_async(|event: Event<u32, u32>| async move { Ok(event.payload() + 2) }),
        Receiver::payload_only(|payload: &u32| Ok(payload + 3)),
        Receiver::method(&counter, Counter::on_other),
    ];

    let event = event(10);
    let mut results = Vec::new();
    for receiver in &receivers {
        results.push(receiver.invoke(&event).await.unwrap());
    }

    assert_eq!(results, vec![11, 12, 13, 10]);
}

#[tokio::test]
async fn test_invoke_catching_turns_panic_into_failure() {
    let receiver = Receiver::new(|_event: &Event<u32, u32>| -> Outcome<u32> {
        panic!("bad input {}", 3)
    });

    let err = receiver.invoke_catching(&event(1)).await.unwrap_err();
    let panicked = err.downcast_ref::<ReceiverPanicked>().unwrap();

    assert_eq!(panicked.message, "bad input 3");
    assert_eq!(panicked.receiver, receiver.name());
}

#[tokio::test]
async fn test_invoke_catching_keeps_errors() {
    let receiver = Receiver::new(|_event: &Event<u32, u32>| {
        Err(SignalError::InvalidReceiver {
            receiver: "inner".to_string(),
        }
        .into())
    });

    let err = receiver.invoke_catching(&event(1)).await.unwrap_err();
    assert!(err.downcast_ref::<SignalError>().is_some());
}

#[test]
fn test_connectable_forms() {
    let counter = Arc::new(Counter {
        hits: AtomicUsize::new(0),
    });
    let function = Receiver::new(|event: &Event<u32, u32>| Ok(*event.payload()));
    let payload = Receiver::payload_only(|payload: &u32| Ok(*payload));
    let method = Receiver::method(&counter, Counter::on_event);

    assert_eq!(Connectable::form(&function), Form::Function);
    assert_eq!(Connectable::form(&payload), Form::PayloadOnly);
    assert_eq!(Connectable::form(&method.downgrade()), Form::Method);
    assert!(Connectable::to_strong(&method.downgrade()).is_some());
}
