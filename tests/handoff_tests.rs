// Producer/consumer handoff tests

use csv_playback::handoff::handoff;
use csv_playback::{CancelToken, EmissionUnit, Envelope, FieldValue, Record};
use std::thread;
use std::time::Duration;

fn envelope(seq: i64) -> Envelope {
    let record: Record = vec![("seq".to_string(), FieldValue::Integer(seq))]
        .into_iter()
        .collect();
    Envelope::stamp(EmissionUnit::Single(record))
}

fn seq(envelope: &Envelope) -> i64 {
    match &envelope.payload {
        EmissionUnit::Single(record) => match record.get("seq") {
            Some(FieldValue::Integer(v)) => *v,
            other => panic!("unexpected seq {:?}", other),
        },
        other => panic!("unexpected unit {:?}", other),
    }
}

#[test]
fn test_batches_arrive_full_then_flushed_remainder() {
    let (mut tx, rx) = handoff(4, CancelToken::new());
    let producer = thread::spawn(move || {
        for i in 0..10 {
            tx.push(envelope(i)).unwrap();
        }
        tx.flush().unwrap();
    });

    let mut sizes = Vec::new();
    let mut seen = Vec::new();
    while let Some(batch) = rx.recv_batch() {
        sizes.push(batch.len());
        seen.extend(batch.iter().map(seq));
    }
    producer.join().unwrap();

    assert_eq!(sizes, vec![4, 4, 2]);
    assert_eq!(seen, (0..10).collect::<Vec<_>>());
}

#[test]
fn test_concurrent_transfer_is_lossless_and_ordered() {
    let total = 5_000;
    let (mut tx, rx) = handoff(7, CancelToken::new());
    let producer = thread::spawn(move || {
        for i in 0..total {
            tx.push(envelope(i)).unwrap();
        }
        tx.flush().unwrap();
    });
    let consumer = thread::spawn(move || {
        let mut seen = Vec::new();
        while let Some(batch) = rx.recv_batch() {
            assert!(batch.len() <= 7);
            seen.extend(batch.iter().map(seq));
        }
        seen
    });

    producer.join().unwrap();
    let seen = consumer.join().unwrap();
    assert_eq!(seen, (0..total).collect::<Vec<_>>());
}

#[test]
fn test_nothing_is_delivered_below_capacity_until_flush() {
    let (mut tx, rx) = handoff(3, CancelToken::new());
    tx.push(envelope(0)).unwrap();
    tx.push(envelope(1)).unwrap();
    assert_eq!(tx.len(), 2);

    let consumer = thread::spawn(move || rx.recv_batch().map(|batch| batch.len()));
    thread::sleep(Duration::from_millis(20));
    tx.flush().unwrap();

    assert_eq!(consumer.join().unwrap(), Some(2));
    assert!(tx.is_empty());
}

#[test]
fn test_cancel_wakes_waiting_consumer() {
    let cancel = CancelToken::new();
    let (_tx, rx) = handoff(2, cancel.clone());
    let consumer = thread::spawn(move || rx.recv_batch().is_none());

    thread::sleep(Duration::from_millis(20));
    cancel.cancel();
    assert!(consumer.join().unwrap());
}

#[test]
fn test_empty_flush_is_noop() {
    let (mut tx, _rx) = handoff(2, CancelToken::new());
    assert!(tx.flush().is_ok());
}
