//! Items left in a file-backed queue are delivered after a restart.

#![cfg(feature = "sqlite")]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use sspr_queue::{ProcessOutcome, ProcessorSettings, WorkItem, WorkQueueProcessor};
use sspr_storage::SqliteStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Invoice {
    number: u32,
}

impl WorkItem for Invoice {
    const TYPE_TAG: &'static str = "billing.invoice";
}

fn settings() -> ProcessorSettings {
    sspr_observability::init_for_tests();
    ProcessorSettings::named("invoices")
        .with_retry_interval(Duration::from_secs(30))
        .with_max_shutdown_wait(Duration::from_millis(100))
}

#[test]
fn queued_items_are_delivered_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("queue.db").display());

    {
        let store = SqliteStore::open(&url).unwrap();
        let processor =
            WorkQueueProcessor::new(store, settings(), |_: &Invoice| ProcessOutcome::Retry).unwrap();
        for number in 1..=3 {
            processor.submit(Invoice { number }).unwrap();
        }
        assert_eq!(processor.close(), 3);
    }

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = delivered.clone();
    let store = SqliteStore::open(&url).unwrap();
    let processor = WorkQueueProcessor::new(store, settings(), move |invoice: &Invoice| {
        sink.lock().push(invoice.number);
        ProcessOutcome::Success
    })
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while delivered.lock().len() < 3 {
        assert!(Instant::now() < deadline, "timed out waiting for redelivery");
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(*delivered.lock(), vec![1, 2, 3]);
    assert_eq!(processor.close(), 0);
}
