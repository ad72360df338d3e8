//! Fuzz target for wire protocol deserialization
//!
//! Feeds arbitrary bytes into the serde paths for both message directions.
//! The fuzzer should NEVER panic; malformed JSON and type-confused payloads
//! must return errors.

#![no_main]

use bookseal_worker::protocol::{WorkerMessage, WorkerRequest};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<WorkerRequest>(data);
    let _ = serde_json::from_slice::<WorkerMessage>(data);
});
