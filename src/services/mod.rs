//! Business services of the transactional core.
//!
//! Every mutation runs inside a single database transaction; cross-row
//! invariants are guarded by conditional updates on the rows being touched,
//! retried with backoff on contention (`db::with_retry`).

pub mod inventory;
pub mod orders;
pub mod pricing;
pub mod reservations;
pub mod settlement;
pub mod transfers;
