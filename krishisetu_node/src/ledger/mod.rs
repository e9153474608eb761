//! Transaction log semantics: identifiers minted for new rows, journey
//! reconstruction, and the in-memory simulated chain.

pub mod history;
pub mod simulated;

pub use history::{
    action_for, current_owner, history_entries, owner_label, status_for, status_of, transfer_status,
};
pub use simulated::{SimulatedChain, SimulatedProduct};

use chrono::{DateTime, Utc};
use rand::Rng;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random suffix on hashes and generated product ids
pub const SUFFIX_LEN: usize = 9;

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// `tx_<unix millis>_<9 base-36 chars>`
pub fn transaction_hash(now: DateTime<Utc>) -> String {
    format!("tx_{}_{}", now.timestamp_millis(), random_base36(SUFFIX_LEN))
}

/// Transaction id handed out when the store is down: `tx_<unix millis>`
pub fn fallback_transaction_id(now: DateTime<Utc>) -> String {
    format!("tx_{}", now.timestamp_millis())
}

/// `batch_<unix millis>`
pub fn batch_number(now: DateTime<Utc>) -> String {
    format!("batch_{}", now.timestamp_millis())
}

/// Tracking id for registrations that arrive without one:
/// `prod_<unix millis>_<9 base-36 chars>`
pub fn generate_product_id(now: DateTime<Utc>) -> String {
    format!("prod_{}_{}", now.timestamp_millis(), random_base36(SUFFIX_LEN))
}
