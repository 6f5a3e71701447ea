use rand::Rng;
use std::sync::{
    OnceLock,
    atomic::{AtomicU64, Ordering},
};

/// Returns a process-unique connection id for log correlation.
///
/// Ids count up from a random 32-bit offset, so two server runs rarely share ids in merged logs.
pub fn conn_id() -> u64 {
    static NEXT: OnceLock<AtomicU64> = OnceLock::new();
    let next = NEXT.get_or_init(|| AtomicU64::new(u64::from(rand::thread_rng().r#gen::<u32>())));
    next.fetch_add(1, Ordering::Relaxed)
}
