use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, taking over the inner value if a previous holder panicked.
///
/// The writer, journal, and audio handles only hold plain data behind their
/// locks, so a poisoned guard is still safe to keep using.
pub(crate) fn lock_or_recover<'a, T: ?Sized>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            crate::log_debug(&format!("Mutex poisoned in {context}; recovering"));
            poisoned.into_inner()
        }
    }
}
