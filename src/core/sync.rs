//! Synchronization utilities for mutex poisoning
//!
//! The in-memory cache and the fan-out registry sit behind `std::sync::Mutex`
//! because they are touched from `Drop` impls. A poisoned lock there means a
//! panic happened mid-update; callers turn it into their own error type.

use std::sync::LockResult;

/// Convert a poisoned lock result into an application error
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use walkin::core::sync::handle_mutex_poison;
/// use walkin::cache::api::CacheError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), CacheError::Unavailable).unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<T>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<T, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (mutex poisoned). A panic occurred while holding a lock. PoisonError: {:?}",
            poison_err
        ))
    })
}
