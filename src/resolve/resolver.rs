use std::collections::HashSet;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Resolution;
use crate::storage::kv_store::KeyValueStore;

/// Follow redirects from `id` until reaching an id with no store entry.
pub fn resolve<S: KeyValueStore + ?Sized>(store: &S, id: &str) -> Result<String> {
    resolve_chain(store, id).map(|resolution| resolution.terminal)
}

/// Like [`resolve`], but also returns every id passed through on the way.
///
/// An id that is never redirected comes back as its own terminal with no
/// intermediates. Revisiting an id fails with `RedirectCycle` instead of
/// looping forever.
pub fn resolve_chain<S: KeyValueStore + ?Sized>(store: &S, id: &str) -> Result<Resolution> {
    let mut current = id.to_string();
    let mut intermediates = Vec::new();
    let mut visited = HashSet::new();

    while let Some(next) = store.get(&current)? {
        if !visited.insert(current.clone()) {
            return Err(Error::new(
                ErrorKind::RedirectCycle,
                format!("redirects from {} loop back to {}", id, current),
            ));
        }
        intermediates.push(std::mem::replace(&mut current, next));
    }

    Ok(Resolution { terminal: current, intermediates })
}
