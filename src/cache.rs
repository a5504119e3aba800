use anyhow::Result;
use std::sync::{Mutex, OnceLock};

/// A value loaded at most once for the life of its owner.
///
/// Concurrent first calls serialize on an init lock, so the loader runs once
/// even under contention. A failed load leaves the cell empty and the next
/// call tries again. Nothing ever invalidates a loaded value.
#[derive(Debug)]
pub struct LoadOnce<T> {
    value: OnceLock<T>,
    init: Mutex<()>,
}

impl<T> Default for LoadOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LoadOnce<T> {
    pub fn new() -> Self {
        Self {
            value: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    pub fn get_or_try_load<F>(&self, load: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        let _guard = self.init.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(value) = self.value.get() {
            return Ok(value);
        }

        let loaded = load()?;
        Ok(self.value.get_or_init(|| loaded))
    }

    /// Drop the cached value so the next access reloads it.
    pub fn reset(&mut self) {
        self.value.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_loads_only_once() {
        let cell = LoadOnce::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cell
                .get_or_try_load(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .unwrap();
            assert_eq!(*value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_is_retried() {
        let cell: LoadOnce<u32> = LoadOnce::new();
        assert!(cell.get_or_try_load(|| Err(anyhow!("missing file"))).is_err());
        assert_eq!(*cell.get_or_try_load(|| Ok(7)).unwrap(), 7);
    }

    #[test]
    fn test_reset_forces_reload() {
        let mut cell = LoadOnce::new();
        cell.get_or_try_load(|| Ok("first")).unwrap();
        cell.reset();
        assert_eq!(*cell.get_or_try_load(|| Ok("second")).unwrap(), "second");
    }

    #[test]
    fn test_concurrent_first_access_loads_once() {
        let cell = Arc::new(LoadOnce::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    *cell
                        .get_or_try_load(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(10));
                            Ok(99u32)
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 99);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
