pub mod env {
    use std::collections::HashMap;
    use std::sync::{Mutex, MutexGuard};

    use once_cell::sync::Lazy;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    /// Holds the process-wide env lock; variables set through it are
    /// restored on drop.
    pub struct EnvGuard {
        _lock: MutexGuard<'static, ()>,
        saved: HashMap<&'static str, Option<String>>,
    }

    pub fn guard() -> EnvGuard {
        EnvGuard {
            _lock: ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
            saved: HashMap::new(),
        }
    }

    impl EnvGuard {
        pub fn set(&mut self, key: &'static str, value: &str) {
            self.saved
                .entry(key)
                .or_insert_with(|| std::env::var(key).ok());
            std::env::set_var(key, value);
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, previous) in self.saved.drain() {
                match previous {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}
