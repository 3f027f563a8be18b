//! Shared test utilities for integration tests
//!
//! Serializes access to process environment variables so config tests can
//! point the global config directory at a temp dir without racing each other.

use std::sync::Mutex;
use tempfile::TempDir;

/// Global mutex serializing environment variable access across tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const CAPTURED: &[&str] = &[
    "HOME",
    "XDG_CONFIG_HOME",
    "FRAGSYNC_ENV",
    "FRAGSYNC__FRAGMENT__FILENAME",
    "FRAGSYNC__SYNC__IGNORE_HIDDEN",
];

/// Environment variable state to restore after test
struct EnvState {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            saved: CAPTURED
                .iter()
                .map(|name| (*name, std::env::var(name).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (name, value) in self.saved {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

/// Run `f` with `XDG_CONFIG_HOME` and `HOME` pointed into `test_dir` and all
/// fragsync variables cleared. The original environment is restored afterwards.
pub fn with_config_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();

    for name in CAPTURED {
        std::env::remove_var(name);
    }
    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path().to_str().unwrap());

    let result = f();

    env_state.restore();

    result
}
