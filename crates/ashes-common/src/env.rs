//! Environment toggles for the debug surfaces.

/// Read a boolean environment toggle ("1", "true", "on" count as set).
pub fn env_flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => matches!(v.as_str(), "1" | "true" | "on"),
        Err(_) => false,
    }
}

/// Whether the allocation registry should track live resources.
/// Always on in debug builds; opt-in via ASHES_LEAK_CHECK elsewhere.
pub fn leak_check_enabled() -> bool {
    cfg!(debug_assertions) || env_flag("ASHES_LEAK_CHECK")
}

/// Whether registry records should capture an allocation backtrace.
pub fn leak_backtrace_enabled() -> bool {
    env_flag("ASHES_LEAK_BACKTRACE")
}
