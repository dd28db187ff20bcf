//! Shared output helpers: global flag checks and JSON printing.
//!
//! Global flags are propagated through environment variables set once in
//! `main`, so every command and helper can check them without plumbing.

/// `--json` was passed.
pub fn is_json() -> bool {
    std::env::var("VIGIL_JSON").is_ok()
}

/// `--quiet` was passed.
pub fn is_quiet() -> bool {
    std::env::var("VIGIL_QUIET").is_ok()
}

/// Print a machine-readable JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!("{value}");
}
