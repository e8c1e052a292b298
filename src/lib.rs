// The binary in main.rs drives the terminal; everything it needs lives here so
// integration tests can reach the session and App without a terminal.

rust_i18n::i18n!("locales", fallback = "en");

pub mod ai;
pub mod app;
pub mod audio;
pub mod config;
pub mod event;
pub mod image;
pub mod library;
pub mod markup;
pub mod report;
pub mod session;
pub mod store;
pub mod ui;

/// Text for `key` in the active locale.
pub fn tr(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}
