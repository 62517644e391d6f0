//! WASM module: injected wallets in the browser
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        WalletConnect (JS API)           │
//! │  detect, connect, resume, current,      │
//! │  disconnect, watch                      │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │         WalletSession (core)            │
//! │  detect → select → connect → state      │
//! └──────┬──────────┬───────────────┬───────┘
//!        │          │               │
//! ┌──────▼─────┐ ┌──▼───────────┐ ┌─▼──────────────┐
//! │ Browser    │ │ BrowserTimer │ │ LocalStorage   │
//! │ Environment│ │ setTimeout   │ │ Store          │
//! │ window.*   │ └──────────────┘ └────────────────┘
//! └────────────┘
//! ```

mod bindings;
mod env;
mod store;
mod timer;

pub use bindings::{normalize_address, WalletConnect};
pub use env::{BrowserEnvironment, JsProvider};
pub use store::LocalStorageStore;
pub use timer::BrowserTimer;

use wasm_bindgen::prelude::*;

/// Initialize WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Log to browser console
pub fn console_log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

macro_rules! log {
    ($($t:tt)*) => {
        crate::wasm::console_log(&format!($($t)*))
    }
}

pub(crate) use log;
