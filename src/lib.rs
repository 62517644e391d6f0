//! polconnect: injected wallet detection and connection orchestration.
//!
//! # Architecture
//!
//! ```text
//! WalletSession (entry point)
//!   │
//!   ├── Detector ── Environment (window globals / scripted fixture)
//!   │     └── ProviderRegistry (fresh descriptors every pass)
//!   │
//!   ├── select() ── preferred → non-default-embedded → first
//!   │
//!   ├── Connector
//!   │     ├── race(request, deadline)   Timer (tokio / setTimeout)
//!   │     ├── one retry after re-resolution
//!   │     └── normalize() → CanonicalAddress ("pol_" + 40 hex)
//!   │
//!   ├── ConnectionState (single writer, watchable)
//!   │
//!   └── SessionStore ("has_pol_wallet", "connected_wallet")
//! ```
//!
//! # Features
//!
//! - `native` - tokio timer, file-backed session store, logging, CLI
//! - `wasm` - browser environment, localStorage, wasm-bindgen API
//!
//! # Usage
//!
//! ```ignore
//! use polconnect::{ConnectConfig, ScriptedEnvironment, TokioTimer, MemoryStore, WalletSession};
//!
//! let timer = Rc::new(TokioTimer::new());
//! let env = ScriptedEnvironment::load(Path::new("wallets.json"), timer.clone())?;
//! let session = WalletSession::new(Rc::new(env), timer, Rc::new(MemoryStore::new()), ConnectConfig::new("auction"));
//!
//! let address = session.connect_default().await?;
//! println!("{}", address.short());
//! ```

// =============================================================================
// Shared modules (compile everywhere)
// =============================================================================
pub mod address;
pub mod config;
pub mod connect;
pub mod detect;
pub mod error;
pub mod provider;
pub mod scripted;
pub mod select;
pub mod session;
pub mod state;
pub mod timer;

// =============================================================================
// Native-only modules
// =============================================================================
#[cfg(feature = "native")]
pub mod logging;

// =============================================================================
// WASM-only modules (browser, localStorage, wasm-bindgen)
// =============================================================================
#[cfg(feature = "wasm")]
pub mod wasm;

// =============================================================================
// Re-exports: Shared
// =============================================================================
pub use address::{normalize, CanonicalAddress};
pub use config::{ConnectConfig, DEFAULT_TIMEOUT};
pub use connect::Connector;
pub use detect::Detector;
pub use error::{ConnectError, ProviderError, StoreError};
pub use provider::{
    CapabilityFlags, DescriptorInfo, Environment, InjectedProvider, InjectedRoot, KnownWallet,
    ProviderDescriptor, ProviderIdentity, ProviderRegistry,
};
pub use scripted::{ScriptedEnvironment, ScriptedProvider, Step};
pub use select::{select, select_with, SelectionPolicy};
pub use session::{MemoryStore, SessionStore, WalletSession};
pub use state::{AttemptOutcome, ConnectionAttempt, ConnectionSnapshot, ConnectionState, ConnectionStatus};
pub use timer::{race, Raced, Timer};

// =============================================================================
// Re-exports: Native
// =============================================================================
#[cfg(feature = "native")]
pub use session::FileStore;
#[cfg(feature = "native")]
pub use timer::TokioTimer;

// =============================================================================
// Re-exports: WASM
// =============================================================================
#[cfg(feature = "wasm")]
pub use wasm::{BrowserEnvironment, BrowserTimer, LocalStorageStore, WalletConnect};
