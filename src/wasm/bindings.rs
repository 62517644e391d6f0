//! WalletConnect: JS-facing session handle
//!
//! ```js
//! const wallets = new WalletConnect({ app: "auction", timeoutMs: 30000 });
//! wallets.detect();                  // [{ identity, name, flags, ... }]
//! const addr = await wallets.connect(); // "pol_..."
//! wallets.watch(snapshot => render(snapshot));
//! wallets.disconnect();
//! ```
//!
//! Failures reject with `{ kind, message }`.

use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::prelude::*;

use super::log;
use super::{BrowserEnvironment, BrowserTimer, LocalStorageStore};
use crate::address::normalize;
use crate::config::ConnectConfig;
use crate::error::ConnectError;
use crate::provider::{KnownWallet, ProviderIdentity};
use crate::session::WalletSession;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Options {
    app: Option<String>,
    timeout_ms: Option<u64>,
    preferred: Vec<String>,
    excluded: Vec<String>,
    wallets: Vec<KnownWallet>,
}

impl Options {
    fn into_config(self) -> ConnectConfig {
        let mut config = ConnectConfig::new(self.app.unwrap_or_else(|| "polconnect".into()));
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        config.preferred = self.preferred.iter().map(|s| ProviderIdentity::from(s.as_str())).collect();
        config.excluded = self.excluded.iter().map(|s| ProviderIdentity::from(s.as_str())).collect();
        config.wallets = self.wallets;
        config
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value.serialize(&serializer).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn connect_error(err: ConnectError) -> JsValue {
    #[derive(Serialize)]
    struct JsError<'a> {
        kind: &'a str,
        message: String,
    }
    to_js(&JsError { kind: err.kind(), message: err.to_string() })
        .unwrap_or_else(|_| JsValue::from_str(&err.to_string()))
}

#[wasm_bindgen]
pub struct WalletConnect {
    session: Rc<WalletSession>,
}

#[wasm_bindgen]
impl WalletConnect {
    /// `options`: `{ app, timeoutMs, preferred, excluded, wallets }`, all optional.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<WalletConnect, JsValue> {
        let options: Options = if options.is_undefined() || options.is_null() {
            Options::default()
        } else {
            serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        let config = options.into_config();
        log!("[WalletConnect] app={} timeout={:?}", config.app, config.timeout);

        let env = Rc::new(BrowserEnvironment::new(&config.wallets));
        let session = WalletSession::new(env, Rc::new(BrowserTimer), Rc::new(LocalStorageStore), config);
        Ok(Self { session: Rc::new(session) })
    }

    /// Descriptors found by a fresh pass.
    #[wasm_bindgen]
    pub fn detect(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.detect().infos())
    }

    /// Connect to `identity`, or to the selector's choice when omitted.
    #[wasm_bindgen]
    pub async fn connect(&self, identity: Option<String>) -> Result<String, JsValue> {
        let registry = self.session.detect();
        if registry.is_empty() {
            return Err(connect_error(ConnectError::NoProviderFound));
        }
        let descriptor = match identity {
            Some(id) => registry.find(&ProviderIdentity::new(id)).cloned(),
            None => self.session.select(&registry),
        }
        .ok_or_else(|| connect_error(ConnectError::SelectionEmpty))?;

        log!("[WalletConnect] connecting to {}", descriptor.identity());
        let address = self.session.connect(&descriptor).await.map_err(connect_error)?;
        Ok(address.to_string())
    }

    /// Silent restore of a stored session. Resolves to the address or `null`.
    #[wasm_bindgen]
    pub async fn resume(&self) -> Result<Option<String>, JsValue> {
        let restored = self.session.restore().await.map_err(connect_error)?;
        Ok(restored.map(|a| a.to_string()))
    }

    #[wasm_bindgen]
    pub fn current(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.current())
    }

    #[wasm_bindgen]
    pub fn disconnect(&self) {
        self.session.disconnect();
        log!("[WalletConnect] disconnected");
    }

    #[wasm_bindgen(js_name = "providerSeen")]
    pub fn provider_seen(&self) -> bool {
        self.session.provider_seen()
    }

    #[wasm_bindgen(js_name = "lastConnected")]
    pub fn last_connected(&self) -> Option<String> {
        self.session.last_connected().map(|a| a.to_string())
    }

    /// Calls `callback(snapshot)` on every state transition.
    #[wasm_bindgen]
    pub fn watch(&self, callback: js_sys::Function) {
        let rx = self.session.watch();
        let this = JsValue::NULL;
        wasm_bindgen_futures::spawn_local(async move {
            use futures::StreamExt;
            let mut rx = rx;
            while let Some(snapshot) = rx.next().await {
                if let Ok(value) = to_js(&snapshot) {
                    let _ = callback.call1(&this, &value);
                }
            }
        });
    }
}

/// `pol_` form of any accepted address shape.
#[wasm_bindgen(js_name = "normalizeAddress")]
pub fn normalize_address(raw: &str) -> Result<String, JsValue> {
    normalize(raw).map(|a| a.to_string()).map_err(connect_error)
}
