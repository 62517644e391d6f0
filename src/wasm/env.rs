//! `window.ethereum` and `window.injectedWeb3` as an [`Environment`].

use async_trait::async_trait;
use js_sys::{Array, Function, Object, Promise, Reflect};
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use crate::error::ProviderError;
use crate::provider::{
    injected_web3_source, probe_flags, CapabilityFlags, Environment, InjectedProvider, InjectedRoot, KnownWallet,
    ETHEREUM_SOURCE,
};

/// Live browser globals. Re-read on every detection pass.
pub struct BrowserEnvironment {
    probes: Rc<Vec<String>>,
}

impl Default for BrowserEnvironment {
    fn default() -> Self { Self::new(&[]) }
}

impl BrowserEnvironment {
    /// `extra` adds host catalog flags to the probe list.
    pub fn new(extra: &[KnownWallet]) -> Self {
        Self { probes: Rc::new(probe_flags(extra)) }
    }

    fn provider(&self, object: JsValue) -> Rc<dyn InjectedProvider> {
        Rc::new(JsProvider { object, probes: self.probes.clone() })
    }
}

impl Environment for BrowserEnvironment {
    fn injected(&self) -> Vec<InjectedRoot> {
        let Some(window) = web_sys::window() else {
            return Vec::new();
        };
        let mut roots = Vec::new();

        if let Some(ethereum) = property(&window, "ethereum").filter(JsValue::is_object) {
            roots.push(InjectedRoot::new(ETHEREUM_SOURCE, self.provider(ethereum)));
        }
        if let Some(web3) = property(&window, "injectedWeb3").filter(JsValue::is_object) {
            for key in Object::keys(web3.unchecked_ref::<Object>()).iter() {
                let (Some(name), Some(entry)) = (key.as_string(), Reflect::get(&web3, &key).ok()) else {
                    continue;
                };
                if entry.is_object() {
                    roots.push(InjectedRoot::new(injected_web3_source(&name), self.provider(entry)));
                }
            }
        }
        roots
    }
}

/// One injected JS object exposing EIP-1193 `request({method, params})`.
pub struct JsProvider {
    object: JsValue,
    probes: Rc<Vec<String>>,
}

#[async_trait(?Send)]
impl InjectedProvider for JsProvider {
    fn flags(&self) -> CapabilityFlags {
        let mut flags = CapabilityFlags::new();
        if let Some(object) = self.object.dyn_ref::<Object>() {
            for key in Object::keys(object).iter().filter_map(|k| k.as_string()) {
                if key.starts_with("is") && is_true(&self.object, &key) {
                    flags.insert(key);
                }
            }
        }
        // Some wallets define their flags as prototype getters.
        for probe in self.probes.iter() {
            if is_true(&self.object, probe) {
                flags.insert(probe.clone());
            }
        }
        flags
    }

    fn providers(&self) -> Vec<Rc<dyn InjectedProvider>> {
        let Some(list) = property(&self.object, "providers").filter(Array::is_array) else {
            return Vec::new();
        };
        list.unchecked_into::<Array>()
            .iter()
            .filter(JsValue::is_object)
            .map(|object| Rc::new(JsProvider { object, probes: self.probes.clone() }) as Rc<dyn InjectedProvider>)
            .collect()
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let request = property(&self.object, "request")
            .and_then(|f| f.dyn_into::<Function>().ok())
            .ok_or_else(|| ProviderError::transport("provider has no request()"))?;

        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        let params = params
            .serialize(&serializer)
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        let args = Object::new();
        Reflect::set(&args, &"method".into(), &JsValue::from_str(method)).map_err(js_error)?;
        Reflect::set(&args, &"params".into(), &params).map_err(js_error)?;

        let result = request.call1(&self.object, &args).map_err(js_error)?;
        let settled = match result.dyn_into::<Promise>() {
            Ok(promise) => JsFuture::from(promise).await.map_err(js_error)?,
            Err(value) => value,
        };
        serde_wasm_bindgen::from_value(settled).map_err(|e| ProviderError::transport(e.to_string()))
    }
}

fn property(target: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

fn is_true(target: &JsValue, key: &str) -> bool {
    property(target, key).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// EIP-1193 rejection `{code, message}`, or anything else thrown.
fn js_error(err: JsValue) -> ProviderError {
    let code = property(&err, "code").and_then(|c| c.as_f64()).map(|c| c as i64);
    let message = property(&err, "message")
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", err));
    ProviderError { code, message }
}
