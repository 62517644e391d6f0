use futures::future::LocalBoxFuture;
use js_sys::{Function, Promise, Reflect};
use std::time::Duration;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::Performance;

use crate::timer::Timer;

/// `setTimeout` on the global scope (window or worker); `performance.now()` for the clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserTimer;

fn performance() -> Option<Performance> {
    Reflect::get(&js_sys::global(), &JsValue::from_str("performance"))
        .ok()
        .and_then(|p| p.dyn_into::<Performance>().ok())
}

impl Timer for BrowserTimer {
    fn now_ms(&self) -> u64 {
        match performance() {
            Some(performance) => performance.now() as u64,
            // No high-resolution clock in this scope.
            None => js_sys::Date::now() as u64,
        }
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let ms = duration.as_millis().min(i32::MAX as u128) as i32;
        let promise = Promise::new(&mut |resolve, _reject| {
            let global = js_sys::global();
            let scheduled = Reflect::get(&global, &JsValue::from_str("setTimeout"))
                .and_then(|f| f.dyn_into::<Function>())
                .and_then(|set_timeout| set_timeout.call2(&global, &resolve, &JsValue::from(ms)));
            // A timer that cannot be scheduled expires now rather than never.
            if scheduled.is_err() {
                let _ = resolve.call0(&JsValue::UNDEFINED);
            }
        });
        Box::pin(async move {
            let _ = JsFuture::from(promise).await;
        })
    }
}
