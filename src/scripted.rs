//! Scripted injected environment.
//!
//! Stands in for the browser globals on native targets: a JSON document
//! describes which wallets are injected, their flags, and how each answers
//! successive requests.
//!
//! ```json
//! {
//!   "ethereum": {
//!     "providers": [
//!       { "flags": ["isBraveWallet", "isMetaMask"], "script": [{ "kind": "reject" }] },
//!       { "flags": ["isWalletX"], "script": [{ "kind": "accounts", "accounts": ["0x11..11"], "delay_ms": 50 }] }
//!     ]
//!   },
//!   "injected_web3": { "polkadot-js": { "script": [{ "kind": "hang" }] } }
//! }
//! ```
//!
//! Each request consumes one step; the last step repeats.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crate::error::{ProviderError, USER_REJECTED_CODE};
use crate::provider::{injected_web3_source, CapabilityFlags, Environment, InjectedProvider, InjectedRoot, ETHEREUM_SOURCE};
use crate::timer::Timer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Accounts {
        accounts: Vec<String>,
        #[serde(default)]
        delay_ms: u64,
    },
    /// Arbitrary payload, for wallets that answer with the wrong shape.
    Raw {
        value: Value,
        #[serde(default)]
        delay_ms: u64,
    },
    Reject {
        #[serde(default = "user_rejected_code")]
        code: i64,
        #[serde(default)]
        message: String,
        #[serde(default)]
        delay_ms: u64,
    },
    Fail {
        message: String,
    },
    /// Never settles.
    Hang,
}

fn user_rejected_code() -> i64 { USER_REJECTED_CODE }

impl Step {
    pub fn accounts(accounts: &[&str]) -> Self {
        Self::accounts_after(0, accounts)
    }

    pub fn accounts_after(delay_ms: u64, accounts: &[&str]) -> Self {
        Step::Accounts { accounts: accounts.iter().map(|a| a.to_string()).collect(), delay_ms }
    }

    pub fn reject() -> Self {
        Step::Reject { code: USER_REJECTED_CODE, message: "User rejected the request.".into(), delay_ms: 0 }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Step::Fail { message: message.into() }
    }

    fn delay(&self) -> u64 {
        match self {
            Step::Accounts { delay_ms, .. } | Step::Raw { delay_ms, .. } | Step::Reject { delay_ms, .. } => *delay_ms,
            Step::Fail { .. } | Step::Hang => 0,
        }
    }
}

/// Injected wallet that plays back a script.
pub struct ScriptedProvider {
    flags: CapabilityFlags,
    members: Vec<Rc<dyn InjectedProvider>>,
    script: RefCell<VecDeque<Step>>,
    calls: Cell<usize>,
    methods: RefCell<Vec<String>>,
    timer: Rc<dyn Timer>,
}

impl ScriptedProvider {
    pub fn new(timer: Rc<dyn Timer>) -> Self {
        Self {
            flags: CapabilityFlags::new(),
            members: Vec::new(),
            script: RefCell::new(VecDeque::new()),
            calls: Cell::new(0),
            methods: RefCell::new(Vec::new()),
            timer,
        }
    }

    pub fn flag(mut self, flag: impl Into<String>) -> Self { self.flags.insert(flag); self }
    pub fn then(self, step: Step) -> Self { self.script.borrow_mut().push_back(step); self }
    pub fn member(mut self, member: Rc<dyn InjectedProvider>) -> Self { self.members.push(member); self }

    /// Requests received so far.
    pub fn calls(&self) -> usize { self.calls.get() }

    pub fn methods(&self) -> Vec<String> { self.methods.borrow().clone() }

    fn next_step(&self) -> Option<Step> {
        let mut script = self.script.borrow_mut();
        if script.len() > 1 { script.pop_front() } else { script.front().cloned() }
    }
}

#[async_trait(?Send)]
impl InjectedProvider for ScriptedProvider {
    fn flags(&self) -> CapabilityFlags { self.flags.clone() }

    fn providers(&self) -> Vec<Rc<dyn InjectedProvider>> { self.members.clone() }

    async fn request(&self, method: &str, _params: Value) -> Result<Value, ProviderError> {
        self.calls.set(self.calls.get() + 1);
        self.methods.borrow_mut().push(method.to_string());

        let Some(step) = self.next_step() else {
            return Err(ProviderError::transport(format!("{} not supported", method)));
        };
        let delay = step.delay();
        if delay > 0 {
            self.timer.sleep(Duration::from_millis(delay)).await;
        }
        match step {
            Step::Accounts { accounts, .. } => Ok(Value::from(accounts)),
            Step::Raw { value, .. } => Ok(value),
            Step::Reject { code, message, .. } => Err(ProviderError::new(code, message)),
            Step::Fail { message } => Err(ProviderError::transport(message)),
            Step::Hang => futures::future::pending().await,
        }
    }
}

/// JSON shape of one scripted wallet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderDef {
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub script: Vec<Step>,
    /// Umbrella members (`ethereum.providers`).
    #[serde(default)]
    pub providers: Vec<ProviderDef>,
}

impl ProviderDef {
    fn build(&self, timer: &Rc<dyn Timer>) -> Rc<ScriptedProvider> {
        let mut provider = ScriptedProvider::new(timer.clone());
        for flag in &self.flags {
            provider = provider.flag(flag.clone());
        }
        for step in &self.script {
            provider = provider.then(step.clone());
        }
        for member in &self.providers {
            provider = provider.member(member.build(timer));
        }
        Rc::new(provider)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentDef {
    #[serde(default)]
    pub ethereum: Option<ProviderDef>,
    #[serde(default)]
    pub injected_web3: BTreeMap<String, ProviderDef>,
}

/// Mutable set of injected roots. Mutations model extensions injecting,
/// reloading or disappearing between detection passes.
#[derive(Debug, Default)]
pub struct ScriptedEnvironment {
    roots: RefCell<Vec<InjectedRoot>>,
}

impl ScriptedEnvironment {
    pub fn new() -> Self { Self::default() }

    pub fn from_def(def: &EnvironmentDef, timer: Rc<dyn Timer>) -> Self {
        let env = Self::new();
        if let Some(ethereum) = &def.ethereum {
            env.inject(ETHEREUM_SOURCE, ethereum.build(&timer));
        }
        for (name, wallet) in &def.injected_web3 {
            env.inject(injected_web3_source(name), wallet.build(&timer));
        }
        env
    }

    pub fn from_json(json: &str, timer: Rc<dyn Timer>) -> anyhow::Result<Self> {
        let def: EnvironmentDef = serde_json::from_str(json).context("parse environment definition")?;
        Ok(Self::from_def(&def, timer))
    }

    pub fn load(path: &Path, timer: Rc<dyn Timer>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_json(&raw, timer)
    }

    /// Inject a root, replacing any existing root with the same source.
    pub fn inject(&self, source: impl Into<String>, handle: Rc<dyn InjectedProvider>) {
        let root = InjectedRoot::new(source, handle);
        let mut roots = self.roots.borrow_mut();
        match roots.iter_mut().find(|r| r.source == root.source) {
            Some(existing) => *existing = root,
            None => roots.push(root),
        }
    }

    pub fn remove(&self, source: &str) -> bool {
        let mut roots = self.roots.borrow_mut();
        let before = roots.len();
        roots.retain(|r| r.source != source);
        roots.len() != before
    }
}

impl Environment for ScriptedEnvironment {
    fn injected(&self) -> Vec<InjectedRoot> { self.roots.borrow().clone() }
}
