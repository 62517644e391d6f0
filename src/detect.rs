//! Detector: one pass over the environment's injected globals.

use std::cell::Cell;
use std::rc::Rc;

use crate::provider::{
    classify, default_catalog, Environment, InjectedProvider, KnownWallet, ProviderDescriptor,
    ProviderRegistry, ProviderSlot,
};

pub struct Detector {
    env: Rc<dyn Environment>,
    catalog: Vec<KnownWallet>,
    passes: Cell<u64>,
}

impl Detector {
    pub fn new(env: Rc<dyn Environment>) -> Self {
        Self { env, catalog: default_catalog(), passes: Cell::new(0) }
    }

    /// Host-supplied wallets are matched before the built-in catalog.
    pub fn with_known(mut self, extra: Vec<KnownWallet>) -> Self {
        let mut catalog = extra;
        catalog.append(&mut self.catalog);
        self.catalog = catalog;
        self
    }

    pub fn catalog(&self) -> &[KnownWallet] { &self.catalog }

    /// Enumerate injected handles. Never fails; no providers is an empty registry.
    pub fn detect(&self) -> ProviderRegistry {
        let pass = self.passes.get() + 1;
        self.passes.set(pass);

        let mut seen: Vec<Rc<dyn InjectedProvider>> = Vec::new();
        let mut descriptors = Vec::new();
        for root in self.env.injected() {
            let members = root.handle.providers();
            let entries: Vec<(Option<usize>, Rc<dyn InjectedProvider>)> = if members.is_empty() {
                vec![(None, root.handle.clone())]
            } else {
                members.into_iter().enumerate().map(|(i, h)| (Some(i), h)).collect()
            };
            for (index, handle) in entries {
                if seen.iter().any(|s| std::ptr::addr_eq(Rc::as_ptr(s), Rc::as_ptr(&handle))) {
                    continue;
                }
                seen.push(handle.clone());
                let flags = handle.flags();
                let class = classify(&self.catalog, &root.source, &flags);
                let slot = ProviderSlot { source: root.source.clone(), index };
                descriptors.push(ProviderDescriptor::detected(class, flags, slot, pass, handle));
            }
        }

        tracing::debug!(
            pass,
            count = descriptors.len(),
            identities = ?descriptors.iter().map(|d| d.identity().as_str()).collect::<Vec<_>>(),
            "detection pass"
        );
        ProviderRegistry::new(pass, descriptors)
    }

    /// Fresh pass, then the same slot + identity, else the first with the same identity.
    pub fn re_resolve(&self, stale: &ProviderDescriptor) -> Option<ProviderDescriptor> {
        let registry = self.detect();
        registry
            .iter()
            .find(|d| d.slot() == stale.slot() && d.identity() == stale.identity())
            .or_else(|| registry.find(stale.identity()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::provider::{CapabilityFlags, InjectedRoot, ETHEREUM_SOURCE};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::cell::RefCell;

    struct Stub {
        flags: CapabilityFlags,
        members: Vec<Rc<dyn InjectedProvider>>,
    }

    #[async_trait(?Send)]
    impl InjectedProvider for Stub {
        fn flags(&self) -> CapabilityFlags { self.flags.clone() }
        fn providers(&self) -> Vec<Rc<dyn InjectedProvider>> { self.members.clone() }
        async fn request(&self, _: &str, _: Value) -> Result<Value, ProviderError> {
            Err(ProviderError::transport("stub"))
        }
    }

    fn stub(flags: &[&str]) -> Rc<dyn InjectedProvider> {
        Rc::new(Stub { flags: flags.iter().copied().collect(), members: Vec::new() })
    }

    struct Env(RefCell<Vec<InjectedRoot>>);

    impl Environment for Env {
        fn injected(&self) -> Vec<InjectedRoot> { self.0.borrow().clone() }
    }

    #[test]
    fn empty_environment_is_empty_registry() {
        let detector = Detector::new(Rc::new(Env(RefCell::new(vec![]))));
        let registry = detector.detect();
        assert!(registry.is_empty());
        assert_eq!(registry.pass(), 1);
    }

    #[test]
    fn umbrella_members_become_descriptors() {
        let brave = stub(&["isBraveWallet", "isMetaMask"]);
        let metamask = stub(&["isMetaMask"]);
        let umbrella: Rc<dyn InjectedProvider> = Rc::new(Stub {
            flags: ["isMetaMask"].into_iter().collect(),
            // The umbrella aliases one member; it must not be listed twice.
            members: vec![brave.clone(), metamask.clone(), brave.clone()],
        });
        let env = Env(RefCell::new(vec![
            InjectedRoot::new(ETHEREUM_SOURCE, umbrella),
            InjectedRoot::new("injectedWeb3.polkadot-js", stub(&[])),
        ]));
        let registry = Detector::new(Rc::new(env)).detect();

        let ids: Vec<_> = registry.iter().map(|d| d.identity().as_str().to_string()).collect();
        assert_eq!(ids, vec!["brave-wallet", "metamask", "polkadot-js"]);
        assert!(registry.get(0).unwrap().is_default_embedded());
        assert_eq!(registry.get(1).unwrap().slot().index, Some(1));
        assert_eq!(registry.get(2).unwrap().slot().index, None);
    }

    #[test]
    fn passes_are_fresh_and_re_resolve_follows_environment() {
        let env = Rc::new(Env(RefCell::new(vec![InjectedRoot::new(ETHEREUM_SOURCE, stub(&["isMetaMask"]))])));
        let detector = Detector::new(env.clone());
        let first = detector.detect();
        let descriptor = first.get(0).unwrap().clone();

        // Extension reloaded: new handle object in the same slot.
        env.0.borrow_mut()[0] = InjectedRoot::new(ETHEREUM_SOURCE, stub(&["isMetaMask"]));
        let fresh = detector.re_resolve(&descriptor).expect("re-resolved");
        assert_eq!(fresh.identity(), descriptor.identity());
        assert!(fresh.pass() > descriptor.pass());
        assert!(!Rc::ptr_eq(&fresh.handle(), &descriptor.handle()));

        // Extension removed.
        env.0.borrow_mut().clear();
        assert!(detector.re_resolve(&descriptor).is_none());
    }

    #[test]
    fn host_catalog_takes_precedence() {
        let env = Env(RefCell::new(vec![InjectedRoot::new(ETHEREUM_SOURCE, stub(&["isCustomX", "isMetaMask"]))]));
        let detector = Detector::new(Rc::new(env))
            .with_known(vec![KnownWallet::new("custom-x", "Custom X").flag("isCustomX")]);
        assert_eq!(detector.detect().get(0).unwrap().identity().as_str(), "custom-x");
    }
}
