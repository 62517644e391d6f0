//! Session Tests: WalletSession over durable stores and configuration
//!
//! These tests verify:
//! 1. The "wallet seen" flag is sticky and survives disconnect
//! 2. The connected address persists across sessions and is removed on disconnect
//! 3. Failed connects never overwrite the stored address
//! 4. Preferred/excluded identities shape the default connect
//! 5. Silent restore only runs when a session was stored
//! 6. POLCONNECT_* environment configuration

use once_cell::sync::Lazy;
use polconnect::provider::ETHEREUM_SOURCE;
use polconnect::session::{session_path, CONNECTED_KEY, HAS_WALLET_KEY};
use polconnect::{
    ConnectConfig, ConnectError, ConnectionStatus, FileStore, MemoryStore, ScriptedEnvironment, ScriptedProvider,
    SessionStore, Step, TokioTimer, WalletSession,
};
use std::rc::Rc;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner())
}

fn hex(c: char) -> String {
    format!("0x{}", c.to_string().repeat(40))
}

fn pol(c: char) -> String {
    format!("pol_{}", c.to_string().repeat(40))
}

fn session(env: &Rc<ScriptedEnvironment>, timer: &Rc<TokioTimer>, store: Rc<dyn SessionStore>, config: ConnectConfig) -> WalletSession {
    WalletSession::new(env.clone(), timer.clone(), store, config)
}

/// Test: flag is recorded on detection; address stored on connect, removed on disconnect
#[tokio::test(start_paused = true)]
async fn persists_flag_and_address_in_file_store() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("auction").join("data").join("session.json");
    let timer = Rc::new(TokioTimer::new());
    let env = Rc::new(ScriptedEnvironment::new());
    let wallets = session(&env, &timer, Rc::new(FileStore::at(&path)), ConnectConfig::new("auction"));

    assert!(wallets.detect().is_empty());
    assert!(!wallets.provider_seen());
    assert_eq!(wallets.connect_default().await, Err(ConnectError::NoProviderFound));

    env.inject(
        ETHEREUM_SOURCE,
        Rc::new(ScriptedProvider::new(timer.clone()).flag("isMetaMask").then(Step::accounts(&[hex('1').as_str()]))),
    );
    let address = wallets.connect_default().await.expect("connected");
    assert_eq!(address.to_string(), pol('1'));
    assert!(wallets.provider_seen());
    assert_eq!(wallets.last_connected(), Some(address));

    let reopened = FileStore::at(&path);
    assert_eq!(reopened.get(HAS_WALLET_KEY).unwrap().as_deref(), Some("true"));
    assert_eq!(reopened.get(CONNECTED_KEY).unwrap(), Some(pol('1')));

    wallets.disconnect();
    assert_eq!(wallets.current().status, ConnectionStatus::Disconnected);
    assert_eq!(reopened.get(CONNECTED_KEY).unwrap(), None);
    // Sticky: wallet was seen, even if it is gone now.
    assert!(env.remove(ETHEREUM_SOURCE));
    assert!(wallets.detect().is_empty());
    assert!(wallets.provider_seen());
}

/// Test: a rejected reconnect keeps the stored address
#[tokio::test(start_paused = true)]
async fn failed_connect_keeps_stored_address() {
    let timer = Rc::new(TokioTimer::new());
    let env = Rc::new(ScriptedEnvironment::new());
    env.inject(
        ETHEREUM_SOURCE,
        Rc::new(
            ScriptedProvider::new(timer.clone())
                .flag("isMetaMask")
                .then(Step::accounts(&[hex('2').as_str()]))
                .then(Step::reject()),
        ),
    );
    let wallets = session(&env, &timer, Rc::new(MemoryStore::new()), ConnectConfig::new("auction"));

    let first = wallets.connect_default().await.expect("connected");
    assert_eq!(wallets.connect_default().await, Err(ConnectError::UserRejected));
    assert_eq!(wallets.last_connected(), Some(first));
    assert_eq!(wallets.current().address, Some(first));
}

/// Test: preferred identity beats the non-embedded tier; exclusion empties selection
#[tokio::test(start_paused = true)]
async fn preferred_and_excluded_identities() {
    let timer = Rc::new(TokioTimer::new());
    let env = Rc::new(ScriptedEnvironment::new());
    env.inject(
        ETHEREUM_SOURCE,
        Rc::new(
            ScriptedProvider::new(timer.clone())
                .member(Rc::new(
                    ScriptedProvider::new(timer.clone()).flag("isMetaMask").then(Step::accounts(&[hex('3').as_str()])),
                ))
                .member(Rc::new(
                    ScriptedProvider::new(timer.clone())
                        .flag("isBraveWallet")
                        .then(Step::accounts(&[hex('4').as_str()])),
                )),
        ),
    );

    let plain = session(&env, &timer, Rc::new(MemoryStore::new()), ConnectConfig::new("a"));
    assert_eq!(plain.connect_default().await.expect("connected").to_string(), pol('3'));

    let prefers_brave = session(&env, &timer, Rc::new(MemoryStore::new()), ConnectConfig::new("b").with_preferred("brave-wallet"));
    assert_eq!(prefers_brave.connect_default().await.expect("connected").to_string(), pol('4'));

    let excludes_all = session(
        &env,
        &timer,
        Rc::new(MemoryStore::new()),
        ConnectConfig::new("c").with_excluded("metamask").with_excluded("brave-wallet"),
    );
    assert_eq!(excludes_all.connect_default().await, Err(ConnectError::SelectionEmpty));
}

/// Test: restore is a no-op without a stored session, silent resume otherwise
#[tokio::test(start_paused = true)]
async fn restore_uses_silent_handshake() {
    let timer = Rc::new(TokioTimer::new());
    let env = Rc::new(ScriptedEnvironment::new());
    let wallet = Rc::new(ScriptedProvider::new(timer.clone()).flag("isMetaMask").then(Step::accounts(&[hex('5').as_str()])));
    env.inject(ETHEREUM_SOURCE, wallet.clone());
    let store: Rc<dyn SessionStore> = Rc::new(MemoryStore::new());

    let first = session(&env, &timer, store.clone(), ConnectConfig::new("auction"));
    assert_eq!(first.restore().await, Ok(None));
    assert_eq!(wallet.calls(), 0);
    first.connect_default().await.expect("connected");

    // Page reload: fresh state, same durable store.
    let reloaded = session(&env, &timer, store, ConnectConfig::new("auction"));
    assert_eq!(reloaded.current().status, ConnectionStatus::Disconnected);
    let restored = reloaded.restore().await.expect("restore").expect("address");
    assert_eq!(restored.to_string(), pol('5'));
    assert_eq!(reloaded.current().status, ConnectionStatus::Connected);
    assert_eq!(wallet.methods(), vec!["eth_requestAccounts".to_string(), "eth_accounts".to_string()]);
}

/// Test: watchers observe connecting → connected → disconnected
#[tokio::test(start_paused = true)]
async fn watch_streams_snapshots() {
    use futures::StreamExt;

    let timer = Rc::new(TokioTimer::new());
    let env = Rc::new(ScriptedEnvironment::new());
    env.inject(
        ETHEREUM_SOURCE,
        Rc::new(ScriptedProvider::new(timer.clone()).flag("isMetaMask").then(Step::accounts_after(20, &[hex('6').as_str()]))),
    );
    let wallets = session(&env, &timer, Rc::new(MemoryStore::new()), ConnectConfig::new("auction"));
    let mut rx = wallets.watch();

    wallets.connect_default().await.expect("connected");
    wallets.disconnect();

    let mut statuses = Vec::new();
    for _ in 0..3 {
        statuses.push(rx.next().await.expect("snapshot").status);
    }
    assert_eq!(
        statuses,
        vec![ConnectionStatus::Connecting, ConnectionStatus::Connected, ConnectionStatus::Disconnected]
    );
}

/// Test: configuration overlay from POLCONNECT_* variables
#[test]
fn config_from_env() {
    let _guard = lock_env();
    std::env::set_var("POLCONNECT_TIMEOUT_MS", "250");
    std::env::set_var("POLCONNECT_PREFERRED", "wallet-x, metamask");
    std::env::set_var("POLCONNECT_EXCLUDED", "generic");

    let config = ConnectConfig::from_env("auction");
    assert_eq!(config.timeout, Duration::from_millis(250));
    assert_eq!(config.preferred.iter().map(|p| p.as_str()).collect::<Vec<_>>(), vec!["wallet-x", "metamask"]);
    assert_eq!(config.excluded.iter().map(|p| p.as_str()).collect::<Vec<_>>(), vec!["generic"]);

    std::env::set_var("POLCONNECT_TIMEOUT_MS", "soon");
    assert_eq!(ConnectConfig::from_env("auction").timeout, Duration::from_secs(30));

    std::env::remove_var("POLCONNECT_TIMEOUT_MS");
    std::env::remove_var("POLCONNECT_PREFERRED");
    std::env::remove_var("POLCONNECT_EXCLUDED");
}

/// Test: file store lives under POLCONNECT_ROOT/<app>/data
#[test]
fn session_path_honours_root() {
    let _guard = lock_env();
    let dir = TempDir::new().expect("tempdir");
    std::env::set_var("POLCONNECT_ROOT", dir.path());

    assert_eq!(session_path("auction"), dir.path().join("auction").join("data").join("session.json"));
    let store = FileStore::open("auction");
    store.set(HAS_WALLET_KEY, "true").expect("write");
    assert!(dir.path().join("auction/data/session.json").exists());

    std::env::remove_var("POLCONNECT_ROOT");
}
