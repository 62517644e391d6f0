//! polconnect CLI - injected wallet flows against a scripted environment
//!
//! Commands:
//!   polconnect normalize <address>           → {"address": "pol_...", "hex": "0x...", "short": "pol_12...abcd"}
//!   polconnect detect --env <file>           → {"providers": [...], "selected": "metamask"}
//!   polconnect connect --env <file>          → {"address": "pol_...", "provider": "metamask"}
//!   polconnect status                        → {"provider_seen": true, "last_connected": "pol_..."}
//!   polconnect disconnect                    → {"disconnected": true}
//!
//! Options:
//!   --app <name>       Session namespace (default: polconnect)
//!   --timeout <ms>     Handshake budget (default: POLCONNECT_TIMEOUT_MS or 30000)
//!   --wallet <id>      Connect to this identity instead of the selector's choice
//!   --resume           Use the silent handshake (eth_accounts)
//!
//! Output format:
//!   --pretty   Pretty-print JSON (default for tty)

use polconnect::logging::init_logging;
use polconnect::{
    normalize, select_with, ConnectConfig, ConnectError, FileStore, ProviderIdentity, ScriptedEnvironment,
    TokioTimer, WalletSession,
};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

fn main() {
    init_logging();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("polconnect {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("normalize") => cmd_normalize(&opts),
        Some("detect") => cmd_detect(&opts),
        Some("connect") => cmd_connect(&opts),
        Some("status") => cmd_status(&opts),
        Some("disconnect") => cmd_disconnect(&opts),
        Some(cmd) => Err(format!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = opts.pretty || std::io::stdout().is_terminal();
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": e}), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    positional: Vec<String>,
    app: Option<String>,
    env_file: Option<String>,
    timeout_ms: Option<u64>,
    wallet: Option<String>,
    resume: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--pretty" => opts.pretty = true,
                "--resume" => opts.resume = true,
                "--app" | "-a" => {
                    if i + 1 < args.len() {
                        opts.app = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--env" | "-e" => {
                    if i + 1 < args.len() {
                        opts.env_file = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--timeout" | "-t" => {
                    if i + 1 < args.len() {
                        opts.timeout_ms = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--wallet" | "-w" => {
                    if i + 1 < args.len() {
                        opts.wallet = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                _ => positional.push(arg.clone()),
            }
            i += 1;
        }

        let mut positional = positional.into_iter();
        opts.command = positional.next();
        opts.positional = positional.collect();
        opts
    }

    fn config(&self) -> ConnectConfig {
        let mut config = ConnectConfig::from_env(self.app.clone().unwrap_or_else(|| "polconnect".into()));
        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        config
    }

    /// Session over the scripted environment file (or an empty one) and the on-disk store.
    fn session(&self, timer: Rc<TokioTimer>) -> Result<WalletSession, String> {
        let env = match &self.env_file {
            Some(path) => ScriptedEnvironment::load(Path::new(path), timer.clone()).map_err(|e| format!("{:#}", e))?,
            None => ScriptedEnvironment::new(),
        };
        let config = self.config();
        let store = FileStore::open(&config.app);
        debug!(path = %store.path().display(), "session store");
        Ok(WalletSession::new(Rc::new(env), timer, Rc::new(store), config))
    }
}

fn require_env(opts: &ParsedArgs) -> Result<(), String> {
    if opts.env_file.is_none() {
        return Err("--env <file> required".into());
    }
    Ok(())
}

fn connect_error(err: ConnectError) -> String {
    format!("{}: {}", err.kind(), err)
}

fn cmd_normalize(opts: &ParsedArgs) -> Result<Value, String> {
    let raw = opts.positional.first().ok_or("normalize requires an address")?;
    let address = normalize(raw).map_err(connect_error)?;
    Ok(json!({
        "address": address.to_string(),
        "hex": address.to_hex(),
        "short": address.short(),
    }))
}

fn cmd_detect(opts: &ParsedArgs) -> Result<Value, String> {
    require_env(opts)?;
    let session = opts.session(Rc::new(TokioTimer::new()))?;
    let registry = session.detect();
    let selected = select_with(&registry, &session.config().policy()).map(|d| d.identity().to_string());
    Ok(json!({
        "pass": registry.pass(),
        "providers": registry.infos(),
        "selected": selected,
    }))
}

fn cmd_connect(opts: &ParsedArgs) -> Result<Value, String> {
    require_env(opts)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| format!("runtime: {}", e))?;

    runtime.block_on(async {
        let session = opts.session(Rc::new(TokioTimer::new()))?;
        let registry = session.detect();
        if registry.is_empty() {
            return Err(connect_error(ConnectError::NoProviderFound));
        }
        let descriptor = match &opts.wallet {
            Some(id) => registry.find(&ProviderIdentity::from(id.as_str())).cloned(),
            None => session.select(&registry),
        }
        .ok_or_else(|| connect_error(ConnectError::SelectionEmpty))?;

        let address = if opts.resume {
            session.resume(&descriptor).await
        } else {
            session.connect(&descriptor).await
        }
        .map_err(connect_error)?;

        Ok::<Value, String>(json!({
            "address": address.to_string(),
            "provider": descriptor.identity().to_string(),
            "state": session.current(),
        }))
    })
}

fn cmd_status(opts: &ParsedArgs) -> Result<Value, String> {
    let session = opts.session(Rc::new(TokioTimer::new()))?;
    Ok(json!({
        "provider_seen": session.provider_seen(),
        "last_connected": session.last_connected().map(|a| a.to_string()),
    }))
}

fn cmd_disconnect(opts: &ParsedArgs) -> Result<Value, String> {
    let session = opts.session(Rc::new(TokioTimer::new()))?;
    session.disconnect();
    Ok(json!({"disconnected": true}))
}

fn print_usage() {
    println!(
        r#"polconnect - injected wallet detection and connection

USAGE:
    polconnect <COMMAND> [OPTIONS]

COMMANDS:
    normalize <address>     Canonical pol_ form of an address
    detect                  List injected providers and the selector's choice
    connect                 Run the account handshake and store the session
    status                  Show the stored session
    disconnect              Forget the connected address

OPTIONS:
    -e, --env <file>        Scripted environment (JSON)
    -a, --app <name>        Session namespace
    -t, --timeout <ms>      Handshake budget
    -w, --wallet <id>       Connect to this identity
        --resume            Silent handshake (eth_accounts)
        --pretty            Pretty-print JSON
    -h, --help              Show this help
    -V, --version           Show version

ENVIRONMENT:
    POLCONNECT_ROOT         Session store root
    POLCONNECT_TIMEOUT_MS   Default handshake budget
    POLCONNECT_PREFERRED    Comma-separated preferred identities
    POLCONNECT_EXCLUDED     Comma-separated excluded identities
    POLCONNECT_LOG_JSON     1 for JSON logs
    RUST_LOG                Log filter (default: info)
"#
    );
}
