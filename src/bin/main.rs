//! Beelink CLI - talk to a realtime server from the shell
//!
//! Identity:
//!   beelink keygen                   → Create and store a keypair
//!   beelink address                  → Print the stored address
//!
//! Requests (signed with the stored keypair):
//!   beelink ping                     → {"ok": true}
//!   beelink request <method> [json]  → Server result
//!   beelink publish <channel> <text> → {"published": channel}
//!   beelink subscribe <channel>      → Stream messages until Ctrl+C
//!
//! Output format:
//!   --json     Output raw JSON (default for non-tty)
//!   --pretty   Pretty-print JSON (default for tty)

use beelink::logging::init_logging;
use beelink::{install_signal_handlers, ClientConfig, ConnectionStatus, KeyManager, KeyStore, RealtimeClient};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use tracing::{debug, info, warn};

fn main() {
    init_logging();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("beelink {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("keygen") => cmd_keygen(&opts),
        Some("address") => cmd_address(&opts),
        Some("ping") => cmd_ping(&opts),
        Some("request") | Some("req") => cmd_request(&opts),
        Some("publish") | Some("pub") => cmd_publish(&opts),
        Some("subscribe") | Some("sub") => cmd_subscribe(&opts),
        Some(cmd) => Err(format!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = opts.pretty || (!opts.json && std::io::stdout().is_terminal());
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({ "error": e }), pretty));
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
    target: Option<String>,
    data: Option<String>,
    url: Option<String>,
    app: Option<String>,
    key_file: Option<String>,
    force: bool,
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        // Load .env file if present
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let value = value.trim().trim_matches('"');
                    if !value.is_empty() && env::var(key.trim()).is_err() {
                        env::set_var(key.trim(), value);
                    }
                }
            }
        }

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--force" | "-f" => opts.force = true,
                "--url" | "-u" => {
                    if i + 1 < args.len() {
                        opts.url = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--app" | "-a" => {
                    if i + 1 < args.len() {
                        opts.app = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--key-file" | "-k" => {
                    if i + 1 < args.len() {
                        opts.key_file = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        // command, then target (method or channel), rest is data
        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }
        if !positional.is_empty() {
            opts.target = Some(positional.remove(0));
        }
        if !positional.is_empty() {
            opts.data = Some(positional.join(" "));
        }

        // Environment (lower priority than CLI args)
        if opts.app.is_none() {
            opts.app = env::var("BEELINK_APP").ok().filter(|s| !s.is_empty());
        }
        if opts.key_file.is_none() {
            opts.key_file = env::var("BEELINK_KEY_FILE").ok().filter(|s| !s.is_empty());
        }

        opts
    }
}

fn print_usage() {
    println!(
        r#"beelink - authenticated realtime messaging client

USAGE:
    beelink <command> [target] [data] [options]

COMMANDS:
    keygen                  Generate and store a keypair
    address                 Print the stored address
    ping                    Round-trip a signed ping
    request <method> [json] Send a signed request, print the result
    publish <channel> <text>
                            Publish a message to a channel
    subscribe <channel>     Print channel messages until Ctrl+C

CONNECTION OPTIONS:
    --url, -u <url>         Server URL (env: BEELINK_URL)
                            Other BEELINK_* variables tune reconnect and timeouts

KEY OPTIONS:
    --app, -a <name>        Application name for the key store (env: BEELINK_APP)
    --key-file, -k <path>   Explicit keypair file (env: BEELINK_KEY_FILE)
    --force, -f             keygen: replace an existing keypair

OUTPUT OPTIONS:
    --json                  Raw JSON output
    --pretty                Pretty-print JSON
    --version, -V           Print version

EXAMPLES:
    beelink keygen --app chat
    beelink ping --url wss://example.org/ws
    beelink request echo '{{"text":"hi"}}'
    beelink publish public "hello world"
    beelink subscribe public
"#
    );
}

fn key_store(opts: &ParsedArgs) -> KeyStore {
    match opts.key_file.as_deref() {
        Some(path) => KeyStore::at(path),
        None => KeyStore::for_app(opts.app.as_deref().unwrap_or("beelink")),
    }
}

fn client_config(opts: &ParsedArgs) -> Result<ClientConfig, String> {
    let mut config = ClientConfig::from_env().map_err(|e| format!("Config: {}", e))?;
    if let Some(url) = opts.url.as_deref() {
        config.url = url.to_string();
    }
    Ok(config)
}

fn cmd_keygen(opts: &ParsedArgs) -> Result<Value, String> {
    let store = key_store(opts);
    if store.exists() && !opts.force {
        return Err(format!("Keypair already exists at {} (use --force to replace)", store.path().display()));
    }
    let keypair = KeyManager::new()
        .generate_keypair()
        .map_err(|e| format!("Key generation failed: {}", e))?;
    store.save(&keypair).map_err(|e| format!("Failed to save keypair: {}", e))?;
    info!(path = %store.path().display(), "keypair stored");
    Ok(json!({
        "address": keypair.address(),
        "public_key": keypair.public_key_hex(),
        "path": store.path().display().to_string(),
    }))
}

fn cmd_address(opts: &ParsedArgs) -> Result<Value, String> {
    let store = key_store(opts);
    let keypair = store
        .load()
        .map_err(|e| format!("Failed to load keypair: {}", e))?
        .ok_or_else(|| format!("No keypair at {} (run `beelink keygen`)", store.path().display()))?;
    Ok(json!({ "address": keypair.address(), "public_key": keypair.public_key_hex() }))
}

/// Run `f` against a connected client on a fresh runtime.
fn with_client<F, Fut>(opts: &ParsedArgs, f: F) -> Result<Value, String>
where
    F: FnOnce(RealtimeClient) -> Fut,
    Fut: std::future::Future<Output = Result<Value, String>>,
{
    let config = client_config(opts)?;
    let keys = KeyManager::new();
    let store = key_store(opts);
    match store.load().map_err(|e| format!("Failed to load keypair: {}", e))? {
        Some(keypair) => keys.load(keypair),
        None => debug!(path = %store.path().display(), "no stored keypair, using an ephemeral one"),
    }

    let rt = tokio::runtime::Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;
    rt.block_on(async move {
        let client = RealtimeClient::builder(config)
            .key_manager(keys)
            .build()
            .map_err(|e| format!("Client: {}", e))?;
        let _errors = client.on_error(|e| {
            if e.is_connection_error() {
                warn!(error = %e, "connection error");
            } else {
                debug!(error = %e, "client error");
            }
        });

        let connected = client.connect().await.map_err(|e| format!("Connect failed: {}", e))?;
        if !connected {
            return Err(format!("Connect failed: {}", client.status()));
        }
        let result = f(client.clone()).await;
        client.close();
        result
    })
}

fn cmd_ping(opts: &ParsedArgs) -> Result<Value, String> {
    with_client(opts, |client| async move {
        let started = std::time::Instant::now();
        client.ping().await.map_err(|e| format!("Ping failed: {}", e))?;
        Ok(json!({ "ok": true, "rtt_ms": started.elapsed().as_millis() as u64 }))
    })
}

fn cmd_request(opts: &ParsedArgs) -> Result<Value, String> {
    let method = opts.target.clone().ok_or("Usage: beelink request <method> [json]")?;
    let params: Value = match opts.data.as_deref() {
        Some(raw) => serde_json::from_str(raw).map_err(|e| format!("Invalid JSON params: {}", e))?,
        None => json!({}),
    };
    with_client(opts, |client| async move {
        client.send_request(&method, params).await.map_err(|e| format!("{} failed: {}", method, e))
    })
}

fn cmd_publish(opts: &ParsedArgs) -> Result<Value, String> {
    let channel = opts.target.clone().ok_or("Usage: beelink publish <channel> <text>")?;
    let text = opts.data.clone().ok_or("Usage: beelink publish <channel> <text>")?;
    with_client(opts, |client| async move {
        client
            .publish_message(&text, Some(&channel))
            .await
            .map_err(|e| format!("Publish failed: {}", e))?;
        Ok(json!({ "published": channel }))
    })
}

fn cmd_subscribe(opts: &ParsedArgs) -> Result<Value, String> {
    let channel = opts.target.clone().ok_or("Usage: beelink subscribe <channel>")?;
    let pretty = opts.pretty;
    with_client(opts, |client| async move {
        let shutdown = install_signal_handlers();
        let _messages = client.on_message(move |message| {
            let line = json!({ "type": message.kind, "channel": message.channel, "payload": message.payload });
            println!("{}", render(&line, pretty));
        });
        let _status = client.on_status_change(|status| info!(%status, "connection"));

        client.subscribe(&channel).await.map_err(|e| format!("Subscribe failed: {}", e))?;
        info!(%channel, "listening (Ctrl+C to stop)");

        let mut status = client.watch_status();
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = *status.borrow_and_update();
                    if matches!(current, ConnectionStatus::AuthFailed | ConnectionStatus::ReconnectFailed) {
                        return Err(format!("Connection ended: {}", current));
                    }
                }
            }
        }
        Ok(json!({ "status": "stopped", "channel": channel }))
    })
}
