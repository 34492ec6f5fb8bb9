// Terminal client.
//
//   duel [--config FILE] [--keys FILE] [--dev-prover] local <battleship|wordle>
//   duel [--config FILE] [--keys FILE] [--dev-prover] open <battleship|wordle> <player1> <player2>
//   duel [--config FILE] [--keys FILE] [--dev-prover] play <session> <identity>
//   duel [--keys FILE] keygen <label>...
//
// `local` opens a session on an in-process ledger between the first two
// identities of the key book and lets one terminal play both sides with
// `switch`. `open` and `play` need a gateway (DUEL_GATEWAY_URL).

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use duel_core::{GameKind, Position, Salt, SessionId, Word};
use duel_host::board_init::prompt_layout;
use duel_host::cache::IdentityCache;
use duel_host::chain::{ChainClient, HttpChainClient};
use duel_host::config::ClientConfig;
use duel_host::coordinator::{open_session, Command, Notice, SessionCoordinator};
use duel_host::ledger::LocalLedger;
use duel_host::proofs::{DevProver, Prover, SnarkjsProver};
use duel_host::wallet::{Ed25519Signer, KeyBook};
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_KEYS: &str = "duel-keys.json";

struct Args {
    config: Option<PathBuf>,
    keys: PathBuf,
    dev_prover: bool,
    command: Vec<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args { config: None, keys: PathBuf::from(DEFAULT_KEYS), dev_prover: false, command: Vec::new() };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = Some(it.next().context("--config needs a path")?.into()),
            "--keys" => args.keys = it.next().context("--keys needs a path")?.into(),
            "--dev-prover" => args.dev_prover = true,
            _ => {
                args.command.push(arg);
                args.command.extend(it.by_ref());
            }
        }
    }
    Ok(args)
}

fn parse_kind(s: &str) -> Result<GameKind> {
    match s.to_ascii_lowercase().as_str() {
        "battleship" => Ok(GameKind::Battleship),
        "wordle" => Ok(GameKind::Wordle),
        other => bail!("unknown game {:?}, expected battleship or wordle", other),
    }
}

fn load_keys(path: &Path) -> Result<KeyBook> {
    if path.exists() {
        Ok(KeyBook::load(path)?)
    } else {
        Ok(KeyBook::new())
    }
}

/// Key book with at least two identities, creating `alice` and `bob` when
/// it is empty.
fn local_keys(path: &Path) -> Result<KeyBook> {
    let mut keys = load_keys(path)?;
    if keys.identities().count() < 2 {
        let mut rng = rand::thread_rng();
        for label in ["alice", "bob"] {
            if keys.resolve(label).is_err() {
                keys.insert(label, Ed25519Signer::generate(&mut rng));
            }
        }
        keys.save(path)?;
        info!(path = %path.display(), "created local identities");
    }
    Ok(keys)
}

fn parse_command(line: &str, kind: GameKind) -> Result<Option<Command>> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    Ok(Some(match parts.as_slice() {
        [] => return Ok(None),
        ["commit"] => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut rng = rand::thread_rng();
            let layout = prompt_layout(kind, &mut input, &mut io::stdout(), &mut rng)?;
            Command::Commit { layout, salt: Salt::random(&mut rng) }
        }
        ["fire", x, y] => Command::Fire(Position::new(x.parse()?, y.parse()?)),
        ["guess", word] => Command::Guess(word.parse::<Word>()?),
        ["resolve"] => Command::Resolve,
        ["switch", name] => Command::SwitchIdentity(name.to_string()),
        ["export"] => Command::Export,
        ["import", snapshot @ ..] => Command::Import(snapshot.join(" ")),
        ["discard", name] => Command::Discard(name.to_string()),
        ["refresh"] => Command::Refresh,
        ["show"] => Command::Show,
        _ => bail!("commands: commit | fire x y | guess WORD | resolve | switch NAME | export | import JSON | discard NAME | show | refresh | quit"),
    }))
}

// Owns stdin; the coordinator is not Send, so input lives on its own thread.
fn spawn_reader(kind: GameKind, commands: mpsc::Sender<Command>, shutdown: watch::Sender<bool>) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        loop {
            print!("> ");
            let _ = io::stdout().flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim();
            if line == "quit" || line == "exit" {
                break;
            }
            match parse_command(line, kind) {
                Ok(Some(command)) => {
                    if commands.blocking_send(command).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => println!("{}", e),
            }
        }
        let _ = shutdown.send(true);
    });
}

async fn print_notices(mut notices: mpsc::UnboundedReceiver<Notice>) {
    while let Some(notice) = notices.recv().await {
        match notice {
            Notice::View(text) => println!("{}", text),
            Notice::Exported(snapshot) => println!("snapshot: {}", snapshot),
            Notice::Failed(why) => println!("error: {}", why),
            other => println!("{:?}", other),
        }
    }
}

async fn play<C: ChainClient, P: Prover>(
    chain: C,
    prover: P,
    keys: KeyBook,
    config: ClientConfig,
    session: SessionId,
    identity: &str,
) -> Result<()> {
    let cache = IdentityCache::open(&config.cache_dir)?;
    let kind = chain
        .get_session(session)
        .await?
        .ok_or_else(|| anyhow!("session {} not found", session))?
        .kind;
    let mut coordinator = SessionCoordinator::new(chain, prover, keys, cache, config, session, identity)?;
    println!("session {} ({:?}) as {}", session, kind, coordinator.active_identity());

    let (command_tx, command_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    spawn_reader(kind, command_tx, shutdown_tx);

    let (result, ()) = tokio::join!(coordinator.run(command_rx, shutdown_rx, notice_tx), print_notices(notice_rx));
    result?;
    if let Some(s) = coordinator.session() {
        println!("{}", duel_host::visualize::status_line(s));
    }
    Ok(())
}

async fn with_prover<C: ChainClient>(
    chain: C,
    dev: bool,
    keys: KeyBook,
    config: ClientConfig,
    session: SessionId,
    identity: &str,
) -> Result<()> {
    if dev {
        play(chain, DevProver, keys, config, session, identity).await
    } else {
        let prover = SnarkjsProver::new(config.snarkjs.clone(), config.cache_dir.join("proving"));
        play(chain, prover, keys, config, session, identity).await
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;
    let config = ClientConfig::load(args.config.as_deref())?;
    let command: Vec<&str> = args.command.iter().map(String::as_str).collect();

    match command.as_slice() {
        ["keygen", labels @ ..] if !labels.is_empty() => {
            let mut keys = load_keys(&args.keys)?;
            let mut rng = rand::thread_rng();
            for label in labels {
                let address = keys.insert(*label, Ed25519Signer::generate(&mut rng));
                println!("{} {}", label, address);
            }
            keys.save(&args.keys)?;
        }
        ["local", kind] => {
            let kind = parse_kind(kind)?;
            let keys = local_keys(&args.keys)?;
            let mut ids = keys.identities().map(|(label, address)| (label.to_string(), address.clone()));
            let (label1, p1) = ids.next().context("key book is empty")?;
            let (_, p2) = ids.next().context("key book needs two identities")?;
            drop(ids);
            let ledger = LocalLedger::new();
            let session = open_session(&ledger, keys.get(&p1)?, kind, &p1, &p2).await?;
            println!("opened local session {}; use `switch <label>` to change sides", session);
            with_prover(ledger, args.dev_prover, keys, config, session, &label1).await?;
        }
        ["open", kind, player1, player2] => {
            let url = config.gateway_url.clone().context("open needs DUEL_GATEWAY_URL or gateway_url")?;
            let keys = load_keys(&args.keys)?;
            let kind = parse_kind(kind)?;
            let p1 = keys.resolve(player1).unwrap_or_else(|_| duel_core::Address::new(*player1));
            let p2 = keys.resolve(player2).unwrap_or_else(|_| duel_core::Address::new(*player2));
            let signer = keys.get(&p1).or_else(|_| keys.get(&p2))?;
            let session = open_session(&HttpChainClient::new(url), signer, kind, &p1, &p2).await?;
            println!("opened session {}", session);
        }
        ["play", session, identity] => {
            let url = config.gateway_url.clone().context("play needs DUEL_GATEWAY_URL or gateway_url")?;
            let session: SessionId = session.parse().context("session id must be a number")?;
            let keys = load_keys(&args.keys)?;
            with_prover(HttpChainClient::new(url), args.dev_prover, keys, config, session, identity).await?;
        }
        _ => bail!(
            "usage: duel [--config FILE] [--keys FILE] [--dev-prover] \
             (local KIND | open KIND P1 P2 | play SESSION IDENTITY | keygen LABEL...)"
        ),
    }
    Ok(())
}
