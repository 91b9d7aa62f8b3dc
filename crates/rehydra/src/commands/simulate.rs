//! Simulate command - run both render passes against an in-process cache.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use console::Style;
use rehydra_cache::{
    CacheConfig, ConnectParams, Rehydrator, RequestContext, SessionId, Token,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::Context;

/// Arguments for the simulate command.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Logical names fetched in both passes
    #[arg(long, value_delimiter = ',', default_value = "users,posts")]
    pub names: Vec<String>,

    /// Caller scope applied to every fetch
    #[arg(long)]
    pub scope: Option<String>,

    /// Caller scope used by the connected pass instead of --scope
    #[arg(long)]
    pub connect_scope: Option<String>,

    /// Session id for both passes
    #[arg(long)]
    pub session: Option<String>,

    /// Session id for the connected pass instead of --session
    #[arg(long)]
    pub connect_session: Option<String>,

    /// Entry lifetime in milliseconds (0 disables caching)
    #[arg(long, env = "REHYDRA_TTL_MS")]
    pub ttl_ms: Option<u64>,

    /// Sweep period in milliseconds
    #[arg(long, env = "REHYDRA_SWEEP_EVERY_MS")]
    pub sweep_every_ms: Option<u64>,

    /// Pause between the two passes, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,

    /// Connect a second time with the same token
    #[arg(long)]
    pub replay: bool,

    /// Connect without delivering any connection parameters
    #[arg(long)]
    pub no_transport: bool,

    /// Fail instead of recomputing when the connected pass has no token
    #[arg(long)]
    pub strict: bool,
}

/// Outcome of one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Outcome {
    Hit,
    Miss,
}

#[derive(Debug, Serialize)]
struct FetchResult {
    name: String,
    outcome: Outcome,
}

#[derive(Debug, Serialize)]
struct ConnectedPass {
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    rehydrated: usize,
    fetches: Vec<FetchResult>,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    ttl_ms: u64,
    sweep_every_ms: u64,
    token_issued: bool,
    cached_entries: usize,
    passes: Vec<ConnectedPass>,
}

/// Run the simulate command.
pub async fn run(args: SimulateArgs, ctx: &Context) -> Result<()> {
    let ttl_ms = args.ttl_ms.unwrap_or_else(|| ctx.config.config.ttl_ms());
    let sweep_every_ms = args
        .sweep_every_ms
        .unwrap_or_else(|| ctx.config.config.sweep_every_ms());

    let rehydrator: Rehydrator = Rehydrator::new(CacheConfig::from_millis(ttl_ms, sweep_every_ms));
    let sweeper = rehydrator.spawn_sweeper();

    let session = args.session.as_deref().map(SessionId::parse).transpose()?;
    let connect_session = match args.connect_session.as_deref() {
        Some(raw) => Some(SessionId::parse(raw)?),
        None => session.clone(),
    };

    // Disconnected pass
    let mut first = new_context(session);
    let token = rehydrator.begin_disconnected(&mut first);
    for name in &args.names {
        rehydrator
            .fetch(&first, name, args.scope.as_deref(), || async {
                json!({ "name": name, "computed_in": "disconnected" })
            })
            .await;
    }
    let cached_entries = rehydrator.store().len();
    info!(entries = cached_entries, "Disconnected pass complete");

    if args.delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
    }

    // Connected pass(es)
    let params = connect_params(token.as_ref(), args.no_transport);
    let connect_scope = args.connect_scope.as_deref().or(args.scope.as_deref());
    let rounds = if args.replay { 2 } else { 1 };

    let mut passes = Vec::with_capacity(rounds);
    for _ in 0..rounds {
        let mut ctx2 = new_context(connect_session.clone());
        let error = match rehydrator.begin_connected(&mut ctx2, params.as_ref()) {
            Ok(()) => None,
            Err(e) if args.strict => {
                sweeper.shutdown().await;
                return Err(e.into());
            }
            Err(e) => {
                warn!(error = %e, "Connected pass continuing without rehydration");
                Some(e.to_string())
            }
        };

        let mut fetches = Vec::with_capacity(args.names.len());
        for name in &args.names {
            let recomputed = AtomicBool::new(false);
            rehydrator
                .fetch(&ctx2, name, connect_scope, || async {
                    recomputed.store(true, Ordering::SeqCst);
                    json!({ "name": name, "computed_in": "connected" })
                })
                .await;
            let outcome = if recomputed.load(Ordering::SeqCst) {
                Outcome::Miss
            } else {
                Outcome::Hit
            };
            fetches.push(FetchResult {
                name: name.clone(),
                outcome,
            });
        }

        passes.push(ConnectedPass {
            error,
            rehydrated: ctx2.rehydrated_len(),
            fetches,
        });
    }

    sweeper.shutdown().await;

    let report = SimulationReport {
        ttl_ms,
        sweep_every_ms,
        token_issued: token.is_some(),
        cached_entries,
        passes,
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, token.as_ref(), ctx.verbose);
    }

    Ok(())
}

fn new_context(session: Option<SessionId>) -> RequestContext {
    match session {
        Some(id) => RequestContext::new().with_session(id),
        None => RequestContext::new(),
    }
}

fn connect_params(token: Option<&Token>, no_transport: bool) -> Option<ConnectParams> {
    if no_transport {
        return None;
    }
    Some(match token {
        Some(token) => ConnectParams::with_token(token.as_str()),
        None => ConnectParams::new(),
    })
}

fn print_report(report: &SimulationReport, token: Option<&Token>, verbose: bool) {
    let green = Style::new().green();
    let yellow = Style::new().yellow();
    let red = Style::new().red();
    let dim = Style::new().dim();

    println!(
        "{}",
        dim.apply_to(format!(
            "ttl {} ms, sweep every {} ms",
            report.ttl_ms, report.sweep_every_ms
        ))
    );
    match token {
        Some(token) if verbose => println!("Token: {token}"),
        Some(token) => println!("Token: {}…", token.short()),
        None => println!("Token: {}", dim.apply_to("none (caching disabled)")),
    }
    println!("Cached entries: {}", report.cached_entries);

    for (i, pass) in report.passes.iter().enumerate() {
        println!();
        println!("Connected pass {} ({} rehydrated)", i + 1, pass.rehydrated);
        if let Some(error) = &pass.error {
            println!("  {}", red.apply_to(error));
        }
        for fetch in &pass.fetches {
            let outcome = match fetch.outcome {
                Outcome::Hit => green.apply_to("hit"),
                Outcome::Miss => yellow.apply_to("miss"),
            };
            println!("  {:<16} {}", fetch.name, outcome);
        }
    }
}
