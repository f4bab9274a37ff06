use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use grave_rewards::{
    arguments::{get_account_arg, get_config_path_arg, is_help_requested, is_once_enabled, print_help},
    cache::TtlCache,
    config::{self, CONFIG_FILE_PATH},
    logger::{self, LogTag},
    rewards::{self, EngineSettings, RewardsEngine, RewardsSnapshot, RewardsStatus, ScheduleSettings},
    rpc::{ChainClient, HttpTransport, KeyRegistry, ReqwestTransport, ResilientFetcher, RpcChainClient, RpcClient},
    subgraph::SubgraphClient,
    utils::{format_duration_compact, now_unix_secs},
};

/// Main entry point for grave-rewards
///
/// - `--once`: one fetch, print, exit (non-zero when the fetch failed)
/// - default: scheduled refresh until Ctrl-C; Enter on stdin refreshes now
#[tokio::main]
async fn main() {
    logger::init();

    if is_help_requested() {
        print_help();
        std::process::exit(0);
    }

    logger::info(LogTag::System, "grave-rewards starting up");

    if let Err(e) = run().await {
        logger::error(LogTag::System, &format!("grave-rewards failed: {:#}", e));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path = get_config_path_arg().unwrap_or_else(|| CONFIG_FILE_PATH.to_string());
    config::load_config_from_path(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path))?;
    let cfg = config::get_config_clone();

    let account_arg = get_account_arg().ok_or_else(|| anyhow!("--account <ADDRESS> is required"))?;
    let account = RewardsEngine::parse_account(&account_arg)?;

    let rpc_transport: Arc<dyn HttpTransport> = Arc::new(
        ReqwestTransport::new(Duration::from_secs(cfg.providers.request_timeout_secs))
            .map_err(|e| anyhow!(e))?,
    );
    let registry = Arc::new(KeyRegistry::from_config(&cfg.providers)?);
    let fetcher = ResilientFetcher::from_config(&cfg.providers, registry.clone(), rpc_transport);
    let rpc = Arc::new(RpcClient::new(fetcher));
    let chain: Arc<dyn ChainClient> = Arc::new(RpcChainClient::from_config(rpc, &cfg.contracts)?);

    let subgraph_transport: Arc<dyn HttpTransport> = Arc::new(
        ReqwestTransport::new(Duration::from_secs(cfg.subgraph.request_timeout_secs))
            .map_err(|e| anyhow!(e))?,
    );
    let subgraph = Arc::new(SubgraphClient::from_config(&cfg.subgraph, subgraph_transport));

    let cache = TtlCache::from_config(&cfg.cache, &cfg.rewards)?;
    logger::debug(
        LogTag::Cache,
        &format!(
            "Cached rewards are served for {}",
            format_duration_compact(cache.ttl().as_secs())
        ),
    );
    let settings = EngineSettings::from_config(&cfg.contracts, &cfg.rewards)?;
    if settings.reader_address.is_none() && !subgraph.is_configured() {
        logger::warning(
            LogTag::System,
            "Neither a reader contract nor a subgraph is configured; no rewards can be discovered",
        );
    }

    let engine = Arc::new(RewardsEngine::new(settings, cache, Some(subgraph)));
    engine.connect(account, chain);

    if is_once_enabled() {
        let snapshot = engine.fetch_rewards().await;
        print_snapshot(&snapshot);
        log_registry_stats(&registry);
        return match snapshot.error {
            Some(error) => Err(anyhow!(error)),
            None => Ok(()),
        };
    }

    watch(engine, ScheduleSettings::from_config(&cfg.rewards)).await;
    log_registry_stats(&registry);
    Ok(())
}

async fn watch(engine: Arc<RewardsEngine>, schedule: ScheduleSettings) {
    let handle = rewards::start(engine, schedule);
    let mut updates = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut printed_generation = 0;

    logger::info(
        LogTag::System,
        "Watching rewards. Press Enter to refresh, Ctrl-C to exit",
    );

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.generation > printed_generation {
                    printed_generation = snapshot.generation;
                    print_snapshot(&snapshot);
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(_)) => handle.refresh_now(),
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        logger::debug(LogTag::System, &format!("stdin closed: {}", e));
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                logger::info(LogTag::System, "Shutting down");
                break;
            }
        }
    }

    handle.stop().await;
}

fn print_snapshot(snapshot: &RewardsSnapshot) {
    let now = now_unix_secs();
    let claimable = snapshot.claimable().count();

    println!();
    println!(
        "{:?}{} | {} rewards | {} claimable | {} wei claimable{}",
        snapshot.status,
        if snapshot.from_cache { " (cached)" } else { "" },
        snapshot.rewards.len(),
        claimable,
        snapshot.claimable_total(),
        match snapshot.paused {
            Some(true) => " | contract paused",
            _ => "",
        }
    );

    for reward in &snapshot.rewards {
        let state = if reward.claimed {
            "claimed".to_string()
        } else if reward.is_claimable {
            "claimable".to_string()
        } else {
            format!("in {}", format_duration_compact(reward.claim_at.saturating_sub(now)))
        };
        println!(
            "  {:<9} player {} | pool {} | burned {}{} | {}",
            format!("#{}", reward.token_id),
            reward.player_amount,
            reward.pool_amount,
            reward.burned_amount,
            if reward.has_lp_payout { " | LP" } else { "" },
            state
        );
    }

    if snapshot.status == RewardsStatus::Error {
        if let Some(error) = &snapshot.error {
            println!("  last error: {}", error);
        }
    }
}

fn log_registry_stats(registry: &KeyRegistry) {
    logger::info(
        LogTag::Registry,
        &format!(
            "Provider tier {} ({} premium keys, {} public endpoints), {} failed credentials",
            registry.current_tier(),
            registry.premium_count(),
            registry.public_endpoints().len(),
            registry.failed_count()
        ),
    );
    for (credential, stats) in registry.stats() {
        logger::debug(
            LogTag::Registry,
            &format!(
                "{}: {} uses, {} fails ({:.0}% failure rate)",
                credential,
                stats.uses,
                stats.fails,
                stats.failure_rate() * 100.0
            ),
        );
    }
}
