//! Simulate command - runs a small cluster over one shared embedded cache.
//!
//! Every node writes its sessions, half of which are already past expiry.
//! The first node then disappears. The survivors expire what they own and
//! one of them sweeps the orphans the missing node left behind.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use shoal_config::QueryMode;
use shoal_session::{
    ClusteredSessionStore, MemoryCache, QueryCapability, SessionContext, SessionDataStore,
    StoreConfig, generate_worker_name, now_millis,
};
use tracing::info;

use super::Context;

/// Arguments for the simulate command.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of nodes in the cluster
    #[arg(short, long, default_value_t = 3)]
    pub nodes: usize,

    /// Sessions written by each node
    #[arg(short, long, default_value_t = 10)]
    pub sessions: usize,

    /// Idle budget of each session in seconds
    #[arg(long, default_value_t = 1800)]
    pub max_inactive_secs: i64,
}

/// Simulation summary.
#[derive(Debug, Serialize)]
struct SimulationReport {
    nodes: usize,
    written: usize,
    passivating: bool,
    query: String,
    departed_node: String,
    owner_expired: usize,
    orphans_removed: usize,
    remaining: usize,
}

/// Run the simulate command.
pub async fn run(args: SimulateArgs, ctx: &Context) -> Result<()> {
    if args.nodes < 2 {
        bail!("a cluster needs at least two nodes");
    }

    let config = &ctx.config;
    let cache = Arc::new(match config.cache.max_entries.and_then(NonZeroUsize::new) {
        Some(capacity) => MemoryCache::with_capacity(config.cache.name.clone(), capacity),
        None => MemoryCache::new(config.cache.name.clone()),
    });

    let store_config = StoreConfig {
        idle_timeout_secs: config.session.idle_timeout_secs,
        passivating: config.session.passivating,
        grace_period: std::time::Duration::from_secs(config.session.grace_period_secs),
    };
    let query = match config.session.query {
        QueryMode::None => QueryCapability::None,
        QueryMode::Embedded => QueryCapability::embedded(cache.clone()),
        QueryMode::Networked => QueryCapability::networked(cache.clone()),
    };

    // Simulated nodes share one base name, configured or generated.
    let base = config
        .node
        .worker_name
        .clone()
        .unwrap_or_else(generate_worker_name);
    let mut stores = Vec::with_capacity(args.nodes);
    for n in 0..args.nodes {
        let scope = SessionContext::new(
            &config.session.context_path,
            config.session.virtual_host.as_deref(),
            format!("{base}-{n}"),
        );
        let store = ClusteredSessionStore::builder(scope)
            .cache(cache.clone())
            .query(query.clone())
            .config(store_config.clone())
            .start()?;
        stores.push(store);
    }

    // Every node writes its sessions; even-numbered ones are already overdue.
    let now = now_millis();
    let max_inactive_ms = args.max_inactive_secs.saturating_mul(1000);
    let mut owned: Vec<HashSet<String>> = Vec::with_capacity(args.nodes);
    for store in &stores {
        let worker = store.context().worker_name().to_string();
        let mut ids = HashSet::with_capacity(args.sessions);
        for s in 0..args.sessions {
            let id = format!("{worker}-s{s}");
            let mut entity = store.new_entity(&id, now, now, now, max_inactive_ms);
            if s % 2 == 0 {
                entity.expiry = now - 1_000;
            }
            entity.set_attribute("visits", s)?;
            store.store(&id, &entity, 0).await?;
            ids.insert(id);
        }
        owned.push(ids);
    }
    let written = cache.len();

    let departed = stores.remove(0);
    owned.remove(0);
    info!(worker = departed.context().worker_name(), "Node left the cluster");

    let mut owner_expired = 0;
    for (store, candidates) in stores.iter().zip(&owned) {
        for id in store.scan_candidates(candidates, now).await {
            if store.delete(&id).await? {
                owner_expired += 1;
            }
        }
    }

    let orphans_removed = stores[0].clean_orphans(now).await?;

    let report = SimulationReport {
        nodes: args.nodes,
        written,
        passivating: stores[0].is_passivating(),
        query: format!("{:?}", stores[0].query_capability()),
        departed_node: departed.context().worker_name().to_string(),
        owner_expired,
        orphans_removed,
        remaining: cache.len(),
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &SimulationReport) {
    let dim = Style::new().dim();
    let green = Style::new().green();

    println!();
    println!("{}", style("Cluster Simulation").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("  {} {}", dim.apply_to("Nodes:          "), report.nodes);
    println!("  {} {}", dim.apply_to("Query:          "), report.query);
    println!("  {} {}", dim.apply_to("Passivating:    "), report.passivating);
    println!("  {} {}", dim.apply_to("Written:        "), report.written);
    println!("  {} {}", dim.apply_to("Departed node:  "), report.departed_node);
    println!(
        "  {} {}",
        dim.apply_to("Owner expired:  "),
        green.apply_to(report.owner_expired)
    );
    println!(
        "  {} {}",
        dim.apply_to("Orphans removed:"),
        green.apply_to(report.orphans_removed)
    );
    println!("  {} {}", dim.apply_to("Remaining:      "), report.remaining);
    println!();
}
