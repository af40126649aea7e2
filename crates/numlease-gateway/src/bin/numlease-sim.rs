//! Drives concurrent clients through the lease service and audits the result.
//!
//! Usage: `numlease-sim [config.json]`. `NUMLEASE_LOG_FORMAT=json` switches
//! log output to JSON.

use std::sync::Arc;

use chrono::Duration;
use numlease_core::{Delivery, InMemoryCatalog};
use numlease_gateway::telemetry::{self, LogFormat};
use numlease_gateway::{LeaseService, SessionTable};
use numlease_types::{AccountId, LeaseConfig, LeaseError, Project, Result, constants};
use rand::Rng;
use rust_decimal::Decimal;

const CLIENTS: usize = 16;
const ROUNDS: usize = 30;

#[derive(Debug, Default)]
struct Tally {
    leased: usize,
    delivered: usize,
    released: usize,
    refused: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let format = std::env::var("NUMLEASE_LOG_FORMAT")
        .ok()
        .map(|f| f.parse::<LogFormat>())
        .transpose()?
        .unwrap_or_default();
    telemetry::init(format, "info")?;

    let config = match std::env::args().nth(1) {
        Some(path) => LeaseConfig::from_path(path)?,
        None => LeaseConfig::default(),
    };
    tracing::info!(
        service = constants::SERVICE_NAME,
        version = constants::VERSION,
        permits = config.admission_permits,
        "Starting simulation"
    );

    let catalog = Arc::new(InMemoryCatalog::with_projects([
        Project::new("kg", "KuGou Music", Decimal::new(10, 2)),
        Project::new("wx", "WeChat", Decimal::new(25, 2)),
        Project::new("wb", "Weibo", Decimal::new(5, 2)),
    ])?);
    let sessions = Arc::new(SessionTable::new());
    let ttl = Duration::seconds(config.session_ttl_secs);
    let service = LeaseService::from_config(config, catalog, sessions.clone());

    let mut tokens = Vec::with_capacity(CLIENTS);
    let mut funded = Decimal::ZERO;
    for _ in 0..CLIENTS {
        let account = AccountId::new();
        let token = sessions.issue(account, ttl)?;
        let recharge = service.recharge(&token, Decimal::from(5)).await;
        if !recharge.is_ok() {
            tracing::warn!(%account, code = recharge.code, message = %recharge.message, "Funding failed; client skipped");
            continue;
        }
        funded += Decimal::from(5);
        tokens.push(token);
    }
    if tokens.is_empty() {
        return Err(LeaseError::Internal("no client could be funded".into()));
    }

    let tasks_run = tokens.len();
    let mut tasks = Vec::with_capacity(tasks_run);
    for token in tokens {
        let service = service.clone();
        tasks.push(tokio::spawn(async move { client(service, token).await }));
    }

    let mut total = Tally::default();
    for task in tasks {
        match task.await {
            Ok(t) => {
                total.leased += t.leased;
                total.delivered += t.delivered;
                total.released += t.released;
                total.refused += t.refused;
            }
            Err(err) => tracing::warn!(error = %err, "Client task failed"),
        }
    }

    let snapshot = service.snapshot().await?;
    snapshot.audit()?;
    let active = snapshot.leases.iter().filter(|l| l.is_active()).count();
    println!("clients:   {tasks_run}/{CLIENTS}");
    println!("leased:    {}", total.leased);
    println!("delivered: {}", total.delivered);
    println!("released:  {}", total.released);
    println!("refused:   {}", total.refused);
    println!("active:    {active}");
    println!("funded:    {funded}");
    println!("remaining: {}", snapshot.total_funds());
    println!("spent:     {}", funded - snapshot.total_funds());
    println!("digest:    {}", snapshot.digest);
    Ok(())
}

async fn client(service: LeaseService, token: String) -> Tally {
    let mut tally = Tally::default();
    let projects = ["kg", "wx", "wb"];
    for _ in 0..ROUNDS {
        let (project, carrier, poll_first) = {
            let mut rng = rand::thread_rng();
            (
                projects[rng.gen_range(0..projects.len())],
                rng.gen_range(0..=3u8),
                rng.gen_bool(0.8),
            )
        };

        let leased = service.get_phone(&token, project, carrier, 0).await;
        let Some(allocation) = leased.data else {
            tally.refused += 1;
            continue;
        };
        tally.leased += 1;
        let phone = allocation.phone.as_str().to_string();

        if poll_first {
            let polled = service.get_sms_code(&token, project, &phone).await;
            if let Some(Delivery::Delivered(_)) = polled.data {
                tally.delivered += 1;
                continue;
            }
        }
        if service.release_phone(&token, project, &phone).await.is_ok() {
            tally.released += 1;
        }
    }
    tally
}
