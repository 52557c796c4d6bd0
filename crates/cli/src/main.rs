mod settings;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drift_core::{now_ms, EpochMs, SeededRandom, Snapshot, SyncConfig};
use drift_domains::{Headline, InventoryAdapter, LoanAdapter, RevenueAdapter, TaxAdapter};
use drift_engine::{advance, DomainAdapter, JsonFileSource, SeedSource, SyncStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::signal;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use settings::{Domain, EffectiveConfig, Settings};

#[derive(Debug, Parser)]
#[command(name = "drift", version, about = "Synthetic live-metrics feeds for dashboard domains")]
struct Cli {
    /// Log filter, e.g. `info` or `drift_engine=debug`. Falls back to RUST_LOG, then `info`.
    #[arg(long, global = true)]
    log: Option<String>,

    /// Per-domain timing overrides. A missing file means adapter defaults.
    #[arg(long, global = true, default_value = "drift.toml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a live store and log every published snapshot
    Watch {
        #[arg(long, value_enum)]
        domain: Domain,
        /// RNG seed; random when omitted.
        #[arg(long)]
        seed: Option<u64>,
        /// JSON file with the first snapshot's dataset.
        #[arg(long)]
        data: Option<PathBuf>,
        /// Stop after this many seconds instead of waiting for Ctrl-C.
        #[arg(long)]
        for_secs: Option<u64>,
    },

    /// Run cycles offline, without timers, and print the final snapshot as JSON
    Step {
        #[arg(long, value_enum)]
        domain: Domain,
        #[arg(long, default_value_t = 1)]
        cycles: u32,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long)]
        data: Option<PathBuf>,
        /// Clock of the first cycle in epoch milliseconds; later cycles
        /// advance by the minimum refresh interval.
        #[arg(long)]
        at: Option<EpochMs>,
    },

    /// Print a domain's built-in dataset as JSON
    Dump {
        #[arg(long, value_enum)]
        domain: Domain,
    },

    /// Print the effective configuration of every domain as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref())?;

    let settings = Settings::load_or_default(&cli.config)?;

    match cli.cmd {
        Command::Watch {
            domain,
            seed,
            data,
            for_secs,
        } => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("build tokio runtime")?;
            let opts = WatchOpts {
                seed,
                data,
                for_secs,
            };
            rt.block_on(watch_domain(domain, &settings, opts))?;
        }
        Command::Step {
            domain,
            cycles,
            seed,
            data,
            at,
        } => {
            let opts = StepOpts {
                cycles,
                seed,
                data,
                at: at.unwrap_or_else(now_ms),
            };
            let out = match domain {
                Domain::Inventory => step(InventoryAdapter::new()?, &settings, domain, opts)?,
                Domain::Loan => step(LoanAdapter::new()?, &settings, domain, opts)?,
                Domain::Revenue => step(RevenueAdapter::new()?, &settings, domain, opts)?,
                Domain::Tax => step(TaxAdapter::new()?, &settings, domain, opts)?,
            };
            println!("{out}");
        }
        Command::Dump { domain } => {
            let out = match domain {
                Domain::Inventory => dump(&InventoryAdapter::new()?)?,
                Domain::Loan => dump(&LoanAdapter::new()?)?,
                Domain::Revenue => dump(&RevenueAdapter::new()?)?,
                Domain::Tax => dump(&TaxAdapter::new()?)?,
            };
            println!("{out}");
        }
        Command::Config => {
            let effective = EffectiveConfig {
                inventory: settings.effective(
                    Domain::Inventory,
                    InventoryAdapter::new()?.default_config(),
                )?,
                loan: settings.effective(Domain::Loan, LoanAdapter::new()?.default_config())?,
                revenue: settings
                    .effective(Domain::Revenue, RevenueAdapter::new()?.default_config())?,
                tax: settings.effective(Domain::Tax, TaxAdapter::new()?.default_config())?,
            };
            print!("{}", effective.to_toml()?);
        }
    }

    Ok(())
}

fn init_tracing(filter: Option<&str>) -> Result<()> {
    let filter = match filter {
        Some(directives) => EnvFilter::try_new(directives).context("parse --log filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
    Ok(())
}

struct WatchOpts {
    seed: Option<u64>,
    data: Option<PathBuf>,
    for_secs: Option<u64>,
}

async fn watch_domain(domain: Domain, settings: &Settings, opts: WatchOpts) -> Result<()> {
    match domain {
        Domain::Inventory => watch(InventoryAdapter::new()?, settings, domain, opts).await,
        Domain::Loan => watch(LoanAdapter::new()?, settings, domain, opts).await,
        Domain::Revenue => watch(RevenueAdapter::new()?, settings, domain, opts).await,
        Domain::Tax => watch(TaxAdapter::new()?, settings, domain, opts).await,
    }
}

async fn watch<A>(adapter: A, settings: &Settings, domain: Domain, opts: WatchOpts) -> Result<()>
where
    A: DomainAdapter,
    A::Data: Headline + DeserializeOwned,
{
    let config = settings.effective(domain, adapter.default_config())?;
    let mut builder = SyncStore::builder(adapter).config(config);
    if let Some(seed) = opts.seed {
        builder = builder.seed(seed);
    }
    if let Some(path) = opts.data {
        builder = builder.source(JsonFileSource::<A::Data>::new(path));
    }
    let store = builder.start()?;
    let name = store.adapter().name();

    let _sub = store.subscribe(move |state| {
        if state.is_loading {
            return;
        }
        info!(
            domain = name,
            version = state.snapshot.version,
            connected = state.is_connected,
            error = state.error.as_deref().unwrap_or("-"),
            "{}",
            state.data().headline()
        );
    });

    let deadline = async {
        match opts.for_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::select! {
        res = signal::ctrl_c() => {
            res.context("listen for ctrl-c")?;
            info!("shutdown requested");
        }
        _ = deadline => {}
    }

    store.dispose();
    Ok(())
}

struct StepOpts {
    cycles: u32,
    seed: u64,
    data: Option<PathBuf>,
    at: EpochMs,
}

fn step<A>(adapter: A, settings: &Settings, domain: Domain, opts: StepOpts) -> Result<String>
where
    A: DomainAdapter,
    A::Data: Headline + Serialize + DeserializeOwned,
{
    let config: SyncConfig = settings.effective(domain, adapter.default_config())?;
    let mut data = match &opts.data {
        Some(path) => JsonFileSource::<A::Data>::new(path)
            .load()
            .with_context(|| format!("load {}", path.display()))?,
        None => adapter.initial(),
    };
    adapter.reclassify(&mut data);

    let mut rng = SeededRandom::new(opts.seed);
    let mut snapshot = Snapshot::initial(data, opts.at);
    let spacing = config.interval.min_ms() as EpochMs;
    for n in 0..opts.cycles {
        let now = opts.at.saturating_add(spacing.saturating_mul(EpochMs::from(n) + 1));
        let next = advance(&adapter, &snapshot.data, &mut rng, now)
            .with_context(|| format!("cycle {}", n + 1))?;
        snapshot = snapshot.succeed(next, now);
        info!(
            domain = adapter.name(),
            version = snapshot.version,
            "{}",
            snapshot.data.headline()
        );
    }
    serde_json::to_string_pretty(&snapshot).context("serialize snapshot")
}

fn dump<A>(adapter: &A) -> Result<String>
where
    A: DomainAdapter,
    A::Data: Serialize,
{
    let mut data = adapter.initial();
    adapter.reclassify(&mut data);
    serde_json::to_string_pretty(&data).context("serialize dataset")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_is_deterministic_for_a_seed() {
        let settings = Settings::default();
        let opts = || StepOpts {
            cycles: 5,
            seed: 42,
            data: None,
            at: 1_000,
        };
        let a = step(TaxAdapter::new().unwrap(), &settings, Domain::Tax, opts()).unwrap();
        let b = step(TaxAdapter::new().unwrap(), &settings, Domain::Tax, opts()).unwrap();
        assert_eq!(a, b);

        let snapshot: serde_json::Value = serde_json::from_str(&a).unwrap();
        assert_eq!(snapshot["version"], 5);
    }

    #[test]
    fn step_reads_a_dumped_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loan.json");
        std::fs::write(&path, dump(&LoanAdapter::new().unwrap()).unwrap()).unwrap();

        let opts = StepOpts {
            cycles: 2,
            seed: 1,
            data: Some(path),
            at: 0,
        };
        let out = step(LoanAdapter::new().unwrap(), &Settings::default(), Domain::Loan, opts).unwrap();
        let snapshot: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(snapshot["version"], 2);
        assert_eq!(snapshot["last_updated"], 80_000);
    }

    #[test]
    fn cli_parses_watch_flags() {
        let cli = Cli::try_parse_from([
            "drift", "--log", "debug", "watch", "--domain", "inventory", "--seed", "7", "--for-secs", "3",
        ])
        .unwrap();
        match cli.cmd {
            Command::Watch {
                domain,
                seed,
                for_secs,
                ..
            } => {
                assert_eq!(domain, Domain::Inventory);
                assert_eq!(seed, Some(7));
                assert_eq!(for_secs, Some(3));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
