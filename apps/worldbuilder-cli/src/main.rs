use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;
use worldbuilder_common::{Address, TileCoord, Wei};
use worldbuilder_economy::PlayerStats;
use worldbuilder_kernel::{Building, World};
use worldbuilder_session::{Accounts, PollOutcome, Session, TracingNotifier, WorldBuilderConfig};
use worldbuilder_tools::{WorldInspector, render_map};
use worldbuilder_wallet::InMemoryWallet;

#[derive(Parser)]
#[command(name = "worldbuilder", about = "CLI for World Builder operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML config overriding treasury, prices and funding source
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, pricing and world summary
    Info,
    /// Render the tile grid as text
    Map {
        /// Highlight tiles owned by this address
        #[arg(short, long)]
        account: Option<String>,
        /// Emit every tile as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Show a single tile
    Inspect {
        x: u32,
        y: u32,
        #[arg(long)]
        json: bool,
    },
    /// List the largest landholders
    Leaderboard {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Buy a tile, build on it and accrue tokens against a local wallet
    Demo {
        /// Starting balance of the player, in ETH
        #[arg(short, long, default_value = "1")]
        balance: String,
        #[arg(short, default_value = "0")]
        x: u32,
        #[arg(short, default_value = "1")]
        y: u32,
        /// Building to construct after the purchase confirms
        #[arg(long, default_value = "shop")]
        building: Building,
        /// How long to accrue tokens for
        #[arg(short, long, default_value = "1.0")]
        seconds: f64,
        /// Move this much ETH from a universal account to the player first
        #[arg(long)]
        fund: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let config = match &cli.config {
        Some(path) => WorldBuilderConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => WorldBuilderConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            let world = World::generate(config.buildings.clone(), now_ms());
            println!("worldbuilder v{}", env!("CARGO_PKG_VERSION"));
            println!("treasury: {}", config.treasury);
            println!("land: {} ETH", config.land_price);
            for b in Building::CONSTRUCTIBLE {
                if let Some(spec) = config.buildings.spec(b) {
                    println!(
                        "{b:>12}: {} ETH, income {} ETH/h, {} WB/s",
                        spec.price, spec.income, spec.wb_per_second
                    );
                }
            }
            println!("{}", WorldInspector::summary(&world));
        }
        Commands::Map { account, json } => {
            let world = World::generate(config.buildings.clone(), now_ms());
            if json {
                println!("{}", serde_json::to_string_pretty(world.tiles())?);
            } else {
                let viewer = account.as_deref().map(Address::parse).transpose()?;
                print!("{}", render_map(&world, viewer.as_ref()));
            }
        }
        Commands::Inspect { x, y, json } => {
            let world = World::generate(config.buildings.clone(), now_ms());
            let coord = TileCoord::new(x, y);
            let Some(info) = WorldInspector::inspect_tile(&world, coord) else {
                bail!("tile {coord} is outside the grid");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("{info}");
            }
        }
        Commands::Leaderboard { limit } => {
            let world = World::generate(config.buildings.clone(), now_ms());
            for h in WorldInspector::leaderboard(&world, limit) {
                println!("#{:<3} {} tiles={}", h.rank, h.owner, h.tiles);
            }
        }
        Commands::Demo {
            balance,
            x,
            y,
            building,
            seconds,
            fund,
        } => {
            let plan = DemoPlan {
                balance,
                fund,
                coord: TileCoord::new(x, y),
                building,
                seconds,
            };
            let stats = run_demo(config, &plan)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

struct DemoPlan {
    balance: String,
    fund: Option<String>,
    coord: TileCoord,
    building: Building,
    seconds: f64,
}

fn run_demo(config: WorldBuilderConfig, plan: &DemoPlan) -> anyhow::Result<PlayerStats> {
    let run_for = Duration::try_from_secs_f64(plan.seconds)
        .with_context(|| format!("invalid --seconds value {}", plan.seconds))?;
    let player = Address::from_low_u64(0xbeef);
    let universal = Address::from_low_u64(0xcafe);
    let fund = plan.fund.as_deref().map(Wei::parse_ether).transpose()?;

    let wallet = InMemoryWallet::new()
        .with_auto_confirm(true)
        .with_balance(&player, Wei::parse_ether(&plan.balance)?)
        .with_balance(&universal, fund.unwrap_or(Wei::ZERO));
    let mut session = Session::new(config, wallet, TracingNotifier, now_ms());
    session.connect(Accounts {
        sub: player.clone(),
        universal: Some(universal),
    });
    if let Some(amount) = fund {
        session.fund_sub_account(amount)?;
    }

    session.select(plan.coord)?;
    session.buy_land()?;
    settle(&mut session)?;
    session.build(plan.building)?;
    settle(&mut session)?;

    let start = Instant::now();
    session.tick(start);
    while start.elapsed() < run_for {
        std::thread::sleep(Duration::from_millis(100));
        session.tick(Instant::now());
    }

    let earned = session.harvest(Instant::now())?;
    tracing::info!(%earned, "harvest complete");

    let world = session.world();
    let replayed = World::replay(
        world.catalog().clone(),
        world.generated_at_ms(),
        world.events(),
    );
    let matches = replayed.state_hash() == world.state_hash();
    println!(
        "Replay: events={} hash={:016x} match={}",
        world.events().len(),
        world.state_hash(),
        if matches { "OK" } else { "MISMATCH" }
    );
    print!("{}", render_map(world, Some(&player)));

    Ok(session.stats().clone())
}

fn settle<N: worldbuilder_session::Notifier>(
    session: &mut Session<InMemoryWallet, N>,
) -> anyhow::Result<()> {
    loop {
        match session.poll(Instant::now())? {
            PollOutcome::Pending => std::thread::sleep(Duration::from_millis(50)),
            PollOutcome::Idle | PollOutcome::Applied { .. } => return Ok(()),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(seconds: f64) -> DemoPlan {
        DemoPlan {
            balance: "1".into(),
            fund: None,
            coord: TileCoord::new(0, 1),
            building: Building::Shop,
            seconds,
        }
    }

    #[test]
    fn demo_rejects_unrepresentable_durations() {
        for seconds in [f64::INFINITY, f64::NAN, -1.0] {
            assert!(run_demo(WorldBuilderConfig::default(), &plan(seconds)).is_err());
        }
    }

    #[test]
    fn demo_can_fund_an_empty_sub_account() {
        let plan = DemoPlan {
            balance: "0".into(),
            fund: Some("1".into()),
            ..plan(0.0)
        };
        let stats = run_demo(WorldBuilderConfig::default(), &plan).unwrap();
        assert_eq!(stats.total_land, 1);
        assert_eq!(stats.wb_per_second, 3.0);
    }
}
