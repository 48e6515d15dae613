//! LicMesh CLI - demo driver for the distributed license-validity cache.
//!
//! Wires caches, mesh, verifier and watchdog together the way a host
//! process would, either against a simulated clock or in real time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use licmesh_core::{
    standard_sequences, BoundaryId, CacheChannel, CacheEndpoint, CacheVerifier, Clock,
    LicenseError, ManualClock, Probe, ResultStore, SystemClock, ThreadRandom, ValidationCache,
    ValidationConfig, ValidationService, Validator,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// LicMesh - distributed license-validity caching.
///
/// Multiple cache instances, one per isolation boundary, agree on whether
/// a license is currently valid without each of them calling the real
/// validator on every check. A fully-connected mesh exchanges read-only
/// proxies between boundaries; a probabilistic consensus pass decides when
/// a cache may trust its peers and when it must revalidate for real.
#[derive(Parser)]
#[command(name = "licmesh")]
#[command(version = VERSION)]
#[command(about = "Distributed license-validity cache demo")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a deterministic multi-boundary simulation on a manual clock
    Simulate {
        /// Number of isolation boundaries in the mesh
        #[arg(long, default_value = "3")]
        boundaries: usize,

        /// Number of watchdog ticks to simulate
        #[arg(long, default_value = "8")]
        rounds: usize,

        /// Minutes the clock advances between ticks
        #[arg(long, default_value = "30")]
        step_minutes: i64,

        /// Make the real validator reject the license
        #[arg(long)]
        deny: bool,
    },

    /// Run the watchdog against the system clock until it halts
    Watch {
        /// Number of isolation boundaries in the mesh
        #[arg(long, default_value = "3")]
        boundaries: usize,

        /// Seconds between watchdog ticks
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Show version, platform and built-in defaults
    Info,
}

/// Stand-in for the real, expensive license check.
struct DemoValidator {
    deny: bool,
    calls: AtomicUsize,
}

impl DemoValidator {
    fn new(deny: bool) -> Arc<Self> {
        Arc::new(Self {
            deny,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Validator for DemoValidator {
    fn validate(&self) -> Result<bool, LicenseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(!self.deny)
    }
}

struct LivenessProbe;

impl Probe for LivenessProbe {
    fn ping(&self, _now: DateTime<Utc>) -> Result<(), LicenseError> {
        Ok(())
    }
}

fn print_banner() {
    println!(
        r#"
   _     _      __  __           _
  | |   (_) ___|  \/  | ___  ___| |__
  | |   | |/ __| |\/| |/ _ \/ __| '_ \
  | |___| | (__| |  | |  __/\__ \ | | |
  |_____|_|\___|_|  |_|\___||___/_| |_|

  Distributed License-Validity Cache
  Version: {}
"#,
        VERSION
    );
}

fn print_explanation() {
    println!(
        r#"
WHAT IS LICMESH?
================

LicMesh keeps several isolated execution contexts agreeing on license
validity without hammering the real license check. Each boundary owns a
cache holding the latest result; boundaries exchange read-only proxies
through a fully-connected mesh.

HOW A CHECK FLOWS
=================

  1. WATCHDOG TICK
     The validation service finds every sequence whose due time has
     passed and asks the verifier to confirm the license for it.

  2. SKEW AND EXPIRY GATES
     A result generated in the future beyond a 1-second tolerance is
     treated as clock corruption; an expired result triggers a
     consensus pass. Anything else is reported unchanged.

  3. PEER CONSENSUS
     The cache compares its peers' validity windows against the
     requested cadence and draws a random sample: the staler the best
     peer result looks, the likelier a real validator call becomes.
     One failing peer fails the whole group; an isolated cache always
     fails (trust cannot bootstrap from nothing).

  4. ESCALATION
     A failed liveness probe, or a tick where every due sequence
     failed, halts the watchdog for good.

USAGE
=====

  licmesh simulate              Deterministic mesh simulation
  licmesh simulate --deny       Watch a rejection propagate
  licmesh simulate --boundaries 1   Isolated cache fails closed
  licmesh watch                 Real-time watchdog on the system clock
  licmesh info                  Version, platform and defaults
"#
    );
}

fn show_info() {
    println!("\nSYSTEM INFORMATION");
    println!("==================\n");

    println!("LicMesh Version: {}", VERSION);
    println!();

    println!("Platform:");
    println!("  OS: {}", std::env::consts::OS);
    println!("  Arch: {}", std::env::consts::ARCH);
    println!();

    let config = ValidationConfig::default();
    println!("Defaults:");
    println!("  Watchdog interval: {:?}", config.watchdog_interval);
    println!("  Standard cadence:  {:?}", config.standard_cadence.unit());
    println!("  Bootstrap window:  5 minutes");
    println!("  Skew tolerance:    1 second");
    println!();

    println!("Cadences:");
    println!("  hourly, daily, weekly, fortnightly - fixed-length repeats");
    println!("  monthly, yearly - calendar-correct repeats (leap days honored)");
}

struct SimulatedMesh {
    caches: Vec<ValidationCache>,
    service: Arc<ValidationService>,
    store: Arc<ResultStore>,
    validator: Arc<DemoValidator>,
}

fn assemble_mesh(
    boundaries: usize,
    deny: bool,
    clock: Arc<dyn Clock>,
) -> Result<SimulatedMesh, LicenseError> {
    let validator = DemoValidator::new(deny);
    let random = Arc::new(ThreadRandom);
    let channel = CacheChannel::new();

    let mut caches = Vec::with_capacity(boundaries);
    for _ in 0..boundaries.max(1) {
        let cache = ValidationCache::new(validator.clone(), clock.clone(), random.clone())?;
        let endpoint = Arc::new(CacheEndpoint::new(cache.clone()));
        channel.connect_to(BoundaryId::random(), endpoint);
        caches.push(cache);
    }

    // The watchdog runs in the first boundary; the rest are passive peers.
    let store = Arc::new(ResultStore::new());
    let verifier = CacheVerifier::new(
        Arc::new(caches[0].clone()),
        store.clone(),
        clock.clone(),
    );
    let now = clock.now();
    let service = Arc::new(ValidationService::new(
        Arc::new(verifier),
        Arc::new(LivenessProbe),
        clock,
        standard_sequences(now)?,
    ));

    Ok(SimulatedMesh {
        caches,
        service,
        store,
        validator,
    })
}

fn run_simulation(boundaries: usize, rounds: usize, step_minutes: i64, deny: bool, json: bool) {
    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let mesh = match assemble_mesh(boundaries, deny, clock.clone()) {
        Ok(mesh) => mesh,
        Err(error) => {
            println!("\x1b[31m[ERROR]\x1b[0m Failed to assemble the mesh: {}", error);
            return;
        }
    };

    if !json {
        println!("SIMULATION");
        println!("==========\n");
        println!("Configuration:");
        println!("  Boundaries: {}", boundaries.max(1));
        println!("  Rounds:     {}", rounds);
        println!("  Step:       {} minutes", step_minutes);
        println!("  Validator:  {}", if deny { "denies" } else { "approves" });
        println!();
        println!(
            "  Peer view from boundary 0: {} proxies (own included)\n",
            mesh.caches[0].peer_count()
        );
    }

    let mut halt_error: Option<LicenseError> = None;
    if let Err(error) = mesh.service.start_validation() {
        halt_error = Some(error);
    }

    let mut round_records = Vec::new();
    let mut completed = 0;
    if halt_error.is_none() {
        for round in 1..=rounds {
            clock.advance(Duration::minutes(step_minutes));
            if let Err(error) = mesh.service.tick() {
                halt_error = Some(error);
                break;
            }
            completed = round;

            let minutes = (clock.now() - start).num_minutes();
            let phase = format!("{:?}", mesh.service.phase());
            let (failed, window) = mesh
                .store
                .latest()
                .map(|stored| {
                    let from = (stored.generated - start).num_minutes();
                    let until = (stored.expires - start).num_minutes();
                    (stored.reports_failure(), (from, until))
                })
                .unwrap_or((true, (0, 0)));

            if json {
                round_records.push(serde_json::json!({
                    "round": round,
                    "minutes": minutes,
                    "phase": phase,
                    "failure": failed,
                    "window_from_minutes": window.0,
                    "window_until_minutes": window.1,
                    "validator_calls": mesh.validator.calls(),
                }));
            } else {
                let tag = if failed {
                    "\x1b[31m[FAIL]\x1b[0m"
                } else {
                    "\x1b[32m[PASS]\x1b[0m"
                };
                println!(
                    "  round {:>2}  t=+{:>4}m  phase={:<9}  {}  window +{}m -> +{}m  validator calls: {}",
                    round,
                    minutes,
                    phase,
                    tag,
                    window.0,
                    window.1,
                    mesh.validator.calls()
                );
            }
        }
    }

    if json {
        let output = serde_json::json!({
            "boundaries": boundaries.max(1),
            "rounds_completed": completed,
            "rounds": round_records,
            "final_phase": format!("{:?}", mesh.service.phase()),
            "validator_calls": mesh.validator.calls(),
            "halted": halt_error.is_some(),
            "halt_error": halt_error.as_ref().map(ToString::to_string),
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap());
        return;
    }

    println!();
    println!("Summary:");
    if let Some(error) = halt_error {
        println!("  \x1b[31m[HALT]\x1b[0m Service halted: {}", error);
    } else if mesh.store.latest().map(|s| s.reports_failure()).unwrap_or(true) {
        println!("  \x1b[31m[FAIL]\x1b[0m License reported invalid");
    } else {
        println!("  \x1b[32m[PASS]\x1b[0m License reported valid");
    }
    println!(
        "  {} real validator calls over {} completed rounds",
        mesh.validator.calls(),
        completed
    );
}

async fn run_watch(boundaries: usize, interval: std::time::Duration) {
    let clock = Arc::new(SystemClock);
    let mesh = match assemble_mesh(boundaries, false, clock) {
        Ok(mesh) => mesh,
        Err(error) => {
            println!("\x1b[31m[ERROR]\x1b[0m Failed to assemble the mesh: {}", error);
            return;
        }
    };

    if let Err(error) = mesh.service.start_validation() {
        println!("\x1b[31m[HALT]\x1b[0m Service refused to start: {}", error);
        return;
    }

    println!(
        "Watching {} boundaries, tick every {:?} (Ctrl-C to stop)...",
        boundaries.max(1),
        interval
    );
    let error = mesh.service.clone().run(interval).await;
    println!("\x1b[31m[HALT]\x1b[0m Service halted: {}", error);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let json_output = cli.format == "json";

    // Initialize logging (suppress for JSON output)
    if json_output {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_target(false)
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_target(false)
            .init();
    }

    match cli.command {
        Some(Commands::Simulate {
            boundaries,
            rounds,
            step_minutes,
            deny,
        }) => {
            if !json_output {
                print_banner();
            }
            run_simulation(boundaries, rounds, step_minutes, deny, json_output);
        }
        Some(Commands::Watch {
            boundaries,
            interval_secs,
        }) => {
            print_banner();
            let interval = interval_secs
                .map(std::time::Duration::from_secs)
                .unwrap_or(ValidationConfig::default().watchdog_interval);
            run_watch(boundaries, interval).await;
        }
        Some(Commands::Info) => {
            print_banner();
            show_info();
        }
        None => {
            print_banner();
            print_explanation();
        }
    }
}
