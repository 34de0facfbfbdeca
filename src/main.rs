//! Pollution Equilibrium
//!
//! Defense overhead calculator for pollution-driven biter attacks in Factorio.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::EnvFilter;

use pollution_equilibrium::calculator::{self, Calculator, HostileKind, Scenario, SetupNames};
use pollution_equilibrium::models::DomainData;
use pollution_equilibrium::pollution::MiningMethod;
use pollution_equilibrium::solver::{DEFAULT_DAMAGE_FLOOR, DEFAULT_MAX_GENERATIONS, SolverSettings};
use pollution_equilibrium::units::format_quantity;
use pollution_equilibrium::{db, extract, reference};

#[derive(Parser)]
#[command(name = "pollution-equilibrium")]
#[command(about = "Defense overhead calculator for pollution-driven attacks in Factorio")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "pollution_data.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SolverArgs {
    /// Minimum damage per shot after flat resistance
    #[arg(long, default_value_t = DEFAULT_DAMAGE_FLOOR)]
    damage_floor: f64,

    /// Give up after this many generations of attacks
    #[arg(long, default_value_t = DEFAULT_MAX_GENERATIONS)]
    max_generations: usize,
}

impl SolverArgs {
    fn settings(&self) -> SolverSettings {
        SolverSettings {
            damage_floor: self.damage_floor,
            max_generations: self.max_generations,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract prototype data from the game's Lua files
    Extract {
        /// Path to data/base/prototypes
        prototypes_dir: PathBuf,

        /// Clear existing data before extraction
        #[arg(long)]
        clear: bool,
    },

    /// Calculate the defense overhead of producing a resource
    Calc {
        /// Amount of the base resource to produce
        #[arg(short, long, default_value_t = 1000.0)]
        quantity: f64,

        /// How fuel is mined
        #[arg(short, long, value_enum, default_value_t = MiningMethod::Burner)]
        mining: MiningMethod,

        /// Which biters answer the pollution
        #[arg(long, value_enum, default_value_t = HostileKind::Medium)]
        hostile: HostileKind,

        #[command(flatten)]
        names: SetupNames,

        #[command(flatten)]
        solver: SolverArgs,

        /// Show every generation of the attack/defense loop
        #[arg(short, long)]
        verbose: bool,
    },

    /// Compare the overhead for every mining method and biter size
    Compare {
        /// Amount of the base resource to produce
        #[arg(short, long, default_value_t = 1000.0)]
        quantity: f64,

        #[command(flatten)]
        names: SetupNames,

        #[command(flatten)]
        solver: SolverArgs,
    },

    /// List all machines in the database
    ListMachines,

    /// List all hostiles in the database
    ListHostiles,

    /// Initialize empty database with schema
    Init,

    /// Load vanilla prototype values (without a game install)
    LoadSample,
}

fn load_data(conn: &Connection) -> Result<DomainData> {
    let data = db::load_domain_data(conn)?;
    if data.is_empty() {
        bail!("No prototype data in database. Run 'extract' or 'load-sample' first.");
    }
    Ok(data)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pollution_equilibrium=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Extract {
            prototypes_dir,
            clear,
        } => {
            if clear {
                println!("Clearing existing data...");
                db::clear_domain_data(&conn)?;
            }

            let stats = extract::extract_to_database(&conn, &prototypes_dir)?;
            println!("\n{}", stats);
        }

        Commands::Calc {
            quantity,
            mining,
            hostile,
            names,
            solver,
            verbose,
        } => {
            let data = load_data(&conn)?;
            let scenario = Scenario {
                mining_method: mining,
                hostile_kind: hostile,
            };
            let calc = Calculator::new(&data, &names, scenario, solver.settings())?;
            let report = calc.equilibrium_overhead(quantity)?;

            if verbose {
                println!("Attack generations:\n");
                println!("{}", calculator::format_generations(&report.equilibrium));
            }
            println!("{}", report);
        }

        Commands::Compare {
            quantity,
            names,
            solver,
        } => {
            let data = load_data(&conn)?;
            println!(
                "{:<10} {:<16} {:>14} {:>12} {:>6}",
                "Mining", "Hostile", "Extra", "Overhead", "Gens"
            );
            println!("{}", "-".repeat(62));
            for mining_method in MiningMethod::ALL {
                for hostile_kind in HostileKind::ALL {
                    let scenario = Scenario {
                        mining_method,
                        hostile_kind,
                    };
                    let result = Calculator::new(&data, &names, scenario, solver.settings())
                        .and_then(|calc| calc.equilibrium_overhead(quantity));
                    match result {
                        Ok(report) => println!(
                            "{:<10} {:<16} {:>14.3} {:>11.2}% {:>6}",
                            mining_method.as_str(),
                            report.hostile,
                            report.overhead(),
                            report.percent,
                            report.equilibrium.generations.len()
                        ),
                        Err(e) => println!(
                            "{:<10} {:<16} {}",
                            mining_method.as_str(),
                            hostile_kind.prototype_name(),
                            e
                        ),
                    }
                }
            }
        }

        Commands::ListMachines => {
            let machines = db::list_machines(&conn)?;
            if machines.is_empty() {
                println!("No machines in database. Run 'extract' or 'load-sample' first.");
            } else {
                println!(
                    "{:<24} {:<20} {:>8} {:>10} {:>12}",
                    "Machine", "Kind", "Speed", "Power", "Pollution/m"
                );
                println!("{}", "-".repeat(78));
                for m in machines {
                    let power = m
                        .energy_usage_watts
                        .or(m.max_output_watts)
                        .map_or_else(|| "-".to_string(), |w| format_quantity(w, "W"));
                    let speed = m.speed.map_or_else(|| "-".to_string(), |s| format!("{s}"));
                    println!(
                        "{:<24} {:<20} {:>8} {:>10} {:>12.1}",
                        m.name,
                        m.kind.as_str(),
                        speed,
                        power,
                        m.emissions_per_minute
                    );
                }
            }
        }

        Commands::ListHostiles => {
            let hostiles = db::list_hostiles(&conn)?;
            if hostiles.is_empty() {
                println!("No hostiles in database. Run 'extract' or 'load-sample' first.");
            } else {
                println!("{:<20} {:>10} {:>12}  Resistances", "Hostile", "Health", "Pollution");
                println!("{}", "-".repeat(64));
                for h in hostiles {
                    let resistances: Vec<String> = h
                        .resistances
                        .iter()
                        .map(|r| format!("{} {}/{:.0}%", r.damage_type, r.flat, r.percent * 100.0))
                        .collect();
                    println!(
                        "{:<20} {:>10.0} {:>12.0}  {}",
                        h.name,
                        h.max_health,
                        h.pollution_to_join_attack,
                        resistances.join(", ")
                    );
                }
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            let data = reference::reference_data();
            db::clear_domain_data(&conn)?;
            db::store_domain_data(&conn, &data)?;
            println!(
                "Loaded {} machines, {} recipes, {} fuels, {} hostiles, {} ammo",
                data.machines.len(),
                data.recipes.len(),
                data.fuels.len(),
                data.hostiles.len(),
                data.ammo.len()
            );
        }
    }

    Ok(())
}
