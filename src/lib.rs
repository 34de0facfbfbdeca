//! Pollution Equilibrium
//!
//! Estimates how much of a smelted resource has to be spent on ammunition to
//! fend off the attacks its own pollution provokes, including the attacks
//! provoked by producing that ammunition.

pub mod calculator;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod pollution;
pub mod reference;
pub mod solver;
pub mod units;

pub use calculator::{Calculator, HostileKind, OverheadReport, Scenario, SetupNames};
pub use error::{CalcError, Result};
pub use pollution::{EPSILON, MiningMethod, PollutionModel};
pub use solver::{Equilibrium, EquilibriumSolver, SolverSettings};
