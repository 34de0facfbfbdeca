//! Defense overhead calculator logic
//!
//! Resolves a named machine/fuel/ammo selection against the loaded prototype
//! tables, then asks the solver how much extra base resource the defense
//! against the production's pollution costs.

use clap::{Args, ValueEnum};

use crate::error::{CalcError, Result};
use crate::models::{DomainData, EnergySource, MachineKind, MachineSpec};
use crate::pollution::{Boiler, Crafter, Drill, MiningMethod, PollutionModel, Setup, SteamEngine};
use crate::solver::{Defense, Equilibrium, EquilibriumSolver, SolverSettings};
use crate::units::per_minute_to_per_second;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum HostileKind {
    Small,
    #[default]
    Medium,
    Big,
    Behemoth,
}

impl HostileKind {
    pub const ALL: [HostileKind; 4] = [Self::Small, Self::Medium, Self::Big, Self::Behemoth];

    /// Prototype name of the biter of this size
    pub fn prototype_name(self) -> &'static str {
        match self {
            Self::Small => "small-biter",
            Self::Medium => "medium-biter",
            Self::Big => "big-biter",
            Self::Behemoth => "behemoth-biter",
        }
    }
}

/// Which variants are active for one calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scenario {
    pub mining_method: MiningMethod,
    pub hostile_kind: HostileKind,
}

/// Prototype names making up the production setup
#[derive(Debug, Clone, Args)]
pub struct SetupNames {
    /// Burner mining drill prototype
    #[arg(long, default_value = "burner-mining-drill")]
    pub burner_drill: String,

    /// Electric mining drill prototype
    #[arg(long, default_value = "electric-mining-drill")]
    pub electric_drill: String,

    /// Furnace smelting the base resource
    #[arg(long, default_value = "stone-furnace")]
    pub furnace: String,

    /// Assembling machine crafting the ammo
    #[arg(long, default_value = "assembling-machine-1")]
    pub assembler: String,

    #[arg(long, default_value = "boiler")]
    pub boiler: String,

    #[arg(long, default_value = "steam-engine")]
    pub steam_engine: String,

    /// Fuel burned by every burner machine
    #[arg(long, default_value = "coal")]
    pub fuel: String,

    /// Base resource, smelted (e.g. iron-plate)
    #[arg(long, default_value = "iron-plate")]
    pub resource: String,

    /// Ammo used against the attacks
    #[arg(long, default_value = "firearm-magazine")]
    pub ammo: String,
}

impl Default for SetupNames {
    fn default() -> Self {
        Self {
            burner_drill: "burner-mining-drill".into(),
            electric_drill: "electric-mining-drill".into(),
            furnace: "stone-furnace".into(),
            assembler: "assembling-machine-1".into(),
            boiler: "boiler".into(),
            steam_engine: "steam-engine".into(),
            fuel: "coal".into(),
            resource: "iron-plate".into(),
            ammo: "firearm-magazine".into(),
        }
    }
}

fn machine<'a>(data: &'a DomainData, name: &str, kind: MachineKind) -> Result<&'a MachineSpec> {
    let spec = data
        .machines
        .get(name)
        .ok_or_else(|| CalcError::UnknownMachine(name.to_string()))?;
    if spec.kind != kind {
        return Err(CalcError::WrongMachineKind {
            machine: name.to_string(),
            expected: kind,
            actual: spec.kind,
        });
    }
    Ok(spec)
}

fn field(spec: &MachineSpec, value: Option<f64>, field: &'static str) -> Result<f64> {
    value.ok_or_else(|| CalcError::MissingField {
        machine: spec.name.clone(),
        field,
    })
}

/// Fields used as divisors must be strictly positive
fn positive(what: impl Into<String>, value: f64) -> Result<f64> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(CalcError::NonPositive {
            what: what.into(),
            value,
        })
    }
}

fn resolve_drill(spec: &MachineSpec, source: EnergySource) -> Result<Drill> {
    if spec.energy_source != Some(source) {
        return Err(CalcError::WrongEnergySource {
            machine: spec.name.clone(),
            expected: source,
        });
    }
    Ok(Drill {
        mining_speed: positive(
            format!("{} mining speed", spec.name),
            field(spec, spec.speed, "mining speed")?,
        )?,
        power_watts: field(spec, spec.energy_usage_watts, "energy usage")?,
        pollution_per_second: per_minute_to_per_second(spec.emissions_per_minute),
    })
}

fn resolve_crafter(spec: &MachineSpec) -> Result<Crafter> {
    Ok(Crafter {
        crafting_speed: positive(
            format!("{} crafting speed", spec.name),
            field(spec, spec.speed, "crafting speed")?,
        )?,
        power_watts: field(spec, spec.energy_usage_watts, "energy usage")?,
        pollution_per_second: per_minute_to_per_second(spec.emissions_per_minute),
        energy_source: spec.energy_source.ok_or_else(|| CalcError::MissingField {
            machine: spec.name.clone(),
            field: "energy source",
        })?,
    })
}

impl Setup {
    /// Look up and validate every machine and the fuel named in `names`
    pub fn resolve(data: &DomainData, names: &SetupNames) -> Result<Self> {
        let burner_drill = resolve_drill(
            machine(data, &names.burner_drill, MachineKind::MiningDrill)?,
            EnergySource::Burner,
        )?;
        let electric_drill = resolve_drill(
            machine(data, &names.electric_drill, MachineKind::MiningDrill)?,
            EnergySource::Electric,
        )?;
        let furnace = resolve_crafter(machine(data, &names.furnace, MachineKind::Furnace)?)?;
        let assembler = resolve_crafter(machine(
            data,
            &names.assembler,
            MachineKind::AssemblingMachine,
        )?)?;

        let spec = machine(data, &names.boiler, MachineKind::Boiler)?;
        if spec.energy_source != Some(EnergySource::Burner) {
            return Err(CalcError::WrongEnergySource {
                machine: spec.name.clone(),
                expected: EnergySource::Burner,
            });
        }
        let boiler = Boiler {
            power_watts: field(spec, spec.energy_usage_watts, "energy consumption")?,
            pollution_per_second: per_minute_to_per_second(spec.emissions_per_minute),
            steam_per_water: positive(
                format!("{} steam per water", spec.name),
                field(spec, spec.steam_per_water, "steam per water")?,
            )?,
            water_per_second: positive(
                format!("{} water per second", spec.name),
                field(spec, spec.water_per_second, "water per second")?,
            )?,
        };

        let spec = machine(data, &names.steam_engine, MachineKind::Generator)?;
        let engine = SteamEngine {
            max_output_watts: positive(
                format!("{} max output", spec.name),
                field(spec, spec.max_output_watts, "max power output")?,
            )?,
            steam_per_second: field(spec, spec.steam_per_second, "steam per second")?,
        };

        let fuel = data
            .fuels
            .get(&names.fuel)
            .ok_or_else(|| CalcError::UnknownFuel(names.fuel.clone()))?;

        Ok(Self {
            burner_drill,
            electric_drill,
            furnace,
            assembler,
            boiler,
            engine,
            fuel_value_joules: positive(
                format!("{} fuel value", fuel.name),
                fuel.fuel_value_joules,
            )?,
        })
    }
}

impl Defense {
    /// Look up the hostile, the ammo and both recipes. The base resource per
    /// reload unit is read from the ammo recipe.
    pub fn resolve(data: &DomainData, names: &SetupNames, hostile: HostileKind) -> Result<Self> {
        let hostile_name = hostile.prototype_name();
        let hostile = data
            .hostiles
            .get(hostile_name)
            .ok_or_else(|| CalcError::UnknownHostile(hostile_name.to_string()))?
            .clone();
        positive(
            format!("{} pollution to join attack", hostile.name),
            hostile.pollution_to_join_attack,
        )?;

        let ammo = data
            .ammo
            .get(&names.ammo)
            .ok_or_else(|| CalcError::UnknownAmmo(names.ammo.clone()))?
            .clone();
        positive(format!("{} magazine size", ammo.name), ammo.magazine_size)?;

        let base_recipe = data
            .recipe_for(&names.resource)
            .ok_or_else(|| CalcError::NoRecipeFor(names.resource.clone()))?
            .clone();
        let ammo_recipe = data
            .recipe_for(&ammo.name)
            .ok_or_else(|| CalcError::NoRecipeFor(ammo.name.clone()))?
            .clone();
        positive(
            format!("{} result amount", ammo_recipe.name),
            ammo_recipe.result.amount,
        )?;
        let resource_per_reload = ammo_recipe
            .ingredient_per_result(&names.resource)
            .ok_or_else(|| CalcError::MissingIngredient {
                recipe: ammo_recipe.name.clone(),
                ingredient: names.resource.clone(),
            })?;

        Ok(Self {
            hostile,
            ammo,
            base_recipe,
            ammo_recipe,
            resource_per_reload,
        })
    }
}

/// A resolved, ready to run calculation
#[derive(Debug, Clone)]
pub struct Calculator {
    scenario: Scenario,
    solver: EquilibriumSolver,
}

impl Calculator {
    pub fn new(
        data: &DomainData,
        names: &SetupNames,
        scenario: Scenario,
        settings: SolverSettings,
    ) -> Result<Self> {
        positive("damage floor", settings.damage_floor)?;
        let setup = Setup::resolve(data, names)?;
        let defense = Defense::resolve(data, names, scenario.hostile_kind)?;
        let model = PollutionModel::new(setup, scenario.mining_method);
        let solver = EquilibriumSolver::new(model, defense, settings);
        positive(
            format!(
                "{} damage against {}",
                solver.defense().ammo.name,
                solver.defense().hostile.name
            ),
            solver.effective_damage(),
        )?;
        Ok(Self { scenario, solver })
    }

    pub fn solver(&self) -> &EquilibriumSolver {
        &self.solver
    }

    /// Pollution of smelting `quantity` of the base resource
    pub fn base_pollution(&self, quantity: f64) -> Result<f64> {
        self.solver
            .model()
            .smelting_pollution(&self.solver.defense().base_recipe, quantity)
    }

    /// Extra base resource needed to defend the production of `quantity`
    pub fn equilibrium_overhead(&self, quantity: f64) -> Result<OverheadReport> {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(CalcError::InvalidQuantity(quantity));
        }
        let base_pollution = self.base_pollution(quantity)?;
        tracing::debug!(quantity, base_pollution, "smelted base resource");
        let equilibrium = self.solver.solve(base_pollution)?;
        let percent = if quantity > 0.0 {
            equilibrium.total_resource / quantity * 100.0
        } else {
            0.0
        };
        Ok(OverheadReport {
            scenario: self.scenario,
            resource: self.solver.defense().base_recipe.result.name.clone(),
            hostile: self.solver.defense().hostile.name.clone(),
            ammo: self.solver.defense().ammo.name.clone(),
            quantity,
            base_pollution,
            effective_damage: self.solver.effective_damage(),
            equilibrium,
            percent,
        })
    }
}

/// Result of one overhead calculation
#[derive(Debug, Clone)]
pub struct OverheadReport {
    pub scenario: Scenario,
    pub resource: String,
    pub hostile: String,
    pub ammo: String,
    pub quantity: f64,
    pub base_pollution: f64,
    pub effective_damage: f64,
    pub equilibrium: Equilibrium,
    pub percent: f64,
}

impl OverheadReport {
    pub fn overhead(&self) -> f64 {
        self.equilibrium.total_resource
    }
}

/// Format the solver's generations as a table
pub fn format_generations(equilibrium: &Equilibrium) -> String {
    let mut output = format!(
        "{:>4} {:>14} {:>12} {:>12} {:>14}\n",
        "gen", "pollution", "spawned", "reloads", "resource"
    );
    for (index, generation) in equilibrium.generations.iter().enumerate() {
        output.push_str(&format!(
            "{:>4} {:>14.4} {:>12.4} {:>12.4} {:>14.4}\n",
            index, generation.pollution, generation.spawned, generation.reloads, generation.resource
        ));
    }
    output
}

impl std::fmt::Display for OverheadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Defense Overhead ===")?;
        writeln!(f, "Target: {:.1} {}", self.quantity, self.resource)?;
        writeln!(
            f,
            "Mining: {}, attackers: {}, ammo: {}",
            self.scenario.mining_method.as_str(),
            self.hostile,
            self.ammo
        )?;
        writeln!(f)?;
        writeln!(f, "Base pollution:   {:.3}", self.base_pollution)?;
        writeln!(f, "Damage per shot:  {:.3}", self.effective_damage)?;
        writeln!(f, "Generations:      {}", self.equilibrium.generations.len())?;
        writeln!(f, "Extra {}: {:.3}", self.resource, self.overhead())?;
        writeln!(f, "Overhead:         {:.2}%", self.percent)?;
        Ok(())
    }
}
