//! Data models for Factorio prototypes used by the pollution calculator

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};

#[derive(Debug, Clone, PartialEq)]
pub struct Ingredient {
    pub name: String,
    pub amount: f64,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeSpec {
    pub name: String,
    pub category: String,
    pub ingredients: Vec<Ingredient>,
    pub result: Ingredient,
    pub crafting_time_s: f64,
}

impl RecipeSpec {
    /// Amount of `ingredient` consumed per unit of result
    pub fn ingredient_per_result(&self, ingredient: &str) -> Option<f64> {
        self.ingredients
            .iter()
            .find(|i| i.name == ingredient)
            .map(|i| i.amount / self.result.amount)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineKind {
    MiningDrill,
    Furnace,
    AssemblingMachine,
    Boiler,
    Generator,
}

impl MachineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MiningDrill => "mining-drill",
            Self::Furnace => "furnace",
            Self::AssemblingMachine => "assembling-machine",
            Self::Boiler => "boiler",
            Self::Generator => "generator",
        }
    }
}

impl fmt::Display for MachineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mining-drill" => Ok(Self::MiningDrill),
            "furnace" => Ok(Self::Furnace),
            "assembling-machine" => Ok(Self::AssemblingMachine),
            "boiler" => Ok(Self::Boiler),
            "generator" => Ok(Self::Generator),
            other => Err(anyhow!("unknown machine kind {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergySource {
    Burner,
    Electric,
}

impl EnergySource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Burner => "burner",
            Self::Electric => "electric",
        }
    }
}

impl fmt::Display for EnergySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnergySource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "burner" => Ok(Self::Burner),
            "electric" => Ok(Self::Electric),
            other => Err(anyhow!("unsupported energy source {other:?}")),
        }
    }
}

/// A machine prototype. Which optional fields are present depends on `kind`.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineSpec {
    pub name: String,
    pub kind: MachineKind,
    pub speed: Option<f64>, // crafting_speed or mining_speed
    pub energy_usage_watts: Option<f64>,
    pub emissions_per_minute: f64,
    pub energy_source: Option<EnergySource>,
    pub steam_per_water: Option<f64>,
    pub water_per_second: Option<f64>,
    pub max_output_watts: Option<f64>,
    pub steam_per_second: Option<f64>,
}

impl MachineSpec {
    /// Empty spec of the given kind, fields filled in by the caller
    pub fn new(name: impl Into<String>, kind: MachineKind) -> Self {
        Self {
            name: name.into(),
            kind,
            speed: None,
            energy_usage_watts: None,
            emissions_per_minute: 0.0,
            energy_source: None,
            steam_per_water: None,
            water_per_second: None,
            max_output_watts: None,
            steam_per_second: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuelSpec {
    pub name: String,
    pub fuel_value_joules: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resistance {
    pub damage_type: String,
    pub flat: f64,
    pub percent: f64, // fraction, 0.1 = 10%
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostileSpec {
    pub name: String,
    pub max_health: f64,
    pub pollution_to_join_attack: f64,
    pub resistances: Vec<Resistance>,
}

impl HostileSpec {
    pub fn resistance_to(&self, damage_type: &str) -> Option<&Resistance> {
        self.resistances.iter().find(|r| r.damage_type == damage_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmmoSpec {
    pub name: String,
    pub damage: f64,
    pub damage_type: String,
    pub magazine_size: f64,
}

/// All prototype tables, keyed by name. Loaded whole, never mutated during a calculation.
#[derive(Debug, Clone, Default)]
pub struct DomainData {
    pub recipes: HashMap<String, RecipeSpec>,
    pub machines: HashMap<String, MachineSpec>,
    pub fuels: HashMap<String, FuelSpec>,
    pub hostiles: HashMap<String, HostileSpec>,
    pub ammo: HashMap<String, AmmoSpec>,
}

impl DomainData {
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
            && self.machines.is_empty()
            && self.fuels.is_empty()
            && self.hostiles.is_empty()
            && self.ammo.is_empty()
    }

    pub fn add_recipe(&mut self, recipe: RecipeSpec) {
        self.recipes.insert(recipe.name.clone(), recipe);
    }

    pub fn add_machine(&mut self, machine: MachineSpec) {
        self.machines.insert(machine.name.clone(), machine);
    }

    pub fn add_fuel(&mut self, fuel: FuelSpec) {
        self.fuels.insert(fuel.name.clone(), fuel);
    }

    pub fn add_hostile(&mut self, hostile: HostileSpec) {
        self.hostiles.insert(hostile.name.clone(), hostile);
    }

    pub fn add_ammo(&mut self, ammo: AmmoSpec) {
        self.ammo.insert(ammo.name.clone(), ammo);
    }

    /// The recipe producing `item`. A recipe named after the item wins,
    /// otherwise the first match by name so the choice is stable.
    pub fn recipe_for(&self, item: &str) -> Option<&RecipeSpec> {
        if let Some(recipe) = self.recipes.get(item).filter(|r| r.result.name == item) {
            return Some(recipe);
        }
        self.recipes
            .values()
            .filter(|r| r.result.name == item)
            .min_by(|a, b| a.name.cmp(&b.name))
    }
}
