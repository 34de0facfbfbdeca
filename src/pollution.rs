//! Pollution accounting per production stage
//!
//! Each function turns a quantity of output (or joules of energy) into the
//! pollution emitted producing it: the stage's own emissions over its
//! operating time plus the pollution of the fuel or electricity it burned.
//! Fuel is itself mined, so fuel pollution feeds back into the mining
//! functions. All of these recurse until the quantity drops under [`EPSILON`];
//! a fuel chain that keeps going past [`MAX_FUEL_DEPTH`] is an error.

use clap::ValueEnum;

use crate::error::{CalcError, Result};
use crate::models::{EnergySource, RecipeSpec};

/// Quantities below this are treated as zero, which ends every recursion
pub const EPSILON: f64 = 1e-5;

/// Longest fuel -> mining -> fuel chain followed before giving up
pub const MAX_FUEL_DEPTH: usize = 500;

/// How fuel (and any other mined resource) is mined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MiningMethod {
    #[default]
    Burner,
    Electric,
}

impl MiningMethod {
    pub const ALL: [MiningMethod; 2] = [Self::Burner, Self::Electric];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Burner => "burner",
            Self::Electric => "electric",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drill {
    pub mining_speed: f64,
    pub power_watts: f64,
    pub pollution_per_second: f64,
}

/// A furnace or assembling machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crafter {
    pub crafting_speed: f64,
    pub power_watts: f64,
    pub pollution_per_second: f64,
    pub energy_source: EnergySource,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boiler {
    pub power_watts: f64,
    pub pollution_per_second: f64,
    pub steam_per_water: f64,
    pub water_per_second: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteamEngine {
    pub max_output_watts: f64,
    pub steam_per_second: f64,
}

/// The machines and fuel every stage runs on. All divisors are positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Setup {
    pub burner_drill: Drill,
    pub electric_drill: Drill,
    pub furnace: Crafter,
    pub assembler: Crafter,
    pub boiler: Boiler,
    pub engine: SteamEngine,
    pub fuel_value_joules: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct PollutionModel {
    setup: Setup,
    mining: MiningMethod,
}

impl PollutionModel {
    pub fn new(setup: Setup, mining: MiningMethod) -> Self {
        Self { setup, mining }
    }

    /// Pollution of mining `amount` units with the configured mining method
    pub fn mining_pollution(&self, amount: f64) -> Result<f64> {
        self.mining_at(amount, 0)
    }

    pub fn burner_mining_pollution(&self, amount: f64) -> Result<f64> {
        self.burner_mining_at(amount, 0)
    }

    pub fn electric_mining_pollution(&self, amount: f64) -> Result<f64> {
        self.electric_mining_at(amount, 0)
    }

    /// Pollution of generating `joules` of electricity with boilers and steam engines
    pub fn electricity_pollution(&self, joules: f64) -> Result<f64> {
        self.electricity_at(joules, 0)
    }

    /// Pollution of mining the fuel that releases `joules` when burned
    pub fn fuel_pollution(&self, joules: f64) -> Result<f64> {
        self.fuel_at(joules, 0)
    }

    pub fn smelting_pollution(&self, recipe: &RecipeSpec, items: f64) -> Result<f64> {
        if items < EPSILON {
            return Ok(0.0);
        }
        let furnace = &self.setup.furnace;
        let time = items / furnace.crafting_speed * recipe.crafting_time_s;
        Ok(self.energy_pollution(furnace.energy_source, time * furnace.power_watts)?
            + time * furnace.pollution_per_second)
    }

    /// Pollution of the assembling step alone, not of producing its ingredients
    pub fn assembling_pollution(&self, recipe: &RecipeSpec, items: f64) -> Result<f64> {
        if items < EPSILON {
            return Ok(0.0);
        }
        let assembler = &self.setup.assembler;
        let time = recipe.crafting_time_s * items / assembler.crafting_speed;
        Ok(time * assembler.pollution_per_second
            + self.energy_pollution(assembler.energy_source, time * assembler.power_watts)?)
    }

    fn energy_pollution(&self, source: EnergySource, joules: f64) -> Result<f64> {
        match source {
            EnergySource::Burner => self.fuel_pollution(joules),
            EnergySource::Electric => self.electricity_pollution(joules),
        }
    }

    fn mining_at(&self, amount: f64, depth: usize) -> Result<f64> {
        match self.mining {
            MiningMethod::Burner => self.burner_mining_at(amount, depth),
            MiningMethod::Electric => self.electric_mining_at(amount, depth),
        }
    }

    fn burner_mining_at(&self, amount: f64, depth: usize) -> Result<f64> {
        if amount < EPSILON {
            return Ok(0.0);
        }
        let drill = &self.setup.burner_drill;
        let time = amount / drill.mining_speed;
        Ok(time * drill.pollution_per_second + self.fuel_at(time * drill.power_watts, depth)?)
    }

    fn electric_mining_at(&self, amount: f64, depth: usize) -> Result<f64> {
        if amount < EPSILON {
            return Ok(0.0);
        }
        let drill = &self.setup.electric_drill;
        let time = amount / drill.mining_speed;
        Ok(time * drill.pollution_per_second
            + self.electricity_at(time * drill.power_watts, depth)?)
    }

    fn electricity_at(&self, joules: f64, depth: usize) -> Result<f64> {
        if joules < EPSILON {
            return Ok(0.0);
        }
        let engine = &self.setup.engine;
        let boiler = &self.setup.boiler;

        let engine_time = joules / engine.max_output_watts;
        let steam = engine_time * engine.steam_per_second;
        let water = steam / boiler.steam_per_water;
        let boiler_time = water / boiler.water_per_second;

        Ok(boiler_time * boiler.pollution_per_second
            + self.fuel_at(boiler_time * boiler.power_watts, depth)?)
    }

    /// Every pass through here mines more fuel, so this is where the chain is cut
    fn fuel_at(&self, joules: f64, depth: usize) -> Result<f64> {
        if joules < EPSILON {
            return Ok(0.0);
        }
        if depth >= MAX_FUEL_DEPTH {
            return Err(CalcError::DidNotConverge { generations: depth });
        }
        self.mining_at(joules / self.setup.fuel_value_joules, depth + 1)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Ingredient;

    pub(crate) fn vanilla_setup() -> Setup {
        Setup {
            burner_drill: Drill {
                mining_speed: 0.25,
                power_watts: 150_000.0,
                pollution_per_second: 12.0 / 60.0,
            },
            electric_drill: Drill {
                mining_speed: 0.5,
                power_watts: 90_000.0,
                pollution_per_second: 10.0 / 60.0,
            },
            furnace: Crafter {
                crafting_speed: 1.0,
                power_watts: 90_000.0,
                pollution_per_second: 2.0 / 60.0,
                energy_source: EnergySource::Burner,
            },
            assembler: Crafter {
                crafting_speed: 0.5,
                power_watts: 75_000.0,
                pollution_per_second: 4.0 / 60.0,
                energy_source: EnergySource::Electric,
            },
            boiler: Boiler {
                power_watts: 1_800_000.0,
                pollution_per_second: 30.0 / 60.0,
                steam_per_water: 1.0,
                water_per_second: 60.0,
            },
            engine: SteamEngine {
                max_output_watts: 900_000.0,
                steam_per_second: 30.0,
            },
            fuel_value_joules: 4_000_000.0,
        }
    }

    fn iron_plate() -> RecipeSpec {
        RecipeSpec {
            name: "iron-plate".into(),
            category: "smelting".into(),
            ingredients: vec![Ingredient::new("iron-ore", 1.0)],
            result: Ingredient::new("iron-plate", 1.0),
            crafting_time_s: 3.2,
        }
    }

    fn firearm_magazine() -> RecipeSpec {
        RecipeSpec {
            name: "firearm-magazine".into(),
            category: "crafting".into(),
            ingredients: vec![Ingredient::new("iron-plate", 4.0)],
            result: Ingredient::new("firearm-magazine", 1.0),
            crafting_time_s: 1.0,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_burner_mining_includes_its_own_coal() {
        let model = PollutionModel::new(vanilla_setup(), MiningMethod::Burner);
        // 0.8 pollution per coal, plus 0.15 coal burned per coal mined
        assert_close(model.burner_mining_pollution(100.0).unwrap(), 80.0 / 0.85);
    }

    #[test]
    fn test_electric_mining_fuel_feeds_back_into_electric_mining() {
        let model = PollutionModel::new(vanilla_setup(), MiningMethod::Electric);
        // a/3 drill pollution + 0.05a boiler pollution, 0.045a coal re-mined
        assert_close(
            model.electric_mining_pollution(100.0).unwrap(),
            100.0 * (1.0 / 3.0 + 0.05) / 0.955,
        );
    }

    #[test]
    fn test_electricity_goes_through_boiler() {
        let model = PollutionModel::new(vanilla_setup(), MiningMethod::Burner);
        let joules = 3_600_000.0;
        let boiler_part = 1.0;
        let coal = joules / 4_000_000.0;
        assert_close(
            model.electricity_pollution(joules).unwrap(),
            boiler_part + model.burner_mining_pollution(coal).unwrap(),
        );
    }

    #[test]
    fn test_smelting_thousand_plates() {
        let model = PollutionModel::new(vanilla_setup(), MiningMethod::Burner);
        let furnace_own = 3200.0 * 2.0 / 60.0;
        let coal = 3200.0 * 90_000.0 / 4_000_000.0;
        assert_close(
            model.smelting_pollution(&iron_plate(), 1000.0).unwrap(),
            furnace_own + coal * 0.8 / 0.85,
        );
    }

    #[test]
    fn test_assembling_magazines() {
        let model = PollutionModel::new(vanilla_setup(), MiningMethod::Burner);
        // 20s of assembler time, 1.5MJ of electricity
        let expected = 20.0 * 4.0 / 60.0 + 1.5 / 3.6 + 0.375 * 0.8 / 0.85;
        assert_close(
            model.assembling_pollution(&firearm_magazine(), 10.0).unwrap(),
            expected,
        );
    }

    #[test]
    fn test_zero_and_sub_epsilon_inputs_are_exactly_zero() {
        for mining in MiningMethod::ALL {
            let model = PollutionModel::new(vanilla_setup(), mining);
            for quantity in [0.0, EPSILON / 2.0, 9e-6] {
                assert_eq!(model.burner_mining_pollution(quantity).unwrap(), 0.0);
                assert_eq!(model.electric_mining_pollution(quantity).unwrap(), 0.0);
                assert_eq!(model.electricity_pollution(quantity).unwrap(), 0.0);
                assert_eq!(model.fuel_pollution(quantity).unwrap(), 0.0);
                assert_eq!(model.smelting_pollution(&iron_plate(), quantity).unwrap(), 0.0);
                assert_eq!(
                    model
                        .assembling_pollution(&firearm_magazine(), quantity)
                        .unwrap(),
                    0.0
                );
            }
        }
    }

    #[test]
    fn test_electric_furnace_draws_from_grid() {
        let mut setup = vanilla_setup();
        setup.furnace = Crafter {
            crafting_speed: 2.0,
            power_watts: 180_000.0,
            pollution_per_second: 1.0 / 60.0,
            energy_source: EnergySource::Electric,
        };
        let model = PollutionModel::new(setup, MiningMethod::Burner);
        let time = 100.0 / 2.0 * 3.2;
        assert_close(
            model.smelting_pollution(&iron_plate(), 100.0).unwrap(),
            time / 60.0 + model.electricity_pollution(time * 180_000.0).unwrap(),
        );
    }

    #[test]
    fn test_repeated_calls_are_bit_identical() {
        let model = PollutionModel::new(vanilla_setup(), MiningMethod::Electric);
        let a = model.smelting_pollution(&iron_plate(), 1234.5).unwrap();
        let b = model.smelting_pollution(&iron_plate(), 1234.5).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_fuel_worth_less_than_its_mining_is_an_error() {
        let mut setup = vanilla_setup();
        // a burner drill burns 600kJ per unit mined
        setup.fuel_value_joules = 500_000.0;
        let model = PollutionModel::new(setup, MiningMethod::Burner);
        assert_eq!(
            model.burner_mining_pollution(100.0),
            Err(CalcError::DidNotConverge {
                generations: MAX_FUEL_DEPTH
            })
        );
        assert!(model.smelting_pollution(&iron_plate(), 1000.0).is_err());
    }

    #[test]
    fn test_non_finite_input_is_an_error() {
        for mining in MiningMethod::ALL {
            let model = PollutionModel::new(vanilla_setup(), mining);
            assert!(model.mining_pollution(f64::INFINITY).is_err());
            assert!(model.fuel_pollution(f64::NAN).is_err());
            assert!(model.smelting_pollution(&iron_plate(), f64::INFINITY).is_err());
        }
    }
}
