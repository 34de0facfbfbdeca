//! Vanilla prototype values, for running without a game data dump

use crate::models::{
    AmmoSpec, DomainData, EnergySource, FuelSpec, HostileSpec, Ingredient, MachineKind,
    MachineSpec, RecipeSpec, Resistance,
};

fn recipe(name: &str, category: &str, ingredients: &[(&str, f64)], time: f64) -> RecipeSpec {
    RecipeSpec {
        name: name.to_string(),
        category: category.to_string(),
        ingredients: ingredients
            .iter()
            .map(|&(item, amount)| Ingredient::new(item, amount))
            .collect(),
        result: Ingredient::new(name, 1.0),
        crafting_time_s: time,
    }
}

fn crafter(
    name: &str,
    kind: MachineKind,
    speed: f64,
    watts: f64,
    emissions: f64,
    source: EnergySource,
) -> MachineSpec {
    MachineSpec {
        speed: Some(speed),
        energy_usage_watts: Some(watts),
        emissions_per_minute: emissions,
        energy_source: Some(source),
        ..MachineSpec::new(name, kind)
    }
}

fn biter(name: &str, health: f64, pollution: f64, resistances: &[(&str, f64, f64)]) -> HostileSpec {
    HostileSpec {
        name: name.to_string(),
        max_health: health,
        pollution_to_join_attack: pollution,
        resistances: resistances
            .iter()
            .map(|&(damage_type, flat, percent)| Resistance {
                damage_type: damage_type.to_string(),
                flat,
                percent,
            })
            .collect(),
    }
}

/// The base game's machines, fuels, biters and starter ammo
pub fn reference_data() -> DomainData {
    let mut data = DomainData::default();

    data.add_recipe(recipe("iron-plate", "smelting", &[("iron-ore", 1.0)], 3.2));
    data.add_recipe(recipe("copper-plate", "smelting", &[("copper-ore", 1.0)], 3.2));
    data.add_recipe(recipe("stone-brick", "smelting", &[("stone", 2.0)], 3.2));
    data.add_recipe(recipe("steel-plate", "smelting", &[("iron-plate", 5.0)], 16.0));
    data.add_recipe(recipe("firearm-magazine", "crafting", &[("iron-plate", 4.0)], 1.0));

    use EnergySource::{Burner, Electric};
    use MachineKind::*;
    data.add_machine(crafter("burner-mining-drill", MiningDrill, 0.25, 150_000.0, 12.0, Burner));
    data.add_machine(crafter("electric-mining-drill", MiningDrill, 0.5, 90_000.0, 10.0, Electric));
    data.add_machine(crafter("stone-furnace", Furnace, 1.0, 90_000.0, 2.0, Burner));
    data.add_machine(crafter("steel-furnace", Furnace, 2.0, 90_000.0, 4.0, Burner));
    data.add_machine(crafter("electric-furnace", Furnace, 2.0, 180_000.0, 1.0, Electric));
    data.add_machine(crafter("assembling-machine-1", AssemblingMachine, 0.5, 75_000.0, 4.0, Electric));
    data.add_machine(crafter("assembling-machine-2", AssemblingMachine, 0.75, 150_000.0, 3.0, Electric));
    data.add_machine(MachineSpec {
        energy_usage_watts: Some(1_800_000.0),
        emissions_per_minute: 30.0,
        energy_source: Some(Burner),
        steam_per_water: Some(1.0),
        water_per_second: Some(60.0),
        ..MachineSpec::new("boiler", Boiler)
    });
    data.add_machine(MachineSpec {
        max_output_watts: Some(900_000.0),
        steam_per_second: Some(30.0),
        ..MachineSpec::new("steam-engine", Generator)
    });

    for (name, joules) in [("wood", 2e6), ("coal", 4e6), ("solid-fuel", 12e6)] {
        data.add_fuel(FuelSpec {
            name: name.to_string(),
            fuel_value_joules: joules,
        });
    }

    data.add_hostile(biter("small-biter", 15.0, 4.0, &[]));
    data.add_hostile(biter(
        "medium-biter",
        75.0,
        20.0,
        &[("physical", 4.0, 0.1), ("explosion", 0.0, 0.1)],
    ));
    data.add_hostile(biter(
        "big-biter",
        375.0,
        80.0,
        &[("physical", 8.0, 0.1), ("explosion", 0.0, 0.1)],
    ));
    data.add_hostile(biter(
        "behemoth-biter",
        3000.0,
        400.0,
        &[("physical", 12.0, 0.1), ("explosion", 0.0, 0.2)],
    ));

    data.add_ammo(AmmoSpec {
        name: "firearm-magazine".to_string(),
        damage: 5.0,
        damage_type: "physical".to_string(),
        magazine_size: 10.0,
    });

    data
}
