//! Database schema and operations

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::models::{
    AmmoSpec, DomainData, EnergySource, FuelSpec, HostileSpec, Ingredient, MachineKind,
    MachineSpec, RecipeSpec, Resistance,
};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS recipes (
            name TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            crafting_time_s REAL NOT NULL,
            result_name TEXT NOT NULL,
            result_amount REAL NOT NULL
        );

        -- Ordered ingredient list per recipe
        CREATE TABLE IF NOT EXISTS recipe_ingredients (
            recipe_name TEXT NOT NULL,
            position INTEGER NOT NULL,
            item TEXT NOT NULL,
            amount REAL NOT NULL,
            PRIMARY KEY (recipe_name, position)
        );

        -- Drills, furnaces, assemblers, boilers and generators share one table;
        -- columns a kind doesn't use stay NULL
        CREATE TABLE IF NOT EXISTS machines (
            name TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            speed REAL,
            energy_usage_watts REAL,
            emissions_per_minute REAL NOT NULL DEFAULT 0,
            energy_source TEXT,
            steam_per_water REAL,
            water_per_second REAL,
            max_output_watts REAL,
            steam_per_second REAL
        );

        CREATE TABLE IF NOT EXISTS fuels (
            name TEXT PRIMARY KEY,
            fuel_value_joules REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS hostiles (
            name TEXT PRIMARY KEY,
            max_health REAL NOT NULL,
            pollution_to_join_attack REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS resistances (
            hostile_name TEXT NOT NULL,
            damage_type TEXT NOT NULL,
            flat REAL NOT NULL DEFAULT 0,
            percent REAL NOT NULL DEFAULT 0,
            PRIMARY KEY (hostile_name, damage_type)
        );

        CREATE TABLE IF NOT EXISTS ammo (
            name TEXT PRIMARY KEY,
            damage REAL NOT NULL,
            damage_type TEXT NOT NULL,
            magazine_size REAL NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_recipes_result ON recipes(result_name);
        "#,
    )?;
    Ok(())
}

/// Insert or replace a recipe together with its ingredients
pub fn upsert_recipe(conn: &Connection, recipe: &RecipeSpec) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO recipes (name, category, crafting_time_s, result_name, result_amount)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            &recipe.name,
            &recipe.category,
            recipe.crafting_time_s,
            &recipe.result.name,
            recipe.result.amount,
        ),
    )?;
    conn.execute(
        "DELETE FROM recipe_ingredients WHERE recipe_name = ?1",
        [&recipe.name],
    )?;
    for (position, ingredient) in recipe.ingredients.iter().enumerate() {
        conn.execute(
            "INSERT INTO recipe_ingredients (recipe_name, position, item, amount)
             VALUES (?1, ?2, ?3, ?4)",
            (&recipe.name, position as i64, &ingredient.name, ingredient.amount),
        )?;
    }
    Ok(())
}

/// Insert or replace a machine
pub fn upsert_machine(conn: &Connection, machine: &MachineSpec) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO machines (name, kind, speed, energy_usage_watts, emissions_per_minute,
             energy_source, steam_per_water, water_per_second, max_output_watts, steam_per_second)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        (
            &machine.name,
            machine.kind.as_str(),
            machine.speed,
            machine.energy_usage_watts,
            machine.emissions_per_minute,
            machine.energy_source.map(|s| s.as_str()),
            machine.steam_per_water,
            machine.water_per_second,
            machine.max_output_watts,
            machine.steam_per_second,
        ),
    )?;
    Ok(())
}

pub fn upsert_fuel(conn: &Connection, fuel: &FuelSpec) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO fuels (name, fuel_value_joules) VALUES (?1, ?2)",
        (&fuel.name, fuel.fuel_value_joules),
    )?;
    Ok(())
}

/// Insert or replace a hostile together with its resistances
pub fn upsert_hostile(conn: &Connection, hostile: &HostileSpec) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO hostiles (name, max_health, pollution_to_join_attack)
         VALUES (?1, ?2, ?3)",
        (&hostile.name, hostile.max_health, hostile.pollution_to_join_attack),
    )?;
    conn.execute(
        "DELETE FROM resistances WHERE hostile_name = ?1",
        [&hostile.name],
    )?;
    for resistance in &hostile.resistances {
        conn.execute(
            "INSERT OR REPLACE INTO resistances (hostile_name, damage_type, flat, percent)
             VALUES (?1, ?2, ?3, ?4)",
            (
                &hostile.name,
                &resistance.damage_type,
                resistance.flat,
                resistance.percent,
            ),
        )?;
    }
    Ok(())
}

pub fn upsert_ammo(conn: &Connection, ammo: &AmmoSpec) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO ammo (name, damage, damage_type, magazine_size)
         VALUES (?1, ?2, ?3, ?4)",
        (&ammo.name, ammo.damage, &ammo.damage_type, ammo.magazine_size),
    )?;
    Ok(())
}

/// Write every table of `data`
pub fn store_domain_data(conn: &Connection, data: &DomainData) -> Result<()> {
    for recipe in data.recipes.values() {
        upsert_recipe(conn, recipe)?;
    }
    for machine in data.machines.values() {
        upsert_machine(conn, machine)?;
    }
    for fuel in data.fuels.values() {
        upsert_fuel(conn, fuel)?;
    }
    for hostile in data.hostiles.values() {
        upsert_hostile(conn, hostile)?;
    }
    for ammo in data.ammo.values() {
        upsert_ammo(conn, ammo)?;
    }
    Ok(())
}

/// Clear all prototype data (for re-extraction)
pub fn clear_domain_data(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_ingredients;
        DELETE FROM recipes;
        DELETE FROM machines;
        DELETE FROM fuels;
        DELETE FROM resistances;
        DELETE FROM hostiles;
        DELETE FROM ammo;
        "#,
    )?;
    Ok(())
}

fn load_recipes(conn: &Connection) -> Result<Vec<RecipeSpec>> {
    let mut stmt = conn.prepare(
        "SELECT name, category, crafting_time_s, result_name, result_amount FROM recipes ORDER BY name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(RecipeSpec {
            name: row.get(0)?,
            category: row.get(1)?,
            crafting_time_s: row.get(2)?,
            result: Ingredient {
                name: row.get(3)?,
                amount: row.get(4)?,
            },
            ingredients: Vec::new(),
        })
    })?;
    let mut recipes = Vec::new();
    for row in rows {
        recipes.push(row?);
    }

    let mut stmt = conn.prepare(
        "SELECT item, amount FROM recipe_ingredients WHERE recipe_name = ?1 ORDER BY position",
    )?;
    for recipe in &mut recipes {
        let rows = stmt.query_map([&recipe.name], |row| {
            Ok(Ingredient {
                name: row.get(0)?,
                amount: row.get(1)?,
            })
        })?;
        for row in rows {
            recipe.ingredients.push(row?);
        }
    }
    Ok(recipes)
}

/// List all machines in the database
pub fn list_machines(conn: &Connection) -> Result<Vec<MachineSpec>> {
    let mut stmt = conn.prepare(
        "SELECT name, kind, speed, energy_usage_watts, emissions_per_minute, energy_source,
                steam_per_water, water_per_second, max_output_watts, steam_per_second
         FROM machines ORDER BY kind, name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<f64>>(2)?,
            row.get::<_, Option<f64>>(3)?,
            row.get::<_, f64>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<f64>>(6)?,
            row.get::<_, Option<f64>>(7)?,
            row.get::<_, Option<f64>>(8)?,
            row.get::<_, Option<f64>>(9)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (name, kind, speed, energy, emissions, source, steam_per_water, water, output, steam) =
            row?;
        let kind = kind
            .parse::<MachineKind>()
            .with_context(|| format!("machine {name:?}"))?;
        let energy_source = source
            .map(|s| s.parse::<EnergySource>())
            .transpose()
            .with_context(|| format!("machine {name:?}"))?;
        results.push(MachineSpec {
            name,
            kind,
            speed,
            energy_usage_watts: energy,
            emissions_per_minute: emissions,
            energy_source,
            steam_per_water,
            water_per_second: water,
            max_output_watts: output,
            steam_per_second: steam,
        });
    }
    Ok(results)
}

fn load_fuels(conn: &Connection) -> Result<Vec<FuelSpec>> {
    let mut stmt = conn.prepare("SELECT name, fuel_value_joules FROM fuels ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(FuelSpec {
            name: row.get(0)?,
            fuel_value_joules: row.get(1)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// List all hostiles in the database, weakest first
pub fn list_hostiles(conn: &Connection) -> Result<Vec<HostileSpec>> {
    let mut stmt = conn.prepare(
        "SELECT name, max_health, pollution_to_join_attack FROM hostiles ORDER BY max_health, name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(HostileSpec {
            name: row.get(0)?,
            max_health: row.get(1)?,
            pollution_to_join_attack: row.get(2)?,
            resistances: Vec::new(),
        })
    })?;
    let mut hostiles = Vec::new();
    for row in rows {
        hostiles.push(row?);
    }

    let mut stmt = conn.prepare(
        "SELECT damage_type, flat, percent FROM resistances WHERE hostile_name = ?1 ORDER BY damage_type",
    )?;
    for hostile in &mut hostiles {
        let rows = stmt.query_map([&hostile.name], |row| {
            Ok(Resistance {
                damage_type: row.get(0)?,
                flat: row.get(1)?,
                percent: row.get(2)?,
            })
        })?;
        for row in rows {
            hostile.resistances.push(row?);
        }
    }
    Ok(hostiles)
}

fn load_ammo(conn: &Connection) -> Result<Vec<AmmoSpec>> {
    let mut stmt =
        conn.prepare("SELECT name, damage, damage_type, magazine_size FROM ammo ORDER BY name")?;
    let rows = stmt.query_map([], |row| {
        Ok(AmmoSpec {
            name: row.get(0)?,
            damage: row.get(1)?,
            damage_type: row.get(2)?,
            magazine_size: row.get(3)?,
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Load every table into memory
pub fn load_domain_data(conn: &Connection) -> Result<DomainData> {
    let mut data = DomainData::default();
    for recipe in load_recipes(conn)? {
        data.add_recipe(recipe);
    }
    for machine in list_machines(conn)? {
        data.add_machine(machine);
    }
    for fuel in load_fuels(conn)? {
        data.add_fuel(fuel);
    }
    for hostile in list_hostiles(conn)? {
        data.add_hostile(hostile);
    }
    for ammo in load_ammo(conn)? {
        data.add_ammo(ammo);
    }
    tracing::debug!(
        recipes = data.recipes.len(),
        machines = data.machines.len(),
        fuels = data.fuels.len(),
        hostiles = data.hostiles.len(),
        ammo = data.ammo.len(),
        "loaded prototype tables"
    );
    Ok(data)
}
