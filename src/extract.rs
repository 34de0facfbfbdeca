//! Lua prototype extraction for Factorio game data
//!
//! Parses the prototype definitions shipped with the game
//! (`data/base/prototypes/**/*.lua`) to extract the machines, recipes, fuels,
//! biters and ammo the calculator needs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::Connection;
use walkdir::WalkDir;

use crate::db;
use crate::models::{
    AmmoSpec, EnergySource, FuelSpec, HostileSpec, Ingredient, MachineKind, MachineSpec,
    RecipeSpec, Resistance,
};
use crate::units::{TICKS_PER_SECOND, WATER_DEFAULT_TEMPERATURE, WATER_HEAT_CAPACITY_J, parse_quantity};

/// One prototype recognised in a Lua file
#[derive(Debug, Clone, PartialEq)]
pub enum Prototype {
    Recipe(RecipeSpec),
    Machine(MachineSpec),
    Fuel(FuelSpec),
    Hostile(HostileSpec),
    Ammo(AmmoSpec),
}

#[derive(Debug, Default)]
pub struct ParsedFile {
    pub prototypes: Vec<Prototype>,
    pub skipped: usize,
}

/// A `{ type = "..", name = "..", ... }` table
struct Block<'a> {
    kind: &'a str,
    name: &'a str,
    body: &'a str,
}

/// Find all Lua files under the prototypes directory
pub fn find_prototype_files(prototypes_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(prototypes_dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "lua") {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Contents between the brace at `open` and its matching closing brace.
/// Braces inside string literals and `--` comments do not count.
fn balanced(content: &str, open: usize) -> Option<&str> {
    let bytes = content.as_bytes();
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&content[open + 1..i]);
                }
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                let end = if content[i + 2..].starts_with("[[") {
                    content[i..].find("]]").map(|end| end + 1)
                } else {
                    content[i..].find('\n')
                };
                i = end.map_or(bytes.len(), |end| i + end);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split a file into top-level prototype tables. Tables nested inside a
/// prototype (ingredients written as `{type = "item", name = ..}`) are part
/// of their parent's body, not prototypes of their own.
fn prototype_blocks(content: &str) -> Result<Vec<Block<'_>>> {
    let header = Regex::new(r#"\{\s*type\s*=\s*"([\w-]+)"\s*,\s*name\s*=\s*"([\w-]+)""#)?;

    let mut blocks = Vec::new();
    let mut cursor = 0;
    while let Some(cap) = header.captures_at(content, cursor) {
        let (Some(whole), Some(kind), Some(name)) = (cap.get(0), cap.get(1), cap.get(2)) else {
            break;
        };
        match balanced(content, whole.start()) {
            Some(body) => {
                blocks.push(Block {
                    kind: kind.as_str(),
                    name: name.as_str(),
                    body,
                });
                cursor = whole.start() + body.len() + 2;
            }
            None => cursor = whole.end(),
        }
    }
    Ok(blocks)
}

/// First `key = value` in `body`, with SI suffixes resolved
fn number(body: &str, key: &str) -> Result<Option<f64>> {
    let re = Regex::new(&format!(r#"\b{key}\s*=\s*"?([0-9.]+[kKMG]?[WJ]?)"?"#))?;
    match re.captures(body) {
        Some(cap) => Ok(Some(parse_quantity(&cap[1])?)),
        None => Ok(None),
    }
}

/// Contents of the `key = { ... }` table in `body`
fn table<'a>(body: &'a str, key: &str) -> Result<Option<&'a str>> {
    let re = Regex::new(&format!(r"\b{key}\s*=\s*\{{"))?;
    Ok(re.find(body).and_then(|m| balanced(body, m.end() - 1)))
}

fn string_field(body: &str, key: &str) -> Result<Option<String>> {
    let re = Regex::new(&format!(r#"\b{key}\s*=\s*"([\w-]+)""#))?;
    Ok(re.captures(body).map(|cap| cap[1].to_string()))
}

/// Pollution per minute, either a plain number or `{ pollution = n }`
fn emissions(body: &str) -> Result<f64> {
    let nested = Regex::new(r"emissions_per_minute\s*=\s*\{\s*pollution\s*=\s*([\d.]+)")?;
    if let Some(cap) = nested.captures(body) {
        return Ok(cap[1].parse()?);
    }
    Ok(number(body, "emissions_per_minute")?.unwrap_or(0.0))
}

fn energy_source(body: &str) -> Result<Option<EnergySource>> {
    let Some(source) = table(body, "energy_source")? else {
        return Ok(None);
    };
    // "heat", "void" and friends are not modelled
    Ok(string_field(source, "type")?.and_then(|kind| kind.parse().ok()))
}

/// Entries of an ingredient or result list, in both `{"name", n}` and
/// `{type = "item", name = "..", amount = n}` forms
fn item_list(list: &str) -> Result<Vec<Ingredient>> {
    let entry_re = Regex::new(r"\{([^{}]*)\}")?;
    let short_re = Regex::new(r#"^\s*"([\w-]+)"\s*,\s*([\d.]+)\s*$"#)?;

    let mut items = Vec::new();
    for entry in entry_re.captures_iter(list) {
        let fields = &entry[1];
        if let Some(cap) = short_re.captures(fields) {
            items.push(Ingredient::new(&cap[1], cap[2].parse()?));
        } else if let (Some(name), Some(amount)) =
            (string_field(fields, "name")?, number(fields, "amount")?)
        {
            items.push(Ingredient::new(name, amount));
        }
    }
    Ok(items)
}

fn parse_recipe(name: &str, body: &str) -> Result<Option<RecipeSpec>> {
    // normal/expensive variants: the first (normal) one wins
    let Some(ingredients) = table(body, "ingredients")? else {
        return Ok(None);
    };
    let ingredients = item_list(ingredients)?;

    let result = match table(body, "results")? {
        Some(results) => item_list(results)?.into_iter().next(),
        None => match string_field(body, "result")? {
            Some(result) => Some(Ingredient::new(
                result,
                number(body, "result_count")?.unwrap_or(1.0),
            )),
            None => None,
        },
    };
    let Some(result) = result else {
        return Ok(None);
    };

    Ok(Some(RecipeSpec {
        name: name.to_string(),
        category: string_field(body, "category")?.unwrap_or_else(|| "crafting".to_string()),
        ingredients,
        result,
        crafting_time_s: number(body, "energy_required")?.unwrap_or(0.5),
    }))
}

fn resistances(body: &str) -> Result<Vec<Resistance>> {
    let Some(list) = table(body, "resistances")? else {
        return Ok(Vec::new());
    };
    let entry_re = Regex::new(r"\{([^{}]*)\}")?;

    let mut results = Vec::new();
    for entry in entry_re.captures_iter(list) {
        let fields = &entry[1];
        let Some(damage_type) = string_field(fields, "type")? else {
            continue;
        };
        results.push(Resistance {
            damage_type,
            flat: number(fields, "decrease")?.unwrap_or(0.0),
            percent: number(fields, "percent")?.unwrap_or(0.0) / 100.0,
        });
    }
    Ok(results)
}

fn parse_block(block: &Block<'_>) -> Result<Option<Prototype>> {
    let body = block.body;
    let name = block.name;

    let prototype = match block.kind {
        "mining-drill" | "furnace" | "assembling-machine" => {
            let kind: MachineKind = block.kind.parse()?;
            let speed_key = if kind == MachineKind::MiningDrill {
                "mining_speed"
            } else {
                "crafting_speed"
            };
            let (Some(speed), Some(energy)) = (number(body, speed_key)?, number(body, "energy_usage")?)
            else {
                return Ok(None);
            };
            Prototype::Machine(MachineSpec {
                speed: Some(speed),
                energy_usage_watts: Some(energy),
                emissions_per_minute: emissions(body)?,
                energy_source: energy_source(body)?,
                ..MachineSpec::new(name, kind)
            })
        }

        "boiler" => {
            let (Some(energy), Some(target)) = (
                number(body, "energy_consumption")?,
                number(body, "target_temperature")?,
            ) else {
                return Ok(None);
            };
            // water goes in at 15 degrees and leaves as steam at the target temperature
            let joules_per_water = (target - WATER_DEFAULT_TEMPERATURE) * WATER_HEAT_CAPACITY_J;
            Prototype::Machine(MachineSpec {
                energy_usage_watts: Some(energy),
                emissions_per_minute: emissions(body)?,
                energy_source: energy_source(body)?,
                steam_per_water: Some(1.0),
                water_per_second: Some(energy / joules_per_water),
                ..MachineSpec::new(name, MachineKind::Boiler)
            })
        }

        "generator" => {
            let (Some(usage), Some(max_temperature)) = (
                number(body, "fluid_usage_per_tick")?,
                number(body, "maximum_temperature")?,
            ) else {
                return Ok(None);
            };
            let effectivity = number(body, "effectivity")?.unwrap_or(1.0);
            let steam_per_second = usage * TICKS_PER_SECOND;
            Prototype::Machine(MachineSpec {
                max_output_watts: Some(
                    (max_temperature - WATER_DEFAULT_TEMPERATURE)
                        * steam_per_second
                        * WATER_HEAT_CAPACITY_J
                        * effectivity,
                ),
                steam_per_second: Some(steam_per_second),
                emissions_per_minute: emissions(body)?,
                ..MachineSpec::new(name, MachineKind::Generator)
            })
        }

        "item" => {
            let Some(value) = number(body, "fuel_value")? else {
                return Ok(None);
            };
            Prototype::Fuel(FuelSpec {
                name: name.to_string(),
                fuel_value_joules: value,
            })
        }

        "ammo" => {
            let damage_re = Regex::new(
                r#"damage\s*=\s*\{\s*amount\s*=\s*([\d.]+)\s*,\s*type\s*=\s*"([\w-]+)""#,
            )?;
            let Some(cap) = damage_re.captures(body) else {
                return Ok(None);
            };
            Prototype::Ammo(AmmoSpec {
                name: name.to_string(),
                damage: cap[1].parse()?,
                damage_type: cap[2].to_string(),
                magazine_size: number(body, "magazine_size")?.unwrap_or(1.0),
            })
        }

        "unit" => {
            let absorption_re =
                Regex::new(r"absorptions_to_join_attack\s*=\s*\{\s*pollution\s*=\s*([\d.]+)")?;
            let threshold = match absorption_re.captures(body) {
                Some(cap) => Some(cap[1].parse()?),
                None => number(body, "pollution_to_join_attack")?,
            };
            let (Some(health), Some(threshold)) = (number(body, "max_health")?, threshold) else {
                return Ok(None);
            };
            Prototype::Hostile(HostileSpec {
                name: name.to_string(),
                max_health: health,
                pollution_to_join_attack: threshold,
                resistances: resistances(body)?,
            })
        }

        "recipe" => match parse_recipe(name, body)? {
            Some(recipe) => Prototype::Recipe(recipe),
            None => return Ok(None),
        },

        _ => return Ok(None),
    };
    Ok(Some(prototype))
}

/// Parse every prototype we know how to use out of a Lua file's contents
pub fn parse_prototypes(content: &str) -> Result<ParsedFile> {
    let mut parsed = ParsedFile::default();
    for block in prototype_blocks(content)? {
        match parse_block(&block).with_context(|| format!("{} {:?}", block.kind, block.name))? {
            Some(prototype) => parsed.prototypes.push(prototype),
            None => {
                tracing::trace!(kind = block.kind, name = block.name, "skipped prototype");
                parsed.skipped += 1;
            }
        }
    }
    Ok(parsed)
}

fn store(conn: &Connection, prototype: &Prototype, stats: &mut ExtractStats) -> Result<()> {
    match prototype {
        Prototype::Recipe(recipe) => {
            db::upsert_recipe(conn, recipe)?;
            stats.recipes += 1;
        }
        Prototype::Machine(machine) => {
            db::upsert_machine(conn, machine)?;
            stats.machines += 1;
        }
        Prototype::Fuel(fuel) => {
            db::upsert_fuel(conn, fuel)?;
            stats.fuels += 1;
        }
        Prototype::Hostile(hostile) => {
            db::upsert_hostile(conn, hostile)?;
            stats.hostiles += 1;
        }
        Prototype::Ammo(ammo) => {
            db::upsert_ammo(conn, ammo)?;
            stats.ammo += 1;
        }
    }
    Ok(())
}

/// Extract all prototype data from the game's Lua files and populate the database
pub fn extract_to_database(conn: &Connection, prototypes_dir: &Path) -> Result<ExtractStats> {
    let mut stats = ExtractStats::default();

    tracing::info!("Scanning {} for prototype files...", prototypes_dir.display());
    let files = find_prototype_files(prototypes_dir)?;
    tracing::info!("Found {} Lua files", files.len());

    for filepath in &files {
        let parsed = fs::read_to_string(filepath)
            .with_context(|| format!("Failed to read {}", filepath.display()))
            .and_then(|content| parse_prototypes(&content));
        match parsed {
            Ok(parsed) => {
                for prototype in &parsed.prototypes {
                    store(conn, prototype, &mut stats)?;
                }
                stats.skipped += parsed.skipped;
                tracing::debug!(
                    file = %filepath.display(),
                    parsed = parsed.prototypes.len(),
                    skipped = parsed.skipped,
                    "parsed prototype file"
                );
            }
            Err(e) => {
                tracing::warn!("Error parsing {}: {:#}", filepath.display(), e);
                stats.errors += 1;
            }
        }
    }

    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub recipes: usize,
    pub machines: usize,
    pub fuels: usize,
    pub hostiles: usize,
    pub ammo: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Extracted {} recipes, {} machines, {} fuels, {} hostiles, {} ammo. Skipped: {}, Errors: {}",
            self.recipes, self.machines, self.fuels, self.hostiles, self.ammo, self.skipped, self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRILLS: &str = r#"
data:extend(
{
  {
    type = "mining-drill",
    name = "burner-mining-drill",
    icon = "__base__/graphics/icons/burner-mining-drill.png",
    flags = {"placeable-neutral", "player-creation"},
    mining_speed = 0.25,
    energy_source =
    {
      type = "burner",
      fuel_category = "chemical",
      effectivity = 1,
      fuel_inventory_size = 1,
      emissions_per_minute = 12,
      smoke = {{ name = "smoke", deviation = {0.1, 0.1}, frequency = 3 }}
    },
    energy_usage = "150kW",
    resource_categories = {"basic-solid"}
  },
  {
    type = "mining-drill",
    name = "electric-mining-drill",
    mining_speed = 0.5,
    energy_source =
    {
      type = "electric",
      emissions_per_minute = 10,
      usage_priority = "secondary-input"
    },
    energy_usage = "90kW"
  }
})
"#;

    const POWER: &str = r#"
  {
    type = "boiler",
    name = "boiler",
    target_temperature = 165,
    energy_consumption = "1.8MW",
    energy_source =
    {
      type = "burner",
      fuel_category = "chemical",
      emissions_per_minute = 30
    }
  },
  {
    type = "generator",
    name = "steam-engine",
    effectivity = 1,
    fluid_usage_per_tick = 0.5,
    maximum_temperature = 165
  }
"#;

    const COMBAT: &str = r#"
  {
    type = "unit",
    name = "medium-biter",
    max_health = 75,
    resistances =
    {
      { type = "physical", decrease = 4, percent = 10 },
      { type = "explosion", percent = 10 }
    },
    pollution_to_join_attack = 20
  },
  {
    type = "ammo",
    name = "firearm-magazine",
    ammo_type =
    {
      category = "bullet",
      action =
      {
        type = "direct",
        action_delivery =
        {
          type = "instant",
          target_effects =
          {
            { type = "create-explosion", entity_name = "explosion-gunshot" },
            { type = "damage", damage = { amount = 5 , type = "physical"} }
          }
        }
      }
    },
    magazine_size = 10
  },
  {
    type = "item",
    name = "coal",
    fuel_category = "chemical",
    fuel_value = "4MJ",
    stack_size = 50
  },
  {
    type = "item",
    name = "iron-gear-wheel",
    stack_size = 100
  }
"#;

    const RECIPES: &str = r#"
  {
    type = "recipe",
    name = "iron-plate",
    category = "smelting",
    energy_required = 3.2,
    ingredients = {{ "iron-ore", 1}},
    result = "iron-plate"
  },
  {
    type = "recipe",
    name = "firearm-magazine",
    ingredients = {{type = "item", name = "iron-plate", amount = 4}},
    results = {{type = "item", name = "firearm-magazine", amount = 1}}
  },
  {
    type = "recipe",
    name = "iron-gear-wheel",
    normal =
    {
      ingredients = {{"iron-plate", 2}},
      result = "iron-gear-wheel"
    },
    expensive =
    {
      ingredients = {{"iron-plate", 4}},
      result = "iron-gear-wheel"
    }
  }
"#;

    fn machines(content: &str) -> Vec<MachineSpec> {
        parse_prototypes(content)
            .unwrap()
            .prototypes
            .into_iter()
            .filter_map(|p| match p {
                Prototype::Machine(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_drills() {
        let drills = machines(DRILLS);
        assert_eq!(drills.len(), 2);
        assert_eq!(drills[0].name, "burner-mining-drill");
        assert_eq!(drills[0].speed, Some(0.25));
        assert_eq!(drills[0].energy_usage_watts, Some(150_000.0));
        assert_eq!(drills[0].emissions_per_minute, 12.0);
        assert_eq!(drills[0].energy_source, Some(EnergySource::Burner));
        assert_eq!(drills[1].energy_source, Some(EnergySource::Electric));
        assert_eq!(drills[1].energy_usage_watts, Some(90_000.0));
    }

    #[test]
    fn test_boiler_and_engine_rates_are_derived() {
        let power = machines(POWER);
        let boiler = &power[0];
        assert_eq!(boiler.kind, MachineKind::Boiler);
        assert_eq!(boiler.water_per_second, Some(60.0));
        assert_eq!(boiler.steam_per_water, Some(1.0));
        assert_eq!(boiler.emissions_per_minute, 30.0);

        let engine = &power[1];
        assert_eq!(engine.kind, MachineKind::Generator);
        assert_eq!(engine.max_output_watts, Some(900_000.0));
        assert_eq!(engine.steam_per_second, Some(30.0));
    }

    #[test]
    fn test_combat_prototypes() {
        let parsed = parse_prototypes(COMBAT).unwrap();
        // the gear wheel burns nothing
        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.prototypes.len(), 3);

        let Prototype::Hostile(biter) = &parsed.prototypes[0] else {
            panic!("expected a hostile, got {:?}", parsed.prototypes[0]);
        };
        assert_eq!(biter.max_health, 75.0);
        assert_eq!(biter.pollution_to_join_attack, 20.0);
        let physical = biter.resistance_to("physical").unwrap();
        assert_eq!(physical.flat, 4.0);
        assert!((physical.percent - 0.1).abs() < 1e-12);
        assert_eq!(biter.resistance_to("explosion").unwrap().flat, 0.0);

        assert_eq!(
            parsed.prototypes[1],
            Prototype::Ammo(AmmoSpec {
                name: "firearm-magazine".into(),
                damage: 5.0,
                damage_type: "physical".into(),
                magazine_size: 10.0,
            })
        );
        assert_eq!(
            parsed.prototypes[2],
            Prototype::Fuel(FuelSpec {
                name: "coal".into(),
                fuel_value_joules: 4e6,
            })
        );
    }

    #[test]
    fn test_recipes_in_every_form() {
        let parsed = parse_prototypes(RECIPES).unwrap();
        let recipes: Vec<RecipeSpec> = parsed
            .prototypes
            .into_iter()
            .filter_map(|p| match p {
                Prototype::Recipe(r) => Some(r),
                _ => None,
            })
            .collect();
        // nested `{type = "item", name = ..}` entries are not prototypes
        assert_eq!(recipes.len(), 3);

        assert_eq!(recipes[0].category, "smelting");
        assert_eq!(recipes[0].crafting_time_s, 3.2);
        assert_eq!(recipes[0].ingredients, vec![Ingredient::new("iron-ore", 1.0)]);

        assert_eq!(recipes[1].category, "crafting");
        assert_eq!(recipes[1].crafting_time_s, 0.5);
        assert_eq!(recipes[1].ingredient_per_result("iron-plate"), Some(4.0));
        assert_eq!(recipes[1].result, Ingredient::new("firearm-magazine", 1.0));

        assert_eq!(recipes[2].ingredients, vec![Ingredient::new("iron-plate", 2.0)]);
    }

    #[test]
    fn test_extract_into_database() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        let mut stats = ExtractStats::default();
        for content in [DRILLS, POWER, COMBAT, RECIPES] {
            for prototype in parse_prototypes(content).unwrap().prototypes {
                store(&conn, &prototype, &mut stats).unwrap();
            }
        }
        assert_eq!(stats.machines, 4);
        assert_eq!(stats.recipes, 3);

        let data = db::load_domain_data(&conn).unwrap();
        assert_eq!(data.machines["boiler"].water_per_second, Some(60.0));
        assert_eq!(data.hostiles["medium-biter"].resistances.len(), 2);
    }

    #[test]
    fn test_braces_in_strings_and_comments_are_ignored() {
        let content = r#"
data:extend({
  {
    type = "item",
    name = "coal",
    -- burns like { a small sun
    fuel_value = "4MJ",
    localised_description = "lumps }}",
    --[[ old value: { fuel_value = "5MJ" ]]
    stack_size = 50
  },
  {
    type = "item",
    name = "wood",
    fuel_value = "2MJ",
    order = 'a[wood]}',
    stack_size = 100
  }
})
"#;
        let parsed = parse_prototypes(content).unwrap();
        assert_eq!(
            parsed.prototypes,
            vec![
                Prototype::Fuel(FuelSpec {
                    name: "coal".into(),
                    fuel_value_joules: 4e6,
                }),
                Prototype::Fuel(FuelSpec {
                    name: "wood".into(),
                    fuel_value_joules: 2e6,
                }),
            ]
        );
    }
}
