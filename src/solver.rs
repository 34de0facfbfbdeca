//! Equilibrium solver for the pollution -> attack -> ammo -> pollution loop
//!
//! Pollution spawns hostiles, killing them takes ammunition, and producing the
//! ammunition pollutes again. The total cost is an infinite series that the two
//! mutually recursive functions below sum generation by generation until a
//! term falls under [`EPSILON`]. A generation cap turns a series that never
//! decays into [`CalcError::DidNotConverge`].

use crate::error::{CalcError, Result};
use crate::models::{AmmoSpec, HostileSpec, RecipeSpec};
use crate::pollution::{EPSILON, PollutionModel};

pub const DEFAULT_DAMAGE_FLOOR: f64 = 1.0;
pub const DEFAULT_MAX_GENERATIONS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Minimum per-shot damage after flat resistance
    pub damage_floor: f64,
    pub max_generations: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            damage_floor: DEFAULT_DAMAGE_FLOOR,
            max_generations: DEFAULT_MAX_GENERATIONS,
        }
    }
}

/// Who is attacking and what we shoot them with
#[derive(Debug, Clone)]
pub struct Defense {
    pub hostile: HostileSpec,
    pub ammo: AmmoSpec,
    /// Recipe of the base resource (e.g. iron-plate)
    pub base_recipe: RecipeSpec,
    /// Recipe of the ammo itself
    pub ammo_recipe: RecipeSpec,
    /// Base resource consumed per reload unit, from `ammo_recipe`
    pub resource_per_reload: f64,
}

/// One term of the series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Generation {
    pub pollution: f64,
    pub spawned: f64,
    pub reloads: f64,
    pub resource: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Equilibrium {
    pub total_resource: f64,
    pub generations: Vec<Generation>,
}

/// Per-shot damage after resistance: `max(floor, damage - flat) * (1 - percent)`
pub fn effective_damage(ammo: &AmmoSpec, hostile: &HostileSpec, floor: f64) -> f64 {
    let (flat, percent) = hostile
        .resistance_to(&ammo.damage_type)
        .map_or((0.0, 0.0), |r| (r.flat, r.percent));
    (ammo.damage - flat).max(floor) * (1.0 - percent)
}

#[derive(Debug, Clone)]
pub struct EquilibriumSolver {
    model: PollutionModel,
    defense: Defense,
    settings: SolverSettings,
}

impl EquilibriumSolver {
    pub fn new(model: PollutionModel, defense: Defense, settings: SolverSettings) -> Self {
        Self {
            model,
            defense,
            settings,
        }
    }

    pub fn model(&self) -> &PollutionModel {
        &self.model
    }

    pub fn defense(&self) -> &Defense {
        &self.defense
    }

    /// Total base resource needed to defend against `pollution`, over all generations
    pub fn resource_for_pollution(&self, pollution: f64) -> Result<f64> {
        Ok(self.solve(pollution)?.total_resource)
    }

    /// Total base resource needed to kill `spawned` hostiles, over all generations
    pub fn resource_for_spawned(&self, spawned: f64) -> Result<f64> {
        let mut generations = Vec::new();
        self.spawned_step(spawned, 0, &mut generations)
    }

    /// Like [`Self::resource_for_pollution`] but keeps every generation
    pub fn solve(&self, pollution: f64) -> Result<Equilibrium> {
        let mut generations = Vec::new();
        let total_resource = self.pollution_step(pollution, 0, &mut generations)?;
        tracing::debug!(
            pollution,
            total_resource,
            generations = generations.len(),
            "equilibrium reached"
        );
        Ok(Equilibrium {
            total_resource,
            generations,
        })
    }

    pub fn effective_damage(&self) -> f64 {
        effective_damage(
            &self.defense.ammo,
            &self.defense.hostile,
            self.settings.damage_floor,
        )
    }

    fn pollution_step(&self, pollution: f64, depth: usize, trace: &mut Vec<Generation>) -> Result<f64> {
        if pollution < EPSILON {
            return Ok(0.0);
        }
        let spawned = pollution / self.defense.hostile.pollution_to_join_attack;
        self.spawned_step(spawned, depth, trace)
    }

    fn spawned_step(&self, spawned: f64, depth: usize, trace: &mut Vec<Generation>) -> Result<f64> {
        if spawned < EPSILON {
            return Ok(0.0);
        }
        if depth >= self.settings.max_generations {
            return Err(CalcError::DidNotConverge { generations: depth });
        }

        let defense = &self.defense;
        let damage_per_reload = self.effective_damage() * defense.ammo.magazine_size;
        let health = defense.hostile.max_health * spawned;
        let reloads = health / damage_per_reload;
        let resource = reloads * defense.resource_per_reload;

        let pollution = self.model.smelting_pollution(&defense.base_recipe, resource)?
            + self.model.assembling_pollution(&defense.ammo_recipe, reloads)?;

        tracing::trace!(depth, spawned, reloads, resource, pollution, "defense generation");
        trace.push(Generation {
            pollution: spawned * defense.hostile.pollution_to_join_attack,
            spawned,
            reloads,
            resource,
        });

        let further = self.pollution_step(pollution, depth + 1, trace)?;
        Ok(resource + further)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ingredient, Resistance};
    use crate::pollution::MiningMethod;
    use crate::pollution::tests::vanilla_setup;

    fn biter(name: &str, health: f64, threshold: f64, flat: f64, percent: f64) -> HostileSpec {
        HostileSpec {
            name: name.into(),
            max_health: health,
            pollution_to_join_attack: threshold,
            resistances: vec![Resistance {
                damage_type: "physical".into(),
                flat,
                percent,
            }],
        }
    }

    fn magazine() -> AmmoSpec {
        AmmoSpec {
            name: "firearm-magazine".into(),
            damage: 5.0,
            damage_type: "physical".into(),
            magazine_size: 10.0,
        }
    }

    fn defense(hostile: HostileSpec) -> Defense {
        Defense {
            hostile,
            ammo: magazine(),
            base_recipe: RecipeSpec {
                name: "iron-plate".into(),
                category: "smelting".into(),
                ingredients: vec![Ingredient::new("iron-ore", 1.0)],
                result: Ingredient::new("iron-plate", 1.0),
                crafting_time_s: 3.2,
            },
            ammo_recipe: RecipeSpec {
                name: "firearm-magazine".into(),
                category: "crafting".into(),
                ingredients: vec![Ingredient::new("iron-plate", 4.0)],
                result: Ingredient::new("firearm-magazine", 1.0),
                crafting_time_s: 1.0,
            },
            resource_per_reload: 4.0,
        }
    }

    fn solver(hostile: HostileSpec) -> EquilibriumSolver {
        EquilibriumSolver::new(
            PollutionModel::new(vanilla_setup(), MiningMethod::Burner),
            defense(hostile),
            SolverSettings::default(),
        )
    }

    fn medium() -> HostileSpec {
        biter("medium-biter", 75.0, 20.0, 4.0, 0.1)
    }

    #[test]
    fn test_damage_floor_applies_before_percent() {
        let big = biter("big-biter", 375.0, 80.0, 8.0, 0.1);
        assert!((effective_damage(&magazine(), &big, 1.0) - 0.9).abs() < 1e-12);
        assert!((effective_damage(&magazine(), &big, 2.0) - 1.8).abs() < 1e-12);
    }

    #[test]
    fn test_unresisted_damage_is_raw() {
        let mut small = biter("small-biter", 15.0, 4.0, 0.0, 0.0);
        small.resistances.clear();
        assert_eq!(effective_damage(&magazine(), &small, 1.0), 5.0);
    }

    #[test]
    fn test_first_generation_resource() {
        let solver = solver(medium());
        let equilibrium = solver.solve(20.0).unwrap();
        // one medium biter: 75 hp / (0.9 * 10) per magazine * 4 plates
        let first = equilibrium.generations[0];
        assert!((first.spawned - 1.0).abs() < 1e-12);
        assert!((first.reloads - 75.0 / 9.0).abs() < 1e-9);
        assert!((first.resource - 300.0 / 9.0).abs() < 1e-9);
        assert!(equilibrium.total_resource > first.resource);
    }

    #[test]
    fn test_total_is_sum_of_generations() {
        let equilibrium = solver(medium()).solve(500.0).unwrap();
        let sum: f64 = equilibrium.generations.iter().map(|g| g.resource).sum();
        assert!((equilibrium.total_resource - sum).abs() < 1e-9);
    }

    #[test]
    fn test_converges_with_shrinking_generations() {
        let equilibrium = solver(medium()).solve(1000.0).unwrap();
        assert!(!equilibrium.generations.is_empty());
        assert!(equilibrium.generations.len() < 1000);
        for pair in equilibrium.generations.windows(2) {
            assert!(pair[1].resource < pair[0].resource);
        }
    }

    #[test]
    fn test_sub_epsilon_is_exactly_zero() {
        let solver = solver(medium());
        assert_eq!(solver.resource_for_pollution(0.0).unwrap(), 0.0);
        assert_eq!(solver.resource_for_pollution(EPSILON / 10.0).unwrap(), 0.0);
        assert_eq!(solver.resource_for_spawned(EPSILON / 10.0).unwrap(), 0.0);
    }

    #[test]
    fn test_spawned_and_pollution_entry_points_agree() {
        let solver = solver(medium());
        let by_pollution = solver.resource_for_pollution(60.0).unwrap();
        let by_spawned = solver.resource_for_spawned(3.0).unwrap();
        assert!((by_pollution - by_spawned).abs() < 1e-9);
    }

    #[test]
    fn test_non_decaying_configuration_hits_the_cap() {
        let swarm = biter("swarm", 75.0, 0.01, 4.0, 0.1);
        let solver = EquilibriumSolver::new(
            PollutionModel::new(vanilla_setup(), MiningMethod::Burner),
            defense(swarm),
            SolverSettings {
                max_generations: 50,
                ..SolverSettings::default()
            },
        );
        assert_eq!(
            solver.resource_for_pollution(10.0),
            Err(CalcError::DidNotConverge { generations: 50 })
        );
    }

    #[test]
    fn test_zero_damage_is_an_error() {
        // 5 damage against 12 flat with no floor never hurts
        let behemoth = biter("behemoth-biter", 3000.0, 400.0, 12.0, 0.1);
        let solver = EquilibriumSolver::new(
            PollutionModel::new(vanilla_setup(), MiningMethod::Burner),
            defense(behemoth),
            SolverSettings {
                damage_floor: 0.0,
                ..SolverSettings::default()
            },
        );
        assert_eq!(solver.effective_damage(), 0.0);
        assert!(solver.resource_for_pollution(1000.0).is_err());
    }
}
