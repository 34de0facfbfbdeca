use thiserror::Error;

use crate::models::{EnergySource, MachineKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error("Unknown machine: {0}")]
    UnknownMachine(String),

    #[error("Unknown fuel: {0}")]
    UnknownFuel(String),

    #[error("Unknown hostile: {0}")]
    UnknownHostile(String),

    #[error("Unknown ammo: {0}")]
    UnknownAmmo(String),

    #[error("No recipe produces {0}")]
    NoRecipeFor(String),

    #[error("{machine} is a {actual}, expected a {expected}")]
    WrongMachineKind {
        machine: String,
        expected: MachineKind,
        actual: MachineKind,
    },

    #[error("{machine} must be powered by a {expected} energy source")]
    WrongEnergySource {
        machine: String,
        expected: EnergySource,
    },

    #[error("{machine} is missing {field}")]
    MissingField { machine: String, field: &'static str },

    #[error("{what} must be positive, got {value}")]
    NonPositive { what: String, value: f64 },

    #[error("Quantity must be finite and not negative, got {0}")]
    InvalidQuantity(f64),

    #[error("Recipe {recipe} does not use {ingredient}")]
    MissingIngredient { recipe: String, ingredient: String },

    #[error("Defense cost did not converge within {generations} generations")]
    DidNotConverge { generations: usize },
}

pub type Result<T> = std::result::Result<T, CalcError>;
