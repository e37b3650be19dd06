use rand::Rng;
use rand::seq::IndexedRandom;

use dbmask_core::SqlValue;

use crate::errors::GenerationError;
use crate::generators::random::float_bounds;
use crate::generators::{CommerceKind, Constraints, GeneratorKind, round_to_scale};

const DEPARTMENTS: &[&str] = &[
    "Books", "Movies", "Music", "Games", "Electronics", "Computers", "Home", "Garden", "Tools",
    "Grocery", "Health", "Beauty", "Toys", "Kids", "Baby", "Clothing", "Shoes", "Jewelery",
    "Sports", "Outdoors", "Automotive", "Industrial",
];

const PRODUCT_ADJECTIVES: &[&str] = &[
    "Small", "Ergonomic", "Rustic", "Intelligent", "Gorgeous", "Incredible", "Fantastic",
    "Practical", "Sleek", "Awesome", "Generic", "Handcrafted", "Handmade", "Licensed", "Refined",
    "Unbranded", "Tasty",
];

const PRODUCT_MATERIALS: &[&str] = &[
    "Steel", "Wooden", "Concrete", "Plastic", "Cotton", "Granite", "Rubber", "Metal", "Soft",
    "Fresh", "Frozen",
];

const PRODUCTS: &[&str] = &[
    "Chair", "Car", "Computer", "Keyboard", "Mouse", "Bike", "Ball", "Gloves", "Pants", "Shirt",
    "Table", "Shoes", "Hat", "Towels", "Soap", "Tuna", "Chicken", "Fish", "Cheese", "Bacon",
    "Pizza", "Salad", "Sausages", "Chips",
];

pub fn generate<R: Rng>(
    kind: CommerceKind,
    constraints: &Constraints,
    rng: &mut R,
) -> Result<SqlValue, GenerationError> {
    let value = match kind {
        CommerceKind::Department => pick(DEPARTMENTS, rng).to_string(),
        CommerceKind::ProductAdjective => pick(PRODUCT_ADJECTIVES, rng).to_string(),
        CommerceKind::ProductMaterial => pick(PRODUCT_MATERIALS, rng).to_string(),
        CommerceKind::Product => pick(PRODUCTS, rng).to_string(),
        CommerceKind::ProductName => format!(
            "{} {} {}",
            pick(PRODUCT_ADJECTIVES, rng),
            pick(PRODUCT_MATERIALS, rng),
            pick(PRODUCTS, rng)
        ),
        CommerceKind::Price => {
            let generator = GeneratorKind::Commerce(kind);
            let (min, max) = float_bounds(generator, constraints, (1.0, 1000.0))?;
            let value = if min == max {
                min
            } else {
                rng.random_range(min..=max)
            };
            return Ok(SqlValue::Float(round_to_scale(value, 2)));
        }
    };
    Ok(SqlValue::Text(value))
}

fn pick<R: Rng>(values: &'static [&'static str], rng: &mut R) -> &'static str {
    values.choose(rng).copied().unwrap_or_default()
}
