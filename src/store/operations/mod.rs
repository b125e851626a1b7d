pub mod day_stats;
pub mod dead_letters;
pub mod products;
pub mod works;
