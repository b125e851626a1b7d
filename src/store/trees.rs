pub const WORKS: &str = "works";
pub const PRODUCTS: &str = "products";
pub const DAY_STATS: &str = "day_exec_stats";
pub const DEAD_LETTERS: &str = "dead_letters";
