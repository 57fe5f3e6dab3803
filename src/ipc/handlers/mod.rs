pub mod analytics;
pub mod batches;
pub mod core;
pub mod imports;
pub mod reports;
pub mod students;
