pub mod classifier;
pub mod models;
pub mod report;
