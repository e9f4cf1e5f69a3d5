pub mod oauth;
pub mod render;
pub mod run;
pub mod week;
pub mod weekly_report;
