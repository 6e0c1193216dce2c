pub mod analytics;
pub mod backup_exchange;
pub mod core;
pub mod faculty;
pub mod import_browser;
pub mod marks;
pub mod reports;
pub mod students;
