// Stock and catalogue
pub mod inventory;
pub mod menu;

// Cafes and access
pub mod admin_login;
pub mod cafes;
pub mod login;

// Order workflow
pub mod orders;

// Reporting
pub mod analytics;
