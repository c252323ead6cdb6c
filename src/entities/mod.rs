pub mod admin;
pub mod analytics_log;
pub mod cafe;
pub mod inventory;
pub mod menu_item;
pub mod order;
pub mod order_item;
