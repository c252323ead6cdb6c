pub mod inventory {
    include!(concat!(env!("OUT_DIR"), "/cafe.inventory.rs"));
}

pub use inventory::{inventory_service_client, inventory_service_server};

pub mod order {
    include!(concat!(env!("OUT_DIR"), "/cafe.order.rs"));
}

pub use order::{order_service_client, order_service_server};

pub mod menu {
    include!(concat!(env!("OUT_DIR"), "/cafe.menu.rs"));
}

pub use menu::{menu_service_client, menu_service_server};

pub mod directory {
    include!(concat!(env!("OUT_DIR"), "/cafe.directory.rs"));
}

pub use directory::{cafe_service_client, cafe_service_server};

pub mod login {
    include!(concat!(env!("OUT_DIR"), "/cafe.login.rs"));
}

pub use login::{login_service_client, login_service_server};

pub mod admin {
    include!(concat!(env!("OUT_DIR"), "/cafe.admin.rs"));
}

pub use admin::{admin_login_service_client, admin_login_service_server};

pub mod analytics {
    include!(concat!(env!("OUT_DIR"), "/cafe.analytics.rs"));
}

pub use analytics::{analytics_service_client, analytics_service_server};
