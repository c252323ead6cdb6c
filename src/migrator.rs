use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_cafes_table::Migration),
            Box::new(m20240101_000002_create_admins_table::Migration),
            Box::new(m20240101_000003_create_menu_items_table::Migration),
            Box::new(m20240101_000004_create_inventory_table::Migration),
            Box::new(m20240101_000005_create_orders_tables::Migration),
            Box::new(m20240101_000006_create_analytics_logs_table::Migration),
        ]
    }
}

mod m20240101_000001_create_cafes_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_cafes_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Cafes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Cafes::CafeId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Cafes::Name).string().not_null())
                        .col(
                            ColumnDef::new(Cafes::Location)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(Cafes::AccessCode)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Cafes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Cafes {
        Table,
        CafeId,
        Name,
        Location,
        AccessCode,
    }
}

mod m20240101_000002_create_admins_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_admins_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Admins::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Admins::AdminId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Admins::Username)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Admins::PasswordHash).string().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Admins::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Admins {
        Table,
        AdminId,
        Username,
        PasswordHash,
    }
}

mod m20240101_000003_create_menu_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_menu_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MenuItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MenuItems::ItemId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(MenuItems::Name).string().not_null())
                        .col(
                            ColumnDef::new(MenuItems::Category)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(
                            ColumnDef::new(MenuItems::Price)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_menu_items_name")
                        .table(MenuItems::Table)
                        .col(MenuItems::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MenuItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum MenuItems {
        Table,
        ItemId,
        Name,
        Category,
        Price,
    }
}

mod m20240101_000004_create_inventory_table {
    use super::m20240101_000001_create_cafes_table::Cafes;
    use super::m20240101_000003_create_menu_items_table::MenuItems;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_inventory_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Inventory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Inventory::InventoryId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Inventory::ItemId).integer().not_null())
                        .col(ColumnDef::new(Inventory::CafeId).integer().not_null())
                        .col(
                            ColumnDef::new(Inventory::Stock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Inventory::RestockDate).date().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_item_id")
                                .from(Inventory::Table, Inventory::ItemId)
                                .to(MenuItems::Table, MenuItems::ItemId)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_cafe_id")
                                .from(Inventory::Table, Inventory::CafeId)
                                .to(Cafes::Table, Cafes::CafeId)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_item_cafe")
                        .table(Inventory::Table)
                        .col(Inventory::ItemId)
                        .col(Inventory::CafeId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Inventory::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Inventory {
        Table,
        InventoryId,
        ItemId,
        CafeId,
        Stock,
        RestockDate,
    }
}

mod m20240101_000005_create_orders_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_orders_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Orders reference cafes and menu items by id only; the order
            // service may run against a database that does not hold them.
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Orders::OrderId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Orders::CafeId).integer().not_null())
                        .col(
                            ColumnDef::new(Orders::TotalPrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_cafe_created")
                        .table(Orders::Table)
                        .col(Orders::CafeId)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::OrderItemId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).integer().not_null())
                        .col(ColumnDef::new(OrderItems::ItemId).integer().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::Price)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::OrderId)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        OrderId,
        CafeId,
        TotalPrice,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        OrderItemId,
        OrderId,
        ItemId,
        Quantity,
        Price,
    }
}

mod m20240101_000006_create_analytics_logs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_analytics_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AnalyticsLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AnalyticsLogs::LogId)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(AnalyticsLogs::OrderId).integer().not_null())
                        .col(ColumnDef::new(AnalyticsLogs::CafeId).integer().not_null())
                        .col(ColumnDef::new(AnalyticsLogs::ItemId).integer().not_null())
                        .col(ColumnDef::new(AnalyticsLogs::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(AnalyticsLogs::TotalPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AnalyticsLogs::Timestamp)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AnalyticsLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum AnalyticsLogs {
        Table,
        LogId,
        OrderId,
        CafeId,
        ItemId,
        Quantity,
        TotalPrice,
        Timestamp,
    }
}

/// Connects to `db_url` and applies every pending migration.
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnectionTrait, Statement};

    #[tokio::test]
    async fn migrations_apply_and_are_idempotent() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let backend = db.get_database_backend();
        for table in [
            "cafes",
            "admins",
            "menu_items",
            "inventory",
            "orders",
            "order_items",
            "analytics_logs",
        ] {
            let row = db
                .query_one(Statement::from_string(
                    backend,
                    format!(
                        "SELECT COUNT(*) AS n FROM sqlite_master WHERE type = 'table' AND name = '{}'",
                        table
                    ),
                ))
                .await
                .unwrap()
                .unwrap();
            let n: i64 = row.try_get("", "n").unwrap();
            assert_eq!(n, 1, "missing table {}", table);
        }
    }
}
