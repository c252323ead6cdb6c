use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::task::JoinSet;
use tracing::{error, info};

use cafe_platform::{
    config::{self, AppConfig},
    db::{self, DbPool},
    grpc::{self, client::InventoryLedgerClient, GrpcRouter},
    services::{
        admin_login::AdminLoginService, analytics::AnalyticsService, cafes::CafeService,
        inventory::InventoryService, login::LoginService, menu::MenuService,
        orders::OrderService,
    },
};

#[derive(Parser)]
#[command(name = "cafe-services", about = "Runs the cafe platform gRPC services", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve one service, or all of them in a single process
    Serve {
        #[arg(value_enum)]
        service: ServiceKind,
    },
    /// Apply pending database migrations and exit
    Migrate,
    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ServiceKind {
    Login,
    Order,
    Analytics,
    Cafe,
    Menu,
    Inventory,
    AdminLogin,
    All,
}

impl ServiceKind {
    const EACH: [ServiceKind; 7] = [
        ServiceKind::Login,
        ServiceKind::Order,
        ServiceKind::Analytics,
        ServiceKind::Cafe,
        ServiceKind::Menu,
        ServiceKind::Inventory,
        ServiceKind::AdminLogin,
    ];

    fn name(self) -> &'static str {
        match self {
            ServiceKind::Login => "login",
            ServiceKind::Order => "order",
            ServiceKind::Analytics => "analytics",
            ServiceKind::Cafe => "cafe",
            ServiceKind::Menu => "menu",
            ServiceKind::Inventory => "inventory",
            ServiceKind::AdminLogin => "admin-login",
            ServiceKind::All => "all",
        }
    }

    fn port(self, cfg: &AppConfig) -> u16 {
        let grpc = &cfg.grpc;
        match self {
            ServiceKind::Login => grpc.login_port,
            ServiceKind::Order => grpc.order_port,
            ServiceKind::Analytics => grpc.analytics_port,
            ServiceKind::Cafe => grpc.cafe_port,
            ServiceKind::Menu => grpc.menu_port,
            ServiceKind::Inventory => grpc.inventory_port,
            ServiceKind::AdminLogin => grpc.admin_login_port,
            ServiceKind::All => 0,
        }
    }

    fn router(self, cfg: &AppConfig, pool: Arc<DbPool>) -> Result<GrpcRouter> {
        let grpc_cfg = &cfg.grpc;
        let router = match self {
            ServiceKind::Login => grpc::login_router(grpc_cfg, LoginService::new(pool)),
            ServiceKind::Order => {
                // Stock always goes through the inventory service, even in-process.
                let ledger = InventoryLedgerClient::connect_lazy(grpc_cfg)
                    .context("failed to configure inventory client")?;
                grpc::order_router(grpc_cfg, OrderService::new(pool, Arc::new(ledger)))
            }
            ServiceKind::Analytics => {
                grpc::analytics_router(grpc_cfg, AnalyticsService::new(pool))
            }
            ServiceKind::Cafe => grpc::cafe_router(grpc_cfg, CafeService::new(pool)),
            ServiceKind::Menu => grpc::menu_router(grpc_cfg, MenuService::new(pool)),
            ServiceKind::Inventory => grpc::inventory_router(
                grpc_cfg,
                InventoryService::new(pool, cfg.low_stock_threshold),
            ),
            ServiceKind::AdminLogin => {
                grpc::admin_login_router(grpc_cfg, AdminLoginService::new(pool))
            }
            ServiceKind::All => anyhow::bail!("'all' is not a single service"),
        };
        Ok(router)
    }

    fn addr(self, cfg: &AppConfig) -> Result<SocketAddr> {
        let raw = format!("{}:{}", cfg.grpc.host, self.port(cfg));
        raw.parse()
            .with_context(|| format!("invalid bind address {} for {}", raw, self.name()))
    }
}

async fn connect(cfg: &AppConfig) -> Result<Arc<DbPool>> {
    let pool = db::establish_connection_from_app_config(cfg)
        .await
        .context("failed to connect to the database")?;
    db::check_connection(&pool)
        .await
        .context("database did not answer a ping")?;
    if cfg.auto_migrate {
        db::run_migrations(&pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    Ok(Arc::new(pool))
}

async fn serve(cfg: AppConfig, kind: ServiceKind) -> Result<()> {
    let pool = connect(&cfg).await?;

    let kinds: Vec<ServiceKind> = if kind == ServiceKind::All {
        ServiceKind::EACH.to_vec()
    } else {
        vec![kind]
    };

    let mut servers = JoinSet::new();
    for kind in kinds {
        let router = kind.router(&cfg, pool.clone())?;
        let addr = kind.addr(&cfg)?;
        servers.spawn(grpc::serve(kind.name(), addr, router));
    }

    while let Some(joined) = servers.join_next().await {
        joined.context("gRPC server task panicked")??;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    match cli.command {
        Commands::Serve { service } => {
            info!(service = service.name(), environment = %cfg.environment, "Starting");
            serve(cfg, service).await?;
        }
        Commands::Migrate => {
            let pool = db::establish_connection_from_app_config(&cfg).await?;
            db::run_migrations(&pool).await?;
            info!("Migrations applied");
            db::close_pool(pool).await?;
        }
        Commands::CreateAdmin { username, password } => {
            let pool = connect(&cfg).await?;
            let admin = AdminLoginService::new(pool)
                .create_admin(&username, &password)
                .await
                .context("failed to create admin")?;
            info!(admin_id = admin.admin_id, username = %admin.username, "Admin created");
        }
    }

    Ok(())
}
