use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use crate::{
    config::{Config, DatabaseConfig},
    repository::{PgUserStore, UserStore},
    routes::{
        auth::{check_auth, create_user, login_user, logout, require_admin},
        health,
        referral::{apply_referral, get_referral_info},
        user::{
            delete_user, delete_user_address, get_authenticated_user, get_user_info, get_users,
            update_avatar, update_user_addresses, update_user_info, update_user_password,
        },
    },
    utils::uploads::UploadStore,
};
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub uploads: UploadStore,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn UserStore>) -> Self {
        let uploads = UploadStore::new(config.storage.upload_dir.clone());
        Self {
            store,
            uploads,
            config,
        }
    }
}

/// All account routes live under `/api/v2/user`; uploaded avatars are served from `/uploads`.
pub fn router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route("/admin-all-users", get(get_users))
        .route("/delete-user/:id", delete(delete_user))
        .route_layer(middleware::from_fn(require_admin));

    let protected_routes = Router::new()
        .route("/getuser", get(get_authenticated_user))
        .route("/update-user-info", put(update_user_info))
        .route("/update-avatar", put(update_avatar))
        .route("/update-user-addresses", put(update_user_addresses))
        .route("/delete-user-address/:id", delete(delete_user_address))
        .route("/update-user-password", put(update_user_password))
        .route("/apply-referral", post(apply_referral))
        .route("/referral-info", get(get_referral_info))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), check_auth));

    let public_routes = Router::new()
        .route("/create-user", post(create_user))
        .route("/login-user", post(login_user))
        .route("/logout", get(logout))
        .route("/user-info/:id", get(get_user_info));

    Router::new()
        .nest("/api/v2/user", public_routes.merge(protected_routes))
        .route("/health", get(health))
        .nest_service("/uploads", ServeDir::new(state.uploads.dir()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub struct Application;

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<()> {
        Self::setup_tracing(&config.application.debug_mode);

        let pool = Self::get_pool(&config.database);
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");

        let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
        let app_state = Arc::new(AppState::new(config.clone(), store));
        tokio::fs::create_dir_all(app_state.uploads.dir()).await?;

        let app = router(app_state);

        let ip = config.application.host.parse::<IpAddr>()?;
        let addr = SocketAddr::new(ip, config.application.port);
        tracing::info!("listening on {}", addr);
        axum::Server::bind(&addr)
            .serve(app.into_make_service())
            .await?;

        Ok(())
    }

    fn setup_tracing(debug_mode: &str) {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| debug_mode.into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    fn get_pool(db_config: &DatabaseConfig) -> PgPool {
        PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(2))
            .connect_lazy_with(db_config.get_connect_options())
    }
}
