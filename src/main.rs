#[cfg(feature = "server")]
#[tokio::main]
async fn main() {
    use agrimarket::core::auth::service::SESSION_SWEEP_INTERVAL;
    use agrimarket::core::auth::{AuthApiState, AuthService, JwtConfig, JwtService, auth_api_router};
    use agrimarket::core::config::Config;
    use tower_http::cors::CorsLayer;
    use tower_http::trace::TraceLayer;

    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load application config from environment variables
    let config = Config::from_env().expect("invalid configuration");

    // Log config status (without revealing secrets)
    tracing::info!(
        "Config loaded: jwt_secret={}, seed_demo={}, token_lifetime={}h",
        config.has_jwt_secret(),
        config.seed_demo_accounts,
        config.jwt_expiration_hours
    );

    let jwt_service = JwtService::new(JwtConfig::from_config(&config));
    let auth_service = AuthService::in_memory(jwt_service);

    if config.seed_demo_accounts {
        let created = auth_service
            .seed_demo_accounts()
            .await
            .expect("failed to seed demo accounts");
        tracing::info!("Seeded {} demo accounts", created);
    }

    // Expired sessions are otherwise only dropped when their token is presented
    auth_service.spawn_session_sweep(SESSION_SWEEP_INTERVAL);

    let app = auth_api_router(AuthApiState { auth_service })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.server_addr;
    tracing::info!("Auth API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind server address");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}

#[cfg(not(feature = "server"))]
pub fn main() {
    // the auth API is only built with the `server` feature
}
