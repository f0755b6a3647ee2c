// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hugger API Server
//!
//! Brokers user-lifecycle operations between client applications, the
//! identity provider, and the profile store, and fans out push
//! notifications.

use hugger_api::{
    config::Config,
    db::ProfileDb,
    services::{
        IdentityClient, MessagingClient, NotificationService, ProvisioningService,
        ServiceAccountTokenProvider,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Hugger API");

    // Initialize Firestore database
    let db = ProfileDb::new(&config.firebase_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Service-account tokens shared by the identity and messaging clients
    let token_provider = Arc::new(
        ServiceAccountTokenProvider::new(&config)
            .expect("Failed to initialize service-account credentials"),
    );

    let identity = IdentityClient::new(&config, token_provider.clone())
        .expect("Failed to initialize identity client");
    tracing::info!(
        project = %config.firebase_project_id,
        "Identity provider client initialized"
    );

    let messaging = MessagingClient::new(&config.firebase_project_id, token_provider)
        .expect("Failed to initialize messaging client");

    let provisioning = ProvisioningService::new(identity.clone(), db.clone());
    let notifications = NotificationService::new(db.clone(), messaging);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        identity,
        provisioning,
        notifications,
    });

    // Build router
    let app = hugger_api::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hugger_api=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
