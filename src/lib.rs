// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Hugger API: user lifecycle and push notification backend.
//!
//! This crate brokers between client applications, the managed identity
//! provider, and the profile document store, and fans out push
//! notifications to registered devices.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::ProfileDb;
use services::{IdentityClient, NotificationService, ProvisioningService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: ProfileDb,
    pub identity: IdentityClient,
    pub provisioning: ProvisioningService,
    pub notifications: NotificationService,
}
