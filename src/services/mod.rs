// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - external gateways and business workflows.

pub mod gcp_auth;
pub mod identity;
pub mod messaging;
pub mod notifications;
pub mod provisioning;

pub use gcp_auth::ServiceAccountTokenProvider;
pub use identity::IdentityClient;
pub use messaging::MessagingClient;
pub use notifications::NotificationService;
pub use provisioning::ProvisioningService;
