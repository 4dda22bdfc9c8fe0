//! GCE Compute resources used by the tests
//!
//! Each resource kind gets ensure/create/delete helpers with the same
//! shape: create is insert-then-get, delete tolerates 404 and then
//! confirms the resource is gone.

mod client;
mod firewall;
mod instance;
mod models;
mod network;
mod subnetwork;

pub use client::{
    is_http_error_code, region_from_zone, ComputeClient, ComputeError, ACCESS_TOKEN_ENV,
};
pub use firewall::{
    build_allow_proxy_connection_firewall, build_allow_ssh_firewall, create_firewall,
    delete_firewall,
};
pub use instance::{build_test_instance, create_instance, delete_instance};
pub use models::{
    ComputeResource, Firewall, FirewallAllowed, Instance, Network, Operation, ResourceKey,
    Subnetwork,
};
pub use network::{build_test_network, create_network, delete_network, ensure_network};
pub use subnetwork::{
    build_proxy_only_subnet, build_test_subnet, create_subnet, delete_subnet, ensure_subnet,
    PROXY_ONLY_SUBNET_CIDR, TEST_SUBNET_CIDR,
};

use anyhow::{Context, Result};
use tracing::info;

const NOT_FOUND: u16 = 404;

/// Look `key` up and fall back to `create` when it does not exist
async fn ensure_with<R, F, Fut>(client: &ComputeClient, key: &ResourceKey, create: F) -> Result<R>
where
    R: ComputeResource,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<R>>,
{
    match client.get::<R>(key).await {
        Ok(existing) => {
            info!("Using existing {} {}.", R::COLLECTION, key.name());
            Ok(existing)
        }
        Err(e) if is_http_error_code(&e, NOT_FOUND) => create().await,
        Err(e) => Err(e).with_context(|| format!("ensure {} {key} failed", R::COLLECTION)),
    }
}

/// Insert `resource` and read it back
async fn create_then_get<R: ComputeResource>(
    client: &ComputeClient,
    key: &ResourceKey,
    resource: &R,
) -> Result<R> {
    client
        .insert(key, resource)
        .await
        .with_context(|| format!("create {} {key} failed to insert", R::COLLECTION))?;
    client
        .get::<R>(key)
        .await
        .with_context(|| format!("create {} {key} failed to get", R::COLLECTION))
}

/// Delete `key`; an already missing resource is fine, a resource that is
/// still readable afterwards is not
async fn delete_then_verify<R: ComputeResource>(
    client: &ComputeClient,
    key: &ResourceKey,
) -> Result<()> {
    if let Err(e) = client.delete::<R>(key).await {
        if is_http_error_code(&e, NOT_FOUND) {
            return Ok(());
        }
        return Err(e).with_context(|| format!("delete {} {key} failed to delete", R::COLLECTION));
    }

    match client.get::<R>(key).await {
        Err(e) if is_http_error_code(&e, NOT_FOUND) => {
            info!("{} {} deleted", R::COLLECTION, key.name());
            Ok(())
        }
        Err(e) => {
            Err(e).with_context(|| format!("delete {} {key} failed to verify deletion", R::COLLECTION))
        }
        Ok(_) => anyhow::bail!(
            "delete {} {key} failed to verify deletion: resource still exists",
            R::COLLECTION
        ),
    }
}
