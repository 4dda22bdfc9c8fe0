//! Create and delete manifest objects against a cluster

use anyhow::{Context, Result};
use kube::api::{Api, DeleteParams, DynamicObject, PostParams};
use kube::core::GroupVersionKind;
use kube::Client;
use std::collections::HashMap;
use tracing::info;

use super::backendconfig::BackendConfig;
use super::object::{K8sObject, ObjectKey};

/// Keys of created objects grouped by kind
pub type CreatedObjects = HashMap<GroupVersionKind, Vec<ObjectKey>>;

/// Copy `objects`, moving namespaced ones into `namespace`.
/// Cluster-scoped objects are copied unchanged.
pub fn replace_namespace(namespace: &str, objects: &[K8sObject]) -> Vec<K8sObject> {
    info!("Replace K8s resources to use namespace {}.", namespace);

    objects
        .iter()
        .cloned()
        .map(|mut obj| {
            if obj.is_namespaced() {
                obj.set_namespace(namespace);
            }
            obj
        })
        .collect()
}

/// BackendConfigs are always namespaced
pub fn replace_backend_config_namespace(
    namespace: &str,
    configs: &[BackendConfig],
) -> Vec<BackendConfig> {
    configs
        .iter()
        .cloned()
        .map(|mut config| {
            config.metadata.namespace = Some(namespace.to_string());
            config
        })
        .collect()
}

/// CRUD over typed manifest objects through the dynamic API
#[derive(Clone)]
pub struct K8sCrud {
    client: Client,
}

impl K8sCrud {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn dynamic_api(&self, obj: &K8sObject) -> Api<DynamicObject> {
        let ar = obj.api_resource();
        match (obj.is_namespaced(), obj.namespace()) {
            (true, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &ar),
            (true, None) => Api::default_namespaced_with(self.client.clone(), &ar),
            (false, _) => Api::all_with(self.client.clone(), &ar),
        }
    }

    /// Create every object in order, stopping at the first failure
    pub async fn create_k8s_resources(&self, objects: &[K8sObject]) -> Result<CreatedObjects> {
        info!("Creating K8s resources.");

        let mut created = CreatedObjects::new();
        for obj in objects {
            self.create(obj).await?;
            created
                .entry(obj.gvk())
                .or_default()
                .push(ObjectKey::from_object(obj));
        }
        Ok(created)
    }

    async fn create(&self, obj: &K8sObject) -> Result<()> {
        let api = self.dynamic_api(obj);
        let dynamic = obj.to_dynamic()?;
        api.create(&PostParams::default(), &dynamic)
            .await
            .with_context(|| format!("failed to create {obj}"))?;
        info!("Created {}", obj);
        Ok(())
    }

    /// Delete every object in order, stopping at the first failure
    pub async fn delete_k8s_resources(&self, objects: &[K8sObject]) -> Result<()> {
        info!("Deleting K8s resources.");

        for obj in objects {
            self.delete(obj).await?;
        }
        Ok(())
    }

    async fn delete(&self, obj: &K8sObject) -> Result<()> {
        let api = self.dynamic_api(obj);
        api.delete(obj.name(), &DeleteParams::default())
            .await
            .with_context(|| format!("failed to delete {obj}"))?;
        info!("Deleted {}", obj);
        Ok(())
    }

    pub async fn create_backend_configs(&self, configs: &[BackendConfig]) -> Result<Vec<ObjectKey>> {
        let mut created = Vec::with_capacity(configs.len());
        for config in configs {
            let key = backend_config_key(config);
            self.backend_config_api(&key)
                .create(&PostParams::default(), config)
                .await
                .with_context(|| format!("failed to create BackendConfig {key}"))?;
            info!("Created BackendConfig {}", key);
            created.push(key);
        }
        Ok(created)
    }

    pub async fn delete_backend_configs(&self, configs: &[BackendConfig]) -> Result<()> {
        for config in configs {
            let key = backend_config_key(config);
            self.backend_config_api(&key)
                .delete(&key.name, &DeleteParams::default())
                .await
                .with_context(|| format!("failed to delete BackendConfig {key}"))?;
            info!("Deleted BackendConfig {}", key);
        }
        Ok(())
    }

    fn backend_config_api(&self, key: &ObjectKey) -> Api<BackendConfig> {
        match &key.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::default_namespaced(self.client.clone()),
        }
    }
}

fn backend_config_key(config: &BackendConfig) -> ObjectKey {
    ObjectKey::new(
        config.metadata.namespace.as_deref(),
        config.metadata.name.clone().unwrap_or_default(),
    )
}
