//! Typed Kubernetes objects decoded from recipe manifests

use anyhow::{Context, Result};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::{Ingress, IngressClass, NetworkPolicy};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{ApiResource, DynamicObject};
use kube::core::GroupVersionKind;
use kube::Resource;
use serde::Serialize;
use std::fmt;

/// Any of the built-in kinds a recipe manifest may contain
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum K8sObject {
    Service(Service),
    Pod(Pod),
    ConfigMap(ConfigMap),
    Secret(Secret),
    ServiceAccount(ServiceAccount),
    Namespace(Namespace),
    Deployment(Deployment),
    StatefulSet(StatefulSet),
    DaemonSet(DaemonSet),
    Ingress(Ingress),
    IngressClass(IngressClass),
    NetworkPolicy(NetworkPolicy),
}

macro_rules! each_kind {
    ($value:expr, $obj:ident => $body:expr) => {
        match $value {
            K8sObject::Service($obj) => $body,
            K8sObject::Pod($obj) => $body,
            K8sObject::ConfigMap($obj) => $body,
            K8sObject::Secret($obj) => $body,
            K8sObject::ServiceAccount($obj) => $body,
            K8sObject::Namespace($obj) => $body,
            K8sObject::Deployment($obj) => $body,
            K8sObject::StatefulSet($obj) => $body,
            K8sObject::DaemonSet($obj) => $body,
            K8sObject::Ingress($obj) => $body,
            K8sObject::IngressClass($obj) => $body,
            K8sObject::NetworkPolicy($obj) => $body,
        }
    };
}

fn gvk_of<K: Resource<DynamicType = ()>>(_: &K) -> GroupVersionKind {
    GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()))
}

fn api_resource_of<K: Resource<DynamicType = ()>>(_: &K) -> ApiResource {
    ApiResource::erase::<K>(&())
}

impl K8sObject {
    pub fn meta(&self) -> &ObjectMeta {
        each_kind!(self, o => o.meta())
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        each_kind!(self, o => o.meta_mut())
    }

    pub fn gvk(&self) -> GroupVersionKind {
        each_kind!(self, o => gvk_of(o))
    }

    pub fn api_resource(&self) -> ApiResource {
        each_kind!(self, o => api_resource_of(o))
    }

    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.meta().namespace.as_deref()
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.meta_mut().namespace = Some(namespace.to_string());
    }

    /// Namespaces and IngressClasses are cluster-scoped
    pub fn is_namespaced(&self) -> bool {
        !matches!(self, K8sObject::Namespace(_) | K8sObject::IngressClass(_))
    }

    /// Untyped form for the dynamic API
    pub fn to_dynamic(&self) -> Result<DynamicObject> {
        let value = serde_json::to_value(self)
            .with_context(|| format!("Failed to encode {}", self))?;
        serde_json::from_value(value).with_context(|| format!("Failed to convert {}", self))
    }
}

impl fmt::Display for K8sObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gvk = self.gvk();
        let kind = if gvk.group.is_empty() {
            format!("{}/{}", gvk.version, gvk.kind)
        } else {
            format!("{}/{}/{}", gvk.group, gvk.version, gvk.kind)
        };
        match self.namespace() {
            Some(ns) => write!(f, "{} {}/{}", kind, ns, self.name()),
            None => write!(f, "{} {}", kind, self.name()),
        }
    }
}

/// Namespace/name pair identifying a created object
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }

    pub fn from_object(obj: &K8sObject) -> Self {
        Self::new(obj.namespace(), obj.name())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str) -> K8sObject {
        K8sObject::Service(Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[test]
    fn test_gvk() {
        let gvk = service("foo").gvk();
        assert_eq!(gvk, GroupVersionKind::gvk("", "v1", "Service"));

        let ingress = K8sObject::Ingress(Ingress::default());
        assert_eq!(
            ingress.gvk(),
            GroupVersionKind::gvk("networking.k8s.io", "v1", "Ingress")
        );
    }

    #[test]
    fn test_scope() {
        assert!(service("foo").is_namespaced());
        assert!(!K8sObject::Namespace(Namespace::default()).is_namespaced());
        assert!(!K8sObject::IngressClass(IngressClass::default()).is_namespaced());
        assert!(K8sObject::Deployment(Deployment::default()).is_namespaced());
    }

    #[test]
    fn test_set_namespace_and_display() {
        let mut obj = service("foo");
        assert_eq!(obj.to_string(), "v1/Service foo");

        obj.set_namespace("test-ns");
        assert_eq!(obj.namespace(), Some("test-ns"));
        assert_eq!(obj.to_string(), "v1/Service test-ns/foo");
        assert_eq!(ObjectKey::from_object(&obj).to_string(), "test-ns/foo");
    }

    #[test]
    fn test_to_dynamic_keeps_type_meta() {
        let dynamic = service("foo").to_dynamic().unwrap();
        let types = dynamic.types.unwrap();

        assert_eq!(types.api_version, "v1");
        assert_eq!(types.kind, "Service");
        assert_eq!(dynamic.metadata.name.as_deref(), Some("foo"));
    }

    #[test]
    fn test_api_resource() {
        let ar = K8sObject::Deployment(Deployment::default()).api_resource();
        assert_eq!(ar.group, "apps");
        assert_eq!(ar.plural, "deployments");
    }
}
