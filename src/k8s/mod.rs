//! Kubernetes side of the harness
//!
//! Manifest parsing, object CRUD, namespace sandboxes and Ingress
//! readiness.

mod backendconfig;
mod client;
mod crud;
mod ingress;
mod object;
mod parser;
mod sandbox;

pub use backendconfig::{BackendConfig, BackendConfigSpec};
pub use client::K8sClient;
pub use crud::{replace_backend_config_namespace, replace_namespace, CreatedObjects, K8sCrud};
pub use ingress::{default_ingress_poll, ingress_ip, wait_for_ingress};
pub use object::{K8sObject, ObjectKey};
pub use parser::{parse_k8s_yaml, parse_k8s_yaml_file, ParseError, ParsedObjects};
pub use sandbox::Sandbox;
