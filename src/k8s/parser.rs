//! Multi-document manifest parsing
//!
//! Splits a YAML stream on `---` lines and decodes each document into a
//! typed object. BackendConfigs are kept apart from the built-in kinds
//! since they are created through their own API.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use super::backendconfig::BackendConfig;
use super::object::K8sObject;

/// Manifest decoding errors
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode YAML document {index}: {source}")]
    Yaml {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to decode YAML document {index}: Object 'Kind' is missing")]
    MissingKind { index: usize },

    #[error("failed to decode YAML document {index}: Object 'apiVersion' is missing")]
    MissingApiVersion { index: usize },

    #[error("failed to decode YAML document {index}: no kind {kind:?} is registered for version {api_version:?}")]
    UnknownKind {
        index: usize,
        api_version: String,
        kind: String,
    },
}

/// Objects decoded from one manifest, in input order
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ParsedObjects {
    pub k8s_objects: Vec<K8sObject>,
    pub backend_configs: Vec<BackendConfig>,
}

impl ParsedObjects {
    pub fn len(&self) -> usize {
        self.k8s_objects.len() + self.backend_configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Deserialize)]
struct TypeHeader {
    #[serde(rename = "apiVersion", default)]
    api_version: String,

    #[serde(default)]
    kind: String,
}

/// Read and parse a manifest file
pub fn parse_k8s_yaml_file(path: impl AsRef<Path>) -> Result<ParsedObjects, ParseError> {
    let path = path.as_ref();
    info!("Parse K8s resources from path {}.", path.display());

    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_k8s_yaml(&text)
}

/// Parse a YAML stream. Any undecodable document fails the whole parse.
pub fn parse_k8s_yaml(text: &str) -> Result<ParsedObjects, ParseError> {
    let mut parsed = ParsedObjects::default();

    for (index, doc) in split_documents(text).into_iter().enumerate() {
        if is_blank(doc) {
            continue;
        }

        let value: serde_yaml::Value =
            serde_yaml::from_str(doc).map_err(|source| ParseError::Yaml { index, source })?;
        if value.is_null() {
            continue;
        }

        let header: TypeHeader = serde_yaml::from_value(value.clone())
            .map_err(|source| ParseError::Yaml { index, source })?;
        if header.kind.is_empty() {
            return Err(ParseError::MissingKind { index });
        }
        if header.api_version.is_empty() {
            return Err(ParseError::MissingApiVersion { index });
        }

        if header.kind == "BackendConfig" && header.api_version.starts_with("cloud.google.com/") {
            parsed.backend_configs.push(decode(index, value)?);
        } else {
            parsed.k8s_objects.push(decode_k8s_object(index, &header, value)?);
        }
    }

    Ok(parsed)
}

fn split_documents(text: &str) -> Vec<&str> {
    let mut docs = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim_end() == "---" {
            docs.push(&text[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    docs.push(&text[start..]);
    docs
}

/// Whitespace and comments only
fn is_blank(doc: &str) -> bool {
    doc.lines()
        .map(str::trim)
        .all(|l| l.is_empty() || l.starts_with('#'))
}

fn decode<T: DeserializeOwned>(index: usize, value: serde_yaml::Value) -> Result<T, ParseError> {
    serde_yaml::from_value(value).map_err(|source| ParseError::Yaml { index, source })
}

fn decode_k8s_object(
    index: usize,
    header: &TypeHeader,
    value: serde_yaml::Value,
) -> Result<K8sObject, ParseError> {
    let object = match (header.api_version.as_str(), header.kind.as_str()) {
        ("v1", "Service") => K8sObject::Service(decode(index, value)?),
        ("v1", "Pod") => K8sObject::Pod(decode(index, value)?),
        ("v1", "ConfigMap") => K8sObject::ConfigMap(decode(index, value)?),
        ("v1", "Secret") => K8sObject::Secret(decode(index, value)?),
        ("v1", "ServiceAccount") => K8sObject::ServiceAccount(decode(index, value)?),
        ("v1", "Namespace") => K8sObject::Namespace(decode(index, value)?),
        ("apps/v1", "Deployment") => K8sObject::Deployment(decode(index, value)?),
        ("apps/v1", "StatefulSet") => K8sObject::StatefulSet(decode(index, value)?),
        ("apps/v1", "DaemonSet") => K8sObject::DaemonSet(decode(index, value)?),
        ("networking.k8s.io/v1", "Ingress") => K8sObject::Ingress(decode(index, value)?),
        ("networking.k8s.io/v1", "IngressClass") => K8sObject::IngressClass(decode(index, value)?),
        ("networking.k8s.io/v1", "NetworkPolicy") => {
            K8sObject::NetworkPolicy(decode(index, value)?)
        }
        (api_version, kind) => {
            return Err(ParseError::UnknownKind {
                index,
                api_version: api_version.to_string(),
                kind: kind.to_string(),
            })
        }
    };
    Ok(object)
}
