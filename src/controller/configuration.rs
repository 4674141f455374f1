//! Loading the rule document out of its ConfigMap.

use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client, ResourceExt};
use tracing::info;

use crate::config::RuleStore;
use crate::controller::error::{Error, Result};
use crate::resources::NamespacedName;

/// Default ConfigMap key holding the rule document
pub const DEFAULT_CONFIG_KEY: &str = "config.yml";

/// The rule document stored under `key`.
pub fn configmap_document<'a>(configmap: &'a ConfigMap, key: &str) -> Result<&'a str> {
    configmap
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(String::as_str)
        .ok_or_else(|| Error::MissingKey {
            configmap: format!(
                "{}/{}",
                configmap.namespace().unwrap_or_default(),
                configmap.name_any()
            ),
            key: key.to_string(),
        })
}

/// Read the ConfigMap once and load it into `store`.
///
/// Used at startup, before the webhook serves anything: a missing ConfigMap,
/// missing key or rejected document is returned as an error.
pub async fn ensure_initial_configuration(
    client: Client,
    configmap: &NamespacedName,
    key: &str,
    store: &RuleStore,
) -> Result<u64> {
    let api: Api<ConfigMap> = Api::namespaced(client, &configmap.namespace);
    let object = api.get(&configmap.name).await?;

    let generation = store.load(configmap_document(&object, key)?)?;
    info!(
        configmap = %configmap,
        key,
        generation,
        "Loaded initial rule configuration"
    );
    Ok(generation)
}
