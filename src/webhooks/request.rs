//! Decoding of admission requests into [`DecisionRequest`]s.

use kube::core::DynamicObject;
use kube::core::admission::AdmissionRequest;
use thiserror::Error;

use super::policies::DecisionRequest;

/// An admission request the decision engine cannot work with.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("request {uid} carries no object")]
    MissingObject { uid: String },

    #[error("request {uid} does not name a kind")]
    MissingKind { uid: String },

    #[error("object of request {uid} could not be decoded: {source}")]
    Object {
        uid: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Extract kind, requester groups and object tree from an admission request.
///
/// The kind is taken from the object itself and falls back to the kind the
/// API server reports for the request.
pub fn decode(request: &AdmissionRequest<DynamicObject>) -> Result<DecisionRequest, DecodeError> {
    let uid = &request.uid;
    let object = request.object.as_ref().ok_or_else(|| DecodeError::MissingObject {
        uid: uid.clone(),
    })?;

    let (kind, api_version) = match &object.types {
        Some(types) if !types.kind.is_empty() => (types.kind.clone(), types.api_version.clone()),
        _ => {
            let gvk = &request.kind;
            let api_version = if gvk.group.is_empty() {
                gvk.version.clone()
            } else {
                format!("{}/{}", gvk.group, gvk.version)
            };
            (gvk.kind.clone(), api_version)
        }
    };
    if kind.is_empty() {
        return Err(DecodeError::MissingKind { uid: uid.clone() });
    }

    let tree = serde_json::to_value(object).map_err(|source| DecodeError::Object {
        uid: uid.clone(),
        source,
    })?;

    Ok(DecisionRequest {
        kind,
        api_version,
        requester_groups: request.user_info.groups.clone().unwrap_or_default(),
        object: tree,
    })
}
