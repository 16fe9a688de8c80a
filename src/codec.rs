// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Easel-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Easel and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Snapshot codec: untrusted JSON scene records in, validated [`Scene`] values out.
//!
//! Every scene crossing the HTTP boundary goes through [`decode_scene`]. A malformed payload is
//! rejected as a whole so nothing is ever partially stored.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{BinaryFile, Scene};

/// Loosely-typed scene fields as they appear on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_state: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("missing required field `{field}`")]
    Missing { field: &'static str },
    #[error("field `{field}` must be {expected}")]
    WrongShape { field: &'static str, expected: &'static str },
    #[error("attachment `{file_id}` is malformed: {source}")]
    InvalidAttachment {
        file_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("attachment `{file_id}` has an invalid data URL: {reason}")]
    InvalidDataUrl { file_id: String, reason: &'static str },
    #[error("attachment `{file_id}` payload is not valid base64: {source}")]
    InvalidBase64 {
        file_id: String,
        #[source]
        source: base64::DecodeError,
    },
}

pub fn decode_scene(record: SceneRecord) -> Result<Scene, CodecError> {
    let elements = match record.elements {
        None | Some(Value::Null) => return Err(CodecError::Missing { field: "elements" }),
        Some(Value::Array(elements)) => elements,
        Some(_) => {
            return Err(CodecError::WrongShape { field: "elements", expected: "an array" });
        }
    };

    let app_state = match record.app_state {
        None | Some(Value::Null) => return Err(CodecError::Missing { field: "appState" }),
        Some(Value::Object(app_state)) => app_state,
        Some(_) => {
            return Err(CodecError::WrongShape { field: "appState", expected: "an object" });
        }
    };

    let files = decode_files(record.files)?;
    Ok(Scene::new(elements, app_state).with_files(files))
}

pub fn encode_scene(scene: &Scene) -> SceneRecord {
    let files = scene
        .files()
        .iter()
        .filter(|(_, file)| !file.data_url.is_empty())
        .filter_map(|(file_id, file)| {
            serde_json::to_value(file).ok().map(|value| (file_id.clone(), value))
        })
        .collect::<serde_json::Map<_, _>>();

    SceneRecord {
        elements: Some(Value::Array(scene.elements().to_vec())),
        app_state: Some(Value::Object(scene.app_state().clone())),
        files: Some(Value::Object(files)),
    }
}

fn decode_files(raw: Option<Value>) -> Result<BTreeMap<String, BinaryFile>, CodecError> {
    let entries = match raw {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(entries)) => entries,
        Some(_) => return Err(CodecError::WrongShape { field: "files", expected: "an object" }),
    };

    let mut files = BTreeMap::new();
    for (file_id, value) in entries {
        let Some(entry) = value.as_object() else {
            return Err(CodecError::WrongShape { field: "files", expected: "a map of objects" });
        };
        // Attachments that never finished uploading carry no data; drop them.
        if entry.get("dataURL").and_then(Value::as_str).map_or(true, str::is_empty) {
            continue;
        }
        let file: BinaryFile = match serde_json::from_value(value) {
            Ok(file) => file,
            Err(source) => return Err(CodecError::InvalidAttachment { file_id, source }),
        };
        validate_data_url(&file_id, &file.data_url)?;
        files.insert(file_id, file);
    }
    Ok(files)
}

fn validate_data_url(file_id: &str, data_url: &str) -> Result<(), CodecError> {
    let invalid = |reason| CodecError::InvalidDataUrl { file_id: file_id.to_owned(), reason };

    let Some(rest) = data_url.strip_prefix("data:") else {
        return Err(invalid("missing `data:` scheme"));
    };
    let Some((meta, payload)) = rest.split_once(',') else {
        return Err(invalid("missing `,` separator"));
    };
    if !meta.ends_with(";base64") {
        return Err(invalid("payload is not base64-encoded"));
    }

    STANDARD
        .decode(payload)
        .map(|_| ())
        .map_err(|source| CodecError::InvalidBase64 { file_id: file_id.to_owned(), source })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{decode_scene, encode_scene, CodecError, SceneRecord};

    fn record(value: serde_json::Value) -> SceneRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn decodes_well_formed_scene() {
        let scene = decode_scene(record(json!({
            "elements": [{ "id": "a" }, { "id": "b" }],
            "appState": { "viewBackgroundColor": "#fff" },
            "files": {
                "img": {
                    "mimeType": "image/png",
                    "dataURL": "data:image/png;base64,iVBORw0KGgo=",
                    "created": 7
                }
            }
        })))
        .unwrap();

        assert_eq!(scene.element_count(), 2);
        assert_eq!(scene.files()["img"].created, Some(7));
    }

    #[test]
    fn missing_files_decode_as_empty() {
        let scene = decode_scene(record(json!({ "elements": [], "appState": {} }))).unwrap();
        assert!(scene.files().is_empty());
    }

    #[test]
    fn rejects_elements_that_are_not_an_array() {
        let err = decode_scene(record(json!({ "elements": {}, "appState": {} }))).unwrap_err();
        assert!(matches!(err, CodecError::WrongShape { field: "elements", .. }));
    }

    #[test]
    fn rejects_missing_app_state() {
        let err = decode_scene(record(json!({ "elements": [] }))).unwrap_err();
        assert!(matches!(err, CodecError::Missing { field: "appState" }));
    }

    #[test]
    fn rejects_non_base64_attachment() {
        let err = decode_scene(record(json!({
            "elements": [],
            "appState": {},
            "files": { "img": { "mimeType": "image/png", "dataURL": "data:image/png;base64,@@@" } }
        })))
        .unwrap_err();
        assert!(matches!(err, CodecError::InvalidBase64 { ref file_id, .. } if file_id == "img"));
    }

    #[test]
    fn rejects_attachment_entries_that_are_not_objects() {
        let err = decode_scene(record(json!({
            "elements": [],
            "appState": {},
            "files": { "x": 5 }
        })))
        .unwrap_err();
        assert!(matches!(err, CodecError::WrongShape { field: "files", .. }));
    }

    #[test]
    fn skips_attachments_without_data() {
        let scene = decode_scene(record(json!({
            "elements": [],
            "appState": {},
            "files": { "pending": { "mimeType": "image/png", "dataURL": "" } }
        })))
        .unwrap();
        assert!(scene.files().is_empty());
    }

    #[test]
    fn encoded_scene_decodes_to_the_same_value() {
        let original = decode_scene(record(json!({
            "elements": [{ "id": "a", "type": "ellipse" }],
            "appState": { "zoom": { "value": 1 } },
            "files": { "f": { "mimeType": "image/jpeg", "dataURL": "data:image/jpeg;base64,AAAA" } }
        })))
        .unwrap();

        assert_eq!(decode_scene(encode_scene(&original)).unwrap(), original);
    }
}
