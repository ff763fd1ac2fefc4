use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::DispatchError;

/// Model Descriptor (Immutable Input)
/// Describes how to invoke one model's containerized workload and what the
/// workload is contractually required to leave behind in the job's output
/// directory. Descriptors are write-once - loaded at process start, never
/// mutated.
///
/// ## Command Template Semantics:
/// - `command` is a structured argv handed to the image's entrypoint
/// - Placeholders `{input}`, `{output}`, `{filename}` are substituted
///   per-element at dispatch time - nothing ever passes through a shell
/// - An attacker-controlled upload filename therefore cannot inject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub image: String,
    pub command: Vec<String>,
    #[serde(default = "default_output_filename")]
    pub output_filename: String,
    #[serde(default = "default_metrics_filename")]
    pub metrics_filename: String,
    /// Per-model timeout override; clamped to MAX_TIMEOUT_MS at dispatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn default_output_filename() -> String {
    "output_image.png".to_string()
}

fn default_metrics_filename() -> String {
    "metrics.json".to_string()
}

/// On-disk registry file format (config/models.json)
#[derive(Debug, Serialize, Deserialize)]
pub struct RegistryFile {
    pub models: Vec<ModelDescriptor>,
}

/// Model Registry
/// Process-wide, read-only after initialization. No mutation API, so no
/// locking - handlers share it behind an Arc.
#[derive(Debug)]
pub struct ModelRegistry {
    models: HashMap<String, ModelDescriptor>,
}

impl ModelRegistry {
    /// Build a registry from descriptors, rejecting duplicates and
    /// descriptors that could never execute (empty image or command).
    pub fn from_descriptors(
        descriptors: Vec<ModelDescriptor>,
    ) -> Result<Self, String> {
        let mut models = HashMap::new();
        for descriptor in descriptors {
            if descriptor.id.is_empty() {
                return Err("model id cannot be empty".to_string());
            }
            if descriptor.image.is_empty() {
                return Err(format!("model '{}' has an empty image", descriptor.id));
            }
            if models
                .insert(descriptor.id.clone(), descriptor.clone())
                .is_some()
            {
                return Err(format!("duplicate model id '{}'", descriptor.id));
            }
        }
        Ok(Self { models })
    }

    /// Load the registry from a JSON file (config/models.json)
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            format!("failed to read {}: {}", path.as_ref().display(), e)
        })?;
        let file: RegistryFile = serde_json::from_str(&content).map_err(|e| {
            format!("failed to parse {}: {}", path.as_ref().display(), e)
        })?;
        Self::from_descriptors(file.models)
    }

    /// Resolve a model id to its descriptor
    pub fn resolve(&self, model_id: &str) -> Result<&ModelDescriptor, DispatchError> {
        self.models
            .get(model_id)
            .ok_or_else(|| DispatchError::UnknownModel(model_id.to_string()))
    }

    /// All registered model ids, sorted for stable listings
    pub fn model_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.models.keys().map(|k| k.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// All descriptors, sorted by id
    pub fn descriptors(&self) -> Vec<&ModelDescriptor> {
        let mut all: Vec<&ModelDescriptor> = self.models.values().collect();
        all.sort_unstable_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn descriptor(id: &str) -> ModelDescriptor {
        ModelDescriptor {
            id: id.to_string(),
            image: format!("registry.example/{}:latest", id),
            command: vec![
                "--input".to_string(),
                "{input}/{filename}".to_string(),
                "--output_dir".to_string(),
                "{output}".to_string(),
            ],
            output_filename: "output_image.png".to_string(),
            metrics_filename: "metrics.json".to_string(),
            timeout_ms: None,
        }
    }

    #[test]
    fn test_resolve_known_model() {
        let registry =
            ModelRegistry::from_descriptors(vec![descriptor("unet_t1c")]).unwrap();
        let model = registry.resolve("unet_t1c").unwrap();
        assert_eq!(model.image, "registry.example/unet_t1c:latest");
    }

    #[test]
    fn test_resolve_unknown_model() {
        let registry =
            ModelRegistry::from_descriptors(vec![descriptor("unet_t1c")]).unwrap();
        let err = registry.resolve("nonexistent_model").unwrap_err();
        assert!(matches!(err, DispatchError::UnknownModel(id) if id == "nonexistent_model"));
    }

    #[test]
    fn test_every_registered_model_has_image() {
        let registry = ModelRegistry::from_descriptors(vec![
            descriptor("unet_t1c"),
            descriptor("deepmedic"),
            descriptor("nnunet"),
        ])
        .unwrap();

        for id in registry.model_ids() {
            let model = registry.resolve(id).unwrap();
            assert!(!model.image.is_empty());
        }
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = ModelRegistry::from_descriptors(vec![
            descriptor("unet_t1c"),
            descriptor("unet_t1c"),
        ])
        .unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn test_empty_image_rejected() {
        let mut bad = descriptor("broken");
        bad.image = String::new();
        let err = ModelRegistry::from_descriptors(vec![bad]).unwrap_err();
        assert!(err.contains("empty image"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "models": [
                    {{
                        "id": "unet_t1c",
                        "image": "mailabhaske/glioma_unet:latest",
                        "command": ["--input", "{{input}}/{{filename}}", "--output_dir", "{{output}}"]
                    }}
                ]
            }}"#
        )
        .unwrap();

        let registry = ModelRegistry::load_from_file(file.path()).unwrap();
        assert_eq!(registry.len(), 1);

        // Omitted contract fields fall back to the conventional names
        let model = registry.resolve("unet_t1c").unwrap();
        assert_eq!(model.output_filename, "output_image.png");
        assert_eq!(model.metrics_filename, "metrics.json");
        assert_eq!(model.timeout_ms, None);
    }

    #[test]
    fn test_load_missing_file() {
        let err = ModelRegistry::load_from_file("/nonexistent/models.json").unwrap_err();
        assert!(err.contains("failed to read"));
    }

    #[test]
    fn test_model_ids_sorted() {
        let registry = ModelRegistry::from_descriptors(vec![
            descriptor("nnunet"),
            descriptor("deepmedic"),
            descriptor("unet_t1c"),
        ])
        .unwrap();
        assert_eq!(registry.model_ids(), vec!["deepmedic", "nnunet", "unet_t1c"]);
    }
}
