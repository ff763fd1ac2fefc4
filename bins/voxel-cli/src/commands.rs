// CLI commands for managing the voxel model registry
use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;

use voxel_core::registry::{ModelDescriptor, RegistryFile};

/// Load the registry file, treating a missing file as an empty registry
fn load_registry_file(path: &str) -> Result<RegistryFile> {
    if !Path::new(path).exists() {
        return Ok(RegistryFile { models: vec![] });
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path))
}

/// Save the registry file
fn save_registry_file(path: &str, file: &RegistryFile) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let json_content =
        serde_json::to_string_pretty(file).context("Failed to serialize registry")?;
    fs::write(path, json_content).with_context(|| format!("Failed to write {}", path))?;

    Ok(())
}

/// Register a new model
#[allow(clippy::too_many_arguments)]
pub fn add_model(
    config_path: &str,
    id: &str,
    image: &str,
    command: Vec<String>,
    output_filename: &str,
    metrics_filename: &str,
    timeout_ms: Option<u64>,
    pull: bool,
) -> Result<()> {
    println!("🚀 Adding model: {}", id);

    if id.is_empty() || image.is_empty() {
        bail!("Model id and image cannot be empty");
    }
    if command.is_empty() {
        bail!("Command template cannot be empty");
    }

    let mut registry = load_registry_file(config_path)?;

    if registry.models.iter().any(|m| m.id == id) {
        bail!("Model '{}' already exists in {}", id, config_path);
    }

    registry.models.push(ModelDescriptor {
        id: id.to_string(),
        image: image.to_string(),
        command,
        output_filename: output_filename.to_string(),
        metrics_filename: metrics_filename.to_string(),
        timeout_ms,
    });

    println!("📝 Updating {}...", config_path);
    save_registry_file(config_path, &registry)?;

    println!("✅ Model '{}' added successfully!", id);

    if pull {
        println!();
        pull_image(config_path, id)?;
    } else {
        println!("\n📋 Next steps:");
        println!("  1. Pre-pull the workload image: voxel-cli pull-image --id {}", id);
        println!("  2. Restart the gateway to pick up the new registry");
    }

    Ok(())
}

/// Remove a model from the registry
pub fn remove_model(config_path: &str, id: &str, yes: bool) -> Result<()> {
    let mut registry = load_registry_file(config_path)?;

    if !registry.models.iter().any(|m| m.id == id) {
        bail!("Model '{}' not found in {}", id, config_path);
    }

    if !yes {
        print!("Remove model '{}'? [y/N] ", id);
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }

    registry.models.retain(|m| m.id != id);
    save_registry_file(config_path, &registry)?;

    println!("✅ Model '{}' removed", id);
    println!("⚠️  Restart the gateway to pick up the change");

    Ok(())
}

/// List all registered models
pub fn list_models(config_path: &str) -> Result<()> {
    let registry = load_registry_file(config_path)?;

    if registry.models.is_empty() {
        println!("No models registered in {}", config_path);
        return Ok(());
    }

    println!("{:<16} {:<44} {:<20} TIMEOUT", "ID", "IMAGE", "OUTPUT");
    for model in &registry.models {
        let timeout = model
            .timeout_ms
            .map(|t| format!("{}ms", t))
            .unwrap_or_else(|| "default".to_string());
        println!(
            "{:<16} {:<44} {:<20} {}",
            model.id, model.image, model.output_filename, timeout
        );
    }

    Ok(())
}

/// Pre-pull a model's workload image via the docker CLI
pub fn pull_image(config_path: &str, id: &str) -> Result<()> {
    let registry = load_registry_file(config_path)?;

    let model = registry
        .models
        .iter()
        .find(|m| m.id == id)
        .with_context(|| format!("Model '{}' not found in {}", id, config_path))?;

    println!("🐳 Pulling image {} for model '{}'...", model.image, id);

    let status = Command::new("docker")
        .args(["pull", &model.image])
        .status()
        .context("Failed to run docker pull - is Docker installed?")?;

    if !status.success() {
        bail!("docker pull {} failed with {}", model.image, status);
    }

    println!("✅ Image {} is available", model.image);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_path(dir: &tempfile::TempDir) -> String {
        dir.path().join("models.json").to_string_lossy().into_owned()
    }

    fn sample_command() -> Vec<String> {
        vec![
            "--input".to_string(),
            "{input}/{filename}".to_string(),
            "--output_dir".to_string(),
            "{output}".to_string(),
        ]
    }

    #[test]
    fn test_add_model_creates_registry_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(&dir);

        add_model(
            &path,
            "unet_t1c",
            "mailabhaske/glioma_unet:latest",
            sample_command(),
            "output_image.png",
            "metrics.json",
            None,
            false,
        )
        .unwrap();

        let registry = load_registry_file(&path).unwrap();
        assert_eq!(registry.models.len(), 1);
        assert_eq!(registry.models[0].id, "unet_t1c");
        assert_eq!(registry.models[0].timeout_ms, None);
    }

    #[test]
    fn test_add_duplicate_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(&dir);

        add_model(
            &path,
            "unet_t1c",
            "mailabhaske/glioma_unet:latest",
            sample_command(),
            "output_image.png",
            "metrics.json",
            None,
            false,
        )
        .unwrap();

        let err = add_model(
            &path,
            "unet_t1c",
            "mailabhaske/glioma_unet:v2",
            sample_command(),
            "output_image.png",
            "metrics.json",
            None,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn test_add_model_rejects_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(&dir);

        let err = add_model(
            &path,
            "unet_t1c",
            "mailabhaske/glioma_unet:latest",
            vec![],
            "output_image.png",
            "metrics.json",
            None,
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Command template"));
    }

    #[test]
    fn test_remove_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(&dir);

        add_model(
            &path,
            "unet_t1c",
            "mailabhaske/glioma_unet:latest",
            sample_command(),
            "output_image.png",
            "metrics.json",
            Some(900_000),
            false,
        )
        .unwrap();

        remove_model(&path, "unet_t1c", true).unwrap();
        let registry = load_registry_file(&path).unwrap();
        assert!(registry.models.is_empty());
    }

    #[test]
    fn test_remove_missing_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(&dir);

        let err = remove_model(&path, "ghost", true).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_missing_registry_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = load_registry_file(&config_path(&dir)).unwrap();
        assert!(registry.models.is_empty());
    }

    #[test]
    fn test_saved_registry_is_loadable_by_core() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(&dir);

        add_model(
            &path,
            "nnunet",
            "mailabhaske/nnunet:latest",
            sample_command(),
            "output_image.png",
            "metrics.json",
            Some(900_000),
            false,
        )
        .unwrap();

        let registry = voxel_core::ModelRegistry::load_from_file(&path).unwrap();
        let model = registry.resolve("nnunet").unwrap();
        assert_eq!(model.timeout_ms, Some(900_000));
    }
}
