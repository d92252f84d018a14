use std::path::{Path, PathBuf};

/// Where a pool instance's model weights ultimately came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelOrigin {
    Registry,
    BundledDefault,
}

/// Resolved model location handed to the worker pool.
#[derive(Debug, Clone)]
pub struct ModelSource {
    /// Path every new instance loads first.
    pub path: PathBuf,
    /// Path an instance degrades to when loading `path` fails.
    pub fallback_path: PathBuf,
    pub origin: ModelOrigin,
    pub model_name: String,
}

/// Artifact-download collaborator (the model registry is external to this
/// system; only the fetch contract is modeled).
pub trait ModelRegistry: Send + Sync {
    /// Download `artifact` and return the local path of the model file.
    fn fetch_artifact(
        &self,
        artifact: &str,
    ) -> impl Future<Output = anyhow::Result<PathBuf>> + Send;
}

/// Registry client downloading artifacts over HTTP into a cache directory.
pub struct HttpModelRegistry {
    client: reqwest::Client,
    base_url: String,
    cache_dir: PathBuf,
}

impl HttpModelRegistry {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, cache_dir: PathBuf) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            base_url,
            cache_dir,
        }
    }
}

impl ModelRegistry for HttpModelRegistry {
    async fn fetch_artifact(&self, artifact: &str) -> anyhow::Result<PathBuf> {
        let url = format!("{}/artifacts/{artifact}", self.base_url);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        // Artifact names may carry registry path separators.
        let file_name: String = artifact
            .chars()
            .map(|c| if c == '/' || c == ':' { '_' } else { c })
            .collect();

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let path = self.cache_dir.join(file_name);
        tokio::fs::write(&path, &bytes).await?;

        tracing::info!(artifact, path = %path.display(), "model artifact downloaded");
        Ok(path)
    }
}

/// Two-stage model resolution: try the registry artifact, fall back to the
/// bundled default. Which source won is recorded on the returned
/// [`ModelSource`] rather than signalled through errors.
pub async fn resolve_model<R: ModelRegistry>(
    registry: Option<&R>,
    artifact: Option<&str>,
    fallback_path: &Path,
) -> ModelSource {
    if let (Some(registry), Some(artifact)) = (registry, artifact) {
        match registry.fetch_artifact(artifact).await {
            Ok(path) => {
                return ModelSource {
                    path,
                    fallback_path: fallback_path.to_path_buf(),
                    origin: ModelOrigin::Registry,
                    model_name: artifact.to_string(),
                };
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    artifact,
                    "registry download failed, using bundled default model"
                );
            }
        }
    }

    let model_name = fallback_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("default")
        .to_string();

    ModelSource {
        path: fallback_path.to_path_buf(),
        fallback_path: fallback_path.to_path_buf(),
        origin: ModelOrigin::BundledDefault,
        model_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubRegistry {
        result: Result<PathBuf, String>,
    }

    impl ModelRegistry for StubRegistry {
        async fn fetch_artifact(&self, _artifact: &str) -> anyhow::Result<PathBuf> {
            match &self.result {
                Ok(path) => Ok(path.clone()),
                Err(msg) => Err(anyhow::anyhow!("{msg}")),
            }
        }
    }

    #[tokio::test]
    async fn successful_download_resolves_to_registry_origin() {
        let registry = StubRegistry {
            result: Ok(PathBuf::from("/tmp/cache/detector_v2.onnx")),
        };
        let source = resolve_model(
            Some(&registry),
            Some("team/detector:v2"),
            Path::new("/models/default.onnx"),
        )
        .await;

        assert_eq!(source.origin, ModelOrigin::Registry);
        assert_eq!(source.path, PathBuf::from("/tmp/cache/detector_v2.onnx"));
        assert_eq!(source.model_name, "team/detector:v2");
        assert_eq!(source.fallback_path, PathBuf::from("/models/default.onnx"));
    }

    #[tokio::test]
    async fn failed_download_degrades_to_bundled_default() {
        let registry = StubRegistry {
            result: Err("registry unreachable".to_string()),
        };
        let source = resolve_model(
            Some(&registry),
            Some("team/detector:v2"),
            Path::new("/models/default.onnx"),
        )
        .await;

        assert_eq!(source.origin, ModelOrigin::BundledDefault);
        assert_eq!(source.path, PathBuf::from("/models/default.onnx"));
        assert_eq!(source.model_name, "default");
    }

    #[tokio::test]
    async fn missing_registry_resolves_directly_to_default() {
        let source = resolve_model::<HttpModelRegistry>(
            None,
            None,
            Path::new("/models/default.onnx"),
        )
        .await;
        assert_eq!(source.origin, ModelOrigin::BundledDefault);
    }
}
