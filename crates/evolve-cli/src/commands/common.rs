//! Pieces shared by several commands.

use anyhow::{Context, Result};
use evolve_core::{EvolveConfig, Language};
use evolve_llm::ProviderRouter;
use evolve_sandbox::DockerSandbox;
use evolve_validator::Validator;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Path argument meaning standard input.
pub const STDIN_PATH: &str = "-";

/// Builds the provider router from the `[llm]` section.
pub fn build_router(config: &EvolveConfig) -> Result<Arc<ProviderRouter>> {
    let router =
        ProviderRouter::from_config(&config.llm).context("failed to configure LLM providers")?;
    Ok(Arc::new(router))
}

/// Builds a validator backed by the configured providers and Docker.
pub fn build_validator(config: &EvolveConfig, router: Arc<ProviderRouter>) -> Validator {
    Validator::builder(config)
        .router(router)
        .sandbox(Arc::new(DockerSandbox::new()))
        .build()
}

/// Reads source code from a file, or from stdin for `-`.
pub async fn read_source(path: &Path) -> Result<String> {
    if path.as_os_str() == STDIN_PATH {
        let mut code = String::new();
        tokio::io::stdin()
            .read_to_string(&mut code)
            .await
            .context("failed to read code from stdin")?;
        return Ok(code);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

/// Guesses the language from a file extension.
#[must_use]
pub fn infer_language(path: &Path) -> Option<Language> {
    let extension = path.extension()?.to_str()?;
    Language::ALL
        .into_iter()
        .find(|language| language.extension().eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_language() {
        assert_eq!(infer_language(Path::new("a.py")), Some(Language::Python));
        assert_eq!(infer_language(Path::new("dir/b.JS")), Some(Language::Javascript));
        assert_eq!(infer_language(Path::new("run.sh")), Some(Language::Bash));
        assert_eq!(infer_language(Path::new("x.cpp")), Some(Language::Cpp));
        assert_eq!(infer_language(Path::new("notes.txt")), None);
        assert_eq!(infer_language(Path::new("-")), None);
    }

    #[tokio::test]
    async fn test_read_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.py");
        std::fs::write(&path, "print('hi')\n").unwrap();

        assert_eq!(read_source(&path).await.unwrap(), "print('hi')\n");
    }

    #[tokio::test]
    async fn test_read_source_missing() {
        let err = read_source(Path::new("/nonexistent/evolve/x.py"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_build_router_from_defaults() {
        let router = build_router(&EvolveConfig::default()).unwrap();
        assert_eq!(router.providers().len(), 4);
    }
}
