pub mod error;
pub mod model;
pub mod parser;

pub use error::*;
pub use model::{DeployConfig, EfsConfig, ProjectConfig, ReleaseConfig};
pub use parser::{parse_config_file, parse_config_str};

use std::path::PathBuf;

const CONFIG_CANDIDATES: [&str; 4] = [
    "lambdaflow.local.kdl",
    ".lambdaflow.local.kdl",
    "lambdaflow.kdl",
    ".lambdaflow.kdl",
];

/// プロジェクトのlambdaflow.kdlファイルを探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 LAMBDAFLOW_CONFIG_PATH (直接パス指定)
/// 2. カレントディレクトリ: lambdaflow.local.kdl, .lambdaflow.local.kdl, lambdaflow.kdl, .lambdaflow.kdl
/// 3. ./.lambdaflow/ ディレクトリ内: 同様の順序
/// 4. ~/.config/lambdaflow/lambdaflow.kdl (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var("LAMBDAFLOW_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(
            "LAMBDAFLOW_CONFIG_PATH points to a missing file: {}",
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;

    // 2. カレントディレクトリで検索
    for filename in &CONFIG_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    // 3. ./.lambdaflow/ ディレクトリで検索
    let local_dir = current_dir.join(".lambdaflow");
    if local_dir.is_dir() {
        for filename in &CONFIG_CANDIDATES {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    // 4. グローバル設定ファイル
    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("lambdaflow").join("lambdaflow.kdl");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// 設定ファイルを探してパース
pub fn load_project_config() -> Result<(PathBuf, ProjectConfig)> {
    let path = find_config_file()?;
    let config = parse_config_file(&path)?;
    Ok((path, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("lambdaflow.kdl"), "// test").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("lambdaflow.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("lambdaflow.kdl"), "// shared").unwrap();
        fs::write(temp_dir.path().join("lambdaflow.local.kdl"), "// local").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();
        std::env::set_current_dir(original_dir).unwrap();

        // lambdaflow.local.kdl が優先される
        assert!(result.unwrap().ends_with("lambdaflow.local.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_dot_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let dot_dir = temp_dir.path().join(".lambdaflow");
        fs::create_dir(&dot_dir).unwrap();
        fs::write(dot_dir.join("lambdaflow.kdl"), "// in dot dir").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".lambdaflow/lambdaflow.kdl"));
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.kdl");
        fs::write(&config_path, "// custom").unwrap();

        let result = temp_env::with_var("LAMBDAFLOW_CONFIG_PATH", Some(&config_path), || {
            find_config_file()
        });

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    #[serial]
    fn test_load_project_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(
            temp_dir.path().join("lambdaflow.kdl"),
            r#"app "orders-svc"
deploy { memory 1024 }"#,
        )
        .unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = load_project_config();
        std::env::set_current_dir(original_dir).unwrap();

        let (_, config) = result.unwrap();
        assert_eq!(config.app.as_deref(), Some("orders-svc"));
        assert_eq!(config.deploy.memory, Some(1024));
    }
}
