//! Configuration file reading and validation.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::models::Environment;

/// Reader for environment configuration files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Environment> {
        let path = path.as_ref();
        debug!("Reading configuration from {:?}", path);

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn parse(content: &str) -> ConfigResult<Environment> {
        let env: Environment = serde_yaml::from_str(content)?;
        Self::validate(&env)?;
        Ok(env)
    }

    /// Check the fields the driver cannot do without.
    pub fn validate(env: &Environment) -> ConfigResult<()> {
        require("region", &env.region)?;
        require("organization", &env.organization)?;
        require("stackName", &env.stack_name)?;

        let mut names = HashSet::new();
        for (kind, project) in env.projects() {
            let key = format!("{}Project", kind);
            require(&format!("{}.location", key), &project.location)?;
            require(&format!("{}.name", key), &project.name)?;

            if !names.insert(project.name.as_str()) {
                return Err(ConfigError::DuplicateProject(project.name.clone()));
            }
        }

        Ok(())
    }
}

fn require(field: &str, value: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField(field.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
region: us-east-1
organization: acme
stackName: dev
baseProject:
  location: ../base
  name: base-infra
platformProject:
  location: ../platform
  name: k8s
appProject:
  location: ../app
  name: web
"#;

    #[test]
    fn test_parse_minimal() {
        let env = ConfigLoader::parse(MINIMAL).unwrap();
        assert_eq!(env.region, "us-east-1");
        assert_eq!(env.stack_name, "dev");
        assert!(env.data_project.is_none());
        assert!(!env.remote_deployment);
    }

    #[test]
    fn test_empty_required_string_rejected() {
        let yaml = MINIMAL.replace("organization: acme", "organization: \"\"");
        let err = ConfigLoader::parse(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "organization"));
    }

    #[test]
    fn test_empty_project_name_rejected() {
        let yaml = MINIMAL.replace("name: web", "name: \"\"");
        let err = ConfigLoader::parse(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "appProject.name"));
    }

    #[test]
    fn test_duplicate_project_names_rejected() {
        let yaml = MINIMAL.replace("name: web", "name: k8s");
        let err = ConfigLoader::parse(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateProject(ref n) if n == "k8s"));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = ConfigLoader::parse("region: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
