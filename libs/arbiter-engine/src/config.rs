// Toolchain configuration for the execution engine
use anyhow::{bail, Context, Result};
use arbiter_common::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// A command line with `{source}`, `{dir}`, `{binary}` and `{entry}` placeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Values substituted into a [`CommandTemplate`]
#[derive(Debug, Clone, Copy)]
pub struct Placeholders<'a> {
    pub source: &'a str,
    pub dir: &'a str,
    pub binary: &'a str,
    pub entry: &'a str,
}

impl CommandTemplate {
    pub fn new(command: &str, args: &[&str]) -> Self {
        Self {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Substitute placeholders, returning the program and its arguments
    pub fn render(&self, vars: &Placeholders<'_>) -> (String, Vec<String>) {
        let fill = |template: &str| {
            template
                .replace("{source}", vars.source)
                .replace("{dir}", vars.dir)
                .replace("{binary}", vars.binary)
                .replace("{entry}", vars.entry)
        };
        (fill(&self.command), self.args.iter().map(|a| fill(a)).collect())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: Language,
    #[serde(default = "default_version")]
    pub version: String,
    pub file_extension: String,
    /// Present only for languages with a compile step
    #[serde(default)]
    pub compile: Option<CommandTemplate>,
    pub run: CommandTemplate,
}

fn default_version() -> String {
    "system".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageConfig>,
}

/// Language configuration manager
#[derive(Debug, Clone)]
pub struct LanguageConfigManager {
    configs: HashMap<Language, LanguageConfig>,
}

impl LanguageConfigManager {
    /// Load language configurations from languages.json
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    /// Load from `config_path` when it exists, otherwise use the built-in toolchains
    pub fn load_or_builtin(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let manager = Self::load(config_path)?;
            info!(
                path = %config_path.display(),
                languages = ?manager.list_languages(),
                "Loaded toolchain configuration"
            );
            Ok(manager)
        } else {
            warn!(
                path = %config_path.display(),
                "Toolchain config not found, using built-in defaults"
            );
            Ok(Self::builtin())
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson = serde_json::from_str(content)?;
        Self::from_configs(languages_json.languages)
    }

    pub fn from_configs(languages: Vec<LanguageConfig>) -> Result<Self> {
        let mut configs = HashMap::new();
        for lang in languages {
            if lang.file_extension.trim().is_empty() {
                bail!("Language '{}' has an empty file extension", lang.name);
            }
            if let Some(previous) = configs.insert(lang.name, lang) {
                bail!("Language '{}' is configured more than once", previous.name);
            }
        }
        if configs.is_empty() {
            bail!("No languages configured");
        }
        Ok(Self { configs })
    }

    /// Toolchains found on a typical Linux judge host
    pub fn builtin() -> Self {
        let languages = vec![
            LanguageConfig {
                name: Language::JavaScript,
                version: default_version(),
                file_extension: "js".to_string(),
                compile: None,
                run: CommandTemplate::new("node", &["{source}"]),
            },
            LanguageConfig {
                name: Language::Python,
                version: default_version(),
                file_extension: "py".to_string(),
                compile: None,
                run: CommandTemplate::new("python3", &["{source}"]),
            },
            LanguageConfig {
                name: Language::Java,
                version: default_version(),
                file_extension: "java".to_string(),
                compile: Some(CommandTemplate::new(
                    "javac",
                    &["-encoding", "UTF-8", "-d", "{dir}", "{source}"],
                )),
                run: CommandTemplate::new("java", &["-cp", "{dir}", "{entry}"]),
            },
            LanguageConfig {
                name: Language::Cpp,
                version: default_version(),
                file_extension: "cpp".to_string(),
                compile: Some(CommandTemplate::new(
                    "g++",
                    &["-std=c++17", "-O2", "{source}", "-o", "{binary}"],
                )),
                run: CommandTemplate::new("{binary}", &[]),
            },
        ];

        Self {
            configs: languages.into_iter().map(|l| (l.name, l)).collect(),
        }
    }

    /// Get configuration for a specific language
    pub fn get(&self, language: Language) -> Option<&LanguageConfig> {
        self.configs.get(&language)
    }

    /// List all configured languages
    pub fn list_languages(&self) -> Vec<Language> {
        let mut languages: Vec<Language> = self.configs.keys().copied().collect();
        languages.sort();
        languages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_all_languages() {
        let manager = LanguageConfigManager::builtin();
        assert_eq!(manager.list_languages(), Language::ALL.to_vec());
        for language in Language::ALL {
            let config = manager.get(language).unwrap();
            assert_eq!(config.compile.is_some(), language.is_compiled());
        }
    }

    #[test]
    fn test_render_placeholders() {
        let template = CommandTemplate::new("java", &["-cp", "{dir}", "{entry}"]);
        let vars = Placeholders {
            source: "/w/run_1/Main.java",
            dir: "/w/run_1",
            binary: "/w/run_1/main",
            entry: "Main",
        };
        let (program, args) = template.render(&vars);
        assert_eq!(program, "java");
        assert_eq!(args, vec!["-cp", "/w/run_1", "Main"]);

        let (program, args) = CommandTemplate::new("{binary}", &[]).render(&vars);
        assert_eq!(program, "/w/run_1/main");
        assert!(args.is_empty());
    }

    #[test]
    fn test_from_json() {
        let manager = LanguageConfigManager::from_json(
            r#"{"languages": [
                {"name": "python", "version": "3.12", "file_extension": "py",
                 "run": {"command": "python3", "args": ["-u", "{source}"]}}
            ]}"#,
        )
        .unwrap();
        let python = manager.get(Language::Python).unwrap();
        assert_eq!(python.version, "3.12");
        assert!(python.compile.is_none());
        assert!(manager.get(Language::Java).is_none());
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        let duplicate = r#"{"languages": [
            {"name": "cpp", "file_extension": "cpp", "run": {"command": "a"}},
            {"name": "cpp", "file_extension": "cc", "run": {"command": "b"}}
        ]}"#;
        assert!(LanguageConfigManager::from_json(duplicate).is_err());
        assert!(LanguageConfigManager::from_json(r#"{"languages": []}"#).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(LanguageConfigManager::load(Path::new("/nope/languages.json")).is_err());
        let manager = LanguageConfigManager::load_or_builtin(Path::new("/nope/languages.json")).unwrap();
        assert_eq!(manager.list_languages().len(), 4);
    }
}
