use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File};
use inkpot_core::SiteConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "./inkpot.toml";

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InkpotConfig {
    /// Where things are read from and written to
    #[serde(default)]
    pub build: BuildConfig,
    /// Site configuration (from inkpot-core)
    #[serde(flatten)]
    pub site: SiteConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Root holding one directory per collection
    pub content: String,
    /// Theme directory (templates, sections, assets)
    pub theme: String,
    /// Output directory for generated site
    pub output: String,
    /// Demo pages copied next to the site for `[example:N]`
    pub examples: String,
    /// Configuration file path
    pub config: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content: "./content".to_string(),
            theme: "./theme".to_string(),
            output: "./build".to_string(),
            examples: "./examples".to_string(),
            config: DEFAULT_CONFIG_FILE.to_string(),
        }
    }
}

/// Flag id → config key. Only flags defined on the running subcommand are read.
const CLI_KEYS: [(&str, &str); 5] = [
    ("content", "build.content"),
    ("theme", "build.theme"),
    ("output", "build.output"),
    ("examples", "build.examples"),
    ("config", "build.config"),
];

/// `INKPOT_POST_LIMIT=3`, `INKPOT_META__TITLE=...`, `INKPOT_SECTIONS=notes,code`
fn environment() -> Environment {
    Environment::with_prefix("INKPOT")
        .prefix_separator("_")
        .separator("__") // Use double underscore for nested keys
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("sections")
}

fn cli_value<'a>(args: &'a ArgMatches, id: &str) -> Option<&'a String> {
    args.try_get_one::<String>(id).ok().flatten()
}

impl InkpotConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (INKPOT_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        Self::load_with(args, environment())
    }

    fn load_with(args: &ArgMatches, env: Environment) -> Result<Self> {
        let config_file = cli_value(args, "config")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        let defaults = Self::default();
        builder = builder.add_source(ConfigBuilder::try_from(&defaults)?);

        // 2. Add configuration file if it exists
        if Path::new(&config_file).exists() {
            builder = builder.add_source(File::from(Path::new(&config_file)));
        }

        // 3. Add environment variables with INKPOT_ prefix
        builder = builder.add_source(env);

        // 4. Override with CLI arguments (highest priority)
        let cli_overrides: HashMap<String, String> = CLI_KEYS
            .iter()
            .filter_map(|(id, key)| cli_value(args, id).map(|v| (key.to_string(), v.clone())))
            .collect();

        if !cli_overrides.is_empty() {
            builder = builder.add_source(ConfigBuilder::try_from(&cli_overrides)?);
        }

        let config = builder.build()?;
        let inkpot_config: InkpotConfig = config.try_deserialize()?;

        Ok(inkpot_config)
    }

    /// Like [`InkpotConfig::load`], but a broken config only costs a warning.
    /// CLI paths still apply on top of the defaults.
    pub fn load_or_default(args: &ArgMatches) -> Self {
        match Self::load(args) {
            Ok(config) => config,
            Err(e) => {
                warn!("Could not load configuration, using defaults: {:#}", e);
                let mut config = Self::default();
                config.apply_cli_paths(args);
                config
            }
        }
    }

    fn apply_cli_paths(&mut self, args: &ArgMatches) {
        let build = &mut self.build;
        for (id, field) in [
            ("content", &mut build.content),
            ("theme", &mut build.theme),
            ("output", &mut build.output),
            ("examples", &mut build.examples),
            ("config", &mut build.config),
        ] {
            if let Some(value) = cli_value(args, id) {
                *field = value.clone();
            }
        }
    }

    /// Get just the site configuration for passing to inkpot-core
    pub fn site_config(&self) -> &SiteConfig {
        &self.site
    }

    /// Get the build configuration
    pub fn build_config(&self) -> &BuildConfig {
        &self.build
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, Command};

    fn command() -> Command {
        Command::new("test")
            .arg(Arg::new("content").long("content").value_name("DIR"))
            .arg(Arg::new("output").long("output").value_name("DIR"))
            .arg(Arg::new("config").long("config").value_name("FILE"))
    }

    #[test]
    fn test_default_config() {
        let config = InkpotConfig::default();
        assert_eq!(config.build.content, "./content");
        assert_eq!(config.build.output, "./build");
        assert_eq!(config.build.theme, "./theme");
        assert_eq!(config.site.post_limit, 10);
    }

    #[test]
    fn test_cli_args_override() {
        let matches = command()
            .try_get_matches_from(vec![
                "test",
                "--content",
                "/custom/content",
                "--output",
                "/custom/output",
                "--config",
                "/nonexistent/inkpot.toml",
            ])
            .unwrap();

        let config = InkpotConfig::load(&matches).unwrap();
        assert_eq!(config.build.content, "/custom/content");
        assert_eq!(config.build.output, "/custom/output");
        // Should still have defaults for non-overridden values
        assert_eq!(config.build.theme, "./theme");
    }

    #[test]
    fn test_config_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("inkpot.toml");
        std::fs::write(
            &file,
            r#"
post_limit = 3
sections = ["notes"]

[build]
output = "./public"

[meta]
title = "Field Notes"
"#,
        )
        .unwrap();

        let matches = command()
            .try_get_matches_from(vec!["test", "--config", file.to_str().unwrap()])
            .unwrap();
        let config = InkpotConfig::load(&matches).unwrap();

        assert_eq!(config.site.post_limit, 3);
        assert_eq!(config.site.sections, vec!["notes".to_string()]);
        assert_eq!(config.site.meta.title, "Field Notes");
        assert_eq!(config.build.output, "./public");
        assert_eq!(config.site.feed_limit, 10);
    }

    #[test]
    fn test_env_layer_parses_numbers_and_lists() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("inkpot.toml");
        std::fs::write(&file, "[meta]\ntitle = \"Field Notes\"\n").unwrap();

        let vars: config::Map<String, String> = [
            ("INKPOT_POST_LIMIT", "3"),
            ("INKPOT_SECTIONS", "notes,code"),
            ("INKPOT_BUILD__OUTPUT", "./public"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let matches = command()
            .try_get_matches_from(vec!["test", "--config", file.to_str().unwrap()])
            .unwrap();
        let config = InkpotConfig::load_with(&matches, environment().source(Some(vars))).unwrap();

        assert_eq!(config.site.post_limit, 3);
        assert_eq!(
            config.site.sections,
            vec!["notes".to_string(), "code".to_string()]
        );
        assert_eq!(config.site.meta.title, "Field Notes");
        assert_eq!(config.build.output, "./public");
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("inkpot.toml");
        std::fs::write(&file, "post_limit = [not toml").unwrap();

        let matches = command()
            .try_get_matches_from(vec![
                "test",
                "--config",
                file.to_str().unwrap(),
                "--output",
                "/tmp/site",
            ])
            .unwrap();

        assert!(InkpotConfig::load(&matches).is_err());
        let config = InkpotConfig::load_or_default(&matches);
        assert_eq!(config.site.post_limit, 10);
        assert_eq!(config.build.output, "/tmp/site");
    }
}
