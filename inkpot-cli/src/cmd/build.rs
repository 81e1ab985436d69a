use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use inkpot_core::{BuildReport, SiteBuilder};
use std::path::Path;
use tracing::info;

use crate::config::InkpotConfig;

pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("content")
                .short('s')
                .long("content")
                .value_name("DIR")
                .help("Directory holding one folder of markdown posts per collection [default: ./content]"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for generated site [default: ./build]"),
        )
        .arg(
            Arg::new("theme")
                .short('t')
                .long("theme")
                .value_name("DIR")
                .help("Theme directory [default: ./theme]"),
        )
        .arg(
            Arg::new("examples")
                .short('e')
                .long("examples")
                .value_name("DIR")
                .help("Example pages copied to <output>/examples [default: ./examples]"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file [default: ./inkpot.toml]"),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build")).about("Build static site from markdown files")
}

pub fn build_site(inkpot_config: &InkpotConfig) -> Result<BuildReport> {
    let build_config = inkpot_config.build_config();

    let site = SiteBuilder::new()
        .content_dir(&build_config.content)
        .theme_dir(&build_config.theme)
        .output_dir(&build_config.output)
        .examples_dir(&build_config.examples)
        .site_config(inkpot_config.site_config().clone())
        .build()?;

    Ok(site.render_all()?)
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let inkpot_config = InkpotConfig::load_or_default(args);
    let report = build_site(&inkpot_config)?;

    info!(
        "Site built in {} ({} skipped)",
        Path::new(&inkpot_config.build.output).display(),
        report.skipped.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_from_cli_args() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("content/code")).unwrap();
        std::fs::create_dir_all(root.join("theme/templates")).unwrap();
        std::fs::write(root.join("theme/templates/page.html"), "{{ page.title }}").unwrap();
        std::fs::write(
            root.join("content/code/first-post.md"),
            "---\ntitle: First\ndate: 2025-03-04\n---\nHi\n",
        )
        .unwrap();

        let path = |p: &str| root.join(p).to_string_lossy().to_string();
        let matches = make_subcommand()
            .try_get_matches_from(vec![
                "build".to_string(),
                "--content".into(),
                path("content"),
                "--theme".into(),
                path("theme"),
                "--output".into(),
                path("out"),
                "--config".into(),
                path("missing.toml"),
            ])
            .unwrap();

        execute(&matches).unwrap();

        let html = std::fs::read_to_string(root.join("out/code/first-post/index.html")).unwrap();
        assert_eq!(html, "First");
    }

    #[test]
    fn test_missing_content_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = InkpotConfig::default();
        config.build.content = dir.path().join("nope").to_string_lossy().to_string();
        config.build.theme = dir.path().to_string_lossy().to_string();

        let err = build_site(&config).unwrap_err();
        assert!(err.to_string().contains("Content directory"));
    }
}
