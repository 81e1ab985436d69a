use anyhow::{Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use inkpot_core::slugify;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::InkpotConfig;

pub fn make_subcommand() -> Command {
    Command::new("new")
        .about("Create a new post with frontmatter filled in")
        .arg(
            Arg::new("title")
                .value_name("TITLE")
                .help("Post title")
                .required(true),
        )
        .arg(
            Arg::new("collection")
                .short('C')
                .long("collection")
                .value_name("NAME")
                .help("Collection to add the post to [default: first configured section]"),
        )
        .arg(
            Arg::new("date")
                .short('d')
                .long("date")
                .value_name("YYYY-MM-DD")
                .help("Post date [default: today]"),
        )
        .arg(
            Arg::new("slug")
                .long("slug")
                .value_name("SLUG")
                .help("File name for the post [default: derived from the title]"),
        )
        .arg(
            Arg::new("no-comments")
                .long("no-comments")
                .action(ArgAction::SetTrue)
                .help("Disable comments on the post"),
        )
        .arg(
            Arg::new("no-toc")
                .long("no-toc")
                .action(ArgAction::SetTrue)
                .help("Disable the table of contents"),
        )
        .arg(
            Arg::new("mermaid")
                .long("mermaid")
                .action(ArgAction::SetTrue)
                .help("Enable mermaid diagrams"),
        )
        .arg(
            Arg::new("codepen")
                .long("codepen")
                .action(ArgAction::SetTrue)
                .help("Enable CodePen embeds"),
        )
        .arg(
            Arg::new("force")
                .short('f')
                .long("force")
                .action(ArgAction::SetTrue)
                .help("Overwrite an existing post"),
        )
        .arg(
            Arg::new("content")
                .short('s')
                .long("content")
                .value_name("DIR")
                .help("Content directory [default: ./content]"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file [default: ./inkpot.toml]"),
        )
}

/// Feature switches written into the new post's frontmatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostFlags {
    pub comments: bool,
    pub toc: bool,
    pub mermaid: bool,
    pub codepen: bool,
}

impl Default for PostFlags {
    fn default() -> Self {
        Self {
            comments: true,
            toc: true,
            mermaid: false,
            codepen: false,
        }
    }
}

impl PostFlags {
    fn from_args(args: &ArgMatches) -> Self {
        Self {
            comments: !args.get_flag("no-comments"),
            toc: !args.get_flag("no-toc"),
            mermaid: args.get_flag("mermaid"),
            codepen: args.get_flag("codepen"),
        }
    }
}

pub struct NewPost<'a> {
    pub title: &'a str,
    pub collection: &'a str,
    pub date: String,
    /// Overrides the file name derived from the title.
    pub slug: Option<&'a str>,
    pub flags: PostFlags,
    pub force: bool,
}

fn yaml_quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

pub fn frontmatter(title: &str, date: &str, flags: &PostFlags) -> String {
    format!(
        "---\ntitle: {}\ndate: {}\ncomments: {}\ntoc: {}\nmermaid: {}\ncodepen: {}\n---\n\n",
        yaml_quote(title),
        date,
        flags.comments,
        flags.toc,
        flags.mermaid,
        flags.codepen
    )
}

/// Writes `<content>/<collection>/<slug>.md` and returns its path.
pub fn create_post(content_dir: &Path, sections: &[String], post: &NewPost) -> Result<PathBuf> {
    if !sections.iter().any(|s| s == post.collection) {
        bail!(
            "unknown collection '{}' (configured: {})",
            post.collection,
            sections.join(", ")
        );
    }

    let slug = match post.slug {
        Some(slug) => slugify(slug),
        None => slugify(post.title),
    };
    if slug.is_empty() {
        match post.slug {
            Some(given) => bail!("slug '{}' is not a usable file name", given),
            None => bail!("title '{}' does not produce a usable file name", post.title),
        }
    }

    let path = content_dir.join(post.collection).join(format!("{}.md", slug));
    if path.exists() && !post.force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, frontmatter(post.title, &post.date, &post.flags))?;

    Ok(path)
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let inkpot_config = InkpotConfig::load_or_default(args);
    let sections = &inkpot_config.site.sections;

    let Some(title) = args.get_one::<String>("title") else {
        bail!("a title is required");
    };
    let collection = match args.get_one::<String>("collection") {
        Some(name) => name.as_str(),
        None => match sections.first() {
            Some(first) => first.as_str(),
            None => bail!("no sections configured"),
        },
    };
    let date = args
        .get_one::<String>("date")
        .cloned()
        .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());

    let post = NewPost {
        title,
        collection,
        date,
        slug: args.get_one::<String>("slug").map(String::as_str),
        flags: PostFlags::from_args(args),
        force: args.get_flag("force"),
    };
    let path = create_post(Path::new(&inkpot_config.build.content), sections, &post)?;
    info!("Created {}", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections() -> Vec<String> {
        vec!["design".into(), "code".into()]
    }

    fn post<'a>(title: &'a str, collection: &'a str, force: bool) -> NewPost<'a> {
        NewPost {
            title,
            collection,
            date: "2026-01-02".into(),
            slug: None,
            flags: PostFlags::default(),
            force,
        }
    }

    #[test]
    fn test_creates_post_with_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_post(dir.path(), &sections(), &post("Hello, \"World\"!", "code", false))
            .unwrap();

        assert_eq!(path, dir.path().join("code/hello-world.md"));
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("---\ntitle: \"Hello, \\\"World\\\"!\"\ndate: 2026-01-02\n"));
        assert!(body.contains("comments: true\ntoc: true\nmermaid: false\ncodepen: false\n---"));
    }

    #[test]
    fn test_slug_overrides_title() {
        let dir = tempfile::tempdir().unwrap();
        let mut new_post = post("A Very Long Title", "code", false);
        new_post.slug = Some("Short Name");

        let path = create_post(dir.path(), &sections(), &new_post).unwrap();
        assert_eq!(path, dir.path().join("code/short-name.md"));
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.contains("title: \"A Very Long Title\"\n"));

        new_post.slug = Some("???");
        let err = create_post(dir.path(), &sections(), &new_post).unwrap_err();
        assert!(err.to_string().contains("slug '???'"));
    }

    #[test]
    fn test_feature_flags_from_args() {
        let parse = |extra: &[&str]| {
            let mut argv = vec!["new", "Title"];
            argv.extend_from_slice(extra);
            let matches = make_subcommand().try_get_matches_from(argv).unwrap();
            PostFlags::from_args(&matches)
        };

        assert_eq!(parse(&[]), PostFlags::default());
        assert!(!parse(&["--no-comments"]).comments);
        assert!(!parse(&["--no-toc"]).toc);
        assert!(parse(&["--mermaid"]).mermaid);
        assert!(parse(&["--codepen"]).codepen);

        let all = parse(&["--no-comments", "--no-toc", "--mermaid", "--codepen"]);
        let text = frontmatter("T", "2026-01-02", &all);
        assert!(text.contains("comments: false\ntoc: false\nmermaid: true\ncodepen: true\n"));
    }

    #[test]
    fn test_execute_writes_flags_and_slug() {
        let dir = tempfile::tempdir().unwrap();
        let content = dir.path().join("content");
        let matches = make_subcommand()
            .try_get_matches_from(vec![
                "new".to_string(),
                "Diagrams Everywhere".into(),
                "--collection".into(),
                "code".into(),
                "--date".into(),
                "2026-03-04".into(),
                "--slug".into(),
                "diagrams".into(),
                "--mermaid".into(),
                "--no-comments".into(),
                "--content".into(),
                content.to_string_lossy().to_string(),
                "--config".into(),
                dir.path().join("missing.toml").to_string_lossy().to_string(),
            ])
            .unwrap();

        execute(&matches).unwrap();

        let body = std::fs::read_to_string(content.join("code/diagrams.md")).unwrap();
        assert!(body.contains("date: 2026-03-04\n"));
        assert!(body.contains("comments: false\n"));
        assert!(body.contains("mermaid: true\n"));
        assert!(body.contains("toc: true\n"));
    }

    #[test]
    fn test_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        create_post(dir.path(), &sections(), &post("Again", "design", false)).unwrap();

        let err = create_post(dir.path(), &sections(), &post("Again", "design", false)).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        create_post(dir.path(), &sections(), &post("Again", "design", true)).unwrap();
    }

    #[test]
    fn test_rejects_unknown_collection() {
        let dir = tempfile::tempdir().unwrap();
        let err = create_post(dir.path(), &sections(), &post("X", "recipes", false)).unwrap_err();
        assert!(err.to_string().contains("unknown collection 'recipes'"));
    }

    #[test]
    fn test_rejects_unusable_title() {
        let dir = tempfile::tempdir().unwrap();
        assert!(create_post(dir.path(), &sections(), &post("!!!", "code", false)).is_err());
    }

    #[test]
    fn test_frontmatter_reads_back() {
        use inkpot_core::{ContentKind, ContentPipeline, SiteConfig, SyntectHighlighter};

        let title = "Quotes \\ \"here\"";
        let flags = PostFlags {
            mermaid: true,
            ..PostFlags::default()
        };
        let text = frontmatter(title, "2026-10-15", &flags);

        let config = SiteConfig::default();
        let highlighter = SyntectHighlighter::default();
        let item = ContentPipeline::new(&config, &highlighter)
            .parse(Path::new("code/quotes.md"), &text, ContentKind::Post)
            .unwrap();

        assert_eq!(item.title, title);
        assert_eq!(item.date, "2026-10-15");
        assert!(item.features.comments);
        assert!(item.features.mermaid);
        assert!(!item.features.codepen);
    }
}
