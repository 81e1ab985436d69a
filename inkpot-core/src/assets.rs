use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tera::Context;
use walkdir::WalkDir;

use crate::config::FontConfig;
use crate::template::{TemplateEngine, TemplateError};

/// CSS weight for a weight name such as `SemiBold`. Unknown names are 400.
pub fn font_weight(name: &str) -> &'static str {
    match name.to_lowercase().as_str() {
        "thin" => "100",
        "extralight" => "200",
        "light" => "300",
        "regular" => "400",
        "medium" => "500",
        "semibold" => "600",
        "bold" => "700",
        "extrabold" => "800",
        "black" => "900",
        _ => "400",
    }
}

#[derive(Debug, Serialize)]
pub struct FontFace<'a> {
    pub weight: &'a str,
    pub weight_num: &'static str,
    #[serde(flatten)]
    pub extra: &'a BTreeMap<String, serde_json::Value>,
}

pub fn font_faces(fonts: &[FontConfig]) -> Vec<FontFace<'_>> {
    fonts
        .iter()
        .map(|font| FontFace {
            weight: &font.weight,
            weight_num: font_weight(&font.weight),
            extra: &font.extra,
        })
        .collect()
}

/// Renders the stylesheet template to `<output>/assets/<template>`.
pub fn generate_css(
    engine: &dyn TemplateEngine,
    template: &str,
    fonts: &[FontConfig],
    output_dir: &Path,
) -> Result<(), TemplateError> {
    let mut context = Context::new();
    context.insert("fonts", &font_faces(fonts));
    engine.render_to_file(template, &context, &output_dir.join("assets").join(template))
}

/// Removes and recreates the output directory.
pub fn clean_output_dir(output_dir: &Path) -> std::io::Result<()> {
    if output_dir.exists() {
        std::fs::remove_dir_all(output_dir)?;
    }
    std::fs::create_dir_all(output_dir)
}

/// Copies `src` into `dst` recursively, skipping top-level entries named in
/// `exclude`. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path, exclude: &[&str]) -> std::io::Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(src).min_depth(1).into_iter().filter_entry(|e| {
        e.depth() != 1 || !exclude.iter().any(|name| e.file_name() == *name)
    }) {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(std::io::Error::other)?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TeraEngine;

    #[test]
    fn test_font_weight_names() {
        assert_eq!(font_weight("Thin"), "100");
        assert_eq!(font_weight("SemiBold"), "600");
        assert_eq!(font_weight("BLACK"), "900");
        assert_eq!(font_weight("Regular"), "400");
        assert_eq!(font_weight("heavy"), "400");
    }

    #[test]
    fn test_generate_css() {
        let dir = tempfile::tempdir().unwrap();
        let mut tera = tera::Tera::default();
        tera.add_raw_template(
            "site.css",
            "{% for f in fonts %}@font-face { font-family: {{ f.family }}; font-weight: {{ f.weight_num }}; }\n{% endfor %}",
        )
        .unwrap();
        let engine = TeraEngine::from_tera(tera);

        let fonts = vec![FontConfig {
            weight: "Bold".into(),
            extra: BTreeMap::from([("family".to_string(), serde_json::json!("Inter"))]),
        }];
        generate_css(&engine, "site.css", &fonts, dir.path()).unwrap();

        let css = std::fs::read_to_string(dir.path().join("assets/site.css")).unwrap();
        assert_eq!(css, "@font-face { font-family: Inter; font-weight: 700; }\n");
    }

    #[test]
    fn test_copy_tree_skips_excluded() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("img")).unwrap();
        std::fs::write(src.path().join("img/logo.png"), "png").unwrap();
        std::fs::write(src.path().join("site.css"), "template").unwrap();
        std::fs::write(src.path().join("app.js"), "js").unwrap();

        let copied = copy_tree(src.path(), dst.path(), &["site.css"]).unwrap();

        assert_eq!(copied, 2);
        assert!(dst.path().join("img/logo.png").exists());
        assert!(dst.path().join("app.js").exists());
        assert!(!dst.path().join("site.css").exists());
    }

    #[test]
    fn test_clean_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("build");
        std::fs::create_dir_all(out.join("old")).unwrap();
        std::fs::write(out.join("old/index.html"), "stale").unwrap();

        clean_output_dir(&out).unwrap();

        assert!(out.exists());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
    }
}
