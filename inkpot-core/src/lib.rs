pub mod assets;
pub mod builder;
pub mod config;
pub mod content;
pub mod expand;
pub mod filters;
pub mod highlight;
pub mod markdown;
pub mod protect;
pub mod store;
pub mod template;

// Re-export main types
pub use builder::{BuildError, BuildPhase, BuildReport, Site, SiteBuilder, SkippedItem};
pub use config::SiteConfig;
pub use content::{ContentItem, ContentKind, ContentPipeline, ContentReadError, Features};
pub use expand::DirectiveExpander;
pub use highlight::{Highlighter, SyntectHighlighter};
pub use markdown::slugify;
pub use store::{CollectionStore, StoreBuilder};
pub use template::{TemplateEngine, TemplateError, TeraEngine};
