use indexmap::IndexMap;

use crate::content::ContentItem;

/// Newest first. Dates are zero-padded text, so a plain string comparison is
/// enough. `sort_by` is stable, which keeps discovery order among ties.
fn sort_newest_first(posts: &mut [&ContentItem]) {
    posts.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Collects posts while content is being read. Turned into a read-only
/// [`CollectionStore`] once every file has been parsed.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    collections: IndexMap<String, Vec<ContentItem>>,
}

impl StoreBuilder {
    /// One (possibly empty) collection per configured name, in config order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            collections: names.into_iter().map(|n| (n.into(), Vec::new())).collect(),
        }
    }

    pub fn push(&mut self, post: ContentItem) {
        self.collections
            .entry(post.collection.clone())
            .or_default()
            .push(post);
    }

    pub fn finish(mut self) -> CollectionStore {
        for posts in self.collections.values_mut() {
            posts.sort_by(|a, b| b.date.cmp(&a.date));
        }
        CollectionStore {
            collections: self.collections,
        }
    }
}

/// Every post of the build, grouped by collection and sorted newest first.
#[derive(Debug, Default)]
pub struct CollectionStore {
    collections: IndexMap<String, Vec<ContentItem>>,
}

impl CollectionStore {
    pub fn collection(&self, name: &str) -> &[ContentItem] {
        self.collections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn collections(&self) -> impl Iterator<Item = (&str, &[ContentItem])> {
        self.collections
            .iter()
            .map(|(name, posts)| (name.as_str(), posts.as_slice()))
    }

    /// Every post across collections, newest first. Recomputed on each call.
    pub fn all_posts(&self) -> Vec<&ContentItem> {
        let mut all: Vec<&ContentItem> = self.collections.values().flatten().collect();
        sort_newest_first(&mut all);
        all
    }

    pub fn recent(&self, limit: usize) -> Vec<&ContentItem> {
        let mut all = self.all_posts();
        all.truncate(limit);
        all
    }

    pub fn len(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
