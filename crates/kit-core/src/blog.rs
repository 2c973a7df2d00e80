//! # Blog
//!
//! Admin-authored articles. Only published posts are publicly visible.

use crate::catalog::named_slug;
use crate::error::{MarketError, MarketResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> MarketResult<Self> {
        match value {
            "draft" => Ok(PostStatus::Draft),
            "published" => Ok(PostStatus::Published),
            "archived" => Ok(PostStatus::Archived),
            other => Err(MarketError::validation(
                "status",
                format!("unknown post status: {other}"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    /// Markdown source
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author_id: Uuid,
    pub status: PostStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlogPost {
    /// Publish the post; the first publish date is kept on re-publish
    pub fn publish(&mut self) {
        let now = Utc::now();
        self.status = PostStatus::Published;
        self.published_at.get_or_insert(now);
        self.updated_at = now;
    }

    pub fn archive(&mut self) {
        self.status = PostStatus::Archived;
        self.updated_at = Utc::now();
    }

    pub fn is_public(&self) -> bool {
        self.status == PostStatus::Published
    }
}

/// Input for creating or replacing a post
#[derive(Debug, Clone, Deserialize)]
pub struct NewBlogPost {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub body: String,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Length of the generated excerpt, in characters
const EXCERPT_CHARS: usize = 160;

impl NewBlogPost {
    pub fn into_post(self, author_id: Uuid) -> MarketResult<BlogPost> {
        if self.title.trim().is_empty() {
            return Err(MarketError::validation("title", "must not be empty"));
        }
        let (title, slug) = named_slug(&self.title, self.slug.as_deref())?;
        if self.body.trim().is_empty() {
            return Err(MarketError::validation("body", "must not be empty"));
        }
        let excerpt = self
            .excerpt
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| excerpt_from(&self.body));
        let now = Utc::now();
        Ok(BlogPost {
            id: Uuid::new_v4(),
            slug,
            title,
            excerpt,
            body: self.body,
            cover_image_url: self.cover_image_url,
            tags: normalize_tags(self.tags),
            author_id,
            status: PostStatus::Draft,
            published_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace content of an existing post, keeping identity and status
    pub fn apply_to(self, existing: &BlogPost) -> MarketResult<BlogPost> {
        let mut post = self.into_post(existing.author_id)?;
        post.id = existing.id;
        post.status = existing.status;
        post.published_at = existing.published_at;
        post.created_at = existing.created_at;
        Ok(post)
    }
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

fn excerpt_from(body: &str) -> String {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    match cut.rfind(' ') {
        Some(idx) => format!("{}…", &cut[..idx]),
        None => format!("{cut}…"),
    }
}

/// Listing filter for posts
#[derive(Debug, Clone, Deserialize)]
pub struct PostFilter {
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Largest page size a caller may request
pub const MAX_PER_PAGE: u32 = 50;

impl PostFilter {
    pub fn published() -> Self {
        Self {
            status: Some(PostStatus::Published),
            ..Self::default()
        }
    }

    pub fn matches(&self, post: &BlogPost) -> bool {
        self.status.map_or(true, |s| post.status == s)
            && self
                .tag
                .as_ref()
                .map_or(true, |t| post.tags.iter().any(|pt| pt == &t.to_lowercase()))
    }

    /// (limit, offset) with clamped page size; pages start at 1
    pub fn limit_offset(&self) -> (u32, u32) {
        let per_page = self.per_page.clamp(1, MAX_PER_PAGE);
        let page = self.page.max(1);
        (per_page, (page - 1).saturating_mul(per_page))
    }
}

impl Default for PostFilter {
    fn default() -> Self {
        Self {
            status: None,
            tag: None,
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    10
}
