use crate::mirror::util::slugify;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One mirrored post as persisted in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub title: String,
    pub link: String,
    pub slug: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub body_html: String,
}

/// Dev.to sends `tag_list` as an array on list endpoints and as a
/// comma-separated string on the single-article endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TagField {
    List(Vec<String>),
    Text(String),
}

/// Article record exactly as the remote API returns it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawArticle {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub canonical_url: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub edited_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub tag_list: Option<TagField>,
    #[serde(default)]
    pub tags: Option<TagField>,
    #[serde(default)]
    pub body_html: Option<String>,
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn normalize_tags(field: Option<&TagField>) -> Vec<String> {
    match field {
        None => Vec::new(),
        Some(TagField::List(list)) => list
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect(),
        Some(TagField::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                Vec::new()
            } else if text.contains(',') {
                text.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(ToOwned::to_owned)
                    .collect()
            } else {
                text.split_whitespace().map(ToOwned::to_owned).collect()
            }
        }
    }
}

/// `https://dev.to/<user>/<slug>` keeps the id suffix Dev.to appends to
/// slugs, which the API `slug` field sometimes lacks.
fn slug_from_link(link: &str) -> Option<String> {
    let (_, rest) = link.split_once("//")?;
    let mut parts = rest.split('/');
    let _domain = parts.next()?;
    let _user = parts.next()?;
    let slug = parts.next()?.split(['?', '#']).next()?.trim();
    (!slug.is_empty()).then(|| slug.to_string())
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl RawArticle {
    /// Validate into an archive item. Any record missing identity, title,
    /// link or a parseable publish time is rejected.
    pub fn into_item(self) -> Result<Item, String> {
        if self.id == 0 {
            return Err("article id must be non-zero".to_string());
        }
        let title = non_empty(self.title.as_ref())
            .ok_or_else(|| format!("article {} has no title", self.id))?
            .to_string();
        let link = non_empty(self.url.as_ref())
            .or_else(|| non_empty(self.canonical_url.as_ref()))
            .ok_or_else(|| format!("article {} has no url", self.id))?
            .to_string();
        let published_raw = non_empty(self.published_at.as_ref())
            .ok_or_else(|| format!("article {} has no published_at", self.id))?;
        let published_at = parse_timestamp(published_raw).ok_or_else(|| {
            format!(
                "article {} has invalid published_at `{published_raw}`",
                self.id
            )
        })?;
        let updated_at = non_empty(self.edited_at.as_ref())
            .or_else(|| non_empty(self.updated_at.as_ref()))
            .and_then(parse_timestamp);

        let slug = slug_from_link(&link)
            .or_else(|| non_empty(self.slug.as_ref()).map(ToOwned::to_owned))
            .unwrap_or_else(|| {
                let s = slugify(&title);
                if s.is_empty() { "post".to_string() } else { s }
            });

        let tags = match self.tag_list.as_ref() {
            Some(field) => normalize_tags(Some(field)),
            None => normalize_tags(self.tags.as_ref()),
        };

        Ok(Item {
            id: self.id,
            title,
            link,
            slug,
            published_at,
            updated_at,
            description: self.description.unwrap_or_default().trim().to_string(),
            cover_image: self.cover_image.unwrap_or_default().trim().to_string(),
            tags,
            body_html: self.body_html.unwrap_or_default(),
        })
    }
}

impl Item {
    /// Fold a freshly fetched version of this item into the stored one.
    ///
    /// Payload fields come from `fetched`. `id`, `link` and `slug` stay as
    /// stored, and `published_at` keeps the later of the two so a record
    /// never moves backwards in the listing.
    pub fn absorb(&mut self, fetched: Item) {
        debug_assert_eq!(self.id, fetched.id);
        let published_at = self.published_at.max(fetched.published_at);
        let keep_link = !self.link.is_empty();
        let (link, slug) = if keep_link {
            (std::mem::take(&mut self.link), std::mem::take(&mut self.slug))
        } else {
            (fetched.link.clone(), fetched.slug.clone())
        };
        *self = Item {
            link,
            slug,
            published_at,
            ..fetched
        };
    }
}
