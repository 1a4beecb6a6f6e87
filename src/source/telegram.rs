//! Public Telegram channel adapter
//!
//! Reads the channel web preview (`https://t.me/s/<channel>`), which needs no
//! session. Older posts are paged with `?before=<id>`. A listing page already
//! contains every post in full, so posts are parsed while listing and
//! `fetch_and_parse` only hands back the cached record. Posts missing a date
//! are still listed and parse to nothing.

use crate::crawler::Requester;
use crate::record::{Candidate, Record};
use crate::source::{element_text, parse_datetime, SourceAdapter};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

/// Preview host used when a source doesn't set `base_url`
pub const DEFAULT_TELEGRAM_BASE: &str = "https://t.me";

/// Longest header cut from a post's first line
const MAX_HEADER_CHARS: usize = 160;

/// One message found on a preview page
#[derive(Debug, Clone)]
struct PreviewPost {
    id: u64,
    /// `None` when a required field is missing
    record: Option<Record>,
}

/// Adapter for one public channel
pub struct TelegramPreviewAdapter {
    source_name: String,
    channel: String,
    base_url: String,
    requester: Requester,
    /// Lowest message id seen on the previous listing page
    next_before: Option<u64>,
    cache: HashMap<String, Record>,
}

impl TelegramPreviewAdapter {
    /// Creates an adapter for `channel`, which must already be normalized
    pub fn new(
        source_name: impl Into<String>,
        channel: impl Into<String>,
        base_url: Option<&str>,
        requester: Requester,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            channel: channel.into(),
            base_url: base_url
                .unwrap_or(DEFAULT_TELEGRAM_BASE)
                .trim_end_matches('/')
                .to_string(),
            requester,
            next_before: None,
            cache: HashMap::new(),
        }
    }

    fn listing_url(&self, page: u32) -> Option<String> {
        let root = format!("{}/s/{}", self.base_url, self.channel);
        match (page, self.next_before) {
            (0, _) => None,
            (1, _) => Some(root),
            (_, Some(before)) => Some(format!("{}?before={}", root, before)),
            (_, None) => None,
        }
    }
}

#[async_trait]
impl SourceAdapter for TelegramPreviewAdapter {
    fn name(&self) -> &str {
        &self.source_name
    }

    async fn list_candidates(&mut self, page: u32) -> crate::Result<Vec<Candidate>> {
        if page <= 1 {
            self.next_before = None;
            self.cache.clear();
        }

        let Some(url) = self.listing_url(page) else {
            return Ok(Vec::new());
        };

        let html = self.requester.fetch(&url).await?;
        let posts = parse_preview_page(&html, &self.channel, &self.source_name);
        tracing::debug!(channel = %self.channel, page, posts = posts.len(), "preview parsed");

        self.next_before = posts.iter().map(|p| p.id).min();

        let mut candidates = Vec::with_capacity(posts.len());
        for post in posts {
            let reference = format!("{}/{}", self.channel, post.id);
            let published_at = post.record.as_ref().map(Record::published_at);
            candidates.push(Candidate::new(reference.clone(), published_at));
            match post.record {
                Some(record) => {
                    self.cache.insert(reference, record);
                }
                None => {
                    tracing::debug!(channel = %self.channel, id = post.id, "post without date or content");
                }
            }
        }

        Ok(candidates)
    }

    async fn fetch_and_parse(&mut self, candidate: &Candidate) -> crate::Result<Option<Record>> {
        Ok(self.cache.remove(&candidate.reference))
    }

    /// Posts are identified by channel and message id, not by content
    fn dedup_key(&self, record: &Record) -> String {
        let id = record
            .origin_ref()
            .and_then(|r| r.rsplit('/').next())
            .unwrap_or_default();
        format!("{}:{}", self.channel, id)
    }
}

/// Normalizes a channel reference into a bare username
///
/// Accepts `name`, `@name`, `t.me/name`, `https://t.me/name/123?x` and
/// `https://t.me/s/name`. Private invite links and anything that is not a
/// plain username are rejected.
///
/// # Examples
///
/// ```
/// use newsline::source::normalize_channel;
///
/// assert_eq!(normalize_channel("@rian_ru").as_deref(), Some("rian_ru"));
/// assert_eq!(normalize_channel("https://t.me/+AbCdEf"), None);
/// ```
pub fn normalize_channel(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() || value.starts_with('#') {
        return None;
    }

    let lowered = value.to_lowercase();
    if lowered.contains("t.me/+") || lowered.contains("joinchat") {
        return None;
    }

    let mut value = value;
    for scheme in ["https://", "http://"] {
        if lowered.starts_with(scheme) {
            value = &value[scheme.len()..];
            break;
        }
    }
    if value.to_lowercase().starts_with("t.me/") {
        value = &value[5..];
    }
    if let Some(rest) = value.strip_prefix("s/") {
        value = rest;
    }
    let value = value.trim_start_matches('@');
    let value = value.split(['?', '#']).next().unwrap_or_default();
    let value = value.trim().trim_matches('/');
    let value = value.split('/').next().unwrap_or_default();

    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then(|| value.to_string())
}

/// Lowercased `#hashtags` found in a post, first occurrence order
pub fn extract_hashtags(text: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r"#(\w+)") else {
        return Vec::new();
    };

    let mut tags: Vec<String> = Vec::new();
    for capture in re.captures_iter(text) {
        let tag = capture[1].to_lowercase();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Parses every post on a preview page
fn parse_preview_page(html: &str, channel: &str, source_name: &str) -> Vec<PreviewPost> {
    let document = Html::parse_document(html);
    let Ok(message_selector) = Selector::parse("div.tgme_widget_message[data-post]") else {
        return Vec::new();
    };

    document
        .select(&message_selector)
        .filter_map(|message| parse_post(message, channel, source_name))
        .collect()
}

fn parse_post(message: ElementRef<'_>, channel: &str, source_name: &str) -> Option<PreviewPost> {
    let post = message.value().attr("data-post")?;
    let (post_channel, id) = post.rsplit_once('/')?;
    if !post_channel.eq_ignore_ascii_case(channel) {
        return None;
    }
    let id: u64 = id.parse().ok()?;

    Some(PreviewPost {
        id,
        record: post_record(message, channel, id, source_name),
    })
}

fn post_record(message: ElementRef<'_>, channel: &str, id: u64, source_name: &str) -> Option<Record> {
    let time_selector = Selector::parse("time[datetime]").ok()?;
    let published_at = message
        .select(&time_selector)
        .find_map(|t| t.value().attr("datetime"))
        .and_then(parse_datetime)?;

    let text = post_text(message);
    let header = header_from_text(&text).unwrap_or_else(|| format!("{}/{}", channel, id));
    let hashtags = extract_hashtags(&text);

    Record::new(
        header,
        text,
        published_at,
        hashtags,
        source_name,
        Some(format!("https://t.me/{}/{}", channel, id)),
    )
    .ok()
}

/// Post text with `<br>` line breaks kept
fn post_text(message: ElementRef<'_>) -> String {
    let Ok(selector) = Selector::parse("div.tgme_widget_message_text") else {
        return String::new();
    };
    let Some(node) = message.select(&selector).next() else {
        return String::new();
    };

    // scraper drops <br>; rebuild lines from the serialized fragment
    let inner = node.inner_html().replace("<br>", "\n").replace("<br/>", "\n");
    let fragment = Html::parse_fragment(&inner);
    let lines: Vec<String> = fragment
        .root_element()
        .text()
        .collect::<String>()
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        element_text(node)
    } else {
        lines.join("\n")
    }
}

fn header_from_text(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    if line.chars().count() <= MAX_HEADER_CHARS {
        return Some(line.to_string());
    }
    let mut header: String = line.chars().take(MAX_HEADER_CHARS).collect();
    header.push('…');
    Some(header)
}
