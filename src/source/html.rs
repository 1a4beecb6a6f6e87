//! News site section adapter
//!
//! Lists article links from a section page (and optional numbered follow-up
//! pages) and extracts header, date, body and tags from each article with
//! ordered selector fallbacks. Covers the common layouts of Russian news sites
//! (`/YYYYMMDD/slug.html` and `/news/YYYY/MM/DD/slug/` article paths).

use crate::config::SourceConfig;
use crate::crawler::Requester;
use crate::record::{Candidate, Record};
use crate::source::{element_text, parse_datetime, sanitize_tag, split_keywords, SourceAdapter};
use crate::NewslineError;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Article paths recognized when a source doesn't configure its own pattern
pub const DEFAULT_ARTICLE_PATH: &str =
    r"^/(\d{8}/[^/]+\.html|news/\d{4}/\d{2}/\d{2}/[^/]+/?)$";

const HEADER_SELECTORS: &[&str] = &["h1.article__title", "h1.topic-body__title", "h1"];

const BODY_CONTAINERS: &[&str] = &[
    "div.article__body",
    "div.topic-body__content",
    "div.article__text",
    "article",
];

const PARAGRAPH_SELECTORS: &[&str] = &[
    r#"div.article__block[data-type="text"] div.article__text"#,
    "p.topic-body__content-text",
    "div.article__text",
    "p",
];

const TAG_SELECTORS: &[&str] = &[
    "a.article__tags-item",
    "a.article__tags-item-link",
    "a.article__tags-link",
];

/// Cross-link blocks ("read also") embedded in article bodies
const READ_ALSO_MARKER: &str = "Читайте также";

/// Adapter for a news site section
pub struct HtmlSectionAdapter {
    name: String,
    base_url: Url,
    section_url: String,
    page_url_template: Option<String>,
    article_path: Regex,
    requester: Requester,
}

impl HtmlSectionAdapter {
    /// Builds the adapter from a validated source configuration
    pub fn from_config(source: &SourceConfig, requester: Requester) -> crate::Result<Self> {
        let base_url = source
            .base_url
            .as_deref()
            .ok_or_else(|| NewslineError::Source(format!("{}: base_url is not set", source.name)))?;
        let section_url = source.section_url.clone().ok_or_else(|| {
            NewslineError::Source(format!("{}: section_url is not set", source.name))
        })?;
        let pattern = source
            .article_path_pattern
            .as_deref()
            .unwrap_or(DEFAULT_ARTICLE_PATH);
        let article_path = Regex::new(pattern)
            .map_err(|e| NewslineError::Source(format!("invalid article pattern: {}", e)))?;

        Ok(Self {
            name: source.name.clone(),
            base_url: Url::parse(base_url)?,
            section_url,
            page_url_template: source.page_url_template.clone(),
            article_path,
            requester,
        })
    }

    /// URL of listing page `page`, if the source has one
    fn listing_url(&self, page: u32) -> Option<String> {
        match page {
            0 => None,
            1 => Some(self.section_url.clone()),
            n => self
                .page_url_template
                .as_ref()
                .map(|template| template.replace("{page}", &n.to_string())),
        }
    }
}

#[async_trait]
impl SourceAdapter for HtmlSectionAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_candidates(&mut self, page: u32) -> crate::Result<Vec<Candidate>> {
        let Some(url) = self.listing_url(page) else {
            return Ok(Vec::new());
        };

        let html = self.requester.fetch(&url).await?;
        let links = extract_article_links(&html, &self.base_url, &self.article_path);
        tracing::debug!(source = %self.name, page, links = links.len(), "listing parsed");

        Ok(links
            .into_iter()
            .map(|link| {
                let timestamp = date_from_path(&link);
                Candidate::new(link, timestamp)
            })
            .collect())
    }

    async fn fetch_and_parse(&mut self, candidate: &Candidate) -> crate::Result<Option<Record>> {
        let html = self.requester.fetch(&candidate.reference).await?;
        Ok(parse_article(&html, &candidate.reference, &self.name))
    }
}

/// Extracts article links from a listing page
///
/// Protocol-relative links get `https:`, absolute links must live under
/// `base_url`, and the path must match `article_path`. Duplicates are dropped
/// keeping the first occurrence.
pub fn extract_article_links(html: &str, base_url: &Url, article_path: &Regex) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(link) = resolve_article_link(href.trim(), base_url, article_path) else {
            continue;
        };
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}

fn resolve_article_link(href: &str, base_url: &Url, article_path: &Regex) -> Option<String> {
    if href.is_empty() {
        return None;
    }

    let href = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        href.to_string()
    };

    if href.starts_with("http://") || href.starts_with("https://") {
        let url = Url::parse(&href).ok()?;
        if url.host_str() != base_url.host_str() {
            return None;
        }
        if !article_path.is_match(url.path()) {
            return None;
        }
        return Some(href);
    }

    if !href.starts_with('/') {
        return None;
    }
    let path = href.split(['?', '#']).next().unwrap_or_default();
    if !article_path.is_match(path) {
        return None;
    }

    base_url.join(&href).ok().map(String::from)
}

/// Reads the publication day embedded in an article URL (midnight UTC)
///
/// Recognizes `/YYYYMMDD/` and `/YYYY/MM/DD/` path segments.
pub fn date_from_path(link: &str) -> Option<DateTime<FixedOffset>> {
    let path = Url::parse(link)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| link.to_string());
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let date = segments
        .iter()
        .find_map(|segment| {
            (segment.len() == 8 && segment.chars().all(|c| c.is_ascii_digit()))
                .then(|| NaiveDate::parse_from_str(segment, "%Y%m%d").ok())
                .flatten()
        })
        .or_else(|| {
            segments.windows(3).find_map(|w| {
                let is_date = w[0].len() == 4 && w[1].len() == 2 && w[2].len() == 2;
                is_date
                    .then(|| NaiveDate::parse_from_str(&w.join("-"), "%Y-%m-%d").ok())
                    .flatten()
            })
        })?;

    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight).into())
}

/// Parses an article page into a record
///
/// Returns `None` when the header or the publication date is missing.
pub fn parse_article(html: &str, url: &str, source_name: &str) -> Option<Record> {
    let document = Html::parse_document(html);

    let header = first_text(&document, HEADER_SELECTORS)?;
    let published_at = extract_date(&document).as_deref().and_then(parse_datetime)?;
    let text = extract_text(&document);
    let tags = extract_tags(&document);

    Record::new(
        header,
        text,
        published_at,
        tags,
        source_name,
        Some(url.to_string()),
    )
    .ok()
}

fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        let selector = Selector::parse(selector).ok()?;
        document
            .select(&selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|e| e.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn extract_date(document: &Html) -> Option<String> {
    first_attr(document, "time[datetime]", "datetime")
        .or_else(|| first_attr(document, r#"meta[property="article:published_time"]"#, "content"))
        .or_else(|| first_attr(document, r#"meta[name="pubdate"]"#, "content"))
        .or_else(|| first_text(document, &["time"]))
}

fn extract_text(document: &Html) -> String {
    let Some(container) = BODY_CONTAINERS.iter().find_map(|selector| {
        let selector = Selector::parse(selector).ok()?;
        document.select(&selector).next()
    }) else {
        return String::new();
    };

    for selector in PARAGRAPH_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        let paragraphs: Vec<String> = container
            .select(&selector)
            .map(element_text)
            .filter(|text| !text.is_empty() && !text.contains(READ_ALSO_MARKER))
            .collect();

        if !paragraphs.is_empty() {
            return paragraphs.join("\n");
        }
    }

    String::new()
}

fn extract_tags(document: &Html) -> Vec<String> {
    let mut tags = Vec::new();
    for selector in TAG_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        tags.extend(
            document
                .select(&selector)
                .map(element_text)
                .filter(|t| !t.is_empty())
                .map(|t| sanitize_tag(&t)),
        );
    }

    if !tags.is_empty() {
        return tags;
    }

    first_attr(document, r#"meta[name="keywords"]"#, "content")
        .or_else(|| first_attr(document, r#"meta[name="news_keywords"]"#, "content"))
        .map(|keywords| {
            split_keywords(&keywords)
                .iter()
                .map(|k| sanitize_tag(k))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://ria.ru").unwrap()
    }

    fn pattern() -> Regex {
        Regex::new(DEFAULT_ARTICLE_PATH).unwrap()
    }

    #[test]
    fn test_extract_article_links() {
        let html = r#"<html><body>
            <a href="/20261018/summit-1999.html">Summit</a>
            <a href="https://ria.ru/20261017/talks-1888.html">Talks</a>
            <a href="//ria.ru/20261016/vote-1777.html">Vote</a>
            <a href="/20261018/summit-1999.html">Summit again</a>
            <a href="https://other.ru/20261018/x-1.html">Elsewhere</a>
            <a href="/politics/">Section</a>
            <a href="mailto:desk@ria.ru">Mail</a>
            <a href="/news/2026/10/15/sanctions/">Lenta style</a>
        </body></html>"#;

        let links = extract_article_links(html, &base(), &pattern());
        assert_eq!(
            links,
            vec![
                "https://ria.ru/20261018/summit-1999.html",
                "https://ria.ru/20261017/talks-1888.html",
                "https://ria.ru/20261016/vote-1777.html",
                "https://ria.ru/news/2026/10/15/sanctions/",
            ]
        );
    }

    #[test]
    fn test_date_from_path() {
        let dt = date_from_path("https://ria.ru/20261018/summit-1999.html").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-10-18T00:00:00+00:00");

        let dt = date_from_path("https://lenta.ru/news/2026/10/15/sanctions/").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-10-15T00:00:00+00:00");

        assert!(date_from_path("https://ria.ru/politics/").is_none());
        assert!(date_from_path("https://ria.ru/20261399/bad.html").is_none());
    }

    #[test]
    fn test_parse_ria_article() {
        let html = r#"<html><head>
            <meta name="keywords" content="ignored, because, tags exist">
        </head><body>
            <h1 class="article__title">  Лавров провел   переговоры </h1>
            <div class="article__info"><time datetime="2026-10-18T09:15:00+03:00">09:15</time></div>
            <div class="article__body">
                <div class="article__block" data-type="text"><div class="article__text">Первый абзац.</div></div>
                <div class="article__block" data-type="text"><div class="article__text">Читайте также: другое</div></div>
                <div class="article__block" data-type="text"><div class="article__text">Второй абзац.</div></div>
            </div>
            <a class="article__tags-item">#Сергей Лавров</a>
            <a class="article__tags-item">Дипломатия</a>
        </body></html>"#;

        let record = parse_article(html, "https://ria.ru/20261018/x.html", "ria_politics").unwrap();
        assert_eq!(record.header(), "Лавров провел переговоры");
        assert_eq!(record.text(), "Первый абзац.\nВторой абзац.");
        assert_eq!(record.hashtags(), ["Сергей Лавров", "Дипломатия"]);
        assert_eq!(
            record.published_at().to_rfc3339(),
            "2026-10-18T09:15:00+03:00"
        );
        assert_eq!(record.origin_ref(), Some("https://ria.ru/20261018/x.html"));
    }

    #[test]
    fn test_parse_article_falls_back_to_meta() {
        let html = r#"<html><head>
            <meta property="article:published_time" content="2026-10-17T20:00:00Z">
            <meta name="news_keywords" content="мир, #политика">
        </head><body>
            <h1>Plain header</h1>
            <article><p>One.</p><p></p><p>Two.</p></article>
        </body></html>"#;

        let record = parse_article(html, "https://lenta.ru/news/2026/10/17/a/", "lenta").unwrap();
        assert_eq!(record.header(), "Plain header");
        assert_eq!(record.text(), "One.\nTwo.");
        assert_eq!(record.hashtags(), ["мир", "политика"]);
    }

    #[test]
    fn test_parse_article_requires_header_and_date() {
        let no_header = r#"<html><body><time datetime="2026-10-17T20:00:00Z"></time></body></html>"#;
        assert!(parse_article(no_header, "u", "s").is_none());

        let no_date = r#"<html><body><h1>Header</h1></body></html>"#;
        assert!(parse_article(no_date, "u", "s").is_none());

        let bad_date = r#"<html><body><h1>Header</h1><time>вчера</time></body></html>"#;
        assert!(parse_article(bad_date, "u", "s").is_none());
    }

    #[test]
    fn test_listing_urls() {
        let mut source = SourceConfig::new("lenta", crate::config::SourceKind::Html);
        source.base_url = Some("https://lenta.ru".to_string());
        source.section_url = Some("https://lenta.ru/rubrics/world/politic/".to_string());
        let requester = Requester::from_settings(&source.crawl, None).unwrap();

        let adapter = HtmlSectionAdapter::from_config(&source, requester.clone()).unwrap();
        assert_eq!(
            adapter.listing_url(1).as_deref(),
            Some("https://lenta.ru/rubrics/world/politic/")
        );
        assert!(adapter.listing_url(2).is_none());

        source.page_url_template = Some("https://lenta.ru/rubrics/world/politic/{page}/".to_string());
        let adapter = HtmlSectionAdapter::from_config(&source, requester).unwrap();
        assert_eq!(
            adapter.listing_url(3).as_deref(),
            Some("https://lenta.ru/rubrics/world/politic/3/")
        );
    }
}
