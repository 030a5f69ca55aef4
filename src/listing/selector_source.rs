//! Generic listing source driven by CSS selectors from the configuration.

use super::error::ListingError;
use super::source::{ListingPage, ListingSource, RawListing};
use crate::catalogue::{DistributorCode, MediaType};
use async_trait::async_trait;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_USER_AGENT: &str = concat!("release-index-server/", env!("CARGO_PKG_VERSION"));

fn default_title_separator() -> String {
    " - ".to_string()
}

/// CSS selectors describing one distributor's catalogue page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributorSelectors {
    /// Matches one product card.
    pub item: String,
    /// Anchor inside the card pointing to the detail page.
    pub link: String,
    /// Full "Band - Album" title inside the card. Defaults to the link text.
    pub title: Option<String>,
    pub band: Option<String>,
    pub album: Option<String>,
    /// Format label inside the card (CD, LP, Tape...).
    pub media_type: Option<String>,
    /// Anchor to the next page of the same category.
    pub next_page: Option<String>,
    #[serde(default = "default_title_separator")]
    pub title_separator: String,
}

struct CompiledSelectors {
    item: Selector,
    link: Selector,
    title: Option<Selector>,
    band: Option<Selector>,
    album: Option<Selector>,
    media_type: Option<Selector>,
    next_page: Option<Selector>,
    title_separator: String,
}

impl CompiledSelectors {
    fn compile(distributor: DistributorCode, s: &DistributorSelectors) -> Result<Self, ListingError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| {
                ListingError::config(distributor, format!("invalid selector {:?}: {}", css, e))
            })
        };
        let parse_opt = |css: &Option<String>| css.as_deref().map(parse).transpose();

        Ok(Self {
            item: parse(&s.item)?,
            link: parse(&s.link)?,
            title: parse_opt(&s.title)?,
            band: parse_opt(&s.band)?,
            album: parse_opt(&s.album)?,
            media_type: parse_opt(&s.media_type)?,
            next_page: parse_opt(&s.next_page)?,
            title_separator: s.title_separator.clone(),
        })
    }
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn select_text(parent: ElementRef, selector: &Option<Selector>) -> Option<String> {
    selector
        .as_ref()
        .and_then(|s| parent.select(s).next())
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Splits "Band - Album" on the first separator. Without one, the whole
/// title is taken as the band name.
pub fn split_raw_title(raw_title: &str, separator: &str) -> (String, String) {
    match raw_title.split_once(separator) {
        Some((band, album)) => (band.trim().to_string(), album.trim().to_string()),
        None => (raw_title.trim().to_string(), String::new()),
    }
}

pub struct SelectorListingSource {
    distributor: DistributorCode,
    selectors: CompiledSelectors,
    client: reqwest::Client,
}

impl SelectorListingSource {
    pub fn new(
        distributor: DistributorCode,
        selectors: &DistributorSelectors,
        timeout: Duration,
    ) -> Result<Self, ListingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| ListingError::config(distributor, e.to_string()))?;

        Ok(Self {
            distributor,
            selectors: CompiledSelectors::compile(distributor, selectors)?,
            client,
        })
    }

    /// Extracts listings and the next page link from a fetched document.
    pub fn parse_page(&self, html: &str, page_url: &str) -> Result<ListingPage, ListingError> {
        if html.trim().is_empty() {
            return Err(ListingError::parse(
                self.distributor,
                format!("empty document at {}", page_url),
            ));
        }
        let base = Url::parse(page_url).map_err(|e| {
            ListingError::config(self.distributor, format!("invalid page URL {}: {}", page_url, e))
        })?;
        let document = Html::parse_document(html);
        let s = &self.selectors;

        let mut listings = Vec::new();
        for item in document.select(&s.item) {
            let Some(link) = item.select(&s.link).next() else {
                continue;
            };
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let detail_url = match base.join(href) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    debug!("Skipping listing with unusable link {:?}: {}", href, e);
                    continue;
                }
            };

            let raw_title = select_text(item, &s.title).unwrap_or_else(|| element_text(link));
            let (band_name, album_title) =
                match (select_text(item, &s.band), select_text(item, &s.album)) {
                    (Some(band), Some(album)) => (band, album),
                    _ => split_raw_title(&raw_title, &s.title_separator),
                };
            if band_name.is_empty() {
                continue;
            }

            listings.push(RawListing {
                band_name,
                album_title,
                raw_title,
                detail_url,
                media_type: select_text(item, &s.media_type).and_then(|t| MediaType::parse(&t)),
            });
        }

        let next_page_url = s
            .next_page
            .as_ref()
            .and_then(|sel| document.select(sel).next())
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| base.join(href).ok())
            .map(|url| url.to_string())
            .filter(|url| url != page_url);

        Ok(ListingPage {
            listings,
            next_page_url,
        })
    }
}

#[async_trait]
impl ListingSource for SelectorListingSource {
    async fn fetch_page(&self, url: &str) -> Result<ListingPage, ListingError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ListingError::fetch(self.distributor, format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ListingError::http(
                self.distributor,
                status.as_u16(),
                url.to_string(),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ListingError::parse(self.distributor, format!("{}: {}", url, e)))?;

        self.parse_page(&body, url)
    }
}
