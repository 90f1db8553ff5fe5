// ABOUTME: ListingScraper producer - walks a paginated HTML school listing
// ABOUTME: Fixed delay between pages; stops on an empty page or the page ceiling

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::adapt::RawRecord;
use crate::config::{ListingSource, ScrapeConfig};

use super::RecordProducer;

pub struct ListingScraper {
    client: Client,
    sources: Vec<ListingSource>,
    uf: String,
    delay: Duration,
    max_pages: u32,
}

impl ListingScraper {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("adaptive-replicator/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            sources: config.sources.clone(),
            uf: config.uf.clone(),
            delay: Duration::from_millis(config.delay_ms),
            max_pages: config.max_pages,
        })
    }

    pub fn sources(&self) -> &[ListingSource] {
        &self.sources
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to request {}", url))?
            .error_for_status()
            .with_context(|| format!("Listing page {} returned an error status", url))?;

        response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))
    }
}

#[async_trait]
impl RecordProducer for ListingScraper {
    /// `rede` selects which configured listing to walk.
    async fn fetch_all(&self, rede: &str) -> Result<Vec<RawRecord>> {
        let source = self
            .sources
            .iter()
            .find(|s| s.rede == rede)
            .ok_or_else(|| anyhow!("No listing configured for rede '{}'", rede))?;

        tracing::info!("Scraping {} listing from {}", source.rede, source.url);
        let mut records = Vec::new();

        for page in 1..=self.max_pages {
            let url = format!("{}?pagina={}", source.url, page);
            tracing::debug!("Fetching page {}: {}", page, url);

            let html = match self.fetch_page(&url).await {
                Ok(html) => html,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    tracing::warn!("Stopping {} listing at page {}: {:#}", source.rede, page, e);
                    break;
                }
            };

            let items = extract_listing(&html, source, &self.uf)?;
            if items.is_empty() {
                tracing::info!("Page {} of {} listing is empty, done", page, source.rede);
                break;
            }

            tracing::info!("Page {}: {} schools", page, items.len());
            records.extend(items);

            if page < self.max_pages {
                tokio::time::sleep(self.delay).await;
            }
        }

        tracing::info!("Scraped {} {} schools", records.len(), source.rede);
        Ok(records)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector '{}': {}", css, e))
}

/// Extract school records from one listing page.
///
/// Items without a name or without a "City, State" location are skipped.
pub fn extract_listing(html: &str, source: &ListingSource, uf: &str) -> Result<Vec<RawRecord>> {
    let list_sel = selector("ul.schools_list")?;
    let item_sel = selector("li")?;
    let name_sel = selector("h2 a")?;
    let place_sel = selector("p")?;

    let document = Html::parse_document(html);
    let Some(list) = document.select(&list_sel).next() else {
        return Ok(Vec::new());
    };

    let mut records = Vec::new();
    for item in list.select(&item_sel) {
        let name = item
            .select(&name_sel)
            .next()
            .map(|a| a.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let municipio = item
            .select(&place_sel)
            .next()
            .and_then(|p| municipality(&text_outside_svg(p)))
            .unwrap_or_default();

        if name.is_empty() || municipio.is_empty() {
            continue;
        }

        records.push(
            RawRecord::new()
                .with("nome", name)
                .with("rede", source.rede.as_str())
                .with("publica", source.publica)
                .with("uf", uf)
                .with("municipio", municipio),
        );
    }

    Ok(records)
}

/// Text of an element with every piece trimmed, ignoring `<svg>` icons.
fn text_outside_svg(element: ElementRef<'_>) -> String {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let inside_svg = node
                .ancestors()
                .any(|a| a.value().as_element().is_some_and(|e| e.name() == "svg"));
            (!inside_svg).then(|| String::from((&**text).trim()))
        })
        .collect()
}

/// "City, State" -> "City"
fn municipality(location: &str) -> Option<String> {
    let mut parts = location.split(',');
    let city = parts.next()?.trim();
    parts.next()?;
    if city.is_empty() {
        None
    } else {
        Some(city.to_string())
    }
}
