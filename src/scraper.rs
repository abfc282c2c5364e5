use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::{info, warn};

use crate::dates;
use crate::error::PageError;
use crate::parser;
use crate::record::Record;
use crate::settings::{Category, CrawlSettings};

/// Something that can load a page and hand back its visible text. One
/// document is current at a time, like a single reused browser tab.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), PageError>;
    async fn visible_text(&mut self) -> Result<String, PageError>;
}

/// spider.cloud-backed page source returning rendered plain text.
pub struct SpiderSource {
    spider: Spider,
    current: Option<String>,
}

impl SpiderSource {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("SPIDER_API_KEY")
            .map_err(|_| anyhow::anyhow!("SPIDER_API_KEY environment variable must be set"))?;
        let spider = Spider::new(Some(api_key))
            .map_err(|e| anyhow::anyhow!("Failed to create Spider client: {}", e))?;
        Ok(SpiderSource {
            spider,
            current: None,
        })
    }
}

impl PageSource for SpiderSource {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), PageError> {
        self.current = None;
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Text)),
            ..Default::default()
        };

        let response = tokio::time::timeout(
            timeout,
            self.spider.scrape_url(url, Some(params), "application/json"),
        )
        .await
        .map_err(|_| PageError::Timeout(timeout))?
        .map_err(|e| PageError::Unavailable(e.to_string()))?;

        let parsed: serde_json::Value = match response.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
            None => response,
        };
        let first = parsed.as_array().and_then(|arr| arr.first());

        if let Some(err) = first.and_then(|obj| obj.get("error")).and_then(|e| e.as_str()) {
            return Err(PageError::Unavailable(err.to_string()));
        }
        let content = first
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| PageError::Evaluation("no content in spider response".into()))?;

        self.current = Some(content.to_string());
        Ok(())
    }

    async fn visible_text(&mut self) -> Result<String, PageError> {
        self.current
            .clone()
            .ok_or_else(|| PageError::Evaluation("no page loaded".into()))
    }
}

/// One page to visit and the labels its records get.
#[derive(Debug, Clone)]
pub struct PageTarget {
    pub category: String,
    pub subcategory: String,
    pub url: String,
    pub settle: Duration,
}

impl PageTarget {
    fn label(&self) -> String {
        if self.subcategory.is_empty() {
            self.category.clone()
        } else {
            format!("{} / {}", self.category, self.subcategory)
        }
    }
}

/// Result of visiting one page. A failure never aborts the crawl.
#[derive(Debug)]
pub enum PageOutcome {
    Records(Vec<Record>),
    Failed(PageError),
}

pub struct CrawlReport {
    pub records: Vec<Record>,
    pub pages: usize,
    /// (page label, reason) for every page that contributed nothing.
    pub failures: Vec<(String, PageError)>,
}

/// Expand categories into the ordered page list. Categories with subpages
/// are visited through them, using the shorter subpage settle delay.
pub fn plan(categories: &[&Category], settings: &CrawlSettings) -> Vec<PageTarget> {
    let mut targets = Vec::new();
    for cat in categories {
        if cat.subpages.is_empty() {
            if let Some(url) = &cat.url {
                targets.push(PageTarget {
                    category: cat.name.clone(),
                    subcategory: String::new(),
                    url: url.clone(),
                    settle: settings.settle(),
                });
            }
        } else {
            targets.extend(cat.subpages.iter().map(|sub| PageTarget {
                category: cat.name.clone(),
                subcategory: sub.name.clone(),
                url: sub.url.clone(),
                settle: settings.subpage_settle(),
            }));
        }
    }
    targets
}

/// Navigate, let the page settle, capture its text and parse it. With
/// `only_reference_date` set, records not dated on `today` are dropped.
pub async fn visit<S: PageSource>(
    source: &mut S,
    target: &PageTarget,
    settings: &CrawlSettings,
    today: NaiveDate,
) -> PageOutcome {
    if let Err(e) = source.navigate(&target.url, settings.timeout()).await {
        return PageOutcome::Failed(e);
    }
    tokio::time::sleep(target.settle).await;

    let text = match source.visible_text().await {
        Ok(t) => t,
        Err(e) => return PageOutcome::Failed(e),
    };

    let mut records = parser::process_page(
        &text,
        &target.category,
        &target.subcategory,
        today,
        settings.pairing,
    );
    if settings.only_reference_date {
        let wanted = today.format("%Y-%m-%d").to_string();
        records.retain(|r| dates::to_iso(&r.date) == wanted);
    }
    records.truncate(settings.max_records_per_page);
    PageOutcome::Records(records)
}

/// Visit every page in order, one at a time, collecting records. Failed
/// pages are logged and reported, never fatal.
pub async fn crawl<S: PageSource>(
    source: &mut S,
    categories: &[&Category],
    settings: &CrawlSettings,
    today: NaiveDate,
) -> CrawlReport {
    let targets = plan(categories, settings);
    let t0 = Instant::now();

    let pb = ProgressBar::new(targets.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut report = CrawlReport {
        records: Vec::new(),
        pages: targets.len(),
        failures: Vec::new(),
    };

    for target in &targets {
        let label = target.label();
        pb.set_message(label.clone());

        match visit(source, target, settings, today).await {
            PageOutcome::Records(records) => {
                info!("{}: {} meetings", label, records.len());
                for r in &records {
                    info!("  {} ({})", r.title, r.date);
                }
                report.records.extend(records);
            }
            PageOutcome::Failed(e) => {
                warn!("{}: {}", label, e);
                report.failures.push((label, e));
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Crawled {} pages in {:.1}s: {} records, {} failed pages",
        report.pages,
        t0.elapsed().as_secs_f64(),
        report.records.len(),
        report.failures.len()
    );
    report
}
