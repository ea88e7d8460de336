//! Top headlines from NewsAPI.

use crate::collaborators::{NewsItem, NewsSource};
use crate::config::{secret_from_env, NewsConfig};
use crate::events::{Event, EventBus};
use anyhow::{anyhow, Result};
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;

pub const MISSING_KEY_MESSAGE: &str = "No NEWS_API_KEY found. Please set it in your .env file.";

#[derive(Debug, Deserialize)]
struct HeadlinesResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source: Option<ArticleSource>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    #[serde(default)]
    name: Option<String>,
}

pub struct NewsApiClient {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
    bus: Arc<EventBus>,
}

impl NewsApiClient {
    pub fn new(base_url: &str, api_key: Option<SecretString>, bus: Arc<EventBus>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bus,
        }
    }

    pub fn from_config(config: &NewsConfig, bus: Arc<EventBus>) -> Self {
        Self::new(&config.base_url, secret_from_env(&config.api_key_env), bus)
    }

    fn fetch(&self, api_key: &SecretString, country: &str, count: usize) -> Result<Vec<NewsItem>> {
        let page_size = count.to_string();
        let response = self
            .http
            .get(format!("{}/top-headlines", self.base_url))
            .query(&[
                ("country", country),
                ("apiKey", api_key.expose_secret()),
                ("pageSize", page_size.as_str()),
            ])
            .send()?;
        let text = response.text()?;
        parse_headlines(&text, count)
    }

    fn fallback(&self, message: String) -> Vec<NewsItem> {
        self.bus.emit(Event::news_fallback(&message));
        vec![NewsItem::placeholder(message)]
    }
}

impl NewsSource for NewsApiClient {
    fn top_headlines(&self, country: &str, count: usize) -> Vec<NewsItem> {
        let Some(api_key) = &self.api_key else {
            return self.fallback(MISSING_KEY_MESSAGE.to_string());
        };
        match self.fetch(api_key, country, count) {
            Ok(items) => {
                self.bus.emit(Event::news_fetched(items.len()));
                items
            }
            Err(e) => self.fallback(format!("Error fetching news: {}", e)),
        }
    }
}

fn parse_headlines(body: &str, count: usize) -> Result<Vec<NewsItem>> {
    let response: HeadlinesResponse = serde_json::from_str(body)?;
    if response.status != "ok" {
        return Err(anyhow!(
            "{}",
            response
                .message
                .unwrap_or_else(|| format!("unexpected status '{}'", response.status))
        ));
    }
    Ok(response
        .articles
        .into_iter()
        .filter_map(|article| {
            let title = article.title?.trim().to_string();
            if title.is_empty() {
                return None;
            }
            Some(NewsItem {
                title,
                url: article.url,
                source: article.source.and_then(|s| s.name),
            })
        })
        .take(count)
        .collect())
}
