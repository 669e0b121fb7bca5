use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use ndarray::Array1;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::config::EmbedderOptions;
use crate::vector::normalized;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// 通过 HTTP 调用的文本编码服务
pub struct HttpEmbedder {
    http: Client,
    url: String,
}

impl HttpEmbedder {
    pub fn new(opts: &EmbedderOptions) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(opts.embedder_timeout)).build()?;
        Ok(Self { http, url: opts.embedder_url.clone() })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Array1<f32>> {
        debug!("encoding text: {}", text);
        let response: EmbedResponse = self
            .http
            .post(&self.url)
            .json(&EmbedRequest { text })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("文本编码请求失败: {}", self.url))?
            .json()
            .await
            .context("文本编码服务返回了无法解析的结果")?;
        anyhow::ensure!(!response.embedding.is_empty(), "文本编码服务返回了空向量");
        Ok(normalized(Array1::from(response.embedding)))
    }
}
