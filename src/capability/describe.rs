use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{CapabilityError, DescriptionSynthesizer};
use crate::config::DescriberOptions;
use crate::metrics;

/// 作为描述上下文的说明文字数量上限
pub const MAX_CONTEXT_CAPTIONS: usize = 3;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// 生成 LLM 指令
pub fn describe_prompt(query: &str, captions: &[String]) -> String {
    format!(
        "Using the following medical query: '{}', synthesize these findings into a concise radiology description: {}",
        query,
        captions.join(", ")
    )
}

/// 合成描述，任何失败都回退为确定性的文本
///
/// * 没有上下文时不调用合成器，原样返回查询
/// * 合成器未配置时返回 `"{查询}. {第一条说明}"`
/// * 合成失败时原样返回查询
///
/// 调用方只能通过文本内容区分合成结果与回退结果。
pub async fn synthesize(describer: &dyn DescriptionSynthesizer, query: &str, captions: &[String]) -> String {
    if captions.is_empty() {
        debug!("no context captions, skip description");
        return query.to_owned();
    }
    let captions = &captions[..captions.len().min(MAX_CONTEXT_CAPTIONS)];
    match describer.describe(query, captions).await {
        Ok(description) => description,
        Err(CapabilityError::Unavailable) => {
            metrics::inc_fallback("describer");
            format!("{}. {}", query, captions[0])
        }
        Err(e) => {
            warn!("描述合成失败，使用原始查询: {}", e);
            metrics::inc_fallback("describer");
            query.to_owned()
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(self) -> Option<String> {
        let text = self
            .candidates
            .into_iter()
            .next()?
            .content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<String>();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_owned())
    }
}

/// 基于 Gemini `generateContent` 接口的描述合成器
pub struct GeminiDescriber {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiDescriber {
    pub fn new(opts: &DescriberOptions, api_key: String) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(opts.describer_timeout)).build()?;
        Ok(Self {
            http,
            endpoint: GEMINI_ENDPOINT.to_owned(),
            model: opts.describer_model.clone(),
            api_key,
        })
    }

    /// 替换接口地址
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl DescriptionSynthesizer for GeminiDescriber {
    async fn describe(&self, query: &str, captions: &[String]) -> Result<String, CapabilityError> {
        let url = format!("{}/{}:generateContent", self.endpoint, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": describe_prompt(query, captions) }] }],
        });
        debug!("requesting description from {}", self.model);
        let response: GenerateResponse = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response.text().ok_or_else(|| CapabilityError::Malformed("empty candidate".to_owned()))
    }
}
