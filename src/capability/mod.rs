//! 外部能力：文本编码、描述合成与图像生成
//!
//! 描述合成与图像生成的失败属于预期结果，以 [`CapabilityError`] 返回，由调用方选择回退分支；
//! 文本编码失败则直接作为请求错误向上传递。

mod describe;
mod embed;
mod render;

use anyhow::Result;
use async_trait::async_trait;
use ndarray::Array1;
use thiserror::Error;

pub use self::describe::*;
pub use self::embed::*;
pub use self::render::*;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("capability is not configured")]
    Unavailable,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),
}

/// 将文本映射到嵌入空间
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Array1<f32>>;
}

/// 根据查询与检索到的说明文字合成一段描述
#[async_trait]
pub trait DescriptionSynthesizer: Send + Sync {
    async fn describe(&self, query: &str, captions: &[String]) -> Result<String, CapabilityError>;
}

/// 文生图请求
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub prompt: String,
    pub negative_prompt: &'static str,
    pub steps: u32,
    pub guidance: f32,
}

/// 根据提示词生成图片，返回编码后的图片数据
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &RenderRequest) -> Result<Vec<u8>, CapabilityError>;
}

/// 未配置的描述合成器与图像生成器
pub struct Unavailable;

#[async_trait]
impl DescriptionSynthesizer for Unavailable {
    async fn describe(&self, _query: &str, _captions: &[String]) -> Result<String, CapabilityError> {
        Err(CapabilityError::Unavailable)
    }
}

#[async_trait]
impl ImageSynthesizer for Unavailable {
    async fn synthesize(&self, _request: &RenderRequest) -> Result<Vec<u8>, CapabilityError> {
        Err(CapabilityError::Unavailable)
    }
}
