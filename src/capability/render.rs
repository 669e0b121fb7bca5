use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ab_glyph::{FontArc, PxScale};
use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use log::{debug, warn};
use reqwest::Client;
use serde::Serialize;

use super::{CapabilityError, ImageSynthesizer, RenderRequest};
use crate::compare::SyntheticImage;
use crate::metrics;

/// 文生图模型可接受的最大提示词长度
pub const MAX_PROMPT_CHARS: usize = 77;

/// 抑制非照片风格输出的固定反向提示词
pub const NEGATIVE_PROMPT: &str = "painting, artistic, drawing, illustration, blur, low quality, distorted, abstract, text, watermark, grid, noise, glitch";

pub const WATERMARK_TEXT: &str = "Created by MIRAGE";

/// 图像生成失败时绘制在占位图上的原因，具体错误只写入日志
pub const PLACEHOLDER_REASON: &str = "Generation failed";

/// 未指定字体时使用的 DejaVu Sans
static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

const WATERMARK_COLOR: Rgb<u8> = Rgb([255, 225, 210]);
const WATERMARK_MARGIN: (u32, u32) = (20, 15);
const IMAGE_SIZE: u32 = 512;

/// 截断提示词到模型可接受的长度
pub fn truncate_prompt(prompt: &str) -> String {
    prompt.chars().take(MAX_PROMPT_CHARS).collect()
}

/// 计算水印左上角坐标，保证水印不越过图片右下边缘
pub fn watermark_position(image: (u32, u32), text: (u32, u32)) -> (i32, i32) {
    let x = image.0.saturating_sub(text.0 + WATERMARK_MARGIN.0);
    let y = image.1.saturating_sub(text.1 + WATERMARK_MARGIN.1);
    (x as i32, y as i32)
}

/// 用于水印与占位图的字体
pub struct Watermark {
    font: FontArc,
    scale: PxScale,
}

impl Watermark {
    fn with_font(font: FontArc) -> Self {
        Self { font, scale: PxScale::from(20.) }
    }

    /// 使用内置字体
    pub fn bundled() -> Result<Self> {
        Ok(Self::with_font(FontArc::try_from_slice(BUNDLED_FONT)?))
    }

    /// 从 TTF/OTF 文件加载字体
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Ok(Self::with_font(FontArc::try_from_vec(data)?))
    }

    /// 水印文字占据的区域，`(x, y, width, height)`
    pub fn bounds(&self, image: (u32, u32)) -> (i32, i32, u32, u32) {
        let (w, h) = text_size(self.scale, &self.font, WATERMARK_TEXT);
        let (x, y) = watermark_position(image, (w, h));
        (x, y, w, h)
    }

    /// 在图片右下角绘制水印
    pub fn apply(&self, image: &mut RgbImage) {
        let (x, y, _, _) = self.bounds(image.dimensions());
        draw_text_mut(image, WATERMARK_COLOR, x, y, self.scale, &self.font, WATERMARK_TEXT);
    }

    fn draw(&self, image: &mut RgbImage, color: Rgb<u8>, (x, y): (i32, i32), text: &str) {
        draw_text_mut(image, color, x, y, self.scale, &self.font, text);
    }
}

fn encode_jpeg(image: &RgbImage) -> Result<String, CapabilityError> {
    let mut buf = vec![];
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(buf)))
}

/// 图像生成的调度：截断提示词、附加反向提示词、绘制水印、编码为 data URI
pub struct Renderer {
    synthesizer: Arc<dyn ImageSynthesizer>,
    watermark: Watermark,
}

impl Renderer {
    pub fn new(synthesizer: Arc<dyn ImageSynthesizer>, watermark: Watermark) -> Self {
        Self { synthesizer, watermark }
    }

    /// 生成一张图片，失败时返回占位标记
    pub async fn render(&self, prompt: &str, steps: u32, guidance: f32) -> SyntheticImage {
        let request = RenderRequest {
            prompt: truncate_prompt(prompt),
            negative_prompt: NEGATIVE_PROMPT,
            steps,
            guidance,
        };
        match self.try_render(&request).await {
            Ok(data_uri) => SyntheticImage::Rendered { data_uri },
            Err(e) => {
                warn!("图像生成失败: {}", e);
                metrics::inc_fallback("renderer");
                SyntheticImage::Placeholder { reason: PLACEHOLDER_REASON.to_owned() }
            }
        }
    }

    async fn try_render(&self, request: &RenderRequest) -> Result<String, CapabilityError> {
        debug!("rendering prompt: {}", request.prompt);
        let data = self.synthesizer.synthesize(request).await?;
        let mut image = image::load_from_memory(&data)?.to_rgb8();
        self.watermark.apply(&mut image);
        encode_jpeg(&image)
    }

    /// 绘制占位图
    pub fn placeholder(&self, reason: &str) -> Result<String, CapabilityError> {
        let mut image = RgbImage::from_pixel(IMAGE_SIZE, IMAGE_SIZE, Rgb([40, 40, 45]));
        self.watermark.draw(&mut image, Rgb([255, 100, 100]), (20, 200), "No Image Available");
        self.watermark.draw(&mut image, Rgb([200, 200, 200]), (20, 230), reason);
        encode_jpeg(&image)
    }
}

#[derive(Serialize)]
struct DiffusionRequest<'a> {
    prompt: &'a str,
    negative_prompt: &'a str,
    num_inference_steps: u32,
    guidance_scale: f32,
    width: u32,
    height: u32,
}

/// 通过 HTTP 调用的扩散模型服务，响应体为编码后的图片
pub struct DiffusionRenderer {
    http: Client,
    url: String,
}

impl DiffusionRenderer {
    pub fn new<S: Into<String>>(url: S, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl ImageSynthesizer for DiffusionRenderer {
    async fn synthesize(&self, request: &RenderRequest) -> Result<Vec<u8>, CapabilityError> {
        let body = DiffusionRequest {
            prompt: &request.prompt,
            negative_prompt: request.negative_prompt,
            num_inference_steps: request.steps,
            guidance_scale: request.guidance,
            width: IMAGE_SIZE,
            height: IMAGE_SIZE,
        };
        let data = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        if data.is_empty() {
            return Err(CapabilityError::Malformed("empty image".to_owned()));
        }
        Ok(data.to_vec())
    }
}
