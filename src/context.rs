use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::info;

use crate::capability::*;
use crate::config::{DataDir, DescriberOptions, EmbedderOptions, RendererOptions};
use crate::index::SimilarityIndex;

/// 检索所需的全部只读状态
///
/// 在启动时构造一次，之后由所有请求共享。
pub struct RetrievalContext {
    pub index: SimilarityIndex,
    pub embedder: Arc<dyn Embedder>,
    pub describer: Arc<dyn DescriptionSynthesizer>,
    pub renderer: Renderer,
}

impl RetrievalContext {
    pub fn new(
        index: SimilarityIndex,
        embedder: Arc<dyn Embedder>,
        describer: Arc<dyn DescriptionSynthesizer>,
        renderer: Renderer,
    ) -> Self {
        Self { index, embedder, describer, renderer }
    }

    /// 根据命令行参数加载数据并连接外部服务
    pub fn open(
        data_dir: &DataDir,
        embedder: &EmbedderOptions,
        describer: &DescriberOptions,
        renderer: &RendererOptions,
    ) -> Result<Self> {
        let index = SimilarityIndex::open(data_dir)?;
        let embedder = Arc::new(HttpEmbedder::new(embedder)?);

        let describer: Arc<dyn DescriptionSynthesizer> = match &describer.google_api_key {
            Some(key) if !key.is_empty() => {
                info!("使用 {} 合成描述", describer.describer_model);
                Arc::new(GeminiDescriber::new(describer, key.clone())?)
            }
            _ => {
                info!("未配置 Gemini API key，描述合成将使用回退文本");
                Arc::new(Unavailable)
            }
        };

        let synthesizer: Arc<dyn ImageSynthesizer> = match &renderer.diffusion_url {
            Some(url) => {
                info!("图像生成服务：{}", url);
                Arc::new(DiffusionRenderer::new(url, Duration::from_secs(renderer.renderer_timeout))?)
            }
            None => {
                info!("未配置图像生成服务，合成图像将使用占位图");
                Arc::new(Unavailable)
            }
        };
        let watermark = match &renderer.watermark_font {
            Some(path) => {
                info!("水印字体：{}", path.display());
                Watermark::open(path)?
            }
            None => Watermark::bundled()?,
        };

        Ok(Self::new(index, embedder, describer, Renderer::new(synthesizer, watermark)))
    }
}
