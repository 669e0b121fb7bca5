use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use log::{debug, info};
use ndarray::Array1;
use serde::Serialize;

use crate::capability::synthesize;
use crate::context::RetrievalContext;
use crate::index::{Match, context_captions};
use crate::metrics;
use crate::vector::{VectorAlgebra, provided};

/// 未启用描述合成时的描述文本
pub const ENRICHMENT_SKIPPED: &str = "LLM generation skipped.";

/// 一次对比请求
#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub original_text: String,
    pub add_concept: Option<String>,
    pub sub_concept: Option<String>,
    pub top_k: usize,
    pub enable_text_enrichment: bool,
    pub enable_image_generation: bool,
    pub diffusion_steps: u32,
    pub guidance_scale: f32,
}

impl CompareRequest {
    pub fn new<S: Into<String>>(original_text: S) -> Self {
        Self {
            original_text: original_text.into(),
            add_concept: None,
            sub_concept: None,
            top_k: 3,
            enable_text_enrichment: true,
            enable_image_generation: true,
            diffusion_steps: 5,
            guidance_scale: 1.5,
        }
    }

    /// 加减概念都提供时才执行修改后的 track
    pub fn concepts(&self) -> Option<(&str, &str)> {
        let add = provided(self.add_concept.as_deref())?;
        let sub = provided(self.sub_concept.as_deref())?;
        Some((add, sub))
    }
}

/// 合成图像的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyntheticImage {
    /// 未请求生成
    Skipped,
    /// 生成失败，需要展示占位图
    Placeholder { reason: String },
    /// `data:image/jpeg;base64,...`
    Rendered { data_uri: String },
}

/// 对比中的一侧
#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub query_text: String,
    pub matches: Vec<Match>,
    pub synthetic_prompt: String,
    pub synthetic_image: SyntheticImage,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonResult {
    pub original: Track,
    pub modified: Option<Track>,
}

/// 查询向量的来源
enum QuerySource<'a> {
    Plain(&'a str),
    Combined { base: &'a str, add: &'a str, sub: &'a str },
}

/// 单个 track 的参数
struct TrackSpec<'a> {
    name: &'static str,
    source: QuerySource<'a>,
    /// 展示给用户、同时作为描述合成输入的查询文本
    display: String,
    /// 未启用描述合成时用于生成图像的提示词
    image_prompt: String,
}

/// 概念对比的调度器
#[derive(Clone)]
pub struct ComparisonOrchestrator {
    ctx: Arc<RetrievalContext>,
}

impl ComparisonOrchestrator {
    pub fn new(ctx: Arc<RetrievalContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &RetrievalContext {
        &self.ctx
    }

    /// 执行一次对比
    ///
    /// 任意 track 出错都会使整个请求失败，不返回部分结果。
    pub async fn compare(&self, req: &CompareRequest) -> Result<ComparisonResult> {
        anyhow::ensure!(req.top_k >= 1, "top_k 至少为 1");
        let concepts = req.concepts();
        info!(
            "comparing \"{}\" (concepts: {:?}, top_k: {})",
            req.original_text, concepts, req.top_k
        );

        let original = self
            .run_track(
                TrackSpec {
                    name: "original",
                    source: QuerySource::Plain(&req.original_text),
                    display: req.original_text.clone(),
                    image_prompt: req.original_text.clone(),
                },
                req,
            )
            .await?;

        let modified = match concepts {
            Some((add, sub)) => Some(
                self.run_track(
                    TrackSpec {
                        name: "modified",
                        source: QuerySource::Combined { base: &req.original_text, add, sub },
                        display: format!("{} + {} - {}", req.original_text, add, sub),
                        image_prompt: format!("{} {}", req.original_text, add),
                    },
                    req,
                )
                .await?,
            ),
            None => None,
        };

        metrics::inc_compare_count(
            1 + modified.is_some() as usize,
            req.enable_text_enrichment,
            req.enable_image_generation,
        );

        Ok(ComparisonResult { original, modified })
    }

    async fn run_track(&self, spec: TrackSpec<'_>, req: &CompareRequest) -> Result<Track> {
        let instant = Instant::now();
        let ctx = &*self.ctx;
        let algebra = VectorAlgebra::new(ctx.embedder.as_ref());

        let vector: Array1<f32> = match spec.source {
            QuerySource::Plain(text) => algebra.embed(text).await?,
            QuerySource::Combined { base, add, sub } => {
                algebra.combine(base, Some(add), Some(sub)).await?
            }
        };
        let mut matches = ctx.index.top_k(vector.view(), req.top_k)?;

        let description = if req.enable_text_enrichment {
            let captions = context_captions(&matches);
            let description = synthesize(ctx.describer.as_ref(), &spec.display, &captions).await;
            debug!("[{}] re-ranking with description: {}", spec.name, description);
            let refined = algebra.embed(&description).await?;
            matches = ctx.index.top_k(refined.view(), req.top_k)?;
            description
        } else {
            ENRICHMENT_SKIPPED.to_owned()
        };

        let synthetic_image = if req.enable_image_generation {
            let prompt = match req.enable_text_enrichment {
                true => &description,
                false => &spec.image_prompt,
            };
            ctx.renderer.render(prompt, req.diffusion_steps, req.guidance_scale).await
        } else {
            SyntheticImage::Skipped
        };

        if let Some(best) = matches.first() {
            metrics::observe_top_score(spec.name, best.score);
        }
        metrics::observe_track_duration(spec.name, instant.elapsed().as_secs_f32());

        Ok(Track {
            query_text: spec.display,
            matches,
            synthetic_prompt: description,
            synthetic_image,
        })
    }
}
