use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::compare::{CompareRequest, ComparisonResult, SyntheticImage, Track};
use crate::index::Match;

fn default_top_k() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_guidance_scale() -> f32 {
    1.5
}

fn default_steps() -> u32 {
    5
}

/// 对比请求参数
#[derive(Debug, Deserialize, ToSchema)]
pub struct CompareForm {
    /// 原始查询文本
    pub original_text: String,
    /// 需要减去的概念
    pub sub_concept: Option<String>,
    /// 需要加上的概念
    pub add_concept: Option<String>,
    /// 每个 track 返回的真实图片数量，至少为 1
    #[schema(default = 3, minimum = 1)]
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// 是否合成描述并二次检索
    #[schema(default = true)]
    #[serde(default = "default_true")]
    pub gen_text: bool,
    /// 是否生成合成图像
    #[schema(default = true)]
    #[serde(default = "default_true")]
    pub gen_image: bool,
    #[schema(default = 1.5)]
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,
    #[schema(default = 5)]
    #[serde(default = "default_steps")]
    pub num_inference_steps: u32,
}

impl From<CompareForm> for CompareRequest {
    fn from(form: CompareForm) -> Self {
        Self {
            original_text: form.original_text,
            add_concept: form.add_concept,
            sub_concept: form.sub_concept,
            top_k: form.top_k,
            enable_text_enrichment: form.gen_text,
            enable_image_generation: form.gen_image,
            diffusion_steps: form.num_inference_steps,
            guidance_scale: form.guidance_scale,
        }
    }
}

/// 一张真实图片
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchResponse {
    /// 图片地址
    pub url: String,
    /// 余弦相似度
    pub score: f32,
    pub filename: String,
    pub caption: String,
    /// 图片在数据集中的下标
    pub index: u64,
}

impl From<Match> for MatchResponse {
    fn from(m: Match) -> Self {
        Self {
            url: m.image_ref,
            score: m.score,
            filename: m.filename,
            caption: m.caption,
            index: m.dataset_index,
        }
    }
}

/// 合成结果
#[derive(Debug, Serialize, ToSchema)]
pub struct SyntheticResponse {
    /// `data:image/jpeg;base64,...`，未请求生成时为空字符串
    pub image_base64: Option<String>,
    /// 合成的描述
    pub generated_prompt: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackResponse {
    pub real_match: Vec<MatchResponse>,
    pub synthetic: SyntheticResponse,
}

/// 对比响应
#[derive(Debug, Serialize, ToSchema)]
pub struct CompareResponse {
    pub original_text: String,
    /// 修改后的查询文本，没有修改 track 时与原始查询相同
    pub modified_text: String,
    pub original: TrackResponse,
    pub modified: Option<TrackResponse>,
}

impl CompareResponse {
    /// 转换为响应，占位标记由 `placeholder` 渲染为图片
    pub fn new<F>(result: ComparisonResult, placeholder: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let original_text = result.original.query_text.clone();
        let modified_text =
            result.modified.as_ref().map_or_else(|| original_text.clone(), |t| t.query_text.clone());
        let track = |track: Track| TrackResponse {
            real_match: track.matches.into_iter().map(MatchResponse::from).collect(),
            synthetic: SyntheticResponse {
                image_base64: match track.synthetic_image {
                    SyntheticImage::Skipped => Some(String::new()),
                    SyntheticImage::Placeholder { reason } => placeholder(&reason),
                    SyntheticImage::Rendered { data_uri } => Some(data_uri),
                },
                generated_prompt: track.synthetic_prompt,
            },
        };
        Self {
            original_text,
            modified_text,
            original: track(result.original),
            modified: result.modified.map(track),
        }
    }
}

/// 健康检查响应
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// 嵌入表记录数
    pub rows: usize,
}
