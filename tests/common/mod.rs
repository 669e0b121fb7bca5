#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use ndarray::prelude::*;

use mirage::RetrievalContext;
use mirage::SimilarityIndex;
use mirage::capability::*;
use mirage::metadata::{ImageRecord, MetadataTable};

/// 嵌入空间的四个坐标轴
pub const VOCAB: [&str; 4] = ["fracture", "infection", "pneumonia", "effusion"];

/// 按关键词求和的确定性编码器，包含 `explode` 时返回错误
pub struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Array1<f32>> {
        let text = text.to_lowercase();
        anyhow::ensure!(!text.contains("explode"), "encoder crashed");
        let mut v = Array1::from_elem(VOCAB.len(), 0.01);
        for (i, word) in VOCAB.iter().enumerate() {
            if text.contains(word) {
                v[i] += 1.;
            }
        }
        Ok(v)
    }
}

/// 按查询返回预设描述，没有预设时返回错误
#[derive(Default)]
pub struct ScriptedDescriber {
    replies: HashMap<String, String>,
    pub seen: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedDescriber {
    pub fn reply(mut self, query: &str, description: &str) -> Self {
        self.replies.insert(query.to_owned(), description.to_owned());
        self
    }
}

#[async_trait]
impl DescriptionSynthesizer for ScriptedDescriber {
    async fn describe(&self, query: &str, captions: &[String]) -> Result<String, CapabilityError> {
        self.seen.lock().unwrap().push((query.to_owned(), captions.to_vec()));
        self.replies
            .get(query)
            .cloned()
            .ok_or_else(|| CapabilityError::Malformed(format!("no reply for {}", query)))
    }
}

/// 记录提示词并返回一张纯色图片
#[derive(Default)]
pub struct RecordingRenderer {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageSynthesizer for RecordingRenderer {
    async fn synthesize(&self, request: &RenderRequest) -> Result<Vec<u8>, CapabilityError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        let image = RgbImage::from_pixel(32, 32, Rgb([128, 128, 128]));
        let mut buf = vec![];
        image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }
}

/// 总是失败的图像生成器
pub struct BrokenRenderer;

#[async_trait]
impl ImageSynthesizer for BrokenRenderer {
    async fn synthesize(&self, _request: &RenderRequest) -> Result<Vec<u8>, CapabilityError> {
        Err(CapabilityError::Malformed("out of memory".to_owned()))
    }
}

pub fn unit(v: [f32; 4]) -> [f32; 4] {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.map(|x| x / norm)
}

/// 五行的嵌入表，第 i 行的 dataset_index 为 i
pub fn radiology_index() -> SimilarityIndex {
    let rows = [
        (unit([1., 0., 0., 0.]), "fracture of the left femur"),
        (unit([0., 1., 0., 0.]), "soft tissue infection"),
        (unit([0., 0., 1., 0.]), "right lower lobe pneumonia"),
        (unit([0., 0., 0., 1.]), "large pleural effusion"),
        (unit([1., 0., 0., 1.]), "rib fracture with effusion"),
    ];
    let mut embeddings = Array2::zeros((rows.len(), 4));
    for (i, (v, _)) in rows.iter().enumerate() {
        embeddings.row_mut(i).assign(&ArrayView1::from(&v[..]));
    }
    let records = rows
        .iter()
        .enumerate()
        .map(|(i, (_, caption))| ImageRecord {
            dataset_index: Some(i as u64),
            filename: Some(format!("roco_{}.jpg", i)),
            caption: Some(caption.to_string()),
        })
        .collect();
    SimilarityIndex::new(embeddings, MetadataTable::from_records(records))
}

pub fn context(
    describer: Arc<dyn DescriptionSynthesizer>,
    synthesizer: Arc<dyn ImageSynthesizer>,
) -> Arc<RetrievalContext> {
    Arc::new(RetrievalContext::new(
        radiology_index(),
        Arc::new(KeywordEmbedder),
        describer,
        Renderer::new(synthesizer, Watermark::bundled().unwrap()),
    ))
}
