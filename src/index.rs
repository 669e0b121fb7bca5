use std::time::Instant;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use ndarray::prelude::*;
use ndarray_npy::read_npy;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::DataDir;
use crate::metadata::MetadataTable;

/// 一条检索结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    /// 图片在原始数据集中的下标
    pub dataset_index: u64,
    /// 与查询向量的余弦相似度
    pub score: f32,
    pub caption: String,
    pub filename: String,
    /// 外部图片存储中的查询路径
    pub image_ref: String,
}

/// 暴力检索的相似度索引
///
/// 嵌入表与元数据表在加载后只读，可在并发请求间直接共享。
pub struct SimilarityIndex {
    embeddings: Array2<f32>,
    metadata: MetadataTable,
}

impl SimilarityIndex {
    pub fn new(embeddings: Array2<f32>, metadata: MetadataTable) -> Self {
        if embeddings.nrows() != metadata.len() {
            warn!(
                "嵌入表有 {} 行，但元数据只有 {} 条，缺少元数据的行不会出现在结果中",
                embeddings.nrows(),
                metadata.len()
            );
        }
        Self { embeddings, metadata }
    }

    /// 从数据目录加载嵌入表与元数据
    pub fn open(data_dir: &DataDir) -> Result<Self> {
        let path = data_dir.embeddings();
        let embeddings: Array2<f32> =
            read_npy(&path).with_context(|| format!("无法读取嵌入表 {}", path.display()))?;
        let metadata = match data_dir.metadata() {
            Some(path) => MetadataTable::open(path)?,
            None => {
                warn!("未找到元数据文件，检索将不会返回任何结果");
                MetadataTable::default()
            }
        };
        info!("嵌入表加载完成：{} 条记录，维数 {}", embeddings.nrows(), embeddings.ncols());
        Ok(Self::new(embeddings, metadata))
    }

    /// 嵌入表行数
    pub fn len(&self) -> usize {
        self.embeddings.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 向量维数
    pub fn dim(&self) -> usize {
        self.embeddings.ncols()
    }

    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    /// 计算查询向量与每一行的点积
    pub fn scores(&self, query: ArrayView1<f32>) -> Result<Vec<f32>> {
        anyhow::ensure!(
            query.len() == self.dim(),
            "查询向量维数 {} 与嵌入表维数 {} 不一致",
            query.len(),
            self.dim()
        );
        Ok((0..self.len())
            .into_par_iter()
            .map(|i| self.embeddings.row(i).dot(&query))
            .collect())
    }

    /// 返回与查询向量最相似的 `k` 条记录，按相似度从高到低排列
    ///
    /// 相似度相同时行号小的在前。缺少元数据的行会被跳过而不补位，
    /// 因此结果可能少于 `k` 条。
    ///
    /// # Arguments
    ///
    /// * `query` - 单位长度的查询向量
    /// * `k` - 返回数量，至少为 1
    pub fn top_k(&self, query: ArrayView1<f32>, k: usize) -> Result<Vec<Match>> {
        anyhow::ensure!(k >= 1, "top_k 至少为 1");
        let instant = Instant::now();
        let scores = self.scores(query)?;

        let mut order = (0..scores.len()).collect::<Vec<_>>();
        // sort_by 是稳定排序，相同分数保留原始行序
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        order.truncate(k);

        let matches = order
            .into_iter()
            .filter_map(|row| {
                let record = self.metadata.get(row)?;
                let dataset_index = record.dataset_index.unwrap_or(row as u64);
                Some(Match {
                    dataset_index,
                    score: scores[row],
                    caption: record.caption.clone().unwrap_or_default(),
                    filename: record.filename.clone().unwrap_or_else(|| "img".to_owned()),
                    image_ref: format!("/image/{}", dataset_index),
                })
            })
            .collect::<Vec<_>>();

        debug!(
            "top {} of {} rows: {} matches in {:.2}ms",
            k,
            self.len(),
            matches.len(),
            instant.elapsed().as_secs_f32() * 1000.
        );

        Ok(matches)
    }
}

/// 从检索结果中收集用于描述合成的说明文字，过短的说明不具备参考价值
pub fn context_captions(matches: &[Match]) -> Vec<String> {
    matches.iter().map(|m| &m.caption).filter(|c| c.chars().count() > 5).cloned().collect()
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;
    use crate::metadata::ImageRecord;

    fn record(i: u64) -> ImageRecord {
        ImageRecord {
            dataset_index: Some(100 + i),
            filename: Some(format!("{}.jpg", i)),
            caption: Some(format!("caption of image {}", i)),
        }
    }

    #[fixture]
    fn index() -> SimilarityIndex {
        let embeddings = array![
            [1., 0., 0.],
            [0., 1., 0.],
            [0.6, 0.8, 0.],
            [0., 0., 1.],
            [0.6, 0.8, 0.],
        ];
        SimilarityIndex::new(embeddings, MetadataTable::from_records((0..5).map(record).collect()))
    }

    #[rstest]
    fn ordered_by_score(index: SimilarityIndex) {
        let result = index.top_k(array![0., 1., 0.].view(), 5).unwrap();
        let scores = result.iter().map(|m| m.score).collect::<Vec<_>>();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(result[0].dataset_index, 101);
        assert_eq!(result[0].image_ref, "/image/101");
        assert_eq!(result[0].filename, "1.jpg");
    }

    #[rstest]
    fn ties_keep_table_order(index: SimilarityIndex) {
        let result = index.top_k(array![0.6, 0.8, 0.].view(), 2).unwrap();
        assert_eq!(result.iter().map(|m| m.dataset_index).collect::<Vec<_>>(), vec![102, 104]);
        assert_eq!(result[0].score, result[1].score);
    }

    #[rstest]
    #[case(1, 1)]
    #[case(3, 3)]
    #[case(5, 5)]
    #[case(50, 5)]
    fn result_count(index: SimilarityIndex, #[case] k: usize, #[case] expected: usize) {
        assert_eq!(index.top_k(array![1., 0., 0.].view(), k).unwrap().len(), expected);
    }

    #[rstest]
    fn rejects_zero_k_and_wrong_dim(index: SimilarityIndex) {
        assert!(index.top_k(array![1., 0., 0.].view(), 0).is_err());
        assert!(index.top_k(array![1., 0.].view(), 1).is_err());
    }

    #[test]
    fn rows_without_metadata_are_skipped() {
        let embeddings = array![[1., 0.], [0.8, 0.6], [0.6, 0.8], [0., 1.]];
        let metadata = MetadataTable::from_values(vec![
            serde_json::json!({"caption": "no explicit index"}),
            serde_json::json!({"dataset_index": -1}),
            serde_json::json!({"dataset_index": 9, "filename": "c.jpg"}),
        ]);
        let index = SimilarityIndex::new(embeddings, metadata);

        // 第 1 行元数据无法解析，第 3 行超出元数据范围，都不补位
        let result = index.top_k(array![1., 0.].view(), 2).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].dataset_index, 0);
        assert_eq!(result[0].caption, "no explicit index");
        assert_eq!(result[0].filename, "img");

        let result = index.top_k(array![0., 1.].view(), 4).unwrap();
        assert_eq!(result.iter().map(|m| m.dataset_index).collect::<Vec<_>>(), vec![9, 0]);
        assert_eq!(result[0].caption, "");
    }

    #[test]
    fn short_captions_are_not_context() {
        let matches = ["", "rib", "sixsix", "bilateral effusion"]
            .into_iter()
            .enumerate()
            .map(|(i, caption)| Match {
                dataset_index: i as u64,
                score: 0.,
                caption: caption.to_owned(),
                filename: "img".to_owned(),
                image_ref: format!("/image/{}", i),
            })
            .collect::<Vec<_>>();
        assert_eq!(context_captions(&matches), vec!["sixsix", "bilateral effusion"]);
    }
}
