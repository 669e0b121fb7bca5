use anyhow::Result;
use log::debug;
use ndarray::prelude::*;

use crate::capability::Embedder;

/// 将向量缩放为单位长度
///
/// 零向量无法归一化，保持原样返回，此时它与任何行的相似度都为 0。
pub fn normalize(v: &mut Array1<f32>) {
    let norm = v.dot(v).sqrt();
    if norm > 0. && norm.is_finite() {
        v.mapv_inplace(|x| x / norm);
    }
}

pub fn normalized(mut v: Array1<f32>) -> Array1<f32> {
    normalize(&mut v);
    v
}

/// 去除首尾空白后非空的概念才算作"已提供"
pub fn provided(concept: Option<&str>) -> Option<&str> {
    concept.filter(|s| !s.trim().is_empty())
}

/// 概念向量运算：`base + add - sub`
pub struct VectorAlgebra<'a> {
    embedder: &'a dyn Embedder,
}

impl<'a> VectorAlgebra<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self { embedder }
    }

    /// 编码并归一化一段文本
    pub async fn embed(&self, text: &str) -> Result<Array1<f32>> {
        Ok(normalized(self.embedder.embed(text).await?))
    }

    /// 组合查询向量
    ///
    /// # Arguments
    ///
    /// * `base` - 基础查询文本
    /// * `add` - 需要加上的概念，空白视为未提供
    /// * `sub` - 需要减去的概念，空白视为未提供
    pub async fn combine(&self, base: &str, add: Option<&str>, sub: Option<&str>) -> Result<Array1<f32>> {
        let mut vec = self.embed(base).await?;
        if let Some(add) = provided(add) {
            debug!("adding concept: {}", add);
            let add = self.embed(add).await?;
            ensure_same_dim(&vec, &add)?;
            vec += &add;
        }
        if let Some(sub) = provided(sub) {
            debug!("subtracting concept: {}", sub);
            let sub = self.embed(sub).await?;
            ensure_same_dim(&vec, &sub)?;
            vec -= &sub;
        }
        Ok(normalized(vec))
    }
}

fn ensure_same_dim(a: &Array1<f32>, b: &Array1<f32>) -> Result<()> {
    anyhow::ensure!(a.len() == b.len(), "embedding dimension mismatch: {} vs {}", a.len(), b.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use ndarray::array;

    use super::*;

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        async fn embed(&self, text: &str) -> Result<Array1<f32>> {
            Ok(match text.trim() {
                "fracture" => array![3., 0., 0., 0.],
                "effusion" => array![0., 2., 0., 0.],
                "infection" => array![0.5, 0., 0.5, 0.],
                "short" => array![1., 2.],
                _ => array![1., 1., 1., 1.],
            })
        }
    }

    fn norm(v: &Array1<f32>) -> f32 {
        v.dot(v).sqrt()
    }

    #[test]
    fn normalize_unit_and_zero() {
        let v = normalized(array![3., 4.]);
        assert!((norm(&v) - 1.).abs() < 1e-6);
        assert_eq!(v, array![0.6, 0.8]);

        let zero = normalized(array![0., 0., 0.]);
        assert_eq!(zero, array![0., 0., 0.]);
    }

    #[test]
    fn blank_concepts_are_not_provided() {
        assert_eq!(provided(None), None);
        assert_eq!(provided(Some("")), None);
        assert_eq!(provided(Some(" \t\n")), None);
        assert_eq!(provided(Some(" effusion ")), Some(" effusion "));
    }

    #[tokio::test]
    async fn combine_is_unit_norm() {
        let algebra = VectorAlgebra::new(&AxisEmbedder);
        let v = algebra.combine("fracture", Some("effusion"), Some("infection")).await.unwrap();
        assert!((norm(&v) - 1.).abs() < 1e-5);
        // fracture 与 effusion 方向相加，infection 方向相减
        assert!(v[0] > 0. && v[1] > 0. && v[2] < 0.);
    }

    #[tokio::test]
    async fn combine_without_concepts_equals_plain_embedding() {
        let algebra = VectorAlgebra::new(&AxisEmbedder);
        let plain = algebra.embed("fracture").await.unwrap();
        for (add, sub) in [(None, None), (Some(""), Some("  ")), (Some("\t"), None)] {
            let v = algebra.combine("fracture", add, sub).await.unwrap();
            assert_eq!(v, plain);
        }
    }

    #[tokio::test]
    async fn combine_rejects_dimension_mismatch() {
        let algebra = VectorAlgebra::new(&AxisEmbedder);
        assert!(algebra.combine("fracture", Some("short"), None).await.is_err());
    }
}
