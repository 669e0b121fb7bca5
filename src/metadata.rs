use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

/// 图片元数据记录
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImageRecord {
    /// 图片在原始数据集中的下标，缺失时使用所在行号
    #[serde(default)]
    pub dataset_index: Option<u64>,
    /// 图片文件名
    #[serde(default)]
    pub filename: Option<String>,
    /// 图片说明文字
    #[serde(default)]
    pub caption: Option<String>,
}

/// 与嵌入表逐行对齐的元数据表
///
/// 无法解析的记录保存为 `None`，检索时直接跳过。
#[derive(Debug, Default)]
pub struct MetadataTable {
    records: Vec<Option<ImageRecord>>,
}

impl MetadataTable {
    /// 从 JSON 数组文件加载
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).with_context(|| format!("无法读取 {}", path.display()))?;
        let values: Vec<Value> = serde_json::from_slice(&data)
            .with_context(|| format!("元数据格式错误: {}", path.display()))?;
        Ok(Self::from_values(values))
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        let records = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("skipping malformed metadata record {}: {}", i, e);
                    None
                }
            })
            .collect::<Vec<_>>();
        let malformed = records.iter().filter(|r| r.is_none()).count();
        if malformed > 0 {
            warn!("{} 条元数据记录无法解析，检索时将被跳过", malformed);
        }
        Self { records }
    }

    pub fn from_records(records: Vec<ImageRecord>) -> Self {
        Self { records: records.into_iter().map(Some).collect() }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 返回第 `row` 行的记录，越界或无法解析时返回 `None`
    pub fn get(&self, row: usize) -> Option<&ImageRecord> {
        self.records.get(row)?.as_ref()
    }

    /// 可用记录数量
    pub fn valid(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }
}
