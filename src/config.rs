use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;

static DATA_DIR: LazyLock<DataDir> = LazyLock::new(|| {
    let proj_dirs = ProjectDirs::from("", "mirage", "mirage").expect("failed to get project dir");
    DataDir { path: proj_dirs.data_dir().to_path_buf() }
});

fn default_data_dir() -> &'static str {
    DATA_DIR.path().to_str().unwrap()
}

#[derive(Parser, Debug, Clone)]
pub struct EmbedderOptions {
    /// 文本编码服务地址，接收 `{"text": ...}` 并返回 `{"embedding": [...]}`
    #[arg(long, value_name = "URL", env = "MIRAGE_EMBEDDER_URL")]
    pub embedder_url: String,
    /// 文本编码请求超时，单位为秒
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub embedder_timeout: u64,
}

#[derive(Parser, Debug, Clone)]
pub struct DescriberOptions {
    /// Gemini API key，不填则跳过描述合成，直接使用回退文本
    #[arg(long, value_name = "KEY", env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,
    /// 用于合成描述的模型
    #[arg(long, value_name = "MODEL", default_value = "gemini-2.5-flash")]
    pub describer_model: String,
    /// 描述合成请求超时，单位为秒
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    pub describer_timeout: u64,
}

#[derive(Parser, Debug, Clone)]
pub struct RendererOptions {
    /// 图像生成服务地址，不填则所有图像生成请求都返回占位图
    #[arg(long, value_name = "URL", env = "MIRAGE_DIFFUSION_URL")]
    pub diffusion_url: Option<String>,
    /// 水印与占位图使用的字体文件（TTF/OTF），不填则使用内置的 DejaVu Sans
    #[arg(long, value_name = "FILE")]
    pub watermark_font: Option<PathBuf>,
    /// 图像生成请求超时，单位为秒
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    pub renderer_timeout: u64,
}

/// 单次对比请求的默认参数
#[derive(Parser, Debug, Clone)]
pub struct CompareOptions {
    /// 每个 track 返回的真实图片数量
    #[arg(short = 'k', long, value_name = "K", default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    pub top_k: u64,
    /// 不调用 LLM 合成描述，也不进行二次检索
    #[arg(long)]
    pub no_text: bool,
    /// 不生成合成图像
    #[arg(long)]
    pub no_image: bool,
    /// 扩散模型推理步数
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub steps: u32,
    /// 扩散模型 guidance scale
    #[arg(long, value_name = "SCALE", default_value_t = 1.5)]
    pub guidance: f32,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "mirage", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// 预计算的嵌入表与元数据所在目录
    #[arg(short, long, default_value = default_data_dir())]
    pub data_dir: DataDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 执行一次概念对比检索
    Compare(CompareCommand),
    /// 启动 HTTP 对比服务
    Server(ServerCommand),
    /// 显示嵌入表信息
    Info(InfoCommand),
}

#[derive(Debug, Clone)]
pub struct DataDir {
    path: PathBuf,
}

impl DataDir {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回图片嵌入表的路径
    pub fn embeddings(&self) -> PathBuf {
        self.path.join("embeddings.npy")
    }

    /// 返回元数据文件的路径，优先使用 `metadata_text.json`
    pub fn metadata(&self) -> Option<PathBuf> {
        ["metadata_text.json", "metadata.json"]
            .into_iter()
            .map(|name| self.path.join(name))
            .find(|path| path.exists())
    }
}

impl FromStr for DataDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}
