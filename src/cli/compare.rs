use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};

use crate::cli::SubCommandExtend;
use crate::compare::{ComparisonOrchestrator, ComparisonResult, CompareRequest, SyntheticImage, Track};
use crate::config::{CompareOptions, DescriberOptions, EmbedderOptions, Opts, RendererOptions};
use crate::context::RetrievalContext;

#[derive(Parser, Debug, Clone)]
pub struct CompareCommand {
    #[command(flatten)]
    pub compare: CompareOptions,
    #[command(flatten)]
    pub embedder: EmbedderOptions,
    #[command(flatten)]
    pub describer: DescriberOptions,
    #[command(flatten)]
    pub renderer: RendererOptions,
    /// 原始查询文本
    pub text: String,
    /// 需要加上的概念
    #[arg(long, value_name = "CONCEPT")]
    pub add: Option<String>,
    /// 需要减去的概念
    #[arg(long, value_name = "CONCEPT")]
    pub sub: Option<String>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl CompareCommand {
    pub fn request(&self) -> CompareRequest {
        CompareRequest {
            original_text: self.text.clone(),
            add_concept: self.add.clone(),
            sub_concept: self.sub.clone(),
            top_k: self.compare.top_k as usize,
            enable_text_enrichment: !self.compare.no_text,
            enable_image_generation: !self.compare.no_image,
            diffusion_steps: self.compare.steps,
            guidance_scale: self.compare.guidance,
        }
    }
}

impl SubCommandExtend for CompareCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let ctx = RetrievalContext::open(&opts.data_dir, &self.embedder, &self.describer, &self.renderer)?;
        let orchestrator = ComparisonOrchestrator::new(Arc::new(ctx));
        let result = orchestrator.compare(&self.request()).await?;
        print_result(&result, self)
    }
}

fn print_result(result: &ComparisonResult, opts: &CompareCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            print_track("original", &result.original);
            if let Some(track) = &result.modified {
                println!();
                print_track("modified", track);
            }
        }
    }
    Ok(())
}

fn print_track(name: &str, track: &Track) {
    println!("[{}] {}", name, track.query_text);
    for m in &track.matches {
        println!("{:.4}\t{}\t{}", m.score, m.dataset_index, m.caption);
    }
    println!("description: {}", track.synthetic_prompt);
    match &track.synthetic_image {
        SyntheticImage::Skipped => {}
        SyntheticImage::Placeholder { reason } => println!("image: unavailable ({})", reason),
        SyntheticImage::Rendered { data_uri } => println!("image: {} bytes", data_uri.len()),
    }
}

#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    Json,
    Table,
}
