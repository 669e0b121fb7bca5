use anyhow::Result;
use clap::Parser;

use crate::SimilarityIndex;
use crate::cli::SubCommandExtend;
use crate::config::Opts;

#[derive(Parser, Debug, Clone)]
pub struct InfoCommand {}

impl SubCommandExtend for InfoCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let index = SimilarityIndex::open(&opts.data_dir)?;
        let metadata = index.metadata();
        println!("rows      : {}", index.len());
        println!("dimension : {}", index.dim());
        println!("metadata  : {} ({} valid)", metadata.len(), metadata.valid());
        Ok(())
    }
}
