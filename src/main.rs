// Copyright 2025 ScreenGraph Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use screengraph::{AppConfig, Pipeline};

#[derive(Parser)]
#[command(name = "screengraph", about = "Load title/name/principal extracts into a property graph")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding the source extracts.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    report_interval: Option<u64>,
    #[arg(long)]
    surreal_url: Option<String>,
    #[arg(long)]
    surreal_ns: Option<String>,
    #[arg(long)]
    surreal_db: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full load pipeline.
    Load,
    /// Drop the pipeline's indexes and delete all nodes and edges.
    BurnDown,
}

fn main() -> anyhow::Result<()> {
    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
    env_logger::Builder::from_env(env).init();

    let cli = Cli::parse();
    let (mut cfg, cfg_path) = AppConfig::load(cli.config.as_deref())?;
    info!("loaded config from {}", cfg_path.display());

    if let Some(dir) = cli.data_dir {
        cfg.data_dir = dir;
    }
    if let Some(n) = cli.batch_size {
        cfg.batch_size = n;
    }
    if let Some(n) = cli.report_interval {
        cfg.report_interval = n;
    }
    if let Some(url) = cli.surreal_url {
        cfg.surreal_url = Some(url);
    }
    if let Some(ns) = cli.surreal_ns {
        cfg.surreal_ns = ns;
    }
    if let Some(db) = cli.surreal_db {
        cfg.surreal_db = db;
    }

    let pipeline = Pipeline::connect(cfg)?;
    match cli.command {
        Command::Load => {
            pipeline.run()?;
        }
        Command::BurnDown => {
            let deleted = pipeline.burn_down()?;
            info!("{} records removed", deleted);
        }
    }
    Ok(())
}
