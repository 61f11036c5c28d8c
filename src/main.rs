// 该文件是 Dianjing （点睛） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use dianjing::sift::{SiftConfig, SiftProcessor};
use dianjing::store::ImageStore;
use dianjing::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("监听地址: {}", args.bind);
  info!("图像目录: {}", args.upload_dir.display());

  let store = ImageStore::open(&args.upload_dir)?;
  let processor = SiftProcessor::new(SiftConfig {
    n_features: args.max_features,
    contrast_threshold: args.contrast_threshold,
    edge_threshold: args.edge_threshold,
    ..SiftConfig::default()
  });

  let state = AppState {
    store: Arc::new(store),
    processor: Arc::new(processor),
  };

  let listener = tokio::net::TcpListener::bind(args.bind).await?;
  info!("服务已启动: http://{}", args.bind);

  axum::serve(listener, web::router(state))
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("服务已退出");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!("无法监听中断信号: {}", e);
    return;
  }
  info!("收到中断信号，准备退出...");
}
