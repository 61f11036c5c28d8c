// 该文件是 Dianjing （点睛） 项目的一部分。
// src/bin/oneshot.rs - 单次处理工具
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use dianjing::feature::FeatureKind;
use dianjing::sift::SiftProcessor;
use dianjing::store::ImageStore;

/// Dianjing 单次处理工具参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像路径
  #[arg(long, value_name = "FILE")]
  pub input: PathBuf,

  /// 匹配时的第二张输入图像
  #[arg(long, value_name = "FILE")]
  pub second: Option<PathBuf>,

  /// 特征类型（keypoints、descriptors 或 matching）
  #[arg(long, default_value = "keypoints", value_name = "KIND")]
  pub feature: FeatureKind,

  /// 结果输出目录
  #[arg(long, default_value = "./static/images", value_name = "DIR")]
  pub output_dir: PathBuf,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入图像: {}", args.input.display());
  info!("特征类型: {}", args.feature);
  info!("输出目录: {}", args.output_dir.display());

  let store = ImageStore::open(&args.output_dir)?;
  let processor = SiftProcessor::default();

  let result = match args.feature {
    FeatureKind::Matching => {
      let second = args
        .second
        .ok_or_else(|| anyhow::anyhow!("匹配需要通过 --second 提供第二张图像"))?;
      processor.match_files(&args.input, &second, &store)?
    }
    kind => processor.process_image(&args.input, &store, kind)?,
  };

  info!("结果已保存: {}", result.display());
  Ok(())
}
