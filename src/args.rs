// 该文件是 Dianjing （点睛） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Dianjing 服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// HTTP 监听地址
  #[arg(long, default_value = "127.0.0.1:3000", value_name = "ADDR")]
  pub bind: SocketAddr,

  /// 上传与结果图像的存放目录
  #[arg(long, default_value = "./static/images", value_name = "DIR")]
  pub upload_dir: PathBuf,

  /// SIFT 保留的特征点数量上限（0 表示不限制）
  #[arg(long, default_value = "0", value_name = "COUNT")]
  pub max_features: i32,

  /// SIFT 对比度阈值
  #[arg(long, default_value = "0.04", value_name = "THRESHOLD")]
  pub contrast_threshold: f64,

  /// SIFT 边缘响应阈值
  #[arg(long, default_value = "10.0", value_name = "THRESHOLD")]
  pub edge_threshold: f64,
}
