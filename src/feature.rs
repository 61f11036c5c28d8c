// 该文件是 Dianjing （点睛） 项目的一部分。
// src/feature.rs - 特征类型定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// 前端表单提交的特征类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
  /// 检测关键点并绘制到图像上
  Keypoints,
  /// 提取描述子并导出
  Descriptors,
  /// 两张图像之间的特征匹配
  Matching,
}

#[derive(Error, Debug)]
#[error("无效的特征类型: {0}")]
pub struct UnknownFeatureKind(pub String);

impl FromStr for FeatureKind {
  type Err = UnknownFeatureKind;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "keypoints" => Ok(FeatureKind::Keypoints),
      "descriptors" => Ok(FeatureKind::Descriptors),
      "matching" => Ok(FeatureKind::Matching),
      other => Err(UnknownFeatureKind(other.to_string())),
    }
  }
}

impl FeatureKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      FeatureKind::Keypoints => "keypoints",
      FeatureKind::Descriptors => "descriptors",
      FeatureKind::Matching => "matching",
    }
  }

  /// 该特征类型需要的输入图像数量
  pub fn image_count(&self) -> usize {
    match self {
      FeatureKind::Matching => 2,
      _ => 1,
    }
  }
}

impl fmt::Display for FeatureKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
