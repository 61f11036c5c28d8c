// 该文件是 Dianjing （点睛） 项目的一部分。
// src/sift.rs - SIFT 特征处理器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use opencv::core::{self, DMatch, KeyPoint, Mat, Ptr, Scalar, Vector};
use opencv::features2d::{self, DrawMatchesFlags};
use opencv::imgcodecs;
use opencv::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::feature::FeatureKind;
use crate::store::ImageStore;

// SIFT 检测器参数，与 OpenCV 的默认值一致
const SIFT_N_FEATURES: i32 = 0;
const SIFT_N_OCTAVE_LAYERS: i32 = 3;
const SIFT_CONTRAST_THRESHOLD: f64 = 0.04;
const SIFT_EDGE_THRESHOLD: f64 = 10.0;
const SIFT_SIGMA: f64 = 1.6;

/// 匹配结果图里最多绘制的匹配对数
const MATCH_DRAW_LIMIT: usize = 50;

#[derive(Error, Debug)]
pub enum SiftError {
  #[error("OpenCV 错误: {0}")]
  OpenCv(#[from] opencv::Error),
  #[error("无法读取图像: {0}")]
  UnreadableImage(PathBuf),
  #[error("图像中没有有效的关键点/描述子")]
  EmptyDescriptors,
  #[error("特征类型 {0} 不适用于单张图像处理")]
  UnsupportedKind(FeatureKind),
  #[error("路径编码无效: {0}")]
  InvalidPathEncoding(PathBuf),
  #[error("无法写出图像: {0}")]
  ImageWrite(PathBuf),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("描述子导出错误: {0}")]
  DescriptorEncode(#[from] serde_json::Error),
}

/// SIFT 检测参数
#[derive(Debug, Clone)]
pub struct SiftConfig {
  /// 保留的特征点数量上限，0 表示不限制
  pub n_features: i32,
  /// 每组高斯金字塔的层数
  pub n_octave_layers: i32,
  /// 对比度阈值
  pub contrast_threshold: f64,
  /// 边缘响应阈值
  pub edge_threshold: f64,
  /// 初始高斯平滑系数
  pub sigma: f64,
}

impl Default for SiftConfig {
  fn default() -> Self {
    SiftConfig {
      n_features: SIFT_N_FEATURES,
      n_octave_layers: SIFT_N_OCTAVE_LAYERS,
      contrast_threshold: SIFT_CONTRAST_THRESHOLD,
      edge_threshold: SIFT_EDGE_THRESHOLD,
      sigma: SIFT_SIGMA,
    }
  }
}

/// 基于 OpenCV SIFT 的特征处理器。
///
/// 处理器自身只保存检测参数，每次调用时按参数创建检测器；
/// 关键点检测、描述子计算、匹配和绘制全部由 OpenCV 完成。
pub struct SiftProcessor {
  config: SiftConfig,
}

impl Default for SiftProcessor {
  fn default() -> Self {
    SiftProcessor::new(SiftConfig::default())
  }
}

impl SiftProcessor {
  pub fn new(config: SiftConfig) -> Self {
    SiftProcessor { config }
  }

  fn create_detector(&self) -> Result<Ptr<features2d::SIFT>, SiftError> {
    let sift = features2d::SIFT::create(
      self.config.n_features,
      self.config.n_octave_layers,
      self.config.contrast_threshold,
      self.config.edge_threshold,
      self.config.sigma,
      false,
    )?;
    Ok(sift)
  }

  /// 检测关键点并计算描述子
  pub fn detect_keypoints(&self, img: &Mat) -> Result<(Vector<KeyPoint>, Mat), SiftError> {
    let mut sift = self.create_detector()?;
    let mut keypoints = Vector::<KeyPoint>::new();
    let mut descriptors = Mat::default();
    sift.detect_and_compute(img, &Mat::default(), &mut keypoints, &mut descriptors, false)?;
    debug!("检测到 {} 个关键点", keypoints.len());
    Ok((keypoints, descriptors))
  }

  /// 把关键点绘制到图像上，带尺度与方向
  pub fn draw_keypoints(
    &self,
    img: &Mat,
    keypoints: &Vector<KeyPoint>,
  ) -> Result<Mat, SiftError> {
    let mut rendered = Mat::default();
    features2d::draw_keypoints(
      img,
      keypoints,
      &mut rendered,
      Scalar::all(-1.0),
      DrawMatchesFlags::DRAW_RICH_KEYPOINTS,
    )?;
    Ok(rendered)
  }

  /// 用交叉验证的 L2 暴力匹配器匹配两张图像，返回绘制好的结果图
  pub fn match_images(&self, img_a: &Mat, img_b: &Mat) -> Result<Mat, SiftError> {
    let (keypoints_a, descriptors_a) = self.detect_keypoints(img_a)?;
    let (keypoints_b, descriptors_b) = self.detect_keypoints(img_b)?;

    // 任一侧没有描述子时无法匹配
    if descriptors_a.empty() || descriptors_b.empty() {
      return Err(SiftError::EmptyDescriptors);
    }

    let matcher = features2d::BFMatcher::create(core::NORM_L2, true)?;
    let mut matches = Vector::<DMatch>::new();
    matcher.train_match(&descriptors_a, &descriptors_b, &mut matches, &Mat::default())?;

    // 距离越小匹配越好，排序后保留最前面的若干对
    let mut ranked = matches.to_vec();
    ranked.sort_by(|a, b| {
      a.distance
        .partial_cmp(&b.distance)
        .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(MATCH_DRAW_LIMIT);
    let best = Vector::<DMatch>::from_iter(ranked);

    info!("匹配完成: 共 {} 对，绘制前 {} 对", matches.len(), best.len());

    let mut rendered = Mat::default();
    features2d::draw_matches(
      img_a,
      &keypoints_a,
      img_b,
      &keypoints_b,
      &best,
      &mut rendered,
      Scalar::all(-1.0),
      Scalar::all(-1.0),
      &Vector::new(),
      DrawMatchesFlags::NOT_DRAW_SINGLE_POINTS,
    )?;
    Ok(rendered)
  }

  /// 按特征类型处理单张图像，返回写出的结果文件路径
  pub fn process_image(
    &self,
    img_path: &Path,
    store: &ImageStore,
    kind: FeatureKind,
  ) -> Result<PathBuf, SiftError> {
    let img = Self::read_grayscale(img_path)?;
    let stem = file_stem(img_path);

    match kind {
      FeatureKind::Keypoints => {
        let (keypoints, _) = self.detect_keypoints(&img)?;
        let rendered = self.draw_keypoints(&img, &keypoints)?;
        let output = store.result_path(stem, kind.as_str(), "png");
        Self::write_image(&rendered, &output)?;
        info!("关键点结果已写出: {}", output.display());
        Ok(output)
      }
      FeatureKind::Descriptors => {
        let (_, descriptors) = self.detect_keypoints(&img)?;
        if descriptors.empty() {
          return Err(SiftError::EmptyDescriptors);
        }
        let output = store.result_path(stem, kind.as_str(), "json");
        Self::dump_descriptors(&descriptors, &output)?;
        info!("描述子已导出: {}", output.display());
        Ok(output)
      }
      FeatureKind::Matching => Err(SiftError::UnsupportedKind(kind)),
    }
  }

  /// 读取两张图像并写出匹配结果图
  pub fn match_files(
    &self,
    path_a: &Path,
    path_b: &Path,
    store: &ImageStore,
  ) -> Result<PathBuf, SiftError> {
    let img_a = Self::read_grayscale(path_a)?;
    let img_b = Self::read_grayscale(path_b)?;
    let rendered = self.match_images(&img_a, &img_b)?;

    let output = store.result_path(file_stem(path_a), FeatureKind::Matching.as_str(), "png");
    Self::write_image(&rendered, &output)?;
    info!("匹配结果已写出: {}", output.display());
    Ok(output)
  }

  /// 以灰度方式读取图像文件，解码交给 OpenCV
  fn read_grayscale(path: &Path) -> Result<Mat, SiftError> {
    let path_str = path
      .to_str()
      .ok_or_else(|| SiftError::InvalidPathEncoding(path.to_path_buf()))?;
    let img = imgcodecs::imread(path_str, imgcodecs::IMREAD_GRAYSCALE)?;
    if img.empty() {
      return Err(SiftError::UnreadableImage(path.to_path_buf()));
    }
    Ok(img)
  }

  fn write_image(img: &Mat, path: &Path) -> Result<(), SiftError> {
    let path_str = path
      .to_str()
      .ok_or_else(|| SiftError::InvalidPathEncoding(path.to_path_buf()))?;
    if !imgcodecs::imwrite(path_str, img, &Vector::new())? {
      return Err(SiftError::ImageWrite(path.to_path_buf()));
    }
    Ok(())
  }

  /// 把描述子矩阵导出为 JSON 文件
  fn dump_descriptors(descriptors: &Mat, path: &Path) -> Result<(), SiftError> {
    let rows = descriptors.to_vec_2d::<f32>()?;
    let payload = serde_json::json!({
      "rows": descriptors.rows(),
      "cols": descriptors.cols(),
      "descriptors": rows,
    });
    let file = std::fs::File::create(path)?;
    serde_json::to_writer(std::io::BufWriter::new(file), &payload)?;
    Ok(())
  }
}

fn file_stem(path: &Path) -> &str {
  path
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or("image")
}
