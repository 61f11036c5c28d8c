// 该文件是 Dianjing （点睛） 项目的一部分。
// src/store.rs - 图像存放目录
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

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

/// 允许上传的图像扩展名
const ALLOWED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];
/// 清理后文件主名保留的最大字符数
const STEM_MAX_LEN: usize = 32;
const FALLBACK_STEM: &str = "upload";

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("不支持的图像扩展名: {0}")]
  UnsupportedExtension(String),
  #[error("I/O 错误: {0}")]
  Io(#[from] std::io::Error),
}

/// 上传与结果图像的共享存放目录。
///
/// 目录中的文件一旦写入便不再删除；文件名由时间戳和计数器共同生成，
/// 同一个目录实例内不会冲突。
pub struct ImageStore {
  root: PathBuf,
  counter: Mutex<u16>,
}

impl ImageStore {
  /// 打开（必要时创建）存放目录
  pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
    let root = root.as_ref().to_path_buf();
    std::fs::create_dir_all(&root)?;
    Ok(ImageStore {
      root,
      counter: Mutex::new(0),
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn next_id(&self) -> u16 {
    let mut counter = self.counter.lock().unwrap();
    let id = counter.wrapping_add(1);
    *counter = id;
    id
  }

  /// 生成一个不会冲突的文件名
  pub fn unique_name(&self, stem: &str, ext: &str) -> String {
    format!(
      "{}-{}-{:04X}.{}",
      stem,
      Utc::now().format("%Y%m%d-%H%M%S"),
      self.next_id(),
      ext
    )
  }

  /// 保存一份上传的图像字节，返回写入的路径。
  ///
  /// 客户端文件名只用来校验扩展名和提取主名，落盘的文件名总是重新生成。
  pub fn save_upload(&self, original_name: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
    let ext = normalized_extension(original_name)
      .ok_or_else(|| StoreError::UnsupportedExtension(original_name.to_string()))?;
    let stem = sanitized_stem(original_name);
    let path = self.root.join(self.unique_name(&stem, &ext));
    std::fs::write(&path, bytes)?;
    debug!("保存上传图像: {} ({} 字节)", path.display(), bytes.len());
    Ok(path)
  }

  /// 生成一个结果文件的完整路径，文件名带特征类型标签
  pub fn result_path(&self, stem: &str, label: &str, ext: &str) -> PathBuf {
    self.root.join(self.unique_name(&format!("{stem}_{label}"), ext))
  }
}

/// 转小写后的扩展名，不在允许列表中时返回 None
pub fn normalized_extension(name: &str) -> Option<String> {
  let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
  ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// 把客户端文件主名清理成只含字母数字、横线与下划线的形式
pub fn sanitized_stem(name: &str) -> String {
  let stem = Path::new(name)
    .file_stem()
    .and_then(|s| s.to_str())
    .unwrap_or(FALLBACK_STEM);
  let cleaned: String = stem
    .chars()
    .take(STEM_MAX_LEN)
    .map(|c| {
      if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
        c
      } else {
        '_'
      }
    })
    .collect();
  if cleaned.chars().all(|c| c == '_') {
    FALLBACK_STEM.to_string()
  } else {
    cleaned
  }
}
