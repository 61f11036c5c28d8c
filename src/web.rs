// 该文件是 Dianjing （点睛） 项目的一部分。
// src/web.rs - 上传处理与页面路由
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;
use std::sync::Arc;

use askama::Template;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use thiserror::Error;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::feature::{FeatureKind, UnknownFeatureKind};
use crate::sift::{SiftError, SiftProcessor};
use crate::store::{ImageStore, StoreError};

/// 上传请求体的大小上限
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;
/// 图像目录对外暴露的路径前缀
const STATIC_IMAGES_PREFIX: &str = "/static/images";

#[derive(Clone)]
pub struct AppState {
  pub store: Arc<ImageStore>,
  pub processor: Arc<SiftProcessor>,
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate;

#[derive(Template)]
#[template(path = "result.html")]
struct ResultTemplate {
  feature_kind: &'static str,
  result_href: String,
  is_image: bool,
}

#[derive(Error, Debug)]
pub enum WebError {
  #[error("没有上传图像文件")]
  NoImage,
  #[error("请为匹配上传两张图像")]
  NeedTwoImages,
  #[error("缺少特征类型字段")]
  MissingFeatureKind,
  #[error(transparent)]
  UnknownFeatureKind(#[from] UnknownFeatureKind),
  #[error("表单解析错误: {0}")]
  Multipart(#[from] MultipartError),
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error("图像处理失败: {0}")]
  Sift(#[from] SiftError),
  #[error("后台任务失败: {0}")]
  Join(#[from] tokio::task::JoinError),
  #[error("模板渲染错误: {0}")]
  Template(#[from] askama::Error),
}

impl WebError {
  fn status(&self) -> StatusCode {
    match self {
      WebError::NoImage
      | WebError::NeedTwoImages
      | WebError::MissingFeatureKind
      | WebError::UnknownFeatureKind(_)
      | WebError::Multipart(_)
      | WebError::Store(StoreError::UnsupportedExtension(_)) => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for WebError {
  fn into_response(self) -> Response {
    let status = self.status();
    warn!("请求处理失败 ({}): {}", status, self);
    (status, self.to_string()).into_response()
  }
}

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/", get(index))
    .route("/process", post(process))
    .nest_service(
      STATIC_IMAGES_PREFIX,
      ServeDir::new(state.store.root().to_path_buf()),
    )
    .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn index() -> Result<Html<String>, WebError> {
  Ok(Html(IndexTemplate.render()?))
}

async fn process(
  State(state): State<AppState>,
  mut multipart: Multipart,
) -> Result<Html<String>, WebError> {
  let mut feature_field: Option<String> = None;
  let mut images: Vec<(String, Bytes)> = Vec::new();

  while let Some(field) = multipart.next_field().await? {
    let name = field.name().map(str::to_owned);
    match name.as_deref() {
      Some("feature_type") => feature_field = Some(field.text().await?),
      Some("image") => {
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        // 浏览器会为留空的文件框提交一个空文件段，跳过
        if file_name.is_empty() || data.is_empty() {
          continue;
        }
        images.push((file_name, data));
      }
      _ => {}
    }
  }

  let kind: FeatureKind = feature_field
    .ok_or(WebError::MissingFeatureKind)?
    .parse()?;
  if images.is_empty() {
    return Err(WebError::NoImage);
  }
  if images.len() < kind.image_count() {
    return Err(WebError::NeedTwoImages);
  }

  info!("处理请求: 特征类型 {}，{} 张图像", kind, images.len());

  // OpenCV 的调用都是同步阻塞的，放到阻塞线程池里执行
  let store = state.store.clone();
  let processor = state.processor.clone();
  let result_path = tokio::task::spawn_blocking(move || -> Result<PathBuf, WebError> {
    let mut saved = Vec::with_capacity(images.len());
    for (name, data) in &images {
      saved.push(store.save_upload(name, data)?);
    }
    let path = match kind {
      FeatureKind::Matching => processor.match_files(&saved[0], &saved[1], &store)?,
      _ => processor.process_image(&saved[0], &store, kind)?,
    };
    Ok(path)
  })
  .await??;

  let file_name = result_path
    .file_name()
    .and_then(|s| s.to_str())
    .unwrap_or_default()
    .to_string();
  let page = ResultTemplate {
    feature_kind: kind.as_str(),
    result_href: format!("{STATIC_IMAGES_PREFIX}/{file_name}"),
    is_image: kind != FeatureKind::Descriptors,
  };
  Ok(Html(page.render()?))
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::body::Body;
  use axum::http::{Request, header};
  use http_body_util::BodyExt;
  use tower::util::ServiceExt;

  fn test_state(tag: &str) -> AppState {
    let root = std::env::temp_dir().join(format!("dianjing-web-{}-{}", tag, std::process::id()));
    AppState {
      store: Arc::new(ImageStore::open(root).unwrap()),
      processor: Arc::new(SiftProcessor::default()),
    }
  }

  fn multipart_body(fields: &[(&str, Option<&str>, &str)]) -> (String, Body) {
    const BOUNDARY: &str = "dianjing-test-boundary";
    let mut body = String::new();
    for (name, file_name, value) in fields {
      body.push_str(&format!("--{BOUNDARY}\r\n"));
      match file_name {
        Some(file_name) => body.push_str(&format!(
          "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )),
        None => {
          body.push_str(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"))
        }
      }
      body.push_str(value);
      body.push_str("\r\n");
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    (
      format!("multipart/form-data; boundary={BOUNDARY}"),
      Body::from(body),
    )
  }

  async fn send(state: AppState, content_type: &str, body: Body) -> (StatusCode, String) {
    let response = router(state)
      .oneshot(
        Request::builder()
          .method("POST")
          .uri("/process")
          .header(header::CONTENT_TYPE, content_type)
          .body(body)
          .unwrap(),
      )
      .await
      .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
  }

  #[tokio::test]
  async fn index_renders_upload_form() {
    let response = router(test_state("index"))
      .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8_lossy(&bytes);
    assert!(html.contains("feature_type"));
    assert!(html.contains("/process"));
  }

  #[tokio::test]
  async fn process_without_image_is_rejected() {
    let (ct, body) = multipart_body(&[("feature_type", None, "keypoints")]);
    let (status, text) = send(test_state("no-image"), &ct, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(text.contains("图像"));
  }

  #[tokio::test]
  async fn process_without_feature_kind_is_rejected() {
    let (ct, body) = multipart_body(&[("image", Some("a.png"), "x")]);
    let (status, _) = send(test_state("no-kind"), &ct, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn process_with_unknown_kind_is_rejected() {
    let (ct, body) = multipart_body(&[
      ("feature_type", None, "corners"),
      ("image", Some("a.png"), "x"),
    ]);
    let (status, text) = send(test_state("bad-kind"), &ct, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(text.contains("corners"));
  }

  #[tokio::test]
  async fn matching_requires_two_images() {
    let (ct, body) = multipart_body(&[
      ("feature_type", None, "matching"),
      ("image", Some("a.png"), "x"),
    ]);
    let (status, text) = send(test_state("one-image"), &ct, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(text.contains("两张"));
  }

  #[tokio::test]
  async fn unsupported_extension_is_rejected() {
    let (ct, body) = multipart_body(&[
      ("feature_type", None, "keypoints"),
      ("image", Some("notes.txt"), "x"),
    ]);
    let (status, text) = send(test_state("bad-ext"), &ct, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(text.contains("txt"));
  }
}
