// 该文件是 Chouqian （抽签） 项目的一部分。
// src/model.rs - 上游分割检测服务
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

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use image::RgbImage;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl,
  candidate::{DEFAULT_MAX_DIM, RawMask},
  mask::{Mask, MaskError},
};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 默认的分割置信度阈值
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// 发给检测服务的目标尺寸与阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectRequest {
  pub width: u32,
  pub height: u32,
  pub threshold: f32,
}

impl DetectRequest {
  /// 等比缩小到两边都不超过 `max_dim`，不放大
  pub fn for_image(width: u32, height: u32, max_dim: u32, threshold: f32) -> Self {
    let (mut w, mut h) = (width, height);
    if width > max_dim || height > max_dim {
      let scale = f64::min(
        max_dim as f64 / width as f64,
        max_dim as f64 / height as f64,
      );
      w = (width as f64 * scale).round() as u32;
      h = (height as f64 * scale).round() as u32;
    }
    Self {
      width: w,
      height: h,
      threshold,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaskEntry {
  pub mask: Vec<Vec<u8>>,
  #[serde(default, alias = "score")]
  pub confidence: Option<f32>,
}

/// 检测服务的 JSON 响应
#[derive(Debug, Clone, Deserialize)]
pub struct DetectResponse {
  /// 服务端缩放后重新编码的 JPEG（base64）
  #[serde(default)]
  pub original_image: Option<String>,
  #[serde(default)]
  pub masks: Vec<MaskEntry>,
}

#[derive(Error, Debug)]
pub enum ResponseError {
  #[error("JSON 解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("第 {index} 个掩码无效: {source}")]
  InvalidMask { index: usize, source: MaskError },
}

/// 一次检测的结果：预览图与所有掩码
#[derive(Debug, Clone, Default)]
pub struct Detection {
  pub preview: Option<RgbImage>,
  pub masks: Vec<RawMask>,
}

impl DetectResponse {
  pub fn from_slice(data: &[u8]) -> Result<Self, ResponseError> {
    Ok(serde_json::from_slice(data)?)
  }

  pub fn into_detection(self) -> Result<Detection, ResponseError> {
    let masks = self
      .masks
      .into_iter()
      .enumerate()
      .map(|(index, entry)| {
        let mask =
          Mask::from_rows(entry.mask).map_err(|source| ResponseError::InvalidMask { index, source })?;
        Ok(RawMask {
          mask,
          confidence: entry.confidence,
        })
      })
      .collect::<Result<Vec<_>, ResponseError>>()?;

    // 预览图解码失败不影响掩码
    let preview = self.original_image.as_deref().and_then(decode_preview);

    debug!("检测响应: {} 个掩码", masks.len());
    Ok(Detection { preview, masks })
  }
}

fn decode_preview(encoded: &str) -> Option<RgbImage> {
  let bytes = match BASE64.decode(encoded.trim()) {
    Ok(bytes) => bytes,
    Err(e) => {
      warn!("预览图 base64 解码失败: {}", e);
      return None;
    }
  };
  match image::load_from_memory(&bytes) {
    Ok(image) => Some(image.to_rgb8()),
    Err(e) => {
      warn!("预览图解码失败: {}", e);
      None
    }
  }
}

/// 从 URL 查询参数中读取阈值与尺寸上限
pub(crate) fn request_options(url: &Url) -> (f32, u32) {
  let mut threshold = DEFAULT_THRESHOLD;
  let mut max_dim = DEFAULT_MAX_DIM;
  for (k, v) in url.query_pairs() {
    match k.as_ref() {
      "threshold" => match v.parse() {
        Ok(t) => threshold = t,
        Err(_) => warn!("无效的 threshold 参数: {}", v),
      },
      "max_dim" => match v.parse() {
        Ok(d) => max_dim = d,
        Err(_) => warn!("无效的 max_dim 参数: {}", v),
      },
      _ => {}
    }
  }
  (threshold, max_dim)
}

mod replay;
pub use self::replay::{ReplayDetector, ReplayDetectorError};

#[cfg(feature = "remote_detector")]
mod remote;
#[cfg(feature = "remote_detector")]
pub use self::remote::{RemoteDetector, RemoteDetectorError};

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("回放检测错误: {0}")]
  ReplayDetectorError(#[from] ReplayDetectorError),
  #[cfg(feature = "remote_detector")]
  #[error("远程检测错误: {0}")]
  RemoteDetectorError(#[from] RemoteDetectorError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum DetectorWrapper {
  Replay(ReplayDetector),
  #[cfg(feature = "remote_detector")]
  Remote(RemoteDetector),
}

impl FromUrl for DetectorWrapper {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    use crate::FromUrlWithScheme;

    if url.scheme() == ReplayDetector::SCHEME {
      return Ok(DetectorWrapper::Replay(ReplayDetector::from_url(url)?));
    }
    #[cfg(feature = "remote_detector")]
    {
      if RemoteDetector::accepts(url) {
        return Ok(DetectorWrapper::Remote(RemoteDetector::from_url(url)?));
      }
    }
    Err(DetectorError::SchemeMismatch)
  }
}

impl DetectorWrapper {
  pub fn max_dim(&self) -> u32 {
    match self {
      DetectorWrapper::Replay(detector) => detector.max_dim(),
      #[cfg(feature = "remote_detector")]
      DetectorWrapper::Remote(detector) => detector.max_dim(),
    }
  }
}

impl Model for DetectorWrapper {
  type Input = RgbImage;
  type Output = Detection;
  type Error = DetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self {
      DetectorWrapper::Replay(detector) => detector.infer(input).map_err(DetectorError::from),
      #[cfg(feature = "remote_detector")]
      DetectorWrapper::Remote(detector) => detector.infer(input).map_err(DetectorError::from),
    }
  }
}
