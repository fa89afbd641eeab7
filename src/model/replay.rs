// 该文件是 Chouqian （抽签） 项目的一部分。
// src/model/replay.rs - 回放保存的检测响应
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{Detection, DetectResponse, Model, ResponseError, request_options},
  url_file_path,
};

#[derive(Error, Debug)]
pub enum ReplayDetectorError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("响应错误: {0}")]
  ResponseError(#[from] ResponseError),
}

/// 每次推理都从磁盘重新读取同一份响应，方便离线调试
pub struct ReplayDetector {
  path: String,
  max_dim: u32,
}

impl FromUrlWithScheme for ReplayDetector {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayDetector {
  type Error = ReplayDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayDetectorError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let (_, max_dim) = request_options(url);
    Ok(ReplayDetector {
      path: url_file_path(url),
      max_dim,
    })
  }
}

impl ReplayDetector {
  pub fn max_dim(&self) -> u32 {
    self.max_dim
  }
}

impl Model for ReplayDetector {
  type Input = RgbImage;
  type Output = Detection;
  type Error = ReplayDetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("回放输入图像尺寸: {}x{}", input.width(), input.height());
    info!("读取检测响应: {}", self.path);
    let data = std::fs::read(&self.path)?;
    Ok(DetectResponse::from_slice(&data)?.into_detection()?)
  }
}
