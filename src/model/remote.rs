// 该文件是 Chouqian （抽签） 项目的一部分。
// src/model/remote.rs - 远程分割检测服务
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

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage, imageops::FilterType};
use reqwest::blocking::{
  Client,
  multipart::{Form, Part},
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectRequest, DetectResponse, Detection, Model, ResponseError, request_options},
};

#[derive(Error, Debug)]
pub enum RemoteDetectorError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("HTTP 错误: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("图像编码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("响应错误: {0}")]
  ResponseError(#[from] ResponseError),
}

/// 通过 multipart 表单上传图像（file、width、height、threshold），接收 JSON 掩码
pub struct RemoteDetector {
  endpoint: Url,
  client: Client,
  threshold: f32,
  max_dim: u32,
}

impl FromUrlWithScheme for RemoteDetector {
  const SCHEME: &'static str = "https";
}

impl RemoteDetector {
  pub fn accepts(url: &Url) -> bool {
    url.scheme() == Self::SCHEME || url.scheme() == "http"
  }

  pub fn max_dim(&self) -> u32 {
    self.max_dim
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  fn encode(&self, image: &RgbImage, request: &DetectRequest) -> Result<Vec<u8>, RemoteDetectorError> {
    let image = if (request.width, request.height) == image.dimensions() {
      DynamicImage::ImageRgb8(image.clone())
    } else {
      DynamicImage::ImageRgb8(image::imageops::resize(
        image,
        request.width,
        request.height,
        FilterType::Triangle,
      ))
    };

    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Jpeg)?;
    Ok(buffer.into_inner())
  }
}

impl FromUrl for RemoteDetector {
  type Error = RemoteDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if !Self::accepts(url) {
      return Err(RemoteDetectorError::SchemeMismatch(format!(
        "期望 'http' 或 'https', 实际 '{}'",
        url.scheme()
      )));
    }

    let (threshold, max_dim) = request_options(url);
    let mut endpoint = url.clone();
    endpoint.set_query(None);

    let client = Client::builder()
      .user_agent(concat!("chouqian/", env!("CARGO_PKG_VERSION")))
      .build()?;

    Ok(RemoteDetector {
      endpoint,
      client,
      threshold,
      max_dim,
    })
  }
}

impl Model for RemoteDetector {
  type Input = RgbImage;
  type Output = Detection;
  type Error = RemoteDetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let request = DetectRequest::for_image(input.width(), input.height(), self.max_dim, self.threshold);
    debug!("检测请求: {:?}", request);

    let file = Part::bytes(self.encode(input, &request)?)
      .file_name("upload.jpg")
      .mime_str("image/jpeg")?;
    let form = Form::new()
      .part("file", file)
      .text("width", request.width.to_string())
      .text("height", request.height.to_string())
      .text("threshold", request.threshold.to_string());

    info!("发送检测请求: {}", self.endpoint);
    let now = std::time::Instant::now();
    let response = self
      .client
      .post(self.endpoint.clone())
      .multipart(form)
      .send()?
      .error_for_status()?;
    let body = response.bytes()?;
    info!("检测服务响应 {} 字节，耗时: {:.2?}", body.len(), now.elapsed());

    Ok(DetectResponse::from_slice(&body)?.into_detection()?)
  }
}
