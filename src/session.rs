// 该文件是 Chouqian （抽签） 项目的一部分。
// src/session.rs - 检测会话：当前图像、候选列表与抽取状态的唯一持有者
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

use image::{RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  candidate::{Candidate, RawMask, SegmentationResultBuilder},
  model::{Detection, Model},
  shuffle::{ShuffleHandle, ShuffleSelector, ShuffleState},
  viewport::{Viewport, ViewportError, ViewportParams},
};

#[derive(Error, Debug)]
pub enum SessionError<E: std::error::Error + 'static> {
  #[error("检测失败: {0}")]
  DetectionFailed(#[source] E),
}

/// 掩码坐标基于服务端缩放后的图像。有预览图时以预览图为准，
/// 否则把原图缩放到掩码尺寸，保证投影的自然尺寸与掩码一致。
pub(crate) fn mask_frame(image: RgbImage, preview: Option<RgbImage>, masks: &[RawMask]) -> RgbImage {
  if let Some(preview) = preview {
    return preview;
  }
  let Some(raw) = masks.first() else {
    return image;
  };
  let (width, height) = (raw.mask.width() as u32, raw.mask.height() as u32);
  if width == 0 || height == 0 || (width, height) == image.dimensions() {
    return image;
  }
  debug!(
    "没有预览图，原图 {:?} 缩放到掩码尺寸 {}x{}",
    image.dimensions(),
    width,
    height
  );
  image::imageops::resize(&image, width, height, FilterType::Triangle)
}

pub struct DetectionSession {
  builder: SegmentationResultBuilder,
  selector: ShuffleSelector,
  image: Option<RgbImage>,
  candidates: Vec<Candidate>,
  processing: bool,
}

impl DetectionSession {
  pub fn new(builder: SegmentationResultBuilder, selector: ShuffleSelector) -> Self {
    Self {
      builder,
      selector,
      image: None,
      candidates: Vec::new(),
      processing: false,
    }
  }

  pub fn selector(&self) -> &ShuffleSelector {
    &self.selector
  }

  pub fn image(&self) -> Option<&RgbImage> {
    self.image.as_ref()
  }

  pub fn candidates(&self) -> &[Candidate] {
    &self.candidates
  }

  pub fn is_processing(&self) -> bool {
    self.processing
  }

  pub fn state(&self) -> ShuffleState {
    self.selector.state()
  }

  pub fn selected(&self) -> Option<&Candidate> {
    let id = self.selector.state().selected()?;
    self.candidates.iter().find(|c| c.id == id)
  }

  fn replace_candidates(&mut self, candidates: Vec<Candidate>) {
    self.selector.set_candidates(candidates.iter().map(|c| c.id));
    self.candidates = candidates;
  }

  /// 把检测结果整体装入会话，替换上一张图像的候选
  pub fn load(&mut self, image: RgbImage, detection: Detection) -> usize {
    let Detection { preview, masks } = detection;
    self.image = Some(mask_frame(image, preview, &masks));
    let candidates = self.builder.build(masks);
    info!("得到 {} 个候选对象", candidates.len());
    self.replace_candidates(candidates);
    self.candidates.len()
  }

  /// 运行检测并装入结果。失败时候选列表保持为空，可以直接重试。
  pub fn process<M>(&mut self, model: &M, image: RgbImage) -> Result<usize, SessionError<M::Error>>
  where
    M: Model<Input = RgbImage, Output = Detection>,
    M::Error: std::error::Error + 'static,
  {
    self.processing = true;
    self.image = None;
    self.replace_candidates(Vec::new());

    let result = model.infer(&image);
    self.processing = false;

    match result {
      Ok(detection) => Ok(self.load(image, detection)),
      Err(e) => {
        error!("检测失败: {}", e);
        Err(SessionError::DetectionFailed(e))
      }
    }
  }

  pub fn shuffle(&self) -> Option<ShuffleHandle> {
    self.selector.start()
  }

  pub fn reset(&self) {
    self.selector.reset();
  }

  /// 当前图像在给定容器中的投影参数
  pub fn viewport(&self, container_width: f64, container_height: f64) -> Result<Viewport, ViewportError> {
    let (w, h) = self
      .image
      .as_ref()
      .map(|image| (image.width() as f64, image.height() as f64))
      .unwrap_or((0.0, 0.0));
    ViewportParams::new(w, h, container_width, container_height).viewport()
  }
}
