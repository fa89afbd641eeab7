// 该文件是 Chouqian （抽签） 项目的一部分。
// src/candidate.rs - 由分割掩码构建候选对象
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

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::{
  contour::trace,
  geometry::{BBox, Polygon},
  mask::Mask,
  simplify::simplify,
};

/// 上传前图像最长边的限制，检测服务返回的掩码不会超过该尺寸
pub const DEFAULT_MAX_DIM: u32 = 768;

/// 候选对象标识，取自检测结果中掩码的原始下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CandidateId(pub usize);

impl CandidateId {
  pub fn mask_index(self) -> usize {
    self.0
  }
}

impl fmt::Display for CandidateId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "object-{}", self.0)
  }
}

impl Serialize for CandidateId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

/// 检测服务返回的单个掩码
#[derive(Debug, Clone)]
pub struct RawMask {
  pub mask: Mask,
  pub confidence: Option<f32>,
}

impl From<Mask> for RawMask {
  fn from(mask: Mask) -> Self {
    Self {
      mask,
      confidence: None,
    }
  }
}

/// 可渲染、可抽取的候选对象，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
  pub id: CandidateId,
  pub polygon: Polygon,
  pub bbox: BBox,
  pub confidence: f32,
  pub area: u64,
}

fn normalize_confidence(confidence: Option<f32>) -> f32 {
  match confidence {
    Some(c) if !c.is_nan() => c.clamp(0.0, 1.0),
    _ => 1.0,
  }
}

pub struct SegmentationResultBuilder {
  max_dim: u32,
}

impl Default for SegmentationResultBuilder {
  fn default() -> Self {
    Self::new(DEFAULT_MAX_DIM)
  }
}

impl SegmentationResultBuilder {
  pub fn new(max_dim: u32) -> Self {
    Self { max_dim }
  }

  pub fn max_dim(&self) -> u32 {
    self.max_dim
  }

  /// 单个掩码：追踪、简化、计算包围盒。退化掩码返回 None。
  pub fn build_one(&self, index: usize, raw: RawMask) -> Option<Candidate> {
    let RawMask { mask, confidence } = raw;
    let limit = self.max_dim as usize;
    if mask.width() > limit || mask.height() > limit {
      warn!(
        "掩码 {} 尺寸 {}x{} 超过上限 {}，已丢弃",
        index,
        mask.width(),
        mask.height(),
        limit
      );
      return None;
    }

    let raw_contour = trace(&mask);
    drop(mask);

    let Some(polygon) = Polygon::new(simplify(&raw_contour)) else {
      debug!("掩码 {} 没有可用形状 (原始轮廓 {} 点)", index, raw_contour.len());
      return None;
    };

    let bbox = polygon.bbox();
    debug!(
      "掩码 {}: 轮廓 {} 点 -> 简化后 {} 点, bbox {:?}",
      index,
      raw_contour.len(),
      polygon.len(),
      bbox
    );

    Some(Candidate {
      id: CandidateId(index),
      area: bbox.area(),
      polygon,
      bbox,
      confidence: normalize_confidence(confidence),
    })
  }

  /// 输出保持掩码的原始顺序，被丢弃的掩码不占用标识
  pub fn build<I>(&self, masks: I) -> Vec<Candidate>
  where
    I: IntoIterator,
    I::Item: Into<RawMask>,
  {
    masks
      .into_iter()
      .enumerate()
      .filter_map(|(index, raw)| self.build_one(index, raw.into()))
      .collect()
  }
}

pub fn build_candidates<I>(masks: I) -> Vec<Candidate>
where
  I: IntoIterator,
  I::Item: Into<RawMask>,
{
  SegmentationResultBuilder::default().build(masks)
}
