// 该文件是 Chouqian （抽签） 项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

#[cfg(any(feature = "save_image_file", feature = "svg_output", feature = "record_output"))]
use crate::FromUrlWithScheme;
use crate::{
  FromUrl,
  candidate::{Candidate, CandidateId},
  shuffle::ShuffleState,
  viewport::{Viewport, ViewportError, ViewportParams},
};

/// 一帧待输出的画面：原图、候选、抽取状态与显示容器尺寸
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
  pub image: &'a RgbImage,
  pub candidates: &'a [Candidate],
  pub state: &'a ShuffleState,
  pub container: (u32, u32),
}

/// 候选在当前状态下的显示角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
  Normal,
  Highlighted,
  Selected,
}

impl Role {
  pub fn class(self) -> &'static str {
    match self {
      Role::Normal => "candidate",
      Role::Highlighted => "candidate highlighted",
      Role::Selected => "candidate selected",
    }
  }
}

impl<'a> Scene<'a> {
  pub fn new(
    image: &'a RgbImage,
    candidates: &'a [Candidate],
    state: &'a ShuffleState,
    container: (u32, u32),
  ) -> Self {
    Self {
      image,
      candidates,
      state,
      container,
    }
  }

  /// 画布尺寸。容器为零时退回原图尺寸。
  pub fn canvas_size(&self) -> (u32, u32) {
    match self.container {
      (0, _) | (_, 0) => self.image.dimensions(),
      size => size,
    }
  }

  pub fn viewport(&self) -> Result<Viewport, ViewportError> {
    let (cw, ch) = self.canvas_size();
    ViewportParams::new(
      self.image.width() as f64,
      self.image.height() as f64,
      cw as f64,
      ch as f64,
    )
    .viewport()
  }

  pub fn role(&self, id: CandidateId) -> Role {
    match self.state {
      ShuffleState::Selected { id: selected } if *selected == id => Role::Selected,
      ShuffleState::Shuffling {
        highlighted: Some(highlighted),
      } if *highlighted == id => Role::Highlighted,
      _ => Role::Normal,
    }
  }

  pub fn selected(&self) -> Option<&'a Candidate> {
    let id = self.state.selected()?;
    self.candidates.iter().find(|c| c.id == id)
  }
}

pub trait Render: Sized {
  type Error;
  fn render(&self, scene: &Scene<'_>) -> Result<(), Self::Error>;
}

#[cfg(feature = "save_image_file")]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "svg_output")]
mod svg_output;
#[cfg(feature = "svg_output")]
pub use self::svg_output::{SvgOutput, SvgOutputError};

#[cfg(feature = "record_output")]
mod record_output;
#[cfg(feature = "record_output")]
pub use self::record_output::{RecordOutput, RecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "svg_output")]
  #[error("SVG 输出错误: {0}")]
  SvgOutputError(#[from] SvgOutputError),
  #[cfg(feature = "record_output")]
  #[error("记录输出错误: {0}")]
  RecordOutputError(#[from] RecordOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "svg_output")]
  SvgOutput(SvgOutput),
  #[cfg(feature = "record_output")]
  RecordOutput(RecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      #[cfg(feature = "svg_output")]
      SvgOutput::SCHEME => {
        let output = SvgOutput::from_url(url)?;
        Ok(OutputWrapper::SvgOutput(output))
      }
      #[cfg(feature = "record_output")]
      RecordOutput::SCHEME => {
        let output = RecordOutput::from_url(url)?;
        Ok(OutputWrapper::RecordOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl Render for OutputWrapper {
  type Error = OutputError;

  #[allow(unused_variables)]
  fn render(&self, scene: &Scene<'_>) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output.render(scene).map_err(OutputError::from),
      #[cfg(feature = "svg_output")]
      OutputWrapper::SvgOutput(output) => output.render(scene).map_err(OutputError::from),
      #[cfg(feature = "record_output")]
      OutputWrapper::RecordOutput(output) => output.render(scene).map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::{candidate::build_candidates, mask::mask_from_ascii};

  /// 4x2 的照片，左右各一个 2x2 的对象
  pub(crate) fn sample_candidates() -> Vec<Candidate> {
    build_candidates([
      mask_from_ascii(&["##..", "##.."]),
      mask_from_ascii(&["..##", "..##"]),
    ])
  }

  #[test]
  fn roles_follow_state() {
    let image = RgbImage::new(4, 2);
    let candidates = sample_candidates();

    let state = ShuffleState::Shuffling {
      highlighted: Some(CandidateId(1)),
    };
    let scene = Scene::new(&image, &candidates, &state, (8, 8));
    assert_eq!(scene.role(CandidateId(0)), Role::Normal);
    assert_eq!(scene.role(CandidateId(1)), Role::Highlighted);
    assert!(scene.selected().is_none());

    let state = ShuffleState::Selected { id: CandidateId(0) };
    let scene = Scene::new(&image, &candidates, &state, (8, 8));
    assert_eq!(scene.role(CandidateId(0)), Role::Selected);
    assert_eq!(scene.selected().map(|c| c.id), Some(CandidateId(0)));
  }

  #[test]
  fn zero_container_falls_back_to_image() {
    let image = RgbImage::new(4, 2);
    let scene = Scene::new(&image, &[], &ShuffleState::Idle, (0, 300));
    assert_eq!(scene.canvas_size(), (4, 2));
    let vp = scene.viewport().unwrap();
    assert_eq!((vp.scale_x, vp.offset_x, vp.offset_y), (1.0, 0.0, 0.0));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtsp://localhost/stream").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch)
    ));
  }
}
