// 该文件是 Chouqian （抽签） 项目的一部分。
// src/input.rs - 图像输入
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

use crate::{FromUrl, FromUrlWithScheme};

mod blank;
mod read_image_file;

pub use self::blank::{BlankInput, BlankInputError};
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("Blank input error: {0}")]
  BlankInputError(#[from] BlankInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  Blank(BlankInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?)),
      BlankInput::SCHEME => Ok(InputWrapper::Blank(BlankInput::from_url(url)?)),
      _ => Err(InputError::SchemeMismatch),
    }
  }
}

impl InputWrapper {
  pub fn into_frames(self) -> InputWrapperIter {
    match self {
      InputWrapper::ReadImageFile(input) => InputWrapperIter::ReadImageFile(input.into_frames()),
      InputWrapper::Blank(input) => InputWrapperIter::Blank(input.into_frames()),
    }
  }
}

pub enum InputWrapperIter {
  ReadImageFile(self::read_image_file::ImageFileFrames),
  Blank(self::blank::BlankFrames),
}

impl Iterator for InputWrapperIter {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapperIter::ReadImageFile(input) => input.next(),
      InputWrapperIter::Blank(input) => input.next(),
    }
  }
}
