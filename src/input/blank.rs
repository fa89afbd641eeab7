// 该文件是 Chouqian （抽签） 项目的一部分。
// src/input/blank.rs - 纯色画布输入（仅回放掩码时使用）
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

use image::{Rgb, RgbImage};
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

const BLANK_COLOR: [u8; 3] = [32, 32, 32];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BlankInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("无效的画布尺寸: '{0}'，应为 <宽>x<高>")]
  InvalidSize(String),
}

/// `blank:640x480` 产生一张给定尺寸的深灰画布
pub struct BlankInput {
  width: u32,
  height: u32,
}

impl FromUrlWithScheme for BlankInput {
  const SCHEME: &'static str = "blank";
}

impl FromUrl for BlankInput {
  type Error = BlankInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(BlankInputError::SchemeMismatch);
    }

    let size = url.path().trim_start_matches('/');
    let invalid = || BlankInputError::InvalidSize(size.to_string());
    let (w, h) = size.split_once('x').ok_or_else(invalid)?;
    let width: u32 = w.parse().map_err(|_| invalid())?;
    let height: u32 = h.parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
      return Err(invalid());
    }

    Ok(BlankInput { width, height })
  }
}

impl BlankInput {
  pub fn into_frames(self) -> BlankFrames {
    BlankFrames { input: Some(self) }
  }
}

pub struct BlankFrames {
  input: Option<BlankInput>,
}

impl Iterator for BlankFrames {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    self
      .input
      .take()
      .map(|input| RgbImage::from_pixel(input.width, input.height, Rgb(BLANK_COLOR)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_size_from_path() {
    let input = BlankInput::from_url(&Url::parse("blank:640x480").unwrap()).unwrap();
    let mut frames = input.into_frames();
    assert_eq!(frames.next().unwrap().dimensions(), (640, 480));
    assert!(frames.next().is_none());
  }

  #[test]
  fn rejects_bad_sizes() {
    for url in ["blank:640", "blank:0x10", "blank:axb"] {
      assert!(matches!(
        BlankInput::from_url(&Url::parse(url).unwrap()),
        Err(BlankInputError::InvalidSize(_))
      ));
    }
  }
}
