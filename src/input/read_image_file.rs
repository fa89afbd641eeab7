// 该文件是 Chouqian （抽签） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, url_file_path};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 打开时即解码，只产出一帧
pub struct ImageFileInput {
  image: Option<RgbImage>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let path = url_file_path(url);
    let image = ImageReader::open(&path)?.with_guessed_format()?.decode()?;
    info!("读取图像 {}: {}x{}", path, image.width(), image.height());

    Ok(ImageFileInput {
      image: Some(image.to_rgb8()),
    })
  }
}

impl ImageFileInput {
  pub fn into_frames(self) -> ImageFileFrames {
    ImageFileFrames { inner: self }
  }
}

pub struct ImageFileFrames {
  inner: ImageFileInput,
}

impl Iterator for ImageFileFrames {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    self.inner.image.take()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reads_a_single_frame() {
    let path = std::env::temp_dir().join(format!("chouqian-input-{}.png", std::process::id()));
    RgbImage::from_pixel(5, 3, image::Rgb([10, 20, 30]))
      .save(&path)
      .unwrap();

    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let mut frames = ImageFileInput::from_url(&url).unwrap().into_frames();
    let frame = frames.next().unwrap();
    assert_eq!(frame.dimensions(), (5, 3));
    assert_eq!(frame.get_pixel(4, 2), &image::Rgb([10, 20, 30]));
    assert!(frames.next().is_none());

    std::fs::remove_file(path).unwrap();
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("replay:///tmp/a.json").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch)
    ));
  }
}
