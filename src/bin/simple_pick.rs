// 该文件是 Chouqian （抽签） 项目的一部分。
// src/bin/simple_pick.rs - 从照片中抽取一个对象
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

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use url::Url;

use chouqian::{
  FromUrl,
  candidate::SegmentationResultBuilder,
  input::InputWrapper,
  model::DetectorWrapper,
  output::OutputWrapper,
  session::DetectionSession,
  shuffle::{DEFAULT_SILENT_TAIL, LogFeedback, ShuffleConfig, ShuffleSelector, TerminalBell},
  task::{PickTask, Task},
};
use tracing::info;

/// Chouqian 抽签参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测服务地址（https://... 或 replay:///path/to/response.json）
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源（image:///path/to/photo.jpg 或 blank:640x480）
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径（image://、svg:// 或 record://）
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 显示容器宽度，0 表示使用原图尺寸
  #[arg(long, default_value_t = 0)]
  pub container_width: u32,
  /// 显示容器高度，0 表示使用原图尺寸
  #[arg(long, default_value_t = 0)]
  pub container_height: u32,
  /// 每次抽取的跳动次数
  #[arg(long, default_value_t = 15)]
  pub ticks: u32,
  /// 跳动间隔（毫秒）
  #[arg(long, default_value_t = 150)]
  pub interval_ms: u64,
  /// 固定随机种子
  #[arg(long)]
  pub seed: Option<u64>,
  /// 抽取次数
  #[arg(long, default_value_t = 1)]
  pub rounds: usize,
  /// 每次跳动都输出一帧
  #[arg(long)]
  pub render_ticks: bool,
  /// 用终端响铃代替日志提示
  #[arg(long)]
  pub bell: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测服务: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let model = DetectorWrapper::from_url(&args.model)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let config = ShuffleConfig {
    ticks: args.ticks,
    interval: Duration::from_millis(args.interval_ms),
    silent_tail: DEFAULT_SILENT_TAIL,
    seed: args.seed,
  };
  let selector = ShuffleSelector::new(config);
  let selector = if args.bell {
    selector.with_feedback(TerminalBell)
  } else {
    selector.with_feedback(LogFeedback)
  };
  let session = DetectionSession::new(SegmentationResultBuilder::new(model.max_dim()), selector);

  PickTask::new(session, args.rounds, (args.container_width, args.container_height))
    .with_render_ticks(args.render_ticks)
    .with_interrupt(true)
    .run_task(input.into_frames(), model, output)?;

  Ok(())
}
