// 该文件是 Chouqian （抽签） 项目的一部分。
// src/shuffle/feedback.rs - 抽取过程的反馈信号（提示音等）
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

use std::io::Write;

use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
  /// 滚动过程中的一次跳动
  Tick,
  /// 最终落定
  Result,
}

#[derive(Error, Debug)]
pub enum FeedbackError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 反馈通道：尽力投递，失败不影响选择状态
pub trait Feedback: Send + Sync {
  fn signal(&self, signal: Signal) -> Result<(), FeedbackError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeedback;

impl Feedback for NoFeedback {
  fn signal(&self, _signal: Signal) -> Result<(), FeedbackError> {
    Ok(())
  }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedback;

impl Feedback for LogFeedback {
  fn signal(&self, signal: Signal) -> Result<(), FeedbackError> {
    match signal {
      Signal::Tick => info!("滴"),
      Signal::Result => info!("叮！"),
    }
    Ok(())
  }
}

/// 在终端响铃：跳动响一次，落定响两次
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalBell;

impl Feedback for TerminalBell {
  fn signal(&self, signal: Signal) -> Result<(), FeedbackError> {
    let bell: &[u8] = match signal {
      Signal::Tick => b"\x07",
      Signal::Result => b"\x07\x07",
    };
    let mut stderr = std::io::stderr().lock();
    stderr.write_all(bell)?;
    stderr.flush()?;
    Ok(())
  }
}
