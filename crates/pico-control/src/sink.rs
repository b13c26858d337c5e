//! Command Sink - 命令与误差遥测的发布接口
//!
//! 控制器不关心传输方式，只通过 [`CommandSink`] 发布两类消息：
//!
//! - **actuator-command**: [`RcCommand`]，每个采样周期一次，另加启动时的上锁/解锁各一次
//! - **control-error**: [`PidError`]，每个采样周期一次
//!
//! 发布必须是非阻塞的。发布失败只影响当前这一次输出，由调用方记录日志后继续调度。

use crate::error::SinkError;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use pico_protocol::{PidError, RcCommand};

/// 发布接口
pub trait CommandSink {
    /// 发布执行器命令（非阻塞）
    fn publish_command(&mut self, command: &RcCommand) -> Result<(), SinkError>;

    /// 发布误差遥测（非阻塞）
    fn publish_error(&mut self, error: &PidError) -> Result<(), SinkError>;
}

/// 已发布的消息（按发布顺序）
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Publication {
    Command(RcCommand),
    Error(PidError),
}

/// 基于 crossbeam 有界通道的发布端
///
/// 命令和误差走同一个通道，保持发布顺序可观测。
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Publication>,
}

impl ChannelSink {
    /// 创建发布端及对应的接收端
    ///
    /// # 参数
    /// - `capacity`: 通道容量，满了之后的发布返回 `SinkError::ChannelFull`
    pub fn bounded(capacity: usize) -> (Self, Receiver<Publication>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (ChannelSink { tx }, rx)
    }

    /// 包装已有的发送端
    pub fn new(tx: Sender<Publication>) -> Self {
        ChannelSink { tx }
    }

    fn send(&self, publication: Publication) -> Result<(), SinkError> {
        self.tx.try_send(publication).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::ChannelFull,
            TrySendError::Disconnected(_) => SinkError::ChannelClosed,
        })
    }
}

impl CommandSink for ChannelSink {
    fn publish_command(&mut self, command: &RcCommand) -> Result<(), SinkError> {
        self.send(Publication::Command(*command))
    }

    fn publish_error(&mut self, error: &PidError) -> Result<(), SinkError> {
        self.send(Publication::Error(*error))
    }
}

impl<S: CommandSink + ?Sized> CommandSink for Box<S> {
    fn publish_command(&mut self, command: &RcCommand) -> Result<(), SinkError> {
        (**self).publish_command(command)
    }

    fn publish_error(&mut self, error: &PidError) -> Result<(), SinkError> {
        (**self).publish_error(error)
    }
}
