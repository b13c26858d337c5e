//! UDP/JSON 传输
//!
//! 每个数据报是一个 JSON 对象，用 `"channel"` 字段区分消息类型：
//!
//! ```text
//! 输入:  {"channel":"position","x":2.0,"y":2.0,"z":15.0}
//!        {"channel":"gain_tune","axis":"pitch","kp":10.0,"ki":0.0,"kd":5.0}
//!        {"channel":"arm_ack"}
//! 输出:  {"channel":"command","rc_roll":1500,...}
//!        {"channel":"pid_error","roll_error":0.0,...}
//! ```

use crossbeam_channel::Sender;
use pico_control::{CommandSink, SinkError};
use pico_protocol::{Axis, GainTune, PidError, PositionEstimate, RcCommand, channels};
use serde::{Deserialize, Serialize};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// 接收缓冲区大小（单个 JSON 数据报）
const RECV_BUFFER_SIZE: usize = 1024;

/// 监听线程检查停止标志的间隔
const LISTEN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 输入消息
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum Inbound {
    Position(PositionEstimate),
    GainTune(GainTune),
    ArmAck,
}

impl Inbound {
    /// 消息对应的逻辑通道名称
    pub fn channel(&self) -> &'static str {
        match self {
            Inbound::Position(_) => channels::POSITION_ESTIMATE,
            Inbound::GainTune(tune) => match tune.axis {
                Axis::Roll => channels::GAIN_TUNE_ROLL,
                Axis::Pitch => channels::GAIN_TUNE_PITCH,
                Axis::Throttle => channels::GAIN_TUNE_THROTTLE,
            },
            Inbound::ArmAck => channels::ARM_ACK,
        }
    }
}

/// 输出消息
#[derive(Debug, Serialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
enum Outbound<'a> {
    Command(&'a RcCommand),
    PidError(&'a PidError),
}

/// 解析一个输入数据报
pub fn parse_datagram(payload: &[u8]) -> Result<Inbound, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// 把输入消息分发到控制循环的通道
#[derive(Debug, Clone)]
pub struct InboundRouter {
    pub positions: Sender<PositionEstimate>,
    pub gains: Sender<GainTune>,
    pub arm_acks: Sender<()>,
}

impl InboundRouter {
    /// 分发一条消息
    ///
    /// 返回 `false` 表示控制循环已经退出（接收端已 drop）。
    pub fn route(&self, message: Inbound) -> bool {
        let result = match message {
            Inbound::Position(position) => self.positions.send(position).map_err(|_| ()),
            Inbound::GainTune(tune) => self.gains.send(tune).map_err(|_| ()),
            // 解锁确认只在启动阶段有人接收，之后的确认直接忽略
            Inbound::ArmAck => {
                let _ = self.arm_acks.try_send(());
                Ok(())
            },
        };
        result.is_ok()
    }
}

/// 输入监听循环（阻塞，直到 `running` 变为 false 或控制循环退出）
///
/// 畸形数据报记录日志后丢弃。
pub fn listen(socket: UdpSocket, router: InboundRouter, running: Arc<AtomicBool>) -> io::Result<()> {
    socket.set_read_timeout(Some(LISTEN_POLL_INTERVAL))?;
    let mut buf = [0u8; RECV_BUFFER_SIZE];

    while running.load(Ordering::Acquire) {
        match socket.recv_from(&mut buf) {
            Ok((len, from)) => match parse_datagram(&buf[..len]) {
                Ok(message) => {
                    trace!(%from, channel = message.channel(), ?message, "Received datagram");
                    if !router.route(message) {
                        debug!("Control loop gone, stopping listener");
                        break;
                    }
                },
                Err(e) => warn!(%from, len, "Dropping malformed datagram: {}", e),
            },
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue;
            },
            Err(e) => {
                warn!("UDP receive error: {}", e);
                std::thread::sleep(LISTEN_POLL_INTERVAL);
            },
        }
    }

    Ok(())
}

/// 基于 UDP 的发布端
///
/// Socket 设置为非阻塞：内核发送缓冲区满时返回 `SinkError::ChannelFull`，
/// 不会阻塞控制循环。
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
    command_target: SocketAddr,
    error_target: SocketAddr,
}

impl UdpSink {
    /// 绑定本地地址并设置目标
    pub fn bind(
        local: SocketAddr,
        command_target: SocketAddr,
        error_target: SocketAddr,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(local)?;
        socket.set_nonblocking(true)?;
        Ok(UdpSink {
            socket,
            command_target,
            error_target,
        })
    }

    fn send(&self, message: &Outbound<'_>, target: SocketAddr) -> Result<(), SinkError> {
        if let Outbound::Command(command) = message {
            command.validate()?;
        }
        let payload =
            serde_json::to_vec(message).map_err(|e| SinkError::Transport(e.to_string()))?;
        match self.socket.send_to(&payload, target) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(SinkError::ChannelFull),
            Err(e) => Err(SinkError::Transport(e.to_string())),
        }
    }
}

impl CommandSink for UdpSink {
    fn publish_command(&mut self, command: &RcCommand) -> Result<(), SinkError> {
        self.send(&Outbound::Command(command), self.command_target)
    }

    fn publish_error(&mut self, error: &PidError) -> Result<(), SinkError> {
        self.send(&Outbound::PidError(error), self.error_target)
    }
}
