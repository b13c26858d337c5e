//! # Pico Protocol
//!
//! 定点悬停控制器的消息定义（无运行时依赖）
//!
//! ## 模块
//!
//! - `constants`: 遥控通道取值常量（1000/1500/2000）
//! - `axis`: 轴枚举和按轴索引的数组
//! - `messages`: 位置估计、增益调参、RC 命令、PID 误差遥测
//!
//! ## 通道
//!
//! | 通道 | 方向 | 消息 |
//! |---|---|---|
//! | position-estimate | 输入 | [`PositionEstimate`] |
//! | gain-tune-{roll,pitch,throttle} | 输入 | [`GainTune`] |
//! | arm-ack | 输入 | 解锁确认（无负载） |
//! | actuator-command | 输出 | [`RcCommand`] |
//! | control-error | 输出 | [`PidError`] |

pub mod axis;
pub mod constants;
pub mod messages;

// 重新导出常用类型
pub use axis::*;
pub use constants::*;
pub use messages::*;

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 未知的轴名称
    #[error("Unknown axis name: {name:?} (expected roll, pitch or throttle)")]
    UnknownAxis { name: String },

    /// 通道取值超出执行器范围
    #[error("Channel value {value} outside actuator range [{min}, {max}]")]
    ChannelOutOfRange { value: u16, min: u16, max: u16 },
}
