//! 控制模块错误类型定义

use pico_protocol::ProtocolError;
use thiserror::Error;

/// 命令发布错误
///
/// 只影响当前这一次发布，周期调度不会因此停止。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// 发布通道已满
    #[error("Publish channel full")]
    ChannelFull,

    /// 发布通道已关闭（接收端退出）
    #[error("Publish channel closed")]
    ChannelClosed,

    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(String),

    /// 命令通道值越界，未发送
    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] ProtocolError),
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 采样周期无效
    #[error("Invalid sample period: {0} ms (must be in 1..=60000)")]
    InvalidSamplePeriod(u64),

    /// 执行器范围无效
    #[error("Invalid actuator range for {axis}: [{min}, {max}]")]
    InvalidRange { axis: String, min: u16, max: u16 },

    /// 非有限数值（NaN/Inf）
    #[error("Non-finite value for {field}: {value}")]
    NonFinite { field: String, value: f64 },

    /// 积分限幅无效
    #[error("Invalid integral limit: {0} (must be >= 0)")]
    InvalidIntegralLimit(f64),

    /// 延迟判定倍数无效
    #[error("Invalid late tick multiplier: {0} (must be in [1, 1000])")]
    InvalidLateTickMultiplier(f64),

    /// TOML 解析错误
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML 序列化错误
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// 读取配置文件失败
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// 控制器运行错误
#[derive(Error, Debug)]
pub enum ControlError {
    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 发布错误
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// 等待解锁确认超时
    #[error("Arm acknowledgment not received within {timeout_ms} ms")]
    ArmTimeout { timeout_ms: u64 },

    /// 解锁确认通道已关闭
    #[error("Arm acknowledgment channel closed")]
    AckChannelClosed,
}
