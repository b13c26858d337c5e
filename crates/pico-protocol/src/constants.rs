//! 遥控通道常量
//!
//! 所有执行器通道都是 PWM 风格的整数，取值范围 `[1000, 2000]`。

/// 通道最小值
pub const RC_MIN: u16 = 1000;

/// 通道中位值（roll/pitch/yaw/throttle 的中立位置）
pub const RC_NEUTRAL: u16 = 1500;

/// 通道最大值
pub const RC_MAX: u16 = 2000;

/// 辅助通道：未解锁
pub const AUX_DISARMED: u16 = 1000;

/// 辅助通道：已解锁
pub const AUX_ARMED: u16 = 2000;

/// 默认采样周期（毫秒）
pub const DEFAULT_SAMPLE_PERIOD_MS: u64 = 60;

/// 通道名称
pub mod channels {
    /// 位置估计输入
    pub const POSITION_ESTIMATE: &str = "position-estimate";
    /// Roll 增益调参输入
    pub const GAIN_TUNE_ROLL: &str = "gain-tune-roll";
    /// Pitch 增益调参输入
    pub const GAIN_TUNE_PITCH: &str = "gain-tune-pitch";
    /// Throttle 增益调参输入
    pub const GAIN_TUNE_THROTTLE: &str = "gain-tune-throttle";
    /// 解锁确认输入
    pub const ARM_ACK: &str = "arm-ack";
    /// 执行器命令输出
    pub const ACTUATOR_COMMAND: &str = "actuator-command";
    /// 控制误差输出
    pub const CONTROL_ERROR: &str = "control-error";
}
