//! PID - 单轴比例-积分-微分计算
//!
//! 按采样计数的离散 PID（没有 `dt` 项，增益已把采样周期折算进去）：
//!
//! ```text
//! delta  = e - e_prev
//! sum   += e
//! output = Kp * e + Ki * sum + Kd * delta
//! ```
//!
//! 积分项默认不限幅；可通过 `integral_limit` 开启对称限幅。
//! 累积误差在 `±f64::MAX` 处饱和，不会溢出成无穷；增益为零的项不参与求和。

use serde::{Deserialize, Serialize};

/// PID 增益三元组
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidGains {
    /// 比例增益
    pub kp: f64,
    /// 积分增益
    pub ki: f64,
    /// 微分增益
    pub kd: f64,
}

impl PidGains {
    /// 全零增益
    pub const ZERO: PidGains = PidGains {
        kp: 0.0,
        ki: 0.0,
        kd: 0.0,
    };

    pub const fn new(kp: f64, ki: f64, kd: f64) -> Self {
        PidGains { kp, ki, kd }
    }

    /// 逐项相乘（旋钮值 × 标定系数）
    pub fn scaled_by(self, calibration: PidGains) -> PidGains {
        PidGains {
            kp: self.kp * calibration.kp,
            ki: self.ki * calibration.ki,
            kd: self.kd * calibration.kd,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite()
    }
}

/// 单轴 PID 状态（跨周期保持）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisPidState {
    /// 上一周期的误差（用于微分项）
    pub prev_error: f64,
    /// 累积误差（积分项）
    pub error_sum: f64,
}

impl AxisPidState {
    /// 推进一步，返回该轴的 PID 输出
    ///
    /// 调用后 `prev_error == error`。
    #[inline]
    pub fn step(&mut self, gains: &PidGains, error: f64, integral_limit: Option<f64>) -> f64 {
        let delta = error - self.prev_error;

        self.error_sum = (self.error_sum + error).clamp(-f64::MAX, f64::MAX);
        if let Some(limit) = integral_limit {
            self.error_sum = self.error_sum.clamp(-limit, limit);
        }

        self.prev_error = error;

        term(gains.kp, error) + term(gains.ki, self.error_sum) + term(gains.kd, delta)
    }

    /// 清零积分和微分状态
    pub fn reset(&mut self) {
        *self = AxisPidState::default();
    }
}

/// 单项输出；增益为零时恒为零（避免 `0 * inf = NaN`）
#[inline]
fn term(gain: f64, value: f64) -> f64 {
    if gain == 0.0 { 0.0 } else { gain * value }
}
