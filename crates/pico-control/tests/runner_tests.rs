//! 控制循环集成测试
//!
//! 通过 crossbeam 通道驱动 `run_controller` / `run_controller_spin`，
//! 检查启动序列、关闭上锁、输入应用、发布失败容忍和解锁确认。

use crossbeam_channel::{Receiver, unbounded};
use pico_control::{
    ArmingMode, ChannelSink, CommandSink, ControlError, ControlInputs, ControllerConfig,
    LoopConfig, PidGains, PositionHoldController, Publication, SinkError, StopReason,
    run_controller, run_controller_spin,
};
use pico_protocol::{Axis, GainTune, PidError, PositionEstimate, RcCommand};
use std::time::Duration;

fn fast_config() -> ControllerConfig {
    ControllerConfig::default().with_sample_period(Duration::from_millis(5))
}

fn commands(rx: &Receiver<Publication>) -> Vec<RcCommand> {
    rx.try_iter()
        .filter_map(|p| match p {
            Publication::Command(c) => Some(c),
            Publication::Error(_) => None,
        })
        .collect()
}

/// 所有发布都失败的 sink
struct BrokenSink;

impl CommandSink for BrokenSink {
    fn publish_command(&mut self, _command: &RcCommand) -> Result<(), SinkError> {
        Err(SinkError::Transport("link down".to_string()))
    }

    fn publish_error(&mut self, _error: &PidError) -> Result<(), SinkError> {
        Err(SinkError::Transport("link down".to_string()))
    }
}

#[test]
fn test_run_publishes_startup_sequence_then_ticks() {
    let controller = PositionHoldController::new(fast_config()).unwrap();
    let (sink, rx) = ChannelSink::bounded(256);
    let (_position_tx, position_rx) = unbounded();
    let (_gain_tx, gain_rx) = unbounded();

    let summary = run_controller(
        controller,
        sink,
        ControlInputs::new(position_rx, gain_rx),
        LoopConfig::with_max_iterations(4),
    )
    .unwrap();

    assert_eq!(summary.ticks, 4);
    assert_eq!(summary.stop_reason, StopReason::MaxIterations);
    assert_eq!(summary.publish_failures, 0);

    let published: Vec<_> = rx.try_iter().collect();
    // 上锁 + 解锁 + 每个 tick 一条命令一条误差 + 退出时上锁
    assert_eq!(published.len(), 2 + 4 * 2 + 1);
    assert_eq!(published[0], Publication::Command(RcCommand::DISARM));
    assert_eq!(published[1], Publication::Command(RcCommand::ARM));
    for pair in published[2..10].chunks(2) {
        assert!(matches!(pair[0], Publication::Command(c) if c.is_armed()));
        assert!(matches!(pair[1], Publication::Error(_)));
    }
    assert_eq!(
        published.last(),
        Some(&Publication::Command(RcCommand::DISARM))
    );
}

#[test]
fn test_shutdown_signal_disarms() {
    let config = ControllerConfig::default().with_sample_period(Duration::from_secs(10));
    let controller = PositionHoldController::new(config).unwrap();
    let (sink, rx) = ChannelSink::bounded(16);
    let (_position_tx, position_rx) = unbounded();
    let (_gain_tx, gain_rx) = unbounded();
    let (shutdown_tx, shutdown_rx) = unbounded();
    shutdown_tx.send(()).unwrap();

    let summary = run_controller(
        controller,
        sink,
        ControlInputs::new(position_rx, gain_rx).with_shutdown(shutdown_rx),
        LoopConfig::default(),
    )
    .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Shutdown);
    assert_eq!(summary.ticks, 0);
    assert_eq!(
        commands(&rx),
        vec![RcCommand::DISARM, RcCommand::ARM, RcCommand::DISARM]
    );
}

#[test]
fn test_dropped_shutdown_sender_counts_as_shutdown() {
    let controller = PositionHoldController::new(fast_config()).unwrap();
    let (sink, rx) = ChannelSink::bounded(256);
    let (_position_tx, position_rx) = unbounded();
    let (_gain_tx, gain_rx) = unbounded();
    let (shutdown_tx, shutdown_rx) = unbounded::<()>();
    drop(shutdown_tx);

    let summary = run_controller_spin(
        controller,
        sink,
        ControlInputs::new(position_rx, gain_rx).with_shutdown(shutdown_rx),
        LoopConfig::with_max_iterations(100),
    )
    .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Shutdown);
    assert_eq!(commands(&rx).last(), Some(&RcCommand::DISARM));
}

#[test]
fn test_shutdown_from_another_thread() {
    let controller = PositionHoldController::new(fast_config()).unwrap();
    let (sink, rx) = ChannelSink::bounded(4096);
    let (_position_tx, position_rx) = unbounded();
    let (_gain_tx, gain_rx) = unbounded();
    let (shutdown_tx, shutdown_rx) = unbounded();

    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        shutdown_tx.send(()).unwrap();
    });

    let summary = run_controller(
        controller,
        sink,
        ControlInputs::new(position_rx, gain_rx).with_shutdown(shutdown_rx),
        LoopConfig::default(),
    )
    .unwrap();
    stopper.join().unwrap();

    assert_eq!(summary.stop_reason, StopReason::Shutdown);
    assert!(summary.ticks > 0);

    let commands = commands(&rx);
    assert_eq!(commands.first(), Some(&RcCommand::DISARM));
    assert_eq!(commands.last(), Some(&RcCommand::DISARM));
    assert_eq!(commands.len() as u64, 3 + summary.ticks);
}

#[test]
fn test_spin_runner_applies_inputs_before_tick() {
    let controller = PositionHoldController::new(fast_config()).unwrap();
    let (sink, rx) = ChannelSink::bounded(256);
    let (position_tx, position_rx) = unbounded();
    let (gain_tx, gain_rx) = unbounded();

    // 原始增益 100 经校准 0.03 后为 Kp = 3
    gain_tx
        .send(GainTune::new(Axis::Throttle, 100.0, 0.0, 0.0))
        .unwrap();
    position_tx
        .send(PositionEstimate::new(2.0, 2.0, 30.0))
        .unwrap();
    position_tx
        .send(PositionEstimate::new(2.0, 2.0, 15.0))
        .unwrap();

    let summary = run_controller_spin(
        controller,
        sink,
        ControlInputs::new(position_rx, gain_rx),
        LoopConfig::with_max_iterations(3),
    )
    .unwrap();

    assert_eq!(summary.ticks, 3);
    let commands = commands(&rx);
    assert_eq!(commands.len(), 6);
    assert_eq!(commands[5], RcCommand::DISARM);
    for command in &commands[2..5] {
        assert_eq!(command.rc_throttle, 1485);
        assert_eq!(command.rc_roll, 1500);
    }
}

#[test]
fn test_select_runner_applies_inputs() {
    let config = ControllerConfig::default().with_sample_period(Duration::from_millis(50));
    let controller = PositionHoldController::new(config).unwrap();
    let (sink, rx) = ChannelSink::bounded(256);
    let (position_tx, position_rx) = unbounded();
    let (gain_tx, gain_rx) = unbounded();

    gain_tx
        .send(GainTune::new(Axis::Roll, 100.0, 0.0, 0.0))
        .unwrap();
    position_tx
        .send(PositionEstimate::new(4.0, 2.0, 20.0))
        .unwrap();

    run_controller(
        controller,
        sink,
        ControlInputs::new(position_rx, gain_rx),
        LoopConfig::with_max_iterations(2),
    )
    .unwrap();

    let commands = commands(&rx);
    assert_eq!(commands.last(), Some(&RcCommand::DISARM));
    let last = commands[commands.len() - 2];
    assert_eq!(last.rc_roll, 1506);
    assert_eq!(last.rc_throttle, 1500);
}

#[test]
fn test_disconnected_inputs_keep_ticking() {
    let config = fast_config().with_initial_gains(Axis::Throttle, PidGains::new(1.0, 0.0, 0.0));
    let controller = PositionHoldController::new(config).unwrap();
    let (sink, rx) = ChannelSink::bounded(256);
    let (position_tx, position_rx) = unbounded();
    let (gain_tx, gain_rx) = unbounded::<GainTune>();

    position_tx
        .send(PositionEstimate::new(2.0, 2.0, 25.0))
        .unwrap();
    drop(position_tx);
    drop(gain_tx);

    let summary = run_controller(
        controller,
        sink,
        ControlInputs::new(position_rx, gain_rx),
        LoopConfig::with_max_iterations(5),
    )
    .unwrap();

    assert_eq!(summary.ticks, 5);
    assert_eq!(summary.stop_reason, StopReason::MaxIterations);
    // 最后一个位置继续生效
    let commands = commands(&rx);
    assert_eq!(commands[commands.len() - 2].rc_throttle, 1505);
}

#[test]
fn test_publish_failures_do_not_stop_schedule() {
    let controller = PositionHoldController::new(fast_config()).unwrap();
    let (_position_tx, position_rx) = unbounded();
    let (_gain_tx, gain_rx) = unbounded();

    let summary = run_controller(
        controller,
        BrokenSink,
        ControlInputs::new(position_rx, gain_rx),
        LoopConfig::with_max_iterations(5),
    )
    .unwrap();

    assert_eq!(summary.ticks, 5);
    // 上锁 + 解锁 + 5 * (命令 + 误差) + 退出上锁
    assert_eq!(summary.publish_failures, 13);
}

#[test]
fn test_observer_sees_run_progress() {
    let mut controller = PositionHoldController::new(fast_config()).unwrap();
    let observer = controller.observer();
    let (sink, _rx) = ChannelSink::bounded(256);
    let (_position_tx, position_rx) = unbounded();
    let (_gain_tx, gain_rx) = unbounded();

    run_controller_spin(
        controller,
        sink,
        ControlInputs::new(position_rx, gain_rx),
        LoopConfig::with_max_iterations(3),
    )
    .unwrap();

    let snapshot = observer.snapshot();
    assert_eq!(snapshot.ticks, 3);
    assert!(!snapshot.armed);
    assert_eq!(snapshot.last_command, RcCommand::DISARM);
}

#[test]
fn test_await_ack_proceeds_after_ack() {
    let config = fast_config().with_arming(ArmingMode::AwaitAck {
        ack_timeout_ms: 1000,
    });
    let mut controller = PositionHoldController::new(config).unwrap();
    let observer = controller.observer();
    let (sink, rx) = ChannelSink::bounded(64);
    let (_position_tx, position_rx) = unbounded();
    let (_gain_tx, gain_rx) = unbounded();
    let (ack_tx, ack_rx) = unbounded();

    // 看到解锁命令发出后再确认
    let acker = std::thread::spawn(move || {
        while !observer.is_armed() {
            std::thread::sleep(Duration::from_millis(1));
        }
        ack_tx.send(()).unwrap();
    });

    let summary = run_controller(
        controller,
        sink,
        ControlInputs::new(position_rx, gain_rx).with_arm_acks(ack_rx),
        LoopConfig::with_max_iterations(2),
    )
    .unwrap();
    acker.join().unwrap();

    assert_eq!(summary.ticks, 2);
    assert_eq!(commands(&rx)[..2], [RcCommand::DISARM, RcCommand::ARM]);
}

#[test]
fn test_await_ack_ignores_ack_sent_before_arming() {
    let config = fast_config().with_arming(ArmingMode::AwaitAck { ack_timeout_ms: 30 });
    let controller = PositionHoldController::new(config).unwrap();
    let (sink, rx) = ChannelSink::bounded(64);
    let (_position_tx, position_rx) = unbounded();
    let (_gain_tx, gain_rx) = unbounded();
    let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
    ack_tx.send(()).unwrap();

    let result = run_controller(
        controller,
        sink,
        ControlInputs::new(position_rx, gain_rx).with_arm_acks(ack_rx),
        LoopConfig::with_max_iterations(2),
    );

    assert!(matches!(
        result,
        Err(ControlError::ArmTimeout { timeout_ms: 30 })
    ));
    assert_eq!(
        commands(&rx),
        vec![RcCommand::DISARM, RcCommand::ARM, RcCommand::DISARM]
    );
}

#[test]
fn test_await_ack_timeout_disarms() {
    let config = fast_config().with_arming(ArmingMode::AwaitAck { ack_timeout_ms: 20 });
    let controller = PositionHoldController::new(config).unwrap();
    let (sink, rx) = ChannelSink::bounded(64);
    let (_position_tx, position_rx) = unbounded();
    let (_gain_tx, gain_rx) = unbounded();
    let (_ack_tx, ack_rx) = unbounded();

    let result = run_controller(
        controller,
        sink,
        ControlInputs::new(position_rx, gain_rx).with_arm_acks(ack_rx),
        LoopConfig::with_max_iterations(2),
    );

    assert!(matches!(
        result,
        Err(ControlError::ArmTimeout { timeout_ms: 20 })
    ));
    assert_eq!(
        commands(&rx),
        vec![RcCommand::DISARM, RcCommand::ARM, RcCommand::DISARM]
    );
}

#[test]
fn test_await_ack_closed_channel_disarms() {
    let config = fast_config().with_arming(ArmingMode::AwaitAck {
        ack_timeout_ms: 1000,
    });
    let controller = PositionHoldController::new(config).unwrap();
    let (sink, rx) = ChannelSink::bounded(64);
    let (_position_tx, position_rx) = unbounded();
    let (_gain_tx, gain_rx) = unbounded();
    let (ack_tx, ack_rx) = unbounded::<()>();
    drop(ack_tx);

    let result = run_controller_spin(
        controller,
        sink,
        ControlInputs::new(position_rx, gain_rx).with_arm_acks(ack_rx),
        LoopConfig::with_max_iterations(2),
    );

    assert!(matches!(result, Err(ControlError::AckChannelClosed)));
    assert_eq!(commands(&rx).last(), Some(&RcCommand::DISARM));
}
