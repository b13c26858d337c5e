//! # Pico Node
//!
//! 定点悬停节点：从 UDP 接收位置估计、增益调参和解锁确认，
//! 以固定周期通过 UDP 发布 RC 命令和 PID 误差。
//!
//! ```bash
//! # 使用默认配置运行
//! pico-node --bind 127.0.0.1:14550 --command-target 127.0.0.1:14551
//!
//! # 导出默认配置，修改后加载
//! pico-node --print-config > hold.toml
//! pico-node --config hold.toml --spin
//! ```
//!
//! Ctrl+C 会让控制循环发布上锁命令后退出。

mod transport;

use anyhow::{Context, Result};
use clap::Parser;
use pico_control::{
    ControlInputs, ControllerConfig, LoopConfig, PositionHoldController, run_controller,
    run_controller_spin,
};
use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{error, info};
use transport::{InboundRouter, UdpSink};

/// Pico Node - 定点悬停 PID 节点
#[derive(Parser, Debug)]
#[command(name = "pico-node")]
#[command(about = "Three-axis PID position hold over UDP/JSON", long_about = None)]
#[command(version)]
struct Args {
    /// 控制器配置文件（TOML），不指定时使用默认配置
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 输入监听地址（位置、调参、解锁确认）
    #[arg(long, default_value = "127.0.0.1:14550")]
    bind: SocketAddr,

    /// 输出 socket 的本地地址
    #[arg(long, default_value = "0.0.0.0:0")]
    publish_from: SocketAddr,

    /// RC 命令的目标地址
    #[arg(long, default_value = "127.0.0.1:14551")]
    command_target: SocketAddr,

    /// PID 误差遥测的目标地址
    #[arg(long, default_value = "127.0.0.1:14552")]
    error_target: SocketAddr,

    /// 使用 spin_sleep 高精度定时
    #[arg(long)]
    spin: bool,

    /// 运行指定 tick 数后退出（调试用）
    #[arg(long)]
    max_ticks: Option<u64>,

    /// 打印生效的配置（TOML）后退出
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pico_node=info".parse()?)
                .add_directive("pico_control=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ControllerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ControllerConfig::default(),
    };

    if args.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let controller = PositionHoldController::new(config).context("Invalid controller config")?;
    let sink = UdpSink::bind(args.publish_from, args.command_target, args.error_target)
        .context("Failed to open publish socket")?;
    let listen_socket =
        UdpSocket::bind(args.bind).with_context(|| format!("Failed to bind {}", args.bind))?;

    let (position_tx, position_rx) = crossbeam_channel::unbounded();
    let (gain_tx, gain_rx) = crossbeam_channel::unbounded();
    let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

    ctrlc::set_handler(move || {
        // 重复的信号忽略即可
        let _ = shutdown_tx.try_send(());
    })
    .context("Failed to install Ctrl+C handler")?;

    let running = Arc::new(AtomicBool::new(true));
    let listener = {
        let running = running.clone();
        let router = InboundRouter {
            positions: position_tx,
            gains: gain_tx,
            arm_acks: ack_tx,
        };
        thread::Builder::new()
            .name("pico-listener".into())
            .spawn(move || transport::listen(listen_socket, router, running))
            .context("Failed to spawn listener thread")?
    };

    info!(
        bind = %args.bind,
        command_target = %args.command_target,
        error_target = %args.error_target,
        spin = args.spin,
        "Node started"
    );

    let inputs = ControlInputs::new(position_rx, gain_rx)
        .with_arm_acks(ack_rx)
        .with_shutdown(shutdown_rx);
    let loop_config = LoopConfig {
        max_iterations: args.max_ticks,
    };

    let result = if args.spin {
        run_controller_spin(controller, sink, inputs, loop_config)
    } else {
        run_controller(controller, sink, inputs, loop_config)
    };

    running.store(false, Ordering::Release);
    match listener.join() {
        Ok(Ok(())) => {},
        Ok(Err(e)) => error!("Listener failed: {}", e),
        Err(_) => error!("Listener thread panicked"),
    }

    let summary = result?;
    info!(
        ticks = summary.ticks,
        publish_failures = summary.publish_failures,
        late_ticks = summary.late_ticks,
        "Node stopped"
    );
    Ok(())
}
