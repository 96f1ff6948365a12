use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use uartmesh_bridge::new_bridge;
use uartmesh_core::{EntityId, NodeId, SimTime};
use uartmesh_runner::{
    load_config, ramp_message, Harness, RunnerConfig, SerialSink, TrafficGenerator,
    WatchdogSupervisor,
};

#[derive(Parser)]
#[command(name = "uartmesh", about = "Serial-to-mesh bridge loopback runner")]
struct Cli {
    /// Path to a YAML configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the random traffic generator
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of random messages to inject after the ramp message
    #[arg(short, long, default_value_t = 5)]
    messages: usize,

    /// Simulated run duration in milliseconds
    #[arg(short, long, default_value_t = 5_000)]
    duration_ms: u64,

    /// Skip mesh commissioning; the bridges stay unjoined and the host
    /// watchdogs expire
    #[arg(long)]
    no_join: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load config from {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => RunnerConfig::default(),
    };

    if let Err(e) = run(cli, config) {
        error!("runner failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli, config: RunnerConfig) -> Result<(), uartmesh_core::SimError> {
    // Bridge A's configured destination is bridge B's address and vice
    // versa, so each bridge lives at the address its peer sends to.
    let node_a = config.bridge_b.destination;
    let node_b = config.bridge_a.destination;

    let bridge_a_id = EntityId::new(1);
    let bridge_b_id = EntityId::new(2);
    let sink_a_id = EntityId::new(3);
    let sink_b_id = EntityId::new(4);

    let mut harness = Harness::new(config.link_latency, config.complete_latency);

    let supervisor_a = WatchdogSupervisor::new(
        config.bridge_a.name.clone(),
        sim_to_real(config.bridge_a.watchdog_expiry),
    );
    let supervisor_b = WatchdogSupervisor::new(
        config.bridge_b.name.clone(),
        sim_to_real(config.bridge_b.watchdog_expiry),
    );

    let (sink_a, received_a) = SerialSink::new(sink_a_id, &config.bridge_a.name);
    let (sink_b, received_b) = SerialSink::new(sink_b_id, &config.bridge_b.name);
    harness.register(Box::new(sink_a));
    harness.register(Box::new(sink_b));

    let bridge_a = new_bridge(
        bridge_a_id,
        config.bridge_a.clone(),
        Some(sink_a_id),
        harness.transport(node_a),
        supervisor_a.watchdog(),
    );
    let bridge_b = new_bridge(
        bridge_b_id,
        config.bridge_b.clone(),
        Some(sink_b_id),
        harness.transport(node_b),
        supervisor_b.watchdog(),
    );
    harness.attach(node_a, Box::new(bridge_a));
    harness.attach(node_b, Box::new(bridge_b));

    if cli.no_join {
        info!("skipping mesh join; bridges stay unjoined");
    } else {
        harness.join(SimTime::from_millis(10), vec![bridge_a_id, bridge_b_id]);
    }

    // Byte gap well inside the idle timeout so each burst frames as one
    // message, message spacing wide enough for the full send cycle.
    let byte_gap = SimTime::from_micros(100);
    let message_spacing = SimTime::from_millis(200);
    let filter = config.bridge_a.destination_filter;

    let mut start = SimTime::from_millis(20);
    let ramp = ramp_message(400, filter);
    info!(len = ramp.len(), "injecting ramp message");
    harness.inject_serial(bridge_a_id, start, byte_gap, &ramp);
    start += message_spacing;

    let mut generator = TrafficGenerator::new(cli.seed, filter);
    for _ in 0..cli.messages {
        let message = generator.message(config.bridge_a.intake_capacity);
        harness.inject_serial(bridge_a_id, start, byte_gap, &message);
        start += message_spacing;
    }

    let deadline = SimTime::from_millis(cli.duration_ms);
    let dispatched = harness.run_until(deadline)?;

    if cli.no_join {
        // The supervisors run on the wall clock; give them time to starve.
        let expiry = sim_to_real(config.bridge_a.watchdog_expiry);
        std::thread::sleep(expiry + Duration::from_millis(100));
    }

    let stats = harness.link_stats();
    info!(
        dispatched,
        frames_sent = stats.frames_sent,
        frames_delivered = stats.frames_delivered,
        frames_dropped = stats.frames_dropped,
        "link summary"
    );
    info!(
        messages_out_a = received_a.borrow().len(),
        messages_out_b = received_b.borrow().len(),
        "serial egress summary"
    );

    report_supervisor(&config.bridge_a.name, supervisor_a, node_a);
    report_supervisor(&config.bridge_b.name, supervisor_b, node_b);
    Ok(())
}

fn report_supervisor(name: &str, supervisor: WatchdogSupervisor, node: NodeId) {
    if supervisor.stop() {
        error!(bridge = %name, %node, "host watchdog expired");
    } else {
        info!(bridge = %name, %node, "host watchdog healthy");
    }
}

/// Map a simulated period onto the wall clock for the host supervisor.
fn sim_to_real(time: SimTime) -> Duration {
    Duration::from_micros(time.as_micros())
}
