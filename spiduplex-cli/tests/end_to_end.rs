//! Full runs over the simulated backend.

use clap::Parser;
use spiduplex_cli::{execute, execute_on, open_backends, Backends, Cli, RunConfig};
use spiduplex_core::{FatalPolicy, MemorySink};
use spiduplex_report::{render, summary_line, ActorStatus, OutputFormat};
use spiduplex_transport::{AlwaysReady, FaultyTransport, LoopbackTransport, SimulatedBus};

fn config(args: &[&str]) -> RunConfig {
    let mut argv = vec!["spiduplex", "--backend", "sim", "--no-progress"];
    argv.extend_from_slice(args);
    RunConfig::from_cli(&Cli::try_parse_from(argv).unwrap()).unwrap()
}

#[test]
fn test_loopback_run_has_no_mismatches() {
    let config = config(&["-l", "-n", "10", "-S", "32", "--seed", "11"]);
    let sink = MemorySink::new();

    let report = execute(&config, FatalPolicy::Propagate, Box::new(sink.clone())).unwrap();

    assert_eq!(report.mismatches(), 0);
    assert!(!report.has_fatal_error());
    assert_eq!(report.master.status, ActorStatus::Completed);
    assert_eq!(report.slave.status, ActorStatus::Completed);
    assert_eq!(report.master.completed_iterations, 9);
    assert_eq!(report.slave.completed_iterations, 9);
    assert_eq!(report.latency.samples, 9);
    assert!(report.config.loopback);
    assert!(sink.contents().is_empty());

    let line = summary_line(&report);
    assert!(line.starts_with(
        "Average time taken per transaction (averaged over 10 transactions of size 32 bytes @ 24.000000 MHz) is "
    ));
}

#[test]
fn test_simulated_bus_with_both_pacings() {
    for pacing in ["best-effort", "rendezvous"] {
        let config = config(&["-n", "200", "-S", "64", "--pacing", pacing]);
        let report = execute(&config, FatalPolicy::Propagate, Box::new(MemorySink::new())).unwrap();

        assert_eq!(report.mismatches(), 0, "pacing {}", pacing);
        assert_eq!(report.master.completed_iterations, 199);
        assert_eq!(report.slave.completed_iterations, 199);
        assert_eq!(report.config.pacing, pacing);
    }
}

#[test]
fn test_master_mismatch_leaves_slave_running() {
    let config = config(&["-l", "-n", "10", "-S", "32", "--pacing", "rendezvous"]);
    let backends = Backends {
        master: Box::new(FaultyTransport::new(LoopbackTransport).corrupt_exchange(3, 17)),
        slave: Box::new(LoopbackTransport),
        gate: Box::new(AlwaysReady),
    };
    let sink = MemorySink::new();

    let report = execute_on(&config, FatalPolicy::Propagate, Box::new(sink.clone()), backends)
        .unwrap();

    assert_eq!(report.master.status, ActorStatus::MismatchAborted);
    assert_eq!(report.master.window_mismatch_at, Some(3));
    assert_eq!(report.master.completed_iterations, 3);
    assert_eq!(report.slave.status, ActorStatus::Completed);
    assert_eq!(report.slave.completed_iterations, 9);
    assert_eq!(report.latency.samples, 3);
    assert!(!report.has_fatal_error());
    assert!(sink.contents().contains("Master RX Data:"));
}

#[test]
fn test_master_mismatch_on_simulated_bus_leaves_slave_running() {
    for pacing in ["best-effort", "rendezvous"] {
        let config = config(&["-n", "10", "-S", "32", "--seed", "5", "--pacing", pacing]);
        let (bus_master, bus_slave) = SimulatedBus::pair();
        let backends = Backends {
            master: Box::new(FaultyTransport::new(bus_master).corrupt_exchange(3, 17)),
            slave: Box::new(bus_slave),
            gate: Box::new(AlwaysReady),
        };
        let sink = MemorySink::new();

        let report = execute_on(&config, FatalPolicy::Propagate, Box::new(sink.clone()), backends)
            .unwrap();

        assert_eq!(report.master.status, ActorStatus::MismatchAborted, "pacing {}", pacing);
        assert_eq!(report.master.window_mismatch_at, Some(3));
        assert_eq!(report.slave.status, ActorStatus::Completed, "pacing {}", pacing);
        assert_eq!(report.slave.completed_iterations, 9);
        assert_eq!(report.slave.window_mismatch_at, None);
        // The bus holds the master's iteration-3 frame, so the slave sees a
        // stale tag on each of its remaining six iterations.
        assert_eq!(report.slave.tag_mismatches, 6);
        assert!(report.slave.error.is_none());
        assert!(!report.has_fatal_error());
        assert!(sink.contents().contains("slave RX data index with master TX data [4] != [5]"));
    }
}

#[test]
fn test_rx_dump_file_holds_every_transfer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rx.bin");
    let config = config(&["-l", "-n", "5", "-S", "16", "-o", path.to_str().unwrap()]);

    let report = execute(&config, FatalPolicy::Propagate, Box::new(MemorySink::new())).unwrap();

    assert_eq!(report.mismatches(), 0);
    // Four transfers per actor, both appending to the same file.
    assert_eq!(std::fs::read(&path).unwrap().len(), 2 * 4 * 16);
}

#[test]
fn test_verbose_dumps_seeded_buffers() {
    let config = config(&["-l", "-v", "-n", "2", "-S", "4"]);
    let sink = MemorySink::new();

    execute(&config, FatalPolicy::Propagate, Box::new(sink.clone())).unwrap();

    let out = sink.contents();
    assert!(out.starts_with("MASTER TX | "));
    assert!(out.contains("SLAVE TX | "));
    assert!(out.contains("Master RX | "));
    assert!(out.contains("Slave RX | "));
}

#[test]
fn test_json_report() {
    let config = config(&["-l", "-H", "-n", "3", "--format", "json", "--pacing", "rendezvous"]);
    let report = execute(&config, FatalPolicy::Propagate, Box::new(MemorySink::new())).unwrap();

    let json = render(&report, OutputFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["meta"]["backend"], "sim");
    assert_eq!(value["config"]["transactions"], 3);
    assert_eq!(value["master"]["completed_iterations"], 2);
    assert_eq!(value["config"]["pacing"], "rendezvous");
    assert_eq!(value["config"]["mode_bits"], 0x21);
    assert_eq!(value["config"]["loopback"], true);
}

#[test]
fn test_sim_backends_open_without_hardware() {
    assert!(open_backends(&config(&[])).is_ok());
}
