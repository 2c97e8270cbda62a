//! Soak tests: sustained traffic on a single connection.
//!
//! # Acceptance Criteria
//!
//! - Every request answered with its own transaction id
//! - No frame dropped and no send failure
//! - Bank contents consistent with the writes performed

use super::common::{fc, SlaveUnderTest};
use std::time::{Duration, Instant};

/// Configuration for soak tests.
struct SoakConfig {
    /// Number of write/read round trips.
    rounds: u32,
    /// Give up after this long.
    deadline: Duration,
}

impl SoakConfig {
    /// A few seconds of traffic, run with the regular suite.
    fn short() -> Self {
        Self {
            rounds: 500,
            deadline: Duration::from_secs(30),
        }
    }

    /// Sustained traffic for stability checks.
    fn long() -> Self {
        Self {
            rounds: 200_000,
            deadline: Duration::from_secs(3600),
        }
    }
}

fn run_soak(config: &SoakConfig) {
    let slave = SlaveUnderTest::start(|_| {});
    let mut master = slave.master(1);
    let start = Instant::now();

    for round in 0..config.rounds {
        assert!(
            start.elapsed() < config.deadline,
            "soak deadline exceeded at round {round}"
        );

        let address = u16::try_from(round % 200).unwrap();
        let value = u16::try_from(round % 65_536).unwrap();
        master
            .write_multiple_registers(address, &[value, !value])
            .unwrap();
        let read = master
            .read_registers(fc::READ_HOLDING_REGISTERS, address, 2)
            .unwrap();
        assert_eq!(read, vec![value, !value], "round {round}");

        let on = round % 2 == 0;
        master.write_single_coil(address, on).unwrap();
        assert_eq!(master.read_bits(fc::READ_COILS, address, 1).unwrap(), vec![on]);
    }

    let stats = slave.stop();
    let expected = u64::from(config.rounds) * 4;
    assert_eq!(stats.responses_sent, expected);
    assert_eq!(stats.dropped.total(), 0);
    assert_eq!(stats.send_failures, 0);
    assert_eq!(stats.connections_accepted, 1);
}

#[test]
fn test_soak_short() {
    run_soak(&SoakConfig::short());
}

#[test]
#[ignore = "Soak test - runs for several minutes"]
fn test_soak_long() {
    run_soak(&SoakConfig::long());
}
