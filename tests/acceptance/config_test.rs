//! Slaves built from TOML configuration files.

use super::common::{address_count, fc, SlaveUnderTest};
use mbtcp_common::config::SlaveConfig;
use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;

fn config_from_file(toml: &str) -> SlaveConfig {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(toml.as_bytes()).unwrap();
    SlaveConfig::from_file(file.path()).unwrap()
}

#[test]
fn test_unit_id_from_config_file() {
    let config = config_from_file("unit_id = 17\n");
    let slave = SlaveUnderTest::with_config(&config, |bank| {
        bank.set_holding_register(0, 0x0017);
    });

    let mut master = slave.master(17);
    let values = master
        .read_registers(fc::READ_HOLDING_REGISTERS, 0, 1)
        .unwrap();
    assert_eq!(values, vec![0x0017]);

    let (_, mut frame) = master.frame(fc::READ_HOLDING_REGISTERS, &address_count(0, 1));
    frame[6] = 1;
    master.send_raw(&frame).unwrap();
    assert!(
        master.expect_silence(Duration::from_millis(200)),
        "unit 1 must not be served once the file sets unit 17"
    );
}

#[test]
fn test_bank_size_from_config_file() {
    let config = config_from_file(
        r#"
[bank]
coils = 8
holding_registers = 2
"#,
    );
    assert_eq!(config.bank.holding_registers, 2);
    assert_eq!(config.bank.input_registers, 256);

    let slave = SlaveUnderTest::with_config(&config, |bank| {
        bank.set_holding_register(1, 0x00AA);
    });
    let mut master = slave.master(config.unit_id);

    // Writes past the bank are acknowledged but not stored
    assert_eq!(
        master.write_multiple_registers(1, &[0x1111, 0x2222]).unwrap(),
        (1, 2)
    );
    let values = master
        .read_registers(fc::READ_HOLDING_REGISTERS, 0, 4)
        .unwrap();
    assert_eq!(values, vec![0x0000, 0x1111, 0x0000, 0x0000]);

    // Coils past the bank read as off
    assert_eq!(master.write_single_coil(12, true).unwrap(), (12, 0xFF00));
    let bits = master.read_bits(fc::READ_COILS, 0, 16).unwrap();
    assert!(bits.iter().all(|bit| !bit));
}

#[test]
fn test_strict_mbap_from_config_file() {
    let config = config_from_file("strict_mbap = true\npoll_interval = \"2ms\"\n");
    assert!(config.strict_mbap);
    assert_eq!(config.poll_interval, Duration::from_millis(2));

    let slave = SlaveUnderTest::with_config(&config, |bank| {
        bank.set_input_register(0, 0x0102);
    });
    let mut master = slave.master(config.unit_id);

    // Non-zero protocol id
    let (_, mut frame) = master.frame(fc::READ_INPUT_REGISTERS, &address_count(0, 1));
    frame[3] = 1;
    master.send_raw(&frame).unwrap();
    assert!(master.expect_silence(Duration::from_millis(200)));

    // Length field disagreeing with the frame
    let (_, mut frame) = master.frame(fc::READ_INPUT_REGISTERS, &address_count(0, 1));
    frame[5] = 9;
    master.send_raw(&frame).unwrap();
    assert!(master.expect_silence(Duration::from_millis(200)));

    // Well-formed requests are still answered
    let values = master.read_registers(fc::READ_INPUT_REGISTERS, 0, 1).unwrap();
    assert_eq!(values, vec![0x0102]);

    let stats = slave.stop();
    assert_eq!(stats.dropped.total(), 2);
}

#[test]
fn test_written_config_reloads_identically() {
    let config = config_from_file("unit_id = 3\n[listen]\naddress = \"127.0.0.1\"\nport = 1502\n");
    let reloaded = config_from_file(&config.to_toml().unwrap());

    assert_eq!(reloaded.unit_id, 3);
    assert_eq!(reloaded.listen.socket_addr(), "127.0.0.1:1502".parse::<SocketAddr>().unwrap());
    assert_eq!(reloaded.write_timeout, config.write_timeout);
    assert_eq!(reloaded.bank, config.bank);
}
