//! Function codes exercised the way a Modbus master uses them.
//!
//! Each test starts a slave with a preloaded register bank, talks to it
//! over loopback and checks both the wire response and the resulting bank
//! state as seen through later reads.

use super::common::{address_count, fc, SlaveUnderTest};
use std::time::Duration;

const UNIT: u8 = 1;

#[test]
fn test_read_coils_bit_packing() {
    let slave = SlaveUnderTest::start(|bank| {
        for address in [0, 2, 8, 9] {
            bank.set_coil(address, true);
        }
    });
    let mut master = slave.master(UNIT);

    let pdu = master.transact(fc::READ_COILS, &address_count(0, 10)).unwrap();
    assert_eq!(pdu, vec![fc::READ_COILS, 2, 0b0000_0101, 0b0000_0011]);

    let bits = master.read_bits(fc::READ_COILS, 8, 3).unwrap();
    assert_eq!(bits, vec![true, true, false]);
}

#[test]
fn test_read_discrete_inputs_use_their_own_table() {
    let slave = SlaveUnderTest::start(|bank| {
        bank.set_discrete_input(1, true);
        bank.set_coil(0, true);
    });
    let mut master = slave.master(UNIT);

    let inputs = master.read_bits(fc::READ_DISCRETE_INPUTS, 0, 4).unwrap();
    assert_eq!(inputs, vec![false, true, false, false]);
}

#[test]
fn test_read_holding_and_input_registers() {
    let slave = SlaveUnderTest::start(|bank| {
        bank.set_holding_register(10, 0xBEEF);
        bank.set_holding_register(11, 0x0042);
        bank.set_input_register(10, 0x1111);
    });
    let mut master = slave.master(UNIT);

    let holding = master
        .read_registers(fc::READ_HOLDING_REGISTERS, 10, 3)
        .unwrap();
    assert_eq!(holding, vec![0xBEEF, 0x0042, 0x0000]);

    let input = master.read_registers(fc::READ_INPUT_REGISTERS, 10, 1).unwrap();
    assert_eq!(input, vec![0x1111]);
}

#[test]
fn test_write_single_coil_then_read_back() {
    let slave = SlaveUnderTest::start(|_| {});
    let mut master = slave.master(UNIT);

    assert_eq!(master.write_single_coil(5, true).unwrap(), (5, 0xFF00));
    assert_eq!(master.read_bits(fc::READ_COILS, 5, 1).unwrap(), vec![true]);

    assert_eq!(master.write_single_coil(5, false).unwrap(), (5, 0x0000));
    assert_eq!(master.read_bits(fc::READ_COILS, 5, 1).unwrap(), vec![false]);
}

#[test]
fn test_write_multiple_registers_then_read_back() {
    let slave = SlaveUnderTest::start(|_| {});
    let mut master = slave.master(UNIT);

    let echoed = master
        .write_multiple_registers(20, &[0x0001, 0x0203, 0xFFFF])
        .unwrap();
    assert_eq!(echoed, (20, 3));

    let values = master
        .read_registers(fc::READ_HOLDING_REGISTERS, 20, 3)
        .unwrap();
    assert_eq!(values, vec![0x0001, 0x0203, 0xFFFF]);
}

#[test]
fn test_largest_register_read_fits_buffer() {
    let slave = SlaveUnderTest::start(|bank| {
        bank.set_holding_register(124, 0xABCD);
    });
    let mut master = slave.master(UNIT);

    let values = master
        .read_registers(fc::READ_HOLDING_REGISTERS, 0, 125)
        .unwrap();
    assert_eq!(values.len(), 125);
    assert_eq!(values[124], 0xABCD);
}

#[test]
fn test_rejected_requests_are_silent_and_harmless() {
    let slave = SlaveUnderTest::start(|bank| {
        bank.set_holding_register(0, 7);
    });
    let mut master = slave.master(UNIT);

    // Write Single Register is not served
    let (_, frame) = master.frame(0x06, &address_count(0, 99));
    master.send_raw(&frame).unwrap();
    assert!(master.expect_silence(Duration::from_millis(200)));

    // Too many registers for the response buffer
    let (_, frame) = master.frame(fc::READ_HOLDING_REGISTERS, &address_count(0, 126));
    master.send_raw(&frame).unwrap();
    assert!(master.expect_silence(Duration::from_millis(200)));

    // The connection is still served and the bank is untouched
    let values = master
        .read_registers(fc::READ_HOLDING_REGISTERS, 0, 1)
        .unwrap();
    assert_eq!(values, vec![7]);

    let stats = slave.stop();
    assert_eq!(stats.dropped.total(), 2);
    assert_eq!(stats.responses_sent, 1);
}

#[test]
fn test_other_unit_is_ignored() {
    let slave = SlaveUnderTest::start(|_| {});
    let mut stranger = slave.master(UNIT + 1);

    let (_, frame) = stranger.frame(fc::READ_COILS, &address_count(0, 8));
    stranger.send_raw(&frame).unwrap();
    assert!(stranger.expect_silence(Duration::from_millis(200)));
}

#[test]
fn test_single_client_admission() {
    let slave = SlaveUnderTest::start(|_| {});
    let mut first = slave.master(UNIT);
    first.read_bits(fc::READ_COILS, 0, 1).unwrap();

    let mut second = slave.master(UNIT);
    let (_, frame) = second.frame(fc::READ_COILS, &address_count(0, 1));
    // The slave may already have closed the socket
    let _ = second.send_raw(&frame);
    assert!(second.read_frame().is_err(), "second client must not be served");

    first.read_bits(fc::READ_COILS, 0, 1).unwrap();

    let stats = slave.stop();
    assert_eq!(stats.connections_accepted, 1);
    assert_eq!(stats.connections_rejected, 1);
}
