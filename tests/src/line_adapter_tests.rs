// embedded-hal pin adapter tests

use std::io::ErrorKind;

use embedded_hal::digital::OutputPin;
use embedded_hal_mock::eh1::pin::{Mock as PinMock, State as PinState, Transaction as PinTransaction};
use embedded_hal_mock::eh1::MockError;
use pixel_core::{AnodeBank, DigitalLine, EmbeddedHalLine, HalError};

fn anode<P: OutputPin>(pin: P) -> EmbeddedHalLine<P> {
    EmbeddedHalLine::new(pin)
}

#[test]
fn test_anode_line_idles_low() {
    let expectations = [
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::High),
        PinTransaction::set(PinState::Low),
    ];
    let mut line = anode(PinMock::new(&expectations));

    line.configure_as_output().unwrap();
    line.set_high().unwrap();
    line.release().unwrap();

    line.into_inner().done();
}

#[test]
fn test_pump_sink_idles_high() {
    let expectations = [
        PinTransaction::set(PinState::High),
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::High),
    ];
    let mut sink = EmbeddedHalLine::idle_high(PinMock::new(&expectations));

    sink.configure_as_output().unwrap();
    sink.set_low().unwrap();
    sink.release().unwrap();

    sink.into_inner().done();
}

#[test]
fn test_pulse_is_high_then_low() {
    let expectations = [PinTransaction::set(PinState::High), PinTransaction::set(PinState::Low)];
    let mut debug = EmbeddedHalLine::new(PinMock::new(&expectations));

    debug.pulse().unwrap();

    debug.into_inner().done();
}

#[test]
fn test_pin_error_maps_to_gpio_error() {
    let expectations = [PinTransaction::set(PinState::High).with_error(MockError::Io(ErrorKind::NotConnected))];
    let mut line = EmbeddedHalLine::new(PinMock::new(&expectations));

    assert_eq!(line.set_high(), Err(HalError::GpioError));

    line.into_inner().done();
}

#[test]
fn test_anode_bank_switches_one_line_at_a_time() {
    let mut first = PinMock::new(&[
        // configure: idle level, then explicit low
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::High),
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::Low),
    ]);
    let mut second = PinMock::new(&[
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::Low),
        PinTransaction::set(PinState::High),
        PinTransaction::set(PinState::Low),
    ]);
    let mut bank = AnodeBank::new([anode(first.clone()), anode(second.clone())]);

    bank.configure().unwrap();
    bank.activate(0).unwrap();
    // Switching pixels turns the old anode off before the new one goes high
    bank.activate(1).unwrap();
    assert_eq!(bank.active(), Some(1));
    bank.deactivate_all().unwrap();
    assert_eq!(bank.active(), None);
    assert_eq!(bank.activate(2), Err(HalError::InvalidConfig));

    first.done();
    second.done();
}
