use std::thread;
use std::time::Duration;

use rppal::gpio::{Gpio, InputPin, Level, OutputPin};

use crate::indicator::{led_levels, Indicator, IndicatorState};

const BLINK_DURATION: Duration = Duration::from_millis(100);

/// The granted and denied LEDs on GPIO pins.
pub struct LedIndicator {
    granted: OutputPin,
    denied: OutputPin,
    state: IndicatorState,
    alarm: Option<bool>,
}

impl LedIndicator {
    pub fn new(granted: OutputPin, denied: OutputPin) -> Self {
        LedIndicator {
            granted,
            denied,
            state: IndicatorState::Off,
            alarm: None,
        }
    }

    /// Flash both LEDs so a physical inspection shows the outputs work.
    /// Blocks; only used at startup.
    pub fn self_test(&mut self, times: u8) {
        (0..times).for_each(|_| {
            self.granted.set_high();
            self.denied.set_high();
            thread::sleep(BLINK_DURATION);
            self.granted.set_low();
            self.denied.set_low();
            thread::sleep(BLINK_DURATION);
        });
        self.apply();
    }

    fn apply(&mut self) {
        let (granted, denied) = led_levels(self.state, self.alarm);
        self.granted.write(level(granted));
        self.denied.write(level(denied));
    }
}

impl Indicator for LedIndicator {
    fn show(&mut self, state: IndicatorState) {
        self.state = state;
        self.apply();
    }

    fn set_alarm(&mut self, blink: Option<bool>) {
        self.alarm = blink;
        self.apply();
    }
}

/// The door sensor input.
pub struct DoorSensor {
    pin: InputPin,
    open_level: Level,
}

impl DoorSensor {
    pub fn new(pin: InputPin, open_level: Level) -> Self {
        DoorSensor { pin, open_level }
    }

    /// `true` when the door is open.
    pub fn read(&self) -> bool {
        self.pin.read() == self.open_level
    }
}

pub struct Pins {
    pub door: u8,
    pub granted_led: u8,
    pub denied_led: u8,
    pub door_open_level: Level,
}

pub fn setup_gpio(pins: &Pins) -> rppal::gpio::Result<(DoorSensor, LedIndicator)> {
    let gpio = Gpio::new()?;
    let door_pin = match pins.door_open_level {
        Level::High => gpio.get(pins.door)?.into_input_pulldown(),
        Level::Low => gpio.get(pins.door)?.into_input_pullup(),
    };
    let granted = gpio.get(pins.granted_led)?.into_output();
    let denied = gpio.get(pins.denied_led)?.into_output();
    Ok((
        DoorSensor::new(door_pin, pins.door_open_level),
        LedIndicator::new(granted, denied),
    ))
}

fn level(on: bool) -> Level {
    if on {
        Level::High
    } else {
        Level::Low
    }
}
