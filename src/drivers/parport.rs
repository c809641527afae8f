// Parallel-port pad backend: an extended Multisystem-style pin protocol
//
// | Function    | Pin | Register | Bit | Active |
// |-------------|-----|----------|-----|--------|
// | Up          | 2   | Data     | 0   | Low    |
// | Down        | 3   | Data     | 1   | Low    |
// | Left        | 4   | Data     | 2   | Low    |
// | Right       | 5   | Data     | 3   | Low    |
// | A           | 6   | Data     | 4   | Low    |
// | B           | 7   | Data     | 5   | Low    |
// | Start       | 8   | Data     | 6   | Low    |
// | Select      | 9   | Data     | 7   | Low    |
// | R1          | 15  | Status   | 3   | Low    |
// | L1          | 13  | Status   | 4   | Low    |
// | Y           | 12  | Status   | 5   | Low    |
// | Menu toggle | 10  | Status   | 6   | Low    |
// | X           | 11  | Status   | 7   | Low*   |
//
// (*) hardware inverted

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use tracing::{debug, info, warn};

use crate::driver::{JoypadDriver, PadMeta, PadObserver};
use crate::error::PadError;
use crate::pad::{ButtonSet, Joyaxis, Joykey, MAX_PADS};

const DRIVER_IDENT: &str = "parport";

const PPCLAIM: libc::c_ulong = 0x708b;
const PPRELEASE: libc::c_ulong = 0x708c;
const PPRSTATUS: libc::c_ulong = 0x80017081;
const PPRDATA: libc::c_ulong = 0x80017085;
const PPDATADIR: libc::c_ulong = 0x40047090;

const NUM_PP_BUTTONS: usize = 13;

/// Physical pin carrying each button, for calibration diagnostics.
const BUTTON_PINS: [u8; NUM_PP_BUTTONS] = [2, 3, 4, 5, 6, 7, 8, 9, 15, 13, 12, 10, 11];

/// Raw pin reading per button. Active low throughout, except the
/// hardware-inverted pin 11 which is the negation of status bit 7.
fn decode_pins(data: u8, status: u8) -> [bool; NUM_PP_BUTTONS] {
    let mut pins = [false; NUM_PP_BUTTONS];
    for (i, pin) in pins.iter_mut().take(8).enumerate() {
        *pin = data & (1 << i) == 0;
    }
    for bit in 3..8 {
        pins[bit + 5] = status & (1 << bit) == 0;
    }
    pins[12] = !pins[12];
    pins
}

/// Decide which pins to trust from an untouched device. Floating pins read
/// pressed at idle and are excluded; a device with every pin pressed is
/// nothing connected at all.
fn calibrate(idle: &[bool; NUM_PP_BUTTONS]) -> Option<[bool; NUM_PP_BUTTONS]> {
    if idle.iter().all(|pressed| *pressed) {
        return None;
    }
    let mut enabled = [false; NUM_PP_BUTTONS];
    for (on, pressed) in enabled.iter_mut().zip(idle) {
        *on = !pressed;
    }
    Some(enabled)
}

fn assemble(pins: &[bool; NUM_PP_BUTTONS], enabled: &[bool; NUM_PP_BUTTONS]) -> ButtonSet {
    let mut set = ButtonSet::default();
    for (i, (&pressed, &on)) in pins.iter().zip(enabled).enumerate() {
        set.set(i, pressed && on);
    }
    set
}

/// Claimed parallel port; releases the claim before the descriptor closes.
struct ClaimedPort {
    file: File,
}

impl ClaimedPort {
    fn open(path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        let fd = file.as_raw_fd();
        if unsafe { libc::ioctl(fd, PPCLAIM) } < 0 {
            return Err(std::io::Error::last_os_error());
        }
        let port = ClaimedPort { file };
        let input_mode: libc::c_int = 1;
        if unsafe { libc::ioctl(fd, PPDATADIR, &input_mode) } < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(port)
    }

    fn read_registers(&self) -> std::io::Result<(u8, u8)> {
        let fd = self.file.as_raw_fd();
        let mut data: u8 = 0;
        let mut status: u8 = 0;
        if unsafe { libc::ioctl(fd, PPRDATA, &mut data) } < 0 {
            return Err(std::io::Error::last_os_error());
        }
        if unsafe { libc::ioctl(fd, PPRSTATUS, &mut status) } < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok((data, status))
    }
}

impl Drop for ClaimedPort {
    fn drop(&mut self) {
        unsafe {
            libc::ioctl(self.file.as_raw_fd(), PPRELEASE);
        }
    }
}

#[derive(Default)]
struct ParportPad {
    port: Option<ClaimedPort>,
    ident: String,
    buttons: ButtonSet,
    enabled: [bool; NUM_PP_BUTTONS],
}

/// Parallel-port backend. The device set is fixed at startup; this bus has
/// no hotplug signal.
pub struct ParportJoypad {
    slots: [ParportPad; MAX_PADS],
}

impl ParportJoypad {
    pub fn new(observer: &mut dyn PadObserver) -> Result<Self, PadError> {
        let mut joypad = ParportJoypad {
            slots: Default::default(),
        };
        for port in 0..MAX_PADS {
            joypad.try_open(port, observer);
        }
        Ok(joypad)
    }

    fn try_open(&mut self, port: usize, observer: &mut dyn PadObserver) {
        let path = format!("/dev/parport{port}");
        let claimed = match ClaimedPort::open(&path) {
            Ok(claimed) => claimed,
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    debug!("parport: cannot claim {path}: {err}");
                }
                return;
            }
        };
        let idle = match claimed.read_registers() {
            Ok((data, status)) => decode_pins(data, status),
            Err(err) => {
                warn!("parport: cannot read registers on {path}: {err}");
                return;
            }
        };
        let Some(enabled) = calibrate(&idle) else {
            info!("parport: all pins read pressed on {path}, nothing connected");
            return;
        };

        let excluded: Vec<u8> = idle
            .iter()
            .enumerate()
            .filter(|(_, pressed)| **pressed)
            .map(|(i, _)| BUTTON_PINS[i])
            .collect();
        if !excluded.is_empty() {
            let pins = excluded
                .iter()
                .map(|pin| pin.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            warn!("parport: {path}: pin(s) {pins} read pressed at idle and were disabled");
        }

        let ident = format!("Generic parallel-port pad (connected to {path})");
        info!("parport: {ident} on port {port}");
        observer.pad_connected(&PadMeta {
            port,
            name: &ident,
            driver: DRIVER_IDENT,
            vendor_id: 0,
            product_id: 0,
        });

        self.slots[port] = ParportPad {
            port: Some(claimed),
            ident,
            buttons: ButtonSet::default(),
            enabled,
        };
    }
}

impl JoypadDriver for ParportJoypad {
    fn ident(&self) -> &'static str {
        DRIVER_IDENT
    }

    fn poll(&mut self, _observer: &mut dyn PadObserver) {
        for pad in &mut self.slots {
            let Some(port) = &pad.port else {
                continue;
            };
            if let Ok((data, status)) = port.read_registers() {
                pad.buttons = assemble(&decode_pins(data, status), &pad.enabled);
            }
        }
    }

    fn button(&self, port: usize, key: Joykey) -> bool {
        let Some(pad) = self.slots.get(port) else {
            return false;
        };
        match key {
            Joykey::Button(button) => pad.buttons.pressed(button as usize),
            _ => false,
        }
    }

    fn axis(&self, _port: usize, _axis: Joyaxis) -> i16 {
        0
    }

    fn buttons(&self, port: usize) -> ButtonSet {
        self.slots
            .get(port)
            .map(|pad| pad.buttons)
            .unwrap_or_default()
    }

    fn name(&self, port: usize) -> Option<&str> {
        self.slots
            .get(port)
            .filter(|pad| pad.port.is_some())
            .map(|pad| pad.ident.as_str())
    }

    fn query_pad(&self, port: usize) -> bool {
        self.slots.get(port).is_some_and(|pad| pad.port.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_register_bits_are_active_low() {
        // only bit 0 high: button 0 released, buttons 1..7 pressed
        let pins = decode_pins(0b0000_0001, 0xff);
        assert!(!pins[0]);
        for pin in &pins[1..8] {
            assert!(*pin);
        }
    }

    #[test]
    fn status_register_maps_bits_3_to_7() {
        // bits 3..6 high (released), bit 7 high (inverted: pressed)
        let pins = decode_pins(0xff, 0b1111_1000);
        assert!(!pins[8]);
        assert!(!pins[9]);
        assert!(!pins[10]);
        assert!(!pins[11]);
        assert!(pins[12]);
    }

    #[test]
    fn inverted_pin_is_negation_of_status_bit_7() {
        let high = decode_pins(0xff, 0b1000_0000);
        let low = decode_pins(0xff, 0b0000_0000);
        assert!(high[12]);
        assert!(!low[12]);
    }

    #[test]
    fn decode_is_idempotent_per_register_pair() {
        let first = decode_pins(0b1010_0101, 0b0101_1000);
        let second = decode_pins(0b1010_0101, 0b0101_1000);
        assert_eq!(first, second);
    }

    #[test]
    fn calibration_disables_exactly_the_idle_pressed_pins() {
        let mut idle = [false; NUM_PP_BUTTONS];
        idle[3] = true;
        idle[12] = true;
        let enabled = calibrate(&idle).unwrap();
        for (i, on) in enabled.iter().enumerate() {
            assert_eq!(*on, i != 3 && i != 12);
        }
    }

    #[test]
    fn all_pins_pressed_means_nothing_connected() {
        // data all low, status bits 3..6 low, inverted bit 7 high
        let idle = decode_pins(0x00, 0b1000_0000);
        assert!(idle.iter().all(|pressed| *pressed));
        assert_eq!(calibrate(&idle), None);
    }

    #[test]
    fn unconnected_port_answers_every_query_neutrally() {
        let joypad = ParportJoypad {
            slots: Default::default(),
        };
        assert!(!joypad.query_pad(0));
        assert!(!joypad.button(0, Joykey::Button(0)));
        assert_eq!(joypad.axis(0, Joyaxis::Pos(0)), 0);
        assert_eq!(joypad.name(0), None);
        assert_eq!(joypad.buttons(5), ButtonSet::default());
    }

    #[test]
    fn disabled_pins_never_reach_the_bitset() {
        let mut enabled = [true; NUM_PP_BUTTONS];
        enabled[0] = false;
        let pins = decode_pins(0x00, 0xff); // every data pin pressed
        let set = assemble(&pins, &enabled);
        assert!(!set.pressed(0));
        for button in 1..8 {
            assert!(set.pressed(button));
        }
    }
}
