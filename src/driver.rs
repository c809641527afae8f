// Capability interface every backend implements

use tracing::{info, warn};

use crate::drivers::{linuxraw::LinuxrawJoypad, parport::ParportJoypad, sdl::SdlJoypad, udev::UdevJoypad};
use crate::error::PadError;
use crate::pad::{ButtonSet, Joyaxis, Joykey};

/// The two force-feedback motors a pad can drive.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RumbleEffect {
    Strong,
    Weak,
}

impl RumbleEffect {
    pub(crate) fn index(self) -> usize {
        match self {
            RumbleEffect::Strong => 0,
            RumbleEffect::Weak => 1,
        }
    }
}

/// Identity of a pad that just appeared on a port.
#[derive(Debug)]
pub struct PadMeta<'a> {
    pub port: usize,
    pub name: &'a str,
    pub driver: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
}

/// Connect/disconnect notifications, invoked synchronously from inside a
/// backend's `poll()` or constructor. Consumers may assume only "happens
/// during a poll on the main thread".
pub trait PadObserver {
    fn pad_connected(&mut self, meta: &PadMeta<'_>) {
        let _ = meta;
    }

    fn pad_disconnected(&mut self, port: usize, name: &str) {
        let _ = (port, name);
    }
}

/// Observer that drops every notification.
pub struct NullObserver;

impl PadObserver for NullObserver {}

/// Uniform view of one backend's pads.
///
/// Every query on an out-of-range or unplugged port returns the neutral
/// value (`false`, `0`, `None`); callers never pre-check liveness. `poll()`
/// only drains already-pending events and never blocks. Teardown is `Drop`;
/// re-creating a driver afterwards reproduces the identical initial state.
pub trait JoypadDriver {
    /// Stable short identifier used for driver selection and hotplug routing.
    fn ident(&self) -> &'static str;

    /// Refresh the slot table from pending device and hotplug events.
    fn poll(&mut self, observer: &mut dyn PadObserver);

    fn button(&self, port: usize, key: Joykey) -> bool;

    /// Normalized position of the half-axis `axis` names, in
    /// [-0x7fff, 0x7fff]. The opposite direction reads zero.
    fn axis(&self, port: usize, axis: Joyaxis) -> i16;

    /// Bulk copy of the port's button bitset.
    fn buttons(&self, port: usize) -> ButtonSet;

    fn name(&self, port: usize) -> Option<&str>;

    /// Program one rumble motor. Backends without force feedback inherit
    /// this default and report the capability as absent.
    fn set_rumble(&mut self, port: usize, effect: RumbleEffect, strength: u16) -> bool {
        let _ = (port, effect, strength);
        false
    }

    /// Whether a device currently occupies the port.
    fn query_pad(&self, port: usize) -> bool;
}

/// Idents of every compiled-in backend, in fallback order.
pub const DRIVER_IDENTS: [&str; 4] = ["udev", "linuxraw", "sdl", "parport"];

fn init_one(ident: &str, observer: &mut dyn PadObserver) -> Result<Box<dyn JoypadDriver>, PadError> {
    match ident {
        "udev" => Ok(Box::new(UdevJoypad::new(observer)?)),
        "linuxraw" => Ok(Box::new(LinuxrawJoypad::new(observer)?)),
        "sdl" => Ok(Box::new(SdlJoypad::new(observer)?)),
        "parport" => Ok(Box::new(ParportJoypad::new(observer)?)),
        other => Err(PadError::UnknownDriver(other.to_string())),
    }
}

/// Initialize the requested backend, falling back through the remaining
/// ones if it cannot come up. Only a total wipeout is an error.
pub fn init_joypad(
    ident: &str,
    observer: &mut dyn PadObserver,
) -> Result<Box<dyn JoypadDriver>, PadError> {
    match init_one(ident, observer) {
        Ok(driver) => {
            info!("joypad driver \"{}\" initialized", driver.ident());
            return Ok(driver);
        }
        Err(err) => warn!("joypad driver \"{ident}\" failed to initialize: {err}"),
    }

    for fallback in DRIVER_IDENTS.iter().filter(|d| **d != ident) {
        match init_one(fallback, observer) {
            Ok(driver) => {
                info!("falling back to joypad driver \"{}\"", driver.ident());
                return Ok(driver);
            }
            Err(err) => warn!("joypad driver \"{fallback}\" failed to initialize: {err}"),
        }
    }

    Err(PadError::NoDriver(DRIVER_IDENTS.join(", ")))
}
