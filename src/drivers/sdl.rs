// SDL2-wrapped backend: enumeration, polling and raw access delegated to
// the bundled library, with a capability shim over its two generations

use sdl2::controller::{Axis, Button, GameController};
use sdl2::event::Event;
use sdl2::haptic::Haptic;
use sdl2::joystick::{HatState, Joystick};
use tracing::{debug, info, warn};

use crate::driver::{JoypadDriver, PadMeta, PadObserver, RumbleEffect};
use crate::drivers::EffectSlot;
use crate::error::PadError;
use crate::pad::{axis_half, ButtonSet, HatDirection, Joyaxis, Joykey, MAX_PADS, NUM_BUTTONS};

const DRIVER_IDENT: &str = "sdl";

/// The unified controller generation claims the full standard button set;
/// unbound controls read neutral from the library, so no per-pad gating.
const CONTROLLER_BUTTONS: u16 = 21;

/// SDL keeps a rumble playing only this long; every strength change
/// re-issues playback anyway.
const RUMBLE_DURATION_MS: u32 = 5000;

const USB_BUS: u16 = 0x03;
const BLUETOOTH_BUS: u16 = 0x05;

/// Faux entries some platforms expose alongside the real pad.
const FAUX_DEVICE_NAMES: [&str; 2] = ["accelerometer", "motion sensors"];

fn is_faux_device(name: &str) -> bool {
    let name = name.to_lowercase();
    FAUX_DEVICE_NAMES.iter().any(|faux| name.contains(faux))
}

/// Vendor/product ids live at fixed offsets in the opaque GUID blob, but
/// only for bus types that carry them.
fn guid_vendor_product(guid: &[u8; 16]) -> Option<(u16, u16)> {
    let bus = u16::from_le_bytes([guid[0], guid[1]]);
    if bus != USB_BUS && bus != BLUETOOTH_BUS {
        return None;
    }
    let vendor = u16::from_le_bytes([guid[4], guid[5]]);
    let product = u16::from_le_bytes([guid[8], guid[9]]);
    if vendor == 0 && product == 0 {
        None
    } else {
        Some((vendor, product))
    }
}

fn hat_state_has(state: HatState, dir: HatDirection) -> bool {
    match dir {
        HatDirection::Up => matches!(state, HatState::Up | HatState::RightUp | HatState::LeftUp),
        HatDirection::Down => {
            matches!(state, HatState::Down | HatState::RightDown | HatState::LeftDown)
        }
        HatDirection::Left => {
            matches!(state, HatState::Left | HatState::LeftUp | HatState::LeftDown)
        }
        HatDirection::Right => {
            matches!(state, HatState::Right | HatState::RightUp | HatState::RightDown)
        }
    }
}

struct SdlPad {
    joy: Joystick,
    /// Present when the library recognizes a controller mapping; queries
    /// then go through the unified generation.
    ctl: Option<GameController>,
    instance_id: u32,
    ident: String,
    num_buttons: u16,
    rumble: EffectSlot<Haptic>,
    strength: [u16; 2],
}

/// Library-wrapped backend.
pub struct SdlJoypad {
    _sdl: sdl2::Sdl,
    joystick: sdl2::JoystickSubsystem,
    controller: sdl2::GameControllerSubsystem,
    haptic: sdl2::HapticSubsystem,
    pump: sdl2::EventPump,
    slots: [Option<SdlPad>; MAX_PADS],
}

impl SdlJoypad {
    pub fn new(observer: &mut dyn PadObserver) -> Result<Self, PadError> {
        let sdl = sdl2::init().map_err(PadError::Sdl)?;
        let joystick = sdl.joystick().map_err(PadError::Sdl)?;
        let controller = sdl.game_controller().map_err(PadError::Sdl)?;
        let haptic = sdl.haptic().map_err(PadError::Sdl)?;
        let pump = sdl.event_pump().map_err(PadError::Sdl)?;

        let mut joypad = SdlJoypad {
            _sdl: sdl,
            joystick,
            controller,
            haptic,
            pump,
            slots: std::array::from_fn(|_| None),
        };
        let count = joypad.joystick.num_joysticks().map_err(PadError::Sdl)?;
        for index in 0..count {
            joypad.add_pad(index, observer);
        }
        Ok(joypad)
    }

    fn add_pad(&mut self, device_index: u32, observer: &mut dyn PadObserver) {
        let name = self
            .joystick
            .name_for_index(device_index)
            .unwrap_or_else(|_| String::from("Unknown pad"));
        if is_faux_device(&name) {
            debug!("sdl: skipping faux device \"{name}\"");
            return;
        }
        let joy = match self.joystick.open(device_index) {
            Ok(joy) => joy,
            Err(err) => {
                debug!("sdl: failed to open device {device_index}: {err}");
                return;
            }
        };
        let instance_id = joy.instance_id();
        // startup enumeration and the queued device-added event both
        // describe the same pad
        if self.slots.iter().flatten().any(|pad| pad.instance_id == instance_id) {
            return;
        }
        let Some(port) = self.slots.iter().position(Option::is_none) else {
            warn!("sdl: no free pad slot for \"{name}\"");
            return;
        };

        let ctl = if self.controller.is_game_controller(device_index) {
            self.controller.open(device_index).ok()
        } else {
            None
        };
        let num_buttons = if ctl.is_some() {
            CONTROLLER_BUTTONS
        } else {
            (joy.num_buttons() as u16).min(NUM_BUTTONS as u16)
        };
        let ident = ctl
            .as_ref()
            .map(|ctl| ctl.name())
            .filter(|name| !name.is_empty())
            .unwrap_or(name);
        let (vendor_id, product_id) =
            guid_vendor_product(&joy.guid().raw().data).unwrap_or((0, 0));

        // generic haptic path first; native rumble is the fallback tier
        let rumble = match self.haptic.open_from_joystick_id(device_index) {
            Ok(haptic) => EffectSlot::Created(haptic),
            Err(err) => {
                debug!("sdl: no haptic device for \"{ident}\", using native rumble: {err}");
                EffectSlot::Fallback
            }
        };

        info!(
            "sdl: {ident} ({:04x}:{:04x}) connected on port {port} ({} mode)",
            vendor_id,
            product_id,
            if ctl.is_some() { "controller" } else { "joystick" }
        );
        observer.pad_connected(&PadMeta {
            port,
            name: &ident,
            driver: DRIVER_IDENT,
            vendor_id,
            product_id,
        });

        self.slots[port] = Some(SdlPad {
            joy,
            ctl,
            instance_id,
            ident,
            num_buttons,
            rumble,
            strength: [0; 2],
        });
    }

    fn remove_pad(&mut self, instance_id: u32, observer: &mut dyn PadObserver) {
        for (port, slot) in self.slots.iter_mut().enumerate() {
            let matches = slot
                .as_ref()
                .is_some_and(|pad| pad.instance_id == instance_id);
            if matches {
                let ident = slot.as_ref().map(|pad| pad.ident.clone()).unwrap_or_default();
                info!("sdl: {ident} removed from port {port}");
                observer.pad_disconnected(port, &ident);
                *slot = None;
            }
        }
    }
}

impl JoypadDriver for SdlJoypad {
    fn ident(&self) -> &'static str {
        DRIVER_IDENT
    }

    fn poll(&mut self, observer: &mut dyn PadObserver) {
        let events: Vec<Event> = self.pump.poll_iter().collect();
        for event in events {
            match event {
                Event::JoyDeviceAdded { which, .. } => self.add_pad(which, observer),
                Event::JoyDeviceRemoved { which, .. } => self.remove_pad(which, observer),
                _ => {}
            }
        }
    }

    fn button(&self, port: usize, key: Joykey) -> bool {
        let Some(pad) = self.slots.get(port).and_then(Option::as_ref) else {
            return false;
        };
        match key {
            Joykey::Button(button) => match &pad.ctl {
                Some(ctl) => Button::from_ll(button as i32)
                    .map(|button| ctl.button(button))
                    .unwrap_or(false),
                None => {
                    button < pad.num_buttons && pad.joy.button(button as u32).unwrap_or(false)
                }
            },
            Joykey::Hat { hat, dir } => pad
                .joy
                .hat(hat as u32)
                .map(|state| hat_state_has(state, dir))
                .unwrap_or(false),
            Joykey::None => false,
        }
    }

    fn axis(&self, port: usize, axis: Joyaxis) -> i16 {
        let Some(pad) = self.slots.get(port).and_then(Option::as_ref) else {
            return 0;
        };
        let index = match axis {
            Joyaxis::Neg(a) | Joyaxis::Pos(a) => a,
            Joyaxis::None => return 0,
        };
        let value = match &pad.ctl {
            Some(ctl) => Axis::from_ll(index as i32)
                .map(|axis| ctl.axis(axis))
                .unwrap_or(0),
            None => pad.joy.axis(index as u32).unwrap_or(0),
        };
        axis_half(value, axis)
    }

    fn buttons(&self, port: usize) -> ButtonSet {
        let Some(pad) = self.slots.get(port).and_then(Option::as_ref) else {
            return ButtonSet::default();
        };
        let mut set = ButtonSet::default();
        for button in 0..pad.num_buttons {
            set.set(button as usize, self.button(port, Joykey::Button(button)));
        }
        set
    }

    fn name(&self, port: usize) -> Option<&str> {
        self.slots
            .get(port)
            .and_then(Option::as_ref)
            .map(|pad| pad.ident.as_str())
    }

    fn set_rumble(&mut self, port: usize, effect: RumbleEffect, strength: u16) -> bool {
        let Some(pad) = self.slots.get_mut(port).and_then(Option::as_mut) else {
            return false;
        };
        let e = effect.index();
        if pad.strength[e] == strength {
            return true;
        }
        pad.strength[e] = strength;
        let (strong, weak) = (pad.strength[0], pad.strength[1]);
        match &mut pad.rumble {
            EffectSlot::Created(haptic) => {
                if strong == 0 && weak == 0 {
                    let _ = haptic.rumble_stop();
                } else {
                    let magnitude = f32::from(strong.max(weak)) / f32::from(u16::MAX);
                    let _ = haptic.rumble_play(magnitude, RUMBLE_DURATION_MS);
                }
                true
            }
            EffectSlot::Fallback => match pad.joy.set_rumble(strong, weak, RUMBLE_DURATION_MS) {
                Ok(()) => true,
                Err(err) => {
                    debug!("sdl: native rumble failed for {}: {err}", pad.ident);
                    pad.rumble = EffectSlot::Unsupported;
                    false
                }
            },
            _ => false,
        }
    }

    fn query_pad(&self, port: usize) -> bool {
        self.slots.get(port).is_some_and(Option::is_some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb_guid(vendor: u16, product: u16) -> [u8; 16] {
        let mut guid = [0u8; 16];
        guid[0] = USB_BUS as u8;
        guid[4..6].copy_from_slice(&vendor.to_le_bytes());
        guid[8..10].copy_from_slice(&product.to_le_bytes());
        guid
    }

    #[test]
    fn usb_guid_yields_vendor_and_product() {
        assert_eq!(guid_vendor_product(&usb_guid(0x045e, 0x028e)), Some((0x045e, 0x028e)));
    }

    #[test]
    fn bluetooth_guid_yields_vendor_and_product() {
        let mut guid = usb_guid(0x054c, 0x09cc);
        guid[0] = BLUETOOTH_BUS as u8;
        assert_eq!(guid_vendor_product(&guid), Some((0x054c, 0x09cc)));
    }

    #[test]
    fn virtual_bus_guid_carries_no_ids() {
        let mut guid = usb_guid(0x045e, 0x028e);
        guid[0] = 0xff;
        assert_eq!(guid_vendor_product(&guid), None);
        assert_eq!(guid_vendor_product(&usb_guid(0, 0)), None);
    }

    #[test]
    fn faux_devices_are_denied_case_insensitively() {
        assert!(is_faux_device("Sony Interactive Entertainment Wireless Controller Motion Sensors"));
        assert!(is_faux_device("HTC Vive accelerometer"));
        assert!(!is_faux_device("Xbox Wireless Controller"));
    }

    #[test]
    fn hat_states_decompose_into_directions() {
        assert!(hat_state_has(HatState::LeftUp, HatDirection::Left));
        assert!(hat_state_has(HatState::LeftUp, HatDirection::Up));
        assert!(!hat_state_has(HatState::LeftUp, HatDirection::Down));
        assert!(!hat_state_has(HatState::Centered, HatDirection::Left));
        assert!(hat_state_has(HatState::Right, HatDirection::Right));
    }
}
