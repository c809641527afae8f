// Event-bus joypad backend: udev enumeration and hotplug, evdev devices

pub mod keymap;
pub mod monitor;

use std::os::unix::fs::MetadataExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use evdev::{EventSummary, FFEffect, FFEffectCode, FFEffectData, FFEffectKind, FFReplay, FFTrigger};
use tracing::{debug, info, warn};

use crate::driver::{JoypadDriver, PadMeta, PadObserver, RumbleEffect};
use crate::drivers::{plan_rumble, EffectSlot};
use crate::error::PadError;
use crate::pad::{
    axis_select, ButtonSet, Joyaxis, Joykey, MAX_PADS, NUM_AXES, NUM_BUTTONS, NUM_HATS,
};
use keymap::{
    hat_pressed, is_hat_code, normalize_axis, AxisMap, AxisSpec, KeycodeMap, ABS_HAT0X, ABS_MISC,
};
use monitor::{PadEvent, PadMonitor};

const DRIVER_IDENT: &str = "udev";

struct UdevPad {
    dev: evdev::Device,
    /// Stable OS device number; hotplug adds are de-duplicated against this,
    /// never against the path (paths are reused).
    devnum: u64,
    path: PathBuf,
    ident: String,
    #[allow(dead_code)] // kept for autoconfig matching on reconnect
    vendor_id: u16,
    #[allow(dead_code)]
    product_id: u16,
    buttons: ButtonSet,
    axes: [i16; NUM_AXES],
    hats: [(i32, i32); NUM_HATS],
    keymap: KeycodeMap,
    absmap: AxisMap,
    rumble: [EffectSlot<FFEffect>; 2],
    strength: [u16; 2],
    configured: [u16; 2],
}

impl UdevPad {
    fn drain_events(&mut self) {
        let Ok(events) = self.dev.fetch_events() else {
            return;
        };
        for event in events {
            match event.destructure() {
                EventSummary::Key(_, key, value) => {
                    if let Some(idx) = self.keymap.get(key.0) {
                        self.buttons.set(idx as usize, value != 0);
                    }
                }
                EventSummary::AbsoluteAxis(_, axis, value) => {
                    let code = axis.0;
                    if is_hat_code(code) {
                        let rel = (code - ABS_HAT0X) as usize;
                        if rel / 2 < NUM_HATS {
                            let pair = &mut self.hats[rel / 2];
                            if rel % 2 == 0 {
                                pair.0 = value;
                            } else {
                                pair.1 = value;
                            }
                        }
                    } else if let Some((slot, spec)) = self.absmap.get(code) {
                        if (slot as usize) < NUM_AXES {
                            self.axes[slot as usize] = normalize_axis(&spec, value);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn set_rumble(&mut self, effect: RumbleEffect, strength: u16) -> bool {
        let e = effect.index();
        if self.rumble[e].is_unsupported() {
            return false;
        }
        let Some(plan) = plan_rumble(self.strength[e], self.configured[e], strength) else {
            return true;
        };
        if plan.upload {
            let data = rumble_data(effect, strength);
            let uploaded = match &mut self.rumble[e] {
                EffectSlot::Created(fx) => fx.update(data).is_ok(),
                slot => match self.dev.upload_ff_effect(data) {
                    Ok(fx) => {
                        *slot = EffectSlot::Created(fx);
                        true
                    }
                    Err(err) => {
                        warn!("udev: effect upload failed for {}: {err}", self.ident);
                        false
                    }
                },
            };
            if !uploaded {
                self.rumble[e] = EffectSlot::Unsupported;
                return false;
            }
            self.configured[e] = strength;
        }
        self.strength[e] = strength;
        if let Some(play) = plan.toggle {
            if let EffectSlot::Created(fx) = &mut self.rumble[e] {
                let result = if play { fx.play(1) } else { fx.stop() };
                if let Err(err) = result {
                    debug!("udev: rumble toggle failed for {}: {err}", self.ident);
                }
            }
        }
        true
    }
}

fn rumble_data(effect: RumbleEffect, strength: u16) -> FFEffectData {
    let (strong, weak) = match effect {
        RumbleEffect::Strong => (strength, 0),
        RumbleEffect::Weak => (0, strength),
    };
    FFEffectData {
        direction: 0,
        trigger: FFTrigger {
            button: 0,
            interval: 0,
        },
        replay: FFReplay {
            length: 0,
            delay: 0,
        },
        kind: FFEffectKind::Rumble {
            strong_magnitude: strong,
            weak_magnitude: weak,
        },
    }
}

/// Event-bus backend. Owns up to [`MAX_PADS`] evdev devices plus one udev
/// monitor socket, all drained through a single zero-timeout readiness
/// check per frame.
pub struct UdevJoypad {
    slots: [Option<UdevPad>; MAX_PADS],
    monitor: Option<PadMonitor>,
}

impl UdevJoypad {
    pub fn new(observer: &mut dyn PadObserver) -> Result<Self, PadError> {
        let monitor = match PadMonitor::new() {
            Ok(monitor) => Some(monitor),
            Err(err) => {
                warn!("udev: hotplug monitor unavailable, device set is fixed at startup: {err}");
                None
            }
        };
        let mut joypad = UdevJoypad {
            slots: std::array::from_fn(|_| None),
            monitor,
        };
        joypad.enumerate(observer)?;
        Ok(joypad)
    }

    fn enumerate(&mut self, observer: &mut dyn PadObserver) -> Result<(), PadError> {
        let mut enumerator = udev::Enumerator::new()?;
        enumerator.match_subsystem("input")?;
        enumerator.match_property("ID_INPUT_JOYSTICK", "1")?;
        for device in enumerator.scan_devices()? {
            let Some(node) = device.devnode() else {
                continue;
            };
            if node.to_string_lossy().contains("/dev/input/event") {
                self.add_pad(node, observer);
            }
        }
        Ok(())
    }

    fn add_pad(&mut self, path: &Path, observer: &mut dyn PadObserver) {
        let devnum = match std::fs::metadata(path) {
            Ok(meta) => meta.rdev(),
            Err(err) => {
                debug!("udev: cannot stat {}: {err}", path.display());
                return;
            }
        };
        if self.slots.iter().flatten().any(|pad| pad.devnum == devnum) {
            debug!("udev: {} is already plugged, ignoring add", path.display());
            return;
        }

        // Permission changes from udev rules can lag the add event; failing
        // here just means we retry on the next hotplug signal.
        let dev = match evdev::Device::open(path) {
            Ok(dev) => dev,
            Err(err) => {
                debug!("udev: failed to open {}: {err}", path.display());
                return;
            }
        };
        if let Err(err) = dev.set_nonblocking(true) {
            warn!("udev: cannot set {} non-blocking: {err}", path.display());
            return;
        }

        let Some(port) = self.slots.iter().position(Option::is_none) else {
            warn!("udev: no free pad slot for {}", path.display());
            return;
        };

        let keymap = KeycodeMap::build(
            dev.supported_keys()
                .into_iter()
                .flat_map(|keys| keys.iter().map(|key| key.0)),
            NUM_BUTTONS,
        );

        let mut absmap = AxisMap::default();
        let mut axes = [0i16; NUM_AXES];
        if let (Some(abs_axes), Ok(abs_state)) = (dev.supported_absolute_axes(), dev.get_abs_state())
        {
            for code in abs_axes.iter().map(|axis| axis.0) {
                if is_hat_code(code) || code >= ABS_MISC || absmap.len() >= NUM_AXES {
                    continue;
                }
                if let Some(info) = abs_state.get(code as usize) {
                    let spec = AxisSpec::new(code, info.minimum, info.maximum);
                    absmap.insert(code, spec);
                    if let Some((slot, spec)) = absmap.get(code) {
                        axes[slot as usize] = normalize_axis(&spec, info.value);
                    }
                }
            }
        }

        let has_rumble = dev
            .supported_ff()
            .is_some_and(|ff| ff.contains(FFEffectCode::FF_RUMBLE));
        let rumble = if has_rumble {
            [EffectSlot::Off, EffectSlot::Off]
        } else {
            [EffectSlot::Unsupported, EffectSlot::Unsupported]
        };

        let id = dev.input_id();
        let (vendor_id, product_id) = (id.vendor(), id.product());
        let ident = dev.name().unwrap_or("Unknown pad").to_string();

        info!(
            "udev: {} ({:04x}:{:04x}) connected on port {port}, {} buttons, {} axes",
            ident,
            vendor_id,
            product_id,
            keymap.len(),
            absmap.len()
        );
        observer.pad_connected(&PadMeta {
            port,
            name: &ident,
            driver: DRIVER_IDENT,
            vendor_id,
            product_id,
        });

        self.slots[port] = Some(UdevPad {
            dev,
            devnum,
            path: path.to_path_buf(),
            ident,
            vendor_id,
            product_id,
            buttons: ButtonSet::default(),
            axes,
            hats: [(0, 0); NUM_HATS],
            keymap,
            absmap,
            rumble,
            strength: [0; 2],
            configured: [0; 2],
        });
    }

    fn remove_pad(&mut self, path: &str, observer: &mut dyn PadObserver) {
        let path = Path::new(path);
        for (port, slot) in self.slots.iter_mut().enumerate() {
            let matches = slot.as_ref().is_some_and(|pad| pad.path == path);
            if matches {
                let ident = slot.as_ref().map(|pad| pad.ident.clone()).unwrap_or_default();
                info!("udev: {ident} removed from port {port}");
                observer.pad_disconnected(port, &ident);
                *slot = None;
            }
        }
    }
}

impl JoypadDriver for UdevJoypad {
    fn ident(&self) -> &'static str {
        DRIVER_IDENT
    }

    fn poll(&mut self, observer: &mut dyn PadObserver) {
        // One readiness check covers the hotplug socket and every device.
        let mut fds: Vec<libc::pollfd> = Vec::with_capacity(MAX_PADS + 1);
        let mut ports: Vec<Option<usize>> = Vec::with_capacity(MAX_PADS + 1);
        if let Some(monitor) = &self.monitor {
            fds.push(libc::pollfd {
                fd: monitor.fd(),
                events: libc::POLLIN,
                revents: 0,
            });
            ports.push(None);
        }
        for (port, slot) in self.slots.iter().enumerate() {
            if let Some(pad) = slot {
                fds.push(libc::pollfd {
                    fd: pad.dev.as_raw_fd(),
                    events: libc::POLLIN,
                    revents: 0,
                });
                ports.push(Some(port));
            }
        }
        if fds.is_empty() {
            return;
        }
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, 0) };
        if ready <= 0 {
            return;
        }

        let mut hotplug = Vec::new();
        let mut ready_ports = Vec::new();
        for (pollfd, port) in fds.iter().zip(&ports) {
            if pollfd.revents & libc::POLLIN == 0 {
                continue;
            }
            match port {
                None => {
                    if let Some(monitor) = &mut self.monitor {
                        hotplug = monitor.drain();
                    }
                }
                Some(port) => ready_ports.push(*port),
            }
        }

        for event in hotplug {
            match event {
                PadEvent::Added(path) => self.add_pad(Path::new(&path), observer),
                PadEvent::Removed(path) => self.remove_pad(&path, observer),
            }
        }
        for port in ready_ports {
            if let Some(pad) = self.slots[port].as_mut() {
                pad.drain_events();
            }
        }
    }

    fn button(&self, port: usize, key: Joykey) -> bool {
        let Some(pad) = self.slots.get(port).and_then(Option::as_ref) else {
            return false;
        };
        match key {
            Joykey::Button(button) => pad.buttons.pressed(button as usize),
            Joykey::Hat { hat, dir } => hat_pressed(&pad.hats, hat, dir),
            Joykey::None => false,
        }
    }

    fn axis(&self, port: usize, axis: Joyaxis) -> i16 {
        match self.slots.get(port).and_then(Option::as_ref) {
            Some(pad) => axis_select(&pad.axes, axis),
            None => 0,
        }
    }

    fn buttons(&self, port: usize) -> ButtonSet {
        self.slots
            .get(port)
            .and_then(Option::as_ref)
            .map(|pad| pad.buttons)
            .unwrap_or_default()
    }

    fn name(&self, port: usize) -> Option<&str> {
        self.slots
            .get(port)
            .and_then(Option::as_ref)
            .map(|pad| pad.ident.as_str())
    }

    fn set_rumble(&mut self, port: usize, effect: RumbleEffect, strength: u16) -> bool {
        match self.slots.get_mut(port).and_then(Option::as_mut) {
            Some(pad) => pad.set_rumble(effect, strength),
            None => false,
        }
    }

    fn query_pad(&self, port: usize) -> bool {
        self.slots.get(port).is_some_and(Option::is_some)
    }
}
