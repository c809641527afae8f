// Raw joystick-node backend: numbered /dev/input/jsN character devices

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::os::fd::{FromRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use tracing::{debug, info, warn};

use crate::driver::{JoypadDriver, PadMeta, PadObserver};
use crate::error::PadError;
use crate::pad::{axis_select, ButtonSet, Joyaxis, Joykey, MAX_PADS, NUM_AXES};

const DRIVER_IDENT: &str = "linuxraw";

const JS_EVENT_BUTTON: u8 = 0x01;
const JS_EVENT_AXIS: u8 = 0x02;
const JS_EVENT_INIT: u8 = 0x80;

/// Every record on the wire is exactly this long; unknown sub-types are
/// discarded whole so stream framing survives them.
const JS_EVENT_SIZE: usize = 8;

#[derive(Debug, Clone, Copy)]
struct JsEvent {
    value: i16,
    kind: u8,
    number: u8,
}

fn parse_event(buf: &[u8; JS_EVENT_SIZE]) -> JsEvent {
    JsEvent {
        value: i16::from_le_bytes([buf[4], buf[5]]),
        kind: buf[6],
        number: buf[7],
    }
}

/// Port number encoded in a device node name ("js3" -> 3).
fn js_node_port(name: &str) -> Option<usize> {
    name.strip_prefix("js")?.parse().ok()
}

const fn jsiocgname(len: usize) -> libc::c_ulong {
    // _IOC(_IOC_READ, 'j', 0x13, len)
    ((2u64 << 30) | ((len as u64) << 16) | (0x6a << 8) | 0x13) as libc::c_ulong
}

fn js_device_name(file: &File) -> Option<String> {
    let mut buf = [0u8; 128];
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), jsiocgname(buf.len()), buf.as_mut_ptr()) };
    if ret < 0 {
        return None;
    }
    let end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
    if end == 0 {
        return None;
    }
    Some(String::from_utf8_lossy(&buf[..end]).to_string())
}

#[derive(Default)]
struct RawPad {
    file: Option<File>,
    ident: String,
    buttons: ButtonSet,
    axes: [i16; NUM_AXES],
}

impl RawPad {
    fn apply(&mut self, event: &JsEvent) {
        match event.kind & !JS_EVENT_INIT {
            JS_EVENT_BUTTON => self.buttons.set(event.number as usize, event.value != 0),
            JS_EVENT_AXIS => {
                if (event.number as usize) < NUM_AXES {
                    self.axes[event.number as usize] = event.value;
                }
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        *self = RawPad::default();
    }
}

/// Non-blocking inotify watch on the device directory.
struct DirWatch {
    fd: OwnedFd,
}

impl DirWatch {
    fn new(dir: &std::ffi::CStr) -> std::io::Result<Self> {
        let fd = unsafe { libc::inotify_init1(libc::IN_NONBLOCK | libc::IN_CLOEXEC) };
        if fd < 0 {
            return Err(std::io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        let wd = unsafe {
            libc::inotify_add_watch(
                fd.as_raw_fd(),
                dir.as_ptr(),
                libc::IN_CREATE | libc::IN_DELETE | libc::IN_ATTRIB,
            )
        };
        if wd < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(DirWatch { fd })
    }

    /// Drain pending (mask, node name) pairs without blocking.
    fn drain(&mut self) -> Vec<(u32, String)> {
        let mut out = Vec::new();
        let mut buf = [0u8; 2048];
        loop {
            let n = unsafe {
                libc::read(self.fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len())
            };
            if n <= 0 {
                break;
            }
            let n = n as usize;
            let header_len = std::mem::size_of::<libc::inotify_event>();
            let mut offset = 0;
            while offset + header_len <= n {
                let header: libc::inotify_event =
                    unsafe { std::ptr::read_unaligned(buf.as_ptr().add(offset).cast()) };
                let name_off = offset + header_len;
                let name_len = header.len as usize;
                if name_off + name_len > n {
                    break;
                }
                let raw = &buf[name_off..name_off + name_len];
                let name = raw.split(|b| *b == 0).next().unwrap_or(&[]);
                out.push((header.mask, String::from_utf8_lossy(name).to_string()));
                offset = name_off + name_len;
            }
        }
        out
    }
}

/// Raw-device backend. Each slot follows Closed -> open-and-polled, keyed
/// to its numbered device node.
pub struct LinuxrawJoypad {
    slots: [RawPad; MAX_PADS],
    watch: Option<DirWatch>,
}

impl LinuxrawJoypad {
    pub fn new(observer: &mut dyn PadObserver) -> Result<Self, PadError> {
        let watch = match DirWatch::new(c"/dev/input") {
            Ok(watch) => Some(watch),
            Err(err) => {
                warn!("linuxraw: inotify unavailable, device set is fixed at startup: {err}");
                None
            }
        };
        let mut joypad = LinuxrawJoypad {
            slots: Default::default(),
            watch,
        };
        for port in 0..MAX_PADS {
            joypad.try_open(port, observer);
        }
        Ok(joypad)
    }

    fn try_open(&mut self, port: usize, observer: &mut dyn PadObserver) {
        if self.slots[port].file.is_some() {
            return;
        }
        let path = format!("/dev/input/js{port}");
        let file = match OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)
        {
            Ok(file) => file,
            Err(err) => {
                // Permission may lag a fresh node; the next ATTRIB event
                // retries this port.
                if err.kind() != std::io::ErrorKind::NotFound {
                    debug!("linuxraw: cannot open {path} yet: {err}");
                }
                return;
            }
        };
        let ident = js_device_name(&file).unwrap_or_else(|| path.clone());
        self.slots[port].file = Some(file);
        self.slots[port].ident = ident;
        // the kernel queues synthetic init records describing the current
        // state; fold them in before anyone queries
        Self::drain_pad(&mut self.slots[port]);

        info!("linuxraw: {} connected on port {port}", self.slots[port].ident);
        observer.pad_connected(&PadMeta {
            port,
            name: &self.slots[port].ident,
            driver: DRIVER_IDENT,
            vendor_id: 0,
            product_id: 0,
        });
    }

    fn drain_pad(pad: &mut RawPad) {
        let mut buf = [0u8; JS_EVENT_SIZE];
        loop {
            let n = match pad.file.as_mut() {
                Some(file) => match file.read(&mut buf) {
                    Ok(n) => n,
                    Err(_) => break,
                },
                None => break,
            };
            if n != JS_EVENT_SIZE {
                break;
            }
            let event = parse_event(&buf);
            pad.apply(&event);
        }
    }
}

impl JoypadDriver for LinuxrawJoypad {
    fn ident(&self) -> &'static str {
        DRIVER_IDENT
    }

    fn poll(&mut self, observer: &mut dyn PadObserver) {
        let events = self.watch.as_mut().map(DirWatch::drain).unwrap_or_default();
        for (mask, name) in events {
            let Some(port) = js_node_port(&name) else {
                continue;
            };
            if port >= MAX_PADS {
                continue;
            }
            if mask & libc::IN_DELETE != 0 && self.slots[port].file.is_some() {
                let ident = std::mem::take(&mut self.slots[port].ident);
                info!("linuxraw: {ident} removed from port {port}");
                observer.pad_disconnected(port, &ident);
                self.slots[port].reset();
            }
            if mask & (libc::IN_CREATE | libc::IN_ATTRIB) != 0 {
                self.try_open(port, observer);
            }
        }

        for pad in &mut self.slots {
            Self::drain_pad(pad);
        }
    }

    fn button(&self, port: usize, key: Joykey) -> bool {
        let Some(pad) = self.slots.get(port) else {
            return false;
        };
        match key {
            Joykey::Button(button) => pad.buttons.pressed(button as usize),
            // the legacy joystick interface reports hats as plain axes
            _ => false,
        }
    }

    fn axis(&self, port: usize, axis: Joyaxis) -> i16 {
        match self.slots.get(port) {
            Some(pad) => axis_select(&pad.axes, axis),
            None => 0,
        }
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
            .filter(|pad| pad.file.is_some())
            .map(|pad| pad.ident.as_str())
    }

    fn query_pad(&self, port: usize) -> bool {
        self.slots.get(port).is_some_and(|pad| pad.file.is_some())
    }
}
