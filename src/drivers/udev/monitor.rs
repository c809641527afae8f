// Pad hotplug monitoring via udev

use std::os::unix::io::AsRawFd;

/// Arrival/removal of an event-device node.
#[derive(Debug, Clone)]
pub enum PadEvent {
    Added(String),
    Removed(String),
}

/// Non-blocking netlink monitor for input-subsystem hotplug events.
pub struct PadMonitor {
    socket: udev::MonitorSocket,
}

impl PadMonitor {
    pub fn new() -> Result<Self, std::io::Error> {
        let socket = udev::MonitorBuilder::new()?
            .match_subsystem("input")?
            .listen()?;

        // Set non-blocking mode using libc
        unsafe {
            let fd = socket.as_raw_fd();
            let flags = libc::fcntl(fd, libc::F_GETFL);
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }

        Ok(Self { socket })
    }

    pub fn fd(&self) -> i32 {
        self.socket.as_raw_fd()
    }

    /// Drain every event queued since the last poll.
    ///
    /// Adds are filtered to joystick-capable event nodes; removals pass
    /// through unfiltered because a vanished device no longer reports its
    /// properties.
    pub fn drain(&mut self) -> Vec<PadEvent> {
        let mut events = Vec::new();

        for event in self.socket.iter() {
            let Some(devnode) = event.devnode() else {
                continue;
            };
            let path = devnode.to_string_lossy().to_string();
            if !path.contains("/dev/input/event") {
                continue;
            }
            match event.event_type() {
                udev::EventType::Add => {
                    if event.property_value("ID_INPUT_JOYSTICK").is_some() {
                        events.push(PadEvent::Added(path));
                    }
                }
                udev::EventType::Remove => {
                    events.push(PadEvent::Removed(path));
                }
                _ => {}
            }
        }

        events
    }
}
