//! Joypad subsystem for an emulator frontend.
//!
//! Every physical controller on the host shows up as one uniform logical
//! device behind the [`JoypadDriver`] trait, regardless of which of the
//! four hardware-access models it arrived through: raw numbered joystick
//! nodes, udev-mediated event devices, parallel-port pin rigs, or pads
//! wrapped by SDL2. User binds are resolved against that interface by the
//! stateless functions in [`binds`].
//!
//! Everything is single-threaded and poll-driven: the frontend calls
//! [`JoypadDriver::poll`] once per frame, each backend drains whatever is
//! pending without blocking, and connect/disconnect callbacks fire inline
//! from that call.

pub mod autoconf;
pub mod binds;
pub mod config;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod pad;

pub use autoconf::{PadProfile, ProfileStore};
pub use binds::{analog_value, is_pressed, Action, AxisComponent, Bind, BindSet, Stick, NUM_BINDS};
pub use config::{load_settings, save_settings, PadSettings};
pub use driver::{
    init_joypad, JoypadDriver, NullObserver, PadMeta, PadObserver, RumbleEffect, DRIVER_IDENTS,
};
pub use error::PadError;
pub use pad::{
    ButtonSet, HatDirection, Joyaxis, Joykey, AXIS_RANGE, MAX_PADS, NUM_AXES, NUM_BUTTONS, NUM_HATS,
};
