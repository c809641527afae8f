// Bind resolution: mapping logical pad actions onto whatever the current
// backend reports for a port

use crate::driver::JoypadDriver;
use crate::pad::{Joyaxis, Joykey, AXIS_RANGE};

/// Logical pad actions a user can bind. The first sixteen are digital; the
/// rest are the half-axes of the two analog sticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Action {
    B = 0,
    Y = 1,
    Select = 2,
    Start = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
    A = 8,
    X = 9,
    L = 10,
    R = 11,
    L2 = 12,
    R2 = 13,
    L3 = 14,
    R3 = 15,
    LeftXPlus = 16,
    LeftXMinus = 17,
    LeftYPlus = 18,
    LeftYMinus = 19,
    RightXPlus = 20,
    RightXMinus = 21,
    RightYPlus = 22,
    RightYMinus = 23,
}

pub const NUM_BINDS: usize = 24;

impl Action {
    pub const ALL: [Action; NUM_BINDS] = [
        Action::B,
        Action::Y,
        Action::Select,
        Action::Start,
        Action::Up,
        Action::Down,
        Action::Left,
        Action::Right,
        Action::A,
        Action::X,
        Action::L,
        Action::R,
        Action::L2,
        Action::R2,
        Action::L3,
        Action::R3,
        Action::LeftXPlus,
        Action::LeftXMinus,
        Action::LeftYPlus,
        Action::LeftYMinus,
        Action::RightXPlus,
        Action::RightXMinus,
        Action::RightYPlus,
        Action::RightYMinus,
    ];

    /// Key name used by autoconfig profile records.
    pub fn key(self) -> &'static str {
        match self {
            Action::B => "b",
            Action::Y => "y",
            Action::Select => "select",
            Action::Start => "start",
            Action::Up => "up",
            Action::Down => "down",
            Action::Left => "left",
            Action::Right => "right",
            Action::A => "a",
            Action::X => "x",
            Action::L => "l",
            Action::R => "r",
            Action::L2 => "l2",
            Action::R2 => "r2",
            Action::L3 => "l3",
            Action::R3 => "r3",
            Action::LeftXPlus => "left_x_plus",
            Action::LeftXMinus => "left_x_minus",
            Action::LeftYPlus => "left_y_plus",
            Action::LeftYMinus => "left_y_minus",
            Action::RightXPlus => "right_x_plus",
            Action::RightXMinus => "right_x_minus",
            Action::RightYPlus => "right_y_plus",
            Action::RightYMinus => "right_y_minus",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Action::ALL.iter().copied().find(|a| a.key() == key)
    }
}

/// One of the two analog sticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stick {
    Left,
    Right,
}

/// Axis of a stick as seen by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisComponent {
    X,
    Y,
}

fn stick_pair(stick: Stick, comp: AxisComponent) -> (Action, Action) {
    match (stick, comp) {
        (Stick::Left, AxisComponent::X) => (Action::LeftXMinus, Action::LeftXPlus),
        (Stick::Left, AxisComponent::Y) => (Action::LeftYMinus, Action::LeftYPlus),
        (Stick::Right, AxisComponent::X) => (Action::RightXMinus, Action::RightXPlus),
        (Stick::Right, AxisComponent::Y) => (Action::RightYMinus, Action::RightYPlus),
    }
}

/// A user's mapping for one action. `saved_axis` backs the analog-d-pad
/// overlay and is not part of the persisted record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bind {
    pub key: Joykey,
    pub axis: Joyaxis,
    pub label: Option<String>,
    saved_axis: Joyaxis,
}

impl Bind {
    pub fn new(key: Joykey, axis: Joyaxis, label: Option<String>) -> Self {
        Bind {
            key,
            axis,
            label,
            saved_axis: Joyaxis::None,
        }
    }

    pub fn button(button: u16) -> Self {
        Bind {
            key: Joykey::Button(button),
            ..Default::default()
        }
    }

    pub fn axis(axis: Joyaxis) -> Self {
        Bind {
            axis,
            ..Default::default()
        }
    }
}

/// All of one port's binds, indexed by [`Action`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindSet {
    binds: [Bind; NUM_BINDS],
}

impl BindSet {
    pub fn get(&self, action: Action) -> &Bind {
        &self.binds[action as usize]
    }

    pub fn get_mut(&mut self, action: Action) -> &mut Bind {
        &mut self.binds[action as usize]
    }

    pub fn set(&mut self, action: Action, bind: Bind) {
        self.binds[action as usize] = bind;
    }

    /// Overlay the four directional binds with the selected stick's
    /// half-axis components so menus can navigate on an analog stick.
    ///
    /// Each push snapshots the directional binds as they are *right now*;
    /// a second push before a pop therefore replaces the snapshot, and the
    /// following pop restores only to the state between the two pushes.
    /// Existing bind workflows rely on exactly this, so it stays.
    pub fn push_analog_dpad(&mut self, stick: Stick) {
        for dir in [Action::Up, Action::Down, Action::Left, Action::Right] {
            let bind = &mut self.binds[dir as usize];
            bind.saved_axis = bind.axis;
        }
        let (x_minus, x_plus, y_minus, y_plus) = match stick {
            Stick::Left => (
                Action::LeftXMinus,
                Action::LeftXPlus,
                Action::LeftYMinus,
                Action::LeftYPlus,
            ),
            Stick::Right => (
                Action::RightXMinus,
                Action::RightXPlus,
                Action::RightYMinus,
                Action::RightYPlus,
            ),
        };
        self.binds[Action::Up as usize].axis = self.binds[y_minus as usize].axis;
        self.binds[Action::Down as usize].axis = self.binds[y_plus as usize].axis;
        self.binds[Action::Left as usize].axis = self.binds[x_minus as usize].axis;
        self.binds[Action::Right as usize].axis = self.binds[x_plus as usize].axis;
    }

    /// Restore the directional axis binds captured by the last push.
    pub fn pop_analog_dpad(&mut self) {
        for dir in [Action::Up, Action::Down, Action::Left, Action::Right] {
            let bind = &mut self.binds[dir as usize];
            bind.axis = bind.saved_axis;
        }
    }
}

fn resolve_key(binds: &BindSet, auto: &BindSet, action: Action) -> Joykey {
    match binds.get(action).key {
        Joykey::None => auto.get(action).key,
        key => key,
    }
}

fn resolve_axis(binds: &BindSet, auto: &BindSet, action: Action) -> Joyaxis {
    match binds.get(action).axis {
        Joyaxis::None => auto.get(action).axis,
        axis => axis,
    }
}

/// Whether `action` currently reads as pressed on `port`.
///
/// The explicit bind wins when set, even if the pad reports it unpressed;
/// the port's autoconfigured default is only consulted for unset binds.
/// A resolved axis also counts as pressed once its magnitude exceeds
/// `axis_threshold` (a fraction of full scale).
pub fn is_pressed(
    pad: &dyn JoypadDriver,
    port: usize,
    binds: &BindSet,
    auto: &BindSet,
    action: Action,
    axis_threshold: f32,
) -> bool {
    if pad.button(port, resolve_key(binds, auto, action)) {
        return true;
    }
    let axis = resolve_axis(binds, auto, action);
    let value = pad.axis(port, axis);
    (value.unsigned_abs() as f32) / (AXIS_RANGE as f32) > axis_threshold
}

/// Position of one stick axis on `port`, in [-0x7fff, 0x7fff].
///
/// Resolves the minus/plus half-axis pair and returns plus magnitude minus
/// minus magnitude. When both halves are neutral the digital pair takes
/// over, contributing full scale in its direction.
pub fn analog_value(
    pad: &dyn JoypadDriver,
    port: usize,
    binds: &BindSet,
    auto: &BindSet,
    stick: Stick,
    comp: AxisComponent,
) -> i16 {
    let (minus, plus) = stick_pair(stick, comp);

    let minus_axis = resolve_axis(binds, auto, minus);
    let plus_axis = resolve_axis(binds, auto, plus);
    let minus_mag = pad.axis(port, minus_axis).unsigned_abs().min(AXIS_RANGE as u16) as i32;
    let plus_mag = pad.axis(port, plus_axis).unsigned_abs().min(AXIS_RANGE as u16) as i32;

    let mut value = plus_mag - minus_mag;
    if value == 0 {
        if pad.button(port, resolve_key(binds, auto, plus)) {
            value += AXIS_RANGE as i32;
        }
        if pad.button(port, resolve_key(binds, auto, minus)) {
            value -= AXIS_RANGE as i32;
        }
    }
    value as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::PadObserver;
    use crate::pad::{axis_select, ButtonSet, NUM_AXES};

    /// Minimal capability implementation backing resolver tests.
    struct FakePad {
        buttons: ButtonSet,
        axes: [i16; NUM_AXES],
    }

    impl FakePad {
        fn new() -> Self {
            FakePad {
                buttons: ButtonSet::default(),
                axes: [0; NUM_AXES],
            }
        }
    }

    impl JoypadDriver for FakePad {
        fn ident(&self) -> &'static str {
            "fake"
        }
        fn poll(&mut self, _observer: &mut dyn PadObserver) {}
        fn button(&self, port: usize, key: Joykey) -> bool {
            match key {
                Joykey::Button(b) if port == 0 => self.buttons.pressed(b as usize),
                _ => false,
            }
        }
        fn axis(&self, port: usize, axis: Joyaxis) -> i16 {
            if port != 0 {
                return 0;
            }
            axis_select(&self.axes, axis)
        }
        fn buttons(&self, _port: usize) -> ButtonSet {
            self.buttons
        }
        fn name(&self, _port: usize) -> Option<&str> {
            Some("fake pad")
        }
        fn query_pad(&self, port: usize) -> bool {
            port == 0
        }
    }

    fn bound_a(button: u16) -> (BindSet, BindSet) {
        let mut binds = BindSet::default();
        binds.set(Action::A, Bind::button(button));
        (binds, BindSet::default())
    }

    #[test]
    fn explicit_bind_resolves_against_pad() {
        let mut pad = FakePad::new();
        pad.buttons.set(5, true);
        let (binds, auto) = bound_a(5);
        assert!(is_pressed(&pad, 0, &binds, &auto, Action::A, 0.5));
        assert!(!is_pressed(&pad, 1, &binds, &auto, Action::A, 0.5));
    }

    #[test]
    fn unset_bind_falls_back_to_autoconf_default() {
        let mut pad = FakePad::new();
        pad.buttons.set(3, true);
        let binds = BindSet::default();
        let mut auto = BindSet::default();
        auto.set(Action::A, Bind::button(3));
        assert!(is_pressed(&pad, 0, &binds, &auto, Action::A, 0.5));
    }

    #[test]
    fn explicit_bind_is_never_overridden_by_default() {
        let mut pad = FakePad::new();
        pad.buttons.set(3, true); // the autoconf button is down
        let mut binds = BindSet::default();
        binds.set(Action::A, Bind::button(7)); // but the user bound 7
        let mut auto = BindSet::default();
        auto.set(Action::A, Bind::button(3));
        assert!(!is_pressed(&pad, 0, &binds, &auto, Action::A, 0.5));
    }

    #[test]
    fn axis_magnitude_past_threshold_reads_as_pressed() {
        let mut pad = FakePad::new();
        pad.axes[2] = -20000;
        let mut binds = BindSet::default();
        binds.set(Action::L2, Bind::axis(Joyaxis::Neg(2)));
        let auto = BindSet::default();
        assert!(is_pressed(&pad, 0, &binds, &auto, Action::L2, 0.5));
        pad.axes[2] = -10000;
        assert!(!is_pressed(&pad, 0, &binds, &auto, Action::L2, 0.5));
    }

    #[test]
    fn analog_value_is_plus_minus_difference() {
        let mut pad = FakePad::new();
        pad.axes[0] = -12000;
        let mut binds = BindSet::default();
        binds.set(Action::LeftXMinus, Bind::axis(Joyaxis::Neg(0)));
        binds.set(Action::LeftXPlus, Bind::axis(Joyaxis::Pos(0)));
        let auto = BindSet::default();
        assert_eq!(
            analog_value(&pad, 0, &binds, &auto, Stick::Left, AxisComponent::X),
            -12000
        );
        pad.axes[0] = 31000;
        assert_eq!(
            analog_value(&pad, 0, &binds, &auto, Stick::Left, AxisComponent::X),
            31000
        );
    }

    #[test]
    fn neutral_axes_fall_back_to_digital_pair() {
        let mut pad = FakePad::new();
        pad.buttons.set(6, true);
        let mut binds = BindSet::default();
        binds.set(Action::LeftXMinus, Bind::button(6));
        binds.set(Action::LeftXPlus, Bind::button(7));
        let auto = BindSet::default();
        assert_eq!(
            analog_value(&pad, 0, &binds, &auto, Stick::Left, AxisComponent::X),
            -AXIS_RANGE
        );
        // both directions held cancel out
        pad.buttons.set(7, true);
        assert_eq!(
            analog_value(&pad, 0, &binds, &auto, Stick::Left, AxisComponent::X),
            0
        );
    }

    fn dpad_axes(binds: &BindSet) -> [Joyaxis; 4] {
        [
            binds.get(Action::Up).axis,
            binds.get(Action::Down).axis,
            binds.get(Action::Left).axis,
            binds.get(Action::Right).axis,
        ]
    }

    #[test]
    fn push_pop_restores_directional_axis_binds() {
        let mut binds = BindSet::default();
        binds.set(Action::Up, Bind::axis(Joyaxis::Neg(7)));
        binds.set(Action::LeftXMinus, Bind::axis(Joyaxis::Neg(0)));
        binds.set(Action::LeftXPlus, Bind::axis(Joyaxis::Pos(0)));
        binds.set(Action::LeftYMinus, Bind::axis(Joyaxis::Neg(1)));
        binds.set(Action::LeftYPlus, Bind::axis(Joyaxis::Pos(1)));

        let before = dpad_axes(&binds);
        binds.push_analog_dpad(Stick::Left);
        assert_eq!(binds.get(Action::Up).axis, Joyaxis::Neg(1));
        assert_eq!(binds.get(Action::Right).axis, Joyaxis::Pos(0));
        binds.pop_analog_dpad();
        assert_eq!(dpad_axes(&binds), before);
    }

    #[test]
    fn push_twice_pop_restores_to_second_push() {
        let mut binds = BindSet::default();
        binds.set(Action::Up, Bind::axis(Joyaxis::Neg(7)));
        binds.set(Action::LeftYMinus, Bind::axis(Joyaxis::Neg(1)));
        binds.set(Action::RightYMinus, Bind::axis(Joyaxis::Neg(3)));

        binds.push_analog_dpad(Stick::Left);
        let between = dpad_axes(&binds);
        binds.push_analog_dpad(Stick::Right);
        binds.pop_analog_dpad();
        // the second push replaced the snapshot; the pre-push Neg(7) is gone
        assert_eq!(dpad_axes(&binds), between);
        assert_eq!(binds.get(Action::Up).axis, Joyaxis::Neg(1));
    }
}
