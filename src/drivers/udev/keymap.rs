// Pure translation tables for the event-bus backend

use std::collections::HashMap;

use crate::pad::{HatDirection, AXIS_RANGE, NUM_HATS};

/// First key code of the modern button block (`BTN_MISC`).
pub const BTN_MISC: u16 = 0x100;

/// One past the highest key code the kernel can report.
pub const KEY_CNT: u16 = 0x300;

/// First and last hat axis codes (`ABS_HAT0X` .. `ABS_HAT3Y`).
pub const ABS_HAT0X: u16 = 0x10;
pub const ABS_HAT3Y: u16 = 0x17;

/// One past the last axis code treated as a real analog axis (`ABS_MISC`).
pub const ABS_MISC: u16 = 0x28;

const ABS_Z: u16 = 0x02;
const ABS_RZ: u16 = 0x05;
const ABS_GAS: u16 = 0x09;
const ABS_BRAKE: u16 = 0x0a;

/// Compacts the sparse kernel key-code space into dense button indices,
/// built once per device.
///
/// Codes at or above `BTN_MISC` are assigned first, in ascending order; the
/// legacy range below it is always appended after, never interleaved, so
/// indices of previously saved binds survive on devices that grow legacy
/// keys.
#[derive(Debug, Clone, Default)]
pub struct KeycodeMap {
    index: HashMap<u16, u16>,
}

impl KeycodeMap {
    pub fn build(codes: impl IntoIterator<Item = u16>, capacity: usize) -> Self {
        let mut modern = Vec::new();
        let mut legacy = Vec::new();
        for code in codes {
            if code >= KEY_CNT {
                continue;
            }
            if code >= BTN_MISC {
                modern.push(code);
            } else {
                legacy.push(code);
            }
        }
        modern.sort_unstable();
        legacy.sort_unstable();

        let mut index = HashMap::new();
        for code in modern.into_iter().chain(legacy) {
            if index.len() >= capacity {
                break;
            }
            index.insert(code, index.len() as u16);
        }
        KeycodeMap { index }
    }

    pub fn get(&self, code: u16) -> Option<u16> {
        self.index.get(&code).copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Range of one absolute axis as reported at open time.
#[derive(Debug, Clone, Copy)]
pub struct AxisSpec {
    pub min: i32,
    pub max: i32,
    /// Trigger that reports a bipolar range where a unipolar one is
    /// expected; remapped into the positive half-range at every query.
    pub bipolar_trigger: bool,
}

impl AxisSpec {
    pub fn new(code: u16, min: i32, max: i32) -> Self {
        AxisSpec {
            min,
            max,
            bipolar_trigger: is_trigger_code(code) && min < 0,
        }
    }
}

/// Conventional trigger axes; anything else is assumed to be a stick.
pub fn is_trigger_code(code: u16) -> bool {
    matches!(code, ABS_Z | ABS_RZ | ABS_GAS | ABS_BRAKE)
}

/// Whether the code falls in the hat block handled as direction pairs.
pub fn is_hat_code(code: u16) -> bool {
    (ABS_HAT0X..=ABS_HAT3Y).contains(&code)
}

/// Maps raw absolute-axis codes onto dense axis slots.
#[derive(Debug, Clone, Default)]
pub struct AxisMap {
    slots: HashMap<u16, (u16, AxisSpec)>,
}

impl AxisMap {
    pub fn insert(&mut self, code: u16, spec: AxisSpec) {
        let slot = self.slots.len() as u16;
        self.slots.entry(code).or_insert((slot, spec));
    }

    pub fn get(&self, code: u16) -> Option<(u16, AxisSpec)> {
        self.slots.get(&code).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Scale a raw axis value into the normalized [-0x7fff, 0x7fff] range.
pub fn normalize_axis(spec: &AxisSpec, raw: i32) -> i16 {
    let range = i64::from(spec.max) - i64::from(spec.min);
    if range <= 0 {
        return 0;
    }
    let offset = i64::from(raw) - i64::from(spec.min);
    let value = if spec.bipolar_trigger {
        offset * i64::from(AXIS_RANGE) / range
    } else {
        offset * 0xffff / range - i64::from(AXIS_RANGE)
    };
    value.clamp(-i64::from(AXIS_RANGE), i64::from(AXIS_RANGE)) as i16
}

/// Sign → direction translation for a hat tracked as a signed axis pair.
pub fn hat_pressed(hats: &[(i32, i32); NUM_HATS], hat: u16, dir: HatDirection) -> bool {
    let Some(&(x, y)) = hats.get(hat as usize) else {
        return false;
    };
    match dir {
        HatDirection::Left => x < 0,
        HatDirection::Right => x > 0,
        HatDirection::Up => y < 0,
        HatDirection::Down => y > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_codes_map_in_ascending_order() {
        let map = KeycodeMap::build([9, 2, 7], 32);
        assert_eq!(map.get(2), Some(0));
        assert_eq!(map.get(7), Some(1));
        assert_eq!(map.get(9), Some(2));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn legacy_range_appends_after_modern_block() {
        // mixed device: two modern gamepad codes plus two legacy keys
        let map = KeycodeMap::build([0x130, 2, 0x131, 7], 32);
        assert_eq!(map.get(0x130), Some(0));
        assert_eq!(map.get(0x131), Some(1));
        assert_eq!(map.get(2), Some(2));
        assert_eq!(map.get(7), Some(3));
    }

    #[test]
    fn map_respects_button_capacity() {
        let map = KeycodeMap::build(0x100..0x140, 32);
        assert_eq!(map.len(), 32);
        assert_eq!(map.get(0x120), None);
    }

    #[test]
    fn unknown_code_is_unmapped() {
        let map = KeycodeMap::build([0x130], 32);
        assert_eq!(map.get(0x131), None);
    }

    #[test]
    fn stick_normalization_spans_full_scale() {
        let spec = AxisSpec::new(0x00, -32768, 32767);
        assert_eq!(normalize_axis(&spec, -32768), -AXIS_RANGE);
        assert_eq!(normalize_axis(&spec, 32767), AXIS_RANGE);
        assert!(normalize_axis(&spec, 0).abs() <= 1);
    }

    #[test]
    fn narrow_range_scales_up() {
        let spec = AxisSpec::new(0x00, 0, 255);
        assert_eq!(normalize_axis(&spec, 0), -AXIS_RANGE);
        assert_eq!(normalize_axis(&spec, 255), AXIS_RANGE);
    }

    #[test]
    fn normalized_values_stay_in_range() {
        let spec = AxisSpec::new(0x00, -100, 100);
        for raw in [-5000, -100, -1, 0, 1, 100, 5000] {
            let v = normalize_axis(&spec, raw);
            assert!((-AXIS_RANGE..=AXIS_RANGE).contains(&v));
        }
    }

    #[test]
    fn bipolar_trigger_remaps_to_positive_half() {
        let spec = AxisSpec::new(ABS_Z, -32768, 32767);
        assert!(spec.bipolar_trigger);
        assert_eq!(normalize_axis(&spec, -32768), 0);
        assert_eq!(normalize_axis(&spec, 32767), AXIS_RANGE);
        let mid = normalize_axis(&spec, 0);
        assert!(mid > 0 && mid < AXIS_RANGE);
    }

    #[test]
    fn unipolar_trigger_is_not_flagged() {
        let spec = AxisSpec::new(ABS_Z, 0, 255);
        assert!(!spec.bipolar_trigger);
        let stick = AxisSpec::new(0x00, -32768, 32767);
        assert!(!stick.bipolar_trigger);
    }

    #[test]
    fn hat_signs_translate_to_directions() {
        let mut hats = [(0, 0); NUM_HATS];
        hats[1] = (-1, 1);
        assert!(hat_pressed(&hats, 1, HatDirection::Left));
        assert!(hat_pressed(&hats, 1, HatDirection::Down));
        assert!(!hat_pressed(&hats, 1, HatDirection::Right));
        assert!(!hat_pressed(&hats, 1, HatDirection::Up));
        assert!(!hat_pressed(&hats, 0, HatDirection::Left));
        assert!(!hat_pressed(&hats, 9, HatDirection::Left));
    }
}
