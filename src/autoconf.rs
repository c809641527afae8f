// Autoconfig profiles: known device identities mapped to default binds

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::binds::{Action, Bind, BindSet};
use crate::pad::{HatDirection, Joyaxis, Joykey};

/// One action's record in a profile file. Exactly one of `button`, `axis`
/// or `hat` is normally present; an empty record is the explicit
/// nothing-bound sentinel.
#[derive(Deserialize, Default, Clone, Debug)]
pub struct BindEntry {
    #[serde(default)]
    pub button: Option<u16>,
    #[serde(default)]
    pub axis: Option<String>,
    #[serde(default)]
    pub hat: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

fn parse_axis(value: &str) -> Option<Joyaxis> {
    let index: u16 = value.get(1..)?.parse().ok()?;
    match value.chars().next()? {
        '+' => Some(Joyaxis::Pos(index)),
        '-' => Some(Joyaxis::Neg(index)),
        _ => None,
    }
}

fn parse_hat(value: &str) -> Option<Joykey> {
    let rest = value.strip_prefix('h')?;
    let split = rest.find(|c: char| !c.is_ascii_digit())?;
    let (num, dir) = rest.split_at(split);
    let hat: u16 = num.parse().ok()?;
    let dir = match dir {
        "up" => HatDirection::Up,
        "down" => HatDirection::Down,
        "left" => HatDirection::Left,
        "right" => HatDirection::Right,
        _ => return None,
    };
    Some(Joykey::Hat { hat, dir })
}

impl BindEntry {
    fn decode(&self) -> Bind {
        let key = if let Some(button) = self.button {
            Joykey::Button(button)
        } else if let Some(hat) = &self.hat {
            parse_hat(hat).unwrap_or_default()
        } else {
            Joykey::None
        };
        let axis = self.axis.as_deref().and_then(parse_axis).unwrap_or_default();
        Bind::new(key, axis, self.label.clone())
    }
}

/// A saved mapping for one known device.
#[derive(Deserialize, Clone, Debug)]
pub struct PadProfile {
    pub name: String,
    #[serde(default)]
    pub vendor_id: u16,
    #[serde(default)]
    pub product_id: u16,
    #[serde(default)]
    pub binds: HashMap<String, BindEntry>,
}

impl PadProfile {
    /// The autoconfigured default bind set the resolver falls back to.
    pub fn bind_set(&self) -> BindSet {
        let mut set = BindSet::default();
        for (key, entry) in &self.binds {
            if let Some(action) = Action::from_key(key) {
                set.set(action, entry.decode());
            }
        }
        set
    }

    fn score(&self, vendor_id: u16, product_id: u16, name: &str) -> u32 {
        if vendor_id != 0 && self.vendor_id == vendor_id && self.product_id == product_id {
            2
        } else if !self.name.is_empty() && self.name == name {
            1
        } else {
            0
        }
    }
}

/// Every profile found in the autoconfig directory.
#[derive(Default)]
pub struct ProfileStore {
    profiles: Vec<PadProfile>,
}

impl ProfileStore {
    /// Load every `*.json` profile under `dir`. Unreadable files are
    /// skipped with a diagnostic; a missing directory is an empty store.
    pub fn load_dir(dir: &Path) -> Self {
        let mut profiles = Vec::new();
        let Ok(entries) = std::fs::read_dir(dir) else {
            debug!("autoconf: no profile directory at {}", dir.display());
            return ProfileStore { profiles };
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(err) => {
                    warn!("autoconf: cannot open {}: {err}", path.display());
                    continue;
                }
            };
            match serde_json::from_reader::<_, PadProfile>(BufReader::new(file)) {
                Ok(profile) => profiles.push(profile),
                Err(err) => warn!("autoconf: skipping {}: {err}", path.display()),
            }
        }
        ProfileStore { profiles }
    }

    /// An exact vendor/product match beats a name match; anything else is
    /// no match at all.
    pub fn best_match(&self, vendor_id: u16, product_id: u16, name: &str) -> Option<&PadProfile> {
        self.profiles
            .iter()
            .map(|profile| (profile.score(vendor_id, product_id, name), profile))
            .filter(|(score, _)| *score > 0)
            .max_by_key(|(score, _)| *score)
            .map(|(_, profile)| profile)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"{
        "name": "Test Pad",
        "vendor_id": 1118,
        "product_id": 654,
        "binds": {
            "a": { "button": 0, "label": "Cross" },
            "up": { "hat": "h0up" },
            "left_x_minus": { "axis": "-0" },
            "left_x_plus": { "axis": "+0" },
            "select": {}
        }
    }"#;

    #[test]
    fn axis_strings_keep_their_sign() {
        assert_eq!(parse_axis("+2"), Some(Joyaxis::Pos(2)));
        assert_eq!(parse_axis("-2"), Some(Joyaxis::Neg(2)));
        assert_eq!(parse_axis("2"), None);
        assert_eq!(parse_axis(""), None);
    }

    #[test]
    fn hat_strings_decode_index_and_direction() {
        assert_eq!(
            parse_hat("h0up"),
            Some(Joykey::Hat {
                hat: 0,
                dir: HatDirection::Up
            })
        );
        assert_eq!(
            parse_hat("h3left"),
            Some(Joykey::Hat {
                hat: 3,
                dir: HatDirection::Left
            })
        );
        assert_eq!(parse_hat("0up"), None);
        assert_eq!(parse_hat("hup"), None);
    }

    #[test]
    fn profile_records_decode_into_binds() {
        let profile: PadProfile = serde_json::from_str(PROFILE).unwrap();
        let set = profile.bind_set();
        assert_eq!(set.get(Action::A).key, Joykey::Button(0));
        assert_eq!(set.get(Action::A).label.as_deref(), Some("Cross"));
        assert_eq!(
            set.get(Action::Up).key,
            Joykey::Hat {
                hat: 0,
                dir: HatDirection::Up
            }
        );
        assert_eq!(set.get(Action::LeftXMinus).axis, Joyaxis::Neg(0));
        // explicit none sentinel
        assert_eq!(set.get(Action::Select).key, Joykey::None);
        assert_eq!(set.get(Action::Select).axis, Joyaxis::None);
        // untouched action
        assert_eq!(set.get(Action::R3).key, Joykey::None);
    }

    #[test]
    fn vendor_product_match_beats_name_match() {
        let by_ids: PadProfile = serde_json::from_str(PROFILE).unwrap();
        let by_name: PadProfile = serde_json::from_str(
            r#"{ "name": "Other Pad", "binds": {} }"#,
        )
        .unwrap();
        let store = ProfileStore {
            profiles: vec![by_name, by_ids],
        };
        let hit = store.best_match(1118, 654, "Other Pad").unwrap();
        assert_eq!(hit.name, "Test Pad");
        let by_name_hit = store.best_match(0, 0, "Other Pad").unwrap();
        assert_eq!(by_name_hit.name, "Other Pad");
        assert!(store.best_match(0, 0, "Stranger").is_none());
    }
}
