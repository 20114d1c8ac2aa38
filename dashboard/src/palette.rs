use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::topology::InstanceRecord;

pub const FREE: &str = "Free";
pub const FREE_COLOR: &str = "#E7E7E7";

/// Rehash attempts before a colliding color is accepted.
const MAX_SALT: u32 = 16;

/// Gives every instance a stable `#RRGGBB` color derived from its uuid.
///
/// Each hex digit is in 1..=F. Collisions within one host are resolved by
/// salting the hash, so the result depends on instance order as well as identity.
pub fn assign_colors(instances: &[InstanceRecord]) -> IndexMap<String, String> {
    let mut colors = IndexMap::new();
    colors.insert(FREE.to_string(), FREE_COLOR.to_string());
    let mut taken: HashSet<String> = HashSet::from([FREE_COLOR.to_string()]);

    for inst in instances {
        if colors.contains_key(&inst.name) {
            continue;
        }
        let key = if inst.uuid.is_empty() {
            inst.name.as_str()
        } else {
            inst.uuid.as_str()
        };

        let mut color = color_for(key, 0);
        let mut salt = 1;
        while taken.contains(&color) && salt < MAX_SALT {
            color = color_for(key, salt);
            salt += 1;
        }

        taken.insert(color.clone());
        colors.insert(inst.name.clone(), color);
    }

    colors
}

fn color_for(key: &str, salt: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    if salt > 0 {
        hasher.update(salt.to_le_bytes());
    }
    let digest = hasher.finalize();

    let mut out = String::with_capacity(7);
    out.push('#');
    for b in &digest[..3] {
        let hi = 1 + (b >> 4) % 15;
        let lo = 1 + (b & 0x0f) % 15;
        out.push_str(&format!("{:X}{:X}", hi, lo));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Source;

    fn inst(name: &str, uuid: &str) -> InstanceRecord {
        InstanceRecord {
            uuid: uuid.into(),
            hostname: name.into(),
            name: name.into(),
            vcpus: 1,
            memory_mb: 512,
            numa_topology: None,
            source: Source::Compute,
        }
    }

    #[test]
    fn free_is_fixed_gray() {
        let colors = assign_colors(&[inst("Free", "u-free")]);
        assert_eq!(colors.len(), 1);
        assert_eq!(colors[FREE], FREE_COLOR);
    }

    #[test]
    fn colors_are_deterministic_and_well_formed() {
        let set: Vec<_> = (0..20)
            .map(|i| inst(&format!("instance-{:08x}", i), &format!("uuid-{}", i)))
            .collect();
        let a = assign_colors(&set);
        let b = assign_colors(&set);
        assert_eq!(a, b);

        for color in a.values() {
            assert_eq!(color.len(), 7);
            assert!(color.starts_with('#'));
            assert!(color[1..]
                .chars()
                .all(|c| c.is_ascii_hexdigit() && c != '0' && !c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn identical_uuids_are_separated() {
        let colors = assign_colors(&[inst("a", "same"), inst("b", "same")]);
        assert_ne!(colors["a"], colors["b"]);
    }

    #[test]
    fn missing_uuid_falls_back_to_name() {
        let by_name = assign_colors(&[inst("solo", "")]);
        assert_eq!(by_name["solo"], color_for("solo", 0));
    }

    #[test]
    fn repeated_names_keep_first_color() {
        let colors = assign_colors(&[inst("dup", "u1"), inst("dup", "u2")]);
        assert_eq!(colors["dup"], color_for("u1", 0));
        assert_eq!(colors.len(), 2);
    }
}
