use rand::Rng;

pub const ROOM_ID_LEN: usize = 8;

const ROOM_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const ADJECTIVES: [&str; 25] = [
    "Fluffy", "Adorable", "Bouncy", "Cheerful", "Dancing", "Elegant", "Friendly", "Gentle",
    "Happy", "Jolly", "Lively", "Magical", "Noble", "Peaceful", "Quirky", "Radiant", "Silly",
    "Tender", "Upbeat", "Vibrant", "Warm", "Zealous", "Bright", "Cozy", "Dreamy",
];

const NOUNS: [&str; 25] = [
    "Cookie", "Panda", "Kitten", "Puppy", "Cloud", "Star", "Moon", "Sun", "Rainbow", "Flower",
    "Bird", "Butterfly", "Dragon", "Phoenix", "Unicorn", "Crystal", "Diamond", "Pearl", "River",
    "Ocean", "Mountain", "Forest", "Garden", "Meadow", "Valley",
];

/// `^[A-Za-z0-9]{8}$`
pub fn validate(id: &str) -> bool {
    id.len() == ROOM_ID_LEN && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Not unique by construction, the directory retries on collision.
pub fn generate_room_id() -> String {
    let mut rng = rand::rng();
    (0..ROOM_ID_LEN)
        .map(|_| ROOM_ID_CHARSET[rng.random_range(..ROOM_ID_CHARSET.len())] as char)
        .collect()
}

/// "FluffyCookie", "CozyDragon", ...
pub fn generate_display_name() -> String {
    let mut rng = rand::rng();
    format!(
        "{}{}",
        ADJECTIVES[rng.random_range(..ADJECTIVES.len())],
        NOUNS[rng.random_range(..NOUNS.len())],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_always_validate() {
        for _ in 0..1000 {
            let id = generate_room_id();
            assert!(validate(&id), "{id} should be a valid room id");
        }
    }

    #[test]
    fn validate_rejects_wrong_length_and_charset() {
        assert!(validate("abcD1234"));
        assert!(!validate(""));
        assert!(!validate("abc1234"));
        assert!(!validate("abc123456"));
        assert!(!validate("abc-1234"));
        assert!(!validate("abc 1234"));
        assert!(!validate("ÄbcD1234"));
        assert!(!validate("abcd123é"));
    }

    #[test]
    fn display_name_is_adjective_then_noun() {
        for _ in 0..200 {
            let name = generate_display_name();
            assert!(!name.contains(' '), "{name} should have no separator");
            let adjective = ADJECTIVES
                .iter()
                .find(|a| name.starts_with(**a))
                .unwrap_or_else(|| panic!("{name} should start with a known adjective"));
            assert!(NOUNS.contains(&&name[adjective.len()..]), "{name} should end with a known noun");
        }
    }
}
