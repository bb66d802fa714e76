//! Identifiers for channels and workers.

use std::path::PathBuf;

use cmdpipe_transport::{ChannelName, TransportError};
use uuid::Uuid;

/// Prefix of generated channel names.
pub const CHANNEL_PREFIX: &str = "cmdpipe.";

const BASE62_DIGITS: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Encode `value` with digits `0-9`, `A-Z`, `a-z`, most significant first.
pub fn to_base62(mut value: u64) -> String {
    let mut digits = Vec::with_capacity(11);
    loop {
        digits.push(BASE62_DIGITS[(value % 62) as usize]);
        value /= 62;
        if value == 0 {
            break;
        }
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}

/// Short random identifier used to tell workers apart in logs.
pub fn worker_id() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let value = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    to_base62(u64::from(value))
}

/// Fresh channel name of the form `cmdpipe.<uuid>` inside `dir`.
pub fn generate_channel_name(dir: impl Into<PathBuf>) -> Result<ChannelName, TransportError> {
    ChannelName::with_dir(format!("{CHANNEL_PREFIX}{}", Uuid::new_v4()), dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base62_known_values() {
        assert_eq!(to_base62(0), "0");
        assert_eq!(to_base62(9), "9");
        assert_eq!(to_base62(10), "A");
        assert_eq!(to_base62(35), "Z");
        assert_eq!(to_base62(36), "a");
        assert_eq!(to_base62(61), "z");
        assert_eq!(to_base62(62), "10");
        assert_eq!(to_base62(3843), "zz");
        assert_eq!(to_base62(u64::from(u32::MAX)), "4gfFC3");
    }

    #[test]
    fn worker_ids_are_short_base62() {
        let id = worker_id();
        assert!(!id.is_empty() && id.len() <= 6);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_channel_names_are_unique() {
        let a = generate_channel_name("/tmp").unwrap();
        let b = generate_channel_name("/tmp").unwrap();
        assert!(a.as_str().starts_with(CHANNEL_PREFIX));
        assert_ne!(a, b);
    }
}
