//! Doctor identity normalization and fingerprinting
//!
//! Turns a free-form (name, hospital, location) triple into a stable
//! cache key so that "Dr. Smith", "dr smith" and "Smith" at the same
//! hospital/location all hit the same cached rows.

use sha2::{Digest, Sha256};

/// Honorific prefixes stripped from the front of a name, longest first
/// so "doctor" wins over "dr" when both would match. At most one prefix
/// is removed.
const HONORIFICS: &[&str] = &["doctor", "prof.", "prof", "dr.", "dr"];

/// Compute the stable fingerprint for a doctor identity.
///
/// The normalization is idempotent and insensitive to case, surrounding
/// whitespace, internal whitespace runs, and a single leading honorific.
/// An empty name still yields a deterministic (degenerate) fingerprint;
/// rejecting too-short names is the caller's validation concern.
///
/// Returns the first 128 bits of SHA-256 over the normalized triple,
/// hex-encoded (32 chars).
pub fn fingerprint(name: &str, hospital: &str, location: &str) -> String {
    let name = normalize_name(name);
    let hospital = normalize_field(hospital);
    let location = normalize_field(location);

    // '|' is not expected inside names; it keeps the three fields from
    // colliding across boundaries ("a b","c" vs "a","b c")
    let identifier = format!("{}|{}|{}", name, hospital, location);

    let digest = Sha256::digest(identifier.as_bytes());
    digest[..16].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Lowercase, trim, strip at most one leading honorific token, collapse
/// internal whitespace runs to single spaces.
fn normalize_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();

    let stripped = strip_honorific(&lowered);

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove one leading honorific if present. The prefix must be its own
/// token: "drake ramoray" keeps its "dr"-looking start.
fn strip_honorific(name: &str) -> &str {
    for prefix in HONORIFICS {
        if let Some(rest) = name.strip_prefix(prefix) {
            // Token boundary: end of string, or whitespace following.
            // Dotted forms ("dr.") are complete tokens on their own.
            if rest.is_empty() {
                return "";
            }
            if rest.starts_with(char::is_whitespace) {
                return rest.trim_start();
            }
        }
    }
    name
}

/// Lowercase and trim a hospital/location field
fn normalize_field(field: &str) -> String {
    field.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_idempotent() {
        let a = fingerprint("Dr. Tan Boon Nee", "", "Malaysia");
        let b = fingerprint("Dr. Tan Boon Nee", "", "Malaysia");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn fingerprint_insensitive_to_case_and_honorific() {
        let a = fingerprint("Dr. Tan Boon Nee", "", "Malaysia");
        let b = fingerprint("tan boon nee", "", "malaysia");
        let c = fingerprint("  DR TAN  BOON   NEE  ", "", " MALAYSIA ");
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn honorific_variants_collapse() {
        let base = fingerprint("lee", "", "");
        for name in ["Dr. Lee", "Dr Lee", "dr lee", "Doctor Lee", "Prof. Lee", "prof lee"] {
            assert_eq!(fingerprint(name, "", ""), base, "variant: {}", name);
        }
    }

    #[test]
    fn only_one_honorific_stripped() {
        // "dr dr lee" strips one prefix, leaving "dr lee" distinct from
        // both "lee" and a once-stripped "Dr. Lee"
        assert_ne!(fingerprint("Dr. Dr. Lee", "", ""), fingerprint("Lee", "", ""));
        assert_ne!(fingerprint("Dr. Dr. Lee", "", ""), fingerprint("Dr. Lee", "", ""));
    }

    #[test]
    fn honorific_must_be_own_token() {
        // Names that merely start with "dr" are left alone
        assert_ne!(fingerprint("Drake Ramoray", "", ""), fingerprint("ake Ramoray", "", ""));
        assert_eq!(
            fingerprint("Drake Ramoray", "", ""),
            fingerprint("drake ramoray", "", "")
        );
    }

    #[test]
    fn hospital_and_location_discriminate() {
        let a = fingerprint("tan", "Gleneagles", "KL");
        let b = fingerprint("tan", "Pantai", "KL");
        let c = fingerprint("tan", "Gleneagles", "Penang");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn field_boundaries_do_not_collide() {
        assert_ne!(fingerprint("a b", "c", ""), fingerprint("a", "b c", ""));
    }

    #[test]
    fn empty_name_is_deterministic() {
        let a = fingerprint("", "", "");
        let b = fingerprint("  ", "", "");
        let c = fingerprint("Dr.", "", "");
        assert_eq!(a, b);
        // A bare honorific normalizes to the empty name too
        assert_eq!(a, c);
        assert_eq!(a.len(), 32);
    }
}
