use labforge_schema::LabId;

const NAME_PREFIX_CHARS: usize = 3;
const HASH_HEX_CHARS: usize = 8;
const FALLBACK_PREFIX: &str = "lab";

/// `<prefix>-<8 hex chars>`, hashed from the name and the current wall-clock
/// time. Not checked for uniqueness.
///
/// The prefix is the first 3 characters of the name that are legal in a
/// compose project name (ASCII alphanumerics, `-`, `_`), lowercased, so the
/// id is always a plain directory name and a valid project suffix.
pub fn generate_lab_id(name: &str) -> LabId {
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| chrono::Utc::now().timestamp_micros());
    lab_id_from(name, nanos)
}

fn lab_id_from(name: &str, nanos: i64) -> LabId {
    let mut prefix: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .take(NAME_PREFIX_CHARS)
        .collect::<String>()
        .to_ascii_lowercase();
    if prefix.is_empty() {
        prefix = FALLBACK_PREFIX.to_owned();
    }
    let hash = blake3::hash(format!("{name}-{nanos}").as_bytes()).to_hex();
    LabId::new(format!("{prefix}-{}", &hash[..HASH_HEX_CHARS]))
}
