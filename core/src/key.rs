//! Joining and splitting reading keys on `-`, guarding the literal substring `_-` so a
//! reading that itself contains a hyphen round-trips through a multi-reading join.

const HYPHEN_PLACEHOLDER: char = '\u{F8FF}';

fn escape_reading(reading: &str) -> String {
    reading.replace('-', &HYPHEN_PLACEHOLDER.to_string())
}

fn unescape_reading(escaped: &str) -> String {
    escaped.replace(HYPHEN_PLACEHOLDER, "-")
}

/// Joins a span of reading keys the way C3 joins `readings[i..i+L]` to look up a node's
/// unigrams, protecting any reading that itself contains a literal hyphen.
pub fn join_readings<'a, I>(readings: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    readings
        .into_iter()
        .map(escape_reading)
        .collect::<Vec<_>>()
        .join("-")
}

/// Inverse of [`join_readings`].
pub fn split_joined_key(key: &str) -> Vec<String> {
    key.split('-').map(unescape_reading).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plain_readings() {
        let readings = ["ni3", "hao3"];
        let joined = join_readings(readings.iter().copied());
        assert_eq!(joined, "ni3-hao3");
        assert_eq!(split_joined_key(&joined), vec!["ni3", "hao3"]);
    }

    #[test]
    fn guards_a_reading_with_a_literal_hyphen() {
        let readings = ["_punctuation_Hsu_-", "ni3"];
        let joined = join_readings(readings.iter().copied());
        let split = split_joined_key(&joined);
        assert_eq!(split, vec!["_punctuation_Hsu_-", "ni3"]);
    }
}
