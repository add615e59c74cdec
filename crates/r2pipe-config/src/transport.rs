use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the engine should be reached.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TransportKind {
    /// Spawn the engine executable and talk to it over its standard streams.
    #[default]
    Subprocess,
    /// Load the engine's shared library at runtime.
    Dynamic,
    /// Use the engine library linked into the binary.
    Linked,
}

/// Errors encountered while parsing a [`TransportKind`] from text.
pub type TransportKindParseError = strum::ParseError;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("subprocess", TransportKind::Subprocess)]
    #[case("Dynamic", TransportKind::Dynamic)]
    #[case("linked", TransportKind::Linked)]
    fn parses_transport_names(#[case] text: &str, #[case] expected: TransportKind) {
        assert_eq!(text.parse::<TransportKind>(), Ok(expected));
    }

    #[rstest]
    fn displays_in_snake_case() {
        assert_eq!(TransportKind::Subprocess.to_string(), "subprocess");
    }
}
