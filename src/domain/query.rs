/// A balance lookup addressed by a text key, as used by host templates.
///
/// Keys are `balance`, `balance_formatted`, `balance_<name>` and
/// `balance_formatted_<name>`. The prefix is matched case-insensitively; the
/// name keeps the case it was written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceQuery {
    /// `None` asks about the requesting player.
    pub player: Option<String>,
    pub formatted: bool,
}

const PREFIX: &str = "balance";
const FORMATTED_PREFIX: &str = "balance_formatted_";
const NAMED_PREFIX: &str = "balance_";

impl BalanceQuery {
    /// `None` for keys that are not balance queries.
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        if key.eq_ignore_ascii_case(PREFIX) {
            return Some(Self {
                player: None,
                formatted: false,
            });
        }
        if key.eq_ignore_ascii_case("balance_formatted") {
            return Some(Self {
                player: None,
                formatted: true,
            });
        }

        let (name, formatted) = match strip_prefix_ignore_case(key, FORMATTED_PREFIX) {
            Some(name) => (name, true),
            None => (strip_prefix_ignore_case(key, NAMED_PREFIX)?, false),
        };
        if name.is_empty() {
            return None;
        }
        Some(Self {
            player: Some(name.to_string()),
            formatted,
        })
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}
