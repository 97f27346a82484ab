use crate::domain::account::Balance;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct BalanceRow<'a> {
    player: &'a str,
    balance: String,
}

/// Writes the final `player,balance` report, balances with two decimals.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_balances<'a, I>(&mut self, balances: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, Balance)>,
    {
        let mut empty = true;
        for (player, balance) in balances {
            self.writer.serialize(BalanceRow {
                player,
                balance: format!("{:.2}", balance.0.round_dp(2)),
            })?;
            empty = false;
        }
        if empty {
            self.writer.write_record(["player", "balance"])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn render(rows: Vec<(&str, Balance)>) -> String {
        let mut out = Vec::new();
        BalanceWriter::new(&mut out).write_balances(rows).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_writes_header_and_two_decimals() {
        let out = render(vec![
            ("alice", Balance::new(dec!(87.5))),
            ("bob", Balance::new(dec!(12.345))),
        ]);
        assert_eq!(out, "player,balance\nalice,87.50\nbob,12.34\n");
    }

    #[test]
    fn test_empty_report_still_has_header() {
        assert_eq!(render(Vec::new()), "player,balance\n");
    }
}
