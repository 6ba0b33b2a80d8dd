//! Instrument dump parsing.
//!
//! `GET /instruments/{exchange}` returns CSV with a header row:
//! `instrument_token,exchange_token,tradingsymbol,name,last_price,expiry,
//! strike,tick_size,lot_size,instrument_type,segment,exchange`.
//! Columns are located by header name; quoted fields may contain commas.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::error::KiteError;
use crate::domain::instrument::Instrument;
use crate::domain::symbol::InstrumentToken;

/// Split one CSV line, honouring double quotes and `""` escapes.
fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

struct Columns(HashMap<String, usize>);

impl Columns {
    fn get<'a>(&self, row: &'a [String], name: &str) -> &'a str {
        self.0
            .get(name)
            .and_then(|i| row.get(*i))
            .map_or("", |s| s.trim())
    }

    fn parse<T: FromStr>(&self, row: &[String], name: &str) -> Option<T> {
        self.get(row, name).parse().ok()
    }
}

/// Parse a CSV instrument dump.
///
/// Rows without a token or trading symbol are skipped.
///
/// # Errors
///
/// Returns `KiteError::Decode` when the header lacks the token or symbol
/// column.
pub fn parse_instruments(csv: &str) -> Result<Vec<Instrument>, KiteError> {
    let mut lines = csv.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| KiteError::Decode("empty instrument dump".to_string()))?;
    let columns = Columns(
        split_line(header)
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect(),
    );
    for required in ["instrument_token", "tradingsymbol"] {
        if !columns.0.contains_key(required) {
            return Err(KiteError::Decode(format!(
                "instrument dump missing {required} column"
            )));
        }
    }

    let mut skipped = 0_usize;
    let instruments: Vec<Instrument> = lines
        .filter_map(|line| {
            let row = split_line(line);
            let token = columns.parse::<u32>(&row, "instrument_token");
            let tradingsymbol = columns.get(&row, "tradingsymbol");
            let (Some(token), false) = (token, tradingsymbol.is_empty()) else {
                skipped += 1;
                return None;
            };
            Some(Instrument {
                token: InstrumentToken::new(token),
                exchange_token: columns.parse(&row, "exchange_token").unwrap_or_default(),
                tradingsymbol: tradingsymbol.to_string(),
                name: columns.get(&row, "name").to_string(),
                expiry: NaiveDate::parse_from_str(columns.get(&row, "expiry"), "%Y-%m-%d").ok(),
                strike: columns.parse::<Decimal>(&row, "strike").unwrap_or_default(),
                tick_size: columns.parse::<Decimal>(&row, "tick_size").unwrap_or_default(),
                lot_size: columns.parse(&row, "lot_size").unwrap_or_default(),
                instrument_type: columns.get(&row, "instrument_type").to_string(),
                segment: columns.get(&row, "segment").to_string(),
                exchange: columns.get(&row, "exchange").to_string(),
            })
        })
        .collect();

    if skipped > 0 {
        tracing::debug!(skipped, "Skipped malformed instrument rows");
    }
    Ok(instruments)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    const DUMP: &str = "\
instrument_token,exchange_token,tradingsymbol,name,last_price,expiry,strike,tick_size,lot_size,instrument_type,segment,exchange
408065,1594,INFY,\"INFOSYS, LTD\",0,,0,0.05,1,EQ,NSE,NSE
13368066,52219,NIFTY25JAN24000CE,\"NIFTY\",0,2025-01-30,24000,0.05,75,CE,NFO-OPT,NFO
bad,1,BROKEN,,0,,0,0.05,1,EQ,NSE,NSE
";

    #[test]
    fn parses_rows_by_header() {
        let instruments = parse_instruments(DUMP).unwrap();
        assert_eq!(instruments.len(), 2);

        let infy = &instruments[0];
        assert_eq!(infy.token, InstrumentToken::new(408_065));
        assert_eq!(infy.name, "INFOSYS, LTD");
        assert_eq!(infy.expiry, None);
        assert_eq!(infy.tick_size, dec!(0.05));

        let option = &instruments[1];
        assert_eq!(option.expiry, NaiveDate::from_ymd_opt(2025, 1, 30));
        assert_eq!(option.strike, dec!(24000));
        assert_eq!(option.lot_size, 75);
        assert_eq!(option.symbol_key().unwrap().as_str(), "NFO:NIFTY25JAN24000CE");
    }

    #[test]
    fn quoted_quotes_unescape() {
        assert_eq!(split_line(r#"a,"b ""c"", d",e"#), ["a", r#"b "c", d"#, "e"]);
    }

    #[test]
    fn missing_token_column_is_an_error() {
        assert!(matches!(
            parse_instruments("tradingsymbol,name\nINFY,Infosys"),
            Err(KiteError::Decode(_))
        ));
        assert!(parse_instruments("").is_err());
    }
}
