//! Flux query text for the two requests the analyzer makes.

use chrono::Duration;

use crate::models::request_params::{OhlcQuery, Tag};

/// Measurement the price bars are written under.
pub const PRICE_MEASUREMENT: &str = "price";

/// Escapes a value for use inside a double-quoted Flux string literal.
///
/// Besides backslash and `"`, only the interpolation opener `${` needs escaping;
/// a lone `$` is literal.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders a duration as a Flux duration literal (`30d`, `1h`, `90m`, `45s`).
pub fn duration_literal(d: Duration) -> String {
    let secs = d.num_seconds().max(1);
    if secs % 86_400 == 0 {
        format!("{}d", secs / 86_400)
    } else if secs % 3_600 == 0 {
        format!("{}h", secs / 3_600)
    } else if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

/// `schema.tagValues` query listing the distinct values of `tag`.
pub fn tag_values(bucket: &str, tag: Tag) -> String {
    format!(
        "import \"influxdata/influxdb/schema\"\nschema.tagValues(bucket: \"{}\", tag: \"{}\")",
        escape(bucket),
        tag.name()
    )
}

/// Query returning the last open/high/low/close per resolution window.
pub fn ohlc(query: &OhlcQuery) -> String {
    let brokers_filter = query
        .brokers
        .iter()
        .map(|b| format!("r[\"broker\"] == \"{}\"", escape(b)))
        .collect::<Vec<_>>()
        .join(" or ");

    format!(
        r#"from(bucket: "{bucket}")
  |> range(start: -{window})
  |> filter(fn: (r) => r["_measurement"] == "{measurement}" and ({brokers_filter}))
  |> filter(fn: (r) => r["_field"] == "close" or r["_field"] == "high" or r["_field"] == "low" or r["_field"] == "open")
  |> filter(fn: (r) => r["period"] == "{timeframe}" and r["symbol"] == "{symbol}")
  |> aggregateWindow(every: {every}, fn: last, createEmpty: false)"#,
        bucket = escape(&query.bucket),
        window = duration_literal(query.window),
        measurement = PRICE_MEASUREMENT,
        brokers_filter = brokers_filter,
        timeframe = escape(&query.timeframe),
        symbol = escape(&query.symbol),
        every = duration_literal(query.resolution),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_string_literals() {
        assert_eq!(escape(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape("${x}"), "\\${x}");
        assert_eq!(escape("US$ 5$"), "US$ 5$");
        assert_eq!(escape("$${"), "$\\${");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn duration_literals() {
        assert_eq!(duration_literal(Duration::days(30)), "30d");
        assert_eq!(duration_literal(Duration::hours(1)), "1h");
        assert_eq!(duration_literal(Duration::minutes(90)), "90m");
        assert_eq!(duration_literal(Duration::seconds(45)), "45s");
    }

    #[test]
    fn tag_values_query() {
        let q = tag_values("fx", Tag::Period);
        assert!(q.starts_with("import \"influxdata/influxdb/schema\""));
        assert!(q.contains("schema.tagValues(bucket: \"fx\", tag: \"period\")"));
    }

    #[test]
    fn ohlc_query_filters_every_broker() {
        let query = OhlcQuery::new(
            "fx",
            vec!["icm".into(), "pep\"per".into()],
            "EURUSD",
            "M1",
        );
        let flux = ohlc(&query);
        assert!(flux.contains("range(start: -30d)"));
        assert!(flux.contains(r#"r["broker"] == "icm" or r["broker"] == "pep\"per""#));
        assert!(flux.contains(r#"r["period"] == "M1" and r["symbol"] == "EURUSD""#));
        assert!(flux.contains("aggregateWindow(every: 1h, fn: last, createEmpty: false)"));
    }
}
