use crate::error::ParseError;
use regex::Regex;
use std::sync::LazyLock;

// Every stage takes the (already lower-cased) line, matches at its start and
// hands back what it found plus the line with the match removed.

const PRICE_PATTERN: &str = r"(\d+)(\s*\+\s*vat|/-)";
const LEAD_TIME_PATTERN: &str = r"(\d+|\d+-\d+) (day|week|month)s?";

static LEADING_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^([a-z]\w+)").expect("leading token pattern"));

static PRICE_AT_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i)^{PRICE_PATTERN}")).expect("price pattern")
});

static PRICE_ANYWHERE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("(?i){PRICE_PATTERN}")).expect("price pattern"));

static LEAD_TIME_AT_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i)^{LEAD_TIME_PATTERN}")).expect("lead time pattern")
});

static LEAD_TIME_ANYWHERE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i){LEAD_TIME_PATTERN}")).expect("lead time pattern")
});

static BACK_ORDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(back order|no eta)").expect("back order pattern"));

static DECIMAL_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{Nd}$").expect("decimal digit pattern"));

// ---------------------------------------------------------------------------
// Part number
// ---------------------------------------------------------------------------

/// "a2143520500 - 999 + vat" -> (Some("A2143520500"), "999 + vat")
pub fn part_number(line: &str) -> Result<(Option<String>, String), ParseError> {
    let Some(cap) = LEADING_TOKEN.captures(line) else {
        return Ok((None, line.trim().to_string()));
    };
    let token = &cap[1];

    // drop the token together with a " - " separator or a trailing period
    let strip = Regex::new(&format!(r"{}( - )?\.?", regex::escape(token)))?;
    let rest = strip.replace_all(line, "");
    Ok((Some(token.to_uppercase()), rest.trim().to_string()))
}

// ---------------------------------------------------------------------------
// Price
// ---------------------------------------------------------------------------

/// "999 + vat  1 day order" -> (999.0, true, "1 day order")
///
/// Only "+ vat" and "/-" mark a number as a price. The VAT flag is cleared
/// when the supplier writes "no vat" anywhere on the line.
pub fn price(line: &str) -> Result<(f64, bool, String), ParseError> {
    let Some(cap) = PRICE_AT_START.captures(line.trim_start_matches('-')) else {
        return Ok((0.0, true, line.trim().to_string()));
    };

    let digits = &cap[1];
    let price: f64 = ascii_digits(digits)
        .parse()
        .map_err(|e| ParseError::invalid_number(digits, e))?;
    let vat = !line.contains("no vat");

    let rest = PRICE_ANYWHERE.replace_all(line, "");
    Ok((price, vat, rest.trim().to_string()))
}

// ---------------------------------------------------------------------------
// Lead time
// ---------------------------------------------------------------------------

/// "7-10 days" -> 10, "3 weeks" -> 21, "back order" -> `back_order_lead_days`.
///
/// Ranges quote the upper bound. A month is always 30 days.
pub fn lead_time(line: &str, back_order_lead_days: u32) -> Result<(u32, String), ParseError> {
    if let Some(cap) = LEAD_TIME_AT_START.captures(line.trim_start_matches('-')) {
        let num = upper_bound(&cap[1])?;
        let unit = &cap[2];
        let lead_days = match unit {
            "day" => num,
            "week" => num
                .checked_mul(7)
                .ok_or_else(|| ParseError::invalid_number(&cap[1], "too many weeks"))?,
            "month" => num
                .checked_mul(30)
                .ok_or_else(|| ParseError::invalid_number(&cap[1], "too many months"))?,
            other => return Err(ParseError::UnknownLeadUnit(other.to_string())),
        };

        let rest = LEAD_TIME_ANYWHERE.replace_all(line, "");
        return Ok((lead_days, rest.trim().to_string()));
    }

    if line.contains("back order") || line.contains("no eta") {
        let rest = BACK_ORDER.replace_all(line, "");
        return Ok((back_order_lead_days, rest.trim().to_string()));
    }

    Ok((0, line.trim().to_string()))
}

/// "7-10" -> 10, "5" -> 5
fn upper_bound(num: &str) -> Result<u32, ParseError> {
    num.split('-')
        .map(|n| {
            ascii_digits(n)
                .parse::<u32>()
                .map_err(|e| ParseError::invalid_number(n, e))
        })
        .try_fold(0, |max, n| n.map(|n| max.max(n)))
}

/// "٣٠٠" -> "300". `\d` matches any Unicode decimal digit, `parse` only ASCII.
fn ascii_digits(num: &str) -> String {
    num.chars()
        .map(|c| {
            decimal_value(c)
                .and_then(|d| char::from_digit(d, 10))
                .unwrap_or(c)
        })
        .collect()
}

/// Value of a Unicode decimal digit. Every script encodes its digits as a
/// contiguous run 0..=9, and adjacent runs only ever follow each other whole.
fn decimal_value(c: char) -> Option<u32> {
    if let Some(d) = c.to_digit(10) {
        return Some(d);
    }
    if !is_decimal_digit(c) {
        return None;
    }

    let mut zero = u32::from(c);
    while let Some(prev) = zero.checked_sub(1).and_then(char::from_u32) {
        if !is_decimal_digit(prev) {
            break;
        }
        zero -= 1;
    }
    Some((u32::from(c) - zero) % 10)
}

fn is_decimal_digit(c: char) -> bool {
    let mut buf = [0u8; 4];
    DECIMAL_DIGIT.is_match(c.encode_utf8(&mut buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_number_strips_separator() {
        let (part, rest) = part_number("a2143520500 - 999 + vat  1 day order").unwrap();
        assert_eq!(part.as_deref(), Some("A2143520500"));
        assert_eq!(rest, "999 + vat  1 day order");
    }

    #[test]
    fn test_part_number_needs_leading_letter() {
        let (part, rest) = part_number("1250 + vat").unwrap();
        assert!(part.is_none());
        assert_eq!(rest, "1250 + vat");
    }

    #[test]
    fn test_price_removed_anywhere() {
        let (price, vat, rest) = price("-410 + vat  7-10 days").unwrap();
        assert_eq!(price, 410.0);
        assert!(vat);
        assert_eq!(rest, "-  7-10 days");
    }

    #[test]
    fn test_price_must_lead() {
        let (price, vat, rest) = price("about 410 + vat").unwrap();
        assert_eq!(price, 0.0);
        assert!(vat);
        assert_eq!(rest, "about 410 + vat");
    }

    #[test]
    fn test_lead_time_units() {
        assert_eq!(lead_time("1 day order", 90).unwrap(), (1, "order".to_string()));
        assert_eq!(lead_time("3 week order", 90).unwrap().0, 21);
        assert_eq!(lead_time("2 months", 90).unwrap().0, 60);
        assert_eq!(lead_time("17-21 days", 90).unwrap().0, 21);
        assert_eq!(lead_time("10-7 days", 90).unwrap().0, 10);
    }

    #[test]
    fn test_lead_time_back_order() {
        let (days, rest) = lead_time("back order no eta", 90).unwrap();
        assert_eq!(days, 90);
        assert_eq!(rest, "");
    }

    #[test]
    fn test_lead_time_unit_is_case_sensitive_after_match() {
        // the pattern accepts any case, the conversion table only lower case
        let err = lead_time("3 WEEKS", 90).unwrap_err();
        assert!(matches!(err, ParseError::UnknownLeadUnit(ref u) if u == "WEEK"));
    }

    #[test]
    fn test_non_ascii_digits() {
        assert_eq!(ascii_digits("٣٠٠"), "300");
        assert_eq!(ascii_digits("۱۲"), "12");
        assert_eq!(ascii_digits("१५"), "15");
        assert_eq!(ascii_digits("１２０"), "120");
        assert_eq!(ascii_digits("7-10"), "7-10");

        let (price, _, rest) = price("٣٠٠ + vat ٧-١٠ days").unwrap();
        assert_eq!(price, 300.0);
        assert_eq!(lead_time(&rest, 90).unwrap().0, 10);
    }

    #[test]
    fn test_lead_time_overflow() {
        let err = lead_time("999999999 months", 90).unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { .. }));
    }
}
