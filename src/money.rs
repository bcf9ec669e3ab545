use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Number formatting rules of the shop's locale.
///
/// All price parsing goes through [`Locale::parse_price`]; separators and
/// the currency symbol are explicit configuration, never ambient process
/// state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Locale {
    pub currency_symbol: String,
    pub decimal_separator: char,
    pub thousands_separator: Option<char>,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            currency_symbol: "$".to_string(),
            decimal_separator: '.',
            thousands_separator: Some(','),
        }
    }
}

impl Locale {
    /// Extract a price from raw page text under these rules.
    ///
    /// The currency symbol is stripped first since it may itself contain
    /// separator characters (e.g. "руб."). Returns `None` when no numeric
    /// value survives normalization.
    pub fn parse_price(&self, text: &str) -> Option<Decimal> {
        let mut cleaned = text.replace(&self.currency_symbol, "");
        cleaned.retain(|c| !c.is_whitespace());
        if let Some(sep) = self.thousands_separator {
            if sep != self.decimal_separator {
                cleaned = cleaned.replace(sep, "");
            }
        }
        let cleaned = cleaned.replace(self.decimal_separator, ".");

        let number = Regex::new(r"\d+(?:\.\d+)?").ok()?.find(&cleaned)?;
        Decimal::from_str(number.as_str()).ok()
    }

    /// Render a price for logs and notifications.
    pub fn format_price(&self, price: Decimal) -> String {
        format!("{} {}", price, self.currency_symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ru() -> Locale {
        Locale {
            currency_symbol: "руб.".to_string(),
            decimal_separator: '.',
            thousands_separator: Some(' '),
        }
    }

    fn de() -> Locale {
        Locale {
            currency_symbol: "€".to_string(),
            decimal_separator: ',',
            thousands_separator: Some('.'),
        }
    }

    #[rstest]
    #[case("36990", "36990")]
    #[case("36 990.00 руб.", "36990.00")]
    #[case("цена: 1 249 990 руб.", "1249990")]
    #[case("107.50", "107.50")]
    fn test_parse_price_ru(#[case] input: &str, #[case] expected: &str) {
        let price = ru().parse_price(input).unwrap();
        assert_eq!(price, Decimal::from_str(expected).unwrap());
    }

    #[rstest]
    #[case("$1,299.99", "1299.99")]
    #[case("1,299", "1299")]
    #[case("price $45", "45")]
    fn test_parse_price_default(#[case] input: &str, #[case] expected: &str) {
        let price = Locale::default().parse_price(input).unwrap();
        assert_eq!(price, Decimal::from_str(expected).unwrap());
    }

    #[rstest]
    #[case("1.234,56 €", "1234.56")]
    #[case("99,90€", "99.90")]
    fn test_parse_price_comma_decimal(#[case] input: &str, #[case] expected: &str) {
        let price = de().parse_price(input).unwrap();
        assert_eq!(price, Decimal::from_str(expected).unwrap());
    }

    #[rstest]
    #[case("")]
    #[case("call for price")]
    #[case("руб.")]
    fn test_parse_price_rejects_garbage(#[case] input: &str) {
        assert!(ru().parse_price(input).is_none());
    }

    #[test]
    fn test_format_price() {
        let locale = ru();
        let price = Decimal::from_str("34990.00").unwrap();
        assert_eq!(locale.format_price(price), "34990.00 руб.");
    }
}
