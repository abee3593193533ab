use crate::AshareError;

/// Exchange suffix assigned to a normalised A-share ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// Shanghai Stock Exchange.
    Sse,
    /// Shenzhen Stock Exchange.
    Szse,
    /// Beijing Stock Exchange.
    Bse,
}

impl Exchange {
    pub fn suffix(self) -> &'static str {
        match self {
            Exchange::Sse => ".SH",
            Exchange::Szse => ".SZ",
            Exchange::Bse => ".BJ",
        }
    }
}

/// Classifies a six-digit code's exchange by its leading digit.
pub fn exchange_for(code: &str) -> Result<Exchange, AshareError> {
    if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AshareError::InvalidTicker(code.to_string()));
    }
    match code.as_bytes()[0] {
        b'6' | b'9' => Ok(Exchange::Sse),
        b'0' | b'2' | b'3' => Ok(Exchange::Szse),
        b'4' | b'8' => Ok(Exchange::Bse),
        _ => Err(AshareError::InvalidTicker(code.to_string())),
    }
}

/// Appends the exchange suffix Tushare/AKShare expect, e.g. `600036` -> `600036.SH`.
pub fn normalize_ticker(code: &str) -> Result<String, AshareError> {
    let exchange = exchange_for(code)?;
    Ok(format!("{code}{}", exchange.suffix()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_prefixes() {
        assert_eq!(normalize_ticker("600036").unwrap(), "600036.SH");
        assert_eq!(normalize_ticker("900001").unwrap(), "900001.SH");
    }

    #[test]
    fn szse_prefixes() {
        assert_eq!(normalize_ticker("000001").unwrap(), "000001.SZ");
        assert_eq!(normalize_ticker("200001").unwrap(), "200001.SZ");
        assert_eq!(normalize_ticker("300750").unwrap(), "300750.SZ");
    }

    #[test]
    fn bse_prefixes() {
        assert_eq!(normalize_ticker("430047").unwrap(), "430047.BJ");
        assert_eq!(normalize_ticker("830799").unwrap(), "830799.BJ");
    }

    #[test]
    fn rejects_non_six_digit() {
        assert!(normalize_ticker("60003").is_err());
        assert!(normalize_ticker("6000366").is_err());
        assert!(normalize_ticker("60A036").is_err());
    }
}
