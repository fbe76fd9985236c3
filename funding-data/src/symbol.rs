use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Separators exchanges use between base and quote (eg/ `BTC-USDC`, `BTC/USDC`, `BTC_USDC`).
const SEPARATORS: [char; 3] = ['-', '/', '_'];

/// Exchange specific market identifier, kept in the exchange's own casing and separator
/// convention (eg/ Apex `BTC-USDC`, Hyperliquid `BTC`).
#[derive(
    Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Display, From, Deserialize, Serialize,
)]
pub struct Symbol(pub SmolStr);

impl Symbol {
    pub fn new<S: AsRef<str>>(symbol: S) -> Self {
        Self(SmolStr::new(symbol))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Form used for cross-feed comparison: any settlement suffix (`:USDC`) is dropped and
    /// separators are stripped. Casing is preserved since some exchanges list symbols that
    /// only differ by case (eg/ Hyperliquid `kPEPE`).
    pub fn normalised(&self) -> SmolStr {
        let market = self
            .0
            .split_once(':')
            .map(|(market, _settle)| market)
            .unwrap_or(self.0.as_str());

        market
            .chars()
            .filter(|character| !SEPARATORS.contains(character))
            .collect()
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_normalised() {
        struct TestCase {
            input: &'static str,
            expected: &'static str,
        }

        let tests = vec![
            TestCase {
                // TC0: Apex dash separated symbol
                input: "BTC-USDC",
                expected: "BTCUSDC",
            },
            TestCase {
                // TC1: Hyperliquid coin name is already normalised
                input: "BTC",
                expected: "BTC",
            },
            TestCase {
                // TC2: unified market with settlement suffix
                input: "ETH/USDC:USDC",
                expected: "ETHUSDC",
            },
            TestCase {
                // TC3: casing is preserved
                input: "kPEPE",
                expected: "kPEPE",
            },
            TestCase {
                // TC4: underscore separated symbol
                input: "SOL_USDT",
                expected: "SOLUSDT",
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = Symbol::new(test.input).normalised();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_symbol_ordering_is_case_sensitive() {
        let mut symbols = vec![Symbol::new("kPEPE"), Symbol::new("ETH"), Symbol::new("BTC")];
        symbols.sort();
        assert_eq!(
            symbols,
            vec![Symbol::new("BTC"), Symbol::new("ETH"), Symbol::new("kPEPE")]
        );
    }
}
