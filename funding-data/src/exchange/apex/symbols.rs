use crate::{exchange::Listing, symbol::Symbol};
use itertools::Itertools;
use serde::Deserialize;

/// [`Apex`](super::Apex) `GET /api/v2/symbols` response.
///
/// ### Raw Payload Examples
/// ```json
/// {
///   "data": {
///     "usdcConfig": {
///       "perpetualContract": [
///         {"symbol": "BTC-USDC", "displayMaxLeverage": "100", "enableTrade": true}
///       ]
///     },
///     "usdtConfig": {
///       "perpetualContract": [
///         {"symbol": "BTC-USDT", "displayMaxLeverage": "50", "enableTrade": true}
///       ]
///     }
///   }
/// }
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ApexSymbols {
    pub data: Option<ApexSymbolsData>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApexSymbolsData {
    #[serde(default)]
    pub usdc_config: Option<ApexQuoteConfig>,
    #[serde(default)]
    pub usdt_config: Option<ApexQuoteConfig>,
}

/// Contracts settled in one quote currency.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApexQuoteConfig {
    #[serde(default)]
    pub perpetual_contract: Vec<ApexContract>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApexContract {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, deserialize_with = "crate::de::de_opt_u32_or_unknown")]
    pub display_max_leverage: Option<u32>,
}

impl ApexSymbolsData {
    /// Contracts across every quote currency configuration.
    pub fn contracts(&self) -> impl Iterator<Item = &ApexContract> {
        [&self.usdc_config, &self.usdt_config]
            .into_iter()
            .flatten()
            .flat_map(|config| config.perpetual_contract.iter())
    }

    /// De-duplicated, sorted symbol [`Listing`] with leverage metadata.
    pub fn listing(&self) -> Listing {
        self.contracts()
            .filter_map(|contract| {
                contract
                    .symbol
                    .as_deref()
                    .map(|symbol| (Symbol::new(symbol), contract.display_max_leverage))
            })
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .dedup_by(|(a, _), (b, _)| a == b)
            .collect()
    }
}
