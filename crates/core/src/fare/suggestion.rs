use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::rate::RateMaster;

/// Valid lookup keys offered after a `RateNotFound`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSuggestions {
    pub available_centers: Vec<String>,
    pub available_tonnages: Vec<Decimal>,
}

impl RateSuggestions {
    /// Distinct, ascending. Exact listing, no fuzzy matching.
    pub fn from_values(
        centers: impl IntoIterator<Item = String>,
        tonnages: impl IntoIterator<Item = Decimal>,
    ) -> Self {
        let available_centers = centers
            .into_iter()
            .map(|center| center.trim().to_string())
            .filter(|center| !center.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let available_tonnages = tonnages
            .into_iter()
            .map(|tonnage| tonnage.normalize())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self { available_centers, available_tonnages }
    }

    pub fn is_empty(&self) -> bool {
        self.available_centers.is_empty() && self.available_tonnages.is_empty()
    }
}

/// Suggestions over a set of masters; inactive ones are skipped.
pub fn suggest(masters: &[RateMaster]) -> RateSuggestions {
    let active = masters.iter().filter(|master| master.active);
    RateSuggestions::from_values(
        active.clone().map(|master| master.center_name.clone()),
        active.map(|master| master.tonnage),
    )
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::{suggest, RateSuggestions};
    use crate::domain::rate::RateMaster;
    use crate::fare::testing::master;

    #[test]
    fn lists_distinct_sorted_active_values() {
        let masters = vec![
            master("m-1", "서울센터", dec!(5)),
            master("m-2", "부산센터", dec!(2.5)),
            master("m-3", "서울센터", dec!(1)),
            master("m-4", "부산센터", dec!(5.0)),
            RateMaster { active: false, ..master("m-5", "대구센터", dec!(11)) },
        ];

        let suggestions = suggest(&masters);

        assert_eq!(suggestions.available_centers, vec!["부산센터".to_string(), "서울센터".to_string()]);
        assert_eq!(suggestions.available_tonnages, vec![dec!(1), dec!(2.5), dec!(5)]);
    }

    #[test]
    fn empty_catalog_gives_empty_suggestions() {
        assert!(suggest(&[]).is_empty());
        assert_eq!(RateSuggestions::from_values(Vec::new(), Vec::new()), RateSuggestions::default());
    }
}
