//! Admin overview grouping: bids bucketed by trading group.

use std::collections::BTreeMap;

use bpr_schemas::BidPosting;
use serde::Serialize;

/// Anything that can be grouped like a bid posting.
pub trait Grouped {
    fn group_key(&self) -> &str;
    fn consignee(&self) -> &str;
}

impl Grouped for BidPosting {
    fn group_key(&self) -> &str {
        &self.group
    }

    fn consignee(&self) -> &str {
        &self.consignee
    }
}

impl<T: Grouped> Grouped for &T {
    fn group_key(&self) -> &str {
        (**self).group_key()
    }

    fn consignee(&self) -> &str {
        (**self).consignee()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BidGroup<T> {
    pub group: String,
    /// Source order within the group.
    pub bids: Vec<T>,
    /// Distinct consignee names, first appearance order.
    pub distinct_consignees: Vec<String>,
}

/// Groups ascending by group name. Bids keep their relative order.
pub fn group_by_bid_group<T: Grouped>(bids: impl IntoIterator<Item = T>) -> Vec<BidGroup<T>> {
    let mut groups: BTreeMap<String, BidGroup<T>> = BTreeMap::new();

    for bid in bids {
        let key = bid.group_key().to_string();
        let consignee = bid.consignee().to_string();

        let g = groups.entry(key.clone()).or_insert_with(|| BidGroup {
            group: key,
            bids: Vec::new(),
            distinct_consignees: Vec::new(),
        });
        if !g.distinct_consignees.contains(&consignee) {
            g.distinct_consignees.push(consignee);
        }
        g.bids.push(bid);
    }

    groups.into_values().collect()
}
