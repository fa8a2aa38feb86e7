//! Concrete [`MasterDataLookup`] used by the façade. Catalog authoring is
//! out of scope (see Non-goals); this permissive default satisfies the
//! trait boundary cart-core calls out to without a real catalog
//! integration. A deployment with an actual item master implements the
//! trait against that service instead of swapping this one out in place.

use cart_core::validation::MasterDataLookup;

pub struct PermissiveMasterData;

impl MasterDataLookup for PermissiveMasterData {
    fn contains_item(&self, _item_code: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_lookup_accepts_any_code() {
        assert!(PermissiveMasterData.contains_item("anything"));
    }
}
