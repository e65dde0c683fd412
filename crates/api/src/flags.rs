//! Feature flags choosing between the workflow and the legacy path.

use std::collections::HashSet;

/// Operations that can run either as a workflow or through the legacy
/// direct-service path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowFlag {
    RemovePriceListProducts,
    CreateProducts,
    CreateShipment,
}

impl WorkflowFlag {
    pub const ALL: [WorkflowFlag; 3] = [
        WorkflowFlag::RemovePriceListProducts,
        WorkflowFlag::CreateProducts,
        WorkflowFlag::CreateShipment,
    ];

    /// Name of the flag in `WORKFLOW_FLAGS`.
    pub fn key(&self) -> &'static str {
        match self {
            WorkflowFlag::RemovePriceListProducts => "remove_price_list_products",
            WorkflowFlag::CreateProducts => "create_products",
            WorkflowFlag::CreateShipment => "create_shipment",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.key() == key)
    }
}

/// The set of enabled workflow flags.
#[derive(Debug, Clone, Default)]
pub struct FlagRouter {
    enabled: HashSet<WorkflowFlag>,
}

impl FlagRouter {
    /// A router with every flag disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// A router with every flag enabled.
    pub fn all() -> Self {
        Self {
            enabled: WorkflowFlag::ALL.into_iter().collect(),
        }
    }

    /// Parses a comma-separated list of flag keys. `all` enables every flag.
    /// Unknown keys are logged and ignored.
    pub fn parse(list: &str) -> Self {
        let mut router = Self::new();
        for key in list.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            if key.eq_ignore_ascii_case("all") {
                return Self::all();
            }
            match WorkflowFlag::from_key(key) {
                Some(flag) => router = router.with(flag),
                None => tracing::warn!(flag = %key, "Ignoring unknown workflow flag"),
            }
        }
        router
    }

    /// Enables `flag`.
    pub fn with(mut self, flag: WorkflowFlag) -> Self {
        self.enabled.insert(flag);
        self
    }

    pub fn is_enabled(&self, flag: WorkflowFlag) -> bool {
        self.enabled.contains(&flag)
    }

    /// Keys of the enabled flags, in declaration order.
    pub fn enabled_keys(&self) -> Vec<&'static str> {
        WorkflowFlag::ALL
            .into_iter()
            .filter(|flag| self.is_enabled(*flag))
            .map(|flag| flag.key())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let flags = FlagRouter::parse(" create_shipment, remove_price_list_products ,bogus");
        assert!(flags.is_enabled(WorkflowFlag::CreateShipment));
        assert!(flags.is_enabled(WorkflowFlag::RemovePriceListProducts));
        assert!(!flags.is_enabled(WorkflowFlag::CreateProducts));
    }

    #[test]
    fn test_parse_all() {
        let flags = FlagRouter::parse("ALL");
        assert!(WorkflowFlag::ALL.iter().all(|f| flags.is_enabled(*f)));
    }

    #[test]
    fn test_empty_disables_everything() {
        let flags = FlagRouter::parse("");
        assert!(WorkflowFlag::ALL.iter().all(|f| !flags.is_enabled(*f)));
    }

    #[test]
    fn test_keys_round_trip() {
        for flag in WorkflowFlag::ALL {
            assert_eq!(WorkflowFlag::from_key(flag.key()), Some(flag));
        }
    }
}
