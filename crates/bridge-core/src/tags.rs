//! Static register-to-tag table.
//!
//! Each entry is keyed by the logical (4xxxx) address of a 32-bit float. The
//! table is compiled in and never changes at runtime.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagMapping {
    pub address: u32,
    pub tag: &'static str,
    /// Ordered metric keys. Empty entries are placeholders and are skipped.
    pub metric_keys: &'static [&'static str],
}

impl TagMapping {
    /// Metric keys that actually receive a value.
    pub fn active_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.metric_keys.iter().copied().filter(|key| !key.is_empty())
    }
}

const fn entry(
    address: u32,
    tag: &'static str,
    metric_keys: &'static [&'static str],
) -> TagMapping {
    TagMapping {
        address,
        tag,
        metric_keys,
    }
}

pub const FLOW_METER: &str = "FIT-90000";
pub const GAS_CHROMATOGRAPH: &str = "GC-1";
pub const TEMPERATURE: &str = "TIT-90000";
pub const PRESSURE: &str = "PIT-90000";
pub const FLOW_COMPUTER: &str = "FC-90000";

/// Stream 1 metering table, sorted by address.
pub static REFERENCE_TABLE: [TagMapping; 36] = [
    entry(42001, FLOW_METER, &["Gross_Volume_Flow_Rate", ""]),
    entry(42003, GAS_CHROMATOGRAPH, &["Standard_Flowrate", ""]),
    entry(42005, FLOW_METER, &["Mass_Flow_Rate", ""]),
    entry(42007, FLOW_METER, &["Energy_Flow_Rate", ""]),
    entry(42009, TEMPERATURE, &["Independent_Temperature", ""]),
    entry(42011, PRESSURE, &["Independent_Pressure", ""]),
    entry(42013, FLOW_COMPUTER, &["Stream1_GIV", ""]),
    entry(42015, FLOW_COMPUTER, &["Stream1_GSV", ""]),
    entry(42017, FLOW_COMPUTER, &["Stream1_MAS", ""]),
    entry(42019, FLOW_COMPUTER, &["Stream1_EGY", ""]),
    entry(42021, FLOW_COMPUTER, &["Station1_GIV", ""]),
    entry(42023, FLOW_COMPUTER, &["Station1_GSV", ""]),
    entry(42025, FLOW_COMPUTER, &["Station1_MAS", ""]),
    entry(42027, FLOW_COMPUTER, &["Station1_EGY", ""]),
    entry(42029, GAS_CHROMATOGRAPH, &["Comp_C1", ""]),
    entry(42031, GAS_CHROMATOGRAPH, &["Comp_N2", ""]),
    entry(42033, GAS_CHROMATOGRAPH, &["Comp_CO2", ""]),
    entry(42035, GAS_CHROMATOGRAPH, &["Comp_C2", ""]),
    entry(42037, GAS_CHROMATOGRAPH, &["Comp_C3", ""]),
    entry(42039, GAS_CHROMATOGRAPH, &["Comp_H2O", ""]),
    entry(42041, GAS_CHROMATOGRAPH, &["Comp_H2S", ""]),
    entry(42043, GAS_CHROMATOGRAPH, &["Comp_H2", ""]),
    entry(42045, GAS_CHROMATOGRAPH, &["Comp_C1O", ""]),
    entry(42047, GAS_CHROMATOGRAPH, &["Comp_O2", ""]),
    entry(42049, GAS_CHROMATOGRAPH, &["Comp_IC4", ""]),
    entry(42051, GAS_CHROMATOGRAPH, &["Comp_NC4", ""]),
    entry(42053, GAS_CHROMATOGRAPH, &["Comp_IC5", ""]),
    entry(42055, GAS_CHROMATOGRAPH, &["Comp_NC5", ""]),
    entry(42057, GAS_CHROMATOGRAPH, &["Comp_NC6", ""]),
    entry(42059, GAS_CHROMATOGRAPH, &["Comp_NC7", ""]),
    entry(42061, GAS_CHROMATOGRAPH, &["Comp_NC8", ""]),
    entry(42063, GAS_CHROMATOGRAPH, &["Comp_NC9", ""]),
    entry(42065, GAS_CHROMATOGRAPH, &["Comp_NC10", ""]),
    entry(42067, GAS_CHROMATOGRAPH, &["Comp_HE", ""]),
    entry(42069, GAS_CHROMATOGRAPH, &["Comp_AR", ""]),
    entry(42071, GAS_CHROMATOGRAPH, &["Comp_NEOC5", ""]),
];

/// Read-only view over a sorted slice of [`TagMapping`]s.
#[derive(Debug, Clone, Copy)]
pub struct TagMap {
    entries: &'static [TagMapping],
}

impl TagMap {
    /// `entries` must be sorted by address with no duplicates.
    pub const fn new(entries: &'static [TagMapping]) -> Self {
        Self { entries }
    }

    pub fn reference() -> Self {
        Self::new(&REFERENCE_TABLE)
    }

    pub fn lookup(&self, address: u32) -> Option<&'static TagMapping> {
        let entries: &'static [TagMapping] = self.entries;
        entries
            .binary_search_by_key(&address, |m| m.address)
            .ok()
            .map(|idx| &entries[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static TagMapping> {
        let entries: &'static [TagMapping] = self.entries;
        entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TagMap {
    fn default() -> Self {
        Self::reference()
    }
}
