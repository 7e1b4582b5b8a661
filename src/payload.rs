// src/payload.rs
//! Target field table and payload assembly for one feed entry.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::derive::DerivedMetrics;
use crate::feed::FeedEntry;

/// Bumped whenever a raw → canonical pair is added, removed or renamed.
pub const FIELD_MAPPING_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// `true` iff the raw value equals "true" ignoring case.
    Switch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub raw: &'static str,
    pub canonical: &'static str,
    pub kind: FieldKind,
}

const fn text(raw: &'static str, canonical: &'static str) -> FieldSpec {
    FieldSpec {
        raw,
        canonical,
        kind: FieldKind::Text,
    }
}

const fn switch(raw: &'static str, canonical: &'static str) -> FieldSpec {
    FieldSpec {
        raw,
        canonical,
        kind: FieldKind::Switch,
    }
}

/// Raw feed attribute -> canonical CMS field.
pub const FIELD_MAPPING: &[FieldSpec] = &[
    switch("mellomfinansiering", "f-mellomfinansiering"),
    switch("boliglan_for_unge", "f-boliglan-for-unge"),
    switch("forstehjemslan", "f-forstehjemslan"),
    switch("rammelan", "f-rammelan"),
    switch("lan_fritidsbolig", "f-lan-fritidsbolig"),
    text("trenger_ikke_pakke", "f-trenger-ikke-pakke"),
    text("gront_boliglan_miljoboliglan", "f-gront-boliglan-miljoboliglan"),
    text("student", "f-student"),
    text("rentetak", "f-rentetak"),
    text("byggelan", "f-byggelan"),
    text("pensjonist", "f-pensjonist"),
    text("renteberegning", "f-renteberegning"),
    text("produktpakke_tekst", "f-produktpakke-tekst"),
    text("min_alder", "f-min-alder"),
    text("forbehold", "f-forbehold-2"),
    text("etableringsgebyr", "f-etableringsgebyr"),
    text("maks_belaningsgrad", "f-maks-belaningsgrad"),
    text("depotgebyr", "f-depotgebyr"),
    text("nominell_rente_1_a", "f-nominell-rente-1-a"),
    text("maks_belop_a", "f-maks-belop-a"),
    text("markedsomraade", "f-markedsomraade"),
    text("maks_avdragsfrihet", "f-maks-avdragsfrihet"),
    text("min_belop_a", "f-min-belop-a"),
    text("termingebyr_1_a", "f-termingebyr-1-a"),
    text("rentebinding_ar", "f-rentebinding-ar"),
    text("maks_lopetid", "f-maks-lopetid"),
];

pub const FIELD_NAME: &str = "name";
pub const FIELD_SLUG: &str = "slug";
pub const FIELD_SUPPLIER: &str = "f-leverandor-tekst";
pub const FIELD_EFFECTIVE_RATE: &str = "f-effektiv-rente";
pub const FIELD_TOTAL_BANKS: &str = "total-banks";
pub const FIELD_AVERAGE_RATE: &str = "average-interest-rate";
pub const FIELD_IS_MORTGAGE: &str = "boliglan";
pub const FIELD_EXAMPLE_COST: &str = "eksempel-rente";
pub const FIELD_UPDATED: &str = "sist-oppdatert";
pub const FIELD_BANK: &str = "bank";

const MORTGAGE_MARKER: &str = "Boliglån";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Switch(bool),
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Switch(_) => None,
        }
    }

    pub fn as_switch(&self) -> Option<bool> {
        match self {
            FieldValue::Switch(b) => Some(*b),
            FieldValue::Text(_) => None,
        }
    }
}

/// `fieldData` of a write: canonical field name -> value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, FieldValue>);

impl Payload {
    pub fn insert(&mut self, field: &str, value: FieldValue) {
        self.0.insert(field.to_string(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.0.remove(field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Values computed once per run and stamped into every payload.
#[derive(Debug, Clone, PartialEq)]
pub struct RunAggregates {
    pub total_entries: usize,
    pub average_nominal_rate: f64,
    pub updated_stamp: String,
}

pub fn is_true(raw: Option<&str>) -> bool {
    raw.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Candidate payload for `entry`: every mapped attribute plus the computed
/// fields. Contains neither `slug` nor `bank`; those depend on the lookup and
/// the create/update decision.
pub fn assemble_payload(
    entry: &FeedEntry,
    metrics: &DerivedMetrics,
    run: &RunAggregates,
) -> Payload {
    let mut p = Payload::default();

    for field in FIELD_MAPPING {
        let raw = entry.attribute(field.raw);
        let value = match field.kind {
            FieldKind::Text => FieldValue::text(raw.unwrap_or_default()),
            FieldKind::Switch => FieldValue::Switch(is_true(raw)),
        };
        p.insert(field.canonical, value);
    }

    p.insert(FIELD_NAME, FieldValue::text(&entry.title));
    p.insert(FIELD_SUPPLIER, FieldValue::text(&entry.supplier_label));
    p.insert(
        FIELD_EFFECTIVE_RATE,
        FieldValue::text(format!("{:.2}", metrics.effective_rate_percent)),
    );
    p.insert(
        FIELD_TOTAL_BANKS,
        FieldValue::text(run.total_entries.to_string()),
    );
    p.insert(
        FIELD_AVERAGE_RATE,
        FieldValue::text(format!("{:.2}", run.average_nominal_rate)),
    );
    p.insert(
        FIELD_IS_MORTGAGE,
        FieldValue::Switch(entry.title.contains(MORTGAGE_MARKER)),
    );
    p.insert(
        FIELD_EXAMPLE_COST,
        FieldValue::text(&metrics.example_cost_text),
    );
    p.insert(FIELD_UPDATED, FieldValue::text(&run.updated_stamp));
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> FeedEntry {
        let attributes = [
            ("nominell_rente_1_a", "5.5"),
            ("rammelan", "TRUE"),
            ("forstehjemslan", "false"),
            ("mellomfinansiering", "yes"),
            ("forbehold", "Gjelder kun nye kunder"),
            ("student", "true"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        FeedEntry {
            title: "Boliglån Grønn".into(),
            supplier_label: "Testbanken".into(),
            stable_id: "46135".into(),
            attributes,
        }
    }

    fn run() -> RunAggregates {
        RunAggregates {
            total_entries: 42,
            average_nominal_rate: 5.7571,
            updated_stamp: "Oppdatert 9. juli 2024 - 23:59".into(),
        }
    }

    #[test]
    fn table_has_unique_canonical_names() {
        let mut seen = std::collections::HashSet::new();
        for field in FIELD_MAPPING {
            assert!(seen.insert(field.canonical), "duplicate {}", field.canonical);
        }
    }

    #[test]
    fn switches_compare_case_insensitively_to_true() {
        let e = entry();
        let m = DerivedMetrics::for_attributes(&e.attributes);
        let p = assemble_payload(&e, &m, &run());
        assert_eq!(p.get("f-rammelan"), Some(&FieldValue::Switch(true)));
        assert_eq!(p.get("f-forstehjemslan"), Some(&FieldValue::Switch(false)));
        assert_eq!(p.get("f-mellomfinansiering"), Some(&FieldValue::Switch(false)));
        assert_eq!(p.get("f-lan-fritidsbolig"), Some(&FieldValue::Switch(false)));
        // text-kind fields keep the raw value
        assert_eq!(p.get("f-student"), Some(&FieldValue::text("true")));
    }

    #[test]
    fn computed_fields_are_present() {
        let e = entry();
        let m = DerivedMetrics::for_attributes(&e.attributes);
        let p = assemble_payload(&e, &m, &run());
        assert_eq!(p.get(FIELD_NAME), Some(&FieldValue::text("Boliglån Grønn")));
        assert_eq!(p.get(FIELD_SUPPLIER), Some(&FieldValue::text("Testbanken")));
        assert_eq!(p.get(FIELD_TOTAL_BANKS), Some(&FieldValue::text("42")));
        assert_eq!(p.get(FIELD_AVERAGE_RATE), Some(&FieldValue::text("5.76")));
        assert_eq!(p.get(FIELD_IS_MORTGAGE), Some(&FieldValue::Switch(true)));
        assert_eq!(
            p.get(FIELD_EFFECTIVE_RATE).and_then(FieldValue::as_text),
            Some(format!("{:.2}", m.effective_rate_percent).as_str())
        );
        assert_eq!(
            p.get(FIELD_EXAMPLE_COST).and_then(FieldValue::as_text),
            Some(m.example_cost_text.as_str())
        );
        assert_eq!(
            p.get(FIELD_UPDATED).and_then(FieldValue::as_text),
            Some("Oppdatert 9. juli 2024 - 23:59")
        );
        assert_eq!(
            p.get("f-forbehold-2"),
            Some(&FieldValue::text("Gjelder kun nye kunder"))
        );
        assert_eq!(p.get("f-maks-lopetid"), Some(&FieldValue::text("")));
        assert!(!p.contains(FIELD_SLUG));
        assert!(!p.contains(FIELD_BANK));
    }

    #[test]
    fn non_mortgage_title_is_flagged_false() {
        let mut e = entry();
        e.title = "Fritidsbolig".into();
        let m = DerivedMetrics::for_attributes(&e.attributes);
        let p = assemble_payload(&e, &m, &run());
        assert_eq!(p.get(FIELD_IS_MORTGAGE), Some(&FieldValue::Switch(false)));
    }
}
