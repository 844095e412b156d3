//! Mergeable per-dataset outputs.
//!
//! A processor turns one chunk of events into an [`Output`]; the runner folds the chunk
//! outputs of each dataset together, and the datasets into an [`OutputSet`]. Every merge
//! is associative and commutative so chunks may finish in any order.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hist::Hist;

/// One named result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Item {
    /// Adds.
    Count(u64),
    /// Adds bin-wise.
    Hist(Hist),
    /// Event numbers; concatenated, kept sorted.
    EventList(Vec<u64>),
    /// Event number to value; union, values add on collision. Values are finite.
    EventMap(BTreeMap<u64, f64>),
}

impl Item {
    /// An [`Item::EventMap`] of the finite values in `values`.
    pub fn event_map(values: impl IntoIterator<Item = (u64, f64)>) -> Self {
        Self::EventMap(values.into_iter().filter(|(_, v)| v.is_finite()).collect())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Count(_) => "count",
            Self::Hist(_) => "hist",
            Self::EventList(_) => "event_list",
            Self::EventMap(_) => "event_map",
        }
    }

    pub fn merge(&mut self, other: Item) -> Result<()> {
        match (self, other) {
            (Self::Count(a), Self::Count(b)) => *a += b,
            (Self::Hist(a), Self::Hist(b)) => a.merge(b)?,
            (Self::EventList(a), Self::EventList(b)) => {
                a.extend(b);
                a.sort_unstable();
            }
            (Self::EventMap(a), Self::EventMap(b)) => {
                for (event, value) in b {
                    *a.entry(event).or_insert(0.0) += value;
                }
                a.retain(|_, v| v.is_finite());
            }
            (a, b) => {
                return Err(Error::Validation(format!(
                    "cannot merge {} into {}",
                    b.kind(),
                    a.kind()
                )));
            }
        }
        Ok(())
    }
}

/// The results of one dataset, by item name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Output {
    items: BTreeMap<String, Item>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, item: Item) {
        self.items.insert(name.to_string(), item);
    }

    pub fn get(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    pub fn items(&self) -> impl Iterator<Item = (&str, &Item)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count(&self, name: &str) -> Option<u64> {
        match self.items.get(name)? {
            Item::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn hist(&self, name: &str) -> Option<&Hist> {
        match self.items.get(name)? {
            Item::Hist(h) => Some(h),
            _ => None,
        }
    }

    pub fn event_list(&self, name: &str) -> Option<&[u64]> {
        match self.items.get(name)? {
            Item::EventList(v) => Some(v),
            _ => None,
        }
    }

    pub fn event_map(&self, name: &str) -> Option<&BTreeMap<u64, f64>> {
        match self.items.get(name)? {
            Item::EventMap(m) => Some(m),
            _ => None,
        }
    }

    /// Merge `item` into the entry `name`, creating it if absent.
    pub fn add(&mut self, name: &str, item: Item) -> Result<()> {
        match self.items.entry(name.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(item);
                Ok(())
            }
            Entry::Occupied(mut slot) => slot.get_mut().merge(item).map_err(|e| match e {
                Error::HistogramMismatch(m) => Error::HistogramMismatch(format!("'{name}': {m}")),
                Error::Validation(m) => Error::Validation(format!("'{name}': {m}")),
                other => other,
            }),
        }
    }

    pub fn merge(&mut self, other: Output) -> Result<()> {
        for (name, item) in other.items {
            self.add(&name, item)?;
        }
        Ok(())
    }
}

/// Outputs keyed by dataset name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSet {
    datasets: BTreeMap<String, Output>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `output` into the dataset's entry.
    pub fn add(&mut self, dataset: &str, output: Output) -> Result<()> {
        match self.datasets.entry(dataset.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(output);
                Ok(())
            }
            Entry::Occupied(mut slot) => slot.get_mut().merge(output),
        }
    }

    pub fn get(&self, dataset: &str) -> Option<&Output> {
        self.datasets.get(dataset)
    }

    pub fn datasets(&self) -> impl Iterator<Item = (&str, &Output)> {
        self.datasets.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn merge(&mut self, other: OutputSet) -> Result<()> {
        for (dataset, output) in other.datasets {
            self.add(&dataset, output)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hist::{Axis, BinKey};

    fn chunk(events: &[u64], q: f64) -> Output {
        let mut out = Output::new();
        out.insert("nevents", Item::Count(events.len() as u64));
        out.insert("bad_events", Item::EventList(events.to_vec()));
        out.insert("event_sumq_dict", Item::event_map(events.iter().map(|&e| (e, q))));
        let mut h = Hist::new(vec![Axis::int_category("bx", vec![], true)]).unwrap();
        for &e in events {
            h.fill(&[(e as i64 % 3).into()], q).unwrap();
        }
        out.insert("eventq", Item::Hist(h));
        out
    }

    #[test]
    fn merge_order_does_not_matter() {
        let a = chunk(&[10, 4, 7], 1.0);
        let b = chunk(&[2, 7], 3.0);

        let mut ab = a.clone();
        ab.merge(b.clone()).unwrap();
        let mut ba = b;
        ba.merge(a).unwrap();
        assert_eq!(ab, ba);

        assert_eq!(ab.count("nevents"), Some(5));
        assert_eq!(ab.event_list("bad_events").unwrap(), &[2, 4, 7, 7, 10]);
        assert_eq!(ab.event_map("event_sumq_dict").unwrap()[&7], 4.0);
        assert_eq!(ab.hist("eventq").unwrap().value(&[BinKey::Index(1)]), 6.0);
    }

    #[test]
    fn merge_is_associative() {
        let (a, b, c) = (chunk(&[1], 1.0), chunk(&[2, 3], 2.0), chunk(&[3], 5.0));
        let mut left = a.clone();
        left.merge(b.clone()).unwrap();
        left.merge(c.clone()).unwrap();
        let mut bc = b;
        bc.merge(c).unwrap();
        let mut right = a;
        right.merge(bc).unwrap();
        assert_eq!(left, right);
    }

    #[test]
    fn kind_mismatch_is_an_error() {
        let mut out = Output::new();
        out.insert("nevents", Item::Count(1));
        let err = out.add("nevents", Item::EventList(vec![1])).unwrap_err();
        assert!(err.to_string().contains("nevents"));
    }

    #[test]
    fn output_set_merges_per_dataset() {
        let mut s = OutputSet::new();
        s.add("r365373", chunk(&[1], 1.0)).unwrap();
        let mut t = OutputSet::new();
        t.add("r365373", chunk(&[2], 1.0)).unwrap();
        t.add("r365537", chunk(&[3], 1.0)).unwrap();
        s.merge(t).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.get("r365373").unwrap().count("nevents"), Some(2));
    }

    #[test]
    fn event_map_keeps_only_finite_values() {
        let item = Item::event_map([(1, 2.0), (2, f64::NAN), (3, f64::INFINITY)]);
        assert_eq!(item, Item::EventMap(BTreeMap::from([(1, 2.0)])));

        let mut out = Output::new();
        out.insert("event_sumq_dict", item);
        out.add("event_sumq_dict", Item::event_map([(1, f64::MAX), (4, 1.0)])).unwrap();
        out.add("event_sumq_dict", Item::event_map([(1, f64::MAX)])).unwrap();
        let sums = out.event_map("event_sumq_dict").unwrap();
        assert_eq!(sums.keys().copied().collect::<Vec<_>>(), vec![4]);

        let text = serde_json::to_string(&out).unwrap();
        assert!(!text.contains("null"));
        let back: Output = serde_json::from_str(&text).unwrap();
        assert_eq!(back, out);
    }

    #[test]
    fn json_round_trip() {
        let mut s = OutputSet::new();
        s.add("default", chunk(&[5, 6], 2.5)).unwrap();
        let text = serde_json::to_string(&s).unwrap();
        let back: OutputSet = serde_json::from_str(&text).unwrap();
        assert_eq!(back, s);
    }
}
