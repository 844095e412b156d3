//! Sparse N-dimensional weighted histograms.
//!
//! Bins are stored sparsely, keyed by one [`BinKey`] per axis. Numeric axes key by bin
//! index with flow bins (`-1` underflow, `n` overflow); category axes key by the category
//! value itself, so merging histograms whose growing categories were discovered in a
//! different order needs no remapping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// `num` points evenly spaced in log10 between `10^start` and `10^stop` (inclusive).
pub fn logspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![10f64.powf(start)],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num).map(|i| 10f64.powf(start + step * i as f64)).collect()
        }
    }
}

/// One histogram axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Axis {
    /// `bins` equal-width bins on `[lo, hi)`.
    Regular { name: String, bins: usize, lo: f64, hi: f64 },
    /// Bins delimited by increasing `edges`.
    Variable { name: String, edges: Vec<f64> },
    /// Integer categories. Growing axes accept new values; fixed axes send them to overflow.
    IntCategory { name: String, categories: Vec<i64>, growth: bool },
    /// String categories.
    StrCategory { name: String, categories: Vec<String>, growth: bool },
}

impl Axis {
    pub fn regular(name: &str, bins: usize, lo: f64, hi: f64) -> Self {
        Self::Regular { name: name.into(), bins, lo, hi }
    }

    pub fn variable(name: &str, edges: Vec<f64>) -> Self {
        Self::Variable { name: name.into(), edges }
    }

    /// Log-spaced variable axis with edges `logspace(start, stop, n_edges)`.
    pub fn log(name: &str, start: f64, stop: f64, n_edges: usize) -> Self {
        Self::variable(name, logspace(start, stop, n_edges))
    }

    pub fn int_category(name: &str, categories: Vec<i64>, growth: bool) -> Self {
        let mut axis = Self::IntCategory { name: name.into(), categories, growth };
        axis.sort_categories();
        axis
    }

    pub fn str_category(name: &str, categories: &[&str], growth: bool) -> Self {
        let categories = categories.iter().map(|s| s.to_string()).collect();
        let mut axis = Self::StrCategory { name: name.into(), categories, growth };
        axis.sort_categories();
        axis
    }

    /// Category lookups binary-search, so categories are kept sorted and unique.
    fn sort_categories(&mut self) {
        match self {
            Self::IntCategory { categories, .. } => {
                categories.sort_unstable();
                categories.dedup();
            }
            Self::StrCategory { categories, .. } => {
                categories.sort_unstable();
                categories.dedup();
            }
            Self::Regular { .. } | Self::Variable { .. } => {}
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Regular { name, .. }
            | Self::Variable { name, .. }
            | Self::IntCategory { name, .. }
            | Self::StrCategory { name, .. } => name,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Regular { name, bins, lo, hi } => {
                if *bins == 0 || !(hi > lo) {
                    return Err(Error::Validation(format!(
                        "axis '{name}': need bins > 0 and hi > lo (bins={bins}, lo={lo}, hi={hi})"
                    )));
                }
            }
            Self::Variable { name, edges } => {
                if edges.len() < 2 || edges.windows(2).any(|w| !(w[1] > w[0])) {
                    return Err(Error::Validation(format!(
                        "axis '{name}': edges must be strictly increasing with at least two values"
                    )));
                }
            }
            Self::IntCategory { .. } | Self::StrCategory { .. } => {}
        }
        Ok(())
    }

    /// Key of `value` on this axis, growing the categories when allowed.
    fn key(&mut self, value: &FillValue<'_>) -> Result<BinKey> {
        match (self, value) {
            (Self::Regular { bins, lo, hi, .. }, v) if v.as_f64().is_some() => {
                let x = v.as_f64().unwrap_or(f64::NAN);
                let n = *bins as i64;
                let idx = if x.is_nan() || x >= *hi {
                    n
                } else if x < *lo {
                    -1
                } else {
                    (((x - *lo) / (*hi - *lo) * *bins as f64) as i64).min(n - 1)
                };
                Ok(BinKey::Index(idx))
            }
            (Self::Variable { edges, .. }, v) if v.as_f64().is_some() => {
                let x = v.as_f64().unwrap_or(f64::NAN);
                let n = edges.len() as i64 - 1;
                let idx = if x.is_nan() {
                    n
                } else {
                    edges.partition_point(|&e| e <= x) as i64 - 1
                };
                Ok(BinKey::Index(idx.min(n)))
            }
            (Self::IntCategory { categories, growth, .. }, v) if v.as_i64().is_some() => {
                let x = v.as_i64().unwrap_or_default();
                match categories.binary_search(&x) {
                    Ok(_) => Ok(BinKey::Index(x)),
                    Err(pos) if *growth => {
                        categories.insert(pos, x);
                        Ok(BinKey::Index(x))
                    }
                    Err(_) => Ok(BinKey::Overflow),
                }
            }
            (Self::StrCategory { categories, growth, .. }, FillValue::Str(s)) => {
                match categories.binary_search_by(|c| c.as_str().cmp(s)) {
                    Ok(_) => Ok(BinKey::Label(s.to_string())),
                    Err(pos) if *growth => {
                        categories.insert(pos, s.to_string());
                        Ok(BinKey::Label(s.to_string()))
                    }
                    Err(_) => Ok(BinKey::Overflow),
                }
            }
            (axis, v) => Err(Error::Validation(format!(
                "value {v:?} does not fit axis '{}'",
                axis.name()
            ))),
        }
    }

    /// Whether two axes bin identically. Growing category lists may differ.
    fn compatible(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Regular { .. }, Self::Regular { .. })
            | (Self::Variable { .. }, Self::Variable { .. }) => self == other,
            (
                Self::IntCategory { name: a, categories: ca, growth: ga },
                Self::IntCategory { name: b, categories: cb, growth: gb },
            ) => a == b && ga == gb && (*ga || ca == cb),
            (
                Self::StrCategory { name: a, categories: ca, growth: ga },
                Self::StrCategory { name: b, categories: cb, growth: gb },
            ) => a == b && ga == gb && (*ga || ca == cb),
            _ => false,
        }
    }

    fn absorb_categories(&mut self, other: &Self) {
        match (self, other) {
            (
                Self::IntCategory { categories, growth: true, .. },
                Self::IntCategory { categories: o, .. },
            ) => {
                categories.extend(o.iter().copied());
                categories.sort_unstable();
                categories.dedup();
            }
            (
                Self::StrCategory { categories, growth: true, .. },
                Self::StrCategory { categories: o, .. },
            ) => {
                categories.extend(o.iter().cloned());
                categories.sort_unstable();
                categories.dedup();
            }
            _ => {}
        }
    }
}

/// A coordinate passed to [`Hist::fill`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillValue<'a> {
    Num(f64),
    Int(i64),
    Str(&'a str),
}

impl FillValue<'_> {
    fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Num(x) => Some(x),
            Self::Int(i) => Some(i as f64),
            Self::Str(_) => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(i) => Some(i),
            Self::Num(x) if x.fract() == 0.0 => Some(x as i64),
            _ => None,
        }
    }
}

impl From<f64> for FillValue<'_> {
    fn from(x: f64) -> Self {
        Self::Num(x)
    }
}

impl From<i64> for FillValue<'_> {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u64> for FillValue<'_> {
    fn from(i: u64) -> Self {
        Self::Int(i as i64)
    }
}

impl From<i32> for FillValue<'_> {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl<'a> From<&'a str> for FillValue<'a> {
    fn from(s: &'a str) -> Self {
        Self::Str(s)
    }
}

/// Position of a bin along one axis.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinKey {
    /// Bin index on numeric axes, category value on integer axes.
    Index(i64),
    /// Category value on string axes.
    Label(String),
    /// Values outside a fixed category list.
    Overflow,
}

/// Accumulated weights of one bin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub sumw: f64,
    pub sumw2: f64,
}

/// A sparse weighted histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HistRepr", into = "HistRepr")]
pub struct Hist {
    axes: Vec<Axis>,
    bins: BTreeMap<Vec<BinKey>, Bin>,
    entries: u64,
}

impl Hist {
    pub fn new(mut axes: Vec<Axis>) -> Result<Self> {
        if axes.is_empty() {
            return Err(Error::Validation("histogram needs at least one axis".into()));
        }
        axes.iter_mut().for_each(Axis::sort_categories);
        for (i, axis) in axes.iter().enumerate() {
            axis.validate()?;
            if axes[..i].iter().any(|a| a.name() == axis.name()) {
                return Err(Error::Validation(format!("duplicate axis name '{}'", axis.name())));
            }
        }
        Ok(Self { axes, bins: BTreeMap::new(), entries: 0 })
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Number of fills.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Add `weight` at `values` (one per axis). NaN and infinite weights are ignored.
    pub fn fill(&mut self, values: &[FillValue<'_>], weight: f64) -> Result<()> {
        if values.len() != self.axes.len() {
            return Err(Error::Validation(format!(
                "fill with {} values into {} axes",
                values.len(),
                self.axes.len()
            )));
        }
        if !weight.is_finite() {
            return Ok(());
        }
        let key = self
            .axes
            .iter_mut()
            .zip(values)
            .map(|(axis, v)| axis.key(v))
            .collect::<Result<Vec<_>>>()?;
        let bin = self.bins.entry(key).or_default();
        bin.sumw += weight;
        bin.sumw2 += weight * weight;
        self.entries += 1;
        Ok(())
    }

    /// Sum of weights in the bin at `key`.
    pub fn value(&self, key: &[BinKey]) -> f64 {
        self.bins.get(key).map_or(0.0, |b| b.sumw)
    }

    /// Sum of weights over all bins, flow included.
    pub fn total(&self) -> f64 {
        self.bins.values().map(|b| b.sumw).sum()
    }

    /// Non-empty bins in key order.
    pub fn bins(&self) -> impl Iterator<Item = (&[BinKey], &Bin)> {
        self.bins.iter().map(|(k, b)| (k.as_slice(), b))
    }

    /// Sum of weights per key along the axis `name`.
    pub fn project(&self, name: &str) -> Result<BTreeMap<BinKey, f64>> {
        let idx = self
            .axes
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| Error::Validation(format!("no axis named '{name}'")))?;
        let mut out = BTreeMap::new();
        for (key, bin) in &self.bins {
            *out.entry(key[idx].clone()).or_insert(0.0) += bin.sumw;
        }
        Ok(out)
    }

    /// Add `other` bin-wise. Growing category axes take the union of categories.
    pub fn merge(&mut self, other: Hist) -> Result<()> {
        if self.axes.len() != other.axes.len()
            || !self.axes.iter().zip(&other.axes).all(|(a, b)| a.compatible(b))
        {
            return Err(Error::HistogramMismatch(format!(
                "axes [{}] vs [{}]",
                axis_names(&self.axes),
                axis_names(&other.axes)
            )));
        }
        for (a, b) in self.axes.iter_mut().zip(&other.axes) {
            a.absorb_categories(b);
        }
        for (key, bin) in other.bins {
            let dst = self.bins.entry(key).or_default();
            dst.sumw += bin.sumw;
            dst.sumw2 += bin.sumw2;
        }
        self.entries += other.entries;
        Ok(())
    }
}

fn axis_names(axes: &[Axis]) -> String {
    axes.iter().map(Axis::name).collect::<Vec<_>>().join(", ")
}

#[derive(Serialize, Deserialize)]
struct HistRepr {
    axes: Vec<Axis>,
    entries: u64,
    bins: Vec<BinRepr>,
}

#[derive(Serialize, Deserialize)]
struct BinRepr {
    key: Vec<BinKey>,
    sumw: f64,
    sumw2: f64,
}

impl From<Hist> for HistRepr {
    fn from(h: Hist) -> Self {
        Self {
            axes: h.axes,
            entries: h.entries,
            bins: h
                .bins
                .into_iter()
                .map(|(key, b)| BinRepr { key, sumw: b.sumw, sumw2: b.sumw2 })
                .collect(),
        }
    }
}

impl TryFrom<HistRepr> for Hist {
    type Error = Error;

    fn try_from(r: HistRepr) -> Result<Self> {
        let mut h = Hist::new(r.axes)?;
        for b in r.bins {
            if b.key.len() != h.axes.len() {
                return Err(Error::Validation(format!(
                    "bin key of length {} for {} axes",
                    b.key.len(),
                    h.axes.len()
                )));
            }
            h.bins.insert(b.key, Bin { sumw: b.sumw, sumw2: b.sumw2 });
        }
        h.entries = r.entries;
        Ok(h)
    }
}
