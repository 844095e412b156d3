//! Threshold selections of event numbers.

use crate::config::SelectionConfig;
use crate::reco::EventCharge;

/// Event numbers of the first `cap` events passing `pass`, in batch order.
pub fn select_capped(events: &[u64], cap: usize, mut pass: impl FnMut(usize) -> bool) -> Vec<u64> {
    events.iter().enumerate().filter(|&(i, _)| pass(i)).map(|(_, &e)| e).take(cap).collect()
}

/// High total charge together with many hits.
pub fn bad_events(events: &[u64], charges: &[EventCharge], sel: &SelectionConfig) -> Vec<u64> {
    select_capped(events, sel.cap, |i| {
        charges[i].charge > sel.bad_event_charge && charges[i].nhits > sel.bad_event_hits
    })
}

/// Nearly every channel hit.
pub fn full_events(events: &[u64], charges: &[EventCharge], sel: &SelectionConfig) -> Vec<u64> {
    select_capped(events, sel.cap, |i| charges[i].nhits > sel.full_event_hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ec(charge: f64, nhits: u64) -> EventCharge {
        EventCharge { charge, hit_charge: charge, nhits }
    }

    #[test]
    fn rules_apply_both_thresholds() {
        let sel = SelectionConfig::default();
        let events = [1, 2, 3, 4];
        let charges = [ec(6.0e4, 401), ec(6.0e4, 400), ec(4.0e4, 9001), ec(1.0e6, 9500)];
        assert_eq!(bad_events(&events, &charges, &sel), vec![1, 4]);
        assert_eq!(full_events(&events, &charges, &sel), vec![3, 4]);
    }

    #[test]
    fn lists_never_exceed_cap() {
        let sel = SelectionConfig { cap: 100, ..Default::default() };
        let events: Vec<u64> = (0..1000).collect();
        let charges = vec![ec(1.0e7, 10_000); 1000];
        let bad = bad_events(&events, &charges, &sel);
        assert_eq!(bad.len(), 100);
        assert_eq!(bad[99], 99);
        assert_eq!(full_events(&events, &charges, &sel).len(), 100);
        assert!(select_capped(&events, 0, |_| true).is_empty());
    }
}
