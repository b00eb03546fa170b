//! Replication region reconciliation

/// Read regions to add and remove to go from the current region set to the
/// declared one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionDelta {
    /// In declared order; the write region comes last when it is not also a
    /// declared read region
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
}

/// Compute the region delta for an update
///
/// Every region that will be active, read or write, must be present on the
/// account before priorities are reassigned, so a write region that is not
/// a declared read region is always listed as an add. Regions already on
/// the account are skipped when the delta is applied. The declared write
/// region is never removed, even when it was a read region.
pub fn reconcile_regions(
    desired_read: &[String],
    current_read: &[String],
    desired_write: &str,
) -> RegionDelta {
    let mut to_add: Vec<String> = Vec::new();
    for region in desired_read {
        if !current_read.contains(region) && !to_add.contains(region) {
            to_add.push(region.clone());
        }
    }
    if !desired_read.iter().any(|r| r == desired_write) {
        to_add.push(desired_write.to_string());
    }

    let mut to_remove: Vec<String> = Vec::new();
    for region in current_read {
        if !desired_read.contains(region) && region != desired_write && !to_remove.contains(region)
        {
            to_remove.push(region.clone());
        }
    }

    RegionDelta { to_add, to_remove }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn regions(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Apply a delta to the current read regions and add the write region
    fn replay(current_read: &[String], delta: &RegionDelta, write: &str) -> BTreeSet<String> {
        let mut result: BTreeSet<String> = current_read.iter().cloned().collect();
        result.extend(delta.to_add.iter().cloned());
        for region in &delta.to_remove {
            result.remove(region);
        }
        result.insert(write.to_string());
        result
    }

    #[test]
    fn adds_and_removes_read_regions() {
        let delta = reconcile_regions(
            &regions(&["westus", "northeurope"]),
            &regions(&["westus", "japaneast"]),
            "eastus",
        );
        assert_eq!(delta.to_add, regions(&["northeurope", "eastus"]));
        assert_eq!(delta.to_remove, regions(&["japaneast"]));
    }

    #[test]
    fn write_region_is_an_implicit_add() {
        let delta = reconcile_regions(&regions(&["westus"]), &regions(&["westus"]), "eastus");
        assert_eq!(delta.to_add, regions(&["eastus"]));
        assert!(delta.to_remove.is_empty());
    }

    #[test]
    fn promoted_read_region_is_kept() {
        // westus was a read region and becomes the write region
        let delta = reconcile_regions(&regions(&[]), &regions(&["westus"]), "westus");
        assert_eq!(delta.to_add, regions(&["westus"]));
        assert!(delta.to_remove.is_empty());
    }

    #[test]
    fn unchanged_read_regions_remove_nothing() {
        let delta = reconcile_regions(&regions(&["westus"]), &regions(&["westus"]), "westus");
        assert!(delta.to_remove.is_empty());
        let delta = reconcile_regions(&regions(&["westus"]), &regions(&["westus"]), "eastus");
        assert_eq!(delta.to_add, regions(&["eastus"]));
    }

    #[test]
    fn to_add_preserves_declared_order() {
        let delta = reconcile_regions(
            &regions(&["c", "a", "b", "a"]),
            &regions(&[]),
            "w",
        );
        assert_eq!(delta.to_add, regions(&["c", "a", "b", "w"]));
    }

    #[test]
    fn replay_reproduces_declared_regions() {
        let cases: Vec<(Vec<String>, Vec<String>, &str)> = vec![
            (regions(&["a", "b"]), regions(&[]), "w"),
            (regions(&["a", "b"]), regions(&["b", "c"]), "w"),
            (regions(&[]), regions(&["a", "b", "c"]), "w"),
            (regions(&["a"]), regions(&["a", "w"]), "w"),
            (regions(&["b", "a"]), regions(&["c", "d"]), "c"),
            (regions(&["a", "b", "c"]), regions(&["a", "b", "c"]), "d"),
        ];

        for (desired_read, current_read, write) in cases {
            let delta = reconcile_regions(&desired_read, &current_read, write);
            if !desired_read.iter().any(|r| r == write) {
                assert!(delta.to_add.iter().any(|r| r == write));
            }

            let mut expected: BTreeSet<String> = desired_read.iter().cloned().collect();
            expected.insert(write.to_string());
            assert_eq!(
                replay(&current_read, &delta, write),
                expected,
                "desired {:?}, current {:?}, write {}",
                desired_read,
                current_read,
                write
            );
        }
    }
}
