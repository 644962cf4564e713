// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Spectral windows, and deciding which of them should be merged.
//!
//! Two windows are merged when their frequency ranges overlap (within one
//! channel width) and they have the same number of channels. Merging is
//! transitive; a window that isn't merged with anything is processed
//! separately.


use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vec1::Vec1;

use crate::metadata::{DatasetMetadata, MetadataError};

/// A contiguous frequency sub-band of the observation, with its own channel
/// grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralWindow {
    pub id: u32,

    /// The number of channels.
    pub nchan: usize,

    /// The lowest channel frequency \[MHz\].
    pub min_freq_mhz: f64,

    /// The highest channel frequency \[MHz\].
    pub max_freq_mhz: f64,

    /// The mean channel width \[kHz\].
    pub chan_width_khz: f64,
}

impl SpectralWindow {
    /// Make a new window from values in Hz. Bounds are rounded to 0.1 kHz and
    /// the width to 1 Hz, so that tiny floating-point differences in metadata
    /// don't change overlap decisions.
    pub fn from_hz(
        id: u32,
        nchan: usize,
        min_freq_hz: f64,
        max_freq_hz: f64,
        mean_chan_width_hz: f64,
    ) -> SpectralWindow {
        SpectralWindow {
            id,
            nchan,
            min_freq_mhz: round_to(min_freq_hz / 1e6, 4),
            max_freq_mhz: round_to(max_freq_hz / 1e6, 4),
            chan_width_khz: round_to(mean_chan_width_hz / 1e3, 3),
        }
    }

    /// The overlap tolerance of this window \[MHz\]; one channel width.
    pub fn tolerance_mhz(&self) -> f64 {
        self.chan_width_khz / 1000.0
    }

    /// Does this window overlap with another within tolerance, *and* share
    /// its channel count? Each side uses its own tolerance, and the test is
    /// done in both directions.
    pub fn overlaps(&self, other: &SpectralWindow) -> bool {
        let one_way = |a: &SpectralWindow, b: &SpectralWindow| {
            a.max_freq_mhz + a.tolerance_mhz() >= b.min_freq_mhz
                && a.min_freq_mhz <= b.max_freq_mhz + b.tolerance_mhz()
        };
        (one_way(self, other) || one_way(other, self)) && self.nchan == other.nchan
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

/// A set of spectral windows that are processed together. The IDs are
/// always sorted and unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandGroup {
    spws: Vec1<u32>,
}

impl BandGroup {
    fn new(spws: Vec1<u32>) -> BandGroup {
        let mut spws = spws.into_vec();
        spws.sort_unstable();
        spws.dedup();
        BandGroup {
            spws: Vec1::try_from_vec(spws).expect("cannot be empty"),
        }
    }

    pub fn spws(&self) -> &[u32] {
        &self.spws
    }

    /// The smallest window ID in this group.
    pub fn first(&self) -> u32 {
        *self.spws.first()
    }

    /// Does this group merge more than one window?
    pub fn is_merged(&self) -> bool {
        self.spws.len() > 1
    }

    pub fn contains(&self, spw: u32) -> bool {
        self.spws.contains(&spw)
    }

    /// The suffix used when this group is surfaced as its own dataset, e.g.
    /// ".spw0+1".
    pub fn suffix(&self) -> String {
        format!(".spw{}", self.spws.iter().join("+"))
    }

    /// The window selection string for processing operations, e.g. "0,1".
    pub fn selection(&self) -> String {
        self.spws.iter().join(",")
    }
}

/// How the spectral windows of a field (or a set of fields) are partitioned.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    /// Groups, ordered by their smallest window ID.
    pub groups: Vec<BandGroup>,

    /// At least one group merges several windows.
    pub combine: bool,

    /// At least one window must be processed on its own.
    pub separate: bool,

    /// Was this grouping given in the configuration?
    pub manual: bool,
}

impl Grouping {
    /// A single window is passed through as-is; it's neither combined nor
    /// separated.
    pub fn single(spw: u32) -> Grouping {
        Grouping {
            groups: vec![BandGroup::new(Vec1::new(spw))],
            combine: false,
            separate: false,
            manual: false,
        }
    }

    pub fn num_bands(&self) -> usize {
        self.groups.len()
    }

    /// Which band does a window belong to?
    pub fn band_of(&self, spw: u32) -> Option<usize> {
        self.groups.iter().position(|g| g.contains(spw))
    }

    pub fn merged(&self) -> impl Iterator<Item = &BandGroup> {
        self.groups.iter().filter(|g| g.is_merged())
    }

    pub fn separated(&self) -> impl Iterator<Item = &BandGroup> {
        self.groups.iter().filter(|g| !g.is_merged())
    }

    /// All window IDs in this grouping, sorted.
    pub fn spws(&self) -> Vec<u32> {
        self.groups
            .iter()
            .flat_map(|g| g.spws().iter().copied())
            .sorted()
            .collect()
    }

    /// The names under which each group is surfaced. If there's only one
    /// group, the bare name is used. Otherwise, merged groups come first,
    /// followed by separated windows, each with their own suffix.
    pub fn surfaced_names(&self, name: &str) -> Vec<(String, &BandGroup)> {
        if self.groups.len() == 1 {
            return vec![(name.to_string(), &self.groups[0])];
        }
        self.merged()
            .chain(self.separated())
            .map(|g| (format!("{name}{}", g.suffix()), g))
            .collect()
    }
}

/// Disjoint-set forest over window indices.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> DisjointSet {
        DisjointSet {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression.
        let mut i = i;
        while self.parent[i] != root {
            let next = self.parent[i];
            self.parent[i] = root;
            i = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // Keep the lower index as the root so results are deterministic.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }
}

/// Partition the windows of `field` into band groups.
///
/// If `manual` is given, it replaces the overlap computation wholesale: each
/// listed group is used as-is, and any window of the field that isn't listed
/// is separated. A field observed in exactly one window is passed through
/// unchanged.
pub fn group_windows(
    field: &str,
    windows: &[SpectralWindow],
    manual: Option<&[Vec<u32>]>,
) -> Result<Grouping, GroupingError> {
    match windows {
        [] => {
            return Err(GroupingError::AmbiguousBandGrouping {
                field: field.to_string(),
            })
        }
        [w] => {
            debug!("{field} was observed in a single SPW ({}); not grouping", w.id);
            return Ok(Grouping::single(w.id));
        }
        _ => (),
    }

    let groups = match manual {
        Some(manual) => {
            info!("A manual SPW combination scheme has been set for {field}.");
            manual_groups(field, windows, manual)?
        }
        None => overlap_groups(field, windows),
    };

    let combine = groups.iter().any(|g| g.is_merged());
    let separate = groups.iter().any(|g| !g.is_merged());
    match (combine, separate) {
        (true, true) => {
            info!("Some SPWs overlap and others do not. These will be separated appropriately.")
        }
        (true, false) => info!("All SPWs overlap and will be combined."),
        (false, true) => info!("SPWs do not overlap and will be processed separately."),
        (false, false) => {
            return Err(GroupingError::AmbiguousBandGrouping {
                field: field.to_string(),
            })
        }
    }

    Ok(Grouping {
        groups,
        combine,
        separate,
        manual: manual.is_some(),
    })
}

fn overlap_groups(field: &str, windows: &[SpectralWindow]) -> Vec<BandGroup> {
    info!(
        "{field} was observed in {} SPWs with the frequency ranges:",
        windows.len()
    );
    for w in windows {
        info!(
            "SPW{}: {}-{} MHz ({} channels)",
            w.id, w.min_freq_mhz, w.max_freq_mhz, w.nchan
        );
    }

    let mut set = DisjointSet::new(windows.len());
    for (i, j) in (0..windows.len()).tuple_combinations() {
        let (a, b) = (&windows[i], &windows[j]);
        if a.overlaps(b) {
            info!("The SPWs {} and {} overlap and will be combined.", a.id, b.id);
            set.union(i, j);
        } else {
            info!(
                "The SPWs {} and {} do not overlap (or do not have the same number of channels) and will not be combined.",
                a.id, b.id
            );
        }
    }

    let mut members: BTreeMap<usize, Vec<u32>> = BTreeMap::new();
    for (i, w) in windows.iter().enumerate() {
        let root = set.find(i);
        members.entry(root).or_default().push(w.id);
    }
    let mut groups: Vec<BandGroup> = members
        .into_values()
        .map(|ids| BandGroup::new(Vec1::try_from_vec(ids).expect("a root is its own member")))
        .collect();
    groups.sort_by_key(|g| g.first());
    groups
}

fn manual_groups(
    field: &str,
    windows: &[SpectralWindow],
    manual: &[Vec<u32>],
) -> Result<Vec<BandGroup>, GroupingError> {
    let mut groups = Vec::with_capacity(windows.len());
    let mut used = vec![];
    for ids in manual {
        for &id in ids {
            if !windows.iter().any(|w| w.id == id) {
                return Err(GroupingError::UnknownWindow {
                    field: field.to_string(),
                    spw: id,
                });
            }
            if used.contains(&id) {
                return Err(GroupingError::RepeatedWindow {
                    field: field.to_string(),
                    spw: id,
                });
            }
            used.push(id);
        }
        if let Ok(ids) = Vec1::try_from_vec(ids.clone()) {
            groups.push(BandGroup::new(ids));
        }
    }
    for w in windows {
        if !used.contains(&w.id) {
            groups.push(BandGroup::new(Vec1::new(w.id)));
        }
    }
    groups.sort_by_key(|g| g.first());
    Ok(groups)
}

/// Group the union of all windows that any of `fields` was observed in. This
/// defines the bands that flux and bandpass calibrators are assigned to.
pub fn bands_for_fields<M: DatasetMetadata + ?Sized>(
    meta: &M,
    fields: &[String],
) -> Result<Grouping, GroupingError> {
    let mut spws = vec![];
    for field in fields {
        spws.extend(meta.spectral_windows_for_field(field)?);
    }
    spws.sort_unstable();
    spws.dedup();
    let windows = spws
        .into_iter()
        .map(|id| meta.window(id).cloned())
        .collect::<Result<Vec<_>, _>>()?;
    group_windows(&fields.join(","), &windows, None)
}

#[derive(Error, Debug)]
pub enum GroupingError {
    #[error("Could not determine whether to split or combine the SPWs for {field}")]
    AmbiguousBandGrouping { field: String },

    #[error("The manual SPW combination for {field} refers to SPW {spw}, which {field} was not observed in")]
    UnknownWindow { field: String, spw: u32 },

    #[error("The manual SPW combination for {field} lists SPW {spw} more than once")]
    RepeatedWindow { field: String, spw: u32 },

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}
