use super::{Bgr, MakeupParameter, ParameterSet, SavedParameter};
use crate::error::Result;
use crate::regions::MakeupKind;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorOrigin {
    Default,
    Extracted,
    User,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    param: MakeupParameter,
    origin: ColorOrigin,
    enabled: bool,
}

/// Makeup parameters shared between the control path and the compositor.
///
/// One lock covers the whole map. Readers take a `snapshot()` once per frame
/// and work on the copy, so edits never wait on image work and a frame never
/// sees a half-applied bulk update.
#[derive(Debug, Default)]
pub struct ParameterStore {
    entries: Mutex<BTreeMap<MakeupKind, Entry>>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every configured type enabled with its default color and intensity.
    pub fn with_defaults() -> Self {
        let entries = MakeupKind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind,
                    Entry {
                        param: MakeupParameter::defaults_for(kind),
                        origin: ColorOrigin::Default,
                        enabled: true,
                    },
                )
            })
            .collect();

        Self {
            entries: Mutex::new(entries),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<MakeupKind, Entry>> {
        // A panicking writer cannot leave an entry half written, so the map
        // stays usable after poisoning.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, kind: MakeupKind, param: MakeupParameter) {
        trace!("Set {kind}: {param:?}");
        self.lock().insert(kind, user_entry(param));
    }

    /// `set` by type name. Names outside the region table are rejected.
    pub fn set_named(&self, name: &str, param: MakeupParameter) -> Result<MakeupKind> {
        let kind: MakeupKind = name.parse()?;
        self.set(kind, param);
        Ok(kind)
    }

    /// Upsert all of `params` under a single lock acquisition.
    pub fn set_many(&self, params: &ParameterSet) {
        let mut entries = self.lock();
        for (kind, param) in params {
            entries.insert(*kind, user_entry(*param));
        }
        debug!("Set {} makeup parameters", params.len());
    }

    /// Replace the store contents with a saved parameter set, disabled
    /// entries included.
    pub fn load_saved(&self, saved: &BTreeMap<MakeupKind, SavedParameter>) {
        let mut entries = self.lock();
        entries.clear();
        for (kind, s) in saved {
            entries.insert(
                *kind,
                Entry {
                    param: s.param,
                    origin: ColorOrigin::User,
                    enabled: s.enabled,
                },
            );
        }
    }

    /// Explicit color pick. Enables the type, keeping its intensity.
    pub fn set_color(&self, kind: MakeupKind, color: Bgr) {
        let mut entries = self.lock();
        let entry = entries.entry(kind).or_insert_with(|| default_entry(kind));
        entry.param.color = color;
        entry.origin = ColorOrigin::User;
        entry.enabled = true;
    }

    /// Enables the type, keeping its color.
    pub fn set_intensity(&self, kind: MakeupKind, intensity: f32) {
        let mut entries = self.lock();
        let entry = entries.entry(kind).or_insert_with(|| default_entry(kind));
        entry.param.set_intensity(intensity);
        entry.enabled = true;
    }

    /// Stop compositing `kind`. Its values are kept for `saved()`.
    pub fn disable(&self, kind: MakeupKind) -> Option<MakeupParameter> {
        let mut entries = self.lock();
        let entry = entries.get_mut(&kind)?;
        entry.enabled = false;
        Some(entry.param)
    }

    /// Merge colors extracted from a reference image. Colors the user picked
    /// are left alone unless `reload` is set. Types without an entry are
    /// enabled with their default intensity. Returns how many colors changed.
    pub fn seed_colors(&self, colors: &BTreeMap<MakeupKind, Bgr>, reload: bool) -> usize {
        let mut entries = self.lock();
        let mut seeded = 0;

        for (kind, color) in colors {
            let entry = entries.entry(*kind).or_insert_with(|| default_entry(*kind));
            if entry.origin == ColorOrigin::User && !reload {
                debug!("Keeping user color for {kind}");
                continue;
            }

            entry.param.color = *color;
            entry.origin = ColorOrigin::Extracted;
            seeded += 1;
        }

        seeded
    }

    pub fn get(&self, kind: MakeupKind) -> Option<MakeupParameter> {
        self.lock()
            .get(&kind)
            .filter(|e| e.enabled)
            .map(|e| e.param)
    }

    /// Independent copy of the enabled parameters.
    pub fn snapshot(&self) -> ParameterSet {
        self.lock()
            .iter()
            .filter(|(_, e)| e.enabled)
            .map(|(kind, e)| (*kind, e.param))
            .collect()
    }

    /// Every entry with its enabled flag, for persistence.
    pub fn saved(&self) -> BTreeMap<MakeupKind, SavedParameter> {
        self.lock()
            .iter()
            .map(|(kind, e)| {
                (
                    *kind,
                    SavedParameter {
                        param: e.param,
                        enabled: e.enabled,
                    },
                )
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().values().filter(|e| e.enabled).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn user_entry(param: MakeupParameter) -> Entry {
    Entry {
        param,
        origin: ColorOrigin::User,
        enabled: true,
    }
}

fn default_entry(kind: MakeupKind) -> Entry {
    Entry {
        param: MakeupParameter::defaults_for(kind),
        origin: ColorOrigin::Default,
        enabled: true,
    }
}
