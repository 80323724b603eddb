//! The annotation store.
//!
//! Records live in a slot table; deleting a record leaves a `None` tombstone
//! so slots of other records never move. Two indices are derived from the
//! table: slots by frame, and slots by class and track. The class registry
//! holds exactly the classes referenced by live records.
//!
//! Only `link` and `unlink` write the indices, and every public mutation
//! validates its whole input before calling them, so a failed call leaves
//! the store as it was.

use crate::classes::{ClassRegistry, NewClass};
use crate::config::ExportConfig;
use crate::error::Error;
use crate::id::{ClassId, TrackId};
use crate::record::{BoundingBox, FieldUpdate, RawRecord};
use crate::rows::TrackingRow;
use crate::slice::RecordSlice;
use crate::writer::{Snapshot, TrackWriter};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::ops::RangeInclusive;

type TrackBuckets = HashMap<TrackId, BTreeSet<usize>>;

/// Outcome of [`TrackingMap::bulk_load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
    pub classes: usize,
}

/// Target of [`TrackingMap::reassign`]. With `new_class` set the track id is
/// picked by the store and `new_track` is ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reassignment {
    pub new_class: Option<ClassId>,
    pub new_track: Option<TrackId>,
}

impl Reassignment {
    pub fn to_class(class: impl Into<ClassId>) -> Self {
        Self {
            new_class: Some(class.into()),
            new_track: None,
        }
    }

    pub fn to_track(track: impl Into<TrackId>) -> Self {
        Self {
            new_class: None,
            new_track: Some(track.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct TrackingMap {
    table: Vec<Option<BoundingBox>>,
    by_frame: BTreeMap<u32, BTreeSet<usize>>,
    by_identity: HashMap<ClassId, TrackBuckets>,
    classes: ClassRegistry,
    revision: u64,
    persisted_revision: u64,
}

impl TrackingMap {
    pub fn new() -> Self {
        Self::default()
    }

    // Index maintenance

    fn link(&mut self, slot: usize) {
        let rec = match self.table.get(slot).and_then(Option::as_ref) {
            Some(rec) => rec,
            None => return,
        };

        let (frame, class, track) = (rec.frame(), rec.class_id().clone(), rec.track_id().clone());

        self.by_frame.entry(frame).or_default().insert(slot);
        self.by_identity
            .entry(class.clone())
            .or_default()
            .entry(track)
            .or_default()
            .insert(slot);

        if !self.classes.contains(&class) {
            self.classes.add_class(NewClass::new(class));
        }
    }

    /// Drops `slot` from both indices. Empty buckets are removed; the class
    /// entry is left for [`prune_class`](Self::prune_class).
    fn unlink(&mut self, slot: usize) {
        let rec = match self.table.get(slot).and_then(Option::as_ref) {
            Some(rec) => rec,
            None => return,
        };

        let (frame, class, track) = (rec.frame(), rec.class_id().clone(), rec.track_id().clone());

        if let Some(bucket) = self.by_frame.get_mut(&frame) {
            bucket.remove(&slot);
            if bucket.is_empty() {
                self.by_frame.remove(&frame);
            }
        }

        if let Some(tracks) = self.by_identity.get_mut(&class) {
            if let Some(bucket) = tracks.get_mut(&track) {
                bucket.remove(&slot);
                if bucket.is_empty() {
                    tracks.remove(&track);
                }
            }

            if tracks.is_empty() {
                self.by_identity.remove(&class);
            }
        }
    }

    fn prune_class(&mut self, class: &ClassId) {
        if !self.by_identity.contains_key(class) && self.classes.remove(class).is_some() {
            tracing::debug!(class = %class, "class has no boxes left");
        }
    }

    fn place(&mut self, mut rec: BoundingBox) -> usize {
        let slot = self.table.len();
        rec.set_slot(slot);
        self.table.push(Some(rec));
        self.link(slot);

        slot
    }

    #[inline]
    fn touch(&mut self) {
        self.revision += 1;
    }

    fn live(&self, slot: usize) -> Result<&BoundingBox, Error> {
        self.table
            .get(slot)
            .ok_or(Error::SlotOutOfRange(slot))?
            .as_ref()
            .ok_or(Error::SlotDeleted(slot))
    }

    // Loading and insertion

    /// Replaces the contents with `rows`. Malformed rows are skipped and
    /// counted. `class_names` and `class_colors` are matched to classes in
    /// first-seen order and only used when their length equals the number
    /// of classes. The freshly loaded store is not dirty.
    pub fn bulk_load<I>(
        &mut self,
        rows: I,
        class_names: Option<&[String]>,
        class_colors: Option<&[String]>,
    ) -> LoadReport
    where
        I: IntoIterator<Item = RawRecord>,
    {
        self.clear();

        let mut report = LoadReport::default();

        for (idx, row) in rows.into_iter().enumerate() {
            match BoundingBox::validate_and_create(&row) {
                Ok(rec) => {
                    self.place(rec);
                    report.loaded += 1;
                }
                Err(err) => {
                    tracing::warn!(row = idx, error = %err, "skipping malformed row");
                    report.skipped += 1;
                }
            }
        }

        let ids: Vec<ClassId> = self.classes.ids().cloned().collect();
        report.classes = ids.len();

        match class_names {
            Some(names) if names.len() == ids.len() => {
                for (id, name) in ids.iter().zip(names) {
                    let _ = self.classes.set_name(id, name.clone());
                }
            }
            Some(names) => tracing::debug!(
                names = names.len(),
                classes = ids.len(),
                "class names do not match classes, ignored"
            ),
            None => (),
        }

        match class_colors {
            Some(colors) if colors.len() == ids.len() => {
                for (id, color) in ids.iter().zip(colors) {
                    if let Err(err) = self.classes.set_color(id, color.clone()) {
                        tracing::warn!(class = %id, error = %err, "ignoring class color");
                    }
                }
            }
            Some(colors) => tracing::debug!(
                colors = colors.len(),
                classes = ids.len(),
                "class colors do not match classes, ignored"
            ),
            None => (),
        }

        tracing::debug!(
            loaded = report.loaded,
            skipped = report.skipped,
            classes = report.classes,
            "tracking map loaded"
        );

        // loaded contents match their source
        self.persisted_revision = self.revision;

        report
    }

    /// Appends a record and returns its slot. Any slot the record carried is
    /// replaced.
    pub fn add(&mut self, rec: BoundingBox) -> usize {
        let slot = self.place(rec);
        self.touch();

        slot
    }

    pub fn add_all<I>(&mut self, recs: I) -> Vec<usize>
    where
        I: IntoIterator<Item = BoundingBox>,
    {
        let slots: Vec<usize> = recs.into_iter().map(|rec| self.place(rec)).collect();
        if !slots.is_empty() {
            self.touch();
        }

        slots
    }

    /// Validates every row first; nothing is added if one of them fails.
    pub fn add_raw(&mut self, rows: &[RawRecord]) -> Result<Vec<usize>, Error> {
        let recs = rows
            .iter()
            .map(BoundingBox::validate_and_create)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.add_all(recs))
    }

    /// Appends records of one class and sets that class's attributes. The
    /// class id is chosen when `class.id` is empty and every record must
    /// carry it.
    pub fn insert_with_class(
        &mut self,
        mut class: NewClass,
        recs: Vec<BoundingBox>,
    ) -> Result<Vec<usize>, Error> {
        if recs.is_empty() {
            return Err(Error::invalid("records", "a class needs at least one box"));
        }

        let id = class
            .id
            .get_or_insert_with(|| self.classes.first_available_class_id())
            .clone();

        if let Some(other) = recs.iter().find(|r| r.class_id() != &id) {
            return Err(Error::invalid(
                "classId",
                format!("box of class `{}` inserted with class `{}`", other.class_id(), id),
            ));
        }

        let slots = self.add_all(recs);
        self.classes.add_class(class);

        tracing::debug!(class = %id, boxes = slots.len(), "class inserted");

        Ok(slots)
    }

    pub fn clear(&mut self) {
        self.table.clear();
        self.by_frame.clear();
        self.by_identity.clear();
        self.classes.clear();
        self.touch();
    }

    // Queries

    #[inline]
    pub fn get(&self, slot: usize) -> Option<&BoundingBox> {
        self.table.get(slot)?.as_ref()
    }

    /// Live records in slot order.
    #[inline]
    pub fn records(&self) -> RecordSlice<'_> {
        RecordSlice::live(&self.table)
    }

    pub fn by_frame(&self, frame: u32) -> RecordSlice<'_> {
        match self.by_frame.get(&frame) {
            Some(slots) => RecordSlice::with_slots(&self.table, slots.iter().copied().collect()),
            None => RecordSlice::empty(&self.table),
        }
    }

    /// Slots of one track, optionally limited to frames in `frames`.
    pub fn indices_for(
        &self,
        class: &ClassId,
        track: &TrackId,
        frames: Option<RangeInclusive<u32>>,
    ) -> Vec<usize> {
        let bucket = match self.by_identity.get(class).and_then(|t| t.get(track)) {
            Some(bucket) => bucket,
            None => return Vec::new(),
        };

        bucket
            .iter()
            .copied()
            .filter(|&slot| match (&frames, self.get(slot)) {
                (Some(range), Some(rec)) => range.contains(&rec.frame()),
                (None, Some(_)) => true,
                (_, None) => false,
            })
            .collect()
    }

    pub fn track(&self, class: &ClassId, track: &TrackId) -> RecordSlice<'_> {
        RecordSlice::with_slots(&self.table, self.indices_for(class, track, None))
    }

    /// Whether the track already has a live box at `frame`.
    pub fn is_occupied(&self, class: &ClassId, track: &TrackId, frame: u32) -> bool {
        !self.indices_for(class, track, Some(frame..=frame)).is_empty()
    }

    /// Frames with at least one live record, ascending.
    pub fn frames(&self) -> impl Iterator<Item = u32> + '_ {
        self.by_frame.keys().copied()
    }

    pub fn track_ids(&self, class: &ClassId) -> Vec<&TrackId> {
        let mut ids: Vec<_> = self
            .by_identity
            .get(class)
            .map(|t| t.keys().collect())
            .unwrap_or_default();
        ids.sort_by_key(|id| (id.as_number(), id.as_str().to_string()));

        ids
    }

    pub fn first_available_track_id(&self, class: &ClassId) -> TrackId {
        match self.by_identity.get(class) {
            Some(tracks) => TrackId::next_available(tracks.keys()),
            None => TrackId::next_available(std::iter::empty()),
        }
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.by_frame.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_frame.is_empty()
    }

    /// Length of the slot table, tombstones included.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.table.len()
    }

    /// First frame, scanning forward from the middle of the known frames,
    /// that shows every class. Falls back to the middle frame.
    pub fn first_frame_with_all_classes(&self) -> Option<u32> {
        let frames: Vec<u32> = self.frames().collect();
        let mid = *frames.get(frames.len() / 2)?;
        let wanted = self.classes.len();

        let found = frames[frames.len() / 2..].iter().copied().find(|&frame| {
            let seen: HashSet<&ClassId> = self.by_frame(frame).iter().map(BoundingBox::class_id).collect();
            seen.len() == wanted
        });

        Some(found.unwrap_or(mid))
    }

    // Edits

    /// Sets geometry or confidence on every listed slot. All slots are
    /// checked before anything changes.
    pub fn update_fields(&mut self, slots: &[usize], update: &FieldUpdate) -> Result<(), Error> {
        update.validate()?;

        for &slot in slots {
            self.live(slot)?;
        }

        for &slot in slots {
            if let Some(rec) = self.table[slot].as_mut() {
                update.apply(rec);
            }
        }

        if !slots.is_empty() {
            self.touch();
        }

        Ok(())
    }

    /// Moves `slots` (default: the whole track) of `old_class`/`old_track` to
    /// another track. Returns the class and track the boxes now belong to.
    pub fn reassign(
        &mut self,
        old_class: &ClassId,
        old_track: &TrackId,
        to: Reassignment,
        slots: Option<&[usize]>,
    ) -> Result<(ClassId, TrackId), Error> {
        let bucket = self
            .by_identity
            .get(old_class)
            .and_then(|t| t.get(old_track))
            .ok_or_else(|| Error::UnknownTrack {
                class: old_class.clone(),
                track: old_track.clone(),
            })?;

        let moving: BTreeSet<usize> = match slots {
            Some(slots) => {
                for &slot in slots {
                    self.live(slot)?;
                    if !bucket.contains(&slot) {
                        return Err(Error::SlotNotInTrack {
                            slot,
                            class: old_class.clone(),
                            track: old_track.clone(),
                        });
                    }
                }

                slots.iter().copied().collect()
            }
            None => bucket.clone(),
        };

        if moving.is_empty() {
            return Err(Error::EmptyReassignment);
        }

        let (class, track) = match (to.new_class, to.new_track) {
            (Some(class), _) => {
                let track = self.first_available_track_id(&class);
                (class, track)
            }
            (None, Some(track)) => (old_class.clone(), track),
            (None, None) => return Err(Error::EmptyReassignment),
        };

        if &class == old_class && &track == old_track {
            return Ok((class, track));
        }

        for &slot in &moving {
            let frame = self.live(slot)?.frame();
            if self.is_occupied(&class, &track, frame) {
                return Err(Error::FrameOccupied { class, track, frame });
            }
        }

        for &slot in &moving {
            self.unlink(slot);
            if let Some(rec) = self.table[slot].as_mut() {
                rec.relabel(class.clone(), track.clone());
            }
            self.link(slot);
        }

        self.prune_class(old_class);
        self.touch();

        tracing::debug!(
            from_class = %old_class,
            from_track = %old_track,
            to_class = %class,
            to_track = %track,
            boxes = moving.len(),
            "track reassigned"
        );

        Ok((class, track))
    }

    /// Tombstones the listed slots and drops them from both indices.
    /// Returns how many records were deleted.
    pub fn delete(&mut self, slots: &[usize]) -> Result<usize, Error> {
        let unique: BTreeSet<usize> = slots.iter().copied().collect();

        for &slot in &unique {
            self.live(slot)?;
        }

        let mut classes = HashSet::new();
        for &slot in &unique {
            self.unlink(slot);
            if let Some(rec) = self.table[slot].take() {
                classes.insert(rec.class_id().clone());
            }
        }

        for class in &classes {
            self.prune_class(class);
        }

        if !unique.is_empty() {
            self.touch();
        }

        tracing::debug!(boxes = unique.len(), "boxes deleted");

        Ok(unique.len())
    }

    // Classes

    #[inline]
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    pub fn first_available_class_id(&self) -> ClassId {
        self.classes.first_available_class_id()
    }

    /// Overwrites the attributes of a class that has boxes.
    pub fn add_class(&mut self, class: NewClass) -> Result<ClassId, Error> {
        let id = class
            .id
            .clone()
            .ok_or_else(|| Error::invalid("classId", "missing"))?;

        if !self.classes.contains(&id) {
            return Err(Error::UnknownClass(id));
        }

        Ok(self.classes.add_class(class))
    }

    pub fn set_class_name(&mut self, class: &ClassId, name: impl Into<String>) -> Result<(), Error> {
        self.classes.set_name(class, name)
    }

    pub fn set_class_color(&mut self, class: &ClassId, color: impl Into<String>) -> Result<(), Error> {
        self.classes.set_color(class, color)
    }

    pub fn running_count(&self, class: &ClassId) -> Result<i64, Error> {
        self.classes.running_count(class)
    }

    pub fn set_running_count(&mut self, class: &ClassId, count: i64) -> Result<(), Error> {
        self.classes.set_running_count(class, count)
    }

    pub fn increment_running_count(&mut self, class: &ClassId) -> Result<i64, Error> {
        self.classes.increment_running_count(class)
    }

    pub fn reset_running_counts(&mut self) {
        self.classes.reset_running_counts()
    }

    // Persistence

    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether there are edits the last successful persist did not see.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.revision != self.persisted_revision
    }

    /// Hands the live records to `writer` and returns what it reports.
    pub fn persist<W>(&mut self, writer: &mut W, config: &ExportConfig) -> Result<String, Error>
    where
        W: TrackWriter + ?Sized,
    {
        let snapshot = Snapshot {
            rows: self.records().iter().map(TrackingRow::from_record).collect(),
            identity_names: &config.identity_names,
            username: &config.username,
            config,
        };

        match writer.write(&snapshot) {
            Ok(id) => {
                self.persisted_revision = self.revision;
                tracing::info!(target = %id, rows = snapshot.rows.len(), "tracking map persisted");
                Ok(id)
            }
            Err(err) => {
                tracing::warn!(error = %err, "persist failed");
                Err(err)
            }
        }
    }

    // Consistency

    /// Checks that the table, both indices and the class registry agree.
    pub fn verify(&self) -> Result<(), Error> {
        let fail = |msg: String| Err(Error::Inconsistent(msg));

        for (idx, rec) in self.table.iter().enumerate() {
            let rec = match rec {
                Some(rec) => rec,
                None => continue,
            };

            if rec.slot() != Some(idx) {
                return fail(format!("slot {} holds a box claiming {:?}", idx, rec.slot()));
            }

            if !self.by_frame.get(&rec.frame()).map_or(false, |b| b.contains(&idx)) {
                return fail(format!("slot {} missing from frame {}", idx, rec.frame()));
            }

            let in_track = self
                .by_identity
                .get(rec.class_id())
                .and_then(|t| t.get(rec.track_id()))
                .map_or(false, |b| b.contains(&idx));
            if !in_track {
                return fail(format!("slot {} missing from its track", idx));
            }

            if !self.classes.contains(rec.class_id()) {
                return fail(format!("class `{}` is not registered", rec.class_id()));
            }
        }

        for (frame, bucket) in &self.by_frame {
            if bucket.is_empty() {
                return fail(format!("empty bucket for frame {}", frame));
            }

            for &slot in bucket {
                match self.get(slot) {
                    Some(rec) if rec.frame() == *frame => (),
                    _ => return fail(format!("frame {} lists stale slot {}", frame, slot)),
                }
            }
        }

        for (class, tracks) in &self.by_identity {
            if tracks.is_empty() {
                return fail(format!("class `{}` has no tracks", class));
            }

            for (track, bucket) in tracks {
                if bucket.is_empty() {
                    return fail(format!("empty bucket for track `{}`/`{}`", class, track));
                }

                for &slot in bucket {
                    match self.get(slot) {
                        Some(rec) if rec.class_id() == class && rec.track_id() == track => (),
                        _ => {
                            return fail(format!(
                                "track `{}`/`{}` lists stale slot {}",
                                class, track, slot
                            ))
                        }
                    }
                }
            }
        }

        for id in self.classes.ids() {
            if !self.by_identity.contains_key(id) {
                return fail(format!("class `{}` has no boxes", id));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use assert_matches::assert_matches;

    fn rec(frame: u32, class: &str, track: &str, x: f32) -> BoundingBox {
        BoundingBox::new(frame, class, track, BBox::ltwh(x, 0.0, 10.0, 10.0)).unwrap()
    }

    fn sample() -> TrackingMap {
        let mut map = TrackingMap::new();
        map.add_all(vec![
            rec(5, "1", "0", 0.0),
            rec(5, "1", "1", 1.0),
            rec(6, "1", "0", 2.0),
            rec(7, "2", "0", 3.0),
        ]);
        map
    }

    #[test]
    fn add_assigns_slots_and_classes() {
        let map = sample();

        assert_eq!(map.len(), 4);
        assert_eq!(map.get(2).and_then(BoundingBox::slot), Some(2));
        assert_eq!(map.classes().len(), 2);
        map.verify().unwrap();
    }

    #[test]
    fn add_ignores_incoming_slot() {
        let mut map = sample();
        let moved = map.get(0).unwrap().clone();

        let slot = map.add(moved);
        assert_eq!(slot, 4);
        assert_eq!(map.get(4).and_then(BoundingBox::slot), Some(4));
        map.verify().unwrap();
    }

    #[test]
    fn add_raw_is_all_or_nothing() {
        let mut map = sample();
        let good = map.get(0).unwrap().to_raw();
        let bad = RawRecord::default();

        assert!(map.add_raw(&[good.clone(), bad]).is_err());
        assert_eq!(map.len(), 4);
        assert_eq!(map.add_raw(&[good]).unwrap(), vec![4]);
    }

    #[test]
    fn indices_for_filters_frames() {
        let map = sample();
        let (c, t) = (ClassId::from("1"), TrackId::from("0"));

        assert_eq!(map.indices_for(&c, &t, None), vec![0, 2]);
        assert_eq!(map.indices_for(&c, &t, Some(6..=9)), vec![2]);
        assert!(map.indices_for(&c, &TrackId::from("5"), None).is_empty());
        assert!(map.is_occupied(&c, &t, 5));
        assert!(!map.is_occupied(&c, &t, 7));
    }

    #[test]
    fn update_fields_is_atomic() {
        let mut map = sample();
        map.delete(&[1]).unwrap();
        let before: Vec<_> = map.records().iter().cloned().collect();

        let update = FieldUpdate {
            x: Some(99.0),
            ..Default::default()
        };
        assert_matches!(map.update_fields(&[0, 1], &update), Err(Error::SlotDeleted(1)));
        assert_matches!(map.update_fields(&[0, 40], &update), Err(Error::SlotOutOfRange(40)));

        let after: Vec<_> = map.records().iter().cloned().collect();
        assert_eq!(before, after);

        map.update_fields(&[0, 2], &update).unwrap();
        assert_eq!(map.get(0).unwrap().x(), 99.0);
        assert_eq!(map.get(2).unwrap().x(), 99.0);
        map.verify().unwrap();
    }

    #[test]
    fn reassign_track_within_class() {
        let mut map = sample();
        let (c, t) = (ClassId::from("1"), TrackId::from("0"));

        let target = map
            .reassign(&c, &t, Reassignment::to_track("4"), Some(&[2]))
            .unwrap();

        assert_eq!(target, (c.clone(), TrackId::from("4")));
        assert_eq!(map.indices_for(&c, &t, None), vec![0]);
        assert_eq!(map.indices_for(&c, &TrackId::from("4"), None), vec![2]);
        assert_eq!(map.get(2).unwrap().track_id().as_str(), "4");
        map.verify().unwrap();
    }

    #[test]
    fn reassign_refuses_frame_collisions() {
        let mut map = sample();
        let (c, t) = (ClassId::from("1"), TrackId::from("0"));

        assert_matches!(
            map.reassign(&c, &t, Reassignment::to_track("1"), None),
            Err(Error::FrameOccupied { frame: 5, .. })
        );
        assert_eq!(map.indices_for(&c, &t, None), vec![0, 2]);
        map.verify().unwrap();
    }

    #[test]
    fn reassign_validates_slots() {
        let mut map = sample();
        let (c, t) = (ClassId::from("1"), TrackId::from("0"));

        assert_matches!(
            map.reassign(&c, &t, Reassignment::to_class("2"), Some(&[1])),
            Err(Error::SlotNotInTrack { slot: 1, .. })
        );
        assert_matches!(
            map.reassign(&c, &t, Reassignment::default(), None),
            Err(Error::EmptyReassignment)
        );
        assert_matches!(
            map.reassign(&c, &TrackId::from("8"), Reassignment::to_track("9"), None),
            Err(Error::UnknownTrack { .. })
        );
        map.verify().unwrap();
    }

    #[test]
    fn moving_last_track_keeps_class_attributes() {
        let mut map = sample();
        let c = ClassId::from("2");
        map.set_class_name(&c, "Heron").unwrap();

        map.reassign(&c, &TrackId::from("0"), Reassignment::to_track("3"), None)
            .unwrap();

        assert_eq!(map.classes().get(&c).unwrap().name.as_deref(), Some("Heron"));
        map.verify().unwrap();
    }

    #[test]
    fn delete_prunes_everything() {
        let mut map = sample();

        assert_eq!(map.delete(&[3, 3]).unwrap(), 1);
        assert!(map.get(3).is_none());
        assert!(map.by_frame(7).is_empty());
        assert!(!map.classes().contains(&ClassId::from("2")));
        assert_eq!(map.capacity(), 4);
        map.verify().unwrap();

        assert_matches!(map.delete(&[0, 3]), Err(Error::SlotDeleted(3)));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn store_level_add_class_needs_boxes() {
        let mut map = sample();

        assert_matches!(map.add_class(NewClass::new("9")), Err(Error::UnknownClass(_)));
        map.add_class(NewClass::new("1").with_color("#00ff00")).unwrap();
        assert_eq!(
            map.classes().get(&ClassId::from("1")).unwrap().color.as_deref(),
            Some("#00ff00")
        );
    }

    #[test]
    fn insert_with_class_registers_attributes() {
        let mut map = sample();
        let id = map.first_available_class_id();
        assert_eq!(id.as_str(), "3");

        let slots = map
            .insert_with_class(
                NewClass::new(id.clone()).with_name("Boat"),
                vec![rec(9, "3", "0", 0.0)],
            )
            .unwrap();

        assert_eq!(slots, vec![4]);
        assert_eq!(map.classes().get(&id).unwrap().name.as_deref(), Some("Boat"));
        assert!(map
            .insert_with_class(NewClass::new("4"), vec![rec(9, "3", "1", 0.0)])
            .is_err());
        assert!(map.insert_with_class(NewClass::new("4"), Vec::new()).is_err());
        map.verify().unwrap();
    }

    #[test]
    fn first_available_track_id_is_numeric() {
        let mut map = sample();
        map.add(rec(1, "1", "10", 0.0));

        assert_eq!(map.first_available_track_id(&ClassId::from("1")).as_str(), "11");
        assert_eq!(map.first_available_track_id(&ClassId::from("7")).as_str(), "0");
        let ids: Vec<_> = map
            .track_ids(&ClassId::from("1"))
            .into_iter()
            .map(TrackId::as_str)
            .collect();
        assert_eq!(ids, vec!["0", "1", "10"]);
    }

    #[test]
    fn first_frame_with_all_classes() {
        let mut map = TrackingMap::new();
        assert_eq!(map.first_frame_with_all_classes(), None);

        map.add_all(vec![
            rec(1, "0", "0", 0.0),
            rec(1, "1", "0", 0.0),
            rec(2, "0", "0", 0.0),
            rec(3, "0", "0", 0.0),
            rec(4, "0", "0", 0.0),
            rec(4, "1", "0", 0.0),
        ]);
        // middle of [1, 2, 3, 4] is 3; frame 1 lies behind it
        assert_eq!(map.first_frame_with_all_classes(), Some(4));

        map.delete(&[5]).unwrap();
        assert_eq!(map.first_frame_with_all_classes(), Some(3));
    }

    #[test]
    fn dirty_tracking() {
        let mut map = TrackingMap::new();
        let start = map.revision();

        map.add(rec(1, "0", "0", 0.0));
        assert!(map.revision() > start);
        assert!(map.is_dirty());
    }

    #[test]
    fn bulk_load_starts_clean() {
        let mut map = TrackingMap::new();
        map.add(rec(1, "0", "0", 0.0));
        assert!(map.is_dirty());

        let rows = vec![rec(2, "1", "0", 0.0).to_raw(), rec(3, "1", "0", 0.0).to_raw()];
        map.bulk_load(rows, None, None);
        assert!(!map.is_dirty());

        map.delete(&[0]).unwrap();
        assert!(map.is_dirty());
    }
}
