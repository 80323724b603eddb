//! Edit sessions: a box being drawn, resized, or interpolated between two
//! keyframes. Nothing reaches the store until the session is committed, so
//! cancelling is a plain discard.

use crate::bbox::{BBox, Ltrb};
use crate::classes::NewClass;
use crate::error::Error;
use crate::math::interpolate_boxes;
use crate::record::{BoundingBox, FieldUpdate, RecordOverrides};
use crate::tracking_map::TrackingMap;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Editing,
    AwaitingSecondKeyframe,
    Interpolating,
    Committed,
    Canceled,
}

impl SessionState {
    #[inline]
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionState::Committed | SessionState::Canceled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// A new box.
    Draw,
    /// New geometry for the box at `slot`.
    Resize { slot: usize },
    /// Boxes between two keyframes. With `anchor` set the first keyframe
    /// is the stored box at that slot and is not added again.
    Interpolation { anchor: Option<usize> },
}

#[derive(Debug, Clone)]
pub struct DrawnBoundingBox {
    kind: EditKind,
    state: SessionState,
    first_box: Option<BoundingBox>,
    last_box: Option<BoundingBox>,
    initial_first_box: Option<BoundingBox>,
    initial_last_box: Option<BoundingBox>,
    interpolated: Vec<BoundingBox>,
    new_class: Option<NewClass>,
}

impl DrawnBoundingBox {
    pub fn new(kind: EditKind) -> Self {
        Self {
            kind,
            state: SessionState::Idle,
            first_box: None,
            last_box: None,
            initial_first_box: None,
            initial_last_box: None,
            interpolated: Vec::new(),
            new_class: None,
        }
    }

    #[inline]
    pub fn kind(&self) -> EditKind {
        self.kind
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn first_box(&self) -> Option<&BoundingBox> {
        self.first_box.as_ref()
    }

    #[inline]
    pub fn last_box(&self) -> Option<&BoundingBox> {
        self.last_box.as_ref()
    }

    #[inline]
    pub fn initial_first_box(&self) -> Option<&BoundingBox> {
        self.initial_first_box.as_ref()
    }

    #[inline]
    pub fn initial_last_box(&self) -> Option<&BoundingBox> {
        self.initial_last_box.as_ref()
    }

    #[inline]
    pub fn interpolated(&self) -> &[BoundingBox] {
        &self.interpolated
    }

    fn transition_error(&self, action: &'static str) -> Error {
        Error::InvalidTransition {
            action,
            state: self.state,
        }
    }

    pub fn capture_first(&mut self, rec: BoundingBox) -> Result<(), Error> {
        match self.state {
            SessionState::Idle | SessionState::Editing => (),
            _ => return Err(self.transition_error("capture the first box")),
        }

        if self.initial_first_box.is_none() {
            self.initial_first_box = Some(rec.duplicate(RecordOverrides::default()));
        }

        self.first_box = Some(rec);
        self.state = SessionState::Editing;

        Ok(())
    }

    pub fn await_second_keyframe(&mut self) -> Result<(), Error> {
        if self.state != SessionState::Editing || matches!(self.kind, EditKind::Resize { .. }) {
            return Err(self.transition_error("wait for a second keyframe"));
        }

        self.state = SessionState::AwaitingSecondKeyframe;
        tracing::debug!("waiting for second keyframe");

        Ok(())
    }

    /// Sets the second keyframe. It must keep the first box's class and track.
    pub fn capture_last(&mut self, rec: BoundingBox) -> Result<(), Error> {
        match self.state {
            SessionState::AwaitingSecondKeyframe | SessionState::Interpolating => (),
            _ => return Err(self.transition_error("capture the last box")),
        }

        let first = self
            .first_box
            .as_ref()
            .ok_or_else(|| self.transition_error("capture the last box"))?;

        if rec.class_id() != first.class_id() || rec.track_id() != first.track_id() {
            return Err(Error::IdentityMismatch {
                class: first.class_id().clone(),
                track: first.track_id().clone(),
            });
        }

        if self.initial_last_box.is_none() {
            self.initial_last_box = Some(rec.duplicate(RecordOverrides::default()));
        }

        self.last_box = Some(rec);
        self.interpolated.clear();
        self.state = SessionState::Interpolating;

        Ok(())
    }

    /// Applies a dragged rectangle to the box being edited: the last box
    /// once it exists, the first one otherwise.
    pub fn resize_to(&mut self, corners: BBox<Ltrb>) -> Result<(), Error> {
        let working = match self.state {
            SessionState::Editing => self.first_box.as_mut(),
            SessionState::Interpolating => self.last_box.as_mut(),
            _ => None,
        };

        match working {
            Some(rec) => {
                rec.set_geometry(corners.normalized().as_ltwh())?;
                self.interpolated.clear();
                Ok(())
            }
            None => Err(self.transition_error("resize")),
        }
    }

    /// Registers `class` together with the session's boxes on commit.
    pub fn set_new_class(&mut self, class: NewClass) -> Result<(), Error> {
        if matches!(self.kind, EditKind::Resize { .. }) || self.state.is_finished() {
            return Err(self.transition_error("introduce a class"));
        }

        self.new_class = Some(class);
        Ok(())
    }

    /// Boxes for the frames strictly between the two keyframes, whichever
    /// order they were drawn in. Geometry is linear in the frame number,
    /// everything else is copied from the earlier keyframe.
    ///
    /// Replaces any earlier result. The session stays `Interpolating` until
    /// it is committed or reverted.
    pub fn interpolate(&mut self) -> Result<&[BoundingBox], Error> {
        self.interpolated.clear();

        let (first, last) = match (self.state, &self.first_box, &self.last_box) {
            (SessionState::Interpolating, Some(first), Some(last)) => (first, last),
            _ => return Err(self.transition_error("interpolate")),
        };

        let earlier = if first.frame() <= last.frame() { first } else { last };

        let steps = interpolate_boxes(
            (first.frame(), first.bbox()),
            (last.frame(), last.bbox()),
        )
        .ok_or(Error::NoIntermediateFrames(first.frame(), last.frame()))?;

        self.interpolated = steps
            .into_iter()
            .map(|(frame, bbox)| {
                earlier.duplicate(RecordOverrides {
                    frame: Some(frame),
                    bbox: Some(bbox),
                    ..Default::default()
                })
            })
            .collect();

        tracing::debug!(boxes = self.interpolated.len(), "interpolated");

        Ok(&self.interpolated)
    }

    /// Discards the working boxes. The store was never touched.
    pub fn revert(&mut self) -> Result<(), Error> {
        if self.state.is_finished() {
            return Err(self.transition_error("cancel"));
        }

        self.first_box = self.initial_first_box.clone();
        self.last_box = self.initial_last_box.clone();
        self.interpolated.clear();
        self.new_class = None;
        self.state = SessionState::Canceled;

        Ok(())
    }

    fn pending_boxes(&self) -> Vec<BoundingBox> {
        let skip_first = matches!(self.kind, EditKind::Interpolation { anchor: Some(_) });

        self.first_box
            .iter()
            .filter(|_| !skip_first)
            .chain(self.interpolated.iter())
            .chain(self.last_box.iter())
            .cloned()
            .collect()
    }

    /// Writes the session into `store` and returns the affected slots.
    pub fn commit(&mut self, store: &mut TrackingMap) -> Result<Vec<usize>, Error> {
        match self.state {
            SessionState::Editing
            | SessionState::AwaitingSecondKeyframe
            | SessionState::Interpolating => (),
            _ => return Err(self.transition_error("commit")),
        }

        let first = self
            .first_box
            .as_ref()
            .ok_or_else(|| self.transition_error("commit"))?;

        if let EditKind::Resize { slot } = self.kind {
            store.update_fields(&[slot], &FieldUpdate::geometry(first.bbox()))?;
            self.state = SessionState::Committed;

            tracing::debug!(slot, "resize committed");
            return Ok(vec![slot]);
        }

        if self.state == SessionState::Interpolating && self.interpolated.is_empty() {
            match self.interpolate() {
                Ok(_) | Err(Error::NoIntermediateFrames(..)) => (),
                Err(err) => return Err(err),
            }
        }

        let boxes = self.pending_boxes();
        let mut frames = HashSet::new();

        for rec in &boxes {
            if !frames.insert(rec.frame()) || store.is_occupied(rec.class_id(), rec.track_id(), rec.frame()) {
                return Err(Error::FrameOccupied {
                    class: rec.class_id().clone(),
                    track: rec.track_id().clone(),
                    frame: rec.frame(),
                });
            }
        }

        // the pending class stays set until the store has taken it
        let slots = match &self.new_class {
            Some(class) => store.insert_with_class(class.clone(), boxes)?,
            None => store.add_all(boxes),
        };

        self.new_class = None;
        self.interpolated.clear();
        self.state = SessionState::Committed;
        tracing::debug!(boxes = slots.len(), "edit committed");

        Ok(slots)
    }
}

/// Holds the single active edit session.
#[derive(Debug, Default)]
pub struct Editor {
    active: Option<DrawnBoundingBox>,
}

impl Editor {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    #[inline]
    pub fn session(&self) -> Option<&DrawnBoundingBox> {
        self.active.as_ref()
    }

    pub fn session_mut(&mut self) -> Result<&mut DrawnBoundingBox, Error> {
        self.active.as_mut().ok_or(Error::NoActiveSession)
    }

    fn begin(&mut self, kind: EditKind, rec: BoundingBox) -> Result<&mut DrawnBoundingBox, Error> {
        if self.active.is_some() {
            return Err(Error::SessionActive);
        }

        let mut session = DrawnBoundingBox::new(kind);
        session.capture_first(rec)?;

        tracing::debug!(?kind, "edit session started");

        Ok(self.active.insert(session))
    }

    fn stored(store: &TrackingMap, slot: usize) -> Result<BoundingBox, Error> {
        match store.get(slot) {
            Some(rec) => Ok(rec.duplicate(RecordOverrides::default())),
            None if slot < store.capacity() => Err(Error::SlotDeleted(slot)),
            None => Err(Error::SlotOutOfRange(slot)),
        }
    }

    pub fn begin_draw(&mut self, rec: BoundingBox) -> Result<&mut DrawnBoundingBox, Error> {
        self.begin(EditKind::Draw, rec)
    }

    pub fn begin_resize(
        &mut self,
        store: &TrackingMap,
        slot: usize,
    ) -> Result<&mut DrawnBoundingBox, Error> {
        if self.active.is_some() {
            return Err(Error::SessionActive);
        }

        let rec = Self::stored(store, slot)?;
        self.begin(EditKind::Resize { slot }, rec)
    }

    /// Starts from a freshly drawn first keyframe.
    pub fn begin_interpolation(&mut self, rec: BoundingBox) -> Result<&mut DrawnBoundingBox, Error> {
        let session = self.begin(EditKind::Interpolation { anchor: None }, rec)?;
        session.await_second_keyframe()?;

        Ok(session)
    }

    /// Starts from a box already in the store as the first keyframe.
    pub fn begin_interpolation_from(
        &mut self,
        store: &TrackingMap,
        slot: usize,
    ) -> Result<&mut DrawnBoundingBox, Error> {
        if self.active.is_some() {
            return Err(Error::SessionActive);
        }

        let rec = Self::stored(store, slot)?;
        let session = self.begin(EditKind::Interpolation { anchor: Some(slot) }, rec)?;
        session.await_second_keyframe()?;

        Ok(session)
    }

    /// Commits the active session. On failure the session stays active so
    /// it can be corrected or cancelled.
    pub fn confirm(&mut self, store: &mut TrackingMap) -> Result<Vec<usize>, Error> {
        let session = self.active.as_mut().ok_or(Error::NoActiveSession)?;
        let slots = session.commit(store)?;
        self.active = None;

        Ok(slots)
    }

    /// Drops the active session and returns it, reverted.
    pub fn cancel(&mut self) -> Result<DrawnBoundingBox, Error> {
        let mut session = self.active.take().ok_or(Error::NoActiveSession)?;
        session.revert()?;

        tracing::debug!(kind = ?session.kind(), "edit session canceled");

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use assert_matches::assert_matches;

    fn rec(frame: u32, x: f32) -> BoundingBox {
        BoundingBox::new(frame, "1", "0", BBox::ltwh(x, 5.0, 10.0, 20.0)).unwrap()
    }

    #[test]
    fn snapshot_is_taken_once() {
        let mut s = DrawnBoundingBox::new(EditKind::Draw);
        s.capture_first(rec(1, 0.0)).unwrap();
        s.capture_first(rec(1, 7.0)).unwrap();

        assert_eq!(s.first_box().unwrap().x(), 7.0);
        assert_eq!(s.initial_first_box().unwrap().x(), 0.0);
        assert_eq!(s.state(), SessionState::Editing);
    }

    #[test]
    fn last_box_requires_waiting_state() {
        let mut s = DrawnBoundingBox::new(EditKind::Draw);
        s.capture_first(rec(1, 0.0)).unwrap();

        assert_matches!(
            s.capture_last(rec(4, 0.0)),
            Err(Error::InvalidTransition { state: SessionState::Editing, .. })
        );

        s.await_second_keyframe().unwrap();
        let other = BoundingBox::new(4, "1", "9", BBox::ltwh(0.0, 0.0, 1.0, 1.0)).unwrap();
        assert_matches!(s.capture_last(other), Err(Error::IdentityMismatch { .. }));

        s.capture_last(rec(4, 30.0)).unwrap();
        s.capture_last(rec(4, 60.0)).unwrap();
        assert_eq!(s.state(), SessionState::Interpolating);
        assert_eq!(s.initial_last_box().unwrap().x(), 30.0);
    }

    #[test]
    fn interpolate_copies_earlier_fields() {
        let mut s = DrawnBoundingBox::new(EditKind::Interpolation { anchor: None });
        let mut late = rec(8, 40.0);
        late.set_track_confidence(0.9).unwrap();

        s.capture_first(late).unwrap();
        s.await_second_keyframe().unwrap();
        s.capture_last(rec(4, 0.0)).unwrap();

        let boxes = s.interpolate().unwrap();
        let frames: Vec<u32> = boxes.iter().map(BoundingBox::frame).collect();
        let xs: Vec<f32> = boxes.iter().map(BoundingBox::x).collect();

        assert_eq!(frames, vec![5, 6, 7]);
        assert_eq!(xs, vec![10.0, 20.0, 30.0]);
        assert!(boxes.iter().all(|b| b.track_confidence() == 0.0 && b.slot().is_none()));
    }

    #[test]
    fn interpolation_is_pending_until_commit() {
        let mut s = DrawnBoundingBox::new(EditKind::Interpolation { anchor: None });
        s.capture_first(rec(1, 0.0)).unwrap();
        s.await_second_keyframe().unwrap();
        s.capture_last(rec(4, 30.0)).unwrap();

        assert_eq!(s.interpolate().unwrap().len(), 2);
        assert_eq!(s.interpolate().unwrap().len(), 2);
        assert_eq!(s.state(), SessionState::Interpolating);

        s.capture_last(rec(5, 40.0)).unwrap();
        assert_eq!(s.interpolate().unwrap().len(), 3);

        let mut store = TrackingMap::new();
        assert_eq!(s.commit(&mut store).unwrap().len(), 5);
        assert_eq!(s.state(), SessionState::Committed);
        assert!(s.interpolated().is_empty());
        assert!(s.interpolate().is_err());
    }

    #[test]
    fn resize_normalizes_drag() {
        let mut s = DrawnBoundingBox::new(EditKind::Draw);
        s.capture_first(rec(1, 0.0)).unwrap();
        s.resize_to(BBox::ltrb(40.0, 30.0, 10.0, 10.0)).unwrap();

        assert_eq!(s.first_box().unwrap().bbox(), &BBox::ltwh(10.0, 10.0, 30.0, 20.0));
    }

    #[test]
    fn revert_restores_snapshots() {
        let mut s = DrawnBoundingBox::new(EditKind::Draw);
        s.capture_first(rec(1, 0.0)).unwrap();
        s.capture_first(rec(1, 50.0)).unwrap();
        s.revert().unwrap();

        assert_eq!(s.state(), SessionState::Canceled);
        assert_eq!(s.first_box().unwrap().x(), 0.0);
        assert!(s.revert().is_err());
        assert!(s.capture_first(rec(1, 0.0)).is_err());
    }

    #[test]
    fn editor_allows_one_session() {
        let mut editor = Editor::new();
        editor.begin_draw(rec(1, 0.0)).unwrap();

        assert_matches!(editor.begin_draw(rec(2, 0.0)), Err(Error::SessionActive));
        assert_matches!(
            editor.begin_interpolation(rec(2, 0.0)),
            Err(Error::SessionActive)
        );

        editor.cancel().unwrap();
        assert!(!editor.is_active());
        assert_matches!(editor.cancel(), Err(Error::NoActiveSession));
    }
}
