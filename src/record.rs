//! Single detection records and their loosely-typed input form.

use crate::bbox::{BBox, Ltwh};
use crate::error::Error;
use crate::id::{ClassId, TrackId};
use serde_derive::{Deserialize, Serialize};

/// A loosely-typed field value as produced by tabular parsers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Integral value; floats are accepted only when they have no fraction.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            Scalar::Float(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            Scalar::Float(_) => None,
            Scalar::Text(s) => {
                let s = s.trim();
                s.parse()
                    .ok()
                    .or_else(|| Scalar::Float(s.parse().ok()?).as_integer())
            }
        }
    }

    /// Canonical id text: integral numbers lose any `.0`, text is trimmed.
    pub fn as_id(&self) -> Option<String> {
        let id = match self {
            Scalar::Int(v) => v.to_string(),
            Scalar::Float(v) => match Scalar::Float(*v).as_integer() {
                Some(i) => i.to_string(),
                None if v.is_finite() => v.to_string(),
                None => return None,
            },
            Scalar::Text(s) => s.trim().to_string(),
        };

        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

/// One input row before validation.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRecord {
    pub frame: Option<Scalar>,
    pub track_id: Option<Scalar>,
    pub class_id: Option<Scalar>,
    pub x: Option<Scalar>,
    pub y: Option<Scalar>,
    pub width: Option<Scalar>,
    pub height: Option<Scalar>,
    pub track_confidence: Option<Scalar>,
    pub identity_order: Option<Scalar>,
    pub identity_confidence: Option<Scalar>,
}

fn required<'a>(value: &'a Option<Scalar>, field: &'static str) -> Result<&'a Scalar, Error> {
    value.as_ref().ok_or_else(|| Error::invalid(field, "missing"))
}

fn coordinate(value: &Option<Scalar>, field: &'static str) -> Result<f32, Error> {
    let v = required(value, field)?
        .as_f64()
        .ok_or_else(|| Error::invalid(field, "not a number"))? as f32;

    if v.is_finite() {
        Ok(v)
    } else {
        Err(Error::invalid(field, "not finite"))
    }
}

fn confidence(value: f32, field: &'static str) -> Result<f32, Error> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::invalid(field, format!("{} is outside [0, 1]", value)))
    }
}

fn optional_confidence(value: &Option<Scalar>, field: &'static str) -> Result<Option<f32>, Error> {
    value
        .as_ref()
        .map(|v| {
            let v = v.as_f64().ok_or_else(|| Error::invalid(field, "not a number"))?;
            confidence(v as f32, field)
        })
        .transpose()
}

fn non_negative(value: &Scalar, field: &'static str) -> Result<u32, Error> {
    let v = value
        .as_integer()
        .ok_or_else(|| Error::invalid(field, "not an integer"))?;

    u32::try_from(v).map_err(|_| Error::invalid(field, format!("{} is out of range", v)))
}

/// Fields replaced by [`BoundingBox::duplicate`].
#[derive(Debug, Clone, Default)]
pub struct RecordOverrides {
    pub frame: Option<u32>,
    pub class_id: Option<ClassId>,
    pub track_id: Option<TrackId>,
    pub bbox: Option<BBox<Ltwh>>,
    pub track_confidence: Option<f32>,
}

/// One bounding-box detection of one subject in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    frame: u32,
    class_id: ClassId,
    track_id: TrackId,
    bbox: BBox<Ltwh>,
    track_confidence: f32,
    identity_order: Option<u32>,
    identity_confidence: Option<f32>,
    slot: Option<usize>,
}

impl BoundingBox {
    pub fn new(
        frame: u32,
        class_id: impl Into<ClassId>,
        track_id: impl Into<TrackId>,
        bbox: BBox<Ltwh>,
    ) -> Result<Self, Error> {
        if !bbox.is_finite() {
            return Err(Error::invalid("bbox", "not finite"));
        }

        Ok(Self {
            frame,
            class_id: class_id.into(),
            track_id: track_id.into(),
            bbox,
            track_confidence: 0.0,
            identity_order: None,
            identity_confidence: None,
            slot: None,
        })
    }

    pub fn validate_and_create(raw: &RawRecord) -> Result<Self, Error> {
        let class_id = required(&raw.class_id, "classId")?
            .as_id()
            .ok_or_else(|| Error::invalid("classId", "empty"))?;
        let track_id = required(&raw.track_id, "trackId")?
            .as_id()
            .ok_or_else(|| Error::invalid("trackId", "empty"))?;
        let frame = non_negative(required(&raw.frame, "frame")?, "frame")?;

        let bbox = BBox::ltwh(
            coordinate(&raw.x, "x")?,
            coordinate(&raw.y, "y")?,
            coordinate(&raw.width, "width")?,
            coordinate(&raw.height, "height")?,
        );

        let track_confidence =
            optional_confidence(&raw.track_confidence, "trackConfidence")?.unwrap_or(0.0);
        let identity_order = raw
            .identity_order
            .as_ref()
            .map(|v| non_negative(v, "identityOrder"))
            .transpose()?;
        let identity_confidence =
            optional_confidence(&raw.identity_confidence, "identityConfidence")?;

        Ok(Self {
            frame,
            class_id: ClassId::new(class_id),
            track_id: TrackId::new(track_id),
            bbox,
            track_confidence,
            identity_order,
            identity_confidence,
            slot: None,
        })
    }

    pub fn to_raw(&self) -> RawRecord {
        RawRecord {
            frame: Some(Scalar::Int(self.frame as i64)),
            track_id: Some(Scalar::Text(self.track_id.to_string())),
            class_id: Some(Scalar::Text(self.class_id.to_string())),
            x: Some(Scalar::Float(self.x() as f64)),
            y: Some(Scalar::Float(self.y() as f64)),
            width: Some(Scalar::Float(self.width() as f64)),
            height: Some(Scalar::Float(self.height() as f64)),
            track_confidence: Some(Scalar::Float(self.track_confidence as f64)),
            identity_order: self.identity_order.map(|v| Scalar::Int(v as i64)),
            identity_confidence: self.identity_confidence.map(|v| Scalar::Float(v as f64)),
        }
    }

    /// Copy with some fields replaced. The copy is never attached to a slot.
    pub fn duplicate(&self, overrides: RecordOverrides) -> Self {
        Self {
            frame: overrides.frame.unwrap_or(self.frame),
            class_id: overrides.class_id.unwrap_or_else(|| self.class_id.clone()),
            track_id: overrides.track_id.unwrap_or_else(|| self.track_id.clone()),
            bbox: overrides.bbox.unwrap_or(self.bbox),
            track_confidence: overrides.track_confidence.unwrap_or(self.track_confidence),
            identity_order: self.identity_order,
            identity_confidence: self.identity_confidence,
            slot: None,
        }
    }

    #[inline]
    pub fn frame(&self) -> u32 {
        self.frame
    }

    #[inline]
    pub fn class_id(&self) -> &ClassId {
        &self.class_id
    }

    #[inline]
    pub fn track_id(&self) -> &TrackId {
        &self.track_id
    }

    #[inline]
    pub fn bbox(&self) -> &BBox<Ltwh> {
        &self.bbox
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.bbox.left()
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.bbox.top()
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.bbox.width()
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.bbox.height()
    }

    #[inline]
    pub fn track_confidence(&self) -> f32 {
        self.track_confidence
    }

    #[inline]
    pub fn identity_order(&self) -> Option<u32> {
        self.identity_order
    }

    #[inline]
    pub fn identity_confidence(&self) -> Option<f32> {
        self.identity_confidence
    }

    /// Position in the owning store's table, if the record has been inserted.
    #[inline]
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    pub fn set_frame(&mut self, frame: i64) -> Result<(), Error> {
        self.frame = non_negative(&Scalar::Int(frame), "frame")?;
        Ok(())
    }

    pub fn set_x(&mut self, x: f32) -> Result<(), Error> {
        self.set_geometry(self.bbox.with_left(x))
    }

    pub fn set_y(&mut self, y: f32) -> Result<(), Error> {
        self.set_geometry(self.bbox.with_top(y))
    }

    pub fn set_width(&mut self, width: f32) -> Result<(), Error> {
        self.set_geometry(self.bbox.with_width(width))
    }

    pub fn set_height(&mut self, height: f32) -> Result<(), Error> {
        self.set_geometry(self.bbox.with_height(height))
    }

    pub fn set_geometry(&mut self, bbox: BBox<Ltwh>) -> Result<(), Error> {
        if !bbox.is_finite() {
            return Err(Error::invalid("bbox", "not finite"));
        }

        self.bbox = bbox;
        Ok(())
    }

    pub fn set_track_confidence(&mut self, value: f32) -> Result<(), Error> {
        self.track_confidence = confidence(value, "trackConfidence")?;
        Ok(())
    }

    pub fn set_identity(&mut self, order: Option<u32>, conf: Option<f32>) -> Result<(), Error> {
        let conf = conf
            .map(|c| confidence(c, "identityConfidence"))
            .transpose()?;

        self.identity_order = order;
        self.identity_confidence = conf;
        Ok(())
    }

    // Identity and slot are only changed by the store, which keeps its
    // indices in sync with them.

    #[inline]
    pub(crate) fn set_slot(&mut self, slot: usize) {
        self.slot = Some(slot);
    }

    #[inline]
    pub(crate) fn relabel(&mut self, class_id: ClassId, track_id: TrackId) {
        self.class_id = class_id;
        self.track_id = track_id;
    }
}

/// In-place change of geometry and confidence. Identity fields are not
/// editable this way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub track_confidence: Option<f32>,
    pub identity_confidence: Option<f32>,
}

impl FieldUpdate {
    pub fn geometry(bbox: &BBox<Ltwh>) -> Self {
        Self {
            x: Some(bbox.left()),
            y: Some(bbox.top()),
            width: Some(bbox.width()),
            height: Some(bbox.height()),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        let coords = [
            (self.x, "x"),
            (self.y, "y"),
            (self.width, "width"),
            (self.height, "height"),
        ];

        for (value, field) in coords {
            if matches!(value, Some(v) if !v.is_finite()) {
                return Err(Error::invalid(field, "not finite"));
            }
        }

        if let Some(c) = self.track_confidence {
            confidence(c, "trackConfidence")?;
        }

        if let Some(c) = self.identity_confidence {
            confidence(c, "identityConfidence")?;
        }

        Ok(())
    }

    /// Applies a validated update. Values are assumed checked by `validate`.
    pub(crate) fn apply(&self, record: &mut BoundingBox) {
        let b = record.bbox;
        record.bbox = BBox::ltwh(
            self.x.unwrap_or(b.left()),
            self.y.unwrap_or(b.top()),
            self.width.unwrap_or(b.width()),
            self.height.unwrap_or(b.height()),
        );

        if let Some(c) = self.track_confidence {
            record.track_confidence = c;
        }

        if let Some(c) = self.identity_confidence {
            record.identity_confidence = Some(c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn raw() -> RawRecord {
        RawRecord {
            frame: Some(Scalar::from("12")),
            track_id: Some(Scalar::Int(3)),
            class_id: Some(Scalar::Float(1.0)),
            x: Some(Scalar::from(" 4.5 ")),
            y: Some(Scalar::Int(6)),
            width: Some(Scalar::Float(20.0)),
            height: Some(Scalar::Float(10.25)),
            ..Default::default()
        }
    }

    #[test]
    fn coerces_loose_input() {
        let rec = BoundingBox::validate_and_create(&raw()).unwrap();

        assert_eq!(rec.frame(), 12);
        assert_eq!(rec.class_id().as_str(), "1");
        assert_eq!(rec.track_id().as_str(), "3");
        assert_eq!(rec.x(), 4.5);
        assert_eq!(rec.track_confidence(), 0.0);
        assert_eq!(rec.identity_order(), None);
        assert_eq!(rec.slot(), None);
    }

    #[test]
    fn rejects_missing_and_malformed_fields() {
        let mut r = raw();
        r.class_id = None;
        assert_matches!(
            BoundingBox::validate_and_create(&r),
            Err(Error::InvalidField { field: "classId", .. })
        );

        let mut r = raw();
        r.frame = Some(Scalar::Float(2.5));
        assert_matches!(
            BoundingBox::validate_and_create(&r),
            Err(Error::InvalidField { field: "frame", .. })
        );

        let mut r = raw();
        r.frame = Some(Scalar::Int(-1));
        assert!(BoundingBox::validate_and_create(&r).is_err());

        let mut r = raw();
        r.width = Some(Scalar::from("wide"));
        assert!(BoundingBox::validate_and_create(&r).is_err());

        let mut r = raw();
        r.y = Some(Scalar::Float(f64::INFINITY));
        assert!(BoundingBox::validate_and_create(&r).is_err());

        let mut r = raw();
        r.track_id = Some(Scalar::from("  "));
        assert!(BoundingBox::validate_and_create(&r).is_err());
    }

    #[test]
    fn optional_fields_are_checked() {
        let mut r = raw();
        r.track_confidence = Some(Scalar::Float(0.75));
        r.identity_order = Some(Scalar::Int(2));
        r.identity_confidence = Some(Scalar::from("0.5"));
        let rec = BoundingBox::validate_and_create(&r).unwrap();
        assert_eq!(rec.track_confidence(), 0.75);
        assert_eq!(rec.identity_order(), Some(2));
        assert_eq!(rec.identity_confidence(), Some(0.5));

        r.identity_confidence = Some(Scalar::Float(1.5));
        assert!(BoundingBox::validate_and_create(&r).is_err());
    }

    #[test]
    fn setters_leave_record_untouched_on_failure() {
        let mut rec = BoundingBox::validate_and_create(&raw()).unwrap();
        let before = rec.clone();

        assert!(rec.set_x(f32::NAN).is_err());
        assert!(rec.set_frame(-4).is_err());
        assert!(rec.set_track_confidence(-0.1).is_err());
        assert!(rec.set_identity(Some(1), Some(2.0)).is_err());
        assert_eq!(rec, before);

        rec.set_width(33.0).unwrap();
        assert_eq!(rec.width(), 33.0);
        assert_eq!(rec.x(), before.x());
    }

    #[test]
    fn duplicate_detaches_slot() {
        let mut rec = BoundingBox::validate_and_create(&raw()).unwrap();
        rec.set_slot(9);

        let copy = rec.duplicate(RecordOverrides {
            frame: Some(13),
            ..Default::default()
        });

        assert_eq!(copy.slot(), None);
        assert_eq!(copy.frame(), 13);
        assert_eq!(copy.class_id(), rec.class_id());
        assert_eq!(rec.slot(), Some(9));
    }

    #[test]
    fn raw_form_revalidates() {
        let rec = BoundingBox::validate_and_create(&raw()).unwrap();
        let again = BoundingBox::validate_and_create(&rec.to_raw()).unwrap();
        assert_eq!(rec, again);
    }

    #[test]
    fn field_update_validation() {
        let bad = FieldUpdate {
            height: Some(f32::NAN),
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let mut rec = BoundingBox::validate_and_create(&raw()).unwrap();
        let update = FieldUpdate {
            x: Some(1.0),
            track_confidence: Some(0.9),
            ..Default::default()
        };
        update.validate().unwrap();
        update.apply(&mut rec);
        assert_eq!(rec.x(), 1.0);
        assert_eq!(rec.y(), 6.0);
        assert_eq!(rec.track_confidence(), 0.9);
    }
}
