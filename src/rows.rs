//! Fixed column schema of tracking files.
//!
//! A file is a header of `#` comment lines (editor, edit time, identity
//! names, column names) followed by one delimited row per record:
//!
//! ```text
//! # username: ana
//! # edited: 2024-05-01T10:00:00+00:00
//! # identities: Ada,Max
//! # columns: trackNumber,trackId,x,y,width,height,confidenceTrack,classId,nameOrder,confidenceId
//! 12,0,10.000,20.000,30.000,40.000,0.900,1,0,0.750
//! ```
//!
//! `trackNumber` carries the frame number; `nameOrder` and `confidenceId`
//! may be empty.

use crate::config::ExportConfig;
use crate::error::Error;
use crate::id::{ClassId, TrackId};
use crate::math::round_to;
use crate::record::{BoundingBox, RawRecord, Scalar};
use chrono::{DateTime, Utc};
use std::fmt::Write;

pub const COLUMNS: [&str; 10] = [
    "trackNumber",
    "trackId",
    "x",
    "y",
    "width",
    "height",
    "confidenceTrack",
    "classId",
    "nameOrder",
    "confidenceId",
];

const REQUIRED_COLUMNS: usize = 8;

const USERNAME_KEY: &str = "username";
const EDITED_KEY: &str = "edited";
const IDENTITIES_KEY: &str = "identities";
const COLUMNS_KEY: &str = "columns";

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingRow {
    pub frame: u32,
    pub track_id: TrackId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence_track: f32,
    pub class_id: ClassId,
    pub name_order: Option<u32>,
    pub confidence_id: Option<f32>,
}

impl TrackingRow {
    pub fn from_record(rec: &BoundingBox) -> Self {
        Self {
            frame: rec.frame(),
            track_id: rec.track_id().clone(),
            x: rec.x(),
            y: rec.y(),
            width: rec.width(),
            height: rec.height(),
            confidence_track: rec.track_confidence(),
            class_id: rec.class_id().clone(),
            name_order: rec.identity_order(),
            confidence_id: rec.identity_confidence(),
        }
    }

    pub fn to_raw(&self) -> RawRecord {
        RawRecord {
            frame: Some(Scalar::Int(self.frame as i64)),
            track_id: Some(Scalar::Text(self.track_id.to_string())),
            class_id: Some(Scalar::Text(self.class_id.to_string())),
            x: Some(Scalar::Float(self.x as f64)),
            y: Some(Scalar::Float(self.y as f64)),
            width: Some(Scalar::Float(self.width as f64)),
            height: Some(Scalar::Float(self.height as f64)),
            track_confidence: Some(Scalar::Float(self.confidence_track as f64)),
            identity_order: self.name_order.map(|v| Scalar::Int(v as i64)),
            identity_confidence: self.confidence_id.map(|v| Scalar::Float(v as f64)),
        }
    }

    pub fn to_line(&self, delimiter: char, precision: usize) -> String {
        let num = |v: f32| format!("{:.*}", precision, round_to(v, precision));
        let fields = [
            self.frame.to_string(),
            self.track_id.to_string(),
            num(self.x),
            num(self.y),
            num(self.width),
            num(self.height),
            num(self.confidence_track),
            self.class_id.to_string(),
            self.name_order.map(|v| v.to_string()).unwrap_or_default(),
            self.confidence_id.map(num).unwrap_or_default(),
        ];

        fields.join(&delimiter.to_string())
    }

    /// Splits one data line into loosely-typed fields. Type checks are left
    /// to [`BoundingBox::validate_and_create`].
    pub fn parse_line(line: &str, delimiter: char, line_no: usize) -> Result<RawRecord, Error> {
        let fields: Vec<_> = line.split(delimiter).map(str::trim).collect();

        if fields.len() < REQUIRED_COLUMNS || fields.len() > COLUMNS.len() {
            return Err(Error::MalformedRow {
                line: line_no,
                reason: format!(
                    "expected {} to {} fields, found {}",
                    REQUIRED_COLUMNS,
                    COLUMNS.len(),
                    fields.len()
                ),
            });
        }

        let field = |idx: usize| {
            fields
                .get(idx)
                .filter(|s| !s.is_empty())
                .map(|s| Scalar::Text(s.to_string()))
        };

        Ok(RawRecord {
            frame: field(0),
            track_id: field(1),
            x: field(2),
            y: field(3),
            width: field(4),
            height: field(5),
            track_confidence: field(6),
            class_id: field(7),
            identity_order: field(8),
            identity_confidence: field(9),
        })
    }
}

/// Everything written to one tracking file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingDocument {
    pub username: String,
    pub edited_at: DateTime<Utc>,
    pub identity_names: Vec<String>,
    pub rows: Vec<TrackingRow>,
}

impl TrackingDocument {
    pub fn format(&self, config: &ExportConfig) -> String {
        let delim = config.delimiter.to_string();
        let mut out = String::new();

        // Writing into a String cannot fail.
        let _ = writeln!(out, "# {}: {}", USERNAME_KEY, self.username);
        let _ = writeln!(out, "# {}: {}", EDITED_KEY, self.edited_at.to_rfc3339());
        let _ = writeln!(out, "# {}: {}", IDENTITIES_KEY, self.identity_names.join(&delim));
        let _ = writeln!(out, "# {}: {}", COLUMNS_KEY, COLUMNS.join(&delim));

        for row in &self.rows {
            out.push_str(&row.to_line(config.delimiter, config.precision));
            out.push('\n');
        }

        out
    }
}

/// A tracking file read back into loosely-typed rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub username: Option<String>,
    pub edited_at: Option<DateTime<Utc>>,
    pub identity_names: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl ParsedDocument {
    pub fn parse(text: &str, delimiter: char) -> Result<Self, Error> {
        let mut doc = ParsedDocument::default();

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim_end_matches('\r');

            if line.trim().is_empty() {
                continue;
            }

            if let Some(comment) = line.strip_prefix('#') {
                if let Some((key, value)) = comment.trim().split_once(':') {
                    let value = value.trim();

                    match key.trim() {
                        USERNAME_KEY => doc.username = Some(value.to_string()),
                        EDITED_KEY => {
                            doc.edited_at = DateTime::parse_from_rfc3339(value)
                                .map(|t| t.with_timezone(&Utc))
                                .ok()
                        }
                        IDENTITIES_KEY => {
                            doc.identity_names = value
                                .split(delimiter)
                                .map(str::trim)
                                .filter(|s| !s.is_empty())
                                .map(String::from)
                                .collect()
                        }
                        _ => (),
                    }
                }

                continue;
            }

            doc.rows.push(TrackingRow::parse_line(line, delimiter, idx + 1)?);
        }

        Ok(doc)
    }
}
