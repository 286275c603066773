//! Named columns of the trace header matrix.
//!
//! A [HeaderSchema] lists fields in display order. Every field keeps the storage index it was
//! created with, so reordering the display never moves data and name lookups always resolve to
//! the column that actually holds the values.

use crate::Error;
use geoseis_codec::fields::TRACE_FIELDS;
use geoseis_utils::units::UnitKind;
use std::collections::HashMap;

/// A named column of the trace header matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    /// Column in the stored header matrix.
    pub index: usize,
    /// Physical dimension of the values (drives unit conversion).
    pub kind: UnitKind,
}

/// Physical dimension of a standard trace header field.
fn standard_kind(name: &str) -> UnitKind {
    match name {
        "DSREG" | "RGE" | "SES" | "SDBS" | "DERG" | "DES" | "WDS" | "WGD" | "SRCX" | "SRCY"
        | "GRPX" | "GRPY" | "CDP_X" | "CDP_Y" => UnitKind::Length,
        "UTSRC" | "UTGRP" | "SECSCOR" | "GRPSCOR" | "TSA" | "LAGTA" | "LAGTB" | "DELRECT"
        | "MTSTART" | "MTEND" => UnitKind::Temporal,
        _ => UnitKind::Dimensionless,
    }
}

/// Ordered set of trace header fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderSchema {
    fields: Vec<HeaderField>,
    lookup: HashMap<String, usize>,
}

impl Default for HeaderSchema {
    fn default() -> Self {
        Self::standard()
    }
}

impl HeaderSchema {
    /// The 78 standard SEG-Y trace header fields, displayed in storage order.
    pub fn standard() -> Self {
        let fields = TRACE_FIELDS
            .iter()
            .enumerate()
            .map(|(index, field)| HeaderField {
                name: field.name.to_string(),
                index,
                kind: standard_kind(field.name),
            })
            .collect();
        Self::build(fields)
    }

    /// Build a schema from fields listed in display order.
    ///
    /// Storage indices must cover `0..fields.len()` exactly once and names must be unique.
    pub fn new(fields: Vec<HeaderField>) -> Result<Self, Error> {
        let mut seen = vec![false; fields.len()];
        for field in &fields {
            match seen.get_mut(field.index) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(Error::InvalidArgument {
                        name: "header schema",
                        reason: format!("field {} has invalid index {}", field.name, field.index),
                    })
                }
            }
        }
        let schema = Self::build(fields);
        if schema.lookup.len() != schema.fields.len() {
            return Err(Error::InvalidArgument {
                name: "header schema",
                reason: "duplicate field name".into(),
            });
        }
        Ok(schema)
    }

    fn build(fields: Vec<HeaderField>) -> Self {
        let lookup = fields
            .iter()
            .map(|field| (field.name.clone(), field.index))
            .collect();
        Self { fields, lookup }
    }

    /// Return a schema with the same columns displayed in the order of `names`.
    pub fn reorder<S: AsRef<str>>(&self, names: &[S]) -> Result<Self, Error> {
        if names.len() != self.fields.len() {
            return Err(Error::ShapeMismatch {
                what: "header order",
                expected: self.fields.len(),
                found: names.len(),
            });
        }
        let fields = names
            .iter()
            .map(|name| self.field(name.as_ref()).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fields)
    }

    /// Number of fields (the width of the header matrix).
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in display order.
    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    /// Field names in display order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Storage column of `name`.
    pub fn index(&self, name: &str) -> Result<usize, Error> {
        self.lookup
            .get(name)
            .copied()
            .ok_or_else(|| Error::InvalidHeaderName(name.to_string()))
    }

    /// Storage columns of `names`, in the order given.
    pub fn indices<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, Error> {
        names.iter().map(|name| self.index(name.as_ref())).collect()
    }

    pub fn field(&self, name: &str) -> Result<&HeaderField, Error> {
        let index = self.index(name)?;
        self.fields
            .iter()
            .find(|field| field.index == index)
            .ok_or_else(|| Error::InvalidHeaderName(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }
}
