// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Attribute maps carried by nodes and edges.

use alloc::collections::BTreeMap;
use alloc::string::String;
use serde::{Deserialize, Serialize};

use crate::types::scalar::FxpScalar;

/// Attribute value. Floats enter only as Q16.16 so every map encodes canonically.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Fixed(FxpScalar),
}

/// Ordered attribute map; key order is part of the canonical encoding.
pub type Attributes = BTreeMap<String, AttrValue>;
