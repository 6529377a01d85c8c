//! Entity schema: the closed set of node and relation kinds and the
//! properties each one may carry.
//!
//! Query fragments are only ever built from the names in these tables;
//! request-supplied names are checked against them first.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{FraudError, FraudResult};
use crate::timestamp;

/// Value type accepted for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Float,
    Integer,
    Boolean,
    /// Stored as given; must parse as a transaction timestamp.
    Timestamp,
    TextList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
}

const fn field(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec { name, ty, required: false }
}

const fn required(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec { name, ty, required: true }
}

use FieldType::*;

const CUSTOMER_FIELDS: &[FieldSpec] = &[
    required("firstName", Text),
    required("lastName", Text),
    field("email", Text),
    field("phoneNumbers", TextList),
    field("isHighRisk", Boolean),
    field("isVIP", Boolean),
    field("createdAt", Timestamp),
];

const ACCOUNT_FIELDS: &[FieldSpec] = &[
    required("accountNumber", Text),
    required("accountType", Text),
    required("balance", Float),
    required("currency", Text),
    field("isActive", Boolean),
    field("createdAt", Timestamp),
];

const DEVICE_FIELDS: &[FieldSpec] = &[
    required("deviceType", Text),
    field("os", Text),
    field("lastUsed", Timestamp),
    field("ipAddresses", TextList),
];

const LOCATION_FIELDS: &[FieldSpec] = &[
    required("city", Text),
    required("country", Text),
    field("timezone", Text),
];

const BRANCH_FIELDS: &[FieldSpec] = &[
    required("name", Text),
    field("address", Text),
    field("establishedYear", Integer),
];

const OWNS_FIELDS: &[FieldSpec] = &[
    field("since", Timestamp),
    field("sharePercentage", Float),
    field("ownershipType", Text),
];

const TRANSFERS_FIELDS: &[FieldSpec] = &[
    required("amount", Float),
    required("currency", Text),
    field("transactionDate", Timestamp),
    field("isInternational", Boolean),
];

const USES_FIELDS: &[FieldSpec] = &[
    field("lastAccessed", Timestamp),
    field("ipAddress", Text),
    field("deviceType", Text),
];

const LOCATED_AT_FIELDS: &[FieldSpec] = &[
    field("connectionTime", Timestamp),
    field("accuracy", Float),
];

const OPERATES_AT_FIELDS: &[FieldSpec] = &[
    field("establishedYear", Integer),
];

const LINKED_TO_FIELDS: &[FieldSpec] = &[
    field("linkageType", Text),
    field("confidenceScore", Float),
    field("detectedAt", Timestamp),
];

const REFERRED_FIELDS: &[FieldSpec] = &[
    field("referralCode", Text),
    field("referralDate", Timestamp),
    field("bonusAmount", Float),
];

const TRUSTS_FIELDS: &[FieldSpec] = &[
    field("trustLevel", Integer),
    field("since", Timestamp),
    field("verificationMethod", Text),
];

const SERVICED_BY_FIELDS: &[FieldSpec] = &[
    field("serviceLevel", Text),
    field("since", Timestamp),
    field("feedbackScore", Float),
];

const CONNECTED_VIA_FIELDS: &[FieldSpec] = &[
    field("lastUsed", Timestamp),
    field("frequency", Integer),
    field("isVerified", Boolean),
];

const RESIDES_IN_FIELDS: &[FieldSpec] = &[
    field("since", Timestamp),
    field("addressType", Text),
    field("verificationStatus", Boolean),
];

const LOCATED_IN_FIELDS: &[FieldSpec] = &[
    field("branchArea", Text),
    field("geoAccuracy", Float),
    field("registeredAt", Timestamp),
];

/// Node kinds of the fraud graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Customer,
    Account,
    Device,
    Location,
    Branch,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Customer,
        NodeKind::Account,
        NodeKind::Device,
        NodeKind::Location,
        NodeKind::Branch,
    ];

    /// The graph label.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Customer => "Customer",
            NodeKind::Account => "Account",
            NodeKind::Device => "Device",
            NodeKind::Location => "Location",
            NodeKind::Branch => "Branch",
        }
    }

    /// Unique identifying property.
    pub fn key_field(&self) -> &'static str {
        match self {
            NodeKind::Customer => "customerId",
            NodeKind::Account => "accountId",
            NodeKind::Device => "deviceId",
            NodeKind::Location => "locationId",
            NodeKind::Branch => "branchCode",
        }
    }

    /// Mutable properties, excluding the key.
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            NodeKind::Customer => CUSTOMER_FIELDS,
            NodeKind::Account => ACCOUNT_FIELDS,
            NodeKind::Device => DEVICE_FIELDS,
            NodeKind::Location => LOCATION_FIELDS,
            NodeKind::Branch => BRANCH_FIELDS,
        }
    }

    /// Whether creation stamps `createdAt` when the caller omits it.
    pub fn stamps_created_at(&self) -> bool {
        self.fields().iter().any(|f| f.name == "createdAt")
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for NodeKind {
    type Err = FraudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" | "customers" => Ok(Self::Customer),
            "account" | "accounts" => Ok(Self::Account),
            "device" | "devices" => Ok(Self::Device),
            "location" | "locations" => Ok(Self::Location),
            "branch" | "branches" => Ok(Self::Branch),
            other => Err(FraudError::validation(format!("unknown node kind '{}'", other))),
        }
    }
}

/// Relation kinds of the fraud graph. Each has fixed endpoint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Owns,
    Transfers,
    Uses,
    LocatedAt,
    OperatesAt,
    LinkedTo,
    Referred,
    Trusts,
    ServicedBy,
    ConnectedVia,
    ResidesIn,
    LocatedIn,
}

impl RelationKind {
    pub const ALL: [RelationKind; 12] = [
        RelationKind::Owns,
        RelationKind::Transfers,
        RelationKind::Uses,
        RelationKind::LocatedAt,
        RelationKind::OperatesAt,
        RelationKind::LinkedTo,
        RelationKind::Referred,
        RelationKind::Trusts,
        RelationKind::ServicedBy,
        RelationKind::ConnectedVia,
        RelationKind::ResidesIn,
        RelationKind::LocatedIn,
    ];

    /// The relationship type in the graph.
    pub fn rel_type(&self) -> &'static str {
        match self {
            RelationKind::Owns => "owns",
            RelationKind::Transfers => "transfers",
            RelationKind::Uses => "uses",
            RelationKind::LocatedAt => "located_at",
            RelationKind::OperatesAt => "operates_at",
            RelationKind::LinkedTo => "linked_to",
            RelationKind::Referred => "referred",
            RelationKind::Trusts => "trusts",
            RelationKind::ServicedBy => "serviced_by",
            RelationKind::ConnectedVia => "connected_via",
            RelationKind::ResidesIn => "resides_in",
            RelationKind::LocatedIn => "located_in",
        }
    }

    pub fn source(&self) -> NodeKind {
        match self {
            RelationKind::Owns
            | RelationKind::Uses
            | RelationKind::Referred
            | RelationKind::Trusts
            | RelationKind::ServicedBy
            | RelationKind::ResidesIn => NodeKind::Customer,
            RelationKind::Transfers
            | RelationKind::OperatesAt
            | RelationKind::LinkedTo
            | RelationKind::ConnectedVia => NodeKind::Account,
            RelationKind::LocatedAt => NodeKind::Device,
            RelationKind::LocatedIn => NodeKind::Branch,
        }
    }

    pub fn target(&self) -> NodeKind {
        match self {
            RelationKind::Owns | RelationKind::Transfers | RelationKind::LinkedTo => NodeKind::Account,
            RelationKind::Uses | RelationKind::ConnectedVia => NodeKind::Device,
            RelationKind::LocatedAt | RelationKind::ResidesIn | RelationKind::LocatedIn => {
                NodeKind::Location
            }
            RelationKind::OperatesAt | RelationKind::ServicedBy => NodeKind::Branch,
            RelationKind::Referred | RelationKind::Trusts => NodeKind::Customer,
        }
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            RelationKind::Owns => OWNS_FIELDS,
            RelationKind::Transfers => TRANSFERS_FIELDS,
            RelationKind::Uses => USES_FIELDS,
            RelationKind::LocatedAt => LOCATED_AT_FIELDS,
            RelationKind::OperatesAt => OPERATES_AT_FIELDS,
            RelationKind::LinkedTo => LINKED_TO_FIELDS,
            RelationKind::Referred => REFERRED_FIELDS,
            RelationKind::Trusts => TRUSTS_FIELDS,
            RelationKind::ServicedBy => SERVICED_BY_FIELDS,
            RelationKind::ConnectedVia => CONNECTED_VIA_FIELDS,
            RelationKind::ResidesIn => RESIDES_IN_FIELDS,
            RelationKind::LocatedIn => LOCATED_IN_FIELDS,
        }
    }

    /// Whether several edges may exist between the same endpoints.
    pub fn allows_parallel(&self) -> bool {
        matches!(self, RelationKind::Transfers)
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rel_type())
    }
}

impl FromStr for RelationKind {
    type Err = FraudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|k| k.rel_type() == normalized)
            .ok_or_else(|| FraudError::validation(format!("unknown relation kind '{}'", s)))
    }
}

/// A scalar (or text list) property value from a request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    TextList(Vec<String>),
}

impl PropertyValue {
    fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Boolean(_) => "boolean",
            PropertyValue::Integer(_) => "integer",
            PropertyValue::Float(_) => "float",
            PropertyValue::Text(_) => "text",
            PropertyValue::TextList(_) => "text list",
        }
    }
}

/// Property map as received from a caller.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A property that passed allow-list and type checks.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedProperty {
    pub name: &'static str,
    pub value: PropertyValue,
}

/// Whether the checked set is for a new entity (required fields enforced).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    Create,
    Update,
}

/// Validate a property map against an allow-list.
///
/// `entity` names the target in error messages. Integer values are accepted
/// for float fields and converted.
pub fn check_properties(
    entity: &str,
    fields: &'static [FieldSpec],
    props: &Properties,
    mode: CheckMode,
) -> FraudResult<Vec<CheckedProperty>> {
    let mut checked = Vec::with_capacity(props.len());

    for (name, value) in props {
        let spec = fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| {
                FraudError::validation(format!("unknown property '{}' for {}", name, entity))
            })?;
        checked.push(CheckedProperty {
            name: spec.name,
            value: coerce(entity, spec, value)?,
        });
    }

    if mode == CheckMode::Create {
        if let Some(missing) = fields
            .iter()
            .find(|f| f.required && !props.contains_key(f.name))
        {
            return Err(FraudError::validation(format!(
                "missing required property '{}' for {}",
                missing.name, entity
            )));
        }
    } else if checked.is_empty() {
        return Err(FraudError::validation(format!(
            "at least one property is required to update {}",
            entity
        )));
    }

    Ok(checked)
}

/// Validate a list of property names for removal.
///
/// Required properties cannot be removed.
pub fn check_removals(
    entity: &str,
    fields: &'static [FieldSpec],
    names: &[String],
) -> FraudResult<Vec<&'static str>> {
    if names.is_empty() {
        return Err(FraudError::validation(format!(
            "at least one property name is required to remove from {}",
            entity
        )));
    }
    names
        .iter()
        .map(|name| {
            let spec = fields.iter().find(|f| f.name == name).ok_or_else(|| {
                FraudError::validation(format!("unknown property '{}' for {}", name, entity))
            })?;
            if spec.required {
                return Err(FraudError::validation(format!(
                    "property '{}' is required on {} and cannot be removed",
                    name, entity
                )));
            }
            Ok(spec.name)
        })
        .collect()
}

fn coerce(entity: &str, spec: &FieldSpec, value: &PropertyValue) -> FraudResult<PropertyValue> {
    let mismatch = || {
        FraudError::validation(format!(
            "property '{}' of {} expects {:?}, got {}",
            spec.name,
            entity,
            spec.ty,
            value.type_name()
        ))
    };

    match (spec.ty, value) {
        (Text, PropertyValue::Text(_))
        | (Integer, PropertyValue::Integer(_))
        | (Boolean, PropertyValue::Boolean(_))
        | (TextList, PropertyValue::TextList(_)) => Ok(value.clone()),
        (Float, PropertyValue::Float(f)) if f.is_finite() => Ok(value.clone()),
        (Float, PropertyValue::Integer(i)) => Ok(PropertyValue::Float(*i as f64)),
        (Timestamp, PropertyValue::Text(s)) => {
            if timestamp::parse(s).is_some() {
                Ok(value.clone())
            } else {
                Err(FraudError::validation(format!(
                    "property '{}' of {} is not a valid date-time: '{}'",
                    spec.name, entity, s
                )))
            }
        }
        _ => Err(mismatch()),
    }
}
