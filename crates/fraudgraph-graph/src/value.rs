//! Conversion of checked property values into Bolt parameters.

use fraudgraph_core::schema::PropertyValue;
use neo4rs::BoltType;

pub(crate) fn to_bolt(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::Boolean(b) => BoltType::from(*b),
        PropertyValue::Integer(i) => BoltType::from(*i),
        PropertyValue::Float(f) => BoltType::from(*f),
        PropertyValue::Text(s) => BoltType::from(s.clone()),
        PropertyValue::TextList(items) => BoltType::from(items.clone()),
    }
}
