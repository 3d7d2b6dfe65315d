use std::collections::BTreeMap;

/// A single typed property value of a node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Property {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Raw(Vec<u8>),
    String(String),
    BoolArray(Vec<bool>),
    I32Array(Vec<i32>),
    I64Array(Vec<i64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
}

impl Property {
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Property::BoolArray(_)
                | Property::I32Array(_)
                | Property::I64Array(_)
                | Property::F32Array(_)
                | Property::F64Array(_)
        )
    }

    /// The value as an integer, for the integral scalar variants only.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Property::I16(v) => Some(i64::from(v)),
            Property::I32(v) => Some(i64::from(v)),
            Property::I64(v) => Some(v),
            _ => None,
        }
    }

    /// The value as a float, for any numeric scalar variant.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Property::I16(v) => Some(f64::from(v)),
            Property::I32(v) => Some(f64::from(v)),
            Property::I64(v) => Some(v as f64),
            Property::F32(v) => Some(f64::from(v)),
            Property::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Property::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Value of an entry of a property table (`P` records under `Properties70`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum RecordValue {
    /// The record carried no value slot.
    Missing,
    Scalar(Property),
    /// Colors, vectors and local transforms carry three components.
    Vector([Property; 3]),
}

/// A decoded property table entry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PropertyRecord {
    pub type_name: String,
    pub type_name2: Option<Property>,
    pub flag: Option<Property>,
    pub value: RecordValue,
}

/// One end of a connection between two objects.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ConnectionLink {
    pub id: i64,
    /// Property name for object-to-property links, `None` otherwise.
    pub relationship: Option<String>,
}

/// Links of one object, see [`crate::Document::connection_map`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ConnectionRelationships {
    pub parents: Vec<ConnectionLink>,
    pub children: Vec<ConnectionLink>,
}

/// What a parent holds under one child name once its children are folded in.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Field {
    /// The scalar of a child that held exactly one property and no children.
    Value(Property),
    /// Same as `Value`, for an array property.
    Array(Property),
    /// A single child without a numeric id.
    Node(Box<Node>),
    /// Children that carry a numeric id, keyed by it.
    ById(BTreeMap<i64, Node>),
    /// Same-named children kept in document order.
    List(Vec<Node>),
    /// Connection tuples with the connection kind stripped.
    Connections(Vec<Vec<Property>>),
    Property(PropertyRecord),
}

/// A decoded node of the scene document tree.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Node {
    pub name: String,
    /// Raw properties in document order.
    pub properties: Vec<Property>,
    /// Folded children, see [`Field`].
    pub fields: BTreeMap<String, Field>,
    /// The node holds one property and has no children.
    pub single_property: bool,
    /// Absolute offset at which the node's record ends.
    pub end_offset: u64,
}

impl Node {
    pub fn id(&self) -> Option<&Property> {
        self.properties.first()
    }

    /// The first property, when it is an integer.
    pub fn numeric_id(&self) -> Option<i64> {
        self.id().and_then(Property::as_i64)
    }

    pub fn attr_name(&self) -> Option<&Property> {
        self.properties.get(1)
    }

    pub fn attr_type(&self) -> Option<&Property> {
        self.properties.get(2)
    }

    pub fn is_single_property(&self) -> bool {
        self.single_property
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Connection tuples collected from `C` children, empty when there are none.
    pub fn connections(&self) -> &[Vec<Property>] {
        match self.fields.get(CONNECTIONS_FIELD) {
            Some(Field::Connections(list)) => list,
            _ => &[],
        }
    }
}

/// Key under which connection tuples are stored on their parent.
pub const CONNECTIONS_FIELD: &str = "connections";
