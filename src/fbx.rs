//! Binary FBX documents.
//!
//! A binary FBX file is a 23-byte preamble, a `u32` version, a list of nested node
//! records and a footer. Every node record starts with the absolute offset at which
//! it ends, which bounds the recursion over its children.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::cursor::{ByteCursor, Endian, Primitive};
use crate::error::{header_too_short, Diagnostic, Error, Result};
use crate::inflate::Inflate;
use crate::options::DecodeOptions;
use crate::types::{
    ConnectionLink, ConnectionRelationships, Field, Node, Property, PropertyRecord, RecordValue,
    CONNECTIONS_FIELD,
};

/// Signature of a binary FBX file.
pub const MAGIC: &[u8; 23] = b"Kaydara FBX Binary  \x00\x1a\x00";

/// First version whose node headers use 64-bit size fields.
pub const LARGE_SIZE_VERSION: u32 = 7500;

/// Footer bytes that follow the last node: 160 bytes of footer plus 16 of magic.
pub const FOOTER_SIZE: usize = 176;

const CONNECTIONS: &str = "Connections";
const CONNECTION: &str = "C";
const PROPERTY_TABLE: &str = "Properties70";
const PROPERTY_RECORD: &str = "P";
const POSE_NODE: &str = "PoseNode";

/// A decoded FBX document.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Document {
    pub version: u32,
    /// Top-level nodes keyed by name.
    pub nodes: BTreeMap<String, Node>,
    /// Warnings recorded while decoding.
    pub diagnostics: Vec<Diagnostic>,
}

impl Document {
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Indexes the `Connections` tuples by object id.
    ///
    /// Each tuple `(from, to, relationship)` makes `to` a parent of `from` and
    /// `from` a child of `to`. Tuples without two integer ids are skipped.
    pub fn connection_map(&self) -> BTreeMap<i64, ConnectionRelationships> {
        let mut map: BTreeMap<i64, ConnectionRelationships> = BTreeMap::new();
        let connections = match self.node(CONNECTIONS) {
            Some(node) => node.connections(),
            None => return map,
        };
        for tuple in connections {
            let (from, to) = match (
                tuple.first().and_then(Property::as_i64),
                tuple.get(1).and_then(Property::as_i64),
            ) {
                (Some(from), Some(to)) => (from, to),
                _ => {
                    trace!(?tuple, "skipping connection without integer ids");
                    continue;
                }
            };
            let relationship = tuple.get(2).and_then(Property::as_str).map(str::to_owned);
            map.entry(from).or_default().parents.push(ConnectionLink {
                id: to,
                relationship: relationship.clone(),
            });
            map.entry(to).or_default().children.push(ConnectionLink {
                id: from,
                relationship,
            });
        }
        map
    }
}

/// Whether `bytes` starts with the binary FBX signature.
pub fn is_binary_fbx(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Whether a cursor at `offset` in a buffer of `size` bytes has reached the footer.
///
/// Exporters pad the footer to a 16-byte boundary, so for aligned buffers the
/// offset is rounded down before the comparison.
pub fn end_of_content(offset: usize, size: usize) -> bool {
    let footer_start = offset.saturating_add(FOOTER_SIZE);
    if size % 16 == 0 {
        (footer_start & !0xF) >= size
    } else {
        footer_start >= size
    }
}

/// Reads the preamble and returns the document version.
pub fn read_header(
    cursor: &mut ByteCursor<'_>,
    options: &DecodeOptions,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<u32> {
    let magic = cursor.read_bytes(MAGIC.len()).map_err(header_too_short)?;
    if options.validate_fbx_magic && magic != MAGIC {
        options.report(
            Diagnostic::MagicMismatch {
                expected: MAGIC.to_vec(),
                found: magic.to_vec(),
            },
            diagnostics,
        )?;
    }
    cursor.read_u32().map_err(header_too_short)
}

/// Decodes a complete binary FBX document.
pub fn decode(bytes: &[u8], options: &DecodeOptions, inflate: &dyn Inflate) -> Result<Document> {
    let mut cursor = ByteCursor::new(bytes, Endian::Little);
    let mut diagnostics = Vec::new();
    let version = read_header(&mut cursor, options, &mut diagnostics)?;
    debug!(version, size = bytes.len(), "decoding binary FBX");

    let mut parser = Parser::new(version, options, inflate);
    let mut nodes = BTreeMap::new();
    let size = cursor.size();
    while !end_of_content(cursor.tell(), size) {
        match parser.parse_node(&mut cursor)? {
            Some(node) => {
                let name = node.name.clone();
                if nodes.insert(name.clone(), node).is_some() {
                    parser.report(Diagnostic::DuplicateTopLevel { name })?;
                }
            }
            None => parser.skip_null_record(&mut cursor, size)?,
        }
    }

    diagnostics.extend(parser.into_diagnostics());
    Ok(Document {
        version,
        nodes,
        diagnostics,
    })
}

/// Recursive node and property decoder for one document version.
pub struct Parser<'o> {
    version: u32,
    options: &'o DecodeOptions,
    inflate: &'o dyn Inflate,
    diagnostics: Vec<Diagnostic>,
}

impl<'o> Parser<'o> {
    pub fn new(version: u32, options: &'o DecodeOptions, inflate: &'o dyn Inflate) -> Parser<'o> {
        Parser {
            version,
            options,
            inflate,
            diagnostics: Vec::new(),
        }
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn large_sizes(&self) -> bool {
        self.version >= LARGE_SIZE_VERSION
    }

    fn report(&mut self, diagnostic: Diagnostic) -> Result<()> {
        self.options.report(diagnostic, &mut self.diagnostics)
    }

    fn read_size(&self, cursor: &mut ByteCursor<'_>) -> Result<u64> {
        if self.large_sizes() {
            cursor.read_u64()
        } else {
            cursor.read_u32().map(u64::from)
        }
    }

    /// Skips what follows the end offset of a null record, never past `bound`.
    ///
    /// A null record is a node header made of zeros. [`Parser::parse_node`] stops
    /// after its end offset; the property count, property list length and name
    /// length are consumed here.
    pub fn skip_null_record(&self, cursor: &mut ByteCursor<'_>, bound: usize) -> Result<()> {
        let tail = if self.large_sizes() { 8 + 8 + 1 } else { 4 + 4 + 1 };
        let available = bound.saturating_sub(cursor.tell()).min(cursor.remaining());
        cursor.skip(tail.min(available))
    }

    /// Parses one node record and its children.
    ///
    /// Returns `None` for a null record, in which case only its end offset field
    /// has been consumed.
    pub fn parse_node(&mut self, cursor: &mut ByteCursor<'_>) -> Result<Option<Node>> {
        let start = cursor.tell();
        let end_offset = self.read_size(cursor)?;
        if end_offset == 0 {
            trace!(offset = start, "null record");
            return Ok(None);
        }

        let property_count = self.read_size(cursor)?;
        // The property list length is redundant with the end offset.
        self.read_size(cursor)?;
        let name_len = usize::from(cursor.read_u8()?);
        let name = trim_at_nul(cursor.read_string(name_len)?);
        trace!(%name, offset = start, end_offset, property_count, "node");

        let capacity = usize::try_from(property_count)
            .unwrap_or(usize::MAX)
            .min(cursor.remaining());
        let mut properties = Vec::with_capacity(capacity);
        for _ in 0..property_count {
            properties.push(self.parse_property(cursor)?);
        }

        let single_property = property_count == 1 && cursor.tell() as u64 == end_offset;
        let mut node = Node {
            name,
            properties,
            fields: BTreeMap::new(),
            single_property,
            end_offset,
        };

        let end = usize::try_from(end_offset).unwrap_or(usize::MAX);
        while cursor.tell() < end {
            let child_start = cursor.tell();
            match self.parse_node(cursor)? {
                Some(child) => self.fold_child(&mut node, child, child_start)?,
                None => self.skip_null_record(cursor, end)?,
            }
        }

        Ok(Some(node))
    }

    /// Parses one tagged property value.
    pub fn parse_property(&mut self, cursor: &mut ByteCursor<'_>) -> Result<Property> {
        let offset = cursor.tell();
        let tag = cursor.read_u8()?;
        let property = match tag {
            b'C' => Property::Bool(cursor.read_bool()?),
            b'D' => Property::F64(cursor.read_f64()?),
            b'F' => Property::F32(cursor.read_f32()?),
            b'I' => Property::I32(cursor.read_i32()?),
            b'L' => Property::I64(cursor.read_i64()?),
            b'Y' => Property::I16(cursor.read_i16()?),
            b'R' => {
                let length = cursor.read_u32()? as usize;
                Property::Raw(cursor.read_bytes(length)?.to_vec())
            }
            b'S' => {
                let length = cursor.read_u32()? as usize;
                let text = cursor.read_string(length)?;
                if self.options.trim_strings_at_nul {
                    Property::String(trim_at_nul(text))
                } else {
                    Property::String(text)
                }
            }
            b'b' | b'c' => Property::BoolArray(self.read_array(cursor)?),
            b'd' => Property::F64Array(self.read_array(cursor)?),
            b'f' => Property::F32Array(self.read_array(cursor)?),
            b'i' => Property::I32Array(self.read_array(cursor)?),
            b'l' => Property::I64Array(self.read_array(cursor)?),
            _ => return Err(Error::UnknownPropertyType { tag, offset }),
        };
        Ok(property)
    }

    fn read_array<T: Primitive>(&self, cursor: &mut ByteCursor<'_>) -> Result<Vec<T>> {
        let length = cursor.read_u32()? as usize;
        let encoding = cursor.read_u32()?;
        let compressed_length = cursor.read_u32()? as usize;
        match encoding {
            0 => cursor.read_array(length),
            1 => {
                let compressed = cursor.read_bytes(compressed_length)?;
                let expected_len = length
                    .checked_mul(T::SIZE)
                    .ok_or_else(|| Error::UnsupportedFormat(format!("array of {} elements", length)))?;
                let raw = self
                    .inflate
                    .inflate(compressed, expected_len)
                    .map_err(Error::Inflate)?;
                let mut inflated = ByteCursor::new(&raw, Endian::Little);
                inflated.read_array(length)
            }
            other => Err(Error::UnsupportedFormat(format!("array encoding {}", other))),
        }
    }

    fn fold_child(&mut self, parent: &mut Node, child: Node, offset: usize) -> Result<()> {
        if child.single_property {
            let Node { name, properties, .. } = child;
            if let Some(value) = properties.into_iter().next() {
                let field = if value.is_array() {
                    Field::Array(value)
                } else {
                    Field::Value(value)
                };
                parent.fields.insert(name, field);
            }
        } else if parent.name == CONNECTIONS && child.name == CONNECTION {
            // The first property is the connection kind (OO, OP, ...).
            let tuple: Vec<Property> = child.properties.into_iter().skip(1).collect();
            let field = parent
                .fields
                .entry(CONNECTIONS_FIELD.to_owned())
                .or_insert_with(|| Field::Connections(Vec::new()));
            match field {
                Field::Connections(list) => list.push(tuple),
                other => *other = Field::Connections(vec![tuple]),
            }
        } else if child.name == PROPERTY_TABLE {
            parent.fields.extend(child.fields);
        } else if parent.name == PROPERTY_TABLE && child.name == PROPERTY_RECORD {
            self.fold_property_record(parent, child, offset)?;
        } else {
            let id = child.numeric_id();
            match parent.fields.entry(child.name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(match id {
                        Some(id) => Field::ById(BTreeMap::from([(id, child)])),
                        None => Field::Node(Box::new(child)),
                    });
                }
                Entry::Occupied(mut slot) => coalesce(slot.get_mut(), child, id),
            }
        }
        Ok(())
    }

    fn fold_property_record(&mut self, parent: &mut Node, child: Node, offset: usize) -> Result<()> {
        let mut properties = child.properties.into_iter();
        let name = match properties.next() {
            Some(Property::String(name)) => local_prefix(name),
            other => {
                return self.report(Diagnostic::MalformedPropertyRecord {
                    offset,
                    reason: format!("expected a property name, found {:?}", other),
                });
            }
        };
        let type_name = match properties.next() {
            Some(Property::String(type_name)) => local_prefix(type_name),
            _ => String::new(),
        };
        let type_name2 = properties.next();
        let flag = properties.next();
        let value = match (properties.next(), properties.next(), properties.next()) {
            (Some(x), Some(y), Some(z)) if is_vector_type(&type_name) => RecordValue::Vector([x, y, z]),
            (Some(x), _, _) => RecordValue::Scalar(x),
            (None, _, _) => RecordValue::Missing,
        };
        parent.fields.insert(
            name,
            Field::Property(PropertyRecord {
                type_name,
                type_name2,
                flag,
                value,
            }),
        );
        Ok(())
    }
}

/// Merges a repeated child name into the field already holding it.
///
/// Id-keyed siblings keep the first node per id. A `PoseNode`, or a sibling
/// without an id, turns the map into a list.
fn coalesce(field: &mut Field, child: Node, id: Option<i64>) {
    let repeated = child.name == POSE_NODE;
    match field {
        Field::List(list) => list.push(child),
        Field::ById(by_id) => match id.filter(|_| !repeated) {
            Some(id) => {
                by_id.entry(id).or_insert(child);
            }
            None => {
                let mut list: Vec<Node> = std::mem::take(by_id).into_values().collect();
                list.push(child);
                *field = Field::List(list);
            }
        },
        Field::Node(first) => {
            let first = std::mem::take(first.as_mut());
            *field = Field::List(vec![first, child]);
        }
        _ => trace!(name = %child.name, "keeping earlier value"),
    }
}

fn trim_at_nul(mut text: String) -> String {
    if let Some(nul) = text.find('\0') {
        text.truncate(nul);
    }
    text
}

fn local_prefix(name: String) -> String {
    match name.strip_prefix("Lcl ") {
        Some(rest) => format!("Lcl_{}", rest),
        None => name,
    }
}

fn is_vector_type(type_name: &str) -> bool {
    matches!(type_name, "Color" | "ColorRGB" | "Vector" | "Vector3D") || type_name.starts_with("Lcl_")
}
