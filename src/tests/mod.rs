use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;


/// A node to be written into a synthetic FBX buffer.
pub struct TestNode {
    pub name: &'static str,
    pub properties: Vec<Vec<u8>>,
    pub children: Vec<TestNode>,
}

pub fn node(name: &'static str, properties: Vec<Vec<u8>>, children: Vec<TestNode>) -> TestNode {
    TestNode {
        name,
        properties,
        children,
    }
}

fn write_size(buf: &mut Vec<u8>, at: usize, value: usize, large: bool) {
    if large {
        buf[at..at + 8].copy_from_slice(&(value as u64).to_le_bytes());
    } else {
        buf[at..at + 4].copy_from_slice(&(value as u32).to_le_bytes());
    }
}

pub fn null_record(large: bool) -> Vec<u8> {
    vec![0u8; if large { 25 } else { 13 }]
}

/// Appends `node` to `buf`; end offsets are relative to the start of `buf`.
pub fn write_node(buf: &mut Vec<u8>, node: &TestNode, large: bool) {
    let width = if large { 8 } else { 4 };
    let start = buf.len();
    buf.resize(start + 3 * width, 0);
    buf.push(node.name.len() as u8);
    buf.extend_from_slice(node.name.as_bytes());

    let properties_start = buf.len();
    for property in &node.properties {
        buf.extend_from_slice(property);
    }
    let properties_len = buf.len() - properties_start;

    for child in &node.children {
        write_node(buf, child, large);
    }
    if !node.children.is_empty() {
        buf.extend_from_slice(&null_record(large));
    }

    let end = buf.len();
    write_size(buf, start, end, large);
    write_size(buf, start + width, node.properties.len(), large);
    write_size(buf, start + 2 * width, properties_len, large);
}

/// A complete binary FBX buffer: preamble, version, nodes, null record, footer.
pub fn fbx_document(version: u32, nodes: &[TestNode]) -> Vec<u8> {
    let large = version >= crate::fbx::LARGE_SIZE_VERSION;
    let mut buf = crate::fbx::MAGIC.to_vec();
    buf.extend_from_slice(&version.to_le_bytes());
    for node in nodes {
        write_node(&mut buf, node, large);
    }
    buf.extend_from_slice(&null_record(large));
    buf.resize(buf.len() + crate::fbx::FOOTER_SIZE, 0);
    buf
}

fn tagged(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(payload);
    out
}

pub fn bool_prop(value: bool) -> Vec<u8> {
    tagged(b'C', &[value as u8])
}

pub fn i16_prop(value: i16) -> Vec<u8> {
    tagged(b'Y', &value.to_le_bytes())
}

pub fn i32_prop(value: i32) -> Vec<u8> {
    tagged(b'I', &value.to_le_bytes())
}

pub fn i64_prop(value: i64) -> Vec<u8> {
    tagged(b'L', &value.to_le_bytes())
}

pub fn f32_prop(value: f32) -> Vec<u8> {
    tagged(b'F', &value.to_le_bytes())
}

pub fn f64_prop(value: f64) -> Vec<u8> {
    tagged(b'D', &value.to_le_bytes())
}

fn length_prefixed(tag: u8, bytes: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
    out
}

pub fn str_prop(value: &str) -> Vec<u8> {
    length_prefixed(b'S', value.as_bytes())
}

pub fn raw_prop(value: &[u8]) -> Vec<u8> {
    length_prefixed(b'R', value)
}

/// An array property from already little endian encoded elements.
pub fn array_prop(tag: u8, count: usize, elements: &[u8], compressed: bool) -> Vec<u8> {
    let (encoding, payload) = if compressed {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(elements).unwrap();
        (1u32, encoder.finish().unwrap())
    } else {
        (0u32, elements.to_vec())
    };
    let mut out = vec![tag];
    out.extend_from_slice(&(count as u32).to_le_bytes());
    out.extend_from_slice(&encoding.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&payload);
    out
}

pub fn i32_array_prop(values: &[i32], compressed: bool) -> Vec<u8> {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    array_prop(b'i', values.len(), &bytes, compressed)
}

pub fn f64_array_prop(values: &[f64], compressed: bool) -> Vec<u8> {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    array_prop(b'd', values.len(), &bytes, compressed)
}
