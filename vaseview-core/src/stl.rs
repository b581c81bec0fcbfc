//! STL file parser for binary and ASCII formats

use nom::{
    bytes::complete::{tag, take, take_till},
    character::complete::{multispace0, multispace1, not_line_ending},
    combinator::all_consuming,
    multi::{count, many0},
    number::complete::{float, le_f32, le_u16, le_u32},
    sequence::preceded,
    IResult,
};
use thiserror::Error;

use crate::geometry::{Mesh, Triangle, Vertex};

/// Size of the binary header that precedes the triangle count
const BINARY_HEADER_LEN: usize = 80;
/// Normal + three vertices + attribute byte count
const BINARY_FACET_LEN: usize = 50;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StlError {
    #[error("file too small to be a valid STL ({0} bytes)")]
    TooSmall(usize),

    #[error("unexpected end of file: header declares {declared} triangles, found room for {available}")]
    Truncated { declared: usize, available: usize },

    #[error("failed to parse ASCII STL: {0}")]
    Ascii(String),

    #[error("mesh contains no triangles")]
    Empty,

    #[error("non-finite coordinate in triangle {0}")]
    NonFinite(usize),
}

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Mesh, StlError> {
    if data.len() < BINARY_HEADER_LEN + 4 {
        return Err(StlError::TooSmall(data.len()));
    }

    let body = &data[BINARY_HEADER_LEN..];
    let declared = u32::from_le_bytes([body[0], body[1], body[2], body[3]]) as usize;
    let available = (body.len() - 4) / BINARY_FACET_LEN;
    if declared > available {
        return Err(StlError::Truncated {
            declared,
            available,
        });
    }

    match binary_body(body) {
        Ok((_, mesh)) => Ok(mesh),
        // Length was checked above, so the only failure left is a short read
        Err(_) => Err(StlError::Truncated {
            declared,
            available,
        }),
    }
}

fn binary_body(input: &[u8]) -> IResult<&[u8], Mesh> {
    let (input, triangle_count) = le_u32(input)?;
    let (input, triangles) = count(binary_facet, triangle_count as usize)(input)?;
    Ok((input, Mesh { triangles }))
}

fn binary_facet(input: &[u8]) -> IResult<&[u8], Triangle> {
    let (input, (nx, ny, nz)) = binary_vector3(input)?;
    let mut vertices = [Vertex::new(0.0, 0.0, 0.0, nx, ny, nz); 3];
    let mut input = input;
    for vertex in &mut vertices {
        let (rest, (x, y, z)) = binary_vector3(input)?;
        *vertex = Vertex::new(x, y, z, nx, ny, nz);
        input = rest;
    }
    // Attribute byte count, unused
    let (input, _) = le_u16(input)?;

    Ok((input, Triangle::new(vertices[0], vertices[1], vertices[2])))
}

fn binary_vector3(input: &[u8]) -> IResult<&[u8], (f32, f32, f32)> {
    let (input, x) = le_f32(input)?;
    let (input, y) = le_f32(input)?;
    let (input, z) = le_f32(input)?;
    Ok((input, (x, y, z)))
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Mesh, StlError> {
    match all_consuming(parse_ascii_stl_impl)(input) {
        Ok((_, mesh)) => Ok(mesh),
        Err(e) => Err(StlError::Ascii(describe(e))),
    }
}

fn describe(err: nom::Err<nom::error::Error<&str>>) -> String {
    match err {
        nom::Err::Incomplete(_) => "incomplete input".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let excerpt: String = e.input.chars().take(24).collect();
            format!("{:?} near {:?}", e.code, excerpt)
        }
    }
}

fn parse_ascii_stl_impl(input: &str) -> IResult<&str, Mesh> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    // Optional name, up to the end of the line
    let (input, _) = not_line_ending(input)?;
    let (input, triangles) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;
    let (input, _) = take_till(|c: char| c == '\n' || c == '\r')(input)?;
    let (input, _) = multispace0(input)?;

    Ok((input, Mesh { triangles }))
}

fn parse_facet(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = parse_vertex(input, normal)?;
    let (input, v2) = parse_vertex(input, normal)?;
    let (input, v3) = parse_vertex(input, normal)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, Triangle::new(v1, v2, v3)))
}

fn parse_vertex(input: &str, normal: (f32, f32, f32)) -> IResult<&str, Vertex> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    let (input, (x, y, z)) = parse_vector3(input)?;
    Ok((input, Vertex::new(x, y, z, normal.0, normal.1, normal.2)))
}

fn parse_vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, x) = preceded(multispace0, float)(input)?;
    let (input, y) = preceded(multispace1, float)(input)?;
    let (input, z) = preceded(multispace1, float)(input)?;
    Ok((input, (x, y, z)))
}

/// Whether the payload length matches the binary layout exactly
fn is_exact_binary(data: &[u8]) -> bool {
    if data.len() < BINARY_HEADER_LEN + 4 {
        return false;
    }
    let header: IResult<&[u8], u32> = preceded(take(BINARY_HEADER_LEN), le_u32)(data);
    match header {
        Ok((rest, declared)) => rest.len() == declared as usize * BINARY_FACET_LEN,
        Err(_) => false,
    }
}

/// Detect and parse STL file (binary or ASCII), rejecting empty or non-finite meshes
pub fn parse_stl(data: &[u8]) -> Result<Mesh, StlError> {
    // Binary files may legally begin with "solid", so the exact size wins
    let mesh = if is_exact_binary(data) {
        parse_binary_stl(data)?
    } else if data.starts_with(b"solid") {
        match std::str::from_utf8(data) {
            Ok(text) => parse_ascii_stl(text)?,
            Err(_) => parse_binary_stl(data)?,
        }
    } else {
        parse_binary_stl(data)?
    };

    validate(mesh)
}

fn validate(mesh: Mesh) -> Result<Mesh, StlError> {
    if mesh.is_empty() {
        return Err(StlError::Empty);
    }
    for (index, triangle) in mesh.triangles.iter().enumerate() {
        let finite = triangle
            .vertices
            .iter()
            .all(|v| v.position.iter().all(|c| c.is_finite()));
        if !finite {
            return Err(StlError::NonFinite(index));
        }
    }
    Ok(mesh)
}

/// Encode a mesh as binary STL, used by tooling and tests
pub fn write_binary_stl(mesh: &Mesh) -> Vec<u8> {
    let mut out = Vec::with_capacity(BINARY_HEADER_LEN + 4 + mesh.triangles.len() * BINARY_FACET_LEN);
    out.extend_from_slice(&[0u8; BINARY_HEADER_LEN]);
    out.extend_from_slice(&(mesh.triangles.len() as u32).to_le_bytes());
    for triangle in &mesh.triangles {
        let n = triangle.vertices[0].normal;
        for c in n.iter() {
            out.extend_from_slice(&c.to_le_bytes());
        }
        for vertex in &triangle.vertices {
            for c in vertex.position.iter() {
                out.extend_from_slice(&c.to_le_bytes());
            }
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TETRA_ASCII: &str = "solid tetra
  facet normal 0 0 -1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 1 0
    endloop
  endfacet
  facet normal 0 -1 0
    outer loop
      vertex 0 0 0
      vertex 0 0 1
      vertex 1 0 0
    endloop
  endfacet
endsolid tetra
";

    #[test]
    fn test_parse_binary_header() {
        let mut data = vec![0u8; 84];
        // Set triangle count to 0
        data[80..84].copy_from_slice(&0u32.to_le_bytes());

        let result = parse_binary_stl(&data);
        assert!(result.is_ok());
        let mesh = result.unwrap();
        assert_eq!(mesh.triangles.len(), 0);
    }

    #[test]
    fn test_parse_stl_rejects_empty_mesh() {
        let mut data = vec![0u8; 84];
        data[80..84].copy_from_slice(&0u32.to_le_bytes());
        assert_eq!(parse_stl(&data), Err(StlError::Empty));
    }

    #[test]
    fn test_binary_cube() {
        let cube = Mesh::cube(2.0);
        let bytes = write_binary_stl(&cube);
        let parsed = parse_stl(&bytes).unwrap();
        assert_eq!(parsed, cube);
    }

    #[test]
    fn test_binary_truncated() {
        let mut bytes = write_binary_stl(&Mesh::cube(1.0));
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            parse_stl(&bytes),
            Err(StlError::Truncated { declared: 12, available: 11 })
        ));
    }

    #[test]
    fn test_binary_with_solid_header() {
        let mut bytes = write_binary_stl(&Mesh::cube(1.0));
        bytes[..5].copy_from_slice(b"solid");
        assert_eq!(parse_stl(&bytes).unwrap().triangles.len(), 12);
    }

    #[test]
    fn test_ascii_tetra() {
        let mesh = parse_stl(TETRA_ASCII.as_bytes()).unwrap();
        assert_eq!(mesh.triangles.len(), 2);
        assert_eq!(mesh.triangles[1].vertices[1].position.z, 1.0);
        assert_eq!(mesh.triangles[0].vertices[0].normal.z, -1.0);
    }

    #[test]
    fn test_ascii_garbage_is_error() {
        let text = "solid broken\n facet normal 0 0 1\n outer loop\n vertex 0 0\n";
        assert!(matches!(parse_stl(text.as_bytes()), Err(StlError::Ascii(_))));
    }

    #[test]
    fn test_too_small() {
        assert_eq!(parse_stl(b"nope"), Err(StlError::TooSmall(4)));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut mesh = Mesh::cube(1.0);
        mesh.triangles[3].vertices[2].position.x = f32::INFINITY;
        let bytes = write_binary_stl(&mesh);
        assert_eq!(parse_stl(&bytes), Err(StlError::NonFinite(3)));
    }
}
