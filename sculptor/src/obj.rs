use std::io::{self, BufRead, BufReader, Read};

use log::warn;

use crate::mesh::{Mesh, Point3};
use crate::region::Region;
use base::defs::{Error, ErrorKind::*, IntoResult, Result};

const MAX_NUM_FACE_VERTICES: usize = 10;

struct ReadState {
    line: usize,
    mesh: Mesh,
    region: Region,
}

/// Reads a Wavefront OBJ mesh whose faces are tagged by `usemtl`
/// statements naming head regions.
pub fn read_obj<R: Read>(reader: R) -> Result<Mesh> {
    let mut state = ReadState {
        line: 0,
        mesh: Mesh::default(),
        region: Region::Default,
    };

    for line_res in BufReader::new(reader).lines() {
        let line = line_res.res(|| "failed to read OBJ-file".to_string())?;
        state.line += 1;

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.first() {
            Some(&"v") => read_v(&mut state, &parts)?,
            Some(&"f") => read_f(&mut state, &parts)?,
            Some(&"usemtl") => read_usemtl(&mut state, &parts)?,
            _ => (),
        }
    }

    Ok(state.mesh)
}

fn read_v(state: &mut ReadState, parts: &[&str]) -> Result<()> {
    if parts.len() < 4 || parts.len() > 5 {
        let desc = format!("malformed v-statement at line {}", state.line);
        return Err(Error::new(MalformedData, desc));
    }

    let x = parse_coord("x-coordinate of v-statement", state.line, parts[1])?;
    let y = parse_coord("y-coordinate of v-statement", state.line, parts[2])?;
    let z = parse_coord("z-coordinate of v-statement", state.line, parts[3])?;
    state.mesh.vertices.push(Point3::new(x, y, z));

    Ok(())
}

fn read_f(state: &mut ReadState, parts: &[&str]) -> Result<()> {
    let num_vertices_err = |kind, prop| {
        let msg = "number of vertices in f-statement at line";
        Err(Error::new(kind, format!("{} {} {}", prop, msg, state.line)))
    };
    if parts.len() < 4 {
        return num_vertices_err(MalformedData, "bad");
    } else if parts.len() > MAX_NUM_FACE_VERTICES + 1 {
        return num_vertices_err(UnsupportedFeature, "unsupported");
    }

    let mut face = Vec::with_capacity(parts.len() - 1);
    for (i, part) in parts[1..].iter().enumerate() {
        let index = part
            .split('/')
            .next()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&v| v != 0)
            .ok_or_else(|| {
                let desc = format!(
                    "malformed vertex {} in f-statement at line {}",
                    i + 1,
                    state.line
                );
                Error::new(MalformedData, desc)
            })?;

        if index > state.mesh.vertices.len() {
            let desc = format!(
                "reference to unknown vertex {} in f-statement at line {}",
                index, state.line
            );
            return Err(Error::new(InconsistentState, desc));
        }
        face.push(index - 1);
    }

    state.mesh.faces.push(face);
    state.mesh.face_regions.push(state.region);
    Ok(())
}

fn read_usemtl(state: &mut ReadState, parts: &[&str]) -> Result<()> {
    if parts.len() != 2 {
        let desc = format!("malformed usemtl-statement at line {}", state.line);
        return Err(Error::new(MalformedData, desc));
    }

    state.region = Region::from_tag(parts[1]).unwrap_or_else(|| {
        warn!(
            "unknown region '{}' at line {}, using {}",
            parts[1],
            state.line,
            Region::Default
        );
        Region::Default
    });
    Ok(())
}

fn parse_coord(what: &str, line: usize, str: &str) -> Result<f64> {
    str.parse::<f64>().map_err(|_| {
        let desc = format!("failed to parse {} at line {}", what, line);
        Error::new(MalformedData, desc)
    })
}

/// Writes the mesh as OBJ, opening a `usemtl` group whenever the face
/// region changes.
pub fn write_obj(mesh: &Mesh, writer: &mut dyn io::Write) -> Result<()> {
    let write_err = || "failed to write OBJ-file".to_string();

    for v in &mesh.vertices {
        writeln!(writer, "v {} {} {}", v.x, v.y, v.z).into_result(write_err)?;
    }

    let mut region = None;
    for (face, &face_region) in mesh.faces.iter().zip(&mesh.face_regions) {
        if region != Some(face_region) {
            writeln!(writer, "usemtl {}", face_region).into_result(write_err)?;
            region = Some(face_region);
        }

        let indices: Vec<String> =
            face.iter().map(|v| (v + 1).to_string()).collect();
        writeln!(writer, "f {}", indices.join(" ")).into_result(write_err)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::test_util::*;

    const TAGGED: &str = "\
# head
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
v 2 0 0
v 2 1 0
f 1 2 3 4
usemtl Eye
f 2/1/1 5/2/2 6/3/3 3/4/4
";

    #[test]
    fn test_read_obj() {
        let mesh = read_obj(TAGGED.as_bytes()).unwrap();
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.faces, vec![vec![0, 1, 2, 3], vec![1, 4, 5, 2]]);
        assert_eq!(mesh.face_regions, vec![Region::Default, Region::Eye]);
    }

    #[test]
    fn test_read_obj_errors() {
        let cases = [
            ("v 0 0\n", MalformedData),
            ("v 0 zero 0\n", MalformedData),
            ("v 0 0 0\nv 1 0 0\nf 1 2\n", MalformedData),
            ("v 0 0 0\nf 1 x 1\n", MalformedData),
            ("v 0 0 0\nf 1 2 3\n", InconsistentState),
            ("usemtl\n", MalformedData),
        ];
        for (obj, kind) in cases {
            assert_eq!(read_obj(obj.as_bytes()).unwrap_err().kind, kind);
        }
    }

    #[test]
    fn test_unknown_region_is_default() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nusemtl Scalp\nf 1 2 3\n";
        let mesh = read_obj(obj.as_bytes()).unwrap();
        assert_eq!(mesh.face_regions, vec![Region::Default]);
    }

    #[test]
    fn test_write_obj() {
        let left = grid(0.0, 0.0, 0.0, 1, 1);
        let right = tagged(grid(1.0, 0.0, 0.0, 2, 1), Region::NoseBridge);
        let mesh = Mesh::combine([&left, &right]);

        let mut data = Vec::new();
        write_obj(&mesh, &mut data).unwrap();
        let text = String::from_utf8(data).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "v 0 0 0");
        assert_eq!(lines[10], "usemtl Default");
        assert_eq!(lines[11], "f 1 2 4 3");
        assert_eq!(lines[12], "usemtl NoseBridge");
        assert_eq!(text.matches("usemtl").count(), 2);

        let read = read_obj(text.as_bytes()).unwrap();
        assert_eq!(read.faces, mesh.faces);
        assert_eq!(read.face_regions, mesh.face_regions);
    }
}
