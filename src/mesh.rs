//! Geometry (`.mesh`) files
//!
//! Meshes have no magic number; they are recognized by a leading version of
//! `1`. Every buffer is prefixed by its element count, so the header parse
//! walks the whole file, recording where each buffer lives and skipping it.
//! Samples are decoded later by seeking back into those ranges.
//!
//! ## Format Details
//!
//! | Buffer    | Element width       |
//! |-----------|---------------------|
//! | triangles | 2 (`u16` index)     |
//! | vertices  | 6 (3 × `i16`)       |
//! | uvs       | 4 (2 × half float)  |
//! | unknown   | 4                   |
//! | colors    | 4                   |
//! | normals   | 2                   |
//! | tangents  | 4                   |
//!
//! The coordinate scale and weights-per-vertex follow the triangle buffer.
//! Vertex components are scaled by `coordinate_scale / 32767`.

use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use crate::common::Range;
use crate::error::{Error, Result};
use crate::io::{BinaryReader, Capture};

/// Element count and location of one mesh buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBuffer {
    pub count: u32,
    pub range: Range,
}

/// Parsed mesh header
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub version: u32,
    /// Index buffer; `count` is the number of indices, not triangles
    pub triangles: MeshBuffer,
    pub coordinate_scale: f32,
    pub weights_per_vertex: u32,
    pub vertices: MeshBuffer,
    pub uvs: MeshBuffer,
    pub unknown: MeshBuffer,
    pub colors: MeshBuffer,
    pub normals: MeshBuffer,
    pub tangents: MeshBuffer,
}

fn buffer<R: Read + Seek>(c: &mut Capture<'_, R>, name: &'static str, width: u64) -> Result<MeshBuffer> {
    let count = c.u32(name)?.get();
    let range = c.set("data", Range::sized(c.pos(), width * count as u64)).get();
    c.skip(range.size())?;
    Ok(MeshBuffer { count, range })
}

/// Parse a mesh header starting at the reader's position
pub fn parse_mesh<R: Read + Seek>(reader: &mut BinaryReader<R>) -> Result<Mesh> {
    let mut c = reader.capture();
    let version = c.u32("version")?.ensure_eq(1)?.get();
    let triangles = buffer(&mut c, "triangle_count", 2)?;
    let coordinate_scale = c.f32("coordinate_scale")?.get();
    let weights_per_vertex = c.u32("weights_per_vertex")?.get();
    let vertices = buffer(&mut c, "vertex_count", 2 * 3)?;
    let uvs = buffer(&mut c, "uv_count", 2 * 2)?;
    let unknown = buffer(&mut c, "unknown_count", 4)?;
    let colors = buffer(&mut c, "color_count", 4)?;
    let normals = buffer(&mut c, "normal_count", 2)?;
    let tangents = buffer(&mut c, "tangents_count", 4)?;

    // Buffers are contiguous, so the last one bounds them all
    if tangents.range.end() > reader.stream_len()? {
        return Err(Error::EndOfStream {
            offset: tangents.range.start(),
            wanted: tangents.range.size(),
        });
    }

    Ok(Mesh {
        version,
        triangles,
        coordinate_scale,
        weights_per_vertex,
        vertices,
        uvs,
        unknown,
        colors,
        normals,
        tangents,
    })
}

/// A mesh file with its header parsed
pub struct MeshFile<R> {
    reader: BinaryReader<R>,
    mesh: Mesh,
}

impl MeshFile<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> MeshFile<R> {
    pub fn new(stream: R) -> Result<Self> {
        let mut reader = BinaryReader::new(stream)?;
        let mesh = parse_mesh(&mut reader)?;
        Ok(Self { reader, mesh })
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Vertex positions, scaled to model units
    pub fn vertices(&mut self) -> Result<Vec<[f32; 3]>> {
        let scale = self.mesh.coordinate_scale;
        self.reader.seek(self.mesh.vertices.range.start())?;

        let mut vertices = Vec::with_capacity(self.mesh.vertices.count as usize);
        for _ in 0..self.mesh.vertices.count {
            let x = self.reader.i16()? as f32 * scale / 32767.0;
            let y = self.reader.i16()? as f32 * scale / 32767.0;
            let z = self.reader.i16()? as f32 * scale / 32767.0;
            vertices.push([x, y, z]);
        }
        Ok(vertices)
    }

    pub fn uvs(&mut self) -> Result<Vec<[f32; 2]>> {
        self.reader.seek(self.mesh.uvs.range.start())?;

        let mut uvs = Vec::with_capacity(self.mesh.uvs.count as usize);
        for _ in 0..self.mesh.uvs.count {
            let u = self.reader.half()?;
            let v = self.reader.half()?;
            uvs.push([u, v]);
        }
        Ok(uvs)
    }

    /// Triangles as 0-based vertex indices. A trailing partial triangle is
    /// ignored.
    pub fn triangles(&mut self) -> Result<Vec<[u16; 3]>> {
        self.reader.seek(self.mesh.triangles.range.start())?;

        let count = self.mesh.triangles.count / 3;
        let mut triangles = Vec::with_capacity(count as usize);
        for _ in 0..count {
            triangles.push([self.reader.u16()?, self.reader.u16()?, self.reader.u16()?]);
        }
        Ok(triangles)
    }

    /// Export positions, texture coordinates and faces as Wavefront OBJ
    ///
    /// # Example
    /// ```no_run
    /// use starhopper::MeshFile;
    /// let mut mesh = MeshFile::open("rock01.mesh")?;
    /// let mut out = std::fs::File::create("rock01.obj")?;
    /// mesh.write_obj(&mut out)?;
    /// # Ok::<(), starhopper::Error>(())
    /// ```
    pub fn write_obj<W: Write>(&mut self, out: &mut W) -> Result<()> {
        writeln!(out, "# Exported using StarHopper :)")?;
        writeln!(out)?;

        for [x, y, z] in self.vertices()? {
            writeln!(out, "v {:.4} {:.4} {:.4}", x, y, z)?;
        }
        for [u, v] in self.uvs()? {
            writeln!(out, "vt {} {}", u, v)?;
        }
        // OBJ indices are 1-based
        for [a, b, c] in self.triangles()? {
            writeln!(out, "f {} {} {}", a as u32 + 1, b as u32 + 1, c as u32 + 1)?;
        }
        Ok(())
    }
}
