//! Volume file import.
//!
//! Two formats are understood:
//! - `.fld`: an AVS field file, a `key=value` text preamble followed by two form-feed bytes
//!   and raw 8- or 16-bit samples
//! - `.dat`: three little-endian `u16` dimensions followed by 16-bit little-endian samples

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::time::Instant;

use glam::UVec3;
use volvis_core::{Result, VolvisError};

use crate::volume::{voxel_count, DenseVolume};

const FORM_FEED: u8 = 0x0C;

/// Supported volume file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    Fld,
    Dat,
}

impl VolumeFormat {
    /// Picks the format from a file extension, ignoring case.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "fld" => Ok(Self::Fld),
            "dat" => Ok(Self::Dat),
            _ => Err(VolvisError::UnsupportedFormat(format!(
                "unsupported volume file extension '.{extension}'"
            ))),
        }
    }
}

/// Parsed file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeHeader {
    pub dims: UVec3,
    /// Bytes per sample, 1 or 2.
    pub element_size: usize,
}

/// Loads a volume file, dispatching on its extension.
pub fn load_volume(path: impl AsRef<Path>) -> Result<DenseVolume> {
    let path = path.as_ref();
    let format = VolumeFormat::from_path(path)?;
    let start = Instant::now();

    let mut reader = BufReader::new(File::open(path)?);
    let volume = read_volume(&mut reader, format)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let dims = volume.dims();
    log::info!(
        "loaded '{}' ({}x{}x{}, range {}..{}) in {:.2?}",
        name,
        dims.x,
        dims.y,
        dims.z,
        volume.minimum(),
        volume.maximum(),
        start.elapsed()
    );
    Ok(volume.with_name(name))
}

/// Reads a volume of the given format from a reader positioned at the start of the file.
pub fn read_volume<R: BufRead>(reader: &mut R, format: VolumeFormat) -> Result<DenseVolume> {
    let header = match format {
        VolumeFormat::Fld => {
            let header = read_fld_header(reader)?;
            let mut separator = [0u8; 2];
            reader
                .read_exact(&mut separator)
                .map_err(|_| malformed("missing data section"))?;
            if separator != [FORM_FEED, FORM_FEED] {
                return Err(malformed("data section must follow two form-feed bytes"));
            }
            header
        }
        VolumeFormat::Dat => read_dat_header(reader)?,
    };
    let data = read_samples(reader, &header)?;
    DenseVolume::new(data, header.dims)
}

/// Parses an AVS `.fld` preamble up to (not including) the first form-feed byte.
pub fn read_fld_header<R: BufRead>(reader: &mut R) -> Result<VolumeHeader> {
    let mut dims = [None::<u32>; 3];
    let mut element_size = None;
    let mut raw = Vec::new();

    loop {
        let next = reader.fill_buf()?;
        if next.is_empty() {
            return Err(malformed("header is not terminated by a form-feed byte"));
        }
        if next[0] == FORM_FEED {
            break;
        }

        raw.clear();
        reader.read_until(b'\n', &mut raw)?;
        let text = String::from_utf8_lossy(&raw);
        let content = text.split('#').next().unwrap_or_default();
        let line: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        if line.is_empty() {
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| malformed(format!("expected key=value, got '{line}'")))?;
        match key {
            "ndim" => {
                if parse_number(key, value)? != 3 {
                    return Err(malformed("only 3D fields are supported"));
                }
            }
            "dim1" => dims[0] = Some(parse_number(key, value)?),
            "dim2" => dims[1] = Some(parse_number(key, value)?),
            "dim3" => dims[2] = Some(parse_number(key, value)?),
            "nspace" => {}
            "veclen" => {
                if parse_number(key, value)? != 1 {
                    return Err(malformed("only scalar fields are supported"));
                }
            }
            "data" => {
                element_size = Some(match value {
                    "byte" => 1,
                    "short" => 2,
                    other => return Err(malformed(format!("data type '{other}' not recognized"))),
                });
            }
            "field" => {
                if value != "uniform" {
                    return Err(malformed("only uniform fields are supported"));
                }
            }
            _ => log::warn!("ignoring unknown AVS keyword '{key}'"),
        }
    }

    match (dims, element_size) {
        ([Some(x), Some(y), Some(z)], Some(element_size)) => Ok(VolumeHeader {
            dims: UVec3::new(x, y, z),
            element_size,
        }),
        (_, None) => Err(malformed("missing 'data' entry")),
        _ => Err(malformed("missing one of 'dim1', 'dim2', 'dim3'")),
    }
}

/// Reads the three little-endian `u16` dimensions of a `.dat` file.
pub fn read_dat_header<R: Read>(reader: &mut R) -> Result<VolumeHeader> {
    let mut bytes = [0u8; 6];
    reader
        .read_exact(&mut bytes)
        .map_err(|_| malformed("file too short for a .dat header"))?;
    let dim = |i: usize| u32::from(u16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]));
    Ok(VolumeHeader {
        dims: UVec3::new(dim(0), dim(1), dim(2)),
        element_size: 2,
    })
}

/// Reads `dims` samples of `element_size` bytes each and widens them to `f32`.
pub fn read_samples<R: Read>(reader: &mut R, header: &VolumeHeader) -> Result<Vec<f32>> {
    let count = voxel_count(header.dims)?;
    let byte_count = count
        .checked_mul(header.element_size)
        .ok_or_else(|| malformed("volume too large"))?;
    let mut buffer = vec![0u8; byte_count];
    reader.read_exact(&mut buffer).map_err(|_| {
        malformed(format!(
            "expected {byte_count} bytes of sample data for {}x{}x{}",
            header.dims.x, header.dims.y, header.dims.z
        ))
    })?;

    let samples = match header.element_size {
        1 => buffer.iter().map(|&b| f32::from(b)).collect(),
        2 => buffer
            .chunks_exact(2)
            .map(|pair| f32::from(u16::from_le_bytes([pair[0], pair[1]])))
            .collect(),
        other => return Err(malformed(format!("unsupported sample size {other}"))),
    };
    Ok(samples)
}

fn parse_number(key: &str, value: &str) -> Result<u32> {
    value
        .parse()
        .map_err(|_| malformed(format!("'{key}' expects an integer, got '{value}'")))
}

fn malformed(message: impl Into<String>) -> VolvisError {
    VolvisError::MalformedHeader(message.into())
}
