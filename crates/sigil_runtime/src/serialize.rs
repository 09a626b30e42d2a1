//! Compiled images using `MessagePack`.
//!
//! An image is a compiled unit plus the serializable part of its module,
//! behind a short magic header. Built-ins are stored by name and relinked
//! against the configured extensions on load.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sigil_foundation::{Error, ErrorKind, Result};
use sigil_language::module::ModuleImage;
use sigil_language::{CompiledFunction, Extension, Module};
use tracing::debug;

/// Leading bytes of every image.
pub const MAGIC: &[u8; 4] = b"SGL\x01";

/// On-disk form of a compiled program.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Image {
    module: ModuleImage,
    unit: CompiledFunction,
}

fn serialization_error(err: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::SerializationError(err.to_string()))
}

/// Returns true if `bytes` start with the image magic.
#[must_use]
pub fn is_image(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Encodes a module and its top-level unit.
///
/// Uses named serialization to preserve struct field names.
///
/// # Errors
///
/// Returns an error if the constant pool holds a value that cannot be
/// encoded.
pub fn to_bytes(module: &Module, unit: &CompiledFunction) -> Result<Vec<u8>> {
    let image = Image {
        module: module.to_image(),
        unit: unit.clone(),
    };
    let mut bytes = MAGIC.to_vec();
    rmp_serde::encode::write_named(&mut bytes, &image).map_err(serialization_error)?;
    Ok(bytes)
}

/// Decodes an image, relinking built-ins against `extensions`.
///
/// # Errors
///
/// Returns an error if the magic is missing, the payload is malformed, or
/// a built-in the image refers to is not provided by `extensions`.
pub fn from_bytes<'a>(
    bytes: &[u8],
    extensions: impl IntoIterator<Item = &'a Extension>,
) -> Result<(Module, CompiledFunction)> {
    let payload = bytes
        .strip_prefix(MAGIC.as_slice())
        .ok_or_else(|| serialization_error("not a compiled image"))?;
    let image: Image = rmp_serde::from_slice(payload).map_err(serialization_error)?;
    let module = Module::from_image(image.module, extensions)?;
    Ok((module, image.unit))
}

/// Writes an image to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns an error if encoding fails or the file cannot be written.
pub fn save_image<P: AsRef<Path>>(
    path: P,
    module: &Module,
    unit: &CompiledFunction,
) -> Result<()> {
    let bytes = to_bytes(module, unit)?;
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    debug!(path = %path.as_ref().display(), size = bytes.len(), "image saved");
    Ok(())
}

/// Reads an image from `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or decoded.
pub fn load_image<'a, P: AsRef<Path>>(
    path: P,
    extensions: impl IntoIterator<Item = &'a Extension>,
) -> Result<(Module, CompiledFunction)> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    debug!(path = %path.as_ref().display(), size = bytes.len(), "image loaded");
    from_bytes(&bytes, extensions)
}
