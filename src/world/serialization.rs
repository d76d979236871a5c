use crate::tiles::{ChunkData, ChunkPos, Tile};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

/// Magic number for chunk files
const MAGIC_NUMBER: [u8; 4] = [b'S', b'L', b'O', b'P'];

/// Current chunk file format version
const VERSION: u16 = 1;

/// Refuse payloads larger than this rather than allocating for a corrupt
/// length field
const MAX_PAYLOAD_LEN: u32 = 64 * 1024 * 1024;

/// Error type for tile map persistence
#[derive(Debug)]
pub enum TileMapError {
    Io(io::Error),
    InvalidMagicNumber,
    InvalidVersion(u16),
    InvalidChunkSize(u32),
    PayloadTooLarge(u32),
    InvalidChecksum,
    Decode(bincode::Error),
    MisplacedTile { chunk: ChunkPos, tile: ChunkPos },
    /// The header names a different chunk than the file name
    ChunkPositionMismatch { expected: ChunkPos, found: ChunkPos },
}

impl From<io::Error> for TileMapError {
    fn from(err: io::Error) -> Self {
        TileMapError::Io(err)
    }
}

impl From<bincode::Error> for TileMapError {
    fn from(err: bincode::Error) -> Self {
        TileMapError::Decode(err)
    }
}

impl std::fmt::Display for TileMapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TileMapError::Io(e) => write!(f, "IO error: {}", e),
            TileMapError::InvalidMagicNumber => write!(f, "Invalid magic number"),
            TileMapError::InvalidVersion(v) => write!(f, "Invalid version: {}", v),
            TileMapError::InvalidChunkSize(s) => write!(f, "Invalid chunk size: {}", s),
            TileMapError::PayloadTooLarge(len) => write!(f, "Payload too large: {} bytes", len),
            TileMapError::InvalidChecksum => write!(f, "Checksum mismatch"),
            TileMapError::Decode(e) => write!(f, "Decode error: {}", e),
            TileMapError::MisplacedTile { chunk, tile } => {
                write!(f, "Tile of chunk {:?} stored in chunk {:?}", tile, chunk)
            }
            TileMapError::ChunkPositionMismatch { expected, found } => {
                write!(f, "Expected chunk {:?}, file holds chunk {:?}", expected, found)
            }
        }
    }
}

impl std::error::Error for TileMapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TileMapError::Io(e) => Some(e),
            TileMapError::Decode(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Save a chunk's owned tiles to disk in binary format
pub fn save_chunk<P: AsRef<Path>>(chunk: &ChunkData, path: P) -> Result<(), TileMapError> {
    // Ensure directory exists
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }

    let payload = bincode::serialize(&chunk.tiles)?;
    let payload_len =
        u32::try_from(payload.len()).map_err(|_| TileMapError::PayloadTooLarge(u32::MAX))?;

    let mut bytes = Vec::with_capacity(payload.len() + 26);
    // Header
    bytes.extend_from_slice(&MAGIC_NUMBER);
    bytes.extend_from_slice(&VERSION.to_le_bytes());
    // Chunk position and size
    bytes.extend_from_slice(&chunk.position.x.to_le_bytes());
    bytes.extend_from_slice(&chunk.position.y.to_le_bytes());
    bytes.extend_from_slice(&chunk.size.to_le_bytes());
    // Tiles
    bytes.extend_from_slice(&payload_len.to_le_bytes());
    bytes.extend_from_slice(&payload);
    // Checksum (CRC32)
    bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());

    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    Ok(())
}

fn read_array<const N: usize>(reader: &mut impl Read) -> Result<[u8; N], TileMapError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Load a chunk from disk
pub fn load_chunk<P: AsRef<Path>>(path: P) -> Result<ChunkData, TileMapError> {
    let mut reader = BufReader::new(File::open(path)?);

    // Read and verify magic number
    if read_array::<4>(&mut reader)? != MAGIC_NUMBER {
        return Err(TileMapError::InvalidMagicNumber);
    }

    // Read and verify version
    let version = u16::from_le_bytes(read_array(&mut reader)?);
    if version != VERSION {
        return Err(TileMapError::InvalidVersion(version));
    }

    // Read chunk position and size
    let x = i32::from_le_bytes(read_array(&mut reader)?);
    let y = i32::from_le_bytes(read_array(&mut reader)?);
    let position = ChunkPos::new(x, y);
    let size = u32::from_le_bytes(read_array(&mut reader)?);
    if size == 0 || size > i32::MAX as u32 {
        return Err(TileMapError::InvalidChunkSize(size));
    }

    // Read tile payload
    let payload_len = u32::from_le_bytes(read_array(&mut reader)?);
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(TileMapError::PayloadTooLarge(payload_len));
    }
    let mut payload = vec![0u8; payload_len as usize];
    reader.read_exact(&mut payload)?;

    // Read and verify checksum
    let expected_checksum = u32::from_le_bytes(read_array(&mut reader)?);
    if crc32fast::hash(&payload) != expected_checksum {
        return Err(TileMapError::InvalidChecksum);
    }

    let tiles: Vec<Tile> = bincode::deserialize(&payload)?;
    for tile in &tiles {
        let owner = ChunkPos::from_tile(tile.pos, size as i32);
        if owner != position {
            return Err(TileMapError::MisplacedTile {
                chunk: position,
                tile: owner,
            });
        }
    }

    Ok(ChunkData {
        position,
        size,
        tiles,
    })
}

/// Check if a chunk file exists
pub fn chunk_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists()
}

/// Delete a chunk file
pub fn delete_chunk<P: AsRef<Path>>(path: P) -> Result<(), io::Error> {
    fs::remove_file(path)
}

/// Parse a chunk position back out of a chunk file name
pub fn parse_chunk_file_name(name: &str) -> Option<ChunkPos> {
    let coords = name.strip_prefix("chunk_")?.strip_suffix(".bin")?;
    // Split at the separator after the first number, which may be negative
    let split = coords
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '_')
        .map(|(i, _)| i)?;
    let x = coords[..split].parse().ok()?;
    let y = coords[split + 1..].parse().ok()?;
    Some(ChunkPos::new(x, y))
}
