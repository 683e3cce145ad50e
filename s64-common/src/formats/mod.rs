//! Sausage64 text format (.S64)
//!
//! Human-readable, whitespace-delimited, line-oriented. Mesh blocks come
//! first, animation blocks after them; `//` and `/* */` comments may appear
//! anywhere.
//!
//! # Layout
//! ```text
//! BEGIN MESH <name>
//! ROOT <x> <y> <z>
//! PROPERTIES <p1> <p2> ...            (optional)
//! BEGIN VERTICES
//! <px> <py> <pz> <nx> <ny> <nz> <r> <g> <b> <u> <v>
//! END VERTICES
//! BEGIN FACES
//! <count> <i0> .. <i(count-1)> <material>
//! END FACES
//! END MESH <name>
//!
//! BEGIN ANIMATION <name>
//! BEGIN KEYFRAME <frame>
//! <bone> <px> <py> <pz> [<qw>] <qx> <qy> <qz> <sx> <sy> <sz>
//! END KEYFRAME <frame>
//! END ANIMATION <name>
//! ```
//!
//! Floats are written with 4 fractional digits. Round-tripping quantizes
//! every float field to 1e-4.

pub mod reader;
pub mod writer;

pub use reader::{LexState, ParseError, parse_s64, read_s64_file};
pub use writer::{WriteError, write_s64, write_s64_file};

/// File extension (without the dot)
pub const S64_EXT: &str = "S64";

/// Absolute error introduced by the 4-digit float quantization
pub const FLOAT_PRECISION: f32 = 0.5e-4;
