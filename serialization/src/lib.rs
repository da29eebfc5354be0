//! # RedLilium Serialization
//!
//! Persistent-object archives for RedLilium assets.
//!
//! Objects implement [`Serializable`] and describe their fields once, through
//! the symmetric [`Archive`] interface. Two archive pairs are provided:
//!
//! - [`TextOutputArchive`] / [`TextInputArchive`]: a JSON-shaped [`Node`]
//!   tree, see [`text`]
//! - [`BinaryOutputArchive`] / [`BinaryInputArchive`]: a compact
//!   little-endian byte layout, see [`binary`]
//!
//! Both preserve object identity: an object reachable along several paths,
//! or along a cycle, is stored once and comes back as one shared
//! [`ObjectHandle`]. Objects offering an inline form are embedded in their
//! parent instead. Fields pointing at other assets are not loaded but
//! recorded in [`Details`] for the host to resolve.
//!
//! # Example
//!
//! ```
//! use redlilium_serialization::{
//!     Archive, ArchiveError, AssetFormat, Constructor, Details, DeserializeOptions,
//!     ObjectHandle, OutputOptions, Pool, Serializable, deserialize_asset, serialize_asset,
//!     share,
//! };
//!
//! #[derive(Default)]
//! struct Point {
//!     x: f64,
//!     y: f64,
//! }
//!
//! impl Serializable for Point {
//!     fn class_id(&self) -> &str {
//!         "Point"
//!     }
//!
//!     fn serialize(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
//!         ar.float64(&mut self.x, "x")?;
//!         ar.float64(&mut self.y, "y")
//!     }
//! }
//!
//! fn find_class(id: &str, _: Option<&ObjectHandle>, _: &str) -> Option<Constructor> {
//!     (id == "Point").then_some((|| share(Point::default())) as Constructor)
//! }
//!
//! let root = share(Point { x: 1.0, y: 2.0 });
//! let asset = serialize_asset(&root, AssetFormat::Binary, OutputOptions::default())?;
//!
//! let pool = Pool::<Details>::new();
//! let mut options = DeserializeOptions::new(&find_class);
//! let loaded = deserialize_asset(asset, &pool, &mut options)?;
//!
//! let root = loaded.root.expect("Point is registered");
//! let guard = root.lock();
//! let point = guard.downcast_ref::<Point>().expect("a Point");
//! assert_eq!((point.x, point.y), (1.0, 2.0));
//! # Ok::<(), ArchiveError>(())
//! ```

pub mod archive;
pub mod asset;
pub mod binary;
pub mod buffer;
pub mod details;
pub mod error;
pub mod format;
pub mod node;
pub mod pool;
pub mod resolver;
pub mod serializable;
pub mod string_table;
pub mod tag;
pub mod text;
pub mod variant;

pub use archive::{Archive, OutputOptions};
pub use asset::{
    AssetFormat, DeserializedAsset, SerializedAsset, deserialize_asset, serialize_asset,
};
pub use binary::{BinaryInputArchive, BinaryOutputArchive};
pub use buffer::SerializeData;
pub use details::{DependRecord, Details};
pub use error::ArchiveError;
pub use format::TextFormat;
pub use node::Node;
pub use pool::{Pool, PoolGuard, Poolable};
pub use resolver::{ClassFinder, Constructor, DeserializeOptions};
pub use serializable::{Capabilities, ObjectHandle, Serializable, needs_inline, share};
pub use tag::{ObjectKindFlag, SerializeTag};
pub use text::{TextInputArchive, TextOutputArchive};
pub use variant::{PlainMap, Variant};
