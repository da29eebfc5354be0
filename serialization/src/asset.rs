//! One-call entry points for hosts loading and saving assets.

use crate::archive::OutputOptions;
use crate::binary::{BinaryInputArchive, BinaryOutputArchive};
use crate::details::{DependRecord, Details};
use crate::error::ArchiveError;
use crate::node::Node;
use crate::pool::Pool;
use crate::resolver::DeserializeOptions;
use crate::serializable::ObjectHandle;
use crate::text::{TextInputArchive, TextOutputArchive};

/// Which archive format to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssetFormat {
    #[default]
    Binary,
    Text,
}

/// Serialized form of an asset.
#[derive(Debug, Clone, PartialEq)]
pub enum SerializedAsset {
    Binary(Vec<u8>),
    Text(Node),
}

/// Result of [`deserialize_asset`].
pub struct DeserializedAsset {
    /// `None` when the root class could not be resolved.
    pub root: Option<ObjectHandle>,
    /// External references the host still has to load and assign.
    pub depends: Vec<DependRecord>,
}

/// Serialize the graph reachable from `root`.
pub fn serialize_asset(
    root: &ObjectHandle,
    format: AssetFormat,
    options: OutputOptions,
) -> Result<SerializedAsset, ArchiveError> {
    match format {
        AssetFormat::Binary => {
            let mut ar = BinaryOutputArchive::new(options);
            ar.start(root)?;
            ar.dump().map(SerializedAsset::Binary)
        }
        AssetFormat::Text => {
            let mut ar = TextOutputArchive::new(options);
            ar.start(root)?;
            Ok(SerializedAsset::Text(ar.dump()))
        }
    }
}

/// Deserialize an asset, collecting its external references.
///
/// The dependency collector is checked out of `pool` for the duration of
/// the call and returned to it on every path.
pub fn deserialize_asset(
    asset: SerializedAsset,
    pool: &Pool<Details>,
    options: &mut DeserializeOptions<'_>,
) -> Result<DeserializedAsset, ArchiveError> {
    let mut details = pool.checkout();
    let result = match asset {
        SerializedAsset::Binary(bytes) => {
            BinaryInputArchive::new(bytes, &mut details, options).start()
        }
        SerializedAsset::Text(document) => {
            TextInputArchive::new(document, &mut details, options).start()
        }
    };

    match result {
        Ok(root) => Ok(DeserializedAsset {
            root,
            depends: details.take_records(),
        }),
        Err(err) => {
            log::error!("failed to deserialize asset: {err}");
            Err(err)
        }
    }
}
