//! OCI image handling for the registry backends.
//!
//! Images pulled over the distribution protocol are kept as OCI image
//! layouts; images exported by a container engine arrive as `save` archives.
//! Both end up as an ordered list of layer tarballs applied onto a directory.
//!
//! ```text
//! image/
//! ├── oci-layout           (OCI layout marker)
//! ├── index.json           (Image index)
//! └── blobs/
//!     └── sha256/
//!         ├── <manifest>   (Image manifest)
//!         ├── <config>     (Image configuration, holds the labels)
//!         └── <layers>     (Filesystem layers)
//! ```

mod archive;
mod image;
mod layers;
pub mod registry;

pub use archive::unpack_image_archive;
pub use image::OciImage;
pub use layers::{extract_layer, extract_layers};
pub use registry::{parse_reference, RegistryAuth, RegistryPuller, TlsOptions};
