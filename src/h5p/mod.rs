//! H5P package handling and on-disk storage for contents, libraries and temporary files.

mod error;
pub use error::{H5pError, H5pResult};

mod storage;
pub use storage::H5pStorage;

pub mod installer;
pub use installer::{InstallReport, export_content, install_package};

pub mod package;
pub use package::{H5pPackage, PackageInfo, PackageValidation};
