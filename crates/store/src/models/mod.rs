mod asset;
mod project;

pub use self::asset::{Asset, AssetType};
pub(crate) use self::asset::AssetRow;
pub use self::project::Project;
pub(crate) use self::project::ProjectRow;
