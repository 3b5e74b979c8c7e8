pub const CENSUS_DATA: &str = "census_data";
pub const CENSUS_INFO: &str = "census_info";

pub const OBS_FILE: &str = "obs.json";
pub const VAR_FILE: &str = "var.json";
pub const SUMMARY_FILE: &str = "summary.json";
pub const RELEASE_DIRECTORY_FILE: &str = "release.json";

pub const COLUMN_CELL_TYPE: &str = "cell_type";
pub const COLUMN_IS_PRIMARY_DATA: &str = "is_primary_data";

pub const ALIAS_STABLE: &str = "stable";
pub const ALIAS_LATEST: &str = "latest";

pub const DEFAULT_RELEASE_DIRECTORY_URL: &str =
    "https://census.cellxgene.cziscience.com/cellxgene-census/v1/release.json";

pub const DATA_TYPES: [&str; 3] = ["obs", "var", "X"];
pub const MEASUREMENT_TYPES: [&str; 1] = ["RNA"];
