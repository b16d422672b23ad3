pub const FLOOD_DATA: &str = "/api/flood-data";

pub const FLOOD_DATA_BY_LOCATION: &str = "/api/flood-data/location";

pub const HEALTH: &str = "/api/health";
