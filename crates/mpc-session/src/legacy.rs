//! Reader for the XML properties file older releases stored per mission.
//!
//! The file is a Java properties document:
//!
//! ```xml
//! <properties>
//!   <entry key="minLat">47.1</entry>
//!   <entry key="loadedFlightplan.0">Survey.fml</entry>
//! </properties>
//! ```
//!
//! Recognised keys: `minLat`, `maxLat`, `minLon`, `maxLon`, `minElevation`,
//! `maxElevation`, `srsId`, `srsName`, `srsWkt`, `srsOrigin`, and the indexed
//! `loadedFlightplan.N`, `pictureMatching.N` and `flightLog.N`.

use crate::mission_info::MissionInfo;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct PropertiesXml {
    #[serde(rename = "entry", default)]
    entries: Vec<EntryXml>,
}

#[derive(Debug, Deserialize)]
struct EntryXml {
    #[serde(rename = "@key")]
    key: String,
    #[serde(rename = "$text", default)]
    value: Option<String>,
}

/// Parse the raw key/value pairs of a properties document.
pub fn parse_properties(xml: &str) -> Result<BTreeMap<String, String>, quick_xml::DeError> {
    let parsed: PropertiesXml = quick_xml::de::from_str(xml)?;
    Ok(parsed
        .entries
        .into_iter()
        .map(|entry| (entry.key, entry.value.unwrap_or_default()))
        .collect())
}

/// Build a fresh [`MissionInfo`] for `folder` from a legacy document.
pub fn mission_info_from_properties(
    folder: &Path,
    xml: &str,
) -> Result<MissionInfo, quick_xml::DeError> {
    let props = parse_properties(xml)?;
    let mut info = MissionInfo::new(folder);

    let number = |key: &str| -> Option<f64> {
        props.get(key).and_then(|value| value.trim().parse().ok())
    };

    if let Some(v) = number("minLat") {
        info.min_latitude = v;
    }
    if let Some(v) = number("maxLat") {
        info.max_latitude = v;
    }
    if let Some(v) = number("minLon") {
        info.min_longitude = v;
    }
    if let Some(v) = number("maxLon") {
        info.max_longitude = v;
    }
    info.min_elevation = number("minElevation");
    info.max_elevation = number("maxElevation");

    if let Some(v) = props.get("srsId") {
        info.srs_id = v.clone();
    }
    if let Some(v) = props.get("srsName") {
        info.srs_name = v.clone();
    }
    if let Some(v) = props.get("srsWkt") {
        info.srs_wkt = v.clone();
    }
    if let Some(v) = props.get("srsOrigin") {
        info.srs_origin = v.clone();
    }

    info.loaded_flight_plans = indexed(&props, "loadedFlightplan");
    info.loaded_data_sets = indexed(&props, "pictureMatching");
    info.flight_logs = indexed(&props, "flightLog");

    debug!(
        folder = %folder.display(),
        keys = props.len(),
        "Read legacy mission settings"
    );
    Ok(info)
}

/// Values of `prefix.0`, `prefix.1`, ... up to the first gap.
fn indexed(props: &BTreeMap<String, String>, prefix: &str) -> Vec<String> {
    (0..)
        .map_while(|i| props.get(&format!("{prefix}.{i}")))
        .filter(|value| !value.is_empty())
        .cloned()
        .collect()
}
