use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info};
use swimmer_common::ReplicaHistory;

/// On-disk encoding of the saved histories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFormat {
    Json,
    Bincode,
    MessagePack,
}

impl HistoryFormat {
    /// Parses the configured format name; unknown names fall back to JSON.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.unwrap_or("json") {
            "json" => HistoryFormat::Json,
            "bincode" => HistoryFormat::Bincode,
            "messagepack" => HistoryFormat::MessagePack,
            other => {
                error!("Unknown output format: {}. Using JSON instead.", other);
                HistoryFormat::Json
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            HistoryFormat::Json => "json",
            HistoryFormat::Bincode => "bin",
            HistoryFormat::MessagePack => "msgpack",
        }
    }

    /// Format implied by a file extension, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(HistoryFormat::Json),
            "bin" => Some(HistoryFormat::Bincode),
            "msgpack" => Some(HistoryFormat::MessagePack),
            _ => None,
        }
    }
}

/// Writes `histories` to `<directory>/<base_filename>_history.<ext>`.
pub fn save_histories(
    histories: &[ReplicaHistory],
    directory: &Path,
    base_filename: &str,
    format: HistoryFormat,
) -> Result<PathBuf> {
    let path = directory.join(format!("{}_history.{}", base_filename, format.extension()));
    let file = File::create(&path).with_context(|| format!("Error creating history file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    match format {
        HistoryFormat::Json => serde_json::to_writer(&mut writer, histories)
            .with_context(|| format!("Error serializing histories to JSON '{}'", path.display()))?,
        HistoryFormat::Bincode => bincode::serialize_into(&mut writer, histories)
            .with_context(|| format!("Error serializing histories to bincode '{}'", path.display()))?,
        HistoryFormat::MessagePack => rmp_serde::encode::write(&mut writer, histories)
            .with_context(|| format!("Error serializing histories to MessagePack '{}'", path.display()))?,
    }
    writer.flush()?;
    info!("{} replica histories saved to {} ({:?})", histories.len(), path.display(), format);
    Ok(path)
}

/// Reads histories written by [`save_histories`]; the format follows the extension.
pub fn load_histories(path: &Path) -> Result<Vec<ReplicaHistory>> {
    let format = HistoryFormat::from_path(path)
        .with_context(|| format!("Cannot tell the history format of '{}'", path.display()))?;
    let file = File::open(path).with_context(|| format!("Failed to open history file '{}'", path.display()))?;
    let reader = BufReader::new(file);
    let histories = match format {
        HistoryFormat::Json => serde_json::from_reader(reader)?,
        HistoryFormat::Bincode => bincode::deserialize_from(reader)?,
        HistoryFormat::MessagePack => rmp_serde::from_read(reader)?,
    };
    Ok(histories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use swimmer_common::{AgentInstance, Vec2};

    fn histories() -> Vec<ReplicaHistory> {
        vec![ReplicaHistory {
            replica: 2,
            time_step: 0.01,
            saved_time_step_size: 5,
            agents: vec![vec![
                AgentInstance::at(Vec2::new(1.0, 2.0), 0.5),
                AgentInstance::at(Vec2::new(1.5, 2.0), 0.25),
            ]],
        }]
    }

    #[test]
    fn unknown_format_falls_back_to_json() {
        assert_eq!(HistoryFormat::from_name(None), HistoryFormat::Json);
        assert_eq!(HistoryFormat::from_name(Some("bincode")), HistoryFormat::Bincode);
        assert_eq!(HistoryFormat::from_name(Some("yaml")), HistoryFormat::Json);
    }

    #[test]
    fn every_format_can_be_read_back() {
        let dir = std::env::temp_dir().join(format!("swimmer-output-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for format in [HistoryFormat::Json, HistoryFormat::Bincode, HistoryFormat::MessagePack] {
            let path = save_histories(&histories(), &dir, "test", format).unwrap();
            let loaded = load_histories(&path).unwrap();
            assert_eq!(loaded[0].replica, 2);
            assert_eq!(loaded[0].agents, histories()[0].agents);
        }
        std::fs::remove_dir_all(&dir).ok();
    }
}
