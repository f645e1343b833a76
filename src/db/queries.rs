use super::{Database, Result, AUDIO_DEVICE_KEY, CALIBRATION_KEY, CAMERA_DEVICE_KEY};
use crate::calibration::Calibration;
use rusqlite::{params, OptionalExtension};

impl Database {
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_value(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Stored calibration. A record that no longer parses counts as uncalibrated.
    pub fn load_calibration(&self) -> Result<Option<Calibration>> {
        let Some(json) = self.get_value(CALIBRATION_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Calibration>(&json) {
            Ok(calibration) => Ok(Some(calibration)),
            Err(e) => {
                log::warn!("Ignoring unparsable stored calibration: {}", e);
                Ok(None)
            }
        }
    }

    pub fn save_calibration(&self, calibration: &Calibration) -> Result<()> {
        let json = serde_json::to_string(calibration)?;
        self.set_value(CALIBRATION_KEY, &json)?;
        log::debug!("Calibration saved");
        Ok(())
    }

    pub fn clear_calibration(&self) -> Result<()> {
        self.delete_value(CALIBRATION_KEY)
    }

    pub fn audio_device(&self) -> Result<Option<String>> {
        self.get_value(AUDIO_DEVICE_KEY)
    }

    /// Remember the selected microphone. `None` leaves the stored id alone.
    pub fn set_audio_device(&self, device_id: Option<&str>) -> Result<()> {
        match device_id {
            Some(id) => self.set_value(AUDIO_DEVICE_KEY, id),
            None => Ok(()),
        }
    }

    pub fn camera_device(&self) -> Result<Option<String>> {
        self.get_value(CAMERA_DEVICE_KEY)
    }

    /// Remember the selected camera. `None` leaves the stored id alone.
    pub fn set_camera_device(&self, device_id: Option<&str>) -> Result<()> {
        match device_id {
            Some(id) => self.set_value(CAMERA_DEVICE_KEY, id),
            None => Ok(()),
        }
    }
}
