// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use gs_elements::sync_error::SyncError;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KeyStatus {
    pub exists: bool,
    pub size: u64,
}

// The ground station's link encryption key file.
pub struct KeyStore {
    key_path: PathBuf,
}

impl KeyStore {
    pub fn new(key_path: impl AsRef<Path>) -> Self {
        KeyStore{key_path: key_path.as_ref().to_path_buf()}
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut backup = self.key_path.clone().into_os_string();
        backup.push(".backup");
        PathBuf::from(backup)
    }

    pub fn status(&self) -> KeyStatus {
        match fs::metadata(&self.key_path) {
            Ok(m) => KeyStatus{exists: true, size: m.len()},
            Err(_) => KeyStatus{exists: false, size: 0},
        }
    }

    // Installs `contents` as the new key, first copying any existing key to
    // the backup path.
    pub fn replace(&self, contents: &[u8]) -> Result<(), SyncError> {
        if contents.is_empty() {
            return Err(SyncError::InvalidArgument("No file provided".to_string()));
        }
        if self.key_path.exists() {
            let backup = self.backup_path();
            fs::copy(&self.key_path, &backup).map_err(|e| SyncError::io(&backup, e))?;
            info!("Backed up {:?} to {:?}", self.key_path, backup);
        }
        fs::write(&self.key_path, contents)
            .map_err(|e| SyncError::io(&self.key_path, e))?;
        fs::set_permissions(&self.key_path, fs::Permissions::from_mode(0o644))
            .map_err(|e| SyncError::io(&self.key_path, e))?;
        info!("Installed new key {:?} ({} bytes)", self.key_path, contents.len());
        Ok(())
    }
}
