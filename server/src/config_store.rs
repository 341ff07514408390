// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use gs_elements::ini_format::{ConfigMap, IniDocument};
use gs_elements::sync_error::SyncError;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AvailableConfig {
    pub path: String,
    pub name: String,
}

// Reads and writes the local INI config files named in a fixed whitelist. The
// whitelist is the only access control: every request path is normalized and
// must equal a whitelisted path exactly.
//
// Writes are read-modify-write with no locking; concurrent writers race and
// the last one wins.
pub struct ConfigStore {
    whitelist: Vec<PathBuf>,
}

impl ConfigStore {
    pub fn new<P: AsRef<Path>>(whitelist: &[P]) -> Self {
        ConfigStore{
            whitelist: whitelist.iter()
                .map(|p| normalize_path(&p.as_ref().to_string_lossy()))
                .collect(),
        }
    }

    // Returns the normalized form of `path` if it is whitelisted.
    pub fn check_access(&self, path: &str) -> Result<PathBuf, SyncError> {
        let normalized = normalize_path(path);
        if self.whitelist.contains(&normalized) {
            Ok(normalized)
        } else {
            warn!("Access denied. Path {:?} not in whitelist", path);
            Err(SyncError::AccessDenied{path: path.to_string()})
        }
    }

    // Whitelisted files that currently exist.
    pub fn available(&self) -> Vec<AvailableConfig> {
        self.whitelist.iter()
            .filter(|p| p.exists())
            .map(|p| AvailableConfig{
                path: p.display().to_string(),
                name: p.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })
            .collect()
    }

    // An unreadable or unparseable file yields an empty mapping.
    pub fn read(&self, path: &str) -> Result<ConfigMap, SyncError> {
        let path = self.check_access(path)?;
        match load_document(&path) {
            Ok(doc) => Ok(doc.to_map()),
            Err(e) => {
                warn!("Could not read config {:?}: {}", path, e);
                Ok(ConfigMap::new())
            }
        }
    }

    // Overwrites only the keys in `updates`; all other sections and keys are
    // kept. A missing file is created.
    pub fn write(&self, path: &str, updates: &ConfigMap) -> Result<(), SyncError> {
        let path = self.check_access(path)?;
        let mut doc = load_document(&path)?;
        doc.merge(updates);
        fs::write(&path, doc.render()).map_err(|e| SyncError::io(&path, e))?;
        info!("Wrote config {:?} ({} section(s) updated)", path, updates.len());
        Ok(())
    }
}

fn load_document(path: &Path) -> Result<IniDocument, SyncError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(SyncError::io(path, e)),
    };
    IniDocument::parse(&text).map_err(|e| SyncError::Io{
        path: path.display().to_string(),
        reason: format!("parse error at {}", e)})
}

// Makes `path` absolute under '/' and resolves '.', '..' and repeated
// separators lexically. '..' at the root stays at the root.
pub fn normalize_path(path: &str) -> PathBuf {
    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(&format!("/{}", path)).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => { parts.pop(); },
            Component::CurDir | Component::RootDir | Component::Prefix(_) => (),
        }
    }
    let mut normalized = PathBuf::from("/");
    normalized.extend(parts);
    normalized
}

// Converts form fields named `section__option` into a ConfigMap. Fields
// without the separator are ignored.
pub fn config_map_from_form<'a, I>(fields: I) -> ConfigMap
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut updates = ConfigMap::new();
    for (name, value) in fields {
        if let Some((section, option)) = name.split_once("__") {
            if section.is_empty() || option.is_empty() {
                continue;
            }
            updates.entry(section.to_string()).or_default()
                .insert(option.to_string(), value.clone());
        }
    }
    updates
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use super::*;

    fn store_with_file(dir: &Path, name: &str, contents: Option<&str>)
                       -> (ConfigStore, String) {
        let path = dir.join(name);
        if let Some(c) = contents {
            fs::write(&path, c).unwrap();
        }
        let path_str = path.display().to_string();
        (ConfigStore::new(&[path_str.clone()]), path_str)
    }

    fn updates(section: &str, key: &str, value: &str) -> ConfigMap {
        let mut m = ConfigMap::new();
        m.entry(section.to_string()).or_default()
            .insert(key.to_string(), value.to_string());
        m
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("etc/wifibroadcast.cfg"),
                   PathBuf::from("/etc/wifibroadcast.cfg"));
        assert_eq!(normalize_path("//etc/./wifibroadcast.cfg"),
                   PathBuf::from("/etc/wifibroadcast.cfg"));
        assert_eq!(normalize_path("/etc/x/../wifibroadcast.cfg"),
                   PathBuf::from("/etc/wifibroadcast.cfg"));
        assert_eq!(normalize_path("/../../etc/passwd"), PathBuf::from("/etc/passwd"));
        assert_eq!(normalize_path(""), PathBuf::from("/"));
    }

    #[test]
    fn test_check_access() {
        let store = ConfigStore::new(&["/etc/wifibroadcast.cfg",
                                       "/config/scripts/osd"]);
        assert!(store.check_access("/etc/wifibroadcast.cfg").is_ok());
        assert!(store.check_access("etc/wifibroadcast.cfg").is_ok());
        assert!(store.check_access("/etc/../etc/wifibroadcast.cfg").is_ok());
        assert!(store.check_access("/config/scripts/osd").is_ok());

        assert!(store.check_access("/etc/wifibroadcast.cfg/../passwd").is_err());
        assert!(store.check_access("/config/scripts").is_err());
        assert!(store.check_access("/config/scripts/osd/x").is_err());
        assert!(store.check_access("/etc/passwd").is_err());
    }

    #[test]
    fn test_write_denied_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store_with_file(dir.path(), "allowed.cfg", None);
        let target = dir.path().join("other.cfg");
        let result = store.write(&target.display().to_string(),
                                 &updates("rf", "channel", "149"));
        assert!(matches!(result, Err(SyncError::AccessDenied{..})));
        assert!(!target.exists());
        assert!(!dir.path().join("allowed.cfg").exists());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let (store, path) = store_with_file(
            dir.path(), "wfb.cfg", Some("[rf]\nchannel=161\n"));
        store.write(&path, &updates("rf", "channel", "149")).unwrap();
        let map = store.read(&path).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["rf"].len(), 1);
        assert_eq!(map["rf"]["channel"], "149");
    }

    #[test]
    fn test_write_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let (store, path) = store_with_file(
            dir.path(), "wfb.cfg",
            Some("[common]\nwifi_channel = 161\nwifi_region = BO\n\n\
                  [gs_video]\npeer = connect://127.0.0.1:5600\n"));
        let before = store.read(&path).unwrap();
        store.write(&path, &ConfigMap::new()).unwrap();
        assert_eq!(store.read(&path).unwrap(), before);

        store.write(&path, &updates("common", "wifi_region", "US")).unwrap();
        let after = store.read(&path).unwrap();
        assert_eq!(after["common"]["wifi_region"], "US");
        assert_eq!(after["common"]["wifi_channel"], "161");
        assert_eq!(after["gs_video"], before["gs_video"]);
    }

    #[test]
    fn test_read_recovers_from_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let (store, path) = store_with_file(dir.path(), "missing.cfg", None);
        assert!(store.read(&path).unwrap().is_empty());

        let (store, path) = store_with_file(dir.path(), "screen-mode",
                                            Some("1920x1080@60\n"));
        assert!(store.read(&path).unwrap().is_empty());
        // Writing into an unparseable file fails rather than clobbering it.
        assert!(matches!(store.write(&path, &updates("a", "b", "c")),
                         Err(SyncError::Io{..})));
        assert_eq!(fs::read_to_string(&path).unwrap(), "1920x1080@60\n");
    }

    #[test]
    fn test_write_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, path) = store_with_file(dir.path(), "new.cfg", None);
        store.write(&path, &updates("osd", "enabled", "1")).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[osd]\nenabled = 1\n\n");
        assert_eq!(store.available().len(), 1);
        assert_eq!(store.available()[0].name, "new.cfg");
    }

    #[test]
    fn test_config_map_from_form() {
        let mut form = HashMap::new();
        form.insert("rf__channel".to_string(), "149".to_string());
        form.insert("rf__txpower".to_string(), "20".to_string());
        form.insert("video__fec_k".to_string(), "8".to_string());
        form.insert("submit".to_string(), "Save".to_string());
        form.insert("__x".to_string(), "1".to_string());
        let map = config_map_from_form(&form);
        assert_eq!(map.len(), 2);
        assert_eq!(map["rf"]["channel"], "149");
        assert_eq!(map["rf"]["txpower"], "20");
        assert_eq!(map["video"]["fec_k"], "8");
    }
}
