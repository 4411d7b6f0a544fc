use crate::layout::{is_valid_lab_component, LabsLayout};
use crate::record::{LabRecord, LabStatus};
use crate::{fsync_dir, StoreError};
use labforge_schema::{LabId, LabTemplate, Subnet};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Persistence seam for lab records.
///
/// Implementations do not synchronize read-modify-write cycles; callers that
/// share a labs root across processes must serialize mutations themselves.
pub trait LabRepository {
    /// Persist a new record in `building` and return it.
    fn create(
        &self,
        lab_id: &LabId,
        template_ident: &str,
        template: &LabTemplate,
        subnet: Subnet,
    ) -> Result<LabRecord, StoreError>;

    fn load(&self, lab_id: &LabId) -> Result<LabRecord, StoreError>;

    /// Set `status`, bump `updated_at`, persist, and return the new record.
    fn update_status(&self, lab_id: &LabId, status: LabStatus) -> Result<LabRecord, StoreError>;

    /// Remove the lab directory and everything in it. Absent is not an error.
    fn delete(&self, lab_id: &LabId) -> Result<(), StoreError>;

    /// Every readable record, sorted by id.
    fn list_all(&self) -> Result<Vec<LabRecord>, StoreError>;

    /// Full id for a unique prefix of an existing lab id.
    fn resolve_id(&self, partial: &str) -> Result<LabId, StoreError>;

    fn lab_dir(&self, lab_id: &LabId) -> PathBuf;

    fn manifest_path(&self, lab_id: &LabId) -> PathBuf;

    /// Subnets owned by labs that are not destroyed.
    fn used_subnets(&self) -> Result<Vec<Subnet>, StoreError> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|rec| rec.status != LabStatus::Destroyed)
            .map(|rec| rec.subnet)
            .collect())
    }
}

/// Filesystem-backed [`LabRepository`] writing YAML records under a
/// [`LabsLayout`].
#[derive(Debug, Clone)]
pub struct LabStore {
    layout: LabsLayout,
}

impl LabStore {
    pub fn new(layout: LabsLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &LabsLayout {
        &self.layout
    }

    fn checked_id<'a>(&self, lab_id: &'a LabId) -> Result<&'a str, StoreError> {
        if is_valid_lab_component(lab_id) {
            Ok(lab_id.as_str())
        } else {
            Err(StoreError::LabNotFound(lab_id.to_string()))
        }
    }

    pub fn put(&self, record: &LabRecord) -> Result<(), StoreError> {
        let id = self.checked_id(&record.lab_id)?;
        let dir = self.layout.lab_dir(id);
        fs::create_dir_all(&dir)?;

        let content = serde_yaml::to_string(record)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.layout.record_path(id))
            .map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;
        Ok(())
    }

    /// Directory names under the root that hold a record file.
    fn lab_dirs(&self) -> Result<Vec<String>, StoreError> {
        let root = self.layout.root();
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if is_valid_lab_component(name) && self.layout.record_path(name).is_file() {
                ids.push(name.to_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl LabRepository for LabStore {
    fn create(
        &self,
        lab_id: &LabId,
        template_ident: &str,
        template: &LabTemplate,
        subnet: Subnet,
    ) -> Result<LabRecord, StoreError> {
        let record = LabRecord::new(lab_id.clone(), template_ident, template, subnet);
        self.put(&record)?;
        debug!("created lab record {}", self.layout.record_path(lab_id).display());
        Ok(record)
    }

    fn load(&self, lab_id: &LabId) -> Result<LabRecord, StoreError> {
        let id = self.checked_id(lab_id)?;
        let path = self.layout.record_path(id);
        if !path.is_file() {
            return Err(StoreError::LabNotFound(id.to_owned()));
        }
        let content = fs::read_to_string(&path).map_err(|e| StoreError::CorruptRecord {
            lab_id: id.to_owned(),
            reason: e.to_string(),
        })?;
        serde_yaml::from_str(&content).map_err(|e| StoreError::CorruptRecord {
            lab_id: id.to_owned(),
            reason: e.to_string(),
        })
    }

    fn update_status(&self, lab_id: &LabId, status: LabStatus) -> Result<LabRecord, StoreError> {
        let mut record = self.load(lab_id)?;
        record.status = status;
        record.updated_at = chrono::Utc::now().to_rfc3339();
        self.put(&record)?;
        Ok(record)
    }

    fn delete(&self, lab_id: &LabId) -> Result<(), StoreError> {
        let id = self.checked_id(lab_id)?;
        let dir = self.layout.lab_dir(id);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
            debug!("removed {}", dir.display());
        }
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<LabRecord>, StoreError> {
        let mut results = Vec::new();
        for id in self.lab_dirs()? {
            match self.load(&LabId::new(id.as_str())) {
                Ok(record) => results.push(record),
                Err(e) => {
                    warn!("skipping unreadable lab record '{id}': {e}");
                }
            }
        }
        Ok(results)
    }

    fn resolve_id(&self, partial: &str) -> Result<LabId, StoreError> {
        let ids = self.lab_dirs()?;
        if ids.iter().any(|id| id == partial) {
            return Ok(LabId::new(partial));
        }
        let mut matches: Vec<String> = ids
            .into_iter()
            .filter(|id| id.starts_with(partial))
            .collect();
        match matches.len() {
            0 => Err(StoreError::LabNotFound(partial.to_owned())),
            1 => Ok(LabId::new(matches.remove(0))),
            _ => Err(StoreError::AmbiguousId {
                partial: partial.to_owned(),
                matches,
            }),
        }
    }

    fn lab_dir(&self, lab_id: &LabId) -> PathBuf {
        self.layout.lab_dir(lab_id)
    }

    fn manifest_path(&self, lab_id: &LabId) -> PathBuf {
        self.layout.manifest_path(lab_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labforge_schema::parse_template_str;

    fn test_store() -> (tempfile::TempDir, LabStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LabStore::new(LabsLayout::new(dir.path().join("labs")));
        (dir, store)
    }

    fn sample_template() -> LabTemplate {
        parse_template_str(
            "name: malware-lab\ndescription: sandbox\nservices:\n  - {name: victim, image: ubuntu, ip_offset: 10}\n  - {name: analyst, image: remnux, ip_offset: 20}\n",
        )
        .unwrap()
        .into_template()
        .unwrap()
    }

    fn subnet(s: &str) -> Subnet {
        s.parse().unwrap()
    }

    #[test]
    fn create_then_load_roundtrips() {
        let (_dir, store) = test_store();
        let id = LabId::new("mal-1a2b3c4d");
        let created = store
            .create(&id, "malware-lab", &sample_template(), subnet("172.30.1.0/24"))
            .unwrap();
        let loaded = store.load(&id).unwrap();
        assert_eq!(created, loaded);
        assert_eq!(loaded.status, LabStatus::Building);
        assert_eq!(loaded.template, "malware-lab");
        assert_eq!(loaded.subnet, subnet("172.30.1.0/24"));
        assert_eq!(loaded.services.len(), 2);
        assert_eq!(loaded.services[1].name, "analyst");
    }

    #[test]
    fn load_missing_is_not_found() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.load(&LabId::new("nope-00000000")),
            Err(StoreError::LabNotFound(_))
        ));
    }

    #[test]
    fn load_garbage_is_corrupt() {
        let (_dir, store) = test_store();
        let dir = store.layout().lab_dir("bad-00000000");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("state.yml"), "status: [nope").unwrap();
        assert!(matches!(
            store.load(&LabId::new("bad-00000000")),
            Err(StoreError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn path_like_ids_are_rejected() {
        let (_dir, store) = test_store();
        assert!(matches!(
            store.load(&LabId::new("../etc")),
            Err(StoreError::LabNotFound(_))
        ));
        assert!(store.delete(&LabId::new("..")).is_err());
    }

    #[test]
    fn update_status_persists_and_bumps_timestamp() {
        let (_dir, store) = test_store();
        let id = LabId::new("mal-1a2b3c4d");
        let created = store
            .create(&id, "malware-lab", &sample_template(), subnet("172.30.1.0/24"))
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let updated = store.update_status(&id, LabStatus::Running).unwrap();
        assert_eq!(updated.status, LabStatus::Running);
        assert_eq!(updated.created_at, created.created_at);
        assert_ne!(updated.updated_at, created.updated_at);
        assert_eq!(store.load(&id).unwrap().status, LabStatus::Running);
    }

    #[test]
    fn delete_removes_directory_and_is_idempotent() {
        let (_dir, store) = test_store();
        let id = LabId::new("mal-1a2b3c4d");
        store
            .create(&id, "t", &sample_template(), subnet("172.30.1.0/24"))
            .unwrap();
        fs::write(store.manifest_path(&id), "version: '3.8'\n").unwrap();
        store.delete(&id).unwrap();
        assert!(!store.lab_dir(&id).exists());
        store.delete(&id).unwrap();
    }

    #[test]
    fn list_all_sorted_and_skips_corrupt() {
        let (_dir, store) = test_store();
        let tmpl = sample_template();
        store
            .create(&LabId::new("web-00000002"), "t", &tmpl, subnet("172.30.2.0/24"))
            .unwrap();
        store
            .create(&LabId::new("mal-00000001"), "t", &tmpl, subnet("172.30.1.0/24"))
            .unwrap();
        let bad = store.layout().lab_dir("bad-00000000");
        fs::create_dir_all(&bad).unwrap();
        fs::write(bad.join("state.yml"), "::: not yaml").unwrap();
        fs::create_dir_all(store.layout().lab_dir("empty-dir")).unwrap();

        let ids: Vec<String> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|r| r.lab_id.into_inner())
            .collect();
        assert_eq!(ids, vec!["mal-00000001", "web-00000002"]);
    }

    #[test]
    fn list_all_on_missing_root_is_empty() {
        let (_dir, store) = test_store();
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn used_subnets_excludes_destroyed() {
        let (_dir, store) = test_store();
        let tmpl = sample_template();
        let a = LabId::new("aaa-00000001");
        let b = LabId::new("bbb-00000002");
        store.create(&a, "t", &tmpl, subnet("172.30.1.0/24")).unwrap();
        store.create(&b, "t", &tmpl, subnet("172.30.2.0/24")).unwrap();
        store.update_status(&b, LabStatus::Destroyed).unwrap();
        assert_eq!(store.used_subnets().unwrap(), vec![subnet("172.30.1.0/24")]);
    }

    #[test]
    fn resolve_id_prefix_matching() {
        let (_dir, store) = test_store();
        let tmpl = sample_template();
        for (id, net) in [
            ("mal-11111111", "172.30.1.0/24"),
            ("mal-12222222", "172.30.2.0/24"),
            ("web-33333333", "172.30.3.0/24"),
        ] {
            store.create(&LabId::new(id), "t", &tmpl, subnet(net)).unwrap();
        }
        fs::create_dir_all(store.layout().lab_dir("mal-19999999")).unwrap();

        assert_eq!(store.resolve_id("web").unwrap(), "web-33333333");
        assert_eq!(store.resolve_id("mal-11").unwrap(), "mal-11111111");
        assert_eq!(store.resolve_id("mal-12222222").unwrap(), "mal-12222222");

        match store.resolve_id("mal-1") {
            Err(StoreError::AmbiguousId { matches, .. }) => {
                assert_eq!(matches, vec!["mal-11111111", "mal-12222222"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert!(matches!(
            store.resolve_id("mal-19"),
            Err(StoreError::LabNotFound(_))
        ));
        assert!(matches!(
            store.resolve_id("zzz"),
            Err(StoreError::LabNotFound(_))
        ));
    }

    #[test]
    fn no_temp_files_left_after_writes() {
        let (_dir, store) = test_store();
        let id = LabId::new("mal-1a2b3c4d");
        store
            .create(&id, "t", &sample_template(), subnet("172.30.1.0/24"))
            .unwrap();
        store.update_status(&id, LabStatus::Running).unwrap();
        let entries: Vec<_> = fs::read_dir(store.lab_dir(&id)).unwrap().flatten().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name(), "state.yml");
    }
}
