//! Creates the folders implied by dropped relative paths.

use std::collections::HashMap;

use crate::errors::ImportError;
use crate::path_index::{PathIndex, ROOT_FQDN, fqdn_join};
use crate::store::AssetStore;
use crate::types::{AssetScope, Destination, FileRecord};

/// Folder lookup for one batch.
///
/// Starts from the indexed directories and learns every folder it creates,
/// so each distinct FQDN is created at most once per batch.
#[derive(Debug)]
pub struct FolderMaterializer {
    folders_by_fqdn: HashMap<String, Destination>,
    created: Vec<FileRecord>,
}

impl FolderMaterializer {
    pub fn new(index: &PathIndex) -> Self {
        let mut folders_by_fqdn: HashMap<String, Destination> = index
            .iter()
            .map(|(fqdn, record)| (fqdn.to_string(), Destination::Folder(record.id.clone())))
            .collect();
        folders_by_fqdn.insert(ROOT_FQDN.to_string(), Destination::Root);
        Self {
            folders_by_fqdn,
            created: Vec::new(),
        }
    }

    /// Walks `segments` below `base`, creating each missing folder shallow to
    /// deep, and returns the folder the file goes into.
    pub async fn resolve<S: AssetStore>(
        &mut self,
        store: &S,
        scope: &AssetScope,
        base_fqdn: &str,
        base: &Destination,
        segments: &[String],
    ) -> Result<Destination, ImportError> {
        let mut fqdn = base_fqdn.to_string();
        let mut parent = base.clone();

        for segment in segments {
            fqdn = fqdn_join(&fqdn, &[segment]);
            if let Some(known) = self.folders_by_fqdn.get(&fqdn) {
                parent = known.clone();
                continue;
            }

            log::debug!("FolderMaterializer: creating '{}' in {}", segment, parent);
            let record = store
                .create_folder(scope, &parent, segment)
                .await
                .map_err(|e| {
                    log::error!("FolderMaterializer: creating '{}' in {} failed: {}", segment, parent, e);
                    ImportError::FolderCreation {
                        name: segment.clone(),
                        message: e.to_string(),
                    }
                })?;
            parent = Destination::Folder(record.id.clone());
            self.folders_by_fqdn.insert(fqdn.clone(), parent.clone());
            self.created.push(record);
        }
        Ok(parent)
    }

    /// Folders created so far in this batch, in creation order.
    pub fn created(&self) -> &[FileRecord] {
        &self.created
    }
}
