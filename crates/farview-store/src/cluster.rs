//! Cluster-config ingestion and the reply we send back.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use farview_proto::bep;
use farview_shared::DeviceId;

use crate::database::Store;
use crate::error::{Result, StoreError};

// Folder flag bits, packed from the wire booleans.
const FOLDER_READ_ONLY: i64 = 1 << 0;
const FOLDER_IGNORE_PERMISSIONS: i64 = 1 << 1;
const FOLDER_IGNORE_DELETE: i64 = 1 << 2;
const FOLDER_DISABLE_TEMP_INDEXES: i64 = 1 << 3;
const FOLDER_PAUSED: i64 = 1 << 4;

impl Store {
    /// Apply a peer's cluster config: upsert folders and their devices.
    ///
    /// The self device gets a random index id on first insert and always
    /// carries our configured name. A changed index id on a non-self device
    /// resets its internal sequence counter, forcing a full resync.
    pub fn update_cluster_config(&self, cluster: &bep::ClusterConfig) -> Result<()> {
        let mut conn = self.writer();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;

        for folder in &cluster.folders {
            let folder_id = upsert_folder(&tx, folder)?;
            ensure_root_directory(&tx, folder_id)?;
            for device in &folder.devices {
                self.upsert_device(&tx, folder_id, device)?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Build the cluster config we send to `peer`: for every folder exactly
    /// two devices, ourselves and the peer.
    pub fn cluster_config_for(&self, peer: &DeviceId) -> Result<bep::ClusterConfig> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare("SELECT id, id_string, label, flags FROM folder")?;
        let folders: Vec<(i64, String, String, i64)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut out = Vec::with_capacity(folders.len());
        for (folder_id, id_string, label, flags) in folders {
            let self_dev = device_entry(&conn, folder_id, self.local_id().as_bytes())?
                .ok_or_else(|| StoreError::MissingDevice(id_string.clone(), "self"))?;
            let peer_dev = device_entry(&conn, folder_id, peer.as_bytes())?
                .ok_or_else(|| StoreError::MissingDevice(id_string.clone(), "peer"))?;

            out.push(bep::Folder {
                id: id_string,
                label,
                read_only: flags & FOLDER_READ_ONLY != 0,
                ignore_permissions: flags & FOLDER_IGNORE_PERMISSIONS != 0,
                ignore_delete: flags & FOLDER_IGNORE_DELETE != 0,
                disable_temp_indexes: flags & FOLDER_DISABLE_TEMP_INDEXES != 0,
                paused: flags & FOLDER_PAUSED != 0,
                devices: vec![self_dev, peer_dev],
            });
        }
        Ok(bep::ClusterConfig { folders: out })
    }

    fn upsert_device(
        &self,
        conn: &Connection,
        folder_id: i64,
        device: &bep::Device,
    ) -> Result<()> {
        let is_self = device.id == self.local_id().as_bytes();
        let name = if is_self {
            self.device_name()
        } else {
            &device.name
        };
        let addresses = device.addresses.join(",");

        let existing: Option<(i64, Vec<u8>)> = conn
            .query_row(
                "SELECT id, index_id FROM device WHERE device_id = ?1 AND folder_id = ?2",
                params![device.id, folder_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match existing {
            None => {
                let index_id: [u8; 8] = if is_self {
                    rand::random()
                } else {
                    bep::id_bytes(device.index_id)
                };
                conn.execute(
                    "INSERT INTO device
                     (device_id, folder_id, name, addresses, max_sequence, max_sequence_internal, index_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                    params![
                        device.id,
                        folder_id,
                        name,
                        addresses,
                        device.max_sequence,
                        index_id.as_slice(),
                    ],
                )?;
            }
            Some((row_id, stored_index_id)) => {
                conn.execute(
                    "UPDATE device SET name = ?2, addresses = ?3, max_sequence = ?4 WHERE id = ?1",
                    params![row_id, name, addresses, device.max_sequence],
                )?;
                if !is_self {
                    let wire_index_id = bep::id_bytes(device.index_id);
                    if stored_index_id != wire_index_id {
                        tracing::info!(
                            device = %hex::encode(&device.id),
                            "device index id changed, forcing resync"
                        );
                        conn.execute(
                            "UPDATE device SET index_id = ?2, max_sequence_internal = 0 WHERE id = ?1",
                            params![row_id, wire_index_id.as_slice()],
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn upsert_folder(conn: &Connection, folder: &bep::Folder) -> Result<i64> {
    let mut flags = 0i64;
    if folder.read_only {
        flags |= FOLDER_READ_ONLY;
    }
    if folder.ignore_permissions {
        flags |= FOLDER_IGNORE_PERMISSIONS;
    }
    if folder.ignore_delete {
        flags |= FOLDER_IGNORE_DELETE;
    }
    if folder.disable_temp_indexes {
        flags |= FOLDER_DISABLE_TEMP_INDEXES;
    }
    if folder.paused {
        flags |= FOLDER_PAUSED;
    }

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM folder WHERE id_string = ?1",
            params![folder.id],
            |row| row.get(0),
        )
        .optional()?;
    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE folder SET label = ?2, flags = ?3 WHERE id = ?1",
                params![id, folder.label, flags],
            )?;
            Ok(id)
        }
        None => {
            // The local mount label mirrors the folder id.
            conn.execute(
                "INSERT INTO folder (id_string, label, path, flags) VALUES (?1, ?2, ?1, ?3)",
                params![folder.id, folder.label, flags],
            )?;
            Ok(conn.last_insert_rowid())
        }
    }
}

/// Create the folder's root `/` directory if it does not exist yet.
pub(crate) fn ensure_root_directory(conn: &Connection, folder_id: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO directory (folder_id, name, sync) VALUES (?1, '/', 2)",
        params![folder_id],
    )?;
    Ok(())
}

fn device_entry(
    conn: &Connection,
    folder_id: i64,
    device_id: &[u8],
) -> Result<Option<bep::Device>> {
    let row: Option<(String, String, i64, Vec<u8>)> = conn
        .query_row(
            "SELECT name, addresses, max_sequence_internal, index_id
             FROM device WHERE folder_id = ?1 AND device_id = ?2",
            params![folder_id, device_id],
            |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            },
        )
        .optional()?;
    Ok(row.map(|(name, addresses, max_sequence_internal, index_id)| bep::Device {
        id: device_id.to_vec(),
        name,
        addresses: if addresses.is_empty() {
            Vec::new()
        } else {
            addresses.split(',').map(str::to_string).collect()
        },
        compression: 0,
        cert_name: String::new(),
        max_sequence: max_sequence_internal,
        introducer: false,
        index_id: bep::id_value(&index_id),
        skip_introduction_removals: false,
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn local_id() -> DeviceId {
        DeviceId::from_raw([1u8; 32])
    }

    pub(crate) fn peer_id() -> DeviceId {
        DeviceId::from_raw([2u8; 32])
    }

    pub(crate) fn open_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("catalog.db"), local_id(), "farview").unwrap();
        (dir, store)
    }

    pub(crate) fn sample_cluster() -> bep::ClusterConfig {
        bep::ClusterConfig {
            folders: vec![bep::Folder {
                id: "docs".into(),
                label: "Documents".into(),
                read_only: false,
                ignore_permissions: false,
                ignore_delete: false,
                disable_temp_indexes: false,
                paused: false,
                devices: vec![
                    bep::Device {
                        id: local_id().as_bytes().to_vec(),
                        name: "claimed-self-name".into(),
                        addresses: vec![],
                        compression: 0,
                        cert_name: String::new(),
                        max_sequence: 0,
                        introducer: false,
                        index_id: 0,
                        skip_introduction_removals: false,
                    },
                    bep::Device {
                        id: peer_id().as_bytes().to_vec(),
                        name: "server".into(),
                        addresses: vec!["tcp://192.0.2.1:22000".into(), "dynamic".into()],
                        compression: 0,
                        cert_name: String::new(),
                        max_sequence: 1234,
                        introducer: false,
                        index_id: 0x0102_0304_0506_0708,
                        skip_introduction_removals: false,
                    },
                ],
            }],
        }
    }

    fn dump(store: &Store) -> Vec<String> {
        let conn = store.writer();
        let mut stmt = conn
            .prepare(
                "SELECT f.id_string, f.label, f.path, d.device_id, d.name, d.addresses,
                        d.max_sequence, d.max_sequence_internal, d.index_id
                 FROM folder f JOIN device d ON d.folder_id = f.id
                 ORDER BY f.id_string, d.device_id",
            )
            .unwrap();
        stmt.query_map([], |row| {
            let device_id: Vec<u8> = row.get(3)?;
            let index_id: Vec<u8> = row.get(8)?;
            Ok(format!(
                "{}|{}|{}|{}|{}|{}|{}|{}|{}",
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                hex::encode(device_id),
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, i64>(7)?,
                hex::encode(index_id),
            ))
        })
        .unwrap()
        .collect::<std::result::Result<_, _>>()
        .unwrap()
    }

    #[test]
    fn upsert_creates_folder_devices_and_root() {
        let (_dir, store) = open_store();
        store.update_cluster_config(&sample_cluster()).unwrap();

        let rows = dump(&store);
        assert_eq!(rows.len(), 2);
        // Self name is our configured name, not the claimed one.
        assert!(rows[0].contains("|farview|"), "{rows:?}");
        assert!(rows[1].contains("|server|"));
        assert!(rows[1].contains("tcp://192.0.2.1:22000,dynamic"));

        let root: i64 = store
            .writer()
            .query_row(
                "SELECT COUNT(*) FROM directory WHERE name = '/'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(root, 1);
    }

    #[test]
    fn second_apply_is_idempotent() {
        let (_dir, store) = open_store();
        store.update_cluster_config(&sample_cluster()).unwrap();
        let before = dump(&store);
        store.update_cluster_config(&sample_cluster()).unwrap();
        assert_eq!(dump(&store), before);
    }

    #[test]
    fn peer_index_id_change_resets_sequence() {
        let (_dir, store) = open_store();
        store.update_cluster_config(&sample_cluster()).unwrap();
        store
            .writer()
            .execute(
                "UPDATE device SET max_sequence_internal = 77 WHERE device_id = ?1",
                params![peer_id().as_bytes().as_slice()],
            )
            .unwrap();

        let mut cluster = sample_cluster();
        cluster.folders[0].devices[1].index_id = 0xDEAD_BEEF;
        store.update_cluster_config(&cluster).unwrap();

        let (seq, index_id): (i64, Vec<u8>) = store
            .writer()
            .query_row(
                "SELECT max_sequence_internal, index_id FROM device WHERE device_id = ?1",
                params![peer_id().as_bytes().as_slice()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(seq, 0);
        assert_eq!(index_id, bep::id_bytes(0xDEAD_BEEF));
    }

    #[test]
    fn self_index_id_generated_once() {
        let (_dir, store) = open_store();
        store.update_cluster_config(&sample_cluster()).unwrap();
        let first: Vec<u8> = store
            .writer()
            .query_row(
                "SELECT index_id FROM device WHERE device_id = ?1",
                params![local_id().as_bytes().as_slice()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(first.len(), 8);

        store.update_cluster_config(&sample_cluster()).unwrap();
        let second: Vec<u8> = store
            .writer()
            .query_row(
                "SELECT index_id FROM device WHERE device_id = ?1",
                params![local_id().as_bytes().as_slice()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn cluster_config_for_has_self_and_peer() {
        let (_dir, store) = open_store();
        store.update_cluster_config(&sample_cluster()).unwrap();

        let reply = store.cluster_config_for(&peer_id()).unwrap();
        assert_eq!(reply.folders.len(), 1);
        let devices = &reply.folders[0].devices;
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].id, local_id().as_bytes().to_vec());
        assert_eq!(devices[0].name, "farview");
        assert_eq!(devices[1].id, peer_id().as_bytes().to_vec());
        assert_eq!(devices[1].index_id, 0x0102_0304_0506_0708);
    }

    #[test]
    fn cluster_config_for_unknown_peer_fails() {
        let (_dir, store) = open_store();
        store.update_cluster_config(&sample_cluster()).unwrap();
        let stranger = DeviceId::from_raw([9u8; 32]);
        assert!(matches!(
            store.cluster_config_for(&stranger),
            Err(StoreError::MissingDevice(_, "peer"))
        ));
    }
}
