//! Group CRUD, membership, and the effective-permission resolution formula
//! (spec §4.8): OR across the user's groups' permission rows, unioned with
//! a creator-implicit grant and an admin-group-implicit grant.

use chunking_store::{ChunkRepo, StoreError, ADMIN_GROUP_ID};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::error::AuthError;

pub struct AclStore<'a> {
    repo: &'a ChunkRepo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
    Delete,
}

impl<'a> AclStore<'a> {
    pub fn new(repo: &'a ChunkRepo) -> Self {
        Self { repo }
    }

    pub fn create_group(&self, name: &str) -> Result<String, AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        let id = format!("GRP{}", &Uuid::new_v4().simple().to_string()[..9].to_uppercase());
        conn.execute(
            "INSERT INTO groups (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![id, name, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(StoreError::from)?;
        Ok(id)
    }

    pub fn update_group(&self, group_id: &str, name: &str) -> Result<(), AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        conn.execute("UPDATE groups SET name = ?1 WHERE id = ?2", params![name, group_id]).map_err(StoreError::from)?;
        Ok(())
    }

    pub fn delete_group(&self, group_id: &str) -> Result<(), AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        conn.execute("DELETE FROM groups WHERE id = ?1", params![group_id]).map_err(StoreError::from)?;
        Ok(())
    }

    pub fn list_groups(&self) -> Result<Vec<(String, String)>, AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        let mut stmt = conn.prepare("SELECT id, name FROM groups ORDER BY name").map_err(StoreError::from)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(StoreError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)?;
        Ok(rows)
    }

    pub fn group_members(&self, group_id: &str) -> Result<Vec<String>, AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        let mut stmt = conn
            .prepare("SELECT u.username FROM users u JOIN user_groups ug ON ug.user_id = u.id WHERE ug.group_id = ?1 ORDER BY u.username")
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map(params![group_id], |row| row.get::<_, String>(0))
            .map_err(StoreError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)?;
        Ok(rows)
    }

    pub fn user_groups(&self, user_id: &str) -> Result<Vec<String>, AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        let mut stmt = conn.prepare("SELECT group_id FROM user_groups WHERE user_id = ?1").map_err(StoreError::from)?;
        let rows = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))
            .map_err(StoreError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::from)?;
        Ok(rows)
    }

    pub fn assign_group(&self, user_id: &str, group_id: &str) -> Result<(), AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        conn.execute(
            "INSERT OR IGNORE INTO user_groups (user_id, group_id) VALUES (?1, ?2)",
            params![user_id, group_id],
        )
        .map_err(StoreError::from)?;
        Ok(())
    }

    pub fn remove_group(&self, user_id: &str, group_id: &str) -> Result<(), AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        conn.execute("DELETE FROM user_groups WHERE user_id = ?1 AND group_id = ?2", params![user_id, group_id])
            .map_err(StoreError::from)?;
        Ok(())
    }

    /// Replaces a user's full group set atomically.
    pub fn replace_groups(&self, user_id: &str, group_ids: &[String]) -> Result<(), AuthError> {
        let mut conn = self.repo.pool().get().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(StoreError::from)?;
        tx.execute("DELETE FROM user_groups WHERE user_id = ?1", params![user_id]).map_err(StoreError::from)?;
        for group_id in group_ids {
            tx.execute(
                "INSERT OR IGNORE INTO user_groups (user_id, group_id) VALUES (?1, ?2)",
                params![user_id, group_id],
            )
            .map_err(StoreError::from)?;
        }
        tx.commit().map_err(StoreError::from)?;
        Ok(())
    }

    /// Grants a group a single cumulative permission level on a collection:
    /// `Write` implies `Read`, `Delete` implies `Write` and `Read`.
    pub fn set_permission(&self, collection_id: i64, group_id: &str, permission: Permission) -> Result<(), AuthError> {
        let (can_read, can_write, can_delete) = match permission {
            Permission::Read => (1, 0, 0),
            Permission::Write => (1, 1, 0),
            Permission::Delete => (1, 1, 1),
        };
        self.upsert_permission_row(collection_id, group_id, can_read, can_write, can_delete)
    }

    fn upsert_permission_row(&self, collection_id: i64, group_id: &str, can_read: i64, can_write: i64, can_delete: i64) -> Result<(), AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;
        conn.execute(
            "INSERT INTO collection_permissions (collection_id, group_id, can_read, can_write, can_delete)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(collection_id, group_id) DO UPDATE SET
                can_read = excluded.can_read, can_write = excluded.can_write, can_delete = excluded.can_delete",
            params![collection_id, group_id, can_read, can_write, can_delete],
        )
        .map_err(StoreError::from)?;
        Ok(())
    }

    /// Atomically replaces every group's permission row on a collection with
    /// the given `(group_id, can_read, can_write, can_delete)` entries (spec
    /// §4.8 `replace_permissions`), mirroring `replace_groups`'s
    /// delete-then-reinsert transaction.
    pub fn replace_permissions(&self, collection_id: i64, entries: &[(String, bool, bool, bool)]) -> Result<(), AuthError> {
        let mut conn = self.repo.pool().get().map_err(StoreError::from)?;
        let tx = conn.transaction().map_err(StoreError::from)?;
        tx.execute("DELETE FROM collection_permissions WHERE collection_id = ?1", params![collection_id]).map_err(StoreError::from)?;
        for (group_id, can_read, can_write, can_delete) in entries {
            tx.execute(
                "INSERT INTO collection_permissions (collection_id, group_id, can_read, can_write, can_delete)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![collection_id, group_id, *can_read as i64, *can_write as i64, *can_delete as i64],
            )
            .map_err(StoreError::from)?;
        }
        tx.commit().map_err(StoreError::from)?;
        Ok(())
    }

    /// Effective permission for `user_id` on `collection_id`: creators and
    /// admin-group members get an implicit write grant; everyone else's
    /// access is the OR of their groups' permission rows.
    pub fn effective_permission(&self, user_id: &str, collection_id: i64) -> Result<Option<Permission>, AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;

        let is_creator: bool = conn
            .query_row(
                "SELECT 1 FROM collections WHERE id = ?1 AND created_by = ?2",
                params![collection_id, user_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(StoreError::from)?
            .is_some();
        if is_creator {
            return Ok(Some(Permission::Write));
        }

        let is_admin: bool = conn
            .query_row(
                "SELECT 1 FROM user_groups WHERE user_id = ?1 AND group_id = ?2",
                params![user_id, ADMIN_GROUP_ID],
                |_| Ok(()),
            )
            .optional()
            .map_err(StoreError::from)?
            .is_some();
        if is_admin {
            return Ok(Some(Permission::Write));
        }

        // MAX() over a non-matching JOIN still yields one row of NULLs, not
        // zero rows, so both columns are read as optional.
        let (read, write): (Option<i64>, Option<i64>) = conn
            .query_row(
                "SELECT MAX(cp.can_read), MAX(cp.can_write)
                 FROM collection_permissions cp
                 JOIN user_groups ug ON ug.group_id = cp.group_id
                 WHERE ug.user_id = ?1 AND cp.collection_id = ?2",
                params![user_id, collection_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(StoreError::from)?;

        Ok(match (read, write) {
            (_, Some(1)) => Some(Permission::Write),
            (Some(1), _) => Some(Permission::Read),
            _ => None,
        })
    }

    /// Whether `user_id` can delete within `collection_id`: creators and
    /// admin-group members implicitly can; everyone else needs `can_delete`
    /// set on at least one of their groups' permission rows. Kept separate
    /// from `effective_permission` since `can_delete` is not implied by
    /// `Write` in the underlying three-flag model (spec §3).
    pub fn can_delete(&self, user_id: &str, collection_id: i64) -> Result<bool, AuthError> {
        let conn = self.repo.pool().get().map_err(StoreError::from)?;

        let is_creator: bool = conn
            .query_row(
                "SELECT 1 FROM collections WHERE id = ?1 AND created_by = ?2",
                params![collection_id, user_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(StoreError::from)?
            .is_some();
        if is_creator {
            return Ok(true);
        }

        let is_admin: bool = conn
            .query_row(
                "SELECT 1 FROM user_groups WHERE user_id = ?1 AND group_id = ?2",
                params![user_id, ADMIN_GROUP_ID],
                |_| Ok(()),
            )
            .optional()
            .map_err(StoreError::from)?
            .is_some();
        if is_admin {
            return Ok(true);
        }

        let can_delete: Option<i64> = conn
            .query_row(
                "SELECT MAX(cp.can_delete)
                 FROM collection_permissions cp
                 JOIN user_groups ug ON ug.group_id = cp.group_id
                 WHERE ug.user_id = ?1 AND cp.collection_id = ?2",
                params![user_id, collection_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .map_err(StoreError::from)?;
        Ok(can_delete == Some(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ChunkRepo {
        ChunkRepo::new(chunking_store::init_pool(":memory:", 4).unwrap())
    }

    #[test]
    fn creator_gets_implicit_write_grant() {
        let repo = setup();
        let cid = repo.create_collection("mine", "alice").unwrap();
        let acl = AclStore::new(&repo);
        assert_eq!(acl.effective_permission("alice", cid.0).unwrap(), Some(Permission::Write));
        assert_eq!(acl.effective_permission("bob", cid.0).unwrap(), None);
    }

    #[test]
    fn group_permission_grants_read_access() {
        let repo = setup();
        let cid = repo.create_collection("shared", "alice").unwrap();
        let acl = AclStore::new(&repo);
        let group_id = acl.create_group("readers").unwrap();
        acl.assign_group("bob", &group_id).unwrap();
        acl.set_permission(cid.0, &group_id, Permission::Read).unwrap();
        assert_eq!(acl.effective_permission("bob", cid.0).unwrap(), Some(Permission::Read));
    }

    #[test]
    fn admin_group_member_gets_implicit_write_grant() {
        let repo = setup();
        let cid = repo.create_collection("anything", "alice").unwrap();
        let acl = AclStore::new(&repo);
        acl.assign_group("carol", chunking_store::ADMIN_GROUP_ID).unwrap();
        assert_eq!(acl.effective_permission("carol", cid.0).unwrap(), Some(Permission::Write));
    }

    #[test]
    fn write_without_delete_flag_cannot_delete() {
        let repo = setup();
        let cid = repo.create_collection("shared", "alice").unwrap();
        let acl = AclStore::new(&repo);
        let group_id = acl.create_group("writers").unwrap();
        acl.assign_group("bob", &group_id).unwrap();
        acl.set_permission(cid.0, &group_id, Permission::Write).unwrap();
        assert!(!acl.can_delete("bob", cid.0).unwrap());

        acl.replace_permissions(cid.0, &[(group_id, true, true, true)]).unwrap();
        assert!(acl.can_delete("bob", cid.0).unwrap());
    }

    #[test]
    fn replace_permissions_drops_rows_not_in_the_new_set() {
        let repo = setup();
        let cid = repo.create_collection("shared", "alice").unwrap();
        let acl = AclStore::new(&repo);
        let g1 = acl.create_group("g1").unwrap();
        let g2 = acl.create_group("g2").unwrap();
        acl.set_permission(cid.0, &g1, Permission::Read).unwrap();
        acl.set_permission(cid.0, &g2, Permission::Read).unwrap();

        acl.replace_permissions(cid.0, &[(g2.clone(), true, false, false)]).unwrap();

        acl.assign_group("bob", &g1).unwrap();
        acl.assign_group("carol", &g2).unwrap();
        assert_eq!(acl.effective_permission("bob", cid.0).unwrap(), None);
        assert_eq!(acl.effective_permission("carol", cid.0).unwrap(), Some(Permission::Read));
    }

    #[test]
    fn creator_and_admin_can_always_delete() {
        let repo = setup();
        let cid = repo.create_collection("mine", "alice").unwrap();
        let acl = AclStore::new(&repo);
        acl.assign_group("carol", chunking_store::ADMIN_GROUP_ID).unwrap();
        assert!(acl.can_delete("alice", cid.0).unwrap());
        assert!(acl.can_delete("carol", cid.0).unwrap());
        assert!(!acl.can_delete("bob", cid.0).unwrap());
    }
}
