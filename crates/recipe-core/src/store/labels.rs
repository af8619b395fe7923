use super::Store;
use crate::model::{validate_label, Label, LabelKind};
use crate::{RecipeError, Result};
use rusqlite::{params, Connection, OptionalExtension};

fn not_found(kind: LabelKind, id: i64) -> RecipeError {
    RecipeError::NotFound(format!("{} {}", kind.noun(), id))
}

/// Returns the id of the user's label called `name`, creating it if the
/// user has none. Names are matched exactly; the oldest match wins.
pub(crate) fn get_or_create_label(
    conn: &Connection,
    kind: LabelKind,
    user_id: i64,
    name: &str,
) -> Result<i64> {
    let table = kind.table();
    let existing: Option<i64> = conn
        .query_row(
            &format!("SELECT id FROM {table} WHERE user_id = ?1 AND name = ?2 ORDER BY id LIMIT 1"),
            params![user_id, name],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        &format!("INSERT INTO {table} (user_id, name) VALUES (?1, ?2)"),
        params![user_id, name],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Labels of one kind attached to a recipe, in creation order.
pub(crate) fn labels_for_recipe(
    conn: &Connection,
    kind: LabelKind,
    recipe_id: i64,
) -> Result<Vec<Label>> {
    let sql = format!(
        "SELECT l.id, l.name FROM {table} l \
         JOIN {link} rl ON rl.{col} = l.id \
         WHERE rl.recipe_id = ?1 ORDER BY l.id",
        table = kind.table(),
        link = kind.link_table(),
        col = kind.link_column(),
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map([recipe_id], |row| {
        Ok(Label {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Replace every link of one kind on a recipe with the named labels.
pub(crate) fn replace_recipe_labels(
    conn: &Connection,
    kind: LabelKind,
    user_id: i64,
    recipe_id: i64,
    names: &[String],
) -> Result<()> {
    let link = kind.link_table();
    let col = kind.link_column();
    conn.execute(
        &format!("DELETE FROM {link} WHERE recipe_id = ?1"),
        [recipe_id],
    )?;
    for name in names {
        let label_id = get_or_create_label(conn, kind, user_id, name)?;
        conn.execute(
            &format!("INSERT OR IGNORE INTO {link} (recipe_id, {col}) VALUES (?1, ?2)"),
            params![recipe_id, label_id],
        )?;
    }
    Ok(())
}

impl Store {
    /// List a user's tags or ingredients, newest name first.
    /// With `assigned_only`, only labels used by at least one recipe.
    pub fn list_labels(
        &self,
        kind: LabelKind,
        user_id: i64,
        assigned_only: bool,
    ) -> Result<Vec<Label>> {
        let table = kind.table();
        let sql = if assigned_only {
            format!(
                "SELECT DISTINCT l.id, l.name FROM {table} l \
                 JOIN {link} rl ON rl.{col} = l.id \
                 WHERE l.user_id = ?1 ORDER BY l.name DESC, l.id DESC",
                link = kind.link_table(),
                col = kind.link_column(),
            )
        } else {
            format!(
                "SELECT l.id, l.name FROM {table} l \
                 WHERE l.user_id = ?1 ORDER BY l.name DESC, l.id DESC"
            )
        };

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([user_id], |row| {
            Ok(Label {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Create a label directly, outside of any recipe.
    pub fn create_label(&self, kind: LabelKind, user_id: i64, name: &str) -> Result<Label> {
        let name = validate_label("name", name)?;
        let conn = self.conn.lock();
        conn.execute(
            &format!("INSERT INTO {} (user_id, name) VALUES (?1, ?2)", kind.table()),
            params![user_id, name],
        )?;
        Ok(Label {
            id: conn.last_insert_rowid(),
            name,
        })
    }

    pub fn get_label(&self, kind: LabelKind, user_id: i64, id: i64) -> Result<Label> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT id, name FROM {} WHERE id = ?1 AND user_id = ?2", kind.table()),
            params![id, user_id],
            |row| {
                Ok(Label {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| not_found(kind, id))
    }

    pub fn update_label(
        &self,
        kind: LabelKind,
        user_id: i64,
        id: i64,
        name: &str,
    ) -> Result<Label> {
        let name = validate_label("name", name)?;
        let conn = self.conn.lock();
        let changed = conn.execute(
            &format!("UPDATE {} SET name = ?1 WHERE id = ?2 AND user_id = ?3", kind.table()),
            params![name, id, user_id],
        )?;
        if changed == 0 {
            return Err(not_found(kind, id));
        }
        Ok(Label { id, name })
    }

    /// Delete a label; its recipe links go with it.
    pub fn delete_label(&self, kind: LabelKind, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1 AND user_id = ?2", kind.table()),
            params![id, user_id],
        )?;
        if changed == 0 {
            return Err(not_found(kind, id));
        }
        Ok(())
    }
}
