use super::labels::{labels_for_recipe, replace_recipe_labels};
use super::Store;
use crate::model::{LabelKind, Price, Recipe, RecipeFilter, RecipeInput};
use crate::{RecipeError, Result};
use rusqlite::{params, params_from_iter, types::Type, Connection, OptionalExtension, Row};

const RECIPE_COLUMNS: &str =
    "r.id, r.user_id, r.title, r.description, r.time_minutes, r.price_cents, r.link";

fn recipe_from_row(row: &Row<'_>) -> rusqlite::Result<Recipe> {
    let cents: i64 = row.get(5)?;
    let price = Price::from_cents(cents)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Integer, Box::new(e)))?;
    Ok(Recipe {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        time_minutes: row.get(4)?,
        price,
        link: row.get(6)?,
        tags: Vec::new(),
        ingredients: Vec::new(),
    })
}

fn not_found(id: i64) -> RecipeError {
    RecipeError::NotFound(format!("Recipe {}", id))
}

fn with_labels(conn: &Connection, mut recipe: Recipe) -> Result<Recipe> {
    recipe.tags = labels_for_recipe(conn, LabelKind::Tag, recipe.id)?;
    recipe.ingredients = labels_for_recipe(conn, LabelKind::Ingredient, recipe.id)?;
    Ok(recipe)
}

fn fetch_recipe(conn: &Connection, user_id: i64, id: i64) -> Result<Recipe> {
    let recipe = conn
        .query_row(
            &format!("SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = ?1 AND r.user_id = ?2"),
            params![id, user_id],
            recipe_from_row,
        )
        .optional()?
        .ok_or_else(|| not_found(id))?;
    with_labels(conn, recipe)
}

fn apply_labels(conn: &Connection, user_id: i64, recipe_id: i64, input: &RecipeInput) -> Result<()> {
    if let Some(tags) = &input.tags {
        replace_recipe_labels(conn, LabelKind::Tag, user_id, recipe_id, tags)?;
    }
    if let Some(ingredients) = &input.ingredients {
        replace_recipe_labels(conn, LabelKind::Ingredient, user_id, recipe_id, ingredients)?;
    }
    Ok(())
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl Store {
    /// List a user's recipes, newest first, optionally narrowed by tag and
    /// ingredient ids.
    pub fn list_recipes(&self, user_id: i64, filter: &RecipeFilter) -> Result<Vec<Recipe>> {
        let mut sql = format!("SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.user_id = ?");
        let mut args: Vec<i64> = vec![user_id];

        if !filter.tags.is_empty() {
            sql.push_str(&format!(
                " AND r.id IN (SELECT recipe_id FROM recipe_tags WHERE tag_id IN ({}))",
                placeholders(filter.tags.len())
            ));
            args.extend(&filter.tags);
        }
        if !filter.ingredients.is_empty() {
            sql.push_str(&format!(
                " AND r.id IN (SELECT recipe_id FROM recipe_ingredients WHERE ingredient_id IN ({}))",
                placeholders(filter.ingredients.len())
            ));
            args.extend(&filter.ingredients);
        }
        sql.push_str(" ORDER BY r.id DESC");

        let conn = self.conn.lock();
        let recipes = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args.iter()), recipe_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            out
        };
        recipes
            .into_iter()
            .map(|recipe| with_labels(&conn, recipe))
            .collect()
    }

    pub fn get_recipe(&self, user_id: i64, id: i64) -> Result<Recipe> {
        let conn = self.conn.lock();
        fetch_recipe(&conn, user_id, id)
    }

    /// Create a recipe for `user_id`, get-or-creating any nested tags and
    /// ingredients in the same transaction.
    pub fn create_recipe(&self, user_id: i64, input: &RecipeInput) -> Result<Recipe> {
        let input = input.validated(false)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO recipes (user_id, title, description, time_minutes, price_cents, link)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                user_id,
                input.title,
                input.description.clone().unwrap_or_default(),
                input.time_minutes,
                input.price.map(Price::cents),
                input.link.clone().unwrap_or_default(),
            ],
        )?;
        let recipe_id = tx.last_insert_rowid();
        apply_labels(&tx, user_id, recipe_id, &input)?;
        tx.commit()?;

        tracing::debug!(user_id, recipe_id, "Recipe created");
        fetch_recipe(&conn, user_id, recipe_id)
    }

    /// Update a recipe owned by `user_id`. Supplied scalar fields overwrite,
    /// supplied label lists replace, and anything absent is left alone.
    pub fn update_recipe(
        &self,
        user_id: i64,
        id: i64,
        input: &RecipeInput,
        partial: bool,
    ) -> Result<Recipe> {
        let input = input.validated(partial)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let changed = tx.execute(
            r#"
            UPDATE recipes SET
                title = COALESCE(?1, title),
                description = COALESCE(?2, description),
                time_minutes = COALESCE(?3, time_minutes),
                price_cents = COALESCE(?4, price_cents),
                link = COALESCE(?5, link)
            WHERE id = ?6 AND user_id = ?7
            "#,
            params![
                input.title,
                input.description,
                input.time_minutes,
                input.price.map(Price::cents),
                input.link,
                id,
                user_id,
            ],
        )?;
        if changed == 0 {
            return Err(not_found(id));
        }
        apply_labels(&tx, user_id, id, &input)?;
        tx.commit()?;

        tracing::debug!(user_id, recipe_id = id, partial, "Recipe updated");
        fetch_recipe(&conn, user_id, id)
    }

    pub fn delete_recipe(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM recipes WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        if changed == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewUser;

    fn create_user(store: &Store, email: &str) -> i64 {
        store
            .create_user(&NewUser {
                email: email.into(),
                name: String::new(),
                password: "pass1234".into(),
            })
            .unwrap()
            .id
    }

    fn sample_input() -> RecipeInput {
        RecipeInput {
            title: Some("Sample Title".into()),
            description: Some("Sample random description.".into()),
            time_minutes: Some(25),
            price: Some("10.50".parse().unwrap()),
            link: Some("https://example.com/recipe.pdf".into()),
            ..Default::default()
        }
    }

    fn names(labels: &[crate::model::Label]) -> Vec<&str> {
        labels.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn test_create_recipe() {
        let store = Store::memory().unwrap();
        let user = create_user(&store, "user@example.com");

        let recipe = store.create_recipe(user, &sample_input()).unwrap();
        assert_eq!(recipe.user_id, user);
        assert_eq!(recipe.title, "Sample Title");
        assert_eq!(recipe.price.to_string(), "10.50");
        assert!(recipe.tags.is_empty());
    }

    #[test]
    fn test_create_recipe_defaults_optional_text() {
        let store = Store::memory().unwrap();
        let user = create_user(&store, "user@example.com");
        let input = RecipeInput {
            description: None,
            link: None,
            ..sample_input()
        };
        let recipe = store.create_recipe(user, &input).unwrap();
        assert_eq!(recipe.description, "");
        assert_eq!(recipe.link, "");
    }

    #[test]
    fn test_list_recipes_newest_first_and_scoped() {
        let store = Store::memory().unwrap();
        let user = create_user(&store, "user@example.com");
        let other = create_user(&store, "other@example.com");

        let first = store.create_recipe(user, &sample_input()).unwrap();
        store.create_recipe(other, &sample_input()).unwrap();
        let second = store.create_recipe(user, &sample_input()).unwrap();

        let ids: Vec<i64> = store
            .list_recipes(user, &RecipeFilter::default())
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_create_recipe_with_existing_tags() {
        let store = Store::memory().unwrap();
        let user = create_user(&store, "user@example.com");
        let salad = store.create_label(LabelKind::Tag, user, "Salad").unwrap();

        let recipe = store
            .create_recipe(
                user,
                &RecipeInput {
                    tags: Some(vec!["Salad".into(), "Vegan".into()]),
                    ..sample_input()
                },
            )
            .unwrap();

        assert_eq!(names(&recipe.tags), vec!["Salad", "Vegan"]);
        assert_eq!(recipe.tags[0].id, salad.id);
        assert_eq!(store.list_labels(LabelKind::Tag, user, false).unwrap().len(), 2);
    }

    #[test]
    fn test_nested_labels_are_scoped_per_user() {
        let store = Store::memory().unwrap();
        let user = create_user(&store, "user@example.com");
        let other = create_user(&store, "other@example.com");
        let foreign = store.create_label(LabelKind::Ingredient, other, "Cheese").unwrap();

        let recipe = store
            .create_recipe(
                user,
                &RecipeInput {
                    ingredients: Some(vec!["Cheese".into(), "Cheese".into()]),
                    ..sample_input()
                },
            )
            .unwrap();

        assert_eq!(recipe.ingredients.len(), 1);
        assert_ne!(recipe.ingredients[0].id, foreign.id);
    }

    #[test]
    fn test_partial_update_keeps_unsupplied_fields() {
        let store = Store::memory().unwrap();
        let user = create_user(&store, "user@example.com");
        let recipe = store
            .create_recipe(
                user,
                &RecipeInput {
                    tags: Some(vec!["Breakfast".into()]),
                    ..sample_input()
                },
            )
            .unwrap();

        let updated = store
            .update_recipe(
                user,
                recipe.id,
                &RecipeInput {
                    title: Some("Updated Title".into()),
                    ..Default::default()
                },
                true,
            )
            .unwrap();

        assert_eq!(updated.title, "Updated Title");
        assert_eq!(updated.link, recipe.link);
        assert_eq!(names(&updated.tags), vec!["Breakfast"]);
    }

    #[test]
    fn test_update_replaces_and_clears_labels() {
        let store = Store::memory().unwrap();
        let user = create_user(&store, "user@example.com");
        let recipe = store
            .create_recipe(
                user,
                &RecipeInput {
                    tags: Some(vec!["Breakfast".into()]),
                    ingredients: Some(vec!["Olive Oil".into()]),
                    ..sample_input()
                },
            )
            .unwrap();

        let updated = store
            .update_recipe(
                user,
                recipe.id,
                &RecipeInput {
                    tags: Some(vec!["Lunch".into()]),
                    ingredients: Some(vec![]),
                    ..Default::default()
                },
                true,
            )
            .unwrap();

        assert_eq!(names(&updated.tags), vec!["Lunch"]);
        assert!(updated.ingredients.is_empty());
        // The replaced tag still exists, it is just no longer linked.
        assert_eq!(store.list_labels(LabelKind::Tag, user, false).unwrap().len(), 2);
    }

    #[test]
    fn test_full_update_requires_fields() {
        let store = Store::memory().unwrap();
        let user = create_user(&store, "user@example.com");
        let recipe = store.create_recipe(user, &sample_input()).unwrap();

        let err = store
            .update_recipe(
                user,
                recipe.id,
                &RecipeInput {
                    title: Some("Only Title".into()),
                    ..Default::default()
                },
                false,
            )
            .unwrap_err();
        assert!(matches!(err, RecipeError::Validation { .. }));
    }

    #[test]
    fn test_other_users_recipe_is_not_found() {
        let store = Store::memory().unwrap();
        let user = create_user(&store, "user@example.com");
        let other = create_user(&store, "other@example.com");
        let recipe = store.create_recipe(other, &sample_input()).unwrap();

        assert!(matches!(store.get_recipe(user, recipe.id), Err(RecipeError::NotFound(_))));
        assert!(matches!(
            store.update_recipe(user, recipe.id, &RecipeInput::default(), true),
            Err(RecipeError::NotFound(_))
        ));
        assert!(matches!(store.delete_recipe(user, recipe.id), Err(RecipeError::NotFound(_))));
        assert!(store.get_recipe(other, recipe.id).is_ok());
    }

    #[test]
    fn test_filter_by_tags_and_ingredients() {
        let store = Store::memory().unwrap();
        let user = create_user(&store, "user@example.com");
        let thai = store
            .create_recipe(
                user,
                &RecipeInput {
                    tags: Some(vec!["Thai".into()]),
                    ingredients: Some(vec!["Rice".into()]),
                    ..sample_input()
                },
            )
            .unwrap();
        let italian = store
            .create_recipe(
                user,
                &RecipeInput {
                    tags: Some(vec!["Italian".into()]),
                    ingredients: Some(vec!["Pasta".into()]),
                    ..sample_input()
                },
            )
            .unwrap();
        store.create_recipe(user, &sample_input()).unwrap();

        let by_tag = store
            .list_recipes(
                user,
                &RecipeFilter {
                    tags: vec![thai.tags[0].id, italian.tags[0].id],
                    ingredients: vec![],
                },
            )
            .unwrap();
        assert_eq!(by_tag.len(), 2);

        let both = store
            .list_recipes(
                user,
                &RecipeFilter {
                    tags: vec![thai.tags[0].id, italian.tags[0].id],
                    ingredients: vec![italian.ingredients[0].id],
                },
            )
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].id, italian.id);
    }

    #[test]
    fn test_deleting_user_cascades() {
        let store = Store::memory().unwrap();
        let user = create_user(&store, "user@example.com");
        store
            .create_recipe(
                user,
                &RecipeInput {
                    tags: Some(vec!["Dinner".into()]),
                    ..sample_input()
                },
            )
            .unwrap();

        {
            let conn = store.conn.lock();
            conn.execute("DELETE FROM users WHERE id = ?1", [user]).unwrap();
            let remaining: i64 = conn
                .query_row("SELECT COUNT(*) FROM recipe_tags", [], |row| row.get(0))
                .unwrap();
            assert_eq!(remaining, 0);
        }
        assert!(store
            .list_recipes(user, &RecipeFilter::default())
            .unwrap()
            .is_empty());
    }
}
