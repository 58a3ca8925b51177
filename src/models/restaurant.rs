use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use super::{RepositoryError, RepositoryResult};

/// A restaurant account together with its menu and tables.
///
/// The menu and tables are owned by the restaurant and always travel with it;
/// there is no independent lifecycle for either.
#[derive(Clone, PartialEq)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub route: String,
    pub email: String,
    pub password_hash: String,
    pub menu: Vec<MenuItem>,
    pub tables: Vec<Table>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Keeps the password hash out of every log line that formats a restaurant.
impl fmt::Debug for Restaurant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Restaurant")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("route", &self.route)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("menu", &self.menu)
            .field("tables", &self.tables)
            .field("version", &self.version)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub pic: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// A physical table, addressed by its public `hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub hash: String,
    pub name: String,
    #[serde(default)]
    pub commands: Vec<Command>,
}

/// An order placed at a table. Newest commands come first in `Table::commands`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "command")]
    pub items: Vec<CommandLine>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(rename = "qtd")]
    pub quantity: u32,
}

/// Public projection of a restaurant returned after login and registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantSummary {
    pub name: String,
    pub route: String,
    pub email: String,
    pub tables: Vec<Table>,
    pub menu: Vec<MenuItem>,
}

/// Targeted mutation of a single restaurant's embedded collections.
#[derive(Debug, Clone, PartialEq)]
pub enum RestaurantUpdate {
    PushTable(Table),
    PushMenuItem(MenuItem),
    ReplaceMenu(Vec<MenuItem>),
    ReplaceMenuItem(MenuItem),
    RemoveMenuItem { id: String },
    RemoveTable { hash: String },
    PrependCommand { hash: String, command: Command },
    ClearCommands { hash: String },
}

impl RestaurantUpdate {
    pub fn operation_name(&self) -> &'static str {
        match self {
            RestaurantUpdate::PushTable(_) => "push_table",
            RestaurantUpdate::PushMenuItem(_) => "push_menu_item",
            RestaurantUpdate::ReplaceMenu(_) => "replace_menu",
            RestaurantUpdate::ReplaceMenuItem(_) => "replace_menu_item",
            RestaurantUpdate::RemoveMenuItem { .. } => "remove_menu_item",
            RestaurantUpdate::RemoveTable { .. } => "remove_table",
            RestaurantUpdate::PrependCommand { .. } => "prepend_command",
            RestaurantUpdate::ClearCommands { .. } => "clear_commands",
        }
    }
}

impl Restaurant {
    pub fn new(name: String, route: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            route,
            email,
            password_hash,
            menu: Vec::new(),
            tables: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Looks a table up by hash first, then by name.
    pub fn find_table(&self, key: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|table| table.hash == key)
            .or_else(|| self.tables.iter().find(|table| table.name == key))
    }

    pub fn table_by_hash(&self, hash: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.hash == hash)
    }

    pub fn menu_item(&self, id: &str) -> Option<&MenuItem> {
        self.menu.iter().find(|item| item.id == id)
    }

    /// True when another table already uses this hash or this name.
    pub fn has_table_conflict(&self, hash: &str, name: &str) -> bool {
        self.tables
            .iter()
            .any(|table| table.hash == hash || table.name == name)
    }

    pub fn summary(&self) -> RestaurantSummary {
        RestaurantSummary {
            name: self.name.clone(),
            route: self.route.clone(),
            email: self.email.clone(),
            tables: self.tables.clone(),
            menu: self.menu.clone(),
        }
    }

    /// Applies an update in place.
    ///
    /// Returns `Ok(true)` when the restaurant changed, `Ok(false)` when the update
    /// matched nothing or left the data as it was. Uniqueness of table hashes,
    /// table names and menu item ids is enforced here so every store backend
    /// shares the same constraint semantics. A change bumps `version` and
    /// `updated_at`.
    pub fn apply(&mut self, update: RestaurantUpdate) -> RepositoryResult<bool> {
        let changed = match update {
            RestaurantUpdate::PushTable(table) => {
                if self.has_table_conflict(&table.hash, &table.name) {
                    return Err(RepositoryError::ConstraintViolation {
                        message: format!("Table {} already exists", table.hash),
                    });
                }
                self.tables.push(table);
                true
            }
            RestaurantUpdate::PushMenuItem(item) => {
                if self.menu_item(&item.id).is_some() {
                    return Err(RepositoryError::ConstraintViolation {
                        message: format!("Menu item {} already exists", item.id),
                    });
                }
                self.menu.push(item);
                true
            }
            RestaurantUpdate::ReplaceMenu(menu) => {
                let mut seen = HashSet::new();
                if let Some(duplicate) = menu.iter().find(|item| !seen.insert(item.id.as_str())) {
                    return Err(RepositoryError::ConstraintViolation {
                        message: format!("Menu item {} appears more than once", duplicate.id),
                    });
                }
                if self.menu == menu {
                    false
                } else {
                    self.menu = menu;
                    true
                }
            }
            RestaurantUpdate::ReplaceMenuItem(item) => {
                match self.menu.iter_mut().find(|existing| existing.id == item.id) {
                    Some(existing) if *existing != item => {
                        *existing = item;
                        true
                    }
                    _ => false,
                }
            }
            RestaurantUpdate::RemoveMenuItem { id } => {
                let before = self.menu.len();
                self.menu.retain(|item| item.id != id);
                self.menu.len() != before
            }
            RestaurantUpdate::RemoveTable { hash } => {
                let before = self.tables.len();
                self.tables.retain(|table| table.hash != hash);
                self.tables.len() != before
            }
            RestaurantUpdate::PrependCommand { hash, command } => {
                match self.tables.iter_mut().find(|table| table.hash == hash) {
                    Some(table) => {
                        table.commands.insert(0, command);
                        true
                    }
                    None => false,
                }
            }
            RestaurantUpdate::ClearCommands { hash } => {
                match self.tables.iter_mut().find(|table| table.hash == hash) {
                    Some(table) if !table.commands.is_empty() => {
                        table.commands.clear();
                        true
                    }
                    _ => false,
                }
            }
        };

        if changed {
            self.version += 1;
            self.updated_at = Utc::now();
        }

        Ok(changed)
    }
}

impl Command {
    pub fn new(items: Vec<CommandLine>) -> Self {
        Self {
            items,
            date: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn create_test_restaurant() -> Restaurant {
        Restaurant::new(
            "Casa Pepe".to_string(),
            "casa-pepe".to_string(),
            "pepe@example.com".to_string(),
            "$argon2id$hash".to_string(),
        )
    }

    fn create_test_item(id: &str, price: Decimal) -> MenuItem {
        MenuItem {
            id: id.to_string(),
            name: format!("Dish {}", id),
            ingredients: "rice, beans".to_string(),
            pic: "dish.png".to_string(),
            price,
        }
    }

    fn create_test_table(hash: &str, name: &str) -> Table {
        Table {
            hash: hash.to_string(),
            name: name.to_string(),
            commands: Vec::new(),
        }
    }

    #[test]
    fn test_new_restaurant_starts_empty() {
        let restaurant = create_test_restaurant();

        assert!(!restaurant.id.is_empty());
        assert!(restaurant.menu.is_empty());
        assert!(restaurant.tables.is_empty());
        assert_eq!(restaurant.version, 0);
    }

    #[test]
    fn test_debug_redacts_password_hash() {
        let restaurant = create_test_restaurant();
        let output = format!("{:?}", restaurant);

        assert!(!output.contains("$argon2id$hash"));
        assert!(output.contains("<redacted>"));
    }

    #[test]
    fn test_push_table_rejects_duplicate_hash_or_name() {
        let mut restaurant = create_test_restaurant();
        assert!(restaurant
            .apply(RestaurantUpdate::PushTable(create_test_table("t1", "Terrace")))
            .unwrap());

        let same_hash = restaurant.apply(RestaurantUpdate::PushTable(create_test_table("t1", "Bar")));
        assert!(matches!(
            same_hash,
            Err(RepositoryError::ConstraintViolation { .. })
        ));

        let same_name =
            restaurant.apply(RestaurantUpdate::PushTable(create_test_table("t2", "Terrace")));
        assert!(matches!(
            same_name,
            Err(RepositoryError::ConstraintViolation { .. })
        ));

        assert_eq!(restaurant.tables.len(), 1);
        assert_eq!(restaurant.version, 1);
    }

    #[test]
    fn test_push_menu_item_rejects_duplicate_id() {
        let mut restaurant = create_test_restaurant();
        restaurant
            .apply(RestaurantUpdate::PushMenuItem(create_test_item("m1", dec!(10))))
            .unwrap();

        let result = restaurant.apply(RestaurantUpdate::PushMenuItem(create_test_item("m1", dec!(12))));
        assert!(matches!(
            result,
            Err(RepositoryError::ConstraintViolation { .. })
        ));
        assert_eq!(restaurant.menu.len(), 1);
        assert_eq!(restaurant.menu[0].price, dec!(10));
    }

    #[test]
    fn test_replace_menu_reports_no_change_for_identical_menu() {
        let mut restaurant = create_test_restaurant();
        let menu = vec![create_test_item("m1", dec!(10)), create_test_item("m2", dec!(5.5))];

        assert!(restaurant.apply(RestaurantUpdate::ReplaceMenu(menu.clone())).unwrap());
        assert!(!restaurant.apply(RestaurantUpdate::ReplaceMenu(menu)).unwrap());
        assert_eq!(restaurant.version, 1);
    }

    #[test]
    fn test_replace_menu_rejects_duplicate_ids() {
        let mut restaurant = create_test_restaurant();
        let menu = vec![create_test_item("m1", dec!(10)), create_test_item("m1", dec!(11))];

        assert!(matches!(
            restaurant.apply(RestaurantUpdate::ReplaceMenu(menu)),
            Err(RepositoryError::ConstraintViolation { .. })
        ));
        assert!(restaurant.menu.is_empty());
    }

    #[test]
    fn test_replace_menu_item() {
        let mut restaurant = create_test_restaurant();
        restaurant
            .apply(RestaurantUpdate::PushMenuItem(create_test_item("m1", dec!(10))))
            .unwrap();

        // Same content is not a change
        assert!(!restaurant
            .apply(RestaurantUpdate::ReplaceMenuItem(create_test_item("m1", dec!(10))))
            .unwrap());

        assert!(restaurant
            .apply(RestaurantUpdate::ReplaceMenuItem(create_test_item("m1", dec!(14))))
            .unwrap());
        assert_eq!(restaurant.menu_item("m1").unwrap().price, dec!(14));

        // Unknown item matches nothing
        assert!(!restaurant
            .apply(RestaurantUpdate::ReplaceMenuItem(create_test_item("m9", dec!(1))))
            .unwrap());
    }

    #[test]
    fn test_remove_menu_item_and_table() {
        let mut restaurant = create_test_restaurant();
        restaurant
            .apply(RestaurantUpdate::PushMenuItem(create_test_item("m1", dec!(10))))
            .unwrap();
        restaurant
            .apply(RestaurantUpdate::PushTable(create_test_table("t1", "Terrace")))
            .unwrap();

        assert!(restaurant
            .apply(RestaurantUpdate::RemoveMenuItem { id: "m1".to_string() })
            .unwrap());
        assert!(!restaurant
            .apply(RestaurantUpdate::RemoveMenuItem { id: "m1".to_string() })
            .unwrap());

        assert!(restaurant
            .apply(RestaurantUpdate::RemoveTable { hash: "t1".to_string() })
            .unwrap());
        assert!(!restaurant
            .apply(RestaurantUpdate::RemoveTable { hash: "t1".to_string() })
            .unwrap());
    }

    #[test]
    fn test_prepend_command_puts_newest_first() {
        let mut restaurant = create_test_restaurant();
        restaurant
            .apply(RestaurantUpdate::PushTable(create_test_table("t1", "Terrace")))
            .unwrap();

        let first = Command::new(vec![CommandLine { id: "m1".to_string(), quantity: 1 }]);
        let second = Command::new(vec![CommandLine { id: "m2".to_string(), quantity: 3 }]);

        for command in [first.clone(), second.clone()] {
            assert!(restaurant
                .apply(RestaurantUpdate::PrependCommand {
                    hash: "t1".to_string(),
                    command,
                })
                .unwrap());
        }

        let table = restaurant.table_by_hash("t1").unwrap();
        assert_eq!(table.commands, vec![second, first]);
    }

    #[test]
    fn test_prepend_command_to_missing_table_matches_nothing() {
        let mut restaurant = create_test_restaurant();
        let changed = restaurant
            .apply(RestaurantUpdate::PrependCommand {
                hash: "nope".to_string(),
                command: Command::new(vec![]),
            })
            .unwrap();

        assert!(!changed);
        assert_eq!(restaurant.version, 0);
    }

    #[test]
    fn test_clear_commands() {
        let mut restaurant = create_test_restaurant();
        restaurant
            .apply(RestaurantUpdate::PushTable(create_test_table("t1", "Terrace")))
            .unwrap();
        restaurant
            .apply(RestaurantUpdate::PrependCommand {
                hash: "t1".to_string(),
                command: Command::new(vec![CommandLine { id: "m1".to_string(), quantity: 2 }]),
            })
            .unwrap();

        assert!(restaurant
            .apply(RestaurantUpdate::ClearCommands { hash: "t1".to_string() })
            .unwrap());
        assert!(restaurant.table_by_hash("t1").unwrap().commands.is_empty());

        // Already empty and unknown tables are both no-ops
        assert!(!restaurant
            .apply(RestaurantUpdate::ClearCommands { hash: "t1".to_string() })
            .unwrap());
        assert!(!restaurant
            .apply(RestaurantUpdate::ClearCommands { hash: "zz".to_string() })
            .unwrap());
    }

    #[test]
    fn test_find_table_by_hash_then_name() {
        let mut restaurant = create_test_restaurant();
        restaurant
            .apply(RestaurantUpdate::PushTable(create_test_table("t1", "Terrace")))
            .unwrap();
        restaurant
            .apply(RestaurantUpdate::PushTable(create_test_table("t2", "t1-window")))
            .unwrap();

        assert_eq!(restaurant.find_table("t1").unwrap().name, "Terrace");
        assert_eq!(restaurant.find_table("t1-window").unwrap().hash, "t2");
        assert!(restaurant.find_table("missing").is_none());
    }

    #[test]
    fn test_command_wire_format() {
        let command = Command::new(vec![CommandLine { id: "m1".to_string(), quantity: 2 }]);
        let json = serde_json::to_value(&command).unwrap();

        assert_eq!(json["command"][0]["id"], "m1");
        assert_eq!(json["command"][0]["qtd"], 2);
        assert!(json["date"].is_string());

        let legacy: CommandLine = serde_json::from_str(r#"{"_id":"m7","qtd":4}"#).unwrap();
        assert_eq!(legacy.id, "m7");
        assert_eq!(legacy.quantity, 4);
    }

    #[test]
    fn test_menu_item_price_serializes_as_number() {
        let item = create_test_item("m1", dec!(12.5));
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["price"], serde_json::json!(12.5));
    }
}
