use rust_decimal::Decimal;
use std::collections::HashSet;

use super::{
    CommandLine, CommandLineRequest, CreateTableRequest, MenuItem, RegisterRequest,
    ValidationError, ValidationResult,
};

/// Trait for validating input models
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

/// Validation constants
pub const MAX_NAME_LENGTH: usize = 200;
pub const MAX_ROUTE_LENGTH: usize = 64;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const MAX_TABLE_FIELD_LENGTH: usize = 100;
pub const MAX_MENU_ITEMS: usize = 500;
pub const MAX_COMMAND_LINES: usize = 100;
pub const MAX_COMMAND_QUANTITY: u32 = 1000;
pub const MIN_COMMAND_QUANTITY: u32 = 1;
pub const MAX_PRICE: Decimal = Decimal::from_parts(99999999, 0, 0, false, 2); // 999999.99

/// Routes that collide with fixed path segments of the HTTP surface.
pub const RESERVED_ROUTES: &[&str] = &[
    "table",
    "route",
    "login",
    "register",
    "new-table",
    "new-menu",
    "add-to-menu",
    "health",
    "metrics",
];

/// Table hashes that would shadow a fixed segment under `/:route/`.
pub const RESERVED_TABLE_HASHES: &[&str] = &["menu", "table"];

impl Validate for RegisterRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_restaurant_name(&self.name)?;
        validate_route(&self.route)?;
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        Ok(())
    }
}

impl Validate for CreateTableRequest {
    fn validate(&self) -> ValidationResult<()> {
        validate_table_field("hash", &self.hash)?;
        validate_table_field("name", &self.name)?;
        validate_table_hash(&self.hash)
    }
}

/// `POST /:route/menu` can never reach a table hashed `menu`.
pub fn validate_table_hash(hash: &str) -> ValidationResult<()> {
    let hash = hash.trim();
    if RESERVED_TABLE_HASHES.contains(&hash) {
        return Err(ValidationError::InvalidValue {
            field: "hash".to_string(),
            value: hash.to_string(),
            reason: "Table hash is reserved".to_string(),
        });
    }
    Ok(())
}

impl Validate for MenuItem {
    fn validate(&self) -> ValidationResult<()> {
        validate_menu_item_id(&self.id)?;
        validate_menu_item_name(&self.name)?;
        validate_price(&self.price)?;
        Ok(())
    }
}

/// Normalizes an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_restaurant_name(name: &str) -> ValidationResult<()> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "name".to_string(),
        });
    }

    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max_length: MAX_NAME_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidValue {
            field: "name".to_string(),
            value: name.to_string(),
            reason: "Contains invalid control characters".to_string(),
        });
    }

    Ok(())
}

/// Validate a public restaurant route (URL slug)
pub fn validate_route(route: &str) -> ValidationResult<()> {
    if route.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "route".to_string(),
        });
    }

    if route.len() > MAX_ROUTE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "route".to_string(),
            max_length: MAX_ROUTE_LENGTH,
            actual_length: route.len(),
        });
    }

    if !route
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "route".to_string(),
            expected: "lowercase letters, digits, hyphens and underscores".to_string(),
        });
    }

    if RESERVED_ROUTES.contains(&route) {
        return Err(ValidationError::InvalidValue {
            field: "route".to_string(),
            value: route.to_string(),
            reason: "Route is reserved".to_string(),
        });
    }

    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult<()> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "email".to_string(),
        });
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max_length: MAX_EMAIL_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    let well_formed = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !trimmed.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !well_formed {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            expected: "an address like local@domain.tld".to_string(),
        });
    }

    Ok(())
}

pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "password".to_string(),
        });
    }

    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min_length: MIN_PASSWORD_LENGTH,
            actual_length: password.len(),
        });
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max_length: MAX_PASSWORD_LENGTH,
            actual_length: password.len(),
        });
    }

    Ok(())
}

pub fn validate_table_field(field: &str, value: &str) -> ValidationResult<()> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: field.to_string(),
        });
    }

    if trimmed.len() > MAX_TABLE_FIELD_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max_length: MAX_TABLE_FIELD_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    Ok(())
}

pub fn validate_menu_item_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::RequiredField {
            field: "id".to_string(),
        });
    }

    Ok(())
}

pub fn validate_menu_item_name(name: &str) -> ValidationResult<()> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "name".to_string(),
        });
    }

    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max_length: MAX_NAME_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    Ok(())
}

pub fn validate_price(price: &Decimal) -> ValidationResult<()> {
    if price.is_sign_negative() || *price > MAX_PRICE {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: "0".to_string(),
            max: MAX_PRICE.to_string(),
            value: price.to_string(),
        });
    }

    if price.normalize().scale() > 2 {
        return Err(ValidationError::InvalidValue {
            field: "price".to_string(),
            value: price.to_string(),
            reason: "Price cannot have more than 2 decimal places".to_string(),
        });
    }

    Ok(())
}

/// Validate a full menu replacement: every item valid and ids unique
pub fn validate_menu(menu: &[MenuItem]) -> ValidationResult<()> {
    if menu.len() > MAX_MENU_ITEMS {
        return Err(ValidationError::InvalidValue {
            field: "menu".to_string(),
            value: menu.len().to_string(),
            reason: format!("Too many items, maximum allowed: {}", MAX_MENU_ITEMS),
        });
    }

    let mut seen_ids = HashSet::new();

    for item in menu {
        item.validate()?;

        if !seen_ids.insert(item.id.as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "menu".to_string(),
                value: item.id.clone(),
                reason: "Duplicate menu item id".to_string(),
            });
        }
    }

    Ok(())
}

/// Validate submitted command lines and convert them into stored lines.
///
/// Every line needs a non-empty id and a positive quantity; an empty list is
/// rejected as well.
pub fn validate_command_lines(lines: &[CommandLineRequest]) -> ValidationResult<Vec<CommandLine>> {
    if lines.is_empty() {
        return Err(ValidationError::RequiredField {
            field: "command".to_string(),
        });
    }

    if lines.len() > MAX_COMMAND_LINES {
        return Err(ValidationError::TooLong {
            field: "command".to_string(),
            max_length: MAX_COMMAND_LINES,
            actual_length: lines.len(),
        });
    }

    lines
        .iter()
        .enumerate()
        .map(|(index, line)| -> ValidationResult<CommandLine> {
            let id = match line.id.as_deref().map(str::trim) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    return Err(ValidationError::RequiredField {
                        field: format!("command[{}].id", index),
                    })
                }
            };

            let qtd = line.qtd.ok_or_else(|| ValidationError::RequiredField {
                field: format!("command[{}].qtd", index),
            })?;

            let quantity = u32::try_from(qtd)
                .ok()
                .filter(|q| (MIN_COMMAND_QUANTITY..=MAX_COMMAND_QUANTITY).contains(q))
                .ok_or_else(|| ValidationError::OutOfRange {
                    field: format!("command[{}].qtd", index),
                    min: MIN_COMMAND_QUANTITY.to_string(),
                    max: MAX_COMMAND_QUANTITY.to_string(),
                    value: qtd.to_string(),
                })?;

            Ok(CommandLine { id, quantity })
        })
        .collect()
}
